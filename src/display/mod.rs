//! Display formatting for terminal output
//!
//! Pure string builders; callers decide where the text goes.

pub mod archive;

pub use archive::{
    format_age, format_archive_list, format_prune_report, format_restore_summary, format_size,
};
