//! CLI command handlers
//!
//! This module contains the implementation of CLI commands,
//! bridging the clap argument parsing with the orchestrators.

pub mod archives;
pub mod backup;
pub mod restore;

pub use archives::{handle_history, handle_list, handle_verify};
pub use backup::{handle_backup, handle_prune};
pub use restore::{handle_restore, handle_restore_with};
