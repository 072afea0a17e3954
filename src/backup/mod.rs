//! Backup orchestration
//!
//! A backup run streams the dump primitive's output through gzip into the
//! archive store, proves the published archive decodes, and only then
//! applies retention. Archives that cannot be verified are deleted.
//!
//! # Example
//!
//! ```rust,ignore
//! use dbvault::backup::BackupOrchestrator;
//!
//! let orchestrator = BackupOrchestrator::new(&store, &tool, &log);
//! let report = orchestrator.run(&settings.database.name, &settings.retention)?;
//! println!("{} ({} pruned)", report.path().display(), report.pruned_count());
//! ```

mod orchestrator;

pub use orchestrator::{apply_retention, BackupOrchestrator, BackupReport};
