//! Durable operation log
//!
//! Every backup, prune, verify and restore step is appended to a single
//! line-delimited JSON file next to the archive store, whether the step
//! succeeded or not. The log is append-only; nothing in dbvault rewrites it.
//!
//! # Example
//!
//! ```rust,ignore
//! use dbvault::oplog::{LogEntry, Operation, OperationLog};
//!
//! let log = OperationLog::new(settings.log_file.clone());
//! log.record(&LogEntry::info(Operation::Backup, "dump started"));
//! ```

mod entry;
mod logger;

pub use entry::{Level, LogEntry, Operation};
pub use logger::OperationLog;
