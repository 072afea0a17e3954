//! dbvault - verified backups and guarded restores for PostgreSQL
//!
//! This library provides the core of the `dbvault` tool. It treats
//! `pg_dump` and `psql` as opaque primitives and adds the bookkeeping
//! around them: where they run, how archives are named, verified and
//! retained, and how a destructive restore is confirmed.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - `config`: Settings loaded from environment variables
//! - `error`: Custom error types
//! - `environment`: Container/native resolution and the dump/restore executor
//! - `store`: On-disk archive layout, verification and retention
//! - `backup`: Backup orchestration
//! - `restore`: Restore orchestration and the confirmation gate
//! - `oplog`: Append-only operation log
//! - `display`: Terminal formatting
//! - `cli`: Command handlers used by the binary
//!
//! # Example
//!
//! ```rust,ignore
//! use dbvault::backup::BackupOrchestrator;
//! use dbvault::config::Settings;
//! use dbvault::environment::{self, CommandTool};
//! use dbvault::oplog::OperationLog;
//! use dbvault::store::ArchiveStore;
//!
//! let settings = Settings::from_env()?;
//! let tool = CommandTool::new(environment::resolve(&settings)?, settings.database.clone());
//! let store = ArchiveStore::new(settings.backup_dir.clone());
//! let log = OperationLog::new(settings.log_file.clone());
//!
//! BackupOrchestrator::new(&store, &tool, &log).run(&settings.database.name, &settings.retention)?;
//! ```

pub mod backup;
pub mod cli;
pub mod config;
pub mod display;
pub mod environment;
pub mod error;
pub mod oplog;
pub mod restore;
pub mod store;

#[cfg(test)]
mod testutil;
