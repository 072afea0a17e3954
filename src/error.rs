//! Custom error types for dbvault
//!
//! This module defines the error hierarchy for backup and restore workflows
//! using thiserror for ergonomic error definitions.
//!
//! An operator declining a restore is not an error; see
//! [`crate::restore::RestoreOutcome::Aborted`].

use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

/// The main error type for dbvault operations
#[derive(Error, Debug)]
pub enum VaultError {
    /// Neither a running database container nor a native client was found
    #[error("No database environment found: {0}")]
    NoEnvironmentFound(String),

    /// Writing an archive to the store failed; nothing was published
    #[error("Failed to write archive: {0}")]
    WriteFailed(String),

    /// The archive's compression envelope is damaged
    #[error("Corrupt archive {}: {reason}", .path.display())]
    CorruptArchive { path: PathBuf, reason: String },

    /// A selector did not resolve to an archive
    #[error("Archive not found: {0}")]
    NotFound(String),

    /// An archive with the same name already exists
    #[error("Archive already exists: {}", .0.display())]
    ArchiveExists(PathBuf),

    /// A new archive would be older than one already in the store
    #[error(
        "Archive {} would be older than {} already in the store",
        .path.display(),
        .newest.display()
    )]
    OutOfOrder { path: PathBuf, newest: PathBuf },

    /// An external dump/restore primitive exited unsuccessfully
    #[error("{command} exited with {status}{}", stderr_suffix(.stderr))]
    PrimitiveFailed {
        command: String,
        status: ExitStatus,
        stderr: String,
    },

    /// The backup workflow failed
    #[error("Backup failed: {reason}")]
    BackupFailed {
        #[source]
        reason: Box<VaultError>,
    },

    /// The restore primitive failed after the database may have been touched
    #[error("Restore failed: {reason}{}", safety_suffix(.safety_archive))]
    RestoreFailed {
        #[source]
        reason: Box<VaultError>,
        /// Safety archive taken before the restore, if one was created
        safety_archive: Option<PathBuf>,
    },

    /// The restore state machine was asked to skip or repeat a step
    #[error("Illegal restore transition {from} -> {to}")]
    IllegalTransition { from: String, to: String },

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(String),
}

fn stderr_suffix(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(": {}", trimmed)
    }
}

fn safety_suffix(safety_archive: &Option<PathBuf>) -> String {
    match safety_archive {
        Some(path) => format!(" (previous state saved in {})", path.display()),
        None => String::new(),
    }
}

impl VaultError {
    /// Wrap a cause as a backup failure
    pub fn backup_failed(reason: VaultError) -> Self {
        Self::BackupFailed {
            reason: Box::new(reason),
        }
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Check if this error is, or wraps, a corrupt archive
    pub fn is_corrupt_archive(&self) -> bool {
        match self {
            Self::CorruptArchive { .. } => true,
            Self::BackupFailed { reason } => reason.is_corrupt_archive(),
            _ => false,
        }
    }
}

impl From<std::io::Error> for VaultError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for VaultError {
    fn from(err: serde_json::Error) -> Self {
        Self::Io(format!("JSON error: {}", err))
    }
}

/// Result type alias for dbvault operations
pub type VaultResult<T> = Result<T, VaultError>;
