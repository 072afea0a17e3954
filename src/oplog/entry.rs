//! Operation log entry data structures

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Workflow an entry belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Backup,
    SafetyBackup,
    Prune,
    Verify,
    Restore,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Backup => write!(f, "BACKUP"),
            Operation::SafetyBackup => write!(f, "SAFETY_BACKUP"),
            Operation::Prune => write!(f, "PRUNE"),
            Operation::Verify => write!(f, "VERIFY"),
            Operation::Restore => write!(f, "RESTORE"),
            Operation::Delete => write!(f, "DELETE"),
        }
    }
}

/// Severity of an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Info,
    Warn,
    Error,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Info => write!(f, "INFO"),
            Level::Warn => write!(f, "WARN"),
            Level::Error => write!(f, "ERROR"),
        }
    }
}

/// A single operation log record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// When the step happened (UTC)
    pub timestamp: DateTime<Utc>,

    pub operation: Operation,

    pub level: Level,

    /// Human-readable description of the step or its failure cause
    pub message: String,

    /// Archive the step concerned, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive: Option<String>,
}

impl LogEntry {
    fn new(operation: Operation, level: Level, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            operation,
            level,
            message: message.into(),
            archive: None,
        }
    }

    pub fn info(operation: Operation, message: impl Into<String>) -> Self {
        Self::new(operation, Level::Info, message)
    }

    pub fn warn(operation: Operation, message: impl Into<String>) -> Self {
        Self::new(operation, Level::Warn, message)
    }

    pub fn error(operation: Operation, message: impl Into<String>) -> Self {
        Self::new(operation, Level::Error, message)
    }

    /// Attach the archive this entry refers to
    pub fn with_archive(mut self, archive: impl Into<String>) -> Self {
        self.archive = Some(archive.into());
        self
    }

    /// Format as a single human-readable line
    pub fn format_line(&self) -> String {
        let mut line = format!(
            "{} [{}] {}: {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
            self.level,
            self.operation,
            self.message
        );
        if let Some(archive) = &self.archive {
            line.push_str(&format!(" ({})", archive));
        }
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors_set_level() {
        assert_eq!(LogEntry::info(Operation::Backup, "x").level, Level::Info);
        assert_eq!(LogEntry::warn(Operation::Prune, "x").level, Level::Warn);
        assert_eq!(LogEntry::error(Operation::Restore, "x").level, Level::Error);
    }

    #[test]
    fn test_format_line() {
        let entry = LogEntry::error(Operation::Backup, "pg_dump exited with 1")
            .with_archive("backup_app_20250101_120000.sql.gz");
        let line = entry.format_line();
        assert!(line.contains("[ERROR] BACKUP: pg_dump exited with 1"));
        assert!(line.ends_with("(backup_app_20250101_120000.sql.gz)"));
    }

    #[test]
    fn test_serialization_omits_missing_archive() {
        let entry = LogEntry::info(Operation::Prune, "removed 0 archives");
        let json = serde_json::to_string(&entry).unwrap();
        assert!(!json.contains("\"archive\""));
        assert!(json.contains("\"operation\":\"prune\""));
        assert!(json.contains("\"level\":\"info\""));
    }
}
