//! Append-only operation log writer

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use crate::error::{VaultError, VaultResult};

use super::entry::{Level, LogEntry};

/// Writes operation log entries as JSON lines
///
/// Each entry is written as a single line and flushed immediately.
#[derive(Debug, Clone)]
pub struct OperationLog {
    log_path: PathBuf,
}

impl OperationLog {
    pub fn new(log_path: PathBuf) -> Self {
        Self { log_path }
    }

    /// Append an entry, creating the log (and its directory) if needed
    pub fn append(&self, entry: &LogEntry) -> VaultResult<()> {
        if let Some(parent) = self.log_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    VaultError::Io(format!("Failed to create log directory: {}", e))
                })?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .map_err(|e| VaultError::Io(format!("Failed to open operation log: {}", e)))?;

        let json = serde_json::to_string(entry)?;

        writeln!(file, "{}", json)
            .map_err(|e| VaultError::Io(format!("Failed to write operation log: {}", e)))?;

        file.flush()
            .map_err(|e| VaultError::Io(format!("Failed to flush operation log: {}", e)))?;

        Ok(())
    }

    /// Append an entry, mirroring it to tracing
    ///
    /// A log that cannot be written never aborts the workflow being logged.
    pub fn record(&self, entry: &LogEntry) {
        match entry.level {
            Level::Info => tracing::info!(operation = %entry.operation, "{}", entry.message),
            Level::Warn => tracing::warn!(operation = %entry.operation, "{}", entry.message),
            Level::Error => tracing::error!(operation = %entry.operation, "{}", entry.message),
        }

        if let Err(e) = self.append(entry) {
            tracing::warn!(path = %self.log_path.display(), "operation log unavailable: {}", e);
        }
    }

    /// Read all entries, oldest first
    pub fn read_all(&self) -> VaultResult<Vec<LogEntry>> {
        if !self.log_path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.log_path)
            .map_err(|e| VaultError::Io(format!("Failed to open operation log: {}", e)))?;

        let reader = BufReader::new(file);
        let mut entries = Vec::new();

        for (line_num, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| {
                VaultError::Io(format!(
                    "Failed to read operation log line {}: {}",
                    line_num + 1,
                    e
                ))
            })?;

            if line.trim().is_empty() {
                continue;
            }

            let entry: LogEntry = serde_json::from_str(&line).map_err(|e| {
                VaultError::Io(format!(
                    "Failed to parse operation log line {}: {}",
                    line_num + 1,
                    e
                ))
            })?;

            entries.push(entry);
        }

        Ok(entries)
    }

    /// Read the most recent N entries, oldest first
    pub fn read_recent(&self, count: usize) -> VaultResult<Vec<LogEntry>> {
        let all_entries = self.read_all()?;
        let start = all_entries.len().saturating_sub(count);
        Ok(all_entries[start..].to_vec())
    }

    pub fn path(&self) -> &Path {
        &self.log_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oplog::entry::Operation;
    use tempfile::TempDir;

    fn create_test_log() -> (OperationLog, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let log = OperationLog::new(temp_dir.path().join("backups").join("backup.log"));
        (log, temp_dir)
    }

    #[test]
    fn test_append_and_read() {
        let (log, _temp) = create_test_log();

        log.append(&LogEntry::info(Operation::Backup, "dump started"))
            .unwrap();

        let entries = log.read_all().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].operation, Operation::Backup);
        assert_eq!(entries[0].message, "dump started");
    }

    #[test]
    fn test_append_creates_parent_directory() {
        let (log, _temp) = create_test_log();
        assert!(!log.path().exists());

        log.record(&LogEntry::warn(Operation::Prune, "could not delete"));
        assert!(log.path().exists());
    }

    #[test]
    fn test_entries_are_appended_not_rewritten() {
        let (log, _temp) = create_test_log();

        for i in 0..4 {
            log.record(&LogEntry::info(Operation::Verify, format!("step {}", i)));
        }

        let contents = std::fs::read_to_string(log.path()).unwrap();
        assert_eq!(contents.lines().count(), 4);
        assert_eq!(log.read_all().unwrap()[0].message, "step 0");
    }

    #[test]
    fn test_read_recent() {
        let (log, _temp) = create_test_log();

        for i in 0..10 {
            log.record(&LogEntry::info(Operation::Backup, format!("entry {}", i)));
        }

        let recent = log.read_recent(3).unwrap();
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].message, "entry 7");
        assert_eq!(recent[2].message, "entry 9");
    }

    #[test]
    fn test_empty_log() {
        let (log, _temp) = create_test_log();
        assert!(log.read_all().unwrap().is_empty());
        assert!(log.read_recent(5).unwrap().is_empty());
    }

    #[test]
    fn test_record_survives_unwritable_log() {
        let temp_dir = TempDir::new().unwrap();
        // A directory where the log file should be makes every append fail.
        let log = OperationLog::new(temp_dir.path().to_path_buf());
        log.record(&LogEntry::error(Operation::Restore, "still returns"));
        assert!(log.append(&LogEntry::info(Operation::Restore, "x")).is_err());
    }
}
