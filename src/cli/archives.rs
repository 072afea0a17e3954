//! Archive inspection commands
//!
//! Implements `list`, `verify` and `history`. None of these touch the
//! database, so no execution environment is resolved.

use chrono::Utc;

use crate::config::Settings;
use crate::display::{format_archive_list, format_size};
use crate::error::VaultResult;
use crate::oplog::{LogEntry, Operation, OperationLog};
use crate::store::ArchiveStore;

/// Print the archives of the configured database, newest first
pub fn handle_list(settings: &Settings) -> VaultResult<()> {
    let store = ArchiveStore::new(settings.backup_dir.clone());
    let archives = store.list(&settings.database.name)?;

    if archives.is_empty() {
        println!(
            "No archives for '{}' in {}",
            settings.database.name,
            store.root().display()
        );
        println!("Create one with: dbvault backup");
        return Ok(());
    }

    println!("Archives for '{}'", settings.database.name);
    println!();
    println!("{}", format_archive_list(&archives, Utc::now()));
    Ok(())
}

/// Structurally verify a single archive
pub fn handle_verify(settings: &Settings, selector: &str) -> VaultResult<()> {
    let store = ArchiveStore::new(settings.backup_dir.clone());
    let log = OperationLog::new(settings.log_file.clone());

    let snapshot = store.list(&settings.database.name)?;
    let archive = store.resolve_selector(selector, &snapshot)?;

    match store.verify(&archive) {
        Ok(()) => {
            log.record(
                &LogEntry::info(Operation::Verify, "Archive verified")
                    .with_archive(archive.file_name()),
            );
            println!(
                "OK  {} ({})",
                archive.file_name(),
                format_size(archive.size_bytes)
            );
            Ok(())
        }
        Err(e) => {
            log.record(
                &LogEntry::error(Operation::Verify, e.to_string())
                    .with_archive(archive.file_name()),
            );
            Err(e)
        }
    }
}

/// Print the most recent operation log records
pub fn handle_history(settings: &Settings, limit: usize) -> VaultResult<()> {
    let log = OperationLog::new(settings.log_file.clone());
    let entries = log.read_recent(limit)?;

    if entries.is_empty() {
        println!("No operations recorded in {}", log.path().display());
        return Ok(());
    }

    for entry in &entries {
        println!("{}", entry.format_line());
    }
    Ok(())
}
