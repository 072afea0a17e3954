//! Backup CLI commands
//!
//! Implements `backup` and `prune`.

use chrono::Utc;

use crate::backup::{apply_retention, BackupOrchestrator};
use crate::config::Settings;
use crate::display::{format_prune_report, format_size};
use crate::environment::{self, CommandTool};
use crate::error::VaultResult;
use crate::oplog::{LogEntry, Operation, OperationLog};
use crate::store::{ArchiveStore, PruneReport};

/// Take a backup of the configured database, then apply retention
pub fn handle_backup(settings: &Settings, retention_days: Option<u32>) -> VaultResult<()> {
    let settings = settings.clone().with_retention_days(retention_days);
    let log = OperationLog::new(settings.log_file.clone());
    let store = ArchiveStore::new(settings.backup_dir.clone());

    let environment = environment::resolve(&settings).map_err(|e| {
        log.record(&LogEntry::error(Operation::Backup, e.to_string()));
        e
    })?;
    println!("Backing up '{}' via {}...", settings.database.name, environment);

    let tool = CommandTool::new(environment, settings.database.clone());
    let report = BackupOrchestrator::new(&store, &tool, &log)
        .run(&settings.database.name, &settings.retention)?;

    println!("Backup created: {}", report.archive.file_name());
    println!("Location: {}", report.path().display());
    println!("Size: {}", format_size(report.size_bytes()));
    if report.pruned_count() > 0 {
        println!(
            "Pruned {} archive(s) older than {} days",
            report.pruned_count(),
            settings.retention.max_age_days
        );
    }

    Ok(())
}

/// Apply retention without taking a backup
pub fn handle_prune(
    settings: &Settings,
    retention_days: Option<u32>,
    dry_run: bool,
) -> VaultResult<()> {
    let settings = settings.clone().with_retention_days(retention_days);
    let store = ArchiveStore::new(settings.backup_dir.clone());
    let now = Utc::now();

    let report = if dry_run {
        PruneReport {
            removed: store.expired_at(&settings.retention, now)?,
            ..PruneReport::default()
        }
    } else {
        let log = OperationLog::new(settings.log_file.clone());
        apply_retention(&store, &log, &settings.retention, now, None)?
    };

    println!("{}", format_prune_report(&report, dry_run));
    Ok(())
}
