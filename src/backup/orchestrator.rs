//! Backup orchestrator
//!
//! Drives one snapshot: dump through the executor into the store, verify
//! the published archive, then apply retention.

use std::path::Path;

use chrono::{DateTime, SubsecRound, Utc};

use crate::config::RetentionPolicy;
use crate::environment::DatabaseTool;
use crate::error::{VaultError, VaultResult};
use crate::oplog::{LogEntry, Operation, OperationLog};
use crate::store::{Archive, ArchiveKind, ArchiveStore, PruneReport};

/// Result of a successful backup run
#[derive(Debug, Clone)]
pub struct BackupReport {
    /// The verified archive that was published
    pub archive: Archive,
    /// Archives removed by the retention pass that followed
    pub pruned: PruneReport,
}

impl BackupReport {
    pub fn path(&self) -> &Path {
        &self.archive.path
    }

    pub fn size_bytes(&self) -> u64 {
        self.archive.size_bytes
    }

    pub fn pruned_count(&self) -> usize {
        self.pruned.count()
    }
}

/// Takes verified snapshots of a database into an [`ArchiveStore`]
pub struct BackupOrchestrator<'a> {
    store: &'a ArchiveStore,
    tool: &'a dyn DatabaseTool,
    log: &'a OperationLog,
}

impl<'a> BackupOrchestrator<'a> {
    pub fn new(store: &'a ArchiveStore, tool: &'a dyn DatabaseTool, log: &'a OperationLog) -> Self {
        Self { store, tool, log }
    }

    /// Take a primary backup and prune expired primary archives
    pub fn run(&self, database: &str, retention: &RetentionPolicy) -> VaultResult<BackupReport> {
        self.run_at(database, retention, Utc::now())
    }

    /// [`run`](Self::run) with an explicit clock
    ///
    /// `now` is truncated to whole seconds, the precision of archive names,
    /// so the archive and the retention cutoff agree on when it was taken.
    pub fn run_at(
        &self,
        database: &str,
        retention: &RetentionPolicy,
        now: DateTime<Utc>,
    ) -> VaultResult<BackupReport> {
        let now = now.trunc_subsecs(0);
        let archive = self.snapshot(database, ArchiveKind::Primary, now)?;

        // The new archive is already safe; a failed retention pass only warns.
        let pruned = apply_retention(self.store, self.log, retention, now, Some(&archive.path))
            .unwrap_or_default();

        self.log.record(
            &LogEntry::info(
                Operation::Backup,
                format!(
                    "Backup of '{}' complete ({} bytes, {} pruned)",
                    database,
                    archive.size_bytes,
                    pruned.count()
                ),
            )
            .with_archive(archive.file_name()),
        );

        Ok(BackupReport { archive, pruned })
    }

    /// Take a pre-restore safety archive; no retention pass follows
    pub fn run_safety(&self, database: &str) -> VaultResult<Archive> {
        self.run_safety_at(database, Utc::now())
    }

    pub fn run_safety_at(&self, database: &str, now: DateTime<Utc>) -> VaultResult<Archive> {
        self.snapshot(database, ArchiveKind::Safety, now.trunc_subsecs(0))
    }

    /// Dump, publish and verify one archive
    ///
    /// An archive that fails verification is deleted before returning.
    fn snapshot(
        &self,
        database: &str,
        kind: ArchiveKind,
        now: DateTime<Utc>,
    ) -> VaultResult<Archive> {
        let operation = match kind {
            ArchiveKind::Primary => Operation::Backup,
            ArchiveKind::Safety => Operation::SafetyBackup,
        };

        self.log.record(&LogEntry::info(
            operation,
            format!("Dumping '{}' via {}", database, self.tool.describe()),
        ));

        let archive = match self
            .store
            .write(database, kind, now, |sink| self.tool.dump(sink))
        {
            Ok(archive) => archive,
            Err(e) => {
                self.log
                    .record(&LogEntry::error(operation, format!("Dump failed: {}", e)));
                return Err(VaultError::backup_failed(e));
            }
        };

        if let Err(e) = self.store.verify(&archive) {
            self.log.record(
                &LogEntry::error(operation, format!("Verification failed: {}", e))
                    .with_archive(archive.file_name()),
            );

            if let Err(delete_err) = self.store.delete(&archive) {
                self.log.record(
                    &LogEntry::error(
                        Operation::Delete,
                        format!("Could not remove unverified archive: {}", delete_err),
                    )
                    .with_archive(archive.file_name()),
                );
            }
            return Err(VaultError::backup_failed(e));
        }

        self.log.record(
            &LogEntry::info(operation, "Archive written and verified")
                .with_archive(archive.file_name()),
        );

        Ok(archive)
    }
}

/// Prune expired primary archives, logging each removal and failure
///
/// `keep` names an archive that survives regardless of age, normally the one
/// the calling backup just published.
pub fn apply_retention(
    store: &ArchiveStore,
    log: &OperationLog,
    retention: &RetentionPolicy,
    now: DateTime<Utc>,
    keep: Option<&Path>,
) -> VaultResult<PruneReport> {
    let report = store.prune_except(retention, now, keep).map_err(|e| {
        log.record(&LogEntry::error(
            Operation::Prune,
            format!("Retention pass failed: {}", e),
        ));
        e
    })?;

    for archive in &report.removed {
        log.record(
            &LogEntry::info(
                Operation::Prune,
                format!("Removed archive older than {} days", retention.max_age_days),
            )
            .with_archive(archive.file_name()),
        );
    }
    for (archive, reason) in &report.failed {
        log.record(
            &LogEntry::warn(Operation::Prune, format!("Could not remove: {}", reason))
                .with_archive(archive.file_name()),
        );
    }
    if !report.swept.is_empty() {
        log.record(&LogEntry::info(
            Operation::Prune,
            format!("Removed {} abandoned partial file(s)", report.swept.len()),
        ));
    }

    Ok(report)
}
