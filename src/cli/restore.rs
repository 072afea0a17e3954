//! Restore CLI command

use crate::config::Settings;
use crate::environment::{self, CommandTool};
use crate::error::VaultResult;
use crate::oplog::{LogEntry, Operation, OperationLog};
use crate::restore::{Operator, RestoreOrchestrator, RestoreOutcome, TerminalOperator};
use crate::store::ArchiveStore;

/// Restore the configured database from an archive
///
/// Declining at any prompt prints the reason and returns `Ok(())`.
pub fn handle_restore(settings: &Settings, selector: Option<&str>) -> VaultResult<()> {
    let mut operator = TerminalOperator;
    handle_restore_with(settings, selector, &mut operator)
}

/// [`handle_restore`] with a caller-supplied operator
pub fn handle_restore_with(
    settings: &Settings,
    selector: Option<&str>,
    operator: &mut dyn Operator,
) -> VaultResult<()> {
    let log = OperationLog::new(settings.log_file.clone());
    let store = ArchiveStore::new(settings.backup_dir.clone());

    let environment = environment::resolve(settings).map_err(|e| {
        log.record(&LogEntry::error(Operation::Restore, e.to_string()));
        e
    })?;
    let tool = CommandTool::new(environment, settings.database.clone());

    let outcome = RestoreOrchestrator::new(&store, &tool, &log).run(
        &settings.database.name,
        selector,
        operator,
    )?;

    match outcome {
        RestoreOutcome::Completed(report) => {
            operator.notify(&format!(
                "Restored '{}' from {}",
                settings.database.name,
                report.archive.file_name()
            ));
            if let Some(safety) = &report.safety_archive {
                operator.notify(&format!("Previous state saved as {}", safety.file_name()));
            }
        }
        RestoreOutcome::Aborted { reason, .. } => {
            operator.notify(&format!("Aborted: {}. Nothing was changed.", reason));
        }
    }

    Ok(())
}
