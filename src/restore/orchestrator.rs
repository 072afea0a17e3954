//! Restore orchestrator
//!
//! Walks a fixed sequence of states. Each step must succeed before the next
//! is entered, and the restore primitive is only reached from `Safeguarded`.

use std::fmt;

use chrono::Utc;

use crate::backup::BackupOrchestrator;
use crate::display;
use crate::environment::DatabaseTool;
use crate::error::{VaultError, VaultResult};
use crate::oplog::{LogEntry, Operation, OperationLog};
use crate::store::{Archive, ArchiveStore};

use super::gate::{ConfirmationGate, GateOutcome, ACKNOWLEDGE_TOKEN};
use super::operator::Operator;

/// Where a restore invocation currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreState {
    Start,
    Selected,
    Verified,
    Confirmed,
    Safeguarded,
    Completed,
    Aborted,
    Failed,
}

impl RestoreState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RestoreState::Completed | RestoreState::Aborted | RestoreState::Failed
        )
    }

    /// Whether `next` directly follows `self`
    pub fn can_advance_to(self, next: RestoreState) -> bool {
        use RestoreState::*;
        match (self, next) {
            (Start, Selected)
            | (Selected, Verified)
            | (Verified, Confirmed)
            | (Confirmed, Safeguarded)
            | (Safeguarded, Completed) => true,
            (Verified, Aborted) | (Confirmed, Aborted) => true,
            (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for RestoreState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Why a restore stopped without touching the database
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    /// First confirmation prompt not answered with the acknowledgment token
    NotAcknowledged,
    /// Second confirmation prompt not answered with the restore token
    NotConfirmed,
    /// Safety backup failed and the operator would not continue without it
    SafetyOverrideDeclined,
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::NotAcknowledged => write!(f, "restore not acknowledged"),
            AbortReason::NotConfirmed => write!(f, "restore not confirmed"),
            AbortReason::SafetyOverrideDeclined => {
                write!(f, "declined to restore without a safety backup")
            }
        }
    }
}

/// A restore that ran to completion
#[derive(Debug, Clone)]
pub struct RestoreReport {
    /// The archive that was applied
    pub archive: Archive,
    /// Snapshot of the database taken just before applying
    pub safety_archive: Option<Archive>,
    /// Every state entered, in order, starting with `Start`
    pub transitions: Vec<RestoreState>,
}

/// How a restore invocation ended, short of an error
#[derive(Debug, Clone)]
pub enum RestoreOutcome {
    Completed(RestoreReport),
    Aborted {
        reason: AbortReason,
        transitions: Vec<RestoreState>,
    },
}

impl RestoreOutcome {
    pub fn transitions(&self) -> &[RestoreState] {
        match self {
            RestoreOutcome::Completed(report) => &report.transitions,
            RestoreOutcome::Aborted { transitions, .. } => transitions,
        }
    }
}

/// Records transitions and refuses any that skip a step
#[derive(Debug)]
struct Machine {
    state: RestoreState,
    transitions: Vec<RestoreState>,
}

impl Machine {
    fn new() -> Self {
        Self {
            state: RestoreState::Start,
            transitions: vec![RestoreState::Start],
        }
    }

    fn enter(&mut self, next: RestoreState) -> VaultResult<()> {
        if !self.state.can_advance_to(next) {
            return Err(VaultError::IllegalTransition {
                from: self.state.to_string(),
                to: next.to_string(),
            });
        }
        tracing::debug!(from = %self.state, to = %next, "restore transition");
        self.state = next;
        self.transitions.push(next);
        Ok(())
    }
}

/// Applies an archive to a database after verification and confirmation
pub struct RestoreOrchestrator<'a> {
    store: &'a ArchiveStore,
    tool: &'a dyn DatabaseTool,
    log: &'a OperationLog,
}

impl<'a> RestoreOrchestrator<'a> {
    pub fn new(store: &'a ArchiveStore, tool: &'a dyn DatabaseTool, log: &'a OperationLog) -> Self {
        Self { store, tool, log }
    }

    /// Restore `database` from the archive named by `selector`
    ///
    /// Without a selector the operator picks from a listing. Declining at a
    /// prompt is an `Ok(RestoreOutcome::Aborted)`, not an error.
    pub fn run(
        &self,
        database: &str,
        selector: Option<&str>,
        operator: &mut dyn Operator,
    ) -> VaultResult<RestoreOutcome> {
        let mut machine = Machine::new();
        self.log.record(&LogEntry::info(
            Operation::Restore,
            format!("Restore of '{}' requested", database),
        ));

        let result = self.drive(&mut machine, database, selector, operator);

        match &result {
            Ok(RestoreOutcome::Completed(report)) => self.log.record(
                &LogEntry::info(Operation::Restore, "Restore completed")
                    .with_archive(report.archive.file_name()),
            ),
            Ok(RestoreOutcome::Aborted { reason, .. }) => self.log.record(&LogEntry::warn(
                Operation::Restore,
                format!("Restore aborted: {}", reason),
            )),
            Err(e) => {
                let _ = machine.enter(RestoreState::Failed);
                self.log.record(&LogEntry::error(
                    Operation::Restore,
                    format!("Restore failed after {}: {}", trail(&machine.transitions), e),
                ));
            }
        }

        result
    }

    fn drive(
        &self,
        machine: &mut Machine,
        database: &str,
        selector: Option<&str>,
        operator: &mut dyn Operator,
    ) -> VaultResult<RestoreOutcome> {
        // One listing for the whole invocation so indices cannot shift.
        let snapshot = self.store.list(database)?;

        let archive = match selector {
            Some(selector) => self.store.resolve_selector(selector, &snapshot)?,
            None => {
                if snapshot.is_empty() {
                    return Err(VaultError::NotFound(format!(
                        "no archives for database '{}' in {}",
                        database,
                        self.store.root().display()
                    )));
                }
                operator.notify(&display::format_archive_list(&snapshot, Utc::now()));
                let choice = operator.ask("Select an archive (number or filename): ")?;
                self.store.resolve_selector(&choice, &snapshot)?
            }
        };
        machine.enter(RestoreState::Selected)?;

        self.store.verify(&archive)?;
        machine.enter(RestoreState::Verified)?;
        self.log.record(
            &LogEntry::info(Operation::Verify, "Archive verified before restore")
                .with_archive(archive.file_name()),
        );

        operator.notify(&display::format_restore_summary(
            &archive,
            database,
            &self.tool.describe(),
        ));
        if archive.database != database {
            operator.notify(&format!(
                "Warning: this archive was taken from database '{}'.",
                archive.database
            ));
        }

        let archive_name = archive.file_name();
        match ConfirmationGate::new(database, &archive_name).challenge(operator)? {
            GateOutcome::Authorized => machine.enter(RestoreState::Confirmed)?,
            GateOutcome::Aborted(reason) => return self.abort(machine, reason),
        }

        let safety_archive = match BackupOrchestrator::new(self.store, self.tool, self.log)
            .run_safety(database)
        {
            Ok(safety) => {
                operator.notify(&format!("Safety backup written to {}", safety.path.display()));
                Some(safety)
            }
            Err(e) => {
                operator.notify(&format!("Safety backup failed: {}", e));
                let answer = operator.ask(&format!(
                    "Restore WITHOUT a safety backup? Type '{}' to proceed: ",
                    ACKNOWLEDGE_TOKEN
                ))?;
                if answer.trim() != ACKNOWLEDGE_TOKEN {
                    return self.abort(machine, AbortReason::SafetyOverrideDeclined);
                }
                self.log.record(&LogEntry::warn(
                    Operation::Restore,
                    "Operator chose to restore without a safety backup",
                ));
                None
            }
        };
        machine.enter(RestoreState::Safeguarded)?;

        self.log.record(
            &LogEntry::info(
                Operation::Restore,
                format!("Applying archive to '{}' via {}", database, self.tool.describe()),
            )
            .with_archive(archive.file_name()),
        );

        let safety_path = safety_archive.as_ref().map(|a| a.path.clone());
        let mut source = self.store.open_decompressed(&archive)?;
        self.tool
            .restore(&mut source)
            .map_err(|e| VaultError::RestoreFailed {
                reason: Box::new(e),
                safety_archive: safety_path,
            })?;
        machine.enter(RestoreState::Completed)?;

        Ok(RestoreOutcome::Completed(RestoreReport {
            archive,
            safety_archive,
            transitions: machine.transitions.clone(),
        }))
    }

    fn abort(&self, machine: &mut Machine, reason: AbortReason) -> VaultResult<RestoreOutcome> {
        machine.enter(RestoreState::Aborted)?;
        Ok(RestoreOutcome::Aborted {
            reason,
            transitions: machine.transitions.clone(),
        })
    }
}

fn trail(states: &[RestoreState]) -> String {
    states
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ArchiveKind;
    use crate::testutil::{FakeTool, ScriptedOperator};
    use chrono::{DateTime, Duration, TimeZone};
    use proptest::prelude::*;
    use tempfile::TempDir;

    use super::RestoreState::*;

    struct Fixture {
        _temp: TempDir,
        store: ArchiveStore,
        log: OperationLog,
    }

    fn fixture() -> Fixture {
        let temp = TempDir::new().unwrap();
        let store = ArchiveStore::new(temp.path().join("backups"));
        let log = OperationLog::new(temp.path().join("backups").join("backup.log"));
        Fixture {
            _temp: temp,
            store,
            log,
        }
    }

    fn seeded_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn seed(fx: &Fixture, sql: &[u8], at: DateTime<Utc>) -> Archive {
        let mut source = sql;
        fx.store
            .write_stream("app", ArchiveKind::Primary, at, &mut source)
            .unwrap()
    }

    fn archive_files(fx: &Fixture) -> Vec<String> {
        let mut names: Vec<_> = fx
            .store
            .list_all()
            .unwrap()
            .into_iter()
            .map(|a| a.file_name())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_restore_completes_with_both_tokens() {
        let fx = fixture();
        let archive = seed(&fx, b"INSERT INTO t VALUES (42);\n", seeded_at());
        let tool = FakeTool::default();
        let mut operator = ScriptedOperator::new(["yes", "RESTORE"]);

        let outcome = RestoreOrchestrator::new(&fx.store, &tool, &fx.log)
            .run("app", Some(&archive.file_name()), &mut operator)
            .unwrap();

        let report = match outcome {
            RestoreOutcome::Completed(report) => report,
            other => panic!("expected completion, got {:?}", other),
        };
        assert_eq!(report.archive, archive);
        assert_eq!(
            report.transitions,
            vec![Start, Selected, Verified, Confirmed, Safeguarded, Completed]
        );
        assert_eq!(
            tool.restored.borrow().as_slice(),
            &[b"INSERT INTO t VALUES (42);\n".to_vec()]
        );

        let safety = report.safety_archive.unwrap();
        assert_eq!(safety.kind, ArchiveKind::Safety);
        assert!(safety.path.exists());
    }

    #[test]
    fn test_unknown_selector_fails_before_any_prompt() {
        let fx = fixture();
        seed(&fx, b"SELECT 1;\n", seeded_at());
        let tool = FakeTool::default();
        let mut operator = ScriptedOperator::new(["yes", "RESTORE"]);

        let err = RestoreOrchestrator::new(&fx.store, &tool, &fx.log)
            .run("app", Some("backup_app_19990101_000000.sql.gz"), &mut operator)
            .unwrap_err();

        assert!(err.is_not_found());
        assert!(operator.prompts.is_empty());
        assert_eq!(tool.dump_calls.get(), 0);
        assert_eq!(tool.restore_calls(), 0);
    }

    #[test]
    fn test_declining_final_token_aborts_without_side_effects() {
        let fx = fixture();
        let archive = seed(&fx, b"SELECT 1;\n", seeded_at());
        let before = archive_files(&fx);
        let tool = FakeTool::default();
        let mut operator = ScriptedOperator::new(["yes", "restore please"]);

        let outcome = RestoreOrchestrator::new(&fx.store, &tool, &fx.log)
            .run("app", Some(&archive.file_name()), &mut operator)
            .unwrap();

        match &outcome {
            RestoreOutcome::Aborted { reason, .. } => {
                assert_eq!(*reason, AbortReason::NotConfirmed)
            }
            other => panic!("expected abort, got {:?}", other),
        }
        assert_eq!(outcome.transitions(), &[Start, Selected, Verified, Aborted]);
        assert_eq!(archive_files(&fx), before);
        assert_eq!(tool.dump_calls.get(), 0);
        assert_eq!(tool.restore_calls(), 0);
    }

    #[test]
    fn test_declined_safety_override_leaves_database_untouched() {
        let fx = fixture();
        let archive = seed(&fx, b"SELECT 1;\n", seeded_at());
        let tool = FakeTool::failing_dump();
        let mut operator = ScriptedOperator::new(["yes", "RESTORE", "no"]);

        let outcome = RestoreOrchestrator::new(&fx.store, &tool, &fx.log)
            .run("app", Some(&archive.file_name()), &mut operator)
            .unwrap();

        match &outcome {
            RestoreOutcome::Aborted { reason, .. } => {
                assert_eq!(*reason, AbortReason::SafetyOverrideDeclined)
            }
            other => panic!("expected abort, got {:?}", other),
        }
        assert_eq!(
            outcome.transitions(),
            &[Start, Selected, Verified, Confirmed, Aborted]
        );
        assert_eq!(operator.prompts.len(), 3);
        assert_eq!(tool.restore_calls(), 0);
        assert_eq!(archive_files(&fx), vec![archive.file_name()]);
    }

    #[test]
    fn test_safety_override_accepted_restores_without_net() {
        let fx = fixture();
        let archive = seed(&fx, b"SELECT 1;\n", seeded_at());
        let tool = FakeTool::failing_dump();
        let mut operator = ScriptedOperator::new(["yes", "RESTORE", "yes"]);

        let outcome = RestoreOrchestrator::new(&fx.store, &tool, &fx.log)
            .run("app", Some(&archive.file_name()), &mut operator)
            .unwrap();

        match outcome {
            RestoreOutcome::Completed(report) => assert!(report.safety_archive.is_none()),
            other => panic!("expected completion, got {:?}", other),
        }
        assert_eq!(tool.restore_calls(), 1);
    }

    #[test]
    fn test_corrupt_archive_never_reaches_restore() {
        let fx = fixture();
        let archive = seed(&fx, b"SELECT 1;\n", seeded_at());
        let bytes = std::fs::read(&archive.path).unwrap();
        std::fs::write(&archive.path, &bytes[..bytes.len() / 2]).unwrap();

        let tool = FakeTool::default();
        let mut operator = ScriptedOperator::new(["yes", "RESTORE"]);

        let err = RestoreOrchestrator::new(&fx.store, &tool, &fx.log)
            .run("app", Some(&archive.file_name()), &mut operator)
            .unwrap_err();

        assert!(matches!(err, VaultError::CorruptArchive { .. }));
        assert!(operator.prompts.is_empty());
        assert_eq!(tool.restore_calls(), 0);
    }

    #[test]
    fn test_failed_apply_keeps_safety_archive() {
        let fx = fixture();
        let archive = seed(&fx, b"SELECT 1;\n", seeded_at());
        let tool = FakeTool::failing_restore();
        let mut operator = ScriptedOperator::new(["yes", "RESTORE"]);

        let err = RestoreOrchestrator::new(&fx.store, &tool, &fx.log)
            .run("app", Some(&archive.file_name()), &mut operator)
            .unwrap_err();

        match err {
            VaultError::RestoreFailed {
                reason,
                safety_archive,
            } => {
                assert!(matches!(*reason, VaultError::PrimitiveFailed { .. }));
                assert!(safety_archive.unwrap().exists());
            }
            other => panic!("expected RestoreFailed, got {:?}", other),
        }

        let last = fx.log.read_all().unwrap().pop().unwrap();
        assert!(last.message.contains("Failed"));
    }

    #[test]
    fn test_interactive_selection_by_index() {
        let fx = fixture();
        let older = seed(&fx, b"-- older\n", seeded_at() - Duration::days(2));
        seed(&fx, b"-- newer\n", seeded_at());
        let tool = FakeTool::default();
        let mut operator = ScriptedOperator::new(["2", "yes", "RESTORE"]);

        let outcome = RestoreOrchestrator::new(&fx.store, &tool, &fx.log)
            .run("app", None, &mut operator)
            .unwrap();

        match outcome {
            RestoreOutcome::Completed(report) => assert_eq!(report.archive, older),
            other => panic!("expected completion, got {:?}", other),
        }
        assert!(operator.notices[0].contains(&older.file_name()));
        assert_eq!(tool.restored.borrow()[0], b"-- older\n");
    }

    #[test]
    fn test_interactive_selection_with_empty_store() {
        let fx = fixture();
        let tool = FakeTool::default();
        let mut operator = ScriptedOperator::new(["1"]);

        let err = RestoreOrchestrator::new(&fx.store, &tool, &fx.log)
            .run("app", None, &mut operator)
            .unwrap_err();

        assert!(err.is_not_found());
        assert!(operator.prompts.is_empty());
    }

    #[test]
    fn test_machine_rejects_skipped_step() {
        let mut machine = Machine::new();
        let err = machine.enter(Confirmed).unwrap_err();

        match err {
            VaultError::IllegalTransition { from, to } => {
                assert_eq!(from, "Start");
                assert_eq!(to, "Confirmed");
            }
            other => panic!("expected IllegalTransition, got {:?}", other),
        }
        assert_eq!(machine.transitions, vec![Start]);

        machine.enter(Selected).unwrap();
        machine.enter(Failed).unwrap();
        assert!(matches!(
            machine.enter(Failed),
            Err(VaultError::IllegalTransition { .. })
        ));
    }

    #[test]
    fn test_transitions_never_skip() {
        assert!(Start.can_advance_to(Selected));
        assert!(!Start.can_advance_to(Verified));
        assert!(!Selected.can_advance_to(Confirmed));
        assert!(!Verified.can_advance_to(Safeguarded));
        assert!(!Confirmed.can_advance_to(Completed));
        assert!(!Start.can_advance_to(Aborted));
        assert!(Safeguarded.can_advance_to(Failed));
        assert!(!Completed.can_advance_to(Failed));
        assert!(!Aborted.can_advance_to(Start));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_unconfirmed_restore_never_applies(
            first in ".*",
            second in ".*",
            wrong_second in any::<bool>(),
        ) {
            let (first, second) = if wrong_second {
                ("yes".to_string(), second)
            } else {
                (first, "RESTORE".to_string())
            };
            prop_assume!(first.trim() != "yes" || second.trim() != "RESTORE");

            let fx = fixture();
            let archive = seed(&fx, b"SELECT 1;\n", seeded_at());
            let tool = FakeTool::default();
            let mut operator = ScriptedOperator::new([first, second]);

            let outcome = RestoreOrchestrator::new(&fx.store, &tool, &fx.log)
                .run("app", Some(&archive.file_name()), &mut operator)
                .unwrap();

            let aborted = matches!(outcome, RestoreOutcome::Aborted { .. });
            prop_assert!(aborted);
            prop_assert_eq!(tool.restore_calls(), 0);
            prop_assert_eq!(tool.dump_calls.get(), 0);
        }
    }
}
