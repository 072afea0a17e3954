//! Two-step confirmation before a destructive restore
//!
//! The operator must type `yes`, then `RESTORE`. Anything else at either
//! prompt ends the challenge; there is no second attempt.

use crate::error::VaultResult;

use super::operator::Operator;
use super::AbortReason;

/// Token for the first prompt
pub const ACKNOWLEDGE_TOKEN: &str = "yes";
/// Token for the second prompt
pub const RESTORE_TOKEN: &str = "RESTORE";

/// Progress through the challenge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationState {
    Unconfirmed,
    FirstAck,
    FinalAck,
    Authorized,
    /// A non-matching answer was given; terminal
    Aborted,
}

impl ConfirmationState {
    /// Apply one operator answer
    ///
    /// Answers are trimmed, then compared case-sensitively. States that are
    /// not waiting for an answer ignore it.
    pub fn answer(self, input: &str) -> Self {
        let input = input.trim();
        match self {
            ConfirmationState::Unconfirmed if input == ACKNOWLEDGE_TOKEN => {
                ConfirmationState::FirstAck
            }
            ConfirmationState::FirstAck if input == RESTORE_TOKEN => ConfirmationState::FinalAck,
            ConfirmationState::Unconfirmed | ConfirmationState::FirstAck => {
                ConfirmationState::Aborted
            }
            other => other,
        }
    }

    /// Promote a completed challenge to authorization
    pub fn authorize(self) -> Self {
        match self {
            ConfirmationState::FinalAck => ConfirmationState::Authorized,
            other => other,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ConfirmationState::Authorized | ConfirmationState::Aborted
        )
    }
}

/// What the challenge decided
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    Authorized,
    Aborted(AbortReason),
}

/// Asks the operator to confirm overwriting `database` with `archive_name`
#[derive(Debug)]
pub struct ConfirmationGate<'a> {
    database: &'a str,
    archive_name: &'a str,
}

impl<'a> ConfirmationGate<'a> {
    pub fn new(database: &'a str, archive_name: &'a str) -> Self {
        Self {
            database,
            archive_name,
        }
    }

    /// Run both prompts; the second is only shown if the first matched
    pub fn challenge(&self, operator: &mut dyn Operator) -> VaultResult<GateOutcome> {
        let mut state = ConfirmationState::Unconfirmed;

        let first = operator.ask(&format!(
            "This will OVERWRITE database '{}' with {}.\nType '{}' to continue: ",
            self.database, self.archive_name, ACKNOWLEDGE_TOKEN
        ))?;
        state = state.answer(&first);
        if state == ConfirmationState::Aborted {
            return Ok(GateOutcome::Aborted(AbortReason::NotAcknowledged));
        }

        let second = operator.ask(&format!(
            "Type '{}' to start the restore: ",
            RESTORE_TOKEN
        ))?;
        state = state.answer(&second).authorize();

        match state {
            ConfirmationState::Authorized => Ok(GateOutcome::Authorized),
            _ => Ok(GateOutcome::Aborted(AbortReason::NotConfirmed)),
        }
    }
}
