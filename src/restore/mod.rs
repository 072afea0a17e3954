//! Restore orchestration
//!
//! A restore replaces the live database with the contents of an archive, so
//! it is guarded at every step:
//!
//! 1. the archive is resolved against a single listing snapshot
//! 2. its gzip envelope is verified
//! 3. the operator passes a two-token [`ConfirmationGate`]
//! 4. a pre-restore safety archive of the current database is taken
//! 5. only then is the archive streamed into the restore primitive
//!
//! Declining at any prompt yields [`RestoreOutcome::Aborted`], which is a
//! normal result rather than an error.

mod gate;
mod operator;
mod orchestrator;

pub use gate::{
    ConfirmationGate, ConfirmationState, GateOutcome, ACKNOWLEDGE_TOKEN, RESTORE_TOKEN,
};
pub use operator::{Operator, TerminalOperator};
pub use orchestrator::{
    AbortReason, RestoreOrchestrator, RestoreOutcome, RestoreReport, RestoreState,
};
