use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::types::{WorkflowState, WorkflowTrigger};

/// Errors produced by the workflow engine and controller.
///
/// None of these escape as panics: rejected transitions and unrecognized
/// input are returned as values, and handler failures are folded into the
/// `ErrorOccurred` transition by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WorkflowError {
    #[error("Invalid transition: {from} -> {trigger}")]
    InvalidTransition {
        from: WorkflowState,
        trigger: WorkflowTrigger,
        valid_triggers: Vec<WorkflowTrigger>,
    },

    #[error("Unrecognized response {input:?}: please respond with 'yes' or 'no'")]
    InvalidUserResponse { input: String },

    #[error("Unknown actor: {actor}")]
    UnknownActor { actor: String },

    #[error("Transition handler failed: {reason}")]
    HandlerFailure { reason: String },
}
