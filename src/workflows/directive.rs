use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::WorkflowError;
use super::types::{WorkflowState, WorkflowTrigger};

/// Why a workflow reached `Complete`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionReason {
    UserRejected,
    TimedOut,
    IterationLimit,
}

/// Instruction returned by the engine describing the side effect to request next
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum Directive {
    InvokeWriter {
        input: String,
        target_path: Option<String>,
    },
    InvokeReviewer {
        target_path: Option<String>,
        message: String,
    },
    InvokeWriterRevision {
        feedback: String,
        iteration: u32,
        target_path: Option<String>,
    },
    RequestApproval {
        feedback: String,
        timeout_minutes: u32,
        message: String,
    },
    WorkflowComplete {
        reason: CompletionReason,
        iterations: u32,
        target_path: Option<String>,
        message: String,
    },
    WorkflowReset {
        previous_iterations: u32,
        previous_completed: bool,
        message: String,
    },
    ErrorOccurred {
        error: String,
        message: String,
        recovery_options: Vec<WorkflowTrigger>,
    },
}

impl Directive {
    /// The directive's action tag, e.g. `invoke-writer`
    pub fn action(&self) -> &'static str {
        match self {
            Directive::InvokeWriter { .. } => "invoke-writer",
            Directive::InvokeReviewer { .. } => "invoke-reviewer",
            Directive::InvokeWriterRevision { .. } => "invoke-writer-revision",
            Directive::RequestApproval { .. } => "request-approval",
            Directive::WorkflowComplete { .. } => "workflow-complete",
            Directive::WorkflowReset { .. } => "workflow-reset",
            Directive::ErrorOccurred { .. } => "error-occurred",
        }
    }
}

/// Outcome of a single call to `WorkflowEngine::transition`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum TransitionResult {
    Applied {
        old_state: WorkflowState,
        new_state: WorkflowState,
        directive: Directive,
    },
    Rejected {
        state: WorkflowState,
        attempted: WorkflowTrigger,
        error: WorkflowError,
        valid_triggers: Vec<WorkflowTrigger>,
    },
}

impl TransitionResult {
    pub fn is_error(&self) -> bool {
        matches!(self, TransitionResult::Rejected { .. })
    }

    pub fn directive(&self) -> Option<&Directive> {
        match self {
            TransitionResult::Applied { directive, .. } => Some(directive),
            TransitionResult::Rejected { .. } => None,
        }
    }

    /// State the workflow is in after this result
    pub fn state(&self) -> WorkflowState {
        match self {
            TransitionResult::Applied { new_state, .. } => *new_state,
            TransitionResult::Rejected { state, .. } => *state,
        }
    }

    /// Action tag, `error` for rejected transitions
    pub fn action(&self) -> &'static str {
        match self {
            TransitionResult::Applied { directive, .. } => directive.action(),
            TransitionResult::Rejected { .. } => "error",
        }
    }
}

/// Point-in-time view of a workflow for status displays and polling
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowStatus {
    pub state: WorkflowState,
    pub target_path: Option<String>,
    pub iterations: u32,
    pub max_iterations: u32,
    pub created_at: DateTime<Utc>,
    pub last_transition_at: DateTime<Utc>,
    pub valid_triggers: Vec<WorkflowTrigger>,
    pub recent_history: Vec<String>,
    pub timed_out: bool,
    pub error_message: Option<String>,
}

/// Concrete side-effect descriptor produced from a directive.
/// Describes an invocation or prompt; never performs one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExecutionRequest {
    ActorInvoked {
        actor: String,
        command: String,
        target_path: Option<String>,
        iteration: Option<u32>,
        message: String,
    },
    AwaitingUserInput {
        message: String,
        feedback: String,
        timeout_minutes: u32,
        prompt: String,
    },
    WorkflowComplete {
        message: String,
        iterations: u32,
        target_path: Option<String>,
        next_actions: Vec<WorkflowTrigger>,
    },
    WorkflowReset {
        message: String,
        ready_for: String,
    },
    Error {
        error: String,
        message: String,
        recovery_options: Vec<WorkflowTrigger>,
    },
}
