use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use super::errors::WorkflowError;

/// States of the writer/reviewer workflow. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    Idle,
    Writing,
    Reviewing,
    PendingUser,
    Revising,
    Complete,
    Error,
}

impl WorkflowState {
    pub const ALL: [WorkflowState; 7] = [
        WorkflowState::Idle,
        WorkflowState::Writing,
        WorkflowState::Reviewing,
        WorkflowState::PendingUser,
        WorkflowState::Revising,
        WorkflowState::Complete,
        WorkflowState::Error,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowState::Idle => "idle",
            WorkflowState::Writing => "writing",
            WorkflowState::Reviewing => "reviewing",
            WorkflowState::PendingUser => "pending_user",
            WorkflowState::Revising => "revising",
            WorkflowState::Complete => "complete",
            WorkflowState::Error => "error",
        }
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// External events fed into the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowTrigger {
    RequestContent,
    DraftComplete,
    FeedbackReady,
    UserApproves,
    UserRejects,
    RevisionComplete,
    Reset,
    RequestNewChanges,
    Timeout,
    ErrorOccurred,
}

impl WorkflowTrigger {
    pub const ALL: [WorkflowTrigger; 10] = [
        WorkflowTrigger::RequestContent,
        WorkflowTrigger::DraftComplete,
        WorkflowTrigger::FeedbackReady,
        WorkflowTrigger::UserApproves,
        WorkflowTrigger::UserRejects,
        WorkflowTrigger::RevisionComplete,
        WorkflowTrigger::Reset,
        WorkflowTrigger::RequestNewChanges,
        WorkflowTrigger::Timeout,
        WorkflowTrigger::ErrorOccurred,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowTrigger::RequestContent => "request_content",
            WorkflowTrigger::DraftComplete => "draft_complete",
            WorkflowTrigger::FeedbackReady => "feedback_ready",
            WorkflowTrigger::UserApproves => "user_approves",
            WorkflowTrigger::UserRejects => "user_rejects",
            WorkflowTrigger::RevisionComplete => "revision_complete",
            WorkflowTrigger::Reset => "reset",
            WorkflowTrigger::RequestNewChanges => "request_new_changes",
            WorkflowTrigger::Timeout => "timeout",
            WorkflowTrigger::ErrorOccurred => "error_occurred",
        }
    }
}

impl fmt::Display for WorkflowTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Limits applied to every fresh context, on construction and on reset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowSettings {
    pub max_iterations: u32,
    pub timeout_minutes: u32,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            max_iterations: 5,
            timeout_minutes: 30,
        }
    }
}

/// The mutable record owned by the engine. Persisted field-for-field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowContext {
    pub state: WorkflowState,
    pub target_path: Option<String>,
    pub iteration_count: u32,
    pub last_feedback: Option<String>,
    pub satisfied: bool,
    pub max_iterations: u32,
    pub timeout_minutes: u32,
    pub created_at: DateTime<Utc>,
    pub last_transition_at: DateTime<Utc>,
    pub error_message: Option<String>,
    pub history: Vec<String>,
}

impl WorkflowContext {
    pub fn new(settings: WorkflowSettings, now: DateTime<Utc>) -> Self {
        Self {
            state: WorkflowState::Idle,
            target_path: None,
            iteration_count: 0,
            last_feedback: None,
            satisfied: false,
            max_iterations: settings.max_iterations.max(1),
            timeout_minutes: settings.timeout_minutes.max(1),
            created_at: now,
            last_transition_at: now,
            error_message: None,
            history: Vec::new(),
        }
    }

    /// Check the limits a context read from storage must satisfy
    pub fn validate(&self) -> Result<(), String> {
        if self.max_iterations == 0 {
            return Err("max_iterations must be greater than 0".to_string());
        }
        if self.timeout_minutes == 0 {
            return Err("timeout_minutes must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Trigger-specific key/value data (user text, target path, feedback text)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TriggerPayload(Map<String, Value>);

impl TriggerPayload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    /// Insert `value` under `key` only when present
    pub fn with_opt(self, key: &str, value: Option<impl Into<Value>>) -> Self {
        match value {
            Some(value) => self.with(key, value),
            None => self,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Read a string field. Absent or null yields `None`; any other
    /// non-string value is a handler failure.
    pub fn text(&self, key: &str) -> Result<Option<&str>, WorkflowError> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(value)) => Ok(Some(value.as_str())),
            Some(other) => Err(WorkflowError::HandlerFailure {
                reason: format!("payload field `{key}` must be a string, got {other}"),
            }),
        }
    }

    /// Lenient read used by the error transition, which must never fail
    pub fn describe(&self, key: &str) -> Option<String> {
        match self.0.get(key) {
            None | Some(Value::Null) => None,
            Some(Value::String(value)) => Some(value.clone()),
            Some(other) => Some(other.to_string()),
        }
    }
}

impl From<Map<String, Value>> for TriggerPayload {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}
