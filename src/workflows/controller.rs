use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use super::actors::{ActorNames, ActorOutcome};
use super::directive::{CompletionReason, Directive, ExecutionRequest, TransitionResult, WorkflowStatus};
use super::engine::WorkflowEngine;
use super::errors::WorkflowError;
use super::persistence::{
    ControllerMetadata, FileSystemStore, PersistedWorkflow, PersistenceError, PersistenceStore,
    SCHEMA_VERSION,
};
use super::types::{TriggerPayload, WorkflowState, WorkflowTrigger};
use crate::config::DraftflowConfig;

const APPROVE_RESPONSES: [&str; 4] = ["yes", "y", "approve", "accept"];
const REJECT_RESPONSES: [&str; 4] = ["no", "n", "reject", "decline"];

/// Normalize free-text human input into an approval trigger
pub fn parse_user_response(text: &str) -> Option<WorkflowTrigger> {
    let normalized = text.trim().to_lowercase();
    if APPROVE_RESPONSES.contains(&normalized.as_str()) {
        Some(WorkflowTrigger::UserApproves)
    } else if REJECT_RESPONSES.contains(&normalized.as_str()) {
        Some(WorkflowTrigger::UserRejects)
    } else {
        None
    }
}

/// Engine status plus controller details
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerStatus {
    pub workflow_id: String,
    #[serde(flatten)]
    pub workflow: WorkflowStatus,
    pub controller_ready: bool,
    pub actors: Vec<String>,
}

/// Adapts engine directives into actor invocations and human prompts, and
/// owns the save/load lifecycle of one workflow instance.
pub struct WorkflowController {
    engine: WorkflowEngine,
    actors: ActorNames,
    store: Arc<dyn PersistenceStore>,
    state_key: String,
}

impl WorkflowController {
    pub fn new(
        engine: WorkflowEngine,
        actors: ActorNames,
        store: Arc<dyn PersistenceStore>,
        state_key: impl Into<String>,
    ) -> Self {
        Self {
            engine,
            actors,
            store,
            state_key: state_key.into(),
        }
    }

    /// Build a controller backed by the file store in the configured state directory
    pub fn from_config(config: &DraftflowConfig) -> Self {
        let workflow = &config.workflow;
        let engine = WorkflowEngine::new(workflow.settings()).with_id(workflow.state_key.clone());
        let store = Arc::new(FileSystemStore::new(workflow.state_dir.clone()));
        Self::new(engine, workflow.actors.clone(), store, workflow.state_key.clone())
    }

    pub fn engine(&self) -> &WorkflowEngine {
        &self.engine
    }

    pub fn actors(&self) -> &ActorNames {
        &self.actors
    }

    pub fn state_key(&self) -> &str {
        &self.state_key
    }

    pub fn start_workflow(&mut self, input: &str, target_path: Option<&str>) -> TransitionResult {
        let payload = TriggerPayload::new()
            .with("input", input)
            .with_opt("target_path", target_path);
        self.engine.transition(WorkflowTrigger::RequestContent, payload)
    }

    /// Send a completed workflow back to the writer with new instructions
    pub fn request_new_changes(&mut self, input: &str, target_path: Option<&str>) -> TransitionResult {
        let payload = TriggerPayload::new()
            .with("input", input)
            .with_opt("target_path", target_path);
        self.engine.transition(WorkflowTrigger::RequestNewChanges, payload)
    }

    /// Map a finished actor invocation to the trigger it stands for.
    ///
    /// The writer finishes from two states: a first draft in `Writing` and a
    /// revision in `Revising`. The reviewer always reports feedback.
    pub fn handle_actor_completion(
        &mut self,
        actor: &str,
        outcome: &ActorOutcome,
    ) -> Result<TransitionResult, WorkflowError> {
        if actor == self.actors.writer {
            let trigger = match self.engine.current_state() {
                WorkflowState::Revising => WorkflowTrigger::RevisionComplete,
                _ => WorkflowTrigger::DraftComplete,
            };
            let payload =
                TriggerPayload::new().with_opt("target_path", outcome.target_path.as_deref());
            Ok(self.engine.transition(trigger, payload))
        } else if actor == self.actors.reviewer {
            let payload = TriggerPayload::new()
                .with("feedback", outcome.feedback.clone().unwrap_or_default());
            Ok(self.engine.transition(WorkflowTrigger::FeedbackReady, payload))
        } else {
            warn!(actor = %actor, known = ?self.actors.all(), "Completion from unknown actor");
            Err(WorkflowError::UnknownActor {
                actor: actor.to_string(),
            })
        }
    }

    /// Unrecognized responses leave the engine untouched
    pub fn handle_user_response(&mut self, text: &str) -> Result<TransitionResult, WorkflowError> {
        match parse_user_response(text) {
            Some(trigger) => Ok(self.engine.transition(trigger, TriggerPayload::new())),
            None => Err(WorkflowError::InvalidUserResponse {
                input: text.to_string(),
            }),
        }
    }

    pub fn reset_workflow(&mut self) -> TransitionResult {
        self.engine.transition(WorkflowTrigger::Reset, TriggerPayload::new())
    }

    pub fn handle_timeout(&mut self) -> TransitionResult {
        self.engine.transition(WorkflowTrigger::Timeout, TriggerPayload::new())
    }

    /// Report a failure observed outside the engine, e.g. an actor crash
    pub fn report_error(&mut self, error: &str) -> TransitionResult {
        let payload = TriggerPayload::new().with("error", error);
        self.engine.transition(WorkflowTrigger::ErrorOccurred, payload)
    }

    /// Package a directive into a side-effect request. Performs no invocation.
    pub fn execute_directive(&self, directive: &Directive) -> ExecutionRequest {
        match directive {
            Directive::InvokeWriter { input, target_path } => ExecutionRequest::ActorInvoked {
                actor: self.actors.writer.clone(),
                command: format!("@{} {}", self.actors.writer, input).trim_end().to_string(),
                target_path: target_path.clone(),
                iteration: None,
                message: format!("{} has been invoked", self.actors.writer),
            },
            Directive::InvokeReviewer { target_path, message } => ExecutionRequest::ActorInvoked {
                actor: self.actors.reviewer.clone(),
                command: format!("@{} {}", self.actors.reviewer, message),
                target_path: target_path.clone(),
                iteration: None,
                message: format!("{} has been invoked", self.actors.reviewer),
            },
            Directive::InvokeWriterRevision {
                feedback,
                iteration,
                target_path,
            } => ExecutionRequest::ActorInvoked {
                actor: self.actors.writer.clone(),
                command: format!(
                    "@{} Please implement the following reviewer feedback for {}:\n{}",
                    self.actors.writer,
                    target_path.as_deref().unwrap_or("the draft"),
                    feedback
                ),
                target_path: target_path.clone(),
                iteration: Some(*iteration),
                message: format!(
                    "{} implementing feedback (iteration {})",
                    self.actors.writer, iteration
                ),
            },
            Directive::RequestApproval {
                feedback,
                timeout_minutes,
                message,
            } => ExecutionRequest::AwaitingUserInput {
                message: message.clone(),
                feedback: feedback.clone(),
                timeout_minutes: *timeout_minutes,
                prompt: format!(
                    "Would you like to implement these improvements? (yes/no) \
                     Completes automatically after {timeout_minutes} minutes."
                ),
            },
            Directive::WorkflowComplete {
                reason,
                iterations,
                target_path,
                message,
            } => {
                let message = match reason {
                    CompletionReason::UserRejected => message.clone(),
                    CompletionReason::TimedOut => format!("{message} (approval timed out)"),
                    CompletionReason::IterationLimit => {
                        format!("{message} (iteration limit of {iterations} reached)")
                    }
                };
                ExecutionRequest::WorkflowComplete {
                    message,
                    iterations: *iterations,
                    target_path: target_path.clone(),
                    next_actions: vec![WorkflowTrigger::Reset, WorkflowTrigger::RequestNewChanges],
                }
            }
            Directive::WorkflowReset { message, .. } => ExecutionRequest::WorkflowReset {
                message: message.clone(),
                ready_for: "new_content_request".to_string(),
            },
            Directive::ErrorOccurred {
                error,
                message,
                recovery_options,
            } => ExecutionRequest::Error {
                error: error.clone(),
                message: message.clone(),
                recovery_options: recovery_options.clone(),
            },
        }
    }

    /// Like `execute_directive`, with rejected transitions mapped to an error request
    pub fn execute_result(&self, result: &TransitionResult) -> ExecutionRequest {
        match result {
            TransitionResult::Applied { directive, .. } => self.execute_directive(directive),
            TransitionResult::Rejected {
                state,
                attempted,
                error,
                valid_triggers,
            } => ExecutionRequest::Error {
                error: error.to_string(),
                message: format!("Cannot apply {attempted} while {state}"),
                recovery_options: valid_triggers.clone(),
            },
        }
    }

    pub fn status(&self) -> ControllerStatus {
        ControllerStatus {
            workflow_id: self.engine.id().to_string(),
            workflow: self.engine.status(),
            controller_ready: true,
            actors: self.actors.all(),
        }
    }

    /// Persist the full context plus controller metadata under this
    /// controller's key. On failure the workflow carries on in memory.
    pub async fn save_state(&self) -> Result<(), PersistenceError> {
        let record = PersistedWorkflow {
            context: self.engine.context().clone(),
            metadata: Some(ControllerMetadata::new(self.actors.all(), self.engine.now())),
        };
        self.store.write(&self.state_key, &record).await
    }

    /// Restore the context saved under this controller's key.
    ///
    /// `Ok(false)` means nothing was saved. A record that cannot be read or
    /// breaks the context limits is an error and leaves the engine untouched.
    pub async fn load_state(&mut self) -> Result<bool, PersistenceError> {
        let record = match self.store.read(&self.state_key).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                info!(key = %self.state_key, "No saved workflow state");
                return Ok(false);
            }
            Err(e) => {
                warn!(key = %self.state_key, error = %e, "Failed to load workflow state");
                return Err(e);
            }
        };

        if let Err(reason) = record.context.validate() {
            warn!(key = %self.state_key, reason = %reason, "Rejected saved workflow state");
            return Err(PersistenceError::InvalidRecord {
                key: self.state_key.clone(),
                reason,
            });
        }

        if let Some(metadata) = &record.metadata {
            if metadata.schema_version != SCHEMA_VERSION {
                warn!(
                    expected = SCHEMA_VERSION,
                    found = %metadata.schema_version,
                    "Workflow state written by a different schema version"
                );
            }
        }

        self.engine.restore(record.context);
        Ok(true)
    }
}
