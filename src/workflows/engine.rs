use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::clock::{Clock, SystemClock};
use super::directive::{CompletionReason, Directive, TransitionResult, WorkflowStatus};
use super::errors::WorkflowError;
use super::types::{
    TriggerPayload, WorkflowContext, WorkflowSettings, WorkflowState, WorkflowTrigger,
};
use crate::telemetry::create_workflow_span;

/// Feedback placed in front of the user after the writer finishes a revision
pub const REVISION_READY_FEEDBACK: &str = "Revisions completed. Ready for review.";

/// Number of history entries included in a status snapshot
const STATUS_HISTORY_LEN: usize = 5;

type TransitionHandler =
    fn(&mut WorkflowEngine, &TriggerPayload) -> Result<Directive, WorkflowError>;

/// Legal transitions keyed by (state, trigger). `ErrorOccurred` is not listed:
/// it is accepted from every state as a fallback in `WorkflowEngine::lookup`.
fn transition_table() -> HashMap<(WorkflowState, WorkflowTrigger), TransitionHandler> {
    use WorkflowState as S;
    use WorkflowTrigger as T;

    let entries: [((WorkflowState, WorkflowTrigger), TransitionHandler); 10] = [
        ((S::Idle, T::RequestContent), WorkflowEngine::start_writing),
        ((S::Writing, T::DraftComplete), WorkflowEngine::start_review),
        ((S::Reviewing, T::FeedbackReady), WorkflowEngine::await_approval),
        ((S::PendingUser, T::UserApproves), WorkflowEngine::start_revision),
        ((S::PendingUser, T::UserRejects), WorkflowEngine::complete_rejected),
        ((S::PendingUser, T::Timeout), WorkflowEngine::complete_timed_out),
        ((S::Revising, T::RevisionComplete), WorkflowEngine::check_iteration_limit),
        ((S::Complete, T::Reset), WorkflowEngine::reset_to_idle),
        ((S::Complete, T::RequestNewChanges), WorkflowEngine::start_writing),
        ((S::Error, T::Reset), WorkflowEngine::reset_to_idle),
    ];

    entries.into_iter().collect()
}

/// Finite state machine for the writer/reviewer workflow.
///
/// Owns the authoritative `WorkflowContext`. Every call to `transition`
/// returns a well-formed `TransitionResult`; nothing is raised to the caller.
pub struct WorkflowEngine {
    id: String,
    context: WorkflowContext,
    settings: WorkflowSettings,
    transitions: HashMap<(WorkflowState, WorkflowTrigger), TransitionHandler>,
    clock: Arc<dyn Clock>,
    span: tracing::Span,
}

impl std::fmt::Debug for WorkflowEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowEngine")
            .field("id", &self.id)
            .field("context", &self.context)
            .field("settings", &self.settings)
            .field("clock", &self.clock)
            .finish()
    }
}

impl Default for WorkflowEngine {
    fn default() -> Self {
        Self::new(WorkflowSettings::default())
    }
}

impl WorkflowEngine {
    pub fn new(settings: WorkflowSettings) -> Self {
        let id = Uuid::new_v4().to_string();
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        Self {
            span: create_workflow_span(&id),
            context: WorkflowContext::new(settings, clock.now()),
            id,
            settings,
            transitions: transition_table(),
            clock,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self.span = create_workflow_span(&self.id);
        self
    }

    /// Swap the time source. The context is re-seeded from the new clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.context = WorkflowContext::new(self.settings, clock.now());
        self.clock = clock;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn settings(&self) -> WorkflowSettings {
        self.settings
    }

    pub fn context(&self) -> &WorkflowContext {
        &self.context
    }

    pub fn current_state(&self) -> WorkflowState {
        self.context.state
    }

    /// Current time according to the engine's clock
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Replace the context wholesale, e.g. with one loaded from storage
    pub fn restore(&mut self, context: WorkflowContext) {
        let _entered = self.span.enter();
        info!(
            state = %context.state,
            iterations = context.iteration_count,
            history_len = context.history.len(),
            "Restored workflow context"
        );
        self.context = context;
    }

    fn lookup(&self, state: WorkflowState, trigger: WorkflowTrigger) -> Option<TransitionHandler> {
        self.transitions.get(&(state, trigger)).copied().or_else(|| {
            (trigger == WorkflowTrigger::ErrorOccurred)
                .then_some(WorkflowEngine::handle_error as TransitionHandler)
        })
    }

    pub fn can_transition(&self, trigger: WorkflowTrigger) -> bool {
        self.lookup(self.context.state, trigger).is_some()
    }

    pub fn valid_triggers(&self) -> Vec<WorkflowTrigger> {
        WorkflowTrigger::ALL
            .into_iter()
            .filter(|trigger| self.can_transition(*trigger))
            .collect()
    }

    /// True when the workflow has waited on the user longer than allowed
    pub fn is_timed_out(&self) -> bool {
        if self.context.state != WorkflowState::PendingUser {
            return false;
        }
        let waited = self.clock.now() - self.context.last_transition_at;
        waited > Duration::minutes(i64::from(self.context.timeout_minutes))
    }

    /// Time left before a pending approval times out
    pub fn time_remaining(&self) -> Option<Duration> {
        if self.context.state != WorkflowState::PendingUser {
            return None;
        }
        let deadline = self.context.last_transition_at
            + Duration::minutes(i64::from(self.context.timeout_minutes));
        Some((deadline - self.clock.now()).max(Duration::zero()))
    }

    /// Execute a state transition.
    ///
    /// A stale approval wait is completed through `Timeout` before anything
    /// else is considered; the caller's trigger is then dropped and must be
    /// re-submitted.
    pub fn transition(&mut self, trigger: WorkflowTrigger, payload: TriggerPayload) -> TransitionResult {
        let span = self.span.clone();
        let _entered = span.enter();

        if trigger != WorkflowTrigger::Timeout && self.is_timed_out() {
            warn!(
                dropped_trigger = %trigger,
                timeout_minutes = self.context.timeout_minutes,
                "User approval timed out, completing workflow"
            );
            return self.transition(WorkflowTrigger::Timeout, TriggerPayload::new());
        }

        let old_state = self.context.state;
        let Some(handler) = self.lookup(old_state, trigger) else {
            let valid_triggers = self.valid_triggers();
            error!(
                state = %old_state,
                trigger = %trigger,
                valid_triggers = ?valid_triggers,
                "Invalid workflow transition"
            );
            return TransitionResult::Rejected {
                state: old_state,
                attempted: trigger,
                error: WorkflowError::InvalidTransition {
                    from: old_state,
                    trigger,
                    valid_triggers: valid_triggers.clone(),
                },
                valid_triggers,
            };
        };

        let before = self.context.clone();
        match handler(self, &payload) {
            Ok(directive) => {
                self.record_transition(old_state, trigger);
                TransitionResult::Applied {
                    old_state,
                    new_state: self.context.state,
                    directive,
                }
            }
            Err(failure) => {
                self.context = before;
                error!(
                    state = %old_state,
                    trigger = %trigger,
                    error = %failure,
                    "Transition handler failed"
                );
                let payload = TriggerPayload::new().with("error", failure.to_string());
                self.transition(WorkflowTrigger::ErrorOccurred, payload)
            }
        }
    }

    fn record_transition(&mut self, from: WorkflowState, trigger: WorkflowTrigger) {
        let to = self.context.state;
        self.context.last_transition_at = self.clock.now();
        self.context.history.push(format!("{from} -> {trigger} -> {to}"));

        info!(
            from_state = %from,
            trigger = %trigger,
            to_state = %to,
            iterations = self.context.iteration_count,
            "Workflow state transition"
        );
    }

    pub fn status(&self) -> WorkflowStatus {
        let history = &self.context.history;
        let recent_start = history.len().saturating_sub(STATUS_HISTORY_LEN);

        WorkflowStatus {
            state: self.context.state,
            target_path: self.context.target_path.clone(),
            iterations: self.context.iteration_count,
            max_iterations: self.context.max_iterations,
            created_at: self.context.created_at,
            last_transition_at: self.context.last_transition_at,
            valid_triggers: self.valid_triggers(),
            recent_history: history[recent_start..].to_vec(),
            timed_out: self.is_timed_out(),
            error_message: self.context.error_message.clone(),
        }
    }

    // Transition handlers

    fn start_writing(&mut self, payload: &TriggerPayload) -> Result<Directive, WorkflowError> {
        let input = payload.text("input")?.unwrap_or_default().to_string();
        if let Some(path) = payload.text("target_path")? {
            self.context.target_path = Some(path.to_string());
        }
        self.context.state = WorkflowState::Writing;
        self.context.satisfied = false;
        self.context.error_message = None;

        Ok(Directive::InvokeWriter {
            input,
            target_path: self.context.target_path.clone(),
        })
    }

    fn start_review(&mut self, payload: &TriggerPayload) -> Result<Directive, WorkflowError> {
        if let Some(path) = payload.text("target_path")? {
            self.context.target_path = Some(path.to_string());
        }
        self.context.state = WorkflowState::Reviewing;

        let message = match &self.context.target_path {
            Some(path) => format!("Please review {path}"),
            None => "Please review the latest draft".to_string(),
        };
        Ok(Directive::InvokeReviewer {
            target_path: self.context.target_path.clone(),
            message,
        })
    }

    fn await_approval(&mut self, payload: &TriggerPayload) -> Result<Directive, WorkflowError> {
        let feedback = payload.text("feedback")?.unwrap_or_default().to_string();
        Ok(self.enter_pending_user(feedback))
    }

    fn enter_pending_user(&mut self, feedback: String) -> Directive {
        self.context.state = WorkflowState::PendingUser;
        self.context.last_feedback = Some(feedback.clone());

        Directive::RequestApproval {
            feedback,
            timeout_minutes: self.context.timeout_minutes,
            message: "Would you like the writer to implement these improvements? (yes/no)"
                .to_string(),
        }
    }

    fn start_revision(&mut self, _payload: &TriggerPayload) -> Result<Directive, WorkflowError> {
        let iteration = self.context.iteration_count.checked_add(1).ok_or_else(|| {
            WorkflowError::HandlerFailure {
                reason: "iteration counter overflow".to_string(),
            }
        })?;
        self.context.iteration_count = iteration;
        self.context.state = WorkflowState::Revising;

        Ok(Directive::InvokeWriterRevision {
            feedback: self.context.last_feedback.clone().unwrap_or_default(),
            iteration,
            target_path: self.context.target_path.clone(),
        })
    }

    fn complete_rejected(&mut self, _payload: &TriggerPayload) -> Result<Directive, WorkflowError> {
        Ok(self.complete(CompletionReason::UserRejected))
    }

    fn complete_timed_out(&mut self, _payload: &TriggerPayload) -> Result<Directive, WorkflowError> {
        warn!("User approval timeout, completing workflow");
        Ok(self.complete(CompletionReason::TimedOut))
    }

    fn complete(&mut self, reason: CompletionReason) -> Directive {
        self.context.state = WorkflowState::Complete;
        self.context.satisfied = true;

        Directive::WorkflowComplete {
            reason,
            iterations: self.context.iteration_count,
            target_path: self.context.target_path.clone(),
            message: "Workflow completed. Content is ready.".to_string(),
        }
    }

    fn check_iteration_limit(&mut self, payload: &TriggerPayload) -> Result<Directive, WorkflowError> {
        if let Some(path) = payload.text("target_path")? {
            self.context.target_path = Some(path.to_string());
        }

        if self.context.iteration_count >= self.context.max_iterations {
            warn!(
                iterations = self.context.iteration_count,
                max_iterations = self.context.max_iterations,
                "Hit iteration limit, forcing completion"
            );
            return Ok(self.complete(CompletionReason::IterationLimit));
        }

        Ok(self.enter_pending_user(REVISION_READY_FEEDBACK.to_string()))
    }

    fn reset_to_idle(&mut self, _payload: &TriggerPayload) -> Result<Directive, WorkflowError> {
        let previous = std::mem::replace(
            &mut self.context,
            WorkflowContext::new(self.settings, self.clock.now()),
        );

        Ok(Directive::WorkflowReset {
            previous_iterations: previous.iteration_count,
            previous_completed: previous.satisfied,
            message: "Ready for new content".to_string(),
        })
    }

    fn handle_error(&mut self, payload: &TriggerPayload) -> Result<Directive, WorkflowError> {
        let error = payload
            .describe("error")
            .unwrap_or_else(|| "Unknown error".to_string());
        self.context.state = WorkflowState::Error;
        self.context.error_message = Some(error.clone());

        Ok(Directive::ErrorOccurred {
            message: format!("Workflow error: {error}"),
            error,
            recovery_options: vec![WorkflowTrigger::Reset],
        })
    }
}
