// Property-based tests for workflow engine invariants
// Random trigger sequences must never corrupt the context

use draftflow::workflows::{
    TransitionResult, TriggerPayload, WorkflowEngine, WorkflowSettings, WorkflowState,
    WorkflowTrigger,
};
use proptest::prelude::*;

fn trigger_strategy() -> impl Strategy<Value = WorkflowTrigger> {
    proptest::sample::select(WorkflowTrigger::ALL.to_vec())
}

fn payload_for(trigger: WorkflowTrigger) -> TriggerPayload {
    match trigger {
        WorkflowTrigger::RequestContent | WorkflowTrigger::RequestNewChanges => {
            TriggerPayload::new().with("input", "write about caching")
        }
        WorkflowTrigger::FeedbackReady => TriggerPayload::new().with("feedback", "fix typos"),
        WorkflowTrigger::ErrorOccurred => TriggerPayload::new().with("error", "actor crashed"),
        _ => TriggerPayload::new(),
    }
}

proptest! {
    #[test]
    fn rejected_triggers_leave_context_untouched(
        triggers in proptest::collection::vec(trigger_strategy(), 1..40)
    ) {
        let mut engine = WorkflowEngine::new(WorkflowSettings::default());

        for trigger in triggers {
            let before = engine.context().clone();
            let allowed = engine.can_transition(trigger);
            let result = engine.transition(trigger, payload_for(trigger));

            match result {
                TransitionResult::Rejected { state, valid_triggers, .. } => {
                    prop_assert!(!allowed);
                    prop_assert_eq!(state, before.state);
                    prop_assert_eq!(engine.context(), &before);
                    prop_assert_eq!(valid_triggers, engine.valid_triggers());
                }
                TransitionResult::Applied { old_state, new_state, .. } => {
                    prop_assert!(allowed);
                    prop_assert_eq!(old_state, before.state);
                    prop_assert_eq!(new_state, engine.current_state());
                    // Reset starts a fresh history holding only its own entry
                    let expected = if trigger == WorkflowTrigger::Reset { 1 } else { before.history.len() + 1 };
                    prop_assert_eq!(engine.context().history.len(), expected);
                }
            }
        }
    }

    #[test]
    fn iterations_only_move_on_approval_or_reset(
        max_iterations in 1u32..6,
        triggers in proptest::collection::vec(trigger_strategy(), 1..80)
    ) {
        let settings = WorkflowSettings { max_iterations, timeout_minutes: 30 };
        let mut engine = WorkflowEngine::new(settings);

        for trigger in triggers {
            let before = engine.context().iteration_count;
            let result = engine.transition(trigger, payload_for(trigger));
            let after = engine.context().iteration_count;

            match (trigger, result.is_error()) {
                (WorkflowTrigger::UserApproves, false) => prop_assert_eq!(after, before + 1),
                (WorkflowTrigger::Reset, false) => prop_assert_eq!(after, 0),
                _ => prop_assert_eq!(after, before),
            }
            if engine.current_state() == WorkflowState::Idle {
                prop_assert_eq!(after, 0);
            }
        }
    }

    #[test]
    fn error_state_only_accepts_reset(trigger in trigger_strategy()) {
        let mut engine = WorkflowEngine::new(WorkflowSettings::default());
        engine.transition(WorkflowTrigger::ErrorOccurred, payload_for(WorkflowTrigger::ErrorOccurred));
        prop_assert_eq!(engine.current_state(), WorkflowState::Error);

        let result = engine.transition(trigger, payload_for(trigger));

        match trigger {
            WorkflowTrigger::Reset => prop_assert_eq!(result.state(), WorkflowState::Idle),
            WorkflowTrigger::ErrorOccurred => prop_assert_eq!(result.state(), WorkflowState::Error),
            _ => prop_assert!(result.is_error()),
        }
    }
}
