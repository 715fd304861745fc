//! End-to-end workflow tests through the public controller API
//!
//! These drive full writer/reviewer cycles against the file-backed store
//! and a manual clock, without invoking any real actors.

use chrono::{Duration, Utc};
use draftflow::workflows::{
    ActorOutcome, CompletionReason, Directive, FileSystemStore, ManualClock, PersistenceError,
    PersistenceStore, TransitionResult, WorkflowController, WorkflowEngine, WorkflowSettings,
    WorkflowState,
};
use std::sync::Arc;
use tempfile::TempDir;

struct WorkflowHarness {
    controller: WorkflowController,
    clock: Arc<ManualClock>,
}

impl WorkflowHarness {
    fn new(settings: WorkflowSettings, store: Arc<dyn PersistenceStore>) -> Self {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let engine = WorkflowEngine::new(settings).with_clock(clock.clone());
        let controller = WorkflowController::new(engine, Default::default(), store, "launch-post");
        Self { controller, clock }
    }

    fn writer_done(&mut self) -> TransitionResult {
        let writer = self.controller.actors().writer.clone();
        self.controller
            .handle_actor_completion(&writer, &ActorOutcome::draft(None))
            .unwrap()
    }

    fn reviewer_done(&mut self, feedback: &str) -> TransitionResult {
        let reviewer = self.controller.actors().reviewer.clone();
        self.controller
            .handle_actor_completion(&reviewer, &ActorOutcome::feedback(feedback))
            .unwrap()
    }

    fn state(&self) -> WorkflowState {
        self.controller.engine().current_state()
    }
}

fn file_store(temp_dir: &TempDir) -> Arc<dyn PersistenceStore> {
    Arc::new(FileSystemStore::new(temp_dir.path().join("state")))
}

#[test]
fn test_revision_loop_stops_at_iteration_limit() {
    let temp_dir = TempDir::new().unwrap();
    let settings = WorkflowSettings {
        max_iterations: 3,
        timeout_minutes: 30,
    };
    let mut harness = WorkflowHarness::new(settings, file_store(&temp_dir));

    harness
        .controller
        .start_workflow("write about caching", Some("drafts/caching.md"));
    harness.writer_done();
    harness.reviewer_done("tighten the intro");

    for iteration in 1..=3u32 {
        let result = harness.controller.handle_user_response("yes").unwrap();
        assert!(matches!(
            result.directive(),
            Some(Directive::InvokeWriterRevision { iteration: i, .. }) if *i == iteration
        ));

        let result = harness.writer_done();
        if iteration < 3 {
            assert_eq!(result.state(), WorkflowState::PendingUser);
        } else {
            assert!(matches!(
                result.directive(),
                Some(Directive::WorkflowComplete {
                    reason: CompletionReason::IterationLimit,
                    iterations: 3,
                    ..
                })
            ));
        }
    }

    let context = harness.controller.engine().context();
    assert_eq!(context.state, WorkflowState::Complete);
    assert_eq!(context.iteration_count, 3);
    assert!(context.satisfied);
    assert_eq!(context.target_path.as_deref(), Some("drafts/caching.md"));
}

#[test]
fn test_stale_approval_completes_before_user_answer() {
    let temp_dir = TempDir::new().unwrap();
    let mut harness = WorkflowHarness::new(WorkflowSettings::default(), file_store(&temp_dir));

    harness.controller.start_workflow("write about caching", None);
    harness.writer_done();
    harness.reviewer_done("add benchmarks");
    harness.clock.advance(Duration::minutes(45));

    let result = harness.controller.handle_user_response("yes").unwrap();

    assert!(matches!(
        result.directive(),
        Some(Directive::WorkflowComplete {
            reason: CompletionReason::TimedOut,
            ..
        })
    ));
    assert_eq!(harness.state(), WorkflowState::Complete);
    assert_eq!(harness.controller.engine().context().iteration_count, 0);
}

#[test]
fn test_completed_workflow_can_be_reopened_or_reset() {
    let temp_dir = TempDir::new().unwrap();
    let mut harness = WorkflowHarness::new(WorkflowSettings::default(), file_store(&temp_dir));

    harness.controller.start_workflow("write about caching", None);
    harness.writer_done();
    harness.reviewer_done("looks good");
    harness.controller.handle_user_response("no").unwrap();
    assert_eq!(harness.state(), WorkflowState::Complete);

    let result = harness
        .controller
        .request_new_changes("add a section on eviction", Some("drafts/caching.md"));
    assert_eq!(result.state(), WorkflowState::Writing);
    assert!(!harness.controller.engine().context().satisfied);

    harness.writer_done();
    harness.reviewer_done("fine");
    harness.controller.handle_user_response("decline").unwrap();

    let result = harness.controller.reset_workflow();
    assert!(matches!(
        result.directive(),
        Some(Directive::WorkflowReset {
            previous_completed: true,
            ..
        })
    ));
    let context = harness.controller.engine().context();
    assert_eq!(context.state, WorkflowState::Idle);
    assert_eq!(context.target_path, None);
    assert_eq!(context.history, vec!["complete -> reset -> idle".to_string()]);
}

#[tokio::test]
async fn test_state_survives_process_restart() {
    let temp_dir = TempDir::new().unwrap();
    let mut first = WorkflowHarness::new(WorkflowSettings::default(), file_store(&temp_dir));
    first
        .controller
        .start_workflow("write about caching", Some("drafts/caching.md"));
    first.writer_done();
    first.controller.save_state().await.unwrap();

    assert!(temp_dir.path().join("state/launch-post.state.json").exists());

    let mut second = WorkflowHarness::new(WorkflowSettings::default(), file_store(&temp_dir));
    assert!(second.controller.load_state().await.unwrap());
    assert_eq!(second.state(), WorkflowState::Reviewing);
    assert_eq!(
        second.controller.engine().context(),
        first.controller.engine().context()
    );

    let result = second.reviewer_done("fix typos");
    assert_eq!(result.state(), WorkflowState::PendingUser);
}

#[tokio::test]
async fn test_corrupt_state_file_is_reported() {
    let temp_dir = TempDir::new().unwrap();
    let state_dir = temp_dir.path().join("state");
    std::fs::create_dir_all(&state_dir).unwrap();
    std::fs::write(state_dir.join("launch-post.state.json"), "{ not json").unwrap();

    let mut harness = WorkflowHarness::new(WorkflowSettings::default(), file_store(&temp_dir));

    let result = harness.controller.load_state().await;
    assert!(matches!(result, Err(PersistenceError::SerializationError(_))));
    assert_eq!(harness.state(), WorkflowState::Idle);
}
