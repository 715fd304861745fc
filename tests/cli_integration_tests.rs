//! End-to-end CLI integration tests
//!
//! These use assert_cmd to run the draftflow binary against a temporary
//! state directory, one process per workflow event.

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;
use tempfile::TempDir;

/// Helper for running draftflow commands against an isolated workspace
struct CliTestEnvironment {
    temp_dir: TempDir,
}

impl CliTestEnvironment {
    fn new() -> Self {
        Self {
            temp_dir: TempDir::new().unwrap(),
        }
    }

    fn draftflow(&self) -> Command {
        let mut cmd = Command::cargo_bin("draftflow").unwrap();
        cmd.current_dir(self.temp_dir.path())
            .env_remove("RUST_LOG")
            .arg("--state-dir")
            .arg(self.temp_dir.path().join("state"));
        cmd
    }
}

#[test]
fn test_help_lists_workflow_commands() {
    let env = CliTestEnvironment::new();

    env.draftflow()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("start"))
        .stdout(predicate::str::contains("reviewer-done"))
        .stdout(predicate::str::contains("reset"));
}

#[test]
fn test_fresh_status_is_idle() {
    let env = CliTestEnvironment::new();

    env.draftflow()
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("State: idle"))
        .stdout(predicate::str::contains("request_content"));
}

#[test]
fn test_full_workflow_across_invocations() {
    let env = CliTestEnvironment::new();

    env.draftflow()
        .args(["start", "write about caching", "--file", "drafts/caching.md"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Invoke technical-writer"))
        .stdout(predicate::str::contains("@technical-writer write about caching"));

    assert!(env.temp_dir.path().join("state/default.state.json").exists());

    env.draftflow()
        .arg("writer-done")
        .assert()
        .success()
        .stdout(predicate::str::contains("Invoke blog-editor"))
        .stdout(predicate::str::contains("drafts/caching.md"));

    env.draftflow()
        .args(["reviewer-done", "fix typos"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Feedback: fix typos"))
        .stdout(predicate::str::contains("(yes/no)"));

    env.draftflow()
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("State: pending_user"))
        .stdout(predicate::str::contains("Approval times out in"));

    env.draftflow()
        .arg("approve")
        .assert()
        .success()
        .stdout(predicate::str::contains("iteration 1"));

    env.draftflow()
        .arg("writer-done")
        .assert()
        .success()
        .stdout(predicate::str::contains("Revisions completed. Ready for review."));

    env.draftflow()
        .args(["respond", "decline"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Workflow completed"))
        .stdout(predicate::str::contains("Iterations: 1"));

    env.draftflow()
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("State: complete"))
        .stdout(predicate::str::contains("Iterations: 1/5"));
}

#[test]
fn test_invalid_transition_fails_without_changing_state() {
    let env = CliTestEnvironment::new();

    env.draftflow()
        .arg("approve")
        .assert()
        .failure()
        .stdout(predicate::str::contains("Cannot apply user_approves while idle"))
        .stderr(predicate::str::contains("Invalid transition"));

    env.draftflow()
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("State: idle"));
}

#[test]
fn test_unrecognized_response_is_rejected() {
    let env = CliTestEnvironment::new();

    env.draftflow().args(["start", "write about caching"]).assert().success();
    env.draftflow().arg("writer-done").assert().success();
    env.draftflow().args(["reviewer-done", "fix typos"]).assert().success();

    env.draftflow()
        .args(["respond", "maybe"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("please respond with 'yes' or 'no'"));

    env.draftflow()
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("State: pending_user"));
}

#[test]
fn test_failure_then_reset_returns_to_idle() {
    let env = CliTestEnvironment::new();

    env.draftflow().args(["start", "write about caching"]).assert().success();

    env.draftflow()
        .args(["fail", "writer process exited"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Workflow error: writer process exited"));

    env.draftflow()
        .arg("reset")
        .assert()
        .success()
        .stdout(predicate::str::contains("Ready for new content"));

    env.draftflow()
        .args(["--json", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"state\": \"idle\""))
        .stdout(predicate::str::contains("\"controller_ready\": true"));
}

#[test]
fn test_separate_keys_are_independent() {
    let env = CliTestEnvironment::new();

    env.draftflow()
        .args(["--key", "launch-post", "start", "write the launch post"])
        .assert()
        .success();

    env.draftflow()
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("State: idle"));

    env.draftflow()
        .args(["--key", "launch-post", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("State: writing"));
}

#[test]
fn test_unreadable_state_is_left_untouched() {
    let env = CliTestEnvironment::new();
    let state_dir = env.temp_dir.path().join("state");
    std::fs::create_dir_all(&state_dir).unwrap();
    let state_file = state_dir.join("default.state.json");
    let truncated = r#"{"context": {"state": "pending_user", "truncated"#;
    std::fs::write(&state_file, truncated).unwrap();

    env.draftflow()
        .args(["start", "write about caching"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unreadable"));

    env.draftflow().arg("status").assert().failure();

    assert_eq!(std::fs::read_to_string(&state_file).unwrap(), truncated);
}

#[test]
fn test_interactive_session_drives_workflow() {
    let env = CliTestEnvironment::new();

    assert_cmd::Command::from_std(env.draftflow())
        .arg("interactive")
        .write_stdin("help\nstart write about caching\nwriter-done\nbogus\nquit\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Available commands"))
        .stdout(predicate::str::contains("@technical-writer write about caching"))
        .stdout(predicate::str::contains("Invoke blog-editor"))
        .stdout(predicate::str::contains("Unknown command: bogus"))
        .stdout(predicate::str::contains("Current state: reviewing"));

    env.draftflow()
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("State: reviewing"));
}

#[test]
fn test_interactive_session_reports_errors_and_continues() {
    let env = CliTestEnvironment::new();

    assert_cmd::Command::from_std(env.draftflow())
        .arg("interactive")
        .write_stdin("approve\nrespond maybe\nstart\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Invalid transition: idle -> user_approves"))
        .stdout(predicate::str::contains("please respond with 'yes' or 'no'"))
        .stdout(predicate::str::contains("@technical-writer New content request"));
}

