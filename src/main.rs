use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::Instrument;

use draftflow::config::DraftflowConfig;
use draftflow::telemetry::{create_command_span, init_telemetry};
use draftflow::workflows::{
    ActorInvoker, ActorOutcome, ConsoleInvoker, ExecutionRequest, TransitionResult,
    WorkflowController, WorkflowError, WorkflowState,
};

#[derive(Parser)]
#[command(name = "draftflow")]
#[command(about = "Writer/reviewer workflow with human approval gates")]
#[command(long_about = "draftflow sequences a writer and a reviewer around a draft. Each command \
                       feeds one event into the saved workflow, prints what should happen next, \
                       and saves the result. Start with 'draftflow start \"<request>\"'.")]
struct Cli {
    /// Configuration file (defaults to ./draftflow.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding saved workflow state
    #[arg(long, global = true)]
    state_dir: Option<PathBuf>,

    /// Workflow instance to operate on
    #[arg(long, global = true)]
    key: Option<String>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the current workflow state
    Status,
    /// Start a new workflow by invoking the writer
    Start {
        /// What the writer should produce
        content: String,
        /// Existing file to work on
        #[arg(long, short = 'f')]
        file: Option<String>,
    },
    /// Approve the reviewer's feedback and send it to the writer
    Approve,
    /// Reject the reviewer's feedback and finish the workflow
    Reject,
    /// Answer the approval prompt with free text (yes/no/approve/decline...)
    Respond { answer: String },
    /// Report that the writer finished a draft or a revision
    WriterDone {
        #[arg(long, short = 'f')]
        file: Option<String>,
    },
    /// Report that the reviewer finished, with its feedback
    ReviewerDone {
        #[arg(default_value = "")]
        feedback: String,
    },
    /// Send a completed workflow back to the writer
    NewChanges {
        content: String,
        #[arg(long, short = 'f')]
        file: Option<String>,
    },
    /// Complete a workflow whose approval window has expired
    Timeout,
    /// Report an external failure; the workflow moves to the error state
    Fail { message: String },
    /// Discard a completed or failed workflow and return to idle
    Reset,
    /// Read commands from stdin until 'quit', saving after each one
    Interactive,
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Status => "status",
            Commands::Start { .. } => "start",
            Commands::Approve => "approve",
            Commands::Reject => "reject",
            Commands::Respond { .. } => "respond",
            Commands::WriterDone { .. } => "writer-done",
            Commands::ReviewerDone { .. } => "reviewer-done",
            Commands::NewChanges { .. } => "new-changes",
            Commands::Timeout => "timeout",
            Commands::Fail { .. } => "fail",
            Commands::Reset => "reset",
            Commands::Interactive => "interactive",
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let _ = DraftflowConfig::load_env_file();
    let mut config = DraftflowConfig::load(cli.config.as_deref())?;
    if let Some(state_dir) = &cli.state_dir {
        config.workflow.state_dir = state_dir.clone();
    }
    if let Some(key) = &cli.key {
        config.workflow.state_key = key.clone();
    }
    init_telemetry(&config.observability)?;

    let span = create_command_span(cli.command.name(), &config.workflow.state_key);
    tokio::runtime::Runtime::new()?.block_on(run(cli, config).instrument(span))
}

async fn run(cli: Cli, config: DraftflowConfig) -> Result<()> {
    let mut controller = WorkflowController::from_config(&config);
    controller.load_state().await.with_context(|| {
        format!(
            "Saved workflow state for '{}' in {} is unreadable; fix or remove it first",
            config.workflow.state_key,
            config.workflow.state_dir.display()
        )
    })?;

    if let Commands::Interactive = cli.command {
        return interactive(&mut controller, cli.json).await;
    }
    execute(&mut controller, cli.command, cli.json).await
}

/// Apply one command, save when the workflow changed, and print the outcome
async fn execute(controller: &mut WorkflowController, command: Commands, json: bool) -> Result<()> {
    let result = match apply_command(controller, command) {
        Ok(Some(result)) => result,
        Ok(None) => return show_status(controller, json),
        Err(e) => bail!("{e}"),
    };

    if let TransitionResult::Applied { .. } = result {
        if let Err(e) = controller.save_state().await {
            eprintln!("⚠️  Failed to save workflow state: {e}");
        }
    }

    let request = controller.execute_result(&result);
    display_request(&request, json).await?;

    if let TransitionResult::Rejected { error, .. } = result {
        bail!("{error}");
    }
    Ok(())
}

/// Feed one command into the controller. `None` means the command only reads state.
fn apply_command(
    controller: &mut WorkflowController,
    command: Commands,
) -> Result<Option<TransitionResult>, WorkflowError> {
    let writer = controller.actors().writer.clone();
    let reviewer = controller.actors().reviewer.clone();

    let result = match command {
        Commands::Status | Commands::Interactive => return Ok(None),
        Commands::Start { content, file } => controller.start_workflow(&content, file.as_deref()),
        Commands::Approve => controller.handle_user_response("yes")?,
        Commands::Reject => controller.handle_user_response("no")?,
        Commands::Respond { answer } => controller.handle_user_response(&answer)?,
        Commands::WriterDone { file } => {
            controller.handle_actor_completion(&writer, &ActorOutcome::draft(file))?
        }
        Commands::ReviewerDone { feedback } => {
            controller.handle_actor_completion(&reviewer, &ActorOutcome::feedback(feedback))?
        }
        Commands::NewChanges { content, file } => {
            controller.request_new_changes(&content, file.as_deref())
        }
        Commands::Timeout => controller.handle_timeout(),
        Commands::Fail { message } => controller.report_error(&message),
        Commands::Reset => controller.reset_workflow(),
    };
    Ok(Some(result))
}

fn show_status(controller: &WorkflowController, json: bool) -> Result<()> {
    let status = controller.status();
    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    let workflow = &status.workflow;
    println!("📋 Workflow {}", status.workflow_id);
    println!("State: {}", workflow.state);
    if let Some(path) = &workflow.target_path {
        println!("File: {path}");
    }
    println!("Iterations: {}/{}", workflow.iterations, workflow.max_iterations);
    if workflow.timed_out {
        println!("⏰ Approval has timed out; the next command completes the workflow");
    } else if let Some(remaining) = controller.engine().time_remaining() {
        println!("⏳ Approval times out in {} min", remaining.num_minutes());
    }
    if let Some(error) = &workflow.error_message {
        println!("Error: {error}");
    }
    let triggers: Vec<String> = workflow.valid_triggers.iter().map(ToString::to_string).collect();
    println!("Valid triggers: {}", triggers.join(", "));
    if !workflow.recent_history.is_empty() {
        println!("Recent history:");
        for entry in &workflow.recent_history {
            println!("  {entry}");
        }
    }
    Ok(())
}

async fn display_request(request: &ExecutionRequest, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(request)?);
        return Ok(());
    }

    match request {
        ExecutionRequest::ActorInvoked { message, .. } => {
            ConsoleInvoker::stdout().invoke(request).await?;
            println!("ℹ️  {message}");
        }
        ExecutionRequest::AwaitingUserInput {
            message,
            feedback,
            prompt,
            ..
        } => {
            println!("⏳ {message}");
            if !feedback.is_empty() {
                println!("Feedback: {feedback}");
            }
            println!("{prompt}");
        }
        ExecutionRequest::WorkflowComplete {
            message,
            iterations,
            target_path,
            ..
        } => {
            println!("🎉 {message}");
            println!("Iterations: {iterations}");
            if let Some(path) = target_path {
                println!("File: {path}");
            }
        }
        ExecutionRequest::WorkflowReset { message, .. } => {
            println!("🔄 {message}");
        }
        ExecutionRequest::Error {
            message,
            recovery_options,
            ..
        } => {
            println!("❌ {message}");
            let options: Vec<String> = recovery_options.iter().map(ToString::to_string).collect();
            println!("Valid next triggers: {}", options.join(", "));
        }
    }
    Ok(())
}

enum InteractiveInput {
    Command(Commands),
    Help,
    Quit,
    Unknown(String),
}

/// Map one interactive line to a command. Arguments are the rest of the line.
fn parse_interactive_line(line: &str) -> InteractiveInput {
    let (name, rest) = match line.trim().split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (line.trim(), ""),
    };
    let arg = (!rest.is_empty()).then(|| rest.to_string());

    let command = match name.to_lowercase().as_str() {
        "quit" | "exit" | "q" => return InteractiveInput::Quit,
        "help" => return InteractiveInput::Help,
        "status" => Commands::Status,
        "start" => Commands::Start {
            content: arg.unwrap_or_else(|| "New content request".to_string()),
            file: None,
        },
        "approve" | "yes" | "y" => Commands::Approve,
        "reject" | "no" | "n" => Commands::Reject,
        "respond" => Commands::Respond {
            answer: rest.to_string(),
        },
        "writer-done" => Commands::WriterDone { file: arg },
        "reviewer-done" | "editor-done" => Commands::ReviewerDone {
            feedback: rest.to_string(),
        },
        "new-changes" => Commands::NewChanges {
            content: rest.to_string(),
            file: None,
        },
        "timeout" => Commands::Timeout,
        "fail" => Commands::Fail {
            message: arg.unwrap_or_else(|| "Reported from interactive mode".to_string()),
        },
        "reset" => Commands::Reset,
        other => return InteractiveInput::Unknown(other.to_string()),
    };
    InteractiveInput::Command(command)
}

fn print_state_hint(state: WorkflowState) {
    println!("Current state: {state}");
    let hint = match state {
        WorkflowState::Idle => "💤 Ready for a new content request\nCommands: start <request>, status",
        WorkflowState::Writing | WorkflowState::Revising => {
            "🔄 Writer at work\nCommands: writer-done [file], fail <message>, status"
        }
        WorkflowState::Reviewing => {
            "🔄 Reviewer at work\nCommands: reviewer-done <feedback>, fail <message>, status"
        }
        WorkflowState::PendingUser => {
            "⏳ Waiting for your decision on the reviewer feedback\nCommands: approve, reject, respond <answer>, status"
        }
        WorkflowState::Complete => "✅ Workflow complete\nCommands: new-changes <request>, reset, status",
        WorkflowState::Error => "❌ Workflow failed\nCommands: reset, status",
    };
    println!("{hint}");
}

fn print_interactive_help() {
    println!("Available commands:");
    println!("  start <request>          Invoke the writer with a new request");
    println!("  writer-done [file]       The writer finished a draft or revision");
    println!("  reviewer-done <feedback> The reviewer finished");
    println!("  approve | yes | y        Send the feedback to the writer");
    println!("  reject | no | n          Finish the workflow");
    println!("  respond <answer>         Answer the approval prompt with free text");
    println!("  new-changes <request>    Reopen a completed workflow");
    println!("  timeout                  Complete an expired approval");
    println!("  fail <message>           Move the workflow to the error state");
    println!("  reset                    Return to idle");
    println!("  status                   Show the workflow state");
    println!("  quit                     Leave interactive mode");
}

async fn interactive(controller: &mut WorkflowController, json: bool) -> Result<()> {
    println!("🤖 draftflow interactive mode");
    println!("Type 'help' for available commands, 'quit' to exit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print_state_hint(controller.engine().current_state());
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            println!();
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        match parse_interactive_line(&line) {
            InteractiveInput::Quit => break,
            InteractiveInput::Help => print_interactive_help(),
            InteractiveInput::Unknown(name) => {
                println!("❌ Unknown command: {name}. Type 'help' for available commands");
            }
            InteractiveInput::Command(command) => {
                if let Err(e) = execute(controller, command, json).await {
                    println!("❌ Error: {e}");
                }
            }
        }
        println!("{}", "-".repeat(50));
    }
    Ok(())
}
