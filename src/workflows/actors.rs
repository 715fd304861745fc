use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io::Write;

use super::directive::ExecutionRequest;

/// Names the controller uses to address the two actors
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorNames {
    pub writer: String,
    pub reviewer: String,
}

impl Default for ActorNames {
    fn default() -> Self {
        Self {
            writer: "technical-writer".to_string(),
            reviewer: "blog-editor".to_string(),
        }
    }
}

impl ActorNames {
    pub fn all(&self) -> Vec<String> {
        vec![self.writer.clone(), self.reviewer.clone()]
    }
}

/// What an actor reports back once its invocation has finished
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorOutcome {
    pub target_path: Option<String>,
    pub feedback: Option<String>,
}

impl ActorOutcome {
    pub fn draft(target_path: Option<String>) -> Self {
        Self {
            target_path,
            feedback: None,
        }
    }

    pub fn feedback(feedback: impl Into<String>) -> Self {
        Self {
            target_path: None,
            feedback: Some(feedback.into()),
        }
    }
}

/// Executes actor invocation requests outside the workflow core.
///
/// The engine and controller never call this; they only build the
/// `ExecutionRequest::ActorInvoked` values an executor hands to it. The
/// executor later reports completion through
/// `WorkflowController::handle_actor_completion`.
#[async_trait]
pub trait ActorInvoker: Send + Sync {
    async fn invoke(&self, request: &ExecutionRequest) -> Result<()>;
}

/// Writes the invocation command to a sink for a person or agent runtime to run
pub struct ConsoleInvoker<W: Write + Send> {
    out: std::sync::Mutex<W>,
}

impl ConsoleInvoker<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> ConsoleInvoker<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: std::sync::Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl<W: Write + Send> ActorInvoker for ConsoleInvoker<W> {
    async fn invoke(&self, request: &ExecutionRequest) -> Result<()> {
        let ExecutionRequest::ActorInvoked { actor, command, .. } = request else {
            bail!("not an actor invocation: {request:?}");
        };

        let mut out = self.out.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        writeln!(out, "🚀 Invoke {actor}")?;
        writeln!(out, "Command: {command}")?;
        Ok(())
    }
}
