use anyhow::{bail, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::workflows::{ActorNames, WorkflowSettings};

/// Default configuration file name, looked up in the working directory
pub const CONFIG_FILE: &str = "draftflow.toml";

/// Main configuration structure for draftflow
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct DraftflowConfig {
    /// Workflow limits, actors and state storage
    pub workflow: WorkflowConfig,
    /// Logging settings
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Approved revision cycles before the workflow is forced to complete
    pub max_iterations: u32,
    /// Minutes to wait for a human decision before completing
    pub timeout_minutes: u32,
    /// Directory holding persisted workflow state
    pub state_dir: PathBuf,
    /// Storage key of the workflow instance this process drives
    pub state_key: String,
    pub actors: ActorNames,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        let settings = WorkflowSettings::default();
        Self {
            max_iterations: settings.max_iterations,
            timeout_minutes: settings.timeout_minutes,
            state_dir: PathBuf::from(".draftflow/state"),
            state_key: "default".to_string(),
            actors: ActorNames::default(),
        }
    }
}

impl WorkflowConfig {
    pub fn settings(&self) -> WorkflowSettings {
        WorkflowSettings {
            max_iterations: self.max_iterations,
            timeout_minutes: self.timeout_minutes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level used when RUST_LOG is not set
    pub log_level: String,
    /// Emit JSON log lines instead of human-readable ones
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            json_logs: true,
        }
    }
}

impl DraftflowConfig {
    /// Load configuration with precedence:
    /// 1. Default values
    /// 2. Configuration file (`draftflow.toml`, or `path` when given)
    /// 3. Environment variables (prefixed with DRAFTFLOW__)
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        match path {
            Some(path) => {
                builder = builder.add_source(File::from(path));
            }
            None if Path::new(CONFIG_FILE).exists() => {
                builder = builder.add_source(File::from(Path::new(CONFIG_FILE)));
            }
            None => {}
        }

        builder = builder.add_source(
            Environment::with_prefix("DRAFTFLOW")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config: DraftflowConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Completions are routed by actor name, so the two names must differ
    pub fn validate(&self) -> Result<()> {
        let actors = &self.workflow.actors;
        if actors.writer.trim().is_empty() || actors.reviewer.trim().is_empty() {
            bail!("workflow.actors: writer and reviewer names must not be empty");
        }
        if actors.writer == actors.reviewer {
            bail!(
                "workflow.actors: writer and reviewer must be different actors (both are {:?})",
                actors.writer
            );
        }
        Ok(())
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}
