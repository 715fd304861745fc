use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

use crate::config::ObservabilityConfig;

/// Initialize structured logging to stderr.
///
/// `RUST_LOG` wins over the configured level. Fails if a global subscriber
/// is already installed.
pub fn init_telemetry(config: &ObservabilityConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.log_level)?,
    };

    let registry = tracing_subscriber::registry().with(filter);
    if config.json_logs {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()?;
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()?;
    }

    tracing::debug!("draftflow telemetry initialized");
    Ok(())
}

/// Generate a correlation ID for linking related operations
pub fn generate_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

/// Span carried by one workflow engine; every transition log line is
/// recorded inside it
pub fn create_workflow_span(workflow_id: &str) -> tracing::Span {
    tracing::info_span!(
        "workflow",
        workflow.id = workflow_id,
        otel.kind = "internal"
    )
}

/// Span for one CLI command run against a workflow
pub fn create_command_span(command: &str, workflow_id: &str) -> tracing::Span {
    tracing::info_span!(
        "workflow_command",
        command = command,
        workflow.id = workflow_id,
        correlation.id = %generate_correlation_id(),
    )
}
