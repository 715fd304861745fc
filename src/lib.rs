// Draftflow Library - writer/reviewer workflow orchestration
// This exposes the core components for testing and integration

pub mod config;
pub mod telemetry;
pub mod workflows;

pub use config::DraftflowConfig;
pub use workflows::{
    Directive, ExecutionRequest, TransitionResult, WorkflowController, WorkflowEngine,
    WorkflowError, WorkflowState, WorkflowTrigger,
};
