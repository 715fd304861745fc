// Writer/reviewer workflow orchestration
// The engine owns state transitions; the controller adapts them to actors, people and storage

pub mod actors;
pub mod clock;
pub mod controller;
pub mod directive;
pub mod engine;
pub mod errors;
pub mod persistence;
pub mod types;

pub use actors::{ActorInvoker, ActorNames, ActorOutcome, ConsoleInvoker};
pub use clock::{Clock, ManualClock, SystemClock};
pub use controller::{parse_user_response, ControllerStatus, WorkflowController};
pub use directive::{CompletionReason, Directive, ExecutionRequest, TransitionResult, WorkflowStatus};
pub use engine::{WorkflowEngine, REVISION_READY_FEEDBACK};
pub use errors::WorkflowError;
pub use persistence::{
    ControllerMetadata, FileSystemStore, MemoryStore, PersistedWorkflow, PersistenceError,
    PersistenceStore,
};
pub use types::{TriggerPayload, WorkflowContext, WorkflowSettings, WorkflowState, WorkflowTrigger};
