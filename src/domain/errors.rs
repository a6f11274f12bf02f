//! Domain errors for the Taskweave orchestration core.

use thiserror::Error;
use uuid::Uuid;

/// Domain-level errors that can occur in the orchestration core.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Task not found: {0}")]
    TaskNotFound(Uuid),

    #[error("Agent not found for role: {0}")]
    AgentNotFound(String),

    #[error("Workflow template not found: {0}")]
    WorkflowNotFound(String),

    #[error("Invalid state transition from {from} to {to}: {reason}")]
    InvalidStateTransition {
        from: String,
        to: String,
        reason: String,
    },

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Task {0} timed out")]
    TaskTimeout(Uuid),

    #[error("Orchestrator is not initialized")]
    NotInitialized,

    #[error("Orchestrator is shut down")]
    AlreadyShutdown,

    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}
