//! Domain models for the orchestration core.

pub mod agent;
pub mod config;
pub mod execution;
pub mod metrics;
pub mod task;
pub mod workflow;

pub use agent::{AgentRole, AgentStatus, Capability, SkillTier};
pub use config::{Config, LoggingConfig};
pub use execution::{ExecutionOutcome, TaskExecution};
pub use metrics::{HealthLevel, SystemHealth, SystemMetrics, SystemStatus};
pub use task::{Task, TaskPriority, TaskStatus};
pub use workflow::{
    StepExecution, StepOutcome, WorkflowExecution, WorkflowStatus, WorkflowStep, WorkflowTemplate,
};
