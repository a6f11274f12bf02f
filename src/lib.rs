//! Taskweave - Multi-Agent Task Orchestration
//!
//! Taskweave coordinates a fixed set of role-specialized agents over a
//! priority task queue: tasks are routed by keyword-based selection,
//! gated by a resource manager, executed through an agent registry, and
//! supervised by health and optimizer loops with bounded-retry failure
//! recovery.
//!
//! # Architecture
//!
//! The crate follows Clean Architecture / Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): Models, errors, and the `Agent` port
//! - **Service Layer** (`services`): Selection, queueing, admission,
//!   registry, workflows, failure recovery
//! - **Application Layer** (`application`): The orchestrator and its
//!   supervision loops
//! - **Infrastructure Layer** (`infrastructure`): Configuration and logging
//! - **CLI Layer** (`cli`): Command-line interface
//!
//! # Example
//!
//! ```ignore
//! use taskweave::application::Orchestrator;
//! use taskweave::domain::models::{Config, Task};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let orchestrator = Orchestrator::new(Config::default());
//!     orchestrator.initialize().await?;
//!     let id = orchestrator
//!         .submit_task(Task::new("allocate resources for site A", ""))
//!         .await?;
//!     orchestrator.orchestrate_task(id).await?;
//!     orchestrator.shutdown().await?;
//!     Ok(())
//! }
//! ```

pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use application::Orchestrator;
pub use domain::errors::{DomainError, DomainResult};
pub use domain::models::{
    AgentRole, AgentStatus, Config, LoggingConfig, SystemHealth, SystemStatus, Task, TaskPriority,
    TaskStatus, WorkflowExecution, WorkflowTemplate,
};
pub use domain::ports::Agent;
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{AgentRegistry, DecisionEngine, ResourceManager, TaskQueue, WorkflowEngine};
