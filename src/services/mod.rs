//! Core services: routing, queueing, capacity, agents, workflows, recovery.

pub mod agent_registry;
pub mod builtin_agents;
pub mod decision_engine;
pub mod failure_recovery;
pub mod resource_manager;
pub mod task_queue;
pub mod workflow_engine;

pub use agent_registry::AgentRegistry;
pub use builtin_agents::BuiltinAgent;
pub use decision_engine::{DecisionEngine, KeywordRule};
pub use failure_recovery::{FailureKind, FailureRecovery, FailureSignature, RecoveryStrategy};
pub use resource_manager::{Availability, ResourceManager};
pub use task_queue::TaskQueue;
pub use workflow_engine::WorkflowEngine;
