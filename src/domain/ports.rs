//! Port traits at the orchestrator boundary.
//!
//! `Agent` is the only contract the orchestrator requires from an
//! executor, regardless of what the implementation does internally
//! (rule-based, templated, or model-backed). `HostService` covers named
//! host services started and stopped alongside the orchestrator but not
//! otherwise coordinated by it.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{AgentRole, AgentStatus, Capability, Task};

/// A unit capable of executing tasks for one declared role.
///
/// Implementations must not panic across this boundary; failures are
/// returned as `DomainError` values and funneled into the orchestrator's
/// failure handler.
#[async_trait]
pub trait Agent: Send + Sync {
    /// The role this agent satisfies.
    fn role(&self) -> AgentRole;

    /// Capabilities this agent advertises.
    fn capabilities(&self) -> Vec<Capability>;

    /// One-time startup. Called once per orchestrator lifetime; a failure
    /// excludes the agent from the active set but does not abort startup.
    async fn initialize(&self) -> DomainResult<()>;

    /// Execute a task and return the updated task value.
    async fn execute_task(&self, task: &Task) -> DomainResult<Task>;

    /// Graceful teardown. Called during orchestrator shutdown.
    async fn shutdown(&self) -> DomainResult<()>;

    /// Live status signal.
    async fn status(&self) -> AgentStatus;
}

/// Health of a host service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceHealth {
    Up,
    Down,
}

/// A named host service with an independent lifecycle.
#[async_trait]
pub trait HostService: Send + Sync {
    fn name(&self) -> &str;

    async fn start(&self) -> DomainResult<()>;

    async fn stop(&self) -> DomainResult<()>;

    async fn restart(&self) -> DomainResult<()> {
        self.stop().await?;
        self.start().await
    }

    async fn health_status(&self) -> ServiceHealth;
}
