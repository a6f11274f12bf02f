//! Agent registry and lifecycle runtime.
//!
//! The registry owns the live agent instances for the orchestrator's
//! lifetime: it initializes them once at startup, hands out handles for
//! dispatch, and tears them down in reverse registration order at
//! shutdown. An agent whose `initialize` fails is excluded from the
//! active set with a degraded-mode warning; startup continues for the
//! rest.

use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{AgentRole, AgentStatus, Task};
use crate::domain::ports::Agent;

/// Runtime binding between a role and a live agent instance.
struct AgentHandle {
    agent: Arc<dyn Agent>,
    status: AgentStatus,
}

/// Lifecycle container for agent instances.
pub struct AgentRegistry {
    handles: RwLock<Vec<AgentHandle>>,
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self {
            handles: RwLock::new(Vec::new()),
        }
    }

    /// Register an agent. Registration order is also shutdown order
    /// (reversed).
    pub async fn register(&self, agent: Arc<dyn Agent>) {
        let mut handles = self.handles.write().await;
        handles.push(AgentHandle {
            agent,
            status: AgentStatus::Created,
        });
    }

    /// Initialize every registered agent once.
    ///
    /// Failures are tolerated per agent: a failing agent is marked
    /// degraded and skipped by dispatch, and the count of healthy agents
    /// is returned. Only a fully empty active set is fatal to the caller.
    pub async fn initialize_all(&self) -> usize {
        let mut handles = self.handles.write().await;
        let mut healthy = 0;
        for handle in handles.iter_mut() {
            if handle.status != AgentStatus::Created {
                // Idempotent: a second initialize pass never re-runs agents.
                if handle.status == AgentStatus::Idle {
                    healthy += 1;
                }
                continue;
            }
            let role = handle.agent.role();
            match handle.agent.initialize().await {
                Ok(()) => {
                    handle.status = AgentStatus::Idle;
                    healthy += 1;
                    info!(role = %role, "agent initialized");
                }
                Err(e) => {
                    handle.status = AgentStatus::Degraded;
                    warn!(role = %role, error = %e, "agent failed to initialize, running degraded");
                }
            }
        }
        healthy
    }

    /// Roles with at least one healthy agent.
    pub async fn active_roles(&self) -> Vec<AgentRole> {
        let handles = self.handles.read().await;
        let mut roles: Vec<AgentRole> = Vec::new();
        for handle in handles.iter() {
            let role = handle.agent.role();
            let healthy = handle.status == AgentStatus::Idle || handle.status == AgentStatus::Busy;
            if healthy && !roles.contains(&role) {
                roles.push(role);
            }
        }
        roles
    }

    /// Number of agents in the active set.
    pub async fn active_count(&self) -> usize {
        let handles = self.handles.read().await;
        handles
            .iter()
            .filter(|h| h.status == AgentStatus::Idle || h.status == AgentStatus::Busy)
            .count()
    }

    /// Total registered agents, including degraded ones.
    pub async fn registered_count(&self) -> usize {
        self.handles.read().await.len()
    }

    /// Execute a task on a healthy agent for the role.
    ///
    /// Failures never cross this boundary as panics; the agent's error is
    /// returned as a typed result. An unknown or fully degraded role
    /// yields `AgentNotFound`.
    pub async fn execute(&self, role: AgentRole, task: &Task) -> DomainResult<Task> {
        let agent = {
            let handles = self.handles.read().await;
            handles
                .iter()
                .find(|h| {
                    h.agent.role() == role
                        && (h.status == AgentStatus::Idle || h.status == AgentStatus::Busy)
                })
                .map(|h| Arc::clone(&h.agent))
        };
        let Some(agent) = agent else {
            return Err(DomainError::AgentNotFound(role.as_str().to_string()));
        };
        agent.execute_task(task).await
    }

    /// Shut down all agents in reverse registration order.
    pub async fn shutdown_all(&self) {
        let mut handles = self.handles.write().await;
        for handle in handles.iter_mut().rev() {
            if handle.status == AgentStatus::Terminated {
                continue;
            }
            let role = handle.agent.role();
            if let Err(e) = handle.agent.shutdown().await {
                warn!(role = %role, error = %e, "agent shutdown reported an error");
            }
            handle.status = AgentStatus::Terminated;
        }
        info!("agent registry shut down");
    }
}
