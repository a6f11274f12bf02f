//! Shared test agents.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use taskweave::domain::errors::{DomainError, DomainResult};
use taskweave::domain::models::{AgentRole, AgentStatus, Capability, Task};
use taskweave::domain::ports::Agent;

/// An agent that follows a fixed script: optional startup delay per
/// execution and an optional scripted failure.
pub struct ScriptedAgent {
    role: AgentRole,
    delay: Option<Duration>,
    fail_with: Option<String>,
    executed: AtomicUsize,
}

impl ScriptedAgent {
    pub fn new(role: AgentRole) -> Self {
        Self {
            role,
            delay: None,
            fail_with: None,
            executed: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn failing_with(mut self, error: impl Into<String>) -> Self {
        self.fail_with = Some(error.into());
        self
    }

    pub fn executions(&self) -> usize {
        self.executed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Agent for ScriptedAgent {
    fn role(&self) -> AgentRole {
        self.role
    }

    fn capabilities(&self) -> Vec<Capability> {
        vec![Capability::new(self.role.as_str())]
    }

    async fn initialize(&self) -> DomainResult<()> {
        Ok(())
    }

    async fn execute_task(&self, task: &Task) -> DomainResult<Task> {
        self.executed.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = &self.fail_with {
            return Err(DomainError::ExecutionFailed(error.clone()));
        }
        let mut updated = task.clone();
        updated.advance_progress(1.0);
        Ok(updated)
    }

    async fn shutdown(&self) -> DomainResult<()> {
        Ok(())
    }

    async fn status(&self) -> AgentStatus {
        AgentStatus::Idle
    }
}

/// Fails the first `failures` executions, then succeeds.
pub struct FlakyAgent {
    role: AgentRole,
    failures: usize,
    executed: AtomicUsize,
}

impl FlakyAgent {
    pub fn new(role: AgentRole, failures: usize) -> Self {
        Self {
            role,
            failures,
            executed: AtomicUsize::new(0),
        }
    }

    pub fn executions(&self) -> usize {
        self.executed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Agent for FlakyAgent {
    fn role(&self) -> AgentRole {
        self.role
    }

    fn capabilities(&self) -> Vec<Capability> {
        vec![Capability::new(self.role.as_str())]
    }

    async fn initialize(&self) -> DomainResult<()> {
        Ok(())
    }

    async fn execute_task(&self, task: &Task) -> DomainResult<Task> {
        let attempt = self.executed.fetch_add(1, Ordering::SeqCst);
        if attempt < self.failures {
            return Err(DomainError::ExecutionFailed(format!(
                "scripted failure {attempt}"
            )));
        }
        let mut updated = task.clone();
        updated.advance_progress(1.0);
        Ok(updated)
    }

    async fn shutdown(&self) -> DomainResult<()> {
        Ok(())
    }

    async fn status(&self) -> AgentStatus {
        AgentStatus::Idle
    }
}

/// Convenience wrapper usable where `Arc<dyn Agent>` is needed.
pub fn arc_agent<A: Agent + 'static>(agent: A) -> Arc<dyn Agent> {
    Arc::new(agent)
}
