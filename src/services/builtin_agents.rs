//! Built-in rule-based agents, one per role.
//!
//! These are deterministic executors: each stamps role-specific result
//! metadata and progress onto the task and returns the updated value.
//! They exist so the orchestrator is usable out of the box; model-backed
//! agents plug in through the same `Agent` trait.

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::RwLock;
use tracing::debug;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{AgentRole, AgentStatus, Capability, SkillTier, Task};
use crate::domain::ports::Agent;

/// A deterministic rule-based agent for one role.
pub struct BuiltinAgent {
    role: AgentRole,
    status: RwLock<AgentStatus>,
}

impl BuiltinAgent {
    pub fn new(role: AgentRole) -> Self {
        Self {
            role,
            status: RwLock::new(AgentStatus::Created),
        }
    }

    /// One built-in agent per role, in registration order.
    pub fn full_set() -> Vec<Self> {
        AgentRole::priority_order().into_iter().map(Self::new).collect()
    }

    fn result_for(&self, task: &Task) -> serde_json::Value {
        let text = format!("{} {}", task.title, task.description).to_lowercase();
        match self.role {
            AgentRole::ResourceAllocation => {
                let kinds: Vec<&str> = ["equipment", "personnel", "budget", "supply"]
                    .into_iter()
                    .filter(|k| text.contains(k))
                    .collect();
                json!({
                    "allocated": true,
                    "resource_kinds": if kinds.is_empty() { vec!["general"] } else { kinds },
                })
            }
            AgentRole::Communication => json!({
                "message_drafted": true,
                "subject": task.title,
                "channel": if text.contains("broadcast") { "broadcast" } else { "direct" },
            }),
            AgentRole::Decision => json!({
                "recommendation": if task.priority.is_urgent() { "expedite" } else { "proceed" },
                "confidence": if task.description.is_empty() { 0.5 } else { 0.8 },
            }),
            AgentRole::HumanLiaison => json!({
                "approval_requested": true,
                "blocking": task.priority.is_urgent(),
            }),
            AgentRole::ExecutionQuality => json!({
                "inspected": true,
                "issues_found": 0,
            }),
        }
    }
}

#[async_trait]
impl Agent for BuiltinAgent {
    fn role(&self) -> AgentRole {
        self.role
    }

    fn capabilities(&self) -> Vec<Capability> {
        match self.role {
            AgentRole::ResourceAllocation => vec![Capability::new("allocate-resources")
                .with_io(["task"], ["allocation"])
                .with_tier(SkillTier::Proficient)],
            AgentRole::Communication => vec![Capability::new("draft-message")
                .with_io(["task"], ["message"])
                .with_tier(SkillTier::Proficient)],
            AgentRole::Decision => vec![Capability::new("evaluate-options")
                .with_io(["task"], ["recommendation"])
                .with_tier(SkillTier::Expert)],
            AgentRole::HumanLiaison => vec![Capability::new("request-approval")
                .with_io(["task"], ["approval-request"])
                .with_tier(SkillTier::Basic)],
            AgentRole::ExecutionQuality => vec![Capability::new("inspect-output")
                .with_io(["task"], ["quality-report"])
                .with_tier(SkillTier::Proficient)],
        }
    }

    async fn initialize(&self) -> DomainResult<()> {
        let mut status = self.status.write().await;
        *status = AgentStatus::Idle;
        Ok(())
    }

    async fn execute_task(&self, task: &Task) -> DomainResult<Task> {
        {
            let status = self.status.read().await;
            if *status == AgentStatus::Created || *status == AgentStatus::Terminated {
                return Err(DomainError::ExecutionFailed(format!(
                    "agent {} is not initialized",
                    self.role
                )));
            }
        }

        {
            let mut status = self.status.write().await;
            *status = AgentStatus::Busy;
        }

        let mut updated = task.clone();
        updated.set_metadata(
            format!("result:{}", self.role.as_str()),
            self.result_for(task),
        );
        updated.advance_progress(1.0);
        debug!(task_id = %task.id, role = %self.role, "builtin agent executed task");

        {
            let mut status = self.status.write().await;
            *status = AgentStatus::Idle;
        }

        Ok(updated)
    }

    async fn shutdown(&self) -> DomainResult<()> {
        let mut status = self.status.write().await;
        *status = AgentStatus::Terminated;
        Ok(())
    }

    async fn status(&self) -> AgentStatus {
        *self.status.read().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_execute_before_initialize_fails() {
        let agent = BuiltinAgent::new(AgentRole::Decision);
        let task = Task::new("t", "");
        assert!(agent.execute_task(&task).await.is_err());
    }

    #[tokio::test]
    async fn test_execute_stamps_result_metadata() {
        let agent = BuiltinAgent::new(AgentRole::ResourceAllocation);
        agent.initialize().await.unwrap();

        let task = Task::new("allocate equipment", "for the survey team");
        let updated = agent.execute_task(&task).await.unwrap();

        let result = updated.metadata.get("result:resource_allocation").unwrap();
        assert_eq!(result["allocated"], json!(true));
        assert_eq!(updated.progress, 1.0);
        // The input snapshot is untouched.
        assert!(task.metadata.is_empty());
    }

    #[tokio::test]
    async fn test_full_set_covers_every_role() {
        let agents = BuiltinAgent::full_set();
        assert_eq!(agents.len(), 5);
        let roles: Vec<AgentRole> = agents.iter().map(|a| a.role()).collect();
        assert_eq!(roles, AgentRole::priority_order().to_vec());
    }

    #[tokio::test]
    async fn test_status_lifecycle() {
        let agent = BuiltinAgent::new(AgentRole::Communication);
        assert_eq!(agent.status().await, AgentStatus::Created);
        agent.initialize().await.unwrap();
        assert_eq!(agent.status().await, AgentStatus::Idle);
        agent.shutdown().await.unwrap();
        assert_eq!(agent.status().await, AgentStatus::Terminated);
    }
}
