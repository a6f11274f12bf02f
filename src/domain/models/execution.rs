//! Execution ledger records.
//!
//! A `TaskExecution` is an append-only audit record of one agent run.
//! Entries are never mutated after creation; for a single task they are
//! appended in the order events occurred.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::models::agent::AgentRole;

/// Outcome of a single agent execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ExecutionOutcome {
    Success,
    Failure {
        /// Captured error message from the agent
        error: String,
    },
}

impl ExecutionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Audit record of one agent run against one task. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskExecution {
    pub id: Uuid,
    pub task_id: Uuid,
    pub role: AgentRole,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcome: ExecutionOutcome,
}

impl TaskExecution {
    pub fn success(task_id: Uuid, role: AgentRole, started_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_id,
            role,
            started_at,
            finished_at: Utc::now(),
            outcome: ExecutionOutcome::Success,
        }
    }

    pub fn failure(
        task_id: Uuid,
        role: AgentRole,
        started_at: DateTime<Utc>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_id,
            role,
            started_at,
            finished_at: Utc::now(),
            outcome: ExecutionOutcome::Failure {
                error: error.into(),
            },
        }
    }

    /// Wall-clock latency of this run in milliseconds.
    pub fn latency_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}
