//! Failure classification and recovery policy.
//!
//! Every task failure is classified into a [`FailureKind`], folded into
//! an in-memory learning log keyed by failure signature, and answered
//! with a [`RecoveryStrategy`]. Retries are bounded; validation failures
//! are never retried because the input will not get better on its own.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use crate::domain::errors::DomainError;
use crate::domain::models::AgentRole;

/// Coarse classification of why a task failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The task exceeded its deadline
    Timeout,
    /// No healthy agent for the required role
    AgentUnavailable,
    /// The task itself is malformed; retrying cannot help
    Validation,
    /// The agent ran and reported an error
    Execution,
}

impl FailureKind {
    /// Map a domain error to its failure class.
    pub fn classify(error: &DomainError) -> Self {
        match error {
            DomainError::TaskTimeout(_) => Self::Timeout,
            DomainError::AgentNotFound(_) => Self::AgentUnavailable,
            DomainError::ValidationFailed(_) | DomainError::InvalidStateTransition { .. } => {
                Self::Validation
            }
            _ => Self::Execution,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::AgentUnavailable => "agent_unavailable",
            Self::Validation => "validation",
            Self::Execution => "execution",
        }
    }
}

/// What the orchestrator should do about a failed task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryStrategy {
    /// Re-queue for another attempt with the same role
    Retry,
    /// Re-queue and let agent selection run again
    Reassign,
    /// Mark the task failed and stop
    GiveUp,
}

/// Key for the learning log: what failed, where.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FailureSignature {
    pub kind: FailureKind,
    pub role: AgentRole,
}

/// Bounded-retry recovery policy with an occurrence log.
///
/// The log survives for the lifetime of the orchestrator and feeds the
/// health report; it is not persisted.
pub struct FailureRecovery {
    max_retries: u32,
    log: HashMap<FailureSignature, u64>,
}

impl FailureRecovery {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            log: HashMap::new(),
        }
    }

    /// Record a failure and decide what to do next.
    ///
    /// `attempts` counts completed attempts including the failing one.
    pub fn decide(
        &mut self,
        kind: FailureKind,
        role: AgentRole,
        attempts: u32,
    ) -> RecoveryStrategy {
        let signature = FailureSignature { kind, role };
        let occurrences = self.log.entry(signature).or_insert(0);
        *occurrences += 1;
        debug!(
            kind = kind.as_str(),
            role = role.as_str(),
            attempts,
            occurrences = *occurrences,
            "failure recorded"
        );

        if attempts >= self.max_retries {
            return RecoveryStrategy::GiveUp;
        }
        match kind {
            FailureKind::Validation => RecoveryStrategy::GiveUp,
            FailureKind::AgentUnavailable => RecoveryStrategy::Reassign,
            FailureKind::Timeout | FailureKind::Execution => RecoveryStrategy::Retry,
        }
    }

    /// How many times this signature has been seen.
    pub fn occurrences(&self, kind: FailureKind, role: AgentRole) -> u64 {
        self.log
            .get(&FailureSignature { kind, role })
            .copied()
            .unwrap_or(0)
    }

    /// Total recorded failures across all signatures.
    pub fn total_failures(&self) -> u64 {
        self.log.values().sum()
    }

    /// Snapshot of the learning log, for reporting.
    pub fn snapshot(&self) -> Vec<(FailureSignature, u64)> {
        let mut entries: Vec<_> = self.log.iter().map(|(k, v)| (*k, *v)).collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1));
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_classification() {
        assert_eq!(
            FailureKind::classify(&DomainError::TaskTimeout(Uuid::new_v4())),
            FailureKind::Timeout
        );
        assert_eq!(
            FailureKind::classify(&DomainError::AgentNotFound("decision".to_string())),
            FailureKind::AgentUnavailable
        );
        assert_eq!(
            FailureKind::classify(&DomainError::ValidationFailed("bad".to_string())),
            FailureKind::Validation
        );
        assert_eq!(
            FailureKind::classify(&DomainError::ExecutionFailed("boom".to_string())),
            FailureKind::Execution
        );
    }

    #[test]
    fn test_retry_until_budget_exhausted() {
        let mut recovery = FailureRecovery::new(3);
        let role = AgentRole::Decision;
        assert_eq!(
            recovery.decide(FailureKind::Execution, role, 1),
            RecoveryStrategy::Retry
        );
        assert_eq!(
            recovery.decide(FailureKind::Execution, role, 2),
            RecoveryStrategy::Retry
        );
        assert_eq!(
            recovery.decide(FailureKind::Execution, role, 3),
            RecoveryStrategy::GiveUp
        );
    }

    #[test]
    fn test_validation_failures_never_retry() {
        let mut recovery = FailureRecovery::new(3);
        assert_eq!(
            recovery.decide(FailureKind::Validation, AgentRole::Communication, 1),
            RecoveryStrategy::GiveUp
        );
    }

    #[test]
    fn test_unavailable_agent_triggers_reassign() {
        let mut recovery = FailureRecovery::new(3);
        assert_eq!(
            recovery.decide(FailureKind::AgentUnavailable, AgentRole::HumanLiaison, 1),
            RecoveryStrategy::Reassign
        );
    }

    #[test]
    fn test_learning_log_counts_occurrences() {
        let mut recovery = FailureRecovery::new(5);
        for attempt in 1..=3 {
            recovery.decide(FailureKind::Timeout, AgentRole::ResourceAllocation, attempt);
        }
        assert_eq!(
            recovery.occurrences(FailureKind::Timeout, AgentRole::ResourceAllocation),
            3
        );
        assert_eq!(
            recovery.occurrences(FailureKind::Timeout, AgentRole::Decision),
            0
        );
        assert_eq!(recovery.total_failures(), 3);
        assert_eq!(recovery.snapshot()[0].1, 3);
    }
}
