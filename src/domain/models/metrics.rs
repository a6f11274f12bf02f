//! System metrics and health snapshots.
//!
//! Snapshots are replaced wholesale on each observation, never partially
//! updated. Metrics are derived from orchestrator-internal accounting
//! (active counts, queue depth, ledger latencies) so health checks stay
//! deterministic.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of the orchestrator as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemStatus {
    /// Constructed but `initialize` not yet called
    Created,
    /// Startup sequence running
    Initializing,
    /// Accepting and dispatching work
    Active,
    /// A sub-component failed to start
    Error,
    /// Graceful shutdown in progress
    ShuttingDown,
    /// Stopped
    Shutdown,
}

impl SystemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Initializing => "initializing",
            Self::Active => "active",
            Self::Error => "error",
            Self::ShuttingDown => "shutting_down",
            Self::Shutdown => "shutdown",
        }
    }
}

/// Point-in-time system metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemMetrics {
    /// Running tasks as a fraction of the concurrent-task cap, in [0, 1]
    pub load: f64,
    /// Entries tracked in memory (tasks + ledger + learning log)
    pub tracked_entries: usize,
    /// Average execution latency over the ledger, milliseconds
    pub avg_latency_ms: f64,
    /// Tasks currently in progress
    pub running_tasks: usize,
    /// Tasks waiting in the queue
    pub queued_tasks: usize,
    /// Agents in the active set
    pub active_agents: usize,
    pub sampled_at: DateTime<Utc>,
}

impl SystemMetrics {
    /// An empty sample for a freshly constructed system.
    pub fn empty() -> Self {
        Self {
            load: 0.0,
            tracked_entries: 0,
            avg_latency_ms: 0.0,
            running_tasks: 0,
            queued_tasks: 0,
            active_agents: 0,
            sampled_at: Utc::now(),
        }
    }
}

/// Health classification derived from a metrics sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthLevel {
    Healthy,
    /// Load or memory above the configured threshold; non-urgent dispatch pauses
    Stressed,
}

/// Point-in-time health snapshot published to observers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemHealth {
    pub status: SystemStatus,
    pub level: HealthLevel,
    pub metrics: SystemMetrics,
}

impl SystemHealth {
    pub fn new(status: SystemStatus, level: HealthLevel, metrics: SystemMetrics) -> Self {
        Self {
            status,
            level,
            metrics,
        }
    }

    pub fn is_stressed(&self) -> bool {
        self.level == HealthLevel::Stressed
    }
}
