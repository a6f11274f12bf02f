//! Orchestrator configuration model.
//!
//! Loaded by `infrastructure::config::ConfigLoader` with hierarchical
//! merging (defaults, YAML file, `TASKWEAVE_*` environment variables).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::domain::models::agent::AgentRole;

/// Top-level configuration for the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Maximum tasks that may run concurrently across all agents
    pub max_concurrent_tasks: usize,
    /// Per-role concurrent-task capacity; roles absent here fall back to 1
    pub role_capacity: HashMap<String, usize>,
    /// Role returned by the decision engine on ties and zero matches
    pub default_role: AgentRole,
    /// Maximum retry attempts per task before giving up
    pub max_retries: u32,
    /// Seconds an in-progress task may run before it is treated as failed
    pub task_timeout_secs: u64,
    /// Seconds to wait for in-flight tasks to drain during shutdown
    pub shutdown_grace_secs: u64,
    /// Health monitor sampling interval in milliseconds
    pub health_interval_ms: u64,
    /// Load fraction above which the system is considered stressed
    pub stress_load_threshold: f64,
    /// Tracked in-memory entries above which the system is considered stressed
    pub stress_entry_threshold: usize,
    /// Optimizer loop interval in milliseconds
    pub optimizer_interval_ms: u64,
    /// Pending age in seconds after which the optimizer promotes a task one band
    pub promotion_age_secs: u64,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: 8,
            role_capacity: AgentRole::priority_order()
                .iter()
                .map(|r| (r.as_str().to_string(), 2))
                .collect(),
            default_role: AgentRole::Decision,
            max_retries: 3,
            task_timeout_secs: 300,
            shutdown_grace_secs: 5,
            health_interval_ms: 1000,
            stress_load_threshold: 0.85,
            stress_entry_threshold: 10_000,
            optimizer_interval_ms: 500,
            promotion_age_secs: 600,
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Capacity for a role, defaulting to 1 when unconfigured.
    pub fn capacity_for(&self, role: AgentRole) -> usize {
        self.role_capacity.get(role.as_str()).copied().unwrap_or(1)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Output format: json or pretty
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
