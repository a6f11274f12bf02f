//! Agent roles, capabilities, and runtime status.
//!
//! `AgentRole` is a closed capability set: tasks are matched to agents by
//! role, and the declaration order below doubles as the deterministic
//! tie-break order for agent selection.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Capability tag identifying what kind of work an agent can execute.
///
/// Variant order is load-bearing: `AgentRole::priority_order` resolves
/// selection ties by this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    /// Allocates equipment, personnel, and budget to work items
    ResourceAllocation,
    /// Drafts and routes messages, notifications, and reports
    Communication,
    /// Evaluates options and produces recommendations
    Decision,
    /// Bridges to human operators for approvals and escalations
    HumanLiaison,
    /// Verifies execution output against quality criteria
    ExecutionQuality,
}

impl AgentRole {
    /// All roles in fixed tie-break priority order.
    pub fn priority_order() -> [AgentRole; 5] {
        [
            Self::ResourceAllocation,
            Self::Communication,
            Self::Decision,
            Self::HumanLiaison,
            Self::ExecutionQuality,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ResourceAllocation => "resource_allocation",
            Self::Communication => "communication",
            Self::Decision => "decision",
            Self::HumanLiaison => "human_liaison",
            Self::ExecutionQuality => "execution_quality",
        }
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "resource_allocation" => Ok(Self::ResourceAllocation),
            "communication" => Ok(Self::Communication),
            "decision" => Ok(Self::Decision),
            "human_liaison" => Ok(Self::HumanLiaison),
            "execution_quality" => Ok(Self::ExecutionQuality),
            _ => Err(format!("Invalid agent role: {s}")),
        }
    }
}

/// Skill tier of a capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillTier {
    Basic,
    Proficient,
    Expert,
}

impl Default for SkillTier {
    fn default() -> Self {
        Self::Proficient
    }
}

/// A named skill an agent advertises, with the input and output kinds it
/// accepts and produces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capability {
    pub name: String,
    pub input_kinds: Vec<String>,
    pub output_kinds: Vec<String>,
    pub tier: SkillTier,
}

impl Capability {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            input_kinds: Vec::new(),
            output_kinds: Vec::new(),
            tier: SkillTier::default(),
        }
    }

    pub fn with_io(
        mut self,
        inputs: impl IntoIterator<Item = &'static str>,
        outputs: impl IntoIterator<Item = &'static str>,
    ) -> Self {
        self.input_kinds = inputs.into_iter().map(str::to_string).collect();
        self.output_kinds = outputs.into_iter().map(str::to_string).collect();
        self
    }

    pub fn with_tier(mut self, tier: SkillTier) -> Self {
        self.tier = tier;
        self
    }
}

/// Runtime status of an agent instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    /// Created but not yet initialized
    Created,
    /// Initialized and ready for work
    Idle,
    /// Currently executing a task
    Busy,
    /// Initialization failed; excluded from the active set
    Degraded,
    /// Shut down
    Terminated,
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Idle => write!(f, "idle"),
            Self::Busy => write!(f, "busy"),
            Self::Degraded => write!(f, "degraded"),
            Self::Terminated => write!(f, "terminated"),
        }
    }
}
