//! Rule-based agent selection.
//!
//! The decision engine classifies a task by keyword scoring over its
//! title and description against a fixed `{keyword set -> role}` table.
//! It is pure and total: it always returns a role, resolving ties and
//! zero-match inputs through a fixed priority order down to a configured
//! default. Determinism here is what makes agent routing reproducible in
//! tests.

use tracing::debug;

use crate::domain::models::{AgentRole, Task};

/// One classification rule: a role and the keywords that vote for it.
#[derive(Debug, Clone)]
pub struct KeywordRule {
    pub role: AgentRole,
    pub keywords: Vec<String>,
}

impl KeywordRule {
    pub fn new(role: AgentRole, keywords: impl IntoIterator<Item = &'static str>) -> Self {
        Self {
            role,
            keywords: keywords.into_iter().map(str::to_string).collect(),
        }
    }
}

/// Deterministic keyword-table classifier behind the `select_agent` contract.
///
/// The table and fallback role are policy, configurable at construction;
/// the built-in table covers the five fixed roles.
#[derive(Debug, Clone)]
pub struct DecisionEngine {
    rules: Vec<KeywordRule>,
    default_role: AgentRole,
}

impl Default for DecisionEngine {
    fn default() -> Self {
        Self::new(Self::builtin_rules(), AgentRole::Decision)
    }
}

impl DecisionEngine {
    pub fn new(rules: Vec<KeywordRule>, default_role: AgentRole) -> Self {
        Self {
            rules,
            default_role,
        }
    }

    pub fn with_default_role(default_role: AgentRole) -> Self {
        Self::new(Self::builtin_rules(), default_role)
    }

    /// The built-in keyword table.
    pub fn builtin_rules() -> Vec<KeywordRule> {
        vec![
            KeywordRule::new(
                AgentRole::ResourceAllocation,
                ["resource", "allocate", "equipment", "budget", "supply", "capacity"],
            ),
            KeywordRule::new(
                AgentRole::Communication,
                ["notify", "message", "report", "announce", "email", "broadcast"],
            ),
            KeywordRule::new(
                AgentRole::Decision,
                ["decide", "evaluate", "assess", "recommend", "prioritize", "choose"],
            ),
            KeywordRule::new(
                AgentRole::HumanLiaison,
                ["approval", "escalate", "human", "sign-off", "review request", "operator"],
            ),
            KeywordRule::new(
                AgentRole::ExecutionQuality,
                ["verify", "quality", "inspect", "audit", "validate", "check"],
            ),
        ]
    }

    pub fn default_role(&self) -> AgentRole {
        self.default_role
    }

    /// Select the best role for a task from the available set.
    ///
    /// Pure and total: always returns a role. Scoring counts keyword hits
    /// in the lowercased title+description; the highest count wins, ties
    /// resolve to the first role in `AgentRole::priority_order`, and zero
    /// matches fall back to the default role (or, when the default is not
    /// in the available set, the first available role in priority order).
    pub fn select_agent(&self, task: &Task, available_roles: &[AgentRole]) -> AgentRole {
        let fallback = self.fallback_role(available_roles);
        if available_roles.is_empty() {
            return fallback;
        }

        let text = format!("{} {}", task.title, task.description).to_lowercase();
        let mut best: Option<(AgentRole, usize)> = None;

        // Iterating in fixed priority order makes the tie-break explicit:
        // the first role reaching the top score keeps it.
        for role in AgentRole::priority_order() {
            if !available_roles.contains(&role) {
                continue;
            }
            let score = self.score_for(role, &text);
            if score > best.map_or(0, |(_, s)| s) {
                best = Some((role, score));
            }
        }

        let selected = best.map_or(fallback, |(role, _)| role);
        debug!(task_id = %task.id, role = %selected, "agent selected");
        selected
    }

    fn score_for(&self, role: AgentRole, text: &str) -> usize {
        self.rules
            .iter()
            .filter(|rule| rule.role == role)
            .flat_map(|rule| rule.keywords.iter())
            .filter(|keyword| text.contains(keyword.as_str()))
            .count()
    }

    fn fallback_role(&self, available_roles: &[AgentRole]) -> AgentRole {
        if available_roles.is_empty() || available_roles.contains(&self.default_role) {
            return self.default_role;
        }
        AgentRole::priority_order()
            .into_iter()
            .find(|r| available_roles.contains(r))
            .unwrap_or(self.default_role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_roles() -> Vec<AgentRole> {
        AgentRole::priority_order().to_vec()
    }

    #[test]
    fn test_resource_keywords_select_resource_allocation() {
        let engine = DecisionEngine::default();
        let task = Task::new("allocate resources for site A", "");
        assert_eq!(
            engine.select_agent(&task, &all_roles()),
            AgentRole::ResourceAllocation
        );
    }

    #[test]
    fn test_selection_is_deterministic() {
        let engine = DecisionEngine::default();
        let task = Task::new("verify and audit the deployment report", "quality check");
        let first = engine.select_agent(&task, &all_roles());
        for _ in 0..20 {
            assert_eq!(engine.select_agent(&task, &all_roles()), first);
        }
    }

    #[test]
    fn test_blank_title_returns_default_role() {
        let engine = DecisionEngine::default();
        let task = Task::new(" ", "");
        assert_eq!(engine.select_agent(&task, &all_roles()), AgentRole::Decision);
    }

    #[test]
    fn test_zero_matches_fall_back_to_default() {
        let engine = DecisionEngine::with_default_role(AgentRole::HumanLiaison);
        let task = Task::new("zzz qqq", "nothing matches here");
        assert_eq!(
            engine.select_agent(&task, &all_roles()),
            AgentRole::HumanLiaison
        );
    }

    #[test]
    fn test_tie_resolves_to_priority_order() {
        let engine = DecisionEngine::default();
        // One keyword hit each for resource allocation and communication.
        let task = Task::new("allocate and notify", "");
        assert_eq!(
            engine.select_agent(&task, &all_roles()),
            AgentRole::ResourceAllocation
        );
    }

    #[test]
    fn test_restricted_role_set() {
        let engine = DecisionEngine::default();
        let task = Task::new("allocate resources", "");
        // Restricted to communication only: the winner must come from the set.
        assert_eq!(
            engine.select_agent(&task, &[AgentRole::Communication]),
            AgentRole::Communication
        );
    }

    #[test]
    fn test_default_outside_available_set_uses_priority_order() {
        let engine = DecisionEngine::default();
        let task = Task::new("xyzzy", "");
        assert_eq!(
            engine.select_agent(&task, &[AgentRole::ExecutionQuality]),
            AgentRole::ExecutionQuality
        );
    }
}
