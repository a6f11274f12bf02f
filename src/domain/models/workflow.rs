//! Workflow templates and execution records.
//!
//! A `WorkflowTemplate` is an immutable, named sequence of role-bound
//! steps. Running a template produces a `WorkflowExecution` with a fresh
//! instance id and its own step-execution ledger; instances are never
//! reused.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::models::agent::AgentRole;

/// A single step within a workflow template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStep {
    /// Step identifier, unique within the template
    pub id: String,
    /// Role required to execute this step
    pub required_role: AgentRole,
    /// Parameter bag merged with instance parameters at execution time
    #[serde(default)]
    pub params: HashMap<String, serde_json::Value>,
}

impl WorkflowStep {
    pub fn new(id: impl Into<String>, required_role: AgentRole) -> Self {
        Self {
            id: id.into(),
            required_role,
            params: HashMap::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }
}

/// A named, ordered sequence of role-bound steps. Immutable once registered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowTemplate {
    /// Unique template name (e.g. "task-assignment")
    pub id: String,
    /// Description of when to use this workflow
    #[serde(default)]
    pub description: String,
    /// Ordered list of steps
    pub steps: Vec<WorkflowStep>,
    /// Expected total duration across all steps
    #[serde(with = "duration_secs")]
    pub expected_duration: Duration,
}

impl WorkflowTemplate {
    pub fn new(id: impl Into<String>, steps: Vec<WorkflowStep>) -> Self {
        Self {
            id: id.into(),
            description: String::new(),
            steps,
            expected_duration: Duration::seconds(60),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_expected_duration(mut self, expected_duration: Duration) -> Self {
        self.expected_duration = expected_duration;
        self
    }

    /// The built-in templates registered at orchestrator startup.
    pub fn builtin_templates() -> HashMap<String, WorkflowTemplate> {
        let templates = vec![
            WorkflowTemplate::new(
                "task-assignment",
                vec![
                    WorkflowStep::new("evaluate", AgentRole::Decision),
                    WorkflowStep::new("allocate", AgentRole::ResourceAllocation),
                    WorkflowStep::new("notify", AgentRole::Communication),
                ],
            )
            .with_description(
                "Evaluate a task, allocate resources for it, and notify the assignee",
            )
            .with_expected_duration(Duration::seconds(90)),
            WorkflowTemplate::new(
                "status-update",
                vec![
                    WorkflowStep::new("verify", AgentRole::ExecutionQuality),
                    WorkflowStep::new("broadcast", AgentRole::Communication),
                ],
            )
            .with_description("Verify current execution quality and broadcast a status report")
            .with_expected_duration(Duration::seconds(45)),
            WorkflowTemplate::new(
                "escalation",
                vec![
                    WorkflowStep::new("escalate", AgentRole::HumanLiaison),
                    WorkflowStep::new("decide", AgentRole::Decision),
                    WorkflowStep::new("announce", AgentRole::Communication),
                ],
            )
            .with_description("Escalate to a human operator, record the decision, announce it")
            .with_expected_duration(Duration::seconds(120)),
        ];

        templates.into_iter().map(|t| (t.id.clone(), t)).collect()
    }

    /// Validate template invariants before registration.
    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("workflow template id cannot be empty".to_string());
        }
        if self.steps.is_empty() {
            return Err(format!("workflow template {} has no steps", self.id));
        }
        let mut seen = std::collections::HashSet::new();
        for step in &self.steps {
            if !seen.insert(step.id.as_str()) {
                return Err(format!(
                    "workflow template {} has duplicate step id {}",
                    self.id, step.id
                ));
            }
        }
        Ok(())
    }
}

/// Overall status of a workflow execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Running,
    Completed,
    Failed,
}

/// Outcome of one executed step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    Succeeded,
    Failed,
}

/// Ledger entry for a single step attempt. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepExecution {
    pub step_id: String,
    pub role: AgentRole,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcome: StepOutcome,
    /// Error captured from a failed step
    pub error: Option<String>,
}

/// A template bound to concrete parameters, with its own execution ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowExecution {
    /// Fresh instance id for this run
    pub instance_id: Uuid,
    /// Template this instance was expanded from
    pub template_id: String,
    /// Parameters bound at execution time
    pub parameters: HashMap<String, serde_json::Value>,
    pub status: WorkflowStatus,
    /// Step ledger, in execution order; ends at the failing step on failure
    pub steps: Vec<StepExecution>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl WorkflowExecution {
    pub fn start(template_id: impl Into<String>, parameters: HashMap<String, serde_json::Value>) -> Self {
        Self {
            instance_id: Uuid::new_v4(),
            template_id: template_id.into(),
            parameters,
            status: WorkflowStatus::Running,
            steps: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Ids of steps that completed successfully, in order.
    pub fn completed_steps(&self) -> Vec<&str> {
        self.steps
            .iter()
            .filter(|s| s.outcome == StepOutcome::Succeeded)
            .map(|s| s.step_id.as_str())
            .collect()
    }

    /// The failing step, if the workflow failed.
    pub fn failed_step(&self) -> Option<&StepExecution> {
        self.steps.iter().find(|s| s.outcome == StepOutcome::Failed)
    }
}

/// Serialize `chrono::Duration` as whole seconds.
mod duration_secs {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_i64(d.num_seconds())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = i64::deserialize(d)?;
        Ok(Duration::seconds(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_templates_are_valid() {
        let templates = WorkflowTemplate::builtin_templates();
        assert_eq!(templates.len(), 3);
        for template in templates.values() {
            template.validate().unwrap();
        }
    }

    #[test]
    fn test_template_validation_rejects_duplicates() {
        let template = WorkflowTemplate::new(
            "dup",
            vec![
                WorkflowStep::new("a", AgentRole::Decision),
                WorkflowStep::new("a", AgentRole::Communication),
            ],
        );
        assert!(template.validate().is_err());
    }

    #[test]
    fn test_template_validation_rejects_empty() {
        assert!(WorkflowTemplate::new("empty", vec![]).validate().is_err());
        assert!(WorkflowTemplate::new("  ", vec![WorkflowStep::new("a", AgentRole::Decision)])
            .validate()
            .is_err());
    }

    #[test]
    fn test_execution_instances_are_distinct() {
        let a = WorkflowExecution::start("task-assignment", HashMap::new());
        let b = WorkflowExecution::start("task-assignment", HashMap::new());
        assert_ne!(a.instance_id, b.instance_id);
    }

    #[test]
    fn test_completed_and_failed_step_views() {
        let mut exec = WorkflowExecution::start("t", HashMap::new());
        let now = Utc::now();
        exec.steps.push(StepExecution {
            step_id: "one".to_string(),
            role: AgentRole::Decision,
            started_at: now,
            finished_at: now,
            outcome: StepOutcome::Succeeded,
            error: None,
        });
        exec.steps.push(StepExecution {
            step_id: "two".to_string(),
            role: AgentRole::Communication,
            started_at: now,
            finished_at: now,
            outcome: StepOutcome::Failed,
            error: Some("boom".to_string()),
        });

        assert_eq!(exec.completed_steps(), vec!["one"]);
        assert_eq!(exec.failed_step().unwrap().step_id, "two");
    }
}
