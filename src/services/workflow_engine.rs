//! Workflow execution engine.
//!
//! Expands a named template into an ordered sequence of agent-bound
//! steps and runs them strictly in declared order. Step failure is
//! fail-fast: the failing step is recorded, the workflow is marked
//! failed, and later steps never run. Which steps succeeded survives in
//! the execution record for diagnosis.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    StepExecution, StepOutcome, Task, WorkflowExecution, WorkflowStatus, WorkflowStep,
    WorkflowTemplate,
};
use crate::services::agent_registry::AgentRegistry;
use crate::services::decision_engine::DecisionEngine;

/// Runs workflow templates against the agent registry.
pub struct WorkflowEngine {
    templates: HashMap<String, WorkflowTemplate>,
    registry: Arc<AgentRegistry>,
    decision: DecisionEngine,
}

impl WorkflowEngine {
    /// Create an engine preloaded with the built-in templates.
    pub fn new(registry: Arc<AgentRegistry>, decision: DecisionEngine) -> Self {
        Self {
            templates: WorkflowTemplate::builtin_templates(),
            registry,
            decision,
        }
    }

    /// Register a template. Templates are immutable once registered;
    /// re-registering an existing id is rejected.
    pub fn register_template(&mut self, template: WorkflowTemplate) -> DomainResult<()> {
        template
            .validate()
            .map_err(DomainError::ValidationFailed)?;
        if self.templates.contains_key(&template.id) {
            return Err(DomainError::ValidationFailed(format!(
                "workflow template {} is already registered",
                template.id
            )));
        }
        self.templates.insert(template.id.clone(), template);
        Ok(())
    }

    pub fn template(&self, id: &str) -> Option<&WorkflowTemplate> {
        self.templates.get(id)
    }

    pub fn template_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.templates.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Execute a template with bound parameters.
    ///
    /// Every run creates a fresh instance id; instances are never reused.
    #[instrument(skip(self, parameters), fields(template = template_id))]
    pub async fn execute(
        &self,
        template_id: &str,
        parameters: HashMap<String, serde_json::Value>,
    ) -> DomainResult<WorkflowExecution> {
        let template = self
            .templates
            .get(template_id)
            .ok_or_else(|| DomainError::WorkflowNotFound(template_id.to_string()))?;

        let mut execution = WorkflowExecution::start(template_id, parameters.clone());
        info!(instance_id = %execution.instance_id, steps = template.steps.len(), "workflow started");

        for step in &template.steps {
            let step_task = Self::step_task(template, step, &parameters);
            // Selection is restricted to the step's required role; routing
            // still goes through the decision engine so custom engines can
            // veto by re-routing within the allowed set.
            let role = self.decision.select_agent(&step_task, &[step.required_role]);
            let started_at = Utc::now();

            match self.registry.execute(role, &step_task).await {
                Ok(_) => {
                    execution.steps.push(StepExecution {
                        step_id: step.id.clone(),
                        role,
                        started_at,
                        finished_at: Utc::now(),
                        outcome: StepOutcome::Succeeded,
                        error: None,
                    });
                }
                Err(e) => {
                    warn!(
                        instance_id = %execution.instance_id,
                        step = %step.id,
                        error = %e,
                        "workflow step failed, aborting remaining steps"
                    );
                    execution.steps.push(StepExecution {
                        step_id: step.id.clone(),
                        role,
                        started_at,
                        finished_at: Utc::now(),
                        outcome: StepOutcome::Failed,
                        error: Some(e.to_string()),
                    });
                    execution.status = WorkflowStatus::Failed;
                    execution.finished_at = Some(Utc::now());
                    return Ok(execution);
                }
            }
        }

        execution.status = WorkflowStatus::Completed;
        execution.finished_at = Some(Utc::now());
        info!(instance_id = %execution.instance_id, "workflow completed");
        Ok(execution)
    }

    /// Build the per-step task handed to the executing agent.
    fn step_task(
        template: &WorkflowTemplate,
        step: &WorkflowStep,
        parameters: &HashMap<String, serde_json::Value>,
    ) -> Task {
        let title = parameters
            .get("title")
            .and_then(|v| v.as_str())
            .map_or_else(
                || format!("{}:{}", template.id, step.id),
                ToString::to_string,
            );
        let description = parameters
            .get("description")
            .and_then(|v| v.as_str())
            .unwrap_or(&template.description)
            .to_string();

        let mut task = Task::new(title, description);
        // Instance parameters first, then step params override.
        for (key, value) in parameters {
            task.metadata.insert(key.clone(), value.clone());
        }
        for (key, value) in &step.params {
            task.metadata.insert(key.clone(), value.clone());
        }
        task
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::AgentRole;
    use crate::services::builtin_agents::BuiltinAgent;

    async fn engine_with_builtins() -> WorkflowEngine {
        let registry = Arc::new(AgentRegistry::new());
        for agent in BuiltinAgent::full_set() {
            registry.register(Arc::new(agent)).await;
        }
        registry.initialize_all().await;
        WorkflowEngine::new(registry, DecisionEngine::default())
    }

    #[tokio::test]
    async fn test_unknown_template_is_not_found() {
        let engine = engine_with_builtins().await;
        let err = engine.execute("no-such", HashMap::new()).await.unwrap_err();
        assert!(matches!(err, DomainError::WorkflowNotFound(_)));
    }

    #[tokio::test]
    async fn test_builtin_template_runs_all_steps_in_order() {
        let engine = engine_with_builtins().await;
        let execution = engine
            .execute("task-assignment", HashMap::new())
            .await
            .unwrap();

        assert_eq!(execution.status, WorkflowStatus::Completed);
        assert_eq!(
            execution.completed_steps(),
            vec!["evaluate", "allocate", "notify"]
        );
        assert!(execution.finished_at.is_some());
    }

    #[tokio::test]
    async fn test_each_run_gets_fresh_instance() {
        let engine = engine_with_builtins().await;
        let a = engine.execute("status-update", HashMap::new()).await.unwrap();
        let b = engine.execute("status-update", HashMap::new()).await.unwrap();
        assert_ne!(a.instance_id, b.instance_id);
    }

    #[tokio::test]
    async fn test_missing_agent_fails_fast() {
        // Registry with only a decision agent; the second step of
        // task-assignment needs resource allocation and must fail.
        let registry = Arc::new(AgentRegistry::new());
        registry
            .register(Arc::new(BuiltinAgent::new(AgentRole::Decision)))
            .await;
        registry.initialize_all().await;
        let engine = WorkflowEngine::new(registry, DecisionEngine::default());

        let execution = engine
            .execute("task-assignment", HashMap::new())
            .await
            .unwrap();

        assert_eq!(execution.status, WorkflowStatus::Failed);
        assert_eq!(execution.completed_steps(), vec!["evaluate"]);
        assert_eq!(execution.failed_step().unwrap().step_id, "allocate");
        // The third step never ran.
        assert_eq!(execution.steps.len(), 2);
    }

    #[tokio::test]
    async fn test_register_template_rejects_duplicates() {
        let mut engine = engine_with_builtins().await;
        let template = WorkflowTemplate::new(
            "custom",
            vec![WorkflowStep::new("only", AgentRole::Decision)],
        );
        engine.register_template(template.clone()).unwrap();
        assert!(engine.register_template(template).is_err());
    }

    #[tokio::test]
    async fn test_parameters_reach_step_tasks() {
        let engine = engine_with_builtins().await;
        let mut params = HashMap::new();
        params.insert("title".to_string(), serde_json::json!("Custom run"));
        params.insert("site".to_string(), serde_json::json!("A"));

        let execution = engine.execute("status-update", params).await.unwrap();
        assert_eq!(execution.status, WorkflowStatus::Completed);
        assert_eq!(execution.parameters["site"], serde_json::json!("A"));
    }
}
