//! The task orchestrator.
//!
//! Central coordinator over the core services: it owns the task table,
//! the priority queue, the execution ledger, and the failure log, and it
//! runs the supervision loops. All orchestrator-wide mutation funnels
//! through one `RwLock`-guarded state struct; read-only queries hand out
//! cloned snapshots.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    AgentRole, Config, HealthLevel, SystemHealth, SystemMetrics, SystemStatus, Task,
    TaskExecution, TaskStatus, WorkflowExecution,
};
use crate::domain::ports::Agent;
use crate::services::{
    AgentRegistry, BuiltinAgent, DecisionEngine, FailureKind, FailureRecovery, RecoveryStrategy,
    ResourceManager, TaskQueue, WorkflowEngine,
};

/// Metadata key counting completed execution attempts.
pub(super) const META_ATTEMPTS: &str = "attempts";
/// Metadata key recording the role a task was last dispatched to.
pub(super) const META_ASSIGNED_ROLE: &str = "assigned_role";
/// Metadata key holding the most recent failure message.
pub(super) const META_LAST_ERROR: &str = "last_error";

/// Readiness of a task's declared dependencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum DependencyState {
    /// Every tracked dependency completed
    Ready,
    /// At least one dependency is still pending or running
    Waiting,
    /// A dependency failed or was cancelled; the task can never run
    Abandoned,
}

/// Classify a task's dependencies against the task table. Ids not in the
/// table are treated as satisfied.
pub(super) fn dependency_state(task: &Task, tasks: &HashMap<Uuid, Task>) -> DependencyState {
    for dep in &task.depends_on {
        match tasks.get(dep).map(|d| d.status) {
            Some(TaskStatus::Completed) | None => {}
            Some(TaskStatus::Failed | TaskStatus::Cancelled) => {
                return DependencyState::Abandoned
            }
            Some(_) => return DependencyState::Waiting,
        }
    }
    DependencyState::Ready
}

/// Mutable orchestrator state. One lock, one writer path.
#[derive(Default)]
pub(super) struct CoreState {
    pub(super) tasks: HashMap<Uuid, Task>,
    pub(super) queue: TaskQueue,
    pub(super) ledger: Vec<TaskExecution>,
}

/// The multi-agent task orchestrator.
///
/// Cheap to clone; all fields are shared handles, so supervision loops
/// and spawned dispatches operate on the same state.
#[derive(Clone)]
pub struct Orchestrator {
    pub(super) config: Arc<Config>,
    pub(super) registry: Arc<AgentRegistry>,
    pub(super) decision: Arc<DecisionEngine>,
    pub(super) resources: Arc<ResourceManager>,
    pub(super) workflows: Arc<WorkflowEngine>,
    pub(super) state: Arc<RwLock<CoreState>>,
    pub(super) recovery: Arc<Mutex<FailureRecovery>>,
    pub(super) status: Arc<RwLock<SystemStatus>>,
    pub(super) health: Arc<RwLock<SystemHealth>>,
    pub(super) shutdown_tx: watch::Sender<bool>,
    pub(super) loops: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl Orchestrator {
    /// Create an orchestrator from configuration. No work starts until
    /// [`initialize`](Self::initialize) is called.
    pub fn new(config: Config) -> Self {
        let role_capacity: HashMap<AgentRole, usize> = AgentRole::priority_order()
            .iter()
            .map(|role| (*role, config.capacity_for(*role)))
            .collect();
        let decision = DecisionEngine::with_default_role(config.default_role);
        let registry = Arc::new(AgentRegistry::new());
        let workflows = Arc::new(WorkflowEngine::new(Arc::clone(&registry), decision.clone()));
        let (shutdown_tx, _) = watch::channel(false);

        Self {
            resources: Arc::new(ResourceManager::new(
                config.max_concurrent_tasks,
                role_capacity,
            )),
            recovery: Arc::new(Mutex::new(FailureRecovery::new(config.max_retries))),
            config: Arc::new(config),
            registry,
            decision: Arc::new(decision),
            workflows,
            state: Arc::new(RwLock::new(CoreState::default())),
            status: Arc::new(RwLock::new(SystemStatus::Created)),
            health: Arc::new(RwLock::new(SystemHealth::new(
                SystemStatus::Created,
                HealthLevel::Healthy,
                SystemMetrics::empty(),
            ))),
            shutdown_tx,
            loops: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Register a custom agent ahead of initialization.
    ///
    /// When any custom agent is registered the built-in set is not
    /// installed; the registry holds exactly the agents provided.
    pub async fn register_agent(&self, agent: Arc<dyn Agent>) -> DomainResult<()> {
        if *self.status.read().await != SystemStatus::Created {
            return Err(DomainError::ValidationFailed(
                "agents must be registered before initialization".to_string(),
            ));
        }
        self.registry.register(agent).await;
        Ok(())
    }

    /// Start the orchestrator: register built-in agents, initialize them,
    /// and spawn the supervision loops.
    ///
    /// Calling this while already active is a no-op; the registry and the
    /// loops are created once per orchestrator lifetime.
    #[instrument(skip(self))]
    pub async fn initialize(&self) -> DomainResult<()> {
        {
            let mut status = self.status.write().await;
            match *status {
                SystemStatus::Active | SystemStatus::Initializing => return Ok(()),
                SystemStatus::ShuttingDown | SystemStatus::Shutdown => {
                    return Err(DomainError::AlreadyShutdown)
                }
                SystemStatus::Created | SystemStatus::Error => {
                    *status = SystemStatus::Initializing;
                }
            }
        }

        if self.registry.registered_count().await == 0 {
            for agent in BuiltinAgent::full_set() {
                self.registry.register(Arc::new(agent) as Arc<dyn Agent>).await;
            }
        }

        let healthy = self.registry.initialize_all().await;
        if healthy == 0 {
            *self.status.write().await = SystemStatus::Error;
            return Err(DomainError::InitializationFailed(
                "no agent initialized successfully".to_string(),
            ));
        }

        self.spawn_loops().await;
        *self.status.write().await = SystemStatus::Active;
        self.sample_health().await;

        info!(
            healthy_agents = healthy,
            max_concurrent = self.config.max_concurrent_tasks,
            "orchestrator active"
        );
        Ok(())
    }

    /// Accept a task for execution. Validates, snapshots it into the task
    /// table, and enqueues it; returns the task id immediately.
    #[instrument(skip(self, task), fields(task_id = %task.id))]
    pub async fn submit_task(&self, task: Task) -> DomainResult<Uuid> {
        self.ensure_active().await?;
        if task.status != TaskStatus::Pending {
            return Err(DomainError::ValidationFailed(format!(
                "task must be pending at submission, not {}",
                task.status.as_str()
            )));
        }
        task.validate()?;

        let mut state = self.state.write().await;
        if state.tasks.contains_key(&task.id) {
            return Err(DomainError::ValidationFailed(format!(
                "task {} already submitted",
                task.id
            )));
        }
        let id = task.id;
        state.queue.enqueue(task.clone());
        state.tasks.insert(id, task);
        info!(queued = state.queue.len(), "task submitted");
        Ok(id)
    }

    /// Dispatch one pending task through selection, admission, and agent
    /// execution.
    ///
    /// When resources are unavailable the task stays pending in the queue
    /// and no execution is recorded. Execution failures funnel through
    /// [`handle_failure`](Self::handle_failure). Returns the task's status
    /// after this dispatch attempt.
    #[instrument(skip(self))]
    pub async fn orchestrate_task(&self, task_id: Uuid) -> DomainResult<TaskStatus> {
        self.ensure_active().await?;

        let (snapshot, deps) = {
            let state = self.state.read().await;
            let task = state
                .tasks
                .get(&task_id)
                .ok_or(DomainError::TaskNotFound(task_id))?;
            if task.status != TaskStatus::Pending {
                return Ok(task.status);
            }
            (task.clone(), dependency_state(task, &state.tasks))
        };
        snapshot.validate()?;

        match deps {
            DependencyState::Ready => {}
            DependencyState::Waiting => {
                debug!("dependencies not yet complete, task stays queued");
                return Ok(TaskStatus::Pending);
            }
            DependencyState::Abandoned => {
                warn!("dependency failed or cancelled, abandoning task");
                return self
                    .handle_failure(
                        task_id,
                        DomainError::ValidationFailed(
                            "dependency failed or cancelled".to_string(),
                        ),
                    )
                    .await;
            }
        }

        let available = self.registry.active_roles().await;
        let role = self.decision.select_agent(&snapshot, &available);

        let verdict = self.resources.try_acquire(&snapshot, role);
        if !verdict.available {
            debug!(
                role = %role,
                available_at = ?verdict.available_at,
                "resources unavailable, task stays queued"
            );
            return Ok(TaskStatus::Pending);
        }

        // Slot held from here on; every exit path must release it.
        let claimed = {
            let mut state = self.state.write().await;
            state.queue.remove(task_id);
            let Some(stored) = state.tasks.get_mut(&task_id) else {
                self.resources.release(task_id);
                return Err(DomainError::TaskNotFound(task_id));
            };
            if stored.status != TaskStatus::Pending {
                self.resources.release(task_id);
                return Ok(stored.status);
            }
            if let Err(e) = stored.transition_to(TaskStatus::InProgress) {
                self.resources.release(task_id);
                return Err(e);
            }
            stored.set_metadata(META_ASSIGNED_ROLE, serde_json::json!(role.as_str()));
            stored.clone()
        };

        let started_at = Utc::now();
        let timeout = Duration::from_secs(self.config.task_timeout_secs);
        let run = tokio::time::timeout(timeout, self.registry.execute(role, &claimed)).await;
        self.resources.release(task_id);

        match run {
            Err(_elapsed) => {
                self.state
                    .write()
                    .await
                    .ledger
                    .push(TaskExecution::failure(
                        task_id,
                        role,
                        started_at,
                        "execution timed out",
                    ));
                self.handle_failure(task_id, DomainError::TaskTimeout(task_id))
                    .await
            }
            Ok(Err(e)) => {
                self.state
                    .write()
                    .await
                    .ledger
                    .push(TaskExecution::failure(task_id, role, started_at, e.to_string()));
                self.handle_failure(task_id, e).await
            }
            Ok(Ok(updated)) => {
                let mut state = self.state.write().await;
                state
                    .ledger
                    .push(TaskExecution::success(task_id, role, started_at));
                let Some(stored) = state.tasks.get_mut(&task_id) else {
                    return Err(DomainError::TaskNotFound(task_id));
                };
                // A cancel or reset that landed while the agent ran wins;
                // the run stays on the ledger but the stored status stands.
                if stored.status != TaskStatus::InProgress {
                    return Ok(stored.status);
                }
                for (key, value) in updated.metadata {
                    stored.metadata.insert(key, value);
                }
                stored.advance_progress(updated.progress);
                stored.transition_to(TaskStatus::Completed)?;
                info!(role = %role, "task completed");
                Ok(TaskStatus::Completed)
            }
        }
    }

    /// Cancel a task.
    ///
    /// Pending tasks leave the queue; in-progress tasks are marked
    /// cancelled and their agent result, if any, is discarded on arrival.
    /// Cancelling a task already in a terminal state reports success.
    #[instrument(skip(self))]
    pub async fn cancel_task(&self, task_id: Uuid) -> DomainResult<()> {
        let mut state = self.state.write().await;
        let stored = state
            .tasks
            .get_mut(&task_id)
            .ok_or(DomainError::TaskNotFound(task_id))?;

        if stored.status.is_terminal() {
            return Ok(());
        }
        stored.transition_to(TaskStatus::Cancelled)?;
        state.queue.remove(task_id);
        info!("task cancelled");
        Ok(())
    }

    /// Run one task through an ad-hoc sequence of roles, fail-fast, with a
    /// ledger entry per hop.
    ///
    /// Admission is gated on the first hop's role; when resources are
    /// unavailable the task stays pending and the unchanged snapshot is
    /// returned.
    #[instrument(skip(self, roles), fields(hops = roles.len()))]
    pub async fn coordinate_agents(
        &self,
        task_id: Uuid,
        roles: &[AgentRole],
    ) -> DomainResult<Task> {
        self.ensure_active().await?;
        if roles.is_empty() {
            return Err(DomainError::ValidationFailed(
                "coordination plan needs at least one role".to_string(),
            ));
        }

        let snapshot = {
            let state = self.state.read().await;
            state
                .tasks
                .get(&task_id)
                .ok_or(DomainError::TaskNotFound(task_id))?
                .clone()
        };
        if snapshot.status != TaskStatus::Pending {
            return Err(DomainError::InvalidStateTransition {
                from: snapshot.status.as_str().to_string(),
                to: TaskStatus::InProgress.as_str().to_string(),
                reason: "coordination starts from a pending task".to_string(),
            });
        }

        let verdict = self.resources.try_acquire(&snapshot, roles[0]);
        if !verdict.available {
            debug!(available_at = ?verdict.available_at, "resources unavailable, coordination deferred");
            return Ok(snapshot);
        }

        let mut current = {
            let mut state = self.state.write().await;
            state.queue.remove(task_id);
            let Some(stored) = state.tasks.get_mut(&task_id) else {
                self.resources.release(task_id);
                return Err(DomainError::TaskNotFound(task_id));
            };
            if let Err(e) = stored.transition_to(TaskStatus::InProgress) {
                self.resources.release(task_id);
                return Err(e);
            }
            stored.clone()
        };

        let timeout = Duration::from_secs(self.config.task_timeout_secs);
        for role in roles {
            let started_at = Utc::now();
            let run = tokio::time::timeout(timeout, self.registry.execute(*role, &current)).await;
            match run {
                Ok(Ok(updated)) => {
                    self.state
                        .write()
                        .await
                        .ledger
                        .push(TaskExecution::success(task_id, *role, started_at));
                    current = updated;
                }
                Ok(Err(e)) => {
                    warn!(role = %role, error = %e, "coordination hop failed");
                    self.resources.release(task_id);
                    return self.fail_coordination(task_id, *role, started_at, e).await;
                }
                Err(_elapsed) => {
                    warn!(role = %role, "coordination hop timed out");
                    self.resources.release(task_id);
                    return self
                        .fail_coordination(
                            task_id,
                            *role,
                            started_at,
                            DomainError::TaskTimeout(task_id),
                        )
                        .await;
                }
            }
        }
        self.resources.release(task_id);

        let mut state = self.state.write().await;
        let Some(stored) = state.tasks.get_mut(&task_id) else {
            return Err(DomainError::TaskNotFound(task_id));
        };
        // A cancel or reset that landed mid-plan wins over completion.
        if stored.status != TaskStatus::InProgress {
            return Ok(stored.clone());
        }
        for (key, value) in current.metadata {
            stored.metadata.insert(key, value);
        }
        stored.advance_progress(current.progress);
        stored.transition_to(TaskStatus::Completed)?;
        info!("coordination completed");
        Ok(stored.clone())
    }

    /// Record a failed coordination hop, funnel it through recovery, and
    /// hand back the task as it stands afterward.
    async fn fail_coordination(
        &self,
        task_id: Uuid,
        role: AgentRole,
        started_at: chrono::DateTime<Utc>,
        error: DomainError,
    ) -> DomainResult<Task> {
        self.state.write().await.ledger.push(TaskExecution::failure(
            task_id,
            role,
            started_at,
            error.to_string(),
        ));
        self.handle_failure(task_id, error).await?;
        let state = self.state.read().await;
        state
            .tasks
            .get(&task_id)
            .cloned()
            .ok_or(DomainError::TaskNotFound(task_id))
    }

    /// The single funnel for execution failures.
    ///
    /// Classifies the error, records it in the learning log, and applies
    /// the chosen recovery: re-queue for retry or reassignment, or mark
    /// the task failed when the attempt budget is spent. Returns the
    /// task's resulting status.
    #[instrument(skip(self, error), fields(error = %error))]
    pub async fn handle_failure(
        &self,
        task_id: Uuid,
        error: DomainError,
    ) -> DomainResult<TaskStatus> {
        let kind = FailureKind::classify(&error);

        let (role, attempts) = {
            let mut state = self.state.write().await;
            let stored = state
                .tasks
                .get_mut(&task_id)
                .ok_or(DomainError::TaskNotFound(task_id))?;
            if stored.status.is_terminal() {
                return Ok(stored.status);
            }
            let attempts = stored
                .metadata
                .get(META_ATTEMPTS)
                .and_then(serde_json::Value::as_u64)
                .unwrap_or(0) as u32
                + 1;
            stored.set_metadata(META_ATTEMPTS, serde_json::json!(attempts));
            stored.set_metadata(META_LAST_ERROR, serde_json::json!(error.to_string()));
            let role = stored
                .metadata
                .get(META_ASSIGNED_ROLE)
                .and_then(|v| v.as_str())
                .and_then(|s| s.parse().ok())
                .unwrap_or(self.config.default_role);
            (role, attempts)
        };

        let strategy = self.recovery.lock().await.decide(kind, role, attempts);

        let mut state = self.state.write().await;
        let stored = state
            .tasks
            .get_mut(&task_id)
            .ok_or(DomainError::TaskNotFound(task_id))?;
        match strategy {
            RecoveryStrategy::Retry | RecoveryStrategy::Reassign => {
                if strategy == RecoveryStrategy::Reassign {
                    // Clear the binding so selection runs fresh next time.
                    stored.metadata.remove(META_ASSIGNED_ROLE);
                }
                if stored.status == TaskStatus::InProgress {
                    stored.transition_to(TaskStatus::Pending)?;
                }
                let task = stored.clone();
                state.queue.enqueue(task);
                warn!(
                    kind = kind.as_str(),
                    attempts, "task re-queued after failure"
                );
                Ok(TaskStatus::Pending)
            }
            RecoveryStrategy::GiveUp => {
                if !stored.status.is_terminal() {
                    stored.transition_to(TaskStatus::Failed)?;
                }
                state.queue.remove(task_id);
                warn!(kind = kind.as_str(), attempts, "task failed permanently");
                Ok(TaskStatus::Failed)
            }
        }
    }

    /// Run a workflow template against the live registry.
    pub async fn execute_workflow(
        &self,
        template_id: &str,
        parameters: HashMap<String, serde_json::Value>,
    ) -> DomainResult<WorkflowExecution> {
        self.ensure_active().await?;
        self.workflows.execute(template_id, parameters).await
    }

    /// Graceful shutdown: stop accepting work, wait out the grace period
    /// for in-flight tasks, force-cancel what remains, then stop the loops
    /// and agents in reverse registration order.
    #[instrument(skip(self))]
    pub async fn shutdown(&self) -> DomainResult<()> {
        {
            let mut status = self.status.write().await;
            if *status == SystemStatus::Shutdown {
                return Ok(());
            }
            *status = SystemStatus::ShuttingDown;
        }
        let _ = self.shutdown_tx.send(true);
        info!(
            grace_secs = self.config.shutdown_grace_secs,
            "shutdown started"
        );

        let deadline =
            tokio::time::Instant::now() + Duration::from_secs(self.config.shutdown_grace_secs);
        loop {
            let in_flight = {
                let state = self.state.read().await;
                state
                    .tasks
                    .values()
                    .filter(|t| t.status == TaskStatus::InProgress)
                    .count()
            };
            if in_flight == 0 || tokio::time::Instant::now() >= deadline {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        let forced = {
            let mut state = self.state.write().await;
            let mut forced = 0;
            let in_flight: Vec<Uuid> = state
                .tasks
                .values()
                .filter(|t| t.status == TaskStatus::InProgress)
                .map(|t| t.id)
                .collect();
            for id in in_flight {
                if let Some(task) = state.tasks.get_mut(&id) {
                    task.transition_to(TaskStatus::Cancelled)?;
                    self.resources.release(id);
                    forced += 1;
                }
            }
            forced
        };
        if forced > 0 {
            warn!(forced, "in-flight tasks force-cancelled at shutdown");
        }

        let handles: Vec<JoinHandle<()>> = self.loops.lock().await.drain(..).collect();
        for result in futures::future::join_all(handles).await {
            if let Err(e) = result {
                warn!(error = %e, "supervision loop ended abnormally");
            }
        }
        self.registry.shutdown_all().await;

        *self.status.write().await = SystemStatus::Shutdown;
        info!("shutdown complete");
        Ok(())
    }

    // -- Read-only accessors; all return cloned snapshots. --

    pub async fn get_task_status(&self, task_id: Uuid) -> DomainResult<TaskStatus> {
        let state = self.state.read().await;
        state
            .tasks
            .get(&task_id)
            .map(|t| t.status)
            .ok_or(DomainError::TaskNotFound(task_id))
    }

    pub async fn task_snapshot(&self, task_id: Uuid) -> DomainResult<Task> {
        let state = self.state.read().await;
        state
            .tasks
            .get(&task_id)
            .cloned()
            .ok_or(DomainError::TaskNotFound(task_id))
    }

    /// Ledger entries for one task, in append order.
    pub async fn task_executions(&self, task_id: Uuid) -> Vec<TaskExecution> {
        let state = self.state.read().await;
        state
            .ledger
            .iter()
            .filter(|e| e.task_id == task_id)
            .cloned()
            .collect()
    }

    pub async fn get_system_health(&self) -> SystemHealth {
        self.health.read().await.clone()
    }

    pub async fn system_status(&self) -> SystemStatus {
        *self.status.read().await
    }

    pub async fn queued_count(&self) -> usize {
        self.state.read().await.queue.len()
    }

    pub(super) async fn ensure_active(&self) -> DomainResult<()> {
        match *self.status.read().await {
            SystemStatus::Active => Ok(()),
            SystemStatus::ShuttingDown | SystemStatus::Shutdown => {
                Err(DomainError::AlreadyShutdown)
            }
            SystemStatus::Created | SystemStatus::Initializing | SystemStatus::Error => {
                Err(DomainError::NotInitialized)
            }
        }
    }
}
