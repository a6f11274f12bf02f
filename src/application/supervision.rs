//! Background supervision loops.
//!
//! Two loops run for the lifetime of an active orchestrator:
//!
//! - the health monitor samples system metrics on a fixed interval,
//!   replaces the health snapshot wholesale, and routes timed-out tasks
//!   through the failure funnel;
//! - the optimizer re-evaluates the queue: it promotes tasks that have
//!   aged past the configured threshold and dispatches ready work up to
//!   the free capacity.
//!
//! Both loops select! on the shutdown watch channel and stop cleanly
//! when the orchestrator leaves `Active`.

use chrono::{Duration as ChronoDuration, Utc};
use std::time::Duration;
use tokio::time::interval;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::errors::DomainError;
use crate::domain::models::{
    HealthLevel, SystemHealth, SystemMetrics, TaskPriority, TaskStatus,
};

use super::orchestrator::{dependency_state, DependencyState, Orchestrator};

#[allow(clippy::cast_precision_loss)]
fn mean_latency_ms(ledger: &[crate::domain::models::TaskExecution]) -> f64 {
    if ledger.is_empty() {
        return 0.0;
    }
    ledger.iter().map(|e| e.latency_ms() as f64).sum::<f64>() / ledger.len() as f64
}

/// The next priority band up, if any.
fn next_band(priority: TaskPriority) -> Option<TaskPriority> {
    match priority {
        TaskPriority::Low => Some(TaskPriority::Medium),
        TaskPriority::Medium => Some(TaskPriority::High),
        TaskPriority::High => Some(TaskPriority::Critical),
        TaskPriority::Critical => Some(TaskPriority::Emergency),
        TaskPriority::Emergency => None,
    }
}

impl Orchestrator {
    /// Spawn the health and optimizer loops, once per lifetime.
    pub(super) async fn spawn_loops(&self) {
        let mut loops = self.loops.lock().await;
        if !loops.is_empty() {
            return;
        }
        let health = self.clone();
        loops.push(tokio::spawn(async move { health.health_loop().await }));
        let optimizer = self.clone();
        loops.push(tokio::spawn(async move { optimizer.optimizer_loop().await }));
        info!("supervision loops started");
    }

    async fn health_loop(self) {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let mut tick = interval(Duration::from_millis(self.config.health_interval_ms));
        loop {
            tokio::select! {
                _ = tick.tick() => {
                    self.sample_health().await;
                    self.reap_timed_out().await;
                }
                _ = shutdown_rx.changed() => break,
            }
        }
        debug!("health monitor stopped");
    }

    async fn optimizer_loop(self) {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let mut tick = interval(Duration::from_millis(self.config.optimizer_interval_ms));
        loop {
            tokio::select! {
                _ = tick.tick() => {
                    self.promote_aged().await;
                    self.dispatch_ready().await;
                }
                _ = shutdown_rx.changed() => break,
            }
        }
        debug!("optimizer stopped");
    }

    /// Sample metrics from internal accounting and replace the health
    /// snapshot wholesale.
    pub(super) async fn sample_health(&self) {
        let status = *self.status.read().await;
        let metrics = {
            let state = self.state.read().await;
            let running_tasks = state
                .tasks
                .values()
                .filter(|t| t.status == TaskStatus::InProgress)
                .count();
            let avg_latency_ms = mean_latency_ms(&state.ledger);
            let tracked_entries = state.tasks.len()
                + state.ledger.len()
                + self.recovery.lock().await.snapshot().len();
            #[allow(clippy::cast_precision_loss)]
            let load = if self.config.max_concurrent_tasks == 0 {
                0.0
            } else {
                running_tasks as f64 / self.config.max_concurrent_tasks as f64
            };
            SystemMetrics {
                load,
                tracked_entries,
                avg_latency_ms,
                running_tasks,
                queued_tasks: state.queue.len(),
                active_agents: self.registry.active_count().await,
                sampled_at: Utc::now(),
            }
        };

        let level = if metrics.load > self.config.stress_load_threshold
            || metrics.tracked_entries > self.config.stress_entry_threshold
        {
            HealthLevel::Stressed
        } else {
            HealthLevel::Healthy
        };
        if level == HealthLevel::Stressed {
            warn!(
                load = metrics.load,
                tracked = metrics.tracked_entries,
                "system stressed, non-urgent dispatch paused"
            );
        }

        *self.health.write().await = SystemHealth::new(status, level, metrics);
    }

    /// Route orphaned in-progress tasks past the timeout through the
    /// failure funnel.
    ///
    /// A task holding a resource slot is owned by a live dispatch, which
    /// enforces its own timeout; reaping it here would reset the task
    /// under the dispatcher's feet and double-count the attempt. Only
    /// slotless tasks (a dispatcher that died mid-flight) are reaped.
    async fn reap_timed_out(&self) {
        #[allow(clippy::cast_possible_wrap)]
        let cutoff = Utc::now() - ChronoDuration::seconds(self.config.task_timeout_secs as i64);
        let timed_out: Vec<Uuid> = {
            let state = self.state.read().await;
            state
                .tasks
                .values()
                .filter(|t| {
                    t.status == TaskStatus::InProgress
                        && t.started_at.is_some_and(|s| s < cutoff)
                        && !self.resources.holds(t.id)
                })
                .map(|t| t.id)
                .collect()
        };
        for id in timed_out {
            warn!(task_id = %id, "orphaned task exceeded timeout");
            if let Err(e) = self.handle_failure(id, DomainError::TaskTimeout(id)).await {
                warn!(task_id = %id, error = %e, "timeout recovery failed");
            }
        }
    }

    /// Bump queued tasks that have waited past the promotion age one band.
    async fn promote_aged(&self) {
        #[allow(clippy::cast_possible_wrap)]
        let cutoff = Utc::now() - ChronoDuration::seconds(self.config.promotion_age_secs as i64);
        let mut state = self.state.write().await;
        let promotions: Vec<(Uuid, TaskPriority)> = state
            .queue
            .iter()
            .filter(|t| t.created_at < cutoff)
            .filter_map(|t| next_band(t.priority).map(|p| (t.id, p)))
            .collect();
        for (id, priority) in promotions {
            if state.queue.promote(id, priority) {
                if let Some(task) = state.tasks.get_mut(&id) {
                    task.priority = priority;
                }
                debug!(task_id = %id, priority = priority.as_str(), "aged task promoted");
            }
        }
        // Re-seat anything whose priority changed outside promote().
        state.queue.resort();
    }

    /// Dispatch queued tasks whose dependencies are met, up to the free
    /// capacity. Under stress only urgent priority bands dispatch; tasks
    /// whose dependencies failed are failed rather than left to wait
    /// forever.
    async fn dispatch_ready(&self) {
        let stressed = self.health.read().await.is_stressed();
        let free = self
            .config
            .max_concurrent_tasks
            .saturating_sub(self.resources.running_count());
        if free == 0 {
            return;
        }

        let (ready, dead) = {
            let state = self.state.read().await;
            let mut ready = Vec::new();
            let mut dead = Vec::new();
            for task in state.queue.iter() {
                if stressed && !task.priority.is_urgent() {
                    continue;
                }
                match dependency_state(task, &state.tasks) {
                    DependencyState::Ready => {
                        ready.push(task.id);
                        if ready.len() >= free {
                            break;
                        }
                    }
                    DependencyState::Waiting => {}
                    // A task whose dependency terminally failed can never run.
                    DependencyState::Abandoned => dead.push(task.id),
                }
            }
            (ready, dead)
        };

        for id in dead {
            warn!(task_id = %id, "dependency failed, task abandoned");
            if let Err(e) = self
                .handle_failure(
                    id,
                    DomainError::ValidationFailed("dependency failed or cancelled".to_string()),
                )
                .await
            {
                warn!(task_id = %id, error = %e, "dependency failure handling failed");
            }
        }

        for id in ready {
            let this = self.clone();
            tokio::spawn(async move {
                if let Err(e) = this.orchestrate_task(id).await {
                    warn!(task_id = %id, error = %e, "dispatch failed");
                }
            });
        }
    }
}
