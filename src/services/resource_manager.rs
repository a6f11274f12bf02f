//! Admission gate for task execution.
//!
//! The resource manager decides whether a task may start now or must be
//! deferred. It is synchronous and bounded: all accounting is an
//! in-memory table behind a `std::sync::Mutex`, no I/O. When the
//! accounting cannot be read the manager fails closed and reports the
//! task as deferred rather than optimistically admitting it.

use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use tracing::warn;
use uuid::Uuid;

use crate::domain::models::{AgentRole, Task};

/// How many recent execution latencies feed the availability estimate.
const LATENCY_WINDOW: usize = 32;

/// Result of an availability check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Availability {
    pub available: bool,
    /// Earliest instant resources are expected to free up when deferred;
    /// `None` means unknown, retry later.
    pub available_at: Option<DateTime<Utc>>,
}

impl Availability {
    pub fn now() -> Self {
        Self {
            available: true,
            available_at: None,
        }
    }

    pub fn deferred(available_at: Option<DateTime<Utc>>) -> Self {
        Self {
            available: false,
            available_at,
        }
    }
}

#[derive(Debug)]
struct RunningSlot {
    role: AgentRole,
    started_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Accounting {
    running: HashMap<Uuid, RunningSlot>,
    latencies_ms: VecDeque<i64>,
}

impl Accounting {
    fn role_count(&self, role: AgentRole) -> usize {
        self.running.values().filter(|s| s.role == role).count()
    }

    fn avg_latency(&self) -> Option<Duration> {
        if self.latencies_ms.is_empty() {
            return None;
        }
        #[allow(clippy::cast_possible_wrap)]
        let avg = self.latencies_ms.iter().sum::<i64>() / self.latencies_ms.len() as i64;
        Some(Duration::milliseconds(avg.max(1)))
    }

    /// Earliest expected completion among running tasks, if estimable.
    fn earliest_release(&self) -> Option<DateTime<Utc>> {
        let avg = self.avg_latency()?;
        self.running
            .values()
            .map(|slot| slot.started_at + avg)
            .min()
    }
}

/// Gate deciding whether a task may start now or must be deferred.
pub struct ResourceManager {
    max_concurrent: usize,
    role_capacity: HashMap<AgentRole, usize>,
    inner: Mutex<Accounting>,
}

impl ResourceManager {
    pub fn new(max_concurrent: usize, role_capacity: HashMap<AgentRole, usize>) -> Self {
        Self {
            max_concurrent,
            role_capacity,
            inner: Mutex::new(Accounting::default()),
        }
    }

    fn capacity_for(&self, role: AgentRole) -> usize {
        self.role_capacity.get(&role).copied().unwrap_or(1)
    }

    /// Check whether the task may start now, without reserving a slot.
    ///
    /// The `task` value itself does not affect the verdict today; the
    /// signature keeps room for task-aware admission (deadline
    /// preemption) without changing callers.
    pub fn check_availability(&self, _task: &Task, role: AgentRole) -> Availability {
        let Ok(acct) = self.inner.lock() else {
            // Accounting unreadable: fail closed.
            warn!(role = %role, "resource accounting unavailable, deferring task");
            return Availability::deferred(None);
        };

        if acct.running.len() >= self.max_concurrent || acct.role_count(role) >= self.capacity_for(role)
        {
            return Availability::deferred(acct.earliest_release());
        }
        Availability::now()
    }

    /// Atomically check capacity and reserve a slot for the task.
    ///
    /// Returns the availability verdict; a slot is held only when
    /// `available` is true. This is the orchestrator's dispatch path —
    /// check-then-reserve in one step so two dispatchers cannot admit
    /// past the cap.
    pub fn try_acquire(&self, task: &Task, role: AgentRole) -> Availability {
        let Ok(mut acct) = self.inner.lock() else {
            warn!(role = %role, "resource accounting unavailable, deferring task");
            return Availability::deferred(None);
        };

        if acct.running.len() >= self.max_concurrent || acct.role_count(role) >= self.capacity_for(role)
        {
            return Availability::deferred(acct.earliest_release());
        }

        acct.running.insert(
            task.id,
            RunningSlot {
                role,
                started_at: Utc::now(),
            },
        );
        Availability::now()
    }

    /// Release the slot held by a task and record its observed latency.
    pub fn release(&self, task_id: Uuid) {
        let Ok(mut acct) = self.inner.lock() else {
            return;
        };
        if let Some(slot) = acct.running.remove(&task_id) {
            let latency = (Utc::now() - slot.started_at).num_milliseconds();
            acct.latencies_ms.push_back(latency.max(0));
            if acct.latencies_ms.len() > LATENCY_WINDOW {
                acct.latencies_ms.pop_front();
            }
        }
    }

    /// Whether a task currently holds a reserved slot.
    pub fn holds(&self, task_id: Uuid) -> bool {
        self.inner
            .lock()
            .map(|acct| acct.running.contains_key(&task_id))
            .unwrap_or(false)
    }

    /// Number of currently reserved slots.
    pub fn running_count(&self) -> usize {
        self.inner.lock().map(|acct| acct.running.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(max: usize, per_role: usize) -> ResourceManager {
        let capacity = AgentRole::priority_order()
            .iter()
            .map(|r| (*r, per_role))
            .collect();
        ResourceManager::new(max, capacity)
    }

    #[test]
    fn test_admits_until_global_cap() {
        let mgr = manager(2, 5);
        let a = Task::new("a", "");
        let b = Task::new("b", "");
        let c = Task::new("c", "");

        assert!(mgr.try_acquire(&a, AgentRole::Decision).available);
        assert!(mgr.try_acquire(&b, AgentRole::Communication).available);
        assert!(!mgr.try_acquire(&c, AgentRole::HumanLiaison).available);
    }

    #[test]
    fn test_per_role_capacity() {
        let mgr = manager(10, 1);
        let a = Task::new("a", "");
        let b = Task::new("b", "");

        assert!(mgr.try_acquire(&a, AgentRole::Decision).available);
        let verdict = mgr.try_acquire(&b, AgentRole::Decision);
        assert!(!verdict.available);
        // Another role still has room.
        assert!(mgr.try_acquire(&b, AgentRole::Communication).available);
    }

    #[test]
    fn test_release_frees_slot() {
        let mgr = manager(1, 1);
        let a = Task::new("a", "");
        let b = Task::new("b", "");

        assert!(mgr.try_acquire(&a, AgentRole::Decision).available);
        assert!(!mgr.try_acquire(&b, AgentRole::Decision).available);

        mgr.release(a.id);
        assert!(mgr.try_acquire(&b, AgentRole::Decision).available);
        assert_eq!(mgr.running_count(), 1);
    }

    #[test]
    fn test_available_at_unknown_without_latency_samples() {
        let mgr = manager(1, 1);
        let a = Task::new("a", "");
        assert!(mgr.try_acquire(&a, AgentRole::Decision).available);

        let verdict = mgr.check_availability(&Task::new("b", ""), AgentRole::Decision);
        assert!(!verdict.available);
        assert!(verdict.available_at.is_none());
    }

    #[test]
    fn test_available_at_estimated_from_history() {
        let mgr = manager(1, 1);
        let a = Task::new("a", "");
        assert!(mgr.try_acquire(&a, AgentRole::Decision).available);
        mgr.release(a.id);

        let b = Task::new("b", "");
        assert!(mgr.try_acquire(&b, AgentRole::Decision).available);
        let verdict = mgr.check_availability(&Task::new("c", ""), AgentRole::Decision);
        assert!(!verdict.available);
        assert!(verdict.available_at.is_some());
    }

    #[test]
    fn test_holds_tracks_reservations() {
        let mgr = manager(2, 2);
        let a = Task::new("a", "");
        assert!(!mgr.holds(a.id));
        mgr.try_acquire(&a, AgentRole::Decision);
        assert!(mgr.holds(a.id));
        mgr.release(a.id);
        assert!(!mgr.holds(a.id));
    }

    #[test]
    fn test_check_does_not_reserve() {
        let mgr = manager(1, 1);
        let a = Task::new("a", "");
        assert!(mgr.check_availability(&a, AgentRole::Decision).available);
        assert_eq!(mgr.running_count(), 0);
    }
}
