//! Priority-promoted FIFO task queue.
//!
//! Tasks are held in priority bands: a Critical or Emergency task is
//! dequeued before anything lower regardless of arrival order, while
//! tasks with equal priority keep stable FIFO ordering. A task id appears
//! at most once in the queue at any time.

use std::collections::VecDeque;
use uuid::Uuid;

use crate::domain::models::{Task, TaskPriority};

#[derive(Debug, Clone)]
struct QueueItem {
    priority: TaskPriority,
    task: Task,
}

/// Ordered holding area for tasks awaiting dispatch.
#[derive(Debug, Clone, Default)]
pub struct TaskQueue {
    items: VecDeque<QueueItem>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self {
            items: VecDeque::new(),
        }
    }

    /// Add a task to the queue at its priority position.
    ///
    /// Returns false without modifying the queue when the task id is
    /// already queued. Equal-priority items preserve arrival order: the
    /// new item is inserted after the last existing item of its band.
    pub fn enqueue(&mut self, task: Task) -> bool {
        if self.contains(task.id) {
            return false;
        }

        let priority = task.priority;
        let position = self
            .items
            .iter()
            .position(|existing| existing.priority < priority)
            .unwrap_or(self.items.len());

        self.items.insert(position, QueueItem { priority, task });
        true
    }

    /// Remove and return the highest-priority task. Never blocks.
    pub fn dequeue_next(&mut self) -> Option<Task> {
        self.items.pop_front().map(|item| item.task)
    }

    /// Reference the next task without removing it.
    pub fn peek(&self) -> Option<&Task> {
        self.items.front().map(|item| &item.task)
    }

    /// Remove a task by id. Returns whether anything was removed.
    pub fn remove(&mut self, task_id: Uuid) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.task.id != task_id);
        self.items.len() != before
    }

    /// Whether the given task id is queued.
    pub fn contains(&self, task_id: Uuid) -> bool {
        self.items.iter().any(|item| item.task.id == task_id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterate queued tasks in dequeue order.
    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.items.iter().map(|item| &item.task)
    }

    /// Re-seat tasks whose stored priority no longer matches the task.
    ///
    /// The optimizer mutates task priorities in place (aging promotion);
    /// this restores the ordering invariant without disturbing the
    /// relative order of untouched items.
    pub fn resort(&mut self) {
        let stale: Vec<Task> = {
            let mut out = Vec::new();
            let mut i = 0;
            while i < self.items.len() {
                if self.items[i].priority != self.items[i].task.priority {
                    if let Some(item) = self.items.remove(i) {
                        out.push(item.task);
                        continue;
                    }
                }
                i += 1;
            }
            out
        };
        for task in stale {
            self.enqueue(task);
        }
    }

    /// Promote a queued task to a new priority band.
    ///
    /// Returns false when the id is not queued or the new priority is not
    /// a promotion.
    pub fn promote(&mut self, task_id: Uuid, priority: TaskPriority) -> bool {
        let Some(pos) = self.items.iter().position(|item| item.task.id == task_id) else {
            return false;
        };
        if self.items[pos].priority >= priority {
            return false;
        }
        let Some(mut item) = self.items.remove(pos) else {
            return false;
        };
        item.task.priority = priority;
        self.enqueue(item.task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task_with(title: &str, priority: TaskPriority) -> Task {
        Task::new(title, "").with_priority(priority)
    }

    #[test]
    fn test_priority_promotion_ordering() {
        let mut queue = TaskQueue::new();
        queue.enqueue(task_with("low", TaskPriority::Low));
        queue.enqueue(task_with("critical", TaskPriority::Critical));
        queue.enqueue(task_with("medium", TaskPriority::Medium));

        assert_eq!(queue.dequeue_next().unwrap().title, "critical");
        assert_eq!(queue.dequeue_next().unwrap().title, "medium");
        assert_eq!(queue.dequeue_next().unwrap().title, "low");
        assert!(queue.dequeue_next().is_none());
    }

    #[test]
    fn test_fifo_within_priority_band() {
        let mut queue = TaskQueue::new();
        queue.enqueue(task_with("first", TaskPriority::High));
        queue.enqueue(task_with("second", TaskPriority::High));
        queue.enqueue(task_with("third", TaskPriority::High));

        assert_eq!(queue.dequeue_next().unwrap().title, "first");
        assert_eq!(queue.dequeue_next().unwrap().title, "second");
        assert_eq!(queue.dequeue_next().unwrap().title, "third");
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut queue = TaskQueue::new();
        let task = task_with("once", TaskPriority::Medium);
        assert!(queue.enqueue(task.clone()));
        assert!(!queue.enqueue(task));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_remove_by_id() {
        let mut queue = TaskQueue::new();
        let task = task_with("gone", TaskPriority::Medium);
        let id = task.id;
        queue.enqueue(task);
        queue.enqueue(task_with("stays", TaskPriority::Medium));

        assert!(queue.remove(id));
        assert!(!queue.remove(id));
        assert_eq!(queue.len(), 1);
        assert!(!queue.contains(id));
    }

    #[test]
    fn test_dequeue_empty_returns_none() {
        let mut queue = TaskQueue::new();
        assert!(queue.dequeue_next().is_none());
        assert!(queue.peek().is_none());
    }

    #[test]
    fn test_promote_moves_task_forward() {
        let mut queue = TaskQueue::new();
        queue.enqueue(task_with("head", TaskPriority::High));
        let aged = task_with("aged", TaskPriority::Low);
        let aged_id = aged.id;
        queue.enqueue(aged);

        assert!(queue.promote(aged_id, TaskPriority::Emergency));
        assert_eq!(queue.dequeue_next().unwrap().title, "aged");
    }

    #[test]
    fn test_promote_rejects_demotion_and_unknown() {
        let mut queue = TaskQueue::new();
        let task = task_with("t", TaskPriority::High);
        let id = task.id;
        queue.enqueue(task);

        assert!(!queue.promote(id, TaskPriority::Low));
        assert!(!queue.promote(Uuid::new_v4(), TaskPriority::Critical));
    }

    #[test]
    fn test_resort_restores_invariant() {
        let mut queue = TaskQueue::new();
        queue.enqueue(task_with("a", TaskPriority::Medium));
        let stale = task_with("b", TaskPriority::Low);
        queue.enqueue(stale);

        // Simulate an in-place priority bump that bypassed promote().
        for item in &mut queue.items {
            if item.task.title == "b" {
                item.task.priority = TaskPriority::Critical;
            }
        }
        queue.resort();
        assert_eq!(queue.dequeue_next().unwrap().title, "b");
    }
}
