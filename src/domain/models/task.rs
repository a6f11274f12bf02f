//! Task domain model.
//!
//! Tasks are discrete units of work that agents execute. A task value is
//! treated as immutable by observers: every field change goes through a
//! method that refreshes `updated_at`, so a snapshot handed out earlier
//! never silently changes underneath its holder.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};

/// Status of a task in the orchestration pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Task is submitted and waiting for dispatch
    Pending,
    /// Task is currently being executed by an agent
    InProgress,
    /// Task execution is suspended; resumable
    Paused,
    /// Task completed successfully
    Completed,
    /// Task failed permanently
    Failed,
    /// Task was cancelled
    Cancelled,
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "in_progress" | "running" => Some(Self::InProgress),
            "paused" => Some(Self::Paused),
            "completed" | "complete" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "cancelled" | "canceled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Valid transitions from this status.
    pub fn valid_transitions(&self) -> Vec<TaskStatus> {
        match self {
            Self::Pending => vec![Self::InProgress, Self::Cancelled],
            Self::InProgress => vec![
                Self::Paused,
                Self::Completed,
                Self::Failed,
                Self::Cancelled,
                // Reset path when resources are unavailable mid-dispatch
                Self::Pending,
            ],
            Self::Paused => vec![Self::InProgress],
            Self::Completed | Self::Failed | Self::Cancelled => vec![],
        }
    }

    pub fn can_transition_to(&self, new_status: Self) -> bool {
        self.valid_transitions().contains(&new_status)
    }
}

/// Priority level for tasks.
///
/// `Critical` and `Emergency` jump the queue ahead of all lower bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low = 1,
    Medium = 2,
    High = 3,
    Critical = 4,
    Emergency = 5,
}

impl Default for TaskPriority {
    fn default() -> Self {
        Self::Medium
    }
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
            Self::Emergency => "emergency",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" | "normal" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" => Some(Self::Critical),
            "emergency" => Some(Self::Emergency),
            _ => None,
        }
    }

    /// Whether this priority band is dispatched even under system stress.
    pub fn is_urgent(&self) -> bool {
        matches!(self, Self::Critical | Self::Emergency)
    }
}

/// A discrete unit of work that can be executed by an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier
    pub id: Uuid,
    /// Human-readable title
    pub title: String,
    /// Detailed description
    pub description: String,
    /// Requested priority
    pub priority: TaskPriority,
    /// Current status
    pub status: TaskStatus,
    /// Task IDs this depends on
    pub depends_on: Vec<Uuid>,
    /// Free-form metadata supplied by the caller or stamped by agents
    pub metadata: HashMap<String, serde_json::Value>,
    /// Completion fraction in [0, 1]; only moves forward except on reset
    pub progress: f64,
    /// When created
    pub created_at: DateTime<Utc>,
    /// When last updated
    pub updated_at: DateTime<Utc>,
    /// When execution started
    pub started_at: Option<DateTime<Utc>>,
    /// When execution reached a terminal state
    pub completed_at: Option<DateTime<Utc>>,
    /// Optional due time
    pub due_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Create a new task with a title and description.
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            description: description.into(),
            priority: TaskPriority::default(),
            status: TaskStatus::default(),
            depends_on: Vec::new(),
            metadata: HashMap::new(),
            progress: 0.0,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
            due_at: None,
        }
    }

    /// Set priority.
    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Add a dependency.
    pub fn with_dependency(mut self, task_id: Uuid) -> Self {
        if !self.depends_on.contains(&task_id) && task_id != self.id {
            self.depends_on.push(task_id);
        }
        self
    }

    /// Set a due time.
    pub fn with_due_at(mut self, due_at: DateTime<Utc>) -> Self {
        self.due_at = Some(due_at);
        self
    }

    /// Attach a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Check if can transition to given status.
    pub fn can_transition_to(&self, new_status: TaskStatus) -> bool {
        self.status.can_transition_to(new_status)
    }

    /// Transition to a new status, enforcing the lifecycle state machine.
    ///
    /// Timestamps are stamped on entry to `InProgress` and on reaching a
    /// terminal state. A reset to `Pending` clears progress and start time;
    /// that is the only path where progress moves backward.
    pub fn transition_to(&mut self, new_status: TaskStatus) -> DomainResult<()> {
        if !self.can_transition_to(new_status) {
            return Err(DomainError::InvalidStateTransition {
                from: self.status.as_str().to_string(),
                to: new_status.as_str().to_string(),
                reason: "edge not defined in task lifecycle".to_string(),
            });
        }

        self.status = new_status;
        self.updated_at = Utc::now();

        match new_status {
            TaskStatus::InProgress => {
                if self.started_at.is_none() {
                    self.started_at = Some(Utc::now());
                }
            }
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled => {
                self.completed_at = Some(Utc::now());
                if new_status == TaskStatus::Completed {
                    self.progress = 1.0;
                }
            }
            TaskStatus::Pending => {
                // Reset path: the task goes back to the queue as if fresh.
                self.progress = 0.0;
                self.started_at = None;
            }
            TaskStatus::Paused => {}
        }

        Ok(())
    }

    /// Advance progress toward completion.
    ///
    /// Progress is clamped to [0, 1] and never moves backward; a lower
    /// value than the current one is ignored.
    pub fn advance_progress(&mut self, progress: f64) {
        let clamped = progress.clamp(0.0, 1.0);
        if clamped > self.progress {
            self.progress = clamped;
            self.updated_at = Utc::now();
        }
    }

    /// Stamp a metadata entry, refreshing `updated_at`.
    pub fn set_metadata(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.metadata.insert(key.into(), value);
        self.updated_at = Utc::now();
    }

    /// Check if task is terminal.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Whether the task declares dependencies.
    pub fn has_dependencies(&self) -> bool {
        !self.depends_on.is_empty()
    }

    /// Validate task invariants before it enters the queue.
    pub fn validate(&self) -> DomainResult<()> {
        if self.title.trim().is_empty() {
            return Err(DomainError::ValidationFailed(
                "task title cannot be empty".to_string(),
            ));
        }
        if self.depends_on.contains(&self.id) {
            return Err(DomainError::ValidationFailed(
                "task cannot depend on itself".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.progress) {
            return Err(DomainError::ValidationFailed(format!(
                "progress {} outside [0, 1]",
                self.progress
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_creation() {
        let task = Task::new("Deploy relay", "Bring up the northern relay station");
        assert_eq!(task.title, "Deploy relay");
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.priority, TaskPriority::Medium);
        assert_eq!(task.progress, 0.0);
    }

    #[test]
    fn test_lifecycle_transitions() {
        let mut task = Task::new("t", "d");

        task.transition_to(TaskStatus::InProgress).unwrap();
        assert!(task.started_at.is_some());

        task.transition_to(TaskStatus::Paused).unwrap();
        task.transition_to(TaskStatus::InProgress).unwrap();

        task.transition_to(TaskStatus::Completed).unwrap();
        assert!(task.completed_at.is_some());
        assert_eq!(task.progress, 1.0);
        assert!(task.is_terminal());
    }

    #[test]
    fn test_illegal_transition_fails_without_mutation() {
        let mut task = Task::new("t", "d");
        task.transition_to(TaskStatus::InProgress).unwrap();
        task.transition_to(TaskStatus::Completed).unwrap();

        let before = task.clone();
        let err = task.transition_to(TaskStatus::InProgress).unwrap_err();
        assert!(matches!(err, DomainError::InvalidStateTransition { .. }));
        assert_eq!(task, before);
    }

    #[test]
    fn test_paused_returns_only_to_in_progress() {
        let mut task = Task::new("t", "d");
        task.transition_to(TaskStatus::InProgress).unwrap();
        task.transition_to(TaskStatus::Paused).unwrap();

        assert!(!task.can_transition_to(TaskStatus::Completed));
        assert!(!task.can_transition_to(TaskStatus::Cancelled));
        assert!(task.can_transition_to(TaskStatus::InProgress));
    }

    #[test]
    fn test_progress_only_moves_forward() {
        let mut task = Task::new("t", "d");
        task.advance_progress(0.6);
        assert_eq!(task.progress, 0.6);

        task.advance_progress(0.3);
        assert_eq!(task.progress, 0.6);

        task.advance_progress(2.0);
        assert_eq!(task.progress, 1.0);
    }

    #[test]
    fn test_reset_to_pending_clears_progress() {
        let mut task = Task::new("t", "d");
        task.transition_to(TaskStatus::InProgress).unwrap();
        task.advance_progress(0.4);

        task.transition_to(TaskStatus::Pending).unwrap();
        assert_eq!(task.progress, 0.0);
        assert!(task.started_at.is_none());
    }

    #[test]
    fn test_validation() {
        let task = Task::new("  ", "d");
        assert!(task.validate().is_err());

        let task = Task::new("ok", "d");
        assert!(task.validate().is_ok());

        let id = Uuid::new_v4();
        let mut task = Task::new("ok", "d");
        task.id = id;
        task.depends_on.push(id);
        assert!(task.validate().is_err());
    }

    #[test]
    fn test_priority_ordering() {
        assert!(TaskPriority::Emergency > TaskPriority::Critical);
        assert!(TaskPriority::Critical > TaskPriority::High);
        assert!(TaskPriority::High > TaskPriority::Medium);
        assert!(TaskPriority::Medium > TaskPriority::Low);
        assert!(TaskPriority::Critical.is_urgent());
        assert!(!TaskPriority::High.is_urgent());
    }
}
