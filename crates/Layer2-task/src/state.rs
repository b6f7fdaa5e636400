//! Task state machine

use serde::{Deserialize, Serialize};

/// Lifecycle of a task. Transitions only move forward:
/// `Waiting -> Running -> Completed`, or `Waiting -> Completed` when a
/// queued task is stopped before it was ever admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Queued, no process yet
    Waiting,

    /// Process spawned and not yet finalized
    Running,

    /// Finalized (natural exit, spawn error, or stop)
    Completed,
}

impl TaskStatus {
    /// Check if this is a terminal state (cannot transition further)
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed)
    }

    pub fn is_running(&self) -> bool {
        matches!(self, TaskStatus::Running)
    }

    pub fn is_waiting(&self) -> bool {
        matches!(self, TaskStatus::Waiting)
    }

    /// Whether moving to `next` respects the forward-only ordering
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (TaskStatus::Waiting, TaskStatus::Running)
                | (TaskStatus::Waiting, TaskStatus::Completed)
                | (TaskStatus::Running, TaskStatus::Completed)
        )
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            TaskStatus::Waiting => "waiting",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}
