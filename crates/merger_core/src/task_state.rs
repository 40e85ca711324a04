use std::fmt;

use serde::Serialize;

/// Lifecycle of the single task a controller runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum TaskState {
    #[default]
    Idle,
    Starting,
    Running,
    /// Never entered; cancellation surfaces as [`TaskState::Cancelled`].
    Cancelling,
    Completed,
    Faulted,
    Cancelled,
}

impl TaskState {
    pub fn is_busy(self) -> bool {
        matches!(self, TaskState::Starting | TaskState::Running)
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Faulted | TaskState::Cancelled
        )
    }
}

/// Why a task ended in [`TaskState::Faulted`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum TaskFault {
    /// The work returned a failure message.
    Failed(String),
    /// The work panicked.
    Panicked(String),
    /// The worker thread could not be started.
    Spawn(String),
}

impl TaskFault {
    pub fn message(&self) -> &str {
        match self {
            TaskFault::Failed(msg) | TaskFault::Panicked(msg) | TaskFault::Spawn(msg) => msg,
        }
    }
}

impl fmt::Display for TaskFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskFault::Failed(msg) => write!(f, "{msg}"),
            TaskFault::Panicked(msg) => write!(f, "task panicked: {msg}"),
            TaskFault::Spawn(msg) => write!(f, "could not start worker: {msg}"),
        }
    }
}

/// One observed state transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateChange {
    pub previous: TaskState,
    pub current: TaskState,
    pub fault: Option<TaskFault>,
}
