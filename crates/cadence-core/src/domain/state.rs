//! Task status state machine values.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Task status.
///
/// State transitions:
/// - Queued / InProgress / Canceled: reachable directly (`try_set_status`)
/// - * -> Completed: only through `try_complete` (dependency-gated)
/// - Completed -> InProgress: `uncomplete` (never gated)
///
/// Design note: the `completed` flag on `Task` is authoritative for gating;
/// the status and the flag are always updated together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TaskStatus {
    /// Created, not started.
    #[default]
    Queued,

    /// Being worked on (also the state an auto-reset returns a task to).
    InProgress,

    /// Done. Gates dependents open.
    Completed,

    /// Abandoned. Does not block dependents.
    Canceled,
}

impl TaskStatus {
    /// Does this status keep dependents from completing?
    pub fn is_blocking(self) -> bool {
        !matches!(self, TaskStatus::Completed | TaskStatus::Canceled)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Canceled)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Queued => "queued",
            TaskStatus::InProgress => "in-progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Canceled => "canceled",
        };
        f.write_str(s)
    }
}
