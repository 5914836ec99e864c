//! Errors - エラー型と分類
//!
//! すべて回復可能なエラーです（呼び出し側が状態を直してから再試行する）。
//! - GraphError: 辺の追加が不変条件（自己ループなし・非巡回）を破る
//! - CompletionError: 完了遷移が拒否された（依存未完了・権限なし・対象なし）
//! - SchedulerError: 繰り返し設定が不正・対象タスクなし・dispose 済み

use std::collections::BTreeSet;

use thiserror::Error;

use super::ids::TaskId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("a task cannot depend on itself: {0}")]
    SelfLoop(TaskId),

    #[error("relation {from} -> {to} would create a dependency cycle")]
    WouldCreateCycle { from: TaskId, to: TaskId },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompletionError {
    /// Carries every open task that gates the target.
    #[error("there are {} uncompleted dependencies", .0.len())]
    UncompletedTasks(BTreeSet<TaskId>),

    #[error("actor is not allowed to complete task {0}")]
    WrongActor(TaskId),

    #[error("task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("completion of {0} must go through try_complete")]
    CompletionMustBeGated(TaskId),
}

impl CompletionError {
    /// Blocking ids for `UncompletedTasks`.
    pub fn blocking_ids(&self) -> Option<&BTreeSet<TaskId>> {
        match self {
            CompletionError::UncompletedTasks(ids) => Some(ids),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    #[error("recurrence interval must be positive")]
    InvalidInterval,

    #[error("auto-reset requires a non-negative delay")]
    MissingResetDelay,

    #[error("notification advance must be between zero and 366 days")]
    InvalidAdvance,

    #[error("no task to attach recurrence to: {0}")]
    UnknownTask(TaskId),

    #[error("scheduler has been disposed")]
    Disposed,
}
