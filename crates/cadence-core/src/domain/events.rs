//! Events - 通知イベント
//!
//! エンジンは表示をしません。抽象的な `Notification` を `NotificationSink`
//! に送るだけで、UI 側のコレクタが表示方法を決めます。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::TaskId;

/// 通知の重要度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NotificationLevel {
    Success,
    Info,
    Warning,
    Error,
}

impl fmt::Display for NotificationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NotificationLevel::Success => "success",
            NotificationLevel::Info => "info",
            NotificationLevel::Warning => "warning",
            NotificationLevel::Error => "error",
        };
        f.write_str(s)
    }
}

/// 通知の発生源（テストやコレクタでの絞り込み用）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NotificationTopic {
    /// sweep による繰り返しタスクのリマインダ
    Reminder,
    /// auto-reset の実行
    TaskReset,
    /// 完了遷移の結果
    Completion,
    /// スナップショットの読み込み
    Import,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub level: NotificationLevel,
    pub topic: NotificationTopic,
    pub message: String,
    pub task_id: Option<TaskId>,
    pub at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        level: NotificationLevel,
        topic: NotificationTopic,
        message: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            level,
            topic,
            message: message.into(),
            task_id: None,
            at,
        }
    }

    pub fn for_task(mut self, task_id: TaskId) -> Self {
        self.task_id = Some(task_id);
        self
    }
}
