//! CompletionPolicy の実装

use crate::config::CompletionConfig;
use crate::domain::{ActorId, Task};
use crate::ports::CompletionPolicy;

/// 常に許可
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAll;

impl CompletionPolicy for AllowAll {
    fn may_complete(&self, _task: &Task, _actor: Option<ActorId>) -> bool {
        true
    }
}

/// 担当者だけが完了できる
///
/// 未割り当てのタスクを誰でも完了できるかは `allow_unassigned` で決める。
#[derive(Debug, Clone, Copy)]
pub struct AssigneeOnly {
    pub allow_unassigned: bool,
}

impl CompletionPolicy for AssigneeOnly {
    fn may_complete(&self, task: &Task, actor: Option<ActorId>) -> bool {
        match task.assignee {
            None => self.allow_unassigned,
            Some(assignee) => actor == Some(assignee),
        }
    }
}

/// 設定からポリシーを選ぶ
pub fn policy_from_config(config: &CompletionConfig) -> std::sync::Arc<dyn CompletionPolicy> {
    if config.enforce_assignee {
        std::sync::Arc::new(AssigneeOnly {
            allow_unassigned: config.allow_unassigned,
        })
    } else {
        std::sync::Arc::new(AllowAll)
    }
}
