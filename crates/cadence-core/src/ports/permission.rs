//! CompletionPolicy port - 「この actor はこのタスクを完了できるか」
//!
//! 認証・認可は外部の協力者です。エンジンは答えを聞くだけです。
//!
//! # 実装（impls::policies）
//! - AllowAll: 常に許可
//! - AssigneeOnly: 担当者のみ許可（未割り当ての扱いは設定で決める）

use crate::domain::{ActorId, Task};

pub trait CompletionPolicy: Send + Sync {
    fn may_complete(&self, task: &Task, actor: Option<ActorId>) -> bool;
}
