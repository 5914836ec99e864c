//! ResetDispatcher port - 所有スレッドへのリセット依頼
//!
//! Scheduler はタスクを直接変更しません。「リセットが必要」と判断したら
//! `ResetRequest` をこの delegate に渡し、ドメインを所有するスレッドが
//! 自分のループで `Engine::apply_reset` を実行します。
//!
//! # 実装（impls::channel_dispatch）
//! - ChannelDispatcher: mpsc チャネル（所有側は OwnerInbox を drain する）

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::TaskId;

/// リセット依頼の発生源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetOrigin {
    /// タスクごとの one-shot タイマー
    Timer,
    /// 定期 sweep
    Sweep,
    /// 所有スレッドからの明示的なチェック（check_and_reset_task）
    Manual,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetRequest {
    pub task_id: TaskId,
    /// 判断した時刻。適用時の再検証とスタンプ（lastReset）に使う
    pub requested_at: DateTime<Utc>,
    pub origin: ResetOrigin,
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("owner inbox is closed")]
    InboxClosed,
}

/// ResetDispatcher は所有スレッドへリセット依頼を届ける
///
/// # 設計原則
/// - タイマースレッドから呼ばれる。ブロックしないこと
/// - Scheduler のロックを保持したまま呼ばれることはない
pub trait ResetDispatcher: Send + Sync {
    fn request_reset(&self, request: ResetRequest) -> Result<(), DispatchError>;
}
