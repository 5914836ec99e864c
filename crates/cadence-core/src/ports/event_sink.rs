//! NotificationSink port - 通知イベントの出口
//!
//! グローバルな通知サービスは持ちません。Engine / Scheduler / CompletionStateMachine
//! は注入された `Arc<dyn NotificationSink>` に送るだけです。
//!
//! # 実装（impls::sinks）
//! - TracingSink: ログに流す
//! - BroadcastSink: UI コレクタ向けのイベントストリーム
//! - CollectingSink: テスト用

use crate::domain::Notification;

/// NotificationSink は通知を受け取る
///
/// タイマースレッドからも呼ばれるので、ブロックしない実装にすること。
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification);
}
