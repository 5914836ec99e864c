//! ChannelDispatcher - 所有スレッドへの依頼キュー
//!
//! # 学習ポイント
//! - タイマー側（送信）は同期・非ブロッキング（`UnboundedSender::send`）
//! - 所有側（受信）は `OwnerInbox` を自分のループで drain する
//!   - 非同期ループなら `recv().await`
//!   - フレームごとの pump なら `try_recv()`（`Engine::process_pending`）

use tokio::sync::mpsc;

use crate::ports::{DispatchError, ResetDispatcher, ResetRequest};

/// 送信側。Scheduler に `Arc<dyn ResetDispatcher>` として渡す
#[derive(Debug, Clone)]
pub struct ChannelDispatcher {
    tx: mpsc::UnboundedSender<ResetRequest>,
}

/// 受信側。ドメインを所有するスレッドだけが持つ
#[derive(Debug)]
pub struct OwnerInbox {
    rx: mpsc::UnboundedReceiver<ResetRequest>,
}

impl ChannelDispatcher {
    pub fn new() -> (Self, OwnerInbox) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, OwnerInbox { rx })
    }
}

impl ResetDispatcher for ChannelDispatcher {
    fn request_reset(&self, request: ResetRequest) -> Result<(), DispatchError> {
        self.tx
            .send(request)
            .map_err(|_| DispatchError::InboxClosed)
    }
}

impl OwnerInbox {
    /// 次の依頼を待つ。すべての送信側が drop されたら `None`
    pub async fn recv(&mut self) -> Option<ResetRequest> {
        self.rx.recv().await
    }

    /// 溜まっている依頼を 1 件取り出す（待たない）
    pub fn try_recv(&mut self) -> Option<ResetRequest> {
        self.rx.try_recv().ok()
    }
}
