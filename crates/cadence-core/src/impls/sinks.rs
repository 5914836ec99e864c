//! NotificationSink の実装

use std::sync::{Mutex, PoisonError};

use tokio::sync::broadcast;

use crate::domain::{Notification, NotificationLevel, NotificationTopic};
use crate::ports::NotificationSink;

/// 通知をログに流すだけの sink
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn notify(&self, n: Notification) {
        let task_id = n.task_id.map(|id| id.to_string()).unwrap_or_default();
        match n.level {
            NotificationLevel::Error => {
                tracing::error!(topic = ?n.topic, task_id = %task_id, "{}", n.message)
            }
            NotificationLevel::Warning => {
                tracing::warn!(topic = ?n.topic, task_id = %task_id, "{}", n.message)
            }
            NotificationLevel::Success | NotificationLevel::Info => {
                tracing::info!(topic = ?n.topic, task_id = %task_id, "{}", n.message)
            }
        }
    }
}

/// UI コレクタ向けのイベントストリーム
///
/// 受信者がいないときの送信は捨てる（通知は best-effort）。
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    tx: broadcast::Sender<Notification>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }
}

impl NotificationSink for BroadcastSink {
    fn notify(&self, notification: Notification) {
        // ignore send error: no subscribers
        let _ = self.tx.send(notification);
    }
}

/// テスト用: 受け取った通知をすべて保持する
#[derive(Debug, Default)]
pub struct CollectingSink {
    received: Mutex<Vec<Notification>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<Notification> {
        self.received
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn with_topic(&self, topic: NotificationTopic) -> Vec<Notification> {
        self.all()
            .into_iter()
            .filter(|n| n.topic == topic)
            .collect()
    }
}

impl NotificationSink for CollectingSink {
    fn notify(&self, notification: Notification) {
        self.received
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notification);
    }
}

/// 複数の sink に同じ通知を配る
pub struct FanOutSink {
    sinks: Vec<std::sync::Arc<dyn NotificationSink>>,
}

impl FanOutSink {
    pub fn new(sinks: Vec<std::sync::Arc<dyn NotificationSink>>) -> Self {
        Self { sinks }
    }
}

impl NotificationSink for FanOutSink {
    fn notify(&self, notification: Notification) {
        for sink in &self.sinks {
            sink.notify(notification.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::Arc;

    fn info(msg: &str) -> Notification {
        Notification::new(
            NotificationLevel::Info,
            NotificationTopic::TaskReset,
            msg,
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn broadcast_sink_delivers_to_subscribers() {
        let sink = BroadcastSink::new(8);
        let mut rx = sink.subscribe();

        sink.notify(info("task reset"));

        let received = rx.recv().await.unwrap();
        assert_eq!(received.message, "task reset");
    }

    #[test]
    fn broadcast_sink_without_subscribers_does_not_fail() {
        let sink = BroadcastSink::new(8);
        sink.notify(info("nobody listens"));
    }

    #[test]
    fn fan_out_reaches_every_sink() {
        let a = Arc::new(CollectingSink::new());
        let b = Arc::new(CollectingSink::new());
        let fan = FanOutSink::new(vec![a.clone(), b.clone(), Arc::new(TracingSink)]);

        fan.notify(info("hello"));

        assert_eq!(a.all().len(), 1);
        assert_eq!(b.with_topic(NotificationTopic::TaskReset).len(), 1);
        assert!(b.with_topic(NotificationTopic::Reminder).is_empty());
    }
}
