//! Ports - 抽象化レイヤー
//!
//! エンジンが外部に依存する箇所（時刻・ID・通知・権限・所有スレッド・保存先）
//! を trait として定義します。Engine は `Arc<dyn ...>` を注入されて動きます。

pub mod clock;
pub mod dispatch;
pub mod event_sink;
pub mod id_generator;
pub mod permission;
pub mod snapshot_store;

pub use self::clock::{Clock, FixedClock, SystemClock, TokioClock};
pub use self::dispatch::{DispatchError, ResetDispatcher, ResetOrigin, ResetRequest};
pub use self::event_sink::NotificationSink;
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::permission::CompletionPolicy;
pub use self::snapshot_store::SnapshotStore;
