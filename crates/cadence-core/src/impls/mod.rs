//! Impls - ポートの実装
//!
//! - **channel_dispatch**: 所有スレッドへの依頼キュー（mpsc）
//! - **sinks**: 通知の出口（tracing / broadcast / テスト用）
//! - **policies**: 完了権限のポリシー
//! - **json_store**: スナップショットの保存先

pub mod channel_dispatch;
pub mod json_store;
pub mod policies;
pub mod sinks;

pub use channel_dispatch::{ChannelDispatcher, OwnerInbox};
pub use json_store::{InMemorySnapshotStore, JsonFileStore};
pub use policies::{AllowAll, AssigneeOnly, policy_from_config};
pub use sinks::{BroadcastSink, CollectingSink, FanOutSink, TracingSink};
