//! SnapshotStore port - スナップショットの永続化先
//!
//! # 実装（impls::json_store）
//! - JsonFileStore: JSON ファイル（一時ファイルに書いてから rename）
//! - InMemorySnapshotStore: テスト用

use async_trait::async_trait;

use crate::persistence::{PersistenceError, Snapshot};

#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn save(&self, snapshot: &Snapshot) -> Result<(), PersistenceError>;

    /// Returns `None` when nothing has been saved yet.
    async fn load(&self) -> Result<Option<Snapshot>, PersistenceError>;
}
