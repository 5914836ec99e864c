//! SnapshotStore の実装
//!
//! - JsonFileStore: pretty JSON。一時ファイルに書いてから rename するので、
//!   書き込み途中でプロセスが落ちても前回のファイルは壊れない
//! - InMemorySnapshotStore: テスト用

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::persistence::{PersistenceError, Snapshot};
use crate::ports::SnapshotStore;

#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl SnapshotStore for JsonFileStore {
    async fn save(&self, snapshot: &Snapshot) -> Result<(), PersistenceError> {
        let body = serde_json::to_vec_pretty(snapshot)?;
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.temp_path();
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        tracing::debug!(path = %self.path.display(), "snapshot saved");
        Ok(())
    }

    async fn load(&self) -> Result<Option<Snapshot>, PersistenceError> {
        let body = match tokio::fs::read(&self.path).await {
            Ok(body) => body,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let snapshot = serde_json::from_slice(&body)?;
        tracing::debug!(path = %self.path.display(), "snapshot loaded");
        Ok(Some(snapshot))
    }
}

/// テスト用: メモリ上に 1 件だけ保持する
#[derive(Debug, Default)]
pub struct InMemorySnapshotStore {
    slot: Mutex<Option<Snapshot>>,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn save(&self, snapshot: &Snapshot) -> Result<(), PersistenceError> {
        *self.slot.lock().await = Some(snapshot.clone());
        Ok(())
    }

    async fn load(&self) -> Result<Option<Snapshot>, PersistenceError> {
        Ok(self.slot.lock().await.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::SNAPSHOT_VERSION;
    use chrono::Utc;

    fn empty_snapshot() -> Snapshot {
        Snapshot {
            version: SNAPSHOT_VERSION,
            saved_at: Utc::now(),
            default_board: None,
            graphs: Vec::new(),
            recurrence: Vec::new(),
            resources: Vec::new(),
            actors: Vec::new(),
            roles: Vec::new(),
        }
    }

    #[tokio::test]
    async fn file_store_saves_and_loads() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("nested").join("tasks.json"));
        let snapshot = empty_snapshot();

        store.save(&snapshot).await.unwrap();

        assert_eq!(store.load().await.unwrap(), Some(snapshot));
        assert!(!store.temp_path().exists());
    }

    #[tokio::test]
    async fn missing_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("absent.json"));

        assert_eq!(store.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn corrupt_file_is_a_json_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        tokio::fs::write(&path, b"{ not json").await.unwrap();

        let result = JsonFileStore::new(path).load().await;
        assert!(matches!(result, Err(PersistenceError::Json(_))));
    }

    #[tokio::test]
    async fn in_memory_store_keeps_last_snapshot() {
        let store = InMemorySnapshotStore::new();
        assert_eq!(store.load().await.unwrap(), None);

        let snapshot = empty_snapshot();
        store.save(&snapshot).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(snapshot));
    }
}
