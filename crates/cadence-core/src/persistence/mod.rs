//! Persistence: snapshot layout and the export/import reconciler.

mod reconcile;
mod snapshot;

use thiserror::Error;

pub use reconcile::{IdRemap, ImportReport};
pub use snapshot::{
    ActorSnapshot, EdgeSnapshot, GraphSnapshot, NodeSnapshot, RecurrenceSnapshot,
    ResourceSnapshot, ResourceUsageSnapshot, RoleSnapshot, SNAPSHOT_VERSION, Snapshot,
};

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("snapshot io failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported snapshot version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },
}
