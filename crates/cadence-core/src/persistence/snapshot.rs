//! Snapshot DTOs: the persisted shape of an engine.
//!
//! Timestamps are RFC 3339 strings (chrono serde). Durations are stored as
//! whole milliseconds.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{
    ActorId, BoardId, RecurrenceKind, RelationKind, ResourceId, RoleId, TaskId, TaskStatus,
};

/// Layout version written by this crate.
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    /// Board that receives new tasks.
    #[serde(default)]
    pub default_board: Option<BoardId>,
    #[serde(default)]
    pub graphs: Vec<GraphSnapshot>,
    #[serde(default)]
    pub recurrence: Vec<RecurrenceSnapshot>,
    #[serde(default)]
    pub resources: Vec<ResourceSnapshot>,
    #[serde(default)]
    pub actors: Vec<ActorSnapshot>,
    #[serde(default)]
    pub roles: Vec<RoleSnapshot>,
}

impl Snapshot {
    pub fn task_count(&self) -> usize {
        self.graphs.iter().map(|g| g.nodes.len()).sum()
    }

    pub fn edge_count(&self) -> usize {
        self.graphs.iter().map(|g| g.edges.len()).sum()
    }
}

/// One board with its tasks and the relations between them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub id: BoardId,
    pub name: String,
    #[serde(default)]
    pub nodes: Vec<NodeSnapshot>,
    #[serde(default)]
    pub edges: Vec<EdgeSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub task_id: TaskId,
    pub title: String,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub payload: String,
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub assignee: Option<ActorId>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub resource_usages: Vec<ResourceUsageSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceUsageSnapshot {
    pub resource_id: ResourceId,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeSnapshot {
    pub source: TaskId,
    pub target: TaskId,
    #[serde(default)]
    pub kind: RelationKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurrenceSnapshot {
    pub task_id: TaskId,
    pub kind: RecurrenceKind,
    pub interval: u32,
    #[serde(default)]
    pub auto_reset: bool,
    #[serde(default)]
    pub auto_reset_delay_ms: Option<i64>,
    #[serde(default = "default_true")]
    pub notifications_enabled: bool,
    #[serde(default)]
    pub notification_advance_ms: Option<i64>,
    #[serde(default)]
    pub last_notification: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_reset: Option<DateTime<Utc>>,
    #[serde(default)]
    pub next_due: Option<DateTime<Utc>>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSnapshot {
    pub id: ResourceId,
    pub name: String,
    #[serde(default)]
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorSnapshot {
    pub id: ActorId,
    pub name: String,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleSnapshot {
    pub id: RoleId,
    pub name: String,
    #[serde(default)]
    pub strength: i32,
}
