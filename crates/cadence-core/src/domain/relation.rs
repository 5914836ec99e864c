use serde::{Deserialize, Serialize};

use super::ids::TaskId;

/// Kind of a dependency relation. Only `Block` exists today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum RelationKind {
    #[default]
    Block,
}

/// Directed relation `source -> target`: `source` must complete before
/// `target` may complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Relation {
    pub source: TaskId,
    pub target: TaskId,
    pub kind: RelationKind,
}
