//! Adjacency index for "blocks" relations.
//!
//! Design:
//! - Forward edges: task -> tasks it gates (`source -> target`)
//! - Reverse edges: task -> tasks gating it (its dependencies)
//! - Invariant: forward and reverse must be kept in sync
//! - Invariant: the graph stays acyclic (checked before insert)

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use crate::domain::{GraphError, Relation, RelationKind, TaskId};

/// Dependency graph over task ids.
///
/// This graph maintains both forward and reverse edges for efficient lookups:
/// - `forward`: TaskId -> TaskIds it gates (with relation kind)
/// - `reverse`: TaskId -> TaskIds that gate it
#[derive(Debug, Default)]
pub struct DependencyGraph {
    forward: HashMap<TaskId, BTreeMap<TaskId, RelationKind>>,
    reverse: HashMap<TaskId, BTreeSet<TaskId>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, source: TaskId, target: TaskId) -> bool {
        self.forward
            .get(&source)
            .is_some_and(|targets| targets.contains_key(&target))
    }

    /// Insert `source -> target`.
    ///
    /// Returns `Ok(false)` if the relation already exists (no-op).
    /// Rejects self-loops and relations whose target can already reach
    /// the source.
    pub fn add(
        &mut self,
        source: TaskId,
        target: TaskId,
        kind: RelationKind,
    ) -> Result<bool, GraphError> {
        if source == target {
            return Err(GraphError::SelfLoop(source));
        }
        if self.contains(source, target) {
            return Ok(false);
        }
        if self.would_create_cycle(source, target) {
            return Err(GraphError::WouldCreateCycle {
                from: source,
                to: target,
            });
        }

        self.forward.entry(source).or_default().insert(target, kind);
        self.reverse.entry(target).or_default().insert(source);
        Ok(true)
    }

    /// Remove `source -> target`. Returns whether it existed.
    pub fn remove(&mut self, source: TaskId, target: TaskId) -> bool {
        let removed = match self.forward.get_mut(&source) {
            Some(targets) => {
                let removed = targets.remove(&target).is_some();
                if targets.is_empty() {
                    self.forward.remove(&source);
                }
                removed
            }
            None => false,
        };
        if let Some(sources) = self.reverse.get_mut(&target) {
            sources.remove(&source);
            if sources.is_empty() {
                self.reverse.remove(&target);
            }
        }
        removed
    }

    /// Remove every relation touching `task`. Returns the removed relations.
    pub fn remove_task(&mut self, task: TaskId) -> Vec<Relation> {
        let mut removed = Vec::new();
        for target in self.outgoing(task) {
            if let Some(kind) = self.kind(task, target) {
                removed.push(Relation {
                    source: task,
                    target,
                    kind,
                });
            }
            self.remove(task, target);
        }
        for source in self.incoming(task) {
            if let Some(kind) = self.kind(source, task) {
                removed.push(Relation {
                    source,
                    target: task,
                    kind,
                });
            }
            self.remove(source, task);
        }
        removed
    }

    pub fn kind(&self, source: TaskId, target: TaskId) -> Option<RelationKind> {
        self.forward.get(&source)?.get(&target).copied()
    }

    /// Tasks gated directly by `task`.
    pub fn outgoing(&self, task: TaskId) -> Vec<TaskId> {
        self.forward
            .get(&task)
            .map(|targets| targets.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Tasks gating `task` directly.
    pub fn incoming(&self, task: TaskId) -> Vec<TaskId> {
        self.reverse
            .get(&task)
            .map(|sources| sources.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Every task reachable backwards from `task` (all transitive dependencies).
    pub fn upstream(&self, task: TaskId) -> BTreeSet<TaskId> {
        let mut seen = BTreeSet::new();
        let mut queue: VecDeque<TaskId> = self.incoming(task).into();
        while let Some(current) = queue.pop_front() {
            if !seen.insert(current) {
                continue;
            }
            queue.extend(self.incoming(current));
        }
        seen
    }

    /// Endpoints on either side of `task` (undirected adjacency).
    pub fn related(&self, task: TaskId) -> BTreeSet<TaskId> {
        let mut related: BTreeSet<TaskId> = self.outgoing(task).into_iter().collect();
        related.extend(self.incoming(task));
        related
    }

    pub fn relations(&self) -> Vec<Relation> {
        let mut all: Vec<Relation> = self
            .forward
            .iter()
            .flat_map(|(&source, targets)| {
                targets.iter().map(move |(&target, &kind)| Relation {
                    source,
                    target,
                    kind,
                })
            })
            .collect();
        all.sort_by_key(|r| (r.source, r.target));
        all
    }

    pub fn len(&self) -> usize {
        self.forward.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    /// Would adding `source -> target` close a cycle?
    ///
    /// A cycle appears iff `target` can already reach `source`.
    fn would_create_cycle(&self, source: TaskId, target: TaskId) -> bool {
        let mut seen = BTreeSet::new();
        let mut queue = VecDeque::from([target]);
        while let Some(current) = queue.pop_front() {
            if current == source {
                return true;
            }
            if !seen.insert(current) {
                continue;
            }
            queue.extend(self.outgoing(current));
        }
        false
    }
}
