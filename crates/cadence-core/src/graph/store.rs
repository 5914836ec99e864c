//! Task Graph Store: owns every task and every relation.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use super::DependencyGraph;
use crate::domain::{GraphError, Relation, RelationKind, Task, TaskId, TaskStatus};
use crate::ports::IdGenerator;

/// In-memory task graph.
///
/// Design:
/// - Single writer: only the owning thread holds `&mut TaskGraph`.
/// - Deleting a task cascades to its relations so no relation ever dangles.
/// - Status changes go through `CompletionStateMachine`; this store only
///   exposes the raw transition helpers to the crate.
pub struct TaskGraph {
    tasks: BTreeMap<TaskId, Task>,
    relations: DependencyGraph,
    ids: Arc<dyn IdGenerator>,
}

impl TaskGraph {
    pub fn new(ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            tasks: BTreeMap::new(),
            relations: DependencyGraph::new(),
            ids,
        }
    }

    /// Create a task with a freshly generated id.
    pub fn create(&mut self, title: impl Into<String>) -> &Task {
        let id = self.ids.generate_task_id();
        self.tasks.entry(id).or_insert_with(|| Task::new(id, title))
    }

    /// Re-create a task under a known id (snapshot restore).
    ///
    /// Returns the existing task untouched when the id is already taken.
    pub fn restore(&mut self, id: TaskId, title: impl Into<String>) -> &mut Task {
        self.tasks.entry(id).or_insert_with(|| Task::new(id, title))
    }

    /// Delete a task and every relation touching it.
    pub fn delete(&mut self, id: TaskId) -> bool {
        if self.tasks.remove(&id).is_none() {
            return false;
        }
        let removed = self.relations.remove_task(id);
        tracing::debug!(task_id = %id, relations = removed.len(), "deleted task");
        true
    }

    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.tasks.get(&id)
    }

    /// Mutable access for field setters (title, priority, payload, ...).
    pub fn get_mut(&mut self, id: TaskId) -> Option<&mut Task> {
        self.tasks.get_mut(&id)
    }

    pub fn contains(&self, id: TaskId) -> bool {
        self.tasks.contains_key(&id)
    }

    pub fn get_all(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Tasks directly gated by `id` (A -> B: A must complete before B).
    pub fn get_outgoing(&self, id: TaskId) -> Vec<&Task> {
        self.relations
            .outgoing(id)
            .into_iter()
            .filter_map(|target| self.tasks.get(&target))
            .collect()
    }

    /// Direct dependencies of `id`.
    pub fn get_incoming(&self, id: TaskId) -> Vec<&Task> {
        self.relations
            .incoming(id)
            .into_iter()
            .filter_map(|source| self.tasks.get(&source))
            .collect()
    }

    /// Insert `from -> to`.
    ///
    /// - `Ok(false)`: relation already present, nothing changed
    /// - `Err(SelfLoop | WouldCreateCycle)`: rejected, nothing changed
    pub fn add_relation(
        &mut self,
        from: TaskId,
        to: TaskId,
        kind: RelationKind,
    ) -> Result<bool, GraphError> {
        for id in [from, to] {
            if !self.contains(id) {
                return Err(GraphError::TaskNotFound(id));
            }
        }
        let inserted = self.relations.add(from, to, kind)?;
        if inserted {
            tracing::debug!(from = %from, to = %to, ?kind, "added relation");
        }
        Ok(inserted)
    }

    pub fn remove_relation(&mut self, from: TaskId, to: TaskId) -> bool {
        self.relations.remove(from, to)
    }

    pub fn has_relation(&self, from: TaskId, to: TaskId) -> bool {
        self.relations.contains(from, to)
    }

    pub fn relations(&self) -> Vec<Relation> {
        self.relations.relations()
    }

    pub fn relation_count(&self) -> usize {
        self.relations.len()
    }

    /// Tasks connected to `id` in either direction.
    pub fn related(&self, id: TaskId) -> BTreeSet<TaskId> {
        self.relations.related(id)
    }

    /// Tasks that could be newly related to `id`: not `id` itself and not
    /// already related in either direction.
    pub fn available_partners(&self, id: TaskId) -> Vec<&Task> {
        let related = self.related(id);
        self.tasks
            .values()
            .filter(|t| t.id() != id && !related.contains(&t.id()))
            .collect()
    }

    /// Open tasks anywhere upstream of `id`.
    pub(crate) fn open_upstream(&self, id: TaskId) -> BTreeSet<TaskId> {
        self.relations
            .upstream(id)
            .into_iter()
            .filter(|dep| self.tasks.get(dep).is_some_and(Task::is_blocking))
            .collect()
    }

    pub(crate) fn force_status(&mut self, id: TaskId, status: TaskStatus) -> bool {
        let Some(task) = self.tasks.get_mut(&id) else {
            return false;
        };
        if status == TaskStatus::Completed {
            task.mark_completed();
        } else {
            task.set_open_status(status);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{SystemClock, UlidGenerator};

    fn graph() -> TaskGraph {
        TaskGraph::new(Arc::new(UlidGenerator::new(Arc::new(SystemClock))))
    }

    #[test]
    fn create_and_get_all() {
        let mut graph = graph();
        let a = graph.create("A").id();
        let b = graph.create("B").id();

        let ids: Vec<TaskId> = graph.get_all().map(Task::id).collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&a) && ids.contains(&b));
        assert_eq!(graph.get(a).unwrap().title(), "A");
    }

    #[test]
    fn get_outgoing_returns_gated_tasks() {
        let mut graph = graph();
        let a = graph.create("A").id();
        let b = graph.create("B").id();

        graph.add_relation(a, b, RelationKind::Block).unwrap();

        let outgoing: Vec<TaskId> = graph.get_outgoing(a).iter().map(|t| t.id()).collect();
        assert_eq!(outgoing, vec![b]);
        assert!(graph.get_outgoing(b).is_empty());
        assert_eq!(graph.get_incoming(b)[0].id(), a);
    }

    #[test]
    fn relation_to_unknown_task_is_rejected() {
        let mut graph = graph();
        let a = graph.create("A").id();
        let ghost = TaskId::from_ulid(ulid::Ulid::new());

        assert_eq!(
            graph.add_relation(a, ghost, RelationKind::Block),
            Err(GraphError::TaskNotFound(ghost))
        );
    }

    #[test]
    fn delete_cascades_relations() {
        let mut graph = graph();
        let a = graph.create("A").id();
        let b = graph.create("B").id();
        let c = graph.create("C").id();
        graph.add_relation(a, b, RelationKind::Block).unwrap();
        graph.add_relation(b, c, RelationKind::Block).unwrap();

        assert!(graph.delete(b));

        assert_eq!(graph.relation_count(), 0);
        assert!(graph.get_outgoing(a).is_empty());
        assert!(!graph.delete(b));
    }

    #[test]
    fn available_partners_excludes_self_and_related() {
        let mut graph = graph();
        let a = graph.create("A").id();
        let b = graph.create("B").id();
        let c = graph.create("C").id();
        graph.add_relation(b, a, RelationKind::Block).unwrap();

        let partners: Vec<TaskId> = graph.available_partners(a).iter().map(|t| t.id()).collect();
        assert_eq!(partners, vec![c]);
    }

    #[test]
    fn restore_keeps_existing_task() {
        let mut graph = graph();
        let a = graph.create("A").id();

        graph.restore(a, "ignored");

        assert_eq!(graph.len(), 1);
        assert_eq!(graph.get(a).unwrap().title(), "A");
    }
}
