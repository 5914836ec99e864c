//! Persistence Reconciler
//!
//! Export walks the live engine. Import merges a snapshot into whatever the
//! engine already holds and replays it through the same operations a host
//! would call, so no invariant is bypassed:
//!
//! 1. directory entities: resolve by saved id / alias, else create and alias
//! 2. boards and tasks: tasks keep their ids and are updated in place
//! 3. relations: added only when missing
//! 4. completions: replayed through `try_complete` until no progress
//! 5. recurrence: restored last, then completed auto-reset tasks are re-armed
//!
//! Unresolvable references are dropped and reported as warnings.

use std::collections::{BTreeSet, HashMap};

use chrono::TimeDelta;

use super::snapshot::{
    ActorSnapshot, EdgeSnapshot, GraphSnapshot, NodeSnapshot, RecurrenceSnapshot,
    ResourceSnapshot, ResourceUsageSnapshot, RoleSnapshot, SNAPSHOT_VERSION, Snapshot,
};
use super::PersistenceError;
use crate::app::Engine;
use crate::graph::Board;
use crate::domain::{
    ActorId, BoardId, CompletionError, Notification, NotificationLevel, NotificationTopic,
    RecurrenceConfig, ResourceId, ResourceUsage, RoleId, Task, TaskId, TaskStatus,
};
use crate::ports::SnapshotStore;

/// Saved id -> live id for entities whose ids are regenerated on import.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdRemap {
    pub resources: HashMap<ResourceId, ResourceId>,
    pub actors: HashMap<ActorId, ActorId>,
    pub roles: HashMap<RoleId, RoleId>,
}

#[derive(Debug, Clone, Default)]
pub struct ImportReport {
    pub remap: IdRemap,
    pub warnings: Vec<String>,
    pub tasks_created: usize,
    pub tasks_updated: usize,
    pub directory_created: usize,
    pub directory_updated: usize,
    pub relations_added: usize,
    pub completions_replayed: usize,
    pub recurrences_restored: usize,
}

impl ImportReport {
    fn warn(&mut self, message: String) {
        tracing::warn!("import: {message}");
        self.warnings.push(message);
    }
}

impl Engine {
    /// Serialize every board, task, relation, recurrence config and
    /// directory entity.
    pub fn export_snapshot(&self) -> Snapshot {
        let default = self.boards.default_id();
        let home_of = |task: TaskId| -> BoardId {
            self.boards
                .iter()
                .find(|b| b.contains(task))
                .map_or(default, |b| b.id)
        };

        let mut graphs: Vec<GraphSnapshot> = self
            .boards
            .iter()
            .map(|board| GraphSnapshot {
                id: board.id,
                name: board.name.clone(),
                nodes: board
                    .tasks()
                    .iter()
                    .filter_map(|id| self.graph.get(*id))
                    .map(node_snapshot)
                    .collect(),
                edges: Vec::new(),
            })
            .collect();

        let unplaced: Vec<NodeSnapshot> = self
            .graph
            .get_all()
            .filter(|t| !self.boards.is_placed(t.id()))
            .map(node_snapshot)
            .collect();
        if let Some(graph) = graphs.iter_mut().find(|g| g.id == default) {
            graph.nodes.extend(unplaced);
        }

        for relation in self.graph.relations() {
            let home = home_of(relation.source);
            if let Some(graph) = graphs.iter_mut().find(|g| g.id == home) {
                graph.edges.push(EdgeSnapshot {
                    source: relation.source,
                    target: relation.target,
                    kind: relation.kind,
                });
            }
        }

        let recurrence = self
            .scheduler
            .all()
            .into_iter()
            .map(|(task_id, config)| recurrence_snapshot(task_id, &config))
            .collect();

        Snapshot {
            version: SNAPSHOT_VERSION,
            saved_at: self.clock.now(),
            default_board: Some(default),
            graphs,
            recurrence,
            resources: self
                .directory
                .resources
                .iter()
                .map(|r| ResourceSnapshot {
                    id: r.id,
                    name: r.name.clone(),
                    value: r.value,
                })
                .collect(),
            actors: self
                .directory
                .actors
                .iter()
                .map(|a| ActorSnapshot {
                    id: a.id,
                    name: a.name.clone(),
                    username: a.username.clone(),
                })
                .collect(),
            roles: self
                .directory
                .roles
                .iter()
                .map(|r| RoleSnapshot {
                    id: r.id,
                    name: r.name.clone(),
                    strength: r.strength,
                })
                .collect(),
        }
    }

    /// Merge `snapshot` into this engine. Safe to run repeatedly.
    pub fn import_snapshot(&mut self, snapshot: &Snapshot) -> Result<ImportReport, PersistenceError> {
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(PersistenceError::UnsupportedVersion {
                found: snapshot.version,
                expected: SNAPSHOT_VERSION,
            });
        }

        let mut report = ImportReport::default();
        self.import_directory(snapshot, &mut report);
        let to_complete = self.import_tasks(snapshot, &mut report);
        self.import_relations(snapshot, &mut report);
        self.replay_completions(to_complete, &mut report);
        self.import_recurrence(snapshot, &mut report);

        tracing::info!(
            tasks_created = report.tasks_created,
            tasks_updated = report.tasks_updated,
            relations_added = report.relations_added,
            warnings = report.warnings.len(),
            "snapshot imported"
        );
        let level = if report.warnings.is_empty() {
            NotificationLevel::Info
        } else {
            NotificationLevel::Warning
        };
        self.notifier.notify(Notification::new(
            level,
            NotificationTopic::Import,
            format!(
                "Loaded {} tasks with {} warnings",
                report.tasks_created + report.tasks_updated,
                report.warnings.len()
            ),
            self.clock.now(),
        ));
        Ok(report)
    }

    /// Export and hand the snapshot to `store`.
    pub async fn save_to(&self, store: &dyn SnapshotStore) -> Result<(), PersistenceError> {
        let snapshot = self.export_snapshot();
        store.save(&snapshot).await
    }

    /// Load from `store` and import. `None` when the store is empty.
    pub async fn load_from(
        &mut self,
        store: &dyn SnapshotStore,
    ) -> Result<Option<ImportReport>, PersistenceError> {
        match store.load().await? {
            Some(snapshot) => self.import_snapshot(&snapshot).map(Some),
            None => Ok(None),
        }
    }

    fn import_directory(&mut self, snapshot: &Snapshot, report: &mut ImportReport) {
        for saved in &snapshot.resources {
            let live = match self.directory.resources.resolve(saved.id) {
                Some(live) => {
                    if let Some(resource) = self.directory.resources.get_mut(live) {
                        resource.name = saved.name.clone();
                        resource.value = saved.value;
                    }
                    report.directory_updated += 1;
                    live
                }
                None => {
                    let live = self.directory.add_resource(saved.name.clone(), saved.value);
                    self.directory.resources.alias(saved.id, live);
                    report.directory_created += 1;
                    live
                }
            };
            report.remap.resources.insert(saved.id, live);
        }

        for saved in &snapshot.actors {
            let live = match self.directory.actors.resolve(saved.id) {
                Some(live) => {
                    if let Some(actor) = self.directory.actors.get_mut(live) {
                        actor.name = saved.name.clone();
                        actor.username = saved.username.clone();
                    }
                    report.directory_updated += 1;
                    live
                }
                None => {
                    let live = self
                        .directory
                        .add_actor(saved.name.clone(), saved.username.clone());
                    self.directory.actors.alias(saved.id, live);
                    report.directory_created += 1;
                    live
                }
            };
            report.remap.actors.insert(saved.id, live);
        }

        for saved in &snapshot.roles {
            let live = match self.directory.roles.resolve(saved.id) {
                Some(live) => {
                    if let Some(role) = self.directory.roles.get_mut(live) {
                        role.name = saved.name.clone();
                        role.strength = saved.strength;
                    }
                    report.directory_updated += 1;
                    live
                }
                None => {
                    let live = self.directory.add_role(saved.name.clone(), saved.strength);
                    self.directory.roles.alias(saved.id, live);
                    report.directory_created += 1;
                    live
                }
            };
            report.remap.roles.insert(saved.id, live);
        }
    }

    /// Returns the tasks whose completion must be replayed.
    fn import_tasks(&mut self, snapshot: &Snapshot, report: &mut ImportReport) -> Vec<TaskId> {
        let mut to_complete = Vec::new();
        let mut seen = BTreeSet::new();

        if let Some(saved_default) = snapshot.default_board
            && let Some(saved) = snapshot.graphs.iter().find(|g| g.id == saved_default)
        {
            self.boards
                .adopt_default(Board::new(saved_default, saved.name.clone()));
        }

        for saved_graph in &snapshot.graphs {
            self.boards
                .get_or_insert(saved_graph.id, &saved_graph.name)
                .name = saved_graph.name.clone();

            for node in &saved_graph.nodes {
                let id = node.task_id;
                if let Some(board) = self.boards.get_mut(saved_graph.id) {
                    board.add(id);
                }
                if !seen.insert(id) {
                    continue;
                }

                if self.graph.contains(id) {
                    report.tasks_updated += 1;
                } else {
                    report.tasks_created += 1;
                }
                let assignee = self.resolve_actor(node, report);
                let usages = self.resolve_usages(node, report);

                let task = self.graph.restore(id, node.title.clone());
                task.set_title(node.title.clone());
                task.priority = node.priority;
                task.payload = node.payload.clone();
                task.deadline = node.deadline;
                task.assignee = assignee;
                task.resource_usages = usages;

                if node.completed || node.status == TaskStatus::Completed {
                    to_complete.push(id);
                } else if let Err(err) = self.try_set_status(id, node.status) {
                    report.warn(format!("task {id}: status not restored: {err}"));
                }
            }
        }
        to_complete
    }

    fn resolve_actor(&self, node: &NodeSnapshot, report: &mut ImportReport) -> Option<ActorId> {
        let saved = node.assignee?;
        let live = report
            .remap
            .actors
            .get(&saved)
            .copied()
            .or_else(|| self.directory.actors.resolve(saved));
        if live.is_none() {
            report.warn(format!("task {}: unknown assignee {saved} dropped", node.task_id));
        }
        live
    }

    fn resolve_usages(&self, node: &NodeSnapshot, report: &mut ImportReport) -> Vec<ResourceUsage> {
        let mut usages = Vec::with_capacity(node.resource_usages.len());
        for ResourceUsageSnapshot { resource_id, amount } in &node.resource_usages {
            let live = report
                .remap
                .resources
                .get(resource_id)
                .copied()
                .or_else(|| self.directory.resources.resolve(*resource_id));
            match live {
                Some(resource) => usages.push(ResourceUsage {
                    resource,
                    amount: *amount,
                }),
                None => report.warn(format!(
                    "task {}: unknown resource {resource_id} dropped",
                    node.task_id
                )),
            }
        }
        usages
    }

    fn import_relations(&mut self, snapshot: &Snapshot, report: &mut ImportReport) {
        for edge in snapshot.graphs.iter().flat_map(|g| &g.edges) {
            if self.graph.has_relation(edge.source, edge.target) {
                continue;
            }
            match self.graph.add_relation(edge.source, edge.target, edge.kind) {
                Ok(true) => report.relations_added += 1,
                Ok(false) => {}
                Err(err) => report.warn(format!(
                    "relation {} -> {} skipped: {err}",
                    edge.source, edge.target
                )),
            }
        }
    }

    /// Dependencies may appear after their dependents in the snapshot, so
    /// completions are retried until a pass makes no progress.
    fn replay_completions(&mut self, pending: Vec<TaskId>, report: &mut ImportReport) {
        let mut pending: Vec<(TaskId, Option<CompletionError>)> =
            pending.into_iter().map(|id| (id, None)).collect();
        loop {
            let before = pending.len();
            let mut still_pending = Vec::new();
            for (id, _) in pending {
                let actor = self.graph.get(id).and_then(|t| t.assignee);
                match self.try_complete(id, actor) {
                    Ok(()) => report.completions_replayed += 1,
                    Err(err) => still_pending.push((id, Some(err))),
                }
            }
            pending = still_pending;
            if pending.is_empty() || pending.len() == before {
                break;
            }
        }

        for (id, err) in pending {
            if let Some(err) = err {
                report.warn(format!("task {id}: completion not restored: {err}"));
            }
        }
    }

    fn import_recurrence(&mut self, snapshot: &Snapshot, report: &mut ImportReport) {
        for saved in &snapshot.recurrence {
            let id = saved.task_id;
            if !self.graph.contains(id) {
                report.warn(format!("recurrence for missing task {id} skipped"));
                continue;
            }
            let config = match recurrence_config(saved) {
                Ok(config) => config,
                Err(message) => {
                    report.warn(format!("task {id}: {message}"));
                    continue;
                }
            };
            let auto_reset = config.auto_reset;
            if let Err(err) = self.scheduler.configure(id, config) {
                report.warn(format!("task {id}: recurrence not restored: {err}"));
                continue;
            }
            report.recurrences_restored += 1;

            let completed = self.graph.get(id).is_some_and(|t| t.is_completed());
            if auto_reset && completed {
                self.scheduler.rearm(id);
            }
        }
    }
}

fn node_snapshot(task: &Task) -> NodeSnapshot {
    NodeSnapshot {
        task_id: task.id(),
        title: task.title().to_string(),
        status: task.status(),
        priority: task.priority,
        payload: task.payload.clone(),
        deadline: task.deadline,
        assignee: task.assignee,
        completed: task.is_completed(),
        resource_usages: task
            .resource_usages
            .iter()
            .map(|u| ResourceUsageSnapshot {
                resource_id: u.resource,
                amount: u.amount,
            })
            .collect(),
    }
}

fn recurrence_snapshot(task_id: TaskId, config: &RecurrenceConfig) -> RecurrenceSnapshot {
    RecurrenceSnapshot {
        task_id,
        kind: config.kind,
        interval: config.interval,
        auto_reset: config.auto_reset,
        auto_reset_delay_ms: config.auto_reset_delay.map(|d| d.num_milliseconds()),
        notifications_enabled: config.notifications_enabled,
        notification_advance_ms: config.notification_advance.map(|d| d.num_milliseconds()),
        last_notification: config.last_notification,
        last_reset: config.last_reset,
        next_due: config.next_due,
    }
}

fn recurrence_config(saved: &RecurrenceSnapshot) -> Result<RecurrenceConfig, String> {
    let millis = |ms: Option<i64>, field: &str| -> Result<Option<TimeDelta>, String> {
        ms.map(|ms| TimeDelta::try_milliseconds(ms).ok_or_else(|| format!("{field} out of range: {ms}")))
            .transpose()
    };
    Ok(RecurrenceConfig {
        kind: saved.kind,
        interval: saved.interval,
        auto_reset: saved.auto_reset,
        auto_reset_delay: millis(saved.auto_reset_delay_ms, "auto_reset_delay_ms")?,
        notifications_enabled: saved.notifications_enabled,
        notification_advance: millis(saved.notification_advance_ms, "notification_advance_ms")?,
        last_notification: saved.last_notification,
        last_reset: saved.last_reset,
        next_due: saved.next_due,
    })
}
