//! Engine - ドメインを所有するスレッドのオブジェクト
//!
//! タスク・辺・ボード・ディレクトリを変更できるのは `&mut Engine` を持つ
//! スレッドだけです。タイマーや sweep からのリセット依頼は `OwnerInbox` に
//! 溜まり、所有スレッドが `process_pending` / `apply_reset` で適用します。

use std::collections::BTreeSet;
use std::sync::Arc;

use super::completion::CompletionStateMachine;
use super::scheduler::RecurringScheduler;
use crate::directory::Directory;
use crate::domain::{
    ActorId, BoardId, CompletionError, GraphError, Notification, NotificationLevel,
    NotificationTopic, RecurrenceConfig, RelationKind, SchedulerError, Task, TaskId, TaskStatus,
};
use crate::graph::{Board, Boards, TaskGraph};
use crate::impls::OwnerInbox;
use crate::ports::{Clock, IdGenerator, NotificationSink, ResetOrigin, ResetRequest};

/// タスクグラフと繰り返しスケジューラをまとめた所有者
///
/// 構築は `EngineBuilder` で行う。drop すると Scheduler も停止する。
pub struct Engine {
    pub(crate) graph: TaskGraph,
    pub(crate) boards: Boards,
    pub(crate) directory: Directory,
    pub(crate) completion: CompletionStateMachine,
    pub(crate) scheduler: RecurringScheduler,
    pub(crate) notifier: Arc<dyn NotificationSink>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) ids: Arc<dyn IdGenerator>,
}

impl Engine {
    // ========================================
    // Accessors
    // ========================================

    pub fn graph(&self) -> &TaskGraph {
        &self.graph
    }

    pub fn boards(&self) -> &Boards {
        &self.boards
    }

    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    pub fn directory_mut(&mut self) -> &mut Directory {
        &mut self.directory
    }

    pub fn scheduler(&self) -> &RecurringScheduler {
        &self.scheduler
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    // ========================================
    // Graph
    // ========================================

    pub fn create_board(&mut self, name: impl Into<String>) -> BoardId {
        let id = self.ids.generate_board_id();
        self.boards.insert(Board::new(id, name));
        id
    }

    /// Create a task on the default board.
    pub fn create_task(&mut self, title: impl Into<String>) -> TaskId {
        let id = self.graph.create(title).id();
        let default = self.boards.default_id();
        if let Some(board) = self.boards.get_mut(default) {
            board.add(id);
        }
        id
    }

    /// Create a task on `board`. `None` when the board does not exist.
    pub fn create_task_on(&mut self, board: BoardId, title: impl Into<String>) -> Option<TaskId> {
        if self.boards.get(board).is_none() {
            return None;
        }
        let id = self.graph.create(title).id();
        self.boards.get_mut(board)?.add(id);
        Some(id)
    }

    /// Delete a task with its relations, board placement and recurrence.
    pub fn delete_task(&mut self, id: TaskId) -> bool {
        if !self.graph.delete(id) {
            return false;
        }
        self.boards.forget_task(id);
        self.scheduler.remove(id);
        true
    }

    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.graph.get(id)
    }

    /// Field setters (title, priority, payload, deadline, assignee, ...).
    pub fn task_mut(&mut self, id: TaskId) -> Option<&mut Task> {
        self.graph.get_mut(id)
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.graph.get_all()
    }

    pub fn add_relation(&mut self, from: TaskId, to: TaskId) -> Result<bool, GraphError> {
        self.graph.add_relation(from, to, RelationKind::Block)
    }

    pub fn remove_relation(&mut self, from: TaskId, to: TaskId) -> bool {
        self.graph.remove_relation(from, to)
    }

    pub fn get_outgoing(&self, id: TaskId) -> Vec<&Task> {
        self.graph.get_outgoing(id)
    }

    pub fn get_incoming(&self, id: TaskId) -> Vec<&Task> {
        self.graph.get_incoming(id)
    }

    pub fn related(&self, id: TaskId) -> BTreeSet<TaskId> {
        self.graph.related(id)
    }

    pub fn available_partners(&self, id: TaskId) -> Vec<&Task> {
        self.graph.available_partners(id)
    }

    // ========================================
    // Completion
    // ========================================

    pub fn try_complete(&mut self, id: TaskId, actor: Option<ActorId>) -> Result<(), CompletionError> {
        self.completion.try_complete(&mut self.graph, id, actor)
    }

    /// Reverse completion. A pending auto-reset for the task is dropped.
    pub fn uncomplete(&mut self, id: TaskId) -> Option<&Task> {
        let task = self.completion.uncomplete(&mut self.graph, id)?;
        self.scheduler.cancel_reset(id);
        Some(task)
    }

    pub fn try_set_status(&mut self, id: TaskId, status: TaskStatus) -> Result<(), CompletionError> {
        let was_completed = self.graph.get(id).is_some_and(Task::is_completed);
        self.completion.try_set_status(&mut self.graph, id, status)?;
        if was_completed {
            self.scheduler.cancel_reset(id);
        }
        Ok(())
    }

    pub fn blockers(&self, id: TaskId) -> BTreeSet<TaskId> {
        self.completion.blockers(&self.graph, id)
    }

    // ========================================
    // Recurrence
    // ========================================

    pub fn configure_recurring_task(
        &mut self,
        id: TaskId,
        config: RecurrenceConfig,
    ) -> Result<(), SchedulerError> {
        if !self.graph.contains(id) {
            return Err(SchedulerError::UnknownTask(id));
        }
        self.scheduler.configure(id, config)
    }

    pub fn remove_recurring_task(&mut self, id: TaskId) -> Option<RecurrenceConfig> {
        self.scheduler.remove(id)
    }

    pub fn get_recurring_task(&self, id: TaskId) -> Option<RecurrenceConfig> {
        self.scheduler.get(id)
    }

    pub fn get_all_recurring_tasks(&self) -> Vec<(TaskId, RecurrenceConfig)> {
        self.scheduler.all()
    }

    /// Check the task right now and reset it synchronously if it is due.
    pub fn check_and_reset_task(&mut self, id: TaskId) -> bool {
        let now = self.clock.now();
        let completed = self.graph.get(id).is_some_and(Task::is_completed);
        if !self.scheduler.should_reset(id, now, completed) {
            return false;
        }
        self.apply_reset(&ResetRequest {
            task_id: id,
            requested_at: now,
            origin: ResetOrigin::Manual,
        })
    }

    /// Reset routine, run on the owning thread.
    ///
    /// Re-validates against current state first: a deleted task, a task no
    /// longer completed, a removed config or a stale request are no-ops.
    pub fn apply_reset(&mut self, request: &ResetRequest) -> bool {
        let id = request.task_id;
        if self.scheduler.is_disposed() {
            return false;
        }
        if self.scheduler.get(id).is_none() {
            tracing::debug!(task_id = %id, origin = ?request.origin, "reset skipped: no recurrence");
            return false;
        }
        let completed = self.graph.get(id).map(Task::is_completed);
        if completed != Some(true) {
            tracing::debug!(task_id = %id, origin = ?request.origin, "reset skipped: task not completed");
            self.scheduler.cancel_reset(id);
            return false;
        }
        if !self.scheduler.should_reset(id, request.requested_at, true) {
            tracing::debug!(task_id = %id, origin = ?request.origin, "reset skipped: not due");
            return false;
        }

        if self.completion.uncomplete(&mut self.graph, id).is_none() {
            self.graph.force_status(id, TaskStatus::InProgress);
        }
        self.scheduler.record_reset(id, request.requested_at);

        let title = self
            .graph
            .get(id)
            .map(|t| t.title().to_string())
            .unwrap_or_default();
        tracing::info!(task_id = %id, origin = ?request.origin, "task reset");
        self.notifier.notify(
            Notification::new(
                NotificationLevel::Info,
                NotificationTopic::TaskReset,
                format!("Task '{title}' was reset"),
                request.requested_at,
            )
            .for_task(id),
        );
        true
    }

    /// Apply every reset request waiting in `inbox` without blocking.
    ///
    /// Returns how many tasks were actually reset.
    pub fn process_pending(&mut self, inbox: &mut OwnerInbox) -> usize {
        let mut applied = 0;
        while let Some(request) = inbox.try_recv() {
            if self.apply_reset(&request) {
                applied += 1;
            }
        }
        applied
    }

    /// Stop the scheduler. Safe to call more than once.
    pub fn shutdown(&self) {
        self.scheduler.shutdown();
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.scheduler.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use crate::app::EngineBuilder;
    use crate::domain::{NotificationTopic, RecurrenceConfig, RecurrenceKind, TaskStatus};
    use crate::impls::CollectingSink;
    use crate::ports::{ResetOrigin, ResetRequest, TokioClock};
    use chrono::{TimeDelta, TimeZone, Utc};
    use std::sync::Arc;

    fn t0() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn delete_task_cascades_everywhere() {
        let (mut engine, _inbox) = EngineBuilder::new()
            .clock(Arc::new(TokioClock::starting_at(t0())))
            .build_with_inbox()
            .unwrap();
        let a = engine.create_task("A");
        let b = engine.create_task("B");
        engine.add_relation(a, b).unwrap();
        engine
            .configure_recurring_task(a, RecurrenceConfig::new(RecurrenceKind::Daily, 1))
            .unwrap();

        assert!(engine.delete_task(a));

        assert!(engine.get_incoming(b).is_empty());
        assert!(engine.get_recurring_task(a).is_none());
        assert!(!engine.boards().is_placed(a));
        assert!(!engine.delete_task(a));
    }

    #[tokio::test(start_paused = true)]
    async fn recurrence_requires_existing_task() {
        let (mut engine, _inbox) = EngineBuilder::new().build_with_inbox().unwrap();
        let ghost = crate::domain::TaskId::from_ulid(ulid::Ulid::new());

        assert!(engine
            .configure_recurring_task(ghost, RecurrenceConfig::new(RecurrenceKind::Daily, 1))
            .is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn check_and_reset_task_resets_synchronously_when_due() {
        let sink = Arc::new(CollectingSink::new());
        let (mut engine, _inbox) = EngineBuilder::new()
            .clock(Arc::new(TokioClock::starting_at(t0())))
            .notifier(sink.clone())
            .build_with_inbox()
            .unwrap();
        let c = engine.create_task("C");
        let mut config = RecurrenceConfig::new(RecurrenceKind::Minutes, 5)
            .with_auto_reset(TimeDelta::minutes(2));
        config.last_reset = Some(t0() - TimeDelta::minutes(5));
        engine.try_complete(c, None).unwrap();
        engine.configure_recurring_task(c, config).unwrap();

        assert!(engine.check_and_reset_task(c));

        assert_eq!(engine.task(c).unwrap().status(), TaskStatus::InProgress);
        assert_eq!(engine.get_recurring_task(c).unwrap().last_reset, Some(t0()));
        let resets = sink.with_topic(NotificationTopic::TaskReset);
        assert_eq!(resets.len(), 1);
        assert_eq!(resets[0].message, "Task 'C' was reset");
        assert!(!engine.check_and_reset_task(c));
    }

    #[tokio::test(start_paused = true)]
    async fn stale_and_duplicate_requests_are_no_ops() {
        let (mut engine, _inbox) = EngineBuilder::new()
            .clock(Arc::new(TokioClock::starting_at(t0())))
            .build_with_inbox()
            .unwrap();
        let c = engine.create_task("C");
        engine
            .configure_recurring_task(
                c,
                RecurrenceConfig::new(RecurrenceKind::Hours, 1).with_auto_reset(TimeDelta::minutes(1)),
            )
            .unwrap();
        engine.try_complete(c, None).unwrap();

        let early = ResetRequest {
            task_id: c,
            requested_at: t0() + TimeDelta::seconds(30),
            origin: ResetOrigin::Sweep,
        };
        assert!(!engine.apply_reset(&early));

        let due = ResetRequest {
            requested_at: t0() + TimeDelta::minutes(1),
            ..early.clone()
        };
        assert!(engine.apply_reset(&due));
        assert!(!engine.apply_reset(&due));
        assert_eq!(engine.task(c).unwrap().status(), TaskStatus::InProgress);
    }

    #[tokio::test(start_paused = true)]
    async fn manual_uncomplete_drops_pending_reset() {
        let (mut engine, _inbox) = EngineBuilder::new()
            .clock(Arc::new(TokioClock::starting_at(t0())))
            .build_with_inbox()
            .unwrap();
        let c = engine.create_task("C");
        engine
            .configure_recurring_task(
                c,
                RecurrenceConfig::new(RecurrenceKind::Daily, 1).with_auto_reset(TimeDelta::hours(1)),
            )
            .unwrap();
        engine.try_complete(c, None).unwrap();
        assert!(engine.scheduler().has_pending_timer(c));

        engine.uncomplete(c);

        assert!(!engine.scheduler().has_pending_timer(c));
    }

    #[tokio::test(start_paused = true)]
    async fn create_task_on_unknown_board_fails() {
        let (mut engine, _inbox) = EngineBuilder::new().build_with_inbox().unwrap();
        let board = engine.create_board("Sprint");

        let t = engine.create_task_on(board, "T").unwrap();
        assert!(engine.boards().get(board).unwrap().contains(t));

        let ghost = crate::domain::BoardId::from_ulid(ulid::Ulid::new());
        assert!(engine.create_task_on(ghost, "lost").is_none());
    }
}
