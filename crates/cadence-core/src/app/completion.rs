//! CompletionStateMachine - 依存関係でゲートされた完了遷移
//!
//! # 遷移
//! - `try_complete`: 上流に未完了（Completed でも Canceled でもない）タスクが
//!   1 つでもあれば `UncompletedTasks` を返し、何も変更しない
//! - `uncomplete`: 完了の取り消し。ゲートしない。対象なし / 未完了なら `None`
//! - `try_set_status`: Completed 以外への直接遷移
//!
//! 完了に成功したら登録済みの `CompletionListener`（Scheduler）に知らせる。

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::domain::{
    ActorId, CompletionError, Notification, NotificationLevel, NotificationTopic, Task, TaskId,
    TaskStatus,
};
use crate::graph::TaskGraph;
use crate::ports::{Clock, CompletionPolicy, NotificationSink};

/// 完了イベントの購読者
///
/// 所有スレッドから同期的に呼ばれる。
pub trait CompletionListener: Send + Sync {
    fn on_task_completed(&self, task: &Task);
}

pub struct CompletionStateMachine {
    policy: Arc<dyn CompletionPolicy>,
    notifier: Arc<dyn NotificationSink>,
    clock: Arc<dyn Clock>,
    listeners: Vec<Arc<dyn CompletionListener>>,
}

impl CompletionStateMachine {
    pub fn new(
        policy: Arc<dyn CompletionPolicy>,
        notifier: Arc<dyn NotificationSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            policy,
            notifier,
            clock,
            listeners: Vec::new(),
        }
    }

    pub fn add_listener(&mut self, listener: Arc<dyn CompletionListener>) {
        self.listeners.push(listener);
    }

    /// `id` の完了を妨げている未完了タスク（推移的）
    pub fn blockers(&self, graph: &TaskGraph, id: TaskId) -> BTreeSet<TaskId> {
        graph.open_upstream(id)
    }

    /// 依存関係をチェックしてから完了にする
    ///
    /// チェック順: 対象なし → 既に完了（no-op 成功）→ 依存 → 権限。
    /// エラー時は一切変更しない。
    pub fn try_complete(
        &self,
        graph: &mut TaskGraph,
        id: TaskId,
        actor: Option<ActorId>,
    ) -> Result<(), CompletionError> {
        let Some(task) = graph.get(id) else {
            return Err(CompletionError::TaskNotFound(id));
        };
        if task.is_completed() {
            return Ok(());
        }

        let blocking = self.blockers(graph, id);
        if !blocking.is_empty() {
            tracing::debug!(task_id = %id, blocking = blocking.len(), "completion blocked");
            self.notifier.notify(
                Notification::new(
                    NotificationLevel::Warning,
                    NotificationTopic::Completion,
                    format!(
                        "Task '{}' has {} uncompleted dependencies",
                        task.title(),
                        blocking.len()
                    ),
                    self.clock.now(),
                )
                .for_task(id),
            );
            return Err(CompletionError::UncompletedTasks(blocking));
        }

        if !self.policy.may_complete(task, actor) {
            tracing::debug!(task_id = %id, "completion denied by policy");
            return Err(CompletionError::WrongActor(id));
        }

        graph.force_status(id, TaskStatus::Completed);
        let Some(task) = graph.get(id) else {
            return Err(CompletionError::TaskNotFound(id));
        };
        tracing::info!(task_id = %id, "task completed");
        self.notifier.notify(
            Notification::new(
                NotificationLevel::Success,
                NotificationTopic::Completion,
                format!("Task '{}' completed", task.title()),
                self.clock.now(),
            )
            .for_task(id),
        );
        for listener in &self.listeners {
            listener.on_task_completed(task);
        }
        Ok(())
    }

    /// 完了を取り消して InProgress に戻す
    ///
    /// 対象がない、または完了していなければ `None`（no-op）
    pub fn uncomplete<'g>(&self, graph: &'g mut TaskGraph, id: TaskId) -> Option<&'g Task> {
        if !graph.get(id)?.is_completed() {
            return None;
        }
        graph.force_status(id, TaskStatus::InProgress);
        tracing::info!(task_id = %id, "task uncompleted");
        graph.get(id)
    }

    /// Completed 以外への直接遷移
    ///
    /// 完了済みタスクを別の状態にすると completed フラグも外れる。
    pub fn try_set_status(
        &self,
        graph: &mut TaskGraph,
        id: TaskId,
        status: TaskStatus,
    ) -> Result<(), CompletionError> {
        if status == TaskStatus::Completed {
            return Err(CompletionError::CompletionMustBeGated(id));
        }
        if !graph.force_status(id, status) {
            return Err(CompletionError::TaskNotFound(id));
        }
        tracing::debug!(task_id = %id, %status, "status set");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RelationKind;
    use crate::impls::{AllowAll, AssigneeOnly, CollectingSink};
    use crate::ports::{SystemClock, UlidGenerator};
    use std::sync::Mutex;
    use ulid::Ulid;

    struct Recorder(Mutex<Vec<TaskId>>);

    impl CompletionListener for Recorder {
        fn on_task_completed(&self, task: &Task) {
            self.0.lock().unwrap().push(task.id());
        }
    }

    fn setup(policy: Arc<dyn CompletionPolicy>) -> (TaskGraph, CompletionStateMachine, Arc<CollectingSink>) {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let graph = TaskGraph::new(Arc::new(UlidGenerator::new(clock.clone())));
        let sink = Arc::new(CollectingSink::new());
        let machine = CompletionStateMachine::new(policy, sink.clone(), clock);
        (graph, machine, sink)
    }

    #[test]
    fn dependency_gates_completion() {
        let (mut graph, machine, _) = setup(Arc::new(AllowAll));
        let a = graph.create("A").id();
        let b = graph.create("B").id();
        graph.add_relation(a, b, RelationKind::Block).unwrap();

        assert_eq!(
            machine.try_complete(&mut graph, b, None),
            Err(CompletionError::UncompletedTasks(BTreeSet::from([a])))
        );
        assert!(!graph.get(b).unwrap().is_completed());

        assert_eq!(machine.try_complete(&mut graph, a, None), Ok(()));
        assert_eq!(machine.try_complete(&mut graph, b, None), Ok(()));
        assert_eq!(graph.get(b).unwrap().status(), TaskStatus::Completed);
    }

    #[test]
    fn transitive_dependencies_are_reported() {
        let (mut graph, machine, _) = setup(Arc::new(AllowAll));
        let a = graph.create("A").id();
        let b = graph.create("B").id();
        let c = graph.create("C").id();
        graph.add_relation(a, b, RelationKind::Block).unwrap();
        graph.add_relation(b, c, RelationKind::Block).unwrap();

        let err = machine.try_complete(&mut graph, c, None).unwrap_err();
        assert_eq!(err.blocking_ids(), Some(&BTreeSet::from([a, b])));
    }

    #[test]
    fn canceled_dependency_does_not_block() {
        let (mut graph, machine, _) = setup(Arc::new(AllowAll));
        let a = graph.create("A").id();
        let b = graph.create("B").id();
        graph.add_relation(a, b, RelationKind::Block).unwrap();

        machine
            .try_set_status(&mut graph, a, TaskStatus::Canceled)
            .unwrap();

        assert_eq!(machine.try_complete(&mut graph, b, None), Ok(()));
    }

    #[test]
    fn completing_twice_notifies_listeners_once() {
        let (mut graph, mut machine, _) = setup(Arc::new(AllowAll));
        let recorder = Arc::new(Recorder(Mutex::new(Vec::new())));
        machine.add_listener(recorder.clone());
        let a = graph.create("A").id();

        machine.try_complete(&mut graph, a, None).unwrap();
        machine.try_complete(&mut graph, a, None).unwrap();

        assert_eq!(*recorder.0.lock().unwrap(), vec![a]);
    }

    #[test]
    fn blocked_attempt_emits_warning() {
        let (mut graph, machine, sink) = setup(Arc::new(AllowAll));
        let a = graph.create("A").id();
        let b = graph.create("B").id();
        graph.add_relation(a, b, RelationKind::Block).unwrap();

        let _ = machine.try_complete(&mut graph, b, None);

        let warnings = sink.with_topic(NotificationTopic::Completion);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].level, NotificationLevel::Warning);
        assert_eq!(warnings[0].task_id, Some(b));
    }

    #[test]
    fn wrong_actor_is_rejected_without_mutation() {
        let (mut graph, machine, _) = setup(Arc::new(AssigneeOnly {
            allow_unassigned: false,
        }));
        let alice = ActorId::from_ulid(Ulid::new());
        let bob = ActorId::from_ulid(Ulid::new());
        let a = graph.create("A").id();
        graph.get_mut(a).unwrap().assignee = Some(alice);

        assert_eq!(
            machine.try_complete(&mut graph, a, Some(bob)),
            Err(CompletionError::WrongActor(a))
        );
        assert!(!graph.get(a).unwrap().is_completed());
        assert_eq!(machine.try_complete(&mut graph, a, Some(alice)), Ok(()));
    }

    #[test]
    fn unknown_task_is_reported() {
        let (mut graph, machine, _) = setup(Arc::new(AllowAll));
        let ghost = TaskId::from_ulid(Ulid::new());
        assert_eq!(
            machine.try_complete(&mut graph, ghost, None),
            Err(CompletionError::TaskNotFound(ghost))
        );
        assert!(machine.uncomplete(&mut graph, ghost).is_none());
    }

    #[test]
    fn uncomplete_is_idempotent() {
        let (mut graph, machine, _) = setup(Arc::new(AllowAll));
        let a = graph.create("A").id();
        machine.try_complete(&mut graph, a, None).unwrap();

        let first = machine.uncomplete(&mut graph, a).map(Task::status);
        assert_eq!(first, Some(TaskStatus::InProgress));
        assert!(machine.uncomplete(&mut graph, a).is_none());
        assert_eq!(graph.get(a).unwrap().status(), TaskStatus::InProgress);
    }

    #[test]
    fn uncomplete_is_never_gated() {
        let (mut graph, machine, _) = setup(Arc::new(AllowAll));
        let a = graph.create("A").id();
        let b = graph.create("B").id();
        graph.add_relation(a, b, RelationKind::Block).unwrap();
        machine.try_complete(&mut graph, a, None).unwrap();
        machine.try_complete(&mut graph, b, None).unwrap();

        assert!(machine.uncomplete(&mut graph, a).is_some());
        assert!(graph.get(b).unwrap().is_completed());
    }

    #[test]
    fn set_status_refuses_completed_and_clears_flag_otherwise() {
        let (mut graph, machine, _) = setup(Arc::new(AllowAll));
        let a = graph.create("A").id();

        assert_eq!(
            machine.try_set_status(&mut graph, a, TaskStatus::Completed),
            Err(CompletionError::CompletionMustBeGated(a))
        );

        machine.try_complete(&mut graph, a, None).unwrap();
        machine
            .try_set_status(&mut graph, a, TaskStatus::Queued)
            .unwrap();
        assert!(!graph.get(a).unwrap().is_completed());
        assert_eq!(graph.get(a).unwrap().status(), TaskStatus::Queued);
    }
}
