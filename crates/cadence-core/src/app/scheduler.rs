//! RecurringScheduler - 繰り返しタスクの設定・sweep・リセットタイマー
//!
//! # 設計原則
//! - 設定マップとタイマーアリーナは 1 つの `Mutex` で守る
//! - ロックを握ったまま通知・dispatch をしない（短いクリティカルセクションだけ）
//! - タスクは変更しない。リセットが必要なら `ResetDispatcher` に依頼し、
//!   所有スレッドが `Engine::apply_reset` で再検証してから適用する
//! - sweep とタイマーは `Weak` しか持たないので、Scheduler が drop されたら止まる
//!
//! # 停止
//! `shutdown()` は何度呼んでもよい。sweep は watch チャネルで止まり、
//! 待機中のタイマーは取り消し、それでも発火したものは disposed フラグを見て何もしない。

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use super::completion::CompletionListener;
use super::timers::{ResetTimer, TimerArena};
use crate::domain::{
    Notification, NotificationLevel, NotificationTopic, RecurrenceConfig, SchedulerError, Task,
    TaskId,
};
use crate::ports::{Clock, NotificationSink, ResetDispatcher, ResetOrigin, ResetRequest};

/// 1 回の sweep の結果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub reminders: usize,
    pub reset_requests: usize,
}

/// 繰り返しタスクのスケジューラ（clone しても同じ状態を共有する）
#[derive(Clone)]
pub struct RecurringScheduler {
    inner: Arc<Inner>,
}

struct Inner {
    state: Mutex<State>,
    disposed: AtomicBool,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn NotificationSink>,
    dispatcher: Arc<dyn ResetDispatcher>,
    runtime: Handle,
    shutdown_tx: watch::Sender<bool>,
}

#[derive(Default)]
struct State {
    configs: HashMap<TaskId, RecurrenceConfig>,
    timers: TimerArena,
}

impl RecurringScheduler {
    /// Scheduler を作り、`runtime` 上で sweep を開始する
    pub fn start(
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn NotificationSink>,
        dispatcher: Arc<dyn ResetDispatcher>,
        runtime: Handle,
        sweep_interval: Duration,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let inner = Arc::new(Inner {
            state: Mutex::new(State::default()),
            disposed: AtomicBool::new(false),
            clock,
            notifier,
            dispatcher,
            runtime: runtime.clone(),
            shutdown_tx,
        });

        runtime.spawn(sweep_loop(Arc::downgrade(&inner), sweep_interval, shutdown_rx));
        tracing::debug!(interval_secs = sweep_interval.as_secs(), "recurring scheduler started");

        Self { inner }
    }

    /// 設定を upsert する
    ///
    /// - 繰り返しで `next_due` が未設定なら「今」から計算する
    /// - 待機中のリセットタイマーは取り消す
    pub fn configure(&self, id: TaskId, mut config: RecurrenceConfig) -> Result<(), SchedulerError> {
        if self.is_disposed() {
            return Err(SchedulerError::Disposed);
        }
        config.validate()?;
        if config.is_recurring() && config.next_due.is_none() {
            config.next_due = Some(config.next_due_date(self.inner.clock.now()));
        }

        let mut state = self.inner.lock();
        let cancelled = state.timers.cancel(id);
        state.configs.insert(id, config);
        drop(state);

        tracing::debug!(task_id = %id, cancelled_timer = cancelled, "recurrence configured");
        Ok(())
    }

    /// 設定を削除し、待機中のタイマーも取り消す
    pub fn remove(&self, id: TaskId) -> Option<RecurrenceConfig> {
        let mut state = self.inner.lock();
        state.timers.cancel(id);
        let removed = state.configs.remove(&id);
        drop(state);

        if removed.is_some() {
            tracing::debug!(task_id = %id, "recurrence removed");
        }
        removed
    }

    pub fn get(&self, id: TaskId) -> Option<RecurrenceConfig> {
        self.inner.lock().configs.get(&id).cloned()
    }

    /// すべての設定（task id 順）
    pub fn all(&self) -> Vec<(TaskId, RecurrenceConfig)> {
        let mut all: Vec<_> = self
            .inner
            .lock()
            .configs
            .iter()
            .map(|(id, config)| (*id, config.clone()))
            .collect();
        all.sort_by_key(|(id, _)| *id);
        all
    }

    /// 完了時の処理
    ///
    /// - 繰り返しなら次回期日を「今」から再計算
    /// - auto-reset なら `last_reset = now` を記録してタイマーを張り直す
    pub fn on_task_completed(&self, id: TaskId) {
        if self.is_disposed() {
            return;
        }
        let now = self.inner.clock.now();

        let mut state = self.inner.lock();
        let Some(config) = state.configs.get_mut(&id) else {
            return;
        };
        if config.is_recurring() {
            config.next_due = Some(config.next_due_date(now));
        }
        let delay = match (config.auto_reset, config.auto_reset_delay) {
            (true, Some(delay)) => delay,
            _ => return,
        };
        config.last_reset = Some(now);
        self.arm_locked(&mut state, id, delay);
    }

    /// `id` のリセット条件を評価する
    pub fn should_reset(&self, id: TaskId, now: DateTime<Utc>, is_completed: bool) -> bool {
        self.inner
            .lock()
            .configs
            .get(&id)
            .is_some_and(|config| config.should_reset(now, is_completed))
    }

    /// リセットを適用したことを記録する（`last_reset` とタイマーの後始末）
    pub fn record_reset(&self, id: TaskId, at: DateTime<Utc>) {
        let mut state = self.inner.lock();
        state.timers.cancel(id);
        if let Some(config) = state.configs.get_mut(&id) {
            config.last_reset = Some(at);
        }
    }

    /// 待機中のリセットを取り消す（設定はそのまま）
    pub fn cancel_reset(&self, id: TaskId) -> bool {
        self.inner.lock().timers.cancel(id)
    }

    /// 読み込み直後など、残り時間でタイマーを張り直す
    ///
    /// 残り = `last_reset + delay - now`（負なら 0）
    pub fn rearm(&self, id: TaskId) -> bool {
        if self.is_disposed() {
            return false;
        }
        let now = self.inner.clock.now();

        let mut state = self.inner.lock();
        let Some(due) = state.configs.get(&id).and_then(RecurrenceConfig::reset_due_at) else {
            return false;
        };
        let remaining = (due - now).max(TimeDelta::zero());
        self.arm_locked(&mut state, id, remaining);
        true
    }

    pub fn has_pending_timer(&self, id: TaskId) -> bool {
        self.inner.lock().timers.contains(id)
    }

    pub fn pending_timers(&self) -> usize {
        self.inner.lock().timers.len()
    }

    /// sweep を 1 回実行する（通常は周期タイマーから呼ばれる）
    pub fn sweep_once(&self) -> SweepReport {
        self.inner.sweep()
    }

    /// 停止する。何度呼んでもよい
    pub fn shutdown(&self) {
        if self.inner.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        // ignore send error: the sweep may already be gone
        let _ = self.inner.shutdown_tx.send(true);
        let cancelled = self.inner.lock().timers.clear();
        tracing::debug!(cancelled_timers = cancelled, "recurring scheduler disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }

    /// ロック取得済みの状態にタイマーを張る（古いタイマーは arm で取り消される）
    fn arm_locked(&self, state: &mut State, id: TaskId, delay: TimeDelta) {
        let generation = state.timers.next_generation();
        let sleep_for = delay.to_std().unwrap_or(Duration::ZERO);
        let weak = Arc::downgrade(&self.inner);

        let handle = self
            .inner
            .runtime
            .spawn(async move {
                tokio::time::sleep(sleep_for).await;
                if let Some(inner) = weak.upgrade() {
                    inner.fire(id, generation);
                }
            })
            .abort_handle();

        state.timers.arm(id, ResetTimer::new(generation, handle));
        tracing::debug!(task_id = %id, generation, delay_secs = sleep_for.as_secs(), "reset timer armed");
    }
}

impl CompletionListener for RecurringScheduler {
    fn on_task_completed(&self, task: &Task) {
        RecurringScheduler::on_task_completed(self, task.id());
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// タイマー発火: 最新のタイマーで、設定が残っていればリセットを依頼する
    fn fire(&self, id: TaskId, generation: u64) {
        if self.is_disposed() {
            tracing::debug!(task_id = %id, "reset timer fired after dispose");
            return;
        }
        let now = self.clock.now();
        {
            let state = self.lock();
            if !state.timers.is_current(id, generation) || !state.configs.contains_key(&id) {
                tracing::debug!(task_id = %id, generation, "stale reset timer");
                return;
            }
        }

        tracing::debug!(task_id = %id, generation, "reset timer fired");
        self.request_reset(id, now, ResetOrigin::Timer);
    }

    fn request_reset(&self, task_id: TaskId, requested_at: DateTime<Utc>, origin: ResetOrigin) -> bool {
        let request = ResetRequest {
            task_id,
            requested_at,
            origin,
        };
        match self.dispatcher.request_reset(request) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(task_id = %task_id, ?origin, "failed to request reset: {err}");
                false
            }
        }
    }

    fn sweep(&self) -> SweepReport {
        let mut report = SweepReport::default();
        if self.is_disposed() {
            return report;
        }
        let now = self.clock.now();

        // snapshot under the lock, evaluate outside
        let snapshot: Vec<(TaskId, RecurrenceConfig, bool)> = {
            let state = self.lock();
            state
                .configs
                .iter()
                .map(|(id, config)| (*id, config.clone(), state.timers.contains(*id)))
                .collect()
        };

        let mut reminders = Vec::new();
        let mut resets = Vec::new();
        for (id, config, armed) in &snapshot {
            if config.should_notify(now) {
                reminders.push(*id);
            }
            if *armed && config.reset_due_at().is_some_and(|due| now >= due) {
                resets.push(*id);
            }
        }

        for id in reminders {
            // re-validate and stamp under the lock; notify after releasing it
            let message = {
                let mut state = self.lock();
                match state.configs.get_mut(&id) {
                    Some(config) if config.should_notify(now) => {
                        config.last_notification = Some(now);
                        Some(config.reminder_message())
                    }
                    _ => None,
                }
            };
            let Some(message) = message else {
                continue;
            };
            self.notifier.notify(
                Notification::new(NotificationLevel::Info, NotificationTopic::Reminder, message, now)
                    .for_task(id),
            );
            report.reminders += 1;
        }

        for id in resets {
            if self.request_reset(id, now, ResetOrigin::Sweep) {
                report.reset_requests += 1;
            }
        }

        tracing::debug!(
            configs = snapshot.len(),
            reminders = report.reminders,
            reset_requests = report.reset_requests,
            "sweep finished"
        );
        report
    }
}

async fn sweep_loop(inner: Weak<Inner>, period: Duration, mut shutdown_rx: watch::Receiver<bool>) {
    let start = tokio::time::Instant::now() + period;
    let mut ticker = tokio::time::interval_at(start, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
            _ = ticker.tick() => {}
        }

        let Some(inner) = inner.upgrade() else {
            break;
        };
        inner.sweep();
    }
    tracing::debug!("sweep loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RecurrenceKind;
    use crate::impls::{ChannelDispatcher, CollectingSink, OwnerInbox};
    use crate::ports::TokioClock;
    use chrono::TimeZone;
    use ulid::Ulid;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap()
    }

    fn scheduler(sweep: Duration) -> (RecurringScheduler, OwnerInbox, Arc<CollectingSink>) {
        let (dispatcher, inbox) = ChannelDispatcher::new();
        let sink = Arc::new(CollectingSink::new());
        let scheduler = RecurringScheduler::start(
            Arc::new(TokioClock::starting_at(t0())),
            sink.clone(),
            Arc::new(dispatcher),
            Handle::current(),
            sweep,
        );
        (scheduler, inbox, sink)
    }

    fn task() -> TaskId {
        TaskId::from_ulid(Ulid::new())
    }

    #[tokio::test(start_paused = true)]
    async fn configure_computes_next_due_from_now() {
        let (scheduler, _inbox, _) = scheduler(Duration::from_secs(60));
        let id = task();

        scheduler
            .configure(id, RecurrenceConfig::new(RecurrenceKind::Daily, 3))
            .unwrap();

        let config = scheduler.get(id).unwrap();
        assert_eq!(config.next_due, Some(t0() + TimeDelta::days(3)));
    }

    #[tokio::test(start_paused = true)]
    async fn configure_rejects_invalid_and_disposed() {
        let (scheduler, _inbox, _) = scheduler(Duration::from_secs(60));

        let invalid = RecurrenceConfig::new(RecurrenceKind::Daily, 0);
        assert_eq!(
            scheduler.configure(task(), invalid),
            Err(SchedulerError::InvalidInterval)
        );

        scheduler.shutdown();
        scheduler.shutdown();
        assert_eq!(
            scheduler.configure(task(), RecurrenceConfig::default()),
            Err(SchedulerError::Disposed)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn completion_arms_timer_that_requests_reset() {
        let (scheduler, mut inbox, _) = scheduler(Duration::from_secs(3600));
        let id = task();
        scheduler
            .configure(
                id,
                RecurrenceConfig::new(RecurrenceKind::Minutes, 5)
                    .with_auto_reset(TimeDelta::minutes(2)),
            )
            .unwrap();

        scheduler.on_task_completed(id);

        let config = scheduler.get(id).unwrap();
        assert_eq!(config.next_due, Some(t0() + TimeDelta::minutes(5)));
        assert_eq!(config.last_reset, Some(t0()));
        assert!(scheduler.has_pending_timer(id));

        let request = inbox.recv().await.unwrap();
        assert_eq!(request.task_id, id);
        assert_eq!(request.origin, ResetOrigin::Timer);
        assert!(request.requested_at >= t0() + TimeDelta::minutes(2));
        assert!(request.requested_at < t0() + TimeDelta::minutes(2) + TimeDelta::seconds(1));
    }

    #[tokio::test(start_paused = true)]
    async fn recompleting_replaces_the_timer() {
        let (scheduler, mut inbox, _) = scheduler(Duration::from_secs(3600));
        let id = task();
        scheduler
            .configure(
                id,
                RecurrenceConfig::new(RecurrenceKind::Minutes, 5)
                    .with_auto_reset(TimeDelta::minutes(2)),
            )
            .unwrap();

        scheduler.on_task_completed(id);
        tokio::time::sleep(Duration::from_secs(60)).await;
        scheduler.on_task_completed(id);
        tokio::time::sleep(Duration::from_secs(180)).await;

        let request = inbox.try_recv().unwrap();
        assert!(request.requested_at >= t0() + TimeDelta::minutes(3));
        assert!(inbox.try_recv().is_none());
        assert_eq!(scheduler.pending_timers(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn remove_cancels_pending_timer() {
        let (scheduler, mut inbox, _) = scheduler(Duration::from_secs(3600));
        let id = task();
        scheduler
            .configure(
                id,
                RecurrenceConfig::new(RecurrenceKind::Hours, 1).with_auto_reset(TimeDelta::seconds(30)),
            )
            .unwrap();
        scheduler.on_task_completed(id);

        assert!(scheduler.remove(id).is_some());
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert!(inbox.try_recv().is_none());
        assert_eq!(scheduler.pending_timers(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn timer_after_shutdown_is_a_no_op() {
        let (scheduler, mut inbox, _) = scheduler(Duration::from_secs(3600));
        let id = task();
        scheduler
            .configure(
                id,
                RecurrenceConfig::new(RecurrenceKind::Minutes, 1).with_auto_reset(TimeDelta::seconds(10)),
            )
            .unwrap();
        scheduler.on_task_completed(id);

        scheduler.shutdown();
        tokio::time::sleep(Duration::from_secs(20)).await;

        assert!(inbox.try_recv().is_none());
        assert_eq!(scheduler.pending_timers(), 0);
        assert!(!scheduler.rearm(id));
    }

    #[tokio::test(start_paused = true)]
    async fn periodic_sweep_emits_debounced_reminders() {
        let (scheduler, _inbox, sink) = scheduler(Duration::from_secs(30));
        let id = task();
        let mut config = RecurrenceConfig::new(RecurrenceKind::Minutes, 1);
        config.next_due = Some(t0());
        scheduler.configure(id, config).unwrap();

        // sweeps at +30s, +60s, +90s, +120s, +150s
        tokio::time::sleep(Duration::from_secs(155)).await;

        let reminders = sink.with_topic(NotificationTopic::Reminder);
        assert_eq!(reminders.len(), 3);
        for pair in reminders.windows(2) {
            assert!(pair[1].at - pair[0].at >= TimeDelta::minutes(1));
        }
        assert_eq!(reminders[0].task_id, Some(id));
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_requests_overdue_reset_for_armed_task() {
        let (scheduler, mut inbox, _) = scheduler(Duration::from_secs(3600));
        let id = task();
        let mut config = RecurrenceConfig::new(RecurrenceKind::Minutes, 5)
            .with_auto_reset(TimeDelta::minutes(2))
            .without_notifications();
        config.last_reset = Some(t0() - TimeDelta::minutes(10));
        scheduler.configure(id, config).unwrap();
        assert!(scheduler.rearm(id));

        let report = scheduler.sweep_once();

        assert_eq!(report.reset_requests, 1);
        assert_eq!(inbox.try_recv().unwrap().origin, ResetOrigin::Sweep);
    }

    #[tokio::test(start_paused = true)]
    async fn record_reset_stamps_and_clears_timer() {
        let (scheduler, _inbox, _) = scheduler(Duration::from_secs(3600));
        let id = task();
        scheduler
            .configure(
                id,
                RecurrenceConfig::new(RecurrenceKind::Daily, 1).with_auto_reset(TimeDelta::hours(1)),
            )
            .unwrap();
        scheduler.on_task_completed(id);
        let at = t0() + TimeDelta::hours(1);

        assert!(scheduler.should_reset(id, at, true));
        scheduler.record_reset(id, at);

        assert!(!scheduler.has_pending_timer(id));
        assert_eq!(scheduler.get(id).unwrap().last_reset, Some(at));
    }

    #[tokio::test(start_paused = true)]
    async fn extreme_dates_do_not_stop_reminders_for_other_tasks() {
        let (scheduler, _inbox, sink) = scheduler(Duration::from_secs(30));
        let huge = RecurrenceConfig::new(RecurrenceKind::Daily, 1)
            .with_notification_advance(TimeDelta::seconds(10_000_000_000_000));
        assert_eq!(
            scheduler.configure(task(), huge),
            Err(SchedulerError::InvalidAdvance)
        );

        // window start lies before the earliest representable instant
        let edge = task();
        let mut config = RecurrenceConfig::new(RecurrenceKind::Daily, 1)
            .with_notification_advance(TimeDelta::minutes(15));
        config.next_due = Some(DateTime::<Utc>::MIN_UTC + TimeDelta::minutes(1));
        scheduler.configure(edge, config).unwrap();

        let good = task();
        let mut config = RecurrenceConfig::new(RecurrenceKind::Minutes, 1);
        config.next_due = Some(t0());
        scheduler.configure(good, config).unwrap();

        // sweeps at +30s, +60s, +90s, +120s, +150s
        tokio::time::sleep(Duration::from_secs(155)).await;

        let reminders = sink.with_topic(NotificationTopic::Reminder);
        assert_eq!(reminders.len(), 3);
        assert!(reminders.iter().all(|n| n.task_id == Some(good)));
    }

    #[tokio::test(start_paused = true)]
    async fn closed_inbox_is_logged_and_sweeps_keep_running() {
        let (scheduler, inbox, sink) = scheduler(Duration::from_secs(30));
        let reset = task();
        scheduler
            .configure(
                reset,
                RecurrenceConfig::new(RecurrenceKind::Hours, 1)
                    .with_auto_reset(TimeDelta::seconds(10))
                    .without_notifications(),
            )
            .unwrap();
        let nag = task();
        let mut config = RecurrenceConfig::new(RecurrenceKind::Minutes, 1);
        config.next_due = Some(t0());
        scheduler.configure(nag, config).unwrap();

        scheduler.on_task_completed(reset);
        drop(inbox);

        // the timer fires at +10s; sweeps at +30s and +60s
        tokio::time::sleep(Duration::from_secs(65)).await;
        assert_eq!(sink.with_topic(NotificationTopic::Reminder).len(), 1);

        // +90s sweep still runs after two failed reset requests
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(sink.with_topic(NotificationTopic::Reminder).len(), 2);

        let report = scheduler.sweep_once();
        assert_eq!(report.reset_requests, 0);
        assert!(scheduler.has_pending_timer(reset));
        assert!(!scheduler.is_disposed());
    }
}
