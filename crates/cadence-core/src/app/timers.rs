//! One-shot reset timers.
//!
//! A `ResetTimer` owns the abort handle of a spawned tokio task; dropping
//! the handle cancels the timer. `TimerArena` keeps at most one timer per
//! task, and inserting a new one drops (cancels) the old one.

use std::collections::HashMap;

use tokio::task::AbortHandle;

use crate::domain::TaskId;

/// Handle to an armed reset timer.
#[derive(Debug)]
pub struct ResetTimer {
    generation: u64,
    handle: AbortHandle,
}

impl ResetTimer {
    pub fn new(generation: u64, handle: AbortHandle) -> Self {
        Self { generation, handle }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl Drop for ResetTimer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[derive(Debug, Default)]
pub struct TimerArena {
    timers: HashMap<TaskId, ResetTimer>,
    next_generation: u64,
}

impl TimerArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a generation number for a timer about to be spawned.
    pub fn next_generation(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }

    /// Store `timer` for `task`, cancelling the previous one.
    pub fn arm(&mut self, task: TaskId, timer: ResetTimer) {
        if let Some(previous) = self.timers.insert(task, timer) {
            tracing::debug!(task_id = %task, generation = previous.generation(), "cancelled stale reset timer");
        }
    }

    /// Cancel and forget the timer for `task`.
    pub fn cancel(&mut self, task: TaskId) -> bool {
        self.timers.remove(&task).is_some()
    }

    /// Is `generation` still the live timer for `task`?
    pub fn is_current(&self, task: TaskId, generation: u64) -> bool {
        self.timers
            .get(&task)
            .is_some_and(|t| t.generation() == generation)
    }

    pub fn contains(&self, task: TaskId) -> bool {
        self.timers.contains_key(&task)
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    /// Cancel every timer. Returns how many were armed.
    pub fn clear(&mut self) -> usize {
        let armed = self.timers.len();
        self.timers.clear();
        armed
    }
}
