//! Task node: the unit of work stored in the task graph.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{ActorId, ResourceId, TaskId};
use super::state::TaskStatus;

/// How much of a resource a task consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceUsage {
    pub resource: ResourceId,
    pub amount: f64,
}

/// Task record.
///
/// Design:
/// - Free-form fields (title, priority, payload, ...) have plain setters.
/// - `status` and `completed` are only changed by the completion state
///   machine (`pub(crate)` mutators), so callers holding `&mut Task` cannot
///   skip dependency gating.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    id: TaskId,
    title: String,
    status: TaskStatus,
    completed: bool,
    pub priority: i32,
    pub payload: String,
    pub deadline: Option<DateTime<Utc>>,
    pub assignee: Option<ActorId>,
    pub resource_usages: Vec<ResourceUsage>,
}

impl Task {
    pub fn new(id: TaskId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            status: TaskStatus::Queued,
            completed: false,
            priority: 0,
            payload: String::new(),
            deadline: None,
            assignee: None,
            resource_usages: Vec::new(),
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// Does this task keep its dependents from completing?
    pub fn is_blocking(&self) -> bool {
        !self.completed && self.status.is_blocking()
    }

    pub fn add_resource_usage(&mut self, resource: ResourceId, amount: f64) {
        self.resource_usages.push(ResourceUsage { resource, amount });
    }

    /// Mark completed (status + flag together).
    pub(crate) fn mark_completed(&mut self) {
        self.status = TaskStatus::Completed;
        self.completed = true;
    }

    /// Set a non-Completed status. Leaving Completed clears the flag.
    pub(crate) fn set_open_status(&mut self, status: TaskStatus) {
        debug_assert!(status != TaskStatus::Completed);
        self.status = status;
        self.completed = false;
    }
}
