//! Domain model (ids, tasks, relations, recurrence, events, errors).

pub mod directory;
pub mod errors;
pub mod events;
pub mod ids;
pub mod recurrence;
pub mod relation;
pub mod state;
pub mod task;

pub use directory::{Actor, Resource, Role};
pub use errors::{CompletionError, GraphError, SchedulerError};
pub use events::{Notification, NotificationLevel, NotificationTopic};
pub use ids::{ActorId, BoardId, Id, IdMarker, ResourceId, RoleId, TaskId};
pub use recurrence::{RecurrenceConfig, RecurrenceKind};
pub use relation::{Relation, RelationKind};
pub use state::TaskStatus;
pub use task::{ResourceUsage, Task};
