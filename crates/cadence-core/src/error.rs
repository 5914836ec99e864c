use thiserror::Error;

use crate::app::BuildError;
use crate::config::ConfigError;
use crate::domain::{CompletionError, GraphError, SchedulerError};
use crate::persistence::PersistenceError;
use crate::ports::DispatchError;

/// Any error the engine can report, for hosts that want a single type.
#[derive(Debug, Error)]
pub enum CadenceError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Completion(#[from] CompletionError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Build(#[from] BuildError),
}
