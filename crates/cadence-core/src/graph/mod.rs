//! Graph module: task store, relation index and boards.

mod board;
mod dependency;
mod store;

pub use board::{Board, Boards};
pub use dependency::DependencyGraph;
pub use store::TaskGraph;
