//! Boards: named groupings of tasks (a "graph" in the saved layout).

use std::collections::BTreeMap;

use crate::domain::{BoardId, TaskId};

#[derive(Debug, Clone, PartialEq)]
pub struct Board {
    pub id: BoardId,
    pub name: String,
    tasks: Vec<TaskId>,
}

impl Board {
    pub fn new(id: BoardId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            tasks: Vec::new(),
        }
    }

    pub fn tasks(&self) -> &[TaskId] {
        &self.tasks
    }

    pub fn contains(&self, task: TaskId) -> bool {
        self.tasks.contains(&task)
    }

    /// Add a task once; re-adding is a no-op.
    pub fn add(&mut self, task: TaskId) {
        if !self.contains(task) {
            self.tasks.push(task);
        }
    }

    pub fn remove(&mut self, task: TaskId) {
        self.tasks.retain(|t| *t != task);
    }
}

/// All boards, with one designated default board.
#[derive(Debug)]
pub struct Boards {
    boards: BTreeMap<BoardId, Board>,
    default: BoardId,
}

impl Boards {
    pub fn new(default: Board) -> Self {
        let id = default.id;
        Self {
            boards: BTreeMap::from([(id, default)]),
            default: id,
        }
    }

    pub fn default_id(&self) -> BoardId {
        self.default
    }

    pub fn get(&self, id: BoardId) -> Option<&Board> {
        self.boards.get(&id)
    }

    pub fn get_mut(&mut self, id: BoardId) -> Option<&mut Board> {
        self.boards.get_mut(&id)
    }

    pub fn insert(&mut self, board: Board) {
        self.boards.insert(board.id, board);
    }

    /// Find a board by id or create it with `name`.
    pub fn get_or_insert(&mut self, id: BoardId, name: &str) -> &mut Board {
        self.boards.entry(id).or_insert_with(|| Board::new(id, name))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Board> {
        self.boards.values()
    }

    pub fn len(&self) -> usize {
        self.boards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boards.is_empty()
    }

    /// Make `board` the default, replacing the current default only while
    /// it is still empty. Returns whether `board` is now the default.
    pub fn adopt_default(&mut self, board: Board) -> bool {
        if board.id == self.default {
            return true;
        }
        let current_is_empty = self
            .boards
            .get(&self.default)
            .is_none_or(|b| b.tasks.is_empty());
        if !current_is_empty {
            return false;
        }
        self.boards.remove(&self.default);
        self.default = board.id;
        self.boards.entry(board.id).or_insert(board);
        true
    }

    /// Drop `task` from every board.
    pub fn forget_task(&mut self, task: TaskId) {
        for board in self.boards.values_mut() {
            board.remove(task);
        }
    }

    pub fn is_placed(&self, task: TaskId) -> bool {
        self.boards.values().any(|b| b.contains(task))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulid::Ulid;

    #[test]
    fn board_add_is_idempotent() {
        let mut board = Board::new(BoardId::from_ulid(Ulid::new()), "Tasks");
        let t = TaskId::from_ulid(Ulid::new());

        board.add(t);
        board.add(t);

        assert_eq!(board.tasks(), &[t]);
    }

    #[test]
    fn adopt_default_only_replaces_an_empty_default() {
        let mut boards = Boards::new(Board::new(BoardId::from_ulid(Ulid::new()), "Tasks"));
        let saved = BoardId::from_ulid(Ulid::new());

        assert!(boards.adopt_default(Board::new(saved, "Saved")));
        assert_eq!(boards.default_id(), saved);
        assert_eq!(boards.len(), 1);

        boards
            .get_mut(saved)
            .unwrap()
            .add(TaskId::from_ulid(Ulid::new()));
        assert!(!boards.adopt_default(Board::new(BoardId::from_ulid(Ulid::new()), "Other")));
        assert_eq!(boards.default_id(), saved);
    }

    #[test]
    fn forget_task_removes_from_all_boards() {
        let first = Board::new(BoardId::from_ulid(Ulid::new()), "first");
        let mut boards = Boards::new(first);
        let second = boards.get_or_insert(BoardId::from_ulid(Ulid::new()), "second").id;
        let t = TaskId::from_ulid(Ulid::new());
        boards.get_mut(boards.default_id()).unwrap().add(t);
        boards.get_mut(second).unwrap().add(t);

        boards.forget_task(t);

        assert!(!boards.is_placed(t));
        assert_eq!(boards.len(), 2);
    }
}
