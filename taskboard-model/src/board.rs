//! The three-column task board of a project.
//!
//! A task id appears in at most one column at any time. Moving a task is a
//! removal from one list followed by an insertion into another, performed on
//! `&mut self`, so callers that swap in a whole new board never expose a
//! half-moved state.

use serde::{Deserialize, Serialize};

use crate::task::{Column, Task, TaskId};

/// Errors that can occur during board operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BoardError {
    /// No board exists for the named project.
    #[error("project not found: {0}")]
    ProjectNotFound(String),
    /// Task with the given ID was not found on the board.
    #[error("task not found: {0}")]
    TaskNotFound(TaskId),
    /// A target index lies outside the column.
    #[error("index {index} out of range for column of length {len}")]
    IndexOutOfRange {
        /// Requested index.
        index: usize,
        /// Column length at the time of the request.
        len: usize,
    },
    /// Task name cannot be empty.
    #[error("task name cannot be empty")]
    TaskNameEmpty,
    /// A task id appears more than once on the board.
    #[error("task {0} appears more than once on the board")]
    DuplicateTask(TaskId),
}

/// Tasks of one project grouped into ordered columns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskBoard {
    /// Not started.
    #[serde(default)]
    pub pending: Vec<Task>,
    /// Being worked on.
    #[serde(default)]
    pub in_progress: Vec<Task>,
    /// Done.
    #[serde(default)]
    pub completed: Vec<Task>,
}

impl TaskBoard {
    /// Creates an empty board.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a board from `(column, task)` entries, ordering each column by position.
    pub fn from_entries(entries: impl IntoIterator<Item = (Column, Task)>) -> Self {
        let mut board = Self::new();
        for (column, task) in entries {
            board.column_mut(column).push(task);
        }
        for column in Column::ALL {
            board.column_mut(column).sort_by_key(|t| t.position);
        }
        board
    }

    /// Tasks in `column`, in display order.
    #[must_use]
    pub fn column(&self, column: Column) -> &[Task] {
        match column {
            Column::Pending => &self.pending,
            Column::InProgress => &self.in_progress,
            Column::Completed => &self.completed,
        }
    }

    fn column_mut(&mut self, column: Column) -> &mut Vec<Task> {
        match column {
            Column::Pending => &mut self.pending,
            Column::InProgress => &mut self.in_progress,
            Column::Completed => &mut self.completed,
        }
    }

    /// Total number of tasks across all columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len() + self.in_progress.len() + self.completed.len()
    }

    /// Returns `true` if no column holds a task.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flattens the board into `(column, task)` pairs in board order.
    pub fn iter(&self) -> impl Iterator<Item = (Column, &Task)> {
        Column::ALL
            .into_iter()
            .flat_map(move |c| self.column(c).iter().map(move |t| (c, t)))
    }

    /// Finds the column and index of a task.
    #[must_use]
    pub fn locate(&self, id: &TaskId) -> Option<(Column, usize)> {
        Column::ALL.into_iter().find_map(|c| {
            self.column(c)
                .iter()
                .position(|t| &t.id == id)
                .map(|i| (c, i))
        })
    }

    /// Returns a task together with its column.
    #[must_use]
    pub fn get(&self, id: &TaskId) -> Option<(Column, &Task)> {
        let (column, index) = self.locate(id)?;
        Some((column, &self.column(column)[index]))
    }

    /// Position key one past the last task of `column`.
    #[must_use]
    pub fn next_position(&self, column: Column) -> i64 {
        self.column(column)
            .last()
            .map_or(0, |t| t.position.saturating_add(1))
    }

    /// Appends a task to the end of `column`, assigning it the next position.
    pub fn push(&mut self, column: Column, mut task: Task) {
        task.position = self.next_position(column);
        self.column_mut(column).push(task);
    }

    /// Places `task` in `column` by its position key, replacing any task with
    /// the same id wherever it sits.
    pub fn upsert(&mut self, column: Column, task: Task) {
        let _ = self.remove(&task.id);
        let list = self.column_mut(column);
        let at = list.partition_point(|t| t.position <= task.position);
        list.insert(at, task);
    }

    /// Removes a task from whichever column holds it.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::TaskNotFound`] if no column holds the task.
    pub fn remove(&mut self, id: &TaskId) -> Result<(Column, Task), BoardError> {
        let (column, index) = self
            .locate(id)
            .ok_or_else(|| BoardError::TaskNotFound(id.clone()))?;
        Ok((column, self.column_mut(column).remove(index)))
    }

    /// Replaces the editable fields of an existing task, keeping its column and position.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::TaskNotFound`] if the task is not on the board.
    pub fn replace(&mut self, task: Task) -> Result<(), BoardError> {
        let (column, index) = self
            .locate(&task.id)
            .ok_or_else(|| BoardError::TaskNotFound(task.id.clone()))?;
        let slot = &mut self.column_mut(column)[index];
        let position = slot.position;
        *slot = Task { position, ..task };
        Ok(())
    }

    /// Moves a task to `to`, inserting it at `index` (or appending when `None`).
    ///
    /// Positions of the source and target columns are renumbered to match
    /// list order afterward.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::TaskNotFound`] or [`BoardError::IndexOutOfRange`].
    /// On error the board is left unchanged.
    pub fn move_task(
        &mut self,
        id: &TaskId,
        to: Column,
        index: Option<usize>,
    ) -> Result<(), BoardError> {
        let (from, from_index) = self
            .locate(id)
            .ok_or_else(|| BoardError::TaskNotFound(id.clone()))?;

        let target_len = if from == to {
            self.column(to).len() - 1
        } else {
            self.column(to).len()
        };
        let index = index.unwrap_or(target_len);
        if index > target_len {
            return Err(BoardError::IndexOutOfRange {
                index,
                len: target_len,
            });
        }

        let task = self.column_mut(from).remove(from_index);
        self.column_mut(to).insert(index, task);
        self.renumber(from);
        if from != to {
            self.renumber(to);
        }
        Ok(())
    }

    /// Reorders a task within one column.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::IndexOutOfRange`] if either index is outside the column.
    pub fn reorder(&mut self, column: Column, from: usize, to: usize) -> Result<(), BoardError> {
        let len = self.column(column).len();
        for index in [from, to] {
            if index >= len {
                return Err(BoardError::IndexOutOfRange { index, len });
            }
        }
        let list = self.column_mut(column);
        let task = list.remove(from);
        list.insert(to, task);
        self.renumber(column);
        Ok(())
    }

    /// Removes every task from every column.
    pub fn clear(&mut self) {
        for column in Column::ALL {
            self.column_mut(column).clear();
        }
    }

    fn renumber(&mut self, column: Column) {
        for (i, task) in self.column_mut(column).iter_mut().enumerate() {
            task.position = i64::try_from(i).unwrap_or(i64::MAX);
        }
    }

    /// Renumbers every column whose positions do not strictly ascend with
    /// list order, so list order is what gets stored. Returns `true` if any
    /// position changed.
    pub fn align_positions(&mut self) -> bool {
        let mut changed = false;
        for column in Column::ALL {
            let ascending = self
                .column(column)
                .windows(2)
                .all(|w| w[0].position < w[1].position);
            if !ascending {
                self.renumber(column);
                changed = true;
            }
        }
        changed
    }

    /// Checks sole-column membership and that positions ascend with list order.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.check().is_ok() && self.positions_ascend()
    }

    /// Verifies that no task id appears twice.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::DuplicateTask`] naming the first repeated id.
    pub fn check(&self) -> Result<(), BoardError> {
        let mut seen = std::collections::HashSet::new();
        match self.iter().find(|(_, t)| !seen.insert(&t.id)) {
            Some((_, t)) => Err(BoardError::DuplicateTask(t.id.clone())),
            None => Ok(()),
        }
    }

    fn positions_ascend(&self) -> bool {
        Column::ALL.into_iter().all(|c| {
            self.column(c)
                .windows(2)
                .all(|w| w[0].position <= w[1].position)
        })
    }
}
