//! Per-board debounce for drag gestures.
//!
//! A move or reorder arriving on a board while the previous one is still
//! inside its cooldown window is dropped, not queued.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

/// Tracks the last accepted move/reorder per board.
#[derive(Debug)]
pub struct DragGuard {
    cooldown: Duration,
    last: HashMap<String, Instant>,
}

impl DragGuard {
    /// Create a guard with the given cooldown window.
    #[must_use]
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last: HashMap::new(),
        }
    }

    /// Accept a gesture on `board` unless one was accepted within the cooldown.
    pub fn try_acquire(&mut self, board: &str) -> bool {
        let now = Instant::now();
        let settling = self
            .last
            .get(board)
            .is_some_and(|at| now.duration_since(*at) < self.cooldown);
        if settling {
            tracing::debug!(project = board, "drag gesture dropped while settling");
            return false;
        }
        self.last.insert(board.to_string(), now);
        true
    }

    /// Carry the cooldown of a renamed board over to its new name.
    pub fn rekey(&mut self, old: &str, new: &str) {
        if let Some(at) = self.last.remove(old) {
            self.last.insert(new.to_string(), at);
        }
    }

    /// Forget a deleted board.
    pub fn forget(&mut self, board: &str) {
        self.last.remove(board);
    }
}
