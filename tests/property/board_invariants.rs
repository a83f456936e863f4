//! Property-based board invariant tests.
//!
//! Uses proptest to verify:
//! 1. Any sequence of moves and reorders preserves the task count.
//! 2. Every task id stays in exactly one column.
//! 3. Positions always ascend with list order.
//! 4. A rejected move leaves the board untouched.

#![allow(clippy::unwrap_used)]

use proptest::prelude::*;
use taskboard_model::board::TaskBoard;
use taskboard_model::task::{Column, Task, TaskDraft};

// --- Strategies ---

fn arb_column() -> impl Strategy<Value = Column> {
    prop_oneof![
        Just(Column::Pending),
        Just(Column::InProgress),
        Just(Column::Completed),
    ]
}

/// A board with up to 12 tasks spread over the three columns.
fn arb_board() -> impl Strategy<Value = TaskBoard> {
    prop::collection::vec(arb_column(), 0..12).prop_map(|columns| {
        let mut board = TaskBoard::new();
        for (i, column) in columns.into_iter().enumerate() {
            board.push(column, Task::from_draft(TaskDraft::named(format!("t{i}")), 0));
        }
        board
    })
}

#[derive(Debug, Clone)]
enum Gesture {
    /// Move the n-th task (mod count) to a column, at an optional index.
    Move(usize, Column, Option<usize>),
    /// Reorder within a column.
    Reorder(Column, usize, usize),
}

fn arb_gesture() -> impl Strategy<Value = Gesture> {
    prop_oneof![
        (any::<usize>(), arb_column(), prop::option::of(0usize..14))
            .prop_map(|(n, c, i)| Gesture::Move(n, c, i)),
        (arb_column(), 0usize..14, 0usize..14).prop_map(|(c, a, b)| Gesture::Reorder(c, a, b)),
    ]
}

fn apply(board: &mut TaskBoard, gesture: &Gesture) -> bool {
    match gesture {
        Gesture::Move(n, to, index) => {
            let ids: Vec<_> = board.iter().map(|(_, t)| t.id.clone()).collect();
            if ids.is_empty() {
                return false;
            }
            board.move_task(&ids[n % ids.len()], *to, *index).is_ok()
        }
        Gesture::Reorder(column, from, to) => board.reorder(*column, *from, *to).is_ok(),
    }
}

proptest! {
    #[test]
    fn gestures_preserve_count_and_membership(
        board in arb_board(),
        gestures in prop::collection::vec(arb_gesture(), 0..20),
    ) {
        let mut board = board;
        let count = board.len();
        for gesture in &gestures {
            apply(&mut board, gesture);
            prop_assert_eq!(board.len(), count);
            prop_assert!(board.is_consistent());
        }
    }

    #[test]
    fn rejected_gesture_leaves_board_unchanged(
        board in arb_board(),
        gesture in arb_gesture(),
    ) {
        let mut after = board.clone();
        if !apply(&mut after, &gesture) {
            prop_assert_eq!(after, board);
        }
    }

    #[test]
    fn move_lands_task_in_target_column_once(
        board in arb_board(),
        n in any::<usize>(),
        to in arb_column(),
    ) {
        prop_assume!(!board.is_empty());
        let id = board.iter().nth(n % board.len()).map(|(_, t)| t.id.clone()).unwrap();
        let mut board = board;
        board.move_task(&id, to, None).unwrap();

        let (column, _) = board.get(&id).unwrap();
        prop_assert_eq!(column, to);
        let hits = board.iter().filter(|(_, t)| t.id == id).count();
        prop_assert_eq!(hits, 1);
    }
}
