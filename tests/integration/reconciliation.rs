//! Integration tests for diff-based reconciliation.
//!
//! Exercises plan classification, concurrent execution against the
//! in-memory remote, partial failures without rollback, and timeouts.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::time::Duration;

use chrono::{TimeZone, Utc};

use taskboard::colors::{ColorManager, Palette};
use taskboard::config::SyncConfig;
use taskboard::remote::{MemoryRemote, RemoteError, RemoteOp};
use taskboard::store::{LocalStore, MemoryBackend};
use taskboard::sync::reconcile::{self, ReconcilePlan};
use taskboard::sync::{LoadOutcome, SyncEngine};
use taskboard_model::board::TaskBoard;
use taskboard_model::project::{OwnerId, ProjectId};
use taskboard_model::remote::TaskRow;
use taskboard_model::status::SyncStatus;
use taskboard_model::task::{Column, Priority, Task, TaskDraft};

const TIMEOUT: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// Helper functions
// ---------------------------------------------------------------------------

fn owner() -> OwnerId {
    OwnerId::new("user-1")
}

fn task(name: &str) -> Task {
    Task::from_draft(TaskDraft::named(name), 0)
}

/// Mirrors `board` into a fresh remote project and returns its id.
fn seed_remote(remote: &MemoryRemote, board: &TaskBoard) -> ProjectId {
    let row = remote.seed_project(&owner(), "Home", "#ef4444");
    for (column, task) in board.iter() {
        remote.seed_task(TaskRow::from_task(task, column, &row.id, &owner(), Utc::now()));
    }
    row.id
}

/// Remote snapshot `{t1, t2}` and local board `{t2', t3}` where `t2'`
/// differs from `t2` in priority.
fn scenario() -> (TaskBoard, TaskBoard, [Task; 3]) {
    let t1 = task("t1");
    let t2 = task("t2");
    let t3 = task("t3");

    let mut remote = TaskBoard::new();
    remote.push(Column::Pending, t1.clone());
    remote.push(Column::Pending, t2.clone());

    let mut edited = t2.clone();
    edited.priority = Priority::High;
    let mut local = TaskBoard::new();
    local.push(Column::Pending, edited);
    local.push(Column::Pending, t3.clone());

    (remote, local, [t1, t2, t3])
}

// ===========================================================================
// Plan and execution
// ===========================================================================

#[tokio::test]
async fn diff_computes_minimal_operation_sets() {
    let (confirmed, local, [t1, t2, t3]) = scenario();
    let plan = ReconcilePlan::between(&confirmed, &local);

    assert_eq!(plan.to_delete, vec![t1.id.clone()]);
    let created: Vec<_> = plan.to_create.iter().map(|(_, t)| t.id.clone()).collect();
    assert_eq!(created, vec![t3.id.clone()]);
    let updated: Vec<_> = plan.to_update.iter().map(|(_, t)| t.id.clone()).collect();
    assert_eq!(updated, vec![t2.id.clone()]);

    let remote = MemoryRemote::new();
    let project = seed_remote(&remote, &confirmed);
    let result = reconcile::execute(&remote, &owner(), &project, &plan, TIMEOUT).await;

    assert!(result.is_complete());
    assert_eq!(result.created, vec![t3.id.clone()]);
    assert_eq!(result.updated, vec![t2.id.clone()]);
    assert_eq!(result.deleted, vec![t1.id.clone()]);

    assert!(remote.task(&t1.id).is_none());
    assert_eq!(remote.task(&t2.id).unwrap().priority, Priority::High);
    assert!(remote.task(&t3.id).is_some());
}

#[tokio::test]
async fn applied_result_makes_next_plan_empty() {
    let (mut confirmed, local, _) = scenario();
    let remote = MemoryRemote::new();
    let project = seed_remote(&remote, &confirmed);

    let plan = ReconcilePlan::between(&confirmed, &local);
    let result = reconcile::execute(&remote, &owner(), &project, &plan, TIMEOUT).await;
    result.apply_to(&plan, &mut confirmed);

    assert!(ReconcilePlan::between(&confirmed, &local).is_empty());
}

#[tokio::test]
async fn partial_failure_is_reported_and_retried_next_time() {
    let (mut confirmed, local, [t1, t2, t3]) = scenario();
    let remote = MemoryRemote::new();
    let project = seed_remote(&remote, &confirmed);
    remote.fail_task(&t3.id);

    let plan = ReconcilePlan::between(&confirmed, &local);
    let result = reconcile::execute(&remote, &owner(), &project, &plan, TIMEOUT).await;

    assert!(!result.is_complete());
    assert_eq!(result.failures.len(), 1);
    assert_eq!(result.failures[0].task_id, t3.id);
    assert_eq!(result.failures[0].op, RemoteOp::CreateTask);
    assert_eq!(result.deleted, vec![t1.id]);
    assert_eq!(result.updated, vec![t2.id]);

    result.apply_to(&plan, &mut confirmed);
    let retry = ReconcilePlan::between(&confirmed, &local);
    assert_eq!(retry.len(), 1);
    assert_eq!(retry.to_create[0].1.id, t3.id);
}

#[tokio::test(start_paused = true)]
async fn slow_remote_calls_time_out() {
    let (confirmed, local, _) = scenario();
    let remote = MemoryRemote::new();
    let project = seed_remote(&remote, &confirmed);
    remote.set_latency(Some(Duration::from_secs(30)));

    let plan = ReconcilePlan::between(&confirmed, &local);
    let result =
        reconcile::execute(&remote, &owner(), &project, &plan, Duration::from_secs(1)).await;

    assert_eq!(result.failures.len(), plan.len());
    assert!(
        result
            .failures
            .iter()
            .all(|f| f.error == RemoteError::Timeout)
    );
}

#[test]
fn sub_millisecond_date_noise_is_not_an_update() {
    let mut stored = task("due");
    stored.due_date_time = Some(Utc.timestamp_opt(1_700_000_000, 123_000_000).unwrap());
    let mut precise = stored.clone();
    precise.due_date_time = Some(Utc.timestamp_opt(1_700_000_000, 123_456_789).unwrap());

    let mut confirmed = TaskBoard::new();
    confirmed.push(Column::Pending, stored);
    let mut local = TaskBoard::new();
    local.push(Column::Pending, precise);

    assert!(ReconcilePlan::between(&confirmed, &local).is_empty());
}

// ===========================================================================
// Through the engine
// ===========================================================================

#[tokio::test]
async fn engine_keeps_local_board_on_partial_failure() {
    let remote = MemoryRemote::new();
    let project = seed_remote(&remote, &TaskBoard::new());
    let engine = SyncEngine::with_colors(
        remote.clone(),
        LocalStore::open(MemoryBackend::new()),
        SyncConfig::default(),
        ColorManager::seeded(Palette::default(), 1),
    );
    assert_eq!(engine.load(Some(owner()), true).await, LoadOutcome::Remote);

    let good = task("good");
    let bad = task("bad");
    remote.fail_task(&bad.id);
    let mut board = TaskBoard::new();
    board.push(Column::Pending, good.clone());
    board.push(Column::Pending, bad.clone());

    engine.update_task_board("Home", board.clone()).unwrap();
    engine.settle().await;

    assert_eq!(engine.sync_status(), SyncStatus::Error);
    assert_eq!(engine.board("Home").unwrap(), board);
    assert!(remote.task(&good.id).is_some());
    assert!(remote.task(&bad.id).is_none());

    // The next edit carries the earlier failure along.
    remote.heal_task(&bad.id);
    let extra = engine.add_task("Home", TaskDraft::named("extra")).unwrap();
    engine.settle().await;

    assert_eq!(engine.sync_status(), SyncStatus::Success);
    assert!(remote.task(&bad.id).is_some());
    assert!(remote.task(&extra).is_some());
    assert_eq!(remote.tasks_of(&project).len(), 3);
    assert_eq!(remote.call_count(RemoteOp::CreateTask), 4);
}
