//! Integration tests for the sync engine against an in-memory remote.
//!
//! Covers load idempotency and fallback, project lifecycle with remote
//! mirroring, optimistic board updates, drag debouncing, superseding
//! reconciliation, and session liveness.

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::similar_names)]

use std::time::Duration;

use chrono::Utc;

use taskboard::colors::{ColorManager, Palette};
use taskboard::config::SyncConfig;
use taskboard::remote::{MemoryRemote, RemoteOp};
use taskboard::store::{LocalStore, MemoryBackend};
use taskboard::sync::{EngineEvent, LoadOutcome, MoveOutcome, ProjectNameError, SyncEngine};
use taskboard_model::board::TaskBoard;
use taskboard_model::project::{OwnerId, ProjectId};
use taskboard_model::remote::{ProjectRow, TaskRow};
use taskboard_model::status::SyncStatus;
use taskboard_model::task::{Column, Task, TaskDraft};

type Engine = SyncEngine<MemoryRemote, MemoryBackend>;

// ---------------------------------------------------------------------------
// Helper functions
// ---------------------------------------------------------------------------

fn owner() -> OwnerId {
    OwnerId::new("user-1")
}

/// Builds an engine over shared remote and backend handles.
fn build(remote: &MemoryRemote, backend: &MemoryBackend) -> Engine {
    SyncEngine::with_colors(
        remote.clone(),
        LocalStore::open(backend.clone()),
        SyncConfig::default(),
        ColorManager::seeded(Palette::default(), 42),
    )
}

/// Builds an engine and loads it online for [`owner`].
async fn online_engine(remote: &MemoryRemote) -> Engine {
    let engine = build(remote, &MemoryBackend::new());
    assert_eq!(engine.load(Some(owner()), true).await, LoadOutcome::Remote);
    engine
}

/// Seeds a remote project holding one pending task per name.
fn seed_project(remote: &MemoryRemote, name: &str, color: &str, tasks: &[&str]) -> ProjectRow {
    let row = remote.seed_project(&owner(), name, color);
    for (i, title) in tasks.iter().enumerate() {
        let task = Task::from_draft(TaskDraft::named(*title), i64::try_from(i).unwrap());
        remote.seed_task(TaskRow::from_task(
            &task,
            Column::Pending,
            &row.id,
            &owner(),
            Utc::now(),
        ));
    }
    row
}

fn project_id(engine: &Engine, name: &str) -> ProjectId {
    engine
        .projects()
        .into_iter()
        .find(|p| p.name == name)
        .map(|p| p.id)
        .unwrap()
}

// ===========================================================================
// Loading
// ===========================================================================

#[tokio::test]
async fn load_is_idempotent_per_owner() {
    let remote = MemoryRemote::new();
    seed_project(&remote, "Home", "#ef4444", &["dishes"]);
    let engine = build(&remote, &MemoryBackend::new());

    assert_eq!(engine.load(Some(owner()), true).await, LoadOutcome::Remote);
    assert_eq!(engine.load(Some(owner()), true).await, LoadOutcome::Skipped);

    assert_eq!(remote.call_count(RemoteOp::ListProjects), 1);
    assert_eq!(remote.call_count(RemoteOp::ListTasks), 1);
}

#[tokio::test]
async fn owner_change_triggers_reload() {
    let remote = MemoryRemote::new();
    let engine = build(&remote, &MemoryBackend::new());

    engine.load(Some(owner()), true).await;
    assert_eq!(
        engine.load(Some(OwnerId::new("user-2")), true).await,
        LoadOutcome::Remote
    );
    assert_eq!(remote.call_count(RemoteOp::ListProjects), 2);
    assert_eq!(engine.owner(), Some(OwnerId::new("user-2")));
}

#[tokio::test]
async fn remote_load_mirrors_into_local_store() {
    let remote = MemoryRemote::new();
    let row = seed_project(&remote, "Home", "#ef4444", &["dishes", "laundry"]);
    let backend = MemoryBackend::new();
    {
        let stale = LocalStore::open(backend.clone());
        stale.set_projects(vec!["Stale".to_string()]);
    }

    let engine = build(&remote, &backend);
    engine.load(Some(owner()), true).await;

    assert_eq!(engine.project_names(), vec!["Home"]);
    assert_eq!(engine.projects()[0].id, row.id);
    assert_eq!(engine.color_for("Home").as_str(), "#ef4444");
    assert_eq!(engine.board("Home").unwrap().pending.len(), 2);
    assert_eq!(engine.sync_status(), SyncStatus::Success);

    let local = engine.local().snapshot();
    assert_eq!(local.projects, vec!["Home".to_string()]);
    assert_eq!(local.project_tasks["Home"].pending.len(), 2);
    assert_eq!(local.active_project.as_deref(), Some("Home"));
}

#[tokio::test]
async fn failed_load_falls_back_without_arming_guard() {
    let remote = MemoryRemote::new();
    seed_project(&remote, "Home", "#ef4444", &[]);
    let backend = MemoryBackend::new();
    LocalStore::open(backend.clone()).set_projects(vec!["Cached".to_string()]);

    let engine = build(&remote, &backend);
    remote.set_offline(true);
    assert_eq!(engine.load(Some(owner()), true).await, LoadOutcome::Fallback);
    assert_eq!(engine.sync_status(), SyncStatus::Error);
    assert_eq!(engine.project_names(), vec!["Cached"]);

    remote.set_offline(false);
    assert_eq!(engine.load(Some(owner()), true).await, LoadOutcome::Remote);
    assert_eq!(engine.project_names(), vec!["Home"]);
    assert_eq!(engine.sync_status(), SyncStatus::Success);
}

#[tokio::test]
async fn offline_load_uses_local_store_only() {
    let remote = MemoryRemote::new();
    let engine = build(&remote, &MemoryBackend::new());

    assert_eq!(engine.load(Some(owner()), false).await, LoadOutcome::Local);
    assert_eq!(engine.sync_status(), SyncStatus::Offline);
    assert_eq!(remote.total_calls(), 0);
}

#[tokio::test]
async fn sync_data_reloads_remote_wins() {
    let remote = MemoryRemote::new();
    seed_project(&remote, "Home", "#ef4444", &["dishes"]);
    let engine = online_engine(&remote).await;

    engine.set_online(false);
    engine
        .add_task("Home", TaskDraft::named("offline edit"))
        .unwrap();
    assert_eq!(engine.board("Home").unwrap().len(), 2);

    engine.set_online(true);
    assert_eq!(engine.sync_data().await, LoadOutcome::Remote);
    assert_eq!(engine.board("Home").unwrap().len(), 1);
    assert_eq!(remote.call_count(RemoteOp::ListProjects), 2);
}

// ===========================================================================
// Projects
// ===========================================================================

#[tokio::test]
async fn add_project_adopts_remote_id() {
    let remote = MemoryRemote::new();
    let engine = online_engine(&remote).await;

    engine.add_project("Work").await.unwrap();

    let rows = remote.projects_of(&owner());
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].name, "Work");
    assert_eq!(rows[0].color, engine.color_for("Work"));
    let project = &engine.projects()[0];
    assert_eq!(project.id, rows[0].id);
    assert!(!project.is_local());
    assert_eq!(engine.sync_status(), SyncStatus::Success);
}

#[tokio::test]
async fn bootstrap_project_welcome_task_reaches_remote() {
    let remote = MemoryRemote::new();
    let engine = online_engine(&remote).await;

    engine.add_project("My Tasks").await.unwrap();
    engine.settle().await;

    let id = project_id(&engine, "My Tasks");
    assert_eq!(remote.tasks_of(&id).len(), 1);
}

#[tokio::test]
async fn add_project_survives_remote_failure() {
    let remote = MemoryRemote::new();
    let engine = online_engine(&remote).await;

    remote.fail_next(1);
    engine.add_project("Work").await.unwrap();

    assert_eq!(engine.project_names(), vec!["Work"]);
    assert!(engine.projects()[0].is_local());
    assert_eq!(engine.local().projects(), vec!["Work".to_string()]);
    assert_eq!(engine.sync_status(), SyncStatus::Error);
}

#[tokio::test]
async fn duplicate_project_name_is_rejected() {
    let remote = MemoryRemote::new();
    let engine = online_engine(&remote).await;

    engine.add_project("X").await.unwrap();
    let status = engine.sync_status();
    assert_eq!(
        engine.add_project("X").await,
        Err(ProjectNameError::Duplicate("X".to_string()))
    );

    assert_eq!(engine.project_names().len(), 1);
    assert_eq!(remote.call_count(RemoteOp::CreateProject), 1);
    assert_eq!(engine.sync_status(), status);
}

#[tokio::test]
async fn rename_preserves_tasks_and_color() {
    let remote = MemoryRemote::new();
    let row = seed_project(&remote, "A", "#3b82f6", &["t1", "t2", "t3"]);
    let engine = online_engine(&remote).await;
    let ids: Vec<_> = engine
        .board("A")
        .unwrap()
        .iter()
        .map(|(_, t)| t.id.clone())
        .collect();

    engine.rename_project("A", "B").await.unwrap();

    let board = engine.board("B").unwrap();
    let renamed: Vec<_> = board.iter().map(|(_, t)| t.id.clone()).collect();
    assert_eq!(renamed, ids);
    assert_eq!(engine.color_for("B").as_str(), "#3b82f6");

    assert!(engine.board("A").is_none());
    assert!(!engine.project_colors().contains_key("A"));
    assert!(engine.local().board("A").is_none());
    assert!(!engine.local().project_colors().contains_key("A"));

    // Remote identity is stable; only the name changes.
    assert_eq!(project_id(&engine, "B"), row.id);
    assert_eq!(remote.projects_of(&owner())[0].name, "B");
}

#[tokio::test]
async fn delete_cascades_and_moves_selection() {
    let remote = MemoryRemote::new();
    let a = seed_project(&remote, "A", "#ef4444", &["t1", "t2"]);
    seed_project(&remote, "B", "#22c55e", &[]);
    let engine = online_engine(&remote).await;
    engine.set_active_project(Some("A")).unwrap();

    engine.delete_project("A").await.unwrap();

    assert_eq!(engine.project_names(), vec!["B"]);
    assert!(engine.board("A").is_none());
    assert!(!engine.project_colors().contains_key("A"));
    assert_eq!(engine.active_project().as_deref(), Some("B"));

    let local = engine.local().snapshot();
    assert!(!local.project_tasks.contains_key("A"));
    assert!(!local.project_colors.contains_key("A"));
    assert_eq!(local.active_project.as_deref(), Some("B"));

    assert!(remote.tasks_of(&a.id).is_empty());
    assert_eq!(remote.projects_of(&owner()).len(), 1);
}

#[tokio::test]
async fn delete_succeeds_locally_when_remote_fails() {
    let remote = MemoryRemote::new();
    seed_project(&remote, "A", "#ef4444", &[]);
    let engine = online_engine(&remote).await;

    remote.set_offline(true);
    engine.delete_project("A").await.unwrap();

    assert!(engine.project_names().is_empty());
    assert_eq!(engine.active_project(), None);
    assert_eq!(engine.sync_status(), SyncStatus::Error);
}

#[tokio::test]
async fn colors_stay_stable_across_unrelated_mutations() {
    let remote = MemoryRemote::new();
    let engine = online_engine(&remote).await;
    engine.add_project("A").await.unwrap();
    let color_a = engine.color_for("A");

    engine.add_project("C").await.unwrap();
    engine.add_project("D").await.unwrap();
    engine.rename_project("D", "E").await.unwrap();
    engine.delete_project("C").await.unwrap();
    engine.sync_data().await;

    assert_eq!(engine.color_for("A"), color_a);
}

#[tokio::test(start_paused = true)]
async fn rename_during_remote_create_renames_remote_row() {
    let remote = MemoryRemote::new();
    let engine = online_engine(&remote).await;
    remote.set_latency(Some(Duration::from_millis(100)));

    let (created, task) = tokio::join!(engine.add_project("A"), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        engine.rename_project("A", "B").await.unwrap();
        engine.add_task("B", TaskDraft::named("important")).unwrap()
    });
    created.unwrap();
    engine.settle().await;

    let rows = remote.projects_of(&owner());
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].name, "B");
    assert_eq!(project_id(&engine, "B"), rows[0].id);
    assert!(remote.task(&task).is_some());

    assert_eq!(engine.sync_data().await, LoadOutcome::Remote);
    assert_eq!(engine.project_names(), vec!["B"]);
    assert_eq!(engine.board("B").unwrap().pending[0].id, task);
}

#[tokio::test(start_paused = true)]
async fn delete_during_remote_create_removes_remote_row() {
    let remote = MemoryRemote::new();
    let engine = online_engine(&remote).await;
    remote.set_latency(Some(Duration::from_millis(100)));

    let (created, deleted) = tokio::join!(engine.add_project("Gone"), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        engine.delete_project("Gone").await
    });
    created.unwrap();
    deleted.unwrap();
    engine.settle().await;

    assert!(remote.projects_of(&owner()).is_empty());
    assert_eq!(remote.call_count(RemoteOp::DeleteProject), 1);
    assert_eq!(engine.sync_data().await, LoadOutcome::Remote);
    assert!(engine.project_names().is_empty());
}

#[tokio::test(start_paused = true)]
async fn delete_waits_for_in_flight_reconciliation() {
    let remote = MemoryRemote::new();
    let row = seed_project(&remote, "Home", "#ef4444", &[]);
    let engine = online_engine(&remote).await;
    remote.set_latency(Some(Duration::from_millis(100)));

    engine.add_task("Home", TaskDraft::named("late")).unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    // The task create is still in flight; the delete itself would be instant.
    remote.set_latency(None);
    engine.delete_project("Home").await.unwrap();
    engine.settle().await;

    assert_eq!(remote.call_count(RemoteOp::CreateTask), 1);
    assert_eq!(remote.call_count(RemoteOp::DeleteProject), 1);
    assert!(remote.projects_of(&owner()).is_empty());
    assert!(remote.tasks_of(&row.id).is_empty());
    // The create landed while the project still existed.
    assert_eq!(engine.sync_status(), SyncStatus::Success);
}

// ===========================================================================
// Boards
// ===========================================================================

#[tokio::test(start_paused = true)]
async fn board_update_is_visible_before_remote_round_trip() {
    let remote = MemoryRemote::new();
    seed_project(&remote, "Home", "#ef4444", &[]);
    let engine = online_engine(&remote).await;
    let id = project_id(&engine, "Home");
    remote.set_latency(Some(Duration::from_secs(1)));

    let mut board = TaskBoard::new();
    board.push(Column::InProgress, Task::from_draft(TaskDraft::named("new"), 0));
    engine.update_task_board("Home", board.clone()).unwrap();

    assert_eq!(engine.board("Home").unwrap(), board);
    assert_eq!(engine.local().board("Home").unwrap(), board);
    assert!(remote.tasks_of(&id).is_empty());

    engine.settle().await;
    let rows = remote.tasks_of(&id);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status, Column::InProgress);
}

#[tokio::test]
async fn add_task_creates_remote_row() {
    let remote = MemoryRemote::new();
    seed_project(&remote, "Home", "#ef4444", &[]);
    let engine = online_engine(&remote).await;

    let task = engine.add_task("Home", TaskDraft::default()).unwrap();
    engine.settle().await;

    let row = remote.task(&task).unwrap();
    assert_eq!(row.name, "New task");
    assert_eq!(row.status, Column::Pending);
    assert_eq!(engine.sync_status(), SyncStatus::Success);
}

#[tokio::test]
async fn move_is_exclusive_and_reaches_remote() {
    let remote = MemoryRemote::new();
    seed_project(&remote, "Home", "#ef4444", &["a", "b", "c"]);
    let engine = online_engine(&remote).await;
    let t1 = engine.board("Home").unwrap().pending[0].id.clone();

    let outcome = engine
        .move_task("Home", &t1, Column::Completed, None)
        .unwrap();
    assert_eq!(outcome, MoveOutcome::Applied);

    let board = engine.board("Home").unwrap();
    assert!(board.pending.iter().all(|t| t.id != t1));
    assert_eq!(board.completed.iter().filter(|t| t.id == t1).count(), 1);
    assert_eq!(board.len(), 3);

    engine.settle().await;
    assert_eq!(remote.task(&t1).unwrap().status, Column::Completed);
}

#[tokio::test(start_paused = true)]
async fn second_drag_inside_cooldown_is_dropped() {
    let remote = MemoryRemote::new();
    seed_project(&remote, "Home", "#ef4444", &["a", "b"]);
    let engine = online_engine(&remote).await;
    let board = engine.board("Home").unwrap();
    let (a, b) = (board.pending[0].id.clone(), board.pending[1].id.clone());

    assert_eq!(
        engine.move_task("Home", &a, Column::InProgress, None).unwrap(),
        MoveOutcome::Applied
    );
    assert_eq!(
        engine.move_task("Home", &b, Column::InProgress, None).unwrap(),
        MoveOutcome::Debounced
    );
    assert_eq!(
        engine.reorder_task("Home", Column::InProgress, 0, 0).unwrap(),
        MoveOutcome::Debounced
    );
    assert_eq!(engine.board("Home").unwrap().in_progress.len(), 1);

    tokio::time::advance(Duration::from_millis(300)).await;
    assert_eq!(
        engine.move_task("Home", &b, Column::InProgress, Some(0)).unwrap(),
        MoveOutcome::Applied
    );
    let names: Vec<_> = engine
        .board("Home")
        .unwrap()
        .in_progress
        .iter()
        .map(|t| t.name.clone())
        .collect();
    assert_eq!(names, ["b", "a"]);
}

#[tokio::test(start_paused = true)]
async fn updates_during_reconciliation_supersede_queued_board() {
    let remote = MemoryRemote::new();
    seed_project(&remote, "Home", "#ef4444", &[]);
    let engine = online_engine(&remote).await;
    let id = project_id(&engine, "Home");
    remote.set_latency(Some(Duration::from_millis(100)));

    engine.add_task("Home", TaskDraft::named("t1")).unwrap();
    // Let the first run start its remote calls.
    tokio::time::sleep(Duration::from_millis(10)).await;
    engine.add_task("Home", TaskDraft::named("t2")).unwrap();
    engine.add_task("Home", TaskDraft::named("t3")).unwrap();

    engine.settle().await;

    // One create per task: the queued board was diffed against what the
    // first run confirmed, and the intermediate board never ran.
    assert_eq!(remote.call_count(RemoteOp::CreateTask), 3);
    let names: Vec<_> = remote.tasks_of(&id).into_iter().map(|r| r.name).collect();
    assert_eq!(names, ["t1", "t2", "t3"]);
    assert_eq!(engine.sync_status(), SyncStatus::Success);
}

#[tokio::test]
async fn offline_mutations_make_no_remote_calls() {
    let remote = MemoryRemote::new();
    seed_project(&remote, "Home", "#ef4444", &[]);
    let engine = online_engine(&remote).await;
    let before = remote.total_calls();

    engine.set_online(false);
    engine.add_task("Home", TaskDraft::named("later")).unwrap();
    engine.add_project("Offline").await.unwrap();
    engine.settle().await;

    assert_eq!(remote.total_calls(), before);
    assert_eq!(engine.sync_status(), SyncStatus::Offline);
}

#[tokio::test]
async fn board_update_renumbers_positions_to_list_order() {
    let remote = MemoryRemote::new();
    seed_project(&remote, "Home", "#ef4444", &["a", "b", "c"]);
    let engine = online_engine(&remote).await;
    let completed = |board: &TaskBoard| -> Vec<String> {
        board.completed.iter().map(|t| t.name.clone()).collect()
    };

    // Hand-built: "c" then "a" appended to completed, positions left as 2, 0.
    let mut board = engine.board("Home").unwrap();
    let c = board.pending.remove(2);
    let a = board.pending.remove(0);
    board.completed.push(c);
    board.completed.push(a);
    engine.update_task_board("Home", board).unwrap();

    let stored = engine.board("Home").unwrap();
    assert!(stored.is_consistent());
    assert_eq!(completed(&stored), ["c", "a"]);
    assert_eq!(engine.local().board("Home").unwrap(), stored);

    engine.settle().await;
    assert_eq!(engine.sync_data().await, LoadOutcome::Remote);
    assert_eq!(completed(&engine.board("Home").unwrap()), ["c", "a"]);
}

// ===========================================================================
// Liveness and events
// ===========================================================================

#[tokio::test(start_paused = true)]
async fn shutdown_discards_late_load_results() {
    let remote = MemoryRemote::new();
    seed_project(&remote, "Home", "#ef4444", &[]);
    remote.set_latency(Some(Duration::from_secs(1)));
    let engine = build(&remote, &MemoryBackend::new());

    let (outcome, ()) = tokio::join!(engine.load(Some(owner()), true), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        engine.shutdown();
    });

    assert_eq!(outcome, LoadOutcome::Superseded);
    assert!(engine.project_names().is_empty());
    assert!(engine.local().projects().is_empty());
}

#[tokio::test(start_paused = true)]
async fn shutdown_discards_late_reconciliation() {
    let remote = MemoryRemote::new();
    seed_project(&remote, "Home", "#ef4444", &[]);
    let engine = online_engine(&remote).await;
    remote.set_latency(Some(Duration::from_secs(1)));

    engine.add_task("Home", TaskDraft::named("t1")).unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    engine.shutdown();
    engine.settle().await;

    // The remote call went through but its result was never applied.
    assert_eq!(remote.call_count(RemoteOp::CreateTask), 1);
    assert_eq!(engine.sync_status(), SyncStatus::Syncing);
}

#[tokio::test]
async fn subscribers_see_status_transitions() {
    let remote = MemoryRemote::new();
    let engine = online_engine(&remote).await;
    let mut events = engine.subscribe();

    engine.add_project("Work").await.unwrap();

    let mut statuses = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let EngineEvent::SyncStatusChanged(status) = event {
            statuses.push(status);
        }
    }
    assert_eq!(statuses, [SyncStatus::Syncing, SyncStatus::Success]);
}
