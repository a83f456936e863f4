//! Diff-based reconciliation of one project's board against the remote.
//!
//! The plan is computed once from two consistent snapshots: the board last
//! confirmed by the remote and the board the user now sees. Tasks are matched
//! by id. Last writer wins per field; nothing is merged.
//!
//! Execution fires every create, update and delete concurrently. A failed
//! operation is recorded in the [`ReconciliationResult`] and never undoes
//! the local board.

use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use futures_util::future::join_all;

use taskboard_model::board::TaskBoard;
use taskboard_model::project::{OwnerId, ProjectId};
use taskboard_model::remote::TaskRow;
use taskboard_model::task::{Column, Task, TaskId};

use crate::remote::{RemoteError, RemoteOp, RemoteStore, with_timeout};

/// The remote operations needed to bring the remote board in line with
/// the local one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcilePlan {
    /// Tasks on the local board the remote has never seen.
    pub to_create: Vec<(Column, Task)>,
    /// Tasks on both boards whose fields or column differ.
    pub to_update: Vec<(Column, Task)>,
    /// Tasks the remote holds that are gone from the local board.
    pub to_delete: Vec<TaskId>,
}

impl ReconcilePlan {
    /// Diff `local` against the last confirmed `remote` snapshot.
    ///
    /// A task present on both sides with identical content in the same
    /// column produces no operation.
    #[must_use]
    pub fn between(remote: &TaskBoard, local: &TaskBoard) -> Self {
        let confirmed: HashMap<&TaskId, (Column, &Task)> =
            remote.iter().map(|(c, t)| (&t.id, (c, t))).collect();

        let mut plan = Self::default();
        for (column, task) in local.iter() {
            match confirmed.get(&task.id) {
                None => plan.to_create.push((column, task.clone())),
                Some((was, before)) if *was != column || !before.same_content(task) => {
                    plan.to_update.push((column, task.clone()));
                }
                Some(_) => {}
            }
        }
        plan.to_delete = remote
            .iter()
            .filter(|(_, t)| local.locate(&t.id).is_none())
            .map(|(_, t)| t.id.clone())
            .collect();
        plan
    }

    /// Returns `true` if the boards already agree.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total number of remote operations in the plan.
    #[must_use]
    pub fn len(&self) -> usize {
        self.to_create.len() + self.to_update.len() + self.to_delete.len()
    }
}

/// One remote operation that did not go through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileFailure {
    /// The task the operation addressed.
    pub task_id: TaskId,
    /// Which operation failed.
    pub op: RemoteOp,
    /// Why it failed.
    pub error: RemoteError,
}

/// Outcome of executing a [`ReconcilePlan`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationResult {
    /// Tasks created remotely.
    pub created: Vec<TaskId>,
    /// Tasks updated remotely.
    pub updated: Vec<TaskId>,
    /// Tasks deleted remotely.
    pub deleted: Vec<TaskId>,
    /// Operations that failed. Their local effect stays in place.
    pub failures: Vec<ReconcileFailure>,
}

impl ReconciliationResult {
    /// Returns `true` if every planned operation succeeded.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Fold the operations that succeeded into the confirmed snapshot.
    ///
    /// Failed operations leave their task as the remote last knew it, so the
    /// next plan computed against `confirmed` retries them.
    pub fn apply_to(&self, plan: &ReconcilePlan, confirmed: &mut TaskBoard) {
        for (column, task) in plan.to_create.iter().chain(&plan.to_update) {
            if self.created.contains(&task.id) || self.updated.contains(&task.id) {
                confirmed.upsert(*column, task.clone());
            }
        }
        for id in &self.deleted {
            let _ = confirmed.remove(id);
        }
    }
}

/// Run every operation of `plan` against `remote` concurrently.
///
/// Each call is bounded by `timeout`. Never fails as a whole: individual
/// failures are collected in the result.
pub async fn execute<R: RemoteStore>(
    remote: &R,
    owner: &OwnerId,
    project: &ProjectId,
    plan: &ReconcilePlan,
    timeout: Duration,
) -> ReconciliationResult {
    let now = Utc::now();
    let creates: Vec<_> = plan
        .to_create
        .iter()
        .map(|(column, task)| {
            let row = TaskRow::from_task(task, *column, project, owner, now);
            create_one(remote, row, timeout)
        })
        .collect();
    let updates: Vec<_> = plan
        .to_update
        .iter()
        .map(|(column, task)| {
            let row = TaskRow::from_task(task, *column, project, owner, now);
            update_one(remote, row, timeout)
        })
        .collect();
    let deletes: Vec<_> = plan
        .to_delete
        .iter()
        .map(|id| delete_one(remote, owner, id, timeout))
        .collect();

    let (created, updated, deleted) =
        tokio::join!(join_all(creates), join_all(updates), join_all(deletes));

    let mut result = ReconciliationResult::default();
    for (op, outcomes) in [
        (RemoteOp::CreateTask, created),
        (RemoteOp::UpdateTask, updated),
        (RemoteOp::DeleteTask, deleted),
    ] {
        for (task_id, outcome) in outcomes {
            match outcome {
                Ok(()) => match op {
                    RemoteOp::CreateTask => result.created.push(task_id),
                    RemoteOp::UpdateTask => result.updated.push(task_id),
                    _ => result.deleted.push(task_id),
                },
                Err(error) => {
                    tracing::warn!(
                        project = %project,
                        task = %task_id,
                        %op,
                        error = %error,
                        "remote task operation failed; keeping local state"
                    );
                    result.failures.push(ReconcileFailure { task_id, op, error });
                }
            }
        }
    }
    result
}

async fn create_one<R: RemoteStore>(
    remote: &R,
    row: TaskRow,
    timeout: Duration,
) -> (TaskId, Result<(), RemoteError>) {
    let outcome = with_timeout(timeout, remote.create_task(&row)).await;
    (row.id, outcome.map(drop))
}

async fn update_one<R: RemoteStore>(
    remote: &R,
    row: TaskRow,
    timeout: Duration,
) -> (TaskId, Result<(), RemoteError>) {
    let outcome = with_timeout(timeout, remote.update_task(&row)).await;
    (row.id, outcome.map(drop))
}

async fn delete_one<R: RemoteStore>(
    remote: &R,
    owner: &OwnerId,
    id: &TaskId,
    timeout: Duration,
) -> (TaskId, Result<(), RemoteError>) {
    let outcome = with_timeout(timeout, remote.delete_task(owner, id)).await;
    (id.clone(), outcome)
}
