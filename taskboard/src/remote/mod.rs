//! Remote store abstraction.
//!
//! Defines the [`RemoteStore`] capability the sync engine reconciles
//! against: owner-scoped CRUD over the `projects` and `tasks` tables.
//! Implementations:
//! - [`memory::MemoryRemote`]: in-process relational store with call
//!   counters and failure injection, used by tests and demos
//! - [`disconnected::Disconnected`]: every call fails; used when no
//!   backend is configured

pub mod disconnected;
pub mod memory;

use std::fmt;
use std::future::Future;
use std::time::Duration;

use taskboard_model::project::{OwnerId, ProjectId};
use taskboard_model::remote::{ProjectFields, ProjectRow, TaskRow};
use taskboard_model::task::TaskId;

pub use disconnected::Disconnected;
pub use memory::MemoryRemote;

/// Errors that can occur during remote operations.
///
/// All of them are transient from the engine's point of view: the
/// operation degrades to a local-only effect.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    /// The backend could not be reached.
    #[error("network error: {0}")]
    Network(String),

    /// The session is not authorized for the requested rows.
    #[error("not authorized")]
    Unauthorized,

    /// The addressed row does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The backend refused the write (constraint violation, bad input).
    #[error("rejected: {0}")]
    Rejected(String),

    /// The call did not complete within the configured timeout.
    #[error("remote operation timed out")]
    Timeout,
}

/// The individual remote operations, used for call accounting and
/// failure reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteOp {
    /// `listProjects(ownerId)`.
    ListProjects,
    /// `createProject`.
    CreateProject,
    /// `updateProject`.
    UpdateProject,
    /// `deleteProject`.
    DeleteProject,
    /// `listTasks(projectId, ownerId)`.
    ListTasks,
    /// `createTask`.
    CreateTask,
    /// `updateTask`.
    UpdateTask,
    /// `deleteTask`.
    DeleteTask,
}

impl fmt::Display for RemoteOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ListProjects => "list_projects",
            Self::CreateProject => "create_project",
            Self::UpdateProject => "update_project",
            Self::DeleteProject => "delete_project",
            Self::ListTasks => "list_tasks",
            Self::CreateTask => "create_task",
            Self::UpdateTask => "update_task",
            Self::DeleteTask => "delete_task",
        };
        f.write_str(name)
    }
}

/// Async, owner-scoped CRUD over remote projects and tasks.
///
/// Every method may fail with a transient [`RemoteError`]. Deleting a
/// project must cascade to its tasks.
pub trait RemoteStore: Send + Sync {
    /// List all projects owned by `owner`.
    fn list_projects(
        &self,
        owner: &OwnerId,
    ) -> impl Future<Output = Result<Vec<ProjectRow>, RemoteError>> + Send;

    /// Create a project and return the stored row with its assigned id.
    fn create_project(
        &self,
        owner: &OwnerId,
        fields: &ProjectFields,
    ) -> impl Future<Output = Result<ProjectRow, RemoteError>> + Send;

    /// Update a project's name and color.
    fn update_project(
        &self,
        owner: &OwnerId,
        id: &ProjectId,
        fields: &ProjectFields,
    ) -> impl Future<Output = Result<ProjectRow, RemoteError>> + Send;

    /// Delete a project and, with it, all its tasks.
    fn delete_project(
        &self,
        owner: &OwnerId,
        id: &ProjectId,
    ) -> impl Future<Output = Result<(), RemoteError>> + Send;

    /// List the tasks of one project.
    fn list_tasks(
        &self,
        project: &ProjectId,
        owner: &OwnerId,
    ) -> impl Future<Output = Result<Vec<TaskRow>, RemoteError>> + Send;

    /// Insert a task row. The client-generated id is kept.
    fn create_task(&self, row: &TaskRow)
    -> impl Future<Output = Result<TaskRow, RemoteError>> + Send;

    /// Overwrite the mutable columns of an existing task row.
    fn update_task(&self, row: &TaskRow)
    -> impl Future<Output = Result<TaskRow, RemoteError>> + Send;

    /// Delete a task row.
    fn delete_task(
        &self,
        owner: &OwnerId,
        id: &TaskId,
    ) -> impl Future<Output = Result<(), RemoteError>> + Send;
}

/// Bound a remote call by `limit`, mapping expiry to [`RemoteError::Timeout`].
///
/// # Errors
///
/// Returns the call's own error, or [`RemoteError::Timeout`] on expiry.
pub async fn with_timeout<T>(
    limit: Duration,
    call: impl Future<Output = Result<T, RemoteError>>,
) -> Result<T, RemoteError> {
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(RemoteError::Timeout),
    }
}
