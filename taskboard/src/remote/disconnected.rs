//! A remote store with no backend behind it.

use taskboard_model::project::{OwnerId, ProjectId};
use taskboard_model::remote::{ProjectFields, ProjectRow, TaskRow};
use taskboard_model::task::TaskId;

use super::{RemoteError, RemoteStore};

const REASON: &str = "no remote backend configured";

/// Remote store whose every call fails with [`RemoteError::Network`].
///
/// Lets the engine run against the local store alone while still going
/// through its usual remote-failure path when an owner is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct Disconnected;

impl RemoteStore for Disconnected {
    async fn list_projects(&self, _owner: &OwnerId) -> Result<Vec<ProjectRow>, RemoteError> {
        Err(RemoteError::Network(REASON.to_string()))
    }

    async fn create_project(
        &self,
        _owner: &OwnerId,
        _fields: &ProjectFields,
    ) -> Result<ProjectRow, RemoteError> {
        Err(RemoteError::Network(REASON.to_string()))
    }

    async fn update_project(
        &self,
        _owner: &OwnerId,
        _id: &ProjectId,
        _fields: &ProjectFields,
    ) -> Result<ProjectRow, RemoteError> {
        Err(RemoteError::Network(REASON.to_string()))
    }

    async fn delete_project(&self, _owner: &OwnerId, _id: &ProjectId) -> Result<(), RemoteError> {
        Err(RemoteError::Network(REASON.to_string()))
    }

    async fn list_tasks(
        &self,
        _project: &ProjectId,
        _owner: &OwnerId,
    ) -> Result<Vec<TaskRow>, RemoteError> {
        Err(RemoteError::Network(REASON.to_string()))
    }

    async fn create_task(&self, _row: &TaskRow) -> Result<TaskRow, RemoteError> {
        Err(RemoteError::Network(REASON.to_string()))
    }

    async fn update_task(&self, _row: &TaskRow) -> Result<TaskRow, RemoteError> {
        Err(RemoteError::Network(REASON.to_string()))
    }

    async fn delete_task(&self, _owner: &OwnerId, _id: &TaskId) -> Result<(), RemoteError> {
        Err(RemoteError::Network(REASON.to_string()))
    }
}
