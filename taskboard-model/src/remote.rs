//! Row shapes of the remote relational backend.
//!
//! `projects(id, owner_id, name, color, created_at, updated_at)` and
//! `tasks(id, project_id, owner_id, name, description, status, priority,
//! due_date, due_datetime, position, created_at)`. The `status` column holds
//! a [`Column`] value.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::project::{ColorToken, OwnerId, Project, ProjectId};
use crate::task::{Column, Priority, Task, TaskId};

/// A row of the remote `projects` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectRow {
    /// Remote-assigned id.
    pub id: ProjectId,
    /// Owning user.
    pub owner_id: OwnerId,
    /// Display name.
    pub name: String,
    /// Display color.
    pub color: ColorToken,
    /// Insertion time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

impl ProjectRow {
    /// Converts the row into the client-side project record.
    #[must_use]
    pub fn to_project(&self) -> Project {
        Project {
            id: self.id.clone(),
            name: self.name.clone(),
            color: self.color.clone(),
        }
    }
}

/// Fields sent when creating or updating a remote project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectFields {
    /// Display name.
    pub name: String,
    /// Display color.
    pub color: ColorToken,
}

/// A row of the remote `tasks` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRow {
    /// Client-generated task id.
    pub id: TaskId,
    /// Owning project (remote id).
    pub project_id: ProjectId,
    /// Owning user.
    pub owner_id: OwnerId,
    /// Short title.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Board column.
    pub status: Column,
    /// Priority.
    pub priority: Priority,
    /// Optional due date.
    pub due_date: Option<NaiveDate>,
    /// Optional due date and time.
    pub due_datetime: Option<DateTime<Utc>>,
    /// Intra-column order key.
    pub position: i64,
    /// Insertion time.
    pub created_at: DateTime<Utc>,
}

impl TaskRow {
    /// Builds a row for `task` sitting in `column` of project `project_id`.
    #[must_use]
    pub fn from_task(
        task: &Task,
        column: Column,
        project_id: &ProjectId,
        owner_id: &OwnerId,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: task.id.clone(),
            project_id: project_id.clone(),
            owner_id: owner_id.clone(),
            name: task.name.clone(),
            description: task.description.clone(),
            status: column,
            priority: task.priority,
            due_date: task.due_date,
            due_datetime: task.due_date_time,
            position: task.position,
            created_at,
        }
    }

    /// Splits the row into its board column and task record.
    #[must_use]
    pub fn into_entry(self) -> (Column, Task) {
        (
            self.status,
            Task {
                id: self.id,
                name: self.name,
                description: self.description,
                due_date: self.due_date,
                due_date_time: self.due_datetime,
                priority: self.priority,
                position: self.position,
            },
        )
    }
}
