//! In-process remote store for testing and demos.
//!
//! [`MemoryRemote`] behaves like the relational backend: rows are scoped by
//! owner, project names are unique per owner, and deleting a project
//! cascades to its tasks. Clones share state, so a test can keep a handle
//! for inspection while the engine owns another.
//!
//! Failures can be injected per call ([`MemoryRemote::fail_next`]), per task
//! ([`MemoryRemote::fail_task`]), or wholesale ([`MemoryRemote::set_offline`]),
//! and an artificial latency can be added to every call.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use uuid::Uuid;

use taskboard_model::project::{ColorToken, OwnerId, ProjectId};
use taskboard_model::remote::{ProjectFields, ProjectRow, TaskRow};
use taskboard_model::task::TaskId;

use super::{RemoteError, RemoteOp, RemoteStore};

#[derive(Default)]
struct Faults {
    offline: bool,
    fail_next: usize,
    failing_tasks: HashSet<TaskId>,
}

#[derive(Default)]
struct Tables {
    projects: BTreeMap<ProjectId, ProjectRow>,
    tasks: BTreeMap<TaskId, TaskRow>,
}

#[derive(Default)]
struct Inner {
    tables: Mutex<Tables>,
    faults: Mutex<Faults>,
    calls: Mutex<HashMap<RemoteOp, usize>>,
    latency: Mutex<Option<Duration>>,
}

/// Shared in-memory implementation of [`RemoteStore`].
#[derive(Clone, Default)]
pub struct MemoryRemote {
    inner: Arc<Inner>,
}

impl MemoryRemote {
    /// Create a new, empty remote.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every call with [`RemoteError::Network`] while `offline` is set.
    pub fn set_offline(&self, offline: bool) {
        self.inner.faults.lock().offline = offline;
    }

    /// Fail the next `n` calls, whatever they are.
    pub fn fail_next(&self, n: usize) {
        self.inner.faults.lock().fail_next = n;
    }

    /// Fail every task call addressing `id`.
    pub fn fail_task(&self, id: &TaskId) {
        self.inner.faults.lock().failing_tasks.insert(id.clone());
    }

    /// Stop failing calls addressing `id`.
    pub fn heal_task(&self, id: &TaskId) {
        self.inner.faults.lock().failing_tasks.remove(id);
    }

    /// Delay every call by `latency`.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.inner.latency.lock() = latency;
    }

    /// Number of calls made of kind `op`, successful or not.
    #[must_use]
    pub fn call_count(&self, op: RemoteOp) -> usize {
        self.inner.calls.lock().get(&op).copied().unwrap_or(0)
    }

    /// Total number of calls of every kind.
    #[must_use]
    pub fn total_calls(&self) -> usize {
        self.inner.calls.lock().values().sum()
    }

    /// Insert a project directly, bypassing faults and accounting.
    pub fn seed_project(&self, owner: &OwnerId, name: &str, color: &str) -> ProjectRow {
        let now = Utc::now();
        let row = ProjectRow {
            id: ProjectId::new(format!("prj-{}", Uuid::now_v7())),
            owner_id: owner.clone(),
            name: name.to_string(),
            color: ColorToken::new(color),
            created_at: now,
            updated_at: now,
        };
        self.inner
            .tables
            .lock()
            .projects
            .insert(row.id.clone(), row.clone());
        row
    }

    /// Insert a task row directly, bypassing faults and accounting.
    pub fn seed_task(&self, row: TaskRow) {
        self.inner.tables.lock().tasks.insert(row.id.clone(), row);
    }

    /// Projects currently stored for `owner`, oldest first.
    #[must_use]
    pub fn projects_of(&self, owner: &OwnerId) -> Vec<ProjectRow> {
        let tables = self.inner.tables.lock();
        let mut rows: Vec<_> = tables
            .projects
            .values()
            .filter(|p| &p.owner_id == owner)
            .cloned()
            .collect();
        rows.sort_by_key(|p| p.created_at);
        rows
    }

    /// Task rows currently stored for `project`, ordered by position.
    #[must_use]
    pub fn tasks_of(&self, project: &ProjectId) -> Vec<TaskRow> {
        let tables = self.inner.tables.lock();
        let mut rows: Vec<_> = tables
            .tasks
            .values()
            .filter(|t| &t.project_id == project)
            .cloned()
            .collect();
        rows.sort_by_key(|t| (t.status, t.position));
        rows
    }

    /// Look up one task row.
    #[must_use]
    pub fn task(&self, id: &TaskId) -> Option<TaskRow> {
        self.inner.tables.lock().tasks.get(id).cloned()
    }

    /// Account for a call, apply latency, then decide whether it fails.
    async fn begin(&self, op: RemoteOp, task: Option<&TaskId>) -> Result<(), RemoteError> {
        *self.inner.calls.lock().entry(op).or_insert(0) += 1;

        let latency = *self.inner.latency.lock();
        if let Some(delay) = latency {
            tokio::time::sleep(delay).await;
        }

        let mut faults = self.inner.faults.lock();
        if faults.offline {
            return Err(RemoteError::Network("remote offline".to_string()));
        }
        if faults.fail_next > 0 {
            faults.fail_next -= 1;
            return Err(RemoteError::Network(format!("injected failure in {op}")));
        }
        if task.is_some_and(|id| faults.failing_tasks.contains(id)) {
            return Err(RemoteError::Network(format!("injected failure in {op}")));
        }
        Ok(())
    }
}

fn owned_project<'a>(
    tables: &'a mut Tables,
    owner: &OwnerId,
    id: &ProjectId,
) -> Result<&'a mut ProjectRow, RemoteError> {
    let row = tables
        .projects
        .get_mut(id)
        .ok_or_else(|| RemoteError::NotFound(format!("project {id}")))?;
    if &row.owner_id != owner {
        return Err(RemoteError::Unauthorized);
    }
    Ok(row)
}

fn name_taken(tables: &Tables, owner: &OwnerId, name: &str, except: Option<&ProjectId>) -> bool {
    tables
        .projects
        .values()
        .any(|p| &p.owner_id == owner && p.name == name && Some(&p.id) != except)
}

impl RemoteStore for MemoryRemote {
    async fn list_projects(&self, owner: &OwnerId) -> Result<Vec<ProjectRow>, RemoteError> {
        self.begin(RemoteOp::ListProjects, None).await?;
        Ok(self.projects_of(owner))
    }

    async fn create_project(
        &self,
        owner: &OwnerId,
        fields: &ProjectFields,
    ) -> Result<ProjectRow, RemoteError> {
        self.begin(RemoteOp::CreateProject, None).await?;
        let mut tables = self.inner.tables.lock();
        if name_taken(&tables, owner, &fields.name, None) {
            return Err(RemoteError::Rejected(format!(
                "duplicate project name: {}",
                fields.name
            )));
        }
        let now = Utc::now();
        let row = ProjectRow {
            id: ProjectId::new(format!("prj-{}", Uuid::now_v7())),
            owner_id: owner.clone(),
            name: fields.name.clone(),
            color: fields.color.clone(),
            created_at: now,
            updated_at: now,
        };
        tables.projects.insert(row.id.clone(), row.clone());
        drop(tables);
        Ok(row)
    }

    async fn update_project(
        &self,
        owner: &OwnerId,
        id: &ProjectId,
        fields: &ProjectFields,
    ) -> Result<ProjectRow, RemoteError> {
        self.begin(RemoteOp::UpdateProject, None).await?;
        let mut tables = self.inner.tables.lock();
        if name_taken(&tables, owner, &fields.name, Some(id)) {
            return Err(RemoteError::Rejected(format!(
                "duplicate project name: {}",
                fields.name
            )));
        }
        let row = owned_project(&mut tables, owner, id)?;
        row.name.clone_from(&fields.name);
        row.color = fields.color.clone();
        row.updated_at = Utc::now();
        Ok(row.clone())
    }

    async fn delete_project(&self, owner: &OwnerId, id: &ProjectId) -> Result<(), RemoteError> {
        self.begin(RemoteOp::DeleteProject, None).await?;
        let mut tables = self.inner.tables.lock();
        owned_project(&mut tables, owner, id)?;
        tables.projects.remove(id);
        tables.tasks.retain(|_, t| &t.project_id != id);
        Ok(())
    }

    async fn list_tasks(
        &self,
        project: &ProjectId,
        owner: &OwnerId,
    ) -> Result<Vec<TaskRow>, RemoteError> {
        self.begin(RemoteOp::ListTasks, None).await?;
        {
            let mut tables = self.inner.tables.lock();
            owned_project(&mut tables, owner, project)?;
        }
        Ok(self.tasks_of(project))
    }

    async fn create_task(&self, row: &TaskRow) -> Result<TaskRow, RemoteError> {
        self.begin(RemoteOp::CreateTask, Some(&row.id)).await?;
        let mut tables = self.inner.tables.lock();
        owned_project(&mut tables, &row.owner_id, &row.project_id)?;
        if tables.tasks.contains_key(&row.id) {
            return Err(RemoteError::Rejected(format!("duplicate task id: {}", row.id)));
        }
        tables.tasks.insert(row.id.clone(), row.clone());
        drop(tables);
        Ok(row.clone())
    }

    async fn update_task(&self, row: &TaskRow) -> Result<TaskRow, RemoteError> {
        self.begin(RemoteOp::UpdateTask, Some(&row.id)).await?;
        let mut tables = self.inner.tables.lock();
        let stored = tables
            .tasks
            .get_mut(&row.id)
            .ok_or_else(|| RemoteError::NotFound(format!("task {}", row.id)))?;
        if stored.owner_id != row.owner_id {
            return Err(RemoteError::Unauthorized);
        }
        let created_at = stored.created_at;
        *stored = TaskRow {
            created_at,
            ..row.clone()
        };
        Ok(stored.clone())
    }

    async fn delete_task(&self, owner: &OwnerId, id: &TaskId) -> Result<(), RemoteError> {
        self.begin(RemoteOp::DeleteTask, Some(id)).await?;
        let mut tables = self.inner.tables.lock();
        let stored = tables
            .tasks
            .get(id)
            .ok_or_else(|| RemoteError::NotFound(format!("task {id}")))?;
        if &stored.owner_id != owner {
            return Err(RemoteError::Unauthorized);
        }
        tables.tasks.remove(id);
        Ok(())
    }
}
