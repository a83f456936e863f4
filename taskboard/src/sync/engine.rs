//! [`SyncEngine`]: optimistic local mutations with background reconciliation.
//!
//! All state lives behind one mutex that is never held across an `.await`.
//! A mutation takes the lock, derives the next state from the current one,
//! writes it through to the Local Store, announces it, and releases the lock,
//! so readers never observe a half-applied change.
//!
//! Remote results are applied only if the engine is still alive and the
//! session they were issued for is still current. Each full load starts a
//! new session generation.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::future::try_join_all;
use parking_lot::Mutex;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;

use taskboard_model::board::{BoardError, TaskBoard};
use taskboard_model::project::{ColorToken, OwnerId, Project, ProjectId};
use taskboard_model::remote::{ProjectFields, ProjectRow, TaskRow};
use taskboard_model::status::SyncStatus;
use taskboard_model::task::{Column, Task, TaskDraft, TaskId};

use crate::colors::{ColorManager, Palette};
use crate::config::SyncConfig;
use crate::remote::{RemoteError, RemoteStore, with_timeout};
use crate::store::{LocalState, LocalStore, StorageBackend};

use super::guard::DragGuard;
use super::reconcile::{self, ReconcilePlan};
use super::{EngineEvent, LoadOutcome, MoveOutcome, ProjectNameError};

/// Identifies what a completed load covered.
#[derive(Debug, Clone, PartialEq, Eq)]
struct LoadKey {
    owner: Option<OwnerId>,
    remote: bool,
}

struct Session {
    owner: Option<OwnerId>,
    online: bool,
    generation: u64,
}

impl Session {
    /// The owner to reconcile for, if the session can reach the remote.
    fn remote_owner(&self) -> Option<OwnerId> {
        if self.online { self.owner.clone() } else { None }
    }
}

struct ReconcileSlot {
    generation: u64,
    queued: Option<TaskBoard>,
    // Resolves once the run holding this slot has finished its remote calls.
    done: oneshot::Receiver<()>,
}

/// What a finished remote create still owes the remote.
enum CreateFollowUp {
    Rename(ProjectId, ProjectFields),
    Delete(ProjectId),
}

struct EngineState {
    session: Session,
    projects: Vec<Project>,
    project_tasks: BTreeMap<String, TaskBoard>,
    active_project: Option<String>,
    status: SyncStatus,
    colors: ColorManager,
    drag: DragGuard,
    loaded: Option<LoadKey>,
    loading: Option<LoadKey>,
    // Boards as the remote last confirmed them, per remote project id.
    confirmed: HashMap<ProjectId, TaskBoard>,
    reconciling: HashMap<ProjectId, ReconcileSlot>,
    // Remote project creates in flight: token to current name, `None` once
    // the project was deleted locally.
    creating: HashMap<u64, Option<String>>,
    next_create: u64,
}

impl EngineState {
    fn names(&self) -> Vec<String> {
        self.projects.iter().map(|p| p.name.clone()).collect()
    }

    fn project(&self, name: &str) -> Option<&Project> {
        self.projects.iter().find(|p| p.name == name)
    }

    fn board_for_edit(&self, project: &str) -> Result<TaskBoard, BoardError> {
        if self.project(project).is_none() {
            return Err(BoardError::ProjectNotFound(project.to_string()));
        }
        Ok(self.project_tasks.get(project).cloned().unwrap_or_default())
    }

    /// Point a pending remote create at the project's new name, or at
    /// nothing once it is deleted.
    fn retarget_create(&mut self, from: &str, to: Option<&str>) {
        for target in self.creating.values_mut() {
            if target.as_deref() == Some(from) {
                *target = to.map(str::to_string);
            }
        }
    }

    fn check_new_name(&self, name: &str) -> Result<(), ProjectNameError> {
        if name.is_empty() {
            return Err(ProjectNameError::Empty);
        }
        if self.project(name).is_some() {
            return Err(ProjectNameError::Duplicate(name.to_string()));
        }
        Ok(())
    }
}

struct Inner<R, B: StorageBackend> {
    remote: R,
    local: LocalStore<B>,
    config: SyncConfig,
    state: Mutex<EngineState>,
    events: broadcast::Sender<EngineEvent>,
    alive: AtomicBool,
    inflight: Mutex<Vec<JoinHandle<()>>>,
}

/// The single source of truth for projects, boards and sync status.
///
/// Cheap to clone; clones share state. Operations that dispatch background
/// reconciliation must run inside a Tokio runtime.
pub struct SyncEngine<R, B: StorageBackend> {
    inner: Arc<Inner<R, B>>,
}

impl<R, B: StorageBackend> Clone for SyncEngine<R, B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R, B> SyncEngine<R, B>
where
    R: RemoteStore + 'static,
    B: StorageBackend + 'static,
{
    /// Create an engine drawing project colors from `palette`.
    ///
    /// Nothing is read until [`load`](Self::load) is called.
    pub fn new(remote: R, local: LocalStore<B>, config: SyncConfig, palette: Palette) -> Self {
        Self::with_colors(remote, local, config, ColorManager::new(palette))
    }

    /// Create an engine with a preconfigured color manager.
    pub fn with_colors(
        remote: R,
        local: LocalStore<B>,
        config: SyncConfig,
        colors: ColorManager,
    ) -> Self {
        let (events, _) = broadcast::channel(config.event_buffer.max(1));
        let state = EngineState {
            session: Session {
                owner: None,
                online: true,
                generation: 0,
            },
            projects: Vec::new(),
            project_tasks: BTreeMap::new(),
            active_project: None,
            status: SyncStatus::Idle,
            colors,
            drag: DragGuard::new(config.drag_cooldown),
            loaded: None,
            loading: None,
            confirmed: HashMap::new(),
            reconciling: HashMap::new(),
            creating: HashMap::new(),
            next_create: 0,
        };
        Self {
            inner: Arc::new(Inner {
                remote,
                local,
                config,
                state: Mutex::new(state),
                events,
                alive: AtomicBool::new(true),
                inflight: Mutex::new(Vec::new()),
            }),
        }
    }

    // -----------------------------------------------------------------------
    // Loading
    // -----------------------------------------------------------------------

    /// Populate the engine for `owner`.
    ///
    /// With an owner and `online`, the remote is authoritative and the Local
    /// Store is overwritten to mirror it. Otherwise (or if the remote fails)
    /// the Local Store is used. Repeating a load for the same owner and mode
    /// after it succeeded is a no-op.
    pub async fn load(&self, owner: Option<OwnerId>, online: bool) -> LoadOutcome {
        let key = LoadKey {
            remote: online && owner.is_some(),
            owner,
        };
        let generation = {
            let mut guard = self.inner.state.lock();
            let st = &mut *guard;
            if st.loaded.as_ref() == Some(&key) || st.loading.as_ref() == Some(&key) {
                None
            } else {
                Some(self.begin_load(st, &key, online))
            }
        };
        let Some(generation) = generation else {
            tracing::debug!(owner = ?key.owner, "load skipped; session already loaded");
            self.set_online(online);
            return LoadOutcome::Skipped;
        };
        self.run_load(key, generation).await
    }

    /// Manual resync: a full load for the current session, remote wins.
    pub async fn sync_data(&self) -> LoadOutcome {
        let (key, generation) = {
            let mut guard = self.inner.state.lock();
            let st = &mut *guard;
            let key = LoadKey {
                owner: st.session.owner.clone(),
                remote: st.session.remote_owner().is_some(),
            };
            let online = st.session.online;
            let generation = self.begin_load(st, &key, online);
            (key, generation)
        };
        self.run_load(key, generation).await
    }

    fn begin_load(&self, st: &mut EngineState, key: &LoadKey, online: bool) -> u64 {
        st.session.generation += 1;
        st.session.owner.clone_from(&key.owner);
        if st.session.online != online {
            st.session.online = online;
            self.emit(EngineEvent::ConnectivityChanged(online));
        }
        st.loaded = None;
        st.loading = Some(key.clone());
        st.confirmed.clear();
        st.reconciling.clear();
        st.session.generation
    }

    async fn run_load(&self, key: LoadKey, generation: u64) -> LoadOutcome {
        let Some(owner) = key.owner.clone().filter(|_| key.remote) else {
            let mut guard = self.inner.state.lock();
            let st = &mut *guard;
            if self.is_stale(st, generation) {
                return LoadOutcome::Superseded;
            }
            self.apply_local(st, true);
            let status = if st.session.online {
                SyncStatus::Idle
            } else {
                SyncStatus::Offline
            };
            self.set_status(st, status);
            st.loading = None;
            st.loaded = Some(key);
            tracing::info!(projects = st.projects.len(), "loaded from local store");
            return LoadOutcome::Local;
        };

        self.update_status(SyncStatus::Syncing);
        let fetched = self.fetch_remote(&owner).await;

        let mut guard = self.inner.state.lock();
        let st = &mut *guard;
        if self.is_stale(st, generation) {
            tracing::debug!(%owner, "discarding load result for a closed session");
            return LoadOutcome::Superseded;
        }
        st.loading = None;
        match fetched {
            Ok(rows) => {
                self.apply_remote(st, rows);
                self.set_status(st, SyncStatus::Success);
                st.loaded = Some(key);
                tracing::info!(%owner, projects = st.projects.len(), "loaded from remote");
                LoadOutcome::Remote
            }
            Err(e) => {
                tracing::warn!(%owner, error = %e, "remote load failed; using local store");
                self.apply_local(st, false);
                self.set_status(st, SyncStatus::Error);
                LoadOutcome::Fallback
            }
        }
    }

    async fn fetch_remote(
        &self,
        owner: &OwnerId,
    ) -> Result<Vec<(ProjectRow, Vec<TaskRow>)>, RemoteError> {
        let timeout = self.inner.config.remote_timeout;
        let remote = &self.inner.remote;
        let rows = with_timeout(timeout, remote.list_projects(owner)).await?;
        let tasks = try_join_all(
            rows.iter()
                .map(|row| with_timeout(timeout, remote.list_tasks(&row.id, owner))),
        )
        .await?;
        Ok(rows.into_iter().zip(tasks).collect())
    }

    /// Replace in-memory state with the remote rows and mirror them locally.
    fn apply_remote(&self, st: &mut EngineState, rows: Vec<(ProjectRow, Vec<TaskRow>)>) {
        let previous_active = st
            .active_project
            .clone()
            .or_else(|| self.inner.local.active_project());

        let mut colors = BTreeMap::new();
        st.projects.clear();
        st.project_tasks.clear();
        st.confirmed.clear();
        for (row, tasks) in rows {
            let board = TaskBoard::from_entries(tasks.into_iter().map(TaskRow::into_entry));
            if !row.color.as_str().is_empty() {
                colors.insert(row.name.clone(), row.color.clone());
            }
            st.confirmed.insert(row.id.clone(), board.clone());
            st.project_tasks.insert(row.name.clone(), board);
            st.projects.push(row.to_project());
        }
        st.colors.restore(colors);
        let names = st.names();
        st.colors.sync(names.iter().map(String::as_str));
        for project in &mut st.projects {
            project.color = st.colors.color_for(&project.name);
        }

        st.active_project = previous_active
            .filter(|a| names.contains(a))
            .or_else(|| names.first().cloned());
        self.persist_all(st);
        self.announce_all(st);
    }

    /// Replace in-memory state with the Local Store contents.
    ///
    /// With `seed`, an empty store gets the bootstrap project.
    fn apply_local(&self, st: &mut EngineState, seed: bool) {
        let snapshot = self.inner.local.snapshot();
        let mut names = snapshot.projects;
        let mut boards = snapshot.project_tasks;
        let mut active = snapshot.active_project;

        if seed && names.is_empty() {
            let name = self.inner.config.bootstrap_project.clone();
            tracing::info!(project = %name, "empty local store; seeding bootstrap project");
            boards.insert(name.clone(), self.seed_board(&name));
            names.push(name.clone());
            active = Some(name);
        }
        boards.retain(|name, _| names.contains(name));
        for name in &names {
            boards.entry(name.clone()).or_default();
        }

        st.colors.restore(snapshot.project_colors);
        st.colors.sync(names.iter().map(String::as_str));
        st.projects = names
            .iter()
            .map(|name| Project::local(name, st.colors.color_for(name)))
            .collect();
        st.project_tasks = boards;
        st.confirmed.clear();
        st.active_project = active
            .filter(|a| names.contains(a))
            .or_else(|| names.first().cloned());
        self.persist_all(st);
        self.announce_all(st);
    }

    fn seed_board(&self, name: &str) -> TaskBoard {
        let mut board = TaskBoard::new();
        if name == self.inner.config.bootstrap_project {
            let welcome = TaskDraft::named(self.inner.config.welcome_task.clone());
            board.push(Column::Pending, Task::from_draft(welcome, 0));
        }
        board
    }

    // -----------------------------------------------------------------------
    // Projects
    // -----------------------------------------------------------------------

    /// Create a project.
    ///
    /// The project exists locally when this returns `Ok`, whatever the
    /// remote does. With a remote session, the remote row is created and
    /// the project adopts its id.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectNameError::Empty`] or [`ProjectNameError::Duplicate`];
    /// nothing changes in that case.
    pub async fn add_project(&self, name: &str) -> Result<(), ProjectNameError> {
        let name = name.trim();
        let (pending, generation, color) = {
            let mut guard = self.inner.state.lock();
            let st = &mut *guard;
            st.check_new_name(name)?;

            let color = st.colors.assign(name);
            let board = self.seed_board(name);
            st.projects.push(Project::local(name, color.clone()));
            self.inner.local.set_board(name, &board);
            st.project_tasks.insert(name.to_string(), board);
            self.inner.local.set_projects(st.names());
            self.inner
                .local
                .set_project_colors(st.colors.assignments().clone());
            self.emit(EngineEvent::ProjectsChanged(st.names()));
            self.emit(EngineEvent::BoardChanged {
                project: name.to_string(),
            });
            if st.active_project.is_none() {
                self.select(st, Some(name.to_string()));
            }
            let pending = st.session.remote_owner().map(|owner| {
                st.next_create += 1;
                st.creating.insert(st.next_create, Some(name.to_string()));
                (owner, st.next_create)
            });
            (pending, st.session.generation, color)
        };
        tracing::info!(project = name, color = %color, "project added");

        let Some((owner, token)) = pending else {
            return Ok(());
        };
        self.update_status(SyncStatus::Syncing);
        let fields = ProjectFields {
            name: name.to_string(),
            color,
        };
        let created = with_timeout(
            self.inner.config.remote_timeout,
            self.inner.remote.create_project(&owner, &fields),
        )
        .await;

        let follow_up = {
            let mut guard = self.inner.state.lock();
            let st = &mut *guard;
            let target = st.creating.remove(&token);
            if self.is_stale(st, generation) {
                return Ok(());
            }
            match created {
                Ok(row) => {
                    self.set_status(st, SyncStatus::Success);
                    self.adopt_created(st, name, target.flatten(), row)
                }
                Err(e) => {
                    tracing::warn!(project = name, error = %e, "remote project create failed");
                    self.set_status(st, SyncStatus::Error);
                    None
                }
            }
        };

        match follow_up {
            Some(CreateFollowUp::Rename(id, fields)) => {
                self.update_status(SyncStatus::Syncing);
                let updated = with_timeout(
                    self.inner.config.remote_timeout,
                    self.inner.remote.update_project(&owner, &id, &fields),
                )
                .await;
                self.finish_remote(generation, &fields.name, "rename", updated.map(drop));
            }
            Some(CreateFollowUp::Delete(id)) => {
                self.update_status(SyncStatus::Syncing);
                let deleted = with_timeout(
                    self.inner.config.remote_timeout,
                    self.inner.remote.delete_project(&owner, &id),
                )
                .await;
                self.finish_remote(generation, name, "delete", deleted);
            }
            None => {}
        }
        Ok(())
    }

    /// Attach a freshly created remote row to the project it was created
    /// for, which may have been renamed or deleted in the meantime.
    fn adopt_created(
        &self,
        st: &mut EngineState,
        created_as: &str,
        current: Option<String>,
        row: ProjectRow,
    ) -> Option<CreateFollowUp> {
        let Some(current) = current else {
            tracing::info!(project = created_as, "project deleted while being created remotely");
            return Some(CreateFollowUp::Delete(row.id));
        };
        let Some(project) = st
            .projects
            .iter_mut()
            .find(|p| p.name == current && p.is_local())
        else {
            tracing::debug!(project = %current, "created project no longer local; leaving it");
            return None;
        };
        project.id = row.id.clone();
        let fields = ProjectFields {
            name: current.clone(),
            color: project.color.clone(),
        };
        st.confirmed.insert(row.id.clone(), TaskBoard::new());
        self.dispatch(st, &current);
        if current == row.name {
            None
        } else {
            tracing::info!(from = %row.name, to = %current, "project renamed while being created remotely");
            Some(CreateFollowUp::Rename(row.id, fields))
        }
    }

    /// Delete a project and all its tasks.
    ///
    /// Local removal always happens. If the project was active, the first
    /// remaining project (or none) becomes active.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectNameError::NotFound`] if no project has this name.
    pub async fn delete_project(&self, name: &str) -> Result<(), ProjectNameError> {
        let (remote, generation, in_flight) = {
            let mut guard = self.inner.state.lock();
            let st = &mut *guard;
            let index = st
                .projects
                .iter()
                .position(|p| p.name == name)
                .ok_or_else(|| ProjectNameError::NotFound(name.to_string()))?;
            let project = st.projects.remove(index);
            st.project_tasks.remove(name);
            st.colors.remove(name);
            st.drag.forget(name);
            st.confirmed.remove(&project.id);
            let in_flight = st.reconciling.remove(&project.id).map(|slot| slot.done);
            if project.is_local() {
                st.retarget_create(name, None);
            }

            self.inner.local.set_projects(st.names());
            self.inner.local.set_project_tasks(st.project_tasks.clone());
            self.inner
                .local
                .set_project_colors(st.colors.assignments().clone());
            self.emit(EngineEvent::ProjectsChanged(st.names()));
            if st.active_project.as_deref() == Some(name) {
                let next = st.projects.first().map(|p| p.name.clone());
                self.select(st, next);
            }

            let remote = if project.is_local() {
                None
            } else {
                st.session.remote_owner().map(|owner| (owner, project.id))
            };
            (remote, st.session.generation, in_flight)
        };
        tracing::info!(project = name, "project deleted");

        let Some((owner, id)) = remote else {
            return Ok(());
        };
        self.update_status(SyncStatus::Syncing);
        // Task writes already sent must land before the project goes away.
        if let Some(done) = in_flight {
            tracing::debug!(project = name, "waiting for in-flight reconciliation");
            let _ = done.await;
        }
        let deleted = with_timeout(
            self.inner.config.remote_timeout,
            self.inner.remote.delete_project(&owner, &id),
        )
        .await;
        self.finish_remote(generation, name, "delete", deleted);
        Ok(())
    }

    /// Rename a project, keeping its tasks and color.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectNameError`] if the new name is empty, equal to the
    /// old one, or taken, or if `old` does not exist.
    pub async fn rename_project(&self, old: &str, new: &str) -> Result<(), ProjectNameError> {
        let new = new.trim();
        let (remote, generation) = {
            let mut guard = self.inner.state.lock();
            let st = &mut *guard;
            if new.is_empty() {
                return Err(ProjectNameError::Empty);
            }
            if new == old {
                return Err(ProjectNameError::Unchanged);
            }
            let index = st
                .projects
                .iter()
                .position(|p| p.name == old)
                .ok_or_else(|| ProjectNameError::NotFound(old.to_string()))?;
            st.check_new_name(new)?;

            let project = &mut st.projects[index];
            let was_local = project.is_local();
            project.name = new.to_string();
            if was_local {
                project.id = ProjectId::local(new);
            }
            let (id, color) = (project.id.clone(), project.color.clone());

            if let Some(board) = st.project_tasks.remove(old) {
                st.project_tasks.insert(new.to_string(), board);
            }
            st.colors.rekey(old, new);
            st.drag.rekey(old, new);
            if was_local {
                st.retarget_create(old, Some(new));
            }

            self.inner.local.set_projects(st.names());
            self.inner.local.set_project_tasks(st.project_tasks.clone());
            self.inner
                .local
                .set_project_colors(st.colors.assignments().clone());
            self.emit(EngineEvent::ProjectsChanged(st.names()));
            self.emit(EngineEvent::BoardChanged {
                project: new.to_string(),
            });
            if st.active_project.as_deref() == Some(old) {
                self.select(st, Some(new.to_string()));
            }

            let remote = if was_local {
                None
            } else {
                st.session
                    .remote_owner()
                    .map(|owner| (owner, id, ProjectFields { name: new.to_string(), color }))
            };
            (remote, st.session.generation)
        };
        tracing::info!(from = old, to = new, "project renamed");

        let Some((owner, id, fields)) = remote else {
            return Ok(());
        };
        self.update_status(SyncStatus::Syncing);
        let updated = with_timeout(
            self.inner.config.remote_timeout,
            self.inner.remote.update_project(&owner, &id, &fields),
        )
        .await;
        self.finish_remote(generation, new, "rename", updated.map(drop));
        Ok(())
    }

    /// Select the active project, or clear the selection with `None`.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectNameError::NotFound`] for an unknown name.
    pub fn set_active_project(&self, name: Option<&str>) -> Result<(), ProjectNameError> {
        let mut guard = self.inner.state.lock();
        let st = &mut *guard;
        if let Some(name) = name {
            if st.project(name).is_none() {
                return Err(ProjectNameError::NotFound(name.to_string()));
            }
        }
        self.select(st, name.map(str::to_string));
        Ok(())
    }

    fn select(&self, st: &mut EngineState, active: Option<String>) {
        if st.active_project == active {
            return;
        }
        st.active_project.clone_from(&active);
        self.inner.local.set_active_project(active.clone());
        self.emit(EngineEvent::ActiveProjectChanged(active));
    }

    fn finish_remote(
        &self,
        generation: u64,
        project: &str,
        action: &str,
        outcome: Result<(), RemoteError>,
    ) {
        let mut guard = self.inner.state.lock();
        let st = &mut *guard;
        if self.is_stale(st, generation) {
            return;
        }
        match outcome {
            Ok(()) => self.set_status(st, SyncStatus::Success),
            Err(e) => {
                tracing::warn!(project, action, error = %e, "remote project update failed");
                self.set_status(st, SyncStatus::Error);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Boards
    // -----------------------------------------------------------------------

    /// Replace a project's board.
    ///
    /// The new board is visible to readers and written to the Local Store
    /// before this returns. Remote reconciliation runs in the background.
    /// List order is authoritative: positions that contradict it are
    /// renumbered before the board is stored.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::ProjectNotFound`] for an unknown project and
    /// [`BoardError::DuplicateTask`] if a task sits in two places.
    pub fn update_task_board(&self, project: &str, mut board: TaskBoard) -> Result<(), BoardError> {
        board.check()?;
        if board.align_positions() {
            tracing::debug!(project, "renumbered positions to match list order");
        }
        let mut guard = self.inner.state.lock();
        let st = &mut *guard;
        st.board_for_edit(project)?;
        self.commit_board(st, project, board);
        Ok(())
    }

    /// Append a task to the pending column and return its id.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::TaskNameEmpty`] or [`BoardError::ProjectNotFound`].
    pub fn add_task(&self, project: &str, draft: TaskDraft) -> Result<TaskId, BoardError> {
        let draft = TaskDraft {
            name: draft.name.trim().to_string(),
            ..draft
        };
        if draft.name.is_empty() {
            return Err(BoardError::TaskNameEmpty);
        }
        self.edit_board(project, |board| {
            let task = Task::from_draft(draft, 0);
            let id = task.id.clone();
            board.push(Column::Pending, task);
            Ok(id)
        })
    }

    /// Overwrite a task's editable fields, keeping its column and position.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::TaskNameEmpty`], [`BoardError::ProjectNotFound`]
    /// or [`BoardError::TaskNotFound`].
    pub fn update_task(&self, project: &str, id: &TaskId, draft: TaskDraft) -> Result<(), BoardError> {
        let name = draft.name.trim().to_string();
        if name.is_empty() {
            return Err(BoardError::TaskNameEmpty);
        }
        self.edit_board(project, |board| {
            board.replace(Task {
                id: id.clone(),
                name,
                description: draft.description,
                due_date: draft.due_date,
                due_date_time: draft.due_date_time,
                priority: draft.priority,
                position: 0,
            })
        })
    }

    /// Remove a task.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::ProjectNotFound`] or [`BoardError::TaskNotFound`].
    pub fn delete_task(&self, project: &str, id: &TaskId) -> Result<(), BoardError> {
        self.edit_board(project, |board| board.remove(id).map(drop))
    }

    /// Remove every task of a project.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::ProjectNotFound`].
    pub fn clear_tasks(&self, project: &str) -> Result<(), BoardError> {
        self.edit_board(project, |board| {
            board.clear();
            Ok(())
        })
    }

    /// Move a task to `to`, at `index` or at the end.
    ///
    /// Dropped with [`MoveOutcome::Debounced`] while a previous gesture on the
    /// same board is inside its cooldown.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError`] for an unknown project or task, or a bad index.
    pub fn move_task(
        &self,
        project: &str,
        id: &TaskId,
        to: Column,
        index: Option<usize>,
    ) -> Result<MoveOutcome, BoardError> {
        self.drag_board(project, |board| board.move_task(id, to, index))
    }

    /// Move a task within one column.
    ///
    /// Debounced like [`move_task`](Self::move_task).
    ///
    /// # Errors
    ///
    /// Returns [`BoardError`] for an unknown project or a bad index.
    pub fn reorder_task(
        &self,
        project: &str,
        column: Column,
        from: usize,
        to: usize,
    ) -> Result<MoveOutcome, BoardError> {
        self.drag_board(project, |board| board.reorder(column, from, to))
    }

    fn edit_board<T>(
        &self,
        project: &str,
        edit: impl FnOnce(&mut TaskBoard) -> Result<T, BoardError>,
    ) -> Result<T, BoardError> {
        let mut guard = self.inner.state.lock();
        let st = &mut *guard;
        let mut board = st.board_for_edit(project)?;
        let out = edit(&mut board)?;
        self.commit_board(st, project, board);
        Ok(out)
    }

    fn drag_board(
        &self,
        project: &str,
        gesture: impl FnOnce(&mut TaskBoard) -> Result<(), BoardError>,
    ) -> Result<MoveOutcome, BoardError> {
        let mut guard = self.inner.state.lock();
        let st = &mut *guard;
        let mut board = st.board_for_edit(project)?;
        gesture(&mut board)?;
        if !st.drag.try_acquire(project) {
            return Ok(MoveOutcome::Debounced);
        }
        self.commit_board(st, project, board);
        Ok(MoveOutcome::Applied)
    }

    fn commit_board(&self, st: &mut EngineState, project: &str, board: TaskBoard) {
        self.inner.local.set_board(project, &board);
        st.project_tasks.insert(project.to_string(), board);
        self.emit(EngineEvent::BoardChanged {
            project: project.to_string(),
        });
        self.dispatch(st, project);
    }

    // -----------------------------------------------------------------------
    // Reconciliation
    // -----------------------------------------------------------------------

    /// Start reconciling `project`, or hand the latest board to the run
    /// already in flight for it.
    fn dispatch(&self, st: &mut EngineState, project: &str) {
        if !self.is_alive() {
            return;
        }
        let Some(owner) = st.session.remote_owner() else {
            return;
        };
        let Some(id) = st
            .project(project)
            .filter(|p| !p.is_local())
            .map(|p| p.id.clone())
        else {
            return;
        };
        let board = st.project_tasks.get(project).cloned().unwrap_or_default();
        let generation = st.session.generation;

        if let Some(slot) = st
            .reconciling
            .get_mut(&id)
            .filter(|slot| slot.generation == generation)
        {
            tracing::debug!(project, "reconciliation in flight; queueing latest board");
            slot.queued = Some(board);
            return;
        }
        let (finished, done) = oneshot::channel::<()>();
        st.reconciling.insert(
            id.clone(),
            ReconcileSlot {
                generation,
                queued: None,
                done,
            },
        );

        let engine = self.clone();
        let handle = tokio::spawn(async move {
            engine.reconcile_loop(owner, id, board, generation).await;
            drop(finished);
        });
        let mut inflight = self.inner.inflight.lock();
        inflight.retain(|h| !h.is_finished());
        inflight.push(handle);
    }

    async fn reconcile_loop(
        &self,
        owner: OwnerId,
        id: ProjectId,
        mut board: TaskBoard,
        generation: u64,
    ) {
        loop {
            let baseline = {
                let mut guard = self.inner.state.lock();
                let st = &mut *guard;
                if self.is_stale(st, generation) {
                    return;
                }
                if let Some(confirmed) = st.confirmed.get(&id) {
                    confirmed.clone()
                } else {
                    tracing::debug!(project = %id, "no confirmed snapshot; nothing to reconcile against");
                    Self::release_slot(st, &id, generation);
                    return;
                }
            };

            let plan = ReconcilePlan::between(&baseline, &board);
            if !plan.is_empty() {
                self.update_status(SyncStatus::Syncing);
                let result = reconcile::execute(
                    &self.inner.remote,
                    &owner,
                    &id,
                    &plan,
                    self.inner.config.remote_timeout,
                )
                .await;

                let mut guard = self.inner.state.lock();
                let st = &mut *guard;
                if self.is_stale(st, generation) {
                    tracing::debug!(project = %id, "discarding reconciliation for a closed session");
                    return;
                }
                if let Some(confirmed) = st.confirmed.get_mut(&id) {
                    result.apply_to(&plan, confirmed);
                }
                if result.is_complete() {
                    tracing::debug!(
                        project = %id,
                        created = result.created.len(),
                        updated = result.updated.len(),
                        deleted = result.deleted.len(),
                        "board reconciled"
                    );
                    self.set_status(st, SyncStatus::Success);
                } else {
                    tracing::warn!(
                        project = %id,
                        failed = result.failures.len(),
                        planned = plan.len(),
                        "partial reconciliation; local board kept"
                    );
                    self.set_status(st, SyncStatus::Error);
                }
            }

            let next = {
                let mut guard = self.inner.state.lock();
                let st = &mut *guard;
                let ours = st
                    .reconciling
                    .get(&id)
                    .is_some_and(|slot| slot.generation == generation);
                if !ours {
                    return;
                }
                let next = st
                    .reconciling
                    .get_mut(&id)
                    .and_then(|slot| slot.queued.take());
                if next.is_none() {
                    st.reconciling.remove(&id);
                }
                next
            };
            match next {
                Some(latest) => board = latest,
                None => return,
            }
        }
    }

    /// Free the reconcile slot of `id` if the run of `generation` still owns it.
    fn release_slot(st: &mut EngineState, id: &ProjectId, generation: u64) {
        if st
            .reconciling
            .get(id)
            .is_some_and(|slot| slot.generation == generation)
        {
            st.reconciling.remove(id);
        }
    }

    /// Wait for every background reconciliation started so far to finish.
    pub async fn settle(&self) {
        loop {
            let handles = std::mem::take(&mut *self.inner.inflight.lock());
            if handles.is_empty() {
                return;
            }
            for handle in handles {
                if let Err(e) = handle.await {
                    tracing::warn!(error = %e, "reconciliation task ended abnormally");
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Session
    // -----------------------------------------------------------------------

    /// Update the connectivity signal.
    ///
    /// Going offline sets [`SyncStatus::Offline`]. Coming back online does
    /// not reload; call [`load`](Self::load) or [`sync_data`](Self::sync_data).
    pub fn set_online(&self, online: bool) {
        let mut guard = self.inner.state.lock();
        let st = &mut *guard;
        if st.session.online == online {
            return;
        }
        st.session.online = online;
        self.emit(EngineEvent::ConnectivityChanged(online));
        if !online {
            self.set_status(st, SyncStatus::Offline);
        } else if st.status == SyncStatus::Offline {
            self.set_status(st, SyncStatus::Idle);
        }
        tracing::info!(online, "connectivity changed");
    }

    /// Tear the engine down: results of remote calls still in flight are
    /// ignored from now on.
    pub fn shutdown(&self) {
        if self.inner.alive.swap(false, Ordering::SeqCst) {
            tracing::info!("sync engine shut down");
        }
    }

    /// Returns `false` after [`shutdown`](Self::shutdown).
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.inner.alive.load(Ordering::SeqCst)
    }

    /// Subscribe to state change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.inner.events.subscribe()
    }

    // -----------------------------------------------------------------------
    // Readers
    // -----------------------------------------------------------------------

    /// Projects in display order.
    #[must_use]
    pub fn projects(&self) -> Vec<Project> {
        self.inner.state.lock().projects.clone()
    }

    /// Project names in display order.
    #[must_use]
    pub fn project_names(&self) -> Vec<String> {
        self.inner.state.lock().names()
    }

    /// Every board keyed by project name.
    #[must_use]
    pub fn project_tasks(&self) -> BTreeMap<String, TaskBoard> {
        self.inner.state.lock().project_tasks.clone()
    }

    /// The board of one project.
    #[must_use]
    pub fn board(&self, project: &str) -> Option<TaskBoard> {
        self.inner.state.lock().project_tasks.get(project).cloned()
    }

    #[must_use]
    pub fn sync_status(&self) -> SyncStatus {
        self.inner.state.lock().status
    }

    #[must_use]
    pub fn is_online(&self) -> bool {
        self.inner.state.lock().session.online
    }

    #[must_use]
    pub fn owner(&self) -> Option<OwnerId> {
        self.inner.state.lock().session.owner.clone()
    }

    #[must_use]
    pub fn active_project(&self) -> Option<String> {
        self.inner.state.lock().active_project.clone()
    }

    /// The project's color, or the default color if it has none.
    #[must_use]
    pub fn color_for(&self, project: &str) -> ColorToken {
        self.inner.state.lock().colors.color_for(project)
    }

    /// Every color assignment keyed by project name.
    #[must_use]
    pub fn project_colors(&self) -> BTreeMap<String, ColorToken> {
        self.inner.state.lock().colors.assignments().clone()
    }

    /// The underlying Local Store.
    pub fn local(&self) -> &LocalStore<B> {
        &self.inner.local
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn is_stale(&self, st: &EngineState, generation: u64) -> bool {
        !self.is_alive() || st.session.generation != generation
    }

    fn emit(&self, event: EngineEvent) {
        // No subscribers is fine.
        let _ = self.inner.events.send(event);
    }

    fn set_status(&self, st: &mut EngineState, status: SyncStatus) {
        if st.status != status {
            st.status = status;
            self.emit(EngineEvent::SyncStatusChanged(status));
        }
    }

    fn update_status(&self, status: SyncStatus) {
        let mut guard = self.inner.state.lock();
        self.set_status(&mut guard, status);
    }

    fn persist_all(&self, st: &EngineState) {
        self.inner.local.replace_all(LocalState {
            projects: st.names(),
            project_tasks: st.project_tasks.clone(),
            active_project: st.active_project.clone(),
            project_colors: st.colors.assignments().clone(),
        });
    }

    fn announce_all(&self, st: &EngineState) {
        self.emit(EngineEvent::ProjectsChanged(st.names()));
        self.emit(EngineEvent::ActiveProjectChanged(st.active_project.clone()));
        for project in st.project_tasks.keys() {
            self.emit(EngineEvent::BoardChanged {
                project: project.clone(),
            });
        }
    }
}
