//! Local store: the durable fallback and cache of record.
//!
//! [`LocalStore`] keeps an in-memory mirror of five keys and writes through
//! to a [`StorageBackend`]:
//!
//! | key             | value                                 |
//! |-----------------|---------------------------------------|
//! | `projects`      | list of project names                 |
//! | `projectTasks`  | map of project name to [`TaskBoard`]  |
//! | `activeProject` | selected project name or `null`       |
//! | `projectColors` | map of project name to color          |
//! | `schemaVersion` | layout version ([`SCHEMA_VERSION`])   |
//!
//! # Degradation
//!
//! Writes update the mirror first, then attempt the durable write. If the
//! backend fails (disk full, storage disabled), the failure is logged once
//! and the store stops touching the backend for the rest of the session.
//! The mirror stays authoritative and callers never see the error.

pub mod backend;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;

use taskboard_model::board::TaskBoard;
use taskboard_model::codec::{self, SCHEMA_VERSION};
use taskboard_model::project::ColorToken;

pub use backend::{FileBackend, MemoryBackend, StorageBackend};

/// Key of the project name list.
pub const PROJECTS_KEY: &str = "projects";
/// Key of the per-project task boards.
pub const PROJECT_TASKS_KEY: &str = "projectTasks";
/// Key of the active project selection.
pub const ACTIVE_PROJECT_KEY: &str = "activeProject";
/// Key of the project color assignments.
pub const PROJECT_COLORS_KEY: &str = "projectColors";
/// Key of the persisted layout version.
pub const SCHEMA_VERSION_KEY: &str = "schemaVersion";

/// Errors that can occur in a storage backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The underlying storage is disabled or unreachable.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// A write operation failed.
    #[error("write failed: {0}")]
    WriteFailed(String),

    /// A read operation failed.
    #[error("read failed: {0}")]
    ReadFailed(String),
}

/// Everything the local store persists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalState {
    /// Project names in display order.
    pub projects: Vec<String>,
    /// Task board per project name.
    pub project_tasks: BTreeMap<String, TaskBoard>,
    /// Currently selected project.
    pub active_project: Option<String>,
    /// Assigned color per project name.
    pub project_colors: BTreeMap<String, ColorToken>,
}

/// Write-through local store with an authoritative in-memory mirror.
pub struct LocalStore<B: StorageBackend> {
    backend: B,
    mirror: Mutex<LocalState>,
    durable: AtomicBool,
}

impl<B: StorageBackend> LocalStore<B> {
    /// Open the store over `backend`, reading whatever it holds.
    ///
    /// Never fails: an unreadable backend yields an empty, session-only
    /// store, and an undecodable key is treated as absent.
    pub fn open(backend: B) -> Self {
        let store = Self {
            backend,
            mirror: Mutex::new(LocalState::default()),
            durable: AtomicBool::new(true),
        };

        match store.backend.read(SCHEMA_VERSION_KEY) {
            Ok(None) => {
                tracing::debug!(version = SCHEMA_VERSION, "no schema version stored, writing current");
                store.persist_raw(SCHEMA_VERSION_KEY, SCHEMA_VERSION.to_string());
            }
            Ok(Some(text)) => match codec::decode_version(&text) {
                Ok(v) if v > SCHEMA_VERSION => {
                    tracing::warn!(
                        stored = v,
                        supported = SCHEMA_VERSION,
                        "local store written by a newer version; keeping it read-only this session"
                    );
                    store.durable.store(false, Ordering::SeqCst);
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "unreadable schema version, rewriting");
                    store.persist_raw(SCHEMA_VERSION_KEY, SCHEMA_VERSION.to_string());
                }
            },
            Err(e) => {
                store.degrade(&e);
                return store;
            }
        }

        let state = LocalState {
            projects: store.read_key(PROJECTS_KEY).unwrap_or_default(),
            project_tasks: store.read_key(PROJECT_TASKS_KEY).unwrap_or_default(),
            active_project: store
                .read_key::<Option<String>>(ACTIVE_PROJECT_KEY)
                .flatten(),
            project_colors: store.read_key(PROJECT_COLORS_KEY).unwrap_or_default(),
        };
        *store.mirror.lock() = state;
        store
    }

    /// Returns `false` once the store has fallen back to session-only persistence.
    pub fn is_durable(&self) -> bool {
        self.durable.load(Ordering::SeqCst)
    }

    /// A copy of everything currently held.
    pub fn snapshot(&self) -> LocalState {
        self.mirror.lock().clone()
    }

    /// Project names in display order.
    pub fn projects(&self) -> Vec<String> {
        self.mirror.lock().projects.clone()
    }

    /// All task boards keyed by project name.
    pub fn project_tasks(&self) -> BTreeMap<String, TaskBoard> {
        self.mirror.lock().project_tasks.clone()
    }

    /// The board of one project, if stored.
    pub fn board(&self, project: &str) -> Option<TaskBoard> {
        self.mirror.lock().project_tasks.get(project).cloned()
    }

    /// The active project selection.
    pub fn active_project(&self) -> Option<String> {
        self.mirror.lock().active_project.clone()
    }

    /// All color assignments keyed by project name.
    pub fn project_colors(&self) -> BTreeMap<String, ColorToken> {
        self.mirror.lock().project_colors.clone()
    }

    /// Replace the project name list.
    pub fn set_projects(&self, projects: Vec<String>) {
        let mut mirror = self.mirror.lock();
        mirror.projects = projects;
        self.persist(PROJECTS_KEY, &mirror.projects);
    }

    /// Replace every task board.
    pub fn set_project_tasks(&self, project_tasks: BTreeMap<String, TaskBoard>) {
        let mut mirror = self.mirror.lock();
        mirror.project_tasks = project_tasks;
        self.persist(PROJECT_TASKS_KEY, &mirror.project_tasks);
    }

    /// Replace the board of one project.
    pub fn set_board(&self, project: &str, board: &TaskBoard) {
        let mut mirror = self.mirror.lock();
        mirror
            .project_tasks
            .insert(project.to_string(), board.clone());
        self.persist(PROJECT_TASKS_KEY, &mirror.project_tasks);
    }

    /// Replace the active project selection.
    pub fn set_active_project(&self, active: Option<String>) {
        let mut mirror = self.mirror.lock();
        mirror.active_project = active;
        self.persist(ACTIVE_PROJECT_KEY, &mirror.active_project);
    }

    /// Replace every color assignment.
    pub fn set_project_colors(&self, colors: BTreeMap<String, ColorToken>) {
        let mut mirror = self.mirror.lock();
        mirror.project_colors = colors;
        self.persist(PROJECT_COLORS_KEY, &mirror.project_colors);
    }

    /// Replace all four data keys at once.
    pub fn replace_all(&self, state: LocalState) {
        let mut mirror = self.mirror.lock();
        *mirror = state;
        self.persist(PROJECTS_KEY, &mirror.projects);
        self.persist(PROJECT_TASKS_KEY, &mirror.project_tasks);
        self.persist(ACTIVE_PROJECT_KEY, &mirror.active_project);
        self.persist(PROJECT_COLORS_KEY, &mirror.project_colors);
    }

    fn read_key<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.backend.read(key) {
            Ok(Some(text)) => match codec::decode(&text) {
                Ok(value) => Some(value),
                Err(e) => {
                    tracing::warn!(key, error = %e, "discarding undecodable local blob");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                self.degrade(&e);
                None
            }
        }
    }

    // Called with the mirror lock held so durable writes land in mutation order.
    fn persist<T: Serialize>(&self, key: &str, value: &T) {
        if !self.is_durable() {
            return;
        }
        match codec::encode(value) {
            Ok(text) => self.persist_raw(key, text),
            Err(e) => tracing::warn!(key, error = %e, "failed to encode local blob"),
        }
    }

    fn persist_raw(&self, key: &str, text: String) {
        if !self.is_durable() {
            return;
        }
        if let Err(e) = self.backend.write(key, &text) {
            self.degrade(&e);
        }
    }

    fn degrade(&self, err: &StoreError) {
        if self.durable.swap(false, Ordering::SeqCst) {
            tracing::warn!(
                error = %err,
                "local storage unavailable; continuing with in-memory state for this session"
            );
        }
    }
}
