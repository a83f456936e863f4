//! The sync engine: one authoritative in-memory view of projects and boards.
//!
//! Every mutation is applied optimistically: the in-memory state and the
//! Local Store are updated before the call returns. Remote work happens
//! afterward, in the background for board edits, and its failures degrade
//! the operation to a local-only effect and set [`SyncStatus::Error`].
//!
//! ```text
//! caller ──► SyncEngine ──► in-memory state ──► LocalStore (write-through)
//!                 │
//!                 └──► reconcile task per project ──► RemoteStore
//! ```
//!
//! Consumers observe changes through [`SyncEngine::subscribe`].
//!
//! [`SyncStatus::Error`]: taskboard_model::status::SyncStatus::Error

pub mod engine;
pub mod guard;
pub mod reconcile;

use taskboard_model::status::SyncStatus;

pub use engine::SyncEngine;
pub use guard::DragGuard;
pub use reconcile::{ReconcileFailure, ReconcilePlan, ReconciliationResult};

/// A project name was rejected.
///
/// Validation failures are returned to the caller and never affect the
/// sync status.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProjectNameError {
    /// The name is empty or whitespace.
    #[error("project name cannot be empty")]
    Empty,
    /// Another project already has this name.
    #[error("project already exists: {0}")]
    Duplicate(String),
    /// A rename to the project's current name.
    #[error("new name is the same as the old name")]
    Unchanged,
    /// No project has this name.
    #[error("project not found: {0}")]
    NotFound(String),
}

/// State changes announced to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// The project list changed; carries the names in display order.
    ProjectsChanged(Vec<String>),
    /// The board of a project changed.
    BoardChanged {
        /// Project name.
        project: String,
    },
    /// The sync status changed.
    SyncStatusChanged(SyncStatus),
    /// The connectivity signal changed.
    ConnectivityChanged(bool),
    /// The active project changed.
    ActiveProjectChanged(Option<String>),
}

/// What a call to [`SyncEngine::load`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Already loaded for this session; nothing fetched.
    Skipped,
    /// Populated from the remote, which now mirrors into the Local Store.
    Remote,
    /// Populated from the Local Store (no remote session).
    Local,
    /// The remote failed; populated from the Local Store instead.
    Fallback,
    /// A newer load or a shutdown overtook this one; its result was dropped.
    Superseded,
}

/// What a move or reorder did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// The board changed.
    Applied,
    /// Dropped: another gesture on the same board is still settling.
    Debounced,
}
