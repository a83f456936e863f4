//! Process-wide synchronization status.

use serde::{Deserialize, Serialize};

/// Status of the sync engine as shown by a status indicator.
///
/// Written only by the sync engine, read by every consumer. Never persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SyncStatus {
    /// Nothing has been attempted yet.
    #[default]
    Idle,
    /// A remote round-trip is in flight.
    Syncing,
    /// The last remote round-trip succeeded.
    Success,
    /// The last remote round-trip failed; local state is the source of truth.
    Error,
    /// No connectivity; running purely on the local store.
    Offline,
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Syncing => write!(f, "syncing"),
            Self::Success => write!(f, "success"),
            Self::Error => write!(f, "error"),
            Self::Offline => write!(f, "offline"),
        }
    }
}
