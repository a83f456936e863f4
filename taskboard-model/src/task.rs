//! Task types: identifiers, priority, board columns, and the task record.
//!
//! A task's column is not stored on the task itself: it is the list of the
//! [`TaskBoard`](crate::board::TaskBoard) the task currently sits in, which
//! makes sole-column membership structural.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default name given to a task created without one.
pub const DEFAULT_TASK_NAME: &str = "New task";

/// Unique identifier for a task, based on UUID v7 for time-ordering.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    /// Creates a new time-ordered task identifier (UUID v7).
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Creates a `TaskId` from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner UUID value.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TaskId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Priority of a task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Can wait.
    Low,
    /// The default.
    #[default]
    Normal,
    /// Should be done soon.
    Medium,
    /// Urgent.
    High,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Normal => write!(f, "normal"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

impl std::str::FromStr for Priority {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "normal" => Ok(Self::Normal),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            _ => Err(UnknownVariant(s.to_string())),
        }
    }
}

/// Board column a task is assigned to. Also the remote `status` value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Column {
    /// Not started.
    #[default]
    Pending,
    /// Being worked on.
    InProgress,
    /// Done.
    Completed,
}

impl Column {
    /// All columns in board order.
    pub const ALL: [Self; 3] = [Self::Pending, Self::InProgress, Self::Completed];
}

impl std::fmt::Display for Column {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::InProgress => write!(f, "inProgress"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

impl std::str::FromStr for Column {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "pending" | "todo" => Ok(Self::Pending),
            "inprogress" | "doing" => Ok(Self::InProgress),
            "completed" | "done" => Ok(Self::Completed),
            _ => Err(UnknownVariant(s.to_string())),
        }
    }
}

/// A string did not name a known enum variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown value: {0}")]
pub struct UnknownVariant(pub String);

/// A single task on a board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Unique task identifier.
    pub id: TaskId,
    /// Short title.
    pub name: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Optional due date.
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    /// Optional due date and time.
    #[serde(default)]
    pub due_date_time: Option<DateTime<Utc>>,
    /// Priority.
    #[serde(default)]
    pub priority: Priority,
    /// Intra-column order key. Consistent with list order, not necessarily contiguous.
    #[serde(default)]
    pub position: i64,
}

impl Task {
    /// Builds a task from a draft with a freshly generated id.
    #[must_use]
    pub fn from_draft(draft: TaskDraft, position: i64) -> Self {
        Self {
            id: TaskId::new(),
            name: draft.name,
            description: draft.description,
            due_date: draft.due_date,
            due_date_time: draft.due_date_time,
            priority: draft.priority,
            position,
        }
    }

    /// Compares every user-visible field except the id.
    ///
    /// Due date-times compare at millisecond precision: remote backends
    /// commonly truncate sub-millisecond digits on storage.
    #[must_use]
    pub fn same_content(&self, other: &Self) -> bool {
        self.name == other.name
            && self.description == other.description
            && self.due_date == other.due_date
            && self.due_date_time.map(|t| t.timestamp_millis())
                == other.due_date_time.map(|t| t.timestamp_millis())
            && self.priority == other.priority
            && self.position == other.position
    }
}

/// The editable fields of a task, used when creating or editing one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDraft {
    /// Short title.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Optional due date.
    pub due_date: Option<NaiveDate>,
    /// Optional due date and time.
    pub due_date_time: Option<DateTime<Utc>>,
    /// Priority.
    pub priority: Priority,
}

impl TaskDraft {
    /// A draft with the given name and default everything else.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

impl Default for TaskDraft {
    fn default() -> Self {
        Self {
            name: DEFAULT_TASK_NAME.to_string(),
            description: String::new(),
            due_date: None,
            due_date_time: None,
            priority: Priority::Normal,
        }
    }
}
