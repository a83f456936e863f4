//! Project identity, ownership, and display color types.

use serde::{Deserialize, Serialize};

/// Identifier of a project.
///
/// Remote-assigned when the project was created online. In local-only mode
/// there is no separate id space and the id equals the project name, so a
/// rename is a rekey rather than an update-by-id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(String);

impl ProjectId {
    /// Wraps an identifier string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id used for a project that only exists locally.
    #[must_use]
    pub fn local(name: &str) -> Self {
        Self(name.to_string())
    }

    /// Returns the string representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The authenticated identity that scopes remote projects and tasks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    /// Wraps an owner identifier string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the string representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OwnerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Display color of a project (e.g. `"#3b82f6"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColorToken(String);

impl ColorToken {
    /// Wraps a color string.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the color string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ColorToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A named project owning one task board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// Remote id, or the name in local-only mode.
    pub id: ProjectId,
    /// Display name, unique per owner.
    pub name: String,
    /// Assigned display color.
    pub color: ColorToken,
}

impl Project {
    /// Creates a project that has not (yet) been assigned a remote id.
    #[must_use]
    pub fn local(name: &str, color: ColorToken) -> Self {
        Self {
            id: ProjectId::local(name),
            name: name.to_string(),
            color,
        }
    }

    /// Returns `true` if the id is still the local (name-derived) one.
    #[must_use]
    pub fn is_local(&self) -> bool {
        self.id.as_str() == self.name
    }
}
