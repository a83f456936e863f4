//! Stable per-project display colors.
//!
//! Every existing project holds exactly one color. New projects draw
//! uniformly at random from the palette entries nobody is using; once the
//! palette is exhausted they draw from the full palette. A project keeps its
//! color until it is deleted, and a rename carries the color to the new name.

use std::collections::{BTreeMap, BTreeSet};

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;

use taskboard_model::project::ColorToken;

/// Color returned for a project that has none assigned.
pub const DEFAULT_COLOR: &str = "#64748b";

/// Palette used when none is configured.
pub const DEFAULT_PALETTE: [&str; 12] = [
    "#ef4444", "#f97316", "#f59e0b", "#84cc16", "#22c55e", "#14b8a6", "#06b6d4", "#3b82f6",
    "#6366f1", "#8b5cf6", "#d946ef", "#ec4899",
];

/// The fixed set of colors projects draw from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette(Vec<ColorToken>);

impl Palette {
    /// Build a palette from color strings. An empty list yields the default palette.
    pub fn new<I, S>(colors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let colors: Vec<ColorToken> = colors.into_iter().map(ColorToken::new).collect();
        if colors.is_empty() {
            Self::default()
        } else {
            Self(colors)
        }
    }

    /// The palette entries.
    #[must_use]
    pub fn colors(&self) -> &[ColorToken] {
        &self.0
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always `false`; a palette has at least one entry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self(DEFAULT_PALETTE.iter().map(|c| ColorToken::new(*c)).collect())
    }
}

/// Allocates and remembers project colors.
pub struct ColorManager {
    palette: Palette,
    assignments: BTreeMap<String, ColorToken>,
    rng: StdRng,
}

impl ColorManager {
    /// Create a manager drawing with OS-seeded randomness.
    #[must_use]
    pub fn new(palette: Palette) -> Self {
        Self::with_rng(palette, StdRng::from_os_rng())
    }

    /// Create a manager with a fixed seed, for reproducible draws.
    #[must_use]
    pub fn seeded(palette: Palette, seed: u64) -> Self {
        Self::with_rng(palette, StdRng::seed_from_u64(seed))
    }

    fn with_rng(palette: Palette, rng: StdRng) -> Self {
        Self {
            palette,
            assignments: BTreeMap::new(),
            rng,
        }
    }

    /// The palette in use.
    #[must_use]
    pub const fn palette(&self) -> &Palette {
        &self.palette
    }

    /// Current assignments keyed by project name.
    #[must_use]
    pub const fn assignments(&self) -> &BTreeMap<String, ColorToken> {
        &self.assignments
    }

    /// Replace all assignments (e.g. with the persisted map).
    pub fn restore(&mut self, assignments: BTreeMap<String, ColorToken>) {
        self.assignments = assignments;
    }

    /// Pin `name` to `color`, overriding any previous assignment.
    pub fn set(&mut self, name: &str, color: ColorToken) {
        self.assignments.insert(name.to_string(), color);
    }

    /// Reconcile assignments with the current project set.
    ///
    /// Prunes names no longer present and draws colors for names lacking
    /// one. Existing assignments are never redrawn. Returns `true` if
    /// anything changed.
    pub fn sync<'a>(&mut self, names: impl IntoIterator<Item = &'a str>) -> bool {
        let names: BTreeSet<&str> = names.into_iter().collect();
        let before = self.assignments.len();
        self.assignments.retain(|name, _| names.contains(name.as_str()));
        let mut changed = self.assignments.len() != before;

        for name in names {
            if !self.assignments.contains_key(name) {
                self.assign(name);
                changed = true;
            }
        }
        changed
    }

    /// Return the color of `name`, drawing one first if it has none.
    pub fn assign(&mut self, name: &str) -> ColorToken {
        if let Some(color) = self.assignments.get(name) {
            return color.clone();
        }
        let color = self.draw();
        self.assignments.insert(name.to_string(), color.clone());
        color
    }

    /// Move the assignment of `old` to `new` without redrawing.
    pub fn rekey(&mut self, old: &str, new: &str) {
        if let Some(color) = self.assignments.remove(old) {
            self.assignments.insert(new.to_string(), color);
        }
    }

    /// Drop the assignment of a deleted project.
    pub fn remove(&mut self, name: &str) {
        self.assignments.remove(name);
    }

    /// The assigned color, or [`DEFAULT_COLOR`] if `name` has none.
    #[must_use]
    pub fn color_for(&self, name: &str) -> ColorToken {
        self.assignments
            .get(name)
            .cloned()
            .unwrap_or_else(|| ColorToken::new(DEFAULT_COLOR))
    }

    fn draw(&mut self) -> ColorToken {
        let in_use: BTreeSet<&ColorToken> = self.assignments.values().collect();
        let unused: Vec<&ColorToken> = self
            .palette
            .colors()
            .iter()
            .filter(|c| !in_use.contains(c))
            .collect();

        let picked = if unused.is_empty() {
            self.palette.colors().choose(&mut self.rng)
        } else {
            unused.choose(&mut self.rng).copied()
        };
        picked
            .cloned()
            .unwrap_or_else(|| ColorToken::new(DEFAULT_COLOR))
    }
}
