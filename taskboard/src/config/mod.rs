//! Configuration system for the `Taskboard` client.
//!
//! Supports layered configuration with the following priority (highest first):
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`~/.config/taskboard/config.toml`)
//! 4. Compiled defaults
//!
//! Missing config file is not an error (defaults are used). An explicit
//! `--config` path that doesn't exist is an error.

use std::path::PathBuf;
use std::time::Duration;

use crate::colors::Palette;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),

    /// Could not determine the user's data directory.
    #[error("could not determine data directory (no HOME or XDG_DATA_HOME)")]
    NoDataDir,
}

// ---------------------------------------------------------------------------
// TOML file structs (all fields Option for partial overrides)
// ---------------------------------------------------------------------------

/// Top-level TOML config file structure.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ConfigFile {
    storage: StorageFileConfig,
    sync: SyncFileConfig,
    board: BoardFileConfig,
}

/// `[storage]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct StorageFileConfig {
    data_dir: Option<PathBuf>,
}

/// `[sync]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct SyncFileConfig {
    owner_id: Option<String>,
    online: Option<bool>,
    drag_cooldown_ms: Option<u64>,
    remote_timeout_secs: Option<u64>,
    event_buffer: Option<usize>,
}

/// `[board]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct BoardFileConfig {
    bootstrap_project: Option<String>,
    welcome_task: Option<String>,
    palette: Option<Vec<String>>,
}

// ---------------------------------------------------------------------------
// Resolved configuration (concrete types, all fields populated)
// ---------------------------------------------------------------------------

/// Sync engine configuration (used by `SyncEngine`).
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Window during which a second move/reorder on the same board is dropped.
    pub drag_cooldown: Duration,
    /// Upper bound for every remote call.
    pub remote_timeout: Duration,
    /// Capacity of the engine event broadcast channel.
    pub event_buffer: usize,
    /// Name of the project seeded with a welcome task.
    pub bootstrap_project: String,
    /// Name of the welcome task.
    pub welcome_task: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            drag_cooldown: Duration::from_millis(300),
            remote_timeout: Duration::from_secs(10),
            event_buffer: 64,
            bootstrap_project: "My Tasks".to_string(),
            welcome_task: "Welcome! Drag me to another column.".to_string(),
        }
    }
}

/// Fully resolved client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    // -- Storage --
    /// Directory holding the durable local store.
    pub data_dir: Option<PathBuf>,

    // -- Session --
    /// Authenticated owner; `None` runs local-only.
    pub owner_id: Option<String>,
    /// Connectivity signal.
    pub online: bool,

    // -- Engine --
    /// Sync engine settings.
    pub sync: SyncConfig,
    /// Project color palette.
    pub palette: Palette,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            owner_id: None,
            online: true,
            sync: SyncConfig::default(),
            palette: Palette::default(),
        }
    }
}

impl ClientConfig {
    /// Load configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// CLI args and env vars are parsed via `clap`. If `--config` is given
    /// and the file does not exist, returns an error. If no `--config` is
    /// given, the default path (`~/.config/taskboard/config.toml`) is tried
    /// and silently ignored if missing.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the explicit config file cannot be read
    /// or parsed.
    pub fn load(cli: &CliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Ok(Self::resolve(cli, &file))
    }

    /// Resolve a `ClientConfig` from CLI args and a parsed config file.
    ///
    /// Priority: CLI > file > default.
    #[must_use]
    fn resolve(cli: &CliArgs, file: &ConfigFile) -> Self {
        let defaults = Self::default();

        Self {
            data_dir: cli
                .data_dir
                .clone()
                .or_else(|| file.storage.data_dir.clone()),
            owner_id: cli.owner.clone().or_else(|| file.sync.owner_id.clone()),
            online: if cli.offline {
                false
            } else {
                file.sync.online.unwrap_or(defaults.online)
            },
            sync: SyncConfig {
                drag_cooldown: file
                    .sync
                    .drag_cooldown_ms
                    .map_or(defaults.sync.drag_cooldown, Duration::from_millis),
                remote_timeout: file
                    .sync
                    .remote_timeout_secs
                    .map_or(defaults.sync.remote_timeout, Duration::from_secs),
                event_buffer: file
                    .sync
                    .event_buffer
                    .unwrap_or(defaults.sync.event_buffer),
                bootstrap_project: file
                    .board
                    .bootstrap_project
                    .clone()
                    .unwrap_or(defaults.sync.bootstrap_project),
                welcome_task: file
                    .board
                    .welcome_task
                    .clone()
                    .unwrap_or(defaults.sync.welcome_task),
            },
            palette: file
                .board
                .palette
                .clone()
                .map_or(defaults.palette, Palette::new),
        }
    }

    /// The directory for the durable local store: configured, or
    /// `<data dir>/taskboard`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoDataDir`] if nothing is configured and the
    /// platform data directory cannot be determined.
    pub fn resolved_data_dir(&self) -> Result<PathBuf, ConfigError> {
        if let Some(dir) = &self.data_dir {
            return Ok(dir.clone());
        }
        dirs::data_dir()
            .map(|d| d.join("taskboard"))
            .ok_or(ConfigError::NoDataDir)
    }
}

/// CLI arguments parsed by clap.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "Local-first task board")]
pub struct CliArgs {
    /// Directory of the local store.
    #[arg(long, env = "TASKBOARD_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Authenticated owner id (omit for local-only mode).
    #[arg(long, env = "TASKBOARD_OWNER")]
    pub owner: Option<String>,

    /// Treat the session as offline.
    #[arg(long)]
    pub offline: bool,

    /// Path to config file (default: `~/.config/taskboard/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "TASKBOARD_LOG")]
    pub log_level: String,

    /// Path to log file (default: `$TMPDIR/taskboard.log`).
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// What to do (default: list projects).
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Board commands understood by the CLI.
#[derive(clap::Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// List projects with their colors and task counts.
    Projects,
    /// Show the sync status and connectivity.
    Status,
    /// Create a project.
    AddProject {
        /// Project name.
        name: String,
    },
    /// Rename a project, keeping its tasks and color.
    RenameProject {
        /// Current name.
        old: String,
        /// New name.
        new: String,
    },
    /// Delete a project and all its tasks.
    DeleteProject {
        /// Project name.
        name: String,
    },
    /// Select the active project.
    Use {
        /// Project name.
        name: String,
    },
    /// Print a project's color.
    Color {
        /// Project name.
        name: String,
    },
    /// Show a project's board (default: the active project).
    Board {
        /// Project name.
        project: Option<String>,
    },
    /// Add a task to the pending column.
    AddTask {
        /// Project name.
        project: String,
        /// Task name.
        name: String,
        /// Task description.
        #[arg(long, default_value = "")]
        description: String,
        /// Priority (low, normal, medium, high).
        #[arg(long, default_value = "normal")]
        priority: String,
        /// Due date (YYYY-MM-DD).
        #[arg(long)]
        due: Option<String>,
    },
    /// Move a task to another column.
    MoveTask {
        /// Project name.
        project: String,
        /// Task id or unique id prefix.
        task: String,
        /// Target column (pending, in-progress, completed).
        column: String,
        /// Insert position within the target column (default: end).
        #[arg(long)]
        index: Option<usize>,
    },
    /// Delete a task.
    DeleteTask {
        /// Project name.
        project: String,
        /// Task id or unique id prefix.
        task: String,
    },
    /// Remove every task from a project.
    Clear {
        /// Project name.
        project: String,
    },
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Load and parse a TOML config file.
///
/// If `explicit_path` is `Some`, the file must exist (error if not).
/// If `explicit_path` is `None`, the default path is tried and missing file
/// is treated as empty config.
fn load_config_file(explicit_path: Option<&std::path::Path>) -> Result<ConfigFile, ConfigError> {
    let path = if let Some(p) = explicit_path {
        let contents = std::fs::read_to_string(p).map_err(|e| ConfigError::ReadFile {
            path: p.to_path_buf(),
            source: e,
        })?;
        return Ok(toml::from_str(&contents)?);
    } else {
        let Some(config_dir) = dirs::config_dir() else {
            return Ok(ConfigFile::default());
        };
        config_dir.join("taskboard").join("config.toml")
    };

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}
