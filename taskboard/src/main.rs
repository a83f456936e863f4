//! `Taskboard`: local-first task board.
//!
//! Runs one board command against the durable Local Store and exits.
//! Configuration via CLI flags, environment variables, or config file
//! (`~/.config/taskboard/config.toml`).
//!
//! ```bash
//! # List projects
//! cargo run --bin taskboard
//!
//! # Add a task and move it along
//! cargo run --bin taskboard -- add-task "My Tasks" "Write report" --priority high
//! cargo run --bin taskboard -- move-task "My Tasks" 0190 in-progress
//!
//! # Use a scratch store
//! TASKBOARD_DATA_DIR=/tmp/tb cargo run --bin taskboard -- board
//! ```

use std::path::Path;
use std::process::ExitCode;

use chrono::NaiveDate;
use clap::Parser;
use tracing_appender::non_blocking::WorkerGuard;

use taskboard::config::{CliArgs, ClientConfig, Command, ConfigError};
use taskboard::remote::Disconnected;
use taskboard::store::{FileBackend, LocalStore};
use taskboard::sync::{LoadOutcome, MoveOutcome, ProjectNameError, SyncEngine};
use taskboard_model::board::{BoardError, TaskBoard};
use taskboard_model::project::OwnerId;
use taskboard_model::task::{Column, Priority, TaskDraft, TaskId};

type Engine = SyncEngine<Disconnected, FileBackend>;

/// Errors reported to the user before exiting non-zero.
#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Project(#[from] ProjectNameError),
    #[error(transparent)]
    Board(#[from] BoardError),
    #[error("{0}")]
    Usage(String),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = CliArgs::parse();

    let config = match ClientConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Warning: failed to load config file: {e}");
            ClientConfig::default()
        }
    };

    // Logs go to a file; stdout is for command output.
    let _log_guard = init_logging(&cli.log_level, cli.log_file.as_deref());

    tracing::info!("taskboard starting");

    match run(cli.command.unwrap_or(Command::Projects), &config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initialize file-based logging.
///
/// Logs are written to the specified file path or `$TMPDIR/taskboard.log`.
/// Returns a guard that must be held for the lifetime of the program to
/// ensure logs are flushed.
fn init_logging(level: &str, file_path: Option<&Path>) -> Option<WorkerGuard> {
    let default_path = std::env::temp_dir().join("taskboard.log");
    let log_path = file_path.unwrap_or(&default_path);

    let log_dir = log_path.parent()?;
    let file_name = log_path.file_name()?.to_str()?;

    let file_appender = tracing_appender::rolling::never(log_dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(env_filter)
        .with_ansi(false)
        .init();

    Some(guard)
}

async fn run(command: Command, config: &ClientConfig) -> Result<(), CliError> {
    let data_dir = config.resolved_data_dir()?;
    let local = LocalStore::open(FileBackend::new(&data_dir));
    let engine = SyncEngine::new(
        Disconnected,
        local,
        config.sync.clone(),
        config.palette.clone(),
    );

    let owner = config.owner_id.clone().map(OwnerId::new);
    if engine.load(owner, config.online).await == LoadOutcome::Fallback {
        eprintln!("warning: remote unavailable, working from the local store");
    }
    if !engine.local().is_durable() {
        eprintln!(
            "warning: {} is not writable, changes last for this run only",
            data_dir.display()
        );
    }

    let outcome = execute(&engine, command).await;
    engine.settle().await;
    engine.shutdown();
    outcome
}

async fn execute(engine: &Engine, command: Command) -> Result<(), CliError> {
    match command {
        Command::Projects => print_projects(engine),
        Command::Status => {
            println!("status: {}", engine.sync_status());
            println!("online: {}", engine.is_online());
            match engine.owner() {
                Some(owner) => println!("owner:  {owner}"),
                None => println!("owner:  (local only)"),
            }
        }
        Command::AddProject { name } => {
            engine.add_project(&name).await?;
            println!("added project {}", name.trim());
        }
        Command::RenameProject { old, new } => {
            engine.rename_project(&old, &new).await?;
            println!("renamed {old} -> {}", new.trim());
        }
        Command::DeleteProject { name } => {
            engine.delete_project(&name).await?;
            println!("deleted project {name}");
        }
        Command::Use { name } => {
            engine.set_active_project(Some(&name))?;
            println!("active project: {name}");
        }
        Command::Color { name } => {
            if !engine.project_names().contains(&name) {
                return Err(ProjectNameError::NotFound(name).into());
            }
            println!("{}", engine.color_for(&name));
        }
        Command::Board { project } => {
            let project = project
                .or_else(|| engine.active_project())
                .ok_or_else(|| CliError::Usage("no active project; name one".to_string()))?;
            let board = engine
                .board(&project)
                .ok_or_else(|| BoardError::ProjectNotFound(project.clone()))?;
            print_board(&project, &board);
        }
        Command::AddTask {
            project,
            name,
            description,
            priority,
            due,
        } => {
            let priority: Priority = priority
                .parse()
                .map_err(|e| CliError::Usage(format!("priority: {e}")))?;
            let due_date = due
                .map(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d"))
                .transpose()
                .map_err(|e| CliError::Usage(format!("due date: {e}")))?;
            let draft = TaskDraft {
                name,
                description,
                due_date,
                priority,
                ..TaskDraft::default()
            };
            let id = engine.add_task(&project, draft)?;
            println!("{id}");
        }
        Command::MoveTask {
            project,
            task,
            column,
            index,
        } => {
            let to: Column = column
                .parse()
                .map_err(|e| CliError::Usage(format!("column: {e}")))?;
            let id = resolve_task(engine, &project, &task)?;
            match engine.move_task(&project, &id, to, index)? {
                MoveOutcome::Applied => println!("moved to {to}"),
                MoveOutcome::Debounced => println!("ignored: board is still settling"),
            }
        }
        Command::DeleteTask { project, task } => {
            let id = resolve_task(engine, &project, &task)?;
            engine.delete_task(&project, &id)?;
            println!("deleted {id}");
        }
        Command::Clear { project } => {
            engine.clear_tasks(&project)?;
            println!("cleared {project}");
        }
    }
    Ok(())
}

/// Find the task whose id is `needle` or starts with it.
fn resolve_task(engine: &Engine, project: &str, needle: &str) -> Result<TaskId, CliError> {
    let board = engine
        .board(project)
        .ok_or_else(|| BoardError::ProjectNotFound(project.to_string()))?;
    let matches: Vec<&TaskId> = board
        .iter()
        .map(|(_, t)| &t.id)
        .filter(|id| id.to_string().starts_with(needle))
        .collect();
    match matches.as_slice() {
        [id] => Ok((*id).clone()),
        [] => Err(CliError::Usage(format!("no task matches {needle}"))),
        _ => Err(CliError::Usage(format!(
            "{} tasks match {needle}; use a longer prefix",
            matches.len()
        ))),
    }
}

fn print_projects(engine: &Engine) {
    let active = engine.active_project();
    let boards = engine.project_tasks();
    for project in engine.projects() {
        let marker = if active.as_deref() == Some(project.name.as_str()) {
            '*'
        } else {
            ' '
        };
        let count = boards.get(&project.name).map_or(0, TaskBoard::len);
        println!(
            "{marker} {:<24} {}  {count} task(s)",
            project.name,
            engine.color_for(&project.name)
        );
    }
}

fn print_board(project: &str, board: &TaskBoard) {
    println!("{project}");
    for column in Column::ALL {
        let tasks = board.column(column);
        println!("  {column} ({})", tasks.len());
        for task in tasks {
            let id = task.id.to_string();
            let due = task
                .due_date
                .map(|d| format!("  due {d}"))
                .unwrap_or_default();
            println!(
                "    {}  {} [{}]{due}",
                id.get(..8).unwrap_or(&id),
                task.name,
                task.priority
            );
        }
    }
}
