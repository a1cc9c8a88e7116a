// SPDX-FileCopyrightText: 2026 Tasklog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tasklog - operator CLI for the task-log synchronization engine.
//!
//! This is the binary entry point. Every command opens the configured
//! database, runs one operation, and exits.

mod admin;
mod resync;
mod shutdown;
mod status;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use tasklog_config::{ConfigError, TasklogConfig};
use tasklog_core::{PluginAdapter, StorageAdapter, TaskId, TasklogError, VersionId};
use tasklog_storage::SqliteStorage;
use tracing::{error, warn};

/// Tasklog - rebuild and inspect the task log consumed by the cluster.
#[derive(Parser, Debug)]
#[command(name = "tasklog", version, about, long_about = None)]
struct Cli {
    /// Configuration file to use instead of the standard search path.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Disable colors and progress spinners.
    #[arg(long, global = true)]
    plain: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Show the data state, the latest data version, and consumer lag.
    Status {
        /// Output JSON for scripting.
        #[arg(long)]
        json: bool,
    },
    /// Open or close the readonly gate.
    Readonly {
        #[arg(value_enum)]
        state: GateState,
    },
    /// Rebuild the task log from the entity tables under a new data version.
    Resync,
    /// Truncate the task log behind a bootstrap FLUSH task.
    Flush,
    /// Append a CREATE task for every live entity.
    Import,
    /// Append the [cluster] configuration as a CONFIG task.
    PushConfig,
    /// List tasks after a watermark, oldest first.
    Tasks {
        /// Only tasks with an id greater than this.
        #[arg(long)]
        after: Option<TaskId>,
        /// Maximum number of tasks to print.
        #[arg(long)]
        limit: Option<i64>,
        /// Output JSON for scripting.
        #[arg(long)]
        json: bool,
    },
    /// Acknowledge every task up to and including TASK_ID.
    Ack { task_id: TaskId },
    /// List data versions.
    Versions {
        /// Output JSON for scripting.
        #[arg(long)]
        json: bool,
    },
    /// Remediate a single data version.
    Version {
        #[command(subcommand)]
        command: VersionCommand,
    },
}

#[derive(Subcommand, Debug)]
enum VersionCommand {
    /// Mark the STARTED phases of a version ABORTED.
    Abort { id: VersionId },
    /// Mark a failed version stale so it stops blocking resyncs.
    Retire { id: VersionId },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum GateState {
    On,
    Off,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(errors) => {
            tasklog_config::render_errors(&errors);
            std::process::exit(2);
        }
    };

    init_tracing(&config.log.level);

    if let Err(e) = run(cli, &config).await {
        error!(error = %e, "command failed");
        eprintln!("error: {e}");
        std::process::exit(exit_code(&e));
    }
}

fn load_config(path: Option<&Path>) -> Result<TasklogConfig, Vec<ConfigError>> {
    match path {
        Some(path) if !path.is_file() => Err(vec![ConfigError::Other(format!(
            "configuration file {} does not exist",
            path.display()
        ))]),
        Some(path) => tasklog_config::load_and_validate_path(path),
        None => tasklog_config::load_and_validate(),
    }
}

async fn run(cli: Cli, config: &TasklogConfig) -> Result<(), TasklogError> {
    let storage = SqliteStorage::new(config.storage.clone());
    storage.initialize().await?;

    let plain = cli.plain;
    let result = match cli.command {
        Commands::Status { json } => status::run_status(&storage, config, json, plain).await,
        Commands::Readonly { state } => {
            admin::run_readonly(&storage, state == GateState::On, plain).await
        }
        Commands::Resync => resync::run_resync(&storage, config, plain).await,
        Commands::Flush => resync::run_flush(&storage).await,
        Commands::Import => resync::run_import(&storage, plain).await,
        Commands::PushConfig => admin::run_push_config(&storage, config).await,
        Commands::Tasks { after, limit, json } => {
            admin::run_tasks(&storage, after, limit, json).await
        }
        Commands::Ack { task_id } => admin::run_ack(&storage, task_id).await,
        Commands::Versions { json } => admin::run_versions(&storage, json, plain).await,
        Commands::Version {
            command: VersionCommand::Abort { id },
        } => admin::run_version_abort(&storage, id).await,
        Commands::Version {
            command: VersionCommand::Retire { id },
        } => admin::run_version_retire(&storage, id).await,
    };

    if let Err(e) = storage.shutdown().await {
        warn!(error = %e, "storage shutdown failed");
    }
    result
}

/// 3 for a refused precondition, 130 for cancellation, 1 otherwise.
fn exit_code(e: &TasklogError) -> i32 {
    if e.is_precondition() {
        3
    } else if matches!(e, TasklogError::Cancelled) {
        130
    } else {
        1
    }
}

/// Initialize the tracing subscriber with an env filter.
///
/// Logs go to stderr so `--json` output on stdout stays parseable.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("tasklog={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_nested_version_commands() {
        let cli = Cli::try_parse_from(["tasklog", "version", "retire", "4"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Version {
                command: VersionCommand::Retire { id: 4 }
            }
        ));
    }

    #[test]
    fn parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "tasklog", "tasks", "--after", "5", "--limit", "10", "--json", "--config", "x.toml",
        ])
        .unwrap();
        assert_eq!(cli.config.as_deref(), Some(Path::new("x.toml")));
        assert!(matches!(
            cli.command,
            Commands::Tasks {
                after: Some(5),
                limit: Some(10),
                json: true
            }
        ));
    }

    #[test]
    fn readonly_requires_on_or_off() {
        assert!(Cli::try_parse_from(["tasklog", "readonly", "maybe"]).is_err());
        let cli = Cli::try_parse_from(["tasklog", "readonly", "off"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Readonly {
                state: GateState::Off
            }
        ));
    }

    #[test]
    fn missing_config_file_is_reported() {
        let errors = load_config(Some(Path::new("/nonexistent/tasklog.toml"))).unwrap_err();
        assert!(matches!(&errors[0], ConfigError::Other(msg) if msg.contains("does not exist")));
    }

    #[test]
    fn exit_codes_distinguish_refusals() {
        assert_eq!(exit_code(&TasklogError::NotReadOnly), 3);
        assert_eq!(exit_code(&TasklogError::Cancelled), 130);
        assert_eq!(exit_code(&TasklogError::TaskNotFound(9)), 1);
    }
}
