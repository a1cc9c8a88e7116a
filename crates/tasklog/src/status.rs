// SPDX-FileCopyrightText: 2026 Tasklog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `tasklog status` command implementation.
//!
//! Reads the data state, the log tail, and the version registry to show
//! whether a resync could start right now and why not.

use std::io::IsTerminal;

use serde::Serialize;
use tasklog_config::TasklogConfig;
use tasklog_core::{DataVersion, StorageAdapter, TaskId, TasklogError, VersionId};
use tasklog_storage::SqliteStorage;

/// Structured status output for `--json` mode.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub database_path: String,
    pub readonly: bool,
    pub revision: i64,
    pub last_processed_task_id: Option<TaskId>,
    pub most_recent_task_id: Option<TaskId>,
    pub pending_tasks: usize,
    pub active_version: Option<VersionId>,
    pub latest_version: Option<DataVersion>,
    /// Human-readable reasons a resync would be refused; empty when ready.
    pub resync_blockers: Vec<String>,
}

/// Run the `tasklog status` command.
///
/// If `--json` is passed, outputs structured JSON for scripting.
/// If `--plain` is passed or stdout is not a TTY, disables colors.
pub async fn run_status(
    storage: &SqliteStorage,
    config: &TasklogConfig,
    json: bool,
    plain: bool,
) -> Result<(), TasklogError> {
    let response = collect_status(storage, config).await?;
    if json {
        crate::admin::print_json(&response)?;
    } else {
        let use_color = !plain && std::io::stdout().is_terminal();
        print_status(&response, use_color);
    }
    Ok(())
}

pub async fn collect_status(
    storage: &SqliteStorage,
    config: &TasklogConfig,
) -> Result<StatusResponse, TasklogError> {
    let state = storage.data_state().await?;
    let most_recent = storage.most_recent_task_id().await?;
    let pending = storage
        .tasks_after(state.last_processed_task_id, None)
        .await?
        .len();
    let latest_version = storage.list_versions().await?.into_iter().rev().find(|v| !v.stale);

    let mut resync_blockers = Vec::new();
    if let Some(version) = &latest_version {
        if version.states().blocks_resync() {
            resync_blockers.push(format!(
                "data version {} is {} (retire it with `tasklog version retire {}`)",
                version.id,
                describe_states(version),
                version.id
            ));
        }
    }
    if !state.readonly {
        resync_blockers.push("readonly gate is open".to_string());
    }
    if most_recent.is_some() && state.last_processed_task_id != most_recent {
        resync_blockers.push(format!("{pending} task(s) not yet processed by the cluster"));
    }

    Ok(StatusResponse {
        database_path: config.storage.database_path.clone(),
        readonly: state.readonly,
        revision: state.revision,
        last_processed_task_id: state.last_processed_task_id,
        most_recent_task_id: most_recent,
        pending_tasks: pending,
        active_version: state.active_version,
        latest_version,
        resync_blockers,
    })
}

fn describe_states(version: &DataVersion) -> String {
    let show = |s: Option<tasklog_core::VersionStatus>| {
        s.map_or_else(|| "-".to_string(), |s| s.to_string())
    };
    format!(
        "{}/{}",
        show(version.sync_status),
        show(version.sync_tasks_status)
    )
}

fn show_id(id: Option<i64>) -> String {
    id.map_or_else(|| "-".to_string(), |id| id.to_string())
}

/// Print status with optional colors.
fn print_status(status: &StatusResponse, use_color: bool) {
    println!();
    println!("  tasklog status");
    println!("  {}", "-".repeat(35));
    println!("    Database:  {}", status.database_path);

    let gate = if status.readonly { "readonly" } else { "writable" };
    if use_color {
        use colored::Colorize;
        let gate = if status.readonly {
            gate.yellow()
        } else {
            gate.green()
        };
        println!("    Gate:      {gate}");
    } else {
        println!("    Gate:      {gate}");
    }

    println!(
        "    Watermark: {} / {} ({} pending)",
        show_id(status.last_processed_task_id),
        show_id(status.most_recent_task_id),
        status.pending_tasks
    );
    println!("    Active:    {}", show_id(status.active_version));
    if let Some(version) = &status.latest_version {
        println!(
            "    Latest:    version {} ({})",
            version.id,
            describe_states(version)
        );
    }

    println!();
    if status.resync_blockers.is_empty() {
        if use_color {
            use colored::Colorize;
            println!("  {} ready to resync", "✓".green());
        } else {
            println!("  [OK] ready to resync");
        }
    } else {
        for blocker in &status.resync_blockers {
            if use_color {
                use colored::Colorize;
                println!("  {} {}", "✗".red(), blocker.red());
            } else {
                println!("  [BLOCKED] {blocker}");
            }
        }
    }
    println!();
}
