// SPDX-FileCopyrightText: 2026 Tasklog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Small operator commands: the readonly gate, config pushes, the consumer
//! watermark, and data version remediation.

use std::io::IsTerminal;

use serde::Serialize;
use tasklog_config::TasklogConfig;
use tasklog_core::{DataVersion, StorageAdapter, Task, TaskId, TasklogError, VersionId};
use tasklog_storage::SqliteStorage;
use tracing::info;

/// Pretty-print `value` as JSON on stdout.
pub(crate) fn print_json<T: Serialize>(value: &T) -> Result<(), TasklogError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub async fn run_readonly(
    storage: &SqliteStorage,
    readonly: bool,
    plain: bool,
) -> Result<(), TasklogError> {
    let state = storage.set_readonly(readonly).await?;
    let label = if state.readonly { "readonly" } else { "writable" };
    if !plain && std::io::stdout().is_terminal() {
        use colored::Colorize;
        let label = if state.readonly {
            label.yellow()
        } else {
            label.green()
        };
        println!("task log is now {label}");
    } else {
        println!("task log is now {label}");
    }
    Ok(())
}

/// Append the `[cluster]` section as a CONFIG task.
pub async fn run_push_config(
    storage: &SqliteStorage,
    config: &TasklogConfig,
) -> Result<(), TasklogError> {
    let id = storage.append_config(config.cluster.to_payload()).await?;
    info!(task_id = id, uri = %config.cluster.uri, "configuration pushed");
    println!("configuration pushed as task {id}");
    Ok(())
}

pub async fn run_tasks(
    storage: &SqliteStorage,
    after: Option<TaskId>,
    limit: Option<i64>,
    json: bool,
) -> Result<(), TasklogError> {
    let tasks = storage.tasks_after(after, limit).await?;
    if json {
        print_json(&tasks)?;
        return Ok(());
    }
    if tasks.is_empty() {
        println!("no tasks");
        return Ok(());
    }
    println!(
        "{:>6}  {:<7} {:<22} {:<38} CREATED",
        "ID", "TYPE", "DATA TYPE", "RESOURCE"
    );
    for task in &tasks {
        println!("{}", format_task(task));
    }
    Ok(())
}

fn format_task(task: &Task) -> String {
    format!(
        "{:>6}  {:<7} {:<22} {:<38} {}",
        task.id,
        task.task_type.to_string(),
        task.data_type.map(|d| d.to_string()).unwrap_or_default(),
        task.resource_id.as_deref().unwrap_or(""),
        task.created_at
    )
}

/// Advance the consumer watermark.
pub async fn run_ack(storage: &SqliteStorage, task_id: TaskId) -> Result<(), TasklogError> {
    if storage.advance_watermark(task_id).await? {
        println!("watermark advanced to {task_id}");
    } else {
        let current = storage.data_state().await?.last_processed_task_id;
        println!(
            "watermark unchanged (already at {})",
            current.map_or_else(|| "-".to_string(), |id| id.to_string())
        );
    }
    Ok(())
}

pub async fn run_versions(
    storage: &SqliteStorage,
    json: bool,
    plain: bool,
) -> Result<(), TasklogError> {
    let versions = storage.list_versions().await?;
    if json {
        print_json(&versions)?;
        return Ok(());
    }
    if versions.is_empty() {
        println!("no data versions");
        return Ok(());
    }
    let active = storage.data_state().await?.active_version;
    let use_color = !plain && std::io::stdout().is_terminal();
    println!(
        "{:>4}  {:<10} {:<10} {:<6} {:<26} FINISHED",
        "ID", "SYNC", "TASKS", "STALE", "STARTED"
    );
    for version in &versions {
        let line = format_version(version);
        if Some(version.id) == active {
            if use_color {
                use colored::Colorize;
                println!("{} {}", line, "(active)".green());
            } else {
                println!("{line} (active)");
            }
        } else {
            println!("{line}");
        }
    }
    Ok(())
}

fn format_version(version: &DataVersion) -> String {
    let show = |s: Option<tasklog_core::VersionStatus>| {
        s.map_or_else(|| "-".to_string(), |s| s.to_string())
    };
    format!(
        "{:>4}  {:<10} {:<10} {:<6} {:<26} {}",
        version.id,
        show(version.sync_status),
        show(version.sync_tasks_status),
        if version.stale { "yes" } else { "no" },
        version.sync_started_at.as_deref().unwrap_or("-"),
        version.sync_finished_at.as_deref().unwrap_or("-"),
    )
}

pub async fn run_version_abort(storage: &SqliteStorage, id: VersionId) -> Result<(), TasklogError> {
    let version = storage.abort_version(id).await?;
    println!("data version {id} aborted ({})", format_version(&version).trim());
    Ok(())
}

pub async fn run_version_retire(
    storage: &SqliteStorage,
    id: VersionId,
) -> Result<(), TasklogError> {
    storage.retire_version(id).await?;
    println!("data version {id} retired");
    Ok(())
}
