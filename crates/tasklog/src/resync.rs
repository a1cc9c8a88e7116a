// SPDX-FileCopyrightText: 2026 Tasklog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `tasklog resync`, `tasklog flush`, and `tasklog import`.

use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tasklog_config::TasklogConfig;
use tasklog_core::TasklogError;
use tasklog_storage::SqliteStorage;
use tasklog_sync::{ProgressObserver, ResyncOrchestrator, ResyncPhase};

use crate::shutdown::install_signal_handler;

/// Spinner on an interactive stderr, hidden otherwise.
fn create_spinner(message: &str, plain: bool) -> ProgressBar {
    if plain || !std::io::stderr().is_terminal() {
        return ProgressBar::hidden();
    }
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

/// Run the `tasklog resync` command.
///
/// SIGINT or SIGTERM before the rebuild commits aborts the new version and
/// leaves the previous log in place.
pub async fn run_resync(
    storage: &SqliteStorage,
    config: &TasklogConfig,
    plain: bool,
) -> Result<(), TasklogError> {
    let cancel = install_signal_handler();
    let spinner = create_spinner("checking preconditions", plain);
    let progress = spinner.clone();
    let observer: ProgressObserver = Arc::new(move |phase: &ResyncPhase| {
        progress.set_message(phase.to_string());
    });

    let orchestrator =
        ResyncOrchestrator::new(storage.database()?.clone()).with_observer(observer);
    match orchestrator
        .resync(config.cluster.to_payload(), &cancel)
        .await
    {
        Ok(report) => {
            spinner.finish_and_clear();
            println!(
                "data version {} active: {} tasks written (ids 1..={}), {} removed",
                report.version, report.tasks_written, report.last_task_id, report.tasks_removed
            );
            for (kind, count) in report.rows_by_kind.iter().filter(|(_, n)| *n > 0) {
                println!("  {kind:<20} {count}");
            }
            Ok(())
        }
        Err(e) => {
            spinner.abandon_with_message(format!("resync failed: {e}"));
            Err(e)
        }
    }
}

/// Run the `tasklog flush` command.
pub async fn run_flush(storage: &SqliteStorage) -> Result<(), TasklogError> {
    let id = tasklog_sync::flush(storage.database()?).await?;
    println!("task log flushed; bootstrap task {id}");
    Ok(())
}

/// Run the `tasklog import` command.
pub async fn run_import(storage: &SqliteStorage, plain: bool) -> Result<(), TasklogError> {
    let cancel = install_signal_handler();
    let spinner = create_spinner("importing control-plane entities", plain);
    let result = tasklog_sync::import(storage.database()?, &cancel).await;
    spinner.finish_and_clear();
    let report = result?;
    match report.last_task_id {
        Some(tail) if report.tasks_written > 0 => println!(
            "imported {} entities as transaction {} (tail {tail})",
            report.tasks_written, report.transaction_id
        ),
        _ => println!("nothing to import"),
    }
    Ok(())
}
