// SPDX-FileCopyrightText: 2026 Tasklog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Checks that must hold before a resync may register a version.

use rusqlite::Transaction;
use tasklog_core::{DataState, TasklogError};
use tasklog_storage::queries::{data_state, data_versions, tasks};
use tracing::debug;

/// Validate the resync preconditions inside the caller's transaction.
///
/// In order:
/// 1. the latest live version has no phase that is set and not COMPLETED,
/// 2. the readonly gate is closed,
/// 3. the consumer watermark equals the log tail (an empty log passes).
///
/// Returns the data state that was checked, for a later revision comparison.
pub fn check(tx: &Transaction<'_>) -> Result<DataState, TasklogError> {
    if let Some(version) = data_versions::latest_live(tx)? {
        if version.states().blocks_resync() {
            return Err(TasklogError::ConcurrentResync {
                version: version.id,
                sync_status: version.sync_status,
                sync_tasks_status: version.sync_tasks_status,
            });
        }
    }

    let state = data_state::get(tx)?;
    if !state.readonly {
        return Err(TasklogError::NotReadOnly);
    }

    if let Some(most_recent) = tasks::most_recent_id(tx)? {
        if state.last_processed_task_id != Some(most_recent) {
            return Err(TasklogError::PendingTasks {
                last_processed: state.last_processed_task_id,
                most_recent,
            });
        }
    }

    debug!(revision = state.revision, "resync preconditions hold");
    Ok(state)
}
