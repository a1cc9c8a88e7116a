// SPDX-FileCopyrightText: 2026 Tasklog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The data state singleton: consumer watermark, active version, readonly gate.
//!
//! Every change bumps `revision`, so a writer that acted on an earlier read
//! can detect that the row moved underneath it.
//!
//! The watermark is scoped to one log epoch. Truncating the log (flush or
//! resync) starts a new epoch, after which the previous watermark reads as
//! unset until the consumer acknowledges a task of the new log.

use rusqlite::{params, Transaction};
use tasklog_core::{DataState, TaskId, TasklogError, VersionId, VersionStatus};
use tracing::{debug, info};

use super::{data_versions, tasks, NOW};

/// Read the singleton row.
///
/// Fails with `InvalidState` when schema setup did not leave exactly one row.
pub fn get(tx: &Transaction<'_>) -> Result<DataState, TasklogError> {
    let mut stmt = tx.prepare(
        "SELECT id,
                CASE WHEN watermark_epoch = log_epoch THEN last_processed_task_id END,
                active_version, readonly, revision, updated_at
         FROM data_state ORDER BY id",
    )?;
    let mut rows = stmt
        .query_map([], |row| {
            Ok(DataState {
                id: row.get(0)?,
                last_processed_task_id: row.get(1)?,
                active_version: row.get(2)?,
                readonly: row.get(3)?,
                revision: row.get(4)?,
                updated_at: row.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    if rows.len() != 1 {
        return Err(TasklogError::InvalidState(format!(
            "expected exactly one data state row, found {}",
            rows.len()
        )));
    }
    Ok(rows.remove(0))
}

pub fn is_readonly(tx: &Transaction<'_>) -> Result<bool, TasklogError> {
    Ok(get(tx)?.readonly)
}

/// Open or close the readonly gate and return the updated row.
pub fn set_readonly(tx: &Transaction<'_>, readonly: bool) -> Result<DataState, TasklogError> {
    let state = get(tx)?;
    tx.execute(
        &format!(
            "UPDATE data_state SET readonly = ?1, revision = revision + 1, updated_at = {NOW}
             WHERE id = ?2"
        ),
        params![readonly, state.id],
    )?;
    info!(readonly, "readonly gate updated");
    get(tx)
}

/// Record that the consumer processed every task up to `task_id`.
///
/// Returns `false` without writing when `task_id` does not move the watermark
/// forward. The first acknowledgement after a truncate is accepted for any
/// task of the new log, normally the bootstrap task with id 1.
pub fn advance_watermark(tx: &Transaction<'_>, task_id: TaskId) -> Result<bool, TasklogError> {
    let state = get(tx)?;
    if tasks::get(tx, task_id)?.is_none() {
        return Err(TasklogError::TaskNotFound(task_id));
    }
    if state.last_processed_task_id.is_some_and(|current| task_id <= current) {
        debug!(
            task_id,
            current = ?state.last_processed_task_id,
            "watermark not advanced"
        );
        return Ok(false);
    }
    tx.execute(
        &format!(
            "UPDATE data_state
             SET last_processed_task_id = ?1, watermark_epoch = log_epoch,
                 revision = revision + 1, updated_at = {NOW}
             WHERE id = ?2"
        ),
        params![task_id, state.id],
    )?;
    debug!(task_id, "watermark advanced");
    Ok(true)
}

/// Point `active_version` at a completed version.
///
/// `expected_revision` is the revision the caller observed before deciding to
/// promote; a mismatch fails with `StaleDataState` and writes nothing.
pub fn promote_active_version(
    tx: &Transaction<'_>,
    version_id: VersionId,
    expected_revision: i64,
) -> Result<DataState, TasklogError> {
    let version = data_versions::get(tx, version_id)?;
    if version.sync_status != Some(VersionStatus::Completed) {
        return Err(TasklogError::InvalidState(format!(
            "data version {version_id} is not completed and cannot become active"
        )));
    }
    let state = get(tx)?;
    let updated = tx.execute(
        &format!(
            "UPDATE data_state
             SET active_version = ?1, revision = revision + 1, updated_at = {NOW}
             WHERE id = ?2 AND revision = ?3"
        ),
        params![version_id, state.id, expected_revision],
    )?;
    if updated == 0 {
        return Err(TasklogError::StaleDataState {
            expected: expected_revision,
            found: state.revision,
        });
    }
    info!(version = version_id, "data version promoted to active");
    get(tx)
}
