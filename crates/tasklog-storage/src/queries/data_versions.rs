// SPDX-FileCopyrightText: 2026 Tasklog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Data version registry: one row per resync attempt.

use rusqlite::{params, OptionalExtension, Row, Transaction};
use tasklog_core::{DataVersion, TasklogError, VersionId, VersionStates, VersionStatus};
use tracing::{info, warn};

use super::NOW;

const VERSION_COLUMNS: &str =
    "id, sync_started_at, sync_finished_at, sync_status, sync_tasks_status, stale";

fn row_to_version(row: &Row<'_>) -> rusqlite::Result<DataVersion> {
    Ok(DataVersion {
        id: row.get(0)?,
        sync_started_at: row.get(1)?,
        sync_finished_at: row.get(2)?,
        sync_status: row.get(3)?,
        sync_tasks_status: row.get(4)?,
        stale: row.get(5)?,
    })
}

fn check_transition(
    version: &DataVersion,
    from: Option<VersionStatus>,
    to: VersionStatus,
) -> Result<(), TasklogError> {
    if VersionStatus::can_transition(from, to) {
        Ok(())
    } else {
        Err(TasklogError::InvalidTransition {
            version: version.id,
            from,
            to,
        })
    }
}

/// Register a new attempt with both phases STARTED.
///
/// Refuses with `ConcurrentResync` while any version is STARTED.
pub fn begin(tx: &Transaction<'_>) -> Result<VersionId, TasklogError> {
    let in_flight = tx
        .query_row(
            &format!(
                "SELECT {VERSION_COLUMNS} FROM data_versions
                 WHERE sync_status = 'STARTED' OR sync_tasks_status = 'STARTED'
                 ORDER BY id DESC LIMIT 1"
            ),
            [],
            row_to_version,
        )
        .optional()?;
    if let Some(version) = in_flight {
        return Err(TasklogError::ConcurrentResync {
            version: version.id,
            sync_status: version.sync_status,
            sync_tasks_status: version.sync_tasks_status,
        });
    }
    tx.execute(
        &format!(
            "INSERT INTO data_versions (sync_started_at, sync_status, sync_tasks_status, stale)
             VALUES ({NOW}, ?1, ?1, 0)"
        ),
        params![VersionStatus::Started],
    )?;
    let id = tx.last_insert_rowid();
    info!(version = id, "data version registered");
    Ok(id)
}

/// Mark both phases COMPLETED and every other live version stale.
pub fn complete(tx: &Transaction<'_>, id: VersionId) -> Result<DataVersion, TasklogError> {
    let version = get(tx, id)?;
    check_transition(&version, version.sync_status, VersionStatus::Completed)?;
    check_transition(&version, version.sync_tasks_status, VersionStatus::Completed)?;
    tx.execute(
        &format!(
            "UPDATE data_versions
             SET sync_status = ?1, sync_tasks_status = ?1, sync_finished_at = {NOW}
             WHERE id = ?2"
        ),
        params![VersionStatus::Completed, id],
    )?;
    let superseded = tx.execute(
        "UPDATE data_versions SET stale = 1 WHERE id != ?1 AND stale = 0",
        params![id],
    )?;
    info!(version = id, superseded, "data version completed");
    get(tx, id)
}

/// Move every STARTED phase of `id` to ERROR.
pub fn error(tx: &Transaction<'_>, id: VersionId) -> Result<DataVersion, TasklogError> {
    finish_started(tx, id, VersionStatus::Error)
}

/// Move every STARTED phase of `id` to ABORTED.
pub fn abort(tx: &Transaction<'_>, id: VersionId) -> Result<DataVersion, TasklogError> {
    finish_started(tx, id, VersionStatus::Aborted)
}

fn finish_started(
    tx: &Transaction<'_>,
    id: VersionId,
    to: VersionStatus,
) -> Result<DataVersion, TasklogError> {
    let version = get(tx, id)?;
    let started = Some(VersionStatus::Started);
    if version.sync_status != started && version.sync_tasks_status != started {
        return Err(TasklogError::InvalidTransition {
            version: id,
            from: version.sync_status,
            to,
        });
    }
    tx.execute(
        &format!(
            "UPDATE data_versions
             SET sync_status = CASE WHEN sync_status = 'STARTED' THEN ?1 ELSE sync_status END,
                 sync_tasks_status =
                     CASE WHEN sync_tasks_status = 'STARTED' THEN ?1 ELSE sync_tasks_status END,
                 sync_finished_at = {NOW}
             WHERE id = ?2"
        ),
        params![to, id],
    )?;
    warn!(version = id, status = %to, "data version ended without completing");
    get(tx, id)
}

pub fn states_of(tx: &Transaction<'_>, id: VersionId) -> Result<VersionStates, TasklogError> {
    Ok(get(tx, id)?.states())
}

pub fn find(tx: &Transaction<'_>, id: VersionId) -> Result<Option<DataVersion>, TasklogError> {
    Ok(tx
        .query_row(
            &format!("SELECT {VERSION_COLUMNS} FROM data_versions WHERE id = ?1"),
            params![id],
            row_to_version,
        )
        .optional()?)
}

/// Like [`find`], failing with `VersionNotFound` for an unknown id.
pub fn get(tx: &Transaction<'_>, id: VersionId) -> Result<DataVersion, TasklogError> {
    find(tx, id)?.ok_or(TasklogError::VersionNotFound(id))
}

/// Every version, oldest first.
pub fn list(tx: &Transaction<'_>) -> Result<Vec<DataVersion>, TasklogError> {
    let mut stmt = tx.prepare(&format!(
        "SELECT {VERSION_COLUMNS} FROM data_versions ORDER BY id ASC"
    ))?;
    let rows = stmt.query_map([], row_to_version)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// The most recent version that has not been superseded or retired.
pub fn latest_live(tx: &Transaction<'_>) -> Result<Option<DataVersion>, TasklogError> {
    Ok(tx
        .query_row(
            &format!(
                "SELECT {VERSION_COLUMNS} FROM data_versions
                 WHERE stale = 0 ORDER BY id DESC LIMIT 1"
            ),
            [],
            row_to_version,
        )
        .optional()?)
}

/// Mark a failed version stale so it no longer blocks a resync.
///
/// Only versions whose phases all ended (at least one in ERROR or ABORTED)
/// can be retired. Retiring an already stale version is a no-op.
pub fn retire(tx: &Transaction<'_>, id: VersionId) -> Result<DataVersion, TasklogError> {
    let version = get(tx, id)?;
    if version.stale {
        return Ok(version);
    }
    let phases = [version.sync_status, version.sync_tasks_status];
    if phases.contains(&Some(VersionStatus::Started)) {
        return Err(TasklogError::InvalidState(format!(
            "data version {id} is still in progress; abort it before retiring"
        )));
    }
    if !phases.iter().flatten().any(|status| status.is_failure()) {
        return Err(TasklogError::InvalidState(format!(
            "data version {id} did not fail and cannot be retired"
        )));
    }
    tx.execute(
        "UPDATE data_versions SET stale = 1 WHERE id = ?1",
        params![id],
    )?;
    info!(version = id, "data version retired");
    get(tx, id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;

    #[tokio::test]
    async fn begin_starts_both_phases() {
        let db = Database::open_in_memory().await.unwrap();
        let version = db
            .write(|tx| {
                let id = begin(tx)?;
                get(tx, id)
            })
            .await
            .unwrap();
        assert_eq!(version.sync_status, Some(VersionStatus::Started));
        assert_eq!(version.sync_tasks_status, Some(VersionStatus::Started));
        assert!(version.sync_started_at.is_some());
        assert!(version.sync_finished_at.is_none());
        assert!(!version.stale);
    }

    #[tokio::test]
    async fn second_begin_is_concurrent_resync() {
        let db = Database::open_in_memory().await.unwrap();
        db.write(begin).await.unwrap();
        let err = db.write(begin).await.unwrap_err();
        assert!(matches!(
            err,
            TasklogError::ConcurrentResync {
                version: 1,
                sync_status: Some(VersionStatus::Started),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn complete_marks_previous_versions_stale() {
        let db = Database::open_in_memory().await.unwrap();
        let (first, second) = db
            .write(|tx| {
                let first = begin(tx)?;
                complete(tx, first)?;
                let second = begin(tx)?;
                let second = complete(tx, second)?;
                Ok((get(tx, first)?, second))
            })
            .await
            .unwrap();
        assert!(first.stale);
        assert!(!second.stale);
        assert!(second.states().is_completed());
        assert!(second.sync_finished_at.is_some());

        let live = db.read(latest_live).await.unwrap().unwrap();
        assert_eq!(live.id, second.id);
    }

    #[tokio::test]
    async fn error_and_abort_only_from_started() {
        let db = Database::open_in_memory().await.unwrap();
        let errored = db
            .write(|tx| {
                let id = begin(tx)?;
                error(tx, id)
            })
            .await
            .unwrap();
        assert_eq!(errored.sync_status, Some(VersionStatus::Error));
        assert_eq!(errored.sync_tasks_status, Some(VersionStatus::Error));

        let err = db.write(|tx| abort(tx, 1)).await.unwrap_err();
        assert!(matches!(
            err,
            TasklogError::InvalidTransition {
                to: VersionStatus::Aborted,
                ..
            }
        ));

        let err = db.write(|tx| complete(tx, 1)).await.unwrap_err();
        assert!(matches!(err, TasklogError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn unknown_version_is_not_found() {
        let db = Database::open_in_memory().await.unwrap();
        let err = db.read(|tx| states_of(tx, 42)).await.unwrap_err();
        assert!(matches!(err, TasklogError::VersionNotFound(42)));
        assert!(db.read(|tx| find(tx, 42)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn retire_only_failed_versions() {
        let db = Database::open_in_memory().await.unwrap();
        db.write(begin).await.unwrap();

        let err = db.write(|tx| retire(tx, 1)).await.unwrap_err();
        assert!(matches!(err, TasklogError::InvalidState(_)));

        db.write(|tx| abort(tx, 1)).await.unwrap();
        let retired = db.write(|tx| retire(tx, 1)).await.unwrap();
        assert!(retired.stale);
        assert_eq!(retired.sync_status, Some(VersionStatus::Aborted));
        assert!(db.read(latest_live).await.unwrap().is_none());

        let completed = db
            .write(|tx| {
                let id = begin(tx)?;
                complete(tx, id)
            })
            .await
            .unwrap();
        let err = db
            .write(move |tx| retire(tx, completed.id))
            .await
            .unwrap_err();
        assert!(matches!(err, TasklogError::InvalidState(_)));
        assert_eq!(db.read(list).await.unwrap().len(), 2);
    }
}
