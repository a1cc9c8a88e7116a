// SPDX-FileCopyrightText: 2026 Tasklog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Unversioned operator operations on the task log.
//!
//! `flush` empties the log behind a bootstrap FLUSH task; `import` appends a
//! CREATE for every live entity on top of the existing log. Neither touches
//! the data version registry.

use serde::Serialize;
use tasklog_core::{NewTask, TaskId, TaskType, TasklogError, BOOTSTRAP_TASK_ID, OPERATOR_TENANT};
use tasklog_storage::queries::{data_state, tasks};
use tasklog_storage::Database;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::check_cancel;
use crate::snapshot::{replay_task, Snapshot};

/// Truncate the log and write the bootstrap FLUSH task.
///
/// Requires the readonly gate so no mutation races the truncate.
pub async fn flush(db: &Database) -> Result<TaskId, TasklogError> {
    let (removed, id) = db
        .write(|tx| {
            if !data_state::is_readonly(tx)? {
                return Err(TasklogError::NotReadOnly);
            }
            let removed = tasks::truncate_and_reset(tx)?;
            let marker = NewTask::new(TaskType::Flush, None)
                .with_id(BOOTSTRAP_TASK_ID)
                .with_tenant(Some(OPERATOR_TENANT.to_string()));
            let id = tasks::append(tx, &marker)?;
            Ok((removed, id))
        })
        .await?;
    info!(removed, "task log flushed");
    Ok(id)
}

/// Outcome of an import.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportReport {
    pub transaction_id: String,
    pub tasks_written: usize,
    /// New tail of the log; unchanged when there was nothing to import.
    pub last_task_id: Option<TaskId>,
}

/// Append a CREATE for every live entity.
///
/// The snapshot is read first; the append transaction fails with
/// `InterleavedWrite` if any task was written or removed in between.
pub async fn import(
    db: &Database,
    cancel: &CancellationToken,
) -> Result<ImportReport, TasklogError> {
    let snapshot = db.read(Snapshot::capture).await?;
    check_cancel(cancel)?;

    let cancel = cancel.clone();
    let transaction_id = format!("import-{}", uuid::Uuid::new_v4());
    let report = db
        .write(move |tx| {
            snapshot.verify_unchanged(tx)?;
            let mut tasks_written = 0;
            for (kind, rows) in snapshot.kinds() {
                check_cancel(&cancel)?;
                for row in rows {
                    tasks::append(tx, &replay_task(kind, row, &transaction_id))?;
                }
                tasks_written += rows.len();
            }
            check_cancel(&cancel)?;
            Ok(ImportReport {
                last_task_id: tasks::most_recent_id(tx)?,
                transaction_id,
                tasks_written,
            })
        })
        .await?;
    info!(
        transaction_id = %report.transaction_id,
        tasks_written = report.tasks_written,
        "import completed"
    );
    Ok(report)
}
