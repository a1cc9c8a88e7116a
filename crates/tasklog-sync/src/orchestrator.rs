// SPDX-FileCopyrightText: 2026 Tasklog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The versioned resync protocol.
//!
//! A resync runs as three transactions:
//!
//! 1. **register** (write): check preconditions and create the version row,
//!    so two operators cannot both pass the checks.
//! 2. **snapshot** (read): read every entity table and the log fingerprint
//!    from one consistent view.
//! 3. **rebuild** (write): verify the fingerprint, truncate the log, write the
//!    bootstrap marker, the configuration, one CREATE per row and the
//!    activation marker, then complete and promote the version.
//!
//! A failure after registration marks the version ERROR (ABORTED when
//! cancelled) in a fourth transaction. The rebuild either commits whole or
//! leaves the previous log and active version in place.

use serde::Serialize;
use tasklog_core::{
    DataState, DataType, NewTask, ResourceKind, TaskId, TaskType, TasklogError, VersionId,
    BOOTSTRAP_TASK_ID, OPERATOR_TENANT,
};
use tasklog_storage::queries::{data_state, data_versions, tasks};
use tasklog_storage::Database;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::check_cancel;
use crate::preconditions;
use crate::progress::{emit, ProgressObserver, ResyncPhase};
use crate::snapshot::{replay_task, Snapshot};

/// Outcome of a committed resync.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResyncReport {
    /// The new active version.
    pub version: VersionId,
    /// The version that was active before, if any.
    pub previous_version: Option<VersionId>,
    /// Tasks removed by the truncate.
    pub tasks_removed: usize,
    /// Tasks in the rebuilt log, markers included.
    pub tasks_written: usize,
    /// Id of the activation marker, the new tail of the log.
    pub last_task_id: TaskId,
    /// Replayed rows per kind, in replay order.
    pub rows_by_kind: Vec<(ResourceKind, usize)>,
}

/// Runs resyncs against one database.
#[derive(Clone)]
pub struct ResyncOrchestrator {
    db: Database,
    observer: Option<ProgressObserver>,
}

impl ResyncOrchestrator {
    pub fn new(db: Database) -> Self {
        Self { db, observer: None }
    }

    /// Report phase events to `observer`.
    pub fn with_observer(mut self, observer: ProgressObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Rebuild the task log from the entity tables and activate a new version.
    ///
    /// `config` is the payload of the CONFIG task. Checking `cancel` happens
    /// at every phase boundary, between kinds, and right before the rebuild
    /// commits; once it has committed, cancellation has no effect.
    pub async fn resync(
        &self,
        config: serde_json::Value,
        cancel: &CancellationToken,
    ) -> Result<ResyncReport, TasklogError> {
        let (version, state) = self
            .db
            .write(|tx| {
                let state = preconditions::check(tx)?;
                let version = data_versions::begin(tx)?;
                Ok((version, state))
            })
            .await?;
        info!(version, revision = state.revision, "resync started");
        emit(&self.observer, ResyncPhase::Registered { version });

        match self.rebuild(version, state, config, cancel).await {
            Ok(report) => {
                info!(
                    version,
                    previous = ?report.previous_version,
                    tasks_written = report.tasks_written,
                    "resync completed"
                );
                emit(&self.observer, ResyncPhase::Activated { version });
                Ok(report)
            }
            Err(e) => {
                self.record_failure(version, &e).await;
                Err(e)
            }
        }
    }

    async fn rebuild(
        &self,
        version: VersionId,
        state: DataState,
        config: serde_json::Value,
        cancel: &CancellationToken,
    ) -> Result<ResyncReport, TasklogError> {
        check_cancel(cancel)?;
        let snapshot = self.db.read(Snapshot::capture).await?;
        emit(
            &self.observer,
            ResyncPhase::SnapshotTaken {
                rows: snapshot.total_rows(),
            },
        );
        check_cancel(cancel)?;

        let cancel = cancel.clone();
        let observer = self.observer.clone();
        self.db
            .write(move |tx| {
                snapshot.verify_unchanged(tx)?;

                let tasks_removed = tasks::truncate_and_reset(tx)?;
                emit(
                    &observer,
                    ResyncPhase::LogTruncated {
                        removed: tasks_removed,
                    },
                );

                let transaction_id = format!("sync-v{version}");
                let marker = |task_type: TaskType, data_type: DataType| {
                    NewTask::new(task_type, Some(data_type))
                        .with_tenant(Some(OPERATOR_TENANT.to_string()))
                        .with_transaction(Some(transaction_id.clone()))
                };

                tasks::append(
                    tx,
                    &marker(TaskType::Flush, DataType::DataVersionSync).with_id(BOOTSTRAP_TASK_ID),
                )?;
                let config_task = NewTask::config(config)?
                    .with_tenant(Some(OPERATOR_TENANT.to_string()))
                    .with_transaction(Some(transaction_id.clone()));
                tasks::append(tx, &config_task)?;
                let mut tasks_written = 2;

                let mut rows_by_kind = Vec::with_capacity(ResourceKind::SNAPSHOT_ORDER.len());
                for (kind, rows) in snapshot.kinds() {
                    check_cancel(&cancel)?;
                    for row in rows {
                        tasks::append(tx, &replay_task(kind, row, &transaction_id))?;
                    }
                    tasks_written += rows.len();
                    rows_by_kind.push((kind, rows.len()));
                    emit(
                        &observer,
                        ResyncPhase::KindReplayed {
                            kind,
                            count: rows.len(),
                        },
                    );
                }

                let last_task_id = tasks::append(
                    tx,
                    &marker(TaskType::Create, DataType::DataVersionActivate),
                )?;
                tasks_written += 1;

                data_versions::complete(tx, version)?;
                data_state::promote_active_version(tx, version, state.revision)?;

                check_cancel(&cancel)?;
                Ok(ResyncReport {
                    version,
                    previous_version: state.active_version,
                    tasks_removed,
                    tasks_written,
                    last_task_id,
                    rows_by_kind,
                })
            })
            .await
    }

    /// Record a failed attempt. The caller still returns the original error.
    async fn record_failure(&self, version: VersionId, cause: &TasklogError) {
        let cancelled = matches!(cause, TasklogError::Cancelled);
        let recorded = self
            .db
            .write(move |tx| {
                if cancelled {
                    data_versions::abort(tx, version)
                } else {
                    data_versions::error(tx, version)
                }
            })
            .await;
        match recorded {
            Ok(v) => warn!(
                version,
                status = ?v.sync_status,
                error = %cause,
                "resync failed; active version unchanged"
            ),
            Err(record_err) => error!(
                version,
                error = %record_err,
                cause = %cause,
                "failed to record resync failure"
            ),
        }
    }
}
