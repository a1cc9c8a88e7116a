// SPDX-FileCopyrightText: 2026 Tasklog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Consistent snapshot of the entity tables and the shape of the log.

use rusqlite::Transaction;
use tasklog_core::{NewTask, ResourceKind, TaskType, TasklogError, OPERATOR_TENANT};
use tasklog_storage::queries::{resources, tasks};
use tasklog_storage::{LogFingerprint, ResourceRow};

/// Live rows of every resource kind, captured under one read transaction.
#[derive(Debug, Clone)]
pub struct Snapshot {
    fingerprint: LogFingerprint,
    kinds: Vec<(ResourceKind, Vec<ResourceRow>)>,
}

impl Snapshot {
    /// Read every kind in replay order, plus the log fingerprint.
    pub fn capture(tx: &Transaction<'_>) -> Result<Self, TasklogError> {
        let fingerprint = tasks::fingerprint(tx)?;
        let kinds = ResourceKind::SNAPSHOT_ORDER
            .iter()
            .map(|&kind| Ok((kind, resources::list(tx, kind)?)))
            .collect::<Result<Vec<_>, TasklogError>>()?;
        Ok(Self { fingerprint, kinds })
    }

    pub fn fingerprint(&self) -> LogFingerprint {
        self.fingerprint
    }

    /// Kinds with their rows, in replay order.
    pub fn kinds(&self) -> impl Iterator<Item = (ResourceKind, &[ResourceRow])> {
        self.kinds.iter().map(|(kind, rows)| (*kind, rows.as_slice()))
    }

    pub fn total_rows(&self) -> usize {
        self.kinds.iter().map(|(_, rows)| rows.len()).sum()
    }

    /// Fail with `InterleavedWrite` if the log changed since capture.
    pub fn verify_unchanged(&self, tx: &Transaction<'_>) -> Result<(), TasklogError> {
        let found = tasks::fingerprint(tx)?;
        if found != self.fingerprint {
            return Err(TasklogError::InterleavedWrite {
                expected_count: self.fingerprint.count,
                expected_tail: self.fingerprint.tail,
                found_count: found.count,
                found_tail: found.tail,
            });
        }
        Ok(())
    }
}

/// The CREATE task that replays one snapshot row.
pub(crate) fn replay_task(
    kind: ResourceKind,
    row: &ResourceRow,
    transaction_id: &str,
) -> NewTask {
    NewTask::new(TaskType::Create, Some(kind.into()))
        .with_resource_id(row.id.clone())
        .with_raw_data(Some(row.data.clone()))
        .with_tenant(Some(OPERATOR_TENANT.to_string()))
        .with_transaction(Some(transaction_id.to_string()))
}
