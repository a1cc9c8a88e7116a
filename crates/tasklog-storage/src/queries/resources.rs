// SPDX-FileCopyrightText: 2026 Tasklog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Control-plane entity tables and the mutation path that mirrors them into the log.

use rusqlite::{params, Transaction};
use tasklog_core::{NewTask, ResourceKind, ResourceMutation, TaskId, TaskType, TasklogError};
use tracing::debug;

use super::{data_state, tasks, NOW};
use crate::models::ResourceRow;

pub fn insert(
    tx: &Transaction<'_>,
    kind: ResourceKind,
    id: &str,
    tenant_id: Option<&str>,
    data: &str,
) -> Result<(), TasklogError> {
    tx.execute(
        &format!(
            "INSERT INTO {} (id, tenant_id, data) VALUES (?1, ?2, ?3)",
            kind.table()
        ),
        params![id, tenant_id, data],
    )?;
    Ok(())
}

pub fn update(
    tx: &Transaction<'_>,
    kind: ResourceKind,
    id: &str,
    data: &str,
) -> Result<(), TasklogError> {
    let updated = tx.execute(
        &format!(
            "UPDATE {} SET data = ?1, updated_at = {NOW} WHERE id = ?2",
            kind.table()
        ),
        params![data, id],
    )?;
    if updated == 0 {
        return Err(TasklogError::ResourceNotFound {
            kind,
            id: id.to_string(),
        });
    }
    Ok(())
}

pub fn delete(tx: &Transaction<'_>, kind: ResourceKind, id: &str) -> Result<(), TasklogError> {
    let deleted = tx.execute(
        &format!("DELETE FROM {} WHERE id = ?1", kind.table()),
        params![id],
    )?;
    if deleted == 0 {
        return Err(TasklogError::ResourceNotFound {
            kind,
            id: id.to_string(),
        });
    }
    Ok(())
}

/// Live rows of one kind in insertion order.
pub fn list(tx: &Transaction<'_>, kind: ResourceKind) -> Result<Vec<ResourceRow>, TasklogError> {
    let mut stmt = tx.prepare(&format!(
        "SELECT id, tenant_id, data FROM {} ORDER BY rowid ASC",
        kind.table()
    ))?;
    let rows = stmt.query_map([], |row| {
        Ok(ResourceRow {
            id: row.get(0)?,
            tenant_id: row.get(1)?,
            data: row.get(2)?,
        })
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

pub fn count(tx: &Transaction<'_>, kind: ResourceKind) -> Result<i64, TasklogError> {
    Ok(tx.query_row(
        &format!("SELECT COUNT(*) FROM {}", kind.table()),
        [],
        |row| row.get(0),
    )?)
}

/// Apply an entity write and append its task in the caller's transaction.
///
/// Refused with `ReadOnly` while the gate is set. Any failure leaves both the
/// entity table and the log untouched once the transaction rolls back.
pub fn apply_mutation(
    tx: &Transaction<'_>,
    mutation: &ResourceMutation,
) -> Result<TaskId, TasklogError> {
    if data_state::is_readonly(tx)? {
        return Err(TasklogError::ReadOnly);
    }
    let kind = mutation.kind;
    let id = mutation.resource_id.as_str();
    let body = match (mutation.op, &mutation.data) {
        (TaskType::Delete, _) => None,
        (_, Some(data)) => Some(data),
        (op, None) => {
            return Err(TasklogError::Serialization(format!(
                "{op} of {kind} {id} carries no entity body"
            )));
        }
    };
    let text = body.map(serde_json::to_string).transpose()?;

    match (mutation.op, text.as_deref()) {
        (TaskType::Create, Some(data)) => {
            insert(tx, kind, id, mutation.tenant_id.as_deref(), data)?
        }
        (TaskType::Update, Some(data)) => update(tx, kind, id, data)?,
        (TaskType::Delete, _) => delete(tx, kind, id)?,
        (op, _) => {
            return Err(TasklogError::InvalidState(format!(
                "{op} is not a resource mutation"
            )));
        }
    }

    let task = NewTask::resource(mutation.op, kind, id, body)?
        .with_tenant(mutation.tenant_id.clone())
        .with_transaction(mutation.transaction_id.clone());
    let task_id = tasks::append(tx, &task)?;
    debug!(task_id, op = %mutation.op, kind = %kind, resource_id = id, "mutation applied");
    Ok(task_id)
}
