// SPDX-FileCopyrightText: 2026 Tasklog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Task log operations.

use rusqlite::{params, OptionalExtension, Row, Transaction};
use tasklog_core::{NewTask, Task, TaskId, TasklogError};
use tracing::debug;

use crate::models::LogFingerprint;

const TASK_COLUMNS: &str =
    "id, type, data_type, resource_id, data, tenant_id, transaction_id, created_at";

fn row_to_task(row: &Row<'_>) -> rusqlite::Result<Task> {
    Ok(Task {
        id: row.get(0)?,
        task_type: row.get(1)?,
        data_type: row.get(2)?,
        resource_id: row.get(3)?,
        data: row.get(4)?,
        tenant_id: row.get(5)?,
        transaction_id: row.get(6)?,
        created_at: row.get(7)?,
    })
}

/// Append one task and return its id.
///
/// The id is assigned by the log unless the task pins one. Ids are never
/// reused: the high-water mark survives deletes, and a rolled back append
/// leaves it untouched.
pub fn append(tx: &Transaction<'_>, task: &NewTask) -> Result<TaskId, TasklogError> {
    tx.execute(
        "INSERT INTO tasks (id, type, data_type, resource_id, data, tenant_id, transaction_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            task.id,
            task.task_type,
            task.data_type,
            task.resource_id,
            task.data,
            task.tenant_id,
            task.transaction_id,
        ],
    )?;
    let id = tx.last_insert_rowid();
    debug!(
        task_id = id,
        task_type = %task.task_type,
        data_type = ?task.data_type.map(|d| d.to_string()),
        resource_id = ?task.resource_id,
        "task appended"
    );
    Ok(id)
}

/// Append a CREATE of the configuration singleton.
///
/// Does not consult the readonly gate; operator-facing callers check it first.
pub fn append_config(
    tx: &Transaction<'_>,
    payload: serde_json::Value,
) -> Result<TaskId, TasklogError> {
    append(tx, &NewTask::config(payload)?)
}

/// Id of the newest task, or `None` for an empty log.
pub fn most_recent_id(tx: &Transaction<'_>) -> Result<Option<TaskId>, TasklogError> {
    Ok(tx.query_row("SELECT MAX(id) FROM tasks", [], |row| row.get(0))?)
}

pub fn count(tx: &Transaction<'_>) -> Result<i64, TasklogError> {
    Ok(tx.query_row("SELECT COUNT(*) FROM tasks", [], |row| row.get(0))?)
}

/// Row count and tail id of the log.
pub fn fingerprint(tx: &Transaction<'_>) -> Result<LogFingerprint, TasklogError> {
    Ok(tx.query_row("SELECT COUNT(*), MAX(id) FROM tasks", [], |row| {
        Ok(LogFingerprint {
            count: row.get(0)?,
            tail: row.get(1)?,
        })
    })?)
}

/// Tasks with an id strictly greater than `after`, oldest first.
///
/// `after = None` starts at the head of the log; `limit = None` returns all.
pub fn list_after(
    tx: &Transaction<'_>,
    after: Option<TaskId>,
    limit: Option<i64>,
) -> Result<Vec<Task>, TasklogError> {
    let mut stmt = tx.prepare(&format!(
        "SELECT {TASK_COLUMNS} FROM tasks WHERE id > ?1 ORDER BY id ASC LIMIT ?2"
    ))?;
    let rows = stmt.query_map(params![after.unwrap_or(0), limit.unwrap_or(-1)], row_to_task)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

pub fn get(tx: &Transaction<'_>, id: TaskId) -> Result<Option<Task>, TasklogError> {
    Ok(tx
        .query_row(
            &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
            params![id],
            row_to_task,
        )
        .optional()?)
}

/// Delete every task and reset the id sequence so the next assigned id is 1.
///
/// Also starts a new log epoch, which detaches the consumer watermark from
/// the ids that are about to be reused. The data state revision is left alone.
pub fn truncate_and_reset(tx: &Transaction<'_>) -> Result<usize, TasklogError> {
    let removed = tx.execute("DELETE FROM tasks", [])?;
    tx.execute("DELETE FROM sqlite_sequence WHERE name = 'tasks'", [])?;
    tx.execute("UPDATE data_state SET log_epoch = log_epoch + 1", [])?;
    debug!(removed, "task log truncated");
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use tasklog_core::{DataType, ResourceKind, TaskType};

    use super::*;
    use crate::Database;

    fn network(id: &str) -> NewTask {
        NewTask::resource(
            TaskType::Create,
            ResourceKind::Network,
            id,
            Some(&serde_json::json!({"id": id})),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn append_assigns_increasing_ids() {
        let db = Database::open_in_memory().await.unwrap();
        let ids = db
            .write(|tx| {
                let a = append(tx, &network("n1"))?;
                let b = append(tx, &network("n2"))?;
                Ok((a, b))
            })
            .await
            .unwrap();
        assert_eq!(ids, (1, 2));

        let tasks = db.read(|tx| list_after(tx, None, None)).await.unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].data_type, Some(DataType::Resource(ResourceKind::Network)));
        assert_eq!(tasks[1].resource_id.as_deref(), Some("n2"));
        assert!(!tasks[0].created_at.is_empty());
    }

    #[tokio::test]
    async fn rolled_back_append_leaves_no_gap() {
        let db = Database::open_in_memory().await.unwrap();
        db.write(|tx| append(tx, &network("n1"))).await.unwrap();

        let failed: Result<TaskId, TasklogError> = db
            .write(|tx| {
                append(tx, &network("n2"))?;
                Err(TasklogError::Internal("entity write rejected".into()))
            })
            .await;
        assert!(failed.is_err());

        let next = db.write(|tx| append(tx, &network("n3"))).await.unwrap();
        assert_eq!(next, 2);
    }

    #[tokio::test]
    async fn ids_are_not_reused_after_plain_delete() {
        let db = Database::open_in_memory().await.unwrap();
        db.write(|tx| {
            append(tx, &network("n1"))?;
            append(tx, &network("n2"))?;
            tx.execute("DELETE FROM tasks WHERE id = 2", [])?;
            Ok(())
        })
        .await
        .unwrap();
        let next = db.write(|tx| append(tx, &network("n3"))).await.unwrap();
        assert_eq!(next, 3);
    }

    #[tokio::test]
    async fn truncate_resets_sequence_for_bootstrap_marker() {
        let db = Database::open_in_memory().await.unwrap();
        db.write(|tx| {
            for i in 0..4 {
                append(tx, &network(&format!("n{i}")))?;
            }
            Ok(())
        })
        .await
        .unwrap();

        let (removed, flush_id, next_id) = db
            .write(|tx| {
                let removed = truncate_and_reset(tx)?;
                let flush_id = append(
                    tx,
                    &NewTask::new(TaskType::Flush, Some(DataType::DataVersionSync)).with_id(1),
                )?;
                let next_id = append(tx, &network("n9"))?;
                Ok((removed, flush_id, next_id))
            })
            .await
            .unwrap();
        assert_eq!((removed, flush_id, next_id), (4, 1, 2));
    }

    #[tokio::test]
    async fn shared_transaction_id_groups_tasks() {
        let db = Database::open_in_memory().await.unwrap();
        let (a, b) = db
            .write(|tx| {
                let txn = Some("req-42".to_string());
                let a = append(tx, &network("n1").with_transaction(txn.clone()))?;
                let b = append(tx, &network("n2").with_transaction(txn))?;
                Ok((a, b))
            })
            .await
            .unwrap();
        assert_ne!(a, b);

        let tasks = db.read(|tx| list_after(tx, None, None)).await.unwrap();
        assert!(tasks.iter().all(|t| t.transaction_id.as_deref() == Some("req-42")));
    }

    #[tokio::test]
    async fn list_after_respects_watermark_and_limit() {
        let db = Database::open_in_memory().await.unwrap();
        db.write(|tx| {
            for i in 0..5 {
                append(tx, &network(&format!("n{i}")))?;
            }
            Ok(())
        })
        .await
        .unwrap();

        let tasks = db.read(|tx| list_after(tx, Some(2), Some(2))).await.unwrap();
        let ids: Vec<TaskId> = tasks.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![3, 4]);

        let fp = db.read(fingerprint).await.unwrap();
        assert_eq!(fp, LogFingerprint { count: 5, tail: Some(5) });
        assert!(db.read(|tx| get(tx, 9)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn empty_log_has_no_tail() {
        let db = Database::open_in_memory().await.unwrap();
        assert_eq!(db.read(most_recent_id).await.unwrap(), None);
        assert_eq!(db.read(count).await.unwrap(), 0);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn committed_ids_are_strictly_increasing_without_gaps(outcomes in proptest::collection::vec(any::<bool>(), 1..20)) {
            let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
            let committed = rt.block_on(async {
                let db = Database::open_in_memory().await.unwrap();
                let mut committed = Vec::new();
                for (i, commit) in outcomes.iter().copied().enumerate() {
                    let task = network(&format!("n{i}"));
                    let result = db
                        .write(move |tx| {
                            let id = append(tx, &task)?;
                            if commit {
                                Ok(id)
                            } else {
                                Err(TasklogError::Internal("rejected".into()))
                            }
                        })
                        .await;
                    if let Ok(id) = result {
                        committed.push(id);
                    }
                }
                committed
            });
            let expected: Vec<TaskId> = (1..=committed.len() as TaskId).collect();
            prop_assert_eq!(committed, expected);
        }
    }
}
