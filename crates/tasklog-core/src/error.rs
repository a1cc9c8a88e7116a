// SPDX-FileCopyrightText: 2026 Tasklog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the task-log synchronization engine.

use thiserror::Error;

use crate::types::{ResourceKind, TaskId, VersionId, VersionStatus};

/// The primary error type used across the storage, sync, and CLI crates.
#[derive(Debug, Error)]
pub enum TasklogError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// The underlying store rejected a read or write (constraint violation,
    /// connection loss, I/O). The enclosing transaction has been rolled back.
    #[error("persistence error: {source}")]
    Persistence {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The coordination tables violate an invariant established by schema setup.
    #[error("invalid data state: {0}")]
    InvalidState(String),

    /// A data version is in flight or failed without being retired.
    #[error(
        "data version {version} blocks a new resync (sync_status={}, sync_tasks_status={})",
        display_status(.sync_status),
        display_status(.sync_tasks_status)
    )]
    ConcurrentResync {
        version: VersionId,
        sync_status: Option<VersionStatus>,
        sync_tasks_status: Option<VersionStatus>,
    },

    /// A resync or flush was requested while ordinary mutations may still append tasks.
    #[error("the task log is writable; enable the readonly gate before rebuilding it")]
    NotReadOnly,

    /// The consumer has not yet processed every task in the log.
    #[error(
        "the cluster has not finished processing tasks (last processed: {}, most recent: {most_recent})",
        display_id(.last_processed)
    )]
    PendingTasks {
        last_processed: Option<TaskId>,
        most_recent: TaskId,
    },

    /// A control-plane mutation was refused because the readonly gate is set.
    #[error("the task log is locked for reads only")]
    ReadOnly,

    /// The task log changed between the snapshot and the rebuild.
    #[error(
        "the database was updated while the rebuild was in progress (expected {expected_count} tasks up to {}, found {found_count} up to {})",
        display_id(.expected_tail),
        display_id(.found_tail)
    )]
    InterleavedWrite {
        expected_count: i64,
        expected_tail: Option<TaskId>,
        found_count: i64,
        found_tail: Option<TaskId>,
    },

    /// The data state row changed since it was read (optimistic concurrency check).
    #[error("data state changed concurrently (expected revision {expected}, found {found})")]
    StaleDataState { expected: i64, found: i64 },

    /// A data version status change that the lifecycle does not allow.
    #[error(
        "data version {version} cannot move from {} to {to}",
        display_status(.from)
    )]
    InvalidTransition {
        version: VersionId,
        from: Option<VersionStatus>,
        to: VersionStatus,
    },

    /// No data version with the given id exists.
    #[error("data version {0} not found")]
    VersionNotFound(VersionId),

    /// A mutation addressed an entity row that does not exist.
    #[error("{kind} {id} not found")]
    ResourceNotFound { kind: ResourceKind, id: String },

    /// No task with the given id exists in the log.
    #[error("task {0} not found")]
    TaskNotFound(TaskId),

    /// The operation was cancelled before it committed.
    #[error("operation cancelled")]
    Cancelled,

    /// A task payload could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl TasklogError {
    /// True for the errors raised before a resync mutates anything.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            TasklogError::ConcurrentResync { .. }
                | TasklogError::NotReadOnly
                | TasklogError::PendingTasks { .. }
        )
    }
}

impl From<rusqlite::Error> for TasklogError {
    fn from(e: rusqlite::Error) -> Self {
        TasklogError::Persistence {
            source: Box::new(e),
        }
    }
}

impl From<serde_json::Error> for TasklogError {
    fn from(e: serde_json::Error) -> Self {
        TasklogError::Serialization(e.to_string())
    }
}

fn display_status(status: &Option<VersionStatus>) -> String {
    status.map_or_else(|| "unset".to_string(), |s| s.to_string())
}

fn display_id(id: &Option<i64>) -> String {
    id.map_or_else(|| "none".to_string(), |id| id.to_string())
}
