// SPDX-FileCopyrightText: 2026 Tasklog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage adapter trait for the task log and its coordination tables.

use async_trait::async_trait;

use crate::error::TasklogError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{
    DataState, DataVersion, ResourceMutation, Task, TaskId, VersionId,
};

/// Adapter for the persistence backend of the task log.
///
/// Every method is one transaction. Callers that need to combine an entity
/// write with a task append use [`StorageAdapter::apply_mutation`], which
/// commits or rolls back both together.
#[async_trait]
pub trait StorageAdapter: PluginAdapter {
    /// Opens the backend and applies pending migrations.
    async fn initialize(&self) -> Result<(), TasklogError>;

    /// Closes the backend, flushing pending writes.
    async fn close(&self) -> Result<(), TasklogError>;

    // --- Task log ---

    /// Appends the configuration singleton and returns its task id.
    ///
    /// Refused with `ReadOnly` while the readonly gate is set.
    async fn append_config(&self, payload: serde_json::Value) -> Result<TaskId, TasklogError>;

    /// Applies a control-plane mutation and its task in one transaction.
    async fn apply_mutation(&self, mutation: &ResourceMutation) -> Result<TaskId, TasklogError>;

    /// Id of the newest task, if the log is not empty.
    async fn most_recent_task_id(&self) -> Result<Option<TaskId>, TasklogError>;

    /// Tasks with an id strictly greater than `after`, oldest first.
    async fn tasks_after(
        &self,
        after: Option<TaskId>,
        limit: Option<i64>,
    ) -> Result<Vec<Task>, TasklogError>;

    // --- Data state ---

    async fn data_state(&self) -> Result<DataState, TasklogError>;

    async fn set_readonly(&self, readonly: bool) -> Result<DataState, TasklogError>;

    /// Records consumer progress. Returns `false` when the watermark did not move.
    async fn advance_watermark(&self, task_id: TaskId) -> Result<bool, TasklogError>;

    // --- Data versions ---

    async fn list_versions(&self) -> Result<Vec<DataVersion>, TasklogError>;

    async fn abort_version(&self, id: VersionId) -> Result<DataVersion, TasklogError>;

    async fn retire_version(&self, id: VersionId) -> Result<DataVersion, TasklogError>;
}
