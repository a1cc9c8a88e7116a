// SPDX-FileCopyrightText: 2026 Tasklog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` opens a fresh SQLite database in a temp directory, applies
//! seed mutations through the regular mutation path, and exposes the
//! storage adapter and raw database handle for assertions.

use std::sync::Arc;

use tasklog_config::model::{StorageConfig, TasklogConfig};
use tasklog_core::{
    DataState, DataType, DataVersion, ResourceKind, ResourceMutation, StorageAdapter, Task,
    TaskId, TasklogError,
};
use tasklog_storage::{queries, Database, SqliteStorage};

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    seeds: Vec<ResourceMutation>,
    drained: bool,
    readonly: bool,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            seeds: Vec::new(),
            drained: false,
            readonly: false,
        }
    }

    /// Apply a mutation while building, before the gate is closed.
    pub fn with_mutation(mut self, mutation: ResourceMutation) -> Self {
        self.seeds.push(mutation);
        self
    }

    /// Create one entity with `{"id": id, "name": id}` as its body.
    pub fn with_resource(self, kind: ResourceKind, id: &str) -> Self {
        self.with_mutation(ResourceMutation::create(
            kind,
            id,
            serde_json::json!({"id": id, "name": id}),
        ))
    }

    /// Advance the watermark to the tail after seeding.
    pub fn drained(mut self) -> Self {
        self.drained = true;
        self
    }

    /// Close the readonly gate after seeding.
    pub fn readonly(mut self) -> Self {
        self.readonly = true;
        self
    }

    /// Build the test harness, creating the database and applying seeds.
    pub async fn build(self) -> Result<TestHarness, TasklogError> {
        let temp_dir = tempfile::TempDir::new().map_err(|e| TasklogError::Persistence {
            source: Box::new(e),
        })?;
        let db_path = temp_dir.path().join("test.db");

        let config = TasklogConfig {
            storage: StorageConfig {
                database_path: db_path.to_string_lossy().to_string(),
                ..StorageConfig::default()
            },
            ..TasklogConfig::default()
        };
        let storage = SqliteStorage::new(config.storage.clone());
        storage.initialize().await?;
        let db = storage.database()?.clone();

        for mutation in &self.seeds {
            storage.apply_mutation(mutation).await?;
        }

        let harness = TestHarness {
            storage: Arc::new(storage),
            db,
            config,
            _temp_dir: temp_dir,
        };
        if self.drained {
            harness.drain().await?;
        }
        if self.readonly {
            harness.storage.set_readonly(true).await?;
        }
        Ok(harness)
    }
}

/// A task-log environment over a temp database.
pub struct TestHarness {
    /// Storage adapter (temp DB, cleaned up on drop).
    pub storage: Arc<SqliteStorage>,
    /// Handle to the same database for multi-query transactions.
    pub db: Database,
    /// Configuration pointing at the temp database.
    pub config: TasklogConfig,
    /// Temp directory kept alive for cleanup on drop.
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    /// Create a new builder for configuring the test harness.
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Every task in id order.
    pub async fn tasks(&self) -> Result<Vec<Task>, TasklogError> {
        self.storage.tasks_after(None, None).await
    }

    pub async fn data_state(&self) -> Result<DataState, TasklogError> {
        self.storage.data_state().await
    }

    pub async fn versions(&self) -> Result<Vec<DataVersion>, TasklogError> {
        self.storage.list_versions().await
    }

    /// Acknowledge the whole log as the consumer would. Returns the new watermark.
    pub async fn drain(&self) -> Result<Option<TaskId>, TasklogError> {
        let tail = self.storage.most_recent_task_id().await?;
        if let Some(tail) = tail {
            self.storage.advance_watermark(tail).await?;
        }
        Ok(tail)
    }

    /// Insert a task directly, bypassing the readonly gate.
    ///
    /// Stands in for a writer on another connection that ignores the gate.
    pub async fn append_raw(&self, kind: ResourceKind, id: &str) -> Result<TaskId, TasklogError> {
        let task = tasklog_core::NewTask::resource(
            tasklog_core::TaskType::Update,
            kind,
            id,
            Some(&serde_json::json!({"id": id})),
        )?;
        self.db.write(move |tx| queries::tasks::append(tx, &task)).await
    }

    /// Make every insert of a task with `data_type` fail inside the store.
    pub async fn fail_appends_of(&self, data_type: DataType) -> Result<(), TasklogError> {
        let sql = format!(
            "CREATE TRIGGER inject_append_failure BEFORE INSERT ON tasks
             WHEN NEW.data_type = '{data_type}'
             BEGIN SELECT RAISE(ABORT, 'injected append failure'); END;"
        );
        self.db
            .connection()
            .call(move |conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch(&sql)?;
                Ok(())
            })
            .await
            .map_err(tasklog_storage::database::map_tr_err)?;
        tracing::debug!(%data_type, "append failure injected");
        Ok(())
    }

    /// Remove a failure installed by [`TestHarness::fail_appends_of`].
    pub async fn clear_injected_failures(&self) -> Result<(), TasklogError> {
        self.db
            .connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("DROP TRIGGER IF EXISTS inject_append_failure;")?;
                Ok(())
            })
            .await
            .map_err(tasklog_storage::database::map_tr_err)
    }
}
