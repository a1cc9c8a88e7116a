// SPDX-FileCopyrightText: 2026 Tasklog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the StorageAdapter trait.

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use tasklog_config::model::StorageConfig;
use tasklog_core::{
    DataState, DataVersion, HealthStatus, PluginAdapter, ResourceMutation, StorageAdapter, Task,
    TaskId, TasklogError, VersionId,
};

use crate::database::Database;
use crate::queries;

/// SQLite-backed storage adapter.
///
/// Wraps a [`Database`] handle and runs each trait method as one transaction
/// over the typed query modules. The database is lazily opened on the first
/// call to [`StorageAdapter::initialize`].
pub struct SqliteStorage {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStorage {
    /// Create a new SqliteStorage with the given configuration.
    ///
    /// The database connection is not opened until [`StorageAdapter::initialize`] is called.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// Returns the underlying Database, or an error if not initialized.
    ///
    /// Callers that need several queries in one transaction (the resync
    /// orchestrator, mutation handlers) go through this handle.
    pub fn database(&self) -> Result<&Database, TasklogError> {
        self.db.get().ok_or_else(|| {
            TasklogError::Internal("storage not initialized -- call initialize() first".into())
        })
    }
}

#[async_trait]
impl PluginAdapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    async fn health_check(&self) -> Result<HealthStatus, TasklogError> {
        let db = match self.db.get() {
            Some(db) => db,
            None => return Ok(HealthStatus::Unhealthy("storage not initialized".into())),
        };
        match db.read(queries::data_state::get).await {
            Ok(_) => Ok(HealthStatus::Healthy),
            Err(TasklogError::InvalidState(msg)) => Ok(HealthStatus::Degraded(msg)),
            Err(e) => Err(e),
        }
    }

    async fn shutdown(&self) -> Result<(), TasklogError> {
        // Shutdown delegates to a checkpoint if the DB was initialized.
        if let Some(db) = self.db.get() {
            db.checkpoint().await?;
            debug!("shutdown: WAL checkpoint complete");
        }
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for SqliteStorage {
    async fn initialize(&self) -> Result<(), TasklogError> {
        let db = Database::open(&self.config).await?;
        self.db
            .set(db)
            .map_err(|_| TasklogError::Internal("storage already initialized".into()))?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), TasklogError> {
        self.database()?.checkpoint().await
    }

    // --- Task log ---

    async fn append_config(&self, payload: serde_json::Value) -> Result<TaskId, TasklogError> {
        self.database()?
            .write(move |tx| {
                if queries::data_state::is_readonly(tx)? {
                    return Err(TasklogError::ReadOnly);
                }
                queries::tasks::append_config(tx, payload)
            })
            .await
    }

    async fn apply_mutation(&self, mutation: &ResourceMutation) -> Result<TaskId, TasklogError> {
        let mutation = mutation.clone();
        self.database()?
            .write(move |tx| queries::resources::apply_mutation(tx, &mutation))
            .await
    }

    async fn most_recent_task_id(&self) -> Result<Option<TaskId>, TasklogError> {
        self.database()?.read(queries::tasks::most_recent_id).await
    }

    async fn tasks_after(
        &self,
        after: Option<TaskId>,
        limit: Option<i64>,
    ) -> Result<Vec<Task>, TasklogError> {
        self.database()?
            .read(move |tx| queries::tasks::list_after(tx, after, limit))
            .await
    }

    // --- Data state ---

    async fn data_state(&self) -> Result<DataState, TasklogError> {
        self.database()?.read(queries::data_state::get).await
    }

    async fn set_readonly(&self, readonly: bool) -> Result<DataState, TasklogError> {
        self.database()?
            .write(move |tx| queries::data_state::set_readonly(tx, readonly))
            .await
    }

    async fn advance_watermark(&self, task_id: TaskId) -> Result<bool, TasklogError> {
        self.database()?
            .write(move |tx| queries::data_state::advance_watermark(tx, task_id))
            .await
    }

    // --- Data versions ---

    async fn list_versions(&self) -> Result<Vec<DataVersion>, TasklogError> {
        self.database()?.read(queries::data_versions::list).await
    }

    async fn abort_version(&self, id: VersionId) -> Result<DataVersion, TasklogError> {
        self.database()?
            .write(move |tx| queries::data_versions::abort(tx, id))
            .await
    }

    async fn retire_version(&self, id: VersionId) -> Result<DataVersion, TasklogError> {
        self.database()?
            .write(move |tx| queries::data_versions::retire(tx, id))
            .await
    }
}
