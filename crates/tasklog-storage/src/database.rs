// SPDX-FileCopyrightText: 2026 Tasklog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All statements of one handle run on tokio-rusqlite's single background
//! thread. Work is submitted as a closure that receives an open transaction:
//! [`Database::read`] for a deferred (shared) transaction and
//! [`Database::write`] for an `IMMEDIATE` one that takes the reserved lock up
//! front. Returning `Ok` commits; returning `Err` drops the transaction,
//! which rolls it back.

use std::time::Duration;

use rusqlite::{Transaction, TransactionBehavior};
use tasklog_config::model::StorageConfig;
use tasklog_core::TasklogError;
use tracing::debug;

/// Convert a tokio-rusqlite error into a persistence error.
pub fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> TasklogError {
    TasklogError::Persistence {
        source: Box::new(e),
    }
}

/// Handle to one SQLite database file.
///
/// Cloning is cheap; clones share the background connection.
#[derive(Clone)]
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Open (or create) the database described by `config`, apply PRAGMAs,
    /// and run pending migrations.
    pub async fn open(config: &StorageConfig) -> Result<Self, TasklogError> {
        let conn = tokio_rusqlite::Connection::open(&config.database_path)
            .await
            .map_err(|e| TasklogError::Persistence {
                source: Box::new(e),
            })?;
        let db = Self { conn };
        db.prepare(config.wal_mode, config.busy_timeout_ms).await?;
        debug!(path = %config.database_path, wal = config.wal_mode, "database opened");
        Ok(db)
    }

    /// Open a private in-memory database with the full schema.
    pub async fn open_in_memory() -> Result<Self, TasklogError> {
        let conn = tokio_rusqlite::Connection::open_in_memory()
            .await
            .map_err(|e| TasklogError::Persistence {
                source: Box::new(e),
            })?;
        let db = Self { conn };
        db.prepare(false, StorageConfig::default().busy_timeout_ms)
            .await?;
        Ok(db)
    }

    async fn prepare(&self, wal_mode: bool, busy_timeout_ms: u64) -> Result<(), TasklogError> {
        self.conn
            .call(move |conn| -> Result<Result<(), TasklogError>, rusqlite::Error> {
                if wal_mode {
                    let mode: String = conn.pragma_update_and_check(
                        None,
                        "journal_mode",
                        "WAL",
                        |row| row.get(0),
                    )?;
                    debug!(journal_mode = %mode, "journal mode set");
                }
                conn.busy_timeout(Duration::from_millis(busy_timeout_ms))?;
                conn.pragma_update(None, "foreign_keys", "ON")?;
                conn.pragma_update(None, "synchronous", "NORMAL")?;
                Ok(crate::migrations::run_migrations(conn))
            })
            .await
            .map_err(map_tr_err)?
    }

    /// The underlying tokio-rusqlite connection.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Run `f` inside a deferred transaction.
    ///
    /// All reads in `f` observe one consistent snapshot of the database.
    pub async fn read<F, R>(&self, f: F) -> Result<R, TasklogError>
    where
        F: FnOnce(&Transaction<'_>) -> Result<R, TasklogError> + Send + 'static,
        R: Send + 'static,
    {
        self.transact(TransactionBehavior::Deferred, f).await
    }

    /// Run `f` inside an `IMMEDIATE` transaction.
    ///
    /// Concurrent writers on other connections wait for the busy timeout;
    /// readers are not blocked in WAL mode.
    pub async fn write<F, R>(&self, f: F) -> Result<R, TasklogError>
    where
        F: FnOnce(&Transaction<'_>) -> Result<R, TasklogError> + Send + 'static,
        R: Send + 'static,
    {
        self.transact(TransactionBehavior::Immediate, f).await
    }

    async fn transact<F, R>(
        &self,
        behavior: TransactionBehavior,
        f: F,
    ) -> Result<R, TasklogError>
    where
        F: FnOnce(&Transaction<'_>) -> Result<R, TasklogError> + Send + 'static,
        R: Send + 'static,
    {
        self.conn
            .call(move |conn| -> Result<Result<R, TasklogError>, rusqlite::Error> {
                let tx = conn.transaction_with_behavior(behavior)?;
                match f(&tx) {
                    Ok(value) => {
                        tx.commit()?;
                        Ok(Ok(value))
                    }
                    // Dropping the transaction rolls it back.
                    Err(e) => Ok(Err(e)),
                }
            })
            .await
            .map_err(map_tr_err)?
    }

    /// Checkpoint the WAL into the main database file.
    pub async fn checkpoint(&self) -> Result<(), TasklogError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        debug!("WAL checkpoint complete");
        Ok(())
    }

    /// Close the connection, waiting for queued work to finish.
    pub async fn close(self) -> Result<(), TasklogError> {
        self.conn.close().await.map_err(|e| TasklogError::Persistence {
            source: Box::new(e),
        })
    }
}
