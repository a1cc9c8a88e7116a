// SPDX-FileCopyrightText: 2026 Tasklog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence for the task log and its coordination records.
//!
//! Provides WAL-mode SQLite storage with embedded migrations, a single
//! background connection per handle via `tokio-rusqlite`, and typed queries
//! that run inside the caller's transaction so an entity write and its task
//! append commit or roll back together.

pub mod adapter;
pub mod database;
pub mod migrations;
pub mod models;
pub mod queries;

pub use adapter::SqliteStorage;
pub use database::Database;
pub use models::*;
