// SPDX-FileCopyrightText: 2026 Tasklog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the task-log synchronization engine.
//!
//! This crate provides the error type, the domain types of the task log and
//! its coordination records, and the storage adapter traits implemented by
//! the persistence crate.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::TasklogError;
pub use types::{
    DataState, DataType, DataVersion, HealthStatus, NewTask, ResourceKind, ResourceMutation,
    Task, TaskId, TaskType, VersionId, VersionStates, VersionStatus, BOOTSTRAP_TASK_ID,
    CONFIG_RESOURCE_ID, OPERATOR_TENANT,
};

pub use traits::{PluginAdapter, StorageAdapter};
