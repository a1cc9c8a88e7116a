// SPDX-FileCopyrightText: 2026 Tasklog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain model types for storage entities.
//!
//! The canonical types live in `tasklog-core::types` so they can cross the
//! adapter trait boundary. This module re-exports them alongside the
//! storage-only row types.

pub use tasklog_core::types::{
    DataState, DataVersion, NewTask, ResourceKind, Task, VersionStates, VersionStatus,
};

/// One live row of a control-plane entity table.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceRow {
    pub id: String,
    pub tenant_id: Option<String>,
    /// JSON text of the entity.
    pub data: String,
}

/// Shape of the task log at one instant.
///
/// Captured under the snapshot read and compared again under the rebuild
/// write; any append or truncate in between changes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogFingerprint {
    pub count: i64,
    pub tail: Option<i64>,
}
