// SPDX-FileCopyrightText: 2026 Tasklog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed queries over the task log, data state, data versions, and entity tables.
//!
//! Every function takes the caller's open transaction so several of them can
//! be combined into one atomic unit via [`crate::Database::write`].

pub mod data_state;
pub mod data_versions;
pub mod resources;
pub mod tasks;

/// SQL expression for the current UTC time, matching column defaults.
pub(crate) const NOW: &str = "strftime('%Y-%m-%dT%H:%M:%fZ', 'now')";
