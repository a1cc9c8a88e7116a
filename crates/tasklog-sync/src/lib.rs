// SPDX-FileCopyrightText: 2026 Tasklog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Rebuilding the task log from the control-plane tables.
//!
//! [`ResyncOrchestrator`] is the only writer of data versions: it checks the
//! preconditions, snapshots every entity table under one read transaction,
//! and rewrites the log and promotes the new version under one write
//! transaction. [`maintenance`] holds the unversioned flush and import
//! operations.

pub mod maintenance;
pub mod orchestrator;
pub mod preconditions;
pub mod progress;
pub mod snapshot;

pub use maintenance::{flush, import, ImportReport};
pub use orchestrator::{ResyncOrchestrator, ResyncReport};
pub use progress::{ProgressObserver, ResyncPhase};
pub use snapshot::Snapshot;

use tasklog_core::TasklogError;
use tokio_util::sync::CancellationToken;

/// Fail with `Cancelled` once the token fired.
pub(crate) fn check_cancel(cancel: &CancellationToken) -> Result<(), TasklogError> {
    if cancel.is_cancelled() {
        Err(TasklogError::Cancelled)
    } else {
        Ok(())
    }
}
