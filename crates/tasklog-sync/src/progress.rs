// SPDX-FileCopyrightText: 2026 Tasklog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Phase events emitted while a resync runs.

use std::sync::Arc;

use serde::Serialize;
use strum::IntoStaticStr;
use tasklog_core::{ResourceKind, VersionId};

/// Callback invoked at every phase boundary.
///
/// Events raised inside the rebuild transaction are delivered from the
/// database thread; observers must not block.
pub type ProgressObserver = Arc<dyn Fn(&ResyncPhase) + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, IntoStaticStr)]
#[serde(tag = "phase", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ResyncPhase {
    /// Preconditions held and the version row exists.
    Registered { version: VersionId },
    /// Every entity table was read.
    SnapshotTaken { rows: usize },
    /// The old log is gone (not yet committed).
    LogTruncated { removed: usize },
    /// All rows of one kind were appended.
    KindReplayed { kind: ResourceKind, count: usize },
    /// The rebuild committed and the version is active.
    Activated { version: VersionId },
}

impl std::fmt::Display for ResyncPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResyncPhase::Registered { version } => write!(f, "registered data version {version}"),
            ResyncPhase::SnapshotTaken { rows } => write!(f, "snapshot taken ({rows} rows)"),
            ResyncPhase::LogTruncated { removed } => {
                write!(f, "task log truncated ({removed} tasks removed)")
            }
            ResyncPhase::KindReplayed { kind, count } => write!(f, "replayed {count} {kind}"),
            ResyncPhase::Activated { version } => write!(f, "data version {version} active"),
        }
    }
}

pub(crate) fn emit(observer: &Option<ProgressObserver>, phase: ResyncPhase) {
    tracing::debug!(phase = <&'static str>::from(&phase), "{phase}");
    if let Some(observer) = observer {
        observer(&phase);
    }
}
