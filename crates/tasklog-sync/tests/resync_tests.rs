// SPDX-FileCopyrightText: 2026 Tasklog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end resync scenarios against a temp database.

use std::sync::{Arc, Mutex};

use serde_json::json;
use tasklog_core::{
    DataType, ResourceKind, ResourceMutation, StorageAdapter, Task, TaskType, TasklogError,
    VersionStatus, CONFIG_RESOURCE_ID, OPERATOR_TENANT,
};
use tasklog_storage::queries::data_versions;
use tasklog_sync::{ProgressObserver, ResyncOrchestrator, ResyncPhase};
use tasklog_test_utils::TestHarness;
use tokio_util::sync::CancellationToken;

fn cluster_config() -> serde_json::Value {
    json!({"uri": "http://mido:8181/midonet-api", "tunnel_protocol": "vxlan"})
}

/// Two networks and one port, five tasks in the log, all acknowledged, gate closed.
async fn ready_harness() -> TestHarness {
    TestHarness::builder()
        .with_resource(ResourceKind::Network, "n1")
        .with_resource(ResourceKind::Network, "n2")
        .with_resource(ResourceKind::Port, "p1")
        .with_mutation(ResourceMutation::update(
            ResourceKind::Port,
            "p1",
            json!({"id": "p1", "admin_state_up": false}),
        ))
        .with_mutation(ResourceMutation::update(
            ResourceKind::Network,
            "n1",
            json!({"id": "n1", "name": "renamed"}),
        ))
        .drained()
        .readonly()
        .build()
        .await
        .unwrap()
}

fn shape(tasks: &[Task]) -> Vec<(TaskType, Option<DataType>, Option<String>, Option<String>)> {
    tasks
        .iter()
        .map(|t| {
            (
                t.task_type,
                t.data_type,
                t.resource_id.clone(),
                t.data.clone(),
            )
        })
        .collect()
}

fn recorder() -> (ProgressObserver, Arc<Mutex<Vec<ResyncPhase>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let observer: ProgressObserver = Arc::new(move |phase: &ResyncPhase| {
        sink.lock().unwrap().push(phase.clone());
    });
    (observer, seen)
}

#[tokio::test]
async fn resync_rebuilds_log_and_activates_version() {
    let harness = ready_harness().await;
    assert_eq!(harness.data_state().await.unwrap().last_processed_task_id, Some(5));

    let report = ResyncOrchestrator::new(harness.db.clone())
        .resync(cluster_config(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(report.version, 1);
    assert_eq!(report.previous_version, None);
    assert_eq!(report.tasks_removed, 5);
    assert_eq!(report.tasks_written, 6);
    assert_eq!(report.last_task_id, 6);

    let tasks = harness.tasks().await.unwrap();
    let ids: Vec<i64> = tasks.iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![1, 2, 3, 4, 5, 6]);

    let kinds: Vec<(TaskType, Option<DataType>)> =
        tasks.iter().map(|t| (t.task_type, t.data_type)).collect();
    assert_eq!(
        kinds,
        vec![
            (TaskType::Flush, Some(DataType::DataVersionSync)),
            (TaskType::Create, Some(DataType::Config)),
            (TaskType::Create, Some(DataType::Resource(ResourceKind::Network))),
            (TaskType::Create, Some(DataType::Resource(ResourceKind::Network))),
            (TaskType::Create, Some(DataType::Resource(ResourceKind::Port))),
            (TaskType::Create, Some(DataType::DataVersionActivate)),
        ]
    );

    assert_eq!(tasks[1].resource_id.as_deref(), Some(CONFIG_RESOURCE_ID));
    assert_eq!(
        tasks[1].payload().unwrap().unwrap()["uri"],
        "http://mido:8181/midonet-api"
    );
    assert_eq!(tasks[2].resource_id.as_deref(), Some("n1"));
    assert_eq!(tasks[2].payload().unwrap().unwrap()["name"], "renamed");
    assert_eq!(tasks[3].resource_id.as_deref(), Some("n2"));
    assert_eq!(tasks[4].payload().unwrap().unwrap()["admin_state_up"], false);
    assert!(tasks.iter().all(|t| t.tenant_id.as_deref() == Some(OPERATOR_TENANT)
        && t.transaction_id.as_deref() == Some("sync-v1")));

    let versions = harness.versions().await.unwrap();
    assert_eq!(versions.len(), 1);
    assert!(versions[0].states().is_completed());
    assert!(versions[0].sync_finished_at.is_some());

    let state = harness.data_state().await.unwrap();
    assert_eq!(state.active_version, Some(1));
    assert!(state.readonly);
    assert_eq!(state.last_processed_task_id, None);
}

#[tokio::test]
async fn empty_database_resyncs() {
    let harness = TestHarness::builder().readonly().build().await.unwrap();
    let report = ResyncOrchestrator::new(harness.db.clone())
        .resync(cluster_config(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(report.tasks_written, 3);
    assert_eq!(report.tasks_removed, 0);
    assert!(report.rows_by_kind.iter().all(|(_, count)| *count == 0));
}

#[tokio::test]
async fn unacknowledged_tasks_block_resync() {
    let harness = TestHarness::builder()
        .with_resource(ResourceKind::Network, "n1")
        .with_resource(ResourceKind::Network, "n2")
        .readonly()
        .build()
        .await
        .unwrap();

    let err = ResyncOrchestrator::new(harness.db.clone())
        .resync(cluster_config(), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        TasklogError::PendingTasks {
            last_processed: None,
            most_recent: 2
        }
    ));
    assert!(err.is_precondition());
    assert!(harness.versions().await.unwrap().is_empty());
    assert_eq!(harness.tasks().await.unwrap().len(), 2);
}

#[tokio::test]
async fn lagging_watermark_blocks_resync() {
    let harness = TestHarness::builder()
        .with_resource(ResourceKind::Subnet, "s1")
        .drained()
        .build()
        .await
        .unwrap();
    harness
        .storage
        .apply_mutation(&ResourceMutation::delete(ResourceKind::Subnet, "s1"))
        .await
        .unwrap();
    harness.storage.set_readonly(true).await.unwrap();

    let err = ResyncOrchestrator::new(harness.db.clone())
        .resync(cluster_config(), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        TasklogError::PendingTasks {
            last_processed: Some(1),
            most_recent: 2
        }
    ));
}

#[tokio::test]
async fn open_gate_blocks_resync() {
    let harness = TestHarness::builder()
        .with_resource(ResourceKind::Router, "r1")
        .drained()
        .build()
        .await
        .unwrap();
    let err = ResyncOrchestrator::new(harness.db.clone())
        .resync(cluster_config(), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, TasklogError::NotReadOnly));
    assert!(harness.versions().await.unwrap().is_empty());
}

#[tokio::test]
async fn in_flight_version_blocks_until_retired() {
    let harness = ready_harness().await;
    harness.db.write(data_versions::begin).await.unwrap();

    let orchestrator = ResyncOrchestrator::new(harness.db.clone());
    let err = orchestrator
        .resync(cluster_config(), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        TasklogError::ConcurrentResync {
            version: 1,
            sync_status: Some(VersionStatus::Started),
            sync_tasks_status: Some(VersionStatus::Started),
        }
    ));

    harness.storage.abort_version(1).await.unwrap();
    let err = orchestrator
        .resync(cluster_config(), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        TasklogError::ConcurrentResync {
            sync_status: Some(VersionStatus::Aborted),
            ..
        }
    ));

    harness.storage.retire_version(1).await.unwrap();
    let report = orchestrator
        .resync(cluster_config(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(report.version, 2);
}

#[tokio::test]
async fn injected_failure_marks_version_error() {
    let harness = ready_harness().await;
    let before = harness.tasks().await.unwrap();
    harness
        .fail_appends_of(DataType::DataVersionActivate)
        .await
        .unwrap();

    let err = ResyncOrchestrator::new(harness.db.clone())
        .resync(cluster_config(), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, TasklogError::Persistence { .. }));

    let versions = harness.versions().await.unwrap();
    assert_eq!(versions.len(), 1);
    assert_eq!(versions[0].sync_status, Some(VersionStatus::Error));
    assert_eq!(versions[0].sync_tasks_status, Some(VersionStatus::Error));
    assert!(!versions[0].stale);

    assert_eq!(harness.data_state().await.unwrap().active_version, None);
    assert_eq!(shape(&harness.tasks().await.unwrap()), shape(&before));

    // A failed version keeps blocking until an operator retires it.
    harness.clear_injected_failures().await.unwrap();
    let orchestrator = ResyncOrchestrator::new(harness.db.clone());
    let err = orchestrator
        .resync(cluster_config(), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, TasklogError::ConcurrentResync { version: 1, .. }));
}

#[tokio::test]
async fn failure_keeps_previous_active_version() {
    let harness = ready_harness().await;
    let orchestrator = ResyncOrchestrator::new(harness.db.clone());
    orchestrator
        .resync(cluster_config(), &CancellationToken::new())
        .await
        .unwrap();
    harness.drain().await.unwrap();

    harness
        .fail_appends_of(DataType::Resource(ResourceKind::Port))
        .await
        .unwrap();
    orchestrator
        .resync(cluster_config(), &CancellationToken::new())
        .await
        .unwrap_err();

    let state = harness.data_state().await.unwrap();
    assert_eq!(state.active_version, Some(1));
    let versions = harness.versions().await.unwrap();
    assert!(versions[0].states().is_completed());
    assert!(!versions[0].stale);
    assert_eq!(versions[1].sync_status, Some(VersionStatus::Error));
    assert_eq!(harness.tasks().await.unwrap().len(), 6);
}

#[tokio::test]
async fn cancellation_before_rebuild_aborts_version() {
    let harness = ready_harness().await;
    let before = harness.tasks().await.unwrap();
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    let observer: ProgressObserver = Arc::new(move |phase: &ResyncPhase| {
        if matches!(phase, ResyncPhase::SnapshotTaken { .. }) {
            trigger.cancel();
        }
    });

    let err = ResyncOrchestrator::new(harness.db.clone())
        .with_observer(observer)
        .resync(cluster_config(), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, TasklogError::Cancelled));

    let versions = harness.versions().await.unwrap();
    assert_eq!(versions[0].sync_status, Some(VersionStatus::Aborted));
    assert_eq!(versions[0].sync_tasks_status, Some(VersionStatus::Aborted));
    assert_eq!(harness.data_state().await.unwrap().active_version, None);
    assert_eq!(shape(&harness.tasks().await.unwrap()), shape(&before));
}

#[tokio::test]
async fn cancellation_mid_rebuild_rolls_back_truncate() {
    let harness = ready_harness().await;
    let before = harness.tasks().await.unwrap();
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    let observer: ProgressObserver = Arc::new(move |phase: &ResyncPhase| {
        if let ResyncPhase::KindReplayed {
            kind: ResourceKind::Network,
            ..
        } = phase
        {
            trigger.cancel();
        }
    });

    let err = ResyncOrchestrator::new(harness.db.clone())
        .with_observer(observer)
        .resync(cluster_config(), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, TasklogError::Cancelled));
    assert_eq!(shape(&harness.tasks().await.unwrap()), shape(&before));
    assert_eq!(
        harness.versions().await.unwrap()[0].sync_status,
        Some(VersionStatus::Aborted)
    );
}

#[tokio::test]
async fn back_to_back_resyncs_produce_identical_logs() {
    let harness = ready_harness().await;
    let orchestrator = ResyncOrchestrator::new(harness.db.clone());

    orchestrator
        .resync(cluster_config(), &CancellationToken::new())
        .await
        .unwrap();
    let first = harness.tasks().await.unwrap();
    harness.drain().await.unwrap();

    let report = orchestrator
        .resync(cluster_config(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(report.previous_version, Some(1));
    let second = harness.tasks().await.unwrap();

    // Transaction ids differ between runs; the intents match.
    assert_eq!(shape(&first), shape(&second));

    let versions = harness.versions().await.unwrap();
    assert_eq!(versions.len(), 2);
    assert!(versions.iter().all(|v| v.states().is_completed()));
    assert!(versions[0].stale);
    assert!(!versions[1].stale);
    assert_eq!(harness.data_state().await.unwrap().active_version, Some(2));
}

#[tokio::test]
async fn consumer_acknowledges_a_log_shorter_than_its_watermark() {
    let mut builder = TestHarness::builder().with_resource(ResourceKind::Network, "n1");
    for i in 0..9 {
        builder = builder.with_mutation(ResourceMutation::update(
            ResourceKind::Network,
            "n1",
            json!({"id": "n1", "name": format!("rev{i}")}),
        ));
    }
    let harness = builder.drained().readonly().build().await.unwrap();
    assert_eq!(harness.data_state().await.unwrap().last_processed_task_id, Some(10));

    let orchestrator = ResyncOrchestrator::new(harness.db.clone());
    let report = orchestrator
        .resync(cluster_config(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(report.last_task_id, 4);

    // The new log is unread: a consumer polls it from the start.
    let state = harness.data_state().await.unwrap();
    assert_eq!(state.last_processed_task_id, None);
    let unread = harness
        .storage
        .tasks_after(state.last_processed_task_id, None)
        .await
        .unwrap();
    assert_eq!(unread.len(), 4);
    assert_eq!(unread[0].data_type, Some(DataType::DataVersionSync));

    for id in 1..=report.last_task_id {
        assert!(harness.storage.advance_watermark(id).await.unwrap());
    }
    assert_eq!(harness.data_state().await.unwrap().last_processed_task_id, Some(4));

    let second = orchestrator
        .resync(cluster_config(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(second.previous_version, Some(1));
    assert_eq!(harness.data_state().await.unwrap().active_version, Some(2));
}

#[tokio::test]
async fn unacknowledged_rebuild_blocks_next_resync() {
    let harness = ready_harness().await;
    let orchestrator = ResyncOrchestrator::new(harness.db.clone());
    orchestrator
        .resync(cluster_config(), &CancellationToken::new())
        .await
        .unwrap();

    let err = orchestrator
        .resync(cluster_config(), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        TasklogError::PendingTasks {
            last_processed: None,
            most_recent: 6,
        }
    ));
}

#[tokio::test]
async fn observer_sees_every_phase_in_order() {
    let harness = ready_harness().await;
    let (observer, seen) = recorder();
    ResyncOrchestrator::new(harness.db.clone())
        .with_observer(observer)
        .resync(cluster_config(), &CancellationToken::new())
        .await
        .unwrap();

    let seen = seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 3 + ResourceKind::SNAPSHOT_ORDER.len() + 1);
    assert_eq!(seen[0], ResyncPhase::Registered { version: 1 });
    assert_eq!(seen[1], ResyncPhase::SnapshotTaken { rows: 3 });
    assert_eq!(seen[2], ResyncPhase::LogTruncated { removed: 5 });
    assert_eq!(
        seen[3],
        ResyncPhase::KindReplayed {
            kind: ResourceKind::Network,
            count: 2
        }
    );
    assert_eq!(seen.last(), Some(&ResyncPhase::Activated { version: 1 }));
}

#[tokio::test]
async fn reopened_gate_during_resync_is_stale_state() {
    let harness = ready_harness().await;
    let storage = Arc::clone(&harness.storage);
    let db = harness.db.clone();
    let observer: ProgressObserver = Arc::new(move |phase: &ResyncPhase| {
        if matches!(phase, ResyncPhase::SnapshotTaken { .. }) {
            // A second operator toggles the gate between snapshot and rebuild.
            let db = db.clone();
            std::thread::spawn(move || {
                let rt = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .unwrap();
                rt.block_on(db.write(|tx| {
                    tasklog_storage::queries::data_state::set_readonly(tx, false)?;
                    tasklog_storage::queries::data_state::set_readonly(tx, true)
                }))
                .unwrap();
            })
            .join()
            .unwrap();
        }
    });

    let err = ResyncOrchestrator::new(harness.db.clone())
        .with_observer(observer)
        .resync(cluster_config(), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, TasklogError::StaleDataState { .. }));
    assert_eq!(storage.data_state().await.unwrap().active_version, None);
    assert_eq!(
        harness.versions().await.unwrap()[0].sync_status,
        Some(VersionStatus::Error)
    );
}
