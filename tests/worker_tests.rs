// Worker integration test: spawn, tick, commands, notifications, shutdown returns the roster

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use parkwatch::metrics_store::MetricsStore;
use parkwatch::models::{Notification, NotificationKind, Position};
use parkwatch::tracker::ViolationTracker;
use parkwatch::worker::{Command, WorkerConfig, WorkerDeps, spawn};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(2);

fn test_config() -> WorkerConfig {
    WorkerConfig {
        tick_interval_ms: 20,
        jitter_interval_ms: None,
        jitter_step_deg: 0.0,
        scatter_step_deg: 0.003,
        notification_display_ms: 2500,
        stats_log_interval_secs: 60,
    }
}

async fn next_of_kind(
    rx: &mut broadcast::Receiver<Notification>,
    kind: NotificationKind,
) -> Notification {
    timeout(WAIT, async {
        loop {
            let n = rx.recv().await.expect("notification channel open");
            if n.kind == kind {
                return n;
            }
        }
    })
    .await
    .expect("notification in time")
}

#[tokio::test]
async fn worker_ticks_handles_commands_and_shuts_down() {
    let fence = Arc::new(test_fence());
    let store = MetricsStore::default();
    let (notify_tx, mut notify_rx) = broadcast::channel(16);
    let (command_tx, command_rx) = mpsc::channel(8);
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let (mut analytics_rx, _sub) = store.subscribe_channel(64);

    let tracker = ViolationTracker::new(
        vec![vehicle(7, IN_NON_PARKING, true), vehicle(1, IN_GENERAL, false)],
        Duration::from_secs(120),
    );
    let handle = spawn(
        WorkerDeps {
            tracker,
            geofence: fence.clone(),
            store: store.clone(),
            notify_tx,
            commands: command_rx,
            shutdown_rx,
        },
        test_config(),
    );

    let detected = next_of_kind(&mut notify_rx, NotificationKind::ViolationDetected).await;
    assert_eq!(detected.vehicle_id, 7);
    assert_eq!(detected.display_for_ms, 2500);

    let first = timeout(WAIT, analytics_rx.recv())
        .await
        .expect("snapshot in time")
        .expect("snapshot");
    assert_eq!(first.metrics.total_in_boundary, 2);
    assert_eq!(first.metrics.violating_count, 1);
    assert_eq!(first.timestamps.len(), 1);

    command_tx.send(Command::IssueWarning(7)).await.unwrap();
    let warned = next_of_kind(&mut notify_rx, NotificationKind::WarningIssued).await;
    assert_eq!(warned.vehicle_id, 7);
    assert_eq!(warned.message, "Warning issued to Vehicle 7");

    command_tx
        .send(Command::UpdatePosition {
            vehicle_id: 7,
            position: IN_GENERAL,
            is_stationary: None,
        })
        .await
        .unwrap();

    // Wait until a tick has seen the vehicle leave the zone.
    timeout(WAIT, async {
        loop {
            match analytics_rx.recv().await {
                Ok(snapshot) if snapshot.metrics.violating_count == 0 => break,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => panic!("analytics channel closed"),
            }
        }
    })
    .await
    .expect("violation cleared in time");

    shutdown_tx.send(()).unwrap();
    let tracker = timeout(WAIT, handle).await.expect("shutdown in time").unwrap();
    let v = tracker.vehicle(7).unwrap();
    assert_eq!(v.position, IN_GENERAL);
    assert!(!v.is_tracked());
    assert!(tracker.violations().is_empty());
    assert_eq!(store.latest().map(|m| m.violating_count), Some(0));
}

#[tokio::test]
async fn worker_skips_publish_when_metrics_unchanged() {
    let fence = Arc::new(test_fence());
    let store = MetricsStore::default();
    let (notify_tx, _notify_rx) = broadcast::channel(16);
    let (_command_tx, command_rx) = mpsc::channel(8);
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let published = Arc::new(parking_lot::Mutex::new(0usize));
    let counter = published.clone();
    let _sub = store.subscribe(move |_| *counter.lock() += 1);

    let handle = spawn(
        WorkerDeps {
            tracker: ViolationTracker::new(
                vec![vehicle(3, IN_PARKING, true)],
                Duration::from_secs(120),
            ),
            geofence: fence,
            store: store.clone(),
            notify_tx,
            commands: command_rx,
            shutdown_rx,
        },
        test_config(),
    );

    tokio::time::sleep(Duration::from_millis(200)).await;
    shutdown_tx.send(()).unwrap();
    timeout(WAIT, handle).await.expect("shutdown in time").unwrap();
    assert_eq!(*published.lock(), 1);
}

#[tokio::test]
async fn worker_scatter_and_jitter_keep_running() {
    let fence = Arc::new(test_fence());
    let store = MetricsStore::default();
    let (notify_tx, _notify_rx) = broadcast::channel(16);
    let (command_tx, command_rx) = mpsc::channel(8);
    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    let handle = spawn(
        WorkerDeps {
            tracker: ViolationTracker::new(
                vec![vehicle(1, IN_GENERAL, false), vehicle(2, IN_PARKING, true)],
                Duration::from_secs(120),
            ),
            geofence: fence,
            store,
            notify_tx,
            commands: command_rx,
            shutdown_rx,
        },
        WorkerConfig {
            jitter_interval_ms: Some(10),
            jitter_step_deg: 0.01,
            ..test_config()
        },
    );

    command_tx.send(Command::Scatter).await.unwrap();
    drop(command_tx);
    tokio::time::sleep(Duration::from_millis(100)).await;
    shutdown_tx.send(()).unwrap();
    let tracker = timeout(WAIT, handle).await.expect("shutdown in time").unwrap();
    assert_ne!(tracker.vehicle(1).unwrap().position, IN_GENERAL);
    assert_ne!(tracker.vehicle(2).unwrap().position, IN_PARKING);
    assert!(tracker.vehicle(2).unwrap().is_stationary);
}

#[tokio::test]
async fn worker_scatter_clamps_to_boundary_box() {
    let fence = Arc::new(test_fence());
    let (notify_tx, _notify_rx) = broadcast::channel(16);
    let (command_tx, command_rx) = mpsc::channel(64);
    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    let handle = spawn(
        WorkerDeps {
            tracker: ViolationTracker::new(
                vec![
                    vehicle(1, Position::new(0.0, 0.0), true),
                    vehicle(2, Position::new(10.0, 10.0), true),
                ],
                Duration::from_secs(120),
            ),
            geofence: fence,
            store: MetricsStore::default(),
            notify_tx,
            commands: command_rx,
            shutdown_rx,
        },
        WorkerConfig {
            scatter_step_deg: 2.0,
            ..test_config()
        },
    );

    for _ in 0..20 {
        command_tx.send(Command::Scatter).await.unwrap();
    }
    drop(command_tx);
    tokio::time::sleep(Duration::from_millis(100)).await;
    shutdown_tx.send(()).unwrap();
    let tracker = timeout(WAIT, handle).await.expect("shutdown in time").unwrap();
    for v in tracker.vehicles() {
        assert!((0.0..=10.0).contains(&v.position.latitude), "{:?}", v.position);
        assert!((0.0..=10.0).contains(&v.position.longitude), "{:?}", v.position);
    }
}
