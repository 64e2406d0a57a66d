use anyhow::Result;
use parkwatch::*;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

/// Renders a bucket start as local `HH:MM` for the series log line.
fn bucket_label(ts_ms: u64) -> String {
    chrono::DateTime::from_timestamp_millis(ts_ms as i64)
        .map(|t| t.with_timezone(&chrono::Local).format("%H:%M").to_string())
        .unwrap_or_else(|| "--:--".into())
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();

    let app_config = config::AppConfig::load()?;
    let geofence = Arc::new(app_config.build_geofence()?);
    let roster = app_config.roster();
    tracing::info!(
        version = %version::user_agent(),
        vehicles = roster.len(),
        parking_zones = geofence.parking_zones().len(),
        non_parking_zones = geofence.non_parking_zones().len(),
        "Starting monitor"
    );
    if let Some(view) = geofence.map_bounds(app_config.geofence.map_padding_deg) {
        tracing::info!(
            south = view.min().y,
            west = view.min().x,
            north = view.max().y,
            east = view.max().x,
            "Map viewport"
        );
    }

    let store = metrics_store::MetricsStore::new(
        app_config.metrics.bucket_width_ms,
        app_config.metrics.retention_buckets,
    );
    let (notify_tx, mut notify_rx) =
        broadcast::channel::<models::Notification>(app_config.notifications.broadcast_capacity);
    // Kept alive for the process lifetime; dropping it would close the command channel.
    let (_command_tx, command_rx) = mpsc::channel::<worker::Command>(32);
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

    let (mut analytics_rx, analytics_subscription) = store.subscribe_channel(16);
    let analytics_handle = tokio::spawn(async move {
        loop {
            match analytics_rx.recv().await {
                Ok(snapshot) => {
                    let m = &snapshot.metrics;
                    tracing::info!(
                        in_boundary = m.total_in_boundary,
                        moving = m.moving_count,
                        parked = m.parked_count,
                        violating = m.violating_count,
                        warnings = m.warnings_count,
                        avg_violation = %tracker::format_duration(m.avg_violation_ms),
                        buckets = snapshot.timestamps.len(),
                        since = %snapshot.timestamps.first().map(|&ts| bucket_label(ts)).unwrap_or_default(),
                        "Live analytics"
                    );
                    match serde_json::to_string(&snapshot) {
                        Ok(json) => tracing::debug!(payload = %json, "analytics snapshot"),
                        Err(e) => tracing::warn!(error = %e, "failed to serialize snapshot"),
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!("Analytics consumer lagged, skipped {} snapshots", n);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let notification_handle = tokio::spawn(async move {
        loop {
            match notify_rx.recv().await {
                Ok(n) => tracing::info!(
                    vehicle_id = n.vehicle_id,
                    kind = ?n.kind,
                    display_ms = n.display_for_ms,
                    "{}",
                    n.message
                ),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!("Notification consumer lagged, skipped {} notifications", n);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let worker_handle = worker::spawn(
        worker::WorkerDeps {
            tracker: tracker::ViolationTracker::new(roster, app_config.warning_threshold()),
            geofence: geofence.clone(),
            store: store.clone(),
            notify_tx,
            commands: command_rx,
            shutdown_rx,
        },
        worker::WorkerConfig {
            tick_interval_ms: app_config.tracking.tick_interval_ms,
            jitter_interval_ms: app_config
                .simulation
                .enabled
                .then_some(app_config.simulation.jitter_interval_ms),
            jitter_step_deg: app_config.simulation.jitter_step_deg,
            scatter_step_deg: app_config.simulation.scatter_step_deg,
            notification_display_ms: app_config.notifications.display_ms,
            stats_log_interval_secs: app_config.monitoring.stats_log_interval_secs,
        },
    );

    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    tokio::signal::ctrl_c().await?;

    tracing::info!("Received shutdown signal");
    let _ = shutdown_tx.send(());
    let tracker = worker_handle.await?;
    drop(analytics_subscription);
    let _ = analytics_handle.await;
    let _ = notification_handle.await;

    tracing::info!(
        violating = tracker.violations().len(),
        "Monitor stopped"
    );
    Ok(())
}
