// Monitoring worker: the single task that owns the roster.
// The tracker is never shared: other tasks reach it only through `Command`s.

use std::sync::Arc;

use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{Duration, Instant, interval};
use tracing::Instrument;

use crate::geofence::Geofence;
use crate::metrics_store::MetricsStore;
use crate::models::{LiveMetrics, Notification, Position, VehicleId};
use crate::simulation;
use crate::tracker::{ViolationTracker, WarningOutcome};

/// Rate limit for the "no notification receivers" message.
const NO_RECEIVERS_LOG_INTERVAL: Duration = Duration::from_secs(60);

/// Current wall-clock time in epoch milliseconds.
pub fn epoch_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_else(|e| {
            tracing::warn!(
                error = %e,
                operation = "get_timestamp",
                "system time error"
            );
            0
        })
}

/// Requests handled by the worker between ticks.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    UpdatePosition {
        vehicle_id: VehicleId,
        position: Position,
        is_stationary: Option<bool>,
    },
    IssueWarning(VehicleId),
    /// Move every vehicle by a random offset, clamped to the boundary's bounding box.
    Scatter,
}

/// State, channels and shutdown for the worker.
pub struct WorkerDeps {
    pub tracker: ViolationTracker,
    pub geofence: Arc<Geofence>,
    pub store: MetricsStore,
    pub notify_tx: broadcast::Sender<Notification>,
    pub commands: mpsc::Receiver<Command>,
    pub shutdown_rx: oneshot::Receiver<()>,
}

/// Worker timing. Simulation is off when `jitter_interval_ms` is `None`.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub tick_interval_ms: u64,
    pub jitter_interval_ms: Option<u64>,
    pub jitter_step_deg: f64,
    pub scatter_step_deg: f64,
    pub notification_display_ms: u64,
    pub stats_log_interval_secs: u64,
}

struct Notifier {
    tx: broadcast::Sender<Notification>,
    display_ms: u64,
    last_no_receivers_log: Option<Instant>,
}

impl Notifier {
    fn send(&mut self, notification: Notification) {
        if self.tx.send(notification).is_err() {
            let should_log = self
                .last_no_receivers_log
                .is_none_or(|t| t.elapsed() >= NO_RECEIVERS_LOG_INTERVAL);
            if should_log {
                tracing::debug!(
                    operation = "notify",
                    "No notification receivers; dropping notification"
                );
                self.last_no_receivers_log = Some(Instant::now());
            }
        }
    }
}

/// Publishes metrics only when an aggregate value differs from the last publish.
fn publish_if_changed(store: &MetricsStore, last: &mut Option<LiveMetrics>, metrics: LiveMetrics) {
    if last.is_some_and(|prev| prev.same_values(&metrics)) {
        return;
    }
    store.publish(metrics);
    *last = Some(metrics);
}

fn apply_command(
    command: Command,
    tracker: &mut ViolationTracker,
    geofence: &Geofence,
    notifier: &mut Notifier,
    rng: &mut StdRng,
    config: &WorkerConfig,
) {
    match command {
        Command::UpdatePosition {
            vehicle_id,
            position,
            is_stationary,
        } => {
            if !tracker.update_position(vehicle_id, position, is_stationary) {
                tracing::debug!(vehicle_id, "position update for unknown vehicle ignored");
            }
        }
        Command::IssueWarning(vehicle_id) => match tracker.issue_warning(vehicle_id, epoch_ms()) {
            WarningOutcome::Issued | WarningOutcome::AlreadyIssued => notifier.send(
                Notification::warning_issued(vehicle_id, epoch_ms(), notifier.display_ms),
            ),
            WarningOutcome::UnknownVehicle => {}
        },
        Command::Scatter => match geofence.map_bounds(0.0) {
            Some(bounds) => {
                simulation::scatter(tracker.vehicles_mut(), rng, config.scatter_step_deg, bounds)
            }
            None => tracing::warn!(operation = "scatter", "geofence has no bounds"),
        },
    }
}

/// Spawns the worker. The handle resolves to the tracker once shutdown is signalled
/// (or every command sender is gone and shutdown fires).
pub fn spawn(deps: WorkerDeps, config: WorkerConfig) -> tokio::task::JoinHandle<ViolationTracker> {
    let WorkerDeps {
        mut tracker,
        geofence,
        store,
        notify_tx,
        mut commands,
        mut shutdown_rx,
    } = deps;

    let worker_span = tracing::span!(
        tracing::Level::DEBUG,
        "worker",
        tick_interval_ms = config.tick_interval_ms
    );

    let task = async move {
        let mut tick = interval(Duration::from_millis(config.tick_interval_ms));
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut jitter_tick = config
            .jitter_interval_ms
            .map(|ms| interval(Duration::from_millis(ms)));
        if let Some(t) = jitter_tick.as_mut() {
            t.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        }
        let mut stats_log_tick = interval(Duration::from_secs(config.stats_log_interval_secs));
        stats_log_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        let mut notifier = Notifier {
            tx: notify_tx,
            display_ms: config.notification_display_ms,
            last_no_receivers_log: None,
        };
        let mut rng = StdRng::from_entropy();
        let mut last_published: Option<LiveMetrics> = None;
        let mut commands_open = true;
        let mut ticks_total: u64 = 0;

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    let now = epoch_ms();
                    let report = tracker.tick(&geofence, now);
                    ticks_total += 1;
                    for &id in &report.newly_violating {
                        notifier.send(Notification::violation_detected(id, now, notifier.display_ms));
                    }
                    publish_if_changed(&store, &mut last_published, tracker.live_metrics(&geofence, now));
                }
                _ = async {
                    match jitter_tick.as_mut() {
                        Some(t) => { t.tick().await; }
                        None => std::future::pending::<()>().await,
                    }
                } => {
                    let moved = simulation::jitter_moving(tracker.vehicles_mut(), &mut rng, config.jitter_step_deg);
                    tracing::trace!(moved, "simulated movement");
                }
                command = commands.recv(), if commands_open => {
                    match command {
                        Some(command) => apply_command(command, &mut tracker, &geofence, &mut notifier, &mut rng, &config),
                        None => {
                            tracing::debug!("Command channel closed");
                            commands_open = false;
                        }
                    }
                }
                _ = &mut shutdown_rx => {
                    tracing::debug!("Worker shutting down");
                    break;
                }
                _ = stats_log_tick.tick() => {
                    let metrics = tracker.live_metrics(&geofence, epoch_ms());
                    tracing::info!(
                        vehicles = tracker.vehicles().len(),
                        in_boundary = metrics.total_in_boundary,
                        violating = metrics.violating_count,
                        warnings = metrics.warnings_count,
                        ticks_total,
                        subscribers = store.subscriber_count(),
                        "monitor stats"
                    );
                }
            }
        }
        tracker
    };
    tokio::spawn(task.instrument(worker_span))
}
