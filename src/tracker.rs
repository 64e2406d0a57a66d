// Violation tracking over the vehicle roster.
// Each tick reclassifies every vehicle, starts/clears violation timers and raises
// warnings once a violation has lasted the configured threshold.

use std::time::Duration;

use crate::geofence::{Geofence, classify};
use crate::models::{Classification, LiveMetrics, MotionStatus, Position, Vehicle, VehicleId};

/// How long a vehicle may stay parked in a non-parking zone before a warning is issued.
pub const DEFAULT_WARNING_THRESHOLD: Duration = Duration::from_secs(120);

/// Applies the per-vehicle state machine. Returns `None` when nothing changes.
///
/// - not violating: clear `violation_started_at` and `warning_issued` if either is set
/// - violating, untracked: start the timer at `now`
/// - violating, tracked: keep the start time; raise `warning_issued` once
///   `now - start >= threshold_ms`. The flag stays set until the violation clears.
fn transition(vehicle: &Vehicle, violation: bool, now: u64, threshold_ms: u64) -> Option<Vehicle> {
    if !violation {
        if !vehicle.is_tracked() {
            return None;
        }
        return Some(Vehicle {
            violation_started_at: None,
            warning_issued: false,
            ..vehicle.clone()
        });
    }

    let started = vehicle.violation_started_at.unwrap_or(now);
    let elapsed = now.saturating_sub(started);
    let warning_issued = vehicle.warning_issued || elapsed >= threshold_ms;

    if vehicle.violation_started_at == Some(started) && vehicle.warning_issued == warning_issued {
        return None;
    }
    Some(Vehicle {
        violation_started_at: Some(started),
        warning_issued,
        ..vehicle.clone()
    })
}

/// Output of [`reconcile`].
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled {
    /// The updated roster, or `None` when no vehicle changed.
    pub vehicles: Option<Vec<Vehicle>>,
    /// Ids currently in violation, in roster order.
    pub violating: Vec<VehicleId>,
}

/// Pure tick: reclassifies `vehicles` at `now` without touching the input.
pub fn reconcile(
    vehicles: &[Vehicle],
    geofence: &Geofence,
    now: u64,
    threshold_ms: u64,
) -> Reconciled {
    let mut violating = Vec::new();
    let mut changed = false;
    let updated: Vec<Vehicle> = vehicles
        .iter()
        .map(|v| {
            let violation = classify(v, geofence).violation;
            if violation {
                violating.push(v.id);
            }
            match transition(v, violation, now, threshold_ms) {
                Some(next) => {
                    changed = true;
                    next
                }
                None => v.clone(),
            }
        })
        .collect();

    Reconciled {
        vehicles: changed.then_some(updated),
        violating,
    }
}

/// Aggregate metrics over the vehicles inside the boundary.
pub fn aggregate(vehicles: &[Vehicle], geofence: &Geofence, now: u64) -> LiveMetrics {
    let mut metrics = LiveMetrics::empty(now);
    let mut elapsed_total: u128 = 0;
    let mut elapsed_count: u32 = 0;

    for v in vehicles.iter().filter(|v| geofence.contains(v.position)) {
        let violation = classify(v, geofence).violation;
        metrics.total_in_boundary += 1;
        if !v.is_stationary {
            metrics.moving_count += 1;
        }
        if v.is_stationary && !violation {
            metrics.parked_count += 1;
        }
        if violation {
            metrics.violating_count += 1;
        }
        if v.warning_issued {
            metrics.warnings_count += 1;
        }
        if let Some(elapsed) = v.violation_elapsed_ms(now) {
            elapsed_total += u128::from(elapsed);
            elapsed_count += 1;
        }
    }

    if elapsed_count > 0 {
        metrics.avg_violation_ms = (elapsed_total as f64 / f64::from(elapsed_count)).round() as u64;
    }
    metrics
}

/// Formats a duration as `mm:ss`.
pub fn format_duration(ms: u64) -> String {
    let total_secs = ms / 1000;
    format!("{:02}:{:02}", total_secs / 60, total_secs % 60)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningOutcome {
    Issued,
    AlreadyIssued,
    UnknownVehicle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VehicleFilter {
    #[default]
    All,
    Moving,
    Parked,
    Violating,
}

impl VehicleFilter {
    fn matches(self, vehicle: &Vehicle, classification: &Classification) -> bool {
        match self {
            VehicleFilter::All => true,
            VehicleFilter::Moving => !vehicle.is_stationary,
            VehicleFilter::Parked => vehicle.is_stationary && !classification.violation,
            VehicleFilter::Violating => classification.violation,
        }
    }
}

/// What changed during one [`ViolationTracker::tick`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// At least one vehicle's tracking fields changed.
    pub changed: bool,
    pub violating: Vec<VehicleId>,
    /// Violating now but not on the previous tick; one notification each.
    pub newly_violating: Vec<VehicleId>,
    /// Vehicles whose warning was raised by the threshold on this tick.
    pub newly_warned: Vec<VehicleId>,
}

/// Owns the roster. All tracking state is mutated through `tick`, `issue_warning`
/// and `update_position`.
#[derive(Debug, Clone)]
pub struct ViolationTracker {
    vehicles: Vec<Vehicle>,
    warning_threshold_ms: u64,
    previous_violations: Vec<VehicleId>,
}

impl ViolationTracker {
    pub fn new(vehicles: Vec<Vehicle>, warning_threshold: Duration) -> Self {
        Self {
            vehicles,
            warning_threshold_ms: warning_threshold.as_millis() as u64,
            previous_violations: Vec::new(),
        }
    }

    pub fn vehicles(&self) -> &[Vehicle] {
        &self.vehicles
    }

    pub(crate) fn vehicles_mut(&mut self) -> &mut [Vehicle] {
        &mut self.vehicles
    }

    pub fn into_vehicles(self) -> Vec<Vehicle> {
        self.vehicles
    }

    pub fn vehicle(&self, id: VehicleId) -> Option<&Vehicle> {
        self.vehicles.iter().find(|v| v.id == id)
    }

    pub fn warning_threshold(&self) -> Duration {
        Duration::from_millis(self.warning_threshold_ms)
    }

    /// Ids found violating on the most recent tick.
    pub fn violations(&self) -> &[VehicleId] {
        &self.previous_violations
    }

    pub fn tick(&mut self, geofence: &Geofence, now: u64) -> TickReport {
        let Reconciled {
            vehicles,
            violating,
        } = reconcile(&self.vehicles, geofence, now, self.warning_threshold_ms);

        let newly_violating: Vec<VehicleId> = violating
            .iter()
            .copied()
            .filter(|id| !self.previous_violations.contains(id))
            .collect();
        for id in &newly_violating {
            tracing::info!(vehicle_id = *id, "vehicle parked in a non-parking zone");
        }

        let mut newly_warned = Vec::new();
        let changed = vehicles.is_some();
        if let Some(updated) = vehicles {
            for (before, after) in self.vehicles.iter().zip(&updated) {
                if !before.warning_issued && after.warning_issued {
                    tracing::info!(
                        vehicle_id = after.id,
                        elapsed = %format_duration(after.violation_elapsed_ms(now).unwrap_or(0)),
                        "violation threshold reached, warning issued"
                    );
                    newly_warned.push(after.id);
                } else if before.is_tracked() && !after.is_tracked() {
                    tracing::debug!(vehicle_id = after.id, "violation cleared");
                }
            }
            self.vehicles = updated;
        }

        self.previous_violations = violating.clone();
        TickReport {
            changed,
            violating,
            newly_violating,
            newly_warned,
        }
    }

    /// Manual warning. Backfills the violation start to `now` if it is unset.
    /// Idempotent; unknown ids are ignored.
    pub fn issue_warning(&mut self, id: VehicleId, now: u64) -> WarningOutcome {
        let Some(vehicle) = self.vehicles.iter_mut().find(|v| v.id == id) else {
            tracing::debug!(vehicle_id = id, "issue_warning: unknown vehicle");
            return WarningOutcome::UnknownVehicle;
        };
        if vehicle.warning_issued && vehicle.violation_started_at.is_some() {
            return WarningOutcome::AlreadyIssued;
        }
        vehicle.warning_issued = true;
        vehicle.violation_started_at.get_or_insert(now);
        tracing::info!(vehicle_id = id, "warning issued manually");
        WarningOutcome::Issued
    }

    /// External position report. Returns `false` for an unknown id.
    pub fn update_position(
        &mut self,
        id: VehicleId,
        position: Position,
        is_stationary: Option<bool>,
    ) -> bool {
        let Some(vehicle) = self.vehicles.iter_mut().find(|v| v.id == id) else {
            return false;
        };
        vehicle.position = position;
        if let Some(stationary) = is_stationary {
            vehicle.is_stationary = stationary;
        }
        true
    }

    pub fn live_metrics(&self, geofence: &Geofence, now: u64) -> LiveMetrics {
        aggregate(&self.vehicles, geofence, now)
    }

    pub fn classifications(&self, geofence: &Geofence) -> Vec<Classification> {
        self.vehicles.iter().map(|v| classify(v, geofence)).collect()
    }

    /// Case-insensitive exact plate lookup.
    pub fn find_by_plate(&self, plate: &str) -> Option<&Vehicle> {
        let plate = plate.trim();
        self.vehicles
            .iter()
            .find(|v| v.profile.plate_number.eq_ignore_ascii_case(plate))
    }

    pub fn filtered(&self, filter: VehicleFilter, geofence: &Geofence) -> Vec<&Vehicle> {
        self.vehicles
            .iter()
            .filter(|v| filter.matches(v, &classify(v, geofence)))
            .collect()
    }

    /// Violators first, then parked before moving, then by id.
    pub fn display_order(&self, geofence: &Geofence) -> Vec<&Vehicle> {
        let mut ordered: Vec<(&Vehicle, Classification)> = self
            .vehicles
            .iter()
            .map(|v| (v, classify(v, geofence)))
            .collect();
        ordered.sort_by_key(|(v, c)| (!c.violation, c.status != MotionStatus::Parked, v.id));
        ordered.into_iter().map(|(v, _)| v).collect()
    }
}
