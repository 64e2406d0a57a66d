// Vehicle roster entries and their zone classification

use serde::{Deserialize, Serialize};
use std::fmt;

use super::Position;

pub type VehicleId = u32;

/// Descriptive registration data. Carried along, never read by the geofence logic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VehicleProfile {
    pub plate_number: String,
    pub make: String,
    pub model: String,
    pub year: u16,
    pub color: String,
    pub owner_name: String,
    pub owner_phone: String,
    pub owner_email: String,
    pub registration_date: String,
    pub last_inspection: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vehicle {
    pub id: VehicleId,
    pub position: Position,
    pub is_stationary: bool,
    /// Epoch ms at which the current violation was first detected.
    #[serde(default)]
    pub violation_started_at: Option<u64>,
    #[serde(default)]
    pub warning_issued: bool,
    #[serde(flatten)]
    pub profile: VehicleProfile,
}

impl Vehicle {
    pub fn new(id: VehicleId, position: Position, is_stationary: bool) -> Self {
        Self {
            id,
            position,
            is_stationary,
            violation_started_at: None,
            warning_issued: false,
            profile: VehicleProfile::default(),
        }
    }

    pub fn with_profile(mut self, profile: VehicleProfile) -> Self {
        self.profile = profile;
        self
    }

    /// True when violation tracking fields are set and need clearing once the violation ends.
    pub fn is_tracked(&self) -> bool {
        self.violation_started_at.is_some() || self.warning_issued
    }

    /// Milliseconds since the violation started, if one is being tracked.
    pub fn violation_elapsed_ms(&self, now: u64) -> Option<u64> {
        self.violation_started_at
            .map(|started| now.saturating_sub(started))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MotionStatus {
    Moving,
    Parked,
}

impl MotionStatus {
    pub fn from_stationary(is_stationary: bool) -> Self {
        if is_stationary {
            MotionStatus::Parked
        } else {
            MotionStatus::Moving
        }
    }
}

impl fmt::Display for MotionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MotionStatus::Moving => f.write_str("Moving"),
            MotionStatus::Parked => f.write_str("Parked"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ZoneKind {
    ParkingZone,
    NonParkingZone,
    GeneralArea,
    OutsideBoundary,
}

impl fmt::Display for ZoneKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ZoneKind::ParkingZone => "Parking Zone",
            ZoneKind::NonParkingZone => "Non-Parking Zone",
            ZoneKind::GeneralArea => "General Area",
            ZoneKind::OutsideBoundary => "Outside Boundary",
        };
        f.write_str(label)
    }
}

/// Derived on demand from a vehicle and the geofence; never stored.
/// `violation` holds iff `zone == NonParkingZone && status == Parked`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    pub vehicle_id: VehicleId,
    pub status: MotionStatus,
    pub zone: ZoneKind,
    pub violation: bool,
}
