// Shared test helpers
#![allow(dead_code)]

use parkwatch::geofence::{Geofence, Zone};
use parkwatch::models::*;

pub fn square(lat0: f64, lon0: f64, lat1: f64, lon1: f64) -> Vec<Position> {
    vec![
        Position::new(lat0, lon0),
        Position::new(lat1, lon0),
        Position::new(lat1, lon1),
        Position::new(lat0, lon1),
    ]
}

/// Boundary (0,0)-(10,10), parking zone 1 at (5,5)-(6,6), non-parking zone 1 at (1,1)-(2,2).
pub fn test_fence() -> Geofence {
    Geofence::new(
        &square(0.0, 0.0, 10.0, 10.0),
        vec![Zone::new(1, &square(5.0, 5.0, 6.0, 6.0))],
        vec![Zone::new(1, &square(1.0, 1.0, 2.0, 2.0))],
    )
}

pub const IN_NON_PARKING: Position = Position::new(1.5, 1.5);
pub const IN_PARKING: Position = Position::new(5.5, 5.5);
pub const IN_GENERAL: Position = Position::new(3.0, 3.0);
pub const OUTSIDE: Position = Position::new(11.0, 11.0);

pub fn vehicle(id: VehicleId, position: Position, is_stationary: bool) -> Vehicle {
    Vehicle::new(id, position, is_stationary)
}

pub fn with_plate(mut v: Vehicle, plate: &str) -> Vehicle {
    v.profile.plate_number = plate.to_string();
    v
}

pub fn metrics(timestamp: u64, violating_count: u32) -> LiveMetrics {
    LiveMetrics {
        violating_count,
        ..LiveMetrics::empty(timestamp)
    }
}
