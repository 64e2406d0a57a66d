// Zone classification: boundary + parking / non-parking polygon catalogs.
// Containment is an even-odd ray cast; points exactly on an edge have no defined answer.

use geo::{BoundingRect, Coord, LineString, Polygon, Rect};
use thiserror::Error;

use crate::models::{Classification, MotionStatus, Position, Vehicle, VehicleId, ZoneKind};

/// Padding applied around the boundary when deriving viewport bounds.
pub const DEFAULT_MAP_PADDING_DEG: f64 = 0.002;

#[derive(Debug, Error, PartialEq)]
pub enum GeofenceError {
    #[error("{zone}: polygon needs at least 3 vertices, got {count}")]
    TooFewVertices { zone: String, count: usize },
    #[error("{zone}: vertex {index}: {reason}")]
    InvalidCoordinate {
        zone: String,
        index: usize,
        reason: String,
    },
}

/// Even-odd ray cast along the latitude axis.
///
/// For each edge `(i, j)` with `j` the previous vertex (wrapping), a crossing is
/// counted when the edge straddles the point's longitude and the edge's latitude at
/// that longitude lies above the point. Works on open or closed rings; degenerate
/// rings give a deterministic but meaningless answer.
pub fn point_in_polygon(point: Position, ring: &[Coord<f64>]) -> bool {
    let Some(last) = ring.len().checked_sub(1) else {
        return false;
    };
    let mut inside = false;
    let mut j = last;
    for i in 0..ring.len() {
        let (lon_i, lat_i) = (ring[i].x, ring[i].y);
        let (lon_j, lat_j) = (ring[j].x, ring[j].y);
        if (lon_i > point.longitude) != (lon_j > point.longitude) {
            let crossing_lat =
                (lat_j - lat_i) * (point.longitude - lon_i) / (lon_j - lon_i) + lat_i;
            if point.latitude < crossing_lat {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

fn polygon_from(vertices: &[Position]) -> Polygon<f64> {
    let ring: Vec<Coord<f64>> = vertices.iter().map(|&p| p.into()).collect();
    Polygon::new(LineString::new(ring), vec![])
}

/// Coordinate checks for a polygon ring; used when geometry comes from configuration.
fn validate_ring(zone: &str, vertices: &[Position]) -> Result<(), GeofenceError> {
    if vertices.len() < 3 {
        return Err(GeofenceError::TooFewVertices {
            zone: zone.to_string(),
            count: vertices.len(),
        });
    }
    for (index, v) in vertices.iter().enumerate() {
        let invalid = |reason: String| GeofenceError::InvalidCoordinate {
            zone: zone.to_string(),
            index,
            reason,
        };
        if !v.latitude.is_finite() || !v.longitude.is_finite() {
            return Err(invalid(format!(
                "coordinates must be finite, got ({}, {})",
                v.latitude, v.longitude
            )));
        }
        if !(-90.0..=90.0).contains(&v.latitude) {
            return Err(invalid(format!(
                "latitude out of range [-90.0, 90.0]: {}",
                v.latitude
            )));
        }
        if !(-180.0..=180.0).contains(&v.longitude) {
            return Err(invalid(format!(
                "longitude out of range [-180.0, 180.0]: {}",
                v.longitude
            )));
        }
    }
    Ok(())
}

/// A parking or non-parking area.
#[derive(Debug, Clone, PartialEq)]
pub struct Zone {
    pub id: u32,
    area: Polygon<f64>,
}

impl Zone {
    /// Builds a zone without validating the geometry.
    pub fn new(id: u32, vertices: &[Position]) -> Self {
        Self {
            id,
            area: polygon_from(vertices),
        }
    }

    /// Builds a zone after checking vertex count and coordinate ranges.
    pub fn try_new(label: &str, id: u32, vertices: &[Position]) -> Result<Self, GeofenceError> {
        validate_ring(&format!("{label} {id}"), vertices)?;
        Ok(Self::new(id, vertices))
    }

    pub fn area(&self) -> &Polygon<f64> {
        &self.area
    }

    pub fn contains(&self, position: Position) -> bool {
        point_in_polygon(position, &self.area.exterior().0)
    }
}

/// The monitored boundary and its two zone catalogs.
#[derive(Debug, Clone, PartialEq)]
pub struct Geofence {
    boundary: Polygon<f64>,
    parking_zones: Vec<Zone>,
    non_parking_zones: Vec<Zone>,
}

impl Geofence {
    pub fn new(
        boundary: &[Position],
        parking_zones: Vec<Zone>,
        non_parking_zones: Vec<Zone>,
    ) -> Self {
        Self {
            boundary: polygon_from(boundary),
            parking_zones,
            non_parking_zones,
        }
    }

    /// Like [`Geofence::new`] but rejects a boundary with too few or out-of-range vertices.
    pub fn try_new(
        boundary: &[Position],
        parking_zones: Vec<Zone>,
        non_parking_zones: Vec<Zone>,
    ) -> Result<Self, GeofenceError> {
        validate_ring("boundary", boundary)?;
        Ok(Self::new(boundary, parking_zones, non_parking_zones))
    }

    pub fn boundary(&self) -> &Polygon<f64> {
        &self.boundary
    }

    pub fn parking_zones(&self) -> &[Zone] {
        &self.parking_zones
    }

    pub fn non_parking_zones(&self) -> &[Zone] {
        &self.non_parking_zones
    }

    /// Boundary membership.
    pub fn contains(&self, position: Position) -> bool {
        point_in_polygon(position, &self.boundary.exterior().0)
    }

    pub fn parking_zone_at(&self, position: Position) -> Option<&Zone> {
        self.parking_zones.iter().find(|z| z.contains(position))
    }

    pub fn non_parking_zone_at(&self, position: Position) -> Option<&Zone> {
        self.non_parking_zones.iter().find(|z| z.contains(position))
    }

    /// Bounding rectangle of the boundary grown by `padding_deg` on every side.
    /// `None` only for an empty boundary.
    pub fn map_bounds(&self, padding_deg: f64) -> Option<Rect<f64>> {
        let rect = self.boundary.bounding_rect()?;
        let (min, max) = (rect.min(), rect.max());
        Some(Rect::new(
            Coord {
                x: min.x - padding_deg,
                y: min.y - padding_deg,
            },
            Coord {
                x: max.x + padding_deg,
                y: max.y + padding_deg,
            },
        ))
    }
}

/// Classifies a raw position. Decision order: outside boundary, parking zone,
/// non-parking zone (violation only when stationary), general area.
pub fn classify_position(
    vehicle_id: VehicleId,
    position: Position,
    is_stationary: bool,
    geofence: &Geofence,
) -> Classification {
    let status = MotionStatus::from_stationary(is_stationary);
    let (zone, violation) = if !geofence.contains(position) {
        (ZoneKind::OutsideBoundary, false)
    } else if geofence.parking_zone_at(position).is_some() {
        (ZoneKind::ParkingZone, false)
    } else if geofence.non_parking_zone_at(position).is_some() {
        (ZoneKind::NonParkingZone, is_stationary)
    } else {
        (ZoneKind::GeneralArea, false)
    };
    Classification {
        vehicle_id,
        status,
        zone,
        violation,
    }
}

pub fn classify(vehicle: &Vehicle, geofence: &Geofence) -> Classification {
    classify_position(vehicle.id, vehicle.position, vehicle.is_stationary, geofence)
}
