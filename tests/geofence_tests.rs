// Point-in-polygon and zone classification tests

mod common;

use common::*;
use geo::Coord;
use parkwatch::geofence::*;
use parkwatch::models::*;

fn ring(points: &[Position]) -> Vec<Coord<f64>> {
    points.iter().map(|&p| p.into()).collect()
}

#[test]
fn test_point_in_square() {
    let sq = ring(&square(0.0, 0.0, 10.0, 10.0));
    assert!(point_in_polygon(Position::new(5.0, 5.0), &sq));
    assert!(point_in_polygon(Position::new(0.1, 9.9), &sq));
    assert!(!point_in_polygon(Position::new(-1.0, 5.0), &sq));
    assert!(!point_in_polygon(Position::new(5.0, 10.5), &sq));
}

#[test]
fn test_empty_ring_contains_nothing() {
    assert!(!point_in_polygon(Position::new(0.0, 0.0), &[]));
}

#[test]
fn test_result_independent_of_starting_vertex() {
    let pentagon = vec![
        Position::new(0.0, 0.0),
        Position::new(4.0, -1.0),
        Position::new(6.0, 3.0),
        Position::new(3.0, 6.0),
        Position::new(-1.0, 4.0),
    ];
    let probes = [
        Position::new(2.0, 2.0),
        Position::new(5.5, 4.5),
        Position::new(-0.5, 0.5),
        Position::new(7.0, 7.0),
        Position::new(1.0, 4.5),
    ];
    let base = ring(&pentagon);
    for shift in 1..pentagon.len() {
        let mut rotated = pentagon.clone();
        rotated.rotate_left(shift);
        let rotated = ring(&rotated);
        for p in probes {
            assert_eq!(
                point_in_polygon(p, &base),
                point_in_polygon(p, &rotated),
                "probe {:?} rotation {}",
                p,
                shift
            );
        }
    }
}

#[test]
fn test_closed_ring_matches_open_ring() {
    let open = ring(&square(0.0, 0.0, 10.0, 10.0));
    let mut closed = open.clone();
    closed.push(open[0]);
    for p in [IN_GENERAL, OUTSIDE, Position::new(9.0, 0.5)] {
        assert_eq!(point_in_polygon(p, &open), point_in_polygon(p, &closed));
    }
}

#[test]
fn test_classify_parked_in_non_parking_zone_is_violation() {
    let fence = test_fence();
    let c = classify_position(7, IN_NON_PARKING, true, &fence);
    assert_eq!(c.vehicle_id, 7);
    assert_eq!(c.status, MotionStatus::Parked);
    assert_eq!(c.zone, ZoneKind::NonParkingZone);
    assert!(c.violation);
}

#[test]
fn test_classify_moving_through_non_parking_zone_is_not_violation() {
    let fence = test_fence();
    let c = classify_position(1, IN_NON_PARKING, false, &fence);
    assert_eq!(c.status, MotionStatus::Moving);
    assert_eq!(c.zone, ZoneKind::NonParkingZone);
    assert!(!c.violation);
}

#[test]
fn test_classify_parking_general_and_outside() {
    let fence = test_fence();
    let parked = classify_position(3, IN_PARKING, true, &fence);
    assert_eq!(parked.zone, ZoneKind::ParkingZone);
    assert!(!parked.violation);

    let general = classify_position(3, IN_GENERAL, true, &fence);
    assert_eq!(general.zone, ZoneKind::GeneralArea);
    assert!(!general.violation);

    let outside = classify_position(3, OUTSIDE, true, &fence);
    assert_eq!(outside.zone, ZoneKind::OutsideBoundary);
    assert_eq!(outside.status, MotionStatus::Parked);
    assert!(!outside.violation);
}

#[test]
fn test_parking_zone_wins_over_overlapping_non_parking_zone() {
    let fence = Geofence::new(
        &square(0.0, 0.0, 10.0, 10.0),
        vec![Zone::new(1, &square(1.0, 1.0, 3.0, 3.0))],
        vec![Zone::new(1, &square(2.0, 2.0, 4.0, 4.0))],
    );
    let c = classify_position(1, Position::new(2.5, 2.5), true, &fence);
    assert_eq!(c.zone, ZoneKind::ParkingZone);
    assert!(!c.violation);
}

#[test]
fn test_non_parking_zone_outside_boundary_is_ignored() {
    let fence = Geofence::new(
        &square(0.0, 0.0, 10.0, 10.0),
        vec![],
        vec![Zone::new(1, &square(9.0, 9.0, 12.0, 12.0))],
    );
    let c = classify_position(1, Position::new(11.0, 11.0), true, &fence);
    assert_eq!(c.zone, ZoneKind::OutsideBoundary);
    assert!(!c.violation);
}

#[test]
fn test_classify_uses_vehicle_fields() {
    let fence = test_fence();
    let v = vehicle(9, IN_NON_PARKING, true);
    assert_eq!(classify(&v, &fence), classify_position(9, IN_NON_PARKING, true, &fence));
}

#[test]
fn test_zone_lookup_returns_matching_zone() {
    let fence = test_fence();
    assert_eq!(fence.parking_zone_at(IN_PARKING).map(|z| z.id), Some(1));
    assert!(fence.parking_zone_at(IN_GENERAL).is_none());
    assert_eq!(fence.non_parking_zone_at(IN_NON_PARKING).map(|z| z.id), Some(1));
}

#[test]
fn test_map_bounds_pads_boundary() {
    let fence = test_fence();
    let bounds = fence.map_bounds(DEFAULT_MAP_PADDING_DEG).expect("bounds");
    let eps = 1e-12;
    assert!((bounds.min().x + 0.002).abs() < eps);
    assert!((bounds.min().y + 0.002).abs() < eps);
    assert!((bounds.max().x - 10.002).abs() < eps);
    assert!((bounds.max().y - 10.002).abs() < eps);
}

#[test]
fn test_try_new_rejects_degenerate_boundary() {
    let err = Geofence::try_new(
        &[Position::new(0.0, 0.0), Position::new(1.0, 1.0)],
        vec![],
        vec![],
    )
    .unwrap_err();
    assert_eq!(
        err,
        GeofenceError::TooFewVertices {
            zone: "boundary".into(),
            count: 2
        }
    );
}

#[test]
fn test_zone_try_new_rejects_out_of_range_latitude() {
    let mut vertices = square(0.0, 0.0, 1.0, 1.0);
    vertices[2] = Position::new(91.0, 1.0);
    let err = Zone::try_new("parking zone", 4, &vertices).unwrap_err();
    match err {
        GeofenceError::InvalidCoordinate { zone, index, .. } => {
            assert_eq!(zone, "parking zone 4");
            assert_eq!(index, 2);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_zone_try_new_rejects_nan() {
    let mut vertices = square(0.0, 0.0, 1.0, 1.0);
    vertices[0] = Position::new(f64::NAN, 0.0);
    assert!(Zone::try_new("zone", 1, &vertices).is_err());
}
