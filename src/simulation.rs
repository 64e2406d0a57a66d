// Simulated movement for the demo fleet (no real GPS source).

use geo::Rect;
use rand::Rng;

use crate::models::Vehicle;

/// Per-axis jitter applied to moving vehicles on each simulation tick, in degrees.
pub const DEFAULT_JITTER_STEP_DEG: f64 = 0.0002;
/// Per-axis offset range for a full scatter, in degrees.
pub const DEFAULT_SCATTER_STEP_DEG: f64 = 0.003;

fn offset<R: Rng + ?Sized>(rng: &mut R, step: f64) -> f64 {
    rng.gen_range(-0.5..0.5) * step
}

/// Nudges every non-stationary vehicle by up to `step / 2` per axis. Returns how many moved.
pub fn jitter_moving<R: Rng + ?Sized>(vehicles: &mut [Vehicle], rng: &mut R, step: f64) -> usize {
    let mut moved = 0;
    for v in vehicles.iter_mut().filter(|v| !v.is_stationary) {
        let (d_lat, d_lon) = (offset(rng, step), offset(rng, step));
        v.position = v.position.offset(d_lat, d_lon);
        moved += 1;
    }
    moved
}

/// Moves every vehicle by up to `step / 2` per axis and clamps the result into `bounds`
/// (`x` = longitude, `y` = latitude).
pub fn scatter<R: Rng + ?Sized>(
    vehicles: &mut [Vehicle],
    rng: &mut R,
    step: f64,
    bounds: Rect<f64>,
) {
    let (min, max) = (bounds.min(), bounds.max());
    for v in vehicles.iter_mut() {
        let (d_lat, d_lon) = (offset(rng, step), offset(rng, step));
        let moved = v.position.offset(d_lat, d_lon);
        v.position.latitude = moved.latitude.clamp(min.y, max.y);
        v.position.longitude = moved.longitude.clamp(min.x, max.x);
    }
}
