// Geographic position (latitude/longitude degrees)

use geo::Coord;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
}

impl Position {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Offsets this position by the given deltas in degrees.
    pub fn offset(self, d_latitude: f64, d_longitude: f64) -> Self {
        Self::new(self.latitude + d_latitude, self.longitude + d_longitude)
    }
}

/// `x` is longitude, `y` is latitude.
impl From<Position> for Coord<f64> {
    fn from(p: Position) -> Self {
        Coord {
            x: p.longitude,
            y: p.latitude,
        }
    }
}

impl From<Coord<f64>> for Position {
    fn from(c: Coord<f64>) -> Self {
        Self::new(c.y, c.x)
    }
}
