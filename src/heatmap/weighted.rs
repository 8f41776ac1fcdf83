use crate::projection::SphericalMercatorProjection;
use crate::quadtree::PointItem;
use geo::{Coord, Point};

use super::WORLD_WIDTH;

/// Intensity given to points without an explicit weight, and to negative weights.
pub const DEFAULT_INTENSITY: f64 = 1.0;

/// A geographic point with an intensity.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedLatLng {
    position: Point,
    point: Coord,
    intensity: f64,
}

impl WeightedLatLng {
    /// Negative or NaN intensities fall back to [`DEFAULT_INTENSITY`].
    pub fn new(position: Point, intensity: f64) -> Self {
        let projection = SphericalMercatorProjection::new(WORLD_WIDTH);
        Self {
            position,
            point: projection.to_point(&position),
            intensity: if intensity >= 0.0 {
                intensity
            } else {
                DEFAULT_INTENSITY
            },
        }
    }

    pub fn unweighted(position: Point) -> Self {
        Self::new(position, DEFAULT_INTENSITY)
    }

    pub fn position(&self) -> Point {
        self.position
    }

    pub fn intensity(&self) -> f64 {
        self.intensity
    }

    pub(crate) fn is_finite(&self) -> bool {
        self.point.x.is_finite() && self.point.y.is_finite() && self.intensity.is_finite()
    }
}

impl From<Point> for WeightedLatLng {
    fn from(position: Point) -> Self {
        Self::unweighted(position)
    }
}

impl PointItem for WeightedLatLng {
    fn point(&self) -> Coord {
        self.point
    }
}
