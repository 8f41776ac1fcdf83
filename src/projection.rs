//! Spherical Mercator projection onto a square world plane.
//!
//! Geographic positions use the `geo` convention (`x` = longitude, `y` = latitude).
//! Projected positions are plain [`Coord`]s where `(0, 0)` is the north-west corner
//! of the world and `(world_width, world_width)` the south-east corner.

use geo::{Coord, Point};
use std::f64::consts::PI;

/// Latitude at which the Mercator square ends.
pub const MAX_LATITUDE: f64 = 85.051_128_78;

/// Projects between geographic coordinates and a `world_width` x `world_width` plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SphericalMercatorProjection {
    world_width: f64,
}

impl SphericalMercatorProjection {
    pub fn new(world_width: f64) -> Self {
        Self { world_width }
    }

    /// Unit-square projection used by the quad-tree backed algorithms.
    pub fn unit() -> Self {
        Self::new(1.0)
    }

    pub fn world_width(&self) -> f64 {
        self.world_width
    }

    /// Project a geographic position. Latitude is clamped to [`MAX_LATITUDE`] so the
    /// poles land on the edge of the plane instead of at infinity.
    pub fn to_point(&self, position: &Point) -> Coord {
        let x = position.x() / 360.0 + 0.5;
        let latitude = position.y().clamp(-MAX_LATITUDE, MAX_LATITUDE);
        let sin_y = latitude.to_radians().sin();
        let y = 0.5 * ((1.0 + sin_y) / (1.0 - sin_y)).ln() / -(2.0 * PI) + 0.5;

        Coord {
            x: x * self.world_width,
            y: y * self.world_width,
        }
    }

    /// Inverse of [`to_point`](Self::to_point).
    pub fn to_lat_lng(&self, point: Coord) -> Point {
        let x = point.x / self.world_width - 0.5;
        let longitude = x * 360.0;

        let y = 0.5 - point.y / self.world_width;
        let latitude = 90.0 - ((-y * 2.0 * PI).exp().atan() * 2.0).to_degrees();

        Point::new(longitude, latitude)
    }
}

impl Default for SphericalMercatorProjection {
    fn default() -> Self {
        Self::unit()
    }
}
