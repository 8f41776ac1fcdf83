//! Camera and viewport model consumed by screen-based clustering.
//!
//! Bearing and tilt are carried for parity with the renderer's camera but do not
//! influence clustering.

use crate::error::{GeoclusterError, Result};
use crate::projection::SphericalMercatorProjection;
use geo::{Coord, Point};
use serde::{Deserialize, Serialize};

pub const MIN_ZOOM: f32 = 0.0;
pub const MAX_ZOOM: f32 = 21.0;

/// Where the map is looking.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraPosition {
    pub target: Point,
    pub zoom: f32,
    pub bearing: f32,
    pub tilt: f32,
}

impl CameraPosition {
    pub fn new(target: Point, zoom: f32) -> Self {
        Self {
            target,
            zoom,
            bearing: 0.0,
            tilt: 0.0,
        }
    }

    pub fn with_bearing(mut self, bearing: f32) -> Self {
        self.bearing = bearing;
        self
    }

    pub fn with_tilt(mut self, tilt: f32) -> Self {
        self.tilt = tilt;
        self
    }

    /// Integer truncation of the zoom, used as a cache and bucket key.
    pub fn discrete_zoom(&self) -> i32 {
        self.zoom.trunc() as i32
    }

    /// Resulting camera after applying `update` on a map of size `viewport`.
    pub fn apply(&self, update: &CameraUpdate, viewport: ViewportSize) -> Result<CameraPosition> {
        let mut next = *self;
        match *update {
            CameraUpdate::NewCameraPosition {
                latitude,
                longitude,
                zoom,
                bearing,
                tilt,
            } => {
                next = CameraPosition::new(Point::new(longitude, latitude), zoom)
                    .with_bearing(bearing)
                    .with_tilt(tilt);
            }
            CameraUpdate::NewLatLng {
                latitude,
                longitude,
            } => next.target = Point::new(longitude, latitude),
            CameraUpdate::NewLatLngZoom {
                latitude,
                longitude,
                zoom,
            } => {
                next.target = Point::new(longitude, latitude);
                next.zoom = zoom;
            }
            CameraUpdate::ZoomIn => next.zoom += 1.0,
            CameraUpdate::ZoomOut => next.zoom -= 1.0,
            CameraUpdate::ZoomTo { zoom } => next.zoom = zoom,
            CameraUpdate::ZoomBy { amount } => next.zoom += amount,
            CameraUpdate::ScrollBy { x_pixel, y_pixel } => {
                let projection = SphericalMercatorProjection::new(world_pixels(self.zoom));
                let p = projection.to_point(&self.target);
                let world = projection.world_width();
                let moved = Coord {
                    x: (p.x + f64::from(x_pixel)).rem_euclid(world),
                    y: (p.y + f64::from(y_pixel)).clamp(0.0, world),
                };
                next.target = projection.to_lat_lng(moved);
            }
            CameraUpdate::NewLatLngBounds {
                south,
                west,
                north,
                east,
                padding,
            } => {
                next = fit_bounds(south, west, north, east, padding, viewport)?;
            }
        }

        if !next.zoom.is_finite() {
            return Err(GeoclusterError::InvalidArgument(format!(
                "camera zoom must be finite, got {}",
                next.zoom
            )));
        }
        next.zoom = next.zoom.clamp(MIN_ZOOM, MAX_ZOOM);
        Ok(next)
    }
}

fn world_pixels(zoom: f32) -> f64 {
    256.0 * 2f64.powf(f64::from(zoom))
}

fn fit_bounds(
    south: f64,
    west: f64,
    north: f64,
    east: f64,
    padding: u32,
    viewport: ViewportSize,
) -> Result<CameraPosition> {
    let usable_width = f64::from(viewport.width) - 2.0 * f64::from(padding);
    let usable_height = f64::from(viewport.height) - 2.0 * f64::from(padding);
    if usable_width <= 0.0 || usable_height <= 0.0 {
        return Err(GeoclusterError::InvalidArgument(format!(
            "padding {} leaves no room in a {}x{} viewport",
            padding, viewport.width, viewport.height
        )));
    }

    let projection = SphericalMercatorProjection::unit();
    let south_west = projection.to_point(&Point::new(west, south));
    let mut north_east = projection.to_point(&Point::new(east, north));
    // Bounds crossing the antimeridian have east < west.
    if north_east.x < south_west.x {
        north_east.x += 1.0;
    }

    let center = Coord {
        x: ((south_west.x + north_east.x) / 2.0).rem_euclid(1.0),
        y: (south_west.y + north_east.y) / 2.0,
    };
    let span_x = north_east.x - south_west.x;
    let span_y = (south_west.y - north_east.y).abs();

    let zoom_x = if span_x > 0.0 {
        (usable_width / (span_x * 256.0)).log2()
    } else {
        f64::from(MAX_ZOOM)
    };
    let zoom_y = if span_y > 0.0 {
        (usable_height / (span_y * 256.0)).log2()
    } else {
        f64::from(MAX_ZOOM)
    };

    Ok(CameraPosition::new(
        projection.to_lat_lng(center),
        zoom_x.min(zoom_y) as f32,
    ))
}

/// Map view size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewportSize {
    pub width: u32,
    pub height: u32,
}

impl ViewportSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for ViewportSize {
    fn default() -> Self {
        Self::new(1080, 1920)
    }
}

/// A requested camera change, as sent by the integration layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CameraUpdate {
    NewCameraPosition {
        latitude: f64,
        longitude: f64,
        zoom: f32,
        #[serde(default)]
        bearing: f32,
        #[serde(default)]
        tilt: f32,
    },
    NewLatLng {
        latitude: f64,
        longitude: f64,
    },
    NewLatLngZoom {
        latitude: f64,
        longitude: f64,
        zoom: f32,
    },
    ZoomIn,
    ZoomOut,
    ZoomTo {
        zoom: f32,
    },
    ZoomBy {
        amount: f32,
    },
    ScrollBy {
        x_pixel: f32,
        y_pixel: f32,
    },
    NewLatLngBounds {
        south: f64,
        west: f64,
        north: f64,
        east: f64,
        #[serde(default)]
        padding: u32,
    },
}

impl CameraUpdate {
    const KINDS: [&'static str; 9] = [
        "new_camera_position",
        "new_lat_lng",
        "new_lat_lng_zoom",
        "zoom_in",
        "zoom_out",
        "zoom_to",
        "zoom_by",
        "scroll_by",
        "new_lat_lng_bounds",
    ];

    /// Parse a tagged update such as `{"type": "zoom_to", "zoom": 12}`.
    ///
    /// An unknown `type` fails with [`GeoclusterError::UnsupportedOperation`] naming it.
    pub fn from_json(json: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        let kind = value
            .get("type")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| {
                GeoclusterError::InvalidArgument("camera update has no \"type\" tag".to_string())
            })?;

        if !Self::KINDS.contains(&kind) {
            return Err(GeoclusterError::UnsupportedOperation(format!(
                "camera update \"{}\"",
                kind
            )));
        }

        Ok(serde_json::from_value(value)?)
    }
}

/// Which way the zoom changed between two cluster snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoomDirection {
    In,
    Out,
}

impl ZoomDirection {
    pub fn between(previous_zoom: f32, zoom: f32) -> Self {
        if zoom > previous_zoom {
            ZoomDirection::In
        } else {
            ZoomDirection::Out
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start() -> CameraPosition {
        CameraPosition::new(Point::new(10.0, 20.0), 5.0)
    }

    #[test]
    fn test_zoom_updates() {
        let viewport = ViewportSize::default();
        assert_eq!(start().apply(&CameraUpdate::ZoomIn, viewport).unwrap().zoom, 6.0);
        assert_eq!(start().apply(&CameraUpdate::ZoomOut, viewport).unwrap().zoom, 4.0);
        assert_eq!(
            start()
                .apply(&CameraUpdate::ZoomBy { amount: 2.5 }, viewport)
                .unwrap()
                .zoom,
            7.5
        );
        assert_eq!(
            start()
                .apply(&CameraUpdate::ZoomTo { zoom: 40.0 }, viewport)
                .unwrap()
                .zoom,
            MAX_ZOOM
        );
    }

    #[test]
    fn test_scroll_by_moves_east() {
        let moved = start()
            .apply(
                &CameraUpdate::ScrollBy {
                    x_pixel: 256.0,
                    y_pixel: 0.0,
                },
                ViewportSize::default(),
            )
            .unwrap();
        assert!(moved.target.x() > 10.0);
        assert!((moved.target.y() - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_fit_bounds_contains_corners() {
        let viewport = ViewportSize::new(512, 512);
        let fitted = start()
            .apply(
                &CameraUpdate::NewLatLngBounds {
                    south: -10.0,
                    west: -10.0,
                    north: 10.0,
                    east: 10.0,
                    padding: 0,
                },
                viewport,
            )
            .unwrap();
        assert!(fitted.target.x().abs() < 1e-9);
        assert!(fitted.target.y().abs() < 1e-6);
        // A 20 degree box fills 512 pixels just above zoom 5.
        assert!(fitted.zoom > 5.0 && fitted.zoom < 5.3, "zoom {}", fitted.zoom);
    }

    #[test]
    fn test_fit_bounds_rejects_oversized_padding() {
        let result = start().apply(
            &CameraUpdate::NewLatLngBounds {
                south: 0.0,
                west: 0.0,
                north: 1.0,
                east: 1.0,
                padding: 300,
            },
            ViewportSize::new(500, 500),
        );
        assert!(matches!(result, Err(GeoclusterError::InvalidArgument(_))));
    }

    #[test]
    fn test_from_json() {
        let update = CameraUpdate::from_json(r#"{"type": "zoom_to", "zoom": 12}"#).unwrap();
        assert_eq!(update, CameraUpdate::ZoomTo { zoom: 12.0 });

        let update = CameraUpdate::from_json(
            r#"{"type": "new_lat_lng_bounds", "south": 1, "west": 2, "north": 3, "east": 4}"#,
        )
        .unwrap();
        assert!(matches!(update, CameraUpdate::NewLatLngBounds { padding: 0, .. }));
    }

    #[test]
    fn test_unknown_update_is_rejected_by_name() {
        let err = CameraUpdate::from_json(r#"{"type": "fly_to_orbit"}"#).unwrap_err();
        match err {
            GeoclusterError::UnsupportedOperation(message) => {
                assert!(message.contains("fly_to_orbit"))
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_zoom_direction() {
        assert_eq!(ZoomDirection::between(3.0, 4.0), ZoomDirection::In);
        assert_eq!(ZoomDirection::between(4.0, 3.0), ZoomDirection::Out);
        assert_eq!(ZoomDirection::between(4.0, 4.0), ZoomDirection::Out);
    }
}
