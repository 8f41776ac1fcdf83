//! Heat-map tile rendering.
//!
//! [`HeatmapTileProvider`] renders square ARGB tiles from a set of [`WeightedLatLng`]s:
//! point intensities are bucketed onto a grid slightly larger than the tile, blurred with
//! a separable Gaussian kernel and mapped through a [`Gradient`] color ramp.
//!
//! ```rust
//! use geocluster::heatmap::{HeatmapTileProvider, Tile, WeightedLatLng};
//! use geo::Point;
//!
//! let provider = HeatmapTileProvider::builder()
//!     .weighted_data(vec![
//!         WeightedLatLng::new(Point::new(-0.1276, 51.5072), 3.0),
//!         WeightedLatLng::new(Point::new(-0.1200, 51.5100), 1.0),
//!     ])
//!     .radius(30)
//!     .build()
//!     .unwrap();
//!
//! // The tile on the other side of the world has no data.
//! assert_eq!(provider.get_tile(0, 0, 3), Tile::NoTile);
//! ```

mod gradient;
mod provider;
mod weighted;

pub use gradient::{DEFAULT_COLOR_MAP_SIZE, Gradient, argb, rgb};
pub use provider::{HeatmapTileProvider, HeatmapTileProviderBuilder};
pub use weighted::{DEFAULT_INTENSITY, WeightedLatLng};

/// Side length of a rendered tile in pixels.
pub const TILE_DIM: u32 = 512;

pub const DEFAULT_RADIUS: u32 = 20;
pub const MIN_RADIUS: u32 = 10;
pub const MAX_RADIUS: u32 = 200;

pub const DEFAULT_OPACITY: f64 = 0.7;

/// Zoom levels covered by the max-intensity table (0 through 21).
pub const MAX_ZOOM_LEVEL: usize = 22;

const WORLD_WIDTH: f64 = 1.0;

/// Screen size the max-intensity estimate assumes, in pixels at zoom 3.
const SCREEN_SIZE: u32 = 1280;

/// Zoom levels sampled for the max-intensity table; others copy the nearest sample.
const DEFAULT_MIN_ZOOM: usize = 5;
const DEFAULT_MAX_ZOOM: usize = 11;

/// A rendered tile, or the marker for a tile with no data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tile {
    /// Nothing to draw here. Distinct from an image that happens to be transparent.
    NoTile,
    /// `size * size` ARGB pixels, row-major.
    Image { size: u32, pixels: Vec<u32> },
}

impl Tile {
    pub fn is_no_tile(&self) -> bool {
        matches!(self, Tile::NoTile)
    }

    pub fn size(&self) -> u32 {
        match self {
            Tile::NoTile => 0,
            Tile::Image { size, .. } => *size,
        }
    }

    /// ARGB value at column `x`, row `y`.
    pub fn pixel(&self, x: u32, y: u32) -> Option<u32> {
        match self {
            Tile::NoTile => None,
            Tile::Image { size, pixels } if x < *size && y < *size => {
                pixels.get((y * size + x) as usize).copied()
            }
            Tile::Image { .. } => None,
        }
    }
}
