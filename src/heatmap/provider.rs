//! Tile rendering for weighted point sets.

use super::gradient::Gradient;
use super::weighted::WeightedLatLng;
use super::{
    DEFAULT_MAX_ZOOM, DEFAULT_MIN_ZOOM, MAX_RADIUS, MAX_ZOOM_LEVEL, MIN_RADIUS, SCREEN_SIZE,
    TILE_DIM, Tile, WORLD_WIDTH,
};
use crate::config::HeatmapConfig;
use crate::error::{GeoclusterError, Result};
use crate::quadtree::{Bounds, PointItem, PointQuadTree};
use geo::Point;
use once_cell::sync::OnceCell;
use rustc_hash::FxHashMap;

/// Renders heat-map tiles for a fixed data set.
///
/// Mutators rebuild only what they affect; the per-zoom maximum intensity table is
/// recomputed lazily on the next [`get_tile`](Self::get_tile). Previously rendered tiles
/// are not tracked, so the renderer must discard them after a mutation.
#[derive(Debug)]
pub struct HeatmapTileProvider {
    data: Vec<WeightedLatLng>,
    tree: PointQuadTree<WeightedLatLng>,
    bounds: Bounds,
    radius: u32,
    kernel: Vec<f64>,
    gradient: Gradient,
    opacity: f64,
    color_map: Vec<u32>,
    custom_max_intensity: f64,
    max_intensity: OnceCell<Vec<f64>>,
}

/// Builder for [`HeatmapTileProvider`]; data is required, everything else defaults.
#[derive(Debug, Clone, Default)]
pub struct HeatmapTileProviderBuilder {
    data: Option<Vec<WeightedLatLng>>,
    config: HeatmapConfig,
    gradient: Gradient,
}

impl HeatmapTileProviderBuilder {
    pub fn weighted_data(mut self, data: Vec<WeightedLatLng>) -> Self {
        self.data = Some(data);
        self
    }

    /// Points with the default intensity.
    pub fn data(self, points: Vec<Point>) -> Self {
        self.weighted_data(points.into_iter().map(WeightedLatLng::unweighted).collect())
    }

    pub fn config(mut self, config: HeatmapConfig) -> Self {
        self.config = config;
        self
    }

    pub fn radius(mut self, radius: u32) -> Self {
        self.config.radius = radius;
        self
    }

    pub fn gradient(mut self, gradient: Gradient) -> Self {
        self.gradient = gradient;
        self
    }

    pub fn opacity(mut self, opacity: f64) -> Self {
        self.config.opacity = opacity;
        self
    }

    pub fn max_intensity(mut self, max_intensity: f64) -> Self {
        self.config.max_intensity = max_intensity;
        self
    }

    pub fn build(self) -> Result<HeatmapTileProvider> {
        let data = self.data.ok_or_else(|| {
            GeoclusterError::InvalidArgument("heat map needs weighted data".to_string())
        })?;
        validate_radius(self.config.radius)?;
        validate_opacity(self.config.opacity)?;
        validate_max_intensity(self.config.max_intensity)?;
        let (data, tree, bounds) = index(data)?;

        let radius = self.config.radius;
        Ok(HeatmapTileProvider {
            data,
            tree,
            bounds,
            radius,
            kernel: generate_kernel(radius, f64::from(radius) / 3.0),
            color_map: self.gradient.color_map(self.config.opacity),
            gradient: self.gradient,
            opacity: self.config.opacity,
            custom_max_intensity: self.config.max_intensity,
            max_intensity: OnceCell::new(),
        })
    }
}

fn validate_radius(radius: u32) -> Result<()> {
    if !(MIN_RADIUS..=MAX_RADIUS).contains(&radius) {
        return Err(GeoclusterError::InvalidArgument(format!(
            "heat map radius {} outside [{}, {}]",
            radius, MIN_RADIUS, MAX_RADIUS
        )));
    }
    Ok(())
}

fn validate_opacity(opacity: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&opacity) {
        return Err(GeoclusterError::InvalidArgument(format!(
            "heat map opacity {} outside [0, 1]",
            opacity
        )));
    }
    Ok(())
}

fn validate_max_intensity(max_intensity: f64) -> Result<()> {
    if !max_intensity.is_finite() || max_intensity < 0.0 {
        return Err(GeoclusterError::InvalidArgument(format!(
            "max intensity must be finite and non-negative, got {}",
            max_intensity
        )));
    }
    Ok(())
}

/// Drop unprojectable points and index the rest.
fn index(
    data: Vec<WeightedLatLng>,
) -> Result<(Vec<WeightedLatLng>, PointQuadTree<WeightedLatLng>, Bounds)> {
    let total = data.len();
    let data: Vec<WeightedLatLng> = data.into_iter().filter(WeightedLatLng::is_finite).collect();
    if data.len() < total {
        log::warn!(
            "Rejecting {} heat map points with non-finite position or intensity",
            total - data.len()
        );
    }

    let bounds = Bounds::enclosing(data.iter().map(|w| w.point()))
        .ok_or_else(|| GeoclusterError::InvalidArgument("no input points".to_string()))?;
    let mut tree = PointQuadTree::new(bounds);
    for weighted in &data {
        tree.add(weighted.clone());
    }
    Ok((data, tree, bounds))
}

impl HeatmapTileProvider {
    pub fn builder() -> HeatmapTileProviderBuilder {
        HeatmapTileProviderBuilder::default()
    }

    pub fn radius(&self) -> u32 {
        self.radius
    }

    pub fn opacity(&self) -> f64 {
        self.opacity
    }

    pub fn gradient(&self) -> &Gradient {
        &self.gradient
    }

    pub fn data(&self) -> &[WeightedLatLng] {
        &self.data
    }

    /// Extent of the data in the unit plane.
    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    pub fn set_weighted_data(&mut self, data: Vec<WeightedLatLng>) -> Result<()> {
        let (data, tree, bounds) = index(data)?;
        self.data = data;
        self.tree = tree;
        self.bounds = bounds;
        self.max_intensity = OnceCell::new();
        Ok(())
    }

    pub fn set_data(&mut self, points: Vec<Point>) -> Result<()> {
        self.set_weighted_data(points.into_iter().map(WeightedLatLng::unweighted).collect())
    }

    pub fn set_radius(&mut self, radius: u32) -> Result<()> {
        validate_radius(radius)?;
        self.radius = radius;
        self.kernel = generate_kernel(radius, f64::from(radius) / 3.0);
        self.max_intensity = OnceCell::new();
        Ok(())
    }

    pub fn set_gradient(&mut self, gradient: Gradient) {
        self.color_map = gradient.color_map(self.opacity);
        self.gradient = gradient;
    }

    pub fn set_opacity(&mut self, opacity: f64) -> Result<()> {
        validate_opacity(opacity)?;
        self.opacity = opacity;
        self.color_map = self.gradient.color_map(opacity);
        Ok(())
    }

    /// Fix the intensity that maps to the top of the gradient; zero restores the
    /// data-derived estimate.
    pub fn set_max_intensity(&mut self, max_intensity: f64) -> Result<()> {
        validate_max_intensity(max_intensity)?;
        self.custom_max_intensity = max_intensity;
        self.max_intensity = OnceCell::new();
        Ok(())
    }

    /// Intensity mapped to the top of the gradient at `zoom`.
    pub fn max_intensity_at(&self, zoom: u32) -> f64 {
        let table = self.max_intensity.get_or_init(|| self.max_intensities());
        table[(zoom as usize).min(MAX_ZOOM_LEVEL - 1)]
    }

    fn max_intensities(&self) -> Vec<f64> {
        if self.custom_max_intensity != 0.0 {
            return vec![self.custom_max_intensity; MAX_ZOOM_LEVEL];
        }

        let mut table = vec![0.0; MAX_ZOOM_LEVEL];
        for zoom in DEFAULT_MIN_ZOOM..DEFAULT_MAX_ZOOM {
            let screen_dim = (f64::from(SCREEN_SIZE) * 2f64.powi(zoom as i32 - 3)) as u32;
            table[zoom] = max_value(&self.data, &self.bounds, self.radius, screen_dim);
        }
        let (low, high) = (table[DEFAULT_MIN_ZOOM], table[DEFAULT_MAX_ZOOM - 1]);
        table[..DEFAULT_MIN_ZOOM].fill(low);
        table[DEFAULT_MAX_ZOOM..].fill(high);

        log::debug!(
            "Computed heat map max intensities for radius {}: {:.3} at zoom {}, {:.3} at zoom {}",
            self.radius,
            low,
            DEFAULT_MIN_ZOOM,
            high,
            DEFAULT_MAX_ZOOM - 1
        );
        table
    }

    /// Render the tile at (`x`, `y`) for `zoom`.
    ///
    /// Returns [`Tile::NoTile`] when no point lies within reach of the tile.
    pub fn get_tile(&self, x: u32, y: u32, zoom: u32) -> Tile {
        match self.tile_intensity(x, y, zoom) {
            Some(grid) => Tile::Image {
                size: TILE_DIM,
                pixels: colorize(&grid, &self.color_map, self.max_intensity_at(zoom)),
            },
            None => Tile::NoTile,
        }
    }

    /// Blurred intensity for each pixel of the tile, indexed `[x][y]`.
    fn tile_intensity(&self, x: u32, y: u32, zoom: u32) -> Option<Vec<Vec<f64>>> {
        let radius = f64::from(self.radius);
        let tile_width = WORLD_WIDTH / 2f64.powf(f64::from(zoom));
        let padding = tile_width * radius / f64::from(TILE_DIM);
        let tile_width_padded = tile_width + 2.0 * padding;
        let dim = (TILE_DIM + self.radius * 2) as usize;
        let bucket_width = tile_width_padded / dim as f64;

        let min_x = f64::from(x) * tile_width - padding;
        let max_x = (f64::from(x) + 1.0) * tile_width + padding;
        let min_y = f64::from(y) * tile_width - padding;
        let max_y = (f64::from(y) + 1.0) * tile_width + padding;

        // Points across the antimeridian contribute from the other edge of the world.
        let (x_offset, wrapped) = if min_x < 0.0 {
            let overlap = Bounds::new(min_x + WORLD_WIDTH, WORLD_WIDTH, min_y, max_y);
            (-WORLD_WIDTH, self.tree.search(&overlap))
        } else if max_x > WORLD_WIDTH {
            let overlap = Bounds::new(0.0, max_x - WORLD_WIDTH, min_y, max_y);
            (WORLD_WIDTH, self.tree.search(&overlap))
        } else {
            (0.0, Vec::new())
        };

        let tile_bounds = Bounds::new(min_x, max_x, min_y, max_y);
        if !tile_bounds.intersects(&self.bounds.padded(padding)) {
            return None;
        }
        let points = self.tree.search(&tile_bounds);
        if points.is_empty() {
            return None;
        }

        let mut intensity = vec![vec![0.0; dim]; dim];
        let mut deposit = |px: f64, py: f64, value: f64| {
            let bucket_x = ((px - min_x) / bucket_width) as isize;
            let bucket_y = ((py - min_y) / bucket_width) as isize;
            if bucket_x < 0 || bucket_y < 0 {
                return;
            }
            let (bx, by) = (bucket_x as usize, bucket_y as usize);
            // A point exactly on the far edge lands one past the last bucket.
            if let Some(cell) = intensity
                .get_mut(bx.min(dim - 1))
                .and_then(|column| column.get_mut(by.min(dim - 1)))
            {
                *cell += value;
            }
        };
        for weighted in &points {
            let p = weighted.point();
            deposit(p.x, p.y, weighted.intensity());
        }
        for weighted in &wrapped {
            let p = weighted.point();
            deposit(p.x + x_offset, p.y, weighted.intensity());
        }

        Some(convolve(&intensity, &self.kernel))
    }
}

/// Gaussian weights for offsets `-radius..=radius`.
fn generate_kernel(radius: u32, sd: f64) -> Vec<f64> {
    let radius = radius as i64;
    (-radius..=radius)
        .map(|i| (-((i * i) as f64) / (2.0 * sd * sd)).exp())
        .collect()
}

/// Separable convolution of a square grid, trimming `kernel.len() / 2` cells from
/// every edge. Zero cells are skipped.
fn convolve(grid: &[Vec<f64>], kernel: &[f64]) -> Vec<Vec<f64>> {
    let radius = kernel.len() / 2;
    let dim_old = grid.len();
    let dim = dim_old - 2 * radius;
    let lower = radius;
    let upper = radius + dim - 1;

    let mut intermediate = vec![vec![0.0; dim_old]; dim_old];
    for x in 0..dim_old {
        for y in 0..dim_old {
            let value = grid[x][y];
            if value == 0.0 {
                continue;
            }
            let first = lower.max(x.saturating_sub(radius));
            let last = upper.min(x + radius);
            for x2 in first..=last {
                intermediate[x2][y] += value * kernel[x2 + radius - x];
            }
        }
    }

    let mut output = vec![vec![0.0; dim]; dim];
    for x in lower..=upper {
        for y in 0..dim_old {
            let value = intermediate[x][y];
            if value == 0.0 {
                continue;
            }
            let first = lower.max(y.saturating_sub(radius));
            let last = upper.min(y + radius);
            for y2 in first..=last {
                output[x - radius][y2 - radius] += value * kernel[y2 + radius - y];
            }
        }
    }
    output
}

/// Position in the color map for an intensity, or `None` for an empty cell.
fn color_index(value: f64, map_len: usize, max: f64) -> Option<usize> {
    if value == 0.0 {
        return None;
    }
    let scaled = value * (map_len - 1) as f64 / max;
    Some((scaled.max(0.0) as usize).min(map_len - 1))
}

/// Row-major ARGB pixels from a `[x][y]` intensity grid.
fn colorize(grid: &[Vec<f64>], color_map: &[u32], max: f64) -> Vec<u32> {
    let dim = grid.len();
    let mut pixels = vec![0u32; dim * dim];
    for (x, column) in grid.iter().enumerate() {
        for (y, &value) in column.iter().enumerate() {
            if let Some(index) = color_index(value, color_map.len(), max) {
                pixels[y * dim + x] = color_map[index];
            }
        }
    }
    pixels
}

/// Largest total intensity in any bucket when the data is laid over a
/// `screen_dim`-pixel screen in buckets of `2 * radius` pixels.
fn max_value(data: &[WeightedLatLng], bounds: &Bounds, radius: u32, screen_dim: u32) -> f64 {
    let bounds_dim = bounds.width().max(bounds.height());
    let buckets = (f64::from(screen_dim / (2 * radius)) + 0.5) as u32;
    let scale = f64::from(buckets) / bounds_dim;

    let mut totals: FxHashMap<(i64, i64), f64> = FxHashMap::default();
    let mut max = 0.0;
    for weighted in data {
        let p = weighted.point();
        let key = (
            ((p.x - bounds.min_x) * scale) as i64,
            ((p.y - bounds.min_y) * scale) as i64,
        );
        let total = totals.entry(key).or_insert(0.0);
        *total += weighted.intensity();
        if *total > max {
            max = *total;
        }
    }
    max
}
