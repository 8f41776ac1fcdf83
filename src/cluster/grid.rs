//! Grid clustering: one cluster per occupied cell.

use super::{
    Algorithm, AlgorithmLock, Cluster, ClusterItem, DEFAULT_MAX_DISTANCE_AT_ZOOM, Gate,
    StaticCluster, is_clusterable, validate_max_distance,
};
use crate::error::Result;
use crate::projection::SphericalMercatorProjection;
use geo::Coord;
use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use tokio_util::sync::CancellationToken;

struct GridState<T> {
    items: Vec<T>,
    members: FxHashSet<T>,
    grid_size: u32,
}

/// Partitions the world into `ceil(256 * 2^zoom / grid_size)` square cells per side and
/// groups the items of each occupied cell into a [`StaticCluster`] centered on that cell.
///
/// Every cluster is a [`Cluster::Static`], including cells holding a single item.
pub struct GridBasedAlgorithm<T> {
    gate: Gate,
    state: Mutex<GridState<T>>,
}

impl<T: ClusterItem> GridBasedAlgorithm<T> {
    pub fn new() -> Self {
        Self {
            gate: Gate::default(),
            state: Mutex::new(GridState {
                items: Vec::new(),
                members: FxHashSet::default(),
                grid_size: DEFAULT_MAX_DISTANCE_AT_ZOOM,
            }),
        }
    }

    pub fn with_grid_size(grid_size: u32) -> Result<Self> {
        validate_max_distance(grid_size)?;
        let algorithm = Self::new();
        algorithm.state.lock().grid_size = grid_size;
        Ok(algorithm)
    }
}

impl<T: ClusterItem> Default for GridBasedAlgorithm<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ClusterItem> GridState<T> {
    fn add(&mut self, item: T) -> bool {
        if self.members.contains(&item) || !is_clusterable(&item.position()) {
            return false;
        }
        self.members.insert(item.clone());
        self.items.push(item);
        true
    }

    fn remove(&mut self, item: &T) -> bool {
        if !self.members.remove(item) {
            return false;
        }
        self.items.retain(|existing| existing != item);
        true
    }
}

/// Number of cells along each side of the world at `zoom`.
pub(crate) fn cell_count(grid_size: u32, zoom: f32) -> f64 {
    (256.0 * 2f64.powf(f64::from(zoom)) / f64::from(grid_size)).ceil()
}

/// Column and row of the cell holding `point`.
fn cell_key(point: Coord) -> (i64, i64) {
    (point.x.floor() as i64, point.y.floor() as i64)
}

impl<T: ClusterItem> Algorithm<T> for GridBasedAlgorithm<T> {
    fn add_item(&self, item: T) -> bool {
        let _lock = self.gate.lock();
        self.state.lock().add(item)
    }

    fn add_items(&self, items: Vec<T>) -> bool {
        let _lock = self.gate.lock();
        let mut state = self.state.lock();
        let mut changed = false;
        for item in items {
            changed |= state.add(item);
        }
        changed
    }

    fn remove_item(&self, item: &T) -> bool {
        let _lock = self.gate.lock();
        self.state.lock().remove(item)
    }

    fn remove_items(&self, items: &[T]) -> bool {
        let _lock = self.gate.lock();
        let mut state = self.state.lock();
        let removed: FxHashSet<&T> = items
            .iter()
            .filter(|item| state.members.remove(*item))
            .collect();
        if removed.is_empty() {
            return false;
        }
        state.items.retain(|existing| !removed.contains(existing));
        true
    }

    fn update_item(&self, item: T) -> bool {
        let _lock = self.gate.lock();
        if !is_clusterable(&item.position()) {
            return false;
        }
        let mut state = self.state.lock();
        state.remove(&item) && state.add(item)
    }

    fn clear_items(&self) {
        let _lock = self.gate.lock();
        let mut state = self.state.lock();
        state.items.clear();
        state.members.clear();
    }

    fn get_clusters(&self, zoom: f32, cancel: &CancellationToken) -> Vec<Cluster<T>> {
        let _lock = self.gate.lock();
        let state = self.state.lock();

        let num_cells = cell_count(state.grid_size, zoom);
        let projection = SphericalMercatorProjection::new(num_cells);

        let mut cells: FxHashMap<(i64, i64), StaticCluster<T>> = FxHashMap::default();
        let mut order: Vec<(i64, i64)> = Vec::new();

        for item in &state.items {
            if cancel.is_cancelled() {
                log::debug!("Grid clustering at zoom {} cancelled", zoom);
                break;
            }

            let point = projection.to_point(&item.position());
            let key = cell_key(point);
            cells
                .entry(key)
                .or_insert_with(|| {
                    order.push(key);
                    let center = Coord {
                        x: point.x.floor() + 0.5,
                        y: point.y.floor() + 0.5,
                    };
                    StaticCluster::new(projection.to_lat_lng(center))
                })
                .add(item.clone());
        }

        order
            .into_iter()
            .filter_map(|key| cells.remove(&key))
            .map(Cluster::Static)
            .collect()
    }

    fn items(&self) -> Vec<T> {
        let _lock = self.gate.lock();
        self.state.lock().items.clone()
    }

    fn max_distance_between_clustered_items(&self) -> u32 {
        let _lock = self.gate.lock();
        self.state.lock().grid_size
    }

    fn set_max_distance_between_clustered_items(&self, max_distance: u32) -> Result<()> {
        validate_max_distance(max_distance)?;
        let _lock = self.gate.lock();
        self.state.lock().grid_size = max_distance;
        Ok(())
    }

    fn lock(&self) -> AlgorithmLock<'_> {
        self.gate.lock()
    }
}
