//! Glue between camera events and a clustering algorithm.

use crate::camera::CameraPosition;
use crate::cluster::{
    Algorithm, Cluster, ClusterItem, GridBasedAlgorithm, NonHierarchicalDistanceBasedAlgorithm,
    NonHierarchicalViewBasedAlgorithm, PreCachingAlgorithmDecorator, ScreenBasedAlgorithmAdapter,
};
use crate::config::{AlgorithmKind, Config};
use crate::error::Result;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Default)]
struct ManagerState {
    last_zoom: Option<i32>,
    run: CancellationToken,
}

/// Owns an algorithm stack and decides when the camera warrants reclustering.
///
/// A new run cancels the previous one, so a stale computation still in progress on
/// another thread returns early with partial results that callers should drop.
pub struct ClusterManager<T> {
    algorithm: Arc<dyn Algorithm<T>>,
    state: Mutex<ManagerState>,
}

impl<T: ClusterItem> ClusterManager<T> {
    /// Distance-based clustering behind a precache and a screen adapter.
    pub fn new() -> Self {
        let algorithm = ScreenBasedAlgorithmAdapter::new(Box::new(
            PreCachingAlgorithmDecorator::new(Box::new(NonHierarchicalDistanceBasedAlgorithm::new())),
        ));
        Self::with_algorithm(Arc::new(algorithm))
    }

    pub fn with_config(config: &Config) -> Result<Self> {
        config.validate()?;
        let clustering = &config.clustering;

        let base: Box<dyn Algorithm<T>> = match clustering.algorithm {
            AlgorithmKind::Distance => Box::new(
                NonHierarchicalDistanceBasedAlgorithm::with_max_distance(clustering.max_distance)?,
            ),
            AlgorithmKind::Grid => {
                Box::new(GridBasedAlgorithm::with_grid_size(clustering.max_distance)?)
            }
            AlgorithmKind::ViewBased => {
                let algorithm = NonHierarchicalViewBasedAlgorithm::new(clustering.viewport);
                algorithm.set_max_distance_between_clustered_items(clustering.max_distance)?;
                Box::new(algorithm)
            }
        };

        // View-based results depend on the camera, not just the zoom, so they are never cached.
        let precache = config.precache.enabled && clustering.algorithm != AlgorithmKind::ViewBased;
        let cached: Box<dyn Algorithm<T>> = if precache {
            Box::new(PreCachingAlgorithmDecorator::with_config(base, config.precache.clone())?)
        } else {
            base
        };

        log::debug!(
            "Building cluster manager with {:?} clustering (precache {})",
            clustering.algorithm,
            precache
        );
        Ok(Self::with_algorithm(Arc::new(ScreenBasedAlgorithmAdapter::new(cached))))
    }

    pub fn with_algorithm(algorithm: Arc<dyn Algorithm<T>>) -> Self {
        Self {
            algorithm,
            state: Mutex::new(ManagerState::default()),
        }
    }

    pub fn algorithm(&self) -> &Arc<dyn Algorithm<T>> {
        &self.algorithm
    }

    pub fn add_item(&self, item: T) -> bool {
        self.algorithm.add_item(item)
    }

    pub fn add_items(&self, items: Vec<T>) -> bool {
        self.algorithm.add_items(items)
    }

    pub fn remove_item(&self, item: &T) -> bool {
        self.algorithm.remove_item(item)
    }

    pub fn remove_items(&self, items: &[T]) -> bool {
        self.algorithm.remove_items(items)
    }

    pub fn update_item(&self, item: T) -> bool {
        self.algorithm.update_item(item)
    }

    pub fn clear_items(&self) {
        self.algorithm.clear_items();
    }

    /// Discrete zoom of the most recent run.
    pub fn last_zoom(&self) -> Option<i32> {
        self.state.lock().last_zoom
    }

    /// Feed a settled camera. Returns fresh clusters when the discrete zoom changed or
    /// the algorithm reclusters on every movement, `None` otherwise.
    pub fn on_camera_idle(&self, camera: &CameraPosition) -> Option<Vec<Cluster<T>>> {
        let screen = self.algorithm.as_screen_based();
        if let Some(screen) = screen {
            screen.on_camera_change(camera);
        }

        let moved_zoom = self.last_zoom() != Some(camera.discrete_zoom());
        let follows_movement = screen.is_some_and(|s| s.should_recluster_on_map_movement());
        if !moved_zoom && !follows_movement {
            log::trace!("Camera idle at zoom {} needs no reclustering", camera.zoom);
            return None;
        }
        Some(self.cluster(camera.zoom))
    }

    /// Recluster at `zoom`, cancelling any run still in flight.
    pub fn cluster(&self, zoom: f32) -> Vec<Cluster<T>> {
        let token = CancellationToken::new();
        {
            let mut state = self.state.lock();
            state.run.cancel();
            state.run = token.clone();
            state.last_zoom = Some(zoom.trunc() as i32);
        }
        self.algorithm.get_clusters(zoom, &token)
    }

    /// Cancel the run in flight, if any.
    pub fn cancel(&self) {
        self.state.lock().run.cancel();
    }
}

impl<T: ClusterItem> Default for ClusterManager<T> {
    fn default() -> Self {
        Self::new()
    }
}
