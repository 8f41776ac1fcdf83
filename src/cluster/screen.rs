//! Screen-aware clustering contract and the adapter that gives any algorithm one.

use super::{Algorithm, AlgorithmLock, Cluster, ClusterItem};
use crate::camera::CameraPosition;
use crate::error::Result;
use tokio_util::sync::CancellationToken;

/// An algorithm that reacts to camera movement.
pub trait ScreenBasedAlgorithm<T: ClusterItem>: Algorithm<T> {
    /// Whether clusters must be recomputed on every camera move rather than only when
    /// the zoom changes.
    fn should_recluster_on_map_movement(&self) -> bool;

    fn on_camera_change(&self, camera: &CameraPosition);
}

/// Wraps any [`Algorithm`] so it can be driven through [`ScreenBasedAlgorithm`].
///
/// Everything is forwarded unchanged. Camera notifications reach the wrapped algorithm
/// only when it is itself screen based; otherwise they are dropped and
/// [`should_recluster_on_map_movement`](ScreenBasedAlgorithm::should_recluster_on_map_movement)
/// reports `false`.
pub struct ScreenBasedAlgorithmAdapter<T> {
    algorithm: Box<dyn Algorithm<T>>,
}

impl<T: ClusterItem> ScreenBasedAlgorithmAdapter<T> {
    pub fn new(algorithm: Box<dyn Algorithm<T>>) -> Self {
        Self { algorithm }
    }

    pub fn algorithm(&self) -> &dyn Algorithm<T> {
        self.algorithm.as_ref()
    }
}

impl<T: ClusterItem> Algorithm<T> for ScreenBasedAlgorithmAdapter<T> {
    fn add_item(&self, item: T) -> bool {
        self.algorithm.add_item(item)
    }

    fn add_items(&self, items: Vec<T>) -> bool {
        self.algorithm.add_items(items)
    }

    fn remove_item(&self, item: &T) -> bool {
        self.algorithm.remove_item(item)
    }

    fn remove_items(&self, items: &[T]) -> bool {
        self.algorithm.remove_items(items)
    }

    fn update_item(&self, item: T) -> bool {
        self.algorithm.update_item(item)
    }

    fn clear_items(&self) {
        self.algorithm.clear_items();
    }

    fn get_clusters(&self, zoom: f32, cancel: &CancellationToken) -> Vec<Cluster<T>> {
        self.algorithm.get_clusters(zoom, cancel)
    }

    fn items(&self) -> Vec<T> {
        self.algorithm.items()
    }

    fn max_distance_between_clustered_items(&self) -> u32 {
        self.algorithm.max_distance_between_clustered_items()
    }

    fn set_max_distance_between_clustered_items(&self, max_distance: u32) -> Result<()> {
        self.algorithm
            .set_max_distance_between_clustered_items(max_distance)
    }

    fn lock(&self) -> AlgorithmLock<'_> {
        self.algorithm.lock()
    }

    fn as_screen_based(&self) -> Option<&dyn ScreenBasedAlgorithm<T>> {
        Some(self)
    }
}

impl<T: ClusterItem> ScreenBasedAlgorithm<T> for ScreenBasedAlgorithmAdapter<T> {
    fn should_recluster_on_map_movement(&self) -> bool {
        self.algorithm
            .as_screen_based()
            .is_some_and(|screen| screen.should_recluster_on_map_movement())
    }

    fn on_camera_change(&self, camera: &CameraPosition) {
        if let Some(screen) = self.algorithm.as_screen_based() {
            screen.on_camera_change(camera);
        }
    }
}
