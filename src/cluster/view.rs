//! Distance clustering restricted to the visible viewport.

use super::distance::DistanceState;
use super::{
    Algorithm, AlgorithmLock, Cluster, ClusterItem, NonHierarchicalDistanceBasedAlgorithm,
    QuadItem, ScreenBasedAlgorithm,
};
use crate::camera::{CameraPosition, ViewportSize};
use crate::error::Result;
use crate::projection::SphericalMercatorProjection;
use crate::quadtree::Bounds;
use geo::Point;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy)]
struct ViewState {
    center: Option<Point>,
    viewport: ViewportSize,
}

/// [`NonHierarchicalDistanceBasedAlgorithm`] that only considers items inside the current
/// viewport, so clusters must be recomputed whenever the camera moves.
///
/// Until the first [`on_camera_change`](ScreenBasedAlgorithm::on_camera_change) there is no
/// viewport and no clusters are produced.
pub struct NonHierarchicalViewBasedAlgorithm<T> {
    inner: NonHierarchicalDistanceBasedAlgorithm<T>,
    view: Mutex<ViewState>,
}

impl<T: ClusterItem> NonHierarchicalViewBasedAlgorithm<T> {
    pub fn new(viewport: ViewportSize) -> Self {
        Self {
            inner: NonHierarchicalDistanceBasedAlgorithm::new(),
            view: Mutex::new(ViewState {
                center: None,
                viewport,
            }),
        }
    }

    pub fn update_view_size(&self, viewport: ViewportSize) {
        let _lock = self.inner.lock();
        self.view.lock().viewport = viewport;
    }

    /// Visible region in unit-plane coordinates; may extend past `[0, 1]` horizontally.
    fn visible_bounds(&self, zoom: f32) -> Option<Bounds> {
        let view = *self.view.lock();
        let center = view.center?;
        let p = SphericalMercatorProjection::unit().to_point(&center);
        let scale = 2f64.powf(f64::from(zoom)) * 256.0;
        let half_width = f64::from(view.viewport.width) / scale / 2.0;
        let half_height = f64::from(view.viewport.height) / scale / 2.0;

        Some(Bounds::new(
            p.x - half_width,
            p.x + half_width,
            p.y - half_height,
            p.y + half_height,
        ))
    }
}

/// Items inside `visible`, including the parts that wrap across the antimeridian.
fn visible_items<T: ClusterItem>(state: &DistanceState<T>, visible: Bounds) -> Vec<QuadItem<T>> {
    let mut items = Vec::new();
    let mut visible = visible;

    if visible.min_x < 0.0 {
        let wrapped = Bounds::new(visible.min_x + 1.0, 1.0, visible.min_y, visible.max_y);
        items.extend(state.tree.search(&wrapped));
        visible = Bounds::new(0.0, visible.max_x, visible.min_y, visible.max_y);
    }
    if visible.max_x > 1.0 {
        let wrapped = Bounds::new(0.0, visible.max_x - 1.0, visible.min_y, visible.max_y);
        items.extend(state.tree.search(&wrapped));
        visible = Bounds::new(visible.min_x, 1.0, visible.min_y, visible.max_y);
    }
    items.extend(state.tree.search(&visible));
    items
}

impl<T: ClusterItem> Algorithm<T> for NonHierarchicalViewBasedAlgorithm<T> {
    fn add_item(&self, item: T) -> bool {
        self.inner.add_item(item)
    }

    fn add_items(&self, items: Vec<T>) -> bool {
        self.inner.add_items(items)
    }

    fn remove_item(&self, item: &T) -> bool {
        self.inner.remove_item(item)
    }

    fn remove_items(&self, items: &[T]) -> bool {
        self.inner.remove_items(items)
    }

    fn update_item(&self, item: T) -> bool {
        self.inner.update_item(item)
    }

    fn clear_items(&self) {
        self.inner.clear_items();
    }

    fn get_clusters(&self, zoom: f32, cancel: &CancellationToken) -> Vec<Cluster<T>> {
        let _lock = self.inner.lock();
        let Some(visible) = self.visible_bounds(zoom) else {
            return Vec::new();
        };
        if !visible.is_finite() {
            log::warn!("Rejecting view clustering with non-finite viewport bounds");
            return Vec::new();
        }
        self.inner
            .clusters_from(zoom, cancel, |state| visible_items(state, visible))
    }

    fn items(&self) -> Vec<T> {
        self.inner.items()
    }

    fn max_distance_between_clustered_items(&self) -> u32 {
        self.inner.max_distance_between_clustered_items()
    }

    fn set_max_distance_between_clustered_items(&self, max_distance: u32) -> Result<()> {
        self.inner
            .set_max_distance_between_clustered_items(max_distance)
    }

    fn lock(&self) -> AlgorithmLock<'_> {
        self.inner.lock()
    }

    fn as_screen_based(&self) -> Option<&dyn ScreenBasedAlgorithm<T>> {
        Some(self)
    }
}

impl<T: ClusterItem> ScreenBasedAlgorithm<T> for NonHierarchicalViewBasedAlgorithm<T> {
    fn should_recluster_on_map_movement(&self) -> bool {
        true
    }

    fn on_camera_change(&self, camera: &CameraPosition) {
        let _lock = self.inner.lock();
        self.view.lock().center = Some(camera.target);
    }
}
