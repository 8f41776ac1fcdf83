//! Greedy, single-pass distance clustering backed by a point quad-tree.

use super::{
    Algorithm, AlgorithmLock, Cluster, ClusterItem, DEFAULT_MAX_DISTANCE_AT_ZOOM, Gate, QuadItem,
    StaticCluster, is_clusterable, validate_max_distance,
};
use crate::error::Result;
use crate::projection::SphericalMercatorProjection;
use crate::quadtree::{Bounds, PointQuadTree};
use geo::Coord;
use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use tokio_util::sync::CancellationToken;

pub(crate) struct DistanceState<T> {
    /// Insertion order; candidates are visited in this order.
    pub(crate) items: Vec<QuadItem<T>>,
    /// Projected point each item was indexed under.
    points: FxHashMap<T, Coord>,
    pub(crate) tree: PointQuadTree<QuadItem<T>>,
    pub(crate) max_distance: u32,
}

impl<T: ClusterItem> DistanceState<T> {
    fn new() -> Self {
        Self {
            items: Vec::new(),
            points: FxHashMap::default(),
            tree: PointQuadTree::new(Bounds::new(0.0, 1.0, 0.0, 1.0)),
            max_distance: DEFAULT_MAX_DISTANCE_AT_ZOOM,
        }
    }

    fn add(&mut self, item: T, projection: &SphericalMercatorProjection) -> bool {
        if self.points.contains_key(&item) || !is_clusterable(&item.position()) {
            return false;
        }
        let quad = QuadItem::new(item.clone(), projection);
        self.points.insert(item, quad.point);
        self.tree.add(quad.clone());
        self.items.push(quad);
        true
    }

    /// Drop an item from the lookup and the tree; the ordered list is pruned by the caller.
    fn detach(&mut self, item: &T) -> bool {
        let Some(point) = self.points.remove(item) else {
            return false;
        };
        let quad = QuadItem {
            item: item.clone(),
            point,
            position: item.position(),
        };
        self.tree.remove(&quad);
        true
    }

    fn remove(&mut self, item: &T) -> bool {
        if !self.detach(item) {
            return false;
        }
        self.items.retain(|quad| quad.item != *item);
        true
    }

    fn clear(&mut self) {
        self.items.clear();
        self.points.clear();
        self.tree.clear();
    }
}

/// Distance-based clustering that is not hierarchical across zoom levels.
///
/// For each zoom, items are visited in insertion order. An unclaimed item gathers every
/// item within a square of side `max_distance / 2^floor(zoom) / 256` (unit-plane units)
/// around it. A lone hit becomes a [`Cluster::Single`]; otherwise a [`StaticCluster`]
/// is created at the candidate's position and each hit joins it unless an earlier
/// cluster is at least as close. Results depend on insertion order and are not globally
/// optimal.
pub struct NonHierarchicalDistanceBasedAlgorithm<T> {
    gate: Gate,
    state: Mutex<DistanceState<T>>,
    projection: SphericalMercatorProjection,
}

impl<T: ClusterItem> NonHierarchicalDistanceBasedAlgorithm<T> {
    pub fn new() -> Self {
        Self {
            gate: Gate::default(),
            state: Mutex::new(DistanceState::new()),
            projection: SphericalMercatorProjection::unit(),
        }
    }

    pub fn with_max_distance(max_distance: u32) -> Result<Self> {
        validate_max_distance(max_distance)?;
        let algorithm = Self::new();
        algorithm.state.lock().max_distance = max_distance;
        Ok(algorithm)
    }

    /// Cluster the candidates chosen by `select` from the tree and the ordered items.
    pub(crate) fn clusters_from<F>(
        &self,
        zoom: f32,
        cancel: &CancellationToken,
        select: F,
    ) -> Vec<Cluster<T>>
    where
        F: FnOnce(&DistanceState<T>) -> Vec<QuadItem<T>>,
    {
        let _lock = self.gate.lock();
        let state = self.state.lock();
        let candidates = select(&*state);
        cluster_candidates(&state.tree, candidates, state.max_distance, zoom, cancel)
    }
}

impl<T: ClusterItem> Default for NonHierarchicalDistanceBasedAlgorithm<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ClusterItem> Algorithm<T> for NonHierarchicalDistanceBasedAlgorithm<T> {
    fn add_item(&self, item: T) -> bool {
        let _lock = self.gate.lock();
        self.state.lock().add(item, &self.projection)
    }

    fn add_items(&self, items: Vec<T>) -> bool {
        let _lock = self.gate.lock();
        let mut state = self.state.lock();
        let mut changed = false;
        for item in items {
            changed |= state.add(item, &self.projection);
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
        let mut removed = FxHashSet::default();
        for item in items {
            if state.detach(item) {
                removed.insert(item.clone());
            }
        }
        if removed.is_empty() {
            return false;
        }
        state.items.retain(|quad| !removed.contains(&quad.item));
        true
    }

    fn update_item(&self, item: T) -> bool {
        let _lock = self.gate.lock();
        if !is_clusterable(&item.position()) {
            return false;
        }
        let mut state = self.state.lock();
        state.remove(&item) && state.add(item, &self.projection)
    }

    fn clear_items(&self) {
        let _lock = self.gate.lock();
        self.state.lock().clear();
    }

    fn get_clusters(&self, zoom: f32, cancel: &CancellationToken) -> Vec<Cluster<T>> {
        self.clusters_from(zoom, cancel, |state| state.items.clone())
    }

    fn items(&self) -> Vec<T> {
        let _lock = self.gate.lock();
        self.state
            .lock()
            .items
            .iter()
            .map(|quad| quad.item.clone())
            .collect()
    }

    fn max_distance_between_clustered_items(&self) -> u32 {
        let _lock = self.gate.lock();
        self.state.lock().max_distance
    }

    fn set_max_distance_between_clustered_items(&self, max_distance: u32) -> Result<()> {
        validate_max_distance(max_distance)?;
        let _lock = self.gate.lock();
        self.state.lock().max_distance = max_distance;
        Ok(())
    }

    fn lock(&self) -> AlgorithmLock<'_> {
        self.gate.lock()
    }
}

fn distance_squared(a: Coord, b: Coord) -> f64 {
    (a.x - b.x) * (a.x - b.x) + (a.y - b.y) * (a.y - b.y)
}

/// Search span in unit-plane units for a zoom level.
pub(crate) fn zoom_specific_span(max_distance: u32, zoom: f32) -> f64 {
    let discrete_zoom = zoom.floor() as i32;
    f64::from(max_distance) / 2f64.powi(discrete_zoom) / 256.0
}

pub(crate) fn cluster_candidates<T: ClusterItem>(
    tree: &PointQuadTree<QuadItem<T>>,
    candidates: Vec<QuadItem<T>>,
    max_distance: u32,
    zoom: f32,
    cancel: &CancellationToken,
) -> Vec<Cluster<T>> {
    let span = zoom_specific_span(max_distance, zoom);

    let mut visited: FxHashSet<T> = FxHashSet::default();
    let mut distance_to_cluster: FxHashMap<T, f64> = FxHashMap::default();
    let mut item_to_cluster: FxHashMap<T, usize> = FxHashMap::default();
    let mut results: Vec<Cluster<T>> = Vec::new();

    'candidates: for candidate in candidates {
        if cancel.is_cancelled() {
            log::debug!(
                "Clustering at zoom {} cancelled with {} clusters built",
                zoom,
                results.len()
            );
            break;
        }
        if visited.contains(&candidate.item) {
            continue;
        }

        let hits = tree.search(&Bounds::from_span(candidate.point, span));
        if hits.len() == 1 {
            visited.insert(candidate.item.clone());
            distance_to_cluster.insert(candidate.item.clone(), 0.0);
            results.push(Cluster::Single(candidate.item));
            continue;
        }

        let index = results.len();
        let mut cluster = StaticCluster::new(candidate.position);

        for hit in hits {
            if cancel.is_cancelled() {
                results.push(Cluster::Static(cluster));
                log::debug!("Clustering at zoom {} cancelled mid-cluster", zoom);
                break 'candidates;
            }

            visited.insert(hit.item.clone());
            let distance = distance_squared(hit.point, candidate.point);
            if let Some(&existing) = distance_to_cluster.get(&hit.item) {
                // Equal distance keeps the earlier assignment.
                if existing <= distance {
                    continue;
                }
                if let Some(&previous_index) = item_to_cluster.get(&hit.item)
                    && let Cluster::Static(previous) = &mut results[previous_index]
                {
                    previous.remove(&hit.item);
                }
            }

            distance_to_cluster.insert(hit.item.clone(), distance);
            item_to_cluster.insert(hit.item.clone(), index);
            cluster.add(hit.item);
        }

        results.push(Cluster::Static(cluster));
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::Marker;
    use geo::Point;

    fn marker(id: u64, lng: f64, lat: f64) -> Marker {
        Marker::new(id, Point::new(lng, lat))
    }

    #[test]
    fn test_span() {
        assert!((zoom_specific_span(100, 0.0) - 100.0 / 256.0).abs() < 1e-12);
        assert!((zoom_specific_span(100, 3.7) - 100.0 / 8.0 / 256.0).abs() < 1e-12);
    }

    #[test]
    fn test_add_remove_update() {
        let algorithm = NonHierarchicalDistanceBasedAlgorithm::new();
        let a = marker(1, 10.0, 10.0);

        assert!(algorithm.add_item(a.clone()));
        assert!(!algorithm.add_item(a.clone()));
        assert!(algorithm.update_item(marker(1, 20.0, 20.0)));
        assert!(!algorithm.update_item(marker(2, 0.0, 0.0)));
        assert_eq!(algorithm.items().len(), 1);

        assert!(algorithm.remove_item(&a));
        assert!(!algorithm.remove_item(&a));
        assert!(algorithm.items().is_empty());
    }

    #[test]
    fn test_remove_items_keeps_order() {
        let algorithm = NonHierarchicalDistanceBasedAlgorithm::new();
        let markers: Vec<Marker> = (0..6).map(|i| marker(i, i as f64, 0.0)).collect();
        assert!(algorithm.add_items(markers.clone()));
        assert!(algorithm.remove_items(&[markers[1].clone(), markers[4].clone()]));
        assert!(!algorithm.remove_items(&[markers[1].clone()]));

        let ids: Vec<u64> = algorithm.items().iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![0, 2, 3, 5]);
    }

    #[test]
    fn test_updated_item_moves_in_index() {
        let algorithm = NonHierarchicalDistanceBasedAlgorithm::new();
        algorithm.add_item(marker(1, 10.0, 10.0));
        algorithm.add_item(marker(2, 10.0001, 10.0));
        algorithm.update_item(marker(2, -120.0, -40.0));

        let clusters = algorithm.get_clusters(10.0, &CancellationToken::new());
        assert_eq!(clusters.len(), 2);
        assert!(clusters.iter().all(|c| c.size() == 1));
    }

    #[test]
    fn test_unprojectable_items_rejected() {
        let algorithm = NonHierarchicalDistanceBasedAlgorithm::new();
        assert!(!algorithm.add_item(marker(1, f64::NAN, 0.0)));
        assert!(!algorithm.add_item(marker(2, 200.0, 0.0)));
        assert!(algorithm.items().is_empty());
    }

    #[test]
    fn test_closer_cluster_claims_item() {
        // Candidate order: a, then c. b sits between them but closer to c, so it
        // migrates from a's cluster to c's cluster.
        let algorithm = NonHierarchicalDistanceBasedAlgorithm::with_max_distance(100).unwrap();
        let projection = SphericalMercatorProjection::unit();
        let zoom = 5.0;
        let span = zoom_specific_span(100, zoom);

        let at = |x: f64| projection.to_lat_lng(Coord { x, y: 0.5 });
        let a = Marker::new(1, at(0.5));
        let b = Marker::new(2, at(0.5 + span * 0.45));
        let c = Marker::new(3, at(0.5 + span * 0.8));
        let d = Marker::new(4, at(0.5 - span * 0.4));
        algorithm.add_items(vec![a.clone(), d.clone(), b.clone(), c.clone()]);

        let clusters = algorithm.get_clusters(zoom, &CancellationToken::new());
        let holder = |m: &Marker| {
            clusters
                .iter()
                .position(|cl| cl.contains(m))
                .expect("every marker is clustered")
        };

        assert_eq!(holder(&a), holder(&d));
        assert_ne!(holder(&a), holder(&b));
        assert_eq!(holder(&b), holder(&c));
    }

    #[test]
    fn test_cancelled_before_start_returns_nothing() {
        let algorithm = NonHierarchicalDistanceBasedAlgorithm::new();
        algorithm.add_items((0..10).map(|i| marker(i, i as f64, 0.0)).collect());
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(algorithm.get_clusters(3.0, &cancel).is_empty());
    }

    #[test]
    fn test_invalid_max_distance() {
        let algorithm = NonHierarchicalDistanceBasedAlgorithm::<Marker>::new();
        assert!(algorithm.set_max_distance_between_clustered_items(0).is_err());
        assert_eq!(algorithm.max_distance_between_clustered_items(), 100);
        assert!(NonHierarchicalDistanceBasedAlgorithm::<Marker>::with_max_distance(0).is_err());
    }
}
