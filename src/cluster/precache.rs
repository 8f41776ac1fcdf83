//! Per-zoom result cache with speculative computation of neighbouring zoom levels.

use super::{Algorithm, AlgorithmLock, Cluster, ClusterItem};
use crate::camera::{MAX_ZOOM, MIN_ZOOM};
use crate::config::PrecacheConfig;
use crate::error::{GeoclusterError, Result};
use parking_lot::Mutex;
use rand::Rng;
use rustc_hash::FxHashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

/// Least-recently-used map from discrete zoom to the clusters computed for it.
struct ClusterCache<T> {
    capacity: usize,
    /// Front is least recently used.
    order: VecDeque<i32>,
    entries: FxHashMap<i32, Vec<Cluster<T>>>,
}

impl<T: ClusterItem> ClusterCache<T> {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            order: VecDeque::with_capacity(capacity + 1),
            entries: FxHashMap::default(),
        }
    }

    fn touch(&mut self, zoom: i32) {
        if let Some(index) = self.order.iter().position(|&z| z == zoom) {
            self.order.remove(index);
        }
        self.order.push_back(zoom);
    }

    fn get(&mut self, zoom: i32) -> Option<Vec<Cluster<T>>> {
        let clusters = self.entries.get(&zoom)?.clone();
        self.touch(zoom);
        Some(clusters)
    }

    fn contains(&self, zoom: i32) -> bool {
        self.entries.contains_key(&zoom)
    }

    fn put(&mut self, zoom: i32, clusters: Vec<Cluster<T>>) {
        self.entries.insert(zoom, clusters);
        self.touch(zoom);
        while self.order.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.entries.remove(&evicted);
            }
        }
    }

    fn clear(&mut self) {
        self.order.clear();
        self.entries.clear();
    }
}

struct Shared<T> {
    algorithm: Box<dyn Algorithm<T>>,
    cache: Mutex<ClusterCache<T>>,
}

impl<T: ClusterItem> Shared<T> {
    /// Cached clusters for `zoom`, computing and storing them on a miss.
    ///
    /// A result whose computation was cancelled is returned but not stored.
    fn clusters(&self, zoom: i32, cancel: &CancellationToken) -> Vec<Cluster<T>> {
        let _lock = self.algorithm.lock();
        if let Some(clusters) = self.cache.lock().get(zoom) {
            return clusters;
        }

        let clusters = self.algorithm.get_clusters(zoom as f32, cancel);
        if cancel.is_cancelled() {
            log::debug!("Not caching partial clusters for zoom {}", zoom);
        } else {
            self.cache.lock().put(zoom, clusters.clone());
        }
        clusters
    }

    fn precache(&self, zoom: i32, cancel: &CancellationToken) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(GeoclusterError::Cancelled);
        }

        let _lock = self.algorithm.lock();
        if self.cache.lock().contains(zoom) {
            return Ok(());
        }

        let clusters = self.algorithm.get_clusters(zoom as f32, cancel);
        if cancel.is_cancelled() {
            return Err(GeoclusterError::Cancelled);
        }
        self.cache.lock().put(zoom, clusters);
        Ok(())
    }

    fn invalidate(&self) {
        log::debug!("Invalidating cluster cache");
        self.cache.lock().clear();
    }
}

/// Caches the clusters of the wrapped algorithm per discrete zoom level.
///
/// A request for zoom `z` is served from the cache when possible. Afterwards, `z - 1` and
/// `z + 1` are computed in the background after a random delay, unless already cached.
/// The background work observes the caller's cancellation token and any failure is
/// dropped. Every mutation clears the whole cache.
///
/// Background precaching runs on the tokio runtime current at construction (or the one
/// given to [`with_runtime`](Self::with_runtime)). Without a runtime the decorator still
/// caches but never precomputes.
///
/// The cache is guarded by the wrapped algorithm's lock, which [`lock`](Algorithm::lock)
/// also hands out.
///
/// The decorator is not screen based. Cached results are keyed by zoom alone, so an
/// algorithm that clusters against the camera must not be wrapped: camera changes
/// routed through a [`ScreenBasedAlgorithmAdapter`](super::ScreenBasedAlgorithmAdapter)
/// never reach it.
pub struct PreCachingAlgorithmDecorator<T> {
    shared: Arc<Shared<T>>,
    config: PrecacheConfig,
    runtime: Option<Handle>,
}

impl<T: ClusterItem> PreCachingAlgorithmDecorator<T> {
    pub fn new(algorithm: Box<dyn Algorithm<T>>) -> Self {
        Self::build(algorithm, PrecacheConfig::default())
    }

    pub fn with_config(algorithm: Box<dyn Algorithm<T>>, config: PrecacheConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(algorithm, config))
    }

    fn build(algorithm: Box<dyn Algorithm<T>>, config: PrecacheConfig) -> Self {
        if algorithm.as_screen_based().is_some() {
            log::warn!("Precaching a screen-based algorithm; camera updates will not reach it");
        }
        let runtime = Handle::try_current().ok();
        if runtime.is_none() {
            log::debug!("No tokio runtime available; cluster precaching disabled");
        }
        Self {
            shared: Arc::new(Shared {
                algorithm,
                cache: Mutex::new(ClusterCache::new(config.capacity)),
            }),
            config,
            runtime,
        }
    }

    /// Run background precaching on `handle`.
    pub fn with_runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    pub fn algorithm(&self) -> &dyn Algorithm<T> {
        self.shared.algorithm.as_ref()
    }

    /// Discrete zoom levels currently cached, least recently used first.
    pub fn cached_zooms(&self) -> Vec<i32> {
        self.shared.cache.lock().order.iter().copied().collect()
    }

    fn delay(&self) -> Duration {
        let millis = rand::thread_rng().gen_range(self.config.min_delay_ms..=self.config.max_delay_ms);
        Duration::from_millis(millis)
    }

    fn schedule_precache(&self, zoom: i32, cancel: &CancellationToken) {
        let Some(runtime) = &self.runtime else {
            return;
        };
        if !(MIN_ZOOM as i32..=MAX_ZOOM as i32).contains(&zoom) || cancel.is_cancelled() {
            return;
        }
        if self.shared.cache.lock().contains(zoom) {
            return;
        }

        let delay = self.delay();
        let shared = Arc::clone(&self.shared);
        let cancel = cancel.clone();
        log::debug!("Scheduling precache of zoom {} in {:?}", zoom, delay);

        runtime.spawn(async move {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    log::trace!("Precache of zoom {} cancelled before start", zoom);
                    return;
                }
                _ = tokio::time::sleep(delay) => {}
            }

            let outcome = tokio::task::spawn_blocking(move || shared.precache(zoom, &cancel)).await;
            match outcome {
                Ok(Ok(())) => log::trace!("Precached clusters for zoom {}", zoom),
                Ok(Err(e)) => log::trace!("Discarding precache of zoom {}: {}", zoom, e),
                Err(e) => log::trace!("Precache worker for zoom {} failed: {}", zoom, e),
            }
        });
    }

    /// Apply `mutate` to the wrapped algorithm and clear the cache, under one lock.
    fn mutate<R>(&self, mutate: impl FnOnce(&dyn Algorithm<T>) -> R) -> R {
        let _lock = self.shared.algorithm.lock();
        let result = mutate(self.shared.algorithm.as_ref());
        self.shared.invalidate();
        result
    }
}

impl<T: ClusterItem> Algorithm<T> for PreCachingAlgorithmDecorator<T> {
    fn add_item(&self, item: T) -> bool {
        self.mutate(|algorithm| algorithm.add_item(item))
    }

    fn add_items(&self, items: Vec<T>) -> bool {
        self.mutate(|algorithm| algorithm.add_items(items))
    }

    fn remove_item(&self, item: &T) -> bool {
        self.mutate(|algorithm| algorithm.remove_item(item))
    }

    fn remove_items(&self, items: &[T]) -> bool {
        self.mutate(|algorithm| algorithm.remove_items(items))
    }

    fn update_item(&self, item: T) -> bool {
        self.mutate(|algorithm| algorithm.update_item(item))
    }

    fn clear_items(&self) {
        self.mutate(|algorithm| algorithm.clear_items());
    }

    fn get_clusters(&self, zoom: f32, cancel: &CancellationToken) -> Vec<Cluster<T>> {
        let discrete_zoom = zoom.trunc() as i32;
        let clusters = self.shared.clusters(discrete_zoom, cancel);
        self.schedule_precache(discrete_zoom + 1, cancel);
        self.schedule_precache(discrete_zoom - 1, cancel);
        clusters
    }

    fn items(&self) -> Vec<T> {
        self.shared.algorithm.items()
    }

    fn max_distance_between_clustered_items(&self) -> u32 {
        self.shared.algorithm.max_distance_between_clustered_items()
    }

    fn set_max_distance_between_clustered_items(&self, max_distance: u32) -> Result<()> {
        let _lock = self.shared.algorithm.lock();
        self.shared
            .algorithm
            .set_max_distance_between_clustered_items(max_distance)?;
        self.shared.invalidate();
        Ok(())
    }

    fn lock(&self) -> AlgorithmLock<'_> {
        self.shared.algorithm.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{CameraPosition, ViewportSize};
    use crate::cluster::{
        Marker, NonHierarchicalDistanceBasedAlgorithm, NonHierarchicalViewBasedAlgorithm,
        ScreenBasedAlgorithm, ScreenBasedAlgorithmAdapter,
    };
    use geo::Point;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts clustering runs of the wrapped distance algorithm.
    struct Counting {
        inner: NonHierarchicalDistanceBasedAlgorithm<Marker>,
        runs: Arc<AtomicUsize>,
    }

    impl Algorithm<Marker> for Counting {
        fn add_item(&self, item: Marker) -> bool {
            self.inner.add_item(item)
        }
        fn add_items(&self, items: Vec<Marker>) -> bool {
            self.inner.add_items(items)
        }
        fn remove_item(&self, item: &Marker) -> bool {
            self.inner.remove_item(item)
        }
        fn remove_items(&self, items: &[Marker]) -> bool {
            self.inner.remove_items(items)
        }
        fn update_item(&self, item: Marker) -> bool {
            self.inner.update_item(item)
        }
        fn clear_items(&self) {
            self.inner.clear_items()
        }
        fn get_clusters(&self, zoom: f32, cancel: &CancellationToken) -> Vec<Cluster<Marker>> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            self.inner.get_clusters(zoom, cancel)
        }
        fn items(&self) -> Vec<Marker> {
            self.inner.items()
        }
        fn max_distance_between_clustered_items(&self) -> u32 {
            self.inner.max_distance_between_clustered_items()
        }
        fn set_max_distance_between_clustered_items(&self, max_distance: u32) -> Result<()> {
            self.inner.set_max_distance_between_clustered_items(max_distance)
        }
        fn lock(&self) -> AlgorithmLock<'_> {
            self.inner.lock()
        }
    }

    fn counting() -> (Box<dyn Algorithm<Marker>>, Arc<AtomicUsize>) {
        let runs = Arc::new(AtomicUsize::new(0));
        let algorithm = Counting {
            inner: NonHierarchicalDistanceBasedAlgorithm::new(),
            runs: Arc::clone(&runs),
        };
        (Box::new(algorithm), runs)
    }

    fn markers() -> Vec<Marker> {
        (0..20)
            .map(|i| Marker::new(i, Point::new(i as f64 * 0.5, i as f64 * 0.25)))
            .collect()
    }

    #[test]
    fn test_second_request_served_from_cache() {
        let (algorithm, runs) = counting();
        let decorator = PreCachingAlgorithmDecorator::new(algorithm);
        decorator.add_items(markers());

        let first = decorator.get_clusters(4.0, &CancellationToken::new());
        let second = decorator.get_clusters(4.7, &CancellationToken::new());
        assert_eq!(first, second);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(decorator.cached_zooms(), vec![4]);
    }

    #[test]
    fn test_mutation_invalidates() {
        let (algorithm, runs) = counting();
        let decorator = PreCachingAlgorithmDecorator::new(algorithm);
        decorator.add_items(markers());

        let before = decorator.get_clusters(4.0, &CancellationToken::new());
        decorator.add_item(Marker::new(100, Point::new(-100.0, -30.0)));
        assert!(decorator.cached_zooms().is_empty());

        let after = decorator.get_clusters(4.0, &CancellationToken::new());
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert_eq!(after.len(), before.len() + 1);

        decorator.get_clusters(4.0, &CancellationToken::new());
        decorator.set_max_distance_between_clustered_items(50).unwrap();
        assert!(decorator.cached_zooms().is_empty());
    }

    #[test]
    fn test_failed_max_distance_keeps_cache() {
        let (algorithm, _) = counting();
        let decorator = PreCachingAlgorithmDecorator::new(algorithm);
        decorator.get_clusters(2.0, &CancellationToken::new());
        assert!(decorator.set_max_distance_between_clustered_items(0).is_err());
        assert_eq!(decorator.cached_zooms(), vec![2]);
    }

    #[test]
    fn test_least_recently_used_evicted() {
        let (algorithm, runs) = counting();
        let config = PrecacheConfig::default().with_capacity(2);
        let decorator = PreCachingAlgorithmDecorator::with_config(algorithm, config).unwrap();
        let cancel = CancellationToken::new();

        decorator.get_clusters(1.0, &cancel);
        decorator.get_clusters(2.0, &cancel);
        decorator.get_clusters(1.0, &cancel);
        decorator.get_clusters(3.0, &cancel);
        assert_eq!(decorator.cached_zooms(), vec![1, 3]);
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_cancelled_result_not_cached() {
        let (algorithm, _) = counting();
        let decorator = PreCachingAlgorithmDecorator::new(algorithm);
        decorator.add_items(markers());

        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(decorator.get_clusters(6.0, &cancel).is_empty());
        assert!(decorator.cached_zooms().is_empty());
    }

    #[test]
    fn test_precache_reports_cancellation() {
        let (algorithm, _) = counting();
        let decorator = PreCachingAlgorithmDecorator::new(algorithm);
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(matches!(
            decorator.shared.precache(3, &cancel),
            Err(GeoclusterError::Cancelled)
        ));
        assert!(decorator.shared.precache(3, &CancellationToken::new()).is_ok());
        assert_eq!(decorator.cached_zooms(), vec![3]);
    }

    #[test]
    fn test_wrapped_view_algorithm_sees_no_camera() {
        let view = NonHierarchicalViewBasedAlgorithm::new(ViewportSize::new(256, 256));
        let decorator = PreCachingAlgorithmDecorator::new(Box::new(view));
        assert!(decorator.as_screen_based().is_none());

        let adapter = ScreenBasedAlgorithmAdapter::new(Box::new(decorator));
        adapter.add_items(markers());
        assert!(!adapter.should_recluster_on_map_movement());

        // The camera stops at the decorator, so the view still has nothing to cluster.
        adapter.on_camera_change(&CameraPosition::new(Point::new(0.0, 0.0), 0.0));
        assert!(adapter.get_clusters(0.0, &CancellationToken::new()).is_empty());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let (algorithm, _) = counting();
        let config = PrecacheConfig::default().with_capacity(0);
        assert!(PreCachingAlgorithmDecorator::with_config(algorithm, config).is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_neighbouring_zooms_precached() {
        let (algorithm, _) = counting();
        let config = PrecacheConfig::default().with_delay_ms(1, 5);
        let decorator = PreCachingAlgorithmDecorator::with_config(algorithm, config).unwrap();
        decorator.add_items(markers());

        decorator.get_clusters(5.0, &CancellationToken::new());

        let mut zooms = decorator.cached_zooms();
        for _ in 0..200 {
            if zooms.len() == 3 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
            zooms = decorator.cached_zooms();
        }
        zooms.sort_unstable();
        assert_eq!(zooms, vec![4, 5, 6]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_cancelled_precache_leaves_cache_alone() {
        let (algorithm, runs) = counting();
        let config = PrecacheConfig::default().with_delay_ms(20, 20);
        let decorator = PreCachingAlgorithmDecorator::with_config(algorithm, config).unwrap();
        decorator.add_items(markers());

        let cancel = CancellationToken::new();
        decorator.get_clusters(5.0, &cancel);
        cancel.cancel();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(decorator.cached_zooms(), vec![5]);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }
}
