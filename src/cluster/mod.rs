//! Marker clustering.
//!
//! Algorithms hold a set of [`ClusterItem`]s and turn it into a set of [`Cluster`]s for a
//! given zoom level. Every algorithm implements [`Algorithm`]; decorators such as
//! [`PreCachingAlgorithmDecorator`] and [`ScreenBasedAlgorithmAdapter`] wrap a boxed
//! algorithm and implement the same trait, so they compose in either order.
//!
//! ## Locking
//!
//! Each algorithm instance owns one reentrant lock. Every operation (reads such as
//! [`Algorithm::get_clusters`] and [`Algorithm::items`] as well as every mutation) holds
//! it for its full duration, which makes a clustering run linearizable with respect to
//! mutation. Callers that need several operations to be observed atomically take
//! [`Algorithm::lock`] themselves; the returned guard releases the lock when dropped.
//!
//! ```rust
//! use geocluster::cluster::{Algorithm, Marker, NonHierarchicalDistanceBasedAlgorithm};
//! use geo::Point;
//! use tokio_util::sync::CancellationToken;
//!
//! let algorithm = NonHierarchicalDistanceBasedAlgorithm::new();
//! {
//!     let _lock = algorithm.lock();
//!     algorithm.add_item(Marker::new(1, Point::new(-74.0060, 40.7128)));
//!     algorithm.add_item(Marker::new(2, Point::new(-74.0059, 40.7127)));
//! }
//!
//! let clusters = algorithm.get_clusters(4.0, &CancellationToken::new());
//! assert_eq!(clusters.len(), 1);
//! assert_eq!(clusters[0].size(), 2);
//! ```

mod distance;
mod grid;
mod precache;
mod screen;
mod view;


pub use distance::NonHierarchicalDistanceBasedAlgorithm;
pub use grid::GridBasedAlgorithm;
pub use precache::PreCachingAlgorithmDecorator;
pub use screen::{ScreenBasedAlgorithm, ScreenBasedAlgorithmAdapter};
pub use view::NonHierarchicalViewBasedAlgorithm;

use crate::error::Result;
use crate::projection::SphericalMercatorProjection;
use crate::quadtree::PointItem;
use geo::{Coord, Point};
use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use rustc_hash::FxHashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use tokio_util::sync::CancellationToken;

/// Default for [`Algorithm::max_distance_between_clustered_items`], in pixels at zoom 0.
pub const DEFAULT_MAX_DISTANCE_AT_ZOOM: u32 = 100;

/// An item that can be clustered.
///
/// Equality and hashing define identity: two values that compare equal are treated as the
/// same marker, regardless of position.
pub trait ClusterItem: Clone + Eq + Hash + Send + Sync + 'static {
    /// Geographic position (`x` = longitude, `y` = latitude).
    fn position(&self) -> Point;

    fn title(&self) -> Option<&str> {
        None
    }

    fn snippet(&self) -> Option<&str> {
        None
    }
}

/// A map pin identified by `id`.
#[derive(Debug, Clone)]
pub struct Marker {
    pub id: u64,
    pub position: Point,
    pub title: Option<String>,
    pub snippet: Option<String>,
}

impl Marker {
    pub fn new(id: u64, position: Point) -> Self {
        Self {
            id,
            position,
            title: None,
            snippet: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippet = Some(snippet.into());
        self
    }
}

impl PartialEq for Marker {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Marker {}

impl Hash for Marker {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl ClusterItem for Marker {
    fn position(&self) -> Point {
        self.position
    }

    fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    fn snippet(&self) -> Option<&str> {
        self.snippet.as_deref()
    }
}

/// An aggregate of items with a fixed center.
#[derive(Debug, Clone)]
pub struct StaticCluster<T> {
    center: Point,
    items: FxHashSet<T>,
}

impl<T: ClusterItem> StaticCluster<T> {
    pub fn new(center: Point) -> Self {
        Self {
            center,
            items: FxHashSet::default(),
        }
    }

    pub(crate) fn add(&mut self, item: T) -> bool {
        self.items.insert(item)
    }

    pub(crate) fn remove(&mut self, item: &T) -> bool {
        self.items.remove(item)
    }

    pub fn position(&self) -> Point {
        self.center
    }

    pub fn size(&self) -> usize {
        self.items.len()
    }

    pub fn items(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    pub fn contains(&self, item: &T) -> bool {
        self.items.contains(item)
    }
}

/// One entry of a clustering result: a lone item or an aggregate.
#[derive(Debug, Clone)]
pub enum Cluster<T> {
    Single(T),
    Static(StaticCluster<T>),
}

impl<T: ClusterItem> Cluster<T> {
    pub fn position(&self) -> Point {
        match self {
            Cluster::Single(item) => item.position(),
            Cluster::Static(cluster) => cluster.position(),
        }
    }

    pub fn size(&self) -> usize {
        match self {
            Cluster::Single(_) => 1,
            Cluster::Static(cluster) => cluster.size(),
        }
    }

    pub fn items(&self) -> Vec<&T> {
        match self {
            Cluster::Single(item) => vec![item],
            Cluster::Static(cluster) => cluster.items().collect(),
        }
    }

    pub fn contains(&self, item: &T) -> bool {
        match self {
            Cluster::Single(single) => single == item,
            Cluster::Static(cluster) => cluster.contains(item),
        }
    }
}

/// Clusters are equal when their centers match and their member sets are equal.
impl<T: ClusterItem> PartialEq for Cluster<T> {
    fn eq(&self, other: &Self) -> bool {
        self.position() == other.position()
            && self.size() == other.size()
            && self.items().into_iter().all(|item| other.contains(item))
    }
}

/// Exclusive hold on an algorithm instance; dropping it releases the lock.
#[must_use = "the algorithm is unlocked as soon as the guard is dropped"]
pub struct AlgorithmLock<'a> {
    _guard: ReentrantMutexGuard<'a, ()>,
}

impl fmt::Debug for AlgorithmLock<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlgorithmLock").finish_non_exhaustive()
    }
}

/// The per-instance lock. Reentrant so operations can run inside a caller-held lock.
#[derive(Debug, Default)]
pub(crate) struct Gate(ReentrantMutex<()>);

impl Gate {
    pub(crate) fn lock(&self) -> AlgorithmLock<'_> {
        AlgorithmLock {
            _guard: self.0.lock(),
        }
    }
}

/// A clustering algorithm over a mutable set of items.
///
/// Mutators return whether the item set changed. All methods take `&self`; the
/// implementation serializes them through its own lock (see the module docs).
pub trait Algorithm<T: ClusterItem>: Send + Sync {
    fn add_item(&self, item: T) -> bool;

    fn add_items(&self, items: Vec<T>) -> bool;

    fn remove_item(&self, item: &T) -> bool;

    fn remove_items(&self, items: &[T]) -> bool;

    /// Re-index an item whose position changed. Returns `false`, without adding it,
    /// when the item was not present.
    fn update_item(&self, item: T) -> bool;

    fn clear_items(&self);

    /// Compute clusters for `zoom`.
    ///
    /// Cancellation is cooperative: once `cancel` fires, the clusters built so far are
    /// returned and should be treated as incomplete.
    fn get_clusters(&self, zoom: f32, cancel: &CancellationToken) -> Vec<Cluster<T>>;

    /// Snapshot of the current items.
    fn items(&self) -> Vec<T>;

    fn max_distance_between_clustered_items(&self) -> u32;

    /// Fails with [`GeoclusterError::InvalidArgument`](crate::GeoclusterError::InvalidArgument)
    /// for a zero distance.
    fn set_max_distance_between_clustered_items(&self, max_distance: u32) -> Result<()>;

    fn lock(&self) -> AlgorithmLock<'_>;

    /// The screen-aware view of this algorithm, if it has one.
    fn as_screen_based(&self) -> Option<&dyn ScreenBasedAlgorithm<T>> {
        None
    }
}

/// An item paired with its position in the unit plane.
#[derive(Debug, Clone)]
pub(crate) struct QuadItem<T> {
    pub(crate) item: T,
    pub(crate) point: Coord,
    pub(crate) position: Point,
}

impl<T: ClusterItem> QuadItem<T> {
    pub(crate) fn new(item: T, projection: &SphericalMercatorProjection) -> Self {
        let position = item.position();
        Self {
            point: projection.to_point(&position),
            position,
            item,
        }
    }
}

impl<T> PointItem for QuadItem<T> {
    fn point(&self) -> Coord {
        self.point
    }
}

impl<T: PartialEq> PartialEq for QuadItem<T> {
    fn eq(&self, other: &Self) -> bool {
        self.item == other.item
    }
}

impl<T: Eq> Eq for QuadItem<T> {}

impl<T: Hash> Hash for QuadItem<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.item.hash(state);
    }
}

pub(crate) fn validate_max_distance(max_distance: u32) -> Result<()> {
    if max_distance == 0 {
        return Err(crate::error::GeoclusterError::InvalidArgument(
            "max distance between clustered items must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

/// Whether an item's position can be projected onto the world plane.
pub(crate) fn is_clusterable(position: &Point) -> bool {
    let (lng, lat) = (position.x(), position.y());
    if !lng.is_finite() || !lat.is_finite() || !(-180.0..=180.0).contains(&lng) {
        log::warn!(
            "Rejecting cluster item with unprojectable position ({}, {})",
            lng,
            lat
        );
        return false;
    }
    true
}
