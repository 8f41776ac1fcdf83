//! Marker clustering, point quad-tree indexing and heat-map tile rendering for map views.
//!
//! ```rust
//! use geocluster::prelude::*;
//!
//! let manager = ClusterManager::new();
//! manager.add_items(vec![
//!     Marker::new(1, Point::new(-74.0060, 40.7128)),
//!     Marker::new(2, Point::new(-74.0055, 40.7130)),
//!     Marker::new(3, Point::new(2.3522, 48.8566)),
//! ]);
//!
//! let camera = CameraPosition::new(Point::new(-30.0, 45.0), 3.0);
//! let clusters = manager.on_camera_idle(&camera).unwrap();
//! assert_eq!(clusters.len(), 2);
//! # Ok::<(), geocluster::GeoclusterError>(())
//! ```

pub mod animation;
pub mod camera;
pub mod cluster;
pub mod config;
pub mod error;
pub mod heatmap;
pub mod manager;
pub mod projection;
pub mod quadtree;

pub use animation::{ClusterAnimator, Easing, MarkerMover};
pub use camera::{CameraPosition, CameraUpdate, ViewportSize, ZoomDirection};
pub use cluster::{
    Algorithm, AlgorithmLock, Cluster, ClusterItem, GridBasedAlgorithm, Marker,
    NonHierarchicalDistanceBasedAlgorithm, NonHierarchicalViewBasedAlgorithm,
    PreCachingAlgorithmDecorator, ScreenBasedAlgorithm, ScreenBasedAlgorithmAdapter,
    StaticCluster,
};
pub use config::{
    AlgorithmKind, AnimationConfig, ClusteringConfig, Config, HeatmapConfig, PrecacheConfig,
};
pub use error::{GeoclusterError, Result};
pub use heatmap::{Gradient, HeatmapTileProvider, Tile, WeightedLatLng};
pub use manager::ClusterManager;
pub use projection::SphericalMercatorProjection;
pub use quadtree::{Bounds, PointItem, PointQuadTree};

pub use geo::Point;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Common imports
pub mod prelude {

    pub use crate::{GeoclusterError, Result};

    pub use geo::Point;

    pub use crate::{Algorithm, Cluster, ClusterItem, ClusterManager, Marker};

    pub use crate::{CameraPosition, CameraUpdate, ViewportSize, ZoomDirection};

    pub use crate::{Config, HeatmapTileProvider, Tile, WeightedLatLng};
}
