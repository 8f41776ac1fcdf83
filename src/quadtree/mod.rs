//! Bounds and the point quad-tree shared by the clustering algorithms and the
//! heat-map provider.

mod bounds;
mod point_quad_tree;

pub use bounds::Bounds;
pub use point_quad_tree::{PointItem, PointQuadTree};
