//! Region quad-tree over point-like items.

use super::Bounds;
use geo::Coord;

/// Items per leaf before it splits.
const MAX_ELEMENTS: usize = 50;

/// Depth at which leaves stop splitting, bounding recursion on stacked points.
const MAX_DEPTH: usize = 40;

/// Anything with a fixed position in the projected plane.
pub trait PointItem {
    fn point(&self) -> Coord;
}

/// A quad-tree whose leaves hold up to 50 items and split into four equal quadrants
/// once that is exceeded.
///
/// Splits are one-way: removing items never merges children back. Items whose point
/// falls outside the root bounds are ignored on insert; callers are expected to
/// pre-filter or size the root generously.
#[derive(Debug, Clone)]
pub struct PointQuadTree<T> {
    bounds: Bounds,
    depth: usize,
    items: Vec<T>,
    children: Option<Box<[PointQuadTree<T>; 4]>>,
}

impl<T: PointItem + PartialEq + Clone> PointQuadTree<T> {
    pub fn new(bounds: Bounds) -> Self {
        Self::with_depth(bounds, 0)
    }

    fn with_depth(bounds: Bounds, depth: usize) -> Self {
        Self {
            bounds,
            depth,
            items: Vec::new(),
            children: None,
        }
    }

    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    /// Insert an item. Points outside the root bounds are silently dropped.
    pub fn add(&mut self, item: T) {
        let point = item.point();
        if self.bounds.contains_point(point) {
            self.insert(point, item);
        } else {
            log::trace!(
                "Ignoring quad-tree insert outside root bounds at ({}, {})",
                point.x,
                point.y
            );
        }
    }

    fn insert(&mut self, point: Coord, item: T) {
        let quadrant = self.quadrant(point);
        if let Some(children) = self.children.as_deref_mut() {
            children[quadrant].insert(point, item);
            return;
        }

        self.items.push(item);
        if self.items.len() > MAX_ELEMENTS && self.depth < MAX_DEPTH {
            self.split();
        }
    }

    /// Index of the child covering `point`: top-left, top-right, bottom-left, bottom-right.
    fn quadrant(&self, point: Coord) -> usize {
        match (point.y < self.bounds.mid_y, point.x < self.bounds.mid_x) {
            (true, true) => 0,
            (true, false) => 1,
            (false, true) => 2,
            (false, false) => 3,
        }
    }

    fn split(&mut self) {
        let b = self.bounds;
        let depth = self.depth + 1;
        self.children = Some(Box::new([
            Self::with_depth(Bounds::new(b.min_x, b.mid_x, b.min_y, b.mid_y), depth),
            Self::with_depth(Bounds::new(b.mid_x, b.max_x, b.min_y, b.mid_y), depth),
            Self::with_depth(Bounds::new(b.min_x, b.mid_x, b.mid_y, b.max_y), depth),
            Self::with_depth(Bounds::new(b.mid_x, b.max_x, b.mid_y, b.max_y), depth),
        ]));

        for item in std::mem::take(&mut self.items) {
            let point = item.point();
            self.insert(point, item);
        }
    }

    /// Remove an item, returning whether it was present.
    pub fn remove(&mut self, item: &T) -> bool {
        let point = item.point();
        if !self.bounds.contains_point(point) {
            return false;
        }
        self.remove_at(point, item)
    }

    fn remove_at(&mut self, point: Coord, item: &T) -> bool {
        let quadrant = self.quadrant(point);
        if let Some(children) = self.children.as_deref_mut() {
            return children[quadrant].remove_at(point, item);
        }

        match self.items.iter().position(|existing| existing == item) {
            Some(index) => {
                self.items.swap_remove(index);
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.children = None;
        self.items.clear();
    }

    /// All items whose point lies within `search_bounds`, in no particular order.
    pub fn search(&self, search_bounds: &Bounds) -> Vec<T> {
        let mut results = Vec::new();
        self.search_into(search_bounds, &mut results);
        results
    }

    fn search_into(&self, search_bounds: &Bounds, results: &mut Vec<T>) {
        if !self.bounds.intersects(search_bounds) {
            return;
        }

        if let Some(children) = self.children.as_deref() {
            for child in children {
                child.search_into(search_bounds, results);
            }
        } else if search_bounds.contains(&self.bounds) {
            results.extend(self.items.iter().cloned());
        } else {
            results.extend(
                self.items
                    .iter()
                    .filter(|item| search_bounds.contains_point(item.point()))
                    .cloned(),
            );
        }
    }

    pub fn len(&self) -> usize {
        match self.children.as_deref() {
            Some(children) => children.iter().map(Self::len).sum(),
            None => self.items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[cfg(test)]
    fn max_depth(&self) -> usize {
        match self.children.as_deref() {
            Some(children) => children.iter().map(Self::max_depth).max().unwrap_or(self.depth),
            None => self.depth,
        }
    }
}
