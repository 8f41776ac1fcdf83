use geo::{Coord, Rect};
use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in projected coordinates.
///
/// Edges are inclusive for both point containment and rectangle intersection, so
/// a zero-area query still finds items lying exactly on a quadrant split line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
    pub mid_x: f64,
    pub mid_y: f64,
}

impl Bounds {
    pub fn new(min_x: f64, max_x: f64, min_y: f64, max_y: f64) -> Self {
        Self {
            min_x,
            max_x,
            min_y,
            max_y,
            mid_x: (min_x + max_x) / 2.0,
            mid_y: (min_y + max_y) / 2.0,
        }
    }

    /// Smallest bounds enclosing every coordinate, or `None` for an empty input.
    pub fn enclosing<I>(coords: I) -> Option<Self>
    where
        I: IntoIterator<Item = Coord>,
    {
        let mut iter = coords.into_iter();
        let first = iter.next()?;
        let (mut min_x, mut max_x, mut min_y, mut max_y) = (first.x, first.x, first.y, first.y);

        for c in iter {
            min_x = min_x.min(c.x);
            max_x = max_x.max(c.x);
            min_y = min_y.min(c.y);
            max_y = max_y.max(c.y);
        }

        Some(Self::new(min_x, max_x, min_y, max_y))
    }

    /// Square of side `span` centered on `center`.
    pub fn from_span(center: Coord, span: f64) -> Self {
        let half = span / 2.0;
        Self::new(center.x - half, center.x + half, center.y - half, center.y + half)
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Grow every side by `padding`.
    pub fn padded(&self, padding: f64) -> Self {
        Self::new(
            self.min_x - padding,
            self.max_x + padding,
            self.min_y - padding,
            self.max_y + padding,
        )
    }

    pub fn contains_xy(&self, x: f64, y: f64) -> bool {
        self.min_x <= x && x <= self.max_x && self.min_y <= y && y <= self.max_y
    }

    pub fn contains_point(&self, point: Coord) -> bool {
        self.contains_xy(point.x, point.y)
    }

    /// Whether `other` lies wholly inside these bounds.
    pub fn contains(&self, other: &Bounds) -> bool {
        other.min_x >= self.min_x
            && other.max_x <= self.max_x
            && other.min_y >= self.min_y
            && other.max_y <= self.max_y
    }

    pub fn intersects(&self, other: &Bounds) -> bool {
        other.min_x <= self.max_x
            && self.min_x <= other.max_x
            && other.min_y <= self.max_y
            && self.min_y <= other.max_y
    }

    pub fn is_finite(&self) -> bool {
        [self.min_x, self.max_x, self.min_y, self.max_y]
            .iter()
            .all(|v| v.is_finite())
    }
}

impl From<Bounds> for Rect {
    fn from(bounds: Bounds) -> Self {
        Rect::new(
            geo::coord! { x: bounds.min_x, y: bounds.min_y },
            geo::coord! { x: bounds.max_x, y: bounds.max_y },
        )
    }
}

impl From<Rect> for Bounds {
    fn from(rect: Rect) -> Self {
        Self::new(rect.min().x, rect.max().x, rect.min().y, rect.max().y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_midpoints() {
        let b = Bounds::new(0.0, 1.0, 2.0, 4.0);
        assert_eq!(b.mid_x, 0.5);
        assert_eq!(b.mid_y, 3.0);
    }

    #[test]
    fn test_contains_edges() {
        let b = Bounds::new(0.0, 1.0, 0.0, 1.0);
        assert!(b.contains_xy(0.0, 0.0));
        assert!(b.contains_xy(1.0, 1.0));
        assert!(!b.contains_xy(1.000_001, 0.5));
    }

    #[test]
    fn test_intersects() {
        let a = Bounds::new(0.0, 1.0, 0.0, 1.0);
        assert!(a.intersects(&Bounds::new(0.5, 2.0, 0.5, 2.0)));
        assert!(a.intersects(&Bounds::new(1.0, 2.0, 0.0, 1.0)));
        assert!(!a.intersects(&Bounds::new(1.5, 2.0, 0.0, 1.0)));
        assert!(a.intersects(&Bounds::new(0.5, 0.5, 0.5, 0.5)));
    }

    #[test]
    fn test_enclosing() {
        let coords = vec![
            Coord { x: 0.2, y: 0.9 },
            Coord { x: 0.7, y: 0.1 },
            Coord { x: 0.4, y: 0.5 },
        ];
        let b = Bounds::enclosing(coords).unwrap();
        assert_eq!(b, Bounds::new(0.2, 0.7, 0.1, 0.9));
        assert!(Bounds::enclosing(Vec::<Coord>::new()).is_none());
    }

    #[test]
    fn test_rect_conversion() {
        let b = Bounds::new(-1.0, 1.0, -2.0, 2.0);
        let rect: Rect = b.into();
        assert_eq!(Bounds::from(rect), b);
    }
}
