use float_ord::FloatOrd;
use itertools::Itertools;
use nalgebra::{Point2, Vector2};

/// A simple polygon in 2D, given by its vertices in order. The closing edge from the last to the first
/// vertex is implicit
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Polygon2 {
    vertices: Vec<Point2<f64>>,
}

impl Polygon2 {
    pub fn new(vertices: Vec<Point2<f64>>) -> Self {
        Self { vertices }
    }

    /// Computes the convex hull of `points` with Andrew's monotone chain. The hull is returned in
    /// counter-clockwise order without collinear vertices. Non-finite points are ignored. Fewer than three
    /// distinct points yield a degenerate polygon with fewer than three vertices
    /// ```
    /// # use tabletop_core::geometry::Polygon2;
    /// # use tabletop_core::nalgebra::Point2;
    /// let points = vec![
    ///     Point2::new(0.0, 0.0),
    ///     Point2::new(1.0, 0.0),
    ///     Point2::new(0.5, 0.5),
    ///     Point2::new(1.0, 1.0),
    ///     Point2::new(0.0, 1.0),
    /// ];
    /// let hull = Polygon2::convex_hull(&points);
    /// assert_eq!(4, hull.len());
    /// assert!((hull.area() - 1.0).abs() < 1e-12);
    /// ```
    pub fn convex_hull(points: &[Point2<f64>]) -> Self {
        let mut sorted: Vec<Point2<f64>> = points
            .iter()
            .filter(|p| p.x.is_finite() && p.y.is_finite())
            .copied()
            .collect();
        sorted.sort_by_key(|p| (FloatOrd(p.x), FloatOrd(p.y)));
        sorted.dedup();
        if sorted.len() < 3 {
            return Self::new(sorted);
        }

        let mut hull: Vec<Point2<f64>> = Vec::with_capacity(2 * sorted.len());
        // lower hull
        for p in sorted.iter() {
            while hull.len() >= 2 && cross(&hull[hull.len() - 2], &hull[hull.len() - 1], p) <= 0.0 {
                hull.pop();
            }
            hull.push(*p);
        }
        // upper hull
        let lower_len = hull.len() + 1;
        for p in sorted.iter().rev().skip(1) {
            while hull.len() >= lower_len
                && cross(&hull[hull.len() - 2], &hull[hull.len() - 1], p) <= 0.0
            {
                hull.pop();
            }
            hull.push(*p);
        }
        // the last point is the first point again
        hull.pop();
        Self::new(hull)
    }

    pub fn vertices(&self) -> &[Point2<f64>] {
        &self.vertices
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Iterates over all edges `(from, to)`, including the closing edge
    pub fn edges(&self) -> impl Iterator<Item = (&Point2<f64>, &Point2<f64>)> + '_ {
        self.vertices.iter().circular_tuple_windows()
    }

    /// Unsigned area of the polygon (shoelace formula)
    pub fn area(&self) -> f64 {
        if self.vertices.len() < 3 {
            return 0.0;
        }
        let twice_signed: f64 = self.edges().map(|(a, b)| a.x * b.y - b.x * a.y).sum();
        twice_signed.abs() / 2.0
    }

    /// Point-in-polygon test by crossing number. Polygons with fewer than three vertices contain nothing
    /// ```
    /// # use tabletop_core::geometry::Polygon2;
    /// # use tabletop_core::nalgebra::Point2;
    /// let square = Polygon2::new(vec![
    ///     Point2::new(0.0, 0.0),
    ///     Point2::new(2.0, 0.0),
    ///     Point2::new(2.0, 2.0),
    ///     Point2::new(0.0, 2.0),
    /// ]);
    /// assert!(square.contains(&Point2::new(1.0, 1.0)));
    /// assert!(!square.contains(&Point2::new(3.0, 1.0)));
    /// ```
    pub fn contains(&self, point: &Point2<f64>) -> bool {
        if self.vertices.len() < 3 {
            return false;
        }
        let mut inside = false;
        for (a, b) in self.edges() {
            if (a.y > point.y) != (b.y > point.y) {
                let x_at_y = a.x + (point.y - a.y) * (b.x - a.x) / (b.y - a.y);
                if point.x < x_at_y {
                    inside = !inside;
                }
            }
        }
        inside
    }

    /// Shortest distance from `point` to any edge of the polygon. Returns `f64::INFINITY` for an empty polygon
    pub fn distance_to_boundary(&self, point: &Point2<f64>) -> f64 {
        match self.vertices.len() {
            0 => f64::INFINITY,
            1 => (point - self.vertices[0]).norm(),
            _ => self
                .edges()
                .map(|(a, b)| distance_point_segment(point, a, b))
                .fold(f64::INFINITY, f64::min),
        }
    }
}

/// z component of `(b - a) x (c - a)`. Positive if `a -> b -> c` turns counter-clockwise
fn cross(a: &Point2<f64>, b: &Point2<f64>, c: &Point2<f64>) -> f64 {
    let ab: Vector2<f64> = b - a;
    let ac: Vector2<f64> = c - a;
    ab.x * ac.y - ab.y * ac.x
}

fn distance_point_segment(point: &Point2<f64>, a: &Point2<f64>, b: &Point2<f64>) -> f64 {
    let segment = b - a;
    let length_squared = segment.norm_squared();
    if length_squared == 0.0 {
        return (point - a).norm();
    }
    let t = ((point - a).dot(&segment) / length_squared).clamp(0.0, 1.0);
    (point - (a + segment * t)).norm()
}
