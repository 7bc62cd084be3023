use std::ops::Index;

use nalgebra::Vector3;

use crate::math::AABB;

use super::Point;

/// Capture time of a point cloud in nanoseconds. The epoch is whatever the sensor driver uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Timestamp(pub u64);

impl Timestamp {
    pub fn from_nanos(nanos: u64) -> Self {
        Self(nanos)
    }

    pub fn as_nanos(&self) -> u64 {
        self.0
    }
}

/// An ordered sequence of points that share a reference frame (`frame_id`) and a capture timestamp.
///
/// Filters never modify a cloud in place. They produce a new cloud with the same header (see
/// [empty_like](PointCloud::empty_like)) which is then owned by the next stage.
/// ```
/// # use tabletop_core::containers::*;
/// let mut cloud = PointCloud::new("camera_link", Timestamp(42));
/// cloud.push(Point::new(0.0, 0.0, 1.0));
/// cloud.push(Point::new(f64::NAN, 0.0, 1.0));
/// assert_eq!(2, cloud.len());
/// assert!(!cloud.is_dense());
///
/// let finite = cloud.filter(|p| p.is_finite());
/// assert_eq!(1, finite.len());
/// assert_eq!("camera_link", finite.frame_id());
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PointCloud {
    points: Vec<Point>,
    frame_id: String,
    stamp: Timestamp,
}

impl PointCloud {
    /// Creates an empty cloud with the given header
    pub fn new<S: Into<String>>(frame_id: S, stamp: Timestamp) -> Self {
        Self {
            points: vec![],
            frame_id: frame_id.into(),
            stamp,
        }
    }

    /// Creates an empty cloud with the given header that has room for at least `capacity` points
    pub fn with_capacity<S: Into<String>>(capacity: usize, frame_id: S, stamp: Timestamp) -> Self {
        Self {
            points: Vec::with_capacity(capacity),
            frame_id: frame_id.into(),
            stamp,
        }
    }

    pub fn from_points<S: Into<String>>(points: Vec<Point>, frame_id: S, stamp: Timestamp) -> Self {
        Self {
            points,
            frame_id: frame_id.into(),
            stamp,
        }
    }

    /// Creates an empty cloud that shares the header of this cloud
    pub fn empty_like(&self) -> Self {
        Self::new(self.frame_id.clone(), self.stamp)
    }

    /// Creates a cloud with the header of this cloud and the given `points`
    pub fn with_points(&self, points: Vec<Point>) -> Self {
        Self::from_points(points, self.frame_id.clone(), self.stamp)
    }

    pub fn frame_id(&self) -> &str {
        &self.frame_id
    }

    pub fn set_frame_id<S: Into<String>>(&mut self, frame_id: S) {
        self.frame_id = frame_id.into();
    }

    pub fn stamp(&self) -> Timestamp {
        self.stamp
    }

    pub fn set_stamp(&mut self, stamp: Timestamp) {
        self.stamp = stamp;
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn points_mut(&mut self) -> &mut [Point] {
        &mut self.points
    }

    pub fn push(&mut self, point: Point) {
        self.points.push(point);
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Point> {
        self.points.iter()
    }

    /// Iterates over the positions of all points
    pub fn positions(&self) -> impl Iterator<Item = Vector3<f64>> + '_ {
        self.points.iter().map(|p| p.position)
    }

    pub fn into_points(self) -> Vec<Point> {
        self.points
    }

    /// Returns true if no point in this cloud has a non-finite coordinate
    pub fn is_dense(&self) -> bool {
        self.points.iter().all(Point::is_finite)
    }

    /// Copies the points at `indices` (in the given order) into a new cloud with the same header.
    ///
    /// # Panics
    ///
    /// If any index is out of bounds
    pub fn select(&self, indices: &[usize]) -> Self {
        self.with_points(indices.iter().map(|&index| self.points[index]).collect())
    }

    /// Copies all points for which `predicate` returns true into a new cloud with the same header
    pub fn filter<F: FnMut(&Point) -> bool>(&self, mut predicate: F) -> Self {
        self.with_points(self.points.iter().filter(|p| predicate(p)).copied().collect())
    }

    /// Bounds of all finite points, or `None` if there are no finite points
    pub fn bounds(&self) -> Option<AABB<f64>> {
        let mut finite = self.points.iter().filter(|p| p.is_finite()).peekable();
        finite.peek()?;
        Some(finite.map(|p| p.position).collect())
    }

    /// Mean position of all finite points, or `None` if there are no finite points
    /// ```
    /// # use tabletop_core::containers::*;
    /// # use tabletop_core::nalgebra::Vector3;
    /// let cloud: PointCloud = vec![Point::new(0.0, 0.0, 0.0), Point::new(2.0, 4.0, 0.0)].into_iter().collect();
    /// assert_eq!(Some(Vector3::new(1.0, 2.0, 0.0)), cloud.centroid());
    /// ```
    pub fn centroid(&self) -> Option<Vector3<f64>> {
        let (sum, count) = self
            .points
            .iter()
            .filter(|p| p.is_finite())
            .fold((Vector3::zeros(), 0_usize), |(sum, count), p| {
                (sum + p.position, count + 1)
            });
        if count == 0 {
            None
        } else {
            Some(sum / count as f64)
        }
    }
}

impl Index<usize> for PointCloud {
    type Output = Point;

    fn index(&self, index: usize) -> &Self::Output {
        &self.points[index]
    }
}

/// Collects points into a cloud with an empty frame id and a zero timestamp
impl FromIterator<Point> for PointCloud {
    fn from_iter<I: IntoIterator<Item = Point>>(iter: I) -> Self {
        Self::from_points(iter.into_iter().collect(), String::new(), Timestamp::default())
    }
}

impl Extend<Point> for PointCloud {
    fn extend<I: IntoIterator<Item = Point>>(&mut self, iter: I) {
        self.points.extend(iter)
    }
}

impl IntoIterator for PointCloud {
    type Item = Point;
    type IntoIter = std::vec::IntoIter<Point>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.into_iter()
    }
}

impl<'a> IntoIterator for &'a PointCloud {
    type Item = &'a Point;
    type IntoIter = std::slice::Iter<'a, Point>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}

#[cfg(test)]
mod tests {
    use nalgebra::Point3;

    use super::*;

    #[test]
    fn test_select_keeps_header_and_order() {
        let cloud = PointCloud::from_points(
            (0..5).map(|i| Point::new(i as f64, 0.0, 0.0)).collect(),
            "base_link",
            Timestamp(7),
        );
        let selected = cloud.select(&[4, 1]);
        assert_eq!(2, selected.len());
        assert_eq!(4.0, selected[0].position.x);
        assert_eq!(1.0, selected[1].position.x);
        assert_eq!("base_link", selected.frame_id());
        assert_eq!(Timestamp(7), selected.stamp());
    }

    #[test]
    fn test_bounds_skip_non_finite_points() {
        let cloud: PointCloud = vec![
            Point::new(-1.0, 0.0, 0.0),
            Point::new(f64::INFINITY, 10.0, 0.0),
            Point::new(1.0, 2.0, 3.0),
        ]
        .into_iter()
        .collect();
        let bounds = cloud.bounds().unwrap();
        assert_eq!(*bounds.min(), Point3::new(-1.0, 0.0, 0.0));
        assert_eq!(*bounds.max(), Point3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_empty_and_non_finite_clouds_have_no_bounds() {
        assert!(PointCloud::default().bounds().is_none());
        assert!(PointCloud::default().centroid().is_none());

        let nan_only: PointCloud = vec![Point::new(f64::NAN, 0.0, 0.0)].into_iter().collect();
        assert!(nan_only.bounds().is_none());
        assert!(nan_only.centroid().is_none());
    }
}
