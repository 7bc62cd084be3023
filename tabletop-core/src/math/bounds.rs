use nalgebra::{ClosedSub, Point3, Scalar, Vector3};

/// 3D axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AABB<T: Scalar + PartialOrd> {
    min: Point3<T>,
    max: Point3<T>,
}

impl<T: Scalar + ClosedSub + PartialOrd + Copy> AABB<T> {
    /// Creates a new AABB from the given minimum and maximum coordinates. Panics if the minimum position is
    /// not less than or equal to the maximum position
    /// ```
    /// # use tabletop_core::math::AABB;
    /// let bounds = AABB::from_min_max(nalgebra::Point3::new(0.0, 0.0, 0.0), nalgebra::Point3::new(1.0, 1.0, 1.0));
    /// ```
    pub fn from_min_max(min: Point3<T>, max: Point3<T>) -> Self {
        if min.x > max.x || min.y > max.y || min.z > max.z {
            panic!("AABB::from_min_max: Minimum position must be <= maximum position!");
        }
        Self { min, max }
    }

    /// Creates a new AABB from the given minimum and maximum coordinates. Similar to [from_min_max](AABB::from_min_max)
    /// but performs no checks that min <= max
    pub fn from_min_max_unchecked(min: Point3<T>, max: Point3<T>) -> Self {
        Self { min, max }
    }

    /// Returns the minimum point of this AABB
    pub fn min(&self) -> &Point3<T> {
        &self.min
    }

    /// Returns the maximum point of this AABB
    pub fn max(&self) -> &Point3<T> {
        &self.max
    }

    /// Returns the extent of this AABB. The extent is the size between the minimum and maximum position of this AABB
    /// ```
    /// # use tabletop_core::math::AABB;
    /// let bounds = AABB::from_min_max_unchecked(nalgebra::Point3::new(0.0, 0.0, 0.0), nalgebra::Point3::new(1.0, 2.0, 3.0));
    /// assert_eq!(bounds.extent(), nalgebra::Vector3::new(1.0, 2.0, 3.0));
    /// ```
    pub fn extent(&self) -> Vector3<T> {
        self.max - self.min
    }

    /// Returns true if the given point is contained within this AABB. Points right on the boundary
    /// of this AABB (e.g. point.x == self.max.x or self.min.x) will return true as well.
    /// ```
    /// # use tabletop_core::math::AABB;
    /// let bounds = AABB::from_min_max_unchecked(nalgebra::Point3::new(0.0, 0.0, 0.0), nalgebra::Point3::new(1.0, 1.0, 1.0));
    /// assert!(bounds.contains(&nalgebra::Point3::new(0.5, 0.5, 0.5)));
    /// assert!(bounds.contains(&nalgebra::Point3::new(1.0, 0.0, 1.0)));
    /// assert!(!bounds.contains(&nalgebra::Point3::new(1.5, 0.5, 0.5)));
    /// ```
    pub fn contains(&self, point: &Point3<T>) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
            && point.z >= self.min.z
            && point.z <= self.max.z
    }

    /// Extends the given AABB so that it contains the given point.
    /// ```
    /// # use tabletop_core::math::AABB;
    /// let bounds = AABB::from_min_max_unchecked(nalgebra::Point3::new(0.0, 0.0, 0.0), nalgebra::Point3::new(1.0, 1.0, 1.0));
    /// let extended_bounds = AABB::extend_with_point(&bounds, &nalgebra::Point3::new(2.0, -1.0, 2.0));
    /// assert_eq!(*extended_bounds.min(), nalgebra::Point3::new(0.0, -1.0, 0.0));
    /// assert_eq!(*extended_bounds.max(), nalgebra::Point3::new(2.0, 1.0, 2.0));
    /// ```
    pub fn extend_with_point(bounds: &AABB<T>, point: &Point3<T>) -> AABB<T> {
        let pick_min = |a: T, b: T| if a < b { a } else { b };
        let pick_max = |a: T, b: T| if a > b { a } else { b };
        Self {
            min: Point3::new(
                pick_min(bounds.min.x, point.x),
                pick_min(bounds.min.y, point.y),
                pick_min(bounds.min.z, point.z),
            ),
            max: Point3::new(
                pick_max(bounds.max.x, point.x),
                pick_max(bounds.max.y, point.y),
                pick_max(bounds.max.z, point.z),
            ),
        }
    }
}

impl AABB<f64> {
    /// Returns the center point of this AABB
    /// ```
    /// # use tabletop_core::math::AABB;
    /// let bounds = AABB::from_min_max(nalgebra::Point3::new(-1.0, 0.0, 2.0), nalgebra::Point3::new(1.0, 2.0, 4.0));
    /// assert_eq!(bounds.center(), nalgebra::Point3::new(0.0, 1.0, 3.0));
    /// ```
    pub fn center(&self) -> Point3<f64> {
        nalgebra::center(&self.min, &self.max)
    }
}

/// Collects the smallest AABB that contains all positions. An empty iterator yields an inverted AABB
/// (min = +MAX, max = -MAX) which contains no point
impl FromIterator<Vector3<f64>> for AABB<f64> {
    fn from_iter<I: IntoIterator<Item = Vector3<f64>>>(iter: I) -> Self {
        let inverted = Self {
            min: Point3::new(f64::MAX, f64::MAX, f64::MAX),
            max: Point3::new(f64::MIN, f64::MIN, f64::MIN),
        };
        iter.into_iter().fold(inverted, |bounds, position| {
            AABB::extend_with_point(&bounds, &position.into())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_iter_matches_extending() {
        let positions = vec![
            Vector3::new(1.0, 5.0, -2.0),
            Vector3::new(-3.0, 0.5, 4.0),
            Vector3::new(0.0, 0.0, 0.0),
        ];
        let bounds: AABB<f64> = positions.iter().copied().collect();
        assert_eq!(*bounds.min(), Point3::new(-3.0, 0.0, -2.0));
        assert_eq!(*bounds.max(), Point3::new(1.0, 5.0, 4.0));
        for position in positions {
            assert!(bounds.contains(&position.into()));
        }
    }

    #[test]
    fn test_empty_iter_contains_nothing() {
        let bounds: AABB<f64> = std::iter::empty().collect();
        assert!(!bounds.contains(&Point3::origin()));
    }

    #[test]
    #[should_panic(expected = "Minimum position must be <= maximum position")]
    fn test_from_min_max_rejects_inverted() {
        let _ = AABB::from_min_max(Point3::new(1.0, 0.0, 0.0), Point3::new(0.0, 1.0, 1.0));
    }
}
