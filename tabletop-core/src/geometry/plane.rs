use nalgebra::{Point2, Vector3};

/// Represents a plane in coordinate-form: n.x * x + n.y * y + n.z * z + d = 0, with a unit normal `n`
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PlaneModel {
    normal: Vector3<f64>,
    offset: f64,
}

impl PlaneModel {
    /// Normals shorter than this are treated as degenerate
    const MIN_NORMAL_NORM: f64 = 1e-12;

    /// Creates a plane from the four coefficients of `ax + by + cz + d = 0`. The coefficients are scaled so that
    /// the normal has unit length. Returns `None` if `(a, b, c)` is (close to) zero or any coefficient is not finite
    /// ```
    /// # use tabletop_core::geometry::PlaneModel;
    /// let plane = PlaneModel::from_coefficients(0.0, 0.0, 2.0, -1.0).unwrap();
    /// assert_eq!([0.0, 0.0, 1.0, -0.5], plane.coefficients());
    /// assert!(PlaneModel::from_coefficients(0.0, 0.0, 0.0, 1.0).is_none());
    /// ```
    pub fn from_coefficients(a: f64, b: f64, c: f64, d: f64) -> Option<Self> {
        let normal = Vector3::new(a, b, c);
        let norm = normal.norm();
        if !norm.is_finite() || !d.is_finite() || norm < Self::MIN_NORMAL_NORM {
            return None;
        }
        Some(Self {
            normal: normal / norm,
            offset: d / norm,
        })
    }

    /// Creates the plane through three points. Returns `None` if the points are collinear
    pub fn from_points(a: &Vector3<f64>, b: &Vector3<f64>, c: &Vector3<f64>) -> Option<Self> {
        let normal = (b - a).cross(&(c - a));
        Self::from_coefficients(normal.x, normal.y, normal.z, -normal.dot(a))
    }

    /// Creates the plane with the given normal (need not be unit length) through `point`
    pub fn from_normal_and_point(normal: &Vector3<f64>, point: &Vector3<f64>) -> Option<Self> {
        Self::from_coefficients(normal.x, normal.y, normal.z, -normal.dot(point))
    }

    /// The unit normal of this plane
    pub fn normal(&self) -> &Vector3<f64> {
        &self.normal
    }

    /// The offset `d` of this plane
    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// The coefficients `[a, b, c, d]` with `(a, b, c)` being the unit normal
    pub fn coefficients(&self) -> [f64; 4] {
        [self.normal.x, self.normal.y, self.normal.z, self.offset]
    }

    /// Signed distance of `point` from this plane. Positive on the side the normal points to
    pub fn signed_distance(&self, point: &Vector3<f64>) -> f64 {
        self.normal.dot(point) + self.offset
    }

    pub fn distance(&self, point: &Vector3<f64>) -> f64 {
        self.signed_distance(point).abs()
    }

    /// Orthogonal projection of `point` onto this plane
    pub fn project(&self, point: &Vector3<f64>) -> Vector3<f64> {
        point - self.normal * self.signed_distance(point)
    }

    /// The same plane with the normal pointing the other way
    pub fn flipped(&self) -> Self {
        Self {
            normal: -self.normal,
            offset: -self.offset,
        }
    }

    /// Returns this plane with its normal flipped if necessary so that it does not point away from `axis`
    /// ```
    /// # use tabletop_core::geometry::PlaneModel;
    /// # use tabletop_core::nalgebra::Vector3;
    /// let plane = PlaneModel::from_coefficients(0.0, 0.0, -1.0, 0.5).unwrap();
    /// let oriented = plane.oriented_towards(&Vector3::z());
    /// assert_eq!([0.0, 0.0, 1.0, -0.5], oriented.coefficients());
    /// ```
    pub fn oriented_towards(&self, axis: &Vector3<f64>) -> Self {
        if self.normal.dot(axis) < 0.0 {
            self.flipped()
        } else {
            *self
        }
    }

    /// Acute angle in radians (in `[0, pi/2]`) between the normal of this plane and the line along `axis`
    pub fn angle_to_axis(&self, axis: &Vector3<f64>) -> f64 {
        acute_angle(&self.normal, axis)
    }
}

/// Acute angle in radians between the lines along `a` and `b`. Returns `pi/2` if either vector is zero
pub fn acute_angle(a: &Vector3<f64>, b: &Vector3<f64>) -> f64 {
    let denominator = a.norm() * b.norm();
    if denominator < PlaneModel::MIN_NORMAL_NORM {
        return std::f64::consts::FRAC_PI_2;
    }
    let cos = (a.dot(b) / denominator).abs().min(1.0);
    cos.acos()
}

/// A right-handed orthonormal frame attached to a plane. `u` and `v` span the plane, `normal` is the plane
/// normal and `origin` is the point of the plane closest to the world origin.
///
/// Local coordinates are `(u, v, h)` where `h` is the signed height above the plane. `u` is the direction of
/// the world x axis projected onto the plane (world y if the plane is perpendicular to x), so for a plane with
/// normal +z the local frame equals the world frame shifted to the plane's height.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaneFrame {
    origin: Vector3<f64>,
    u: Vector3<f64>,
    v: Vector3<f64>,
    normal: Vector3<f64>,
}

impl PlaneFrame {
    pub fn new(plane: &PlaneModel) -> Self {
        let normal = *plane.normal();
        let origin = -normal * plane.offset();
        let project = |axis: Vector3<f64>| axis - normal * normal.dot(&axis);
        let mut u = project(Vector3::x());
        if u.norm() < 1e-6 {
            u = project(Vector3::y());
        }
        let u = u.normalize();
        let v = normal.cross(&u);
        Self {
            origin,
            u,
            v,
            normal,
        }
    }

    pub fn origin(&self) -> &Vector3<f64> {
        &self.origin
    }

    pub fn u(&self) -> &Vector3<f64> {
        &self.u
    }

    pub fn v(&self) -> &Vector3<f64> {
        &self.v
    }

    pub fn normal(&self) -> &Vector3<f64> {
        &self.normal
    }

    /// Converts a world position into local `(u, v, h)` coordinates
    pub fn to_local(&self, point: &Vector3<f64>) -> Vector3<f64> {
        let relative = point - self.origin;
        Vector3::new(
            relative.dot(&self.u),
            relative.dot(&self.v),
            relative.dot(&self.normal),
        )
    }

    /// Converts local `(u, v, h)` coordinates back into a world position
    pub fn to_world(&self, local: &Vector3<f64>) -> Vector3<f64> {
        self.origin + self.u * local.x + self.v * local.y + self.normal * local.z
    }

    /// Projects a world position onto the plane and returns its 2D `(u, v)` coordinates
    pub fn project_2d(&self, point: &Vector3<f64>) -> Point2<f64> {
        let local = self.to_local(point);
        Point2::new(local.x, local.y)
    }
}

#[cfg(test)]
mod tests {
    use assert_approx_eq::assert_approx_eq;

    use super::*;

    #[test]
    fn test_plane_from_points() {
        let plane = PlaneModel::from_points(
            &Vector3::new(0.0, 0.0, 0.7),
            &Vector3::new(1.0, 0.0, 0.7),
            &Vector3::new(0.0, 1.0, 0.7),
        )
        .unwrap();
        assert_approx_eq!(1.0, plane.normal().z);
        assert_approx_eq!(-0.7, plane.offset());
        assert_approx_eq!(0.3, plane.signed_distance(&Vector3::new(4.0, -2.0, 1.0)));

        assert!(PlaneModel::from_points(
            &Vector3::new(0.0, 0.0, 0.0),
            &Vector3::new(1.0, 1.0, 1.0),
            &Vector3::new(2.0, 2.0, 2.0),
        )
        .is_none());
    }

    #[test]
    fn test_angle_to_axis_is_acute() {
        let plane = PlaneModel::from_coefficients(0.0, 0.0, -1.0, 0.0).unwrap();
        assert_approx_eq!(0.0, plane.angle_to_axis(&Vector3::z()));
        let tilted = PlaneModel::from_coefficients(0.0, 1.0, 1.0, 0.0).unwrap();
        assert_approx_eq!(std::f64::consts::FRAC_PI_4, tilted.angle_to_axis(&Vector3::z()));
    }

    #[test]
    fn test_plane_frame_roundtrip() {
        let plane = PlaneModel::from_coefficients(0.2, -0.3, 1.0, -0.4).unwrap();
        let frame = PlaneFrame::new(&plane);
        assert_approx_eq!(1.0, frame.u().cross(frame.v()).dot(frame.normal()));

        let point = Vector3::new(0.3, 1.2, 0.9);
        let local = frame.to_local(&point);
        assert_approx_eq!(plane.signed_distance(&point), local.z);
        let back = frame.to_world(&local);
        assert_approx_eq!(point.x, back.x);
        assert_approx_eq!(point.y, back.y);
        assert_approx_eq!(point.z, back.z);
    }

    #[test]
    fn test_horizontal_frame_matches_world_axes() {
        let plane = PlaneModel::from_coefficients(0.0, 0.0, 1.0, -0.5).unwrap();
        let frame = PlaneFrame::new(&plane);
        assert_eq!(Vector3::x(), *frame.u());
        assert_eq!(Vector3::y(), *frame.v());
        let local = frame.to_local(&Vector3::new(1.0, 2.0, 0.75));
        assert_approx_eq!(1.0, local.x);
        assert_approx_eq!(2.0, local.y);
        assert_approx_eq!(0.25, local.z);
    }
}
