use nalgebra::{Point3, Vector3};

/// A single 3D sample as delivered by a depth sensor. `color` holds a packed RGBA value (see [pack_rgba])
/// for sensors that provide one. Positions may be non-finite (NaN/Inf) for invalid depth readings
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Point {
    pub position: Vector3<f64>,
    pub color: Option<u32>,
}

impl Point {
    /// Creates an uncolored point
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self {
            position: Vector3::new(x, y, z),
            color: None,
        }
    }

    /// Creates a point with the given packed RGBA color
    pub fn with_color(x: f64, y: f64, z: f64, rgba: u32) -> Self {
        Self {
            position: Vector3::new(x, y, z),
            color: Some(rgba),
        }
    }

    pub fn from_position(position: Vector3<f64>) -> Self {
        Self {
            position,
            color: None,
        }
    }

    /// Returns true if all three coordinates are finite
    /// ```
    /// # use tabletop_core::containers::Point;
    /// assert!(Point::new(1.0, 2.0, 3.0).is_finite());
    /// assert!(!Point::new(f64::NAN, 2.0, 3.0).is_finite());
    /// assert!(!Point::new(1.0, f64::INFINITY, 3.0).is_finite());
    /// ```
    pub fn is_finite(&self) -> bool {
        self.position.x.is_finite() && self.position.y.is_finite() && self.position.z.is_finite()
    }

    /// The packed RGBA color of this point, or 0 if the point has no color
    pub fn rgba(&self) -> u32 {
        self.color.unwrap_or(0)
    }

    pub fn as_point3(&self) -> Point3<f64> {
        Point3::from(self.position)
    }
}

impl From<Vector3<f64>> for Point {
    fn from(position: Vector3<f64>) -> Self {
        Self::from_position(position)
    }
}

/// Packs 8-bit color channels into one `u32` with red in the most significant byte
/// ```
/// # use tabletop_core::containers::{pack_rgba, unpack_rgba};
/// let rgba = pack_rgba(255, 128, 0, 255);
/// assert_eq!([255, 128, 0, 255], unpack_rgba(rgba));
/// ```
pub fn pack_rgba(r: u8, g: u8, b: u8, a: u8) -> u32 {
    u32::from_be_bytes([r, g, b, a])
}

/// Inverse of [pack_rgba]
pub fn unpack_rgba(rgba: u32) -> [u8; 4] {
    rgba.to_be_bytes()
}
