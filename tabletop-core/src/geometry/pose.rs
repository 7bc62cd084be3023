use nalgebra::{Isometry3, Translation3, UnitQuaternion, Vector3};

use crate::containers::Timestamp;

/// A 6-DOF pose of an object in the reference frame `frame_id`, valid at `stamp`
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ObjectPose {
    pub frame_id: String,
    pub stamp: Timestamp,
    pub position: Vector3<f64>,
    pub orientation: UnitQuaternion<f64>,
}

impl ObjectPose {
    pub fn new<S: Into<String>>(
        frame_id: S,
        stamp: Timestamp,
        position: Vector3<f64>,
        orientation: UnitQuaternion<f64>,
    ) -> Self {
        Self {
            frame_id: frame_id.into(),
            stamp,
            position,
            orientation,
        }
    }

    /// The pose at the origin of `frame_id` with no rotation
    pub fn identity<S: Into<String>>(frame_id: S, stamp: Timestamp) -> Self {
        Self::new(frame_id, stamp, Vector3::zeros(), UnitQuaternion::identity())
    }

    pub fn isometry(&self) -> Isometry3<f64> {
        Isometry3::from_parts(Translation3::from(self.position), self.orientation)
    }

    /// Roll, pitch and yaw of the orientation in radians
    pub fn roll_pitch_yaw(&self) -> (f64, f64, f64) {
        self.orientation.euler_angles()
    }

    /// This pose with roll and pitch removed, keeping only the rotation around the z axis
    /// ```
    /// # use tabletop_core::geometry::ObjectPose;
    /// # use tabletop_core::containers::Timestamp;
    /// # use tabletop_core::nalgebra::{UnitQuaternion, Vector3};
    /// let tilted = ObjectPose::new("base_link", Timestamp(0), Vector3::zeros(),
    ///     UnitQuaternion::from_euler_angles(0.3, -0.2, 1.0));
    /// let (roll, pitch, yaw) = tilted.yaw_only().roll_pitch_yaw();
    /// assert!(roll.abs() < 1e-9 && pitch.abs() < 1e-9);
    /// assert!((yaw - 1.0).abs() < 1e-9);
    /// ```
    pub fn yaw_only(&self) -> Self {
        let (_, _, yaw) = self.roll_pitch_yaw();
        Self {
            orientation: UnitQuaternion::from_euler_angles(0.0, 0.0, yaw),
            ..self.clone()
        }
    }

    /// Applies `transform` (which maps coordinates of this pose's frame into `target_frame`) to this pose
    pub fn transformed<S: Into<String>>(&self, transform: &Isometry3<f64>, target_frame: S) -> Self {
        let isometry = transform * self.isometry();
        Self {
            frame_id: target_frame.into(),
            stamp: self.stamp,
            position: isometry.translation.vector,
            orientation: isometry.rotation,
        }
    }
}
