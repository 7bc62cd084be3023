use std::{
    collections::HashMap,
    sync::{Condvar, Mutex, PoisonError},
    time::Duration,
};

use log::warn;
use tabletop_core::{geometry::ObjectPose, nalgebra::Isometry3};

use crate::error::{SegmentationError, SegmentationResult};

/// How long a pose transform waits for the transform to become available
pub const DEFAULT_TRANSFORM_TIMEOUT: Duration = Duration::from_millis(100);

/// Source of rigid transforms between named coordinate frames
pub trait TransformLookup {
    /// Returns the transform that maps coordinates in `source_frame` into `target_frame`, waiting at most
    /// `timeout` for it to become available
    fn lookup(
        &self,
        target_frame: &str,
        source_frame: &str,
        timeout: Duration,
    ) -> SegmentationResult<Isometry3<f64>>;
}

/// Thread-safe store of the latest transform per frame pair. Lookups block until a matching transform is
/// published or the timeout expires. A lookup also succeeds if only the inverse transform is known
#[derive(Debug, Default)]
pub struct TransformBuffer {
    transforms: Mutex<HashMap<(String, String), Isometry3<f64>>>,
    published: Condvar,
}

impl TransformBuffer {
    pub fn new() -> Self {
        Default::default()
    }

    /// Publishes the transform from `source_frame` into `target_frame`, replacing any previous one, and wakes
    /// up all waiting lookups
    pub fn set_transform<S: Into<String>, T: Into<String>>(
        &self,
        target_frame: T,
        source_frame: S,
        transform: Isometry3<f64>,
    ) {
        let mut transforms = self
            .transforms
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        transforms.insert((target_frame.into(), source_frame.into()), transform);
        self.published.notify_all();
    }

    fn find(
        transforms: &HashMap<(String, String), Isometry3<f64>>,
        target_frame: &str,
        source_frame: &str,
    ) -> Option<Isometry3<f64>> {
        let key = (target_frame.to_owned(), source_frame.to_owned());
        if let Some(transform) = transforms.get(&key) {
            return Some(*transform);
        }
        let inverse_key = (source_frame.to_owned(), target_frame.to_owned());
        transforms.get(&inverse_key).map(|t| t.inverse())
    }
}

impl TransformLookup for TransformBuffer {
    fn lookup(
        &self,
        target_frame: &str,
        source_frame: &str,
        timeout: Duration,
    ) -> SegmentationResult<Isometry3<f64>> {
        if target_frame == source_frame {
            return Ok(Isometry3::identity());
        }
        let transforms = self
            .transforms
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let (transforms, _) = self
            .published
            .wait_timeout_while(transforms, timeout, |transforms| {
                Self::find(transforms, target_frame, source_frame).is_none()
            })
            .unwrap_or_else(PoisonError::into_inner);
        Self::find(&transforms, target_frame, source_frame).ok_or_else(|| {
            SegmentationError::TransformUnavailable {
                source_frame: source_frame.to_owned(),
                target_frame: target_frame.to_owned(),
            }
        })
    }
}

/// Expresses `pose` in `target_frame`. If the transform cannot be looked up within `timeout`, a warning is
/// logged and `pose` is returned unchanged
pub fn transform_pose<L: TransformLookup + ?Sized>(
    lookup: &L,
    pose: &ObjectPose,
    target_frame: &str,
    timeout: Duration,
) -> ObjectPose {
    match lookup.lookup(target_frame, &pose.frame_id, timeout) {
        Ok(transform) => pose.transformed(&transform, target_frame),
        Err(e) => {
            warn!("Keeping pose in frame {}: {}", pose.frame_id, e);
            pose.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread, time::Instant};

    use assert_approx_eq::assert_approx_eq;
    use tabletop_core::{
        containers::Timestamp,
        nalgebra::{Translation3, UnitQuaternion, Vector3},
    };

    use super::*;

    fn camera_to_base() -> Isometry3<f64> {
        Isometry3::from_parts(
            Translation3::new(0.2, 0.0, 0.5),
            UnitQuaternion::from_euler_angles(0.0, 0.0, std::f64::consts::FRAC_PI_2),
        )
    }

    #[test]
    fn test_pose_is_transformed_into_target_frame() {
        let buffer = TransformBuffer::new();
        buffer.set_transform("base_link", "camera", camera_to_base());
        let pose = ObjectPose::identity("camera", Timestamp(1));
        let transformed = transform_pose(&buffer, &pose, "base_link", DEFAULT_TRANSFORM_TIMEOUT);
        assert_eq!("base_link", transformed.frame_id);
        assert_approx_eq!(0.2, transformed.position.x);
        assert_approx_eq!(0.5, transformed.position.z);

        // and back through the inverse
        let back = transform_pose(&buffer, &transformed, "camera", DEFAULT_TRANSFORM_TIMEOUT);
        assert!(back.position.norm() < 1e-9);
        assert!(back.orientation.angle() < 1e-9);
    }

    #[test]
    fn test_missing_transform_keeps_the_pose() {
        let buffer = TransformBuffer::new();
        let pose = ObjectPose::new(
            "camera",
            Timestamp(1),
            Vector3::new(1.0, 2.0, 3.0),
            UnitQuaternion::identity(),
        );
        let start = Instant::now();
        let kept = transform_pose(&buffer, &pose, "base_link", Duration::from_millis(20));
        assert!(start.elapsed() >= Duration::from_millis(20));
        assert_eq!(pose, kept);
        assert!(matches!(
            buffer.lookup("base_link", "camera", Duration::ZERO),
            Err(SegmentationError::TransformUnavailable { .. })
        ));
    }

    #[test]
    fn test_lookup_waits_for_a_published_transform() {
        let buffer = Arc::new(TransformBuffer::new());
        let publisher = {
            let buffer = Arc::clone(&buffer);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(10));
                buffer.set_transform("base_link", "camera", camera_to_base());
            })
        };
        let transform = buffer.lookup("base_link", "camera", Duration::from_secs(5));
        publisher.join().unwrap();
        assert_eq!(camera_to_base(), transform.unwrap());
    }
}
