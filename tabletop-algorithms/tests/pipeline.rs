use assert_approx_eq::assert_approx_eq;
use common::{test_config, SceneObject, TableScene};
use rand::{rngs::StdRng, SeedableRng};
use tabletop_algorithms::{
    config::{ObjectHints, PoseEstimationConfig},
    error::SegmentationError,
    pipeline::{SceneSegmentation, SegmentOptions, UNKNOWN_OBJECT_NAME},
    pose_estimation::estimate_pose,
    transform::{transform_pose, TransformBuffer, DEFAULT_TRANSFORM_TIMEOUT},
};
use tabletop_core::{
    containers::{Point, PointCloud, Timestamp},
    nalgebra::{Isometry3, Translation3, UnitQuaternion},
};

mod common;

fn three_cubes() -> TableScene {
    TableScene::with_objects(vec![
        SceneObject::cube(0.1, 0.1, 0.04),
        SceneObject::cube(-0.15, 0.05, 0.04),
        SceneObject::cube(0.0, -0.2, 0.05),
    ])
}

fn scene_cloud(scene: &TableScene, seed: u64) -> PointCloud {
    scene.generate(&mut StdRng::seed_from_u64(seed))
}

#[test]
fn test_objects_on_a_table_are_found() {
    let scene = three_cubes();
    let cloud = scene_cloud(&scene, 1);
    let mut segmentation = SceneSegmentation::new(test_config());
    let objects = segmentation.segment_cloud(&cloud, SegmentOptions::default());
    assert_eq!(scene.objects.len(), objects.len());

    for expected in &scene.objects {
        let found = objects
            .iter()
            .find(|o| {
                let center = o.bounding_box.center();
                (center.x - expected.center.x).abs() < 0.01 && (center.y - expected.center.y).abs() < 0.01
            })
            .expect("every cube is segmented");
        assert_eq!(UNKNOWN_OBJECT_NAME, found.name);
        assert_eq!(0.0, found.probability);
        assert_eq!("camera", found.frame_id);
        assert_eq!(Timestamp(1_000), found.stamp);
        assert!(found.bounding_box.dimensions().x < expected.size.x + 0.01);
        // the pose sits on the table below the cluster
        assert!((found.pose.position.z - scene.table_height).abs() < 0.02);
    }

    let normal = segmentation.plane_normal().unwrap();
    assert!(normal.z > 0.99);
    assert_approx_eq!(scene.table_height, segmentation.workspace_height().unwrap(), 0.005);
    assert!(!segmentation.debug_cloud().is_empty());
}

#[test]
fn test_object_ids_restart_after_reset() {
    let cloud = scene_cloud(&three_cubes(), 2);
    let mut segmentation = SceneSegmentation::new(test_config());

    segmentation.reset_object_id();
    let first: Vec<u64> = segmentation
        .segment_cloud(&cloud, SegmentOptions::default())
        .iter()
        .map(|o| o.id)
        .collect();
    assert_eq!(vec![0, 1, 2], first);

    let second: Vec<u64> = segmentation
        .segment_cloud(&cloud, SegmentOptions::default())
        .iter()
        .map(|o| o.id)
        .collect();
    assert_eq!(vec![3, 4, 5], second);

    segmentation.reset_object_id();
    let third: Vec<u64> = segmentation
        .segment_cloud(&cloud, SegmentOptions::default())
        .iter()
        .map(|o| o.id)
        .collect();
    assert_eq!(first, third);
}

#[test]
fn test_objects_are_ordered_by_distance_from_the_sensor() {
    let cloud = scene_cloud(&three_cubes(), 3);
    let mut segmentation = SceneSegmentation::new(test_config());
    let objects = segmentation.segment_cloud(&cloud, SegmentOptions::default());
    let distances: Vec<f64> = objects
        .iter()
        .map(|o| o.cluster.centroid().unwrap().norm())
        .collect();
    assert!(distances.windows(2).all(|pair| pair[0] <= pair[1]));

    // identical input, identical output
    let again = segmentation.segment_cloud(&cloud, SegmentOptions::default());
    for (a, b) in objects.iter().zip(again.iter()) {
        assert_eq!(a.cluster, b.cluster);
        assert_eq!(a.bounding_box, b.bounding_box);
    }
}

#[test]
fn test_clusters_are_centered_and_padded() {
    let cloud = scene_cloud(&three_cubes(), 4);
    let mut segmentation = SceneSegmentation::new(test_config());
    let plain = segmentation.segment_cloud(&cloud, SegmentOptions::default());
    let padded = segmentation.segment_cloud(
        &cloud,
        SegmentOptions {
            center: true,
            pad_to: Some(1024),
        },
    );
    assert_eq!(plain.len(), padded.len());
    for (plain, padded) in plain.iter().zip(padded.iter()) {
        assert_eq!(1024, padded.cluster.len());
        let original = plain.cluster.len();
        let centered = padded.cluster.select(&(0..original).collect::<Vec<_>>());
        assert!(centered.centroid().unwrap().norm() < 1e-9);
        assert!(padded.cluster.iter().skip(original).all(|p| p.position.norm() == 0.0));
        // the box stays in the sensor frame
        assert_eq!(plain.bounding_box, padded.bounding_box);
    }

    let truncated = segmentation.segment_cloud(
        &cloud,
        SegmentOptions {
            center: false,
            pad_to: Some(5),
        },
    );
    for (plain, kept) in plain.iter().zip(truncated.iter()) {
        assert_eq!(plain.cluster, kept.cluster);
    }
}

#[test]
fn test_empty_table_has_no_objects() {
    let cloud = scene_cloud(&TableScene::with_objects(vec![]), 5);
    let mut segmentation = SceneSegmentation::new(test_config());
    assert!(segmentation
        .segment_cloud(&cloud, SegmentOptions::default())
        .is_empty());
    assert!(matches!(
        segmentation.try_segment_cloud(&cloud, SegmentOptions::default()),
        Err(SegmentationError::NoClusters) | Err(SegmentationError::EmptyCloud { .. })
    ));
    // the plane is still reported
    assert!(segmentation.plane_normal().is_some());
    let detection = segmentation.find_plane(&cloud).unwrap();
    assert_eq!(detection.inliers.len(), segmentation.debug_cloud().len());
}

#[test]
fn test_scene_without_a_horizontal_plane() {
    let wall: PointCloud = (0..40)
        .flat_map(|i| (0..40).map(move |j| Point::new(0.2, -0.2 + i as f64 * 0.01, -0.1 + j as f64 * 0.01)))
        .collect();
    let mut segmentation = SceneSegmentation::new(test_config());
    assert!(matches!(
        segmentation.try_segment_cloud(&wall, SegmentOptions::default()),
        Err(SegmentationError::NoPlaneFound { .. })
    ));
    assert!(segmentation.find_plane(&wall).is_none());
    assert!(segmentation.debug_cloud().is_empty());
}

#[test]
fn test_accumulated_views_are_segmented() {
    let scene = three_cubes();
    let mut segmentation = SceneSegmentation::new(test_config());
    segmentation.reset_cloud_accumulation();
    for seed in 10..13 {
        segmentation.add_cloud_accumulation(&scene_cloud(&scene, seed));
    }
    let accumulated = segmentation.cloud_accumulation();
    assert!(accumulated.is_dense());
    assert_eq!("camera", accumulated.frame_id());

    let objects = segmentation.segment_accumulated_cloud(SegmentOptions::default());
    assert_eq!(scene.objects.len(), objects.len());
}

#[test]
fn test_poses_of_segmented_objects() {
    let cloud = scene_cloud(&three_cubes(), 6);
    let mut segmentation = SceneSegmentation::new(test_config());
    let objects = segmentation.segment_cloud(&cloud, SegmentOptions::default());
    assert!(!objects.is_empty());

    let buffer = TransformBuffer::new();
    let camera_to_base = Isometry3::from_parts(
        Translation3::new(0.0, 0.0, 0.6),
        UnitQuaternion::identity(),
    );
    buffer.set_transform("base_link", "camera", camera_to_base);

    for object in &objects {
        let (filtered, pose) =
            estimate_pose(&object.cluster, &ObjectHints::default(), &PoseEstimationConfig::default())
                .unwrap();
        assert!(!filtered.is_empty());
        let (roll, pitch, _) = pose.roll_pitch_yaw();
        assert_approx_eq!(0.0, roll);
        assert_approx_eq!(0.0, pitch);

        let in_base = transform_pose(&buffer, &pose, "base_link", DEFAULT_TRANSFORM_TIMEOUT);
        assert_eq!("base_link", in_base.frame_id);
        assert_approx_eq!(pose.position.z + 0.6, in_base.position.z);
    }
}
