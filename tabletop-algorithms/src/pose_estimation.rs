use float_ord::FloatOrd;
use log::debug;
use tabletop_core::{
    containers::{PointCloud, Timestamp},
    geometry::{BoundingBox, ObjectPose},
    nalgebra::{Matrix3, Rotation3, SymmetricEigen, UnitQuaternion, Vector3},
};

use crate::{
    config::{FieldName, HeightFilterPolicy, ObjectHints, PoseEstimationConfig},
    error::{SegmentationError, SegmentationResult},
    filters::passthrough,
    normal_estimation::{compute_centroid, compute_covariance_matrix},
};

const MIN_EDGE_LENGTH: f64 = 1e-9;
/// Smallest variance (in squared length units) along a principal axis
const MIN_VARIANCE: f64 = 1e-12;

fn unit_edge(from: &Vector3<f64>, to: &Vector3<f64>, name: &str) -> SegmentationResult<Vector3<f64>> {
    let edge = to - from;
    let length = edge.norm();
    if !length.is_finite() || length < MIN_EDGE_LENGTH {
        return Err(SegmentationError::DegenerateGeometry(format!(
            "bounding box edge {} has length {}",
            name, length
        )));
    }
    Ok(edge / length)
}

/// Pose of an object from its bounding box.
///
/// The z axis of the orientation follows the vertical edge 0→4, the x axis the longer of the two horizontal
/// edges 0→1 and 0→3 (0→3 on a tie) and the y axis completes the right-handed frame. The position is the box
/// center in x and y and the mean height of the four bottom vertices in z.
///
/// Fails with [SegmentationError::DegenerateGeometry] if one of the three edges has (almost) zero length
/// ```
/// # use tabletop_algorithms::pose_estimation::estimate_pose_from_box;
/// # use tabletop_core::{containers::Timestamp, geometry::BoundingBox, nalgebra::Vector3};
/// let corners = vec![Vector3::new(-0.1, -0.05, 0.0), Vector3::new(0.1, 0.05, 0.04)];
/// let bbox = BoundingBox::axis_aligned(corners, &Vector3::z(), "base_link").unwrap();
/// let pose = estimate_pose_from_box(&bbox, Timestamp(0)).unwrap();
/// assert!(pose.position.norm() < 1e-9);
/// assert!(pose.roll_pitch_yaw().2.abs() < 1e-9);
/// ```
pub fn estimate_pose_from_box(bounding_box: &BoundingBox, stamp: Timestamp) -> SegmentationResult<ObjectPose> {
    let v = bounding_box.vertices();
    let n3 = unit_edge(&v[0], &v[4], "0-4")?;
    let along_01 = v[1] - v[0];
    let along_03 = v[3] - v[0];
    let n1 = if along_01.norm() > along_03.norm() {
        unit_edge(&v[0], &v[1], "0-1")?
    } else {
        unit_edge(&v[0], &v[3], "0-3")?
    };
    let n2 = n3.cross(&n1);
    if n2.norm() < MIN_EDGE_LENGTH {
        return Err(SegmentationError::DegenerateGeometry(
            "bounding box edges are parallel".into(),
        ));
    }

    let rotation = Rotation3::from_matrix(&Matrix3::from_columns(&[n1, n2.normalize(), n3]));
    let center = bounding_box.center();
    let base_height = (v[0].z + v[1].z + v[2].z + v[3].z) / 4.0;
    Ok(ObjectPose::new(
        bounding_box.frame_id(),
        stamp,
        Vector3::new(center.x, center.y, base_height),
        UnitQuaternion::from_rotation_matrix(&rotation),
    ))
}

/// Pose of an object from its points, with the height filter chosen from `hints` (see
/// [PoseEstimationConfig::policy_for]). Returns the filtered points together with the pose
pub fn estimate_pose(
    cluster: &PointCloud,
    hints: &ObjectHints,
    config: &PoseEstimationConfig,
) -> SegmentationResult<(PointCloud, ObjectPose)> {
    let policy = config.policy_for(hints);
    debug!("Estimating pose of '{}' with {:?}", hints.name, policy);
    estimate_pose_with_policy(cluster, policy, config)
}

/// Removes points that would distort the orientation of the object. Heights are taken along z of the
/// cluster's frame
fn height_filter(
    cluster: &PointCloud,
    policy: HeightFilterPolicy,
    config: &PoseEstimationConfig,
) -> SegmentationResult<PointCloud> {
    let bounds = cluster.bounds().ok_or(SegmentationError::EmptyCloud {
        stage: "pose estimation",
    })?;
    let (min_z, max_z) = (bounds.min().z, bounds.max().z);
    let filtered = match policy {
        HeightFilterPolicy::SkipHeightFilter => cluster.filter(|p| p.is_finite()),
        HeightFilterPolicy::Default => passthrough(
            cluster,
            FieldName::Z,
            min_z + config.passthrough_min_offset,
            max_z + config.passthrough_max_offset,
        ),
        HeightFilterPolicy::Cavity | HeightFilterPolicy::DeepCavity => {
            let top_offset = if policy == HeightFilterPolicy::DeepCavity {
                config.deep_cavity_top_offset
            } else {
                config.cavity_top_offset
            };
            let mut rim = passthrough(
                cluster,
                FieldName::Z,
                min_z + config.passthrough_min_offset,
                max_z - top_offset,
            );
            for point in rim.points_mut() {
                point.position.z = config.cavity_flatten_height;
            }
            rim
        }
    };
    if filtered.is_empty() {
        return Err(SegmentationError::EmptyCloud {
            stage: "pose height filter",
        });
    }
    Ok(filtered)
}

/// Principal axes of `positions` as the columns of a rotation matrix: the axis of largest variance first,
/// the axis of smallest variance last
fn principal_axes(positions: &[Vector3<f64>]) -> SegmentationResult<(Vector3<f64>, Rotation3<f64>)> {
    let centroid = compute_centroid(positions).ok_or(SegmentationError::EmptyCloud {
        stage: "pose estimation",
    })?;
    let covariance = compute_covariance_matrix(positions, &centroid);
    let eigen = SymmetricEigen::new(covariance);

    let mut order = [0, 1, 2];
    order.sort_by_key(|&i| FloatOrd(eigen.eigenvalues[i]));
    // coincident points have no major axis, collinear points no unique minor axis
    if eigen.eigenvalues[order[1]] <= MIN_VARIANCE {
        return Err(SegmentationError::DegenerateGeometry(format!(
            "covariance has no principal axes (eigenvalues {:e}, {:e})",
            eigen.eigenvalues[order[2]],
            eigen.eigenvalues[order[1]]
        )));
    }
    let major: Vector3<f64> = eigen.eigenvectors.column(order[2]).normalize();
    let minor: Vector3<f64> = eigen.eigenvectors.column(order[0]).normalize();
    let middle = minor.cross(&major);
    Ok((
        centroid,
        Rotation3::from_basis_unchecked(&[major, middle, minor]),
    ))
}

/// Pose of an object from its points with an explicit height filter.
///
/// After filtering, the principal axes of the remaining points give the orientation and the center of their
/// extent along these axes gives the position. Objects are assumed to rest on a horizontal surface, so roll
/// and pitch are dropped and only the yaw of the orientation is kept
pub fn estimate_pose_with_policy(
    cluster: &PointCloud,
    policy: HeightFilterPolicy,
    config: &PoseEstimationConfig,
) -> SegmentationResult<(PointCloud, ObjectPose)> {
    let filtered = height_filter(cluster, policy, config)?;
    let positions: Vec<Vector3<f64>> = filtered.positions().collect();
    let (centroid, axes) = principal_axes(&positions)?;

    let mut min = Vector3::repeat(f64::INFINITY);
    let mut max = Vector3::repeat(f64::NEG_INFINITY);
    for position in &positions {
        let local = axes.inverse() * (position - centroid);
        min = min.inf(&local);
        max = max.sup(&local);
    }
    let mean_diagonal = (min + max) / 2.0;
    let position = axes * mean_diagonal + centroid;

    let pose = ObjectPose::new(
        cluster.frame_id(),
        cluster.stamp(),
        position,
        UnitQuaternion::from_rotation_matrix(&axes),
    )
    .yaw_only();
    Ok((filtered, pose))
}
