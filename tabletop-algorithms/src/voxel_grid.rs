use std::collections::BTreeMap;

use log::warn;
use tabletop_core::{
    containers::{Point, PointCloud, VoxelMap},
    nalgebra::Vector3,
};

use crate::config::VoxelGridParams;

/// Indices of all points that fall into one leaf of the grid
struct Voxel {
    points: Vec<usize>,
}

/// returns the most common color in the voxel. Ties go to the smallest packed value
fn most_common_color(voxel: &Voxel, cloud: &PointCloud) -> Option<u32> {
    let mut counts: BTreeMap<u32, usize> = BTreeMap::new();
    for color in voxel.points.iter().filter_map(|&i| cloud[i].color) {
        *counts.entry(color).or_insert(0) += 1;
    }
    let mut best: Option<(u32, usize)> = None;
    for (color, count) in counts {
        if best.map_or(true, |(_, best_count)| count > best_count) {
            best = Some((color, count));
        }
    }
    best.map(|(color, _)| color)
}

/// returns the average position of the voxel
fn centroid(voxel: &Voxel, cloud: &PointCloud) -> Vector3<f64> {
    let sum: Vector3<f64> = voxel.points.iter().map(|&i| cloud[i].position).sum();
    sum / voxel.points.len() as f64
}

/// Downsamples `cloud` with a voxel grid of cubic leaves of size `params.leaf_size`.
///
/// Points whose coordinate along `params.filter_field` lies outside
/// `[params.filter_limit_min, params.filter_limit_max]` are removed first, as are non-finite points. Every
/// occupied leaf then emits one point at the centroid of its points, colored with the most common color
/// among them. The output follows the Morton order of the leaves, so it does not depend on the order of
/// the input points. If the grid cannot index every remaining point at this leaf size, the remaining points
/// are returned without downsampling.
///
/// # Panics
///
/// If `params.leaf_size` is not finite and positive
///
/// # Examples
/// ```
/// # use tabletop_algorithms::{config::VoxelGridParams, voxel_grid::voxelgrid_filter};
/// # use tabletop_core::containers::*;
/// let mut points = vec![];
/// for i in 0..100 {
///     for j in 0..100 {
///         points.push(Point::new(0.0, i as f64 * 0.01, j as f64 * 0.01));
///     }
/// }
/// let cloud: PointCloud = points.into_iter().collect();
/// let params = VoxelGridParams {
///     leaf_size: 0.05,
///     filter_limit_min: -10.0,
///     filter_limit_max: 10.0,
///     ..Default::default()
/// };
/// let filtered = voxelgrid_filter(&cloud, &params);
/// assert_eq!(400, filtered.len());
/// ```
pub fn voxelgrid_filter(cloud: &PointCloud, params: &VoxelGridParams) -> PointCloud {
    let mut voxels: VoxelMap<Voxel> = VoxelMap::new(params.leaf_size);
    let mut kept = vec![];
    let mut out_of_range = 0_usize;

    // create the VoxelGrid
    for (i, p) in cloud.iter().enumerate() {
        if !p.is_finite() {
            continue;
        }
        let value = params.filter_field.value(&p.position);
        if value < params.filter_limit_min || value > params.filter_limit_max {
            continue;
        }
        kept.push(i);
        let voxel = match voxels.key_at(&p.position) {
            Some(key) => voxels.get_or_insert_with(key, || Voxel { points: vec![] }),
            None => None,
        };
        match voxel {
            Some(voxel) => voxel.points.push(i),
            None => out_of_range += 1,
        }
    }

    if out_of_range > 0 {
        warn!(
            "Leaf size {} is too small for the extent of the cloud ({} points outside the grid), skipping downsampling",
            params.leaf_size, out_of_range
        );
        return cloud.select(&kept);
    }

    let points = voxels
        .iter()
        .map(|(_, voxel)| Point {
            position: centroid(voxel, cloud),
            color: most_common_color(voxel, cloud),
        })
        .collect();
    cloud.with_points(points)
}

#[cfg(test)]
mod tests {
    use assert_approx_eq::assert_approx_eq;
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use tabletop_core::containers::Timestamp;

    use crate::config::FieldName;

    use super::*;

    fn setup_point_cloud() -> PointCloud {
        let mut rng = StdRng::seed_from_u64(11);
        let mut points = vec![];
        // three points per unit cube, jittered around (i + 0.6, j + 0.6, k + 0.6)
        for i in 0..10 {
            for j in 0..10 {
                for k in 0..10 {
                    for color in [42, 42, 7] {
                        let offset = rng.gen_range(-0.05..0.05);
                        points.push(Point::with_color(
                            i as f64 + 0.6 + offset,
                            j as f64 + 0.6 - offset,
                            k as f64 + 0.6,
                            color,
                        ));
                    }
                }
            }
        }
        PointCloud::from_points(points, "camera", Timestamp(1))
    }

    #[test]
    fn test_voxel_grid_filter() {
        let cloud = setup_point_cloud();
        assert_eq!(3000, cloud.len());
        let params = VoxelGridParams {
            leaf_size: 1.0,
            filter_field: FieldName::Z,
            filter_limit_min: -100.0,
            filter_limit_max: 100.0,
        };
        let filtered = voxelgrid_filter(&cloud, &params);
        assert_eq!(1000, filtered.len());
        assert_eq!("camera", filtered.frame_id());

        for p in filtered.iter() {
            // the x and y jitter of a voxel cancels out
            assert_approx_eq!(
                p.position.x.floor() + p.position.y.floor() + 1.2,
                p.position.x + p.position.y
            );
            assert_approx_eq!(0.6, p.position.z - p.position.z.floor());
            assert_eq!(Some(42), p.color);
        }
    }

    #[test]
    fn test_field_limits_apply_before_downsampling() {
        let cloud = setup_point_cloud();
        let params = VoxelGridParams {
            leaf_size: 1.0,
            filter_field: FieldName::Z,
            filter_limit_min: 0.0,
            filter_limit_max: 4.9,
        };
        let filtered = voxelgrid_filter(&cloud, &params);
        assert_eq!(500, filtered.len());
        assert!(filtered.iter().all(|p| p.position.z < 5.0));
    }

    #[test]
    fn test_output_order_is_independent_of_input_order() {
        let cloud = setup_point_cloud();
        let mut reversed = cloud.clone().into_points();
        reversed.reverse();
        let reversed = cloud.with_points(reversed);
        let params = VoxelGridParams {
            leaf_size: 2.0,
            filter_limit_max: 100.0,
            ..Default::default()
        };
        let forward = voxelgrid_filter(&cloud, &params);
        let backward = voxelgrid_filter(&reversed, &params);
        assert_eq!(forward.len(), backward.len());
        for (a, b) in forward.iter().zip(backward.iter()) {
            assert_approx_eq!(a.position.x, b.position.x);
            assert_approx_eq!(a.position.y, b.position.y);
            assert_approx_eq!(a.position.z, b.position.z);
        }
    }

    #[test]
    fn test_leaf_size_too_small_for_the_extent() {
        let cloud: PointCloud = vec![
            Point::new(0.1, 0.0, 0.0),
            Point::new(200.0, 0.0, 0.0),
            Point::new(f64::NAN, 0.0, 0.0),
        ]
        .into_iter()
        .collect();
        let params = VoxelGridParams {
            leaf_size: 0.0001,
            filter_field: FieldName::X,
            filter_limit_min: -1000.0,
            filter_limit_max: 1000.0,
        };
        let filtered = voxelgrid_filter(&cloud, &params);
        assert_eq!(2, filtered.len());
        assert_eq!(0.1, filtered[0].position.x);
        assert_eq!(200.0, filtered[1].position.x);
    }
}
