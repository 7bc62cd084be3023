// The normal estimation algorithm is inspired by the PCL library (https://pointclouds.org/)
use log::warn;
use rayon::prelude::*;
use tabletop_core::{
    containers::PointCloud,
    nalgebra::{Matrix3, SymmetricEigen, Vector3},
};

use crate::{config::NormalParams, search::PointIndex};

/// Surface normal and curvature at one point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceNormal {
    /// Unit normal, oriented towards the sensor origin
    pub normal: Vector3<f64>,
    /// Surface variation `l0 / (l0 + l1 + l2)` with `l0` being the smallest eigenvalue of the covariance matrix
    pub curvature: f64,
}

/// Computes the centroid of all finite `positions`. Returns `None` if there is no finite position
pub fn compute_centroid(positions: &[Vector3<f64>]) -> Option<Vector3<f64>> {
    let (sum, count) = positions
        .iter()
        .filter(|p| is_finite(p))
        .fold((Vector3::zeros(), 0_usize), |(sum, count), p| {
            (sum + p, count + 1)
        });
    if count == 0 {
        return None;
    }
    Some(sum / count as f64)
}

/// compute the covariance matrix of the finite `positions` around `centroid`, normalized by the number of
/// finite positions
pub fn compute_covariance_matrix(positions: &[Vector3<f64>], centroid: &Vector3<f64>) -> Matrix3<f64> {
    let (unweighted, count) = positions
        .iter()
        .filter(|p| is_finite(p))
        .fold((Matrix3::zeros(), 0_usize), |(sum, count), p| {
            let diff: Vector3<f64> = p - centroid;
            (sum + diff * diff.transpose(), count + 1)
        });
    if count == 0 {
        return unweighted;
    }
    unweighted / count as f64
}

/// checks whether a given point has finite coordinates
fn is_finite(point: &Vector3<f64>) -> bool {
    point.x.is_finite() && point.y.is_finite() && point.z.is_finite()
}

/// Estimates normal and curvature of a neighbourhood with at least three points. The normal is flipped so
/// that it points towards `viewpoint`
fn normal_estimation(
    neighbourhood: &[Vector3<f64>],
    viewpoint: &Vector3<f64>,
    at: &Vector3<f64>,
) -> Option<SurfaceNormal> {
    if neighbourhood.len() < 3 {
        return None;
    }
    let centroid = compute_centroid(neighbourhood)?;
    let covariance_matrix = compute_covariance_matrix(neighbourhood, &centroid);
    let eigen = SymmetricEigen::new(covariance_matrix);

    let smallest = eigen.eigenvalues.imin();
    let mut normal: Vector3<f64> = eigen.eigenvectors.column(smallest).into_owned();
    if !is_finite(&normal) || normal.norm() < 1e-12 {
        return None;
    }
    normal.normalize_mut();
    if normal.dot(&(viewpoint - at)) < 0.0 {
        normal = -normal;
    }

    let trace = eigen.eigenvalues.sum();
    let curvature = if trace > 0.0 {
        (eigen.eigenvalues[smallest] / trace).max(0.0)
    } else {
        0.0
    };
    Some(SurfaceNormal { normal, curvature })
}

/// Normal Estimation Algorithm
///
/// Computes one entry per point of `cloud` from the covariance of all points within `params.radius` of it
/// (the point included). Points with fewer than three neighbours or a non-finite position get `None`. The
/// normals are oriented towards the sensor origin of the cloud's frame.
///
/// With `params.use_parallel` the points are processed on a dedicated thread pool with `params.workers`
/// threads. The result is the same either way. If the pool cannot be created, the estimation falls back to
/// the calling thread.
///
/// `index` must have been built from the positions of `cloud`
pub fn compute_normals(
    cloud: &PointCloud,
    index: &PointIndex,
    params: &NormalParams,
) -> Vec<Option<SurfaceNormal>> {
    let viewpoint = Vector3::zeros();
    let estimate = |position: &Vector3<f64>| -> Option<SurfaceNormal> {
        if !is_finite(position) {
            return None;
        }
        let neighbourhood: Vec<Vector3<f64>> = index
            .radius_search(position, params.radius)
            .into_iter()
            .map(|i| cloud[i].position)
            .collect();
        normal_estimation(&neighbourhood, &viewpoint, position)
    };

    let positions: Vec<Vector3<f64>> = cloud.positions().collect();
    if params.use_parallel {
        match rayon::ThreadPoolBuilder::new()
            .num_threads(params.workers)
            .build()
        {
            Ok(pool) => return pool.install(|| positions.par_iter().map(&estimate).collect()),
            Err(e) => warn!(
                "Could not create normal estimation pool with {} workers, estimating sequentially: {}",
                params.workers, e
            ),
        }
    }
    positions.iter().map(&estimate).collect()
}

#[cfg(test)]
mod tests {
    use assert_approx_eq::assert_approx_eq;
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use tabletop_core::containers::Point;

    use super::*;

    fn noisy_table(count: usize, height: f64) -> PointCloud {
        let mut rng = StdRng::seed_from_u64(5);
        (0..count)
            .map(|_| {
                Point::new(
                    rng.gen_range(-0.2..0.2),
                    rng.gen_range(-0.2..0.2),
                    height + rng.gen_range(-0.0001..0.0001),
                )
            })
            .collect()
    }

    #[test]
    fn test_normals_of_a_plane_point_towards_the_sensor() {
        // the table is below the sensor, so the normals point up
        let cloud = noisy_table(2000, -0.5);
        let index = PointIndex::build(cloud.positions());
        let normals = compute_normals(&cloud, &index, &NormalParams::default());
        assert_eq!(cloud.len(), normals.len());
        for normal in normals.iter().flatten() {
            assert!(normal.normal.z > 0.99);
            assert!(normal.curvature < 0.01);
        }
        assert!(normals.iter().filter(|n| n.is_some()).count() > 1900);
    }

    #[test]
    fn test_parallel_estimation_matches_sequential() {
        let cloud = noisy_table(500, 0.7);
        let index = PointIndex::build(cloud.positions());
        let sequential = compute_normals(&cloud, &index, &NormalParams::default());
        let parallel = compute_normals(
            &cloud,
            &index,
            &NormalParams {
                use_parallel: true,
                workers: 3,
                ..Default::default()
            },
        );
        assert_eq!(sequential, parallel);
        for normal in sequential.iter().flatten() {
            assert!(normal.normal.z < -0.99);
        }
    }

    #[test]
    fn test_sparse_points_get_no_normal() {
        let cloud: PointCloud = vec![
            Point::new(0.0, 0.0, 1.0),
            Point::new(1.0, 0.0, 1.0),
            Point::new(f64::NAN, 0.0, 1.0),
        ]
        .into_iter()
        .collect();
        let index = PointIndex::build(cloud.positions());
        let normals = compute_normals(&cloud, &index, &NormalParams::default());
        assert_eq!(vec![None, None, None], normals);
    }

    #[test]
    fn test_covariance_of_a_square() {
        let positions = vec![
            Vector3::new(1.0, 1.0, 0.0),
            Vector3::new(-1.0, 1.0, 0.0),
            Vector3::new(-1.0, -1.0, 0.0),
            Vector3::new(1.0, -1.0, 0.0),
            Vector3::new(f64::NAN, 0.0, 0.0),
        ];
        let centroid = compute_centroid(&positions).unwrap();
        assert_eq!(Vector3::zeros(), centroid);
        let covariance = compute_covariance_matrix(&positions, &centroid);
        assert_approx_eq!(1.0, covariance[(0, 0)]);
        assert_approx_eq!(1.0, covariance[(1, 1)]);
        assert_approx_eq!(0.0, covariance[(0, 1)]);
        assert_approx_eq!(0.0, covariance[(2, 2)]);
    }
}
