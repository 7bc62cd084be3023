use log::debug;
use rand::{rngs::StdRng, seq::index::sample, SeedableRng};
use rayon::prelude::*;
use tabletop_core::{
    containers::PointCloud,
    geometry::{acute_angle, PlaneFrame, PlaneModel, Polygon2},
    nalgebra::{SymmetricEigen, Vector3},
};

use crate::{
    config::PlaneFitParams,
    error::{SegmentationError, SegmentationResult},
    normal_estimation::{compute_centroid, compute_covariance_matrix, SurfaceNormal},
};

/// A fitted plane together with the indices of its inliers
#[derive(Debug, Clone, PartialEq)]
pub struct PlaneFit {
    pub model: PlaneModel,
    pub inliers: Vec<usize>,
}

/// Robust plane fit for the support surface of a scene.
///
/// Runs RANSAC over models spanned by three random points. A model is only considered if its normal is
/// within `eps_angle` of the expected `axis`. When surface normals are given, the distance of a point to a
/// model blends the euclidean distance with the angle between the point's normal and the model normal,
/// weighted by `normal_distance_weight * (1 - curvature)`. The best model (most inliers) is optionally
/// refined by a least-squares fit to its inliers, after which the inliers are selected again.
///
/// Every iteration draws from its own generator seeded with `seed + iteration`, so the result does not
/// depend on how iterations are scheduled onto threads.
#[derive(Debug, Clone)]
pub struct PlaneFinder {
    params: PlaneFitParams,
}

impl PlaneFinder {
    pub fn new(params: PlaneFitParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &PlaneFitParams {
        &self.params
    }

    /// Finds the dominant plane in `cloud`. `normals`, if given, must hold one entry per point of `cloud`,
    /// otherwise [NormalCountMismatch](SegmentationError::NormalCountMismatch) is returned.
    ///
    /// The normal of the returned model points along the expected axis.
    ///
    /// # Examples
    /// ```
    /// # use tabletop_algorithms::{config::PlaneFitParams, segmentation::PlaneFinder};
    /// # use tabletop_core::containers::*;
    /// let mut cloud = PointCloud::new("camera", Timestamp(0));
    /// for i in 0..20 {
    ///     for j in 0..20 {
    ///         cloud.push(Point::new(i as f64 * 0.05, j as f64 * 0.05, 0.7));
    ///     }
    /// }
    /// cloud.push(Point::new(0.5, 0.5, 1.0));
    /// let fit = PlaneFinder::new(PlaneFitParams::default()).find(&cloud, None).unwrap();
    /// assert_eq!(400, fit.inliers.len());
    /// assert!(fit.model.normal().z > 0.999);
    /// ```
    pub fn find(
        &self,
        cloud: &PointCloud,
        normals: Option<&[Option<SurfaceNormal>]>,
    ) -> SegmentationResult<PlaneFit> {
        let no_plane = SegmentationError::NoPlaneFound {
            iterations: self.params.max_iterations,
        };
        if cloud.len() < 3 {
            return Err(no_plane);
        }
        if let Some(normals) = normals {
            if normals.len() != cloud.len() {
                return Err(SegmentationError::NormalCountMismatch {
                    points: cloud.len(),
                    normals: normals.len(),
                });
            }
        }
        let positions: Vec<Vector3<f64>> = cloud.positions().collect();

        // iterate in parallel over max_iterations
        let best = (0..self.params.max_iterations)
            .into_par_iter()
            .filter_map(|iteration| {
                // generate one model for the current iteration
                let model = self.generate_rng_plane(&positions, iteration)?;
                let inliers = self.select_within_distance(&model, &positions, normals);
                Some((iteration, model, inliers))
            })
            // get the best plane-model from all iterations (most inliers, earliest iteration on ties)
            .max_by(|(a_iteration, _, a_inliers), (b_iteration, _, b_inliers)| {
                a_inliers
                    .len()
                    .cmp(&b_inliers.len())
                    .then(b_iteration.cmp(a_iteration))
            });

        let (iteration, mut model, mut inliers) = match best {
            Some(best) if best.2.len() >= 3 => best,
            _ => return Err(no_plane),
        };
        debug!(
            "Best plane model from iteration {} has {} inliers",
            iteration,
            inliers.len()
        );

        if self.params.optimize_coefficients {
            if let Some(refined) = least_squares_plane(&positions, &inliers) {
                let refined_inliers = self.select_within_distance(&refined, &positions, normals);
                if refined_inliers.len() >= 3 {
                    model = refined;
                    inliers = refined_inliers;
                }
            }
        }

        Ok(PlaneFit {
            model: model.oriented_towards(&self.params.axis),
            inliers,
        })
    }

    /// generates a random plane from three points of the cloud. Returns `None` if the points are collinear
    /// or the plane violates the axis constraint
    fn generate_rng_plane(&self, positions: &[Vector3<f64>], iteration: usize) -> Option<PlaneModel> {
        let mut rng = StdRng::seed_from_u64(self.params.seed.wrapping_add(iteration as u64));
        // three unique random indices
        let picked = sample(&mut rng, positions.len(), 3);
        let model = PlaneModel::from_points(
            &positions[picked.index(0)],
            &positions[picked.index(1)],
            &positions[picked.index(2)],
        )?;
        if model.angle_to_axis(&self.params.axis) > self.params.eps_angle {
            return None;
        }
        Some(model)
    }

    /// find all points that belong to the plane
    fn select_within_distance(
        &self,
        model: &PlaneModel,
        positions: &[Vector3<f64>],
        normals: Option<&[Option<SurfaceNormal>]>,
    ) -> Vec<usize> {
        positions
            .iter()
            .enumerate()
            .filter(|(index, position)| {
                let euclidean = model.distance(position);
                let normal = normals.and_then(|normals| normals[*index].as_ref());
                let distance = match normal {
                    Some(normal) if self.params.normal_distance_weight > 0.0 => {
                        let weight = self.params.normal_distance_weight * (1.0 - normal.curvature);
                        let angle = acute_angle(&normal.normal, model.normal());
                        weight * angle + (1.0 - weight) * euclidean
                    }
                    _ => euclidean,
                };
                distance < self.params.distance_threshold
            })
            .map(|(index, _)| index)
            .collect()
    }
}

/// Least-squares plane through the points at `indices`: the plane through their centroid whose normal is
/// the direction of least variance
fn least_squares_plane(positions: &[Vector3<f64>], indices: &[usize]) -> Option<PlaneModel> {
    let selected: Vec<Vector3<f64>> = indices.iter().map(|&i| positions[i]).collect();
    let centroid = compute_centroid(&selected)?;
    let eigen = SymmetricEigen::new(compute_covariance_matrix(&selected, &centroid));
    let normal = eigen.eigenvectors.column(eigen.eigenvalues.imin()).into_owned();
    PlaneModel::from_normal_and_point(&normal, &centroid)
}

/// The support surface of a scene: the plane, a frame attached to it and the 2D convex hull of the plane
/// inliers in that frame
#[derive(Debug, Clone, PartialEq)]
pub struct SupportSurface {
    model: PlaneModel,
    frame: PlaneFrame,
    hull: Polygon2,
}

impl SupportSurface {
    /// Builds the surface from a plane fit and the cloud the fit was computed on
    pub fn from_fit(fit: &PlaneFit, cloud: &PointCloud) -> Self {
        let frame = PlaneFrame::new(&fit.model);
        let projected: Vec<_> = fit
            .inliers
            .iter()
            .map(|&i| frame.project_2d(&cloud[i].position))
            .collect();
        Self {
            model: fit.model,
            frame,
            hull: Polygon2::convex_hull(&projected),
        }
    }

    /// Creates a surface with a known footprint, given in the coordinates of the plane frame
    pub fn from_parts(model: PlaneModel, hull: Polygon2) -> Self {
        Self {
            model,
            frame: PlaneFrame::new(&model),
            hull,
        }
    }

    pub fn model(&self) -> &PlaneModel {
        &self.model
    }

    pub fn frame(&self) -> &PlaneFrame {
        &self.frame
    }

    /// Footprint of the surface in plane coordinates
    pub fn hull(&self) -> &Polygon2 {
        &self.hull
    }

    /// Vertices of the footprint in the frame of the cloud
    pub fn hull_vertices(&self) -> Vec<Vector3<f64>> {
        self.hull
            .vertices()
            .iter()
            .map(|v| self.frame.to_world(&Vector3::new(v.x, v.y, 0.0)))
            .collect()
    }

    /// Mean z coordinate of the footprint vertices, or `None` for an empty footprint
    pub fn workspace_height(&self) -> Option<f64> {
        let vertices = self.hull_vertices();
        if vertices.is_empty() {
            return None;
        }
        Some(vertices.iter().map(|v| v.z).sum::<f64>() / vertices.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use assert_approx_eq::assert_approx_eq;
    use rand::Rng;
    use tabletop_core::containers::Point;

    use super::*;

    fn tilted_plane_with_outliers() -> (PointCloud, usize) {
        // plane 0.05x - 0.03y + z - 0.8 = 0 plus points well above it
        let mut rng = StdRng::seed_from_u64(21);
        let mut points = vec![];
        for _ in 0..1000 {
            let x: f64 = rng.gen_range(-0.4..0.4);
            let y: f64 = rng.gen_range(-0.4..0.4);
            points.push(Point::new(x, y, 0.8 - 0.05 * x + 0.03 * y));
        }
        let inliers = points.len();
        for _ in 0..200 {
            points.push(Point::new(
                rng.gen_range(-0.4..0.4),
                rng.gen_range(-0.4..0.4),
                rng.gen_range(0.9..1.5),
            ));
        }
        (points.into_iter().collect(), inliers)
    }

    #[test]
    fn test_perfect_plane_is_recovered() {
        let (cloud, inlier_count) = tilted_plane_with_outliers();
        let fit = PlaneFinder::new(PlaneFitParams::default())
            .find(&cloud, None)
            .unwrap();
        assert_eq!((0..inlier_count).collect::<Vec<_>>(), fit.inliers);

        let expected = Vector3::new(0.05, -0.03, 1.0);
        assert!(acute_angle(&expected, fit.model.normal()) < 1e-6);
        assert!(fit.model.normal().z > 0.0);
        assert_approx_eq!(-0.8 / expected.norm(), fit.model.offset());
    }

    #[test]
    fn test_axis_constraint_rejects_walls() {
        // a large wall (normal along x) and a smaller table (normal along z)
        let mut rng = StdRng::seed_from_u64(2);
        let mut points = vec![];
        for _ in 0..2000 {
            points.push(Point::new(1.0, rng.gen_range(-1.0..1.0), rng.gen_range(0.0..1.0)));
        }
        for _ in 0..500 {
            points.push(Point::new(rng.gen_range(0.0..0.9), rng.gen_range(-0.5..0.5), -0.3));
        }
        let cloud: PointCloud = points.into_iter().collect();
        let fit = PlaneFinder::new(PlaneFitParams::default())
            .find(&cloud, None)
            .unwrap();
        assert!(fit.model.normal().z > 0.99);
        assert_eq!(500, fit.inliers.len());
        assert!(fit.inliers.iter().all(|&i| i >= 2000));
    }

    #[test]
    fn test_no_plane_along_axis() {
        let mut rng = StdRng::seed_from_u64(3);
        let cloud: PointCloud = (0..300)
            .map(|_| Point::new(0.5, rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0)))
            .collect();
        let result = PlaneFinder::new(PlaneFitParams::default()).find(&cloud, None);
        assert_eq!(Err(SegmentationError::NoPlaneFound { iterations: 1000 }), result);

        let tiny: PointCloud = vec![Point::new(0.0, 0.0, 0.0), Point::new(1.0, 0.0, 0.0)]
            .into_iter()
            .collect();
        assert!(PlaneFinder::new(PlaneFitParams::default()).find(&tiny, None).is_err());
    }

    #[test]
    fn test_normals_must_match_the_cloud() {
        let cloud: PointCloud = (0..100)
            .map(|i| Point::new((i % 10) as f64 * 0.01, (i / 10) as f64 * 0.01, 0.5))
            .collect();
        let normals: Vec<Option<SurfaceNormal>> = vec![None; 99];
        assert_eq!(
            Err(SegmentationError::NormalCountMismatch {
                points: 100,
                normals: 99
            }),
            PlaneFinder::new(PlaneFitParams::default()).find(&cloud, Some(&normals))
        );
    }

    #[test]
    fn test_normals_reject_points_with_disagreeing_normals() {
        let cloud: PointCloud = (0..100)
            .map(|i| Point::new((i % 10) as f64 * 0.01, (i / 10) as f64 * 0.01, 0.5))
            .collect();
        let up = SurfaceNormal {
            normal: Vector3::z(),
            curvature: 0.0,
        };
        let sideways = SurfaceNormal {
            normal: Vector3::x(),
            curvature: 0.0,
        };
        let normals: Vec<Option<SurfaceNormal>> = (0..100)
            .map(|i| if i < 10 { Some(sideways) } else { Some(up) })
            .collect();
        let params = PlaneFitParams {
            normal_distance_weight: 0.1,
            ..Default::default()
        };
        let fit = PlaneFinder::new(params).find(&cloud, Some(&normals)).unwrap();
        // 0.1 * pi/2 is far above the distance threshold
        assert_eq!((10..100).collect::<Vec<_>>(), fit.inliers);
    }

    #[test]
    fn test_fit_is_deterministic() {
        let (cloud, _) = tilted_plane_with_outliers();
        let params = PlaneFitParams {
            max_iterations: 50,
            optimize_coefficients: false,
            seed: 99,
            ..Default::default()
        };
        let first = PlaneFinder::new(params.clone()).find(&cloud, None).unwrap();
        let second = PlaneFinder::new(params).find(&cloud, None).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_support_surface_hull_and_height() {
        let cloud: PointCloud = (0..121)
            .map(|i| Point::new((i % 11) as f64 * 0.1 - 0.5, (i / 11) as f64 * 0.1 - 0.5, -0.2))
            .collect();
        let params = PlaneFitParams {
            optimize_coefficients: false,
            ..Default::default()
        };
        let fit = PlaneFinder::new(params).find(&cloud, None).unwrap();
        let surface = SupportSurface::from_fit(&fit, &cloud);
        assert_eq!(4, surface.hull().len());
        assert_approx_eq!(1.0, surface.hull().area());
        assert_approx_eq!(-0.2, surface.workspace_height().unwrap());
    }
}
