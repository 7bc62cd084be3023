use std::{cmp::Reverse, collections::VecDeque};

use float_ord::FloatOrd;
use log::{debug, warn};
use tabletop_core::{
    containers::PointCloud,
    geometry::BoundingBox,
    nalgebra::Vector3,
};

use crate::{config::ClusterParams, search::PointIndex, segmentation::SupportSurface};

/// A connected group of points that passed all cluster gates
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterCandidate {
    pub cloud: PointCloud,
    pub centroid: Vector3<f64>,
    /// Box around the cluster with its vertical edge along the plane normal
    pub bounding_box: BoundingBox,
    /// Distance of the projected centroid from the boundary of the plane footprint
    pub distance_to_boundary: f64,
}

impl ClusterCandidate {
    pub fn len(&self) -> usize {
        self.cloud.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cloud.is_empty()
    }

    /// Extent of the cluster along the plane normal
    pub fn height(&self) -> f64 {
        self.bounding_box.dimensions().z
    }

    /// Larger horizontal extent of the cluster
    pub fn length(&self) -> f64 {
        let dimensions = self.bounding_box.dimensions();
        dimensions.x.max(dimensions.y)
    }
}

/// Connected components of `cloud` where two points are connected if they are at most `tolerance` apart.
///
/// Region growing starts at the lowest unvisited index and visits neighbours in ascending index order, so
/// the components and the order of their indices only depend on the input. Non-finite points form no
/// component. `index` must have been built from the positions of `cloud`
pub fn euclidean_clusters(cloud: &PointCloud, index: &PointIndex, tolerance: f64) -> Vec<Vec<usize>> {
    let mut visited = vec![false; cloud.len()];
    let mut clusters = vec![];
    for seed in 0..cloud.len() {
        if visited[seed] || !cloud[seed].is_finite() {
            continue;
        }
        visited[seed] = true;
        let mut cluster = vec![];
        let mut queue = VecDeque::from(vec![seed]);
        while let Some(current) = queue.pop_front() {
            cluster.push(current);
            for neighbour in index.radius_search(&cloud[current].position, tolerance) {
                if !visited[neighbour] {
                    visited[neighbour] = true;
                    queue.push_back(neighbour);
                }
            }
        }
        cluster.sort_unstable();
        clusters.push(cluster);
    }
    clusters
}

/// Splits the points above the support surface into objects.
///
/// Every connected component (see [euclidean_clusters]) must pass all gates of [ClusterParams] to become a
/// [ClusterCandidate]; all bounds are inclusive. The accepted clusters are ordered by the distance of their
/// centroid from the sensor origin, larger clusters first on ties.
#[derive(Debug, Clone)]
pub struct ClusterExtractor {
    params: ClusterParams,
    oriented_boxes: bool,
}

impl ClusterExtractor {
    /// With `oriented_boxes` the cluster boxes have the smallest footprint area, otherwise they are aligned
    /// with the plane frame
    pub fn new(params: ClusterParams, oriented_boxes: bool) -> Self {
        Self {
            params,
            oriented_boxes,
        }
    }

    pub fn extract(&self, volume: &PointCloud, surface: &SupportSurface) -> Vec<ClusterCandidate> {
        let index = PointIndex::build(volume.positions());
        let components = euclidean_clusters(volume, &index, self.params.tolerance);
        debug!("Found {} connected components", components.len());

        let mut candidates: Vec<ClusterCandidate> = components
            .iter()
            .filter_map(|component| self.candidate(volume, component, surface))
            .collect();
        candidates.sort_by_key(|c| (FloatOrd(c.centroid.norm()), Reverse(c.len())));
        candidates
    }

    fn candidate(
        &self,
        volume: &PointCloud,
        component: &[usize],
        surface: &SupportSurface,
    ) -> Option<ClusterCandidate> {
        let params = &self.params;
        if component.len() < params.min_size || component.len() > params.max_size {
            debug!("Dropping cluster of {} points (size)", component.len());
            return None;
        }
        let cloud = volume.select(component);
        let centroid = cloud.centroid()?;
        let normal = surface.model().normal();
        let bounding_box = if self.oriented_boxes {
            BoundingBox::oriented(cloud.positions(), normal, cloud.frame_id())
        } else {
            BoundingBox::axis_aligned(cloud.positions(), normal, cloud.frame_id())
        };
        let bounding_box = match bounding_box {
            Some(bounding_box) => bounding_box,
            None => {
                warn!("Dropping cluster of {} points without a valid bounding box", component.len());
                return None;
            }
        };
        let distance_to_boundary = surface
            .hull()
            .distance_to_boundary(&surface.frame().project_2d(&centroid));

        let candidate = ClusterCandidate {
            cloud,
            centroid,
            bounding_box,
            distance_to_boundary,
        };
        let height = candidate.height();
        if height < params.min_height || height > params.max_height {
            debug!("Dropping cluster of height {:.3}", height);
            return None;
        }
        if candidate.length() > params.max_length {
            debug!("Dropping cluster of length {:.3}", candidate.length());
            return None;
        }
        if distance_to_boundary < params.min_distance_to_polygon {
            debug!(
                "Dropping cluster {:.3} from the plane boundary",
                distance_to_boundary
            );
            return None;
        }
        Some(candidate)
    }
}
