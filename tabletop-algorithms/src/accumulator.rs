use log::{debug, warn};
use tabletop_core::{
    containers::{Point, PointCloud, Timestamp, VoxelMap},
    nalgebra::Vector3,
};

/// Resolution of the accumulation octree used by the segmentation pipeline
pub const DEFAULT_OCTREE_RESOLUTION: f64 = 0.0025;

/// Occupancy index with cubic cells of a fixed size. Each occupied cell stores the color of the last point
/// inserted into it
#[derive(Debug, Clone)]
pub struct OccupancyOctree {
    cells: VoxelMap<Option<u32>>,
}

impl OccupancyOctree {
    /// # Panics
    ///
    /// If `resolution` is not finite and positive
    pub fn new(resolution: f64) -> Self {
        Self {
            cells: VoxelMap::new(resolution),
        }
    }

    pub fn resolution(&self) -> f64 {
        self.cells.resolution()
    }

    /// Marks the cell of `point` as occupied. Returns `false` for a non-finite point, which is not inserted
    pub fn insert_point(&mut self, point: &Point) -> bool {
        if !point.is_finite() {
            return false;
        }
        self.cells.insert_at(&point.position, point.color)
    }

    /// Centers of all occupied cells together with their stored color, in octree order
    pub fn occupied_centers(&self) -> impl Iterator<Item = (Vector3<f64>, Option<u32>)> + '_ {
        self.cells.centers().map(|(center, color)| (center, *color))
    }

    /// Color of the cell containing `position`, `0` if that cell is empty or has no color
    pub fn color_at(&self, position: &Vector3<f64>) -> u32 {
        self.cells.get_at(position).copied().flatten().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn clear(&mut self) {
        self.cells.clear()
    }
}

/// Merges point clouds of several sensor observations into one deduplicated cloud.
///
/// Every finite point marks its cell of an [OccupancyOctree] as occupied, so observing the same surface
/// again does not grow the cloud. The accumulated cloud has one point per occupied cell, located at the
/// cell center.
/// ```
/// # use tabletop_algorithms::accumulator::SpatialAccumulator;
/// # use tabletop_core::containers::*;
/// let mut accumulator = SpatialAccumulator::new(0.01);
/// let cloud: PointCloud = vec![Point::new(0.001, 0.0, 0.5), Point::new(0.002, 0.0, 0.5)]
///     .into_iter()
///     .collect();
/// accumulator.add_cloud(&cloud);
/// accumulator.add_cloud(&cloud);
/// assert_eq!(1, accumulator.accumulated_cloud().len());
/// ```
#[derive(Debug, Clone)]
pub struct SpatialAccumulator {
    octree: OccupancyOctree,
    frame_id: String,
    stamp: Timestamp,
}

impl SpatialAccumulator {
    pub fn new(resolution: f64) -> Self {
        Self {
            octree: OccupancyOctree::new(resolution),
            frame_id: String::new(),
            stamp: Timestamp::default(),
        }
    }

    pub fn resolution(&self) -> f64 {
        self.octree.resolution()
    }

    /// Inserts all finite points of `cloud`. The accumulated cloud takes over the header of the most recently
    /// added cloud
    pub fn add_cloud(&mut self, cloud: &PointCloud) {
        if !self.frame_id.is_empty() && self.frame_id != cloud.frame_id() {
            warn!(
                "Accumulating cloud in frame {} into clouds in frame {}",
                cloud.frame_id(),
                self.frame_id
            );
        }
        let before = self.octree.len();
        let mut dropped = 0;
        for point in cloud.iter() {
            if !self.octree.insert_point(point) {
                dropped += 1;
            }
        }
        if dropped > 0 {
            debug!("Dropped {} non-finite or out of range points", dropped);
        }
        debug!(
            "Accumulated {} new cells, {} in total",
            self.octree.len() - before,
            self.octree.len()
        );
        self.frame_id = cloud.frame_id().to_owned();
        self.stamp = cloud.stamp();
    }

    /// One point per occupied cell at the cell center, carrying the cell's color
    pub fn accumulated_cloud(&self) -> PointCloud {
        let points = self
            .octree
            .occupied_centers()
            .map(|(position, color)| Point { position, color })
            .collect();
        PointCloud::from_points(points, self.frame_id.as_str(), self.stamp)
    }

    pub fn color_at(&self, position: &Vector3<f64>) -> u32 {
        self.octree.color_at(position)
    }

    pub fn octree(&self) -> &OccupancyOctree {
        &self.octree
    }

    /// Discards all accumulated points
    pub fn reset(&mut self) {
        self.octree.clear();
        self.frame_id.clear();
        self.stamp = Timestamp::default();
    }

    /// Number of occupied cells
    pub fn len(&self) -> usize {
        self.octree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.octree.is_empty()
    }
}

impl Default for SpatialAccumulator {
    fn default() -> Self {
        Self::new(DEFAULT_OCTREE_RESOLUTION)
    }
}
