use log::{debug, info, warn};
use tabletop_core::{
    containers::{Point, PointCloud, Timestamp},
    geometry::{BoundingBox, ObjectPose, PlaneModel},
    math::AABB,
    nalgebra::{Point3, Vector3},
};

use crate::{
    accumulator::{SpatialAccumulator, DEFAULT_OCTREE_RESOLUTION},
    clustering::{ClusterCandidate, ClusterExtractor},
    config::{
        ClusterParams, CropBoxParams, NormalParams, OutlierParams, PassthroughParams, PlaneFitParams,
        PrismParams, SegmentationConfig, VoxelGridParams,
    },
    error::{SegmentationError, SegmentationResult},
    filters::{crop_box, passthrough, radius_outlier_removal, remove_non_finite},
    normal_estimation::compute_normals,
    pose_estimation::estimate_pose_from_box,
    search::PointIndex,
    segmentation::{PlaneFinder, SupportSurface},
    volume::extract_polygonal_prism,
    voxel_grid::voxelgrid_filter,
};

/// Name of an object that has not been recognized yet
pub const UNKNOWN_OBJECT_NAME: &str = "unknown";

/// Post-processing of the cluster points of each object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SegmentOptions {
    /// Subtract the cluster centroid from every cluster point
    pub center: bool,
    /// Append points at the origin until the cluster has this many points. Larger clusters are kept whole
    pub pad_to: Option<usize>,
}

/// An object found on the support surface. The identity is unknown until a recognizer labels it
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentedObject {
    /// Per-run id, see [SceneSegmentation::reset_object_id]
    pub id: u64,
    pub name: String,
    pub probability: f64,
    pub frame_id: String,
    pub stamp: Timestamp,
    pub bounding_box: BoundingBox,
    /// The cluster points, centered and padded according to [SegmentOptions]
    pub cluster: PointCloud,
    /// Pose derived from the bounding box
    pub pose: ObjectPose,
}

/// Result of a plane-only pass
#[derive(Debug, Clone, PartialEq)]
pub struct PlaneDetection {
    pub model: PlaneModel,
    pub surface: SupportSurface,
    /// The plane inliers of the pre-processed cloud
    pub inliers: PointCloud,
}

/// Output of the stages up to and including the plane fit
struct PlaneStage {
    filtered: PointCloud,
    surface: SupportSurface,
    inliers: Vec<usize>,
}

/// Table-top segmentation of point clouds.
///
/// A pass runs the following stages on a copy of the current configuration:
/// 1. removal of non-finite points and voxel grid downsampling
/// 2. pass-through and crop box filters (if enabled)
/// 3. normal estimation and the plane fit of the support surface
/// 4. radius outlier removal on the points off the plane
/// 5. extraction of the prism above the plane footprint
/// 6. clustering and construction of the object list
///
/// Changing the configuration only affects the next pass. Apart from the configuration, the segmentation
/// keeps the object id counter, the state of the cloud accumulation and the results of the last plane fit
/// (normal, workspace height and the inlier cloud for debugging).
#[derive(Debug, Clone)]
pub struct SceneSegmentation {
    config: SegmentationConfig,
    next_object_id: u64,
    accumulator: SpatialAccumulator,
    plane_normal: Option<Vector3<f64>>,
    workspace_height: Option<f64>,
    debug_cloud: PointCloud,
}

impl Default for SceneSegmentation {
    fn default() -> Self {
        Self::new(SegmentationConfig::default())
    }
}

impl SceneSegmentation {
    pub fn new(config: SegmentationConfig) -> Self {
        Self::with_octree_resolution(config, DEFAULT_OCTREE_RESOLUTION)
    }

    /// # Panics
    ///
    /// If `resolution` is not finite and positive
    pub fn with_octree_resolution(config: SegmentationConfig, resolution: f64) -> Self {
        Self {
            config,
            next_object_id: 0,
            accumulator: SpatialAccumulator::new(resolution),
            plane_normal: None,
            workspace_height: None,
            debug_cloud: PointCloud::default(),
        }
    }

    pub fn config(&self) -> &SegmentationConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: SegmentationConfig) {
        self.config = config;
    }

    pub fn set_voxel_grid_params(&mut self, params: VoxelGridParams) {
        self.config.voxel_grid = params;
    }

    pub fn set_passthrough_params(&mut self, params: PassthroughParams) {
        self.config.passthrough = params;
    }

    pub fn set_crop_box_params(&mut self, params: CropBoxParams) {
        self.config.crop_box = params;
    }

    pub fn set_normal_params(&mut self, params: NormalParams) {
        self.config.normals = params;
    }

    pub fn set_plane_params(&mut self, params: PlaneFitParams) {
        self.config.plane = params;
    }

    pub fn set_prism_params(&mut self, params: PrismParams) {
        self.config.prism = params;
    }

    pub fn set_outlier_params(&mut self, params: OutlierParams) {
        self.config.outlier = params;
    }

    pub fn set_cluster_params(&mut self, params: ClusterParams) {
        self.config.cluster = params;
    }

    /// Restarts the object ids at 0
    pub fn reset_object_id(&mut self) {
        self.next_object_id = 0;
    }

    /// Normal of the last plane found, oriented along the expected axis
    pub fn plane_normal(&self) -> Option<Vector3<f64>> {
        self.plane_normal
    }

    /// Mean height of the footprint of the last plane found
    pub fn workspace_height(&self) -> Option<f64> {
        self.workspace_height
    }

    /// Plane inliers of the last pass
    pub fn debug_cloud(&self) -> &PointCloud {
        &self.debug_cloud
    }

    pub fn add_cloud_accumulation(&mut self, cloud: &PointCloud) {
        self.accumulator.add_cloud(cloud);
    }

    pub fn cloud_accumulation(&self) -> PointCloud {
        self.accumulator.accumulated_cloud()
    }

    pub fn reset_cloud_accumulation(&mut self) {
        self.accumulator.reset();
    }

    pub fn accumulator(&self) -> &SpatialAccumulator {
        &self.accumulator
    }

    /// Segments `cloud` into objects. Every failure of the pass is logged and results in an empty list
    pub fn segment_cloud(&mut self, cloud: &PointCloud, options: SegmentOptions) -> Vec<SegmentedObject> {
        match self.try_segment_cloud(cloud, options) {
            Ok(objects) => objects,
            Err(SegmentationError::NoClusters) => {
                debug!("No objects on the support surface");
                vec![]
            }
            Err(e) => {
                warn!("Segmentation failed: {}", e);
                vec![]
            }
        }
    }

    /// Segments the accumulated cloud, see [segment_cloud](SceneSegmentation::segment_cloud)
    pub fn segment_accumulated_cloud(&mut self, options: SegmentOptions) -> Vec<SegmentedObject> {
        let accumulated = self.cloud_accumulation();
        self.segment_cloud(&accumulated, options)
    }

    /// Like [segment_cloud](SceneSegmentation::segment_cloud), but reports why a pass came back empty
    pub fn try_segment_cloud(
        &mut self,
        cloud: &PointCloud,
        options: SegmentOptions,
    ) -> SegmentationResult<Vec<SegmentedObject>> {
        let config = self.config.clone();
        let PlaneStage {
            filtered,
            surface,
            inliers,
        } = self.plane_stage(cloud, &config)?;

        let mut is_inlier = vec![false; filtered.len()];
        for &i in &inliers {
            is_inlier[i] = true;
        }
        let off_plane: Vec<usize> = (0..filtered.len()).filter(|&i| !is_inlier[i]).collect();
        let off_plane = non_empty(filtered.select(&off_plane), "plane removal")?;
        let cleaned = non_empty(
            radius_outlier_removal(&off_plane, config.outlier.radius, config.outlier.min_neighbors),
            "outlier removal",
        )?;
        let volume = non_empty(
            extract_polygonal_prism(
                &cleaned,
                &surface,
                config.prism.min_height,
                config.prism.max_height,
            ),
            "prism extraction",
        )?;

        let clusters =
            ClusterExtractor::new(config.cluster.clone(), config.oriented_boxes).extract(&volume, &surface);
        if clusters.is_empty() {
            return Err(SegmentationError::NoClusters);
        }

        let mut objects = Vec::with_capacity(clusters.len());
        for cluster in clusters {
            match self.make_object(cluster, options) {
                Ok(object) => objects.push(object),
                Err(e) => warn!("Skipping cluster: {}", e),
            }
        }
        info!("Segmented {} objects", objects.len());
        Ok(objects)
    }

    /// Finds the support plane of `cloud` without looking for objects. Failures are logged and result in
    /// `None`
    pub fn find_plane(&mut self, cloud: &PointCloud) -> Option<PlaneDetection> {
        match self.try_find_plane(cloud) {
            Ok(detection) => Some(detection),
            Err(e) => {
                warn!("Plane detection failed: {}", e);
                None
            }
        }
    }

    pub fn try_find_plane(&mut self, cloud: &PointCloud) -> SegmentationResult<PlaneDetection> {
        let config = self.config.clone();
        let PlaneStage {
            filtered,
            surface,
            inliers,
        } = self.plane_stage(cloud, &config)?;
        Ok(PlaneDetection {
            model: *surface.model(),
            surface,
            inliers: filtered.select(&inliers),
        })
    }

    fn plane_stage(&mut self, cloud: &PointCloud, config: &SegmentationConfig) -> SegmentationResult<PlaneStage> {
        self.debug_cloud = cloud.empty_like();
        config
            .validate()
            .map_err(|e| SegmentationError::InvalidConfig(e.to_string()))?;
        let filtered = preprocess(cloud, config)?;

        let index = PointIndex::build(filtered.positions());
        let normals = compute_normals(&filtered, &index, &config.normals);
        let fit = PlaneFinder::new(config.plane.clone()).find(&filtered, Some(&normals))?;
        let surface = SupportSurface::from_fit(&fit, &filtered);
        debug!(
            "Plane {:?} with {} of {} points",
            fit.model.coefficients(),
            fit.inliers.len(),
            filtered.len()
        );

        self.plane_normal = Some(*fit.model.normal());
        self.workspace_height = surface.workspace_height();
        self.debug_cloud = filtered.select(&fit.inliers);
        Ok(PlaneStage {
            filtered,
            surface,
            inliers: fit.inliers,
        })
    }

    fn make_object(&mut self, candidate: ClusterCandidate, options: SegmentOptions) -> SegmentationResult<SegmentedObject> {
        let ClusterCandidate {
            mut cloud,
            centroid,
            bounding_box,
            ..
        } = candidate;
        let pose = estimate_pose_from_box(&bounding_box, cloud.stamp())?;

        if options.center {
            for point in cloud.points_mut() {
                point.position -= centroid;
            }
        }
        if let Some(count) = options.pad_to {
            while cloud.len() < count {
                cloud.push(Point::new(0.0, 0.0, 0.0));
            }
        }

        let id = self.next_object_id;
        self.next_object_id += 1;
        Ok(SegmentedObject {
            id,
            name: UNKNOWN_OBJECT_NAME.to_owned(),
            probability: 0.0,
            frame_id: cloud.frame_id().to_owned(),
            stamp: cloud.stamp(),
            bounding_box,
            cluster: cloud,
            pose,
        })
    }
}

fn non_empty(cloud: PointCloud, stage: &'static str) -> SegmentationResult<PointCloud> {
    if cloud.is_empty() {
        return Err(SegmentationError::EmptyCloud { stage });
    }
    debug!("{} points after {}", cloud.len(), stage);
    Ok(cloud)
}

/// The filter chain in front of the plane fit
fn preprocess(cloud: &PointCloud, config: &SegmentationConfig) -> SegmentationResult<PointCloud> {
    let mut filtered = non_empty(remove_non_finite(cloud), "non-finite removal")?;
    filtered = non_empty(voxelgrid_filter(&filtered, &config.voxel_grid), "voxel grid")?;
    let params = &config.passthrough;
    if params.enabled {
        filtered = non_empty(
            passthrough(&filtered, params.field, params.limit_min, params.limit_max),
            "pass-through",
        )?;
    }
    let params = &config.crop_box;
    if params.enabled {
        let bounds = AABB::from_min_max_unchecked(Point3::from(params.min), Point3::from(params.max));
        filtered = non_empty(crop_box(&filtered, &bounds), "crop box")?;
    }
    Ok(filtered)
}
