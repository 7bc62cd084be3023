//! Tunable parameters of the segmentation and pose estimation stages.
//!
//! Every group is a plain value with a [Default] that matches the parameters the table-top segmentation
//! was tuned with. [SegmentationConfig] bundles all groups; the pipeline clones it at the start of every
//! pass, so changing a group only affects the next pass.

use std::{fmt::Display, str::FromStr};

use anyhow::{bail, Result};
use tabletop_core::nalgebra::Vector3;

/// One of the three coordinate axes, used to name the field that an axis-range filter acts on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FieldName {
    X,
    Y,
    Z,
}

impl FieldName {
    /// The coordinate of `position` along this axis
    pub fn value(&self, position: &Vector3<f64>) -> f64 {
        match self {
            FieldName::X => position.x,
            FieldName::Y => position.y,
            FieldName::Z => position.z,
        }
    }
}

impl FromStr for FieldName {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "x" | "X" => Ok(FieldName::X),
            "y" | "Y" => Ok(FieldName::Y),
            "z" | "Z" => Ok(FieldName::Z),
            other => bail!("Unknown filter field name '{}', expected one of x, y, z", other),
        }
    }
}

impl Display for FieldName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FieldName::X => "x",
            FieldName::Y => "y",
            FieldName::Z => "z",
        };
        write!(f, "{}", name)
    }
}

fn check_range(group: &str, min: f64, max: f64) -> Result<()> {
    if !(min.is_finite() && max.is_finite()) {
        bail!("{}: limits must be finite, got [{}, {}]", group, min, max);
    }
    if min > max {
        bail!("{}: minimum {} is greater than maximum {}", group, min, max);
    }
    Ok(())
}

fn check_positive(group: &str, name: &str, value: f64) -> Result<()> {
    if !(value.is_finite() && value > 0.0) {
        bail!("{}: {} must be finite and positive, got {}", group, name, value);
    }
    Ok(())
}

/// Voxel grid downsampling together with its single axis-range filter
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VoxelGridParams {
    pub leaf_size: f64,
    pub filter_field: FieldName,
    pub filter_limit_min: f64,
    pub filter_limit_max: f64,
}

impl Default for VoxelGridParams {
    fn default() -> Self {
        Self {
            leaf_size: 0.009,
            filter_field: FieldName::Z,
            filter_limit_min: -0.15,
            filter_limit_max: 0.3,
        }
    }
}

impl VoxelGridParams {
    pub fn validate(&self) -> Result<()> {
        check_positive("voxel grid", "leaf size", self.leaf_size)?;
        check_range("voxel grid", self.filter_limit_min, self.filter_limit_max)
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PassthroughParams {
    pub enabled: bool,
    pub field: FieldName,
    pub limit_min: f64,
    pub limit_max: f64,
}

impl Default for PassthroughParams {
    fn default() -> Self {
        Self {
            enabled: false,
            field: FieldName::X,
            limit_min: 0.0,
            limit_max: 0.8,
        }
    }
}

impl PassthroughParams {
    pub fn validate(&self) -> Result<()> {
        check_range("passthrough", self.limit_min, self.limit_max)
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CropBoxParams {
    pub enabled: bool,
    pub min: Vector3<f64>,
    pub max: Vector3<f64>,
}

impl Default for CropBoxParams {
    fn default() -> Self {
        Self {
            enabled: false,
            min: Vector3::new(0.0, -0.5, -0.5),
            max: Vector3::new(1.0, 0.5, 0.5),
        }
    }
}

impl CropBoxParams {
    pub fn validate(&self) -> Result<()> {
        check_range("crop box x", self.min.x, self.max.x)?;
        check_range("crop box y", self.min.y, self.max.y)?;
        check_range("crop box z", self.min.z, self.max.z)
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NormalParams {
    /// Neighbourhood radius of the covariance estimate
    pub radius: f64,
    /// Estimate normals on a dedicated thread pool of `workers` threads
    pub use_parallel: bool,
    pub workers: usize,
}

impl Default for NormalParams {
    fn default() -> Self {
        Self {
            radius: 0.03,
            use_parallel: false,
            workers: 4,
        }
    }
}

impl NormalParams {
    pub fn validate(&self) -> Result<()> {
        check_positive("normal estimation", "radius", self.radius)?;
        if self.use_parallel && self.workers == 0 {
            bail!("normal estimation: parallel estimation needs at least one worker");
        }
        Ok(())
    }
}

/// Parameters of the normal-weighted, axis-constrained RANSAC plane fit
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PlaneFitParams {
    pub max_iterations: usize,
    pub distance_threshold: f64,
    /// Re-fit the coefficients to all inliers by least squares
    pub optimize_coefficients: bool,
    /// Expected direction of the plane normal
    pub axis: Vector3<f64>,
    /// Largest accepted angle (radians) between `axis` and the plane normal
    pub eps_angle: f64,
    /// Blend between angular (1) and euclidean (0) point-to-plane distance
    pub normal_distance_weight: f64,
    pub seed: u64,
}

impl Default for PlaneFitParams {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            distance_threshold: 0.01,
            optimize_coefficients: true,
            axis: Vector3::z(),
            eps_angle: 0.09,
            normal_distance_weight: 0.05,
            seed: 0,
        }
    }
}

impl PlaneFitParams {
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            bail!("plane fit: at least one iteration is required");
        }
        check_positive("plane fit", "distance threshold", self.distance_threshold)?;
        if !(self.eps_angle.is_finite() && self.eps_angle >= 0.0) {
            bail!("plane fit: eps angle must be finite and non-negative, got {}", self.eps_angle);
        }
        if !(0.0..=1.0).contains(&self.normal_distance_weight) {
            bail!(
                "plane fit: normal distance weight must be in [0, 1], got {}",
                self.normal_distance_weight
            );
        }
        if !self.axis.iter().all(|c| c.is_finite()) || self.axis.norm() < 1e-9 {
            bail!("plane fit: axis must be a finite, non-zero vector");
        }
        Ok(())
    }
}

/// Height band above the support plane that is searched for objects
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PrismParams {
    pub min_height: f64,
    pub max_height: f64,
}

impl Default for PrismParams {
    fn default() -> Self {
        Self {
            min_height: 0.01,
            max_height: 0.1,
        }
    }
}

impl PrismParams {
    pub fn validate(&self) -> Result<()> {
        check_range("prism", self.min_height, self.max_height)
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OutlierParams {
    pub radius: f64,
    pub min_neighbors: usize,
}

impl Default for OutlierParams {
    fn default() -> Self {
        Self {
            radius: 0.03,
            min_neighbors: 20,
        }
    }
}

impl OutlierParams {
    pub fn validate(&self) -> Result<()> {
        check_positive("outlier removal", "radius", self.radius)
    }
}

/// Gates that a connected component has to pass to become an object
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClusterParams {
    /// Largest gap between two neighbouring points of the same cluster
    pub tolerance: f64,
    pub min_size: usize,
    pub max_size: usize,
    pub min_height: f64,
    pub max_height: f64,
    /// Largest horizontal extent of a cluster
    pub max_length: f64,
    /// Smallest distance of the cluster centroid from the boundary of the plane polygon
    pub min_distance_to_polygon: f64,
}

impl Default for ClusterParams {
    fn default() -> Self {
        Self {
            tolerance: 0.02,
            min_size: 25,
            max_size: 20000,
            min_height: 0.011,
            max_height: 0.09,
            max_length: 0.15,
            min_distance_to_polygon: 0.04,
        }
    }
}

impl ClusterParams {
    pub fn validate(&self) -> Result<()> {
        check_positive("clustering", "tolerance", self.tolerance)?;
        if self.min_size > self.max_size {
            bail!(
                "clustering: min size {} is greater than max size {}",
                self.min_size,
                self.max_size
            );
        }
        check_range("cluster height", self.min_height, self.max_height)?;
        check_positive("clustering", "max length", self.max_length)?;
        if !self.min_distance_to_polygon.is_finite() {
            bail!("clustering: min distance to polygon must be finite");
        }
        Ok(())
    }
}

/// Snapshot of all parameters of one segmentation pass
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SegmentationConfig {
    pub voxel_grid: VoxelGridParams,
    pub passthrough: PassthroughParams,
    pub crop_box: CropBoxParams,
    pub normals: NormalParams,
    pub plane: PlaneFitParams,
    pub prism: PrismParams,
    pub outlier: OutlierParams,
    pub cluster: ClusterParams,
    /// Fit minimum-area boxes to the clusters instead of boxes aligned with the plane frame
    pub oriented_boxes: bool,
}

impl SegmentationConfig {
    /// Checks every parameter group
    /// ```
    /// # use tabletop_algorithms::config::SegmentationConfig;
    /// let mut config = SegmentationConfig::default();
    /// assert!(config.validate().is_ok());
    /// config.voxel_grid.leaf_size = -1.0;
    /// assert!(config.validate().is_err());
    /// ```
    pub fn validate(&self) -> Result<()> {
        self.voxel_grid.validate()?;
        self.passthrough.validate()?;
        self.crop_box.validate()?;
        self.normals.validate()?;
        self.plane.validate()?;
        self.prism.validate()?;
        self.outlier.validate()?;
        self.cluster.validate()
    }
}

/// Coarse object class supplied by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ObjectCategory {
    Atwork,
    Cavity,
    Other,
}

impl From<&str> for ObjectCategory {
    fn from(name: &str) -> Self {
        match name {
            "atwork" => ObjectCategory::Atwork,
            "cavity" => ObjectCategory::Cavity,
            _ => ObjectCategory::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ObjectShape {
    Sphere,
    Flat,
    Other,
}

impl From<&str> for ObjectShape {
    fn from(name: &str) -> Self {
        match name {
            "sphere" => ObjectShape::Sphere,
            "flat" => ObjectShape::Flat,
            _ => ObjectShape::Other,
        }
    }
}

/// What the caller knows about an object before its pose is estimated
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ObjectHints {
    pub name: String,
    pub category: ObjectCategory,
    pub shape: ObjectShape,
}

impl ObjectHints {
    pub fn new<S: Into<String>>(name: S, category: ObjectCategory, shape: ObjectShape) -> Self {
        Self {
            name: name.into(),
            category,
            shape,
        }
    }
}

impl Default for ObjectHints {
    fn default() -> Self {
        Self::new("unknown", ObjectCategory::Atwork, ObjectShape::Other)
    }
}

/// How the points of a cluster are filtered by height before its orientation is estimated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum HeightFilterPolicy {
    /// Keep points within `[min_z + min_offset, max_z + max_offset]`
    Default,
    /// Keep points up to `max_z - cavity_top_offset`, then flatten them
    Cavity,
    /// Like [Cavity](HeightFilterPolicy::Cavity) with `deep_cavity_top_offset`
    DeepCavity,
    /// Use all points
    SkipHeightFilter,
}

/// Empirical constants of the pose estimation stage
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PoseEstimationConfig {
    pub passthrough_min_offset: f64,
    pub passthrough_max_offset: f64,
    pub cavity_top_offset: f64,
    pub deep_cavity_top_offset: f64,
    /// Height that the points of a cavity are flattened to
    pub cavity_flatten_height: f64,
    /// Objects that are already well-conditioned without height filtering
    pub skip_filter_names: Vec<String>,
    /// Cavities that need the larger top offset
    pub deep_cavity_names: Vec<String>,
}

impl Default for PoseEstimationConfig {
    fn default() -> Self {
        Self {
            passthrough_min_offset: 0.01,
            passthrough_max_offset: 0.0,
            cavity_top_offset: 0.015,
            deep_cavity_top_offset: 0.02,
            cavity_flatten_height: 0.015,
            skip_filter_names: vec!["M20".into(), "M30".into(), "F20_20_G".into()],
            deep_cavity_names: vec!["M20_H".into()],
        }
    }
}

impl PoseEstimationConfig {
    /// Picks the height filter for an object
    /// ```
    /// # use tabletop_algorithms::config::*;
    /// let config = PoseEstimationConfig::default();
    /// let ball = ObjectHints::new("ball", ObjectCategory::Atwork, ObjectShape::Sphere);
    /// assert_eq!(HeightFilterPolicy::SkipHeightFilter, config.policy_for(&ball));
    /// let container = ObjectHints::new("M20_H", ObjectCategory::Cavity, ObjectShape::Other);
    /// assert_eq!(HeightFilterPolicy::DeepCavity, config.policy_for(&container));
    /// ```
    pub fn policy_for(&self, hints: &ObjectHints) -> HeightFilterPolicy {
        let is_listed = |names: &[String]| names.iter().any(|name| *name == hints.name);
        match hints.category {
            ObjectCategory::Atwork
                if matches!(hints.shape, ObjectShape::Sphere | ObjectShape::Flat) =>
            {
                HeightFilterPolicy::SkipHeightFilter
            }
            ObjectCategory::Cavity if is_listed(&self.deep_cavity_names) => {
                HeightFilterPolicy::DeepCavity
            }
            ObjectCategory::Cavity => HeightFilterPolicy::Cavity,
            _ if is_listed(&self.skip_filter_names) => HeightFilterPolicy::SkipHeightFilter,
            _ => HeightFilterPolicy::Default,
        }
    }
}
