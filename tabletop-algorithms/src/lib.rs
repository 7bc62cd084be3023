#![warn(clippy::all)]
//! Algorithms for table-top scene analysis.
//!
//! The crate finds the support surface in a point cloud, isolates the objects resting on it and estimates
//! their poses. [pipeline::SceneSegmentation] strings the individual stages together.

// Deduplicating accumulation of clouds from several observations in an occupancy octree.
pub mod accumulator;
// Euclidean clustering of the points above the support surface and the gates objects have to pass.
pub mod clustering;
// Parameter groups of all stages, with validation.
pub mod config;
pub mod error;
// Non-finite removal, pass-through, crop box and radius outlier filters.
pub mod filters;
// Normal and curvature estimation from radius neighbourhoods, optionally on a thread pool.
pub mod normal_estimation;
pub mod pipeline;
// Principal-axis pose estimation of object clusters and bounding boxes.
pub mod pose_estimation;
pub mod search;
// Axis-constrained RANSAC plane fit that can use surface normals, and the support surface built from it.
pub mod segmentation;
// Lookup of rigid transforms between frames with a bounded wait.
pub mod transform;
// Extraction of the prism above the footprint of the support surface.
pub mod volume;
pub mod voxel_grid;
