#![warn(clippy::all)]

//! Core data structures for table-top scene analysis
//!
//! This crate holds the data model shared by the segmentation and pose estimation stages: point clouds
//! with a sensor frame and timestamp ([containers]), a Morton-ordered sparse voxel map that backs the
//! occupancy index, and the geometric primitives produced along the way ([geometry]): support planes, 2D
//! footprint polygons, oriented bounding boxes and object poses.

pub extern crate nalgebra;
extern crate self as tabletop_core;

pub mod containers;
/// Planes, polygons, bounding boxes and poses
pub mod geometry;
/// Useful mathematical tools when working with point cloud data
pub mod math;
