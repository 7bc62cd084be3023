//! In-memory point cloud containers.
//!
//! A [`PointCloud`] is an ordered sequence of [`Point`]s that share one sensor reference frame and one
//! capture [`Timestamp`]. Processing stages take a cloud by reference and hand out a new, owned cloud,
//! so a cloud is only ever mutated by the stage that produced it.
//!
//! [`VoxelMap`] is the sparse, voxel-keyed map underneath the occupancy index. Its keys are the integer
//! cell coordinates of a world position at a fixed resolution, stored as Morton indices so that iteration
//! follows the octree order of the grid.

mod point;
pub use self::point::*;

mod point_cloud;
pub use self::point_cloud::*;

mod voxel_map;
pub use self::voxel_map::*;
