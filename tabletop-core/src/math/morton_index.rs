use std::fmt::Display;

use super::{compact_bits_by_3, expand_bits_by_3};

/// 64-bit 3D Morton index. Sorting by Morton index visits the cells of a regular grid in the
/// depth-first order of the octree built over that grid
#[derive(Debug, PartialEq, Eq, Copy, Clone, PartialOrd, Hash, Default)]
pub struct MortonIndex64 {
    index: u64,
}

impl MortonIndex64 {
    pub const LEVELS: usize = 21;

    /// Largest grid coordinate that can be encoded along one axis
    pub const MAX_GRID_INDEX: u64 = (1_u64 << Self::LEVELS) - 1;

    /// Creates a `MortonIndex64` from the given raw index
    ///
    /// Example:
    /// ```
    /// # use tabletop_core::math::*;
    /// let morton_index = MortonIndex64::from_raw(1234);
    /// assert_eq!(1234, morton_index.index());
    /// ```
    pub fn from_raw(index: u64) -> Self {
        Self { index }
    }

    /// Interleaves the given grid coordinates into a `MortonIndex64`. Octant order is ZYX little-endian
    /// (MSB encodes Z, LSB encodes X). Returns `None` if any coordinate exceeds [MortonIndex64::MAX_GRID_INDEX]
    ///
    /// Example:
    /// ```
    /// # use tabletop_core::math::*;
    /// let morton_index = MortonIndex64::from_grid_index(1, 0, 1).unwrap();
    /// assert_eq!(0b101, morton_index.index());
    /// assert_eq!((1, 0, 1), morton_index.grid_index());
    /// assert!(MortonIndex64::from_grid_index(1 << 21, 0, 0).is_none());
    /// ```
    pub fn from_grid_index(x: u64, y: u64, z: u64) -> Option<Self> {
        if x > Self::MAX_GRID_INDEX || y > Self::MAX_GRID_INDEX || z > Self::MAX_GRID_INDEX {
            return None;
        }
        let index = (expand_bits_by_3(z) << 2) | (expand_bits_by_3(y) << 1) | expand_bits_by_3(x);
        Some(Self { index })
    }

    /// Returns the grid coordinates encoded in this `MortonIndex64`
    pub fn grid_index(&self) -> (u64, u64, u64) {
        (
            compact_bits_by_3(self.index),
            compact_bits_by_3(self.index >> 1),
            compact_bits_by_3(self.index >> 2),
        )
    }

    /// Returns the raw value of the associated `MortonIndex64`
    pub fn index(&self) -> u64 {
        self.index
    }
}

impl Ord for MortonIndex64 {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.index.cmp(&other.index)
    }
}

impl Display for MortonIndex64 {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(fmt, "{:#066b}", self.index)
    }
}
