use std::collections::BTreeMap;

use nalgebra::Vector3;

use crate::math::MortonIndex64;

/// Integer coordinates of a cubic grid cell. The cell with key `(x, y, z)` at resolution `r` covers
/// `[x*r, (x+1)*r) x [y*r, (y+1)*r) x [z*r, (z+1)*r)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VoxelKey {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl VoxelKey {
    /// Offset that maps signed cell coordinates onto the unsigned 21-bit range of a [MortonIndex64]
    const BIAS: i64 = 1 << (MortonIndex64::LEVELS - 1);

    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Computes the key of the cell containing `position`. Returns `None` if `position` is not finite or
    /// lies outside the range of cells that a [MortonIndex64] can address
    /// ```
    /// # use tabletop_core::containers::VoxelKey;
    /// # use tabletop_core::nalgebra::Vector3;
    /// let key = VoxelKey::from_position(&Vector3::new(0.25, -0.25, 1.0), 0.5).unwrap();
    /// assert_eq!(VoxelKey::new(0, -1, 2), key);
    /// assert!(VoxelKey::from_position(&Vector3::new(f64::NAN, 0.0, 0.0), 0.5).is_none());
    /// ```
    pub fn from_position(position: &Vector3<f64>, resolution: f64) -> Option<Self> {
        let cell = |value: f64| -> Option<i32> {
            if !value.is_finite() {
                return None;
            }
            let index = (value / resolution).floor();
            if index < -(Self::BIAS as f64) || index >= Self::BIAS as f64 {
                return None;
            }
            Some(index as i32)
        };
        Some(Self {
            x: cell(position.x)?,
            y: cell(position.y)?,
            z: cell(position.z)?,
        })
    }

    /// Center of this cell in world coordinates
    pub fn center(&self, resolution: f64) -> Vector3<f64> {
        Vector3::new(
            (self.x as f64 + 0.5) * resolution,
            (self.y as f64 + 0.5) * resolution,
            (self.z as f64 + 0.5) * resolution,
        )
    }

    fn morton_index(&self) -> MortonIndex64 {
        let biased = |v: i32| (v as i64 + Self::BIAS) as u64;
        // `from_position` and `from_morton_index` only ever produce keys inside the biased range
        MortonIndex64::from_grid_index(biased(self.x), biased(self.y), biased(self.z))
            .unwrap_or_default()
    }

    fn from_morton_index(index: &MortonIndex64) -> Self {
        let (x, y, z) = index.grid_index();
        let unbiased = |v: u64| (v as i64 - Self::BIAS) as i32;
        Self {
            x: unbiased(x),
            y: unbiased(y),
            z: unbiased(z),
        }
    }

    fn is_addressable(&self) -> bool {
        [self.x, self.y, self.z]
            .iter()
            .all(|&v| (v as i64) >= -Self::BIAS && (v as i64) < Self::BIAS)
    }
}

/// Sparse map from grid cells of a fixed `resolution` to one value per cell.
///
/// Cells are stored by their Morton index, so [iter](VoxelMap::iter) visits them in the depth-first
/// order of the octree over the grid. The order is deterministic for a given set of cells regardless of
/// insertion order.
/// ```
/// # use tabletop_core::containers::VoxelMap;
/// # use tabletop_core::nalgebra::Vector3;
/// let mut map = VoxelMap::new(0.1);
/// map.insert_at(&Vector3::new(0.01, 0.01, 0.01), "a");
/// map.insert_at(&Vector3::new(0.02, 0.05, 0.09), "b");
/// map.insert_at(&Vector3::new(0.51, 0.01, 0.01), "c");
/// assert_eq!(2, map.len());
/// assert_eq!(Some(&"b"), map.get_at(&Vector3::new(0.0, 0.0, 0.0)));
/// ```
#[derive(Debug, Clone)]
pub struct VoxelMap<V> {
    resolution: f64,
    cells: BTreeMap<MortonIndex64, V>,
}

impl<V> VoxelMap<V> {
    /// Creates an empty map.
    ///
    /// # Panics
    ///
    /// If `resolution` is not a finite, positive number
    pub fn new(resolution: f64) -> Self {
        if !(resolution.is_finite() && resolution > 0.0) {
            panic!(
                "VoxelMap::new: resolution must be finite and positive, got {}",
                resolution
            );
        }
        Self {
            resolution,
            cells: BTreeMap::new(),
        }
    }

    pub fn resolution(&self) -> f64 {
        self.resolution
    }

    /// Key of the cell that contains `position`, see [VoxelKey::from_position]
    pub fn key_at(&self, position: &Vector3<f64>) -> Option<VoxelKey> {
        VoxelKey::from_position(position, self.resolution)
    }

    /// Stores `value` for the cell `key` and returns the previous value of that cell. Keys outside the
    /// addressable range are rejected and `value` is handed back as `Err`
    pub fn insert(&mut self, key: VoxelKey, value: V) -> Result<Option<V>, V> {
        if !key.is_addressable() {
            return Err(value);
        }
        Ok(self.cells.insert(key.morton_index(), value))
    }

    /// Stores `value` for the cell containing `position`. Returns false (and drops `value`) if `position`
    /// is not finite or not addressable
    pub fn insert_at(&mut self, position: &Vector3<f64>, value: V) -> bool {
        match self.key_at(position) {
            Some(key) => self.insert(key, value).is_ok(),
            None => false,
        }
    }

    /// Returns the value of cell `key`, inserting the result of `default` first if the cell is empty
    pub fn get_or_insert_with<F: FnOnce() -> V>(&mut self, key: VoxelKey, default: F) -> Option<&mut V> {
        if !key.is_addressable() {
            return None;
        }
        Some(self.cells.entry(key.morton_index()).or_insert_with(default))
    }

    pub fn get(&self, key: &VoxelKey) -> Option<&V> {
        if !key.is_addressable() {
            return None;
        }
        self.cells.get(&key.morton_index())
    }

    /// Value of the cell containing `position`
    pub fn get_at(&self, position: &Vector3<f64>) -> Option<&V> {
        self.key_at(position).and_then(|key| self.get(&key))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn clear(&mut self) {
        self.cells.clear();
    }

    /// Iterates over all occupied cells in Morton order
    pub fn iter(&self) -> impl Iterator<Item = (VoxelKey, &V)> + '_ {
        self.cells
            .iter()
            .map(|(index, value)| (VoxelKey::from_morton_index(index), value))
    }

    /// Iterates over the centers of all occupied cells in Morton order
    pub fn centers(&self) -> impl Iterator<Item = (Vector3<f64>, &V)> + '_ {
        let resolution = self.resolution;
        self.iter().map(move |(key, value)| (key.center(resolution), value))
    }
}
