use kd_tree::{KdPoint, KdTree};
use tabletop_core::nalgebra::Vector3;

/// A position together with its index in the cloud it was taken from
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexedPosition {
    pub position: [f64; 3],
    pub index: usize,
}

impl KdPoint for IndexedPosition {
    type Scalar = f64;
    type Dim = typenum::U3;
    fn at(&self, k: usize) -> f64 {
        self.position[k]
    }
}

/// Spatial index over the positions of a point cloud, answering fixed-radius neighbourhood queries.
/// Non-finite positions are left out of the index and are never returned as neighbours
pub struct PointIndex {
    tree: Option<KdTree<IndexedPosition>>,
    len: usize,
}

impl PointIndex {
    pub fn build<I: IntoIterator<Item = Vector3<f64>>>(positions: I) -> Self {
        let items: Vec<IndexedPosition> = positions
            .into_iter()
            .enumerate()
            .filter(|(_, p)| p.iter().all(|c| c.is_finite()))
            .map(|(index, p)| IndexedPosition {
                position: [p.x, p.y, p.z],
                index,
            })
            .collect();
        let len = items.len();
        let tree = if items.is_empty() {
            None
        } else {
            Some(KdTree::build_by_ordered_float(items))
        };
        Self { tree, len }
    }

    /// Number of indexed (finite) positions
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Indices of all positions within `radius` of `query` (including a position equal to `query`), in
    /// ascending order
    pub fn radius_search(&self, query: &Vector3<f64>, radius: f64) -> Vec<usize> {
        let tree = match &self.tree {
            Some(tree) => tree,
            None => return vec![],
        };
        let query = IndexedPosition {
            position: [query.x, query.y, query.z],
            index: usize::MAX,
        };
        let mut indices: Vec<usize> = tree
            .within_radius(&query, radius)
            .into_iter()
            .map(|item| item.index)
            .collect();
        indices.sort_unstable();
        indices
    }
}
