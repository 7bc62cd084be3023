//! Point filters of the segmentation pre-processing chain. Every filter takes a cloud by reference and
//! returns a new cloud with the same header. Non-finite points never survive a filter.

use tabletop_core::{containers::PointCloud, math::AABB, nalgebra::Point3};

use crate::{config::FieldName, search::PointIndex};

/// Removes all points with a NaN or infinite coordinate
pub fn remove_non_finite(cloud: &PointCloud) -> PointCloud {
    cloud.filter(|p| p.is_finite())
}

/// Keeps the points whose coordinate along `field` lies in `[min, max]`
/// ```
/// # use tabletop_core::containers::*;
/// # use tabletop_algorithms::{config::FieldName, filters::passthrough};
/// let cloud: PointCloud = (0..10).map(|i| Point::new(0.0, 0.0, i as f64 * 0.1)).collect();
/// let kept = passthrough(&cloud, FieldName::Z, 0.2, 0.5);
/// assert_eq!(4, kept.len());
/// ```
pub fn passthrough(cloud: &PointCloud, field: FieldName, min: f64, max: f64) -> PointCloud {
    cloud.filter(|p| {
        let value = field.value(&p.position);
        p.is_finite() && value >= min && value <= max
    })
}

/// Keeps the points inside `bounds`, boundary included
pub fn crop_box(cloud: &PointCloud, bounds: &AABB<f64>) -> PointCloud {
    cloud.filter(|p| p.is_finite() && bounds.contains(&Point3::from(p.position)))
}

/// Removes points that have fewer than `min_neighbors` other points within `radius`
pub fn radius_outlier_removal(cloud: &PointCloud, radius: f64, min_neighbors: usize) -> PointCloud {
    let index = PointIndex::build(cloud.positions());
    let keep: Vec<usize> = cloud
        .iter()
        .enumerate()
        .filter(|(_, p)| p.is_finite())
        .filter(|(_, p)| {
            let neighbours = index.radius_search(&p.position, radius).len();
            // the point finds itself
            neighbours > min_neighbors
        })
        .map(|(i, _)| i)
        .collect();
    cloud.select(&keep)
}
