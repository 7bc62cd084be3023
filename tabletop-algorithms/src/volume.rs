use tabletop_core::{containers::PointCloud, nalgebra::Point2};

use crate::segmentation::SupportSurface;

/// Indices of the points of `cloud` inside the prism over the footprint of `surface`: their projection onto
/// the plane lies inside the footprint polygon and their signed height above the plane is within
/// `[min_height, max_height]`
pub fn prism_indices(
    cloud: &PointCloud,
    surface: &SupportSurface,
    min_height: f64,
    max_height: f64,
) -> Vec<usize> {
    let frame = surface.frame();
    cloud
        .iter()
        .enumerate()
        .filter(|(_, p)| p.is_finite())
        .filter(|(_, p)| {
            let local = frame.to_local(&p.position);
            local.z >= min_height
                && local.z <= max_height
                && surface.hull().contains(&Point2::new(local.x, local.y))
        })
        .map(|(i, _)| i)
        .collect()
}

/// Extracts the points of `cloud` in the height band `[min_height, max_height]` above the footprint of
/// `surface`, see [prism_indices]
pub fn extract_polygonal_prism(
    cloud: &PointCloud,
    surface: &SupportSurface,
    min_height: f64,
    max_height: f64,
) -> PointCloud {
    cloud.select(&prism_indices(cloud, surface, min_height, max_height))
}

#[cfg(test)]
mod tests {
    use tabletop_core::{
        containers::Point,
        geometry::{PlaneModel, Polygon2},
    };

    use super::*;

    fn square_table_at(height: f64) -> SupportSurface {
        let model = PlaneModel::from_coefficients(0.0, 0.0, 1.0, -height).unwrap();
        let hull = Polygon2::new(vec![
            Point2::new(-0.5, -0.5),
            Point2::new(0.5, -0.5),
            Point2::new(0.5, 0.5),
            Point2::new(-0.5, 0.5),
        ]);
        SupportSurface::from_parts(model, hull)
    }

    #[test]
    fn test_points_outside_the_footprint_are_excluded_at_any_height() {
        let surface = square_table_at(0.2);
        let cloud: PointCloud = vec![
            Point::new(0.0, 0.0, 0.25),
            Point::new(0.6, 0.0, 0.25),
            Point::new(0.0, -0.7, 0.25),
            Point::new(2.0, 2.0, 0.21),
            Point::new(0.6, 0.0, 0.21),
            Point::new(0.49, 0.49, 0.29),
        ]
        .into_iter()
        .collect();
        let volume = extract_polygonal_prism(&cloud, &surface, 0.0, 1.0);
        assert_eq!(2, volume.len());
        assert!(volume
            .iter()
            .all(|p| p.position.x.abs() < 0.5 && p.position.y.abs() < 0.5));
    }

    #[test]
    fn test_height_band_is_relative_to_the_plane() {
        let surface = square_table_at(-0.5);
        let cloud: PointCloud = vec![
            Point::new(0.0, 0.0, -0.5),
            Point::new(0.0, 0.0, -0.49),
            Point::new(0.0, 0.0, -0.45),
            Point::new(0.0, 0.0, -0.3),
            Point::new(0.0, 0.0, -0.7),
            Point::new(f64::NAN, 0.0, -0.45),
        ]
        .into_iter()
        .collect();
        assert_eq!(vec![1, 2], prism_indices(&cloud, &surface, 0.005, 0.1));
    }
}
