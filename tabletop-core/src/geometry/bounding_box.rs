use nalgebra::{Point2, Vector2, Vector3};

use super::{PlaneFrame, PlaneModel, Polygon2};

/// An oriented 3D box given by its eight corners.
///
/// The vertex order is fixed: vertices 0-3 form the bottom face (closest to the support plane) and
/// vertices 4-7 the top face, with vertex `i + 4` directly above vertex `i`. Edges 0→1 and 0→3 span the
/// two horizontal extents, edge 0→4 the vertical extent.
///
/// ```text
///     7-------6
///    /|      /|
///   4-------5 |
///   | 3-----|-2
///   |/      |/
///   0-------1
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BoundingBox {
    vertices: [Vector3<f64>; 8],
    center: Vector3<f64>,
    frame_id: String,
}

impl BoundingBox {
    /// Creates a box from eight vertices in the documented order. The center is the mean of all vertices
    pub fn from_vertices<S: Into<String>>(vertices: [Vector3<f64>; 8], frame_id: S) -> Self {
        let center = vertices.iter().sum::<Vector3<f64>>() / 8.0;
        Self {
            vertices,
            center,
            frame_id: frame_id.into(),
        }
    }

    /// Computes the box that is aligned with the plane frame of `normal` (see [PlaneFrame]): its vertical edge
    /// is parallel to `normal` and its horizontal edges follow the world x and y axes projected onto the plane.
    /// For `normal = +z` this is the world axis-aligned bounding box. Non-finite positions are ignored.
    ///
    /// Returns `None` if there are no finite positions or `normal` is degenerate
    /// ```
    /// # use tabletop_core::geometry::BoundingBox;
    /// # use tabletop_core::nalgebra::Vector3;
    /// let positions = vec![Vector3::new(0.0, 0.0, 0.0), Vector3::new(2.0, 1.0, 0.5)];
    /// let bbox = BoundingBox::axis_aligned(positions, &Vector3::z(), "base_link").unwrap();
    /// assert_eq!(Vector3::new(1.0, 0.5, 0.25), *bbox.center());
    /// assert_eq!(Vector3::new(2.0, 1.0, 0.5), bbox.dimensions());
    /// ```
    pub fn axis_aligned<I, S>(positions: I, normal: &Vector3<f64>, frame_id: S) -> Option<Self>
    where
        I: IntoIterator<Item = Vector3<f64>>,
        S: Into<String>,
    {
        let frame = PlaneFrame::new(&PlaneModel::from_normal_and_point(normal, &Vector3::zeros())?);
        let local = to_local_finite(&frame, positions);
        let (min, max) = local_extent(&local)?;
        let corners = [
            Point2::new(min.x, min.y),
            Point2::new(max.x, min.y),
            Point2::new(max.x, max.y),
            Point2::new(min.x, max.y),
        ];
        Some(Self::from_footprint(&frame, &corners, min.z, max.z, frame_id))
    }

    /// Computes the box with the smallest footprint area whose vertical edge is parallel to `normal`. The
    /// footprint is found by rotating calipers over the 2D convex hull of the positions projected onto the
    /// plane. Falls back to [axis_aligned](BoundingBox::axis_aligned) when the hull has fewer than three
    /// vertices. Non-finite positions are ignored
    pub fn oriented<I, S>(positions: I, normal: &Vector3<f64>, frame_id: S) -> Option<Self>
    where
        I: IntoIterator<Item = Vector3<f64>>,
        S: Into<String>,
    {
        let frame = PlaneFrame::new(&PlaneModel::from_normal_and_point(normal, &Vector3::zeros())?);
        let local = to_local_finite(&frame, positions);
        let (min, max) = local_extent(&local)?;
        let hull = Polygon2::convex_hull(
            &local
                .iter()
                .map(|p| Point2::new(p.x, p.y))
                .collect::<Vec<_>>(),
        );
        if hull.len() < 3 {
            let positions = local.iter().map(|p| frame.to_world(p)).collect::<Vec<_>>();
            return Self::axis_aligned(positions, normal, frame_id);
        }

        let mut best: Option<(f64, [Point2<f64>; 4])> = None;
        for (a, b) in hull.edges() {
            let edge: Vector2<f64> = b - a;
            let length = edge.norm();
            if length < 1e-12 {
                continue;
            }
            let along = edge / length;
            let across = Vector2::new(-along.y, along.x);
            let (mut min_along, mut max_along) = (f64::INFINITY, f64::NEG_INFINITY);
            let (mut min_across, mut max_across) = (f64::INFINITY, f64::NEG_INFINITY);
            for vertex in hull.vertices() {
                let s = vertex.coords.dot(&along);
                let t = vertex.coords.dot(&across);
                min_along = min_along.min(s);
                max_along = max_along.max(s);
                min_across = min_across.min(t);
                max_across = max_across.max(t);
            }
            let area = (max_along - min_along) * (max_across - min_across);
            if best.as_ref().map_or(true, |(best_area, _)| area < *best_area) {
                let corner = |s: f64, t: f64| Point2::from(along * s + across * t);
                best = Some((
                    area,
                    [
                        corner(min_along, min_across),
                        corner(max_along, min_across),
                        corner(max_along, max_across),
                        corner(min_along, max_across),
                    ],
                ));
            }
        }
        let (_, corners) = best?;
        Some(Self::from_footprint(&frame, &corners, min.z, max.z, frame_id))
    }

    fn from_footprint<S: Into<String>>(
        frame: &PlaneFrame,
        corners: &[Point2<f64>; 4],
        bottom: f64,
        top: f64,
        frame_id: S,
    ) -> Self {
        let vertex = |i: usize| {
            let corner = &corners[i % 4];
            let height = if i < 4 { bottom } else { top };
            frame.to_world(&Vector3::new(corner.x, corner.y, height))
        };
        let vertices = [
            vertex(0),
            vertex(1),
            vertex(2),
            vertex(3),
            vertex(4),
            vertex(5),
            vertex(6),
            vertex(7),
        ];
        Self::from_vertices(vertices, frame_id)
    }

    pub fn vertices(&self) -> &[Vector3<f64>; 8] {
        &self.vertices
    }

    pub fn center(&self) -> &Vector3<f64> {
        &self.center
    }

    pub fn frame_id(&self) -> &str {
        &self.frame_id
    }

    /// Lengths of the edges 0→1, 0→3 and 0→4
    pub fn dimensions(&self) -> Vector3<f64> {
        let v = &self.vertices;
        Vector3::new(
            (v[1] - v[0]).norm(),
            (v[3] - v[0]).norm(),
            (v[4] - v[0]).norm(),
        )
    }

    /// Mean of the four bottom vertices
    pub fn bottom_center(&self) -> Vector3<f64> {
        self.vertices[..4].iter().sum::<Vector3<f64>>() / 4.0
    }
}

fn to_local_finite<I: IntoIterator<Item = Vector3<f64>>>(
    frame: &PlaneFrame,
    positions: I,
) -> Vec<Vector3<f64>> {
    positions
        .into_iter()
        .filter(|p| p.iter().all(|c| c.is_finite()))
        .map(|p| frame.to_local(&p))
        .collect()
}

fn local_extent(local: &[Vector3<f64>]) -> Option<(Vector3<f64>, Vector3<f64>)> {
    let first = local.first()?;
    Some(local.iter().skip(1).fold((*first, *first), |(min, max), p| {
        (min.inf(p), max.sup(p))
    }))
}
