use rand::{distributions::Uniform, Rng};
use tabletop_core::{
    containers::{pack_rgba, Point, PointCloud, Timestamp},
    nalgebra::{Rotation2, Vector2, Vector3},
};

const TABLE_COLOR: (u8, u8, u8) = (160, 120, 80);

/// A box standing on the table, rotated by `yaw` around the vertical axis
#[derive(Debug, Clone, Copy)]
pub struct SceneBox {
    pub center: Vector2<f64>,
    pub size: Vector3<f64>,
    pub yaw: f64,
    pub color: u32,
}

impl SceneBox {
    fn to_world(&self, local: Vector2<f64>) -> Vector2<f64> {
        self.center + Rotation2::new(self.yaw) * local
    }

    fn covers(&self, position: Vector2<f64>) -> bool {
        let local = Rotation2::new(-self.yaw) * (position - self.center);
        local.x.abs() <= self.size.x / 2.0 && local.y.abs() <= self.size.y / 2.0
    }
}

/// Synthetic view of a table from a depth sensor mounted above it
pub struct Scene {
    pub table_height: f64,
    pub half_extent: f64,
    pub spacing: f64,
    pub noise: f64,
    pub boxes: Vec<SceneBox>,
}

impl Scene {
    /// Places `count` boxes of random size and heading on the table without overlaps
    pub fn random<R: Rng>(count: usize, rng: &mut R) -> Self {
        let side = Uniform::new(0.03, 0.07);
        let height = Uniform::new(0.02, 0.08);
        let position = Uniform::new(-0.2, 0.2);
        let mut boxes: Vec<SceneBox> = vec![];
        let mut attempts = 0;
        while boxes.len() < count && attempts < 1000 {
            attempts += 1;
            let candidate = SceneBox {
                center: Vector2::new(rng.sample(position), rng.sample(position)),
                size: Vector3::new(rng.sample(side), rng.sample(side), rng.sample(height)),
                yaw: rng.gen_range(0.0..std::f64::consts::PI),
                color: pack_rgba(rng.gen(), rng.gen(), rng.gen(), 255),
            };
            // keep the clusters apart
            if boxes
                .iter()
                .all(|b| (b.center - candidate.center).norm() > 0.15)
            {
                boxes.push(candidate);
            }
        }
        Self {
            table_height: -0.1,
            half_extent: 0.35,
            spacing: 0.004,
            noise: 0.001,
            boxes,
        }
    }

    /// Samples the visible surfaces of the scene
    pub fn view<R: Rng>(&self, stamp: Timestamp, rng: &mut R) -> PointCloud {
        let noise = Uniform::new_inclusive(-self.noise, self.noise);
        let (r, g, b) = TABLE_COLOR;
        let table_color = pack_rgba(r, g, b, 255);
        let mut cloud = PointCloud::new("camera", stamp);

        let steps = (2.0 * self.half_extent / self.spacing).round() as i64;
        for i in 0..=steps {
            for j in 0..=steps {
                let position = Vector2::new(
                    -self.half_extent + i as f64 * self.spacing,
                    -self.half_extent + j as f64 * self.spacing,
                );
                if self.boxes.iter().any(|b| b.covers(position)) {
                    continue;
                }
                cloud.push(Point::with_color(
                    position.x,
                    position.y,
                    self.table_height + rng.sample(noise),
                    table_color,
                ));
            }
        }

        for scene_box in &self.boxes {
            for local in self.box_surface(scene_box) {
                let xy = scene_box.to_world(Vector2::new(local.x, local.y));
                cloud.push(Point::with_color(
                    xy.x,
                    xy.y,
                    self.table_height + local.z + rng.sample(noise),
                    scene_box.color,
                ));
            }
        }
        cloud
    }

    /// Top and side faces of a box in its own frame, with the origin at the center of the bottom face
    fn box_surface(&self, scene_box: &SceneBox) -> Vec<Vector3<f64>> {
        let half = scene_box.size / 2.0;
        let steps = |length: f64| ((length / self.spacing).round() as usize).max(1);
        let (nx, ny, nz) = (
            steps(scene_box.size.x),
            steps(scene_box.size.y),
            steps(scene_box.size.z),
        );
        let at = |from: f64, length: f64, i: usize, n: usize| from + length * i as f64 / n as f64;

        let mut surface = vec![];
        for i in 0..=nx {
            for j in 0..=ny {
                surface.push(Vector3::new(
                    at(-half.x, scene_box.size.x, i, nx),
                    at(-half.y, scene_box.size.y, j, ny),
                    scene_box.size.z,
                ));
            }
        }
        for k in 0..nz {
            let z = at(0.0, scene_box.size.z, k, nz);
            for i in 0..=nx {
                let x = at(-half.x, scene_box.size.x, i, nx);
                surface.push(Vector3::new(x, -half.y, z));
                surface.push(Vector3::new(x, half.y, z));
            }
            for j in 1..ny {
                let y = at(-half.y, scene_box.size.y, j, ny);
                surface.push(Vector3::new(-half.x, y, z));
                surface.push(Vector3::new(half.x, y, z));
            }
        }
        surface
    }
}
