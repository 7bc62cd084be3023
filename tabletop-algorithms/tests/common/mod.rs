use rand::{distributions::Uniform, Rng};
use tabletop_algorithms::config::SegmentationConfig;
use tabletop_core::{
    containers::{Point, PointCloud, Timestamp},
    nalgebra::{Vector2, Vector3},
};

/// Default configuration with a shorter RANSAC run. The table covers most of every test scene, so a
/// hundred iterations find it reliably
pub fn test_config() -> SegmentationConfig {
    let mut config = SegmentationConfig::default();
    config.plane.max_iterations = 100;
    config
}

/// A box resting on the table, given by the center of its footprint and its size
#[derive(Debug, Clone, Copy)]
pub struct SceneObject {
    pub center: Vector2<f64>,
    pub size: Vector3<f64>,
}

impl SceneObject {
    pub fn cube(x: f64, y: f64, edge: f64) -> Self {
        Self {
            center: Vector2::new(x, y),
            size: Vector3::new(edge, edge, edge),
        }
    }

    fn covers(&self, x: f64, y: f64) -> bool {
        (x - self.center.x).abs() <= self.size.x / 2.0 && (y - self.center.y).abs() <= self.size.y / 2.0
    }
}

/// A square table below the sensor with boxes on it. The sensor looks down along -z
#[derive(Debug, Clone)]
pub struct TableScene {
    pub table_height: f64,
    pub half_extent: f64,
    pub table_spacing: f64,
    pub object_spacing: f64,
    /// Amplitude of the uniform noise along z
    pub noise: f64,
    pub objects: Vec<SceneObject>,
}

impl TableScene {
    pub fn with_objects(objects: Vec<SceneObject>) -> Self {
        Self {
            table_height: -0.1,
            half_extent: 0.3,
            table_spacing: 0.01,
            object_spacing: 0.004,
            noise: 0.0005,
            objects,
        }
    }

    pub fn generate<R: Rng>(&self, rng: &mut R) -> PointCloud {
        let noise = Uniform::new_inclusive(-self.noise, self.noise);
        let mut points = vec![];

        let steps = (2.0 * self.half_extent / self.table_spacing).round() as usize;
        for i in 0..=steps {
            for j in 0..=steps {
                let x = -self.half_extent + i as f64 * self.table_spacing;
                let y = -self.half_extent + j as f64 * self.table_spacing;
                if self.objects.iter().any(|o| o.covers(x, y)) {
                    continue;
                }
                points.push(Point::new(x, y, self.table_height + rng.sample(noise)));
            }
        }
        for object in &self.objects {
            self.sample_box(object, &mut points);
        }
        // a few invalid returns, as delivered by depth sensors
        points.push(Point::new(f64::NAN, f64::NAN, f64::NAN));
        points.push(Point::new(0.0, f64::INFINITY, 0.0));

        PointCloud::from_points(points, "camera", Timestamp(1_000))
    }

    /// Samples the top face and the four side faces of a box
    fn sample_box(&self, object: &SceneObject, points: &mut Vec<Point>) {
        let min = Vector3::new(
            object.center.x - object.size.x / 2.0,
            object.center.y - object.size.y / 2.0,
            self.table_height,
        );
        let max = min + object.size;
        let count = |length: f64| (length / self.object_spacing).round() as usize;
        let lerp = |from: f64, to: f64, i: usize, n: usize| from + (to - from) * i as f64 / n.max(1) as f64;

        let (nx, ny, nz) = (count(object.size.x), count(object.size.y), count(object.size.z));
        for i in 0..=nx {
            for j in 0..=ny {
                points.push(Point::new(
                    lerp(min.x, max.x, i, nx),
                    lerp(min.y, max.y, j, ny),
                    max.z,
                ));
            }
        }
        for k in 0..nz {
            let z = lerp(min.z, max.z, k, nz);
            for i in 0..=nx {
                let x = lerp(min.x, max.x, i, nx);
                points.push(Point::new(x, min.y, z));
                points.push(Point::new(x, max.y, z));
            }
            for j in 1..ny {
                let y = lerp(min.y, max.y, j, ny);
                points.push(Point::new(min.x, y, z));
                points.push(Point::new(max.x, y, z));
            }
        }
    }
}
