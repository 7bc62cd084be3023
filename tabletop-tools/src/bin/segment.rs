#![warn(clippy::all)]

use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use clap::{App, Arg};
use log::info;
use rand::{rngs::SmallRng, SeedableRng};
use tabletop_algorithms::{
    config::{FieldName, ObjectHints, PoseEstimationConfig, SegmentationConfig},
    pipeline::{SceneSegmentation, SegmentOptions},
    pose_estimation::estimate_pose,
    transform::{transform_pose, TransformBuffer, DEFAULT_TRANSFORM_TIMEOUT},
};
use tabletop_core::{
    containers::Timestamp,
    geometry::ObjectPose,
    nalgebra::{Isometry3, Translation3, UnitQuaternion},
};

#[path = "segment/scene.rs"]
mod scene;

use scene::Scene;

struct Args {
    pub objects: usize,
    pub views: usize,
    pub seed: u64,
    pub config: SegmentationConfig,
    pub hints: ObjectHints,
    pub target_frame: String,
}

fn parse_value<T: std::str::FromStr>(matches: &clap::ArgMatches, name: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    matches
        .value_of(name)
        .map(|value| {
            value
                .parse::<T>()
                .map_err(|e| anyhow!("Invalid value '{}' for {}: {}", value, name, e))
        })
        .transpose()
}

fn get_args() -> Result<Args> {
    let matches = App::new("tabletop segment")
        .version("0.1")
        .about("Segments a synthetic table-top scene and prints the poses of the objects on the table")
        .arg(
            Arg::with_name("OBJECTS")
                .short("n")
                .long("objects")
                .takes_value(true)
                .value_name("COUNT")
                .help("Number of boxes on the table (default 3)"),
        )
        .arg(
            Arg::with_name("VIEWS")
                .long("views")
                .takes_value(true)
                .value_name("COUNT")
                .help("Number of sensor views that are accumulated before segmenting (default 1)"),
        )
        .arg(
            Arg::with_name("SEED")
                .short("s")
                .long("seed")
                .takes_value(true)
                .help("Seed of the scene generator"),
        )
        .arg(
            Arg::with_name("FIELD")
                .long("filter-field")
                .takes_value(true)
                .help("Field (x, y or z) limited by the voxel grid"),
        )
        .arg(
            Arg::with_name("PARALLEL")
                .short("p")
                .long("parallel-normals")
                .help("Estimate normals on a thread pool"),
        )
        .arg(
            Arg::with_name("ORIENTED")
                .long("oriented-boxes")
                .help("Fit minimum-area boxes to the objects"),
        )
        .arg(
            Arg::with_name("CATEGORY")
                .long("category")
                .takes_value(true)
                .help("Object category used for pose estimation (atwork, cavity)"),
        )
        .arg(
            Arg::with_name("SHAPE")
                .long("shape")
                .takes_value(true)
                .help("Object shape used for pose estimation (sphere, flat)"),
        )
        .arg(
            Arg::with_name("TARGET")
                .short("t")
                .long("target-frame")
                .takes_value(true)
                .help("Frame the poses are reported in (default base_link)"),
        )
        .get_matches();

    let mut config = SegmentationConfig::default();
    if let Some(field) = parse_value::<FieldName>(&matches, "FIELD")? {
        config.voxel_grid.filter_field = field;
    }
    config.normals.use_parallel = matches.is_present("PARALLEL");
    config.oriented_boxes = matches.is_present("ORIENTED");
    config.validate().context("Invalid segmentation configuration")?;

    let hints = ObjectHints::new(
        "unknown",
        matches.value_of("CATEGORY").unwrap_or("atwork").into(),
        matches.value_of("SHAPE").unwrap_or("").into(),
    );

    Ok(Args {
        objects: parse_value(&matches, "OBJECTS")?.unwrap_or(3),
        views: parse_value(&matches, "VIEWS")?.unwrap_or(1),
        seed: parse_value(&matches, "SEED")?.unwrap_or(0),
        config,
        hints,
        target_frame: matches.value_of("TARGET").unwrap_or("base_link").to_owned(),
    })
}

fn print_pose(label: &str, pose: &ObjectPose) {
    let (_, _, yaw) = pose.roll_pitch_yaw();
    println!(
        "\t{:<8} [{:>7.3} {:>7.3} {:>7.3}] yaw {:>6.1} deg ({})",
        label,
        pose.position.x,
        pose.position.y,
        pose.position.z,
        yaw.to_degrees(),
        pose.frame_id
    );
}

fn main() -> Result<()> {
    pretty_env_logger::init();

    let args = get_args()?;
    let mut rng = SmallRng::seed_from_u64(args.seed);
    let scene = Scene::random(args.objects, &mut rng);
    info!("Generated a scene with {} boxes", scene.boxes.len());

    // the camera frame sits 0.6 m above the base
    let transforms = TransformBuffer::new();
    transforms.set_transform(
        "base_link",
        "camera",
        Isometry3::from_parts(Translation3::new(0.3, 0.0, 0.6), UnitQuaternion::identity()),
    );

    let mut segmentation = SceneSegmentation::new(args.config);
    segmentation.reset_object_id();
    segmentation.reset_cloud_accumulation();
    for view in 0..args.views.max(1) {
        segmentation.add_cloud_accumulation(&scene.view(Timestamp(view as u64), &mut rng));
    }
    info!(
        "Accumulated {} points from {} views",
        segmentation.accumulator().len(),
        args.views.max(1)
    );

    let start = Instant::now();
    let objects = segmentation.segment_accumulated_cloud(SegmentOptions::default());
    info!("Segmentation took {:.3}s", start.elapsed().as_secs_f64());

    if let (Some(normal), Some(height)) = (segmentation.plane_normal(), segmentation.workspace_height()) {
        println!(
            "Support plane normal [{:.3} {:.3} {:.3}], workspace height {:.3}",
            normal.x, normal.y, normal.z, height
        );
    }
    println!("{} objects", objects.len());

    let pose_config = PoseEstimationConfig::default();
    for object in &objects {
        let dimensions = object.bounding_box.dimensions();
        println!(
            "Object {}: {} points, box {:.3} x {:.3} x {:.3}",
            object.id,
            object.cluster.len(),
            dimensions.x,
            dimensions.y,
            dimensions.z
        );
        print_pose("box", &transform_pose(&transforms, &object.pose, &args.target_frame, DEFAULT_TRANSFORM_TIMEOUT));
        match estimate_pose(&object.cluster, &args.hints, &pose_config) {
            Ok((_, pose)) => print_pose(
                "cluster",
                &transform_pose(&transforms, &pose, &args.target_frame, DEFAULT_TRANSFORM_TIMEOUT),
            ),
            Err(e) => println!("\tno cluster pose: {}", e),
        }
    }

    Ok(())
}
