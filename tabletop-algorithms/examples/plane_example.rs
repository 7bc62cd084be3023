use rand::Rng;
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use tabletop_algorithms::{
    config::{NormalParams, PlaneFitParams, VoxelGridParams},
    normal_estimation::compute_normals,
    search::PointIndex,
    segmentation::{PlaneFinder, SupportSurface},
    voxel_grid::voxelgrid_filter,
};
use tabletop_core::containers::{Point, PointCloud, Timestamp};

fn main() {
    //generate a table (plane along x- and y-axis) with a pole on it and some outliers
    let points: Vec<Point> = (0..20000)
        .into_par_iter()
        .map(|p| {
            let mut rng = rand::thread_rng();
            let mut point = Point::new(rng.gen_range(-0.4..0.4), rng.gen_range(-0.4..0.4), -0.1);
            if p % 4 == 0 {
                point.position.x = 0.0;
                point.position.y = 0.0;
                point.position.z = rng.gen_range(-0.1..0.2);
            }
            if p % 50 == 0 {
                point.position.z = rng.gen_range(-0.15..0.3);
            }
            point
        })
        .collect();
    let cloud = PointCloud::from_points(points, "camera", Timestamp(0));
    println!("done generating pointcloud");

    let downsampled = voxelgrid_filter(&cloud, &VoxelGridParams::default());
    println!("{} points after downsampling", downsampled.len());

    let index = PointIndex::build(downsampled.positions());
    let normals = compute_normals(
        &downsampled,
        &index,
        &NormalParams {
            use_parallel: true,
            ..Default::default()
        },
    );
    println!("done normal estimation");

    let finder = PlaneFinder::new(PlaneFitParams::default());
    match finder.find(&downsampled, Some(&normals)) {
        Ok(fit) => {
            let surface = SupportSurface::from_fit(&fit, &downsampled);
            println!("plane {:?} with {} inliers", fit.model.coefficients(), fit.inliers.len());
            println!(
                "footprint with {} vertices at height {:?}",
                surface.hull().len(),
                surface.workspace_height()
            );
        }
        Err(e) => println!("{}", e),
    }
}
