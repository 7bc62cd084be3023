use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::{rngs::StdRng, Rng, SeedableRng};
use tabletop_core::{containers::VoxelMap, math::AABB, nalgebra::Vector3};

fn gen_random_positions(count: usize) -> Vec<Vector3<f64>> {
    let mut rng = StdRng::seed_from_u64(7);
    (0..count)
        .map(|_| {
            Vector3::new(
                rng.gen_range(-0.5..0.5),
                rng.gen_range(-0.5..0.5),
                rng.gen_range(0.3..1.2),
            )
        })
        .collect()
}

fn fill_voxel_map(positions: &[Vector3<f64>], resolution: f64) {
    let mut map = VoxelMap::new(resolution);
    for position in positions {
        map.insert_at(position, 0_u32);
    }
    black_box(map.len());
}

fn iterate_centers(map: &VoxelMap<u32>) {
    let sum: Vector3<f64> = map.centers().map(|(center, _)| center).sum();
    black_box(sum);
}

fn bench(c: &mut Criterion) {
    let random_positions = gen_random_positions(65536);

    c.bench_function("voxel_map_insert_fine", |b| {
        b.iter(|| fill_voxel_map(&random_positions, 0.0025));
    });
    c.bench_function("voxel_map_insert_coarse", |b| {
        b.iter(|| fill_voxel_map(&random_positions, 0.02));
    });

    let mut map = VoxelMap::new(0.0025);
    for position in random_positions.iter() {
        map.insert_at(position, 1);
    }
    c.bench_function("voxel_map_centers", |b| {
        b.iter(|| iterate_centers(&map));
    });
    c.bench_function("aabb_from_iter", |b| {
        b.iter(|| black_box(random_positions.iter().copied().collect::<AABB<f64>>()));
    });
}

criterion_group! {
    name = voxel_map;
    config = Criterion::default().sample_size(40);
    targets = bench
}
criterion_main!(voxel_map);
