use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use whitebox_gridding::filters::{apply, EdgePolicy, FocalReducer, FocalStatistic, Kernel};
use whitebox_gridding::gridding::{RasterizeOptions, Reducer, TileManager};
use whitebox_gridding::lidar::{Point, PointSet, PointValue};
use whitebox_gridding::raster::{Grid, GridConfigs};
use whitebox_gridding::structures::BoundingBox;

fn cloud(n: usize) -> PointSet {
    let mut rng = SmallRng::seed_from_u64(42);
    PointSet::from_points(
        (0..n)
            .map(|_| {
                let (x, y) = (rng.gen_range(0.0..500.0), rng.gen_range(0.0..500.0));
                Point::new(x, y, 200.0 + 0.05 * x + rng.gen_range(0.0..25.0))
            })
            .collect(),
        "",
    )
}

fn bench_rasterize(c: &mut Criterion) {
    let points = cloud(200_000);
    let manager = TileManager::new(1.0, 100.0, 10.0)
        .unwrap()
        .with_options(RasterizeOptions {
            k: 8,
            max_radius: Some(10.0),
            ..RasterizeOptions::default()
        });
    c.bench_function("tiled max", |b| {
        b.iter(|| manager.rasterize_tiled(black_box(&points), &Reducer::Max(PointValue::Z)))
    });
    let mut group = c.benchmark_group("surface");
    group.sample_size(10);
    group.bench_function("tiled surface", |b| {
        b.iter(|| manager.rasterize_tiled(black_box(&points), &Reducer::Surface(PointValue::Z)))
    });
    group.finish();
}

fn bench_focal(c: &mut Criterion) {
    let configs =
        GridConfigs::from_extent(BoundingBox::new(0.0, 1000.0, 0.0, 1000.0), 1.0, "").unwrap();
    let mut rng = SmallRng::seed_from_u64(7);
    let data = (0..configs.num_cells()).map(|_| rng.gen_range(0.0..100.0)).collect();
    let grid = Grid::from_data(configs, data).unwrap();
    let kernel = Kernel::uniform(5).unwrap();
    c.bench_function("focal weighted sum 5x5", |b| {
        b.iter(|| apply(black_box(&grid), &kernel, &FocalReducer::WeightedSum, EdgePolicy::Shrink))
    });
    let median = FocalReducer::Statistic(FocalStatistic::Median);
    c.bench_function("focal median 5x5", |b| {
        b.iter(|| apply(black_box(&grid), &kernel, &median, EdgePolicy::Clamp))
    });
}

criterion_group!(benches, bench_rasterize, bench_focal);
criterion_main!(benches);
