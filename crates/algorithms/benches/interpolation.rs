//! Benchmarks for gridding algorithms

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use gridder_algorithms::prelude::*;
use gridder_parallel::no_progress;

fn create_points(n: usize) -> PointSet<'static> {
    let x = (0..n).map(|i| ((i * 7919) % 10007) as f64 / 10.007).collect();
    let y = (0..n).map(|i| ((i * 104_729) % 10009) as f64 / 10.009).collect();
    let z = (0..n)
        .map(|i| {
            let (fx, fy) = ((i % 97) as f64, (i % 89) as f64);
            (fx * 0.1).sin() * 50.0 + fy
        })
        .collect();
    PointSet::owned(x, y, z).unwrap()
}

fn run(ctx: &GridContext<'_>, extent: &GridExtent, out: &mut [f32]) {
    ctx.evaluate(extent, out, no_progress).unwrap();
}

fn bench_algorithms(c: &mut Criterion) {
    let mut group = c.benchmark_group("gridding");
    group.sample_size(10);

    let algorithms = [
        GridAlgorithm::default(),
        GridAlgorithm::InverseDistance(InverseDistanceParams {
            radius1: 50.0,
            radius2: 50.0,
            ..Default::default()
        }),
        GridAlgorithm::InverseDistanceNearest(InverseDistanceNearestParams {
            radius: 50.0,
            ..Default::default()
        }),
        GridAlgorithm::MovingAverage(MovingAverageParams {
            radius1: 50.0,
            radius2: 50.0,
            ..Default::default()
        }),
        GridAlgorithm::Nearest(NearestParams::default()),
        GridAlgorithm::Linear(LinearParams::default()),
    ];

    let extent = GridExtent::new(0.0, 1000.0, 0.0, 1000.0, 256, 256);
    let mut out = vec![0.0f32; extent.len()];

    for algorithm in algorithms {
        for n in [1_000, 10_000].iter() {
            let ctx = GridContext::new(create_points(*n), algorithm, GridConfig::default()).unwrap();
            group.bench_with_input(BenchmarkId::new(algorithm.name(), n), n, |b, _| {
                b.iter(|| run(black_box(&ctx), &extent, &mut out))
            });
        }
    }

    group.finish();
}

fn bench_packed_kernel(c: &mut Criterion) {
    let mut group = c.benchmark_group("invdist_packed");
    group.sample_size(10);

    let extent = GridExtent::new(0.0, 1000.0, 0.0, 1000.0, 128, 128);
    let mut out = vec![0.0f32; extent.len()];

    for packed in [false, true] {
        let config = GridConfig {
            use_avx: packed,
            use_sse: packed,
            ..Default::default()
        };
        let ctx = GridContext::new(create_points(5_000), GridAlgorithm::default(), config).unwrap();
        let label = ctx.simd_tier().to_string();
        group.bench_function(BenchmarkId::from_parameter(label), |b| {
            b.iter(|| run(black_box(&ctx), &extent, &mut out))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_algorithms, bench_packed_kernel);
criterion_main!(benches);
