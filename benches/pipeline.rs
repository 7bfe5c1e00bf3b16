//! Benchmarks for quiltpipe processing stages
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use quiltpipe::prelude::*;

/// Generate a synthetic scene with a bright disc on a sloped background
fn generate_scene(shape: SceneShape) -> SceneTensor {
    let cy = shape.height as f32 / 2.0;
    let cx = shape.width as f32 / 2.0;
    SceneTensor::from_fn(shape, AxisOrder::TCMYX, |t, c, m, y, x| {
        let r = ((y as f32 - cy).powi(2) + (x as f32 - cx).powi(2)).sqrt();
        let disc = if r < cy / 2.0 { 100.0 } else { 0.0 };
        disc + 0.05 * (x + y) as f32 + (t + c + m) as f32
    })
}

/// Benchmark single-plane operations
fn bench_operations(c: &mut Criterion) {
    let mut group = c.benchmark_group("operations");
    let params = OperationParameters {
        rolling_ball_radius: 20.0,
        ..OperationParameters::default()
    };
    let registry = OperationRegistry::with_builtins();

    for size in [128usize, 256, 512].iter() {
        let scene = generate_scene(SceneShape::new(1, 1, 1, *size, *size));
        let plane = scene.plane(0, 0, 0).to_owned();
        group.throughput(Throughput::Elements((size * size) as u64));

        for name in ["blur", "ball", "ada_hist", "stretch"] {
            let op = match registry.resolve(name, &params) {
                Ok(op) => op,
                Err(_) => continue,
            };
            group.bench_with_input(
                BenchmarkId::new(name, format!("{}x{}", size, size)),
                &plane,
                |b, plane| b.iter(|| op.apply(black_box(plane))),
            );
        }
    }

    group.finish();
}

/// Benchmark channel dispatch across worker counts
fn bench_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch");
    group.sample_size(10);

    let scene = generate_scene(SceneShape::new(2, 2, 16, 128, 128));
    let chain = OpChain::new(vec![
        Operation::GaussianBlur { sigma: 1.5 },
        Operation::Rescale { range: (0.0, 1.0) },
    ]);
    let plan = resolve_uniform_plan(1, &chain);

    for workers in [1usize, 2, 4, 8].iter() {
        let dispatcher = TensorDispatcher::new(TileEngine::new(WorkerPool::new(*workers)));
        group.bench_with_input(BenchmarkId::new("blur_rescale", workers), &scene, |b, scene| {
            b.iter(|| dispatcher.process(black_box(scene), &plan))
        });
    }

    group.finish();
}

/// Benchmark stitching of tile grids
fn bench_stitch(c: &mut Criterion) {
    let mut group = c.benchmark_group("stitch");

    for grid in [2usize, 4, 6].iter() {
        let scene = generate_scene(SceneShape::new(1, 2, grid * grid, 128, 128));
        let stitcher = MosaicStitcher::new(GridShape::new(*grid, *grid))
            .with_resize_factor(2)
            .with_rescale(true);
        group.bench_with_input(
            BenchmarkId::new("grid", format!("{}x{}", grid, grid)),
            &scene,
            |b, scene| b.iter(|| stitcher.stitch(black_box(scene))),
        );
    }

    group.finish();
}

criterion_group!(benches, bench_operations, bench_dispatch, bench_stitch);
criterion_main!(benches);
