//! Benchmarks for the host flocking kernel and agent seeding.
//!
//! Run with: `cargo bench`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use glam::Vec2;
use rand::rngs::StdRng;
use rand::SeedableRng;

use shoal::agents::generate_seed;
use shoal::{CpuBackend, Flock, FlockingConfig, NullSink, TargetInput};

fn bench_seed(c: &mut Criterion) {
    let mut group = c.benchmark_group("generate_seed");

    for count in [256u32, 4096, 65_536] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            let mut rng = StdRng::seed_from_u64(0);
            b.iter(|| black_box(generate_seed(count, Vec2::new(2.0, 5.0), 10.0, &mut rng)))
        });
    }

    group.finish();
}

fn bench_cpu_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("cpu_tick");
    group.sample_size(20);

    // The host kernel scans every neighbor, so counts stay small
    for count in [256u32, 1024, 2048] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            let config = FlockingConfig {
                agent_count: count,
                seed: Some(1),
                ..FlockingConfig::default()
            };
            let mut flock = Flock::new(CpuBackend::new(), &config);
            let mut sink = NullSink;
            flock.start(&config, &mut sink).unwrap();
            let input = TargetInput::default();

            b.iter(|| black_box(flock.tick(0.02, &config, &input, &mut sink).unwrap()))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_seed, bench_cpu_tick);
criterion_main!(benches);
