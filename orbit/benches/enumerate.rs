//! Benchmarks comparing scheduling modes and detection algorithms.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use uor_orbit::prelude::*;
use uor_orbit_test_helpers::{rotation, TableSpace};

const N: u64 = 1 << 18;
const MODES: [Mode; 4] = [Mode::Sequential, Mode::Static, Mode::Dynamic, Mode::Hybrid];

fn bench_modes_rotation(c: &mut Criterion) {
    // One long cycle: the worst case for static chunking.
    let space = rotation(N);
    let mut group = c.benchmark_group("rotation");
    group.throughput(Throughput::Elements(N));
    group.sample_size(10);

    for mode in MODES {
        let options = EnumerateOptions::new(4).mode(mode);
        group.bench_with_input(BenchmarkId::from_parameter(mode), &options, |b, options| {
            b.iter(|| black_box(enumerate(black_box(&space), options)));
        });
    }
    group.finish();
}

fn bench_modes_random(c: &mut Criterion) {
    let space = TableSpace::random(N, 0x5eed);
    let mut group = c.benchmark_group("random_permutation");
    group.throughput(Throughput::Elements(N));
    group.sample_size(10);

    for mode in MODES {
        for workers in [2, 4, 8] {
            let options = EnumerateOptions::new(workers).mode(mode);
            group.bench_with_input(
                BenchmarkId::new(mode.name(), workers),
                &options,
                |b, options| b.iter(|| black_box(enumerate(black_box(&space), options))),
            );
        }
    }
    group.finish();
}

fn bench_algorithms(c: &mut Criterion) {
    let space = TableSpace::random(1 << 14, 7);
    let mut group = c.benchmark_group("algorithm");
    group.throughput(Throughput::Elements(1 << 14));

    for algorithm in [Algorithm::Enumeration, Algorithm::Floyd, Algorithm::Brent] {
        let options = EnumerateOptions::new(1).algorithm(algorithm);
        group.bench_with_input(
            BenchmarkId::from_parameter(algorithm),
            &options,
            |b, options| b.iter(|| black_box(enumerate(black_box(&space), options))),
        );
    }
    group.finish();
}

criterion_group!(benches, bench_modes_rotation, bench_modes_random, bench_algorithms);
criterion_main!(benches);
