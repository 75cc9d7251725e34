//! Criterion benchmarks for `etest-math`.
//!
//! The walk is the inner loop of every E-test evaluation.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use etest_math::{poisson_pmf, ModeCenteredWalk};

fn bench_walk(c: &mut Criterion) {
    let mut group = c.benchmark_group("poisson");

    for lambda in [0.5_f64, 5.0, 50.0, 500.0] {
        group.bench_with_input(
            BenchmarkId::new("mode_centered_walk", lambda),
            &lambda,
            |b, &l| {
                b.iter(|| {
                    let walk = ModeCenteredWalk::new(black_box(l)).unwrap();
                    black_box(walk.retained_mass());
                });
            },
        );

        // Same support evaluated point by point, for comparison.
        let indices: Vec<u64> = ModeCenteredWalk::new(lambda)
            .unwrap()
            .map(|t| t.index)
            .collect();
        group.bench_with_input(
            BenchmarkId::new("direct_pmf", lambda),
            &lambda,
            |b, &l| {
                b.iter(|| {
                    let total: f64 = indices.iter().map(|&i| poisson_pmf(i, black_box(l))).sum();
                    black_box(total);
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_walk);
criterion_main!(benches);
