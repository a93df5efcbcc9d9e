//! # Slot Pool Benchmark
//!
//! Measures the per-frame churn pattern: fill, remove a fraction, refill.

#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use kiln_core::SlotPool;

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("slot_pool_insert");

    for count in [1_000, 10_000, 100_000] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter(|| {
                let mut pool = SlotPool::new();
                for i in 0..count {
                    black_box(pool.insert([i as f32; 4]));
                }
                pool
            });
        });
    }

    group.finish();
}

fn bench_churn(c: &mut Criterion) {
    let mut group = c.benchmark_group("slot_pool_churn");

    for remove_pct in [1, 10, 50] {
        let count = 50_000usize;
        group.bench_with_input(BenchmarkId::from_parameter(remove_pct), &remove_pct, |b, &pct| {
            b.iter(|| {
                let mut pool = SlotPool::with_capacity(count);
                let handles: Vec<_> = (0..count).map(|i| pool.insert(i as u32)).collect();
                for handle in handles.iter().step_by(100 / pct) {
                    pool.remove(*handle);
                }
                black_box(pool.as_slice().len())
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_insert, bench_churn);
criterion_main!(benches);
