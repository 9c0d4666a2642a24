//! Basic benchmarks for the `keyed_pool` crate.
#![allow(
    missing_docs,
    reason = "No need for API documentation in benchmark code"
)]

use std::hint::black_box;
use std::iter;
use std::time::Instant;

use criterion::{Criterion, criterion_group, criterion_main};
use keyed_pool::{DensePool, SparsePool};

criterion_group!(benches, entrypoint);
criterion_main!(benches);

type TestItem = usize;
const TEST_VALUE: TestItem = 1024;
const CAPACITY: usize = 10_000;

fn entrypoint(c: &mut Criterion) {
    let mut group = c.benchmark_group("sparse_basic");

    group.bench_function("insert_first", |b| {
        b.iter_custom(|iters| {
            let mut pools = iter::repeat_with(|| Box::new(SparsePool::<TestItem, CAPACITY>::new()))
                .take(usize::try_from(iters).unwrap())
                .collect::<Vec<_>>();

            let start = Instant::now();

            for pool in &mut pools {
                _ = black_box(pool.insert(black_box(TEST_VALUE)));
            }

            start.elapsed()
        });
    });

    group.bench_function("read_one", |b| {
        b.iter_custom(|iters| {
            let mut pool = Box::new(SparsePool::<TestItem, CAPACITY>::new());
            let key = pool.insert(TEST_VALUE).unwrap();

            let start = Instant::now();

            for _ in 0..iters {
                _ = black_box(pool.get(key));
            }

            start.elapsed()
        });
    });

    group.bench_function("read_one_stale", |b| {
        b.iter_custom(|iters| {
            let mut pool = Box::new(SparsePool::<TestItem, CAPACITY>::new());
            let key = pool.insert(TEST_VALUE).unwrap();
            _ = pool.remove(key);

            let start = Instant::now();

            for _ in 0..iters {
                _ = black_box(pool.get(key));
            }

            start.elapsed()
        });
    });

    group.bench_function("remove_one", |b| {
        b.iter_custom(|iters| {
            let mut pools = iter::repeat_with(|| Box::new(SparsePool::<TestItem, CAPACITY>::new()))
                .take(usize::try_from(iters).unwrap())
                .collect::<Vec<_>>();

            let keys = pools
                .iter_mut()
                .map(|pool| pool.insert(TEST_VALUE).unwrap())
                .collect::<Vec<_>>();

            let start = Instant::now();

            for (pool, key) in pools.iter_mut().zip(keys) {
                _ = black_box(pool.remove(key));
            }

            start.elapsed()
        });
    });

    group.finish();

    let mut group = c.benchmark_group("dense_basic");

    group.bench_function("insert_first", |b| {
        b.iter_custom(|iters| {
            let mut pools = iter::repeat_with(|| Box::new(DensePool::<TestItem, CAPACITY>::new()))
                .take(usize::try_from(iters).unwrap())
                .collect::<Vec<_>>();

            let start = Instant::now();

            for pool in &mut pools {
                _ = black_box(pool.insert(black_box(TEST_VALUE)));
            }

            start.elapsed()
        });
    });

    group.bench_function("read_one", |b| {
        b.iter_custom(|iters| {
            let mut pool = Box::new(DensePool::<TestItem, CAPACITY>::new());
            let key = pool.insert(TEST_VALUE).unwrap();

            let start = Instant::now();

            for _ in 0..iters {
                _ = black_box(pool.get(key));
            }

            start.elapsed()
        });
    });

    group.bench_function("iterate_full", |b| {
        b.iter_custom(|iters| {
            let mut pool = Box::new(DensePool::<TestItem, CAPACITY>::new());

            while !pool.is_full() {
                _ = pool.insert(TEST_VALUE).unwrap();
            }

            let start = Instant::now();

            for _ in 0..iters {
                _ = black_box(pool.iter().sum::<TestItem>());
            }

            start.elapsed()
        });
    });

    group.bench_function("churn_forward_10_back_5", |b| {
        // Add 10 values, remove the first 5, and repeat. This stresses the
        // swap-to-end compaction and the free-list bookkeeping together.
        b.iter_custom(|iters| {
            let mut pool = Box::new(DensePool::<TestItem, CAPACITY>::new());
            let mut to_remove = Vec::with_capacity(5);

            let start = Instant::now();

            for _ in 0..iters {
                to_remove.clear();

                for _ in 0..5 {
                    let key = pool.insert(black_box(TEST_VALUE)).unwrap();
                    to_remove.push(key);
                }

                for _ in 0..5 {
                    _ = black_box(pool.insert(black_box(TEST_VALUE)).unwrap());
                }

                #[expect(clippy::iter_with_drain, reason = "to avoid moving the value")]
                for key in to_remove.drain(..) {
                    _ = pool.remove(key);
                }

                pool.clear();
            }

            start.elapsed()
        });
    });

    group.finish();
}
