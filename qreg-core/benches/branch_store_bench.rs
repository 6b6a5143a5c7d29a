//! Benchmarks for the branch store's hot paths: allocation, Hadamard
//! splitting, and pruning a superposition back down after it collapses
//! a lot of configuration-equal branches together.
//!
//! Run: `cargo bench --bench branch_store_bench`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use qreg_core::expr::Expression;
use qreg_core::primitives;
use qreg_core::store::BranchStore;

fn bench_alloc(c: &mut Criterion) {
    let mut group = c.benchmark_group("branch_store_alloc");
    group.bench_function("alloc_one", |b| {
        b.iter(|| {
            let mut store = BranchStore::new(1e-10);
            black_box(store.alloc())
        })
    });
    group.finish();
}

fn bench_hadamard_fanout(c: &mut Criterion) {
    let mut group = c.benchmark_group("branch_store_hadamard");
    for width in [1usize, 4, 8, 12] {
        group.bench_with_input(BenchmarkId::new("had_chain", width), &width, |b, &width| {
            b.iter(|| {
                let mut store = BranchStore::new(1e-10);
                let id = store.alloc();
                for bit in 0..width {
                    primitives::had(&mut store, &[], id, &Expression::int(bit as i64)).unwrap();
                }
                black_box(store.len())
            })
        });
    }
    group.finish();
}

fn bench_prune(c: &mut Criterion) {
    let mut group = c.benchmark_group("branch_store_prune");
    for width in [4usize, 8, 12] {
        group.bench_with_input(BenchmarkId::new("had_then_uncompute", width), &width, |b, &width| {
            b.iter(|| {
                let mut store = BranchStore::new(1e-10);
                let id = store.alloc();
                for bit in 0..width {
                    primitives::had(&mut store, &[], id, &Expression::int(bit as i64)).unwrap();
                }
                for bit in 0..width {
                    primitives::had(&mut store, &[], id, &Expression::int(bit as i64)).unwrap();
                }
                black_box(store.len())
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_alloc, bench_hadamard_fanout, bench_prune);
criterion_main!(benches);
