//! Core microbenchmarks using Criterion.
//!
//! These benchmarks measure the sparse-set / storage primitives in isolation,
//! independent of any registry, view, or scheduler layered on top:
//! - Entity push/erase under each deletion policy
//! - Packed iteration
//! - Typed component insertion and removal

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use rusty_storage::{Component, DeletionPolicy, Entity, SparseSet, Storage};

#[derive(Component, Clone, Copy, Debug, Default)]
struct Position {
    x: f32,
    y: f32,
    z: f32,
}

fn entity(index: u32) -> Entity {
    Entity::construct(index, 0)
}

// =============================================================================
// Push Benchmarks
// =============================================================================

fn bench_push(c: &mut Criterion) {
    let mut group = c.benchmark_group("push");

    for count in [100, 1_000, 10_000] {
        group.throughput(Throughput::Elements(count as u64));

        group.bench_with_input(BenchmarkId::new("sparse_set", count), &count, |b, &n| {
            b.iter(|| {
                let mut set = SparseSet::new();
                for i in 0..n {
                    black_box(set.push(entity(i)));
                }
            });
        });

        group.bench_with_input(BenchmarkId::new("storage", count), &count, |b, &n| {
            b.iter(|| {
                let mut storage: Storage<Position> = Storage::new();
                for i in 0..n {
                    black_box(storage.emplace(entity(i), Position::default()));
                }
            });
        });
    }

    group.finish();
}

// =============================================================================
// Erase Benchmarks (one per deletion policy)
// =============================================================================

fn bench_erase(c: &mut Criterion) {
    let mut group = c.benchmark_group("erase");

    for count in [100, 1_000, 10_000] {
        group.throughput(Throughput::Elements(count as u64));

        for policy in [DeletionPolicy::SwapAndPop, DeletionPolicy::InPlace, DeletionPolicy::SwapOnly] {
            let label = format!("{policy:?}");
            group.bench_with_input(BenchmarkId::new(label, count), &count, |b, &n| {
                b.iter_batched(
                    || {
                        let mut set = SparseSet::with_policy(policy);
                        for i in 0..n {
                            set.push(entity(i));
                        }
                        set
                    },
                    |mut set| {
                        for i in 0..n {
                            set.remove(entity(i));
                        }
                    },
                    criterion::BatchSize::SmallInput,
                );
            });
        }
    }

    group.finish();
}

// =============================================================================
// Iteration Benchmarks
// =============================================================================

fn bench_iterate(c: &mut Criterion) {
    let mut group = c.benchmark_group("iterate");

    for count in [1_000, 10_000, 100_000] {
        group.throughput(Throughput::Elements(count as u64));

        group.bench_with_input(BenchmarkId::new("each", count), &count, |b, &n| {
            let mut storage: Storage<Position> = Storage::new();
            for i in 0..n {
                storage.emplace(
                    entity(i),
                    Position { x: i as f32, y: 0.0, z: 0.0 },
                );
            }

            b.iter(|| {
                for (_, pos) in storage.each() {
                    black_box(pos.x);
                }
            });
        });

        group.bench_with_input(BenchmarkId::new("each_mut", count), &count, |b, &n| {
            let mut storage: Storage<Position> = Storage::new();
            for i in 0..n {
                storage.emplace(
                    entity(i),
                    Position { x: i as f32, y: 0.0, z: 0.0 },
                );
            }

            b.iter(|| {
                for (_, pos) in storage.each_mut() {
                    pos.x += 1.0;
                }
            });
        });
    }

    group.finish();
}

// =============================================================================
// Churn Benchmark: interleaved push/erase, the pattern `swap_only` exists for
// =============================================================================

fn bench_churn(c: &mut Criterion) {
    let mut group = c.benchmark_group("churn");
    let count = 10_000;
    group.throughput(Throughput::Elements(count as u64));

    for policy in [DeletionPolicy::SwapAndPop, DeletionPolicy::SwapOnly] {
        let label = format!("{policy:?}");
        group.bench_function(label, |b| {
            b.iter_batched(
                || {
                    let mut storage: Storage<Position> = Storage::with_policy(policy);
                    for i in 0..count {
                        storage.emplace(entity(i), Position::default());
                    }
                    storage
                },
                |mut storage| {
                    for i in (0..count).step_by(2) {
                        storage.remove(entity(i));
                    }
                    for i in (0..count).step_by(2) {
                        if !storage.contains(entity(i)) {
                            storage.emplace(entity(i), Position::default());
                        }
                    }
                },
                criterion::BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

criterion_group!(benches, bench_push, bench_erase, bench_iterate, bench_churn);
criterion_main!(benches);
