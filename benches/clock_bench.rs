//! Virtual clock benchmark suite for Lockstep.
//!
//! Benchmarks the engine operations a test suite leans on:
//! - Enqueue throughput through the executor facade
//! - Window drives over pre-filled queues
//! - Single-step drives (one item per call)
//! - Periodic re-arm churn
//! - Bulk cancellation via executor shutdown
//!
//! Run:
//!   cargo bench --bench clock_bench

#![allow(missing_docs)]
#![allow(clippy::semicolon_if_nothing_returned)]

use criterion::{BatchSize, BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;

use lockstep::{VirtualClock, VirtualExecutor};
use std::sync::Arc;
use std::time::Duration;

// =============================================================================
// HELPERS
// =============================================================================

fn fresh_pair() -> (Arc<VirtualClock>, VirtualExecutor) {
    let clock = Arc::new(VirtualClock::new());
    let executor = VirtualExecutor::new(clock.clone());
    (clock, executor)
}

/// A clock pre-filled with `count` one-shot tasks at 1ms..=count ms, so a
/// window drive of `count` milliseconds fires every one of them and never
/// touches the empty-queue wait path.
fn filled_clock(count: u64) -> Arc<VirtualClock> {
    let (clock, executor) = fresh_pair();
    for delay in 1..=count {
        executor
            .schedule(Duration::from_millis(delay), || ())
            .unwrap();
    }
    clock
}

// =============================================================================
// ENQUEUE THROUGHPUT
// =============================================================================

fn bench_enqueue(c: &mut Criterion) {
    let mut group = c.benchmark_group("clock/enqueue");

    for &count in &[100_u64, 1_000, 5_000] {
        group.throughput(Throughput::Elements(count));
        group.bench_with_input(BenchmarkId::new("schedule", count), &count, |b, &count| {
            b.iter_batched(
                fresh_pair,
                |(clock, executor)| {
                    for delay in 1..=count {
                        executor
                            .schedule(Duration::from_millis(delay), || ())
                            .unwrap();
                    }
                    black_box(clock.queue_len())
                },
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

// =============================================================================
// DRIVE THROUGHPUT
// =============================================================================

fn bench_window_drive(c: &mut Criterion) {
    let mut group = c.benchmark_group("clock/window_drive");

    for &count in &[100_u64, 1_000, 5_000] {
        group.throughput(Throughput::Elements(count));
        group.bench_with_input(
            BenchmarkId::new("wait_for_all", count),
            &count,
            |b, &count| {
                b.iter_batched(
                    || filled_clock(count),
                    |clock| {
                        clock.wait_for(Duration::from_millis(count)).unwrap();
                        black_box(clock.now())
                    },
                    BatchSize::SmallInput,
                )
            },
        );
    }

    group.finish();
}

fn bench_step_drive(c: &mut Criterion) {
    let mut group = c.benchmark_group("clock/step_drive");

    for &count in &[100_u64, 1_000] {
        group.throughput(Throughput::Elements(count));
        group.bench_with_input(
            BenchmarkId::new("run_one_task_all", count),
            &count,
            |b, &count| {
                b.iter_batched(
                    || filled_clock(count),
                    |clock| {
                        let mut fired = 0_u64;
                        while clock.run_one_task(Duration::ZERO) {
                            fired += 1;
                        }
                        black_box(fired)
                    },
                    BatchSize::SmallInput,
                )
            },
        );
    }

    group.finish();
}

// =============================================================================
// PERIODIC RE-ARM CHURN
// =============================================================================

fn bench_periodic_rearm(c: &mut Criterion) {
    let mut group = c.benchmark_group("clock/periodic_rearm");

    for &ticks in &[100_u64, 1_000] {
        group.throughput(Throughput::Elements(ticks));
        group.bench_with_input(BenchmarkId::new("ticks", ticks), &ticks, |b, &ticks| {
            b.iter_batched(
                || {
                    let (clock, executor) = fresh_pair();
                    executor
                        .schedule_at_fixed_rate(
                            Duration::from_millis(1),
                            Duration::from_millis(1),
                            || (),
                        )
                        .unwrap();
                    clock
                },
                |clock| {
                    clock.wait_for(Duration::from_millis(ticks)).unwrap();
                    clock.destroy();
                    black_box(clock.now())
                },
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

// =============================================================================
// BULK CANCELLATION
// =============================================================================

fn bench_bulk_cancel(c: &mut Criterion) {
    let mut group = c.benchmark_group("clock/bulk_cancel");

    for &count in &[100_u64, 1_000, 5_000] {
        group.throughput(Throughput::Elements(count));
        group.bench_with_input(
            BenchmarkId::new("shutdown_now", count),
            &count,
            |b, &count| {
                b.iter_batched(
                    || {
                        let (clock, executor) = fresh_pair();
                        for delay in 1..=count {
                            executor
                                .schedule(Duration::from_millis(delay), || ())
                                .unwrap();
                        }
                        (clock, executor)
                    },
                    |(_clock, executor)| black_box(executor.shutdown_now().len()),
                    BatchSize::SmallInput,
                )
            },
        );
    }

    group.finish();
}

// =============================================================================
// MAIN
// =============================================================================

criterion_group!(
    benches,
    bench_enqueue,
    bench_window_drive,
    bench_step_drive,
    bench_periodic_rearm,
    bench_bulk_cancel,
);

criterion_main!(benches);
