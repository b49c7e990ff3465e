use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use std::sync::atomic::Ordering;
use std::thread;

use crossbeam_epoch::{self as epoch, Atomic, Owned};
use hazard_smr::{HazardDomain, HazardPtr};

const READS_PER_THREAD: usize = 200;
const WRITES: usize = 100;

// Benchmark 1: read-only contention over one shared pointer
fn bench_concurrent_reads(c: &mut Criterion) {
    let mut group = c.benchmark_group("concurrent_reads");

    for num_threads in [2usize, 4, 8] {
        group.bench_with_input(
            BenchmarkId::new("hazard_smr", num_threads),
            &num_threads,
            |b, &n| {
                b.iter(|| {
                    let domain = HazardDomain::default();
                    let shared = HazardPtr::new(1u64);
                    thread::scope(|s| {
                        for _ in 0..n {
                            let domain = &domain;
                            let shared = &shared;
                            s.spawn(move || {
                                let local = domain.attach();
                                let mut guard = local.guard();
                                for _ in 0..READS_PER_THREAD {
                                    black_box(*shared.load(&mut guard));
                                }
                            });
                        }
                    });
                });
            },
        );

        group.bench_with_input(
            BenchmarkId::new("crossbeam_epoch", num_threads),
            &num_threads,
            |b, &n| {
                b.iter(|| {
                    let shared = Atomic::new(1u64);
                    thread::scope(|s| {
                        for _ in 0..n {
                            let shared = &shared;
                            s.spawn(move || {
                                for _ in 0..READS_PER_THREAD {
                                    let guard = epoch::pin();
                                    let value = shared.load(Ordering::Acquire, &guard);
                                    black_box(unsafe { *value.deref() });
                                }
                            });
                        }
                    });
                    unsafe { drop(shared.into_owned()) };
                });
            },
        );
    }

    group.finish();
}

// Benchmark 2: one writer replacing values while readers load them
fn bench_mixed_read_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("mixed_read_write");

    for num_readers in [1usize, 3, 7] {
        group.bench_with_input(
            BenchmarkId::new("hazard_smr", num_readers),
            &num_readers,
            |b, &n| {
                b.iter(|| {
                    let domain = HazardDomain::default();
                    let shared = HazardPtr::new(0u64);
                    thread::scope(|s| {
                        for _ in 0..n {
                            let domain = &domain;
                            let shared = &shared;
                            s.spawn(move || {
                                let local = domain.attach();
                                let mut guard = local.guard();
                                for _ in 0..READS_PER_THREAD {
                                    black_box(*shared.load(&mut guard));
                                }
                            });
                        }

                        let writer = domain.attach();
                        for i in 1..=WRITES as u64 {
                            shared.store(i, &writer);
                        }
                    });
                });
            },
        );

        group.bench_with_input(
            BenchmarkId::new("crossbeam_epoch", num_readers),
            &num_readers,
            |b, &n| {
                b.iter(|| {
                    let shared = Atomic::new(0u64);
                    thread::scope(|s| {
                        for _ in 0..n {
                            let shared = &shared;
                            s.spawn(move || {
                                for _ in 0..READS_PER_THREAD {
                                    let guard = epoch::pin();
                                    let value = shared.load(Ordering::Acquire, &guard);
                                    black_box(unsafe { *value.deref() });
                                }
                            });
                        }

                        for i in 1..=WRITES as u64 {
                            let guard = epoch::pin();
                            let old =
                                shared.swap(Owned::new(i), Ordering::AcqRel, &guard);
                            unsafe { guard.defer_destroy(old) };
                        }
                    });
                    unsafe { drop(shared.into_owned()) };
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_concurrent_reads, bench_mixed_read_write);
criterion_main!(benches);
