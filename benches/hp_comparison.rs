use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use std::sync::atomic::Ordering;

use crossbeam_epoch::{self as epoch, Atomic, Owned};
use hazard_smr::{HazardDomain, HazardPtr};

// Benchmark 1: acquiring and releasing one protection unit
// (hazard slot vs. epoch pin)
fn bench_guard_acquire_release(c: &mut Criterion) {
    c.bench_function("hazard_smr_guard_acquire_release", |b| {
        let domain = HazardDomain::default();
        let local = domain.attach();
        b.iter(|| {
            let guard = local.guard();
            black_box(&guard);
        });
    });

    c.bench_function("crossbeam_epoch_pin_unpin", |b| {
        b.iter(|| {
            let guard = epoch::pin();
            black_box(&guard);
        });
    });
}

// Benchmark 2: protected load of a shared pointer
fn bench_protected_load(c: &mut Criterion) {
    c.bench_function("hazard_smr_protected_load", |b| {
        let domain = HazardDomain::default();
        let local = domain.attach();
        let shared = HazardPtr::new(42u64);
        let mut guard = local.guard();
        b.iter(|| {
            black_box(*shared.load(&mut guard));
        });
    });

    c.bench_function("crossbeam_epoch_protected_load", |b| {
        let shared = Atomic::new(42u64);
        b.iter(|| {
            let guard = epoch::pin();
            let value = shared.load(Ordering::Acquire, &guard);
            black_box(unsafe { *value.deref() });
        });
        unsafe { drop(shared.into_owned()) };
    });
}

// Benchmark 3: replace-and-retire of the previous value
fn bench_store_retire(c: &mut Criterion) {
    c.bench_function("hazard_smr_store_retire", |b| {
        let domain = HazardDomain::default();
        let local = domain.attach();
        let shared = HazardPtr::new(0u64);
        let mut i = 0u64;
        b.iter(|| {
            i += 1;
            shared.store(black_box(i), &local);
        });
    });

    c.bench_function("crossbeam_epoch_swap_defer_destroy", |b| {
        let shared = Atomic::new(0u64);
        let mut i = 0u64;
        b.iter(|| {
            i += 1;
            let guard = epoch::pin();
            let old = shared.swap(Owned::new(black_box(i)), Ordering::AcqRel, &guard);
            unsafe { guard.defer_destroy(old) };
        });
        unsafe { drop(shared.into_owned()) };
    });
}

criterion_group!(
    benches,
    bench_guard_acquire_release,
    bench_protected_load,
    bench_store_retire
);
criterion_main!(benches);
