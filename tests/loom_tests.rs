//! Loom-based concurrency tests
//!
//! These tests use the `loom` library to exhaustively check thread
//! interleavings of the core protocols: guard publication vs. scan,
//! help-scan rescue of detached records, and concurrent attach.
//!
//! Run with: `cargo test --features loom --test loom_tests --release`

#![cfg(feature = "loom")]

use hazard_smr::{HazardDomain, HazardPtr};
use loom::sync::Arc;
use loom::sync::atomic::{AtomicUsize, Ordering};
use loom::thread;

struct Node {
    value: usize,
    drops: Arc<AtomicUsize>,
}

impl Drop for Node {
    fn drop(&mut self) {
        self.drops.fetch_add(1, Ordering::SeqCst);
    }
}

fn model<F>(f: F)
where
    F: Fn() + Sync + Send + 'static,
{
    let mut builder = loom::model::Builder::new();
    // Attach/scan walks touch many atomics; bound preemptions to keep the
    // state space tractable.
    builder.preemption_bound = Some(3);
    builder.check(f);
}

/// A reader's published guard must keep the old value alive across a
/// concurrent store + scan; both values are reclaimed in the end.
#[test]
fn loom_protect_vs_reclaim() {
    model(|| {
        let drops = Arc::new(AtomicUsize::new(0));
        let domain = HazardDomain::new(4);

        let shared = Arc::new(HazardPtr::new(Node {
            value: 1,
            drops: Arc::clone(&drops),
        }));

        let reader = {
            let domain = domain.clone();
            let shared = Arc::clone(&shared);
            thread::spawn(move || {
                let local = domain.attach();
                let mut guard = local.guard();
                let node = shared.load(&mut guard);
                assert!(node.value == 1 || node.value == 2);
            })
        };

        let local = domain.attach();
        shared.store(
            Node {
                value: 2,
                drops: Arc::clone(&drops),
            },
            &local,
        );
        local.scan();

        reader.join().unwrap();
        drop(local);
        drop(domain);
        drop(shared);

        assert_eq!(drops.load(Ordering::SeqCst), 2);
    });
}

/// A detached thread's pending retirement is reclaimed by a surviving
/// thread's help_scan, in every interleaving.
#[test]
fn loom_help_scan_rescue() {
    model(|| {
        let drops = Arc::new(AtomicUsize::new(0));
        let domain = HazardDomain::new(4);

        let worker = {
            let domain = domain.clone();
            let drops = Arc::clone(&drops);
            thread::spawn(move || {
                let local = domain.attach();
                let node = Box::into_raw(Box::new(Node { value: 9, drops }));
                unsafe { local.retire(node) };
                // detach on drop; the retirement is resolved here or inherited
            })
        };

        let local = domain.attach();
        local.help_scan();

        worker.join().unwrap();
        drop(local);
        drop(domain);

        assert_eq!(drops.load(Ordering::SeqCst), 1);
    });
}

/// Two threads attaching, retiring and detaching concurrently never lose an
/// object and never dispose one twice.
#[test]
fn loom_concurrent_attach_detach() {
    model(|| {
        let drops = Arc::new(AtomicUsize::new(0));
        let domain = HazardDomain::new(4);

        let handles: Vec<_> = (0..2)
            .map(|value| {
                let domain = domain.clone();
                let drops = Arc::clone(&drops);
                thread::spawn(move || {
                    let local = domain.attach();
                    let node = Box::into_raw(Box::new(Node { value, drops }));
                    unsafe { local.retire(node) };
                    local.scan();
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        drop(domain);

        assert_eq!(drops.load(Ordering::SeqCst), 2);
    });
}
