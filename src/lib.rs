//! Dynamic hazard-pointer safe memory reclamation (SMR) for lock-free data
//! structures.
//!
//! A thread publishes the address it is about to dereference in a hazard
//! slot ([`Guard`]); removed objects are [`retire`]d instead of freed; a
//! [`scan`] disposes exactly those retired objects no published hazard
//! references, and [`help_scan`] lets surviving threads finish the
//! reclamation work of threads that already detached. Hazard storage grows
//! dynamically through process-wide, lock-free block pools.
//!
//! Two equivalent surfaces:
//! - the process-wide singleton ([`construct`] / [`attach_thread`] /
//!   [`retire`] / [`scan`]), which caches each thread's record in
//!   thread-local storage, and
//! - the explicit service object ([`HazardDomain`] / [`LocalHandle`]),
//!   which passes the thread context by handle and is what the loom test
//!   suite drives.
//!
//! ```
//! use hazard_smr::{HazardDomain, HazardPtr};
//!
//! let domain = HazardDomain::default();
//! let shared = HazardPtr::new(String::from("hello"));
//!
//! let local = domain.attach();
//! let mut guard = local.guard();
//! assert_eq!(shared.load(&mut guard), "hello");
//! drop(guard);
//!
//! shared.store(String::from("world"), &local);
//! local.scan();
//! ```
//!
//! 用于无锁数据结构的动态冒险指针安全内存回收（SMR）。
//! 线程在冒险槽（[`Guard`]）中发布即将解引用的地址；
//! 被移除的对象先[`retire`]（退休）而非直接释放；
//! [`scan`] 恰好销毁不再被任何已发布冒险指针引用的退休对象；
//! [`help_scan`] 让存活线程完成已分离线程剩下的回收工作。

mod domain;
mod global;
mod guard;
mod handle;
mod mem;
mod pool;
mod ptr;
mod record;
mod retired;
mod stat;
mod sync;

pub use domain::{HazardDomain, HazardDomainBuilder};
#[cfg(feature = "stat")]
pub use global::postmortem_statistics;
pub use global::{
    attach_thread, construct, destruct, detach_thread, guard, help_scan, is_constructed, retire,
    retire_with, scan, set_memory_allocator, statistics,
};
pub use guard::Guard;
pub use handle::LocalHandle;
pub use mem::{AllocFn, BLOCK_ALIGN, FreeFn};
pub use ptr::HazardPtr;
pub use stat::Stat;

#[cfg(test)]
mod tests;
