use crate::domain::HazardDomain;
use crate::guard::Guard;
use crate::mem::{self, AllocFn, FreeFn};
use crate::record::ThreadRecord;
use crate::retired::{Retired, drop_boxed};
use crate::stat::Stat;
use crate::sync::Mutex;
use std::cell::Cell;
use std::ptr;
use std::sync::LazyLock;

/// The process-wide domain. Lifecycle transitions are serialized by this
/// mutex; per-operation paths go through the thread-local record instead and
/// never touch it.
///
/// 进程级域。生命周期转换由此互斥锁串行化；
/// 逐操作路径走线程本地记录，从不触碰它。
static INSTANCE: LazyLock<Mutex<Option<HazardDomain>>> = LazyLock::new(|| Mutex::new(None));

#[cfg(feature = "stat")]
static POSTMORTEM: LazyLock<Mutex<Stat>> = LazyLock::new(|| Mutex::new(Stat::default()));

std::thread_local! {
    /// The calling thread's record in the process-wide domain.
    /// 调用线程在进程级域中的记录。
    static CACHED_RECORD: Cell<*mut ThreadRecord> = const { Cell::new(ptr::null_mut()) };
}

/// Create the process-wide SMR singleton with `initial_hazard_ptr_count`
/// inline hazard slots per thread. No-op if already constructed.
///
/// 创建进程级 SMR 单例，每线程 `initial_hazard_ptr_count` 个内联槽。
/// 已构建则为空操作。
pub fn construct(initial_hazard_ptr_count: usize) {
    let mut slot = INSTANCE.lock();
    if slot.is_none() {
        *slot = Some(HazardDomain::new(initial_hazard_ptr_count));
    }
}

/// Destroy the process-wide singleton. No-op if not constructed.
///
/// With `detach_all`, every record still owned is force-detached first —
/// valid only when the owning threads have already stopped. Threads that used
/// [`attach_thread`] must call [`detach_thread`] before `destruct`; the
/// thread-local record cache of other threads cannot be repaired from here.
///
/// 销毁进程级单例。未构建则为空操作。
/// `detach_all` 为真时先强制分离所有仍被持有的记录——
/// 仅当这些线程已停止时有效。
pub fn destruct(detach_all: bool) {
    let mut slot = INSTANCE.lock();
    if let Some(domain) = slot.take() {
        if detach_all {
            domain.state().detach_all();
        }
        #[cfg(feature = "stat")]
        {
            *POSTMORTEM.lock() = domain.statistics();
        }
        drop(domain);
    }
}

/// Whether the process-wide singleton is constructed and usable.
/// 进程级单例是否已构建可用。
pub fn is_constructed() -> bool {
    INSTANCE.lock().is_some()
}

/// Replace the block-storage allocation functions. Must be called before
/// [`construct`]; domains snapshot the hooks when they are built.
///
/// # Panics
/// Panics if the singleton is already constructed.
///
/// 替换块存储分配函数。必须在 [`construct`] 之前调用。
pub fn set_memory_allocator(alloc_fn: AllocFn, free_fn: FreeFn) {
    let slot = INSTANCE.lock();
    assert!(
        slot.is_none(),
        "set_memory_allocator() must precede construct()"
    );
    mem::install_hooks(alloc_fn, free_fn);
}

/// Attach the calling thread to the singleton. Idempotent: a thread that is
/// already attached keeps its record.
///
/// # Panics
/// Panics if the singleton is not constructed.
///
/// 将调用线程附加到单例。幂等：已附加的线程保留其记录。
pub fn attach_thread() {
    CACHED_RECORD.with(|cell| {
        if cell.get().is_null() {
            let slot = INSTANCE.lock();
            let domain = slot
                .as_ref()
                .expect("hazard-pointer SMR singleton is not constructed");
            cell.set(domain.state().attach_record());
        }
    });
}

/// Detach the calling thread. Idempotent: a no-op for unattached threads, and
/// for threads that outlived a `destruct`.
///
/// 分离调用线程。幂等：未附加的线程以及在 `destruct` 之后存活的线程均为空操作。
pub fn detach_thread() {
    CACHED_RECORD.with(|cell| {
        let rec = cell.get();
        if rec.is_null() {
            return;
        }
        cell.set(ptr::null_mut());
        let slot = INSTANCE.lock();
        if let Some(domain) = slot.as_ref() {
            domain.state().detach_record(rec);
        }
    });
}

/// The calling thread's record. Attachment is checked in debug builds only;
/// per-call checks on the hot path would defeat the engine.
/// 调用线程的记录。仅在调试构建中检查附加状态。
fn current_record() -> *mut ThreadRecord {
    let rec = CACHED_RECORD.with(|cell| cell.get());
    debug_assert!(
        !rec.is_null(),
        "calling thread is not attached (missing attach_thread())"
    );
    rec
}

/// Acquire a hazard-pointer slot from the calling thread's storage.
/// The thread must be attached and must stay attached while the guard lives.
///
/// 从调用线程的存储中获取一个冒险指针槽。
/// 线程必须已附加，且在守卫存活期间保持附加。
pub fn guard() -> Guard<'static> {
    unsafe { Guard::acquire(current_record()) }
}

/// Retire an object through the calling thread's record.
///
/// # Safety
/// As for [`LocalHandle::retire`](crate::LocalHandle::retire); the calling
/// thread must be attached.
///
/// 通过调用线程的记录退休一个对象。
pub unsafe fn retire<T: Send + 'static>(ptr: *mut T) {
    unsafe { retire_with(ptr as *mut (), drop_boxed::<T>) }
}

/// Retire with a caller-supplied disposer.
///
/// # Safety
/// As for [`LocalHandle::retire_with`](crate::LocalHandle::retire_with); the
/// calling thread must be attached.
///
/// 用调用者提供的销毁器退休。
pub unsafe fn retire_with(ptr: *mut (), drop_fn: unsafe fn(*mut ())) {
    let rec = current_record();
    let state = unsafe { &*(*rec).domain };
    state.retire_on(rec, Retired::new(ptr, drop_fn));
}

/// Run a reclamation pass for the calling thread.
/// 为调用线程执行一次回收。
pub fn scan() {
    let rec = current_record();
    unsafe { (*(*rec).domain).scan(rec) }
}

/// Inherit and reclaim retirements abandoned by detached threads.
/// 接管并回收已分离线程遗弃的退休对象。
pub fn help_scan() {
    let rec = current_record();
    unsafe { (*(*rec).domain).help_scan(rec) }
}

/// Counters of the process-wide singleton; all zeros without the `stat`
/// feature, or when not constructed.
/// 进程级单例的计数器；无 `stat` 特性或未构建时全为零。
pub fn statistics() -> Stat {
    INSTANCE
        .lock()
        .as_ref()
        .map(|domain| domain.statistics())
        .unwrap_or_default()
}

/// Counters gathered by the most recent [`destruct`], readable after the
/// singleton is gone.
/// 最近一次 [`destruct`] 收集的计数器，在单例销毁后仍可读取。
#[cfg(feature = "stat")]
pub fn postmortem_statistics() -> Stat {
    *POSTMORTEM.lock()
}
