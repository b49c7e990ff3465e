use crate::domain::HazardDomain;
use crate::guard::Guard;
use crate::record::ThreadRecord;
use crate::retired::{Retired, drop_boxed};

/// A thread's attachment to a [`HazardDomain`].
///
/// The handle is the explicit form of the per-thread SMR state: it owns the
/// thread record for its lifetime and detaches on drop. It is not `Send` and
/// not `Sync`; every thread gets its own by calling
/// [`HazardDomain::attach`].
///
/// Detaching runs a final [`scan`](LocalHandle::scan) (and, by default, a
/// [`help_scan`](LocalHandle::help_scan)); whatever is still protected by
/// other threads stays behind in the record for a surviving thread's
/// `help_scan` to reclaim, so nothing is ever stranded.
///
/// 线程对 [`HazardDomain`] 的附加。
/// 句柄是每线程 SMR 状态的显式形式：在生命周期内拥有线程记录，drop 时分离。
/// 它不是 `Send` 也不是 `Sync`；每个线程通过 [`HazardDomain::attach`]
/// 获得自己的句柄。
/// 分离时运行最后一次 `scan`（默认还有一次 `help_scan`）；
/// 仍被其他线程保护的对象留在记录中，由存活线程的 `help_scan` 回收，
/// 因此不会有对象被永久搁置。
pub struct LocalHandle {
    domain: HazardDomain,
    record: *mut ThreadRecord,
}

impl LocalHandle {
    pub(crate) fn new(domain: HazardDomain, record: *mut ThreadRecord) -> Self {
        LocalHandle { domain, record }
    }

    /// Acquire a hazard-pointer slot. The guard cannot outlive this handle.
    /// 获取一个冒险指针槽。守卫不能比句柄活得更久。
    #[inline]
    pub fn guard(&self) -> Guard<'_> {
        unsafe { Guard::acquire(self.record) }
    }

    /// Acquire `N` slots at once, for operations that guard several addresses.
    /// 一次获取 `N` 个槽，用于需要守卫多个地址的操作。
    #[inline]
    pub fn guards<const N: usize>(&self) -> [Guard<'_>; N] {
        std::array::from_fn(|_| self.guard())
    }

    /// Hand a removed object to the reclamation engine. Its `Box` is dropped
    /// once no hazard pointer references it.
    ///
    /// # Safety
    /// `ptr` must come from `Box::into_raw`, must have been unlinked from
    /// every shared location, and must not be retired again.
    ///
    /// 将已移除的对象交给回收引擎。当没有冒险指针引用它时，其 `Box` 被 drop。
    #[inline]
    pub unsafe fn retire<T: Send + 'static>(&self, ptr: *mut T) {
        unsafe { self.retire_with(ptr as *mut (), drop_boxed::<T>) }
    }

    /// Retire with a caller-supplied disposer.
    ///
    /// # Safety
    /// As for [`retire`](LocalHandle::retire); additionally `drop_fn` must be
    /// sound to call exactly once with `ptr` on any thread.
    ///
    /// 用调用者提供的销毁器退休。
    pub unsafe fn retire_with(&self, ptr: *mut (), drop_fn: unsafe fn(*mut ())) {
        self.domain
            .state()
            .retire_on(self.record, Retired::new(ptr, drop_fn));
    }

    /// Run a reclamation pass over this thread's retired objects.
    /// 对本线程的已退休对象执行一次回收。
    #[inline]
    pub fn scan(&self) {
        self.domain.state().scan(self.record);
    }

    /// Inherit and reclaim retirements abandoned by detached threads.
    /// 接管并回收已分离线程遗弃的退休对象。
    #[inline]
    pub fn help_scan(&self) {
        self.domain.state().help_scan(self.record);
    }

    /// The domain this handle is attached to.
    /// 此句柄所附加的域。
    #[inline]
    pub fn domain(&self) -> &HazardDomain {
        &self.domain
    }
}

impl Drop for LocalHandle {
    fn drop(&mut self) {
        self.domain.state().detach_record(self.record);
    }
}
