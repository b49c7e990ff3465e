use crate::guard::Guard;
use crate::handle::LocalHandle;
use crate::sync::{AtomicPtr, Ordering};
use std::marker::PhantomData;

/// A hazard-protected shared pointer, the seam lock-free containers build on.
///
/// `HazardPtr<T>` is an atomic pointer that any attached thread may read
/// through a [`Guard`] and any attached thread may replace; replaced values
/// are retired rather than freed, and reclaimed once no guard references
/// them.
///
/// **Safety contract**:
/// - `load` takes the guard mutably: one slot protects one address at a time,
///   so taking a second reference through the same guard must end the first.
///   The returned reference lives exactly as long as the guard borrow.
/// - All threads touching the same `HazardPtr` must be attached to the same
///   domain.
///
/// **Typical usage**:
/// ```
/// use hazard_smr::{HazardDomain, HazardPtr};
///
/// let domain = HazardDomain::default();
/// let shared = HazardPtr::new(42i32);
///
/// let local = domain.attach();
/// let mut guard = local.guard();
/// let value = shared.load(&mut guard);
/// assert_eq!(*value, 42);
/// drop(guard);
///
/// shared.store(100i32, &local);
/// local.scan();
/// ```
///
/// 受冒险指针保护的共享指针，是无锁容器构建的接缝。
/// `HazardPtr<T>` 是原子指针：任何已附加线程可通过 [`Guard`] 读取，
/// 也可替换；被替换的值先退休而非直接释放，
/// 在没有守卫引用它们之后才被回收。
/// **安全合约**：`load` 可变借用守卫——一个槽一次只保护一个地址，
/// 通过同一守卫取第二个引用必须先结束第一个；
/// 返回引用的生命周期与守卫借用一致。
pub struct HazardPtr<T> {
    ptr: AtomicPtr<T>,
    _owns: PhantomData<T>,
}

impl<T: Send + 'static> HazardPtr<T> {
    /// Create a protected pointer initialized with `value`.
    /// 创建一个初始化为 `value` 的受保护指针。
    #[inline]
    pub fn new(value: T) -> Self {
        HazardPtr {
            ptr: AtomicPtr::new(Box::into_raw(Box::new(value))),
            _owns: PhantomData,
        }
    }

    /// Read the current value under `guard`.
    ///
    /// The publish-and-revalidate loop inside guarantees the returned
    /// reference cannot be reclaimed while the guard borrow lives, even
    /// against concurrent `store` + scan.
    ///
    /// 在 `guard` 保护下读取当前值。
    /// 内部的发布-再验证循环保证：只要守卫借用存在，
    /// 返回的引用就不会被并发的 `store` 与扫描回收。
    #[inline]
    pub fn load<'g>(&self, guard: &'g mut Guard<'_>) -> &'g T {
        let p = guard.protect(&self.ptr);
        debug_assert!(!p.is_null());
        unsafe { &*p }
    }

    /// Replace the value and retire the previous one through `local`.
    /// 替换值，并通过 `local` 退休旧值。
    #[inline]
    pub fn store(&self, value: T, local: &LocalHandle) {
        let fresh = Box::into_raw(Box::new(value));
        let old = self.ptr.swap(fresh, Ordering::Release);
        if !old.is_null() {
            // The swap made `old` unreachable; this thread is its sole owner.
            unsafe { local.retire(old) };
        }
    }
}

impl<T> std::fmt::Debug for HazardPtr<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let p = self.ptr.load(Ordering::Relaxed);
        f.debug_tuple("HazardPtr").field(&p).finish()
    }
}

impl<T> Drop for HazardPtr<T> {
    /// Drops the final value. By then no other thread can be reading it.
    /// drop 最后的值。此时不可能再有其他线程读取它。
    #[inline]
    fn drop(&mut self) {
        let p = self.ptr.load(Ordering::Relaxed);
        if !p.is_null() {
            unsafe { drop(Box::from_raw(p)) }
        }
    }
}
