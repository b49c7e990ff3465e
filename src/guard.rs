use crate::pool::{BlockPool, PoolBlock};
use crate::record::ThreadRecord;
use crate::sync::{AtomicBool, AtomicPtr, Cell, Ordering};
#[cfg(feature = "stat")]
use crate::sync::AtomicUsize;
use std::marker::PhantomData;
use std::ptr;

/// Number of hazard slots in one extension block.
/// 一个扩展块中的冒险指针槽数量。
pub(crate) const GUARD_BLOCK_CAPACITY: usize = 16;

/// One hazard-pointer cell: an address-or-null value published by its owning
/// thread and read by every scanning thread.
///
/// `next_free` is free-chain state touched only by the owning thread.
///
/// 一个冒险指针单元：由拥有线程发布、被所有扫描线程读取的地址或空值。
/// `next_free` 是仅由拥有线程触碰的空闲链状态。
pub(crate) struct HazardSlot {
    value: AtomicPtr<()>,
    next_free: Cell<*mut HazardSlot>,
}

// The owner-only discipline on `next_free` is what makes this sound; `value`
// is an atomic and safe to read from any thread.
unsafe impl Send for HazardSlot {}
unsafe impl Sync for HazardSlot {}

impl HazardSlot {
    fn new() -> Self {
        HazardSlot {
            value: AtomicPtr::new(ptr::null_mut()),
            next_free: Cell::new(ptr::null_mut()),
        }
    }

    /// Publish an address. Release ordering pairs with the acquire loads of
    /// remote scans.
    /// 发布一个地址。Release 顺序与远程扫描的 acquire 读取配对。
    pub(crate) fn set(&self, p: *mut ()) {
        self.value.store(p, Ordering::Release);
    }

    pub(crate) fn clear(&self) {
        self.value.store(ptr::null_mut(), Ordering::Release);
    }

    pub(crate) fn get(&self) -> *mut () {
        self.value.load(Ordering::Acquire)
    }
}

/// A fixed array of hazard slots chained into a thread's guard storage when
/// its inline array runs out.
///
/// 当线程的内联数组用尽时，链入其守卫存储的固定冒险指针槽数组。
pub(crate) struct GuardBlock {
    pool_next: AtomicPtr<GuardBlock>,
    busy: AtomicBool,
    next_block: AtomicPtr<GuardBlock>,
    slots: [HazardSlot; GUARD_BLOCK_CAPACITY],
}

impl GuardBlock {
    fn first_slot(&self) -> *mut HazardSlot {
        self.slots.as_ptr() as *mut HazardSlot
    }
}

impl PoolBlock for GuardBlock {
    fn fresh() -> Self {
        GuardBlock {
            pool_next: AtomicPtr::new(ptr::null_mut()),
            busy: AtomicBool::new(true),
            next_block: AtomicPtr::new(ptr::null_mut()),
            slots: std::array::from_fn(|_| HazardSlot::new()),
        }
    }

    fn pool_next(&self) -> &AtomicPtr<Self> {
        &self.pool_next
    }

    fn busy(&self) -> &AtomicBool {
        &self.busy
    }

    fn reset(&self) {
        // Clear published values and rebuild the internal free chain.
        for i in 0..GUARD_BLOCK_CAPACITY {
            let slot = &self.slots[i];
            slot.value.store(ptr::null_mut(), Ordering::Relaxed);
            let next = if i + 1 < GUARD_BLOCK_CAPACITY {
                &self.slots[i + 1] as *const HazardSlot as *mut HazardSlot
            } else {
                ptr::null_mut()
            };
            slot.next_free.set(next);
        }
        self.next_block.store(ptr::null_mut(), Ordering::Relaxed);
    }
}

/// A thread's full hazard-pointer storage: the inline slot array sized at
/// domain construction, plus extension blocks claimed on demand.
///
/// Written only by the owning thread; read lock-free by every thread running
/// a scan.
///
/// 线程的完整冒险指针存储：在域构建时定大小的内联槽数组，
/// 加上按需认领的扩展块。仅由拥有线程写入；被所有执行扫描的线程无锁读取。
pub(crate) struct GuardStorage {
    free_head: Cell<*mut HazardSlot>,
    inline: Box<[HazardSlot]>,
    extended: AtomicPtr<GuardBlock>,
    #[cfg(feature = "stat")]
    pub(crate) guard_alloc_count: AtomicUsize,
    #[cfg(feature = "stat")]
    pub(crate) guard_free_count: AtomicUsize,
    #[cfg(feature = "stat")]
    pub(crate) extend_count: AtomicUsize,
}

impl GuardStorage {
    pub(crate) fn new(capacity: usize) -> Self {
        GuardStorage {
            free_head: Cell::new(ptr::null_mut()),
            inline: (0..capacity)
                .map(|_| HazardSlot::new())
                .collect::<Vec<_>>()
                .into_boxed_slice(),
            extended: AtomicPtr::new(ptr::null_mut()),
            #[cfg(feature = "stat")]
            guard_alloc_count: AtomicUsize::new(0),
            #[cfg(feature = "stat")]
            guard_free_count: AtomicUsize::new(0),
            #[cfg(feature = "stat")]
            extend_count: AtomicUsize::new(0),
        }
    }

    /// Rebuild the inline free chain. Runs on every attach, fresh or reclaimed.
    /// 重建内联空闲链。在每次附加（新建或回收）时运行。
    pub(crate) fn init(&self) {
        debug_assert!(self.extended.load(Ordering::Relaxed).is_null());
        let mut head = ptr::null_mut();
        for slot in self.inline.iter().rev() {
            slot.value.store(ptr::null_mut(), Ordering::Relaxed);
            slot.next_free.set(head);
            head = slot as *const HazardSlot as *mut HazardSlot;
        }
        self.free_head.set(head);
    }

    /// Take a free slot, extending from the guard-block pool when the local
    /// chain is exhausted.
    /// 取出一个空闲槽；本地链耗尽时从守卫块池扩展。
    pub(crate) fn acquire(&self, pool: &BlockPool<GuardBlock>) -> *mut HazardSlot {
        let mut head = self.free_head.get();
        if head.is_null() {
            self.extend(pool);
            head = self.free_head.get();
        }
        self.free_head.set(unsafe { (*head).next_free.get() });
        #[cfg(feature = "stat")]
        self.guard_alloc_count.fetch_add(1, Ordering::Relaxed);
        head
    }

    /// Clear a slot and thread it back onto the local free chain. Slots are
    /// never deallocated individually.
    /// 清空槽并将其穿回本地空闲链。槽从不单独回收。
    pub(crate) fn release(&self, slot: *mut HazardSlot) {
        unsafe {
            (*slot).clear();
            (*slot).next_free.set(self.free_head.get());
        }
        self.free_head.set(slot);
        #[cfg(feature = "stat")]
        self.guard_free_count.fetch_add(1, Ordering::Relaxed);
    }

    fn extend(&self, pool: &BlockPool<GuardBlock>) {
        debug_assert!(self.free_head.get().is_null());
        let block = pool.alloc();
        unsafe {
            (*block)
                .next_block
                .store(self.extended.load(Ordering::Relaxed), Ordering::Relaxed);
            self.extended.store(block, Ordering::Release);
            self.free_head.set((*block).first_slot());
        }
        #[cfg(feature = "stat")]
        self.extend_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Null every inline hazard and hand every extension block back to the
    /// pool. Runs at detach and at domain teardown.
    /// 清空所有内联冒险指针并把所有扩展块归还给池。在分离和域销毁时运行。
    pub(crate) fn clear(&self, pool: &BlockPool<GuardBlock>) {
        for slot in self.inline.iter() {
            slot.clear();
        }
        let mut block = self.extended.load(Ordering::Relaxed);
        while !block.is_null() {
            let next = unsafe { (*block).next_block.load(Ordering::Relaxed) };
            pool.free(block);
            block = next;
        }
        self.extended.store(ptr::null_mut(), Ordering::Release);
    }

    /// Append every non-null published hazard to `out`. Called by scans on
    /// behalf of any thread.
    /// 把每个非空的已发布冒险指针追加到 `out`。由任意线程的扫描调用。
    pub(crate) fn collect_hazards(&self, out: &mut Vec<*mut ()>) {
        for slot in self.inline.iter() {
            let p = slot.get();
            if !p.is_null() {
                out.push(p);
            }
        }
        let mut block = self.extended.load(Ordering::Acquire);
        while !block.is_null() {
            let b = unsafe { &*block };
            for slot in &b.slots {
                let p = slot.get();
                if !p.is_null() {
                    out.push(p);
                }
            }
            block = b.next_block.load(Ordering::Acquire);
        }
    }
}

/// An owned hazard-pointer slot.
///
/// A `Guard` publishes, for as long as the caller needs, the address the
/// calling thread is about to dereference; no scan will dispose a retired
/// object while some guard still holds its address. Dropping the guard
/// returns the slot to the owning thread's storage.
///
/// A `Guard` must be used only on the thread that created it and must not
/// outlive that thread's attachment; the borrow on [`LocalHandle::guard`]
/// enforces the latter at compile time for the explicit-handle API.
///
/// [`LocalHandle::guard`]: crate::LocalHandle::guard
///
/// 一个被持有的冒险指针槽。
/// `Guard` 在调用者需要的时间内发布调用线程即将解引用的地址；
/// 只要还有守卫持有某地址，任何扫描都不会销毁对应的已退休对象。
/// drop 守卫会把槽还给拥有线程的存储。
#[must_use]
pub struct Guard<'h> {
    record: *mut ThreadRecord,
    slot: *mut HazardSlot,
    _handle: PhantomData<&'h ()>,
}

impl<'h> Guard<'h> {
    /// Take a slot from `record`'s guard storage.
    ///
    /// # Safety
    /// `record` must be the calling thread's currently attached record.
    pub(crate) unsafe fn acquire(record: *mut ThreadRecord) -> Guard<'h> {
        let slot = unsafe {
            let rec = &*record;
            rec.hazards.acquire(&(*rec.domain).guard_pool)
        };
        Guard {
            record,
            slot,
            _handle: PhantomData,
        }
    }

    /// Publish the current value of `src` and keep re-reading until the
    /// published value is still the current one. Returns the stable value.
    ///
    /// The load-publish-reload loop is what closes the race between loading a
    /// pointer and protecting it: a concurrent unlink that the publication
    /// missed is caught by the re-read, because the unlinking store and this
    /// acquire reload are ordered by the source pointer itself.
    ///
    /// 发布 `src` 的当前值并反复重读，直到发布的值仍是当前值，返回稳定值。
    /// 读取-发布-重读循环弥合了加载指针与保护指针之间的竞争窗口。
    pub fn protect<T>(&self, src: &AtomicPtr<T>) -> *mut T {
        let mut cur = src.load(Ordering::Relaxed);
        loop {
            self.set(cur);
            let reread = src.load(Ordering::Acquire);
            if reread == cur {
                return cur;
            }
            cur = reread;
        }
    }

    /// Single-shot form of [`protect`](Guard::protect): publish `p`, then
    /// report whether `src` still holds it. On `false` the caller re-reads
    /// and retries; the stale publication is harmless.
    ///
    /// [`protect`](Guard::protect) 的单次形式：发布 `p`，然后报告 `src`
    /// 是否仍持有它。返回 `false` 时调用者重读并重试。
    pub fn try_protect<T>(&self, p: *mut T, src: &AtomicPtr<T>) -> bool {
        self.set(p);
        src.load(Ordering::Acquire) == p
    }

    /// Publish `p` directly, with no re-validation. For addresses that cannot
    /// change concurrently or are already protected elsewhere.
    /// 直接发布 `p`，不做再验证。用于不会并发变化或已受保护的地址。
    pub fn set<T>(&self, p: *mut T) {
        unsafe {
            (*self.slot).set(p as *mut ());
            (*self.record).sync();
        }
    }

    /// Clear the published value without releasing the slot.
    /// 清空已发布的值，但不释放槽。
    pub fn clear(&self) {
        unsafe { (*self.slot).clear() }
    }

    /// The currently published address.
    /// 当前发布的地址。
    pub fn get(&self) -> *mut () {
        unsafe { (*self.slot).get() }
    }
}

impl Drop for Guard<'_> {
    fn drop(&mut self) {
        unsafe { (*self.record).hazards.release(self.slot) }
    }
}
