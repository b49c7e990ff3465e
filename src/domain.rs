use crate::guard::GuardBlock;
use crate::handle::LocalHandle;
use crate::mem;
use crate::pool::BlockPool;
use crate::record::{NULL_OWNER, ThreadRecord};
use crate::retired::{Retired, RetiredBlock};
use crate::stat::Stat;
use crate::sync::{AtomicPtr, AtomicUsize, Ordering};
use std::ptr;
use std::sync::Arc;

/// Inline hazard slots per thread when none is configured.
/// 未配置时每线程的内联冒险指针槽数。
pub(crate) const DEFAULT_HAZARD_COUNT: usize = 16;

/// Smallest accepted inline capacity; anything below falls back to the default.
/// 可接受的最小内联容量；更小的值回退到默认值。
const MIN_HAZARD_COUNT: usize = 4;

/// Builder for configuring a [`HazardDomain`].
///
/// # Example
/// ```
/// use hazard_smr::HazardDomain;
///
/// let domain = HazardDomain::builder()
///     .initial_hazard_count(8)
///     .help_scan_on_detach(true)
///     .build();
/// ```
///
/// 用于配置 [`HazardDomain`] 的构建器。
pub struct HazardDomainBuilder {
    initial_hazard_count: usize,
    help_scan_on_detach: bool,
}

impl HazardDomainBuilder {
    #[inline]
    pub fn new() -> Self {
        HazardDomainBuilder {
            initial_hazard_count: DEFAULT_HAZARD_COUNT,
            help_scan_on_detach: true,
        }
    }

    /// Set the number of inline hazard slots each thread record starts with.
    /// Values below 4 fall back to the default of 16; extension blocks cover
    /// any demand beyond the inline array either way.
    ///
    /// 设置每个线程记录初始的内联冒险指针槽数。小于 4 的值回退到默认的 16。
    #[inline]
    pub fn initial_hazard_count(mut self, count: usize) -> Self {
        self.initial_hazard_count = if count < MIN_HAZARD_COUNT {
            DEFAULT_HAZARD_COUNT
        } else {
            count
        };
        self
    }

    /// Whether a detaching thread also runs [`help_scan`] to inherit other
    /// abandoned records before it goes. Default: `true`.
    ///
    /// [`help_scan`]: crate::LocalHandle::help_scan
    ///
    /// 分离线程在离开前是否也运行 [`help_scan`] 接管其他被遗弃的记录。
    /// 默认：`true`。
    #[inline]
    pub fn help_scan_on_detach(mut self, enabled: bool) -> Self {
        self.help_scan_on_detach = enabled;
        self
    }

    /// Build the domain with the configured settings. The block-storage
    /// allocation hooks are snapshotted here.
    /// 用配置的设置构建域。块存储分配钩子在此处快照。
    #[inline]
    pub fn build(self) -> HazardDomain {
        let hooks = mem::current_hooks();
        HazardDomain {
            state: Arc::new(DomainState {
                registry: AtomicPtr::new(ptr::null_mut()),
                guard_pool: BlockPool::new(hooks),
                retired_pool: BlockPool::new(hooks),
                initial_hazard_count: self.initial_hazard_count,
                help_scan_on_detach: self.help_scan_on_detach,
                next_owner: AtomicUsize::new(1),
                last_plist_size: AtomicUsize::new(self.initial_hazard_count * 64),
            }),
        }
    }
}

impl Default for HazardDomainBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A hazard-pointer safe-memory-reclamation domain.
///
/// The domain owns the lock-free registry of per-thread records and the two
/// block pools, and drives the reclamation passes. It is the service-object
/// form of the engine: clone it freely, hand a clone to every thread that
/// participates, and let each thread call [`attach`](HazardDomain::attach)
/// once to receive its [`LocalHandle`].
///
/// Dropping the last clone (with every handle already gone) tears the engine
/// down, disposing any retired object still pending — valid because no thread
/// can hold a guard at that point.
///
/// The process-wide singleton layer in this crate
/// ([`construct`](crate::construct) / [`attach_thread`](crate::attach_thread))
/// manages one shared `HazardDomain` behind a thread-local cache.
///
/// 基于冒险指针的安全内存回收域。
/// 域拥有每线程记录的无锁注册表和两个块池，并驱动回收过程。
/// 可以自由克隆，把克隆交给每个参与线程，各线程调用一次
/// [`attach`](HazardDomain::attach) 获得自己的 [`LocalHandle`]。
/// 最后一个克隆（且所有句柄已消失）被 drop 时引擎销毁，
/// 无条件处理所有仍挂起的已退休对象。
#[derive(Clone)]
pub struct HazardDomain {
    state: Arc<DomainState>,
}

impl HazardDomain {
    /// Create a domain with `initial_hazard_count` inline slots per thread.
    /// 创建一个每线程带 `initial_hazard_count` 个内联槽的域。
    #[inline]
    pub fn new(initial_hazard_count: usize) -> Self {
        Self::builder()
            .initial_hazard_count(initial_hazard_count)
            .build()
    }

    #[inline]
    pub fn builder() -> HazardDomainBuilder {
        HazardDomainBuilder::new()
    }

    /// Attach the calling thread, claiming a recycled record or registering a
    /// fresh one. A thread normally attaches once and keeps the handle for as
    /// long as it uses the domain; the handle detaches on drop.
    ///
    /// 附加调用线程：认领回收的记录或注册新记录。
    /// 线程通常附加一次并在使用期间保留句柄；句柄在 drop 时分离。
    pub fn attach(&self) -> LocalHandle {
        let record = self.state.attach_record();
        LocalHandle::new(self.clone(), record)
    }

    /// Gather the internal counters. All zeros unless the crate is built with
    /// the `stat` feature.
    /// 收集内部计数器。除非以 `stat` 特性构建，否则全为零。
    pub fn statistics(&self) -> Stat {
        self.state.statistics()
    }

    pub(crate) fn state(&self) -> &Arc<DomainState> {
        &self.state
    }
}

impl Default for HazardDomain {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Shared engine state behind a [`HazardDomain`].
/// [`HazardDomain`] 背后的共享引擎状态。
pub(crate) struct DomainState {
    /// Head of the lock-free record registry.
    registry: AtomicPtr<ThreadRecord>,
    pub(crate) guard_pool: BlockPool<GuardBlock>,
    pub(crate) retired_pool: BlockPool<RetiredBlock>,
    initial_hazard_count: usize,
    help_scan_on_detach: bool,
    /// Attachment ticket source; 0 is reserved for "unowned".
    next_owner: AtomicUsize,
    /// Hazard count seen by the last scan, to presize the next plist.
    last_plist_size: AtomicUsize,
}

impl DomainState {
    /// Claim a free record or push a fresh one onto the registry.
    /// 认领空闲记录或向注册表推入新记录。
    pub(crate) fn attach_record(self: &Arc<Self>) -> *mut ThreadRecord {
        let ticket = self.next_owner.fetch_add(1, Ordering::Relaxed);

        // First try to reuse a record whose owner has detached.
        let mut rec = self.registry.load(Ordering::Acquire);
        while !rec.is_null() {
            let r = unsafe { &*rec };
            if r.owner.load(Ordering::Relaxed) == NULL_OWNER
                && r.owner
                    .compare_exchange(NULL_OWNER, ticket, Ordering::Acquire, Ordering::Relaxed)
                    .is_ok()
            {
                r.free.store(false, Ordering::Release);
                r.hazards.init();
                r.retired.init(&self.retired_pool);
                return rec;
            }
            rec = r.next.load(Ordering::Relaxed);
        }

        // None available for reuse: register a fresh record.
        let fresh = Box::into_raw(Box::new(ThreadRecord::new(
            self.initial_hazard_count,
            Arc::as_ptr(self),
            ticket,
        )));
        unsafe {
            (*fresh).hazards.init();
            (*fresh).retired.init(&self.retired_pool);
        }
        let mut head = self.registry.load(Ordering::Relaxed);
        loop {
            unsafe { (*fresh).next.store(head, Ordering::Relaxed) };
            match self
                .registry
                .compare_exchange_weak(head, fresh, Ordering::Release, Ordering::Acquire)
            {
                Ok(_) => break,
                Err(current) => head = current,
            }
        }
        fresh
    }

    /// Release a record back to the registry: clear its guards, reclaim what
    /// is already safe, optionally inherit other abandoned records, and mark
    /// it claimable. Pending retirements stay behind for a future
    /// [`help_scan`](DomainState::help_scan).
    ///
    /// 把记录释放回注册表：清空守卫、回收已经安全的对象、
    /// 可选地接管其他被遗弃的记录，并标记为可认领。
    /// 未决的退休对象留待将来的 `help_scan` 处理。
    pub(crate) fn detach_record(&self, rec: *mut ThreadRecord) {
        self.detach_record_inner(rec, self.help_scan_on_detach)
    }

    fn detach_record_inner(&self, rec: *mut ThreadRecord, call_help_scan: bool) {
        let r = unsafe { &*rec };
        debug_assert_ne!(r.owner.load(Ordering::Relaxed), NULL_OWNER);

        r.hazards.clear(&self.guard_pool);
        self.scan(rec);
        if call_help_scan {
            self.help_scan(rec);
        }

        if r.retired.is_empty() {
            r.retired.fini(&self.retired_pool);
            r.free.store(true, Ordering::Release);
        } else {
            r.retired.trim_trailing(&self.retired_pool);
        }
        r.owner.store(NULL_OWNER, Ordering::Release);
    }

    /// Force-detach every still-owned record. Valid only once all application
    /// threads have stopped using the domain.
    /// 强制分离所有仍被持有的记录。仅当所有应用线程已停止使用该域时有效。
    pub(crate) fn detach_all(&self) {
        let mut rec = self.registry.load(Ordering::Acquire);
        while !rec.is_null() {
            let r = unsafe { &*rec };
            let next = r.next.load(Ordering::Relaxed);
            if r.owner.load(Ordering::Relaxed) != NULL_OWNER {
                self.detach_record_inner(rec, false);
            }
            rec = next;
        }
    }

    /// Append to `rec`'s retired list; a full list triggers an immediate scan.
    /// 追加到 `rec` 的退休列表；列表满则立即触发一次扫描。
    pub(crate) fn retire_on(&self, rec: *mut ThreadRecord, entry: Retired) {
        let r = unsafe { &*rec };
        #[cfg(feature = "stat")]
        r.retired.retire_count.fetch_add(1, Ordering::Relaxed);
        if !r.retired.push(entry) {
            self.scan(rec);
        }
    }

    /// The reclamation pass: dispose exactly those of `rec`'s retired objects
    /// that no hazard pointer anywhere in the process still references.
    ///
    /// 回收过程：销毁 `rec` 的已退休对象中恰好不再被进程内任何冒险指针
    /// 引用的那些。
    pub(crate) fn scan(&self, rec: *mut ThreadRecord) {
        let r = unsafe { &*rec };
        r.sync();
        #[cfg(feature = "stat")]
        r.scan_count.fetch_add(1, Ordering::Relaxed);

        // Stage 1: gather every live record's published hazards.
        let mut plist: Vec<*mut ()> =
            Vec::with_capacity(self.last_plist_size.load(Ordering::Relaxed));
        let mut node = self.registry.load(Ordering::Acquire);
        while !node.is_null() {
            let n = unsafe { &*node };
            if n.owner.load(Ordering::Relaxed) != NULL_OWNER {
                n.hazards.collect_hazards(&mut plist);
            }
            node = n.next.load(Ordering::Relaxed);
        }

        let remembered = self.last_plist_size.load(Ordering::Relaxed);
        if plist.len() > remembered {
            let _ = self.last_plist_size.compare_exchange(
                remembered,
                plist.len(),
                Ordering::Relaxed,
                Ordering::Relaxed,
            );
        }
        plist.sort_unstable();

        // Stage 2: walk the retired list from its head to the pre-scan
        // cursor; every entry is either disposed or repushed, never both.
        let retired = &r.retired;
        let last_block = retired.current_block.get();
        let last_cell = retired.current_cell.get();
        debug_assert!(!last_block.is_null());
        retired.rewind();

        let mut walked = 0usize;
        let mut freed = 0usize;
        let mut block = retired.head.get();
        loop {
            let end_block = block == last_block;
            let end = if end_block {
                last_cell
            } else {
                unsafe { (*block).last() }
            };
            let mut cell = unsafe { (*block).first() };
            while cell != end {
                let entry = unsafe { ptr::read(cell) };
                if plist.binary_search(&entry.address()).is_ok() {
                    retired.repush(entry);
                } else {
                    unsafe { entry.dispose() };
                    freed += 1;
                }
                walked += 1;
                cell = unsafe { cell.add(1) };
            }
            if end_block {
                break;
            }
            block = unsafe { (*block).next() };
        }
        #[cfg(feature = "stat")]
        r.free_count.fetch_add(freed, Ordering::Relaxed);

        // Mostly-still-protected and fully occupied: grow instead of letting
        // the next pass thrash over the same survivors.
        let fully_occupied = last_block == retired.tail.get()
            && last_cell == unsafe { (*last_block).last() };
        if freed < walked / 4 && fully_occupied {
            retired.extend(&self.retired_pool);
        }
    }

    /// Inherit pending retirements from records whose owner already detached,
    /// then scan the enlarged set. A lost claim is skipped: either another
    /// helper got there first or a live owner holds the record.
    ///
    /// 接管拥有者已分离的记录中未决的退休对象，然后扫描扩大后的集合。
    /// 认领失败即跳过：要么别的帮助者抢先，要么记录被存活的拥有者持有。
    pub(crate) fn help_scan(&self, rec: *mut ThreadRecord) {
        let me = unsafe { &*rec };
        let ticket = me.owner.load(Ordering::Relaxed);
        debug_assert_ne!(ticket, NULL_OWNER);
        #[cfg(feature = "stat")]
        me.help_scan_count.fetch_add(1, Ordering::Relaxed);

        let mut node = self.registry.load(Ordering::Acquire);
        while !node.is_null() {
            let donor = unsafe { &*node };
            let next = donor.next.load(Ordering::Relaxed);
            if ptr::eq(node, rec) {
                node = next;
                continue;
            }
            // free == true means the retired list is already empty.
            if donor.free.load(Ordering::Acquire) {
                node = next;
                continue;
            }
            if donor.owner.load(Ordering::Relaxed) != NULL_OWNER
                || donor
                    .owner
                    .compare_exchange(NULL_OWNER, ticket, Ordering::Acquire, Ordering::Relaxed)
                    .is_err()
            {
                node = next;
                continue;
            }

            // The donor record is ours now; move its pending retirements
            // into our own list.
            donor.sync();
            let src = &donor.retired;
            let src_block_end = src.current_block.get();
            let src_cell_end = src.current_cell.get();
            let mut block = src.head.get();
            while !block.is_null() {
                let end = if block == src_block_end {
                    src_cell_end
                } else {
                    unsafe { (*block).last() }
                };
                let mut cell = unsafe { (*block).first() };
                while cell != end {
                    let entry = unsafe { ptr::read(cell) };
                    if !me.retired.push(entry) {
                        self.scan(rec);
                    }
                    cell = unsafe { cell.add(1) };
                }
                if block == src_block_end {
                    break;
                }
                block = unsafe { (*block).next() };
            }

            src.fini(&self.retired_pool);
            donor.free.store(true, Ordering::Relaxed);
            donor.owner.store(NULL_OWNER, Ordering::Release);

            node = next;
        }

        self.scan(rec);
    }

    pub(crate) fn statistics(&self) -> Stat {
        #[allow(unused_mut)]
        let mut st = Stat::default();
        #[cfg(feature = "stat")]
        {
            let mut node = self.registry.load(Ordering::Acquire);
            while !node.is_null() {
                let r = unsafe { &*node };
                st.thread_record_count += 1;
                st.guard_allocated += r.hazards.guard_alloc_count.load(Ordering::Relaxed);
                st.guard_freed += r.hazards.guard_free_count.load(Ordering::Relaxed);
                st.guard_extend_count += r.hazards.extend_count.load(Ordering::Relaxed);
                st.retired_count += r.retired.retire_count.load(Ordering::Relaxed);
                st.retired_extend_count += r.retired.extend_count.load(Ordering::Relaxed);
                st.free_count += r.free_count.load(Ordering::Relaxed);
                st.scan_count += r.scan_count.load(Ordering::Relaxed);
                st.help_scan_count += r.help_scan_count.load(Ordering::Relaxed);
                node = r.next.load(Ordering::Relaxed);
            }
            st.guard_block_count = self.guard_pool.allocated_blocks();
            st.retired_block_count = self.retired_pool.allocated_blocks();
        }
        st
    }

    #[cfg(test)]
    pub(crate) fn registry_len(&self) -> usize {
        let mut count = 0;
        let mut node = self.registry.load(Ordering::Acquire);
        while !node.is_null() {
            count += 1;
            node = unsafe { (*node).next.load(Ordering::Relaxed) };
        }
        count
    }
}

impl Drop for DomainState {
    /// Teardown: dispose every retired object still pending in any record,
    /// then release all records. The block pools free their storage right
    /// after. Callers guarantee that no thread is attached anymore.
    ///
    /// 销毁：无条件处理所有记录中仍未决的已退休对象，然后释放全部记录。
    /// 块池随后释放其存储。调用方保证已没有线程处于附加状态。
    fn drop(&mut self) {
        let mut rec = self.registry.load(Ordering::Relaxed);
        self.registry.store(ptr::null_mut(), Ordering::Relaxed);
        while !rec.is_null() {
            let r = unsafe { &*rec };
            unsafe { r.retired.drain_dispose() };
            r.retired.fini(&self.retired_pool);
            r.hazards.clear(&self.guard_pool);
            let next = r.next.load(Ordering::Relaxed);
            drop(unsafe { Box::from_raw(rec) });
            rec = next;
        }
    }
}
