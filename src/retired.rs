use crate::pool::{BlockPool, PoolBlock};
use crate::sync::{AtomicBool, AtomicPtr, Cell, Ordering};
#[cfg(feature = "stat")]
use crate::sync::AtomicUsize;
use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::ptr;

/// Number of retired entries in one block.
/// 一个块中已退休条目的数量。
pub(crate) const RETIRED_BLOCK_CAPACITY: usize = 256;

/// An object removed from a container but not yet provably safe to destroy:
/// the erased address plus the destructor that knows its concrete type.
/// Consumed exactly once — disposed, or carried forward by a scan.
///
/// 已从容器中移除但尚不能证明可安全销毁的对象：
/// 擦除类型的地址加上知道其具体类型的析构函数。
/// 恰好被消费一次——被销毁，或被扫描继续保留。
#[derive(Clone, Copy)]
pub(crate) struct Retired {
    ptr: *mut (),
    drop_fn: unsafe fn(*mut ()),
}

impl Retired {
    pub(crate) fn new(ptr: *mut (), drop_fn: unsafe fn(*mut ())) -> Self {
        Retired { ptr, drop_fn }
    }

    pub(crate) fn address(&self) -> *mut () {
        self.ptr
    }

    /// Run the destructor. The entry must not be used again.
    ///
    /// # Safety
    /// The address must still be owned by this entry and unreferenced by any
    /// published hazard pointer.
    pub(crate) unsafe fn dispose(self) {
        unsafe { (self.drop_fn)(self.ptr) }
    }
}

/// Disposer for objects retired through the typed API: reconstitutes the
/// `Box<T>` and drops it.
/// 通过带类型 API 退休的对象的销毁器：重建 `Box<T>` 并 drop 它。
pub(crate) unsafe fn drop_boxed<T>(ptr: *mut ()) {
    unsafe { drop(Box::from_raw(ptr as *mut T)) }
}

/// A fixed-capacity segment of a thread's retired list.
///
/// Cell contents are valid only up to the owning list's write cursor; the
/// storage is reused uninitialized across pool claims.
///
/// 线程已退休列表的固定容量段。
/// 单元内容仅在所属列表写游标之前有效；存储在池认领之间未初始化地复用。
pub(crate) struct RetiredBlock {
    pool_next: AtomicPtr<RetiredBlock>,
    busy: AtomicBool,
    next: Cell<*mut RetiredBlock>,
    cells: UnsafeCell<[MaybeUninit<Retired>; RETIRED_BLOCK_CAPACITY]>,
}

// Accessed only by the list's owner, or by a helper that claimed ownership of
// the enclosing record through its owner field.
unsafe impl Send for RetiredBlock {}
unsafe impl Sync for RetiredBlock {}

impl RetiredBlock {
    pub(crate) fn first(&self) -> *mut Retired {
        self.cells.get() as *mut Retired
    }

    pub(crate) fn last(&self) -> *mut Retired {
        unsafe { self.first().add(RETIRED_BLOCK_CAPACITY) }
    }

    pub(crate) fn next(&self) -> *mut RetiredBlock {
        self.next.get()
    }

    pub(crate) fn set_next(&self, block: *mut RetiredBlock) {
        self.next.set(block)
    }
}

impl PoolBlock for RetiredBlock {
    fn fresh() -> Self {
        RetiredBlock {
            pool_next: AtomicPtr::new(ptr::null_mut()),
            busy: AtomicBool::new(true),
            next: Cell::new(ptr::null_mut()),
            cells: UnsafeCell::new([MaybeUninit::uninit(); RETIRED_BLOCK_CAPACITY]),
        }
    }

    fn pool_next(&self) -> &AtomicPtr<Self> {
        &self.pool_next
    }

    fn busy(&self) -> &AtomicBool {
        &self.busy
    }

    fn reset(&self) {
        self.next.set(ptr::null_mut());
    }
}

/// A thread's list of retired objects pending reclamation: a chain of blocks
/// plus a write cursor.
///
/// Written only by its owner during normal operation. Ownership moves to a
/// helping thread atomically, through the enclosing record's owner field,
/// before `help_scan` reads any of these cells.
///
/// 线程待回收的已退休对象列表：块链加写游标。
/// 正常运行中仅由拥有者写入。在 `help_scan` 读取这些单元之前，
/// 所有权通过所属记录的 owner 字段原子地转移给帮助线程。
pub(crate) struct RetiredList {
    pub(crate) head: Cell<*mut RetiredBlock>,
    pub(crate) tail: Cell<*mut RetiredBlock>,
    pub(crate) current_block: Cell<*mut RetiredBlock>,
    pub(crate) current_cell: Cell<*mut Retired>,
    pub(crate) block_count: Cell<usize>,
    #[cfg(feature = "stat")]
    pub(crate) retire_count: AtomicUsize,
    #[cfg(feature = "stat")]
    pub(crate) extend_count: AtomicUsize,
}

impl RetiredList {
    pub(crate) fn new() -> Self {
        RetiredList {
            head: Cell::new(ptr::null_mut()),
            tail: Cell::new(ptr::null_mut()),
            current_block: Cell::new(ptr::null_mut()),
            current_cell: Cell::new(ptr::null_mut()),
            block_count: Cell::new(0),
            #[cfg(feature = "stat")]
            retire_count: AtomicUsize::new(0),
            #[cfg(feature = "stat")]
            extend_count: AtomicUsize::new(0),
        }
    }

    /// Prepare the first block. No-op when the list still carries blocks from
    /// a previous owner; the new owner simply continues behind the cursor.
    /// 准备第一个块。若列表还带有上一个拥有者的块则为空操作。
    pub(crate) fn init(&self, pool: &BlockPool<RetiredBlock>) {
        if self.head.get().is_null() {
            let block = pool.alloc();
            self.head.set(block);
            self.tail.set(block);
            self.current_block.set(block);
            self.current_cell.set(unsafe { (*block).first() });
            self.block_count.set(1);
        }
    }

    /// Return every block to the pool. Entries must already be resolved.
    /// 将所有块归还给池。条目必须已全部处理完毕。
    pub(crate) fn fini(&self, pool: &BlockPool<RetiredBlock>) {
        let mut block = self.head.get();
        while !block.is_null() {
            let next = unsafe { (*block).next() };
            pool.free(block);
            block = next;
        }
        self.head.set(ptr::null_mut());
        self.tail.set(ptr::null_mut());
        self.current_block.set(ptr::null_mut());
        self.current_cell.set(ptr::null_mut());
        self.block_count.set(0);
    }

    /// Store `entry` at the cursor and advance.
    ///
    /// Returns `false` exactly when the entry landed in the last cell of the
    /// tail block: the entry IS stored, but the caller must run a scan (which
    /// compacts or extends) before pushing again.
    ///
    /// 在游标处存入 `entry` 并前进。
    /// 恰在条目落入尾块最后一个单元时返回 `false`：条目已存入，
    /// 但调用者必须先执行一次扫描（压缩或扩展）才能再次推入。
    pub(crate) fn push(&self, entry: Retired) -> bool {
        let block = self.current_block.get();
        let cell = self.current_cell.get();
        debug_assert!(!block.is_null());
        debug_assert!(cell < unsafe { (*block).last() });

        unsafe { ptr::write(cell, entry) };
        let next_cell = unsafe { cell.add(1) };
        if next_cell == unsafe { (*block).last() } {
            let next_block = unsafe { (*block).next() };
            if !next_block.is_null() {
                self.current_block.set(next_block);
                self.current_cell.set(unsafe { (*next_block).first() });
                return true;
            }
            self.current_cell.set(next_cell);
            return false;
        }
        self.current_cell.set(next_cell);
        true
    }

    /// Keep a still-protected entry, compacting survivors toward the head.
    /// Only called by a scan, behind its rewound cursor; a tail-boundary
    /// result here is resolved by the scan's own extend pass.
    ///
    /// 保留仍受保护的条目，把幸存者向头部压缩。只由扫描在回绕游标之后调用。
    pub(crate) fn repush(&self, entry: Retired) {
        let _ = self.push(entry);
    }

    /// Park the cursor back at the very first cell. The scan then re-resolves
    /// every entry up to the old cursor exactly once.
    /// 将游标停回第一个单元。随后扫描把旧游标之前的每个条目恰好处理一次。
    pub(crate) fn rewind(&self) {
        let head = self.head.get();
        self.current_block.set(head);
        self.current_cell.set(unsafe { (*head).first() });
    }

    /// Grow capacity by one block. Invoked by a scan that freed less than a
    /// quarter of what it walked while the list was fully occupied.
    /// 增加一个块的容量。由一次在列表全满时释放量不足四分之一的扫描触发。
    pub(crate) fn extend(&self, pool: &BlockPool<RetiredBlock>) {
        let block = pool.alloc();
        let tail = self.tail.get();
        unsafe { (*tail).set_next(block) };
        self.tail.set(block);
        // If the cursor was parked on the exhausted tail, move it into the
        // fresh block so the next push has a valid cell.
        if self.current_block.get() == tail
            && self.current_cell.get() == unsafe { (*tail).last() }
        {
            self.current_block.set(block);
            self.current_cell.set(unsafe { (*block).first() });
        }
        self.block_count.set(self.block_count.get() + 1);
        #[cfg(feature = "stat")]
        self.extend_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Return trailing blocks the cursor has not reached to the pool, keeping
    /// the occupied prefix for a future `help_scan` to claim.
    /// 将游标未达到的尾部块归还给池，保留已占用的前缀供将来的 `help_scan` 认领。
    pub(crate) fn trim_trailing(&self, pool: &BlockPool<RetiredBlock>) {
        let current = self.current_block.get();
        let mut block = unsafe { (*current).next() };
        if block.is_null() {
            return;
        }
        unsafe { (*current).set_next(ptr::null_mut()) };
        self.tail.set(current);
        while !block.is_null() {
            let next = unsafe { (*block).next() };
            pool.free(block);
            self.block_count.set(self.block_count.get() - 1);
            block = next;
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        let current = self.current_block.get();
        current.is_null()
            || (current == self.head.get()
                && self.current_cell.get() == unsafe { (*current).first() })
    }

    /// Unconditionally dispose every stored entry and park the cursor empty.
    /// Valid only at domain teardown, when no thread can hold a guard.
    ///
    /// 无条件销毁每个已存条目并将游标停为空。
    /// 仅在域销毁时有效，此时不可能有线程持有守卫。
    pub(crate) unsafe fn drain_dispose(&self) -> usize {
        let current = self.current_block.get();
        if current.is_null() {
            return 0;
        }
        let cursor = self.current_cell.get();
        let mut count = 0;
        let mut block = self.head.get();
        while !block.is_null() {
            let end = if block == current {
                cursor
            } else {
                unsafe { (*block).last() }
            };
            let mut cell = unsafe { (*block).first() };
            while cell != end {
                let entry = unsafe { ptr::read(cell) };
                unsafe { entry.dispose() };
                count += 1;
                cell = unsafe { cell.add(1) };
            }
            if block == current {
                break;
            }
            block = unsafe { (*block).next() };
        }
        self.rewind();
        count
    }
}
