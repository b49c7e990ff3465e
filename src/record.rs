use crate::domain::DomainState;
use crate::guard::GuardStorage;
use crate::retired::RetiredList;
use crate::sync::{AtomicBool, AtomicPtr, AtomicU32, AtomicUsize, Ordering};
use std::ptr;

/// Owner value of a record nobody currently holds.
/// 当前无人持有的记录的 owner 值。
pub(crate) const NULL_OWNER: usize = 0;

/// Per-thread SMR state: hazard-pointer storage, the retired list, and the
/// bookkeeping that lets the registry rent records out and take them back.
///
/// Records are pushed onto the registry once and destroyed only with the
/// domain. `owner` holds the attachment ticket of the current holder, or
/// [`NULL_OWNER`]; claiming it by CAS transfers the record, including the
/// right to touch its single-writer interior.
///
/// 每线程 SMR 状态：冒险指针存储、已退休列表，
/// 以及让注册表出租并收回记录的簿记。
/// 记录只推入注册表一次，仅随域销毁。`owner` 保存当前持有者的附加票号或
/// [`NULL_OWNER`]；通过 CAS 认领它即转移记录及触碰其单写内部状态的权利。
#[repr(align(64))]
pub(crate) struct ThreadRecord {
    pub(crate) hazards: GuardStorage,
    pub(crate) retired: RetiredList,
    sync: AtomicU32,
    pub(crate) next: AtomicPtr<ThreadRecord>,
    pub(crate) owner: AtomicUsize,
    pub(crate) free: AtomicBool,
    pub(crate) domain: *const DomainState,
    #[cfg(feature = "stat")]
    pub(crate) free_count: AtomicUsize,
    #[cfg(feature = "stat")]
    pub(crate) scan_count: AtomicUsize,
    #[cfg(feature = "stat")]
    pub(crate) help_scan_count: AtomicUsize,
}

// Sound under the ownership protocol: the interior Cells are touched only by
// the thread whose ticket is in `owner`, and ownership moves through
// acquire/release transitions of that field.
unsafe impl Send for ThreadRecord {}
unsafe impl Sync for ThreadRecord {}

impl ThreadRecord {
    pub(crate) fn new(guard_capacity: usize, domain: *const DomainState, owner: usize) -> Self {
        ThreadRecord {
            hazards: GuardStorage::new(guard_capacity),
            retired: RetiredList::new(),
            sync: AtomicU32::new(0),
            next: AtomicPtr::new(ptr::null_mut()),
            owner: AtomicUsize::new(owner),
            free: AtomicBool::new(false),
            domain,
            #[cfg(feature = "stat")]
            free_count: AtomicUsize::new(0),
            #[cfg(feature = "stat")]
            scan_count: AtomicUsize::new(0),
            #[cfg(feature = "stat")]
            help_scan_count: AtomicUsize::new(0),
        }
    }

    /// Full-fence read-modify-write that puts this record's guard publishes
    /// and a remote scan's guard reads into a single total order.
    /// 全栅栏的读改写操作，使本记录的守卫发布与远程扫描的守卫读取进入同一全序。
    pub(crate) fn sync(&self) {
        self.sync.fetch_add(1, Ordering::AcqRel);
    }
}
