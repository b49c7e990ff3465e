use crate::sync::Mutex;
use std::alloc::{self, Layout};
use std::sync::LazyLock;

/// Block-storage allocation function: takes a byte size, returns storage
/// aligned to at least [`BLOCK_ALIGN`].
///
/// 块存储分配函数：接收字节大小，返回至少对齐到 [`BLOCK_ALIGN`] 的存储。
pub type AllocFn = unsafe fn(usize) -> *mut u8;

/// Block-storage release function, paired with an [`AllocFn`].
/// 块存储释放函数，与 [`AllocFn`] 配对。
pub type FreeFn = unsafe fn(*mut u8);

/// Alignment guaranteed by the default hooks and required from custom ones.
/// One cache line, which also covers every block type in this crate.
///
/// 默认钩子保证、自定义钩子必须满足的对齐。
pub const BLOCK_ALIGN: usize = 64;

/// The pair of functions a domain uses for all block storage.
/// Snapshotted once when the domain is built.
///
/// 域用于所有块存储的函数对，在域构建时快照一次。
#[derive(Clone, Copy)]
pub(crate) struct MemoryHooks {
    pub(crate) alloc: AllocFn,
    pub(crate) free: FreeFn,
}

impl MemoryHooks {
    pub(crate) unsafe fn alloc_one<T>(&self) -> *mut T {
        const { assert!(align_of::<T>() <= BLOCK_ALIGN) };
        unsafe { (self.alloc)(size_of::<T>()) as *mut T }
    }

    pub(crate) unsafe fn free_one<T>(&self, p: *mut T) {
        unsafe { (self.free)(p as *mut u8) }
    }
}

impl Default for MemoryHooks {
    fn default() -> Self {
        MemoryHooks {
            alloc: default_alloc,
            free: default_free,
        }
    }
}

// The default hooks keep the allocation size in a one-cache-line header so
// that the free hook does not need a size argument.
// 默认钩子将分配大小保存在一个缓存行的头部中，因此释放钩子不需要大小参数。

unsafe fn default_alloc(size: usize) -> *mut u8 {
    let layout = Layout::from_size_align(size + BLOCK_ALIGN, BLOCK_ALIGN)
        .expect("block allocation size overflow");
    let base = unsafe { alloc::alloc(layout) };
    if base.is_null() {
        // Resource exhaustion is fatal here; nothing above us can recover.
        alloc::handle_alloc_error(layout);
    }
    unsafe {
        (base as *mut usize).write(size);
        base.add(BLOCK_ALIGN)
    }
}

unsafe fn default_free(p: *mut u8) {
    unsafe {
        let base = p.sub(BLOCK_ALIGN);
        let size = (base as *const usize).read();
        let layout = Layout::from_size_align_unchecked(size + BLOCK_ALIGN, BLOCK_ALIGN);
        alloc::dealloc(base, layout);
    }
}

/// Process-wide hook registry. Domains snapshot it at build time, so changing
/// the hooks affects only domains built afterwards.
///
/// 进程级钩子注册表。域在构建时快照，因此更改钩子只影响之后构建的域。
static HOOKS: LazyLock<Mutex<MemoryHooks>> = LazyLock::new(|| Mutex::new(MemoryHooks::default()));

pub(crate) fn current_hooks() -> MemoryHooks {
    *HOOKS.lock()
}

pub(crate) fn install_hooks(alloc_fn: AllocFn, free_fn: FreeFn) {
    *HOOKS.lock() = MemoryHooks {
        alloc: alloc_fn,
        free: free_fn,
    };
}
