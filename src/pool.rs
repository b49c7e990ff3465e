use crate::mem::MemoryHooks;
use crate::sync::{AtomicBool, AtomicPtr, Ordering};
#[cfg(feature = "stat")]
use crate::sync::AtomicUsize;
use std::ptr;

/// A fixed-capacity block that can live in a [`BlockPool`].
///
/// Blocks carry their own pool link and busy flag so the pool needs no side
/// tables. `fresh()` must produce a block whose busy flag is already set:
/// the creating thread owns it until the first `free()`.
///
/// 可以存放于 [`BlockPool`] 中的固定容量块。
/// 块自带池链接和占用标志。`fresh()` 必须产生占用标志已置位的块：
/// 创建它的线程在第一次 `free()` 之前拥有它。
pub(crate) trait PoolBlock: Sized {
    fn fresh() -> Self;
    fn pool_next(&self) -> &AtomicPtr<Self>;
    fn busy(&self) -> &AtomicBool;
    /// Reinitialize logical contents. Runs after every successful claim;
    /// block storage is reused as-is across claims.
    fn reset(&self);
}

/// Process-wide, lock-free recycling allocator for fixed-capacity blocks.
///
/// Every block ever allocated stays on a grow-only master chain; a claim is a
/// CAS on the block's busy flag and a release is a plain store. Storage is
/// returned to the system only when the pool itself is dropped, together with
/// the owning domain.
///
/// 进程级、无锁的固定容量块回收分配器。
/// 所有分配过的块都留在一条只增不减的主链上；认领是对块占用标志的 CAS，
/// 释放是一次普通 store。存储只在池本身随所属域一起销毁时才归还给系统。
pub(crate) struct BlockPool<B: PoolBlock> {
    head: AtomicPtr<B>,
    hooks: MemoryHooks,
    #[cfg(feature = "stat")]
    allocated: AtomicUsize,
}

impl<B: PoolBlock> BlockPool<B> {
    pub(crate) fn new(hooks: MemoryHooks) -> Self {
        BlockPool {
            head: AtomicPtr::new(ptr::null_mut()),
            hooks,
            #[cfg(feature = "stat")]
            allocated: AtomicUsize::new(0),
        }
    }

    /// Claim a recycled block, or allocate fresh backing storage if every
    /// block on the chain is busy. The returned block is reset and owned by
    /// the caller.
    ///
    /// 认领一个回收的块；若链上的块都被占用则分配新的后备存储。
    pub(crate) fn alloc(&self) -> *mut B {
        let mut p = self.head.load(Ordering::Acquire);
        while !p.is_null() {
            let block = unsafe { &*p };
            if !block.busy().load(Ordering::Relaxed)
                && block
                    .busy()
                    .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
                    .is_ok()
            {
                block.reset();
                return p;
            }
            p = block.pool_next().load(Ordering::Relaxed);
        }

        let fresh = unsafe { self.hooks.alloc_one::<B>() };
        unsafe { ptr::write(fresh, B::fresh()) };
        #[cfg(feature = "stat")]
        self.allocated.fetch_add(1, Ordering::Relaxed);

        // Classic lock-free head insertion; the block is already busy, so
        // publishing it cannot hand it to anyone else.
        let mut head = self.head.load(Ordering::Relaxed);
        loop {
            unsafe { (*fresh).pool_next().store(head, Ordering::Relaxed) };
            match self
                .head
                .compare_exchange_weak(head, fresh, Ordering::Release, Ordering::Acquire)
            {
                Ok(_) => break,
                Err(current) => head = current,
            }
        }
        unsafe { (*fresh).reset() };
        fresh
    }

    /// Hand a block back for reuse. The caller must not touch it afterwards.
    /// 归还一个块以供复用。之后调用者不得再接触它。
    pub(crate) fn free(&self, block: *mut B) {
        unsafe { (*block).busy().store(false, Ordering::Release) };
    }

    #[cfg(feature = "stat")]
    pub(crate) fn allocated_blocks(&self) -> usize {
        self.allocated.load(Ordering::Relaxed)
    }
}

impl<B: PoolBlock> Drop for BlockPool<B> {
    fn drop(&mut self) {
        let mut p = self.head.load(Ordering::Relaxed);
        while !p.is_null() {
            let next = unsafe { (*p).pool_next().load(Ordering::Relaxed) };
            unsafe {
                ptr::drop_in_place(p);
                self.hooks.free_one(p);
            }
            p = next;
        }
    }
}
