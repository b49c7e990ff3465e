/// 生命周期测试模块
/// 测试记录流转、help_scan 接管、域销毁与进程级单例
use crate::sync::{AtomicPtr, Ordering};
use crate::HazardDomain;
use std::sync::atomic::{AtomicUsize, Ordering as StdOrdering};
use std::thread;

/// 测试1: 场景——线程退休 5 个对象后分离；
/// 另一线程稍后的 help_scan 使全部 5 个销毁器运行
#[test]
fn test_help_scan_rescues_detached_pending() {
    static DROPS: AtomicUsize = AtomicUsize::new(0);

    struct Node(u64);
    impl Drop for Node {
        fn drop(&mut self) {
            DROPS.fetch_add(1, StdOrdering::SeqCst);
        }
    }

    let domain = HazardDomain::new(8);
    let main_local = domain.attach();

    // 地址以 usize 传递，便于跨线程共享
    let nodes: Vec<usize> = (0..5)
        .map(|i| Box::into_raw(Box::new(Node(i))) as usize)
        .collect();

    // 主线程守住全部 5 个地址，让工作线程的分离扫描无法释放它们
    let guards: Vec<_> = nodes
        .iter()
        .map(|&addr| {
            let guard = main_local.guard();
            guard.set(addr as *mut Node);
            guard
        })
        .collect();

    thread::scope(|s| {
        let domain = &domain;
        let nodes = &nodes;
        s.spawn(move || {
            let local = domain.attach();
            for &addr in nodes.iter() {
                unsafe { local.retire(addr as *mut Node) };
            }
            // drop 即分离：对象仍受保护，留在记录中等待接管
        });
    });

    assert_eq!(DROPS.load(StdOrdering::SeqCst), 0);

    drop(guards);
    main_local.help_scan();
    assert_eq!(DROPS.load(StdOrdering::SeqCst), 5);
}

/// 测试2: 有界复用——顺序的附加/分离生命周期只占用一条记录
#[test]
fn test_thread_record_reuse_is_bounded() {
    let domain = HazardDomain::new(4);

    for _ in 0..10 {
        let local = domain.attach();
        let _guard = local.guard();
    }
    assert_eq!(domain.state().registry_len(), 1);

    // 同时持有两条记录，注册表增长到 2
    let h1 = domain.attach();
    let h2 = domain.attach();
    assert_eq!(domain.state().registry_len(), 2);
    drop(h1);
    drop(h2);

    // 之后的生命周期复用这两条记录
    for _ in 0..10 {
        let _local = domain.attach();
    }
    assert_eq!(domain.state().registry_len(), 2);
}

/// 测试3: 域销毁无条件处理仍未决的退休对象
#[test]
fn test_teardown_disposes_pending() {
    static DROPS: AtomicUsize = AtomicUsize::new(0);

    struct Node(u64);
    impl Drop for Node {
        fn drop(&mut self) {
            DROPS.fetch_add(1, StdOrdering::SeqCst);
        }
    }

    let domain = HazardDomain::builder().help_scan_on_detach(false).build();

    let holder = domain.attach();
    let keeper = domain.attach();

    let nodes: Vec<*mut Node> = (0..3).map(|i| Box::into_raw(Box::new(Node(i)))).collect();
    let guards: Vec<_> = nodes
        .iter()
        .map(|&p| {
            let guard = holder.guard();
            guard.set(p);
            guard
        })
        .collect();

    for &p in nodes.iter() {
        unsafe { keeper.retire(p) };
    }
    // keeper 的分离扫描释放不了任何对象，且 help_scan 被关闭
    drop(keeper);
    assert_eq!(DROPS.load(StdOrdering::SeqCst), 0);

    drop(guards);
    drop(holder);
    assert_eq!(DROPS.load(StdOrdering::SeqCst), 0);

    // 销毁域：遗留的 3 个对象被无条件处理
    drop(domain);
    assert_eq!(DROPS.load(StdOrdering::SeqCst), 3);
}

/// 测试4: 进程级单例——构建/销毁幂等、附加/分离幂等、
/// 自定义分配器、destruct 后重新 construct 得到干净的引擎。
/// 单例是进程全局的，因此所有全局层断言集中在这一个测试里。
#[test]
fn test_global_singleton_lifecycle() {
    static ALLOC_CALLS: AtomicUsize = AtomicUsize::new(0);
    static FREE_CALLS: AtomicUsize = AtomicUsize::new(0);
    static DROPS: AtomicUsize = AtomicUsize::new(0);

    unsafe fn counting_alloc(size: usize) -> *mut u8 {
        ALLOC_CALLS.fetch_add(1, StdOrdering::SeqCst);
        let layout =
            std::alloc::Layout::from_size_align(size + crate::BLOCK_ALIGN, crate::BLOCK_ALIGN)
                .unwrap();
        unsafe {
            let base = std::alloc::alloc(layout);
            assert!(!base.is_null());
            (base as *mut usize).write(size);
            base.add(crate::BLOCK_ALIGN)
        }
    }

    unsafe fn counting_free(p: *mut u8) {
        FREE_CALLS.fetch_add(1, StdOrdering::SeqCst);
        unsafe {
            let base = p.sub(crate::BLOCK_ALIGN);
            let size = (base as *const usize).read();
            let layout = std::alloc::Layout::from_size_align_unchecked(
                size + crate::BLOCK_ALIGN,
                crate::BLOCK_ALIGN,
            );
            std::alloc::dealloc(base, layout);
        }
    }

    struct Node(u64);
    impl Drop for Node {
        fn drop(&mut self) {
            DROPS.fetch_add(1, StdOrdering::SeqCst);
        }
    }

    assert!(!crate::is_constructed());
    crate::set_memory_allocator(counting_alloc, counting_free);

    crate::construct(0); // 0 回退到默认的内联槽数
    crate::construct(8); // 幂等：第二次调用为空操作
    assert!(crate::is_constructed());

    crate::attach_thread();
    crate::attach_thread(); // 幂等

    let first = Box::into_raw(Box::new(Node(1)));
    let src = AtomicPtr::new(first);

    let guard = crate::guard();
    assert_eq!(guard.protect(&src), first);

    let second = Box::into_raw(Box::new(Node(2)));
    src.store(second, Ordering::Release);
    unsafe { crate::retire(first) };

    crate::scan();
    assert_eq!(DROPS.load(StdOrdering::SeqCst), 0); // 仍受守卫保护

    drop(guard);
    crate::scan();
    assert_eq!(DROPS.load(StdOrdering::SeqCst), 1);

    unsafe { crate::retire(second) };
    crate::help_scan();
    assert_eq!(DROPS.load(StdOrdering::SeqCst), 2);

    crate::detach_thread();
    crate::detach_thread(); // 幂等

    crate::destruct(true);
    crate::destruct(false); // 幂等
    assert!(!crate::is_constructed());

    // destruct 后重新 construct：引擎回到空注册表
    crate::construct(4);
    crate::attach_thread();
    let third = Box::into_raw(Box::new(Node(3)));
    unsafe { crate::retire(third) };
    crate::detach_thread();
    crate::destruct(false);
    assert_eq!(DROPS.load(StdOrdering::SeqCst), 3);

    assert!(ALLOC_CALLS.load(StdOrdering::SeqCst) > 0);
    assert!(FREE_CALLS.load(StdOrdering::SeqCst) > 0);
}
