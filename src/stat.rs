/// Internal statistics of a domain.
///
/// Gathering is compiled in only with the `stat` cargo feature; the default
/// build carries no counters and [`statistics`](crate::statistics) returns
/// zeros. Counters are informational and gathered with relaxed reads while
/// other threads keep running.
///
/// 域的内部统计。
/// 仅在启用 `stat` 特性时编译计数；默认构建不带计数器，
/// [`statistics`](crate::statistics) 返回零。
/// 计数器仅供参考，在其他线程运行时以 relaxed 读取收集。
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Stat {
    /// Hazard slots handed out.
    /// 发放出去的冒险指针槽数。
    pub guard_allocated: usize,
    /// Hazard slots returned to their storage.
    /// 归还给存储的冒险指针槽数。
    pub guard_freed: usize,
    /// Guard-storage extension calls.
    /// 守卫存储扩展次数。
    pub guard_extend_count: usize,
    /// Objects handed to `retire`.
    /// 交给 `retire` 的对象数。
    pub retired_count: usize,
    /// Objects actually disposed by scans.
    /// 被扫描实际销毁的对象数。
    pub free_count: usize,
    /// `scan()` invocations.
    /// `scan()` 调用次数。
    pub scan_count: usize,
    /// `help_scan()` invocations.
    /// `help_scan()` 调用次数。
    pub help_scan_count: usize,
    /// Thread records on the registry.
    /// 注册表上的线程记录数。
    pub thread_record_count: usize,
    /// Guard blocks ever allocated by the pool.
    /// 守卫块池累计分配的块数。
    pub guard_block_count: usize,
    /// Retired blocks ever allocated by the pool.
    /// 退休块池累计分配的块数。
    pub retired_block_count: usize,
    /// Retired-list extension calls.
    /// 退休列表扩展次数。
    pub retired_extend_count: usize,
}
