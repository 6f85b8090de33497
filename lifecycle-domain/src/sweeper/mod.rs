//! 周期清扫（Sweepers）
//!
//! 单例周期任务及其运行时：
//! - `DeletionSweeper`：到期的删除/计划清空记录 → 物理清理；
//! - `TestTimeoutSweeper`：到期的测试记录 → 向预期主机发送停止通知；
//! - `TriggerDispatcher`：固定节拍通知本地触发器工作者；
//! - `SweeperRuntime`：按周期驱动任务，节拍前查询 `SingletonLease`。
//!
//! 扫描为快照读取，记录处理至少一次，重复执行必须无害。
//!
mod deletion;
mod lease;
mod runtime;
mod test_timeout;
mod trigger;

pub use deletion::DeletionSweeper;
pub use lease::{AlwaysActive, SingletonLease, SwitchLease};
pub use runtime::{PeriodicJob, ScheduledJob, SweeperConfig, SweeperHandle, SweeperRuntime};
pub use test_timeout::TestTimeoutSweeper;
pub use trigger::TriggerDispatcher;

/// 一次扫描的统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// 已到期的记录数
    pub found: usize,
    /// 副作用执行成功
    pub succeeded: usize,
    /// 副作用执行失败（记录仍然移除）
    pub failed: usize,
    /// 本实例实际移除的记录数
    pub removed: usize,
}

impl SweepReport {
    fn found(found: usize) -> Self {
        Self {
            found,
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.found == 0
    }
}
