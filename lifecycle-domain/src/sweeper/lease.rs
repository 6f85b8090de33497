//! 单例租约（SingletonLease）
//!
//! 由外部提供的“集群内同一周期任务至多一个活跃实例”的原语。
//! 运行时在每次节拍前查询租约，未持有时跳过本次节拍。
//!
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[async_trait]
pub trait SingletonLease: Send + Sync {
    /// 当前实例是否持有 `job` 的租约
    async fn is_active(&self, job: &str) -> bool;
}

/// 单实例部署：始终持有租约
#[derive(Clone, Copy, Debug, Default)]
pub struct AlwaysActive;

#[async_trait]
impl SingletonLease for AlwaysActive {
    async fn is_active(&self, _job: &str) -> bool {
        true
    }
}

/// 由外部选主结果驱动的租约开关
#[derive(Clone, Debug, Default)]
pub struct SwitchLease {
    active: Arc<AtomicBool>,
}

impl SwitchLease {
    pub fn new(active: bool) -> Self {
        Self {
            active: Arc::new(AtomicBool::new(active)),
        }
    }

    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::Release);
    }
}

#[async_trait]
impl SingletonLease for SwitchLease {
    async fn is_active(&self, _job: &str) -> bool {
        self.active.load(Ordering::Acquire)
    }
}
