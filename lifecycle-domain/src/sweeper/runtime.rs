//! 清扫运行时（SweeperRuntime）
//!
//! 以固定周期驱动一组 `PeriodicJob`：
//! - 每个任务一个独立的周期循环，错过的节拍直接跳过；
//! - 每次节拍前查询单例租约，未持有时跳过；
//! - 提供关闭与等待的 `SweeperHandle`。
//!
use super::{DeletionSweeper, SingletonLease, TestTimeoutSweeper, TriggerDispatcher};
use async_trait::async_trait;
use bon::Builder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Duration};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// 周期任务：每次节拍执行一轮 `Idle → Scan → Dispatch → Idle`
#[async_trait]
pub trait PeriodicJob: Send + Sync {
    /// 任务名称（用于租约与日志）
    fn job_name(&self) -> &str;

    async fn run_once(&self, now: DateTime<Utc>);
}

/// 周期任务与其间隔
#[derive(Clone)]
pub struct ScheduledJob {
    job: Arc<dyn PeriodicJob>,
    interval: Duration,
}

impl ScheduledJob {
    pub fn new(job: Arc<dyn PeriodicJob>, interval: Duration) -> Self {
        Self { job, interval }
    }
}

/// 清扫周期配置
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweeperConfig {
    pub deletion_interval: Duration,
    pub test_interval: Duration,
    pub trigger_interval: Duration,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            deletion_interval: Duration::from_secs(5),
            test_interval: Duration::from_secs(1),
            trigger_interval: Duration::from_secs(10),
        }
    }
}

impl SweeperConfig {
    /// 按配置的周期编排标准的三个任务
    pub fn schedule(
        &self,
        deletion: Arc<DeletionSweeper>,
        test: Arc<TestTimeoutSweeper>,
        trigger: Arc<TriggerDispatcher>,
    ) -> Vec<ScheduledJob> {
        vec![
            ScheduledJob::new(deletion, self.deletion_interval),
            ScheduledJob::new(test, self.test_interval),
            ScheduledJob::new(trigger, self.trigger_interval),
        ]
    }
}

#[derive(Builder)]
pub struct SweeperRuntime {
    lease: Arc<dyn SingletonLease>,
    jobs: Vec<ScheduledJob>,
}

impl SweeperRuntime {
    /// 启动全部周期任务，返回可用于关闭/等待的句柄
    pub fn start(self: Arc<Self>) -> SweeperHandle {
        let token = CancellationToken::new();
        let mut tasks: Vec<JoinHandle<()>> = Vec::with_capacity(self.jobs.len());

        for scheduled in &self.jobs {
            let lease = self.lease.clone();
            let job = scheduled.job.clone();
            info!(
                job = job.job_name(),
                interval_ms = scheduled.interval.as_millis() as u64,
                "periodic job scheduled"
            );

            tasks.push(Self::spawn_periodic(
                token.clone(),
                scheduled.interval,
                move || {
                    let lease = lease.clone();
                    let job = job.clone();
                    async move {
                        Self::tick(lease.as_ref(), job.as_ref()).await;
                    }
                },
            ));
        }

        SweeperHandle { token, tasks }
    }

    /// 执行一次节拍；未持有租约时跳过并返回 `false`
    pub async fn tick(lease: &dyn SingletonLease, job: &dyn PeriodicJob) -> bool {
        if !lease.is_active(job.job_name()).await {
            debug!(job = job.job_name(), "skipping tick (lease not held)");
            return false;
        }

        job.run_once(Utc::now()).await;
        true
    }

    fn spawn_periodic<F, Fut>(
        token: CancellationToken,
        interval: Duration,
        mut f: F,
    ) -> JoinHandle<()>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(async move {
            let mut ticker = time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => f().await,
                }
            }
        })
    }
}

/// 运行时句柄：用于优雅关闭与等待任务结束
pub struct SweeperHandle {
    token: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl SweeperHandle {
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    pub async fn join(mut self) {
        let tasks = std::mem::take(&mut self.tasks);

        for t in tasks {
            let _ = t.await;
        }
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
