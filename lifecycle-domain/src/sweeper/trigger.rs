//! 触发器分发器（TriggerDispatcher）
//!
//! 固定周期向本地指定工作者发送一条“评估触发器”消息，仅维护节拍计数。
//!
use super::PeriodicJob;
use crate::bucket::HostId;
use crate::bus::ReplyBus;
use crate::error::LifecycleResult as Result;
use crate::message::{BusMessage, topics};
use async_trait::async_trait;
use bon::Builder;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{trace, warn};

#[derive(Builder)]
pub struct TriggerDispatcher {
    bus: Arc<dyn ReplyBus>,
    /// 接收节拍的本地主机
    #[builder(into)]
    local_host: HostId,
    #[builder(skip)]
    ticks: AtomicU64,
}

impl TriggerDispatcher {
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    pub async fn dispatch(&self) -> Result<u64> {
        let tick = self.ticks.fetch_add(1, Ordering::Relaxed) + 1;
        self.bus
            .publish(
                &topics::trigger_worker(&self.local_host),
                &BusMessage::EvaluateTriggers,
            )
            .await?;
        trace!(host = %self.local_host, tick, "trigger tick sent");
        Ok(tick)
    }
}

#[async_trait]
impl PeriodicJob for TriggerDispatcher {
    fn job_name(&self) -> &str {
        "bucket_trigger_dispatcher"
    }

    async fn run_once(&self, _now: DateTime<Utc>) {
        if let Err(err) = self.dispatch().await {
            warn!(job = self.job_name(), error = %err, "trigger tick failed");
        }
    }
}
