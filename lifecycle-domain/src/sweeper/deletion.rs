//! 删除清扫器（DeletionSweeper）
//!
//! 扫描删除队列中已到期的记录：按记录类型选择清理范围调用清理协作方，随后移除记录。
//! 清理失败只记录日志，记录仍然移除。
//!
use super::{PeriodicJob, SweepReport};
use crate::error::LifecycleResult as Result;
use crate::purge::{PurgeScope, PurgeService};
use crate::queue::{DurableQueue, QueueRecord};
use crate::record::DeletionRecord;
use async_trait::async_trait;
use bon::Builder;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Builder)]
pub struct DeletionSweeper {
    queue: Arc<dyn DurableQueue<DeletionRecord>>,
    purge: Arc<dyn PurgeService>,
}

impl DeletionSweeper {
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let expired = self.queue.find_expired(now).await?;
        let mut report = SweepReport::found(expired.len());

        for record in &expired {
            let bucket = record.bucket();
            let scope = PurgeScope::for_scheduled_purge(record.is_scheduled_purge());

            match self.purge.purge(bucket, scope).await {
                Ok(outcomes) if outcomes.iter().all(|o| o.is_success()) => {
                    report.succeeded += 1;
                }
                Ok(outcomes) => {
                    let failures: Vec<&str> = outcomes
                        .iter()
                        .filter(|o| !o.is_success())
                        .map(|o| o.message())
                        .collect();
                    warn!(bucket = bucket.full_name(), ?scope, ?failures, "purge partially failed");
                    report.failed += 1;
                }
                Err(err) => {
                    warn!(bucket = bucket.full_name(), ?scope, error = %err, "purge failed");
                    report.failed += 1;
                }
            }

            match self.queue.delete(&record.record_id()).await {
                Ok(true) => report.removed += 1,
                // 另一个实例已处理
                Ok(false) => {}
                Err(err) => {
                    warn!(bucket = bucket.full_name(), error = %err, "failed to remove deletion record");
                }
            }
        }

        Ok(report)
    }
}

#[async_trait]
impl PeriodicJob for DeletionSweeper {
    fn job_name(&self) -> &str {
        "bucket_deletion_sweeper"
    }

    async fn run_once(&self, now: DateTime<Utc>) {
        match self.sweep(now).await {
            Ok(report) if report.is_empty() => {}
            Ok(report) => info!(
                job = self.job_name(),
                found = report.found,
                succeeded = report.succeeded,
                failed = report.failed,
                removed = report.removed,
                "deletion sweep complete"
            ),
            Err(err) => warn!(job = self.job_name(), error = %err, "deletion sweep failed"),
        }
    }
}
