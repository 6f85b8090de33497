//! 测试超时清扫器（TestTimeoutSweeper）
//!
//! 扫描测试队列中已到期的记录，向每个预期主机发送停止通知（尽力而为，不等待答复），随后移除记录。
//!
use super::{PeriodicJob, SweepReport};
use crate::bus::ReplyBus;
use crate::error::LifecycleResult as Result;
use crate::message::{BusMessage, topics};
use crate::queue::{DurableQueue, QueueRecord};
use crate::record::TestTimeoutRecord;
use async_trait::async_trait;
use bon::Builder;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Builder)]
pub struct TestTimeoutSweeper {
    queue: Arc<dyn DurableQueue<TestTimeoutRecord>>,
    bus: Arc<dyn ReplyBus>,
}

impl TestTimeoutSweeper {
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let expired = self.queue.find_expired(now).await?;
        let mut report = SweepReport::found(expired.len());

        for record in &expired {
            let bucket = record.bucket();
            let message = BusMessage::TestExpired {
                bucket: bucket.clone(),
            };

            let mut delivered = true;
            for host in record.expected_hosts() {
                if let Err(err) = self.bus.publish(&topics::host(host), &message).await {
                    warn!(bucket = bucket.full_name(), %host, error = %err, "failed to send test stop");
                    delivered = false;
                } else {
                    debug!(bucket = bucket.full_name(), %host, "test stop sent");
                }
            }
            if delivered {
                report.succeeded += 1;
            } else {
                report.failed += 1;
            }

            match self.queue.delete(&record.record_id()).await {
                Ok(true) => report.removed += 1,
                Ok(false) => {}
                Err(err) => {
                    warn!(bucket = bucket.full_name(), error = %err, "failed to remove test record");
                }
            }
        }

        Ok(report)
    }
}

#[async_trait]
impl PeriodicJob for TestTimeoutSweeper {
    fn job_name(&self) -> &str {
        "bucket_test_sweeper"
    }

    async fn run_once(&self, now: DateTime<Utc>) {
        match self.sweep(now).await {
            Ok(report) if report.is_empty() => {}
            Ok(report) => info!(
                job = self.job_name(),
                found = report.found,
                removed = report.removed,
                "test sweep complete"
            ),
            Err(err) => warn!(job = self.job_name(), error = %err, "test sweep failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bucket::Bucket;
    use crate::bus::InMemoryReplyBus;
    use crate::queue::InMemoryQueue;
    use chrono::Duration;
    use futures_util::StreamExt;

    #[tokio::test]
    async fn expired_test_notifies_every_expected_host_and_is_removed() {
        let bus = Arc::new(InMemoryReplyBus::default());
        let queue = Arc::new(InMemoryQueue::<TestTimeoutRecord>::new());
        let sweeper = TestTimeoutSweeper::builder()
            .queue(queue.clone())
            .bus(bus.clone())
            .build();

        let mut h1 = bus.subscribe(&topics::host("h1")).await;
        let mut h2 = bus.subscribe(&topics::host("h2")).await;

        let bucket = Bucket::builder()
            .id("id1")
            .full_name("/bucket_testing/owner-1/bucket/path/here/1")
            .build();
        let now = Utc::now();
        queue
            .insert(&TestTimeoutRecord::new(
                bucket.clone(),
                now - Duration::seconds(1),
                vec!["h1".into(), "h2".into()],
            ))
            .await
            .unwrap();
        queue
            .insert(&TestTimeoutRecord::new(
                bucket.clone(),
                now + Duration::seconds(60),
                vec!["h1".into()],
            ))
            .await
            .unwrap();

        let report = sweeper.sweep(now).await.unwrap();
        assert_eq!(report.found, 1);
        assert_eq!(report.removed, 1);
        assert_eq!(queue.count().await.unwrap(), 1);

        for stream in [&mut h1, &mut h2] {
            let message = stream.next().await.unwrap().unwrap();
            assert_eq!(
                message,
                BusMessage::TestExpired {
                    bucket: bucket.clone()
                }
            );
        }

        // 再次扫描不会重复通知
        assert!(sweeper.sweep(now).await.unwrap().is_empty());
    }
}
