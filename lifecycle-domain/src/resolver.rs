//! 结果裁决器（OutcomeResolver）
//!
//! 将一次分发的答复集合转化为整体结论与持久化的后续工作：
//! - 仅 `Handled{success=true}` 视为该目标成功，至少一个目标成功即整体成功；
//! - 每个未成功的目标（失败、拒绝、超时）写入一条重试记录；
//! - 删除请求无论各目标结果如何都写入唯一的一条删除记录；
//! - 测试请求在至少一个主机接受时写入测试超时记录与删除记录。
//!
//! 队列写入失败意味着意图无法持久化，统一升级为 `QueueWrite` 返回给调用方。
//!
use crate::bucket::{Bucket, HostId, TestDefaults, TestSpec};
use crate::coordinator::ReplySet;
use crate::error::{LifecycleError, LifecycleResult as Result};
use crate::message::{ActionMessage, OutcomeRecord};
use crate::queue::{DurableQueue, QueueRecord};
use crate::record::{DeletionRecord, RetryRecord, TestTimeoutRecord};
use bon::Builder;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// 结果裁决配置
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// 删除请求到物理清理之间的延迟
    pub purge_delay: Duration,
    /// 测试参数缺省值，补齐调用方未指定的运行与保留时间
    pub test_defaults: TestDefaults,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            purge_delay: Duration::from_secs(60),
            test_defaults: TestDefaults::default(),
        }
    }
}

#[derive(Builder)]
pub struct OutcomeResolver {
    retry_queue: Arc<dyn DurableQueue<RetryRecord>>,
    deletion_queue: Arc<dyn DurableQueue<DeletionRecord>>,
    test_queue: Arc<dyn DurableQueue<TestTimeoutRecord>>,
    #[builder(default)]
    config: ResolverConfig,
}

impl OutcomeResolver {
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// 普通动作（挂起、恢复、更新、清空通知等）：仅按重试规则处理
    pub async fn resolve_action(
        &self,
        action: &ActionMessage,
        replies: &ReplySet,
    ) -> Result<ActionOutcome> {
        let retries = self.enqueue_retries(action, replies).await?;
        let overall_success = replies.any_success();

        info!(
            kind = %replies.kind(),
            bucket = replies.bucket(),
            overall_success,
            retries = retries.len(),
            "action resolved"
        );

        Ok(ActionOutcome {
            overall_success,
            retries,
            outcomes: replies.outcomes(),
        })
    }

    /// 删除动作：重试规则 + 唯一的延迟物理删除记录
    pub async fn resolve_deletion(
        &self,
        bucket: &Bucket,
        action: &ActionMessage,
        replies: &ReplySet,
    ) -> Result<DeletionOutcome> {
        let deletion = self.record_deletion(bucket).await?;
        let action = self.resolve_action(action, replies).await?;
        Ok(DeletionOutcome { action, deletion })
    }

    /// 写入（或替换）桶的删除记录，`delete_on = now + purge_delay`
    pub async fn record_deletion(&self, bucket: &Bucket) -> Result<DeletionRecord> {
        let delete_on = Utc::now() + chrono::Duration::from_std(self.config.purge_delay)?;
        let record = DeletionRecord::new(bucket.clone(), delete_on, false);

        self.deletion_queue
            .upsert(&record)
            .await
            .map_err(escalate(DeletionRecord::QUEUE))?;

        debug!(bucket = bucket.full_name(), %delete_on, "deletion recorded");
        Ok(record)
    }

    /// 测试动作：至少一个主机接受时登记超时停止与数据清理；否则不写任何记录
    pub async fn resolve_test(
        &self,
        bucket: &Bucket,
        spec: &TestSpec,
        replies: &ReplySet,
    ) -> Result<TestOutcome> {
        let accepted = replies.successful_hosts();
        let outcomes = replies.outcomes();

        if accepted.is_empty() {
            warn!(bucket = bucket.full_name(), targets = replies.len(), "no host accepted the test");
            return Ok(TestOutcome {
                accepted,
                timeout: None,
                deletion: None,
                outcomes,
            });
        }

        let defaults = &self.config.test_defaults;
        let run_time = spec.max_run_time().unwrap_or(defaults.max_run_time);
        let storage_time = spec.max_storage_time().unwrap_or(defaults.max_storage_time);

        let now = Utc::now();
        let timeout = TestTimeoutRecord::new(
            bucket.clone(),
            now + chrono::Duration::from_std(run_time)?,
            accepted.clone(),
        );
        self.test_queue
            .insert(&timeout)
            .await
            .map_err(escalate(TestTimeoutRecord::QUEUE))?;

        let deletion = DeletionRecord::new(
            bucket.clone(),
            now + chrono::Duration::from_std(storage_time)?,
            false,
        );
        self.deletion_queue
            .upsert(&deletion)
            .await
            .map_err(escalate(DeletionRecord::QUEUE))?;

        info!(
            bucket = bucket.full_name(),
            hosts = ?accepted,
            expires_on = %timeout.expires_on(),
            "test started"
        );

        Ok(TestOutcome {
            accepted,
            timeout: Some(timeout),
            deletion: Some(deletion),
            outcomes,
        })
    }

    /// 计划清空：写入 `is_scheduled_purge=true` 的删除记录；同名记录已存在时返回 `false`
    pub async fn schedule_purge(&self, bucket: &Bucket, delay: Duration) -> Result<bool> {
        let delete_on = Utc::now() + chrono::Duration::from_std(delay)?;
        let record = DeletionRecord::new(bucket.clone(), delete_on, true);

        match self.deletion_queue.insert(&record).await {
            Ok(()) => {
                info!(bucket = bucket.full_name(), %delete_on, "purge scheduled");
                Ok(true)
            }
            Err(LifecycleError::DuplicateRecord { .. }) => {
                debug!(bucket = bucket.full_name(), "purge already pending");
                Ok(false)
            }
            Err(err) => Err(escalate(DeletionRecord::QUEUE)(err)),
        }
    }

    async fn enqueue_retries(
        &self,
        action: &ActionMessage,
        replies: &ReplySet,
    ) -> Result<Vec<RetryRecord>> {
        let mut retries = Vec::new();
        for host in replies.unsuccessful_hosts() {
            let record = RetryRecord::new(action.clone(), host);
            self.retry_queue
                .insert(&record)
                .await
                .map_err(escalate(RetryRecord::QUEUE))?;
            debug!(
                host = record.target_host(),
                kind = %record.action_kind(),
                "retry enqueued"
            );
            retries.push(record);
        }
        Ok(retries)
    }
}

fn escalate(queue: &'static str) -> impl FnOnce(LifecycleError) -> LifecycleError {
    move |err| {
        if err.is_queue_write() {
            err
        } else {
            LifecycleError::queue_write(queue, err.to_string())
        }
    }
}

/// 普通动作的裁决结果
#[derive(Debug, Clone)]
pub struct ActionOutcome {
    overall_success: bool,
    retries: Vec<RetryRecord>,
    outcomes: Vec<OutcomeRecord>,
}

impl ActionOutcome {
    pub fn overall_success(&self) -> bool {
        self.overall_success
    }

    pub fn retries(&self) -> &[RetryRecord] {
        &self.retries
    }

    pub fn outcomes(&self) -> &[OutcomeRecord] {
        &self.outcomes
    }

    pub fn into_outcomes(self) -> Vec<OutcomeRecord> {
        self.outcomes
    }
}

/// 删除动作的裁决结果
#[derive(Debug, Clone)]
pub struct DeletionOutcome {
    action: ActionOutcome,
    deletion: DeletionRecord,
}

impl DeletionOutcome {
    pub fn overall_success(&self) -> bool {
        self.action.overall_success()
    }

    pub fn retries(&self) -> &[RetryRecord] {
        self.action.retries()
    }

    pub fn deletion(&self) -> &DeletionRecord {
        &self.deletion
    }

    pub fn outcomes(&self) -> &[OutcomeRecord] {
        self.action.outcomes()
    }

    pub fn into_outcomes(self) -> Vec<OutcomeRecord> {
        self.action.into_outcomes()
    }
}

/// 测试动作的裁决结果
#[derive(Debug, Clone)]
pub struct TestOutcome {
    accepted: Vec<HostId>,
    timeout: Option<TestTimeoutRecord>,
    deletion: Option<DeletionRecord>,
    outcomes: Vec<OutcomeRecord>,
}

impl TestOutcome {
    /// 是否至少有一个主机接受了测试
    pub fn started(&self) -> bool {
        !self.accepted.is_empty()
    }

    pub fn accepted_hosts(&self) -> &[HostId] {
        &self.accepted
    }

    pub fn timeout(&self) -> Option<&TestTimeoutRecord> {
        self.timeout.as_ref()
    }

    pub fn deletion(&self) -> Option<&DeletionRecord> {
        self.deletion.as_ref()
    }

    pub fn outcomes(&self) -> &[OutcomeRecord] {
        &self.outcomes
    }

    pub fn into_outcomes(self) -> Vec<OutcomeRecord> {
        self.outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{ActionKind, ReplyMessage};
    use crate::queue::InMemoryQueue;
    use async_trait::async_trait;
    use chrono::DateTime;
    use std::collections::HashMap;

    struct Queues {
        retry: Arc<InMemoryQueue<RetryRecord>>,
        deletion: Arc<InMemoryQueue<DeletionRecord>>,
        test: Arc<InMemoryQueue<TestTimeoutRecord>>,
    }

    fn resolver() -> (OutcomeResolver, Queues) {
        let queues = Queues {
            retry: Arc::new(InMemoryQueue::new()),
            deletion: Arc::new(InMemoryQueue::new()),
            test: Arc::new(InMemoryQueue::new()),
        };
        let resolver = OutcomeResolver::builder()
            .retry_queue(queues.retry.clone())
            .deletion_queue(queues.deletion.clone())
            .test_queue(queues.test.clone())
            .build();
        (resolver, queues)
    }

    fn bucket() -> Bucket {
        Bucket::builder()
            .id("id1")
            .full_name("/bucket/path/here/1")
            .multi_node_enabled(true)
            .build()
    }

    fn handled(host: &str, success: bool) -> ReplyMessage {
        let result = if success {
            OutcomeRecord::success(host, "delete", "ok")
        } else {
            OutcomeRecord::error(host, "delete", "failed")
        };
        ReplyMessage::Handled {
            source: host.into(),
            result,
        }
    }

    fn replies(kind: ActionKind, targets: &[&str], received: Vec<ReplyMessage>) -> ReplySet {
        let targets: Vec<HostId> = targets.iter().map(|h| h.to_string()).collect();
        let received: HashMap<HostId, ReplyMessage> = received
            .into_iter()
            .map(|r| (r.source().to_string(), r))
            .collect();
        ReplySet::assemble(kind, "/bucket/path/here/1".into(), &targets, received)
    }

    #[tokio::test]
    async fn single_timeout_yields_failure_one_retry_and_one_deletion() {
        let (resolver, queues) = resolver();
        let action = ActionMessage::Delete { bucket: bucket() };
        let set = replies(ActionKind::Delete, &["h1"], vec![]);

        let before = Utc::now();
        let outcome = resolver.resolve_deletion(&bucket(), &action, &set).await.unwrap();

        assert!(!outcome.overall_success());
        assert_eq!(outcome.retries().len(), 1);
        assert_eq!(outcome.retries()[0].target_host(), "h1");
        assert_eq!(outcome.outcomes().len(), 1);
        assert_eq!(queues.retry.count().await.unwrap(), 1);
        assert_eq!(queues.deletion.count().await.unwrap(), 1);

        let record = queues.deletion.get("/bucket/path/here/1").await.unwrap().unwrap();
        assert!(!record.is_scheduled_purge());
        assert!(record.delete_on() >= before + chrono::Duration::seconds(60));
    }

    #[tokio::test]
    async fn every_non_successful_target_is_retried() {
        let (resolver, queues) = resolver();
        let action = ActionMessage::Delete { bucket: bucket() };
        let set = replies(
            ActionKind::Delete,
            &["h1", "h2", "h3", "h4", "h5"],
            vec![
                handled("h1", true),
                handled("h2", true),
                handled("h3", false),
                ReplyMessage::Ignored { source: "h4".into() },
            ],
        );

        let outcome = resolver.resolve_deletion(&bucket(), &action, &set).await.unwrap();

        assert!(outcome.overall_success());
        let mut retried: Vec<_> = outcome
            .retries()
            .iter()
            .map(|r| r.target_host().to_string())
            .collect();
        retried.sort();
        assert_eq!(retried, vec!["h3", "h4", "h5"]);
        assert_eq!(queues.retry.count().await.unwrap(), 3);
        assert_eq!(queues.deletion.count().await.unwrap(), 1);
        assert_eq!(outcome.outcomes().len(), 5);
    }

    #[tokio::test]
    async fn repeated_deletion_keeps_exactly_one_record() {
        let (resolver, queues) = resolver();
        let action = ActionMessage::Delete { bucket: bucket() };
        let set = replies(ActionKind::Delete, &["h1"], vec![handled("h1", true)]);

        resolver.resolve_deletion(&bucket(), &action, &set).await.unwrap();
        resolver.resolve_deletion(&bucket(), &action, &set).await.unwrap();

        assert_eq!(queues.deletion.count().await.unwrap(), 1);
        assert_eq!(queues.retry.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn scheduled_purge_rejects_a_second_pending_purge() {
        let (resolver, queues) = resolver();

        assert!(resolver.schedule_purge(&bucket(), Duration::from_secs(30)).await.unwrap());
        assert!(!resolver.schedule_purge(&bucket(), Duration::from_secs(30)).await.unwrap());

        let record = queues.deletion.get("/bucket/path/here/1").await.unwrap().unwrap();
        assert!(record.is_scheduled_purge());
        assert_eq!(queues.deletion.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn accepted_test_registers_timeout_and_deletion() {
        let (resolver, queues) = resolver();
        let test_bucket = bucket().to_test_bucket("owner-1");
        let spec = TestSpec::builder()
            .max_run_time(Duration::from_secs(5))
            .max_storage_time(Duration::from_secs(30))
            .build();
        let set = replies(
            ActionKind::Test,
            &["h1", "h2"],
            vec![handled("h1", true), ReplyMessage::Ignored { source: "h2".into() }],
        );

        let before = Utc::now();
        let outcome = resolver.resolve_test(&test_bucket, &spec, &set).await.unwrap();

        assert!(outcome.started());
        assert_eq!(outcome.accepted_hosts(), ["h1".to_string()]);
        let timeout = outcome.timeout().unwrap();
        assert_eq!(timeout.expected_hosts(), ["h1".to_string()]);
        assert!(timeout.expires_on() >= before + chrono::Duration::seconds(5));
        assert!(timeout.expires_on() < before + chrono::Duration::seconds(30));

        assert_eq!(queues.test.count().await.unwrap(), 1);
        let deletion = queues
            .deletion
            .get(test_bucket.full_name())
            .await
            .unwrap()
            .unwrap();
        assert!(deletion.delete_on() >= before + chrono::Duration::seconds(30));
        // 测试动作不产生重试
        assert_eq!(queues.retry.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn rejected_test_writes_nothing() {
        let (resolver, queues) = resolver();
        let set = replies(
            ActionKind::Test,
            &["h1", "h2"],
            vec![ReplyMessage::Ignored { source: "h1".into() }],
        );

        let outcome = resolver
            .resolve_test(&bucket(), &TestSpec::default(), &set)
            .await
            .unwrap();

        assert!(!outcome.started());
        assert_eq!(outcome.outcomes().len(), 2);
        assert_eq!(queues.test.count().await.unwrap(), 0);
        assert_eq!(queues.deletion.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn unset_test_times_use_configured_defaults() {
        let deletion = Arc::new(InMemoryQueue::<DeletionRecord>::new());
        let test = Arc::new(InMemoryQueue::<TestTimeoutRecord>::new());
        let config = ResolverConfig {
            test_defaults: TestDefaults {
                max_run_time: Duration::from_secs(2),
                max_storage_time: Duration::from_secs(10),
                ..TestDefaults::default()
            },
            ..ResolverConfig::default()
        };
        let resolver = OutcomeResolver::builder()
            .retry_queue(Arc::new(InMemoryQueue::<RetryRecord>::new()))
            .deletion_queue(deletion.clone())
            .test_queue(test.clone())
            .config(config)
            .build();
        let set = replies(ActionKind::Test, &["h1"], vec![handled("h1", true)]);

        let before = Utc::now();
        let outcome = resolver
            .resolve_test(&bucket(), &TestSpec::default(), &set)
            .await
            .unwrap();

        let timeout = outcome.timeout().unwrap();
        assert!(timeout.expires_on() < before + chrono::Duration::seconds(30));
        let cleanup = outcome.deletion().unwrap();
        assert!(cleanup.delete_on() >= before + chrono::Duration::seconds(10));
        assert!(cleanup.delete_on() < before + chrono::Duration::seconds(60));
    }

    struct BrokenQueue;

    #[async_trait]
    impl<R: QueueRecord> DurableQueue<R> for BrokenQueue {
        async fn insert(&self, _record: &R) -> Result<()> {
            Err(LifecycleError::Store {
                reason: "connection refused".into(),
            })
        }
        async fn upsert(&self, _record: &R) -> Result<()> {
            Err(LifecycleError::queue_write(R::QUEUE, "disk full"))
        }
        async fn delete(&self, _id: &str) -> Result<bool> {
            Ok(false)
        }
        async fn get(&self, _id: &str) -> Result<Option<R>> {
            Ok(None)
        }
        async fn count(&self) -> Result<usize> {
            Ok(0)
        }
        async fn find_expired(&self, _now: DateTime<Utc>) -> Result<Vec<R>> {
            Ok(Vec::new())
        }
        async fn list(&self) -> Result<Vec<R>> {
            Ok(Vec::new())
        }
        async fn clear(&self) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn queue_failures_escalate_as_queue_write() {
        let resolver = OutcomeResolver::builder()
            .retry_queue(Arc::new(BrokenQueue))
            .deletion_queue(Arc::new(BrokenQueue))
            .test_queue(Arc::new(BrokenQueue))
            .build();
        let action = ActionMessage::Suspend { bucket: bucket() };
        let set = replies(ActionKind::Suspend, &["h1"], vec![]);

        let err = resolver.resolve_action(&action, &set).await.unwrap_err();
        assert!(matches!(err, LifecycleError::QueueWrite { queue: "bucket_action_retry", .. }));

        let err = resolver.record_deletion(&bucket()).await.unwrap_err();
        assert!(matches!(err, LifecycleError::QueueWrite { queue: "bucket_deletion", .. }));

        let err = resolver
            .schedule_purge(&bucket(), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(err.is_queue_write());
    }
}
