//! 持久化队列中的记录
//!
//! 三类记录仅由结果裁决器（`OutcomeResolver`）写入，仅由各自的清扫器删除：
//! - `RetryRecord`：某主机需要重试某动作；
//! - `DeletionRecord`：延迟的物理删除/清空，按桶 `full_name` 唯一；
//! - `TestTimeoutRecord`：测试运行的强制停止时间点。
//!
use crate::bucket::{Bucket, HostId};
use crate::message::{ActionKind, ActionMessage};
use crate::queue::QueueRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryRecord {
    id: Uuid,
    /// 原始动作
    action: ActionMessage,
    /// 原始动作的判别字段（冗余存储，便于按类型查询与重放）
    action_kind: ActionKind,
    target_host: HostId,
    attempts: u32,
    created_at: DateTime<Utc>,
}

impl RetryRecord {
    pub fn new(action: ActionMessage, target_host: impl Into<HostId>) -> Self {
        Self {
            id: Uuid::new_v4(),
            action_kind: action.kind(),
            action,
            target_host: target_host.into(),
            attempts: 0,
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn action(&self) -> &ActionMessage {
        &self.action
    }

    pub fn action_kind(&self) -> ActionKind {
        self.action_kind
    }

    pub fn target_host(&self) -> &str {
        &self.target_host
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl QueueRecord for RetryRecord {
    const QUEUE: &'static str = "bucket_action_retry";

    fn record_id(&self) -> String {
        self.id.to_string()
    }

    // 重试记录写入即到期，由目标主机自己的重试循环消费
    fn due_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeletionRecord {
    bucket: Bucket,
    delete_on: DateTime<Utc>,
    /// true：计划清空（保留桶，仅清数据）；false：桶已删除，清理全部资源
    is_scheduled_purge: bool,
}

impl DeletionRecord {
    pub fn new(bucket: Bucket, delete_on: DateTime<Utc>, is_scheduled_purge: bool) -> Self {
        Self {
            bucket,
            delete_on,
            is_scheduled_purge,
        }
    }

    pub fn bucket(&self) -> &Bucket {
        &self.bucket
    }

    pub fn delete_on(&self) -> DateTime<Utc> {
        self.delete_on
    }

    pub fn is_scheduled_purge(&self) -> bool {
        self.is_scheduled_purge
    }
}

impl QueueRecord for DeletionRecord {
    const QUEUE: &'static str = "bucket_deletion";

    fn record_id(&self) -> String {
        self.bucket.full_name().to_string()
    }

    fn due_at(&self) -> DateTime<Utc> {
        self.delete_on
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestTimeoutRecord {
    id: Uuid,
    bucket: Bucket,
    expires_on: DateTime<Utc>,
    expected_hosts: Vec<HostId>,
}

impl TestTimeoutRecord {
    pub fn new(bucket: Bucket, expires_on: DateTime<Utc>, expected_hosts: Vec<HostId>) -> Self {
        Self {
            id: Uuid::new_v4(),
            bucket,
            expires_on,
            expected_hosts,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn bucket(&self) -> &Bucket {
        &self.bucket
    }

    pub fn expires_on(&self) -> DateTime<Utc> {
        self.expires_on
    }

    pub fn expected_hosts(&self) -> &[HostId] {
        &self.expected_hosts
    }
}

impl QueueRecord for TestTimeoutRecord {
    const QUEUE: &'static str = "bucket_test";

    fn record_id(&self) -> String {
        self.id.to_string()
    }

    fn due_at(&self) -> DateTime<Utc> {
        self.expires_on
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_record_keeps_action_and_its_kind() {
        let bucket = Bucket::builder().id("id1").full_name("/a/b").build();
        let record = RetryRecord::new(ActionMessage::Delete { bucket }, "host3");

        assert_eq!(record.action_kind(), ActionKind::Delete);
        assert_eq!(record.target_host(), "host3");
        assert_eq!(record.attempts(), 0);

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["action_kind"], "delete");
        assert_eq!(json["action"]["kind"], "delete");
        let back: RetryRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back.action().bucket().id(), "id1");
    }

    #[test]
    fn deletion_record_is_keyed_by_full_name() {
        let bucket = Bucket::builder().id("id1").full_name("/bucket/path/here/1").build();
        let record = DeletionRecord::new(bucket, Utc::now(), false);
        assert_eq!(record.record_id(), "/bucket/path/here/1");
    }
}
