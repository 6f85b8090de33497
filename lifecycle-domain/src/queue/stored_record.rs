//! 队列记录的持久化形态（StoredRecord）
//!
//! 记录体以 JSON 文档存储，另冗余 id、到期时间与插入序号作为索引字段，
//! 便于不同存储后端按到期时间扫描而无需理解记录结构。
//!
use super::QueueRecord;
use crate::error::{LifecycleError, LifecycleResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredRecord {
    /// 记录 id
    id: String,
    /// 插入序号，由存储层分配，仅保证单调
    sequence: u64,
    /// 到期时间
    due_at: DateTime<Utc>,
    /// 写入时间
    stored_at: DateTime<Utc>,
    /// 记录体
    payload: Value,
}

impl StoredRecord {
    pub fn encode<R: QueueRecord>(record: &R, sequence: u64) -> LifecycleResult<Self> {
        let payload = serde_json::to_value(record)
            .map_err(|e| LifecycleError::queue_write(R::QUEUE, e.to_string()))?;

        Ok(Self {
            id: record.record_id(),
            sequence,
            due_at: record.due_at(),
            stored_at: Utc::now(),
            payload,
        })
    }

    pub fn decode<R: QueueRecord>(&self) -> LifecycleResult<R> {
        serde_json::from_value(self.payload.clone()).map_err(|e| LifecycleError::QueueRead {
            queue: R::QUEUE,
            reason: format!("record {}: {e}", self.id),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn due_at(&self) -> DateTime<Utc> {
        self.due_at
    }

    pub fn stored_at(&self) -> DateTime<Utc> {
        self.stored_at
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }
}
