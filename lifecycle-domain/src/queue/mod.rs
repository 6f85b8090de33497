//! 持久化队列（DurableQueue）
//!
//! 有序、持久化的类型化记录集合，支撑重试队列、删除队列与测试超时队列：
//! - `QueueRecord`：记录需提供稳定 id 与到期时间；
//! - `DurableQueue`：插入/删除/计数/按到期扫描等协议，需支持跨进程并发读写；
//! - `StoredRecord`：记录在存储层的标准形态（JSON 文档 + 索引字段）。
//!
//! `find_expired` 是快照读取而非租约：清扫器对记录的处理为“至少一次”，副作用必须幂等。
//!
mod inmemory;
mod stored_record;

pub use inmemory::InMemoryQueue;
pub use stored_record::StoredRecord;

use crate::error::LifecycleResult as Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Serialize, de::DeserializeOwned};

/// 可进入持久化队列的记录
pub trait QueueRecord: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
    /// 队列（集合）名称，用于日志与错误
    const QUEUE: &'static str;

    /// 稳定 id（队列内唯一）
    fn record_id(&self) -> String;

    /// 到期时间；`find_expired(now)` 返回 `due_at <= now` 的记录
    fn due_at(&self) -> DateTime<Utc>;
}

/// 持久化队列协议
#[async_trait]
pub trait DurableQueue<R: QueueRecord>: Send + Sync {
    /// 插入新记录；id 已存在时返回 `DuplicateRecord`
    async fn insert(&self, record: &R) -> Result<()>;

    /// 插入或替换同 id 记录
    async fn upsert(&self, record: &R) -> Result<()>;

    /// 删除记录，返回记录此前是否存在
    async fn delete(&self, id: &str) -> Result<bool>;

    async fn get(&self, id: &str) -> Result<Option<R>>;

    async fn count(&self) -> Result<usize>;

    /// 快照读取所有已到期记录（按插入顺序）；无法解码的记录被跳过
    async fn find_expired(&self, now: DateTime<Utc>) -> Result<Vec<R>>;

    /// 全部记录（按插入顺序）
    async fn list(&self) -> Result<Vec<R>>;

    async fn clear(&self) -> Result<()>;
}
