//! 生命周期领域统一错误定义
//!
//! 聚焦序列化、消息总线、持久化队列、动作分发与外部协作方等最小必要集合，
//! 便于在各实现层统一转换为 `LifecycleError`。
//!
//! 注意：单个节点的失败/拒绝/超时属于“数据”，由 `ReplySet` 表达，不在此处建模。
//!
use thiserror::Error;

/// 统一错误类型（基础库最小必要集）
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum LifecycleError {
    // --- 序列化 ---
    #[error("serialization error: {source}")]
    Serde {
        #[from]
        source: serde_json::Error,
    },

    // --- 动作分发 ---
    #[error("no eligible target hosts for bucket {bucket}")]
    NoTargets { bucket: String },
    #[error("reply bus error: {reason}")]
    ReplyBus { reason: String },

    // --- 持久化队列 ---
    #[error("queue write failed: queue={queue}, reason={reason}")]
    QueueWrite { queue: &'static str, reason: String },
    #[error("queue read failed: queue={queue}, reason={reason}")]
    QueueRead { queue: &'static str, reason: String },
    #[error("duplicate record: queue={queue}, id={id}")]
    DuplicateRecord { queue: &'static str, id: String },

    // --- 外部协作方 ---
    #[error("purge failed: bucket={bucket}, reason={reason}")]
    Purge { bucket: String, reason: String },
    #[error("bucket store error: {reason}")]
    Store { reason: String },

    // --- 通用 ---
    #[error("not found: {reason}")]
    NotFound { reason: String },
    #[error("invalid state: {reason}")]
    InvalidState { reason: String },
}

/// 统一 Result 类型别名
pub type LifecycleResult<T> = Result<T, LifecycleError>;

impl LifecycleError {
    pub fn reply_bus(reason: impl Into<String>) -> Self {
        LifecycleError::ReplyBus {
            reason: reason.into(),
        }
    }

    pub fn queue_write(queue: &'static str, reason: impl Into<String>) -> Self {
        LifecycleError::QueueWrite {
            queue,
            reason: reason.into(),
        }
    }

    /// 是否为“意图无法持久化”类错误（需要向调用方升级为硬失败）
    pub fn is_queue_write(&self) -> bool {
        matches!(
            self,
            LifecycleError::QueueWrite { .. } | LifecycleError::DuplicateRecord { .. }
        )
    }
}

impl From<chrono::OutOfRangeError> for LifecycleError {
    fn from(err: chrono::OutOfRangeError) -> Self {
        LifecycleError::InvalidState {
            reason: err.to_string(),
        }
    }
}
