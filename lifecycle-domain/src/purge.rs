//! 物理清理协作方（PurgeService）
//!
//! 对存储、索引等外部资源执行清理，对本库而言是不透明的副作用：
//! - 清扫器可能对同一记录执行多次，实现必须幂等；
//! - 尽力而为，部分失败以 `OutcomeRecord{success=false}` 表达。
//!
use crate::bucket::Bucket;
use crate::error::LifecycleResult as Result;
use crate::message::OutcomeRecord;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// 清理范围
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurgeScope {
    /// 仅清空数据，保留桶本身（计划清空）
    DataOnly,
    /// 桶已删除，清理其全部资源
    Everything,
}

impl PurgeScope {
    pub fn for_scheduled_purge(is_scheduled_purge: bool) -> Self {
        if is_scheduled_purge {
            PurgeScope::DataOnly
        } else {
            PurgeScope::Everything
        }
    }
}

#[async_trait]
pub trait PurgeService: Send + Sync {
    async fn purge(&self, bucket: &Bucket, scope: PurgeScope) -> Result<Vec<OutcomeRecord>>;
}
