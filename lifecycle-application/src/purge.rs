//! 基于桶存储的清理协作方
//!
//! 内存部署下的物理清理：
//! - `DataOnly`：数据清空，对象计数归零；
//! - `Everything`：桶已删除，移除残留的状态记录。
//!
//! 测试桶与正式桶共用 id，只有当存储中的桶与被清理的桶同名时才修改状态记录。
//!
use crate::store::BucketStore;
use async_trait::async_trait;
use dashmap::DashMap;
use lifecycle_domain::bucket::Bucket;
use lifecycle_domain::error::{LifecycleError, LifecycleResult as Result};
use lifecycle_domain::message::OutcomeRecord;
use lifecycle_domain::purge::{PurgeScope, PurgeService};
use std::sync::Arc;
use tracing::debug;

const SOURCE: &str = "bucket_store_purge";

pub struct StorePurgeService {
    store: Arc<dyn BucketStore>,
    purged: DashMap<String, PurgeScope>,
}

impl StorePurgeService {
    pub fn new(store: Arc<dyn BucketStore>) -> Self {
        Self {
            store,
            purged: DashMap::new(),
        }
    }

    /// 最近一次清理的范围（按 `full_name`）
    pub fn last_purge(&self, full_name: &str) -> Option<PurgeScope> {
        self.purged.get(full_name).map(|s| *s.value())
    }

    async fn owns_status(&self, bucket: &Bucket) -> Result<bool> {
        Ok(match self.store.get_bucket(bucket.id()).await? {
            Some(live) => live.full_name() == bucket.full_name(),
            None => !bucket.is_test_bucket(),
        })
    }
}

#[async_trait]
impl PurgeService for StorePurgeService {
    async fn purge(&self, bucket: &Bucket, scope: PurgeScope) -> Result<Vec<OutcomeRecord>> {
        let owns_status = self.owns_status(bucket).await?;

        let message = match scope {
            PurgeScope::DataOnly if owns_status => {
                match self
                    .store
                    .update_status(bucket.id(), Box::new(|s| s.set_num_objects(0)))
                    .await
                {
                    Ok(_) | Err(LifecycleError::NotFound { .. }) => "data purged",
                    Err(err) => return Err(err),
                }
            }
            PurgeScope::Everything if owns_status => {
                self.store.delete_status(bucket.id()).await?;
                "bucket resources removed"
            }
            PurgeScope::DataOnly => "data purged",
            PurgeScope::Everything => "bucket resources removed",
        };

        self.purged.insert(bucket.full_name().to_string(), scope);
        debug!(bucket = bucket.full_name(), ?scope, "purge complete");

        Ok(vec![OutcomeRecord::success(SOURCE, "purge", message)])
    }
}
