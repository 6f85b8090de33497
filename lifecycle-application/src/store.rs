//! 桶元数据存储（BucketStore）
//!
//! `Bucket` 与 `BucketStatus` 分别存储，允许桶在没有状态记录时存在。
//! 删除请求会立即移除两类元数据，物理数据的清理则交由删除队列延迟执行。
//!
use async_trait::async_trait;
use dashmap::DashMap;
use lifecycle_domain::bucket::{Bucket, BucketStatus};
use lifecycle_domain::error::{LifecycleError, LifecycleResult as Result};
use std::sync::Arc;

/// 状态记录的原地修改
pub type StatusUpdate = Box<dyn for<'a> FnOnce(&'a mut BucketStatus) + Send>;

#[async_trait]
pub trait BucketStore: Send + Sync {
    async fn get_bucket(&self, id: &str) -> Result<Option<Bucket>>;

    async fn find_bucket_by_name(&self, full_name: &str) -> Result<Option<Bucket>>;

    async fn put_bucket(&self, bucket: Bucket) -> Result<()>;

    /// 删除桶，返回此前是否存在
    async fn delete_bucket(&self, id: &str) -> Result<bool>;

    async fn get_status(&self, id: &str) -> Result<Option<BucketStatus>>;

    async fn put_status(&self, status: BucketStatus) -> Result<()>;

    async fn delete_status(&self, id: &str) -> Result<bool>;

    /// 原地修改状态记录；记录不存在时返回 `NotFound`
    async fn update_status(
        &self,
        id: &str,
        update: StatusUpdate,
    ) -> Result<BucketStatus>;
}

/// 内存版桶存储
#[derive(Clone, Default)]
pub struct InMemoryBucketStore {
    buckets: Arc<DashMap<String, Bucket>>,
    statuses: Arc<DashMap<String, BucketStatus>>,
}

impl InMemoryBucketStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    pub fn status_count(&self) -> usize {
        self.statuses.len()
    }
}

#[async_trait]
impl BucketStore for InMemoryBucketStore {
    async fn get_bucket(&self, id: &str) -> Result<Option<Bucket>> {
        Ok(self.buckets.get(id).map(|b| b.value().clone()))
    }

    async fn find_bucket_by_name(&self, full_name: &str) -> Result<Option<Bucket>> {
        Ok(self
            .buckets
            .iter()
            .find(|b| b.full_name() == full_name)
            .map(|b| b.value().clone()))
    }

    async fn put_bucket(&self, bucket: Bucket) -> Result<()> {
        self.buckets.insert(bucket.id().to_string(), bucket);
        Ok(())
    }

    async fn delete_bucket(&self, id: &str) -> Result<bool> {
        Ok(self.buckets.remove(id).is_some())
    }

    async fn get_status(&self, id: &str) -> Result<Option<BucketStatus>> {
        Ok(self.statuses.get(id).map(|s| s.value().clone()))
    }

    async fn put_status(&self, status: BucketStatus) -> Result<()> {
        self.statuses.insert(status.id().to_string(), status);
        Ok(())
    }

    async fn delete_status(&self, id: &str) -> Result<bool> {
        Ok(self.statuses.remove(id).is_some())
    }

    async fn update_status(
        &self,
        id: &str,
        update: StatusUpdate,
    ) -> Result<BucketStatus> {
        let Some(mut entry) = self.statuses.get_mut(id) else {
            return Err(LifecycleError::NotFound {
                reason: format!("bucket status {id}"),
            });
        };
        update(entry.value_mut());
        Ok(entry.value().clone())
    }
}
