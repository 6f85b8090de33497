//! 内存版持久化队列（InMemoryQueue）
//!
//! 基于 `DashMap` 的 `DurableQueue` 实现，记录以 `StoredRecord` 形态保存，
//! 与真实存储后端经历相同的序列化路径。典型用途：测试环境、示例与本地开发。
//!
//! 注意：进程退出即丢失，仅用于单进程场景。
//!
use super::{DurableQueue, QueueRecord, StoredRecord};
use crate::error::{LifecycleError, LifecycleResult as Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::warn;

pub struct InMemoryQueue<R> {
    records: Arc<DashMap<String, StoredRecord>>,
    sequence: Arc<AtomicU64>,
    _marker: PhantomData<fn() -> R>,
}

impl<R> Clone for InMemoryQueue<R> {
    fn clone(&self) -> Self {
        Self {
            records: self.records.clone(),
            sequence: self.sequence.clone(),
            _marker: PhantomData,
        }
    }
}

impl<R> Default for InMemoryQueue<R> {
    fn default() -> Self {
        Self {
            records: Arc::new(DashMap::new()),
            sequence: Arc::new(AtomicU64::new(0)),
            _marker: PhantomData,
        }
    }
}

impl<R: QueueRecord> InMemoryQueue<R> {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::Relaxed)
    }

    /// 逐条解码；无法解码的记录只记录日志并跳过，不阻塞其余记录
    fn decode_sorted(&self, mut stored: Vec<StoredRecord>) -> Vec<R> {
        stored.sort_by_key(|s| s.sequence());
        stored
            .iter()
            .filter_map(|s| match s.decode::<R>() {
                Ok(record) => Some(record),
                Err(err) => {
                    warn!(queue = R::QUEUE, id = s.id(), error = %err, "skipping undecodable record");
                    None
                }
            })
            .collect()
    }
}

#[async_trait]
impl<R: QueueRecord> DurableQueue<R> for InMemoryQueue<R> {
    async fn insert(&self, record: &R) -> Result<()> {
        let stored = StoredRecord::encode(record, self.next_sequence())?;

        match self.records.entry(stored.id().to_string()) {
            Entry::Occupied(e) => Err(LifecycleError::DuplicateRecord {
                queue: R::QUEUE,
                id: e.key().clone(),
            }),
            Entry::Vacant(e) => {
                e.insert(stored);
                Ok(())
            }
        }
    }

    async fn upsert(&self, record: &R) -> Result<()> {
        let stored = StoredRecord::encode(record, self.next_sequence())?;
        self.records.insert(stored.id().to_string(), stored);
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        Ok(self.records.remove(id).is_some())
    }

    async fn get(&self, id: &str) -> Result<Option<R>> {
        let stored = self.records.get(id).map(|s| s.value().clone());
        stored.map(|s| s.decode::<R>()).transpose()
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.records.len())
    }

    async fn find_expired(&self, now: DateTime<Utc>) -> Result<Vec<R>> {
        let expired: Vec<StoredRecord> = self
            .records
            .iter()
            .filter(|s| s.due_at() <= now)
            .map(|s| s.value().clone())
            .collect();

        Ok(self.decode_sorted(expired))
    }

    async fn list(&self) -> Result<Vec<R>> {
        let all: Vec<StoredRecord> = self.records.iter().map(|s| s.value().clone()).collect();
        Ok(self.decode_sorted(all))
    }

    async fn clear(&self) -> Result<()> {
        self.records.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bucket::Bucket;
    use crate::record::{DeletionRecord, TestTimeoutRecord};
    use chrono::Duration;

    fn bucket(n: usize) -> Bucket {
        Bucket::builder()
            .id(format!("id{n}"))
            .full_name(format!("/bucket/path/here/{n}"))
            .build()
    }

    #[tokio::test]
    async fn insert_rejects_duplicate_id_but_upsert_replaces() {
        let queue = InMemoryQueue::<DeletionRecord>::new();
        let now = Utc::now();

        queue
            .insert(&DeletionRecord::new(bucket(1), now, true))
            .await
            .unwrap();
        let err = queue
            .insert(&DeletionRecord::new(bucket(1), now, true))
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::DuplicateRecord { .. }));
        assert!(err.is_queue_write());

        queue
            .upsert(&DeletionRecord::new(bucket(1), now + Duration::seconds(60), false))
            .await
            .unwrap();
        assert_eq!(queue.count().await.unwrap(), 1);
        let stored = queue.get("/bucket/path/here/1").await.unwrap().unwrap();
        assert!(!stored.is_scheduled_purge());
    }

    #[tokio::test]
    async fn find_expired_returns_only_due_records_in_insertion_order() {
        let queue = InMemoryQueue::<TestTimeoutRecord>::new();
        let now = Utc::now();

        let first = TestTimeoutRecord::new(bucket(1), now - Duration::seconds(5), vec![]);
        let future = TestTimeoutRecord::new(bucket(2), now + Duration::seconds(10), vec![]);
        let second = TestTimeoutRecord::new(bucket(3), now, vec!["h1".into()]);
        for r in [&first, &future, &second] {
            queue.insert(r).await.unwrap();
        }

        let expired = queue.find_expired(now).await.unwrap();
        let ids: Vec<_> = expired.iter().map(|r| r.id()).collect();
        assert_eq!(ids, vec![first.id(), second.id()]);

        assert!(queue.delete(&first.record_id()).await.unwrap());
        assert!(!queue.delete(&first.record_id()).await.unwrap());
        assert_eq!(queue.count().await.unwrap(), 2);

        queue.clear().await.unwrap();
        assert_eq!(queue.count().await.unwrap(), 0);
    }

    /// 与删除记录同 id、结构不兼容的记录
    #[derive(Clone, serde::Serialize, serde::Deserialize)]
    struct Garbled {
        id: String,
    }

    impl QueueRecord for Garbled {
        const QUEUE: &'static str = "garbled";

        fn record_id(&self) -> String {
            self.id.clone()
        }

        fn due_at(&self) -> DateTime<Utc> {
            Utc::now() - Duration::seconds(1)
        }
    }

    #[tokio::test]
    async fn undecodable_record_does_not_hide_the_rest() {
        let queue = InMemoryQueue::<DeletionRecord>::new();
        let now = Utc::now();
        for n in 1..=3 {
            queue
                .insert(&DeletionRecord::new(bucket(n), now - Duration::seconds(1), false))
                .await
                .unwrap();
        }
        let garbled = StoredRecord::encode(
            &Garbled {
                id: "/corrupt".into(),
            },
            queue.next_sequence(),
        )
        .unwrap();
        queue.records.insert(garbled.id().to_string(), garbled);

        let expired = queue.find_expired(now).await.unwrap();
        assert_eq!(expired.len(), 3);
        assert_eq!(queue.list().await.unwrap().len(), 3);
        assert_eq!(queue.count().await.unwrap(), 4);
        assert!(queue.get("/corrupt").await.is_err());
    }

    #[tokio::test]
    async fn concurrent_writers_do_not_lose_records() {
        let queue = InMemoryQueue::<TestTimeoutRecord>::new();
        let mut tasks = Vec::new();
        for n in 0..32 {
            let q = queue.clone();
            tasks.push(tokio::spawn(async move {
                q.insert(&TestTimeoutRecord::new(bucket(n), Utc::now(), vec![]))
                    .await
            }));
        }
        for t in tasks {
            t.await.unwrap().unwrap();
        }
        assert_eq!(queue.count().await.unwrap(), 32);
    }
}
