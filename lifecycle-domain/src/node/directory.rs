//! 节点目录（NodeDirectory）
//!
//! 协调器只消费“当前已注册处理器的主机”快照，不负责成员管理。
//!
use crate::bucket::HostId;
use crate::error::LifecycleResult as Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::BTreeSet;
use std::sync::Arc;

#[async_trait]
pub trait NodeDirectory: Send + Sync {
    /// 当前已注册的主机快照
    async fn registered_hosts(&self) -> Result<BTreeSet<HostId>>;

    async fn register(&self, host: &str) -> Result<()>;

    async fn deregister(&self, host: &str) -> Result<()>;
}

/// 内存版节点目录
#[derive(Clone, Default)]
pub struct InMemoryNodeDirectory {
    hosts: Arc<DashMap<HostId, DateTime<Utc>>>,
}

impl InMemoryNodeDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// 主机注册时间
    pub fn registered_at(&self, host: &str) -> Option<DateTime<Utc>> {
        self.hosts.get(host).map(|t| *t.value())
    }
}

#[async_trait]
impl NodeDirectory for InMemoryNodeDirectory {
    async fn registered_hosts(&self) -> Result<BTreeSet<HostId>> {
        Ok(self.hosts.iter().map(|h| h.key().clone()).collect())
    }

    async fn register(&self, host: &str) -> Result<()> {
        self.hosts.insert(host.to_string(), Utc::now());
        Ok(())
    }

    async fn deregister(&self, host: &str) -> Result<()> {
        self.hosts.remove(host);
        Ok(())
    }
}
