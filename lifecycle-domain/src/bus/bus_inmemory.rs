//! 内存版答复总线（InMemoryReplyBus）
//!
//! 每个主题对应一个 `tokio::sync::broadcast` 通道，满足 `ReplyBus` 协议：
//! - `publish`：克隆并广播到主题；
//! - `subscribe`：按需创建主题通道，返回 `'static` 生命周期消息流；
//! - 最后一个订阅流被丢弃时移除主题通道；
//! - 典型用途：测试环境、示例与本地开发。
//!
//! 注意：若主题当前无订阅者，发送将被忽略（等价于消息丢失，由超时机制兜底）。

use crate::bus::ReplyBus;
use crate::error::{LifecycleError, LifecycleResult as Result};
use crate::message::BusMessage;
use async_trait::async_trait;
use dashmap::DashMap;
use futures_core::Stream;
use futures_core::stream::BoxStream;
use futures_util::StreamExt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

/// 简单的内存答复总线实现
#[derive(Clone)]
pub struct InMemoryReplyBus {
    topics: Arc<DashMap<String, broadcast::Sender<BusMessage>>>,
    capacity: usize,
}

impl InMemoryReplyBus {
    /// 创建一个内存总线，`capacity` 为每个主题的广播缓冲区容量
    pub fn new(capacity: usize) -> Self {
        Self {
            topics: Arc::new(DashMap::new()),
            capacity,
        }
    }

    /// 当前仍有订阅者的主题数
    pub fn active_topics(&self) -> usize {
        self.topics
            .iter()
            .filter(|t| t.value().receiver_count() > 0)
            .count()
    }
}

impl Default for InMemoryReplyBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl ReplyBus for InMemoryReplyBus {
    async fn publish(&self, topic: &str, message: &BusMessage) -> Result<()> {
        let sender = self.topics.get(topic).map(|s| s.value().clone());
        let Some(sender) = sender else {
            tracing::trace!(topic, "no subscribers for topic, dropping message");
            return Ok(());
        };

        if sender.send(message.clone()).is_err() {
            // 最后一个订阅者已离开：清理主题，消息视为丢失
            self.topics.remove_if(topic, |_, s| s.receiver_count() == 0);
        }
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> BoxStream<'static, Result<BusMessage>> {
        self.subscribe_with_capacity(topic, self.capacity).await
    }

    async fn subscribe_with_capacity(
        &self,
        topic: &str,
        capacity: usize,
    ) -> BoxStream<'static, Result<BusMessage>> {
        let rx = self
            .topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(capacity.max(self.capacity)).0)
            .subscribe();

        let stream =
            BroadcastStream::new(rx).map(|r| r.map_err(|e| LifecycleError::reply_bus(e.to_string())));
        Box::pin(Subscription {
            inner: Some(Box::pin(stream)),
            topics: self.topics.clone(),
            topic: topic.to_string(),
        })
    }
}

/// 订阅流；丢弃时若主题已无订阅者则移除主题通道
struct Subscription {
    inner: Option<BoxStream<'static, Result<BusMessage>>>,
    topics: Arc<DashMap<String, broadcast::Sender<BusMessage>>>,
    topic: String,
}

impl Stream for Subscription {
    type Item = Result<BusMessage>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match self.inner.as_mut() {
            Some(inner) => inner.poll_next_unpin(cx),
            None => Poll::Ready(None),
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        // 先释放接收端，再检查订阅数
        drop(self.inner.take());
        self.topics
            .remove_if(&self.topic, |_, s| s.receiver_count() == 0);
    }
}
