//! 答复总线（ReplyBus）协议
//!
//! 定义按主题发布与订阅的统一抽象，订阅返回 'static 生命周期的消息流，
//! 以便在异步运行时（如 tokio::spawn）中消费。
//!
use crate::{error::LifecycleResult as Result, message::BusMessage};
use async_trait::async_trait;
use futures_core::stream::BoxStream;

/// 答复总线：按主题分发消息与订阅消息流
#[async_trait]
pub trait ReplyBus: Send + Sync {
    async fn publish(&self, topic: &str, message: &BusMessage) -> Result<()>;

    /// 返回一个 'static 生命周期的消息流；订阅建立之后发布的消息才会被收到
    async fn subscribe(&self, topic: &str) -> BoxStream<'static, Result<BusMessage>>;

    /// 订阅并保证主题至少能缓冲 `capacity` 条未读消息；默认等同于 `subscribe`
    async fn subscribe_with_capacity(
        &self,
        topic: &str,
        _capacity: usize,
    ) -> BoxStream<'static, Result<BusMessage>> {
        self.subscribe(topic).await
    }
}
