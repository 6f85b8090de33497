//! 节点工作者（NodeWorker）
//!
//! 主机侧的长驻任务：
//! - 先订阅本主机的动作主题，再向节点目录注册（避免注册后、订阅前的消息丢失）；
//! - 对每个动作调用处理器，将 `Handled`/`Ignored` 答复发布到请求方的答复主题；
//! - 其余消息（测试停止、触发器节拍）作为通知交给处理器；
//! - 作为触发器工作者时，额外订阅本主机的触发器主题；
//! - 关闭时从节点目录注销。
//!
use super::{ActionHandler, HandlerReply, NodeDirectory};
use crate::bucket::HostId;
use crate::bus::ReplyBus;
use crate::error::LifecycleResult as Result;
use crate::message::{ActionMessage, BusMessage, OutcomeRecord, ReplyMessage, topics};
use bon::Builder;
use futures_core::stream::BoxStream;
use futures_util::StreamExt;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Builder)]
pub struct NodeWorker {
    #[builder(into)]
    host_id: HostId,
    bus: Arc<dyn ReplyBus>,
    directory: Arc<dyn NodeDirectory>,
    handler: Arc<dyn ActionHandler>,
    /// 是否同时作为本地触发器工作者接收节拍
    #[builder(default)]
    trigger_worker: bool,
}

impl NodeWorker {
    pub fn host_id(&self) -> &str {
        &self.host_id
    }

    /// 启动工作者，返回可用于关闭/等待的句柄
    pub async fn start(self: Arc<Self>) -> Result<WorkerHandle> {
        let token = CancellationToken::new();
        let mut stream = self.bus.subscribe(&topics::host(&self.host_id)).await;
        if self.trigger_worker {
            let ticks = self
                .bus
                .subscribe(&topics::trigger_worker(&self.host_id))
                .await;
            stream = futures_util::stream::select(stream, ticks).boxed();
        }
        self.directory.register(&self.host_id).await?;

        info!(
            host = %self.host_id,
            handler = self.handler.handler_name(),
            "node worker started"
        );

        let task = tokio::spawn(Self::receive_loop(self.clone(), stream, token.clone()));

        Ok(WorkerHandle {
            token,
            task: Some(task),
        })
    }

    async fn receive_loop(
        self: Arc<Self>,
        mut stream: BoxStream<'static, Result<BusMessage>>,
        token: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    break;
                }
                maybe_message = stream.next() => {
                    match maybe_message {
                        Some(Ok(BusMessage::Action { request_id, reply_topic, action })) => {
                            // 每个动作独立处理，慢处理器不阻塞后续消息
                            let worker = self.clone();
                            tokio::spawn(async move {
                                worker.reply(request_id, &reply_topic, &action).await;
                            });
                        }
                        Some(Ok(message)) => {
                            self.handler.notify(&self.host_id, &message).await;
                        }
                        Some(Err(err)) => {
                            warn!(host = %self.host_id, error = %err, "action stream error");
                        }
                        None => {
                            break;
                        }
                    }
                }
            }
        }

        if let Err(err) = self.directory.deregister(&self.host_id).await {
            warn!(host = %self.host_id, error = %err, "failed to deregister host");
        }
        info!(host = %self.host_id, "node worker stopped");
    }

    async fn reply(&self, request_id: Uuid, reply_topic: &str, action: &ActionMessage) {
        let reply = self.decide(action).await;
        let message = BusMessage::Reply { request_id, reply };

        if let Err(err) = self.bus.publish(reply_topic, &message).await {
            warn!(
                host = %self.host_id,
                %request_id,
                error = %err,
                "failed to publish reply"
            );
        }
    }

    /// 对单个动作作出答复
    pub async fn decide(&self, action: &ActionMessage) -> ReplyMessage {
        let source = self.host_id.clone();

        if !self.handler.handled_actions().matches(action.kind()) {
            debug!(host = %source, kind = %action.kind(), "action not handled here");
            return ReplyMessage::Ignored { source };
        }

        match self.handler.handle(&self.host_id, action).await {
            Ok(HandlerReply::Handled(result)) => ReplyMessage::Handled { source, result },
            Ok(HandlerReply::Ignored) => ReplyMessage::Ignored { source },
            Err(err) => {
                let result =
                    OutcomeRecord::error(source.clone(), action.kind().as_str(), err.to_string());
                ReplyMessage::Handled { source, result }
            }
        }
    }
}

/// 工作者运行句柄：用于优雅关闭与等待任务结束
pub struct WorkerHandle {
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// 等待接收循环退出（包括从节点目录注销）
    pub async fn join(mut self) {
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
