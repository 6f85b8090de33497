//! 动作协调器（ActionCoordinator）
//!
//! 统一编排一次“解析目标 → 广播动作 → 截止前收集答复”的流程：
//! - 多节点桶：目标为节点亲和与过滤集合的交集；单节点桶：忽略亲和，轮询选取一个已注册主机；
//! - 目标为空时立即返回 `NoTargets`，不发送任何消息；
//! - 截止时间只计算一次；截止后对未答复的目标合成 `TimedOut`；
//! - 重复答复与非目标主机的答复只记录日志，不影响结果。
//!
//! 部分失败是数据而不是错误：返回的 `ReplySet` 大小总是等于解析出的目标数。
//!
use crate::bucket::{BucketStatus, HostId};
use crate::bus::ReplyBus;
use crate::error::{LifecycleError, LifecycleResult as Result};
use crate::message::{ActionKind, ActionMessage, BusMessage, OutcomeRecord, ReplyMessage, topics};
use crate::node::NodeDirectory;
use bon::Builder;
use futures_core::stream::BoxStream;
use futures_util::{FutureExt, StreamExt};
use std::collections::hash_map::Entry;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Builder)]
pub struct ActionCoordinator {
    bus: Arc<dyn ReplyBus>,
    directory: Arc<dyn NodeDirectory>,
    /// 单节点桶的轮询游标
    #[builder(skip)]
    cursor: AtomicUsize,
}

impl ActionCoordinator {
    /// 广播动作并收集答复。
    ///
    /// - `status`：桶状态（可能不存在，此时多节点桶没有目标）；
    /// - `target_filter`：可选的目标主机过滤集合；
    /// - `timeout`：等待答复的最长时间。
    pub async fn dispatch(
        &self,
        status: Option<&BucketStatus>,
        target_filter: Option<&BTreeSet<HostId>>,
        action: ActionMessage,
        timeout: Duration,
    ) -> Result<ReplySet> {
        let targets = self.resolve_targets(status, target_filter, &action).await?;
        let kind = action.kind();
        let bucket = action.bucket().full_name().to_string();

        let request_id = Uuid::new_v4();
        let reply_topic = topics::reply(&request_id);
        // 先订阅答复主题再发布，避免快速答复丢失；缓冲需容纳全部目标的答复
        let mut stream = self
            .bus
            .subscribe_with_capacity(&reply_topic, targets.len())
            .await;

        let message = BusMessage::Action {
            request_id,
            reply_topic,
            action,
        };
        for target in &targets {
            self.bus.publish(&topics::host(target), &message).await?;
        }

        debug!(%request_id, %kind, %bucket, targets = ?targets, "action published");

        let deadline = Instant::now() + timeout;
        let received = Self::gather(&targets, request_id, &mut stream, deadline).await;
        let replies = ReplySet::assemble(kind, bucket, &targets, received);

        info!(
            %request_id,
            %kind,
            bucket = replies.bucket(),
            targets = replies.len(),
            succeeded = replies.successful_hosts().len(),
            timed_out = replies.timed_out_hosts().len(),
            "action dispatch complete"
        );

        Ok(replies)
    }

    /// 解析目标主机集合（去重、保持亲和顺序）
    pub async fn resolve_targets(
        &self,
        status: Option<&BucketStatus>,
        target_filter: Option<&BTreeSet<HostId>>,
        action: &ActionMessage,
    ) -> Result<Vec<HostId>> {
        let bucket = action.bucket();
        let allowed = |host: &str| target_filter.is_none_or(|f| f.contains(host));

        let targets: Vec<HostId> = if bucket.multi_node_enabled() {
            let mut seen = HashSet::new();
            status
                .map(|s| s.node_affinity())
                .unwrap_or_default()
                .iter()
                .filter(|h| allowed(h) && seen.insert(h.as_str()))
                .cloned()
                .collect()
        } else {
            let candidates: Vec<HostId> = self
                .directory
                .registered_hosts()
                .await?
                .into_iter()
                .filter(|h| allowed(h))
                .collect();

            if candidates.is_empty() {
                Vec::new()
            } else {
                let idx = self.cursor.fetch_add(1, Ordering::Relaxed) % candidates.len();
                vec![candidates[idx].clone()]
            }
        };

        if targets.is_empty() {
            return Err(LifecycleError::NoTargets {
                bucket: bucket.full_name().to_string(),
            });
        }
        Ok(targets)
    }

    async fn gather(
        targets: &[HostId],
        request_id: Uuid,
        stream: &mut BoxStream<'static, Result<BusMessage>>,
        deadline: Instant,
    ) -> HashMap<HostId, ReplyMessage> {
        let expected: HashSet<&str> = targets.iter().map(String::as_str).collect();
        let mut received: HashMap<HostId, ReplyMessage> = HashMap::with_capacity(targets.len());

        while received.len() < expected.len() {
            match tokio::time::timeout_at(deadline, stream.next()).await {
                Ok(Some(item)) => Self::accept(&expected, request_id, &mut received, item),
                Ok(None) => {
                    warn!(%request_id, "reply stream closed before all targets replied");
                    break;
                }
                Err(_elapsed) => {
                    // 截止时已到达但尚未取出的答复仍然计入
                    while received.len() < expected.len() {
                        match stream.next().now_or_never() {
                            Some(Some(item)) => {
                                Self::accept(&expected, request_id, &mut received, item)
                            }
                            _ => break,
                        }
                    }
                    break;
                }
            }
        }

        received
    }

    fn accept(
        expected: &HashSet<&str>,
        request_id: Uuid,
        received: &mut HashMap<HostId, ReplyMessage>,
        item: Result<BusMessage>,
    ) {
        let reply = match item {
            Ok(BusMessage::Reply {
                request_id: rid,
                reply,
            }) if rid == request_id => reply,
            Ok(other) => {
                debug!(%request_id, message = ?other, "ignoring unrelated message on reply topic");
                return;
            }
            Err(err) => {
                warn!(%request_id, error = %err, "reply stream error");
                return;
            }
        };

        let source = reply.source().to_string();
        if reply.is_timed_out() {
            warn!(%request_id, %source, "host sent a timeout reply, ignoring");
            return;
        }
        if !expected.contains(source.as_str()) {
            warn!(%request_id, %source, "reply from a host that was not targeted");
            return;
        }

        match received.entry(source) {
            Entry::Occupied(e) => {
                warn!(%request_id, source = %e.key(), "duplicate reply, keeping the first");
            }
            Entry::Vacant(e) => {
                e.insert(reply);
            }
        }
    }
}

/// 一次分发的完整答复集合（真实答复 + 合成超时），按目标顺序排列
#[derive(Debug, Clone)]
pub struct ReplySet {
    kind: ActionKind,
    bucket: String,
    replies: Vec<ReplyMessage>,
}

impl ReplySet {
    pub(crate) fn assemble(
        kind: ActionKind,
        bucket: String,
        targets: &[HostId],
        mut received: HashMap<HostId, ReplyMessage>,
    ) -> Self {
        let replies = targets
            .iter()
            .map(|host| {
                received
                    .remove(host)
                    .unwrap_or_else(|| ReplyMessage::TimedOut {
                        source: host.clone(),
                    })
            })
            .collect();

        Self {
            kind,
            bucket,
            replies,
        }
    }

    pub fn kind(&self) -> ActionKind {
        self.kind
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn len(&self) -> usize {
        self.replies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.replies.is_empty()
    }

    pub fn replies(&self) -> &[ReplyMessage] {
        &self.replies
    }

    pub fn get(&self, host: &str) -> Option<&ReplyMessage> {
        self.replies.iter().find(|r| r.source() == host)
    }

    /// 答复了 `Handled{success=true}` 的主机
    pub fn successful_hosts(&self) -> Vec<HostId> {
        self.hosts_where(ReplyMessage::is_success)
    }

    /// 失败、拒绝或超时的主机
    pub fn unsuccessful_hosts(&self) -> Vec<HostId> {
        self.hosts_where(|r| !r.is_success())
    }

    pub fn timed_out_hosts(&self) -> Vec<HostId> {
        self.hosts_where(ReplyMessage::is_timed_out)
    }

    pub fn any_success(&self) -> bool {
        self.replies.iter().any(ReplyMessage::is_success)
    }

    /// 面向用户的结果列表（包括合成的超时）
    pub fn outcomes(&self) -> Vec<OutcomeRecord> {
        self.replies
            .iter()
            .map(|r| r.to_outcome(self.kind))
            .collect()
    }

    fn hosts_where(&self, pred: impl Fn(&ReplyMessage) -> bool) -> Vec<HostId> {
        self.replies
            .iter()
            .filter(|r| pred(r))
            .map(|r| r.source().to_string())
            .collect()
    }
}
