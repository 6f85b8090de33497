//! 集群消息模型
//!
//! - `ActionMessage`：集群范围的桶动作（发布后不可变）；
//! - `ReplyMessage`：节点对动作的答复（处理/忽略/超时）；
//! - `OutcomeRecord`：统一的结果描述；
//! - `BusMessage`：总线上的传输形态，携带判别字段，便于跨进程重建原始动作。
//!
use crate::bucket::{Bucket, HostId, TestSpec};
use bon::Builder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// 动作判别字段（稳定名称，用于持久化与重放）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    New,
    Update,
    Suspend,
    Resume,
    Purge,
    Delete,
    Poll,
    HarvestComplete,
    Test,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::New => "new",
            ActionKind::Update => "update",
            ActionKind::Suspend => "suspend",
            ActionKind::Resume => "resume",
            ActionKind::Purge => "purge",
            ActionKind::Delete => "delete",
            ActionKind::Poll => "poll",
            ActionKind::HarvestComplete => "harvest_complete",
            ActionKind::Test => "test",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 集群范围的桶动作
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionMessage {
    New { bucket: Bucket },
    Update { bucket: Bucket },
    Suspend { bucket: Bucket },
    Resume { bucket: Bucket },
    Purge { bucket: Bucket },
    Delete { bucket: Bucket },
    Poll { bucket: Bucket },
    HarvestComplete { bucket: Bucket },
    Test { bucket: Bucket, spec: TestSpec },
}

impl ActionMessage {
    pub fn bucket(&self) -> &Bucket {
        match self {
            ActionMessage::New { bucket }
            | ActionMessage::Update { bucket }
            | ActionMessage::Suspend { bucket }
            | ActionMessage::Resume { bucket }
            | ActionMessage::Purge { bucket }
            | ActionMessage::Delete { bucket }
            | ActionMessage::Poll { bucket }
            | ActionMessage::HarvestComplete { bucket }
            | ActionMessage::Test { bucket, .. } => bucket,
        }
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            ActionMessage::New { .. } => ActionKind::New,
            ActionMessage::Update { .. } => ActionKind::Update,
            ActionMessage::Suspend { .. } => ActionKind::Suspend,
            ActionMessage::Resume { .. } => ActionKind::Resume,
            ActionMessage::Purge { .. } => ActionKind::Purge,
            ActionMessage::Delete { .. } => ActionKind::Delete,
            ActionMessage::Poll { .. } => ActionKind::Poll,
            ActionMessage::HarvestComplete { .. } => ActionKind::HarvestComplete,
            ActionMessage::Test { .. } => ActionKind::Test,
        }
    }
}

/// 统一的结果描述
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
pub struct OutcomeRecord {
    #[builder(default = Utc::now())]
    timestamp: DateTime<Utc>,
    success: bool,
    /// 产生该结果的主机或组件
    #[builder(into)]
    source: String,
    /// 对应的命令/动作名称
    #[builder(into)]
    command: String,
    #[builder(into)]
    message: String,
    details: Option<Value>,
}

impl OutcomeRecord {
    pub fn success(
        source: impl Into<String>,
        command: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::builder()
            .success(true)
            .source(source)
            .command(command)
            .message(message)
            .build()
    }

    pub fn error(
        source: impl Into<String>,
        command: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::builder()
            .success(false)
            .source(source)
            .command(command)
            .message(message)
            .build()
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn details(&self) -> Option<&Value> {
        self.details.as_ref()
    }
}

/// 节点答复
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reply", rename_all = "snake_case")]
pub enum ReplyMessage {
    /// 节点显式处理并返回结果
    Handled { source: HostId, result: OutcomeRecord },
    /// 节点显式拒绝（例如与其技术栈无关）
    Ignored { source: HostId },
    /// 由协调器合成，节点永远不会发送
    TimedOut { source: HostId },
}

impl ReplyMessage {
    pub fn source(&self) -> &str {
        match self {
            ReplyMessage::Handled { source, .. }
            | ReplyMessage::Ignored { source }
            | ReplyMessage::TimedOut { source } => source,
        }
    }

    /// 仅 `Handled{success=true}` 视为该目标成功
    pub fn is_success(&self) -> bool {
        matches!(self, ReplyMessage::Handled { result, .. } if result.is_success())
    }

    pub fn is_timed_out(&self) -> bool {
        matches!(self, ReplyMessage::TimedOut { .. })
    }

    /// 转为面向用户的结果描述
    pub fn to_outcome(&self, kind: ActionKind) -> OutcomeRecord {
        match self {
            ReplyMessage::Handled { result, .. } => result.clone(),
            ReplyMessage::Ignored { source } => {
                OutcomeRecord::error(source.clone(), kind.as_str(), "action ignored by host")
            }
            ReplyMessage::TimedOut { source } => OutcomeRecord::error(
                source.clone(),
                kind.as_str(),
                "timed out waiting for reply",
            ),
        }
    }
}

/// 总线传输形态
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusMessage {
    /// 点对点发送到某主机的动作；答复发布到 `reply_topic`
    Action {
        request_id: Uuid,
        reply_topic: String,
        action: ActionMessage,
    },
    Reply {
        request_id: Uuid,
        reply: ReplyMessage,
    },
    /// 测试超时停止通知（无需答复）
    TestExpired { bucket: Bucket },
    /// 触发器评估节拍
    EvaluateTriggers,
}

/// 主题命名
pub mod topics {
    use uuid::Uuid;

    /// 主机动作主题
    pub fn host(host: &str) -> String {
        format!("bucket.action.{host}")
    }

    /// 单次分发的答复主题
    pub fn reply(request_id: &Uuid) -> String {
        format!("bucket.reply.{request_id}")
    }

    /// 本地触发器工作者主题
    pub fn trigger_worker(host: &str) -> String {
        format!("bucket.trigger.{host}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bucket() -> Bucket {
        Bucket::builder().id("id1").full_name("/a/b").build()
    }

    #[test]
    fn action_carries_kind_discriminant_on_the_wire() {
        let action = ActionMessage::Test {
            bucket: bucket(),
            spec: TestSpec::builder()
                .max_run_time(std::time::Duration::from_secs(5))
                .build(),
        };
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["kind"], "test");
        assert_eq!(json["bucket"]["full_name"], "/a/b");

        let back: ActionMessage = serde_json::from_value(json).unwrap();
        assert_eq!(back.kind(), ActionKind::Test);
        assert_eq!(back, action);
    }

    #[test]
    fn only_successful_handled_counts_as_success() {
        let ok = ReplyMessage::Handled {
            source: "h1".into(),
            result: OutcomeRecord::success("h1", "delete", "handled"),
        };
        let failed = ReplyMessage::Handled {
            source: "h2".into(),
            result: OutcomeRecord::error("h2", "delete", "boom"),
        };
        let ignored = ReplyMessage::Ignored { source: "h3".into() };
        let timed_out = ReplyMessage::TimedOut { source: "h4".into() };

        assert!(ok.is_success());
        assert!(!failed.is_success());
        assert!(!ignored.is_success());
        assert!(!timed_out.is_success());
        assert!(timed_out.is_timed_out());

        let outcome = timed_out.to_outcome(ActionKind::Delete);
        assert!(!outcome.is_success());
        assert_eq!(outcome.source(), "h4");
        assert_eq!(outcome.command(), "delete");
    }
}
