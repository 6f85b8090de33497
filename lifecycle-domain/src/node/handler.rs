//! 动作处理器（ActionHandler）
//!
//! 定义主机对某类/多类/全部动作的处理逻辑与元信息（名称、关注的动作类型）。
//! 对不关注的动作，节点工作者会自动答复 `Ignored`。
//!
use crate::message::{ActionKind, ActionMessage, BusMessage, OutcomeRecord};
use async_trait::async_trait;

#[derive(Clone, Debug)]
pub enum HandledActions {
    One(ActionKind),
    Many(Vec<ActionKind>),
    All,
}

impl HandledActions {
    pub fn matches(&self, kind: ActionKind) -> bool {
        match self {
            HandledActions::One(k) => *k == kind,
            HandledActions::Many(ks) => ks.contains(&kind),
            HandledActions::All => true,
        }
    }
}

/// 处理器的决定
#[derive(Clone, Debug)]
pub enum HandlerReply {
    Handled(OutcomeRecord),
    Ignored,
}

/// 动作处理器：每个主机一个
#[async_trait]
pub trait ActionHandler: Send + Sync {
    /// 处理器名称（用于日志与审计）
    fn handler_name(&self) -> &str;
    /// 返回该处理器关注的动作类型
    fn handled_actions(&self) -> HandledActions;
    /// 处理动作；返回错误时视为 `Handled{success=false}`
    async fn handle(&self, host: &str, action: &ActionMessage) -> anyhow::Result<HandlerReply>;
    /// 无需答复的通知（测试超时停止、触发器节拍等）
    async fn notify(&self, _host: &str, _message: &BusMessage) {}
}
