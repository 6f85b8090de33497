use lifecycle_domain::message::OutcomeRecord;
use serde::Serialize;

/// 管理操作的返回值
///
/// - `value`：操作的整体结论；
/// - `messages`：完整的结果列表（节点答复、拒绝说明与合成的超时），面向调用方展示。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManagementResult<T> {
    value: T,
    messages: Vec<OutcomeRecord>,
}

impl<T> ManagementResult<T> {
    pub fn new(value: T, messages: Vec<OutcomeRecord>) -> Self {
        Self { value, messages }
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn messages(&self) -> &[OutcomeRecord] {
        &self.messages
    }

    pub fn into_parts(self) -> (T, Vec<OutcomeRecord>) {
        (self.value, self.messages)
    }
}

impl ManagementResult<bool> {
    /// 失败且只有一条说明
    pub fn failure(message: OutcomeRecord) -> Self {
        Self::new(false, vec![message])
    }

    pub fn succeeded(&self) -> bool {
        self.value
    }
}
