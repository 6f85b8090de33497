//! 桶生命周期协调领域层（lifecycle-domain）
//!
//! 在动态注册、可能随时离开或停顿的节点集群上协调桶动作（创建/更新/挂起/恢复/删除/测试），
//! 并把不确定的分发结果转化为持久化的后续工作：
//! - 数据模型（`bucket`、`message`、`record`）
//! - 答复总线（`bus`）与节点侧工作者（`node`）
//! - 动作协调器（`coordinator`）：广播 → 截止前收集 → 合成超时
//! - 结果裁决器（`resolver`）：整体结论、重试记录、删除与测试记录
//! - 持久化队列（`queue`）与周期清扫（`sweeper`）
//! - 物理清理协作方接口（`purge`）
//!
//! 本 crate 不绑定任何具体的传输或存储技术，各抽象均提供内存实现，用于测试与本地运行。
//!
//! 典型用法：
//! 1. 为每个主机启动 `NodeWorker`，挂接其 `ActionHandler`；
//! 2. 通过 `ActionCoordinator::dispatch` 分发动作，得到 `ReplySet`；
//! 3. 交给 `OutcomeResolver` 生成结论并写入队列；
//! 4. 使用 `SweeperRuntime` 驱动删除、测试超时与触发器任务。
//!
pub mod bucket;
pub mod bus;
pub mod coordinator;
pub mod error;
pub mod message;
pub mod node;
pub mod purge;
pub mod queue;
pub mod record;
pub mod resolver;
pub mod sweeper;
