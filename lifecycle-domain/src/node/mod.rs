//! 节点侧（node）
//!
//! - `NodeDirectory`：当前已注册处理器的主机快照（成员管理由外部提供）；
//! - `ActionHandler`：主机上对动作作出“处理/忽略”决定的处理器；
//! - `NodeWorker`：订阅主机动作主题、调用处理器并发布答复的长驻任务。
//!
mod directory;
mod handler;
mod worker;

pub use directory::{InMemoryNodeDirectory, NodeDirectory};
pub use handler::{ActionHandler, HandledActions, HandlerReply};
pub use worker::{NodeWorker, WorkerHandle};
