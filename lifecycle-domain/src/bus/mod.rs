//! 答复总线（ReplyBus）
//!
//! 按逻辑主题命名的多生产者/多消费者发布订阅通道：
//! - 每个主机订阅自己的动作主题，实现点对点投递；
//! - 协调器为每次分发订阅独立的答复主题；
//! - 语义为“至少一次”，跨主题不保证顺序。
//!
//! 该模块仅定义协议与内存实现，可对接任意消息中间件。
//!
mod bus_inmemory;
mod reply_bus;

pub use bus_inmemory::InMemoryReplyBus;
pub use reply_bus::ReplyBus;
