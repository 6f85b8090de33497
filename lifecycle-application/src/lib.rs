//! 桶生命周期应用层（lifecycle-application）
//!
//! 在领域层之上提供管理操作入口：
//! - `BucketLifecycleService`：删除、清空、测试运行、挂起/恢复与通知；
//! - `BucketStore`：桶与桶状态的元数据存储（含内存实现）；
//! - `StorePurgeService`：基于桶存储的物理清理协作方；
//! - `LifecycleConfig`：超时、测试缺省值、删除延迟与清扫周期配置。
//!
pub mod config;
pub mod error;
pub mod purge;
pub mod result;
pub mod service;
pub mod store;

pub use config::LifecycleConfig;
pub use error::{AppError, AppResult};
pub use result::ManagementResult;
pub use service::BucketLifecycleService;
pub use store::{BucketStore, InMemoryBucketStore};
