//! 桶（Bucket）与桶状态（BucketStatus）
//!
//! `Bucket` 为稳定的配置单元，`BucketStatus` 为独立存储的运行态（节点亲和、挂起等）。
//! 允许 `Bucket` 在没有 `BucketStatus` 的情况下存在（尚未分配节点，属于降级但合法的状态）。
//!
use bon::Builder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 主机标识
pub type HostId = String;

/// 测试桶的路径前缀
pub const TEST_BUCKET_PREFIX: &str = "/bucket_testing/";

#[derive(Debug, Clone, PartialEq, Eq, Builder, Serialize, Deserialize)]
pub struct Bucket {
    /// 稳定标识
    #[builder(into)]
    id: String,
    /// 层级路径，同时也是人类可读的名称
    #[builder(into)]
    full_name: String,
    /// 所有者
    #[builder(into)]
    owner_id: Option<String>,
    /// 是否在多个节点上同时运行
    #[builder(default)]
    #[serde(default)]
    multi_node_enabled: bool,
}

impl Bucket {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    pub fn owner_id(&self) -> Option<&str> {
        self.owner_id.as_deref()
    }

    pub fn multi_node_enabled(&self) -> bool {
        self.multi_node_enabled
    }

    /// 生成测试桶：路径改写到 `TEST_BUCKET_PREFIX/{user_id}/` 之下，避免覆盖正式数据
    pub fn to_test_bucket(&self, user_id: &str) -> Bucket {
        let mut test = self.clone();
        test.full_name = format!(
            "{TEST_BUCKET_PREFIX}{user_id}/{}",
            self.full_name.trim_start_matches('/')
        );
        test
    }

    pub fn is_test_bucket(&self) -> bool {
        self.full_name.starts_with(TEST_BUCKET_PREFIX)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Builder, Serialize, Deserialize)]
pub struct BucketStatus {
    /// 与 `Bucket::id` 相同
    #[builder(into)]
    id: String,
    #[builder(default)]
    #[serde(default)]
    suspended: bool,
    quarantined_until: Option<DateTime<Utc>>,
    /// 期望运行该桶的主机（有序）
    #[builder(default)]
    #[serde(default)]
    node_affinity: Vec<HostId>,
    #[builder(default)]
    #[serde(default)]
    num_objects: u64,
}

impl BucketStatus {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn suspended(&self) -> bool {
        self.suspended
    }

    pub fn quarantined_until(&self) -> Option<DateTime<Utc>> {
        self.quarantined_until
    }

    pub fn node_affinity(&self) -> &[HostId] {
        &self.node_affinity
    }

    pub fn num_objects(&self) -> u64 {
        self.num_objects
    }

    pub fn set_suspended(&mut self, suspended: bool) {
        self.suspended = suspended;
    }

    pub fn set_num_objects(&mut self, num_objects: u64) {
        self.num_objects = num_objects;
    }

    pub fn is_quarantined(&self, now: DateTime<Utc>) -> bool {
        self.quarantined_until.is_some_and(|until| until > now)
    }
}

/// 测试运行参数；缺省值由上层配置提供
#[derive(Debug, Clone, Default, PartialEq, Eq, Builder, Serialize, Deserialize)]
pub struct TestSpec {
    /// 等待节点启动测试的最长时间
    max_startup_time: Option<Duration>,
    /// 测试最长运行时间，超时后由测试清扫器强制停止
    max_run_time: Option<Duration>,
    /// 测试数据保留时间，到期后由删除清扫器清理
    max_storage_time: Option<Duration>,
    /// 启动前是否清空已有的测试数据
    overwrite_existing_data: Option<bool>,
}

impl TestSpec {
    pub fn max_startup_time(&self) -> Option<Duration> {
        self.max_startup_time
    }

    pub fn max_run_time(&self) -> Option<Duration> {
        self.max_run_time
    }

    pub fn max_storage_time(&self) -> Option<Duration> {
        self.max_storage_time
    }

    pub fn overwrite_existing_data(&self) -> Option<bool> {
        self.overwrite_existing_data
    }

    /// 以缺省值补齐未指定的参数
    pub fn with_defaults(self, defaults: &TestDefaults) -> Self {
        Self {
            max_startup_time: self.max_startup_time.or(Some(defaults.max_startup_time)),
            max_run_time: self.max_run_time.or(Some(defaults.max_run_time)),
            max_storage_time: self.max_storage_time.or(Some(defaults.max_storage_time)),
            overwrite_existing_data: self
                .overwrite_existing_data
                .or(Some(defaults.overwrite_existing_data)),
        }
    }
}

/// 测试运行参数的缺省值
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestDefaults {
    pub max_startup_time: Duration,
    pub max_run_time: Duration,
    pub max_storage_time: Duration,
    pub overwrite_existing_data: bool,
}

impl Default for TestDefaults {
    fn default() -> Self {
        Self {
            max_startup_time: Duration::from_secs(120),
            max_run_time: Duration::from_secs(60),
            max_storage_time: Duration::from_secs(86400),
            overwrite_existing_data: true,
        }
    }
}
