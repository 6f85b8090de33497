use lifecycle_domain::resolver::ResolverConfig;
use lifecycle_domain::sweeper::SweeperConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 生命周期服务配置
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// 普通动作（删除、挂起、恢复、清空通知）等待答复的时间
    pub action_timeout: Duration,
    /// 删除延迟与测试参数缺省值；`test_defaults.max_startup_time` 同时是测试启动等待答复的时间
    pub resolver: ResolverConfig,
    pub sweeper: SweeperConfig,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            action_timeout: Duration::from_secs(60),
            resolver: ResolverConfig::default(),
            sweeper: SweeperConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = LifecycleConfig::default();
        assert_eq!(config.resolver.test_defaults.max_startup_time, Duration::from_secs(120));
        assert_eq!(config.resolver.test_defaults.max_run_time, Duration::from_secs(60));
        assert_eq!(config.resolver.test_defaults.max_storage_time, Duration::from_secs(86400));
        assert!(config.resolver.test_defaults.overwrite_existing_data);
        assert_eq!(config.resolver.purge_delay, Duration::from_secs(60));
        assert_eq!(config.sweeper.deletion_interval, Duration::from_secs(5));
        assert_eq!(config.sweeper.test_interval, Duration::from_secs(1));
        assert_eq!(config.sweeper.trigger_interval, Duration::from_secs(10));
    }
}
