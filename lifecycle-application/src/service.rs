//! 桶生命周期服务（BucketLifecycleService）
//!
//! 管理操作的入口：删除、清空、测试运行与动作通知。
//! 每个操作的“分发 + 裁决”在独立任务中执行，调用方放弃等待不会中断队列写入。
//!
use crate::config::LifecycleConfig;
use crate::error::{AppError, AppResult};
use crate::result::ManagementResult;
use crate::store::BucketStore;
use bon::Builder;
use lifecycle_domain::bucket::{Bucket, BucketStatus, HostId, TestSpec};
use lifecycle_domain::coordinator::ActionCoordinator;
use lifecycle_domain::error::{LifecycleError, LifecycleResult};
use lifecycle_domain::message::{ActionKind, ActionMessage, OutcomeRecord};
use lifecycle_domain::purge::{PurgeScope, PurgeService};
use lifecycle_domain::resolver::OutcomeResolver;
use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const SOURCE: &str = "bucket_lifecycle_service";

#[derive(Builder)]
pub struct BucketLifecycleService {
    store: Arc<dyn BucketStore>,
    coordinator: Arc<ActionCoordinator>,
    resolver: Arc<OutcomeResolver>,
    purge: Arc<dyn PurgeService>,
    #[builder(default)]
    config: LifecycleConfig,
}

impl BucketLifecycleService {
    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    /// 按 id 删除桶；桶不存在时返回 `false` 且不写入任何记录
    pub async fn delete_bucket_by_id(&self, id: &str) -> AppResult<ManagementResult<bool>> {
        match self.store.get_bucket(id).await? {
            Some(bucket) => self.delete_bucket(bucket).await,
            None => Ok(Self::not_found(ActionKind::Delete, id)),
        }
    }

    /// 按 `full_name` 删除桶
    pub async fn delete_bucket_by_name(
        &self,
        full_name: &str,
    ) -> AppResult<ManagementResult<bool>> {
        match self.store.find_bucket_by_name(full_name).await? {
            Some(bucket) => self.delete_bucket(bucket).await,
            None => Ok(Self::not_found(ActionKind::Delete, full_name)),
        }
    }

    /// 批量删除，返回成功删除的桶数量；遇到硬错误立即返回
    pub async fn delete_buckets(&self, ids: &[String]) -> AppResult<ManagementResult<usize>> {
        let mut deleted = 0;
        let mut messages = Vec::new();

        for id in ids {
            let (ok, mut msgs) = self.delete_bucket_by_id(id).await?.into_parts();
            if ok {
                deleted += 1;
            }
            messages.append(&mut msgs);
        }

        Ok(ManagementResult::new(deleted, messages))
    }

    /// 删除桶：立即移除元数据，通知节点，并登记延迟的物理删除
    ///
    /// 桶记录一旦移除，删除记录必定写入；状态记录删除失败时仍继续分发与登记，
    /// 待删除记录持久化后再返回该错误。
    pub async fn delete_bucket(&self, bucket: Bucket) -> AppResult<ManagementResult<bool>> {
        let store = self.store.clone();
        let coordinator = self.coordinator.clone();
        let resolver = self.resolver.clone();
        let timeout = self.config.action_timeout;

        Self::detached(async move {
            let status = store.get_status(bucket.id()).await?;
            store.delete_bucket(bucket.id()).await?;
            let status_removed = store.delete_status(bucket.id()).await;
            if let Err(err) = &status_removed {
                warn!(bucket = bucket.full_name(), error = %err, "failed to remove bucket status");
            }

            info!(bucket = bucket.full_name(), id = bucket.id(), "bucket metadata removed");

            let action = ActionMessage::Delete {
                bucket: bucket.clone(),
            };

            let result = match coordinator
                .dispatch(status.as_ref(), None, action.clone(), timeout)
                .await
            {
                Ok(replies) => {
                    let outcome = resolver.resolve_deletion(&bucket, &action, &replies).await?;
                    let success = outcome.overall_success();
                    ManagementResult::new(success, outcome.into_outcomes())
                }
                Err(err) => {
                    // 元数据已删除，物理删除仍需登记
                    warn!(bucket = bucket.full_name(), error = %err, "delete not dispatched");
                    resolver.record_deletion(&bucket).await?;
                    ManagementResult::failure(OutcomeRecord::error(
                        SOURCE,
                        ActionKind::Delete.as_str(),
                        err.to_string(),
                    ))
                }
            };

            status_removed?;
            Ok(result)
        })
        .await
    }

    /// 清空桶数据
    ///
    /// - `delay` 为 `Some`：登记计划清空，已有待执行的清空时返回 `false`；
    /// - `delay` 为 `None`：立即执行物理清理并通知节点，全部结果成功时返回 `true`。
    pub async fn purge_bucket(
        &self,
        bucket: &Bucket,
        delay: Option<Duration>,
    ) -> AppResult<ManagementResult<bool>> {
        if let Some(delay) = delay {
            let scheduled = self.resolver.schedule_purge(bucket, delay).await?;
            let message = if scheduled {
                OutcomeRecord::success(SOURCE, ActionKind::Purge.as_str(), "purge scheduled")
            } else {
                OutcomeRecord::error(SOURCE, ActionKind::Purge.as_str(), "purge already pending")
            };
            return Ok(ManagementResult::new(scheduled, vec![message]));
        }

        let mut messages = self.purge_now(bucket, PurgeScope::DataOnly).await;

        let status = self.store.get_status(bucket.id()).await?;
        let notified = self
            .dispatch_and_resolve(
                status,
                None,
                ActionMessage::Purge {
                    bucket: bucket.clone(),
                },
            )
            .await?;
        match notified {
            Some(result) => messages.extend(result.into_parts().1),
            None => debug!(bucket = bucket.full_name(), "no hosts to notify of purge"),
        }

        let success = messages.iter().all(OutcomeRecord::is_success);
        Ok(ManagementResult::new(success, messages))
    }

    /// 测试运行：改写为用户的测试桶，按需清空旧测试数据，然后在节点上启动测试
    pub async fn test_bucket(
        &self,
        bucket: &Bucket,
        spec: TestSpec,
        user_id: &str,
    ) -> AppResult<ManagementResult<bool>> {
        if user_id.is_empty() {
            return Err(AppError::Validation("test run requires a user id".into()));
        }

        let defaults = self.resolver.config().test_defaults;
        let test_bucket = bucket.to_test_bucket(user_id);
        let spec = spec.with_defaults(&defaults);
        let startup_time = spec.max_startup_time().unwrap_or(defaults.max_startup_time);

        if spec.overwrite_existing_data().unwrap_or(true) {
            for message in self.purge_now(&test_bucket, PurgeScope::DataOnly).await {
                if !message.is_success() {
                    // 旧测试数据清理失败通常无害
                    warn!(bucket = test_bucket.full_name(), reason = message.message(), "failed to clear test data");
                }
            }
        }

        let status = self.store.get_status(bucket.id()).await?;
        let coordinator = self.coordinator.clone();
        let resolver = self.resolver.clone();

        Self::detached(async move {
            let action = ActionMessage::Test {
                bucket: test_bucket.clone(),
                spec: spec.clone(),
            };

            let replies = match coordinator
                .dispatch(status.as_ref(), None, action, startup_time)
                .await
            {
                Ok(replies) => replies,
                Err(LifecycleError::NoTargets { .. }) => {
                    return Ok(ManagementResult::failure(OutcomeRecord::error(
                        SOURCE,
                        ActionKind::Test.as_str(),
                        format!("no eligible hosts to run test of {}", test_bucket.full_name()),
                    )));
                }
                Err(err) => return Err(err),
            };

            let outcome = resolver.resolve_test(&test_bucket, &spec, &replies).await?;
            let started = outcome.started();
            let summary = if started {
                OutcomeRecord::success(
                    SOURCE,
                    ActionKind::Test.as_str(),
                    format!(
                        "created test on hosts {}, added test to test queue and deletion queue",
                        outcome.accepted_hosts().join(";")
                    ),
                )
            } else {
                OutcomeRecord::error(
                    SOURCE,
                    ActionKind::Test.as_str(),
                    "no host accepted the test",
                )
            };

            let mut messages = vec![summary];
            messages.extend(outcome.into_outcomes());
            Ok(ManagementResult::new(started, messages))
        })
        .await
    }

    /// 挂起桶：更新状态并通知节点
    pub async fn suspend_bucket(&self, id: &str) -> AppResult<ManagementResult<bool>> {
        self.set_suspended(id, true).await
    }

    /// 恢复桶：更新状态并通知节点
    pub async fn resume_bucket(&self, id: &str) -> AppResult<ManagementResult<bool>> {
        self.set_suspended(id, false).await
    }

    /// 向桶的目标节点分发任意动作，可选限定目标主机
    pub async fn notify(
        &self,
        action: ActionMessage,
        target_filter: Option<BTreeSet<HostId>>,
    ) -> AppResult<ManagementResult<bool>> {
        let kind = action.kind();
        let status = self.store.get_status(action.bucket().id()).await?;

        Ok(self
            .dispatch_and_resolve(status, target_filter, action)
            .await?
            .unwrap_or_else(|| {
                ManagementResult::failure(OutcomeRecord::error(
                    SOURCE,
                    kind.as_str(),
                    "no eligible target hosts",
                ))
            }))
    }

    async fn set_suspended(
        &self,
        id: &str,
        suspended: bool,
    ) -> AppResult<ManagementResult<bool>> {
        let Some(bucket) = self.store.get_bucket(id).await? else {
            let kind = if suspended {
                ActionKind::Suspend
            } else {
                ActionKind::Resume
            };
            return Ok(Self::not_found(kind, id));
        };

        let status = match self
            .store
            .update_status(id, Box::new(move |s: &mut BucketStatus| s.set_suspended(suspended)))
            .await
        {
            Ok(status) => Some(status),
            Err(LifecycleError::NotFound { .. }) => None,
            Err(err) => return Err(err.into()),
        };

        let action = if suspended {
            ActionMessage::Suspend { bucket }
        } else {
            ActionMessage::Resume { bucket }
        };
        let kind = action.kind();

        Ok(self
            .dispatch_and_resolve(status, None, action)
            .await?
            .unwrap_or_else(|| {
                ManagementResult::failure(OutcomeRecord::error(
                    SOURCE,
                    kind.as_str(),
                    "no eligible target hosts",
                ))
            }))
    }

    /// 分发并按重试规则裁决；没有目标时返回 `None`
    async fn dispatch_and_resolve(
        &self,
        status: Option<BucketStatus>,
        target_filter: Option<BTreeSet<HostId>>,
        action: ActionMessage,
    ) -> AppResult<Option<ManagementResult<bool>>> {
        let coordinator = self.coordinator.clone();
        let resolver = self.resolver.clone();
        let timeout = self.config.action_timeout;

        Self::detached(async move {
            let replies = match coordinator
                .dispatch(status.as_ref(), target_filter.as_ref(), action.clone(), timeout)
                .await
            {
                Ok(replies) => replies,
                Err(LifecycleError::NoTargets { .. }) => return Ok(None),
                Err(err) => return Err(err),
            };

            let outcome = resolver.resolve_action(&action, &replies).await?;
            let success = outcome.overall_success();
            Ok(Some(ManagementResult::new(success, outcome.into_outcomes())))
        })
        .await
    }

    /// 立即执行物理清理；失败转为结果记录
    async fn purge_now(&self, bucket: &Bucket, scope: PurgeScope) -> Vec<OutcomeRecord> {
        match self.purge.purge(bucket, scope).await {
            Ok(messages) => messages,
            Err(err) => vec![OutcomeRecord::error(
                SOURCE,
                ActionKind::Purge.as_str(),
                err.to_string(),
            )],
        }
    }

    /// 在独立任务中执行，调用方取消等待不影响任务完成
    async fn detached<T, F>(fut: F) -> AppResult<T>
    where
        T: Send + 'static,
        F: Future<Output = LifecycleResult<T>> + Send + 'static,
    {
        tokio::spawn(fut)
            .await
            .map_err(|e| AppError::Infra(e.to_string()))?
            .map_err(AppError::from)
    }

    fn not_found(kind: ActionKind, key: &str) -> ManagementResult<bool> {
        ManagementResult::failure(OutcomeRecord::error(
            SOURCE,
            kind.as_str(),
            format!("bucket {key} not found"),
        ))
    }
}
