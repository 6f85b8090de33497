use lifecycle_domain::error::LifecycleError;

#[non_exhaustive]
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("lifecycle: {0}")]
    Lifecycle(#[from] LifecycleError),

    #[error("validation: {0}")]
    Validation(String),

    #[error("infra: {0}")]
    Infra(String),
}

impl AppError {
    /// 意图未能持久化（队列写入失败）
    pub fn is_queue_write(&self) -> bool {
        matches!(self, AppError::Lifecycle(err) if err.is_queue_write())
    }
}

pub type AppResult<T> = Result<T, AppError>;
