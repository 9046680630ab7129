use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("invalid enqueue payload: {0}")]
    InvalidPayload(String),
    #[error("duplicate job id: {0}")]
    DuplicateId(String),
    #[error("job not found: {0}")]
    JobNotFound(String),
    #[error("job '{0}' is not in the dead letter queue")]
    NotDead(String),
    #[error("unknown config key: {0}")]
    UnknownConfigKey(String),
    #[error("invalid value for config key '{key}': {reason}")]
    InvalidConfigValue { key: String, reason: String },
    #[error("invalid run_at timestamp: '{0}' (use ISO-8601 UTC or \"now\")")]
    InvalidRunAt(String),
    #[error("config error: {0}")]
    Config(String),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl QueueError {
    /// Whether the error reflects bad input on the submission surface, as
    /// opposed to a store or system failure.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            QueueError::InvalidPayload(_)
                | QueueError::DuplicateId(_)
                | QueueError::JobNotFound(_)
                | QueueError::NotDead(_)
                | QueueError::UnknownConfigKey(_)
                | QueueError::InvalidConfigValue { .. }
                | QueueError::InvalidRunAt(_)
        )
    }
}
