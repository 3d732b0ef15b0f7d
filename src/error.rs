use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TaskError {
    #[error("task '{0}' has already finished")]
    AlreadyFinished(String),
    #[error("task '{0}' is not running")]
    NotRunning(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PoolError {
    #[error("worker pool is shut down")]
    ShutDown,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ContextError {
    #[error("owning context is closed")]
    Closed,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ServiceError {
    /// The service declined the request and said why.
    #[error("{0}")]
    Rejected(String),
    /// The call itself blew up.
    #[error("{0}")]
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum OperationError {
    #[error("Password store is not initialized")]
    NotInitialized,
    #[error("Entry path is required")]
    MissingPath,
    #[error("Entry content is required")]
    MissingContent,
    #[error("Unknown git operation: {0}")]
    UnknownOperation(String),
    #[error("Operation cancelled")]
    Cancelled,
    #[error("Operation runner is shut down")]
    ShutDown,
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error("{0}")]
    Panicked(String),
}

impl From<PoolError> for OperationError {
    fn from(_: PoolError) -> Self {
        OperationError::ShutDown
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("invalid worker count '{0}': expected a positive integer")]
    InvalidWorkers(String),
}
