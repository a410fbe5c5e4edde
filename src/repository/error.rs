use {
    crate::{models::ModelError, persistence::StorageError},
    thiserror::Error,
};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Invalid entity: {0}")]
    Model(#[from] ModelError),
    #[error("Failed to acquire collection write lock")]
    FailedToAcquireWriteLock,
    #[error("Failed to acquire collection read lock")]
    FailedToAcquireReadLock,
}
