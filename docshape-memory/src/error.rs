use docshape_core::error::DocumentStoreError;
use thiserror::Error;

/// Requests the in-memory backend cannot evaluate.
///
/// Reported to callers as [`DocumentStoreError::Backend`], from which the
/// original value can be recovered with `downcast_ref`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InMemoryStoreError {
    #[error("Unsupported query operator: {0}")]
    UnsupportedOperator(String),
    #[error("Unsupported aggregation stage: {0}")]
    UnsupportedStage(String),
    #[error("Invalid aggregation stage: {0}")]
    InvalidStage(String),
    #[error("Invalid update: {0}")]
    InvalidUpdate(String),
    #[error("Invalid projection: {0}")]
    InvalidProjection(String),
}

impl From<InMemoryStoreError> for DocumentStoreError {
    fn from(err: InMemoryStoreError) -> Self {
        DocumentStoreError::backend(err)
    }
}
