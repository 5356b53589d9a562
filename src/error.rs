use thiserror::Error;

/// The closed set of domain failures the core raises.
///
/// Everything else — a dropped connection, a pool exhausted, a disk full —
/// collapses into [`CoreError::TransientStoreError`], which callers may
/// retry with their own backoff policy. The core never retries on its own.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("artifact not registered: {name} ({kind})")]
    NoSuchArtifact { name: String, kind: String },

    #[error("no delivery config named {0}")]
    NoSuchDeliveryConfigName(String),

    #[error("no resource with id {0}")]
    NoSuchResourceId(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid regex: {0}")]
    InvalidRegex(String),

    #[error("store unavailable: {0}")]
    TransientStoreError(String),
}

impl From<rusqlite::Error> for CoreError {
    fn from(e: rusqlite::Error) -> Self {
        CoreError::TransientStoreError(e.to_string())
    }
}

impl From<r2d2::Error> for CoreError {
    fn from(e: r2d2::Error) -> Self {
        CoreError::TransientStoreError(e.to_string())
    }
}

impl From<rusqlite_migration::Error> for CoreError {
    fn from(e: rusqlite_migration::Error) -> Self {
        CoreError::TransientStoreError(e.to_string())
    }
}

/// Convenience type alias for Results using [`CoreError`].
pub type CoreResult<T> = Result<T, CoreError>;
