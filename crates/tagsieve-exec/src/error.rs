use thiserror::Error;

pub type Result<T> = std::result::Result<T, BackendError>;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend invariant failed: {0}")]
    Invariant(String),

    #[error(transparent)]
    Core(#[from] tagsieve_core::Error),
}
