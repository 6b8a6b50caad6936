use thiserror::Error;

use crate::models::EntryId;

#[derive(Debug, Error)]
pub enum Error {
    /// Rejected input to an add/update operation. Nothing was changed.
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("entry {0} not found")]
    NotFound(EntryId),

    #[error("invalid configuration: {0}")]
    Config(String),

    /// Nutrition lookup could not complete. Non-fatal and retryable.
    #[error("nutrition lookup unavailable: {0}")]
    LookupUnavailable(String),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl Error {
    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
