use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The text-search or vector backend could not be reached or failed at
    /// the transport level.
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Backend call timed out after {0:?}")]
    Timeout(Duration),

    /// The embedding function failed or produced a malformed vector.
    #[error("Embedding failed: {0}")]
    Embedding(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Operation failed: {0}")]
    Operation(String),
}

impl Error {
    /// Wraps any displayable backend error.
    pub fn backend(err: impl std::fmt::Display) -> Self {
        Self::BackendUnavailable(err.to_string())
    }

    pub fn embedding(err: impl std::fmt::Display) -> Self {
        Self::Embedding(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
