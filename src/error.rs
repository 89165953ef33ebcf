//! Error taxonomy for the page engine
//!
//! Every failure is scoped to a single request. Storage failures abort the
//! surrounding transaction and are safe to retry, except when a stored value
//! cannot be decoded: that needs a repair, not a retry. Nothing here is fatal
//! to the process.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CmsError {
    /// Target page absent among non-deleted pages.
    #[error("page not found: '{page_id}'")]
    NotFound { page_id: String },

    /// Malformed permutation, missing required field, unknown template.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Transaction or connection failure. The transaction has been rolled back.
    #[error("storage failure: {0}")]
    Storage(#[from] rusqlite::Error),

    /// A stored payload could not be (de)serialized.
    #[error("payload serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The blocking storage worker panicked or was cancelled.
    #[error("storage worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

impl CmsError {
    pub fn not_found(page_id: impl Into<String>) -> Self {
        Self::NotFound { page_id: page_id.into() }
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Whether the caller may retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Storage(e) => !is_corrupt_value(e),
            Self::Worker(_) => true,
            _ => false,
        }
    }
}

/// A row was read but one of its values has the wrong type or range.
fn is_corrupt_value(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::InvalidColumnType(..)
            | rusqlite::Error::FromSqlConversionFailure(..)
            | rusqlite::Error::IntegralValueOutOfRange(..)
    )
}

pub type Result<T> = std::result::Result<T, CmsError>;
