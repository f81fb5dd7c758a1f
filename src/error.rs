//! Error taxonomy shared by the stores, the scheduler and the progression engine.
//!
//! The `Display` text of every variant is meant to be shown to the chat user as-is.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LearnerError {
    /// Malformed or missing input, raised before any external call.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// The catalog returned more than one candidate for a lookup.
    #[error("Ambiguous match: {0}")]
    Ambiguous(String),

    /// Content generation produced nothing usable.
    #[error("No summary available for {0}")]
    SummaryUnavailable(String),

    #[error("Delivery failed: {0}")]
    DeliveryFailed(String),

    #[error("{0} was already completed - check its channel for the summaries")]
    AlreadyCompleted(String),

    /// Transport or API failure of an external collaborator.
    #[error("External service error: {0}")]
    External(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

pub type LearnerResult<T> = std::result::Result<T, LearnerError>;

impl LearnerError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        LearnerError::InvalidArgument(msg.into())
    }
}
