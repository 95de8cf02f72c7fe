//! Poll service errors

use super::store::StoreError;
use thiserror::Error;

/// Failure of a poll operation, as seen by callers of the engine
#[derive(Debug, Error)]
pub enum PollError {
    /// Client-correctable input problem
    #[error("{0}")]
    InvalidInput(String),

    #[error("Poll not found")]
    NotFound,

    #[error("You have already voted")]
    DuplicateVote,

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

impl PollError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        PollError::InvalidInput(reason.into())
    }
}
