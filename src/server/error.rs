//! HTTP error mapping
//!
//! Client errors carry their reason in a plain-text body. Storage failures are
//! logged in full and answered with a fixed message per route.

use crate::polls::PollError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Which route an error came from; picks the 500 body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    CreatePoll,
    FetchPoll,
    RecordVote,
}

impl Action {
    fn failure_message(self) -> &'static str {
        match self {
            Action::CreatePoll => "Error creating poll",
            Action::FetchPoll => "Error fetching poll",
            Action::RecordVote => "Error recording vote",
        }
    }
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Malformed payload")]
    MalformedPayload,

    #[error("Peer address unavailable")]
    MissingPeerAddress,

    #[error("{source}")]
    Poll { source: PollError, action: Action },
}

impl ApiError {
    /// Attach the route to a poll error, for use with `map_err`
    pub fn during(action: Action) -> impl Fn(PollError) -> ApiError {
        move |source| ApiError::Poll { source, action }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::MalformedPayload => (StatusCode::BAD_REQUEST, self.to_string()),
            ApiError::MissingPeerAddress => {
                tracing::error!("Vote request without peer address; serve with connect info");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Action::RecordVote.failure_message().to_string(),
                )
            }
            ApiError::Poll { source, action } => match source {
                PollError::InvalidInput(reason) => (StatusCode::BAD_REQUEST, reason),
                PollError::NotFound => (StatusCode::NOT_FOUND, source.to_string()),
                PollError::DuplicateVote => (StatusCode::FORBIDDEN, source.to_string()),
                PollError::Storage(e) => {
                    tracing::error!(error = %e, ?action, "Storage failure");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        action.failure_message().to_string(),
                    )
                }
            },
        };

        (status, body).into_response()
    }
}
