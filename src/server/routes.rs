use super::connect_info::MaybeConnectInfo;
use super::error::{Action, ApiError};
use super::extract::{CreatePollBody, FormOrJson, VoteBody};
use super::AppState;
use crate::polls::{PollResults, VoteRequest};
use axum::{
    extract::{Path, State},
    http::{header::LOCATION, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::sync::Arc;

/// Where the browser lands after creating a poll
pub fn poll_page_location(poll_id: &str) -> String {
    format!("/poll.html?poll={poll_id}")
}

pub async fn create_poll_handler(
    State(state): State<Arc<AppState>>,
    FormOrJson(body): FormOrJson<CreatePollBody>,
) -> Result<Response, ApiError> {
    let poll_id = state
        .engine
        .create_poll(&body.question, &body.options)
        .await
        .map_err(ApiError::during(Action::CreatePoll))?;

    Ok((StatusCode::FOUND, [(LOCATION, poll_page_location(&poll_id))]).into_response())
}

pub async fn get_poll_handler(
    State(state): State<Arc<AppState>>,
    Path(poll_id): Path<String>,
) -> Result<Json<PollResults>, ApiError> {
    let results = state
        .engine
        .results(&poll_id)
        .await
        .map_err(ApiError::during(Action::FetchPoll))?;

    Ok(Json(results))
}

pub async fn vote_handler(
    State(state): State<Arc<AppState>>,
    Path(poll_id): Path<String>,
    peer: MaybeConnectInfo,
    FormOrJson(body): FormOrJson<VoteBody>,
) -> Result<Response, ApiError> {
    let voter = peer.ip().ok_or(ApiError::MissingPeerAddress)?;

    state
        .engine
        .cast_vote(VoteRequest {
            poll_id,
            option: body.option,
            name: body.name,
            voter,
        })
        .await
        .map_err(ApiError::during(Action::RecordVote))?;

    Ok((StatusCode::OK, "Vote recorded").into_response())
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}
