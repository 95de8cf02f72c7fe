//! Request body extraction
//!
//! HTML forms post `application/x-www-form-urlencoded`; scripted clients may
//! send JSON. Both map onto the same body types.

use super::error::ApiError;
use axum::{
    extract::{FromRequest, Request},
    http::header::CONTENT_TYPE,
    Form, Json,
};
use serde::{de::DeserializeOwned, Deserialize, Deserializer};

/// Body decoded from a form or from JSON, by content type
#[derive(Debug, Clone)]
pub struct FormOrJson<T>(pub T);

impl<S, T> FromRequest<S> for FormOrJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Send,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_json = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.starts_with("application/json"))
            .unwrap_or(false);

        if is_json {
            let Json(body) = Json::<T>::from_request(req, state).await.map_err(|e| {
                tracing::debug!(error = %e, "Rejected JSON body");
                ApiError::MalformedPayload
            })?;
            Ok(FormOrJson(body))
        } else {
            let Form(body) = Form::<T>::from_request(req, state).await.map_err(|e| {
                tracing::debug!(error = %e, "Rejected form body");
                ApiError::MalformedPayload
            })?;
            Ok(FormOrJson(body))
        }
    }
}

/// `POST /create-poll` body
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreatePollBody {
    #[serde(default)]
    pub question: String,
    /// Comma-separated option texts
    #[serde(default)]
    pub options: String,
}

/// `POST /vote/{poll_id}` body
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VoteBody {
    /// Option id; JSON clients may send it as a number
    #[serde(default, deserialize_with = "string_or_number")]
    pub option: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(i64),
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<RawId>::deserialize(deserializer)?.map(|raw| match raw {
        RawId::Text(text) => text,
        RawId::Number(n) => n.to_string(),
    }))
}
