//! API-level error type, and its mapping onto HTTP responses.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Anything a handler can fail with.
///
/// Store errors convert via [`From`], so handlers propagate them with `?`;
/// `Unauthorized` only ever originates in this crate.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("{0}")]
  NotFound(String),

  #[error("{0}")]
  BadRequest(String),

  #[error("{0}")]
  Unauthorized(String),

  #[error("{0}")]
  Forbidden(String),

  #[error("{0}")]
  Conflict(String),

  #[error("internal error: {0}")]
  Internal(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl From<moot_core::Error> for ApiError {
  fn from(err: moot_core::Error) -> Self {
    use moot_core::Error;

    match err {
      Error::PostNotFound(id) => ApiError::NotFound(format!("post {id} not found")),
      Error::CommentNotFound(id) => {
        ApiError::NotFound(format!("comment {id} not found"))
      }
      Error::UserNotFound(who) => ApiError::NotFound(format!("user {who} not found")),
      Error::Forbidden(reason) => ApiError::Forbidden(reason),
      Error::InvalidOperation(reason) => ApiError::BadRequest(reason),
      Error::Conflict(reason) => ApiError::Conflict(reason),
      Error::Serialization(err) => ApiError::Internal(Box::new(err)),
      Error::Storage(err) => ApiError::Internal(err),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = match &self {
      ApiError::NotFound(_) => StatusCode::NOT_FOUND,
      ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
      ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
      ApiError::Conflict(_) => StatusCode::CONFLICT,
      ApiError::Internal(err) => {
        tracing::error!(error = %err, "handler failed");
        StatusCode::INTERNAL_SERVER_ERROR
      }
    };
    let message = match &self {
      // never leak internals to the client
      ApiError::Internal(_) => "internal error".to_owned(),
      other => other.to_string(),
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}
