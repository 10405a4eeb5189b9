//! Access tokens and the extractors that turn them into users.
//!
//! Tokens are HS256 JWTs whose subject is the user id. Verification is
//! stateless; account existence and `is_active` are re-checked against the
//! store on every authenticated request, so disabling an account cuts off
//! its outstanding tokens immediately.

use axum::{
  extract::FromRequestParts,
  http::{header, request::Parts},
};
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use moot_core::{store::ForumStore, user::User};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AppState, error::ApiError};

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
  /// Hyphenated user id.
  sub: String,
  iat: i64,
  exp: i64,
}

// ─── Issuer ──────────────────────────────────────────────────────────────────

/// Signs and verifies access tokens with a single shared secret.
pub struct TokenIssuer {
  encoding: EncodingKey,
  decoding: DecodingKey,
  ttl_secs: i64,
}

impl TokenIssuer {
  pub fn new(secret: &str, ttl_secs: i64) -> Self {
    Self {
      encoding: EncodingKey::from_secret(secret.as_bytes()),
      decoding: DecodingKey::from_secret(secret.as_bytes()),
      ttl_secs,
    }
  }

  /// Lifetime a freshly issued token carries, in seconds.
  pub fn ttl_secs(&self) -> i64 {
    self.ttl_secs
  }

  pub fn issue(&self, user_id: Uuid) -> Result<String, ApiError> {
    let now = Utc::now().timestamp();
    let claims = Claims {
      sub: user_id.to_string(),
      iat: now,
      exp: now + self.ttl_secs,
    };
    encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
      .map_err(|err| ApiError::Internal(Box::new(err)))
  }

  /// Returns the subject of a valid, unexpired token.
  pub fn verify(&self, token: &str) -> Result<Uuid, ApiError> {
    let data =
      decode::<Claims>(token, &self.decoding, &Validation::new(Algorithm::HS256))
        .map_err(|_| ApiError::Unauthorized("invalid or expired token".to_owned()))?;
    Uuid::parse_str(&data.claims.sub)
      .map_err(|_| ApiError::Unauthorized("invalid token subject".to_owned()))
  }
}

// ─── Extractors ──────────────────────────────────────────────────────────────

/// The authenticated caller. Rejects with 401 when the bearer token is
/// missing, invalid, expired, or names a missing or disabled account.
pub struct CurrentUser(pub User);

/// Like [`CurrentUser`], but anonymous requests (and bad tokens) come through
/// as `None` instead of being rejected. For endpoints whose response merely
/// enriches when the caller is signed in.
pub struct MaybeUser(pub Option<User>);

fn bearer_token(parts: &Parts) -> Result<&str, ApiError> {
  parts
    .headers
    .get(header::AUTHORIZATION)
    .and_then(|value| value.to_str().ok())
    .and_then(|value| value.strip_prefix("Bearer "))
    .ok_or_else(|| ApiError::Unauthorized("missing bearer token".to_owned()))
}

impl<S, C> FromRequestParts<AppState<S, C>> for CurrentUser
where
  S: ForumStore,
  C: Send + Sync,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S, C>,
  ) -> Result<Self, Self::Rejection> {
    let token = bearer_token(parts)?;
    let user_id = state.tokens.verify(token)?;
    let user = state
      .store
      .user_by_id(user_id)
      .await?
      .ok_or_else(|| ApiError::Unauthorized("unknown account".to_owned()))?;
    if !user.is_active {
      return Err(ApiError::Unauthorized("account is disabled".to_owned()));
    }
    Ok(CurrentUser(user))
  }
}

impl<S, C> FromRequestParts<AppState<S, C>> for MaybeUser
where
  S: ForumStore,
  C: Send + Sync,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S, C>,
  ) -> Result<Self, Self::Rejection> {
    if !parts.headers.contains_key(header::AUTHORIZATION) {
      return Ok(MaybeUser(None));
    }
    match CurrentUser::from_request_parts(parts, state).await {
      Ok(CurrentUser(user)) => Ok(MaybeUser(Some(user))),
      // a stale token downgrades the request rather than failing it
      Err(ApiError::Unauthorized(_)) => Ok(MaybeUser(None)),
      Err(other) => Err(other),
    }
  }
}
