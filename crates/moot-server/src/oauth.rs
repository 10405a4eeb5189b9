//! GitHub sign-in.
//!
//! `GET /auth/github/login` parks a fresh CSRF state token in the cache and
//! hands the browser to GitHub. `GET /auth/github/callback` consumes the
//! token, trades the authorization code for an access token, reads the
//! profile and its verified primary email, and signs the account in through
//! the store. The browser lands back on the frontend with a bearer token in
//! the query string.

use std::sync::Arc;

use axum::{
  Router,
  extract::{Query, State},
  response::Redirect,
  routing::get,
};
use moot_api::{ApiError, cache::sweep};
use moot_core::{
  cache::{CacheStore as _, Mutation, keys, ttl},
  store::ForumStore as _,
  user::GithubProfile,
};
use rand_core::{OsRng, RngCore as _};
use reqwest::header::{ACCEPT, USER_AGENT};
use serde::Deserialize;
use tracing::{info, warn};

use crate::ServerState;

/// GitHub rejects anonymous API calls.
const APP_USER_AGENT: &str = concat!("moot/", env!("CARGO_PKG_VERSION"));

const AUTHORIZE_URL: &str = "https://github.com/login/oauth/authorize";
const TOKEN_URL: &str = "https://github.com/login/oauth/access_token";
const API_USER_URL: &str = "https://api.github.com/user";
const API_EMAILS_URL: &str = "https://api.github.com/user/emails";

// ─── Wiring ──────────────────────────────────────────────────────────────────

/// GitHub application settings plus where to land the browser afterwards.
#[derive(Clone)]
pub struct OauthConfig {
  pub client_id:     String,
  pub client_secret: String,
  pub redirect_uri:  String,
  pub frontend_url:  String,
}

#[derive(Clone)]
struct OauthState {
  app:    ServerState,
  config: Arc<OauthConfig>,
  http:   reqwest::Client,
}

/// Mount `/auth/github/login` and `/auth/github/callback`.
pub fn router(app: ServerState, config: OauthConfig) -> Router {
  let state = OauthState {
    app,
    config: Arc::new(config),
    http: reqwest::Client::new(),
  };
  Router::new()
    .route("/auth/github/login", get(login))
    .route("/auth/github/callback", get(callback))
    .with_state(state)
}

// ─── Handlers ────────────────────────────────────────────────────────────────

async fn login(State(state): State<OauthState>) -> Result<Redirect, ApiError> {
  if state.config.client_id.is_empty() {
    return Err(ApiError::BadRequest("github sign-in is not configured".into()));
  }

  // Without the parked token the callback could never verify, so this one
  // cache write is load-bearing.
  let csrf = fresh_state_token();
  state
    .app
    .cache
    .set(&keys::oauth_state(&csrf), b"pending".to_vec(), ttl::OAUTH_STATE)
    .await
    .map_err(|err| {
      warn!(error = %err, "could not park oauth state");
      ApiError::Internal(Box::new(err))
    })?;

  let url = format!(
    "{AUTHORIZE_URL}?client_id={}&redirect_uri={}&scope=user:email&state={csrf}",
    state.config.client_id, state.config.redirect_uri,
  );
  Ok(Redirect::temporary(&url))
}

#[derive(Deserialize)]
struct CallbackParams {
  code:  String,
  state: String,
}

async fn callback(
  State(state): State<OauthState>,
  Query(params): Query<CallbackParams>,
) -> Result<Redirect, ApiError> {
  consume_state_token(&state, &params.state).await?;

  let access_token = exchange_code(&state, &params.code).await?;
  let profile = fetch_profile(&state.http, &access_token).await?;
  let user = state.app.store.github_signin(profile).await?;

  // The sign-in may have created or relinked an account; sweeping the
  // registration keys keeps the directory and stats fresh either way.
  sweep(state.app.cache.as_ref(), &Mutation::UserRegistered {
    username:     &user.username,
    email:        &user.email,
    display_name: &user.display_name,
  })
  .await;

  let token = state.app.tokens.issue(user.user_id)?;
  info!(user_id = %user.user_id, "github sign-in");

  Ok(Redirect::temporary(&format!(
    "{}/auth/github/success?token={token}",
    state.config.frontend_url,
  )))
}

// ─── Flow pieces ─────────────────────────────────────────────────────────────

/// Delete-on-verify: a state token is good for exactly one callback. An
/// unreachable cache cannot vouch for the token, so that also restarts the
/// flow.
async fn consume_state_token(
  state: &OauthState,
  token: &str,
) -> Result<(), ApiError> {
  let key = keys::oauth_state(token);
  let parked = state.app.cache.get(&key).await.unwrap_or_else(|err| {
    warn!(error = %err, "oauth state lookup failed");
    None
  });
  if parked.is_none() {
    return Err(ApiError::BadRequest("invalid state parameter".into()));
  }
  if let Err(err) = state.app.cache.delete(&key).await {
    warn!(error = %err, "oauth state cleanup failed");
  }
  Ok(())
}

#[derive(Deserialize)]
struct AccessTokenResponse {
  access_token: Option<String>,
}

/// Trade the authorization code for a GitHub access token.
async fn exchange_code(
  state: &OauthState,
  code: &str,
) -> Result<String, ApiError> {
  let form = [
    ("client_id", state.config.client_id.as_str()),
    ("client_secret", state.config.client_secret.as_str()),
    ("code", code),
    ("redirect_uri", state.config.redirect_uri.as_str()),
  ];
  let response = state
    .http
    .post(TOKEN_URL)
    .header(ACCEPT, "application/json")
    .header(USER_AGENT, APP_USER_AGENT)
    .form(&form)
    .send()
    .await
    .map_err(upstream_error)?;
  if !response.status().is_success() {
    return Err(ApiError::BadRequest(
      "github rejected the token exchange".into(),
    ));
  }
  let body: AccessTokenResponse =
    response.json().await.map_err(upstream_error)?;
  body
    .access_token
    .ok_or_else(|| ApiError::BadRequest("github returned no access token".into()))
}

#[derive(Deserialize)]
struct GithubUser {
  id:         u64,
  login:      String,
  name:       Option<String>,
  email:      Option<String>,
  avatar_url: Option<String>,
}

#[derive(Deserialize)]
struct GithubEmail {
  email:    String,
  primary:  bool,
  verified: bool,
}

/// Read the signed-in account and its verified primary email.
async fn fetch_profile(
  http: &reqwest::Client,
  access_token: &str,
) -> Result<GithubProfile, ApiError> {
  let response = http
    .get(API_USER_URL)
    .bearer_auth(access_token)
    .header(ACCEPT, "application/json")
    .header(USER_AGENT, APP_USER_AGENT)
    .send()
    .await
    .map_err(upstream_error)?;
  if !response.status().is_success() {
    return Err(ApiError::BadRequest("github refused the profile read".into()));
  }
  let account: GithubUser = response.json().await.map_err(upstream_error)?;

  // The profile email is usually hidden; the emails endpoint lists the
  // verified ones regardless. Treat a failure here as an empty list and
  // fall back to whatever the profile exposed.
  let emails: Vec<GithubEmail> = match http
    .get(API_EMAILS_URL)
    .bearer_auth(access_token)
    .header(ACCEPT, "application/json")
    .header(USER_AGENT, APP_USER_AGENT)
    .send()
    .await
  {
    Ok(response) if response.status().is_success() => {
      response.json().await.unwrap_or_default()
    }
    _ => Vec::new(),
  };

  let email = emails
    .iter()
    .find(|entry| entry.primary && entry.verified)
    .map(|entry| entry.email.clone())
    .or(account.email);
  let Some(email) = email else {
    return Err(ApiError::BadRequest(
      "no verified email on the github account".into(),
    ));
  };

  Ok(GithubProfile {
    github_id:  account.id.to_string(),
    login:      account.login,
    name:       account.name,
    email:      Some(email),
    avatar_url: account.avatar_url,
  })
}

fn upstream_error(err: reqwest::Error) -> ApiError {
  warn!(error = %err, "github api call failed");
  ApiError::BadRequest("could not reach github".into())
}

/// 256 bits of CSRF entropy, hex-encoded. Only ever compared by cache-key
/// existence.
fn fresh_state_token() -> String {
  let mut bytes = [0u8; 32];
  OsRng.fill_bytes(&mut bytes);
  hex::encode(bytes)
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use moot_api::{AppState, TokenIssuer};
  use moot_cache::MemoryCache;
  use moot_core::notify::{Notification, NotificationGateway};
  use moot_store_sqlite::SqliteStore;

  use super::*;

  struct Quiet;

  impl NotificationGateway for Quiet {
    fn notify(&self, _notification: Notification) {}
  }

  async fn make_oauth_state() -> OauthState {
    let app = AppState {
      store:    Arc::new(SqliteStore::open_in_memory().await.unwrap()),
      cache:    Arc::new(MemoryCache::new()),
      tokens:   Arc::new(TokenIssuer::new("test-secret", 3600)),
      notifier: Arc::new(Quiet),
    };
    OauthState {
      app,
      config: Arc::new(OauthConfig {
        client_id:     "test-client".into(),
        client_secret: "test-secret".into(),
        redirect_uri:  "http://localhost:8080/api/v1/auth/github/callback"
          .into(),
        frontend_url:  "http://localhost:3000".into(),
      }),
      http: reqwest::Client::new(),
    }
  }

  #[tokio::test]
  async fn state_tokens_are_single_use() {
    let state = make_oauth_state().await;
    let csrf = fresh_state_token();
    state
      .app
      .cache
      .set(&keys::oauth_state(&csrf), b"pending".to_vec(), ttl::OAUTH_STATE)
      .await
      .unwrap();

    assert!(consume_state_token(&state, &csrf).await.is_ok());
    assert!(consume_state_token(&state, &csrf).await.is_err());
  }

  #[tokio::test]
  async fn unknown_state_is_rejected() {
    let state = make_oauth_state().await;
    assert!(consume_state_token(&state, "never-issued").await.is_err());
  }

  #[test]
  fn state_tokens_do_not_repeat() {
    assert_ne!(fresh_state_token(), fresh_state_token());
  }
}
