//! Account endpoints: registration, login, the caller's own profile, and
//! the availability probes the signup form polls.
//!
//! | Method | Path                                | Description                         |
//! |--------|-------------------------------------|-------------------------------------|
//! | `POST` | `/auth/register`                    | create an account, returns **201**  |
//! | `POST` | `/auth/login`                       | email or username + password        |
//! | `GET`  | `/auth/me`                          | the caller's own account            |
//! | `PUT`  | `/auth/me`                          | explicit optional-field patch       |
//! | `GET`  | `/auth/check-username/{username}`   | availability, cached                |
//! | `GET`  | `/auth/check-display-name/{name}`   | availability, leading `@` ignored   |
//! | `GET`  | `/auth/check-email/{email}`         | availability, cached                |
//! | `POST` | `/auth/verify-email`                | redeem a mailed verification token  |
//!
//! Registration mails a welcome plus a verification link through the
//! notification gateway; neither failure blocks the signup.

use argon2::{
  Argon2, PasswordHasher, PasswordVerifier,
  password_hash::{PasswordHash, SaltString},
};
use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::{DateTime, Duration, Utc};
use moot_core::{
  cache::{CacheStore, Mutation, keys, ttl},
  notify::Notification,
  store::ForumStore,
  user::{AccountField, NewUser, ProfileUpdate, User},
};
use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
  AppState,
  cache,
  error::ApiError,
  token::CurrentUser,
};

/// Verification links die after a day.
const VERIFICATION_TOKEN_TTL_HOURS: i64 = 24;

// ─── Responses ───────────────────────────────────────────────────────────────

/// The caller's own account. Everything except credentials, visibility flags
/// included, since the owner sees their profile unfiltered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountResponse {
  pub user_id:         Uuid,
  pub email:           String,
  pub username:        String,
  pub display_name:    String,
  pub full_name:       Option<String>,
  pub bio:             Option<String>,
  pub avatar_url:      Option<String>,
  pub website_url:     Option<String>,
  pub location:        Option<String>,
  pub github_username: Option<String>,
  pub is_active:       bool,
  pub is_verified:     bool,
  pub profile_public:  bool,
  pub show_email:      bool,
  pub show_real_name:  bool,
  pub karma_score:     i64,
  pub post_count:      i64,
  pub comment_count:   i64,
  pub created_at:      DateTime<Utc>,
}

impl From<User> for AccountResponse {
  fn from(user: User) -> Self {
    Self {
      user_id:         user.user_id,
      email:           user.email,
      username:        user.username,
      display_name:    user.display_name,
      full_name:       user.full_name,
      bio:             user.bio,
      avatar_url:      user.avatar_url,
      website_url:     user.website_url,
      location:        user.location,
      github_username: user.github_username,
      is_active:       user.is_active,
      is_verified:     user.is_verified,
      profile_public:  user.profile_public,
      show_email:      user.show_email,
      show_real_name:  user.show_real_name,
      karma_score:     user.karma_score,
      post_count:      user.post_count,
      comment_count:   user.comment_count,
      created_at:      user.created_at,
    }
  }
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
  pub access_token: String,
  pub token_type:   &'static str,
  /// Seconds until the token expires.
  pub expires_in:   i64,
  pub user:         AccountResponse,
}

/// Uniform body for all three availability probes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Availability {
  /// Which constraint was probed: `username`, `display_name`, or `email`.
  pub field:     String,
  /// The normalized value that was checked.
  pub value:     String,
  pub available: bool,
}

// ─── Register ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RegisterBody {
  pub email:        String,
  pub username:     String,
  pub display_name: String,
  pub password:     String,
  pub full_name:    Option<String>,
}

pub async fn register<S, C>(
  State(state): State<AppState<S, C>>,
  Json(body): Json<RegisterBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ForumStore,
  C: CacheStore,
{
  let email = normalize_email(&body.email)?;
  let username = normalize_username(&body.username)?;
  let display_name = normalize_display_name(&body.display_name)?;
  check_password(&body.password)?;

  let full_name = body
    .full_name
    .map(|name| name.trim().to_owned())
    .filter(|name| !name.is_empty());

  let password_hash = hash_password(&body.password)?;
  let user = state
    .store
    .create_user(NewUser {
      email,
      username,
      display_name,
      password_hash: Some(password_hash),
      full_name,
      avatar_url: None,
      github_id: None,
      github_username: None,
      is_verified: false,
    })
    .await?;

  cache::sweep(state.cache.as_ref(), &Mutation::UserRegistered {
    username:     &user.username,
    email:        &user.email,
    display_name: &user.display_name,
  })
  .await;

  state.notifier.notify(Notification::Welcome {
    email:        user.email.clone(),
    display_name: user.display_name.clone(),
  });
  send_verification(&state, &user).await;

  info!(username = %user.username, "account registered");
  Ok((StatusCode::CREATED, Json(AccountResponse::from(user))))
}

/// Issue a verification token and mail it. Best-effort: a failure here must
/// not undo a completed registration.
async fn send_verification<S, C>(state: &AppState<S, C>, user: &User)
where
  S: ForumStore,
  C: CacheStore,
{
  let token = fresh_token();
  let expires_at = Utc::now() + Duration::hours(VERIFICATION_TOKEN_TTL_HOURS);

  match state
    .store
    .create_verification_token(user.user_id, &hash_token(&token), expires_at)
    .await
  {
    Ok(()) => state.notifier.notify(Notification::VerifyEmail {
      email: user.email.clone(),
      token,
    }),
    Err(err) => {
      warn!(username = %user.username, error = %err, "could not issue verification token");
    }
  }
}

// ─── Login ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct LoginBody {
  /// Email address or username.
  pub email:    String,
  pub password: String,
}

pub async fn login<S, C>(
  State(state): State<AppState<S, C>>,
  Json(body): Json<LoginBody>,
) -> Result<Json<TokenResponse>, ApiError>
where
  S: ForumStore,
  C: Send + Sync,
{
  let login = body.email.trim().to_lowercase();
  let user = state
    .store
    .user_by_login(&login)
    .await?
    .ok_or_else(invalid_credentials)?;

  // OAuth-only accounts have no hash and cannot password-login
  let hash = user.password_hash.as_deref().ok_or_else(invalid_credentials)?;
  let parsed = PasswordHash::new(hash).map_err(|_| invalid_credentials())?;
  Argon2::default()
    .verify_password(body.password.as_bytes(), &parsed)
    .map_err(|_| invalid_credentials())?;

  if !user.is_active {
    return Err(ApiError::Unauthorized("account is disabled".to_owned()));
  }

  let access_token = state.tokens.issue(user.user_id)?;
  info!(username = %user.username, "signed in");
  Ok(Json(TokenResponse {
    access_token,
    token_type: "bearer",
    expires_in: state.tokens.ttl_secs(),
    user: AccountResponse::from(user),
  }))
}

fn invalid_credentials() -> ApiError {
  // one message for every failure mode, so probes learn nothing
  ApiError::Unauthorized("invalid credentials".to_owned())
}

// ─── Own profile ─────────────────────────────────────────────────────────────

pub async fn me(CurrentUser(user): CurrentUser) -> Json<AccountResponse> {
  Json(AccountResponse::from(user))
}

#[derive(Debug, Deserialize)]
pub struct ProfileBody {
  pub display_name:   Option<String>,
  pub full_name:      Option<String>,
  pub bio:            Option<String>,
  pub avatar_url:     Option<String>,
  pub website_url:    Option<String>,
  pub location:       Option<String>,
  pub profile_public: Option<bool>,
  pub show_email:     Option<bool>,
  pub show_real_name: Option<bool>,
}

pub async fn update_me<S, C>(
  State(state): State<AppState<S, C>>,
  CurrentUser(user): CurrentUser,
  Json(body): Json<ProfileBody>,
) -> Result<Json<AccountResponse>, ApiError>
where
  S: ForumStore,
  C: CacheStore,
{
  let display_name = match body.display_name {
    Some(name) => Some(normalize_display_name(&name)?),
    None => None,
  };

  let old_display_name = user.display_name.clone();
  let updated = state
    .store
    .update_profile(user.user_id, ProfileUpdate {
      display_name,
      full_name:      body.full_name,
      bio:            body.bio,
      avatar_url:     body.avatar_url,
      website_url:    body.website_url,
      location:       body.location,
      profile_public: body.profile_public,
      show_email:     body.show_email,
      show_real_name: body.show_real_name,
    })
    .await?;

  cache::sweep(state.cache.as_ref(), &Mutation::ProfileUpdated {
    old_display_name: &old_display_name,
  })
  .await;

  Ok(Json(AccountResponse::from(updated)))
}

// ─── Availability checks ─────────────────────────────────────────────────────

pub async fn check_username<S, C>(
  State(state): State<AppState<S, C>>,
  Path(username): Path<String>,
) -> Result<Json<Availability>, ApiError>
where
  S: ForumStore,
  C: CacheStore,
{
  let username = username.trim().to_lowercase();
  let key = keys::username_available(&username);
  let probe = cache::lookup(state.cache.as_ref(), &key, ttl::SHORT, || async {
    availability(&state, AccountField::Username, &username).await
  })
  .await?;
  Ok(Json(probe))
}

pub async fn check_display_name<S, C>(
  State(state): State<AppState<S, C>>,
  Path(name): Path<String>,
) -> Result<Json<Availability>, ApiError>
where
  S: ForumStore,
  C: CacheStore,
{
  let name = name.trim();
  let name = name.strip_prefix('@').unwrap_or(name).to_owned();
  let key = keys::display_name_available(&name);
  let probe = cache::lookup(state.cache.as_ref(), &key, ttl::SHORT, || async {
    availability(&state, AccountField::DisplayName, &name).await
  })
  .await?;
  Ok(Json(probe))
}

pub async fn check_email<S, C>(
  State(state): State<AppState<S, C>>,
  Path(email): Path<String>,
) -> Result<Json<Availability>, ApiError>
where
  S: ForumStore,
  C: CacheStore,
{
  let email = email.trim().to_lowercase();
  let key = keys::email_available(&email);
  let probe = cache::lookup(state.cache.as_ref(), &key, ttl::SHORT, || async {
    availability(&state, AccountField::Email, &email).await
  })
  .await?;
  Ok(Json(probe))
}

async fn availability<S, C>(
  state: &AppState<S, C>,
  field: AccountField,
  value: &str,
) -> Result<Availability, ApiError>
where
  S: ForumStore,
{
  let taken = state.store.account_field_taken(field, value).await?;
  let field = match field {
    AccountField::Username => "username",
    AccountField::DisplayName => "display_name",
    AccountField::Email => "email",
  };
  Ok(Availability {
    field:     field.to_owned(),
    value:     value.to_owned(),
    available: !taken,
  })
}

// ─── Email verification ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct VerifyEmailBody {
  pub token: String,
}

pub async fn verify_email<S, C>(
  State(state): State<AppState<S, C>>,
  Json(body): Json<VerifyEmailBody>,
) -> Result<Json<Value>, ApiError>
where
  S: ForumStore,
  C: Send + Sync,
{
  let user = state
    .store
    .consume_verification_token(&hash_token(&body.token))
    .await?;

  info!(username = %user.username, "email verified");
  Ok(Json(json!({
    "message": "email verified",
    "email": user.email,
  })))
}

// ─── Credentials ─────────────────────────────────────────────────────────────

fn hash_password(password: &str) -> Result<String, ApiError> {
  let salt = SaltString::generate(&mut OsRng);
  let hash = Argon2::default()
    .hash_password(password.as_bytes(), &salt)
    .map_err(|err| ApiError::Internal(err.to_string().into()))?;
  Ok(hash.to_string())
}

/// 256 bits of randomness, hex-encoded. Only its SHA-256 is stored.
fn fresh_token() -> String {
  let mut bytes = [0u8; 32];
  OsRng.fill_bytes(&mut bytes);
  hex::encode(bytes)
}

pub(crate) fn hash_token(token: &str) -> String {
  hex::encode(Sha256::digest(token.as_bytes()))
}

// ─── Validation ──────────────────────────────────────────────────────────────

fn normalize_email(email: &str) -> Result<String, ApiError> {
  let email = email.trim().to_lowercase();
  let valid = match email.split_once('@') {
    Some((local, domain)) => {
      !local.is_empty() && domain.contains('.') && !domain.starts_with('.')
    }
    None => false,
  };
  if !valid {
    return Err(ApiError::BadRequest("invalid email address".to_owned()));
  }
  Ok(email)
}

fn normalize_username(username: &str) -> Result<String, ApiError> {
  let username = username.trim().to_lowercase();
  if username.len() < 3 || username.len() > 50 {
    return Err(ApiError::BadRequest(
      "username must be between 3 and 50 characters".to_owned(),
    ));
  }
  if !username
    .chars()
    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
  {
    return Err(ApiError::BadRequest(
      "username may only contain letters, numbers, underscores, and hyphens".to_owned(),
    ));
  }
  Ok(username)
}

fn normalize_display_name(name: &str) -> Result<String, ApiError> {
  let name = name.trim();
  let name = name.strip_prefix('@').unwrap_or(name);
  if name.len() < 2 || name.len() > 50 {
    return Err(ApiError::BadRequest(
      "display name must be between 2 and 50 characters".to_owned(),
    ));
  }
  if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
    return Err(ApiError::BadRequest(
      "display name may only contain letters, numbers, and underscores".to_owned(),
    ));
  }
  Ok(name.to_owned())
}

fn check_password(password: &str) -> Result<(), ApiError> {
  if password.len() < 8 || password.len() > 72 {
    return Err(ApiError::BadRequest(
      "password must be between 8 and 72 characters".to_owned(),
    ));
  }
  if !password.chars().any(|c| c.is_ascii_alphabetic()) {
    return Err(ApiError::BadRequest(
      "password must contain at least one letter".to_owned(),
    ));
  }
  if !password.chars().any(|c| c.is_ascii_digit()) {
    return Err(ApiError::BadRequest(
      "password must contain at least one number".to_owned(),
    ));
  }
  Ok(())
}
