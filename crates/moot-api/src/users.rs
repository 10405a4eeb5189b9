//! Public directory endpoints: search, leaderboard, instance stats, and
//! profiles as other people see them.
//!
//! | Method | Path                               | Description                        |
//! |--------|------------------------------------|------------------------------------|
//! | `GET`  | `/users/search`                    | match on username/display name/bio |
//! | `GET`  | `/users/top`                       | leaderboard by karma/posts/comments|
//! | `GET`  | `/users/stats`                     | instance totals                    |
//! | `GET`  | `/users/profile/{display_name}`    | public profile, leading `@` ignored|
//! | `GET`  | `/users/{display_name}/comments`   | recent comments with post titles   |
//!
//! Everything here is public and cacheable. Private profiles answer 403 to
//! both the profile and its comment listing; `email` and `full_name` only
//! appear when the owner opted in.

use axum::{
  Json,
  extract::{Path, Query, State},
};
use chrono::{DateTime, Utc};
use moot_core::{
  Error,
  cache::{CacheStore, keys, ttl},
  store::ForumStore,
  user::{TopUsersSort, User, UserStats},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AppState, cache, error::ApiError};

// ─── Views ───────────────────────────────────────────────────────────────────

/// A profile as strangers see it. No username, no settings; real name and
/// email only when the owner shows them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicProfile {
  pub user_id:       Uuid,
  pub display_name:  String,
  pub full_name:     Option<String>,
  pub email:         Option<String>,
  pub bio:           Option<String>,
  pub avatar_url:    Option<String>,
  pub website_url:   Option<String>,
  pub location:      Option<String>,
  pub github_username: Option<String>,
  pub is_verified:   bool,
  pub karma_score:   i64,
  pub post_count:    i64,
  pub comment_count: i64,
  pub created_at:    DateTime<Utc>,
}

impl From<User> for PublicProfile {
  fn from(user: User) -> Self {
    Self {
      user_id:         user.user_id,
      display_name:    user.display_name,
      full_name:       user.show_real_name.then_some(user.full_name).flatten(),
      email:           user.show_email.then_some(user.email),
      bio:             user.bio,
      avatar_url:      user.avatar_url,
      website_url:     user.website_url,
      location:        user.location,
      github_username: user.github_username,
      is_verified:     user.is_verified,
      karma_score:     user.karma_score,
      post_count:      user.post_count,
      comment_count:   user.comment_count,
      created_at:      user.created_at,
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsResponse {
  pub total_users:       i64,
  pub verified_users:    i64,
  /// Percentage, two decimals.
  pub verification_rate: f64,
}

impl From<UserStats> for StatsResponse {
  fn from(stats: UserStats) -> Self {
    Self {
      total_users:       stats.total_users,
      verified_users:    stats.verified_users,
      verification_rate: (stats.verification_rate() * 10000.0).round() / 100.0,
    }
  }
}

/// One comment in a profile's activity feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileCommentView {
  pub comment_id:     Uuid,
  pub post_id:        Uuid,
  pub post_title:     String,
  pub body_html:      String,
  pub upvote_count:   i64,
  pub downvote_count: i64,
  pub is_accepted:    bool,
  pub created_at:     DateTime<Utc>,
}

// ─── Search ──────────────────────────────────────────────────────────────────

fn default_search_limit() -> u32 {
  20
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
  /// Empty or missing lists everyone.
  #[serde(default)]
  pub q:      String,
  #[serde(default = "default_search_limit")]
  pub limit:  u32,
  #[serde(default)]
  pub offset: u32,
}

pub async fn search<S, C>(
  State(state): State<AppState<S, C>>,
  Query(params): Query<SearchParams>,
) -> Result<Json<Vec<PublicProfile>>, ApiError>
where
  S: ForumStore,
  C: CacheStore,
{
  let q = params.q.trim().to_owned();
  let limit = params.limit.clamp(1, 100);
  let offset = params.offset;

  let key = keys::users_search(&q, limit, offset);
  let hits = cache::lookup(state.cache.as_ref(), &key, ttl::SHORT, || async {
    let users = state.store.search_users(&q, limit, offset).await?;
    Ok(users.into_iter().map(PublicProfile::from).collect::<Vec<_>>())
  })
  .await?;
  Ok(Json(hits))
}

// ─── Leaderboard ─────────────────────────────────────────────────────────────

fn default_top_limit() -> u32 {
  10
}

#[derive(Debug, Deserialize)]
pub struct TopParams {
  #[serde(default)]
  pub sort_by: TopUsersSort,
  #[serde(default = "default_top_limit")]
  pub limit:   u32,
}

pub async fn top<S, C>(
  State(state): State<AppState<S, C>>,
  Query(params): Query<TopParams>,
) -> Result<Json<Vec<PublicProfile>>, ApiError>
where
  S: ForumStore,
  C: CacheStore,
{
  let limit = params.limit.clamp(1, 100);

  let key = keys::users_top(params.sort_by.as_str(), limit);
  let board = cache::lookup(state.cache.as_ref(), &key, ttl::MEDIUM, || async {
    let users = state.store.top_users(params.sort_by, limit).await?;
    Ok(users.into_iter().map(PublicProfile::from).collect::<Vec<_>>())
  })
  .await?;
  Ok(Json(board))
}

// ─── Stats ───────────────────────────────────────────────────────────────────

pub async fn stats<S, C>(
  State(state): State<AppState<S, C>>,
) -> Result<Json<StatsResponse>, ApiError>
where
  S: ForumStore,
  C: CacheStore,
{
  let stats = cache::lookup(
    state.cache.as_ref(),
    keys::USERS_STATS,
    ttl::SHORT,
    || async { Ok(StatsResponse::from(state.store.user_stats().await?)) },
  )
  .await?;
  Ok(Json(stats))
}

// ─── Profiles ────────────────────────────────────────────────────────────────

fn strip_handle(display_name: &str) -> &str {
  display_name
    .strip_prefix('@')
    .unwrap_or(display_name)
    .trim()
}

pub async fn profile<S, C>(
  State(state): State<AppState<S, C>>,
  Path(display_name): Path<String>,
) -> Result<Json<PublicProfile>, ApiError>
where
  S: ForumStore,
  C: CacheStore,
{
  let name = strip_handle(&display_name).to_owned();

  let key = keys::user_profile(&name);
  let profile = cache::lookup(state.cache.as_ref(), &key, ttl::MEDIUM, || async {
    let user = visible_user(state.store.as_ref(), &name).await?;
    Ok(PublicProfile::from(user))
  })
  .await?;
  Ok(Json(profile))
}

/// Resolve a display name to an account strangers may look at.
async fn visible_user<S: ForumStore>(store: &S, name: &str) -> Result<User, ApiError> {
  let user = store
    .user_by_display_name(name)
    .await?
    .ok_or_else(|| Error::UserNotFound(name.to_owned()))?;
  if !user.profile_public {
    return Err(ApiError::Forbidden("this profile is private".to_owned()));
  }
  Ok(user)
}

// ─── Profile comments ────────────────────────────────────────────────────────

fn default_comments_limit() -> u32 {
  50
}

#[derive(Debug, Deserialize)]
pub struct ProfileCommentsParams {
  #[serde(default = "default_comments_limit")]
  pub limit:  u32,
  #[serde(default)]
  pub offset: u32,
}

pub async fn comments<S, C>(
  State(state): State<AppState<S, C>>,
  Path(display_name): Path<String>,
  Query(params): Query<ProfileCommentsParams>,
) -> Result<Json<Vec<ProfileCommentView>>, ApiError>
where
  S: ForumStore,
  C: CacheStore,
{
  let name = strip_handle(&display_name).to_owned();
  let limit = params.limit.clamp(1, 100);
  let offset = params.offset;

  let key = keys::user_comments(&name, limit, offset);
  let feed = cache::lookup(state.cache.as_ref(), &key, ttl::SHORT, || async {
    visible_user(state.store.as_ref(), &name).await?;

    let rows = state.store.comments_by_user(&name, limit, offset).await?;
    Ok(
      rows
        .into_iter()
        .map(|(comment, post_title)| ProfileCommentView {
          comment_id:     comment.comment_id,
          post_id:        comment.post_id,
          post_title,
          body_html:      comment.body_html,
          upvote_count:   comment.upvote_count,
          downvote_count: comment.downvote_count,
          is_accepted:    comment.is_accepted,
          created_at:     comment.created_at,
        })
        .collect::<Vec<_>>(),
    )
  })
  .await?;
  Ok(Json(feed))
}
