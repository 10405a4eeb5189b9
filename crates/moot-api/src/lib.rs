//! HTTP API for the forum: accounts, posts, comment threads, votes, and
//! the public user directory.
//!
//! The router is generic over its backing [`ForumStore`] and [`CacheStore`],
//! so tests run against the in-memory SQLite store and a local cache while
//! production wires up durable ones. Response caching is read-through and
//! strictly best-effort; mutations sweep the affected keys via the rule
//! table in `moot_core::cache`.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use moot_api::{AppState, TokenIssuer, api_router};
//! use moot_cache::MemoryCache;
//! use moot_core::notify::{Notification, NotificationGateway};
//! use moot_store_sqlite::SqliteStore;
//!
//! struct Quiet;
//!
//! impl NotificationGateway for Quiet {
//!   fn notify(&self, _notification: Notification) {}
//! }
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let state = AppState {
//!   store:    Arc::new(SqliteStore::open("forum.db").await?),
//!   cache:    Arc::new(MemoryCache::new()),
//!   tokens:   Arc::new(TokenIssuer::new("secret", 86_400)),
//!   notifier: Arc::new(Quiet),
//! };
//! let app = api_router(state);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use moot_core::{cache::CacheStore, notify::NotificationGateway, store::ForumStore};

pub mod auth;
pub mod cache;
pub mod comments;
mod error;
pub mod posts;
mod token;
pub mod users;

pub use error::ApiError;
pub use token::{CurrentUser, MaybeUser, TokenIssuer};

// ─── State ───────────────────────────────────────────────────────────────────

/// Everything the handlers share.
pub struct AppState<S, C> {
  pub store:    Arc<S>,
  pub cache:    Arc<C>,
  pub tokens:   Arc<TokenIssuer>,
  pub notifier: Arc<dyn NotificationGateway>,
}

// manual impl: a derived one would demand S: Clone and C: Clone
impl<S, C> Clone for AppState<S, C> {
  fn clone(&self) -> Self {
    Self {
      store:    Arc::clone(&self.store),
      cache:    Arc::clone(&self.cache),
      tokens:   Arc::clone(&self.tokens),
      notifier: Arc::clone(&self.notifier),
    }
  }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build the API router with all routes mounted at the root.
///
/// Nest it under a versioned prefix (and merge in any provider login
/// routes) in the server crate.
pub fn api_router<S, C>(state: AppState<S, C>) -> Router<()>
where
  S: ForumStore + 'static,
  C: CacheStore + 'static,
{
  Router::new()
    // accounts and sessions
    .route("/auth/register", post(auth::register::<S, C>))
    .route("/auth/login", post(auth::login::<S, C>))
    .route("/auth/me", get(auth::me).put(auth::update_me::<S, C>))
    .route("/auth/check-username/{username}", get(auth::check_username::<S, C>))
    .route("/auth/check-display-name/{name}", get(auth::check_display_name::<S, C>))
    .route("/auth/check-email/{email}", get(auth::check_email::<S, C>))
    .route("/auth/verify-email", post(auth::verify_email::<S, C>))
    // posts
    .route("/posts", get(posts::list::<S, C>).post(posts::create::<S, C>))
    .route("/posts/tags", get(posts::tags::<S, C>))
    .route("/posts/bookmarks", get(posts::bookmarks::<S, C>))
    .route("/posts/{id}", get(posts::get_one::<S, C>))
    .route(
      "/posts/{id}/comments",
      get(comments::thread::<S, C>).post(comments::create::<S, C>),
    )
    .route("/posts/{id}/vote", post(posts::vote::<S, C>))
    .route("/posts/{id}/bookmark", post(posts::bookmark::<S, C>))
    // param name must stay `{id}`: matchit rejects a different name at a
    // position it has already seen
    .route(
      "/posts/{id}/comments/{comment_id}/accept",
      post(comments::accept::<S, C>),
    )
    // comments
    .route("/comments/{id}/vote", post(comments::vote::<S, C>))
    // user directory
    .route("/users/search", get(users::search::<S, C>))
    .route("/users/top", get(users::top::<S, C>))
    .route("/users/stats", get(users::stats::<S, C>))
    .route("/users/profile/{display_name}", get(users::profile::<S, C>))
    .route("/users/{display_name}/comments", get(users::comments::<S, C>))
    .with_state(state)
}

// ─── Tests ───────────────────────────────────────────────────────────────────
