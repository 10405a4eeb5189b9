//! The `ForumStore` trait and supporting query/receipt types.
//!
//! The trait is implemented by storage backends (e.g. `moot-store-sqlite`).
//! Higher layers (`moot-api`, `moot-server`) depend on this abstraction, not
//! on any concrete backend.
//!
//! Every write that moves denormalized counters (vote, accept, create with
//! counter side effects) is one named operation here, and implementations
//! must apply it atomically — the ledger rules in [`crate::ledger`] say what
//! to apply, the backend's transaction says how.

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  Result,
  comment::{Comment, NewComment},
  ledger::{VoteAction, VoteKind},
  post::{NewPost, Post, PostSort, PostType, Tag},
  user::{AccountField, GithubProfile, NewUser, ProfileUpdate, TopUsersSort, User, UserStats},
};

// ─── Query types ─────────────────────────────────────────────────────────────

/// Parameters for [`ForumStore::list_posts`].
#[derive(Debug, Clone)]
pub struct PostQuery {
  /// 1-based page number.
  pub page:      u32,
  pub page_size: u32,
  pub sort:      PostSort,
  pub post_type: Option<PostType>,
  /// Restrict to posts carrying this tag name.
  pub tag:       Option<String>,
  /// Restrict to posts authored by this display name.
  pub author:    Option<String>,
  /// Substring match over title and plain-text body.
  pub search:    Option<String>,
}

impl Default for PostQuery {
  fn default() -> Self {
    Self {
      page:      1,
      page_size: 20,
      sort:      PostSort::default(),
      post_type: None,
      tag:       None,
      author:    None,
      search:    None,
    }
  }
}

/// One page of posts plus the total row count for the query.
#[derive(Debug, Clone)]
pub struct PostPage {
  pub posts: Vec<Post>,
  pub total: i64,
}

// ─── Receipts ────────────────────────────────────────────────────────────────

/// Result of a vote operation: the resulting vote state, the fresh counters,
/// and what the invalidation sweep needs to know.
#[derive(Debug, Clone)]
pub struct VoteReceipt {
  pub action:         VoteAction,
  /// Vote held after the transition; `None` after a toggle-off.
  pub vote:           Option<VoteKind>,
  pub upvote_count:   i64,
  pub downvote_count: i64,
  /// Display name of the target's author (their karma and profile moved).
  pub author_display_name: String,
  /// Post the vote landed on; for comment votes, the comment's post.
  pub post_id:        Uuid,
}

/// Result of an accept-answer operation.
#[derive(Debug, Clone)]
pub struct AcceptReceipt {
  /// Whether the requested comment is accepted after the operation.
  pub is_accepted:        bool,
  pub accepted_answer_id: Option<Uuid>,
  pub comment_author_display_name: String,
  /// Set when acceptance transferred off another comment.
  pub previous_author_display_name: Option<String>,
}

/// Requester-specific state embedded in authenticated post reads.
#[derive(Debug, Clone, Copy, Default)]
pub struct ViewerContext {
  pub user_vote:     Option<VoteKind>,
  pub is_bookmarked: bool,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over the forum's relational backend.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (tokio with `axum`). Reads exclude
/// soft-deleted rows unless noted.
pub trait ForumStore: Send + Sync {
  // ── Users ─────────────────────────────────────────────────────────────

  /// Create an account. Fails with `Conflict` naming the colliding field if
  /// email, username, or display name is taken.
  fn create_user(&self, input: NewUser) -> impl Future<Output = Result<User>> + Send + '_;

  fn user_by_id(&self, user_id: Uuid) -> impl Future<Output = Result<Option<User>>> + Send + '_;

  /// Look up by email or username — the login form accepts either.
  fn user_by_login<'a>(
    &'a self,
    login: &'a str,
  ) -> impl Future<Output = Result<Option<User>>> + Send + 'a;

  fn user_by_display_name<'a>(
    &'a self,
    display_name: &'a str,
  ) -> impl Future<Output = Result<Option<User>>> + Send + 'a;

  /// Batch lookup for enriching listings with author details. Unknown ids
  /// are absent from the result; order is unspecified.
  fn users_by_ids<'a>(
    &'a self,
    ids: &'a [Uuid],
  ) -> impl Future<Output = Result<Vec<User>>> + Send + 'a;

  /// Availability probe for registration forms.
  fn account_field_taken<'a>(
    &'a self,
    field: AccountField,
    value: &'a str,
  ) -> impl Future<Output = Result<bool>> + Send + 'a;

  /// Apply an explicit optional-field patch. Fails with `Conflict` if the new
  /// display name is taken by someone else.
  fn update_profile(
    &self,
    user_id: Uuid,
    update: ProfileUpdate,
  ) -> impl Future<Output = Result<User>> + Send + '_;

  /// Public, active accounts whose username/display name/bio match `q`.
  fn search_users<'a>(
    &'a self,
    q: &'a str,
    limit: u32,
    offset: u32,
  ) -> impl Future<Output = Result<Vec<User>>> + Send + 'a;

  /// Leaderboard over public, active accounts.
  fn top_users(
    &self,
    sort: TopUsersSort,
    limit: u32,
  ) -> impl Future<Output = Result<Vec<User>>> + Send + '_;

  fn user_stats(&self) -> impl Future<Output = Result<UserStats>> + Send + '_;

  /// Sign in via GitHub: link by github_id, else attach to the account with
  /// the provider-verified email, else create a fresh account (collision-
  /// suffixing the username if needed).
  fn github_signin(
    &self,
    profile: GithubProfile,
  ) -> impl Future<Output = Result<User>> + Send + '_;

  // ── Email verification ────────────────────────────────────────────────

  /// Store the SHA-256 of an issued verification token.
  fn create_verification_token<'a>(
    &'a self,
    user_id: Uuid,
    token_hash: &'a str,
    expires_at: DateTime<Utc>,
  ) -> impl Future<Output = Result<()>> + Send + 'a;

  /// Redeem a token: marks it used and the account verified. Fails with
  /// `InvalidOperation` when the token is unknown, expired, or already used.
  fn consume_verification_token<'a>(
    &'a self,
    token_hash: &'a str,
  ) -> impl Future<Output = Result<User>> + Send + 'a;

  // ── Posts ─────────────────────────────────────────────────────────────

  /// Insert a post; get-or-create its tags (bumping their `post_count`) and
  /// bump the author's `post_count`, all in one transaction.
  fn create_post(&self, input: NewPost) -> impl Future<Output = Result<Post>> + Send + '_;

  fn post_by_id(&self, post_id: Uuid) -> impl Future<Output = Result<Option<Post>>> + Send + '_;

  fn list_posts<'a>(
    &'a self,
    query: &'a PostQuery,
  ) -> impl Future<Output = Result<PostPage>> + Send + 'a;

  /// Bump `view_count`. Runs on every single-post read, cache hit or not.
  fn record_view(&self, post_id: Uuid) -> impl Future<Output = Result<()>> + Send + '_;

  /// Tags by descending `post_count`, optionally filtered by name substring.
  fn list_tags<'a>(
    &'a self,
    search: Option<&'a str>,
    limit: u32,
  ) -> impl Future<Output = Result<Vec<Tag>>> + Send + 'a;

  // ── Comments ──────────────────────────────────────────────────────────

  /// Insert a comment with its counter side effects (post comment/answer
  /// counts, author comment count, parent reply count, post activity bump).
  ///
  /// Fails `PostNotFound` for missing/deleted posts, `Forbidden` for locked
  /// posts, `CommentNotFound` when `parent_id` does not name a live comment
  /// on the same post.
  fn create_comment(
    &self,
    input: NewComment,
  ) -> impl Future<Output = Result<Comment>> + Send + '_;

  /// All live comments on a post, oldest first; thread assembly and
  /// top-level ordering are the caller's concern.
  fn comments_for_post(
    &self,
    post_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Comment>>> + Send + '_;

  /// Recent comments by a user, newest first, each paired with the title of
  /// the post it landed on. Comments on deleted posts are excluded.
  fn comments_by_user<'a>(
    &'a self,
    display_name: &'a str,
    limit: u32,
    offset: u32,
  ) -> impl Future<Output = Result<Vec<(Comment, String)>>> + Send + 'a;

  // ── Ledger operations ─────────────────────────────────────────────────

  /// Apply one vote transition on a post: vote row, post counters, and the
  /// author's karma in a single transaction.
  fn vote_on_post(
    &self,
    post_id: Uuid,
    user_id: Uuid,
    kind: VoteKind,
  ) -> impl Future<Output = Result<VoteReceipt>> + Send + '_;

  /// Apply one vote transition on a comment. Same atomicity contract.
  fn vote_on_comment(
    &self,
    comment_id: Uuid,
    user_id: Uuid,
    kind: VoteKind,
  ) -> impl Future<Output = Result<VoteReceipt>> + Send + '_;

  /// Accept, unaccept, or transfer the accepted answer of a question.
  ///
  /// Only the post's author may call this (`Forbidden` otherwise), and only
  /// on questions (`InvalidOperation`). Flag flips and the ±15 karma moves
  /// commit atomically.
  fn accept_answer(
    &self,
    post_id: Uuid,
    comment_id: Uuid,
    acting_user: Uuid,
  ) -> impl Future<Output = Result<AcceptReceipt>> + Send + '_;

  // ── Bookmarks & viewer state ──────────────────────────────────────────

  /// Toggle a bookmark; returns whether the post is bookmarked afterwards.
  fn toggle_bookmark(
    &self,
    post_id: Uuid,
    user_id: Uuid,
  ) -> impl Future<Output = Result<bool>> + Send + '_;

  fn bookmarked_posts(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Post>>> + Send + '_;

  /// The requester's own vote/bookmark state on a post.
  fn viewer_context(
    &self,
    post_id: Uuid,
    user_id: Uuid,
  ) -> impl Future<Output = Result<ViewerContext>> + Send + '_;

  /// The requester's votes across a post's comments, keyed by comment id.
  fn comment_votes(
    &self,
    post_id: Uuid,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Vec<(Uuid, VoteKind)>>> + Send + '_;
}
