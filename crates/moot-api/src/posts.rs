//! Post endpoints: listing, creation, single reads, tags, bookmarks, votes.
//!
//! | Method | Path                   | Description                                |
//! |--------|------------------------|--------------------------------------------|
//! | `GET`  | `/posts`               | filtered, sorted page; cached when anonymous |
//! | `POST` | `/posts`               | create, returns **201**                    |
//! | `GET`  | `/posts/tags`          | tag directory, cached                      |
//! | `GET`  | `/posts/bookmarks`     | the caller's bookmarked posts              |
//! | `GET`  | `/posts/{id}`          | single post; bumps the view counter        |
//! | `POST` | `/posts/{id}/vote`     | upvote/downvote toggle, returns **201**    |
//! | `POST` | `/posts/{id}/bookmark` | bookmark toggle                            |
//!
//! Anonymous reads are served through the cache; a signed-in caller always
//! hits the store, and single reads then carry their vote and bookmark
//! state.

use std::collections::HashMap;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::{DateTime, Utc};
use moot_core::{
  Error,
  cache::{CacheStore, Mutation, keys, ttl},
  ledger::{VoteAction, VoteKind},
  notify::Notification,
  post::{NewPost, Post, PostSort, PostType, Tag},
  store::{ForumStore, PostQuery, ViewerContext, VoteReceipt},
  user::User,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::info;
use uuid::Uuid;

use crate::{
  AppState,
  cache,
  error::ApiError,
  token::{CurrentUser, MaybeUser},
};

// ─── Views ───────────────────────────────────────────────────────────────────

/// Author fields folded flat into post and comment views. Authors who have
/// deleted their account come through as `None`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorView {
  pub author_id:           Uuid,
  pub author_display_name: Option<String>,
  pub author_avatar:       Option<String>,
  pub author_is_verified:  bool,
}

impl AuthorView {
  pub(crate) fn for_author(authors: &HashMap<Uuid, User>, author_id: Uuid) -> Self {
    match authors.get(&author_id) {
      Some(author) => Self {
        author_id,
        author_display_name: Some(author.display_name.clone()),
        author_avatar: author.avatar_url.clone(),
        author_is_verified: author.is_verified,
      },
      None => Self {
        author_id,
        author_display_name: None,
        author_avatar: None,
        author_is_verified: false,
      },
    }
  }
}

/// Collect the authors of a batch of posts or comments in one store call.
pub(crate) async fn author_map<S: ForumStore>(
  store: &S,
  ids: impl Iterator<Item = Uuid>,
) -> Result<HashMap<Uuid, User>, ApiError> {
  let mut distinct: Vec<Uuid> = Vec::new();
  for id in ids {
    if !distinct.contains(&id) {
      distinct.push(id);
    }
  }
  let users = store.users_by_ids(&distinct).await?;
  Ok(users.into_iter().map(|user| (user.user_id, user)).collect())
}

/// A post as the API returns it.
///
/// `user_vote` and `is_bookmarked` are present only on single reads by a
/// signed-in caller; list views omit them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostView {
  pub post_id:            Uuid,
  pub title:              String,
  pub slug:               String,
  pub post_type:          PostType,
  pub body_html:          String,
  pub body_markdown:      String,
  pub body_text:          String,
  #[serde(flatten)]
  pub author:             AuthorView,
  pub tags:               Vec<String>,
  pub upvote_count:       i64,
  pub downvote_count:     i64,
  pub comment_count:      i64,
  pub answer_count:       i64,
  pub view_count:         i64,
  pub is_answered:        bool,
  pub accepted_answer_id: Option<Uuid>,
  pub has_code:           bool,
  pub has_images:         bool,
  pub is_locked:          bool,
  pub is_featured:        bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub user_vote:          Option<VoteKind>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub is_bookmarked:      Option<bool>,
  pub created_at:         DateTime<Utc>,
  pub updated_at:         DateTime<Utc>,
  pub last_activity:      DateTime<Utc>,
}

impl PostView {
  fn build(
    post: Post,
    authors: &HashMap<Uuid, User>,
    viewer: Option<ViewerContext>,
  ) -> Self {
    let author = AuthorView::for_author(authors, post.author_id);
    Self {
      post_id:            post.post_id,
      title:              post.title,
      slug:               post.slug,
      post_type:          post.post_type,
      body_html:          post.body_html,
      body_markdown:      post.body_markdown,
      body_text:          post.body_text,
      author,
      tags:               post.tags,
      upvote_count:       post.upvote_count,
      downvote_count:     post.downvote_count,
      comment_count:      post.comment_count,
      answer_count:       post.answer_count,
      view_count:         post.view_count,
      is_answered:        post.is_answered,
      accepted_answer_id: post.accepted_answer_id,
      has_code:           post.has_code,
      has_images:         post.has_images,
      is_locked:          post.is_locked,
      is_featured:        post.is_featured,
      user_vote:          viewer.and_then(|v| v.user_vote),
      is_bookmarked:      viewer.map(|v| v.is_bookmarked),
      created_at:         post.created_at,
      updated_at:         post.updated_at,
      last_activity:      post.last_activity,
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostListResponse {
  pub posts:       Vec<PostView>,
  pub total_count: i64,
  pub page:        u32,
  pub page_size:   u32,
  pub total_pages: i64,
}

fn page_count(total: i64, page_size: u32) -> i64 {
  let size = i64::from(page_size.max(1));
  (total + size - 1) / size
}

/// Both vote endpoints answer with the resulting state, not the event.
#[derive(Debug, Serialize)]
pub struct VoteReceiptView {
  pub action:         VoteAction,
  pub vote_type:      Option<VoteKind>,
  pub upvote_count:   i64,
  pub downvote_count: i64,
}

impl From<VoteReceipt> for VoteReceiptView {
  fn from(receipt: VoteReceipt) -> Self {
    Self {
      action:         receipt.action,
      vote_type:      receipt.vote,
      upvote_count:   receipt.upvote_count,
      downvote_count: receipt.downvote_count,
    }
  }
}

// ─── List ────────────────────────────────────────────────────────────────────

fn default_page() -> u32 {
  1
}

fn default_page_size() -> u32 {
  20
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
  #[serde(default = "default_page")]
  pub page:      u32,
  #[serde(default = "default_page_size")]
  pub page_size: u32,
  #[serde(default)]
  pub sort:      PostSort,
  pub post_type: Option<PostType>,
  pub tag:       Option<String>,
  pub author:    Option<String>,
  pub search:    Option<String>,
}

impl ListParams {
  fn into_query(self) -> PostQuery {
    PostQuery {
      page:      self.page.max(1),
      page_size: self.page_size.clamp(1, 100),
      sort:      self.sort,
      post_type: self.post_type,
      tag:       self
        .tag
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty()),
      author:    self.author.filter(|a| !a.is_empty()),
      search:    self
        .search
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty()),
    }
  }
}

pub async fn list<S, C>(
  State(state): State<AppState<S, C>>,
  Query(params): Query<ListParams>,
  MaybeUser(viewer): MaybeUser,
) -> Result<Json<PostListResponse>, ApiError>
where
  S: ForumStore,
  C: CacheStore,
{
  let query = params.into_query();

  if viewer.is_none() {
    let key = keys::posts_list(&query);
    let page = cache::lookup(state.cache.as_ref(), &key, ttl::MEDIUM, || async {
      fetch_page(state.store.as_ref(), &query).await
    })
    .await?;
    return Ok(Json(page));
  }

  // signed-in callers read fresh, so their own writes show up immediately
  Ok(Json(fetch_page(state.store.as_ref(), &query).await?))
}

async fn fetch_page<S: ForumStore>(
  store: &S,
  query: &PostQuery,
) -> Result<PostListResponse, ApiError> {
  let page = store.list_posts(query).await?;
  let authors = author_map(store, page.posts.iter().map(|p| p.author_id)).await?;

  let total = page.total;
  let posts = page
    .posts
    .into_iter()
    .map(|post| PostView::build(post, &authors, None))
    .collect();

  Ok(PostListResponse {
    posts,
    total_count: total,
    page: query.page,
    page_size: query.page_size,
    total_pages: page_count(total, query.page_size),
  })
}

// ─── Create ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreatePostBody {
  pub title:     String,
  /// Markdown source.
  pub content:   String,
  pub post_type: PostType,
  #[serde(default)]
  pub tags:      Vec<String>,
}

pub async fn create<S, C>(
  State(state): State<AppState<S, C>>,
  CurrentUser(author): CurrentUser,
  Json(body): Json<CreatePostBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ForumStore,
  C: CacheStore,
{
  let title = body.title.trim().to_owned();
  if title.len() < 10 || title.len() > 300 {
    return Err(ApiError::BadRequest(
      "title must be between 10 and 300 characters".to_owned(),
    ));
  }
  let markdown = body.content.trim().to_owned();
  if markdown.len() < 10 {
    return Err(ApiError::BadRequest(
      "content must be at least 10 characters".to_owned(),
    ));
  }
  let tags = normalize_tags(body.tags)?;

  let rendered = moot_content::process(&markdown);
  let post_id = Uuid::new_v4();
  let slug = moot_content::slugify(&title, post_id);

  let post = state
    .store
    .create_post(NewPost {
      post_id,
      author_id: author.user_id,
      title,
      slug,
      post_type: body.post_type,
      body_markdown: markdown,
      body_html: rendered.html,
      body_text: rendered.text,
      has_code: rendered.has_code,
      has_images: rendered.has_images,
      tags,
    })
    .await?;

  cache::sweep(state.cache.as_ref(), &Mutation::PostCreated {
    author_display_name: &author.display_name,
  })
  .await;

  state.notifier.notify(Notification::PostCreated {
    author_display_name: author.display_name.clone(),
    title: post.title.clone(),
    slug: post.slug.clone(),
  });
  info!(post_id = %post.post_id, author = %author.username, "post created");

  let authors = HashMap::from([(author.user_id, author)]);
  let view = PostView::build(post, &authors, Some(ViewerContext::default()));
  Ok((StatusCode::CREATED, Json(view)))
}

/// Lowercase, trim, spaces to hyphens. `c++`, `.net`, and `actix-web` are
/// all legal names.
fn normalize_tags(tags: Vec<String>) -> Result<Vec<String>, ApiError> {
  let mut normalized: Vec<String> = Vec::new();
  for tag in tags {
    let tag = tag.trim().to_lowercase().replace(' ', "-");
    if tag.is_empty() {
      continue;
    }
    if !tag
      .chars()
      .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '.' | '-'))
    {
      return Err(ApiError::BadRequest(format!("invalid tag: {tag}")));
    }
    if !normalized.contains(&tag) {
      normalized.push(tag);
    }
  }
  if normalized.is_empty() {
    return Err(ApiError::BadRequest(
      "at least one tag is required".to_owned(),
    ));
  }
  if normalized.len() > 5 {
    return Err(ApiError::BadRequest("at most 5 tags allowed".to_owned()));
  }
  Ok(normalized)
}

// ─── Single read ─────────────────────────────────────────────────────────────

pub async fn get_one<S, C>(
  State(state): State<AppState<S, C>>,
  Path(post_id): Path<Uuid>,
  MaybeUser(viewer): MaybeUser,
) -> Result<Json<PostView>, ApiError>
where
  S: ForumStore,
  C: CacheStore,
{
  let view = match viewer {
    None => {
      let key = keys::post(post_id);
      // a cache hit serves a slightly stale view counter; the bump below
      // still lands in the store
      cache::lookup(state.cache.as_ref(), &key, ttl::SHORT, || async {
        fetch_post(state.store.as_ref(), post_id, None).await
      })
      .await?
    }
    Some(user) => {
      let viewer_state = state.store.viewer_context(post_id, user.user_id).await?;
      fetch_post(state.store.as_ref(), post_id, Some(viewer_state)).await?
    }
  };

  state.store.record_view(post_id).await?;
  Ok(Json(view))
}

async fn fetch_post<S: ForumStore>(
  store: &S,
  post_id: Uuid,
  viewer: Option<ViewerContext>,
) -> Result<PostView, ApiError> {
  let post = store
    .post_by_id(post_id)
    .await?
    .ok_or(Error::PostNotFound(post_id))?;
  let authors = author_map(store, std::iter::once(post.author_id)).await?;
  Ok(PostView::build(post, &authors, viewer))
}

// ─── Tags ────────────────────────────────────────────────────────────────────

fn default_tag_limit() -> u32 {
  50
}

#[derive(Debug, Deserialize)]
pub struct TagParams {
  pub search: Option<String>,
  #[serde(default = "default_tag_limit")]
  pub limit:  u32,
}

pub async fn tags<S, C>(
  State(state): State<AppState<S, C>>,
  Query(params): Query<TagParams>,
) -> Result<Json<Vec<Tag>>, ApiError>
where
  S: ForumStore,
  C: CacheStore,
{
  let limit = params.limit.clamp(1, 100);
  let search = params
    .search
    .map(|s| s.trim().to_lowercase())
    .filter(|s| !s.is_empty());

  let key = keys::tags(search.as_deref(), limit);
  let tags = cache::lookup(state.cache.as_ref(), &key, ttl::LONG, || async {
    Ok(state.store.list_tags(search.as_deref(), limit).await?)
  })
  .await?;
  Ok(Json(tags))
}

// ─── Bookmarks ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct PageParams {
  #[serde(default = "default_page")]
  pub page:      u32,
  #[serde(default = "default_page_size")]
  pub page_size: u32,
}

pub async fn bookmarks<S, C>(
  State(state): State<AppState<S, C>>,
  Query(params): Query<PageParams>,
  CurrentUser(user): CurrentUser,
) -> Result<Json<PostListResponse>, ApiError>
where
  S: ForumStore,
  C: Send + Sync,
{
  let page = params.page.max(1);
  let page_size = params.page_size.clamp(1, 100);

  let all = state.store.bookmarked_posts(user.user_id).await?;
  let total = all.len() as i64;
  let window: Vec<Post> = all
    .into_iter()
    .skip(((page - 1) * page_size) as usize)
    .take(page_size as usize)
    .collect();

  let authors =
    author_map(state.store.as_ref(), window.iter().map(|p| p.author_id)).await?;
  let posts = window
    .into_iter()
    .map(|post| PostView::build(post, &authors, None))
    .collect();

  Ok(Json(PostListResponse {
    posts,
    total_count: total,
    page,
    page_size,
    total_pages: page_count(total, page_size),
  }))
}

// ─── Vote ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct VoteBody {
  pub vote_type: VoteKind,
}

pub async fn vote<S, C>(
  State(state): State<AppState<S, C>>,
  Path(post_id): Path<Uuid>,
  CurrentUser(user): CurrentUser,
  Json(body): Json<VoteBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ForumStore,
  C: CacheStore,
{
  let receipt = state
    .store
    .vote_on_post(post_id, user.user_id, body.vote_type)
    .await?;

  cache::sweep(state.cache.as_ref(), &Mutation::PostVoted {
    post_id,
    post_author_display_name: &receipt.author_display_name,
  })
  .await;

  Ok((StatusCode::CREATED, Json(VoteReceiptView::from(receipt))))
}

// ─── Bookmark ────────────────────────────────────────────────────────────────

pub async fn bookmark<S, C>(
  State(state): State<AppState<S, C>>,
  Path(post_id): Path<Uuid>,
  CurrentUser(user): CurrentUser,
) -> Result<Json<Value>, ApiError>
where
  S: ForumStore,
  C: Send + Sync,
{
  let bookmarked = state.store.toggle_bookmark(post_id, user.user_id).await?;
  let message = if bookmarked {
    "bookmark added"
  } else {
    "bookmark removed"
  };
  Ok(Json(json!({ "message": message, "bookmarked": bookmarked })))
}
