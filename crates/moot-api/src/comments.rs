//! Comment endpoints: the thread view, replies, votes, and answer
//! acceptance.
//!
//! | Method | Path                                        | Description                          |
//! |--------|---------------------------------------------|--------------------------------------|
//! | `GET`  | `/posts/{id}/comments`                      | nested thread; cached when anonymous |
//! | `POST` | `/posts/{id}/comments`                      | comment or reply, returns **201**    |
//! | `POST` | `/comments/{id}/vote`                       | upvote/downvote toggle, **201**      |
//! | `POST` | `/posts/{id}/comments/{comment_id}/accept`  | accept toggle, post author only      |
//!
//! The store hands back a flat, oldest-first comment list; the tree is
//! assembled here in one pass. Replies inside a branch always stay
//! oldest-first, the requested sort applies to top-level comments only.

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
  comment::{Comment, CommentSort, NewComment},
  ledger::VoteKind,
  notify::Notification,
  store::ForumStore,
  user::User,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
  AppState,
  cache,
  error::ApiError,
  posts::{AuthorView, VoteBody, VoteReceiptView, author_map},
  token::{CurrentUser, MaybeUser},
};

// ─── View ────────────────────────────────────────────────────────────────────

/// One comment with its subtree. `user_vote` appears only for signed-in
/// callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentView {
  pub comment_id:     Uuid,
  pub post_id:        Uuid,
  pub parent_id:      Option<Uuid>,
  pub body_html:      String,
  pub body_text:      String,
  #[serde(flatten)]
  pub author:         AuthorView,
  pub upvote_count:   i64,
  pub downvote_count: i64,
  pub reply_count:    i64,
  pub is_answer:      bool,
  pub is_accepted:    bool,
  pub has_code:       bool,
  pub has_images:     bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub user_vote:      Option<VoteKind>,
  pub replies:        Vec<CommentView>,
  pub created_at:     DateTime<Utc>,
  pub updated_at:     DateTime<Utc>,
}

impl CommentView {
  fn build(
    comment: Comment,
    authors: &HashMap<Uuid, User>,
    votes: &HashMap<Uuid, VoteKind>,
    replies: Vec<CommentView>,
  ) -> Self {
    let author = AuthorView::for_author(authors, comment.author_id);
    Self {
      comment_id:     comment.comment_id,
      post_id:        comment.post_id,
      parent_id:      comment.parent_id,
      body_html:      comment.body_html,
      body_text:      comment.body_text,
      author,
      upvote_count:   comment.upvote_count,
      downvote_count: comment.downvote_count,
      reply_count:    comment.reply_count,
      is_answer:      comment.is_answer,
      is_accepted:    comment.is_accepted,
      has_code:       comment.has_code,
      has_images:     comment.has_images,
      user_vote:      votes.get(&comment.comment_id).copied(),
      replies,
      created_at:     comment.created_at,
      updated_at:     comment.updated_at,
    }
  }
}

/// Build the nested thread from the store's flat, oldest-first list.
///
/// Replies are always created after their parents, so one scan in reverse
/// creation order sees every subtree before the comment it hangs off. No
/// recursion, so reply depth is unbounded without risking the stack.
/// Replies whose parent is soft-deleted drop out with it.
fn assemble_thread(
  comments: Vec<Comment>,
  authors: &HashMap<Uuid, User>,
  votes: &HashMap<Uuid, VoteKind>,
  sort: CommentSort,
) -> Vec<CommentView> {
  let mut pending: HashMap<Uuid, Vec<CommentView>> = HashMap::new();
  let mut top_level: Vec<CommentView> = Vec::new();

  for comment in comments.into_iter().rev() {
    let mut replies = pending.remove(&comment.comment_id).unwrap_or_default();
    replies.reverse();

    let parent_id = comment.parent_id;
    let view = CommentView::build(comment, authors, votes, replies);
    match parent_id {
      Some(parent) => pending.entry(parent).or_default().push(view),
      None => top_level.push(view),
    }
  }
  top_level.reverse();

  match sort {
    CommentSort::Oldest => {}
    CommentSort::Newest => top_level.reverse(),
    // stable, so equal scores stay oldest-first
    CommentSort::MostVoted => top_level.sort_by_key(|c| {
      std::cmp::Reverse(c.upvote_count - c.downvote_count)
    }),
  }
  top_level
}

// ─── Thread ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ThreadParams {
  #[serde(default)]
  pub sort: CommentSort,
}

pub async fn thread<S, C>(
  State(state): State<AppState<S, C>>,
  Path(post_id): Path<Uuid>,
  Query(params): Query<ThreadParams>,
  MaybeUser(viewer): MaybeUser,
) -> Result<Json<Vec<CommentView>>, ApiError>
where
  S: ForumStore,
  C: CacheStore,
{
  let sort = params.sort;

  match viewer {
    None => {
      let key = keys::post_comments(post_id, sort.as_str());
      let thread =
        cache::lookup(state.cache.as_ref(), &key, ttl::SHORT, || async {
          fetch_thread(state.store.as_ref(), post_id, sort, &HashMap::new()).await
        })
        .await?;
      Ok(Json(thread))
    }
    Some(user) => {
      let votes: HashMap<Uuid, VoteKind> = state
        .store
        .comment_votes(post_id, user.user_id)
        .await?
        .into_iter()
        .collect();
      Ok(Json(
        fetch_thread(state.store.as_ref(), post_id, sort, &votes).await?,
      ))
    }
  }
}

async fn fetch_thread<S: ForumStore>(
  store: &S,
  post_id: Uuid,
  sort: CommentSort,
  votes: &HashMap<Uuid, VoteKind>,
) -> Result<Vec<CommentView>, ApiError> {
  // listing a missing post is a 404, not an empty thread
  store
    .post_by_id(post_id)
    .await?
    .ok_or(Error::PostNotFound(post_id))?;

  let comments = store.comments_for_post(post_id).await?;
  let authors = author_map(store, comments.iter().map(|c| c.author_id)).await?;
  Ok(assemble_thread(comments, &authors, votes, sort))
}

// ─── Create ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateCommentBody {
  /// Markdown source.
  pub content:   String,
  pub parent_id: Option<Uuid>,
}

pub async fn create<S, C>(
  State(state): State<AppState<S, C>>,
  Path(post_id): Path<Uuid>,
  CurrentUser(author): CurrentUser,
  Json(body): Json<CreateCommentBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ForumStore,
  C: CacheStore,
{
  let markdown = body.content.trim().to_owned();
  if markdown.len() < 5 {
    return Err(ApiError::BadRequest(
      "comment must be at least 5 characters".to_owned(),
    ));
  }

  let rendered = moot_content::process(&markdown);
  let comment = state
    .store
    .create_comment(NewComment {
      post_id,
      author_id: author.user_id,
      parent_id: body.parent_id,
      body_html: rendered.html,
      body_text: rendered.text,
      has_code: rendered.has_code,
      has_images: rendered.has_images,
    })
    .await?;

  cache::sweep(state.cache.as_ref(), &Mutation::CommentCreated {
    post_id,
    author_display_name: &author.display_name,
  })
  .await;

  notify_answer(&state, &comment, &author).await;
  info!(comment_id = %comment.comment_id, author = %author.username, "comment created");

  let authors = HashMap::from([(author.user_id, author)]);
  let view = CommentView::build(comment, &authors, &HashMap::new(), Vec::new());
  Ok((StatusCode::CREATED, Json(view)))
}

/// Tell the question's author someone answered. Skipped for replies, for
/// discussions, and for authors answering themselves; lookup failures are
/// logged, never surfaced.
async fn notify_answer<S, C>(state: &AppState<S, C>, comment: &Comment, author: &User)
where
  S: ForumStore,
{
  if !comment.is_answer {
    return;
  }

  let post = match state.store.post_by_id(comment.post_id).await {
    Ok(Some(post)) if post.author_id != author.user_id => post,
    Ok(_) => return,
    Err(err) => {
      warn!(error = %err, "could not load post for answer notification");
      return;
    }
  };
  let recipient = match state.store.user_by_id(post.author_id).await {
    Ok(Some(user)) => user,
    Ok(None) => return,
    Err(err) => {
      warn!(error = %err, "could not load recipient for answer notification");
      return;
    }
  };

  state.notifier.notify(Notification::NewAnswer {
    recipient_email:     recipient.email,
    post_title:          post.title,
    author_display_name: author.display_name.clone(),
  });
}

// ─── Vote ────────────────────────────────────────────────────────────────────

pub async fn vote<S, C>(
  State(state): State<AppState<S, C>>,
  Path(comment_id): Path<Uuid>,
  CurrentUser(user): CurrentUser,
  Json(body): Json<VoteBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ForumStore,
  C: CacheStore,
{
  let receipt = state
    .store
    .vote_on_comment(comment_id, user.user_id, body.vote_type)
    .await?;

  cache::sweep(state.cache.as_ref(), &Mutation::CommentVoted {
    post_id: receipt.post_id,
    comment_author_display_name: &receipt.author_display_name,
  })
  .await;

  Ok((StatusCode::CREATED, Json(VoteReceiptView::from(receipt))))
}

// ─── Accept ──────────────────────────────────────────────────────────────────

pub async fn accept<S, C>(
  State(state): State<AppState<S, C>>,
  Path((post_id, comment_id)): Path<(Uuid, Uuid)>,
  CurrentUser(user): CurrentUser,
) -> Result<Json<Value>, ApiError>
where
  S: ForumStore,
  C: CacheStore,
{
  let receipt = state
    .store
    .accept_answer(post_id, comment_id, user.user_id)
    .await?;

  cache::sweep(state.cache.as_ref(), &Mutation::AnswerAccepted {
    post_id,
    comment_author: &receipt.comment_author_display_name,
    previous_comment_author: receipt.previous_author_display_name.as_deref(),
  })
  .await;

  let message = if receipt.is_accepted {
    "answer accepted"
  } else {
    "answer unaccepted"
  };
  Ok(Json(json!({
    "message": message,
    "is_accepted": receipt.is_accepted,
    "accepted_answer_id": receipt.accepted_answer_id,
  })))
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  fn comment(id: u128, parent: Option<u128>, minute: u32, score: i64) -> Comment {
    let at = Utc.with_ymd_and_hms(2025, 6, 1, 12, minute, 0).unwrap();
    Comment {
      comment_id: Uuid::from_u128(id),
      post_id: Uuid::from_u128(999),
      author_id: Uuid::from_u128(1),
      parent_id: parent.map(Uuid::from_u128),
      body_html: String::new(),
      body_text: String::new(),
      has_code: false,
      has_images: false,
      upvote_count: score.max(0),
      downvote_count: 0,
      reply_count: 0,
      is_answer: parent.is_none(),
      is_accepted: false,
      is_deleted: false,
      created_at: at,
      updated_at: at,
    }
  }

  fn ids(views: &[CommentView]) -> Vec<u128> {
    views.iter().map(|v| v.comment_id.as_u128()).collect()
  }

  #[test]
  fn nests_replies_under_parents() {
    // a(1) -> reply b(2) -> reply d(4); c(3) top-level
    let flat = vec![
      comment(1, None, 0, 0),
      comment(2, Some(1), 1, 0),
      comment(3, None, 2, 0),
      comment(4, Some(2), 3, 0),
    ];
    let thread =
      assemble_thread(flat, &HashMap::new(), &HashMap::new(), CommentSort::Oldest);

    assert_eq!(ids(&thread), [1, 3]);
    assert_eq!(ids(&thread[0].replies), [2]);
    assert_eq!(ids(&thread[0].replies[0].replies), [4]);
    assert!(thread[1].replies.is_empty());
  }

  #[test]
  fn sort_applies_to_top_level_only() {
    let flat = vec![
      comment(1, None, 0, 1),
      comment(2, None, 1, 5),
      comment(3, Some(2), 2, 9),
      comment(4, Some(2), 3, 2),
    ];

    let newest = assemble_thread(
      flat.clone(),
      &HashMap::new(),
      &HashMap::new(),
      CommentSort::Newest,
    );
    assert_eq!(ids(&newest), [2, 1]);
    // replies stay oldest-first whatever the top-level sort
    assert_eq!(ids(&newest[0].replies), [3, 4]);

    let voted =
      assemble_thread(flat, &HashMap::new(), &HashMap::new(), CommentSort::MostVoted);
    assert_eq!(ids(&voted), [2, 1]);
    assert_eq!(ids(&voted[0].replies), [3, 4]);
  }

  #[test]
  fn deep_chains_do_not_recurse() {
    // a strictly linear 5000-deep chain
    let mut flat = vec![comment(1, None, 0, 0)];
    for i in 2..=5000u128 {
      flat.push(comment(i, Some(i - 1), (i % 60) as u32, 0));
    }
    let thread =
      assemble_thread(flat, &HashMap::new(), &HashMap::new(), CommentSort::Oldest);

    assert_eq!(thread.len(), 1);
    let mut depth = 0;
    let mut cursor = &thread[0];
    while let Some(next) = cursor.replies.first() {
      depth += 1;
      cursor = next;
    }
    assert_eq!(depth, 4999);
  }

  #[test]
  fn orphaned_replies_are_dropped() {
    // parent 7 is not in the listing (soft-deleted)
    let flat = vec![comment(1, None, 0, 0), comment(2, Some(7), 1, 0)];
    let thread =
      assemble_thread(flat, &HashMap::new(), &HashMap::new(), CommentSort::Oldest);
    assert_eq!(ids(&thread), [1]);
  }
}
