//! Comments — replies to posts, optionally nested under another comment.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct Comment {
  pub comment_id:     Uuid,
  pub post_id:        Uuid,
  pub author_id:      Uuid,
  /// Parent comment on the same post; `None` for top-level comments.
  pub parent_id:      Option<Uuid>,
  pub body_html:      String,
  pub body_text:      String,
  pub has_code:       bool,
  pub has_images:     bool,
  pub upvote_count:   i64,
  pub downvote_count: i64,
  pub reply_count:    i64,
  /// Top-level comment on a question — counted in the post's `answer_count`.
  pub is_answer:      bool,
  pub is_accepted:    bool,
  pub is_deleted:     bool,
  pub created_at:     DateTime<Utc>,
  pub updated_at:     DateTime<Utc>,
}

/// Input for creating a comment; content arrives already processed.
#[derive(Debug, Clone)]
pub struct NewComment {
  pub post_id:    Uuid,
  pub author_id:  Uuid,
  pub parent_id:  Option<Uuid>,
  pub body_html:  String,
  pub body_text:  String,
  pub has_code:   bool,
  pub has_images: bool,
}

/// Ordering for a post's comment thread (applies to top-level comments;
/// replies always read oldest-first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentSort {
  #[default]
  Oldest,
  Newest,
  MostVoted,
}

impl CommentSort {
  pub fn as_str(&self) -> &'static str {
    match self {
      CommentSort::Oldest => "oldest",
      CommentSort::Newest => "newest",
      CommentSort::MostVoted => "most_voted",
    }
  }
}
