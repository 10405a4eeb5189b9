//! Posts and tags.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What kind of thread a post opens. Only questions can have an accepted
/// answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostType {
  Question,
  Discussion,
  Announcement,
}

impl PostType {
  pub fn as_str(&self) -> &'static str {
    match self {
      PostType::Question => "question",
      PostType::Discussion => "discussion",
      PostType::Announcement => "announcement",
    }
  }

  pub fn parse(s: &str) -> Option<Self> {
    match s {
      "question" => Some(PostType::Question),
      "discussion" => Some(PostType::Discussion),
      "announcement" => Some(PostType::Announcement),
      _ => None,
    }
  }
}

/// A thread-opening post with its denormalized aggregates.
#[derive(Debug, Clone)]
pub struct Post {
  pub post_id:            Uuid,
  pub author_id:          Uuid,
  pub title:              String,
  pub slug:               String,
  pub post_type:          PostType,
  pub body_markdown:      String,
  pub body_html:          String,
  /// Plain-text extraction of the body, used for search.
  pub body_text:          String,
  pub has_code:           bool,
  pub has_images:         bool,
  /// Names of the tags attached to this post, sorted.
  pub tags:               Vec<String>,
  pub upvote_count:       i64,
  pub downvote_count:     i64,
  pub comment_count:      i64,
  pub answer_count:       i64,
  pub view_count:         i64,
  pub is_answered:        bool,
  pub accepted_answer_id: Option<Uuid>,
  pub is_locked:          bool,
  pub is_deleted:         bool,
  pub is_featured:        bool,
  pub created_at:         DateTime<Utc>,
  pub updated_at:         DateTime<Utc>,
  /// Bumped by comments; drives the `active` sort order.
  pub last_activity:      DateTime<Utc>,
}

/// Input for creating a post. Content arrives already processed (HTML
/// sanitized, plain text extracted, code/image detection done) and the id and
/// slug are minted by the caller so the slug can embed the id.
#[derive(Debug, Clone)]
pub struct NewPost {
  pub post_id:       Uuid,
  pub author_id:     Uuid,
  pub title:         String,
  pub slug:          String,
  pub post_type:     PostType,
  pub body_markdown: String,
  pub body_html:     String,
  pub body_text:     String,
  pub has_code:      bool,
  pub has_images:    bool,
  /// Tag names, lowercased; missing tags are created on the fly.
  pub tags:          Vec<String>,
}

/// Ordering for the post listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostSort {
  #[default]
  Newest,
  Oldest,
  MostVoted,
  MostViewed,
  MostAnswered,
  /// Questions with no accepted answer, newest first.
  Unanswered,
  /// By most recent activity (comments bump a post).
  Active,
}

impl PostSort {
  pub fn as_str(&self) -> &'static str {
    match self {
      PostSort::Newest => "newest",
      PostSort::Oldest => "oldest",
      PostSort::MostVoted => "most_voted",
      PostSort::MostViewed => "most_viewed",
      PostSort::MostAnswered => "most_answered",
      PostSort::Unanswered => "unanswered",
      PostSort::Active => "active",
    }
  }
}

/// A label attached to posts, created on first use.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
  pub tag_id:      Uuid,
  pub name:        String,
  pub description: Option<String>,
  pub post_count:  i64,
  pub created_at:  DateTime<Utc>,
}
