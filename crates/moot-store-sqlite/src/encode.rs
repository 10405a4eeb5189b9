//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings, UUIDs as hyphenated
//! lowercase strings, enums as their lowercase wire names, and booleans as
//! SQLite integers.

use chrono::{DateTime, Utc};
use moot_core::{
  Error, Result,
  comment::Comment,
  ledger::VoteKind,
  post::{Post, PostType, Tag},
  user::User,
};
use thiserror::Error as ThisError;
use uuid::Uuid;

/// A column value that does not decode to its domain type. Indicates row
/// corruption; surfaced to callers as a storage fault.
#[derive(Debug, ThisError)]
#[error("undecodable column: {0}")]
pub struct DecodeError(pub String);

// ─── Scalar codecs ───────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> {
  Uuid::parse_str(s).map_err(Error::storage)
}

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(Error::storage)
}

pub fn decode_post_type(s: &str) -> Result<PostType> {
  PostType::parse(s)
    .ok_or_else(|| Error::storage(DecodeError(format!("post type {s:?}"))))
}

/// rusqlite-level decode failure, for use inside connection closures where
/// the error channel is `rusqlite::Error`.
pub fn bad_column(idx: usize, what: &str) -> rusqlite::Error {
  rusqlite::Error::FromSqlConversionFailure(
    idx,
    rusqlite::types::Type::Text,
    format!("undecodable column: {what}").into(),
  )
}

/// Decode a `vote_type` column inside a connection closure.
pub fn vote_kind_column(s: &str) -> rusqlite::Result<VoteKind> {
  VoteKind::parse(s).ok_or_else(|| bad_column(0, "vote_type"))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read directly from a `users` row.
pub struct RawUser {
  pub user_id:         String,
  pub email:           String,
  pub username:        String,
  pub display_name:    String,
  pub full_name:       Option<String>,
  pub bio:             Option<String>,
  pub avatar_url:      Option<String>,
  pub website_url:     Option<String>,
  pub location:        Option<String>,
  pub password_hash:   Option<String>,
  pub github_id:       Option<String>,
  pub github_username: Option<String>,
  pub is_active:       bool,
  pub is_verified:     bool,
  pub profile_public:  bool,
  pub show_email:      bool,
  pub show_real_name:  bool,
  pub karma_score:     i64,
  pub post_count:      i64,
  pub comment_count:   i64,
  pub created_at:      String,
  pub updated_at:      String,
}

impl RawUser {
  /// Column list matching [`RawUser::from_row`] field order.
  pub const COLUMNS: &'static str = "user_id, email, username, display_name, \
     full_name, bio, avatar_url, website_url, location, password_hash, \
     github_id, github_username, is_active, is_verified, profile_public, \
     show_email, show_real_name, karma_score, post_count, comment_count, \
     created_at, updated_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      user_id:         row.get(0)?,
      email:           row.get(1)?,
      username:        row.get(2)?,
      display_name:    row.get(3)?,
      full_name:       row.get(4)?,
      bio:             row.get(5)?,
      avatar_url:      row.get(6)?,
      website_url:     row.get(7)?,
      location:        row.get(8)?,
      password_hash:   row.get(9)?,
      github_id:       row.get(10)?,
      github_username: row.get(11)?,
      is_active:       row.get(12)?,
      is_verified:     row.get(13)?,
      profile_public:  row.get(14)?,
      show_email:      row.get(15)?,
      show_real_name:  row.get(16)?,
      karma_score:     row.get(17)?,
      post_count:      row.get(18)?,
      comment_count:   row.get(19)?,
      created_at:      row.get(20)?,
      updated_at:      row.get(21)?,
    })
  }

  pub fn into_user(self) -> Result<User> {
    Ok(User {
      user_id:         decode_uuid(&self.user_id)?,
      email:           self.email,
      username:        self.username,
      display_name:    self.display_name,
      full_name:       self.full_name,
      bio:             self.bio,
      avatar_url:      self.avatar_url,
      website_url:     self.website_url,
      location:        self.location,
      password_hash:   self.password_hash,
      github_id:       self.github_id,
      github_username: self.github_username,
      is_active:       self.is_active,
      is_verified:     self.is_verified,
      profile_public:  self.profile_public,
      show_email:      self.show_email,
      show_real_name:  self.show_real_name,
      karma_score:     self.karma_score,
      post_count:      self.post_count,
      comment_count:   self.comment_count,
      created_at:      decode_dt(&self.created_at)?,
      updated_at:      decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw values read directly from a `posts` row.
pub struct RawPost {
  pub post_id:            String,
  pub author_id:          String,
  pub title:              String,
  pub slug:               String,
  pub post_type:          String,
  pub body_markdown:      String,
  pub body_html:          String,
  pub body_text:          String,
  pub has_code:           bool,
  pub has_images:         bool,
  pub upvote_count:       i64,
  pub downvote_count:     i64,
  pub comment_count:      i64,
  pub answer_count:       i64,
  pub view_count:         i64,
  pub is_answered:        bool,
  pub accepted_answer_id: Option<String>,
  pub is_locked:          bool,
  pub is_deleted:         bool,
  pub is_featured:        bool,
  pub created_at:         String,
  pub updated_at:         String,
  pub last_activity:      String,
  /// Comma-joined tag names from the correlated subquery in [`Self::COLUMNS`];
  /// `None` for untagged posts.
  pub tag_csv:            Option<String>,
}

impl RawPost {
  /// Select list for reading posts. Valid in any `SELECT .. FROM posts`
  /// query; the last column folds the post's tag names in so reads stay a
  /// single statement.
  pub const COLUMNS: &'static str = "post_id, author_id, title, slug, \
     post_type, body_markdown, body_html, body_text, has_code, has_images, \
     upvote_count, downvote_count, comment_count, answer_count, view_count, \
     is_answered, accepted_answer_id, is_locked, is_deleted, is_featured, \
     created_at, updated_at, last_activity, \
     (SELECT group_concat(t.name) FROM post_tags pt \
        JOIN tags t ON t.tag_id = pt.tag_id \
        WHERE pt.post_id = posts.post_id) AS tag_csv";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      post_id:            row.get(0)?,
      author_id:          row.get(1)?,
      title:              row.get(2)?,
      slug:               row.get(3)?,
      post_type:          row.get(4)?,
      body_markdown:      row.get(5)?,
      body_html:          row.get(6)?,
      body_text:          row.get(7)?,
      has_code:           row.get(8)?,
      has_images:         row.get(9)?,
      upvote_count:       row.get(10)?,
      downvote_count:     row.get(11)?,
      comment_count:      row.get(12)?,
      answer_count:       row.get(13)?,
      view_count:         row.get(14)?,
      is_answered:        row.get(15)?,
      accepted_answer_id: row.get(16)?,
      is_locked:          row.get(17)?,
      is_deleted:         row.get(18)?,
      is_featured:        row.get(19)?,
      created_at:         row.get(20)?,
      updated_at:         row.get(21)?,
      last_activity:      row.get(22)?,
      tag_csv:            row.get(23)?,
    })
  }

  pub fn into_post(self) -> Result<Post> {
    let mut tags: Vec<String> = match self.tag_csv.as_deref() {
      Some(csv) => csv.split(',').map(str::to_owned).collect(),
      None => Vec::new(),
    };
    tags.sort();
    Ok(Post {
      post_id:            decode_uuid(&self.post_id)?,
      author_id:          decode_uuid(&self.author_id)?,
      title:              self.title,
      slug:               self.slug,
      post_type:          decode_post_type(&self.post_type)?,
      body_markdown:      self.body_markdown,
      body_html:          self.body_html,
      body_text:          self.body_text,
      has_code:           self.has_code,
      has_images:         self.has_images,
      tags,
      upvote_count:       self.upvote_count,
      downvote_count:     self.downvote_count,
      comment_count:      self.comment_count,
      answer_count:       self.answer_count,
      view_count:         self.view_count,
      is_answered:        self.is_answered,
      accepted_answer_id: self
        .accepted_answer_id
        .as_deref()
        .map(decode_uuid)
        .transpose()?,
      is_locked:          self.is_locked,
      is_deleted:         self.is_deleted,
      is_featured:        self.is_featured,
      created_at:         decode_dt(&self.created_at)?,
      updated_at:         decode_dt(&self.updated_at)?,
      last_activity:      decode_dt(&self.last_activity)?,
    })
  }
}

/// Raw values read directly from a `comments` row.
pub struct RawComment {
  pub comment_id:     String,
  pub post_id:        String,
  pub author_id:      String,
  pub parent_id:      Option<String>,
  pub body_html:      String,
  pub body_text:      String,
  pub has_code:       bool,
  pub has_images:     bool,
  pub upvote_count:   i64,
  pub downvote_count: i64,
  pub reply_count:    i64,
  pub is_answer:      bool,
  pub is_accepted:    bool,
  pub is_deleted:     bool,
  pub created_at:     String,
  pub updated_at:     String,
}

impl RawComment {
  pub const COLUMNS: &'static str = "comment_id, post_id, author_id, \
     parent_id, body_html, body_text, has_code, has_images, upvote_count, \
     downvote_count, reply_count, is_answer, is_accepted, is_deleted, \
     created_at, updated_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      comment_id:     row.get(0)?,
      post_id:        row.get(1)?,
      author_id:      row.get(2)?,
      parent_id:      row.get(3)?,
      body_html:      row.get(4)?,
      body_text:      row.get(5)?,
      has_code:       row.get(6)?,
      has_images:     row.get(7)?,
      upvote_count:   row.get(8)?,
      downvote_count: row.get(9)?,
      reply_count:    row.get(10)?,
      is_answer:      row.get(11)?,
      is_accepted:    row.get(12)?,
      is_deleted:     row.get(13)?,
      created_at:     row.get(14)?,
      updated_at:     row.get(15)?,
    })
  }

  pub fn into_comment(self) -> Result<Comment> {
    Ok(Comment {
      comment_id:     decode_uuid(&self.comment_id)?,
      post_id:        decode_uuid(&self.post_id)?,
      author_id:      decode_uuid(&self.author_id)?,
      parent_id:      self.parent_id.as_deref().map(decode_uuid).transpose()?,
      body_html:      self.body_html,
      body_text:      self.body_text,
      has_code:       self.has_code,
      has_images:     self.has_images,
      upvote_count:   self.upvote_count,
      downvote_count: self.downvote_count,
      reply_count:    self.reply_count,
      is_answer:      self.is_answer,
      is_accepted:    self.is_accepted,
      is_deleted:     self.is_deleted,
      created_at:     decode_dt(&self.created_at)?,
      updated_at:     decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw values read directly from a `tags` row.
pub struct RawTag {
  pub tag_id:      String,
  pub name:        String,
  pub description: Option<String>,
  pub post_count:  i64,
  pub created_at:  String,
}

impl RawTag {
  pub const COLUMNS: &'static str =
    "tag_id, name, description, post_count, created_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      tag_id:      row.get(0)?,
      name:        row.get(1)?,
      description: row.get(2)?,
      post_count:  row.get(3)?,
      created_at:  row.get(4)?,
    })
  }

  pub fn into_tag(self) -> Result<Tag> {
    Ok(Tag {
      tag_id:      decode_uuid(&self.tag_id)?,
      name:        self.name,
      description: self.description,
      post_count:  self.post_count,
      created_at:  decode_dt(&self.created_at)?,
    })
  }
}
