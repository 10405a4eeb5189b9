//! Users and account-level read models.
//!
//! `karma_score`, `post_count`, and `comment_count` are denormalized ledger
//! balances maintained by the store inside the same transaction as the write
//! that moves them; they are never recomputed from history.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

/// A registered account. Not serialized directly — the API layer decides
/// which fields a given caller may see.
#[derive(Debug, Clone)]
pub struct User {
  pub user_id:         Uuid,
  pub email:           String,
  pub username:        String,
  pub display_name:    String,
  pub full_name:       Option<String>,
  pub bio:             Option<String>,
  pub avatar_url:      Option<String>,
  pub website_url:     Option<String>,
  pub location:        Option<String>,
  /// Argon2 PHC string; `None` for OAuth-only accounts.
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
  pub created_at:      DateTime<Utc>,
  pub updated_at:      DateTime<Utc>,
}

/// Input for creating an account. Uniqueness of `email`, `username`, and
/// `display_name` is enforced by the store, which reports the colliding field.
#[derive(Debug, Clone)]
pub struct NewUser {
  pub email:           String,
  pub username:        String,
  pub display_name:    String,
  pub password_hash:   Option<String>,
  pub full_name:       Option<String>,
  pub avatar_url:      Option<String>,
  pub github_id:       Option<String>,
  pub github_username: Option<String>,
  /// OAuth providers hand us verified addresses; direct signups start false.
  pub is_verified:     bool,
}

/// Explicit optional-field profile patch. `None` leaves a field unchanged;
/// for nullable text fields an empty string clears the stored value.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
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

/// Registration fields with a uniqueness constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountField {
  Username,
  Email,
  DisplayName,
}

impl AccountField {
  pub fn as_str(&self) -> &'static str {
    match self {
      AccountField::Username => "username",
      AccountField::Email => "email",
      AccountField::DisplayName => "display name",
    }
  }
}

/// Leaderboard ordering for the top-users listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TopUsersSort {
  #[default]
  Karma,
  Posts,
  Comments,
}

impl TopUsersSort {
  pub fn as_str(&self) -> &'static str {
    match self {
      TopUsersSort::Karma => "karma",
      TopUsersSort::Posts => "posts",
      TopUsersSort::Comments => "comments",
    }
  }
}

/// Aggregate account statistics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UserStats {
  pub total_users:    i64,
  pub verified_users: i64,
}

impl UserStats {
  pub fn verification_rate(&self) -> f64 {
    if self.total_users == 0 {
      0.0
    } else {
      self.verified_users as f64 / self.total_users as f64
    }
  }
}

/// Identity handed back by the GitHub OAuth callback, as much of it as the
/// provider shares.
#[derive(Debug, Clone)]
pub struct GithubProfile {
  pub github_id:  String,
  pub login:      String,
  pub name:       Option<String>,
  pub email:      Option<String>,
  pub avatar_url: Option<String>,
}
