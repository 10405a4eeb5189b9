//! Cache contract, key schema, and the invalidation rule table.
//!
//! The cache is a sidecar: never authoritative, and tolerated-absent. The
//! only error an implementation can raise means "unavailable", and every
//! caller treats that identically to a miss. Invalidation is sweep-style —
//! delete exact keys for entity views, delete by prefix for list views — and
//! never recomputes anything eagerly.

use std::{future::Future, time::Duration};

use thiserror::Error;
use uuid::Uuid;

// ─── Contract ────────────────────────────────────────────────────────────────

/// The cache backend is unreachable or refused the operation.
#[derive(Debug, Error)]
#[error("cache unavailable: {0}")]
pub struct CacheError(pub String);

/// An ordinary key-value expiring cache.
///
/// Implementations hold serialized response bytes; they know nothing about
/// what the bytes mean.
pub trait CacheStore: Send + Sync {
  fn get<'a>(
    &'a self,
    key: &'a str,
  ) -> impl Future<Output = Result<Option<Vec<u8>>, CacheError>> + Send + 'a;

  fn set<'a>(
    &'a self,
    key: &'a str,
    value: Vec<u8>,
    ttl: Duration,
  ) -> impl Future<Output = Result<(), CacheError>> + Send + 'a;

  fn delete<'a>(
    &'a self,
    key: &'a str,
  ) -> impl Future<Output = Result<(), CacheError>> + Send + 'a;

  /// Delete every key starting with `prefix`.
  fn delete_prefix<'a>(
    &'a self,
    prefix: &'a str,
  ) -> impl Future<Output = Result<(), CacheError>> + Send + 'a;
}

/// TTL tiers by data volatility.
pub mod ttl {
  use std::time::Duration;

  /// Availability checks, stats, search results, single posts, threads.
  pub const SHORT: Duration = Duration::from_secs(5 * 60);
  /// Post lists, leaderboards, public profiles.
  pub const MEDIUM: Duration = Duration::from_secs(10 * 60);
  /// Near-static data — tag lists.
  pub const LONG: Duration = Duration::from_secs(30 * 60);
  /// OAuth CSRF state tokens live at most one login flow.
  pub const OAUTH_STATE: Duration = Duration::from_secs(10 * 60);
}

// ─── Key schema ──────────────────────────────────────────────────────────────

/// Every cache key in the system is built here, so the rule table below and
/// the read paths can never drift apart on spelling.
pub mod keys {
  use uuid::Uuid;

  use crate::store::PostQuery;

  pub const POSTS_LIST_PREFIX: &str = "posts:list:";
  pub const TAGS_PREFIX: &str = "posts:tags:";
  pub const USERS_SEARCH_PREFIX: &str = "users:search:";
  pub const USERS_TOP_PREFIX: &str = "users:top:";
  pub const USERS_STATS: &str = "users:stats";

  pub fn post(post_id: Uuid) -> String {
    format!("post:{post_id}")
  }

  pub fn post_comments(post_id: Uuid, sort: &str) -> String {
    format!("post:{post_id}:comments:{sort}")
  }

  pub fn post_comments_prefix(post_id: Uuid) -> String {
    format!("post:{post_id}:comments:")
  }

  pub fn posts_list(query: &PostQuery) -> String {
    format!(
      "{}{}:{}:{}:{}:{}:{}:{}",
      POSTS_LIST_PREFIX,
      query.page,
      query.page_size,
      query.sort.as_str(),
      query.post_type.map(|t| t.as_str()).unwrap_or(""),
      query.tag.as_deref().unwrap_or(""),
      query.author.as_deref().unwrap_or(""),
      query.search.as_deref().unwrap_or(""),
    )
  }

  pub fn tags(search: Option<&str>, limit: u32) -> String {
    format!("{}{}:{}", TAGS_PREFIX, search.unwrap_or(""), limit)
  }

  pub fn user_profile(display_name: &str) -> String {
    format!("user:profile:{display_name}")
  }

  pub fn user_comments(display_name: &str, limit: u32, offset: u32) -> String {
    format!("user:comments:{display_name}:{limit}:{offset}")
  }

  pub fn user_comments_prefix(display_name: &str) -> String {
    format!("user:comments:{display_name}:")
  }

  pub fn users_search(q: &str, limit: u32, offset: u32) -> String {
    format!("{USERS_SEARCH_PREFIX}{q}:{limit}:{offset}")
  }

  pub fn users_top(sort: &str, limit: u32) -> String {
    format!("{USERS_TOP_PREFIX}{sort}:{limit}")
  }

  pub fn username_available(username: &str) -> String {
    format!("auth:username:{username}")
  }

  pub fn email_available(email: &str) -> String {
    format!("auth:email:{email}")
  }

  pub fn display_name_available(display_name: &str) -> String {
    format!("auth:display_name:{display_name}")
  }

  pub fn oauth_state(token: &str) -> String {
    format!("oauth:state:{token}")
  }
}

// ─── Invalidation rule table ─────────────────────────────────────────────────

/// One entry in an invalidation sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invalidation {
  Key(String),
  Prefix(String),
}

/// A committed write, described just precisely enough to drive the sweep.
#[derive(Debug, Clone)]
pub enum Mutation<'a> {
  PostCreated {
    author_display_name: &'a str,
  },
  CommentCreated {
    post_id:             Uuid,
    author_display_name: &'a str,
  },
  PostVoted {
    post_id:                  Uuid,
    post_author_display_name: &'a str,
  },
  CommentVoted {
    post_id:                     Uuid,
    comment_author_display_name: &'a str,
  },
  AnswerAccepted {
    post_id:                 Uuid,
    comment_author:          &'a str,
    /// Set on a transfer: the author who lost the bonus.
    previous_comment_author: Option<&'a str>,
  },
  ProfileUpdated {
    old_display_name: &'a str,
  },
  UserRegistered {
    username:     &'a str,
    email:        &'a str,
    display_name: &'a str,
  },
}

/// The rule table: which keys can be stale after `mutation` committed.
///
/// Callers run the sweep after commit, best-effort; a failed sweep is logged
/// and swallowed, never propagated.
pub fn invalidations(mutation: &Mutation) -> Vec<Invalidation> {
  use Invalidation::{Key, Prefix};

  match mutation {
    Mutation::PostCreated { author_display_name } => vec![
      Key(keys::user_profile(author_display_name)),
      Prefix(keys::POSTS_LIST_PREFIX.to_string()),
      Prefix(keys::TAGS_PREFIX.to_string()),
      Prefix(keys::USERS_TOP_PREFIX.to_string()),
    ],
    Mutation::CommentCreated { post_id, author_display_name } => vec![
      Key(keys::post(*post_id)),
      Key(keys::user_profile(author_display_name)),
      Prefix(keys::post_comments_prefix(*post_id)),
      Prefix(keys::POSTS_LIST_PREFIX.to_string()),
      Prefix(keys::user_comments_prefix(author_display_name)),
    ],
    Mutation::PostVoted { post_id, post_author_display_name } => vec![
      Key(keys::post(*post_id)),
      Key(keys::user_profile(post_author_display_name)),
      Prefix(keys::POSTS_LIST_PREFIX.to_string()),
      Prefix(keys::USERS_TOP_PREFIX.to_string()),
    ],
    Mutation::CommentVoted { post_id, comment_author_display_name } => vec![
      Key(keys::user_profile(comment_author_display_name)),
      Prefix(keys::post_comments_prefix(*post_id)),
      Prefix(keys::USERS_TOP_PREFIX.to_string()),
    ],
    Mutation::AnswerAccepted { post_id, comment_author, previous_comment_author } => {
      let mut out = vec![
        Key(keys::post(*post_id)),
        Key(keys::user_profile(comment_author)),
        Prefix(keys::post_comments_prefix(*post_id)),
        Prefix(keys::USERS_TOP_PREFIX.to_string()),
      ];
      if let Some(prev) = previous_comment_author {
        out.push(Key(keys::user_profile(prev)));
      }
      out
    }
    Mutation::ProfileUpdated { old_display_name } => vec![
      Key(keys::user_profile(old_display_name)),
      Prefix(keys::user_comments_prefix(old_display_name)),
      Prefix(keys::USERS_SEARCH_PREFIX.to_string()),
      Prefix(keys::USERS_TOP_PREFIX.to_string()),
    ],
    Mutation::UserRegistered { username, email, display_name } => vec![
      Key(keys::username_available(username)),
      Key(keys::email_available(email)),
      Key(keys::display_name_available(display_name)),
      Key(keys::USERS_STATS.to_string()),
      Prefix(keys::USERS_SEARCH_PREFIX.to_string()),
      Prefix(keys::USERS_TOP_PREFIX.to_string()),
    ],
  }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  fn has_key(set: &[Invalidation], key: &str) -> bool {
    set.iter().any(|i| matches!(i, Invalidation::Key(k) if k == key))
  }

  fn has_prefix(set: &[Invalidation], prefix: &str) -> bool {
    set.iter().any(|i| matches!(i, Invalidation::Prefix(p) if p == prefix))
  }

  #[test]
  fn post_created_sweeps_lists_tags_profile_and_leaderboard() {
    let set = invalidations(&Mutation::PostCreated { author_display_name: "ada" });
    assert!(has_key(&set, "user:profile:ada"));
    assert!(has_prefix(&set, "posts:list:"));
    assert!(has_prefix(&set, "posts:tags:"));
    assert!(has_prefix(&set, "users:top:"));
    assert_eq!(set.len(), 4);
  }

  #[test]
  fn comment_created_sweeps_post_thread_and_lists() {
    let post_id = Uuid::new_v4();
    let set = invalidations(&Mutation::CommentCreated {
      post_id,
      author_display_name: "ada",
    });
    assert!(has_key(&set, &format!("post:{post_id}")));
    assert!(has_key(&set, "user:profile:ada"));
    assert!(has_prefix(&set, &format!("post:{post_id}:comments:")));
    assert!(has_prefix(&set, "posts:list:"));
    assert!(has_prefix(&set, "user:comments:ada:"));
    assert_eq!(set.len(), 5);
  }

  #[test]
  fn post_vote_sweeps_post_author_profile_and_lists() {
    let post_id = Uuid::new_v4();
    let set = invalidations(&Mutation::PostVoted {
      post_id,
      post_author_display_name: "ada",
    });
    assert!(has_key(&set, &format!("post:{post_id}")));
    assert!(has_key(&set, "user:profile:ada"));
    assert!(has_prefix(&set, "posts:list:"));
    assert!(has_prefix(&set, "users:top:"));
    assert_eq!(set.len(), 4);
  }

  #[test]
  fn comment_vote_does_not_touch_the_post_view() {
    let post_id = Uuid::new_v4();
    let set = invalidations(&Mutation::CommentVoted {
      post_id,
      comment_author_display_name: "bob",
    });
    assert!(!has_key(&set, &format!("post:{post_id}")));
    assert!(has_key(&set, "user:profile:bob"));
    assert!(has_prefix(&set, &format!("post:{post_id}:comments:")));
    assert!(has_prefix(&set, "users:top:"));
    assert_eq!(set.len(), 3);
  }

  #[test]
  fn accept_transfer_sweeps_both_authors() {
    let post_id = Uuid::new_v4();
    let set = invalidations(&Mutation::AnswerAccepted {
      post_id,
      comment_author:          "winner",
      previous_comment_author: Some("runner-up"),
    });
    assert!(has_key(&set, "user:profile:winner"));
    assert!(has_key(&set, "user:profile:runner-up"));
    assert!(has_key(&set, &format!("post:{post_id}")));
    assert!(has_prefix(&set, &format!("post:{post_id}:comments:")));
    assert!(has_prefix(&set, "users:top:"));
    assert_eq!(set.len(), 5);
  }

  #[test]
  fn profile_update_sweeps_old_name() {
    let set = invalidations(&Mutation::ProfileUpdated { old_display_name: "old-ada" });
    assert!(has_key(&set, "user:profile:old-ada"));
    assert!(has_prefix(&set, "user:comments:old-ada:"));
    assert!(has_prefix(&set, "users:search:"));
    assert!(has_prefix(&set, "users:top:"));
    assert_eq!(set.len(), 4);
  }

  #[test]
  fn registration_sweeps_availability_and_stats() {
    let set = invalidations(&Mutation::UserRegistered {
      username:     "ada",
      email:        "ada@example.com",
      display_name: "Ada",
    });
    assert!(has_key(&set, "auth:username:ada"));
    assert!(has_key(&set, "auth:email:ada@example.com"));
    assert!(has_key(&set, "auth:display_name:Ada"));
    assert!(has_key(&set, "users:stats"));
    assert!(has_prefix(&set, "users:search:"));
    assert!(has_prefix(&set, "users:top:"));
    assert_eq!(set.len(), 6);
  }

  #[test]
  fn list_key_embeds_every_query_dimension() {
    use crate::post::{PostSort, PostType};
    use crate::store::PostQuery;
    let query = PostQuery {
      page:      2,
      page_size: 20,
      sort:      PostSort::MostVoted,
      post_type: Some(PostType::Question),
      tag:       Some("rust".to_string()),
      author:    None,
      search:    Some("borrow checker".to_string()),
    };
    assert_eq!(
      keys::posts_list(&query),
      "posts:list:2:20:most_voted:question:rust::borrow checker"
    );
  }
}
