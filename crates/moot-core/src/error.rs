//! Error types for `moot-core`.
//!
//! One taxonomy shared by every crate: domain failures are decided inside
//! store transactions, so the store trait must surface them with their
//! identity intact rather than behind an opaque backend error.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("post not found: {0}")]
  PostNotFound(Uuid),

  #[error("comment not found: {0}")]
  CommentNotFound(Uuid),

  #[error("user not found: {0}")]
  UserNotFound(String),

  #[error("forbidden: {0}")]
  Forbidden(String),

  #[error("invalid operation: {0}")]
  InvalidOperation(String),

  /// A uniqueness constraint surfaced (duplicate registration field, or a
  /// vote-row collision that the state machine should have prevented).
  #[error("conflict: {0}")]
  Conflict(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),

  /// Backend fault. The transaction it came from is already rolled back.
  #[error("storage error: {0}")]
  Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  pub fn storage(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Storage(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
