//! Read-through caching and sweep-style invalidation for handlers.
//!
//! The cache is never authoritative. Read failures count as misses, write
//! and sweep failures are logged and swallowed, so a dead cache degrades
//! every endpoint to fresh store reads instead of errors.

use std::{future::Future, time::Duration};

use moot_core::cache::{CacheStore, Invalidation, Mutation, invalidations};
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, warn};

use crate::error::ApiError;

/// Serve `key` from the cache when possible, otherwise run `fetch` and store
/// its result under `key` with `ttl`.
///
/// Errors from `fetch` propagate uncached, so a 404 or 403 is never pinned
/// into the cache.
pub async fn lookup<C, T, F, Fut>(
  cache: &C,
  key: &str,
  ttl: Duration,
  fetch: F,
) -> Result<T, ApiError>
where
  C: CacheStore,
  T: Serialize + DeserializeOwned,
  F: FnOnce() -> Fut,
  Fut: Future<Output = Result<T, ApiError>>,
{
  match cache.get(key).await {
    Ok(Some(bytes)) => match serde_json::from_slice(&bytes) {
      Ok(hit) => return Ok(hit),
      Err(err) => debug!(key, error = %err, "cached entry undecodable, refetching"),
    },
    Ok(None) => {}
    Err(err) => warn!(key, error = %err, "cache read failed, treating as miss"),
  }

  let fresh = fetch().await?;

  match serde_json::to_vec(&fresh) {
    Ok(bytes) => {
      if let Err(err) = cache.set(key, bytes, ttl).await {
        warn!(key, error = %err, "cache write failed");
      }
    }
    Err(err) => debug!(key, error = %err, "response not serializable, not cached"),
  }
  Ok(fresh)
}

/// Drop every cache entry the rule table says `mutation` may have staled.
pub async fn sweep<C: CacheStore>(cache: &C, mutation: &Mutation<'_>) {
  for entry in invalidations(mutation) {
    let outcome = match &entry {
      Invalidation::Key(key) => cache.delete(key).await,
      Invalidation::Prefix(prefix) => cache.delete_prefix(prefix).await,
    };
    if let Err(err) = outcome {
      warn!(?entry, error = %err, "cache invalidation failed");
    }
  }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::{AtomicUsize, Ordering};

  use moot_cache::MemoryCache;
  use moot_core::cache::CacheError;

  use super::*;

  struct DeadCache;

  impl CacheStore for DeadCache {
    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, CacheError> {
      Err(CacheError("gone".to_owned()))
    }

    async fn set(
      &self,
      _key: &str,
      _value: Vec<u8>,
      _ttl: Duration,
    ) -> Result<(), CacheError> {
      Err(CacheError("gone".to_owned()))
    }

    async fn delete(&self, _key: &str) -> Result<(), CacheError> {
      Err(CacheError("gone".to_owned()))
    }

    async fn delete_prefix(&self, _prefix: &str) -> Result<(), CacheError> {
      Err(CacheError("gone".to_owned()))
    }
  }

  #[tokio::test]
  async fn second_lookup_is_served_from_cache() {
    let cache = MemoryCache::new();
    let calls = AtomicUsize::new(0);

    for _ in 0..2 {
      let value: u32 = lookup(&cache, "answer", Duration::from_secs(60), || async {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(42)
      })
      .await
      .unwrap();
      assert_eq!(value, 42);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn fetch_errors_are_not_cached() {
    let cache = MemoryCache::new();

    let failed: Result<u32, _> =
      lookup(&cache, "answer", Duration::from_secs(60), || async {
        Err(ApiError::NotFound("nothing here".to_owned()))
      })
      .await;
    assert!(failed.is_err());

    let value: u32 = lookup(&cache, "answer", Duration::from_secs(60), || async {
      Ok(42)
    })
    .await
    .unwrap();
    assert_eq!(value, 42);
  }

  #[tokio::test]
  async fn dead_cache_degrades_to_fetch() {
    let value: u32 = lookup(&DeadCache, "answer", Duration::from_secs(60), || async {
      Ok(42)
    })
    .await
    .unwrap();
    assert_eq!(value, 42);

    // sweeps must not fail either
    sweep(&DeadCache, &Mutation::PostCreated {
      author_display_name: "someone",
    })
    .await;
  }
}
