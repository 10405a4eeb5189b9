//! In-process cache backend for Moot.
//!
//! A [`DashMap`] of byte values with per-entry expiry, implementing
//! [`moot_core::cache::CacheStore`]. Expired entries are dropped lazily on
//! read; a server task calls [`MemoryCache::purge_expired`] periodically so
//! keys that are never read again do not pin memory.
//!
//! This backend is infallible in practice; the `CacheError` paths exist so
//! callers are written against the trait's degraded mode from day one.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use moot_core::cache::{CacheError, CacheStore};
use tracing::debug;

// ─── Entry ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct Entry {
  bytes:      Vec<u8>,
  expires_at: Instant,
}

impl Entry {
  fn is_expired(&self, now: Instant) -> bool {
    now >= self.expires_at
  }
}

// ─── Cache ───────────────────────────────────────────────────────────────────

/// Thread-safe in-memory cache with TTL-bounded entries.
#[derive(Debug, Default)]
pub struct MemoryCache {
  entries: DashMap<String, Entry>,
}

impl MemoryCache {
  pub fn new() -> Self {
    Self::default()
  }

  /// Number of live (unexpired) entries.
  pub fn len(&self) -> usize {
    let now = Instant::now();
    self
      .entries
      .iter()
      .filter(|e| !e.value().is_expired(now))
      .count()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Drop every expired entry. Returns how many were removed.
  pub fn purge_expired(&self) -> usize {
    let now = Instant::now();
    let before = self.entries.len();
    self.entries.retain(|_, entry| !entry.is_expired(now));
    let removed = before - self.entries.len();
    if removed > 0 {
      debug!(removed, "purged expired cache entries");
    }
    removed
  }
}

impl CacheStore for MemoryCache {
  async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
    let now = Instant::now();
    // a ref from `get` holds the shard lock; it must drop before any removal
    let live = self
      .entries
      .get(key)
      .and_then(|entry| (!entry.is_expired(now)).then(|| entry.bytes.clone()));
    if live.is_none() {
      // re-checks expiry under the write lock, so a concurrent refresh of
      // the same key survives
      self.entries.remove_if(key, |_, entry| entry.is_expired(now));
    }
    Ok(live)
  }

  async fn set(
    &self,
    key: &str,
    value: Vec<u8>,
    ttl: Duration,
  ) -> Result<(), CacheError> {
    self.entries.insert(key.to_string(), Entry {
      bytes:      value,
      expires_at: Instant::now() + ttl,
    });
    Ok(())
  }

  async fn delete(&self, key: &str) -> Result<(), CacheError> {
    self.entries.remove(key);
    Ok(())
  }

  async fn delete_prefix(&self, prefix: &str) -> Result<(), CacheError> {
    let before = self.entries.len();
    self.entries.retain(|key, _| !key.starts_with(prefix));
    let removed = before - self.entries.len();
    if removed > 0 {
      debug!(prefix, removed, "swept cache prefix");
    }
    Ok(())
  }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use std::time::Duration;

  use moot_core::cache::ttl;

  use super::*;

  #[tokio::test]
  async fn set_get_delete() {
    let cache = MemoryCache::new();
    cache.set("k", b"v".to_vec(), ttl::SHORT).await.unwrap();
    assert_eq!(cache.get("k").await.unwrap(), Some(b"v".to_vec()));

    cache.delete("k").await.unwrap();
    assert_eq!(cache.get("k").await.unwrap(), None);
  }

  #[tokio::test]
  async fn expired_entries_read_as_misses() {
    let cache = MemoryCache::new();
    cache
      .set("gone", b"x".to_vec(), Duration::ZERO)
      .await
      .unwrap();
    assert_eq!(cache.get("gone").await.unwrap(), None);
    // the lazy-expiry path also removed the row
    assert!(cache.entries.is_empty());
  }

  #[tokio::test]
  async fn prefix_sweep_spares_other_keys() {
    let cache = MemoryCache::new();
    cache
      .set("posts:list:1", b"a".to_vec(), ttl::SHORT)
      .await
      .unwrap();
    cache
      .set("posts:list:2", b"b".to_vec(), ttl::SHORT)
      .await
      .unwrap();
    cache
      .set("post:abc", b"c".to_vec(), ttl::SHORT)
      .await
      .unwrap();

    cache.delete_prefix("posts:list:").await.unwrap();

    assert_eq!(cache.get("posts:list:1").await.unwrap(), None);
    assert_eq!(cache.get("posts:list:2").await.unwrap(), None);
    assert_eq!(cache.get("post:abc").await.unwrap(), Some(b"c".to_vec()));
  }

  #[tokio::test]
  async fn purge_drops_only_expired() {
    let cache = MemoryCache::new();
    cache
      .set("old", b"x".to_vec(), Duration::ZERO)
      .await
      .unwrap();
    cache.set("new", b"y".to_vec(), ttl::LONG).await.unwrap();

    assert_eq!(cache.purge_expired(), 1);
    assert_eq!(cache.get("new").await.unwrap(), Some(b"y".to_vec()));
    assert_eq!(cache.len(), 1);
  }

  #[tokio::test]
  async fn overwrite_refreshes_value_and_ttl() {
    let cache = MemoryCache::new();
    cache
      .set("k", b"stale".to_vec(), Duration::ZERO)
      .await
      .unwrap();
    cache.set("k", b"fresh".to_vec(), ttl::MEDIUM).await.unwrap();
    assert_eq!(cache.get("k").await.unwrap(), Some(b"fresh".to_vec()));
  }
}
