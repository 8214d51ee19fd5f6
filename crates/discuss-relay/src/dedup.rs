//! Time-bound presence markers used to answer each multipart SMS only once.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use discuss_core::Channel;
use thiserror::Error;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Error)]
pub enum CacheError {
    /// The backing store could not be reached or refused the operation.
    #[error("cache unavailable: {0}")]
    Unavailable(String),
}

/// Key/value store with per-entry expiry.
///
/// The relay only checks presence; values are opaque markers.
#[async_trait]
pub trait DedupCache: Send + Sync {
    /// Value stored under `key`, or `None` if absent or expired.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Store `value` under `key` for `ttl`.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;
}

/// Identifies one multipart SMS conversation: `{channel}.multipart.{from}:{to}:{reference}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey(String);

impl DedupKey {
    pub fn multipart(channel: Channel, from: &str, to: &str, reference: &str) -> Self {
        Self(format!("{}.multipart.{}:{}:{}", channel, from, to, reference))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DedupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

struct Entry {
    value: String,
    expires_at: Instant,
}

/// In-process [`DedupCache`] backed by a concurrent map.
///
/// Expired entries are dropped lazily on read and in bulk by
/// [`purge_expired`](Self::purge_expired).
#[derive(Default)]
pub struct MemoryDedupCache {
    entries: DashMap<String, Entry>,
}

impl MemoryDedupCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove every expired entry; returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        let purged = before.saturating_sub(self.entries.len());
        if purged > 0 {
            debug!(purged, "purged expired dedup entries");
        }
        purged
    }

    /// Number of live and not-yet-purged entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl DedupCache for MemoryDedupCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            if entry.expires_at > now {
                return Ok(Some(entry.value.clone()));
            }
        }
        // guard dropped above; the remove must not hold a shard lock
        self.entries.remove_if(key, |_, entry| entry.expires_at <= now);
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        self.entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }
}
