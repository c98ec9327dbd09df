//! Local persistent key-value cache.
//!
//! The cache holds the last known-good record set under a single key so the
//! store can keep working while the remote is unreachable. It is a mirror,
//! never the source of truth.

mod memory;
mod sqlite;

pub use memory::MemoryCache;
pub use sqlite::SqliteCache;

use crate::models::{dedupe_by_id, Owner};
use crate::Result;

/// Key under which the owner list is cached.
pub const DEFAULT_CACHE_KEY: &str = "lioreStoryOwners";

/// Synchronous string-keyed storage.
pub trait LocalCache {
    /// Read the value stored under `key`
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove `key` if present
    fn remove(&self, key: &str) -> Result<()>;
}

/// A record set serialized as JSON under one cache key.
///
/// Every cache failure is logged and absorbed here: unreadable or corrupt
/// content reads as an empty set, and writes report `false`.
pub struct RecordCache<C> {
    cache: C,
    key: String,
}

impl<C: LocalCache> RecordCache<C> {
    pub fn new(cache: C, key: impl Into<String>) -> Self {
        Self {
            cache,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub const fn inner(&self) -> &C {
        &self.cache
    }

    /// Load the cached record set, or an empty one.
    pub fn read(&self) -> Vec<Owner> {
        match self.try_read() {
            Ok(Some(records)) => {
                tracing::debug!(count = records.len(), key = %self.key, "Loaded owners from local cache");
                records
            }
            Ok(None) => {
                tracing::debug!(key = %self.key, "No owners in local cache");
                Vec::new()
            }
            Err(error) => {
                tracing::warn!(key = %self.key, "Ignoring unreadable local cache: {error}");
                Vec::new()
            }
        }
    }

    fn try_read(&self) -> Result<Option<Vec<Owner>>> {
        let Some(raw) = self.cache.get(&self.key)? else {
            return Ok(None);
        };
        let records = serde_json::from_str::<Vec<Owner>>(&raw)?;
        Ok(Some(dedupe_by_id(records)))
    }

    /// Overwrite the cached record set. Returns whether the write stuck.
    pub fn write(&self, records: &[Owner]) -> bool {
        let result = serde_json::to_string(records)
            .map_err(crate::Error::from)
            .and_then(|raw| self.cache.set(&self.key, &raw));

        match result {
            Ok(()) => {
                tracing::debug!(count = records.len(), key = %self.key, "Saved owners to local cache");
                true
            }
            Err(error) => {
                tracing::warn!(key = %self.key, "Failed to write local cache: {error}");
                false
            }
        }
    }

    /// Drop the cached record set.
    pub fn clear(&self) -> bool {
        match self.cache.remove(&self.key) {
            Ok(()) => true,
            Err(error) => {
                tracing::warn!(key = %self.key, "Failed to clear local cache: {error}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn read_empty_cache_yields_empty_set() {
        let records = RecordCache::new(MemoryCache::new(), DEFAULT_CACHE_KEY);
        assert!(records.read().is_empty());
    }

    #[test]
    fn write_then_read_returns_same_owners() {
        let records = RecordCache::new(MemoryCache::new(), DEFAULT_CACHE_KEY);
        let owners = vec![
            Owner::new("Aria", "2024-01-01").with_field("stories", 2),
            Owner::new("Bram", "2024-01-02"),
        ];

        assert!(records.write(&owners));
        assert_eq!(records.read(), owners);
    }

    #[test]
    fn corrupt_content_reads_as_empty() {
        let cache = MemoryCache::new();
        cache.set(DEFAULT_CACHE_KEY, "{not json").unwrap();

        let records = RecordCache::new(cache, DEFAULT_CACHE_KEY);
        assert!(records.read().is_empty());
    }

    #[test]
    fn quota_failure_reports_false_and_keeps_previous_value() {
        let cache = MemoryCache::with_quota(256);
        let records = RecordCache::new(cache, DEFAULT_CACHE_KEY);
        let small = vec![Owner::new("Aria", "2024-01-01")];
        assert!(records.write(&small));

        let large: Vec<_> = (0..20)
            .map(|i| Owner::new(format!("Owner {i}"), "2024-01-01"))
            .collect();
        assert!(!records.write(&large));
        assert_eq!(records.read(), small);
    }

    #[test]
    fn clear_removes_cached_set() {
        let records = RecordCache::new(MemoryCache::new(), "owners");
        records.write(&[Owner::new("Aria", "2024-01-01")]);

        assert!(records.clear());
        assert!(records.read().is_empty());
    }
}
