//! In-process cache backend

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::LocalCache;
use crate::{Error, Result};

/// Shared in-memory key-value cache.
///
/// Clones share the same slots, which mirrors how every page of one browser
/// profile sees the same local storage. An optional byte quota makes writes
/// fail the way a full browser store does.
#[derive(Debug, Clone, Default)]
pub struct MemoryCache {
    slots: Arc<Mutex<HashMap<String, String>>>,
    quota_bytes: Option<usize>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache that rejects writes once keys plus values exceed `quota_bytes`
    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            slots: Arc::default(),
            quota_bytes: Some(quota_bytes),
        }
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl LocalCache for MemoryCache {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.slots().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut slots = self.slots();
        if let Some(quota) = self.quota_bytes {
            let others: usize = slots
                .iter()
                .filter(|(existing, _)| existing.as_str() != key)
                .map(|(existing, stored)| existing.len() + stored.len())
                .sum();
            if others + key.len() + value.len() > quota {
                return Err(Error::Cache(format!(
                    "quota of {quota} bytes exceeded writing '{key}'"
                )));
            }
        }
        slots.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.slots().remove(key);
        Ok(())
    }
}
