//! In-memory memoization of reverse-lookup results
//!
//! Positive entries are permanent truth: the forward transform is
//! deterministic, so a found match never becomes invalid. Negative entries
//! are provisional ("not found as of the last query") and are dropped en
//! masse after every successful generation run, because that is the only
//! way the index grows.

use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

/// Outcome of a cache probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    /// A cached positive: the identifier for this fingerprint.
    Hit(u64),
    /// A cached negative, valid only until the next generation run.
    NegativeHit,
    /// No entry; the store must be consulted.
    Miss,
}

#[derive(Debug, Clone, Copy)]
enum CacheEntry {
    Present(u64),
    Absent,
}

#[derive(Debug, Default)]
pub struct LookupCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl LookupCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn find(&self, fingerprint: &str) -> CacheOutcome {
        match self.entries.read().await.get(fingerprint) {
            Some(CacheEntry::Present(id)) => CacheOutcome::Hit(*id),
            Some(CacheEntry::Absent) => CacheOutcome::NegativeHit,
            None => CacheOutcome::Miss,
        }
    }

    pub async fn record(&self, fingerprint: &str, id: Option<u64>) {
        let entry = match id {
            Some(id) => CacheEntry::Present(id),
            None => CacheEntry::Absent,
        };
        self.entries
            .write()
            .await
            .insert(fingerprint.to_string(), entry);
    }

    /// Removes every negative entry and returns how many were dropped.
    ///
    /// Called exactly once per successful generation run. A negative
    /// recorded while that run was in flight is dropped too, even though it
    /// may already have been resolvable; a stale false negative self-heals
    /// on the next cycle.
    pub async fn invalidate_negatives(&self) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| matches!(entry, CacheEntry::Present(_)));
        let dropped = before - entries.len();
        if dropped > 0 {
            debug!(dropped, "invalidated provisional negative cache entries");
        }
        dropped
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
