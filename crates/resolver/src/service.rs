//! Lookup orchestration
//!
//! Forward conversion is a pure codec call and never touches cache or
//! store. Reverse lookups go cache first, then one store query per shard,
//! and every candidate row is re-verified by recomputing the full
//! fingerprint: the stored search key is a prefix filter, not a final
//! match.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

use crate::cache::{CacheOutcome, LookupCache};
use crate::codec::{Fingerprint, GuidCodec, ShardKey};
use crate::error::ResolverError;
use crate::store::{IndexRow, ReverseIndexStore};

pub struct LookupService {
    store: Arc<ReverseIndexStore>,
    cache: Arc<LookupCache>,
    codec: GuidCodec,
    search_key_len: usize,
    sequence_offset: u64,
}

impl LookupService {
    pub fn new(
        store: Arc<ReverseIndexStore>,
        cache: Arc<LookupCache>,
        codec: GuidCodec,
        search_key_len: usize,
        sequence_offset: u64,
    ) -> Self {
        Self {
            store,
            cache,
            codec,
            search_key_len,
            sequence_offset,
        }
    }

    /// Converts an identifier to its fingerprint.
    pub fn forward(&self, id: u64) -> String {
        self.codec.fingerprint(id)
    }

    /// Converts multiple identifiers to fingerprints.
    pub fn forward_many(&self, ids: &[u64]) -> HashMap<u64, String> {
        ids.iter().map(|&id| (id, self.forward(id))).collect()
    }

    /// Reverse-lookup of a single fingerprint.
    ///
    /// Returns `Ok(None)` when the fingerprint is well-formed but not in
    /// the generated range; malformed input is an `InvalidFingerprint`
    /// error.
    pub async fn lookup_one(&self, raw: &str) -> Result<Option<u64>, ResolverError> {
        let fingerprint = Fingerprint::parse(raw)?;

        match self.cache.find(fingerprint.as_str()).await {
            CacheOutcome::Hit(id) => return Ok(Some(id)),
            CacheOutcome::NegativeHit => return Ok(None),
            CacheOutcome::Miss => {}
        }

        let candidates = self
            .store
            .lookup_batch(
                fingerprint.shard(),
                &[fingerprint.search_key(self.search_key_len)],
            )
            .await?;
        Ok(self.resolve_candidates(&fingerprint, &candidates).await)
    }

    /// Reverse-lookup of a batch of fingerprints.
    ///
    /// The result map is keyed by the lowercase-normalized input. Malformed
    /// inputs map to `None`; cache hits are resolved without store access;
    /// the remainder is grouped by shard so a batch of N fingerprints
    /// issues at most 16 store round trips.
    pub async fn lookup_many(
        &self,
        raws: &[String],
    ) -> Result<HashMap<String, Option<u64>>, ResolverError> {
        let mut result: HashMap<String, Option<u64>> = HashMap::new();
        let mut pending: HashMap<ShardKey, Vec<Fingerprint>> = HashMap::new();
        let mut queued: HashSet<String> = HashSet::new();

        for raw in raws {
            let normalized = raw.to_ascii_lowercase();
            if result.contains_key(&normalized) || queued.contains(&normalized) {
                continue;
            }
            let fingerprint = match Fingerprint::parse(&normalized) {
                Ok(fp) => fp,
                Err(_) => {
                    result.insert(normalized, None);
                    continue;
                }
            };
            match self.cache.find(fingerprint.as_str()).await {
                CacheOutcome::Hit(id) => {
                    result.insert(fingerprint.into_string(), Some(id));
                }
                CacheOutcome::NegativeHit => {
                    result.insert(fingerprint.into_string(), None);
                }
                CacheOutcome::Miss => {
                    queued.insert(fingerprint.as_str().to_string());
                    pending.entry(fingerprint.shard()).or_default().push(fingerprint);
                }
            }
        }

        if pending.is_empty() {
            return Ok(result);
        }
        debug!(
            shards = pending.len(),
            fingerprints = queued.len(),
            "batch lookup fell through to the store"
        );

        for (shard, fingerprints) in pending {
            let keys: Vec<&str> = fingerprints
                .iter()
                .map(|fp| fp.search_key(self.search_key_len))
                .collect();
            let candidates = self.store.lookup_batch(shard, &keys).await?;
            // Each fingerprint is resolved against the shard's full
            // candidate set; re-verification filters out prefix-only
            // matches belonging to other requests.
            for fingerprint in &fingerprints {
                let outcome = self.resolve_candidates(fingerprint, &candidates).await;
                result.insert(fingerprint.as_str().to_string(), outcome);
            }
        }

        Ok(result)
    }

    /// Scans candidate rows for one whose recomputed fingerprint equals the
    /// input, records the outcome in the cache, and returns it.
    async fn resolve_candidates(
        &self,
        fingerprint: &Fingerprint,
        candidates: &[IndexRow],
    ) -> Option<u64> {
        for candidate in candidates {
            let id = self.sequence_offset + candidate.sequence;
            if self.codec.fingerprint(id) == fingerprint.as_str() {
                self.cache.record(fingerprint.as_str(), Some(id)).await;
                return Some(id);
            }
        }
        self.cache.record(fingerprint.as_str(), None).await;
        None
    }
}
