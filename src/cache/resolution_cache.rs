use super::{CacheEntry, DEFAULT_NEGATIVE_TTL, DEFAULT_POSITIVE_CAPACITY, DEFAULT_POSITIVE_TTL};
use crate::resolver::ResolvedDescriptor;
use lru::LruCache;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub positive_count: usize,
    pub negative_count: usize,
}

/// Process-wide store of resolved descriptors and recent failures.
///
/// Positive entries are keyed by fingerprint and bounded by an LRU capacity.
/// Negative markers are keyed by the raw source URL. Each store sits behind its
/// own lock, and a lookup performs its TTL check while holding it.
pub struct ResolutionCache {
    positive: Mutex<LruCache<String, CacheEntry<Arc<ResolvedDescriptor>>>>,
    negative: Mutex<HashMap<String, Instant>>,
    positive_ttl: Duration,
    negative_ttl: Duration,
}

impl ResolutionCache {
    pub fn new(capacity: usize, positive_ttl: Duration, negative_ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            positive: Mutex::new(LruCache::new(capacity)),
            negative: Mutex::new(HashMap::new()),
            positive_ttl,
            negative_ttl,
        }
    }

    pub fn positive_ttl(&self) -> Duration {
        self.positive_ttl
    }

    pub fn negative_ttl(&self) -> Duration {
        self.negative_ttl
    }

    pub fn get_positive(&self, fingerprint: &str) -> Option<Arc<ResolvedDescriptor>> {
        let mut store = self.positive.lock();
        let entry = store.get(fingerprint)?;
        if entry.is_fresh(self.positive_ttl, Instant::now()) {
            return Some(entry.value.clone());
        }
        store.pop(fingerprint);
        None
    }

    pub fn put_positive(&self, fingerprint: String, descriptor: Arc<ResolvedDescriptor>) {
        self.positive
            .lock()
            .put(fingerprint, CacheEntry::new(descriptor));
    }

    pub fn is_negatively_marked(&self, source_url: &str) -> bool {
        let mut store = self.negative.lock();
        match store.get(source_url) {
            Some(marked_at)
                if Instant::now().saturating_duration_since(*marked_at) < self.negative_ttl =>
            {
                true
            }
            Some(_) => {
                store.remove(source_url);
                false
            }
            None => false,
        }
    }

    pub fn mark_negative(&self, source_url: &str) {
        self.negative
            .lock()
            .insert(source_url.to_string(), Instant::now());
    }

    pub fn clear(&self) {
        self.positive.lock().clear();
        self.negative.lock().clear();
    }

    /// Counts live entries; expired ones still awaiting eviction are skipped.
    pub fn stats(&self) -> CacheStats {
        let now = Instant::now();
        let positive_count = self
            .positive
            .lock()
            .iter()
            .filter(|(_, entry)| entry.is_fresh(self.positive_ttl, now))
            .count();
        let negative_count = self
            .negative
            .lock()
            .values()
            .filter(|marked_at| now.saturating_duration_since(**marked_at) < self.negative_ttl)
            .count();
        CacheStats {
            positive_count,
            negative_count,
        }
    }

    /// Evicts every expired entry from both stores and returns how many were dropped.
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;

        {
            let mut store = self.positive.lock();
            let expired: Vec<String> = store
                .iter()
                .filter(|(_, entry)| !entry.is_fresh(self.positive_ttl, now))
                .map(|(key, _)| key.clone())
                .collect();
            for key in expired {
                store.pop(&key);
                removed += 1;
            }
        }

        let mut negative = self.negative.lock();
        let before = negative.len();
        negative.retain(|_, marked_at| now.saturating_duration_since(*marked_at) < self.negative_ttl);
        removed + (before - negative.len())
    }
}

impl Default for ResolutionCache {
    fn default() -> Self {
        Self::new(
            DEFAULT_POSITIVE_CAPACITY,
            DEFAULT_POSITIVE_TTL,
            DEFAULT_NEGATIVE_TTL,
        )
    }
}
