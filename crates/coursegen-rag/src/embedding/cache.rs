//! Content-hash embedding cache
//!
//! Keys are (model version, SHA-256 of the whitespace-normalized text).
//! Entries never expire; switching model version clears the whole cache.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// Cache key for one embedded text
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub model_version: String,
    pub text_hash: String,
}

impl CacheKey {
    pub fn new(model_version: &str, text: &str) -> Self {
        let normalized = normalize_text(text);
        Self {
            model_version: model_version.to_string(),
            text_hash: format!("{:x}", Sha256::digest(normalized.as_bytes())),
        }
    }
}

/// Trim and collapse internal whitespace
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Snapshot of cache counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

type Slot = watch::Receiver<Option<Arc<Vec<f32>>>>;
type InFlight = DashMap<CacheKey, Slot>;

/// Result of claiming a key before embedding its text
pub enum Claim {
    /// Vector already cached
    Cached(Arc<Vec<f32>>),
    /// The caller owns the fetch and must hand the vector to [`EmbeddingCache::complete`]
    Fetch(FetchLease),
    /// Another caller is fetching this key
    Wait(PendingVector),
}

/// Exclusive right to fetch one key
///
/// Dropping the lease without completing it releases the key and wakes any
/// waiters empty-handed.
pub struct FetchLease {
    key: CacheKey,
    sender: watch::Sender<Option<Arc<Vec<f32>>>>,
    in_flight: Arc<InFlight>,
}

impl FetchLease {
    pub fn key(&self) -> &CacheKey {
        &self.key
    }
}

impl Drop for FetchLease {
    fn drop(&mut self) {
        self.in_flight.remove(&self.key);
    }
}

/// A vector some other caller is fetching
pub struct PendingVector {
    key: CacheKey,
    receiver: Slot,
}

impl PendingVector {
    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    /// The fetched vector, or `None` if the fetching caller gave up
    pub async fn wait(mut self) -> Option<Arc<Vec<f32>>> {
        loop {
            if let Some(vector) = self.receiver.borrow_and_update().clone() {
                return Some(vector);
            }
            if self.receiver.changed().await.is_err() {
                return self.receiver.borrow().clone();
            }
        }
    }
}

/// Shared embedding cache, passed explicitly to each gateway
#[derive(Default)]
pub struct EmbeddingCache {
    entries: DashMap<CacheKey, Arc<Vec<f32>>>,
    in_flight: Arc<InFlight>,
    model_version: RwLock<Option<String>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl EmbeddingCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the active model version, clearing entries from any other one
    pub fn ensure_model(&self, model_version: &str) {
        if self.model_version.read().as_deref() == Some(model_version) {
            return;
        }

        let mut current = self.model_version.write();
        if current.as_deref() != Some(model_version) {
            if let Some(previous) = current.as_deref() {
                tracing::info!(
                    "Embedding model changed from '{}' to '{}', clearing {} cached vectors",
                    previous,
                    model_version,
                    self.entries.len()
                );
            }
            self.entries.clear();
            *current = Some(model_version.to_string());
        }
    }

    /// Look up a key, or reserve it so concurrent callers wait on one fetch
    ///
    /// Waiting callers count as hits; the caller that fetches counts the miss.
    pub fn claim(&self, key: CacheKey) -> Claim {
        if let Some(vector) = self.lookup(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Claim::Cached(vector);
        }

        let lease = match self.in_flight.entry(key.clone()) {
            Entry::Occupied(slot) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Claim::Wait(PendingVector {
                    key,
                    receiver: slot.get().clone(),
                });
            }
            Entry::Vacant(slot) => {
                let (sender, receiver) = watch::channel(None);
                slot.insert(receiver);
                FetchLease {
                    key,
                    sender,
                    in_flight: Arc::clone(&self.in_flight),
                }
            }
        };

        // A fetch may have completed between the lookup and the reservation
        if let Some(vector) = self.lookup(lease.key()) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Claim::Cached(vector);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        Claim::Fetch(lease)
    }

    /// Store the fetched vector and release its waiters
    pub fn complete(&self, lease: FetchLease, vector: Vec<f32>) -> Arc<Vec<f32>> {
        // Cache before releasing the reservation so later claims find it
        let cached = self.insert(lease.key.clone(), vector);
        lease.sender.send_replace(Some(Arc::clone(&cached)));
        cached
    }

    /// Insert unless present; returns the vector that ends up cached
    ///
    /// When two callers race on the same text the first insert wins and the
    /// second caller gets that vector back.
    pub fn insert(&self, key: CacheKey, vector: Vec<f32>) -> Arc<Vec<f32>> {
        if self.model_version.read().as_deref() != Some(key.model_version.as_str()) {
            // Stale model version; don't let it back into the cache
            return Arc::new(vector);
        }
        Arc::clone(self.entries.entry(key).or_insert_with(|| Arc::new(vector)).value())
    }

    fn lookup(&self, key: &CacheKey) -> Option<Arc<Vec<f32>>> {
        self.entries.get(key).map(|entry| Arc::clone(entry.value()))
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.entries.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalization_shares_keys() {
        assert_eq!(normalize_text("  cells \n\t divide  "), "cells divide");
        assert_eq!(
            CacheKey::new("m1", "cells  divide"),
            CacheKey::new("m1", " cells divide\n")
        );
        assert_ne!(CacheKey::new("m1", "cells"), CacheKey::new("m2", "cells"));
    }

    #[test]
    fn test_first_insert_wins() {
        let cache = EmbeddingCache::new();
        cache.ensure_model("m1");
        let key = CacheKey::new("m1", "text");

        let first = cache.insert(key.clone(), vec![1.0]);
        let second = cache.insert(key.clone(), vec![2.0]);

        assert_eq!(*first, vec![1.0]);
        assert_eq!(*second, vec![1.0]);
        assert!(matches!(cache.claim(key), Claim::Cached(v) if v[0] == 1.0));
        assert_eq!(
            cache.stats(),
            CacheStats {
                hits: 1,
                misses: 0,
                entries: 1
            }
        );
    }

    #[tokio::test]
    async fn test_second_claim_waits_for_the_first() {
        let cache = EmbeddingCache::new();
        cache.ensure_model("m1");
        let key = CacheKey::new("m1", "text");

        let Claim::Fetch(lease) = cache.claim(key.clone()) else {
            panic!("first claim should fetch");
        };
        let Claim::Wait(pending) = cache.claim(key.clone()) else {
            panic!("second claim should wait");
        };

        cache.complete(lease, vec![3.0]);
        assert_eq!(pending.wait().await.map(|v| v[0]), Some(3.0));
        assert!(matches!(cache.claim(key), Claim::Cached(_)));
        assert_eq!(cache.stats().misses, 1);
        assert_eq!(cache.stats().hits, 2);
    }

    #[tokio::test]
    async fn test_dropped_lease_releases_waiters() {
        let cache = EmbeddingCache::new();
        cache.ensure_model("m1");
        let key = CacheKey::new("m1", "text");

        let Claim::Fetch(lease) = cache.claim(key.clone()) else {
            panic!("first claim should fetch");
        };
        let Claim::Wait(pending) = cache.claim(key.clone()) else {
            panic!("second claim should wait");
        };

        drop(lease);
        assert!(pending.wait().await.is_none());
        assert!(matches!(cache.claim(key), Claim::Fetch(_)));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_model_change_clears_everything() {
        let cache = EmbeddingCache::new();
        cache.ensure_model("m1");
        cache.insert(CacheKey::new("m1", "a"), vec![1.0]);
        cache.ensure_model("m1");
        assert_eq!(cache.len(), 1);

        cache.ensure_model("m2");
        assert!(cache.is_empty());

        // Late writes from the old model are dropped
        cache.insert(CacheKey::new("m1", "b"), vec![1.0]);
        assert!(cache.is_empty());
    }
}
