//! Optional result cache wrapped around a [`Retriever`].
//!
//! The retriever itself is stateless; caching is a collaborator injected
//! through [`ResultCache`]. Entries expire after a fixed TTL and the least
//! recently used entry is evicted once capacity is reached.

use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use kb_core::config::CacheConfig;
use kb_core::types::{Document, FusedResult};
use lru::LruCache;
use tracing::debug;
use twox_hash::XxHash64;

use crate::retriever::{RetrieveRequest, Retriever};

/// xxhash64 of every request field that changes the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey(u64);

impl CacheKey {
    pub fn of(request: &RetrieveRequest) -> Self {
        let mut hasher = XxHash64::with_seed(0);
        request.query.hash(&mut hasher);
        request.top_k.hash(&mut hasher);
        request.strategy.hash(&mut hasher);
        request.min_similarity.map(f32::to_bits).hash(&mut hasher);
        request.use_expansion.hash(&mut hasher);
        Self(hasher.finish())
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

pub trait ResultCache: Send + Sync {
    fn get(&self, key: &CacheKey) -> Option<Vec<FusedResult>>;
    fn put(&self, key: CacheKey, results: Vec<FusedResult>);
    fn clear(&self);
}

struct Entry {
    stored_at: Instant,
    results: Vec<FusedResult>,
}

pub struct TtlCache {
    entries: Mutex<LruCache<CacheKey, Entry>>,
    ttl: Duration,
}

impl TtlCache {
    pub fn new(capacity: NonZeroUsize, ttl: Duration) -> Self {
        Self { entries: Mutex::new(LruCache::new(capacity)), ttl }
    }

    /// `None` when the cache is disabled or has no capacity.
    pub fn from_config(cfg: &CacheConfig) -> Option<Self> {
        if !cfg.enabled {
            return None;
        }
        NonZeroUsize::new(cfg.capacity).map(|cap| Self::new(cap, Duration::from_secs(cfg.ttl_secs)))
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ResultCache for TtlCache {
    fn get(&self, key: &CacheKey) -> Option<Vec<FusedResult>> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let fresh = entries.get(key).map(|e| e.stored_at.elapsed() < self.ttl)?;
        if !fresh {
            entries.pop(key);
            return None;
        }
        entries.get(key).map(|e| e.results.clone())
    }

    fn put(&self, key: CacheKey, results: Vec<FusedResult>) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.put(key, Entry { stored_at: Instant::now(), results });
    }

    fn clear(&self) {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

/// A [`Retriever`] that answers repeated requests from a [`ResultCache`].
pub struct CachedRetriever {
    inner: Retriever,
    cache: Option<Arc<dyn ResultCache>>,
}

impl CachedRetriever {
    pub fn new(inner: Retriever, cache: Arc<dyn ResultCache>) -> Self {
        Self { inner, cache: Some(cache) }
    }

    /// Pass-through: every request reaches the retriever.
    pub fn uncached(inner: Retriever) -> Self {
        Self { inner, cache: None }
    }

    pub fn retriever(&self) -> &Retriever {
        &self.inner
    }

    /// Empty result sets are not cached, so a recovering backend is retried.
    /// Results computed across an index rebuild are returned but not cached.
    pub async fn retrieve(&self, request: &RetrieveRequest) -> Vec<FusedResult> {
        let Some(cache) = &self.cache else {
            return self.inner.retrieve(request).await;
        };
        let key = CacheKey::of(request);
        if let Some(hit) = cache.get(&key) {
            debug!(key = key.as_u64(), "result cache hit");
            return hit;
        }
        let generation = self.inner.index().generation();
        let results = self.inner.retrieve(request).await;
        if results.is_empty() {
            return results;
        }
        if self.inner.index().generation() != generation {
            debug!(key = key.as_u64(), "index rebuilt during retrieval, result not cached");
            return results;
        }
        cache.put(key, results.clone());
        results
    }

    pub fn invalidate(&self) {
        if let Some(cache) = &self.cache {
            cache.clear();
        }
    }

    /// Rebuilds the lexical index and drops every cached result.
    pub fn rebuild(&self, corpus: Vec<Document>) -> usize {
        let documents = self.inner.index().rebuild(corpus);
        self.invalidate();
        documents
    }
}
