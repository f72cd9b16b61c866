use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use kb_core::traits::CorpusSource;
use kb_core::types::Document;
use tracing::info;

use crate::bm25::{Bm25Index, Bm25Params};
use crate::tokenize::Tokenizer;

/// Shared pointer to the current lexical index.
///
/// Readers take an `Arc` snapshot and keep using it for the whole query, so a
/// concurrent [`IndexHandle::rebuild`] is observed either not at all or
/// completely. The new index is built outside the lock; only the pointer
/// swap happens under it.
///
/// Every swap bumps [`IndexHandle::generation`], so callers holding results
/// derived from an older snapshot can tell they are stale.
pub struct IndexHandle {
    current: RwLock<Arc<Bm25Index>>,
    generation: AtomicU64,
    tokenizer: Arc<Tokenizer>,
    params: Bm25Params,
}

impl IndexHandle {
    pub fn new(index: Bm25Index) -> Self {
        let tokenizer = index.tokenizer().clone();
        let params = index.params();
        Self { current: RwLock::new(Arc::new(index)), generation: AtomicU64::new(0), tokenizer, params }
    }

    pub fn build(corpus: Vec<Document>, params: Bm25Params) -> Self {
        let tokenizer = Tokenizer::shared();
        let index = Bm25Index::build_with(tokenizer, corpus, params);
        Self::new(index)
    }

    pub fn from_source(source: &dyn CorpusSource, params: Bm25Params) -> anyhow::Result<Self> {
        Ok(Self::build(source.load()?, params))
    }

    pub fn snapshot(&self) -> Arc<Bm25Index> {
        self.current.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Replace the current index, returning the previous one.
    pub fn swap(&self, index: Bm25Index) -> Arc<Bm25Index> {
        let next = Arc::new(index);
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        self.generation.fetch_add(1, Ordering::AcqRel);
        std::mem::replace(&mut *guard, next)
    }

    /// Number of swaps since the handle was created.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Build a fresh index over `corpus` with the handle's parameters and swap it in.
    pub fn rebuild(&self, corpus: Vec<Document>) -> usize {
        let index = Bm25Index::build_with(self.tokenizer.clone(), corpus, self.params);
        let documents = index.len();
        let previous = self.swap(index);
        info!(previous = previous.len(), documents, generation = self.generation(), "lexical index swapped");
        documents
    }

    pub fn rebuild_from(&self, source: &dyn CorpusSource) -> anyhow::Result<usize> {
        Ok(self.rebuild(source.load()?))
    }

    pub fn params(&self) -> Bm25Params {
        self.params
    }
}
