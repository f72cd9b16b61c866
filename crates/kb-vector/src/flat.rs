use anyhow::{ensure, Context, Result};
use async_trait::async_trait;
use kb_core::traits::VectorSearch;
use kb_core::types::{Document, VectorHit};
use tracing::debug;

use crate::distance_to_similarity;
use crate::embed::Embedder;

/// Exhaustive cosine search over pre-embedded documents.
pub struct FlatVectorStore<E: Embedder> {
    embedder: E,
    documents: Vec<Document>,
    vectors: Vec<Vec<f32>>,
}

impl<E: Embedder> FlatVectorStore<E> {
    pub fn build(embedder: E, documents: Vec<Document>) -> Result<Self> {
        let texts: Vec<String> = documents.iter().map(|d| d.text.clone()).collect();
        let vectors = embedder.embed_batch(&texts)?;
        ensure!(
            vectors.len() == documents.len(),
            "embedder returned {} vectors for {} documents",
            vectors.len(),
            documents.len()
        );
        for v in &vectors {
            ensure!(v.len() == embedder.dim(), "embedding dim {} != {}", v.len(), embedder.dim());
        }
        Ok(Self { embedder, documents, vectors })
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    fn nearest(&self, query: &str, limit: usize) -> Result<Vec<VectorHit>> {
        if limit == 0 || self.documents.is_empty() || query.trim().is_empty() {
            return Ok(Vec::new());
        }
        let q = self
            .embedder
            .embed_batch(&[query.to_string()])?
            .into_iter()
            .next()
            .context("embedder returned no query vector")?;
        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(i, v)| {
                let cosine: f32 = v.iter().zip(&q).map(|(a, b)| a * b).sum();
                (i, distance_to_similarity(1.0 - cosine))
            })
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(limit);
        debug!(query_len = query.len(), hits = scored.len(), "flat vector search");
        Ok(scored
            .into_iter()
            .map(|(i, similarity)| VectorHit {
                text: self.documents[i].text.clone(),
                metadata: self.documents[i].metadata.clone(),
                similarity,
            })
            .collect())
    }
}

#[async_trait]
impl<E: Embedder> VectorSearch for FlatVectorStore<E> {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<VectorHit>> {
        self.nearest(query, limit)
    }
}
