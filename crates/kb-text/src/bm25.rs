//! Okapi BM25 over an immutable corpus snapshot.
//!
//! `idf(t) = ln((N - df + 0.5) / (df + 0.5) + 1)` and
//! `score(d) = Σ idf(t) · tf·(k1+1) / (tf + k1·(1 - b + b·|d|/avgdl))`,
//! summed over query tokens in query order so scores are reproducible
//! bit-for-bit. The index is never mutated after [`Bm25Index::build`].

use std::collections::HashMap;
use std::sync::Arc;

use kb_core::types::Document;
use tracing::info;

use crate::tokenize::Tokenizer;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bm25Params {
    pub k1: f32,
    pub b: f32,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: 1.5, b: 0.75 }
    }
}

pub struct Bm25Index {
    documents: Vec<Document>,
    term_freqs: Vec<HashMap<String, u32>>,
    doc_lens: Vec<u32>,
    idf: HashMap<String, f32>,
    avgdl: f32,
    params: Bm25Params,
    tokenizer: Arc<Tokenizer>,
}

/// A document with a positive BM25 score. `index` is its corpus position.
#[derive(Debug, Clone, Copy)]
pub struct ScoredDocument<'a> {
    pub index: usize,
    pub document: &'a Document,
    pub score: f32,
}

impl Bm25Index {
    pub fn build(corpus: Vec<Document>, params: Bm25Params) -> Self {
        Self::build_with(Tokenizer::shared(), corpus, params)
    }

    pub fn build_with(tokenizer: Arc<Tokenizer>, corpus: Vec<Document>, params: Bm25Params) -> Self {
        let n = corpus.len();
        let mut term_freqs = Vec::with_capacity(n);
        let mut doc_lens = Vec::with_capacity(n);
        let mut doc_freq: HashMap<String, u32> = HashMap::new();
        let mut total_len = 0u64;

        for doc in &corpus {
            let tokens = tokenizer.tokenize(&doc.text);
            let len = u32::try_from(tokens.len()).unwrap_or(u32::MAX);
            total_len += u64::from(len);
            doc_lens.push(len);

            let mut freq: HashMap<String, u32> = HashMap::new();
            for token in tokens {
                *freq.entry(token).or_insert(0) += 1;
            }
            for term in freq.keys() {
                *doc_freq.entry(term.clone()).or_insert(0) += 1;
            }
            term_freqs.push(freq);
        }

        let avgdl = if n > 0 { total_len as f32 / n as f32 } else { 0.0 };
        let n_f = n as f32;
        let idf = doc_freq
            .into_iter()
            .map(|(term, df)| {
                let df = df as f32;
                (term, ((n_f - df + 0.5) / (df + 0.5) + 1.0).ln())
            })
            .collect::<HashMap<_, _>>();

        info!(documents = n, terms = idf.len(), avgdl, "BM25 index built");
        Self { documents: corpus, term_freqs, doc_lens, idf, avgdl, params, tokenizer }
    }

    pub fn empty() -> Self {
        Self::build(Vec::new(), Bm25Params::default())
    }

    /// Top `top_k` documents by BM25 score; zero scores are excluded and equal
    /// scores keep corpus order.
    pub fn search(&self, query: &str, top_k: usize) -> Vec<ScoredDocument<'_>> {
        if top_k == 0 || self.documents.is_empty() {
            return Vec::new();
        }
        let query_tokens = self.tokenizer.tokenize(query);
        if query_tokens.is_empty() {
            return Vec::new();
        }
        // IDF lookups are hoisted so each document only touches its own map.
        let weighted: Vec<(&str, f32)> = query_tokens
            .iter()
            .filter_map(|t| self.idf.get(t).map(|idf| (t.as_str(), *idf)))
            .collect();
        if weighted.is_empty() {
            return Vec::new();
        }

        let Bm25Params { k1, b } = self.params;
        let avgdl = if self.avgdl > 0.0 { self.avgdl } else { 1.0 };
        let mut scored = Vec::new();
        for (index, freq) in self.term_freqs.iter().enumerate() {
            let doc_len = self.doc_lens[index] as f32;
            let norm = k1 * (1.0 - b + b * doc_len / avgdl);
            let mut score = 0.0f32;
            for (term, idf) in &weighted {
                if let Some(&tf) = freq.get(*term) {
                    let tf = tf as f32;
                    score += idf * (tf * (k1 + 1.0)) / (tf + norm);
                }
            }
            if score > 0.0 {
                scored.push(ScoredDocument { index, document: &self.documents[index], score });
            }
        }
        // stable: ties keep corpus order
        scored.sort_by(|lhs, rhs| rhs.score.total_cmp(&lhs.score));
        scored.truncate(top_k);
        scored
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn vocabulary_len(&self) -> usize {
        self.idf.len()
    }

    pub fn avgdl(&self) -> f32 {
        self.avgdl
    }

    pub fn params(&self) -> Bm25Params {
        self.params
    }

    pub fn idf(&self, term: &str) -> Option<f32> {
        self.idf.get(term).copied()
    }

    pub fn document(&self, index: usize) -> Option<&Document> {
        self.documents.get(index)
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn tokenizer(&self) -> &Arc<Tokenizer> {
        &self.tokenizer
    }
}
