//! Per-branch execution over every expanded query variant.
//!
//! Each branch turns its backend's hits into [`BranchHit`]s with a
//! branch-local `score`, collapses duplicates by fingerprint (first seen
//! wins, so the original query outranks its variants), orders by score and
//! keeps at most the branch budget. A failing or slow vector backend yields
//! an empty branch, never an error.

use std::collections::HashSet;
use std::time::Duration;

use futures::future::join_all;
use kb_core::traits::VectorSearch;
use kb_core::types::{BranchHit, SourceKind};
use kb_core::Fingerprint;
use kb_text::Bm25Index;
use tracing::{debug, warn};

/// Budget every branch retrieves per variant and truncates to.
pub fn branch_budget(top_k: usize) -> usize {
    top_k.saturating_mul(2)
}

pub async fn vector_branch(
    search: &dyn VectorSearch,
    variants: &[String],
    budget: usize,
    weight: f32,
    timeout: Duration,
) -> Vec<BranchHit> {
    if budget == 0 || variants.is_empty() {
        return Vec::new();
    }
    let calls = join_all(variants.iter().map(|v| search.search(v, budget)));
    let per_variant = match tokio::time::timeout(timeout, calls).await {
        Ok(results) => results,
        Err(_) => {
            warn!(timeout_ms = timeout.as_millis() as u64, "vector branch timed out; treating as empty");
            return Vec::new();
        }
    };

    let mut hits = Vec::new();
    for (variant, result) in variants.iter().zip(per_variant) {
        match result {
            Ok(found) => hits.extend(found.into_iter().map(|h| {
                let similarity = h.similarity.clamp(0.0, 1.0);
                BranchHit {
                    fingerprint: Fingerprint::of(&h.text),
                    text: h.text,
                    metadata: h.metadata,
                    kind: SourceKind::Vector,
                    raw_score: h.similarity,
                    similarity,
                    score: similarity * weight,
                }
            })),
            Err(e) => {
                warn!(error = %e, variant = %variant, "vector search failed; treating branch as empty");
                return Vec::new();
            }
        }
    }
    finish(hits, budget, SourceKind::Vector)
}

/// Raw BM25 scores are min-max normalized across the hits of all variants
/// together, then weighted; the result doubles as the hit's similarity.
pub fn bm25_branch(index: &Bm25Index, variants: &[String], budget: usize, weight: f32) -> Vec<BranchHit> {
    if budget == 0 || index.is_empty() {
        return Vec::new();
    }
    let mut hits = Vec::new();
    for variant in variants {
        hits.extend(index.search(variant, budget).into_iter().map(|sd| BranchHit {
            text: sd.document.text.clone(),
            metadata: sd.document.metadata.clone(),
            kind: SourceKind::Bm25,
            raw_score: sd.score,
            similarity: 0.0,
            score: 0.0,
            fingerprint: sd.document.fingerprint(),
        }));
    }
    normalize_min_max(&mut hits, weight);
    finish(hits, budget, SourceKind::Bm25)
}

fn normalize_min_max(hits: &mut [BranchHit], weight: f32) {
    let (min, max) = hits
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), h| (lo.min(h.raw_score), hi.max(h.raw_score)));
    let range = max - min;
    for h in hits.iter_mut() {
        let normalized = if range > 0.0 { (h.raw_score - min) / range } else { 1.0 };
        h.score = normalized * weight;
        h.similarity = h.score;
    }
}

/// Drops every hit whose fingerprint was already seen, keeping order.
pub fn dedup_by_fingerprint(hits: Vec<BranchHit>) -> Vec<BranchHit> {
    let mut seen = HashSet::with_capacity(hits.len());
    hits.into_iter().filter(|h| seen.insert(h.fingerprint)).collect()
}

fn finish(hits: Vec<BranchHit>, budget: usize, kind: SourceKind) -> Vec<BranchHit> {
    let total = hits.len();
    let mut unique = dedup_by_fingerprint(hits);
    unique.sort_by(|lhs, rhs| rhs.score.total_cmp(&lhs.score));
    unique.truncate(budget);
    debug!(branch = %kind, total, kept = unique.len(), "branch finished");
    unique
}
