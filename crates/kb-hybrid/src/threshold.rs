use kb_core::config::RetrievalConfig;
use kb_core::types::FusedResult;
use tracing::warn;

/// Similarity cutoff with a single relax step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdPolicy {
    pub min_similarity: f32,
    pub relax_floor: f32,
    pub relax_min_results: usize,
}

impl Default for ThresholdPolicy {
    fn default() -> Self {
        Self { min_similarity: 0.25, relax_floor: 0.15, relax_min_results: 3 }
    }
}

impl ThresholdPolicy {
    pub fn from_config(cfg: &RetrievalConfig) -> Self {
        Self {
            min_similarity: cfg.min_similarity,
            relax_floor: cfg.relax_floor,
            relax_min_results: cfg.relax_min_results,
        }
    }

    pub fn with_min_similarity(mut self, min_similarity: f32) -> Self {
        self.min_similarity = min_similarity;
        self
    }

    /// Filters on pre-fusion `similarity`, relaxing once to `relax_floor` when
    /// too few results survive, then sorts by similarity and keeps `top_k`.
    pub fn apply(&self, candidates: Vec<FusedResult>, top_k: usize) -> Vec<FusedResult> {
        let passing = candidates.iter().filter(|r| r.similarity >= self.min_similarity).count();
        let cutoff = if passing < self.relax_min_results && self.min_similarity > self.relax_floor {
            warn!(
                passing,
                min_similarity = self.min_similarity,
                relax_floor = self.relax_floor,
                "too few results above threshold; relaxing"
            );
            self.relax_floor
        } else {
            self.min_similarity
        };
        let mut kept: Vec<FusedResult> = candidates.into_iter().filter(|r| r.similarity >= cutoff).collect();
        kept.sort_by(|lhs, rhs| rhs.similarity.total_cmp(&lhs.similarity));
        kept.truncate(top_k);
        kept
    }
}
