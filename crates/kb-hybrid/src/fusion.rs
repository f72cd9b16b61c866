use std::collections::HashMap;

use kb_core::types::{BranchHit, FusedResult, Strategy};
use kb_core::Fingerprint;

/// Reciprocal Rank Fusion over per-branch ranked lists.
///
/// A document scores `Σ 1 / (k + rank + 1)` across the lists containing it
/// (0-based rank). The hit kept is the first one seen, scanning lists in
/// order, and equal fused scores keep that first-seen order. At most `limit`
/// results come back.
pub fn reciprocal_rank_fusion(branches: &[Vec<BranchHit>], k: u32, limit: usize) -> Vec<FusedResult> {
    let mut slots: HashMap<Fingerprint, usize> = HashMap::new();
    let mut fused: Vec<(BranchHit, f64)> = Vec::new();
    for hits in branches {
        for (rank, hit) in hits.iter().enumerate() {
            let contribution = 1.0 / (f64::from(k) + rank as f64 + 1.0);
            match slots.get(&hit.fingerprint) {
                Some(&slot) => fused[slot].1 += contribution,
                None => {
                    slots.insert(hit.fingerprint, fused.len());
                    fused.push((hit.clone(), contribution));
                }
            }
        }
    }
    fused.sort_by(|lhs, rhs| rhs.1.total_cmp(&lhs.1));
    fused.truncate(limit);
    fused
        .into_iter()
        .map(|(hit, score)| {
            let mut result = FusedResult::from_branch(hit, Strategy::Hybrid);
            result.fusion_score = score as f32;
            result
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use kb_core::types::{Meta, SourceKind};

    fn hit(text: &str, kind: SourceKind, similarity: f32) -> BranchHit {
        BranchHit {
            text: text.to_string(),
            metadata: Meta::from([("branch".to_string(), kind.to_string())]),
            kind,
            raw_score: similarity,
            similarity,
            score: similarity,
            fingerprint: Fingerprint::of(text),
        }
    }

    #[test]
    fn first_in_every_branch_dominates() {
        let vector = vec![hit("a", SourceKind::Vector, 0.9), hit("b", SourceKind::Vector, 0.8)];
        let bm25 = vec![hit("a", SourceKind::Bm25, 0.5), hit("c", SourceKind::Bm25, 0.4)];
        let fused = reciprocal_rank_fusion(&[vector, bm25], 60, 10);
        assert_eq!(fused[0].text, "a");
        assert!((fused[0].fusion_score - 2.0 / 61.0).abs() < 1e-6);
        assert!(fused[1..].iter().all(|r| r.fusion_score < fused[0].fusion_score));
        assert!(fused.iter().all(|r| r.strategy == Strategy::Hybrid));
    }

    #[test]
    fn first_branch_supplies_metadata_and_similarity() {
        let vector = vec![hit("a", SourceKind::Vector, 0.9)];
        let bm25 = vec![hit("a", SourceKind::Bm25, 0.2)];
        let fused = reciprocal_rank_fusion(&[vector, bm25], 60, 10);
        assert_eq!(fused.len(), 1);
        assert_eq!(fused[0].kind, SourceKind::Vector);
        assert_eq!(fused[0].similarity, 0.9);
        assert_eq!(fused[0].metadata.get("branch").map(String::as_str), Some("vector"));
    }

    #[test]
    fn ties_keep_first_appearance_order() {
        // b and c both sit at rank 1 of one branch
        let vector = vec![hit("a", SourceKind::Vector, 0.9), hit("b", SourceKind::Vector, 0.8)];
        let bm25 = vec![hit("a", SourceKind::Bm25, 0.5), hit("c", SourceKind::Bm25, 0.4)];
        let fused = reciprocal_rank_fusion(&[vector, bm25], 60, 10);
        let order: Vec<&str> = fused.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn limit_and_empty_inputs() {
        let vector = vec![hit("a", SourceKind::Vector, 0.9), hit("b", SourceKind::Vector, 0.8)];
        assert_eq!(reciprocal_rank_fusion(&[vector.clone(), Vec::new()], 60, 1).len(), 1);
        assert!(reciprocal_rank_fusion(&[Vec::new(), Vec::new()], 60, 5).is_empty());
        let only = reciprocal_rank_fusion(&[Vec::new(), vector], 60, 5);
        assert_eq!(only[0].kind, SourceKind::Vector);
        assert!((only[0].fusion_score - 1.0 / 61.0).abs() < 1e-6);
    }
}
