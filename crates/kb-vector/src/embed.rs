use std::hash::{Hash, Hasher};

use anyhow::Result;
use kb_core::language::is_cjk_ideograph;
use twox_hash::XxHash64;

pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    /// Returns one L2-normalized vector of length `dim()` per input text.
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Deterministic bag-of-tokens embedder.
///
/// Each lowercased word (and each CJK ideograph) is hashed into one of `dim`
/// buckets, then the vector is L2-normalized. Texts sharing vocabulary get a
/// high cosine similarity; there is no semantics beyond that.
pub struct HashEmbedder {
    dim: usize,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1) }
    }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        for token in hash_tokens(text) {
            let mut hasher = XxHash64::with_seed(0);
            token.hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h % self.dim as u64) as usize;
            v[idx] += 1.0;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut v {
                *x /= norm;
            }
        }
        v
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(256)
    }
}

impl Embedder for HashEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

fn hash_tokens(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut word = String::new();
    for c in text.chars() {
        if is_cjk_ideograph(c) {
            if !word.is_empty() {
                tokens.push(std::mem::take(&mut word));
            }
            tokens.push(c.to_string());
        } else if c.is_alphanumeric() {
            word.extend(c.to_lowercase());
        } else if !word.is_empty() {
            tokens.push(std::mem::take(&mut word));
        }
    }
    if !word.is_empty() {
        tokens.push(word);
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dot(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[test]
    fn vectors_are_normalized_and_deterministic() {
        let e = HashEmbedder::new(64);
        let embs = e.embed_batch(&["hello world".to_string(), "hello world".to_string()]).expect("embed");
        assert_eq!(embs[0].len(), 64);
        let norm: f32 = embs[0].iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");
        assert_eq!(embs[0], embs[1]);
    }

    #[test]
    fn case_and_punctuation_do_not_matter() {
        let e = HashEmbedder::default();
        let a = e.embed_text("Annual Leave!");
        let b = e.embed_text("annual leave");
        assert!((dot(&a, &b) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn shared_vocabulary_scores_higher() {
        let e = HashEmbedder::default();
        let q = e.embed_text("annual leave days");
        let close = e.embed_text("annual leave is 15 days per year");
        let far = e.embed_text("submit expense reports monthly");
        assert!(dot(&q, &close) > dot(&q, &far));
    }

    #[test]
    fn blank_text_is_the_zero_vector() {
        let v = HashEmbedder::new(8).embed_text("   ");
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn ideographs_are_separate_tokens() {
        assert_eq!(hash_tokens("Leave请假 ok"), vec!["leave", "请", "假", "ok"]);
    }
}
