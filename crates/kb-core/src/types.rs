//! Domain types shared by the lexical, vector and hybrid engines.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::Error;
use crate::fingerprint::Fingerprint;

pub type Meta = HashMap<String, String>;

/// A unit of retrievable text.
///
/// `metadata` carries provenance (`source`, `title`, `chunk_index`, ...) and
/// is never consulted by ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub text: String,
    #[serde(default)]
    pub metadata: Meta,
}

impl Document {
    pub fn new(text: impl Into<String>, metadata: Meta) -> Self {
        Self { text: text.into(), metadata }
    }

    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::of(&self.text)
    }

    pub fn title(&self) -> Option<&str> {
        self.metadata.get("title").map(String::as_str)
    }

    pub fn source(&self) -> Option<&str> {
        self.metadata.get("source").map(String::as_str)
    }
}

/// Indicates which branch produced a hit.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Vector,
    Bm25,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SourceKind::Vector => "vector",
            SourceKind::Bm25 => "bm25",
        })
    }
}

/// What the vector collaborator returns. `similarity` is already in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorHit {
    pub text: String,
    #[serde(default)]
    pub metadata: Meta,
    pub similarity: f32,
}

/// A hit inside one branch, before fusion.
///
/// `raw_score` is branch-internal (cosine similarity or raw BM25). `score`
/// orders hits within the branch. `similarity` is the value comparable across
/// branches and the one thresholds are applied to.
#[derive(Debug, Clone, PartialEq)]
pub struct BranchHit {
    pub text: String,
    pub metadata: Meta,
    pub kind: SourceKind,
    pub raw_score: f32,
    pub similarity: f32,
    pub score: f32,
    pub fingerprint: Fingerprint,
}

/// Executed retrieval plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    #[serde(rename = "vector")]
    VectorOnly,
    #[serde(rename = "bm25")]
    Bm25Only,
    Hybrid,
}

impl Strategy {
    pub fn uses_vector(self) -> bool {
        matches!(self, Strategy::VectorOnly | Strategy::Hybrid)
    }

    pub fn uses_bm25(self) -> bool {
        matches!(self, Strategy::Bm25Only | Strategy::Hybrid)
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Strategy::VectorOnly => "vector",
            Strategy::Bm25Only => "bm25",
            Strategy::Hybrid => "hybrid",
        })
    }
}

/// Strategy requested by the caller; `Auto` defers to the selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyChoice {
    #[default]
    Auto,
    Vector,
    Bm25,
    Hybrid,
}

impl StrategyChoice {
    /// The fixed strategy this choice pins, or `None` for `Auto`.
    pub fn fixed(self) -> Option<Strategy> {
        match self {
            StrategyChoice::Auto => None,
            StrategyChoice::Vector => Some(Strategy::VectorOnly),
            StrategyChoice::Bm25 => Some(Strategy::Bm25Only),
            StrategyChoice::Hybrid => Some(Strategy::Hybrid),
        }
    }
}

impl FromStr for StrategyChoice {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(StrategyChoice::Auto),
            "vector" => Ok(StrategyChoice::Vector),
            "bm25" => Ok(StrategyChoice::Bm25),
            "hybrid" => Ok(StrategyChoice::Hybrid),
            other => Err(Error::Parse(format!("unknown strategy '{other}' (expected auto|vector|bm25|hybrid)"))),
        }
    }
}

/// Final ranked result.
///
/// `similarity` is the pre-fusion similarity of the first branch the text
/// appeared in; `fusion_score` is the RRF score for hybrid retrieval and the
/// branch score otherwise.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FusedResult {
    pub text: String,
    pub metadata: Meta,
    pub similarity: f32,
    pub fusion_score: f32,
    pub strategy: Strategy,
    #[serde(rename = "type")]
    pub kind: SourceKind,
    pub fingerprint: Fingerprint,
}

impl FusedResult {
    pub fn from_branch(hit: BranchHit, strategy: Strategy) -> Self {
        Self {
            fusion_score: hit.score,
            text: hit.text,
            metadata: hit.metadata,
            similarity: hit.similarity,
            strategy,
            kind: hit.kind,
            fingerprint: hit.fingerprint,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_choice_parses_case_insensitively() {
        assert_eq!("AUTO".parse::<StrategyChoice>().ok(), Some(StrategyChoice::Auto));
        assert_eq!(" bm25 ".parse::<StrategyChoice>().ok(), Some(StrategyChoice::Bm25));
        assert!("semantic".parse::<StrategyChoice>().is_err());
    }

    #[test]
    fn fixed_choices_map_to_strategies() {
        assert_eq!(StrategyChoice::Auto.fixed(), None);
        assert_eq!(StrategyChoice::Vector.fixed(), Some(Strategy::VectorOnly));
        assert!(Strategy::Hybrid.uses_vector() && Strategy::Hybrid.uses_bm25());
        assert!(!Strategy::Bm25Only.uses_vector());
    }

    #[test]
    fn strategy_serializes_with_short_names() {
        assert_eq!(serde_json::to_string(&Strategy::VectorOnly).ok().as_deref(), Some("\"vector\""));
        assert_eq!(Strategy::Hybrid.to_string(), "hybrid");
    }
}
