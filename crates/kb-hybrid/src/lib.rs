//! kb-hybrid
//!
//! Query-time orchestration: language-aware strategy selection, synonym
//! expansion, per-branch execution, reciprocal rank fusion and the final
//! similarity threshold. [`Retriever::retrieve`] is the entry point;
//! [`CachedRetriever`] adds an optional TTL result cache in front of it.

pub mod branch;
pub mod cache;
pub mod expand;
pub mod fusion;
pub mod lexicon;
pub mod retriever;
pub mod strategy;
pub mod threshold;

pub use cache::{CacheKey, CachedRetriever, ResultCache, TtlCache};
pub use expand::QueryExpander;
pub use fusion::reciprocal_rank_fusion;
pub use lexicon::{SynonymEntry, SynonymLexicon};
pub use retriever::{RetrieveRequest, Retriever};
pub use strategy::select_strategy;
pub use threshold::ThresholdPolicy;
