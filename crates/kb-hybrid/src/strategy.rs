use kb_core::types::{Strategy, StrategyChoice};
use kb_core::Language;

/// English queries shorter than this many whitespace tokens go lexical-only.
const SHORT_QUERY_TOKENS: usize = 5;

/// Picks a retrieval plan from the detected language and surface features.
///
/// Chinese queries never touch BM25: the corpus is mostly English and a
/// keyword index cannot bridge scripts.
pub fn select_strategy(query: &str, language: Language) -> Strategy {
    match language {
        Language::Chinese => Strategy::VectorOnly,
        Language::English if query.split_whitespace().count() < SHORT_QUERY_TOKENS => Strategy::Bm25Only,
        Language::English if query.contains('@') || query.contains("http") => Strategy::Bm25Only,
        _ => Strategy::Hybrid,
    }
}

/// A pinned choice wins; `Auto` defers to [`select_strategy`].
pub fn resolve(choice: StrategyChoice, query: &str, language: Language) -> Strategy {
    choice.fixed().unwrap_or_else(|| select_strategy(query, language))
}
