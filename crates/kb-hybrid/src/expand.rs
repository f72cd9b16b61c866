use kb_core::Language;
use tracing::debug;

use crate::lexicon::SynonymLexicon;

/// Produces synonym-substituted variants of a query.
#[derive(Debug, Clone, Default)]
pub struct QueryExpander {
    lexicon: SynonymLexicon,
}

impl QueryExpander {
    pub fn new(lexicon: SynonymLexicon) -> Self {
        Self { lexicon }
    }

    pub fn lexicon(&self) -> &SynonymLexicon {
        &self.lexicon
    }

    /// Returns `[query, variants...]`.
    ///
    /// Every lexicon term found in `query` (case-sensitive) contributes one
    /// variant per synonym, with the first occurrence of the term replaced.
    /// A synonym already in the query (case-insensitive) is skipped. Variants
    /// from different terms are appended, never combined.
    ///
    /// Term matching stays case-sensitive: a capitalised "Annual" yields no
    /// variants rather than lower-cased copies of the query.
    pub fn expand(&self, query: &str, language: Language) -> Vec<String> {
        let mut variants = vec![query.to_string()];
        if query.trim().is_empty() {
            return variants;
        }
        let lowered = query.to_lowercase();
        for entry in self.lexicon.entries() {
            if !query.contains(entry.term.as_str()) {
                continue;
            }
            for synonym in &entry.synonyms {
                if lowered.contains(&synonym.to_lowercase()) {
                    continue;
                }
                variants.push(query.replacen(entry.term.as_str(), synonym, 1));
            }
        }
        debug!(%language, variants = variants.len(), "expanded query");
        variants
    }
}
