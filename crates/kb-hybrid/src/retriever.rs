use std::sync::Arc;
use std::time::Duration;

use kb_core::config::{expand_path, RetrievalConfig};
use kb_core::traits::VectorSearch;
use kb_core::types::{FusedResult, Strategy, StrategyChoice};
use kb_core::{Language, LanguageDetector};
use kb_text::IndexHandle;
use tracing::{debug, info, warn};

use crate::branch::{bm25_branch, branch_budget, vector_branch};
use crate::expand::QueryExpander;
use crate::fusion::reciprocal_rank_fusion;
use crate::lexicon::SynonymLexicon;
use crate::strategy::resolve;
use crate::threshold::ThresholdPolicy;

/// One `retrieve` call. Unset options fall back to the retriever's config.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrieveRequest {
    pub query: String,
    pub top_k: usize,
    pub strategy: StrategyChoice,
    pub min_similarity: Option<f32>,
    pub use_expansion: Option<bool>,
}

impl RetrieveRequest {
    pub fn new(query: impl Into<String>, top_k: usize) -> Self {
        Self { query: query.into(), top_k, strategy: StrategyChoice::Auto, min_similarity: None, use_expansion: None }
    }

    pub fn strategy(mut self, strategy: StrategyChoice) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn min_similarity(mut self, min_similarity: f32) -> Self {
        self.min_similarity = Some(min_similarity);
        self
    }

    pub fn use_expansion(mut self, use_expansion: bool) -> Self {
        self.use_expansion = Some(use_expansion);
        self
    }
}

/// Hybrid lexical + vector retriever.
///
/// Holds only read-only collaborators: each call takes its own snapshot of
/// the lexical index and keeps no state afterwards.
pub struct Retriever {
    detector: LanguageDetector,
    expander: QueryExpander,
    index: Arc<IndexHandle>,
    vector: Arc<dyn VectorSearch>,
    config: RetrievalConfig,
}

impl Retriever {
    /// Uses the lexicon at `config.lexicon_path`, or the bundled one.
    pub fn new(index: Arc<IndexHandle>, vector: Arc<dyn VectorSearch>, config: RetrievalConfig) -> anyhow::Result<Self> {
        let path = config.lexicon_path.as_deref().map(expand_path);
        let lexicon = SynonymLexicon::load(path.as_deref())?;
        info!(entries = lexicon.len(), "synonym lexicon loaded");
        Ok(Self {
            detector: LanguageDetector::new(config.language_threshold),
            expander: QueryExpander::new(lexicon),
            index,
            vector,
            config,
        })
    }

    pub fn with_expander(mut self, expander: QueryExpander) -> Self {
        self.expander = expander;
        self
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    pub fn index(&self) -> &Arc<IndexHandle> {
        &self.index
    }

    /// Language and strategy a query would run with.
    pub fn plan(&self, query: &str, choice: StrategyChoice) -> (Language, Strategy) {
        let language = self.detector.detect(query);
        (language, resolve(choice, query, language))
    }

    pub async fn retrieve(&self, request: &RetrieveRequest) -> Vec<FusedResult> {
        let query = request.query.as_str();
        let (language, strategy) = self.plan(query, request.strategy);
        info!(%language, "query language detected");
        info!(%strategy, "retrieval strategy");

        if request.top_k == 0 || query.trim().is_empty() {
            debug!(top_k = request.top_k, "nothing to retrieve");
            return Vec::new();
        }

        let variants = if request.use_expansion.unwrap_or(self.config.use_expansion) {
            self.expander.expand(query, language)
        } else {
            vec![query.to_string()]
        };
        if variants.len() > 1 {
            info!(variants = variants.len(), "query expanded");
        }

        let budget = branch_budget(request.top_k);
        let index = self.index.snapshot();
        let timeout = Duration::from_millis(self.config.branch_timeout_ms);
        let vector = async {
            if strategy.uses_vector() {
                vector_branch(&*self.vector, &variants, budget, self.config.vector_weight, timeout).await
            } else {
                Vec::new()
            }
        };
        let lexical = async {
            if strategy.uses_bm25() {
                bm25_branch(&index, &variants, budget, self.config.bm25_weight)
            } else {
                Vec::new()
            }
        };
        let (vector_hits, bm25_hits) = tokio::join!(vector, lexical);

        let candidates: Vec<FusedResult> = match strategy {
            Strategy::Hybrid => reciprocal_rank_fusion(&[vector_hits, bm25_hits], self.config.rrf_k, budget),
            Strategy::VectorOnly => vector_hits.into_iter().map(|h| FusedResult::from_branch(h, strategy)).collect(),
            Strategy::Bm25Only => bm25_hits.into_iter().map(|h| FusedResult::from_branch(h, strategy)).collect(),
        };

        let mut policy = ThresholdPolicy::from_config(&self.config);
        if let Some(min) = request.min_similarity {
            policy = policy.with_min_similarity(min);
        }
        let results = policy.apply(candidates, request.top_k);
        match results.first() {
            Some(top) => info!(count = results.len(), top_similarity = top.similarity, "retrieved results"),
            None => warn!("no results retrieved"),
        }
        results
    }
}
