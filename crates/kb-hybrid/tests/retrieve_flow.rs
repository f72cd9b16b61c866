use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use kb_core::config::RetrievalConfig;
use kb_core::traits::VectorSearch;
use kb_core::types::{Document, Meta, SourceKind, Strategy, StrategyChoice, VectorHit};
use kb_core::Language;
use kb_hybrid::branch::bm25_branch;
use kb_hybrid::{CachedRetriever, QueryExpander, RetrieveRequest, Retriever, SynonymEntry, SynonymLexicon, TtlCache};
use kb_text::{Bm25Params, IndexHandle};
use kb_vector::{FlatVectorStore, HashEmbedder};

const ANNUAL: &str = "Annual leave is 15 days per year";
const SICK: &str = "Sick leave requires a doctor's note";

fn doc(text: &str, title: &str) -> Document {
    let mut meta = Meta::new();
    meta.insert("title".to_string(), title.to_string());
    meta.insert("source".to_string(), "handbook.md".to_string());
    Document::new(text, meta)
}

fn leave_corpus() -> Vec<Document> {
    vec![doc(ANNUAL, "A"), doc(SICK, "B")]
}

/// Returns a fixed ranked list for every query and records what it was asked.
struct StubSearch {
    hits: Vec<(Document, f32)>,
    calls: Mutex<Vec<String>>,
}

impl StubSearch {
    fn new(hits: Vec<(Document, f32)>) -> Self {
        Self { hits, calls: Mutex::new(Vec::new()) }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls").clone()
    }
}

#[async_trait]
impl VectorSearch for StubSearch {
    async fn search(&self, query: &str, limit: usize) -> anyhow::Result<Vec<VectorHit>> {
        self.calls.lock().expect("calls").push(query.to_string());
        Ok(self
            .hits
            .iter()
            .take(limit)
            .map(|(d, similarity)| VectorHit { text: d.text.clone(), metadata: d.metadata.clone(), similarity: *similarity })
            .collect())
    }
}

struct FailingSearch;

#[async_trait]
impl VectorSearch for FailingSearch {
    async fn search(&self, _query: &str, _limit: usize) -> anyhow::Result<Vec<VectorHit>> {
        anyhow::bail!("vector store unreachable")
    }
}

struct SlowSearch;

#[async_trait]
impl VectorSearch for SlowSearch {
    async fn search(&self, query: &str, _limit: usize) -> anyhow::Result<Vec<VectorHit>> {
        tokio::time::sleep(Duration::from_millis(500)).await;
        Ok(vec![VectorHit { text: query.to_string(), metadata: Meta::new(), similarity: 1.0 }])
    }
}

/// A [`StubSearch`] that waits before answering.
struct DelayedSearch {
    delay: Duration,
    inner: StubSearch,
}

#[async_trait]
impl VectorSearch for DelayedSearch {
    async fn search(&self, query: &str, limit: usize) -> anyhow::Result<Vec<VectorHit>> {
        tokio::time::sleep(self.delay).await;
        self.inner.search(query, limit).await
    }
}

fn retriever_with(corpus: Vec<Document>, vector: Arc<dyn VectorSearch>, config: RetrievalConfig) -> Retriever {
    let index = Arc::new(IndexHandle::build(corpus, Bm25Params::default()));
    Retriever::new(index, vector, config).expect("retriever")
}

fn leave_stub() -> Arc<StubSearch> {
    let docs = leave_corpus();
    Arc::new(StubSearch::new(vec![(docs[0].clone(), 0.9), (docs[1].clone(), 0.4)]))
}

#[tokio::test]
async fn chinese_leave_policy_query_returns_the_annual_leave_doc() {
    let retriever = retriever_with(leave_corpus(), leave_stub(), RetrievalConfig::default());
    assert_eq!(retriever.plan("请假政策", StrategyChoice::Auto), (Language::Chinese, Strategy::VectorOnly));

    let results = retriever.retrieve(&RetrieveRequest::new("请假政策", 1)).await;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].text, ANNUAL);
    assert_eq!(results[0].similarity, 0.9);
    assert_eq!(results[0].strategy, Strategy::VectorOnly);
    assert_eq!(results[0].kind, SourceKind::Vector);
    assert_eq!(results[0].metadata.get("title").map(String::as_str), Some("A"));
}

#[tokio::test]
async fn chinese_query_finds_nothing_lexically_in_an_english_corpus() {
    let retriever = retriever_with(leave_corpus(), leave_stub(), RetrievalConfig::default());
    let snapshot = retriever.index().snapshot();
    assert!(bm25_branch(&snapshot, &["请假政策".to_string()], 10, 0.5).is_empty());

    let forced = RetrieveRequest::new("请假政策", 5).strategy(StrategyChoice::Bm25);
    assert!(retriever.retrieve(&forced).await.is_empty());
}

#[tokio::test]
async fn too_few_results_relax_the_threshold_once() {
    let docs: Vec<Document> = ["d1", "d2", "d3", "d4", "d5"].iter().map(|t| doc(&format!("document {t}"), t)).collect();
    let sims = [0.9, 0.5, 0.2, 0.18, 0.1];
    let stub = Arc::new(StubSearch::new(docs.iter().cloned().zip(sims).collect()));
    let retriever = retriever_with(docs, stub, RetrievalConfig::default());

    let request = RetrieveRequest::new("document", 10).strategy(StrategyChoice::Vector);
    let results = retriever.retrieve(&request).await;
    let got: Vec<f32> = results.iter().map(|r| r.similarity).collect();
    assert_eq!(got, vec![0.9, 0.5, 0.2, 0.18]);
}

#[tokio::test]
async fn hybrid_query_fuses_both_branches() {
    let retriever = retriever_with(leave_corpus(), leave_stub(), RetrievalConfig::default());
    let query = "how many days of annual leave do employees get per year";
    assert_eq!(retriever.plan(query, StrategyChoice::Auto).1, Strategy::Hybrid);

    let results = retriever.retrieve(&RetrieveRequest::new(query, 5)).await;
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].text, ANNUAL);
    assert!((results[0].fusion_score - 2.0 / 61.0).abs() < 1e-6);
    assert!(results.iter().all(|r| r.strategy == Strategy::Hybrid));
    // similarity is the vector branch's, where each text was first seen
    assert_eq!(results[0].similarity, 0.9);
    assert_eq!(results[1].similarity, 0.4);
    assert!(results[1].fusion_score < results[0].fusion_score);
}

#[tokio::test]
async fn failing_vector_backend_degrades_to_bm25() {
    let retriever = retriever_with(leave_corpus(), Arc::new(FailingSearch), RetrievalConfig::default());
    let query = "how many days of annual leave do employees get per year";
    let results = retriever.retrieve(&RetrieveRequest::new(query, 5)).await;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].text, ANNUAL);
    assert_eq!(results[0].kind, SourceKind::Bm25);
    assert_eq!(results[0].similarity, 0.5);

    let vector_only = RetrieveRequest::new(query, 5).strategy(StrategyChoice::Vector);
    assert!(retriever.retrieve(&vector_only).await.is_empty());
}

#[tokio::test]
async fn slow_vector_backend_times_out_as_empty() {
    let config = RetrievalConfig { branch_timeout_ms: 20, ..RetrievalConfig::default() };
    let retriever = retriever_with(leave_corpus(), Arc::new(SlowSearch), config);
    let request = RetrieveRequest::new("请假政策", 3);
    assert!(retriever.retrieve(&request).await.is_empty());
}

#[tokio::test]
async fn blank_query_and_zero_top_k_return_nothing() {
    let stub = leave_stub();
    let retriever = retriever_with(leave_corpus(), stub.clone(), RetrievalConfig::default());
    assert_eq!(retriever.plan("   ", StrategyChoice::Auto).0, Language::English);
    assert!(retriever.retrieve(&RetrieveRequest::new("   ", 5)).await.is_empty());
    assert!(retriever.retrieve(&RetrieveRequest::new("请假政策", 0)).await.is_empty());
    assert!(stub.calls().is_empty());
}

#[tokio::test]
async fn every_variant_reaches_the_vector_backend() {
    let stub = leave_stub();
    let retriever = retriever_with(leave_corpus(), stub.clone(), RetrievalConfig::default());
    let request = RetrieveRequest::new("请假政策", 2).strategy(StrategyChoice::Vector);

    retriever.retrieve(&request.clone().use_expansion(false)).await;
    assert_eq!(stub.calls(), vec!["请假政策"]);

    retriever.retrieve(&request).await;
    let calls = stub.calls();
    // 1 unexpanded call, then the query plus 4 + 3 synonym variants
    assert_eq!(calls.len(), 1 + 8);
    assert_eq!(calls[1], "请假政策");
    assert!(calls.contains(&"请假规定".to_string()));
}

#[tokio::test]
async fn empty_corpus_and_empty_backend_return_nothing() {
    let retriever = retriever_with(Vec::new(), Arc::new(StubSearch::new(Vec::new())), RetrievalConfig::default());
    let query = "how many days of annual leave do employees get per year";
    assert!(retriever.retrieve(&RetrieveRequest::new(query, 5)).await.is_empty());
}

#[tokio::test]
async fn cached_retriever_serves_repeats_until_rebuild() {
    let stub = leave_stub();
    let retriever = retriever_with(leave_corpus(), stub.clone(), RetrievalConfig::default());
    let cache = Arc::new(TtlCache::new(std::num::NonZeroUsize::new(8).expect("cap"), Duration::from_secs(60)));
    let cached = CachedRetriever::new(retriever, cache.clone());
    let request = RetrieveRequest::new("请假政策", 1).use_expansion(false);

    let first = cached.retrieve(&request).await;
    let second = cached.retrieve(&request).await;
    assert_eq!(first, second);
    assert_eq!(stub.calls().len(), 1);
    assert_eq!(cache.len(), 1);

    assert_eq!(cached.rebuild(vec![doc("Remote work needs manager approval", "C")]), 1);
    assert!(cache.is_empty());
    cached.retrieve(&request).await;
    assert_eq!(stub.calls().len(), 2);
}

#[tokio::test]
async fn hash_embedder_store_works_as_the_vector_branch() {
    let store = FlatVectorStore::build(HashEmbedder::default(), leave_corpus()).expect("store");
    let retriever = retriever_with(leave_corpus(), Arc::new(store), RetrievalConfig::default());
    let query = "how many annual leave days per year";
    assert_eq!(retriever.plan(query, StrategyChoice::Auto).1, Strategy::Hybrid);
    let results = retriever.retrieve(&RetrieveRequest::new(query, 3)).await;
    assert!(!results.is_empty());
    assert_eq!(results[0].text, ANNUAL);
}

#[tokio::test]
async fn results_straddling_a_rebuild_are_not_cached() {
    let docs = leave_corpus();
    let backend = Arc::new(DelayedSearch {
        delay: Duration::from_millis(200),
        inner: StubSearch::new(vec![(docs[0].clone(), 0.9)]),
    });
    let retriever = retriever_with(leave_corpus(), backend.clone(), RetrievalConfig::default());
    let cache = Arc::new(TtlCache::new(std::num::NonZeroUsize::new(8).expect("cap"), Duration::from_secs(60)));
    let cached = Arc::new(CachedRetriever::new(retriever, cache.clone()));
    let request = RetrieveRequest::new("请假政策", 1).use_expansion(false);

    let in_flight = {
        let cached = Arc::clone(&cached);
        let request = request.clone();
        tokio::spawn(async move { cached.retrieve(&request).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(cached.rebuild(vec![doc("Remote work needs manager approval", "C")]), 1);

    let stale = in_flight.await.expect("retrieve task");
    assert_eq!(stale.len(), 1);
    assert!(cache.is_empty());

    cached.retrieve(&request).await;
    assert_eq!(backend.inner.calls().len(), 2);
    assert_eq!(cache.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_share_one_retriever() {
    let retriever = Arc::new(retriever_with(leave_corpus(), leave_stub(), RetrievalConfig::default()));
    let tasks: Vec<_> = (0..8)
        .map(|i| {
            let retriever = Arc::clone(&retriever);
            let query = if i % 2 == 0 { "请假政策" } else { "how many days of annual leave do employees get per year" };
            tokio::spawn(async move { (i, retriever.retrieve(&RetrieveRequest::new(query, 2)).await) })
        })
        .collect();

    let mut outcomes = Vec::new();
    for task in tasks {
        outcomes.push(task.await.expect("retrieve task"));
    }
    let (even, odd): (Vec<_>, Vec<_>) = outcomes.into_iter().partition(|(i, _)| i % 2 == 0);
    for group in [even, odd] {
        let first = &group[0].1;
        assert!(!first.is_empty());
        assert_eq!(first[0].text, ANNUAL);
        assert!(group.iter().all(|(_, results)| results == first));
    }
}

#[tokio::test]
async fn custom_expander_replaces_the_bundled_lexicon() {
    let stub = leave_stub();
    let lexicon = SynonymLexicon::new(vec![SynonymEntry {
        term: "政策".to_string(),
        synonyms: vec!["制度".to_string()],
    }]);
    let retriever = retriever_with(leave_corpus(), stub.clone(), RetrievalConfig::default())
        .with_expander(QueryExpander::new(lexicon));
    let request = RetrieveRequest::new("请假政策", 2).strategy(StrategyChoice::Vector);

    let results = retriever.retrieve(&request).await;
    assert_eq!(results[0].text, ANNUAL);
    assert_eq!(stub.calls(), vec!["请假政策", "请假制度"]);
}
