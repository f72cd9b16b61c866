use std::env;
use std::sync::Arc;

use anyhow::{bail, Context};
use kb_core::config::{expand_path, AppConfig, Config};
use kb_core::corpus::JsonlCorpus;
use kb_core::types::{FusedResult, StrategyChoice};
use kb_hybrid::{CachedRetriever, RetrieveRequest, Retriever, TtlCache};
use kb_text::{Bm25Params, IndexHandle};
use kb_vector::{FlatVectorStore, HashEmbedder};
use tracing::info;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "Usage: kb <query|stats> [args...]\n\
    kb query \"<text>\" [--top-k N] [--strategy auto|vector|bm25|hybrid] [--min-similarity F] [--no-expansion] [--json]\n\
    kb stats";

fn parse_args() -> (String, Vec<String>) {
    let mut args: Vec<String> = env::args().collect();
    args.remove(0);
    if args.is_empty() {
        eprintln!("{USAGE}");
        std::process::exit(1);
    }
    let cmd = args.remove(0);
    (cmd, args)
}

#[derive(Debug, PartialEq)]
struct QueryArgs {
    text: String,
    top_k: Option<usize>,
    strategy: StrategyChoice,
    min_similarity: Option<f32>,
    no_expansion: bool,
    json: bool,
}

fn parse_query_args(args: &[String]) -> anyhow::Result<QueryArgs> {
    let mut parsed = QueryArgs {
        text: String::new(),
        top_k: None,
        strategy: StrategyChoice::Auto,
        min_similarity: None,
        no_expansion: false,
        json: false,
    };
    let mut words = Vec::new();
    let mut it = args.iter();
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--top-k" => {
                let v = it.next().context("--top-k needs a value")?;
                parsed.top_k = Some(v.parse().with_context(|| format!("invalid --top-k '{v}'"))?);
            }
            "--strategy" => {
                let v = it.next().context("--strategy needs a value")?;
                parsed.strategy = v.parse()?;
            }
            "--min-similarity" => {
                let v = it.next().context("--min-similarity needs a value")?;
                let min: f32 = v.parse().with_context(|| format!("invalid --min-similarity '{v}'"))?;
                if !(0.0..=1.0).contains(&min) {
                    bail!("--min-similarity must be within [0, 1], got {min}");
                }
                parsed.min_similarity = Some(min);
            }
            "--no-expansion" => parsed.no_expansion = true,
            "--json" => parsed.json = true,
            flag if flag.starts_with("--") => bail!("unknown option {flag}"),
            word => words.push(word.to_string()),
        }
    }
    if words.is_empty() {
        bail!("missing query text\n{USAGE}");
    }
    parsed.text = words.join(" ");
    Ok(parsed)
}

fn print_results(query: &str, results: &[FusedResult]) {
    println!("🔍 {} results for: \"{}\"", results.len(), query);
    for (i, r) in results.iter().enumerate() {
        let title = r.metadata.get("title").map_or("unknown", String::as_str);
        let source = r.metadata.get("source").map_or("unknown", String::as_str);
        println!(
            "\n  {}. [{}] similarity={:.3} fusion={:.4} strategy={} type={}",
            i + 1,
            title,
            r.similarity,
            r.fusion_score,
            r.strategy,
            r.kind
        );
        println!("     {}", r.text);
        println!("     source: {source}");
    }
}

fn build_retriever(app: &AppConfig) -> anyhow::Result<CachedRetriever> {
    let corpus = JsonlCorpus::new(expand_path(&app.data.corpus_path));
    let documents = corpus.read().with_context(|| format!("loading corpus {}", corpus.path().display()))?;
    let params = Bm25Params { k1: app.retrieval.k1, b: app.retrieval.b };
    let index = Arc::new(IndexHandle::build(documents.clone(), params));
    let store = FlatVectorStore::build(HashEmbedder::default(), documents)?;
    info!(documents = store.len(), "vector store ready");

    let retriever = Retriever::new(index, Arc::new(store), app.retrieval.clone())?;
    Ok(match TtlCache::from_config(&app.cache) {
        Some(cache) => CachedRetriever::new(retriever, Arc::new(cache)),
        None => CachedRetriever::uncached(retriever),
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).with_writer(std::io::stderr).init();

    let config = Config::load().map_err(|e| {
        eprintln!("Error loading config: {}", e);
        e
    })?;
    let app = config.app()?;
    let (cmd, args) = parse_args();
    match cmd.as_str() {
        "query" => {
            let q = parse_query_args(&args)?;
            let retriever = build_retriever(&app)?;
            let top_k = q.top_k.unwrap_or(app.retrieval.default_top_k);
            let mut request = RetrieveRequest::new(q.text.as_str(), top_k).strategy(q.strategy);
            if let Some(min) = q.min_similarity {
                request = request.min_similarity(min);
            }
            if q.no_expansion {
                request = request.use_expansion(false);
            }
            let results = retriever.retrieve(&request).await;
            if q.json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else {
                print_results(&q.text, &results);
            }
        }
        "stats" => {
            let retriever = build_retriever(&app)?;
            let index = retriever.retriever().index().snapshot();
            println!("📊 corpus: {}", app.data.corpus_path);
            println!("  documents:  {}", index.len());
            println!("  vocabulary: {}", index.vocabulary_len());
            println!("  avgdl:      {:.2}", index.avgdl());
            println!("  k1={} b={}", index.params().k1, index.params().b);
        }
        _ => {
            eprintln!("Unknown command: {}\n{USAGE}", cmd);
            std::process::exit(1);
        }
    }
    Ok(())
}
