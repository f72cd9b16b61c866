//! Lightweight configuration loader and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars
//! (`__` separates nested keys, e.g. `APP_RETRIEVAL__MIN_SIMILARITY=0.3`).
//! Typed sections default to the retrieval defaults, so an empty figment is a
//! valid configuration. Also provides helpers to expand `~` and `${VAR}` and to
//! resolve relative paths against a known base directory.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::Error;

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.app()?;
        Ok(config)
    }

    pub fn from_figment(figment: Figment) -> Self {
        Self { figment }
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// Extract and validate the typed application config.
    pub fn app(&self) -> anyhow::Result<AppConfig> {
        let app: AppConfig = Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(self.figment.clone())
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to extract config: {}", e))?;
        app.validate()?;
        Ok(app)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub retrieval: RetrievalConfig,
    pub cache: CacheConfig,
    pub data: DataConfig,
}

impl AppConfig {
    pub fn validate(&self) -> crate::Result<()> {
        self.retrieval.validate()?;
        self.cache.validate()
    }
}

/// Tunables consumed by the hybrid retriever.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub vector_weight: f32,
    pub bm25_weight: f32,
    pub rrf_k: u32,
    pub min_similarity: f32,
    pub relax_floor: f32,
    /// Fewer survivors than this triggers the single relax step.
    pub relax_min_results: usize,
    pub k1: f32,
    pub b: f32,
    pub use_expansion: bool,
    pub language_threshold: f32,
    pub branch_timeout_ms: u64,
    pub default_top_k: usize,
    /// JSON synonym lexicon; the bundled lexicon is used when unset.
    pub lexicon_path: Option<String>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            vector_weight: 0.5,
            bm25_weight: 0.5,
            rrf_k: 60,
            min_similarity: 0.25,
            relax_floor: 0.15,
            relax_min_results: 3,
            k1: 1.5,
            b: 0.75,
            use_expansion: true,
            language_threshold: 0.3,
            branch_timeout_ms: 10_000,
            default_top_k: 5,
            lexicon_path: None,
        }
    }
}

impl RetrievalConfig {
    pub fn validate(&self) -> crate::Result<()> {
        let unit = |name: &str, v: f32| {
            if (0.0..=1.0).contains(&v) {
                Ok(())
            } else {
                Err(Error::InvalidConfig(format!("{name} must be within [0, 1], got {v}")))
            }
        };
        unit("retrieval.vector_weight", self.vector_weight)?;
        unit("retrieval.bm25_weight", self.bm25_weight)?;
        unit("retrieval.min_similarity", self.min_similarity)?;
        unit("retrieval.relax_floor", self.relax_floor)?;
        unit("retrieval.b", self.b)?;
        unit("retrieval.language_threshold", self.language_threshold)?;
        if self.k1.is_nan() || self.k1 <= 0.0 {
            return Err(Error::InvalidConfig(format!("retrieval.k1 must be positive, got {}", self.k1)));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub ttl_secs: u64,
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { enabled: true, ttl_secs: 3600, capacity: 1000 }
    }
}

impl CacheConfig {
    pub fn validate(&self) -> crate::Result<()> {
        if self.enabled && self.capacity == 0 {
            return Err(Error::InvalidConfig("cache.capacity must be > 0 when the cache is enabled".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub corpus_path: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self { corpus_path: "data/corpus.jsonl".to_string() }
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
