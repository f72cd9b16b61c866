use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

const BUNDLED: &str = include_str!("../data/synonyms.json");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynonymEntry {
    pub term: String,
    pub synonyms: Vec<String>,
}

/// Ordered term → synonyms table used for query expansion.
///
/// Entry order matters: it is the order variants are emitted in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SynonymLexicon {
    entries: Vec<SynonymEntry>,
}

impl SynonymLexicon {
    pub fn new(entries: Vec<SynonymEntry>) -> Self {
        Self { entries }
    }

    /// The bilingual (Chinese + English) lexicon compiled into the crate.
    pub fn bundled() -> anyhow::Result<Self> {
        Self::from_json(BUNDLED).context("bundled synonym lexicon")
    }

    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let entries: Vec<SynonymEntry> = serde_json::from_str(json)?;
        Ok(Self::new(entries.into_iter().filter(|e| !e.term.is_empty()).collect()))
    }

    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading synonym lexicon {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("parsing synonym lexicon {}", path.display()))
    }

    /// `from_path` when a path is configured, the bundled lexicon otherwise.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(p) => Self::from_path(p),
            None => Self::bundled(),
        }
    }

    pub fn entries(&self) -> &[SynonymEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
