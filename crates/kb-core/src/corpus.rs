//! JSON-lines corpus source.
//!
//! Each non-blank line holds one `{"text": ..., "metadata": {...}}` object.
//! Chunking and parsing of the original source files happen upstream.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::traits::CorpusSource;
use crate::types::Document;

pub struct JsonlCorpus {
    path: PathBuf,
}

impl JsonlCorpus {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read(&self) -> Result<Vec<Document>> {
        if !self.path.exists() {
            return Err(Error::NotFound(self.path.display().to_string()));
        }
        parse_jsonl(&fs::read_to_string(&self.path)?)
    }
}

impl CorpusSource for JsonlCorpus {
    fn load(&self) -> anyhow::Result<Vec<Document>> {
        Ok(self.read()?)
    }
}

pub fn parse_jsonl(content: &str) -> Result<Vec<Document>> {
    let mut docs = Vec::new();
    for (line_no, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let doc: Document = serde_json::from_str(line)
            .map_err(|e| Error::Parse(format!("line {}: {}", line_no + 1, e)))?;
        docs.push(doc);
    }
    Ok(docs)
}
