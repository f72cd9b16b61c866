use async_trait::async_trait;

use crate::types::{Document, VectorHit};

/// Embedding + ANN search capability supplied from outside the core.
///
/// Implementations own the distance-to-similarity conversion: every returned
/// `similarity` must already lie in `[0, 1]` with 1.0 meaning identical.
#[async_trait]
pub trait VectorSearch: Send + Sync {
    async fn search(&self, query: &str, limit: usize) -> anyhow::Result<Vec<VectorHit>>;
}

/// Supplies the documents a lexical index snapshot is built from.
pub trait CorpusSource: Send + Sync {
    fn load(&self) -> anyhow::Result<Vec<Document>>;
}

impl CorpusSource for Vec<Document> {
    fn load(&self) -> anyhow::Result<Vec<Document>> {
        Ok(self.clone())
    }
}
