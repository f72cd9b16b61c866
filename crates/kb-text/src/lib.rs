//! kb-text
//!
//! In-memory BM25 lexical index over an immutable corpus snapshot, the
//! tokenizer it shares with queries, and a handle that swaps whole index
//! instances when the corpus changes.

pub mod bm25;
pub mod handle;
pub mod tokenize;

pub use bm25::{Bm25Index, Bm25Params, ScoredDocument};
pub use handle::IndexHandle;
pub use tokenize::Tokenizer;
