//! kb-vector
//!
//! Adapters behind [`kb_core::traits::VectorSearch`]. The embedding model and
//! any ANN structure live outside this workspace; what is here converts
//! backend distances to `[0, 1]` similarities and provides a brute-force
//! store over a deterministic hash embedder for development and tests.

pub mod embed;
pub mod flat;

pub use embed::{Embedder, HashEmbedder};
pub use flat::FlatVectorStore;

/// Cosine distance to similarity, clamped to `[0, 1]`.
pub fn distance_to_similarity(distance: f32) -> f32 {
    if distance.is_nan() {
        return 0.0;
    }
    (1.0 - distance).clamp(0.0, 1.0)
}
