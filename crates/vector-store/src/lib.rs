//! # Rules Review Vector Store
//!
//! Embedding providers and nearest-neighbor search for rule/request texts.
//!
//! ## Architecture
//!
//! ```text
//! canonical text
//!     │
//!     ├──> EmbeddingProvider
//!     │      ├─> OllamaEmbedder (POST /api/embed)
//!     │      └─> StubEmbedder   (hashed words + trigrams)
//!     │
//!     └──> SimilaritySearch
//!            └─> VectorIndex (exact cosine, distance ascending)
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use rules_review_vector_store::{EmbeddingProvider, SimilaritySearch, StubEmbedder, VectorIndex};
//!
//! #[tokio::main]
//! async fn main() -> rules_review_vector_store::Result<()> {
//!     let embedder = StubEmbedder::new(256);
//!     let mut index = VectorIndex::new(embedder.dimension());
//!     index.add(1, &embedder.embed("request web sources host 10.0.1.10").await?)?;
//!
//!     let query = embedder.embed("rule web allow sources host 10.0.1.10").await?;
//!     for neighbor in index.nearest(&query, 1).await? {
//!         println!("{}: {:.4}", neighbor.id, neighbor.similarity());
//!     }
//!     Ok(())
//! }
//! ```

mod embeddings;
mod error;
mod ollama;
mod vector_index;

pub use embeddings::{
    cosine_distance, cosine_similarity, EmbeddingMode, EmbeddingProvider, StubEmbedder,
    STUB_MODEL_ID,
};
pub use error::{Result, VectorStoreError};
pub use ollama::{OllamaEmbedder, DEFAULT_BATCH_TIMEOUT, DEFAULT_REQUEST_TIMEOUT};
pub use vector_index::{Neighbor, SimilaritySearch, VectorIndex};
