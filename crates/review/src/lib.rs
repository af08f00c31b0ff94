//! # Rules Review
//!
//! Reconciles implemented firewall rules against declared access requests.
//!
//! ## Tracks
//!
//! - **Exact**: a rule and a request match when their `(sources,
//!   destinations, ports)` sets are equal.
//! - **Semantic**: rules and requests are rendered as canonical text,
//!   embedded, and paired by cosine similarity against a threshold, which
//!   bridges notation drift such as `10.0.30.0/24` against
//!   `10.0.30.1-10.0.30.50`.
//!
//! Every run returns its result as a value, including the deficiency rows it
//! produced; [`service`] swaps those into the [`Inventory`] as the current
//! snapshot.
//!
//! ## Example
//!
//! ```no_run
//! use rules_review::{generate_embeddings, run_semantic_review, Inventory, ReviewConfig};
//!
//! #[tokio::main]
//! async fn main() -> rules_review::Result<()> {
//!     let config = ReviewConfig::load(None)?;
//!     let mut inventory = Inventory::load_or_default("inventory.json").await?;
//!
//!     let provider = config.embedding.build_provider()?;
//!     generate_embeddings(&mut inventory, provider.as_ref(), config.embedding.batch_size, false)
//!         .await?;
//!
//!     let result = run_semantic_review(&mut inventory, &config, None).await?;
//!     println!("{} matched", result.summary.matched_count);
//!     inventory.save("inventory.json").await
//! }
//! ```

pub mod canonical;
pub mod config;
pub mod discovery;
pub mod entity;
pub mod error;
pub mod exact;
pub mod fingerprint;
pub mod generation;
pub mod inventory;
pub mod semantic;
pub mod service;
pub mod text;

#[cfg(test)]
mod fixtures;

pub use canonical::canonicalize;
pub use config::{EmbeddingConfig, ReviewConfig, CONFIG_PATH_ENV};
pub use discovery::{search_by_text, similar_requests_for_rule, similar_rules_for_request};
pub use entity::EntityRef;
pub use error::{Result, ReviewError};
pub use exact::reconcile_exact;
pub use fingerprint::Fingerprint;
pub use generation::{embedding_coverage, ensure_embedding, generate_embeddings};
pub use inventory::Inventory;
pub use semantic::SemanticReviewer;
pub use service::{run_exact_review, run_semantic_review, run_semantic_review_with};
pub use text::{build_entity_text, request_text, rule_text};
