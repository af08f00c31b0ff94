//! Review runs against an inventory: compute the run result, then swap in
//! the new deficiency snapshot in one step.

use crate::config::ReviewConfig;
use crate::error::Result;
use crate::exact::reconcile_exact;
use crate::inventory::Inventory;
use crate::semantic::SemanticReviewer;
use rules_review_protocol::{ReviewResult, SemanticReviewResult};
use rules_review_vector_store::SimilaritySearch;

/// Runs the exact track and replaces the exact deficiency snapshot.
pub fn run_exact_review(inventory: &mut Inventory) -> ReviewResult {
    let result = reconcile_exact(inventory.rules(), inventory.requests());
    inventory.replace_deficiencies(result.deficiencies.clone());
    log::info!(
        "exact review: {} matched, {} unmatched rules, {} unmatched requests",
        result.summary.matched_count,
        result.summary.unmatched_rules_count,
        result.summary.unmatched_requests_count
    );
    result
}

/// Runs the semantic track and replaces the semantic deficiency snapshot.
///
/// `threshold` falls back to the configured default. On error the previous
/// snapshot is left as it was.
pub async fn run_semantic_review(
    inventory: &mut Inventory,
    config: &ReviewConfig,
    threshold: Option<f64>,
) -> Result<SemanticReviewResult> {
    let threshold = threshold.unwrap_or(config.similarity_threshold);
    let dimension = config.embedding.dimension;
    let rule_index = inventory.rule_index(dimension)?;
    let request_index = inventory.request_index(dimension)?;
    run_semantic_review_with(inventory, &rule_index, &request_index, threshold).await
}

/// Same as [`run_semantic_review`] over caller-provided similarity backends.
pub async fn run_semantic_review_with(
    inventory: &mut Inventory,
    rule_search: &dyn SimilaritySearch,
    request_search: &dyn SimilaritySearch,
    threshold: f64,
) -> Result<SemanticReviewResult> {
    let result = SemanticReviewer::new(rule_search, request_search)
        .reconcile(inventory.rules(), inventory.requests(), threshold)
        .await?;

    inventory.replace_semantic_deficiencies(result.deficiencies.clone());
    log::info!(
        "semantic review at {threshold}: {} matched, {} unmatched rules, {} unmatched requests",
        result.summary.matched_count,
        result.summary.unmatched_rules_count,
        result.summary.unmatched_requests_count
    );
    Ok(result)
}
