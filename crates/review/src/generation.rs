//! Bulk embedding of canonical entity texts.

use crate::entity::EntityRef;
use crate::error::Result;
use crate::inventory::Inventory;
use rules_review_protocol::{
    EmbeddingCoverage, EmbeddingFailure, EmbeddingReport, EntityId, EntityKind,
};
use rules_review_vector_store::{EmbeddingProvider, VectorStoreError};

struct Pending {
    kind: EntityKind,
    id: EntityId,
    text: String,
}

/// Embeds every request and rule that has no embedding yet (all of them
/// when `force`), `batch_size` texts per provider call.
///
/// A failing batch does not stop the others: its entities are logged and
/// listed in the report as failures, and keep whatever they had before.
pub async fn generate_embeddings(
    inventory: &mut Inventory,
    provider: &dyn EmbeddingProvider,
    batch_size: usize,
    force: bool,
) -> Result<EmbeddingReport> {
    let mut report = EmbeddingReport::default();
    let mut pending = Vec::new();

    for request in inventory.requests() {
        if request.embedding.is_some() && !force {
            report.requests_skipped += 1;
        } else {
            pending.push(pending_for(EntityRef::Request(request)));
        }
    }
    for rule in inventory.rules() {
        if rule.embedding.is_some() && !force {
            report.rules_skipped += 1;
        } else {
            pending.push(pending_for(EntityRef::Rule(rule)));
        }
    }

    log::info!(
        "embedding {} texts with {} (batch size {batch_size})",
        pending.len(),
        provider.model_id()
    );

    for chunk in pending.chunks(batch_size.max(1)) {
        let texts: Vec<&str> = chunk.iter().map(|p| p.text.as_str()).collect();
        let vectors = match provider.embed_batch(texts).await {
            Ok(vectors) if vectors.len() == chunk.len() => vectors,
            Ok(vectors) => {
                let err = VectorStoreError::EmbeddingError(format!(
                    "provider returned {} vectors for {} texts",
                    vectors.len(),
                    chunk.len()
                ));
                fail_chunk(&mut report, chunk, &err);
                continue;
            }
            Err(err) => {
                fail_chunk(&mut report, chunk, &err);
                continue;
            }
        };

        for (item, vector) in chunk.iter().zip(vectors) {
            if vector.len() != provider.dimension() {
                let err = VectorStoreError::InvalidDimension {
                    expected: provider.dimension(),
                    actual: vector.len(),
                };
                log::warn!("{} {}: {err}", item.kind, item.id);
                report.failures.push(failure(item, &err));
                continue;
            }
            let text = item.text.clone();
            match item.kind {
                EntityKind::Request => {
                    inventory.set_request_embedding(item.id, text, vector)?;
                    report.requests_generated += 1;
                }
                EntityKind::Rule => {
                    inventory.set_rule_embedding(item.id, text, vector)?;
                    report.rules_generated += 1;
                }
            }
        }
    }

    Ok(report)
}

/// Embeds one entity when it has no vector yet and returns its vector.
pub async fn ensure_embedding(
    inventory: &mut Inventory,
    provider: &dyn EmbeddingProvider,
    kind: EntityKind,
    id: EntityId,
) -> Result<Vec<f32>> {
    let (existing, text) = {
        let entity = match kind {
            EntityKind::Rule => EntityRef::Rule(inventory.rule(id)?),
            EntityKind::Request => EntityRef::Request(inventory.request(id)?),
        };
        (entity.embedding().map(<[f32]>::to_vec), entity.canonical_text())
    };
    if let Some(vector) = existing {
        return Ok(vector);
    }

    log::debug!("embedding {kind} {id} on demand");
    let vector = provider.embed(&text).await?;
    match kind {
        EntityKind::Rule => inventory.set_rule_embedding(id, text, vector.clone())?,
        EntityKind::Request => inventory.set_request_embedding(id, text, vector.clone())?,
    }
    Ok(vector)
}

#[must_use]
pub fn embedding_coverage(inventory: &Inventory) -> EmbeddingCoverage {
    EmbeddingCoverage {
        total_requests: inventory.requests().len(),
        requests_with_embeddings: inventory
            .requests()
            .iter()
            .filter(|r| r.embedding.is_some())
            .count(),
        total_rules: inventory.rules().len(),
        rules_with_embeddings: inventory
            .rules()
            .iter()
            .filter(|r| r.embedding.is_some())
            .count(),
    }
}

fn pending_for(entity: EntityRef<'_>) -> Pending {
    Pending {
        kind: entity.kind(),
        id: entity.id(),
        text: entity.canonical_text(),
    }
}

fn failure(item: &Pending, err: &VectorStoreError) -> EmbeddingFailure {
    EmbeddingFailure {
        kind: item.kind,
        id: item.id,
        error: err.to_string(),
    }
}

fn fail_chunk(report: &mut EmbeddingReport, chunk: &[Pending], err: &VectorStoreError) {
    log::warn!("embedding batch of {} texts failed: {err}", chunk.len());
    report
        .failures
        .extend(chunk.iter().map(|item| failure(item, err)));
}
