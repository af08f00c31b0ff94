//! Top-k similarity queries for exploring the inventory.

use crate::entity::EntityRef;
use crate::error::{check_threshold, ReviewError, Result};
use crate::generation::ensure_embedding;
use crate::inventory::Inventory;
use rules_review_protocol::{
    similarity_percent, EntityId, EntityKind, SearchScope, SimilarEntity, SimilarityQueryResult,
    TextSearchResult,
};
use rules_review_vector_store::{EmbeddingProvider, SimilaritySearch};

/// Neighbors fetched per requested result. Threshold filtering happens after
/// the fetch, so asking for exactly `limit` would often come back short.
const OVERFETCH_FACTOR: usize = 4;

/// Rules most similar to a request. Embeds the request first when needed.
pub async fn similar_rules_for_request(
    inventory: &mut Inventory,
    provider: &dyn EmbeddingProvider,
    request_id: EntityId,
    threshold: f64,
    limit: usize,
) -> Result<SimilarityQueryResult> {
    similar_to(inventory, provider, EntityKind::Request, request_id, threshold, limit).await
}

/// Requests most similar to a rule. Embeds the rule first when needed.
pub async fn similar_requests_for_rule(
    inventory: &mut Inventory,
    provider: &dyn EmbeddingProvider,
    rule_id: EntityId,
    threshold: f64,
    limit: usize,
) -> Result<SimilarityQueryResult> {
    similar_to(inventory, provider, EntityKind::Rule, rule_id, threshold, limit).await
}

async fn similar_to(
    inventory: &mut Inventory,
    provider: &dyn EmbeddingProvider,
    kind: EntityKind,
    id: EntityId,
    threshold: f64,
    limit: usize,
) -> Result<SimilarityQueryResult> {
    let threshold = check_threshold(threshold)?;
    let query = ensure_embedding(inventory, provider, kind, id).await?;
    let query_text = match kind {
        EntityKind::Rule => inventory.rule(id)?.embedding_text.clone(),
        EntityKind::Request => inventory.request(id)?.embedding_text.clone(),
    }
    .unwrap_or_default();

    let target = kind.opposite();
    let index = match target {
        EntityKind::Rule => inventory.rule_index(provider.dimension())?,
        EntityKind::Request => inventory.request_index(provider.dimension())?,
    };
    let matches = top_matches(&index, inventory, target, &query, threshold, limit).await?;

    Ok(SimilarityQueryResult {
        query_kind: kind,
        query_id: id,
        query_text,
        total_matches: matches.len(),
        matches,
        threshold_used: threshold,
    })
}

/// Free-text search over rules, requests or both. Results across both kinds
/// are merged by descending score before truncation.
pub async fn search_by_text(
    inventory: &Inventory,
    provider: &dyn EmbeddingProvider,
    query: &str,
    scope: SearchScope,
    threshold: f64,
    limit: usize,
) -> Result<TextSearchResult> {
    let threshold = check_threshold(threshold)?;
    let query = query.trim();
    if query.is_empty() {
        return Err(ReviewError::InvalidInput(
            "search text must not be empty".to_string(),
        ));
    }

    let vector = provider.embed(query).await?;
    let mut matches = Vec::new();
    if scope.includes(EntityKind::Rule) {
        let index = inventory.rule_index(provider.dimension())?;
        matches.extend(
            top_matches(&index, inventory, EntityKind::Rule, &vector, threshold, limit).await?,
        );
    }
    if scope.includes(EntityKind::Request) {
        let index = inventory.request_index(provider.dimension())?;
        matches.extend(
            top_matches(&index, inventory, EntityKind::Request, &vector, threshold, limit).await?,
        );
    }

    matches.sort_by(|a, b| {
        b.similarity_score
            .partial_cmp(&a.similarity_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    matches.truncate(limit);

    Ok(TextSearchResult {
        query: query.to_string(),
        total_matches: matches.len(),
        matches,
        threshold_used: threshold,
    })
}

async fn top_matches(
    search: &dyn SimilaritySearch,
    inventory: &Inventory,
    kind: EntityKind,
    query: &[f32],
    threshold: f64,
    limit: usize,
) -> Result<Vec<SimilarEntity>> {
    if limit == 0 {
        return Ok(Vec::new());
    }

    let neighbors = search
        .nearest(query, limit.saturating_mul(OVERFETCH_FACTOR))
        .await?;

    let mut matches = Vec::with_capacity(limit);
    for neighbor in neighbors {
        let score = neighbor.similarity();
        if score < threshold {
            continue;
        }
        let entity = match kind {
            EntityKind::Rule => inventory.rule(neighbor.id).map(EntityRef::Rule),
            EntityKind::Request => inventory.request(neighbor.id).map(EntityRef::Request),
        }
        .map_err(|_| ReviewError::StaleIndex {
            kind,
            id: neighbor.id,
        })?;
        matches.push(SimilarEntity {
            kind,
            id: entity.id(),
            name: entity.display_name().to_string(),
            sources: entity.sources(),
            destinations: entity.destinations(),
            ports: entity.ports(),
            similarity_score: score,
            similarity_percent: similarity_percent(score),
        });
        if matches.len() == limit {
            break;
        }
    }
    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rules_review_protocol::{NewRequest, NewRule, RequestSpec, RuleAction};
    use rules_review_vector_store::StubEmbedder;

    fn new_rule(name: &str, source: &str, destination: &str, port: &str) -> NewRule {
        NewRule {
            name: name.to_string(),
            device: "fw-core-1".to_string(),
            action: RuleAction::Allow,
            ports: vec![port.to_string()],
            sources: vec![source.to_string()],
            destinations: vec![destination.to_string()],
        }
    }

    fn new_request(name: &str, source: &str, destination: &str, port: &str) -> NewRequest {
        NewRequest {
            name: name.to_string(),
            spec: RequestSpec {
                sources: vec![source.to_string()],
                destinations: vec![destination.to_string()],
                ports: vec![port.to_string()],
            },
        }
    }

    fn inventory() -> Inventory {
        let mut inventory = Inventory::new();
        inventory
            .add_rule(new_rule("web-to-db", "10.0.30.0/24", "10.0.2.20", "443"))
            .unwrap();
        inventory
            .add_request(new_request("web-to-db", "10.0.30.1-10.0.30.50", "10.0.2.20", "443"))
            .unwrap();
        inventory
            .add_request(new_request("backup-sync", "192.168.5.7", "172.16.9.9", "22"))
            .unwrap();
        inventory
    }

    #[tokio::test]
    async fn rule_finds_its_request_and_embeds_on_demand() {
        let mut inventory = inventory();
        let provider = StubEmbedder::new(256);
        for id in [1, 2] {
            ensure_embedding(&mut inventory, &provider, EntityKind::Request, id)
                .await
                .unwrap();
        }
        assert!(inventory.rule(1).unwrap().embedding.is_none());

        let result = similar_requests_for_rule(&mut inventory, &provider, 1, 0.7, 5)
            .await
            .unwrap();

        assert_eq!(result.query_kind, EntityKind::Rule);
        assert!(result.query_text.starts_with("rule web-to-db allow"));
        assert_eq!(result.total_matches, 1);
        assert_eq!(result.matches[0].id, 1);
        assert_eq!(result.matches[0].kind, EntityKind::Request);
        assert!(result.matches[0].similarity_score >= 0.7);
        assert!(inventory.rule(1).unwrap().embedding.is_some());
    }

    #[tokio::test]
    async fn low_threshold_returns_more_in_score_order() {
        let mut inventory = inventory();
        let provider = StubEmbedder::new(256);
        for id in [1, 2] {
            ensure_embedding(&mut inventory, &provider, EntityKind::Request, id)
                .await
                .unwrap();
        }

        let result = similar_requests_for_rule(&mut inventory, &provider, 1, 0.0, 5)
            .await
            .unwrap();
        let ids: Vec<EntityId> = result.matches.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![1, 2]);

        let limited = similar_requests_for_rule(&mut inventory, &provider, 1, 0.0, 1)
            .await
            .unwrap();
        assert_eq!(limited.total_matches, 1);
    }

    #[tokio::test]
    async fn request_without_embedded_rules_has_no_matches() {
        let mut inventory = inventory();
        let provider = StubEmbedder::new(64);
        let result = similar_rules_for_request(&mut inventory, &provider, 2, 0.0, 5)
            .await
            .unwrap();
        assert!(result.matches.is_empty());
        assert_eq!(result.query_id, 2);
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let mut inventory = inventory();
        let provider = StubEmbedder::new(64);
        let err = similar_rules_for_request(&mut inventory, &provider, 77, 0.5, 5)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ReviewError::NotFound {
                kind: EntityKind::Request,
                id: 77
            }
        ));
    }

    #[tokio::test]
    async fn text_search_merges_both_kinds() {
        let mut inventory = inventory();
        let provider = StubEmbedder::new(256);
        crate::generation::generate_embeddings(&mut inventory, &provider, 8, false)
            .await
            .unwrap();

        let query = "sources subnet 10.0.30.0/24 destinations host 10.0.2.20 ports 443";
        let both = search_by_text(&inventory, &provider, query, SearchScope::Both, 0.0, 10)
            .await
            .unwrap();
        assert_eq!(both.total_matches, 3);
        assert!(both
            .matches
            .windows(2)
            .all(|w| w[0].similarity_score >= w[1].similarity_score));

        let rules_only = search_by_text(&inventory, &provider, query, SearchScope::Rules, 0.0, 10)
            .await
            .unwrap();
        assert!(rules_only.matches.iter().all(|m| m.kind == EntityKind::Rule));
        assert_eq!(rules_only.total_matches, 1);

        let none = search_by_text(&inventory, &provider, query, SearchScope::Both, 0.0, 0)
            .await
            .unwrap();
        assert!(none.matches.is_empty());
    }

    #[tokio::test]
    async fn text_search_rejects_blank_query_and_bad_threshold() {
        let inventory = inventory();
        let provider = StubEmbedder::new(16);
        assert!(matches!(
            search_by_text(&inventory, &provider, "   ", SearchScope::Both, 0.5, 5).await,
            Err(ReviewError::InvalidInput(_))
        ));
        assert!(matches!(
            search_by_text(&inventory, &provider, "ssh", SearchScope::Both, -0.1, 5).await,
            Err(ReviewError::InvalidThreshold(_))
        ));
    }
}
