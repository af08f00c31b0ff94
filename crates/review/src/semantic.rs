//! Semantic reconciliation over embeddings.
//!
//! The rule-driven pass pairs each embedded rule with its nearest request
//! when the score reaches the threshold. The request-driven pass then looks
//! at every request left unpaired, from the request's own side: its nearest
//! rule is probed independently, so the two passes can disagree about who is
//! whose best match.

use crate::entity::EntityRef;
use crate::error::{check_threshold, ReviewError, Result};
use rules_review_protocol::{
    similarity_percent, AccessRequest, DeficiencyKind, EntityId, EntityKind, FirewallRule,
    ReviewSummary, SemanticCandidate, SemanticDeficiency, SemanticMatchedPair,
    SemanticReviewResult, SemanticUnmatchedRequest, SemanticUnmatchedRule, UnmatchedReason,
};
use rules_review_vector_store::SimilaritySearch;
use std::collections::{HashMap, HashSet};

/// Outcome of probing the opposite kind for one entity's nearest neighbor.
#[derive(Debug, Clone, Copy)]
enum Probe<'a> {
    NoEmbedding,
    NoCandidate,
    Nearest { candidate: EntityRef<'a>, score: f64 },
}

impl Probe<'_> {
    fn best_match(self) -> Option<SemanticCandidate> {
        match self {
            Self::Nearest { candidate, score } => Some(SemanticCandidate::new(
                candidate.id(),
                candidate.display_name(),
                score,
            )),
            Self::NoEmbedding | Self::NoCandidate => None,
        }
    }
}

/// Runs the semantic track against two similarity backends, one holding rule
/// vectors and one holding request vectors.
pub struct SemanticReviewer<'s> {
    rule_search: &'s dyn SimilaritySearch,
    request_search: &'s dyn SimilaritySearch,
}

impl<'s> SemanticReviewer<'s> {
    pub fn new(
        rule_search: &'s dyn SimilaritySearch,
        request_search: &'s dyn SimilaritySearch,
    ) -> Self {
        Self {
            rule_search,
            request_search,
        }
    }

    /// Reconciles `rules` against `requests`, accepting scores `>= threshold`.
    ///
    /// Scores are `1 - cosine distance` rounded to four decimals, and the
    /// rounded value is what gets compared. An entity without an embedding is
    /// always unmatched, whatever the threshold. Backend failures abort the
    /// run; nothing partial is returned.
    pub async fn reconcile(
        &self,
        rules: &[FirewallRule],
        requests: &[AccessRequest],
        threshold: f64,
    ) -> Result<SemanticReviewResult> {
        let threshold = check_threshold(threshold)?;
        let lookup = Lookup::new(rules, requests);

        let mut matched = Vec::new();
        let mut unmatched_rules = Vec::new();
        let mut unmatched_requests = Vec::new();
        let mut deficiencies: Vec<SemanticDeficiency> = Vec::new();
        let mut consumed: HashSet<EntityId> = HashSet::new();

        for rule in rules {
            let entity = EntityRef::Rule(rule);
            let probe = self.probe(entity, &lookup).await?;
            match probe {
                Probe::Nearest { candidate, score } if score >= threshold => {
                    consumed.insert(candidate.id());
                    matched.push(SemanticMatchedPair {
                        rule_id: rule.id,
                        request_id: candidate.id(),
                        rule_name: rule.name.clone(),
                        request_name: candidate.display_name().to_string(),
                        sources: entity.sources(),
                        destinations: entity.destinations(),
                        ports: entity.ports(),
                        similarity_score: score,
                        similarity_percent: similarity_percent(score),
                    });
                }
                _ => {
                    let reason = unmatched_reason(probe, threshold);
                    let deficiency_id = record(&mut deficiencies, entity, probe, threshold);
                    log::debug!("rule {} unmatched: {}", rule.id, reason.description());
                    unmatched_rules.push(SemanticUnmatchedRule {
                        semantic_deficiency_id: deficiency_id,
                        rule_id: rule.id,
                        rule_name: rule.name.clone(),
                        sources: entity.sources(),
                        destinations: entity.destinations(),
                        ports: entity.ports(),
                        best_match: probe.best_match(),
                        reason,
                    });
                }
            }
        }

        for request in requests.iter().filter(|r| !consumed.contains(&r.id)) {
            let entity = EntityRef::Request(request);
            let probe = self.probe(entity, &lookup).await?;
            let reason = unmatched_reason(probe, threshold);
            let deficiency_id = record(&mut deficiencies, entity, probe, threshold);
            log::debug!("request {} unmatched: {}", request.id, reason.description());
            unmatched_requests.push(SemanticUnmatchedRequest {
                semantic_deficiency_id: deficiency_id,
                request_id: request.id,
                request_name: request.name.clone(),
                sources: entity.sources(),
                destinations: entity.destinations(),
                ports: entity.ports(),
                best_match: probe.best_match(),
                reason,
            });
        }

        let summary = ReviewSummary {
            total_rules: rules.len(),
            total_requests: requests.len(),
            matched_count: matched.len(),
            unmatched_rules_count: unmatched_rules.len(),
            unmatched_requests_count: unmatched_requests.len(),
            threshold_used: Some(threshold),
        };

        Ok(SemanticReviewResult {
            matched,
            unmatched_rules,
            unmatched_requests,
            deficiencies,
            summary,
        })
    }

    /// Nearest entity of the opposite kind (k = 1).
    async fn probe<'a>(&self, entity: EntityRef<'_>, lookup: &Lookup<'a>) -> Result<Probe<'a>> {
        let Some(vector) = entity.embedding() else {
            return Ok(Probe::NoEmbedding);
        };

        let target = entity.kind().opposite();
        let search = match target {
            EntityKind::Rule => self.rule_search,
            EntityKind::Request => self.request_search,
        };

        let Some(neighbor) = search.nearest(vector, 1).await?.into_iter().next() else {
            return Ok(Probe::NoCandidate);
        };

        let candidate = lookup
            .resolve(target, neighbor.id)
            .ok_or(ReviewError::StaleIndex {
                kind: target,
                id: neighbor.id,
            })?;

        Ok(Probe::Nearest {
            candidate,
            score: neighbor.similarity(),
        })
    }
}

/// Why an entity ended up unmatched. For requests, a nearest rule at or above
/// the threshold can only mean that rule was paired with another request.
fn unmatched_reason(probe: Probe<'_>, threshold: f64) -> UnmatchedReason {
    match probe {
        Probe::NoEmbedding => UnmatchedReason::NoEmbedding,
        Probe::NoCandidate => UnmatchedReason::NoCandidate,
        Probe::Nearest { score, .. } if score >= threshold => {
            UnmatchedReason::CandidatePairedElsewhere
        }
        Probe::Nearest { .. } => UnmatchedReason::BelowThreshold,
    }
}

fn record(
    deficiencies: &mut Vec<SemanticDeficiency>,
    entity: EntityRef<'_>,
    probe: Probe<'_>,
    threshold: f64,
) -> u64 {
    let (candidate_id, similarity_score) = match probe {
        Probe::Nearest { candidate, score } => (Some(candidate.id()), Some(score)),
        Probe::NoEmbedding | Probe::NoCandidate => (None, None),
    };
    let (kind, rule_id, request_id, best_match_request_id, best_match_rule_id) = match entity {
        EntityRef::Rule(rule) => (
            DeficiencyKind::NoMatchingRequest,
            Some(rule.id),
            None,
            candidate_id,
            None,
        ),
        EntityRef::Request(request) => (
            DeficiencyKind::NoMatchingRule,
            None,
            Some(request.id),
            None,
            candidate_id,
        ),
    };

    let id = deficiencies.len() as u64 + 1;
    deficiencies.push(SemanticDeficiency {
        id,
        kind,
        rule_id,
        request_id,
        best_match_request_id,
        best_match_rule_id,
        similarity_score,
        threshold_used: threshold,
    });
    id
}

struct Lookup<'a> {
    rules: HashMap<EntityId, &'a FirewallRule>,
    requests: HashMap<EntityId, &'a AccessRequest>,
}

impl<'a> Lookup<'a> {
    fn new(rules: &'a [FirewallRule], requests: &'a [AccessRequest]) -> Self {
        Self {
            rules: rules.iter().map(|r| (r.id, r)).collect(),
            requests: requests.iter().map(|r| (r.id, r)).collect(),
        }
    }

    fn resolve(&self, kind: EntityKind, id: EntityId) -> Option<EntityRef<'a>> {
        match kind {
            EntityKind::Rule => self.rules.get(&id).copied().map(EntityRef::Rule),
            EntityKind::Request => self.requests.get(&id).copied().map(EntityRef::Request),
        }
    }
}
