//! Exact reconciliation: set equality of fingerprints.

use crate::entity::EntityRef;
use crate::fingerprint::Fingerprint;
use rules_review_protocol::{
    AccessRequest, Deficiency, DeficiencyKind, EntityId, FirewallRule, MatchedPair, ReviewResult,
    ReviewSummary, UnmatchedRequest, UnmatchedRule,
};
use std::collections::{HashMap, HashSet};

/// Pairs every rule with the request carrying the identical fingerprint.
///
/// Requests are indexed by fingerprint first (a later request replaces an
/// earlier one with the same fingerprint). Each request pairs with at most
/// one rule, so `matched + unmatched_rules == rules` and
/// `matched + unmatched_requests == requests` always hold. Deficiency ids
/// are numbered from 1 in emission order: rules first, then requests.
#[must_use]
pub fn reconcile_exact(rules: &[FirewallRule], requests: &[AccessRequest]) -> ReviewResult {
    let by_fingerprint: HashMap<Fingerprint, EntityId> = requests
        .iter()
        .map(|request| (Fingerprint::of_request(request), request.id))
        .collect();

    let mut consumed: HashSet<EntityId> = HashSet::new();
    let mut matched = Vec::new();
    let mut unmatched_rules = Vec::new();
    let mut unmatched_requests = Vec::new();
    let mut deficiencies: Vec<Deficiency> = Vec::new();

    for rule in rules {
        let entity = EntityRef::Rule(rule);
        match by_fingerprint.get(&Fingerprint::of_rule(rule)) {
            Some(&request_id) if consumed.insert(request_id) => {
                matched.push(MatchedPair {
                    rule_id: rule.id,
                    request_id,
                    sources: entity.sources(),
                    destinations: entity.destinations(),
                    ports: entity.ports(),
                });
            }
            hit => {
                if let Some(request_id) = hit {
                    log::debug!(
                        "rule {} shares its fingerprint with request {request_id}, which is already paired",
                        rule.id
                    );
                }
                let deficiency =
                    record(&mut deficiencies, DeficiencyKind::NoMatchingRequest, entity);
                unmatched_rules.push(UnmatchedRule {
                    deficiency_id: deficiency.id,
                    rule_id: rule.id,
                    rule_name: rule.name.clone(),
                    sources: deficiency.details.sources.clone(),
                    destinations: deficiency.details.destinations.clone(),
                    ports: deficiency.details.ports.clone(),
                });
            }
        }
    }

    for request in requests.iter().filter(|r| !consumed.contains(&r.id)) {
        let deficiency = record(
            &mut deficiencies,
            DeficiencyKind::NoMatchingRule,
            EntityRef::Request(request),
        );
        unmatched_requests.push(UnmatchedRequest {
            deficiency_id: deficiency.id,
            request_id: request.id,
            name: request.name.clone(),
            sources: deficiency.details.sources.clone(),
            destinations: deficiency.details.destinations.clone(),
            ports: deficiency.details.ports.clone(),
        });
    }

    let summary = ReviewSummary {
        total_rules: rules.len(),
        total_requests: requests.len(),
        matched_count: matched.len(),
        unmatched_rules_count: unmatched_rules.len(),
        unmatched_requests_count: unmatched_requests.len(),
        threshold_used: None,
    };

    ReviewResult {
        matched,
        unmatched_rules,
        unmatched_requests,
        deficiencies,
        summary,
    }
}

fn record<'d>(
    deficiencies: &'d mut Vec<Deficiency>,
    kind: DeficiencyKind,
    entity: EntityRef<'_>,
) -> &'d Deficiency {
    let (rule_id, request_id) = match entity {
        EntityRef::Rule(rule) => (Some(rule.id), None),
        EntityRef::Request(request) => (None, Some(request.id)),
    };
    deficiencies.push(Deficiency {
        id: deficiencies.len() as u64 + 1,
        kind,
        rule_id,
        request_id,
        details: entity.details(),
    });
    &deficiencies[deficiencies.len() - 1]
}
