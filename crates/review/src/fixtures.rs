//! Entity builders shared by unit tests.

use rules_review_protocol::{
    AccessRequest, AddressEntry, EntityId, FirewallRule, RequestSpec, RequestStatus, RuleAction,
};

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(ToString::to_string).collect()
}

pub(crate) fn rule(
    id: EntityId,
    name: &str,
    sources: &[&str],
    destinations: &[&str],
    ports: &[&str],
) -> FirewallRule {
    let entries = |values: &[&str], base: EntityId| -> Vec<AddressEntry> {
        values
            .iter()
            .enumerate()
            .map(|(i, address)| AddressEntry {
                id: base + i as EntityId,
                address: (*address).to_string(),
            })
            .collect()
    };
    FirewallRule {
        id,
        name: name.to_string(),
        device: "fw-edge-1".to_string(),
        action: RuleAction::Allow,
        ports: strings(ports),
        sources: entries(sources, id * 100),
        destinations: entries(destinations, id * 100 + 50),
        embedding_text: None,
        embedding: None,
    }
}

pub(crate) fn request(
    id: EntityId,
    name: &str,
    sources: &[&str],
    destinations: &[&str],
    ports: &[&str],
) -> AccessRequest {
    AccessRequest {
        id,
        name: name.to_string(),
        status: RequestStatus::Pending,
        spec: RequestSpec {
            sources: strings(sources),
            destinations: strings(destinations),
            ports: strings(ports),
        },
        embedding_text: None,
        embedding: None,
    }
}

pub(crate) fn with_rule_embedding(mut rule: FirewallRule, vector: &[f32]) -> FirewallRule {
    rule.embedding = Some(vector.to_vec());
    rule
}

pub(crate) fn with_request_embedding(mut request: AccessRequest, vector: &[f32]) -> AccessRequest {
    request.embedding = Some(vector.to_vec());
    request
}
