//! Canonical sentences for rules and requests, the input to embedding.

use crate::canonical::canonicalize;
use rules_review_protocol::{AccessRequest, EntityKind, FirewallRule, RuleAction};
use std::collections::BTreeSet;

/// Builds `"<kind> <name> [<action>] sources … destinations … ports …"`.
///
/// Sources and destinations are canonicalized; every group is deduplicated
/// and sorted, so input order never reaches the embedding.
#[must_use]
pub fn build_entity_text<S, D, P>(
    kind: EntityKind,
    name: &str,
    action: Option<RuleAction>,
    sources: S,
    destinations: D,
    ports: P,
) -> String
where
    S: IntoIterator,
    S::Item: AsRef<str>,
    D: IntoIterator,
    D::Item: AsRef<str>,
    P: IntoIterator,
    P::Item: AsRef<str>,
{
    let sources = sorted_unique(sources.into_iter().map(|s| canonicalize(s.as_ref())));
    let destinations = sorted_unique(destinations.into_iter().map(|d| canonicalize(d.as_ref())));
    let ports = sorted_unique(ports.into_iter().map(|p| p.as_ref().to_string()));

    let mut head = format!("{} {}", kind.as_str(), name.to_lowercase());
    if let Some(action) = action {
        head.push(' ');
        head.push_str(action.as_str());
    }

    format!(
        "{head} sources {} destinations {} ports {}",
        sources.join(" "),
        destinations.join(" "),
        ports.join(" ")
    )
}

#[must_use]
pub fn rule_text(rule: &FirewallRule) -> String {
    build_entity_text(
        EntityKind::Rule,
        &rule.name,
        Some(rule.action),
        rule.sources.iter().map(|s| s.address.as_str()),
        rule.destinations.iter().map(|d| d.address.as_str()),
        &rule.ports,
    )
}

#[must_use]
pub fn request_text(request: &AccessRequest) -> String {
    build_entity_text(
        EntityKind::Request,
        &request.name,
        None,
        &request.spec.sources,
        &request.spec.destinations,
        &request.spec.ports,
    )
}

fn sorted_unique(items: impl Iterator<Item = String>) -> Vec<String> {
    items.collect::<BTreeSet<_>>().into_iter().collect()
}
