use rules_review_protocol::{AccessRequest, FirewallRule};
use std::collections::BTreeSet;

/// The `(sources, destinations, ports)` triple of raw tokens. Two entities
/// are exactly equivalent when their fingerprints are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint {
    pub sources: BTreeSet<String>,
    pub destinations: BTreeSet<String>,
    pub ports: BTreeSet<String>,
}

impl Fingerprint {
    pub fn new<S, D, P>(sources: S, destinations: D, ports: P) -> Self
    where
        S: IntoIterator,
        S::Item: Into<String>,
        D: IntoIterator,
        D::Item: Into<String>,
        P: IntoIterator,
        P::Item: Into<String>,
    {
        Self {
            sources: sources.into_iter().map(Into::into).collect(),
            destinations: destinations.into_iter().map(Into::into).collect(),
            ports: ports.into_iter().map(Into::into).collect(),
        }
    }

    #[must_use]
    pub fn of_rule(rule: &FirewallRule) -> Self {
        Self::new(
            rule.sources.iter().map(|s| s.address.as_str()),
            rule.destinations.iter().map(|d| d.address.as_str()),
            rule.ports.iter().map(String::as_str),
        )
    }

    #[must_use]
    pub fn of_request(request: &AccessRequest) -> Self {
        Self::new(
            request.spec.sources.iter().map(String::as_str),
            request.spec.destinations.iter().map(String::as_str),
            request.spec.ports.iter().map(String::as_str),
        )
    }
}
