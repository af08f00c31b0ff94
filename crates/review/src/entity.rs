//! One view over rules and requests for code that treats both kinds alike.

use crate::text::{request_text, rule_text};
use rules_review_protocol::{
    AccessRequest, DeficiencyDetails, EntityId, EntityKind, FirewallRule,
};

#[derive(Debug, Clone, Copy)]
pub enum EntityRef<'a> {
    Rule(&'a FirewallRule),
    Request(&'a AccessRequest),
}

impl<'a> EntityRef<'a> {
    #[must_use]
    pub const fn kind(self) -> EntityKind {
        match self {
            Self::Rule(_) => EntityKind::Rule,
            Self::Request(_) => EntityKind::Request,
        }
    }

    #[must_use]
    pub const fn id(self) -> EntityId {
        match self {
            Self::Rule(rule) => rule.id,
            Self::Request(request) => request.id,
        }
    }

    #[must_use]
    pub fn display_name(self) -> &'a str {
        match self {
            Self::Rule(rule) => &rule.name,
            Self::Request(request) => &request.name,
        }
    }

    #[must_use]
    pub fn embedding(self) -> Option<&'a [f32]> {
        match self {
            Self::Rule(rule) => rule.embedding.as_deref(),
            Self::Request(request) => request.embedding.as_deref(),
        }
    }

    #[must_use]
    pub fn sources(self) -> Vec<String> {
        match self {
            Self::Rule(rule) => rule.source_addresses(),
            Self::Request(request) => request.spec.sources.clone(),
        }
    }

    #[must_use]
    pub fn destinations(self) -> Vec<String> {
        match self {
            Self::Rule(rule) => rule.destination_addresses(),
            Self::Request(request) => request.spec.destinations.clone(),
        }
    }

    #[must_use]
    pub fn ports(self) -> Vec<String> {
        match self {
            Self::Rule(rule) => rule.ports.clone(),
            Self::Request(request) => request.spec.ports.clone(),
        }
    }

    #[must_use]
    pub fn details(self) -> DeficiencyDetails {
        DeficiencyDetails {
            sources: self.sources(),
            destinations: self.destinations(),
            ports: self.ports(),
        }
    }

    /// Canonical text fed to the embedding provider.
    #[must_use]
    pub fn canonical_text(self) -> String {
        match self {
            Self::Rule(rule) => rule_text(rule),
            Self::Request(request) => request_text(request),
        }
    }
}

impl<'a> From<&'a FirewallRule> for EntityRef<'a> {
    fn from(rule: &'a FirewallRule) -> Self {
        Self::Rule(rule)
    }
}

impl<'a> From<&'a AccessRequest> for EntityRef<'a> {
    fn from(request: &'a AccessRequest) -> Self {
        Self::Request(request)
    }
}
