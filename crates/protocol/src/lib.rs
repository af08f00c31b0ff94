//! Shared data model for reconciling declared access requests against
//! implemented firewall rules.
//!
//! Entities live here together with the run results both review tracks
//! produce, so storage, engines and the CLI agree on one serde shape.

use serde::{Deserialize, Serialize};
use std::fmt;

pub mod review;
pub mod search;

pub use review::{
    Deficiency, DeficiencyDetails, DeficiencyKind, MatchedPair, ReviewResult, ReviewSummary,
    SemanticCandidate, SemanticDeficiency, SemanticMatchedPair, SemanticReviewResult,
    SemanticUnmatchedRequest, SemanticUnmatchedRule, UnmatchedReason, UnmatchedRequest,
    UnmatchedRule,
};
pub use search::{
    EmbeddingCoverage, EmbeddingFailure, EmbeddingReport, SearchScope, SimilarEntity,
    SimilarityQueryResult, TextSearchResult,
};

pub type EntityId = i64;

pub const INVENTORY_SCHEMA_VERSION: u32 = 1;

/// Rounds a similarity score to the four decimals used for display,
/// storage and threshold comparison.
#[must_use]
pub fn round_score(score: f64) -> f64 {
    (score * 10_000.0).round() / 10_000.0
}

#[must_use]
pub fn similarity_percent(score: f64) -> i64 {
    #[allow(clippy::cast_possible_truncation)]
    let percent = (score * 100.0).round() as i64;
    percent
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Rule,
    Request,
}

impl EntityKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Rule => "rule",
            Self::Request => "request",
        }
    }

    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Rule => Self::Request,
            Self::Request => Self::Rule,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle marker of a request. Not an input to reconciliation.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    #[default]
    Pending,
    Completed,
}

impl RequestStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
        }
    }
}

impl std::str::FromStr for RequestStatus {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            other => Err(format!(
                "unknown request status '{other}' (expected 'pending' or 'completed')"
            )),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum RuleAction {
    #[default]
    Allow,
    Deny,
}

impl RuleAction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Deny => "deny",
        }
    }
}

impl std::str::FromStr for RuleAction {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "allow" => Ok(Self::Allow),
            "deny" => Ok(Self::Deny),
            other => Err(format!(
                "unknown rule action '{other}' (expected 'allow' or 'deny')"
            )),
        }
    }
}

/// The structured body of an access request.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct RequestSpec {
    pub sources: Vec<String>,
    pub destinations: Vec<String>,
    pub ports: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AccessRequest {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub status: RequestStatus,
    pub spec: RequestSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

/// A single source or destination address owned by a rule.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct AddressEntry {
    pub id: EntityId,
    pub address: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct FirewallRule {
    pub id: EntityId,
    pub name: String,
    pub device: String,
    #[serde(default)]
    pub action: RuleAction,
    pub ports: Vec<String>,
    #[serde(default)]
    pub sources: Vec<AddressEntry>,
    #[serde(default)]
    pub destinations: Vec<AddressEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl FirewallRule {
    #[must_use]
    pub fn source_addresses(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.address.clone()).collect()
    }

    #[must_use]
    pub fn destination_addresses(&self) -> Vec<String> {
        self.destinations.iter().map(|d| d.address.clone()).collect()
    }
}

/// Payload for submitting a new request.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct NewRequest {
    pub name: String,
    #[serde(alias = "request_json")]
    pub spec: RequestSpec,
}

/// Payload for recording a new implemented rule.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct NewRule {
    #[serde(alias = "rule_name")]
    pub name: String,
    #[serde(alias = "firewall_device")]
    pub device: String,
    #[serde(default)]
    pub action: RuleAction,
    pub ports: Vec<String>,
    pub sources: Vec<String>,
    pub destinations: Vec<String>,
}
