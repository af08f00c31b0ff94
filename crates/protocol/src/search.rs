use crate::{EntityId, EntityKind};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SearchScope {
    Rules,
    Requests,
    #[default]
    Both,
}

impl SearchScope {
    #[must_use]
    pub const fn includes(self, kind: EntityKind) -> bool {
        matches!(
            (self, kind),
            (Self::Both, _) | (Self::Rules, EntityKind::Rule) | (Self::Requests, EntityKind::Request)
        )
    }
}

impl std::str::FromStr for SearchScope {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "rules" => Ok(Self::Rules),
            "requests" => Ok(Self::Requests),
            "both" => Ok(Self::Both),
            other => Err(format!(
                "unknown search scope '{other}' (expected 'rules', 'requests' or 'both')"
            )),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SimilarEntity {
    pub kind: EntityKind,
    pub id: EntityId,
    pub name: String,
    pub sources: Vec<String>,
    pub destinations: Vec<String>,
    pub ports: Vec<String>,
    pub similarity_score: f64,
    pub similarity_percent: i64,
}

/// Entities similar to a stored rule or request.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SimilarityQueryResult {
    pub query_kind: EntityKind,
    pub query_id: EntityId,
    pub query_text: String,
    pub matches: Vec<SimilarEntity>,
    pub total_matches: usize,
    pub threshold_used: f64,
}

/// Entities similar to a free-form text query.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TextSearchResult {
    pub query: String,
    pub matches: Vec<SimilarEntity>,
    pub total_matches: usize,
    pub threshold_used: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub struct EmbeddingCoverage {
    pub total_requests: usize,
    pub requests_with_embeddings: usize,
    pub total_rules: usize,
    pub rules_with_embeddings: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct EmbeddingFailure {
    pub kind: EntityKind,
    pub id: EntityId,
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct EmbeddingReport {
    pub requests_generated: usize,
    pub rules_generated: usize,
    pub requests_skipped: usize,
    pub rules_skipped: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<EmbeddingFailure>,
}
