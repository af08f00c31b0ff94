use crate::{similarity_percent, EntityId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DeficiencyKind {
    /// An implemented rule with no declared request behind it.
    NoMatchingRequest,
    /// A declared request that was never implemented as a rule.
    NoMatchingRule,
}

impl DeficiencyKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NoMatchingRequest => "no_matching_request",
            Self::NoMatchingRule => "no_matching_rule",
        }
    }
}

impl std::str::FromStr for DeficiencyKind {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim() {
            "no_matching_request" => Ok(Self::NoMatchingRequest),
            "no_matching_rule" => Ok(Self::NoMatchingRule),
            other => Err(format!(
                "unknown deficiency kind '{other}' (expected 'no_matching_request' or 'no_matching_rule')"
            )),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct DeficiencyDetails {
    pub sources: Vec<String>,
    pub destinations: Vec<String>,
    pub ports: Vec<String>,
}

/// Exact-track audit record for one unmatched rule or request.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Deficiency {
    pub id: u64,
    pub kind: DeficiencyKind,
    pub rule_id: Option<EntityId>,
    pub request_id: Option<EntityId>,
    pub details: DeficiencyDetails,
}

/// Semantic-track audit record. Keeps the best candidate that was
/// considered even when it scored below the threshold.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SemanticDeficiency {
    pub id: u64,
    pub kind: DeficiencyKind,
    pub rule_id: Option<EntityId>,
    pub request_id: Option<EntityId>,
    pub best_match_request_id: Option<EntityId>,
    pub best_match_rule_id: Option<EntityId>,
    pub similarity_score: Option<f64>,
    pub threshold_used: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct MatchedPair {
    pub rule_id: EntityId,
    pub request_id: EntityId,
    pub sources: Vec<String>,
    pub destinations: Vec<String>,
    pub ports: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct UnmatchedRule {
    pub deficiency_id: u64,
    pub rule_id: EntityId,
    pub rule_name: String,
    pub sources: Vec<String>,
    pub destinations: Vec<String>,
    pub ports: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct UnmatchedRequest {
    pub deficiency_id: u64,
    pub request_id: EntityId,
    pub name: String,
    pub sources: Vec<String>,
    pub destinations: Vec<String>,
    pub ports: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ReviewSummary {
    pub total_rules: usize,
    pub total_requests: usize,
    pub matched_count: usize,
    pub unmatched_rules_count: usize,
    pub unmatched_requests_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold_used: Option<f64>,
}

/// Outcome of one exact review run, including the deficiency snapshot it
/// generated.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ReviewResult {
    pub matched: Vec<MatchedPair>,
    pub unmatched_rules: Vec<UnmatchedRule>,
    pub unmatched_requests: Vec<UnmatchedRequest>,
    pub deficiencies: Vec<Deficiency>,
    pub summary: ReviewSummary,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SemanticMatchedPair {
    pub rule_id: EntityId,
    pub request_id: EntityId,
    pub rule_name: String,
    pub request_name: String,
    pub sources: Vec<String>,
    pub destinations: Vec<String>,
    pub ports: Vec<String>,
    pub similarity_score: f64,
    pub similarity_percent: i64,
}

/// Nearest entity of the opposite kind considered for an unmatched item.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SemanticCandidate {
    pub id: EntityId,
    pub name: String,
    pub similarity_score: f64,
    pub similarity_percent: i64,
}

impl SemanticCandidate {
    #[must_use]
    pub fn new(id: EntityId, name: impl Into<String>, similarity_score: f64) -> Self {
        Self {
            id,
            name: name.into(),
            similarity_score,
            similarity_percent: similarity_percent(similarity_score),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum UnmatchedReason {
    /// The item has no stored embedding.
    NoEmbedding,
    /// The opposite set holds no embedded entity to compare against.
    NoCandidate,
    /// The nearest candidate scored below the threshold.
    BelowThreshold,
    /// The nearest rule scored at or above the threshold but was paired with
    /// a different request in the rule-driven pass.
    CandidatePairedElsewhere,
}

impl UnmatchedReason {
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::NoEmbedding => "no embedding; generate embeddings first",
            Self::NoCandidate => "no embedded candidate of the opposite kind",
            Self::BelowThreshold => "no semantically similar counterpart above threshold",
            Self::CandidatePairedElsewhere => {
                "best matching rule was paired with a different request"
            }
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SemanticUnmatchedRule {
    pub semantic_deficiency_id: u64,
    pub rule_id: EntityId,
    pub rule_name: String,
    pub sources: Vec<String>,
    pub destinations: Vec<String>,
    pub ports: Vec<String>,
    pub best_match: Option<SemanticCandidate>,
    pub reason: UnmatchedReason,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SemanticUnmatchedRequest {
    pub semantic_deficiency_id: u64,
    pub request_id: EntityId,
    pub request_name: String,
    pub sources: Vec<String>,
    pub destinations: Vec<String>,
    pub ports: Vec<String>,
    pub best_match: Option<SemanticCandidate>,
    pub reason: UnmatchedReason,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SemanticReviewResult {
    pub matched: Vec<SemanticMatchedPair>,
    pub unmatched_rules: Vec<SemanticUnmatchedRule>,
    pub unmatched_requests: Vec<SemanticUnmatchedRequest>,
    pub deficiencies: Vec<SemanticDeficiency>,
    pub summary: ReviewSummary,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deficiency_kind_round_trips_through_str() {
        for kind in [DeficiencyKind::NoMatchingRequest, DeficiencyKind::NoMatchingRule] {
            assert_eq!(kind.as_str().parse::<DeficiencyKind>(), Ok(kind));
            assert_eq!(
                serde_json::to_string(&kind).unwrap(),
                format!("\"{}\"", kind.as_str())
            );
        }
    }

    #[test]
    fn exact_summary_omits_threshold() {
        let summary = ReviewSummary {
            total_rules: 1,
            total_requests: 1,
            matched_count: 1,
            unmatched_rules_count: 0,
            unmatched_requests_count: 0,
            threshold_used: None,
        };
        let json = serde_json::to_value(&summary).unwrap();
        assert!(json.get("threshold_used").is_none());
    }

    #[test]
    fn scores_serialize_with_percent() {
        let pair = SemanticMatchedPair {
            rule_id: 1,
            request_id: 1,
            rule_name: "web-to-db".to_string(),
            request_name: "web-to-db".to_string(),
            sources: Vec::new(),
            destinations: Vec::new(),
            ports: Vec::new(),
            similarity_score: 0.875,
            similarity_percent: similarity_percent(0.875),
        };
        let json = serde_json::to_value(&pair).unwrap();
        assert_eq!(json["similarity_score"], 0.875);
        assert_eq!(json["similarity_percent"], 88);

        let candidate = serde_json::to_value(SemanticCandidate::new(7, "backup", 0.6625)).unwrap();
        assert_eq!(candidate["similarity_percent"], 66);
    }
}
