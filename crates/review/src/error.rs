use rules_review_protocol::{EntityId, EntityKind};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ReviewError>;

#[derive(Error, Debug)]
pub enum ReviewError {
    #[error("Vector store error: {0}")]
    VectorStoreError(#[from] rules_review_vector_store::VectorStoreError),

    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: EntityId },

    #[error("{track} deficiency {id} not found")]
    DeficiencyNotFound { track: &'static str, id: u64 },

    #[error("Similarity threshold {0} is outside [0, 1]")]
    InvalidThreshold(f64),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unsupported inventory schema_version {found} (expected {expected})")]
    UnsupportedSchema { found: u32, expected: u32 },

    /// The similarity backend returned an id that is not part of the entity
    /// set under review.
    #[error("Similarity search returned unknown {kind} {id}")]
    StaleIndex { kind: EntityKind, id: EntityId },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    ConfigParseError(#[from] toml::de::Error),
}

impl ReviewError {
    pub const fn not_found(kind: EntityKind, id: EntityId) -> Self {
        Self::NotFound { kind, id }
    }

    /// Client errors (bad id, bad threshold) as opposed to collaborator or
    /// storage failures.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. }
                | Self::DeficiencyNotFound { .. }
                | Self::InvalidThreshold(_)
                | Self::InvalidInput(_)
        )
    }
}

pub(crate) fn check_threshold(threshold: f64) -> Result<f64> {
    if (0.0..=1.0).contains(&threshold) {
        Ok(threshold)
    } else {
        Err(ReviewError::InvalidThreshold(threshold))
    }
}
