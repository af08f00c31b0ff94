use crate::error::{ReviewError, Result};
use rules_review_vector_store::{EmbeddingMode, EmbeddingProvider, OllamaEmbedder, StubEmbedder};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const CONFIG_PATH_ENV: &str = "RULES_REVIEW_CONFIG";
const THRESHOLD_ENV: &str = "RULES_REVIEW_SIMILARITY_THRESHOLD";
const MODE_ENV: &str = "RULES_REVIEW_EMBEDDING_MODE";
const BASE_URL_ENV: &str = "RULES_REVIEW_OLLAMA_URL";
const MODEL_ENV: &str = "RULES_REVIEW_EMBEDDING_MODEL";
const DIMENSION_ENV: &str = "RULES_REVIEW_EMBEDDING_DIM";

/// Process-wide settings, read once at start-up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewConfig {
    /// Default minimum similarity for a semantic match, in `[0, 1]`
    pub similarity_threshold: f64,

    pub embedding: EmbeddingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub mode: EmbeddingMode,

    /// Base URL of the embedding server
    pub base_url: String,

    pub model: String,

    /// Length of every stored vector
    pub dimension: usize,

    /// Timeout for a single-text embedding call (seconds)
    pub request_timeout_secs: u64,

    /// Timeout for a batch embedding call (seconds)
    pub batch_timeout_secs: u64,

    /// Texts per `embed_batch` call during bulk generation
    pub batch_size: usize,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.7,
            embedding: EmbeddingConfig::default(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            mode: EmbeddingMode::Remote,
            base_url: "http://localhost:11434".to_string(),
            model: "qwen3-embedding".to_string(),
            dimension: 1024,
            request_timeout_secs: 120,
            batch_timeout_secs: 300,
            batch_size: 32,
        }
    }
}

impl ReviewConfig {
    /// Defaults, then the TOML file (when given), then environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_toml_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Applies overrides from a variable lookup (the process environment in
    /// production).
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(raw) = lookup(THRESHOLD_ENV) {
            self.similarity_threshold = raw.trim().parse().map_err(|_| {
                ReviewError::InvalidConfig(format!("{THRESHOLD_ENV}='{raw}' is not a number"))
            })?;
        }
        if let Some(raw) = lookup(MODE_ENV) {
            self.embedding.mode = raw
                .parse()
                .map_err(|e| ReviewError::InvalidConfig(format!("{MODE_ENV}: {e}")))?;
        }
        if let Some(raw) = lookup(BASE_URL_ENV) {
            self.embedding.base_url = raw;
        }
        if let Some(raw) = lookup(MODEL_ENV) {
            self.embedding.model = raw;
        }
        if let Some(raw) = lookup(DIMENSION_ENV) {
            self.embedding.dimension = raw.trim().parse().map_err(|_| {
                ReviewError::InvalidConfig(format!("{DIMENSION_ENV}='{raw}' is not a positive integer"))
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(ReviewError::InvalidConfig(format!(
                "similarity_threshold ({}) must be within [0, 1]",
                self.similarity_threshold
            )));
        }
        self.embedding.validate()
    }
}

impl EmbeddingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.dimension == 0 {
            return Err(ReviewError::InvalidConfig(
                "embedding.dimension must be > 0".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(ReviewError::InvalidConfig(
                "embedding.batch_size must be > 0".to_string(),
            ));
        }
        if self.mode == EmbeddingMode::Remote {
            if self.base_url.trim().is_empty() {
                return Err(ReviewError::InvalidConfig(
                    "embedding.base_url is empty".to_string(),
                ));
            }
            if self.model.trim().is_empty() {
                return Err(ReviewError::InvalidConfig(
                    "embedding.model is empty".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Instantiates the configured embedding backend.
    pub fn build_provider(&self) -> Result<Box<dyn EmbeddingProvider>> {
        match self.mode {
            EmbeddingMode::Stub => Ok(Box::new(StubEmbedder::new(self.dimension))),
            EmbeddingMode::Remote => {
                let embedder = OllamaEmbedder::new(&self.base_url, &self.model, self.dimension)?
                    .with_timeouts(
                        Duration::from_secs(self.request_timeout_secs),
                        Duration::from_secs(self.batch_timeout_secs),
                    );
                Ok(Box::new(embedder))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    #[test]
    fn defaults_are_valid() {
        let config = ReviewConfig::default();
        config.validate().unwrap();
        assert_eq!(config.similarity_threshold, 0.7);
        assert_eq!(config.embedding.dimension, 1024);
        assert_eq!(config.embedding.model, "qwen3-embedding");
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = ReviewConfig::from_toml_str(
            r#"
            similarity_threshold = 0.85

            [embedding]
            mode = "stub"
            dimension = 256
            "#,
        )
        .unwrap();
        assert_eq!(config.similarity_threshold, 0.85);
        assert_eq!(config.embedding.mode, EmbeddingMode::Stub);
        assert_eq!(config.embedding.dimension, 256);
        assert_eq!(config.embedding.batch_size, 32);
        assert_eq!(config.embedding.base_url, "http://localhost:11434");
    }

    #[test]
    fn env_overrides_win() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("RULES_REVIEW_SIMILARITY_THRESHOLD", "0.9"),
            ("RULES_REVIEW_EMBEDDING_MODE", "stub"),
            ("RULES_REVIEW_EMBEDDING_DIM", "64"),
            ("RULES_REVIEW_EMBEDDING_MODEL", "nomic-embed-text"),
        ]);
        let mut config = ReviewConfig::default();
        config
            .apply_env_overrides(|key| env.get(key).map(ToString::to_string))
            .unwrap();
        assert_eq!(config.similarity_threshold, 0.9);
        assert_eq!(config.embedding.mode, EmbeddingMode::Stub);
        assert_eq!(config.embedding.dimension, 64);
        assert_eq!(config.embedding.model, "nomic-embed-text");
    }

    #[test]
    fn bad_env_values_are_config_errors() {
        let mut config = ReviewConfig::default();
        let err = config
            .apply_env_overrides(|key| {
                (key == "RULES_REVIEW_SIMILARITY_THRESHOLD").then(|| "high".to_string())
            })
            .unwrap_err();
        assert!(matches!(err, ReviewError::InvalidConfig(_)));
    }

    #[test]
    fn validation_rejects_out_of_range_values() {
        let mut config = ReviewConfig {
            similarity_threshold: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        config.similarity_threshold = 0.5;
        config.embedding.dimension = 0;
        assert!(config.validate().is_err());

        config.embedding.dimension = 8;
        config.embedding.batch_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn builds_stub_provider() {
        let config = EmbeddingConfig {
            mode: EmbeddingMode::Stub,
            dimension: 16,
            ..Default::default()
        };
        let provider = config.build_provider().unwrap();
        assert_eq!(provider.dimension(), 16);
        assert_eq!(provider.model_id(), rules_review_vector_store::STUB_MODEL_ID);
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("review.toml");
        std::fs::write(&path, "[embedding]\nmode = \"stub\"\ndimension = 32\n").unwrap();
        let config = ReviewConfig::from_toml_file(&path).unwrap();
        assert_eq!(config.embedding.dimension, 32);
    }
}
