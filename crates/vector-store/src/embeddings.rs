use crate::error::{Result, VectorStoreError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingMode {
    /// Embeddings come from a model server over HTTP.
    #[default]
    Remote,
    /// Deterministic local hashing embedder, no model server needed.
    Stub,
}

impl EmbeddingMode {
    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Self::Remote => "remote",
            Self::Stub => "stub",
        }
    }
}

impl Display for EmbeddingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

impl std::str::FromStr for EmbeddingMode {
    type Err = VectorStoreError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "remote" => Ok(Self::Remote),
            "stub" => Ok(Self::Stub),
            other => Err(VectorStoreError::EmbeddingError(format!(
                "Unsupported embedding mode '{other}' (expected 'remote' or 'stub')"
            ))),
        }
    }
}

/// Maps text to a fixed-dimension vector.
///
/// Implementations may be slow and may fail; callers treat a failure as
/// fatal for the text (or batch) being embedded and never retry implicitly.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn model_id(&self) -> &str;

    fn dimension(&self) -> usize;

    async fn embed_batch(&self, texts: Vec<&str>) -> Result<Vec<Vec<f32>>>;

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut embeddings = self.embed_batch(vec![text]).await?;
        embeddings
            .pop()
            .ok_or_else(|| VectorStoreError::EmbeddingError("Empty embedding result".to_string()))
    }
}

pub const STUB_MODEL_ID: &str = "stub-hashed-trigrams";

/// Feature-hashing embedder over words and character trigrams.
///
/// Texts that share vocabulary land close together, which is all the
/// canonical rule/request texts need when no model server is available.
#[derive(Clone, Debug)]
pub struct StubEmbedder {
    dimension: usize,
}

impl StubEmbedder {
    #[must_use]
    pub const fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    #[must_use]
    pub fn embed_now(&self, text: &str) -> Vec<f32> {
        stub_embed(text, self.dimension)
    }
}

#[async_trait]
impl EmbeddingProvider for StubEmbedder {
    fn model_id(&self) -> &str {
        STUB_MODEL_ID
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed_batch(&self, texts: Vec<&str>) -> Result<Vec<Vec<f32>>> {
        Ok(texts.into_iter().map(|text| self.embed_now(text)).collect())
    }
}

pub(crate) const fn ensure_dimension(vec: &[f32], expected: usize) -> Result<()> {
    if vec.len() != expected {
        return Err(VectorStoreError::InvalidDimension {
            expected,
            actual: vec.len(),
        });
    }
    Ok(())
}

/// Cosine similarity in `[-1, 1]`; `0.0` when either side has zero norm or
/// the lengths differ.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| f64::from(*x) * f64::from(*y))
        .sum();
    let norm_a: f64 = a.iter().map(|x| f64::from(*x).powi(2)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| f64::from(*x).powi(2)).sum::<f64>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

#[must_use]
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f64 {
    1.0 - cosine_similarity(a, b)
}

fn normalize(vec: &mut [f32]) {
    let norm = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm == 0.0 {
        return;
    }
    for value in vec {
        *value /= norm;
    }
}

fn stub_embed(text: &str, dimension: usize) -> Vec<f32> {
    let mut vec = vec![0.0f32; dimension];
    if dimension == 0 {
        return vec;
    }
    for feature in text_features(text) {
        let hash = fnv1a_64(feature.as_bytes());
        #[allow(clippy::cast_possible_truncation)]
        let slot = (hash % dimension as u64) as usize;
        let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
        vec[slot] += sign;
    }
    normalize(&mut vec);
    vec
}

fn text_features(text: &str) -> Vec<String> {
    let mut features = Vec::new();
    for word in text.split_whitespace() {
        features.push(format!("w:{word}"));
        let padded: Vec<char> = format!(" {word} ").chars().collect();
        for window in padded.windows(3) {
            let trigram: String = window.iter().collect();
            features.push(format!("c:{trigram}"));
        }
    }
    features
}

fn fnv1a_64(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        let sim = cosine_similarity(&a, &b);
        assert!((sim - 1.0).abs() < 1e-9);

        let c = vec![1.0, 0.0];
        let d = vec![0.0, 1.0];
        assert!(cosine_similarity(&c, &d).abs() < 1e-9);
        assert!((cosine_distance(&c, &d) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn cosine_similarity_degenerate_inputs() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn stub_embeddings_are_deterministic_and_normalized() {
        let embedder = StubEmbedder::new(64);
        let first = embedder.embed_now("rule web allow sources host 10.0.1.10");
        let second = embedder.embed_now("rule web allow sources host 10.0.1.10");
        assert_eq!(first, second);
        assert_eq!(first.len(), 64);
        let norm: f32 = first.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn stub_embedding_of_empty_text_is_zero() {
        let embedder = StubEmbedder::new(8);
        assert!(embedder.embed_now("   ").iter().all(|v| *v == 0.0));
    }

    #[test]
    fn stub_embeddings_reward_shared_vocabulary() {
        let embedder = StubEmbedder::new(256);
        let subnet = embedder.embed_now("subnet 10.0.10.0/24 range 10.0.10.0 to 10.0.10.255");
        let range = embedder.embed_now("range 10.0.10.0 to 10.0.10.255 subnet 10.0.10.0/24");
        let unrelated = embedder.embed_now("host 192.168.77.3 ports 22");
        assert!((cosine_similarity(&subnet, &range) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&subnet, &unrelated) < 0.5);
    }

    #[tokio::test]
    async fn stub_provider_embeds_batches_in_order() {
        let embedder = StubEmbedder::new(32);
        let batch = embedder.embed_batch(vec!["alpha", "beta"]).await.unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0], embedder.embed_now("alpha"));
        assert_eq!(batch[1], embedder.embed_now("beta"));
        assert_eq!(embedder.embed("beta").await.unwrap(), batch[1]);
        assert!(embedder.embed_batch(vec![]).await.unwrap().is_empty());
    }

    #[test]
    fn mode_parses() {
        assert_eq!("STUB".parse::<EmbeddingMode>().unwrap(), EmbeddingMode::Stub);
        assert_eq!("remote".parse::<EmbeddingMode>().unwrap(), EmbeddingMode::Remote);
        assert!("gpu".parse::<EmbeddingMode>().is_err());
    }

    #[test]
    fn ensure_dimension_reports_mismatch() {
        let err = ensure_dimension(&[1.0, 2.0], 3).unwrap_err();
        assert!(matches!(
            err,
            VectorStoreError::InvalidDimension {
                expected: 3,
                actual: 2
            }
        ));
    }
}
