use crate::embeddings::cosine_distance;
use crate::error::{Result, VectorStoreError};
use async_trait::async_trait;
use rules_review_protocol::{round_score, EntityId};
use std::collections::BTreeMap;

/// One search hit: a stored entity id and its cosine distance to the query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub id: EntityId,
    pub distance: f64,
}

impl Neighbor {
    /// `1 - distance`, rounded to four decimals.
    #[must_use]
    pub fn similarity(&self) -> f64 {
        round_score(1.0 - self.distance)
    }
}

/// Nearest-neighbor lookup over the stored vectors of one entity kind.
///
/// Results come back ordered by ascending cosine distance. The order among
/// equal distances is unspecified and may differ between backends. Entities
/// without a vector are never returned. Fewer than `k` stored vectors (or
/// none at all) yields a shorter (or empty) result, not an error.
#[async_trait]
pub trait SimilaritySearch: Send + Sync {
    async fn nearest(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>>;
}

/// Exact in-memory cosine index (brute force; O(n) per query).
#[derive(Debug, Clone)]
pub struct VectorIndex {
    dimension: usize,
    vectors: BTreeMap<EntityId, Vec<f32>>,
}

impl VectorIndex {
    #[must_use]
    pub const fn new(dimension: usize) -> Self {
        Self {
            dimension,
            vectors: BTreeMap::new(),
        }
    }

    /// Builds an index from `(id, vector)` pairs, skipping entries that have
    /// no vector.
    pub fn build<'a, I>(dimension: usize, entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (EntityId, Option<&'a [f32]>)>,
    {
        let mut index = Self::new(dimension);
        for (id, vector) in entries {
            if let Some(vector) = vector {
                index.add(id, vector)?;
            }
        }
        Ok(index)
    }

    /// Add vector to index, replacing any previous vector for `id`
    pub fn add(&mut self, id: EntityId, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(VectorStoreError::InvalidDimension {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        self.vectors.insert(id, vector.to_vec());
        Ok(())
    }

    pub fn remove(&mut self, id: EntityId) -> bool {
        self.vectors.remove(&id).is_some()
    }

    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.vectors.contains_key(&id)
    }

    /// Search for the k nearest vectors by cosine distance, ascending
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if k == 0 || self.vectors.is_empty() {
            return Ok(Vec::new());
        }
        if query.len() != self.dimension {
            return Err(VectorStoreError::InvalidDimension {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        let mut neighbors: Vec<Neighbor> = self
            .vectors
            .iter()
            .map(|(id, vector)| Neighbor {
                id: *id,
                distance: cosine_distance(query, vector),
            })
            .collect();

        neighbors.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        neighbors.truncate(k);

        Ok(neighbors)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }
}

#[async_trait]
impl SimilaritySearch for VectorIndex {
    async fn nearest(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        self.search(query, k)
    }
}
