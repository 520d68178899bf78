//! Vector types and mathematical operations.
//!
//! Vectors carry Matryoshka-style nested prefixes: the same `Vector` can be
//! queried at a shorter prefix length for a cheap coarse pass and at full
//! length for a precise rerank, without re-embedding anything.

use crate::types::NodeId;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Distance metric used to compare two vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    Cosine,
    L2,
}

impl Default for DistanceMetric {
    fn default() -> Self {
        DistanceMetric::Cosine
    }
}

/// A vector embedding with metadata.
#[derive(Debug, Clone)]
pub struct Vector {
    data: Arc<[f32]>,
    model: String,
    magnitude: Option<f32>,
}

impl Serialize for Vector {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("Vector", 3)?;
        state.serialize_field("data", &self.data.as_ref())?;
        state.serialize_field("model", &self.model)?;
        state.serialize_field("dimensions", &self.dimensions())?;
        state.end()
    }
}

impl<'de> Deserialize<'de> for Vector {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct VectorData {
            data: Vec<f32>,
            model: String,
        }

        let helper = VectorData::deserialize(deserializer)?;
        Ok(Vector::new(helper.data, helper.model))
    }
}

impl Vector {
    /// Create a new vector. Panics if `data` is empty.
    pub fn new(data: Vec<f32>, model: impl Into<String>) -> Self {
        assert!(!data.is_empty(), "vector data cannot be empty");
        Self {
            data: Arc::from(data.into_boxed_slice()),
            model: model.into(),
            magnitude: None,
        }
    }

    pub(crate) fn with_magnitude(data: Vec<f32>, model: impl Into<String>, magnitude: f32) -> Self {
        assert!(!data.is_empty(), "vector data cannot be empty");
        Self {
            data: Arc::from(data.into_boxed_slice()),
            model: model.into(),
            magnitude: Some(magnitude),
        }
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn dimensions(&self) -> usize {
        self.data.len()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Matryoshka prefix: the first `len` components as a standalone vector,
    /// usable for a coarse pass before reranking at full resolution.
    /// Returns the full vector if `len >= dimensions()`.
    pub fn prefix(&self, len: usize) -> Vector {
        let len = len.min(self.data.len()).max(1);
        Vector::new(self.data[..len].to_vec(), self.model.clone())
    }

    fn magnitude_uncached(&self) -> f32 {
        self.magnitude
            .unwrap_or_else(|| self.data.iter().map(|&x| x * x).sum::<f32>().sqrt())
    }

    /// Cosine similarity, ranging -1.0 to 1.0. `None` on dimension mismatch.
    pub fn cosine_similarity(&self, other: &Vector) -> Option<f32> {
        if self.dimensions() != other.dimensions() {
            return None;
        }

        let dot_product: f32 = self.data.iter().zip(other.data.iter()).map(|(a, b)| a * b).sum();
        let mag_a = self.magnitude_uncached();
        let mag_b = other.magnitude_uncached();

        if mag_a == 0.0 || mag_b == 0.0 {
            return Some(0.0);
        }

        Some(dot_product / (mag_a * mag_b))
    }

    pub fn euclidean_distance(&self, other: &Vector) -> Option<f32> {
        if self.dimensions() != other.dimensions() {
            return None;
        }

        let sum_sq_diff: f32 = self
            .data
            .iter()
            .zip(other.data.iter())
            .map(|(a, b)| {
                let diff = a - b;
                diff * diff
            })
            .sum();

        Some(sum_sq_diff.sqrt())
    }

    pub fn dot_product(&self, other: &Vector) -> Option<f32> {
        if self.dimensions() != other.dimensions() {
            return None;
        }

        Some(self.data.iter().zip(other.data.iter()).map(|(a, b)| a * b).sum())
    }

    /// Distance under `metric`: `1 - cosine_similarity` for `Cosine` (so
    /// smaller is always closer, matching `L2`), raw Euclidean for `L2`.
    /// `None` on dimension mismatch.
    pub fn distance(&self, other: &Vector, metric: DistanceMetric) -> Option<f32> {
        match metric {
            DistanceMetric::Cosine => self.cosine_similarity(other).map(|s| 1.0 - s),
            DistanceMetric::L2 => self.euclidean_distance(other),
        }
    }

    pub fn is_compatible_with(&self, other: &Vector) -> bool {
        self.dimensions() == other.dimensions()
    }
}

impl PartialEq for Vector {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data && self.model == other.model
    }
}

impl Eq for Vector {}

impl Hash for Vector {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for &value in self.data.iter() {
            value.to_bits().hash(state);
        }
        self.model.hash(state);
    }
}

impl PartialOrd for Vector {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.dimensions() != other.dimensions() {
            return None;
        }
        self.data.partial_cmp(&other.data)
    }
}

impl fmt::Display for Vector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Vector(dims={}, model={})", self.dimensions(), self.model)
    }
}

/// A search result containing a graph node id and its similarity score.
#[derive(Debug, Clone)]
pub struct VectorSearchResult {
    pub node_id: NodeId,
    /// Similarity in `[0, 1]` for cosine (higher = more similar), or raw
    /// negative distance for `L2` — callers that need a metric-independent
    /// ranking should compare within a single search call only.
    pub score: f32,
    pub vector: Vector,
}

impl VectorSearchResult {
    pub fn new(node_id: NodeId, score: f32, vector: Vector) -> Self {
        Self { node_id, score, vector }
    }
}

/// Options for vector search operations.
#[derive(Debug, Clone)]
pub struct VectorSearchOptions {
    pub top_k: usize,
    pub threshold: f32,
    pub model_filter: Option<String>,
    /// Matryoshka prefix length for the coarse pass. `None` searches at
    /// full resolution.
    pub prefix_len: Option<usize>,
}

impl VectorSearchOptions {
    pub fn new() -> Self {
        Self {
            top_k: 10,
            threshold: 0.0,
            model_filter: None,
            prefix_len: None,
        }
    }

    pub fn top_k(mut self, k: usize) -> Self {
        self.top_k = k;
        self
    }

    pub fn threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn model_filter(mut self, model: impl Into<String>) -> Self {
        self.model_filter = Some(model.into());
        self
    }

    pub fn prefix_len(mut self, len: usize) -> Self {
        self.prefix_len = Some(len);
        self
    }
}

impl Default for VectorSearchOptions {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vector_creation() {
        let v = Vector::new(vec![1.0, 2.0, 3.0], "test-model");
        assert_eq!(v.dimensions(), 3);
        assert_eq!(v.model(), "test-model");
        assert_eq!(v.as_slice(), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn cosine_similarity_identical() {
        let v1 = Vector::new(vec![1.0, 0.0, 0.0], "test");
        let v2 = Vector::new(vec![1.0, 0.0, 0.0], "test");
        let sim = v1.cosine_similarity(&v2).unwrap();
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_similarity_orthogonal() {
        let v1 = Vector::new(vec![1.0, 0.0], "test");
        let v2 = Vector::new(vec![0.0, 1.0], "test");
        let sim = v1.cosine_similarity(&v2).unwrap();
        assert!((sim - 0.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_similarity_mismatched_dims() {
        let v1 = Vector::new(vec![1.0, 0.0], "test");
        let v2 = Vector::new(vec![1.0, 0.0, 0.0], "test");
        assert!(v1.cosine_similarity(&v2).is_none());
    }

    #[test]
    fn euclidean_distance() {
        let v1 = Vector::new(vec![0.0, 0.0], "test");
        let v2 = Vector::new(vec![3.0, 4.0], "test");
        let dist = v1.euclidean_distance(&v2).unwrap();
        assert!((dist - 5.0).abs() < 1e-6);
    }

    #[test]
    fn distance_cosine_is_one_minus_similarity() {
        let v1 = Vector::new(vec![1.0, 0.0], "test");
        let v2 = Vector::new(vec![1.0, 0.0], "test");
        assert!((v1.distance(&v2, DistanceMetric::Cosine).unwrap() - 0.0).abs() < 1e-6);
    }

    #[test]
    fn prefix_shrinks_dimensions() {
        let v = Vector::new(vec![1.0, 2.0, 3.0, 4.0], "matryoshka");
        let short = v.prefix(2);
        assert_eq!(short.dimensions(), 2);
        assert_eq!(short.as_slice(), &[1.0, 2.0]);
    }

    #[test]
    fn prefix_longer_than_vector_returns_full() {
        let v = Vector::new(vec![1.0, 2.0], "matryoshka");
        assert_eq!(v.prefix(100).dimensions(), 2);
    }

    #[test]
    fn vector_equality() {
        let v1 = Vector::new(vec![1.0, 2.0, 3.0], "test");
        let v2 = Vector::new(vec![1.0, 2.0, 3.0], "test");
        let v3 = Vector::new(vec![1.0, 2.0, 4.0], "test");
        assert_eq!(v1, v2);
        assert_ne!(v1, v3);
    }

    #[test]
    fn search_options_builder() {
        let opts = VectorSearchOptions::new().top_k(5).threshold(0.8).prefix_len(64);
        assert_eq!(opts.top_k, 5);
        assert!((opts.threshold - 0.8).abs() < 1e-6);
        assert_eq!(opts.prefix_len, Some(64));
    }
}
