//! Common types shared across the store, the indices, and the dispatcher.
//!
//! These types are intentionally simple value objects: the store owns the
//! authoritative current-value map, the indices own their own structures,
//! and these types are what passes between them.
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

/// An opaque string identifying a value. Keys are compared bytewise.
pub type Key = String;

/// 128-bit identifier for graph nodes and edges.
pub type NodeId = u128;

/// A monotonically increasing logical clock used to timestamp changes.
///
/// The spec requires per-key monotonicity only; a single global counter
/// (rather than one per key) trivially satisfies that and also gives a
/// total order across keys, which nothing in the spec forbids.
static CLOCK: AtomicI64 = AtomicI64::new(1);

/// Produce a strictly increasing timestamp.
pub fn next_timestamp() -> i64 {
    CLOCK.fetch_add(1, Ordering::SeqCst)
}

/// Hash a key (or any stable string) down to a 128-bit node identifier.
///
/// Used by `link` to upsert graph nodes for arbitrary store keys, and by
/// the deterministic placeholder embedding when no vector is supplied.
pub fn hash_to_u128(input: &str) -> NodeId {
    let hash = blake3::hash(input.as_bytes());
    let bytes = hash.as_bytes();
    let mut buf = [0u8; 16];
    buf.copy_from_slice(&bytes[..16]);
    u128::from_be_bytes(buf)
}

/// Arbitrary string metadata attached to a stored value.
pub type Metadata = HashMap<String, String>;

/// A single change applied to a key: `(key, timestamp, content, author)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change {
    pub key: Key,
    pub timestamp: i64,
    pub content: Vec<u8>,
    pub author: String,
    pub metadata: Option<Metadata>,
}

impl Change {
    pub fn new(key: Key, timestamp: i64, content: Vec<u8>, author: impl Into<String>) -> Self {
        Self {
            key,
            timestamp,
            content,
            author: author.into(),
            metadata: None,
        }
    }
}

/// The node type tag for graph nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    File,
    Function,
    Class,
    Module,
    Package,
    Agent,
    Decision,
    Change,
}

/// The relation tag for graph edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationType {
    DependsOn,
    Contains,
    Implements,
    Calls,
    Modifies,
    CreatedBy,
    Influences,
    SimilarTo,
}

/// Result of a triple-hybrid search over a single document/node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HybridResult {
    pub id: String,
    pub path: String,
    pub bm25_score: f32,
    pub hnsw_score: f32,
    pub fre_score: f32,
    pub combined_score: f32,
    pub matching_terms: Vec<String>,
    pub semantic_similarity: Option<f32>,
    pub graph_distance: Option<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_strictly_increase() {
        let a = next_timestamp();
        let b = next_timestamp();
        assert!(b > a);
    }

    #[test]
    fn hash_is_deterministic() {
        let a = hash_to_u128("src/lib.rs");
        let b = hash_to_u128("src/lib.rs");
        let c = hash_to_u128("src/other.rs");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
