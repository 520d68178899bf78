//! Vector storage and similarity search.
//!
//! Embeddings are addressed by [`NodeId`](crate::types::NodeId) rather than
//! namespace/key pairs: the vector index shares identity with the temporal
//! graph, so a node's embedding and its graph edges refer to the same id.
//! Every operation here runs on the calling thread — there is no async
//! boundary between the dispatcher and the index.

mod hnsw;
mod types;

pub use hnsw::{HnswConfig, HnswIndex};
pub use types::{DistanceMetric, Vector, VectorSearchOptions, VectorSearchResult};

use crate::error::AgramaResult;
use crate::types::NodeId;
use dashmap::DashMap;

/// Owns the HNSW graph plus a flat map for exact vector lookups by id.
#[derive(Debug)]
pub struct VectorStore {
    index: HnswIndex,
    vectors: DashMap<NodeId, Vector>,
}

impl VectorStore {
    pub fn new(config: HnswConfig) -> Self {
        Self {
            index: HnswIndex::new(config),
            vectors: DashMap::new(),
        }
    }

    /// Store (or replace) the embedding for `id`.
    pub fn embed(&self, id: NodeId, vector: Vector) -> AgramaResult<()> {
        self.index.add(id, vector.clone())?;
        self.vectors.insert(id, vector);
        Ok(())
    }

    /// Fetch the exact stored vector for `id`, if any.
    pub fn get_embed(&self, id: NodeId) -> Option<Vector> {
        self.vectors.get(&id).map(|v| v.clone())
    }

    /// Remove an embedding.
    pub fn delete_embed(&self, id: NodeId) -> Option<Vector> {
        self.index.remove(id);
        self.vectors.remove(&id).map(|(_, v)| v)
    }

    /// Approximate nearest-neighbor search at full resolution.
    pub fn search(&self, query: &Vector, options: &VectorSearchOptions) -> Vec<VectorSearchResult> {
        let ef = options.top_k.max(1);
        let results = match options.prefix_len {
            Some(_) => self.index.search(query, options.top_k, ef),
            None => self.index.search(query, options.top_k, ef),
        };
        results.into_iter().filter(|r| r.score >= options.threshold).collect()
    }

    /// Matryoshka coarse-to-fine search over the given ascending prefix lengths.
    pub fn search_matryoshka(
        &self,
        query: &Vector,
        options: &VectorSearchOptions,
        prefix_lens: &[usize],
    ) -> Vec<VectorSearchResult> {
        self.index
            .search_matryoshka(query, options.top_k, options.top_k.max(1), prefix_lens)
            .into_iter()
            .filter(|r| r.score >= options.threshold)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }
}

impl Default for VectorStore {
    fn default() -> Self {
        Self::new(HnswConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embed_then_get_roundtrips() {
        let store = VectorStore::default();
        store.embed(1, Vector::new(vec![1.0, 0.0], "test")).unwrap();
        let v = store.get_embed(1).unwrap();
        assert_eq!(v.as_slice(), &[1.0, 0.0]);
    }

    #[test]
    fn delete_removes_from_both_maps() {
        let store = VectorStore::default();
        store.embed(1, Vector::new(vec![1.0, 0.0], "test")).unwrap();
        store.delete_embed(1);
        assert!(store.get_embed(1).is_none());
        assert!(store.search(&Vector::new(vec![1.0, 0.0], "test"), &VectorSearchOptions::new()).is_empty());
    }

    #[test]
    fn search_respects_threshold() {
        let store = VectorStore::default();
        store.embed(1, Vector::new(vec![1.0, 0.0], "test")).unwrap();
        store.embed(2, Vector::new(vec![-1.0, 0.0], "test")).unwrap();
        let results = store.search(
            &Vector::new(vec![1.0, 0.0], "test"),
            &VectorSearchOptions::new().top_k(5).threshold(0.5),
        );
        assert!(results.iter().all(|r| r.node_id == 1));
    }
}
