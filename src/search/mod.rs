//! Triple-hybrid search: weighted fusion of BM25, HNSW, and FRE scores.
use crate::bm25::Bm25Index;
use crate::error::{AgramaError, AgramaResult};
use crate::graph::fre::FrontierReductionEngine;
use crate::graph::{Direction, TemporalGraph};
use crate::types::{HybridResult, NodeId};
use crate::vector::{Vector, VectorSearchOptions, VectorStore};
use std::collections::HashMap;
use tracing::debug;

/// Hops the FRE pass walks from `starting_nodes` when the caller does not
/// specify one, matching the default in the dispatcher's search parameters.
pub const DEFAULT_MAX_GRAPH_HOPS: u32 = 3;

/// Weighted fusion parameters. Defaults match the reference configuration:
/// lexical and semantic signal weighted equally, with a smaller weight for
/// graph proximity.
#[derive(Debug, Clone, Copy)]
pub struct HybridWeights {
    pub alpha: f32,
    pub beta: f32,
    pub gamma: f32,
}

impl Default for HybridWeights {
    fn default() -> Self {
        Self { alpha: 0.4, beta: 0.4, gamma: 0.2 }
    }
}

impl HybridWeights {
    pub fn validate(&self) -> AgramaResult<()> {
        if self.alpha < 0.0 || self.beta < 0.0 || self.gamma < 0.0 {
            return Err(AgramaError::invalid("hybrid weights must be non-negative"));
        }
        if self.alpha + self.beta + self.gamma > 1.0 + 1e-6 {
            return Err(AgramaError::invalid("hybrid weights must sum to at most 1.0"));
        }
        Ok(())
    }

    /// Fuse three already-normalized `[0, 1]` scores into a single score.
    pub fn combine(&self, bm25_norm: f32, hnsw_norm: f32, fre_norm: f32) -> f32 {
        self.alpha * bm25_norm + self.beta * hnsw_norm + self.gamma * fre_norm
    }
}

/// Ties BM25, the HNSW vector index, and the Frontier Reduction Engine
/// together into a single ranked result set.
pub struct TripleHybridSearch<'a> {
    bm25: &'a Bm25Index,
    vectors: &'a VectorStore,
    graph: &'a TemporalGraph,
    weights: HybridWeights,
}

fn normalize(scores: &HashMap<NodeId, f32>) -> HashMap<NodeId, f32> {
    let max = scores.values().copied().fold(0.0f32, f32::max);
    if max <= 0.0 {
        return scores.keys().map(|&id| (id, 0.0)).collect();
    }
    scores.iter().map(|(&id, &s)| (id, (s / max).clamp(0.0, 1.0))).collect()
}

impl<'a> TripleHybridSearch<'a> {
    pub fn new(bm25: &'a Bm25Index, vectors: &'a VectorStore, graph: &'a TemporalGraph) -> Self {
        Self { bm25, vectors, graph, weights: HybridWeights::default() }
    }

    pub fn with_weights(mut self, weights: HybridWeights) -> AgramaResult<Self> {
        weights.validate()?;
        self.weights = weights;
        Ok(self)
    }

    /// Run the fused pipeline: BM25 lexical candidates, HNSW semantic
    /// candidates against `query_vector` (if supplied), and FRE forward
    /// reachability from `starting_nodes` (if non-empty). Scores from each
    /// engine are independently normalized to `[0, 1]` by dividing by the
    /// max score observed in that engine's result set before fusion, so no
    /// single engine's raw scale dominates just because it runs on a
    /// different range of numbers.
    pub fn search(
        &self,
        query_text: &str,
        query_vector: Option<&Vector>,
        starting_nodes: &[NodeId],
        k_per_engine: usize,
        k: usize,
        max_graph_hops: u32,
    ) -> Vec<HybridResult> {
        debug!(query = query_text, starting_nodes = starting_nodes.len(), k, max_graph_hops, "hybrid search");
        let bm25_matches = self.bm25.search(query_text, k_per_engine);
        let bm25_raw: HashMap<NodeId, f32> =
            bm25_matches.iter().map(|m| (m.doc_id as NodeId, m.score)).collect();
        let matching_terms: HashMap<NodeId, Vec<String>> =
            bm25_matches.iter().map(|m| (m.doc_id as NodeId, m.matching_terms.clone())).collect();
        let paths: HashMap<NodeId, String> = bm25_matches.iter().map(|m| (m.doc_id as NodeId, m.path.clone())).collect();

        let hnsw_raw: HashMap<NodeId, f32> = if let Some(query_vector) = query_vector {
            let ef = k_per_engine.max(64);
            let options = VectorSearchOptions::new().top_k(ef);
            self.vectors
                .search(query_vector, &options)
                .into_iter()
                .map(|r| (r.node_id, r.score.max(0.0)))
                .collect()
        } else {
            HashMap::new()
        };

        let fre_raw: HashMap<NodeId, f32> = if starting_nodes.is_empty() {
            HashMap::new()
        } else {
            let engine = FrontierReductionEngine::new(self.graph);
            let result = engine.compute_paths(
                starting_nodes,
                Direction::Outgoing,
                max_graph_hops,
                (i64::MIN, crate::types::next_timestamp()),
            );
            // Closer nodes score higher: invert distance.
            result.distances.into_iter().map(|(node, dist)| (node, 1.0 / (1.0 + dist))).collect()
        };

        let bm25_norm = normalize(&bm25_raw);
        let hnsw_norm = normalize(&hnsw_raw);
        let fre_norm = normalize(&fre_raw);

        let mut ids: Vec<NodeId> = bm25_norm.keys().chain(hnsw_norm.keys()).chain(fre_norm.keys()).copied().collect();
        ids.sort_unstable();
        ids.dedup();

        let mut results: Vec<HybridResult> = ids
            .into_iter()
            .map(|id| {
                let bm25_score = *bm25_norm.get(&id).unwrap_or(&0.0);
                let hnsw_score = *hnsw_norm.get(&id).unwrap_or(&0.0);
                let fre_score = *fre_norm.get(&id).unwrap_or(&0.0);
                HybridResult {
                    id: id.to_string(),
                    path: paths.get(&id).cloned().unwrap_or_default(),
                    bm25_score,
                    hnsw_score,
                    fre_score,
                    combined_score: self.weights.combine(bm25_score, hnsw_score, fre_score),
                    matching_terms: matching_terms.get(&id).cloned().unwrap_or_default(),
                    semantic_similarity: query_vector.map(|_| hnsw_score),
                    graph_distance: fre_raw.get(&id).map(|s| 1.0 / s - 1.0),
                }
            })
            .collect();

        results.sort_by(|a, b| {
            b.combined_score
                .partial_cmp(&a.combined_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        results.truncate(k);
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weights_reject_negative_values() {
        let w = HybridWeights { alpha: -0.1, beta: 0.5, gamma: 0.2 };
        assert!(w.validate().is_err());
    }

    #[test]
    fn weights_reject_sum_over_one() {
        let w = HybridWeights { alpha: 0.6, beta: 0.6, gamma: 0.2 };
        assert!(w.validate().is_err());
    }

    #[test]
    fn combine_matches_worked_example() {
        let w = HybridWeights { alpha: 0.4, beta: 0.4, gamma: 0.2 };
        let score = w.combine(0.8, 0.6, 0.5);
        assert!((score - 0.66).abs() < 1e-3);
    }

    #[test]
    fn search_with_only_lexical_signal() {
        let bm25 = Bm25Index::default();
        bm25.add_document(1, "a.js", "function calculateTotal(items){}").unwrap();
        bm25.add_document(2, "b.js", "const x = 1;").unwrap();
        let vectors = VectorStore::default();
        let graph = TemporalGraph::new();

        let search = TripleHybridSearch::new(&bm25, &vectors, &graph);
        let results = search.search("calculate total", None, &[], 10, 5, DEFAULT_MAX_GRAPH_HOPS);
        assert!(!results.is_empty());
        assert_eq!(results[0].id, "1");
        assert!(results[0].combined_score > 0.0);
    }

    #[test]
    fn empty_query_and_no_seeds_yields_nothing() {
        let bm25 = Bm25Index::default();
        let vectors = VectorStore::default();
        let graph = TemporalGraph::new();
        let search = TripleHybridSearch::new(&bm25, &vectors, &graph);
        assert!(search.search("", None, &[], 10, 5, DEFAULT_MAX_GRAPH_HOPS).is_empty());
    }

    #[test]
    fn max_graph_hops_limits_fre_contribution() {
        use crate::graph::{Edge, Node, ValidityInterval};
        use crate::types::{NodeType, RelationType};

        let bm25 = Bm25Index::default();
        let vectors = VectorStore::default();
        let graph = TemporalGraph::new();
        for id in 1..=3u128 {
            graph.upsert_node(Node::new(id, NodeType::File, 1, "tester"));
        }
        for (src, dst) in [(1u128, 2u128), (2, 3)] {
            graph
                .add_edge(Edge {
                    id: src * 100 + dst,
                    source: src,
                    target: dst,
                    relation: RelationType::DependsOn,
                    weight: 1.0,
                    validity: ValidityInterval::from(1),
                    author: "tester".into(),
                })
                .unwrap();
        }

        let search = TripleHybridSearch::new(&bm25, &vectors, &graph);
        let one_hop = search.search("", None, &[1], 10, 10, 1);
        let two_hops = search.search("", None, &[1], 10, 10, 2);
        assert!(one_hop.iter().any(|r| r.id == "2"));
        assert!(!one_hop.iter().any(|r| r.id == "3"));
        assert!(two_hops.iter().any(|r| r.id == "3"));
    }
}
