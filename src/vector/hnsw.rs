//! Hierarchical Navigable Small World approximate nearest-neighbor index.
//!
//! Nodes are assigned a maximum layer via `floor(-ln(U) * m_L)`, `U` uniform
//! on `(0, 1]`, `m_L = 1 / ln(M)` — the layer distribution from the original
//! HNSW paper, which concentrates most nodes at layer 0 and exponentially
//! fewer at each layer above it. Layer 0 allows up to `2*M` neighbors per
//! node; every layer above allows `M`. Neighbor selection keeps a candidate
//! only if it is closer to the node being inserted than it is to every
//! neighbor already kept, which favors spread-out connections over a
//! tight cluster of near-duplicates.

use super::types::{DistanceMetric, Vector, VectorSearchResult};
use crate::error::{AgramaError, AgramaResult};
use crate::types::NodeId;
use dashmap::DashMap;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::{Mutex, RwLock};
use tracing::{debug, trace};

const MAX_LAYERS: usize = 16;

/// Tunable HNSW construction/search parameters.
#[derive(Debug, Clone, Copy)]
pub struct HnswConfig {
    pub m: usize,
    pub ef_construction: usize,
    pub ef_search: usize,
    pub m_l: f64,
    pub metric: DistanceMetric,
}

impl Default for HnswConfig {
    fn default() -> Self {
        let m = 16;
        Self {
            m,
            ef_construction: 200,
            ef_search: 50,
            m_l: 1.0 / (m as f64).ln(),
            metric: DistanceMetric::Cosine,
        }
    }
}

impl HnswConfig {
    pub fn with_m(m: usize) -> Self {
        Self {
            m,
            m_l: 1.0 / (m as f64).ln(),
            ..Self::default()
        }
    }

    pub fn ef_construction(mut self, ef: usize) -> Self {
        self.ef_construction = ef;
        self
    }

    pub fn ef_search(mut self, ef: usize) -> Self {
        self.ef_search = ef;
        self
    }

    pub fn metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }
}

struct Node {
    vector: Vector,
    max_layer: usize,
}

#[derive(Default)]
struct Layer {
    edges: HashMap<NodeId, Vec<NodeId>>,
}

impl Layer {
    fn neighbors(&self, id: NodeId) -> &[NodeId] {
        self.edges.get(&id).map(|v| v.as_slice()).unwrap_or(&[])
    }

    fn set_neighbors(&mut self, id: NodeId, neighbors: Vec<NodeId>) {
        self.edges.insert(id, neighbors);
    }
}

/// Min-heap-by-distance candidate for best-first search.
#[derive(Clone, Copy)]
struct Candidate {
    id: NodeId,
    dist: f32,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.dist == other.dist
    }
}
impl Eq for Candidate {}
impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so BinaryHeap (a max-heap) pops the smallest distance.
        other.dist.partial_cmp(&self.dist).unwrap_or(Ordering::Equal)
    }
}
impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Layered proximity graph over [`Vector`] embeddings, keyed by [`NodeId`].
pub struct HnswIndex {
    config: HnswConfig,
    nodes: DashMap<NodeId, Node>,
    layers: Vec<RwLock<Layer>>,
    entry_point: RwLock<Option<NodeId>>,
    max_layer: AtomicUsize,
    rng: Mutex<StdRng>,
    model_filter: Option<String>,
}

impl std::fmt::Debug for HnswIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HnswIndex")
            .field("len", &self.nodes.len())
            .field("max_layer", &self.max_layer.load(AtomicOrdering::Relaxed))
            .finish()
    }
}

impl HnswIndex {
    pub fn new(config: HnswConfig) -> Self {
        Self {
            config,
            nodes: DashMap::new(),
            layers: (0..MAX_LAYERS).map(|_| RwLock::new(Layer::default())).collect(),
            entry_point: RwLock::new(None),
            max_layer: AtomicUsize::new(0),
            rng: Mutex::new(StdRng::seed_from_u64(42)),
            model_filter: None,
        }
    }

    pub fn with_model_filter(config: HnswConfig, model: impl Into<String>) -> Self {
        let mut index = Self::new(config);
        index.model_filter = Some(model.into());
        index
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Sample a node's maximum layer: `floor(-ln(U) * m_L)`, `U` uniform on `(0, 1]`.
    fn random_layer(&self) -> usize {
        let u: f64 = {
            let mut rng = self.rng.lock().unwrap();
            // gen_range excludes the upper bound; shift away from exactly 0
            // so ln(u) is always finite.
            rng.gen_range(f64::MIN_POSITIVE..1.0)
        };
        (-u.ln() * self.config.m_l).floor() as usize
    }

    fn distance(&self, a: &Vector, b: &Vector) -> f32 {
        a.distance(b, self.config.metric).unwrap_or(f32::MAX)
    }

    fn distance_prefix(&self, a: &Vector, b: &Vector, prefix: usize) -> f32 {
        a.prefix(prefix).distance(&b.prefix(prefix), self.config.metric).unwrap_or(f32::MAX)
    }

    fn degree_cap(&self, layer: usize) -> usize {
        if layer == 0 {
            self.config.m * 2
        } else {
            self.config.m
        }
    }

    /// Greedy 1-NN descent within a single layer, starting from `entry`.
    fn search_layer_simple(&self, entry: NodeId, query: &Vector, layer: usize) -> (NodeId, f32) {
        let Some(entry_node) = self.nodes.get(&entry) else {
            return (entry, f32::MAX);
        };
        let mut best = entry;
        let mut best_dist = self.distance(&entry_node.vector, query);
        drop(entry_node);

        loop {
            let neighbors: Vec<NodeId> = {
                let guard = self.layers[layer].read().unwrap();
                guard.neighbors(best).to_vec()
            };

            let mut improved = false;
            for n in neighbors {
                if let Some(node) = self.nodes.get(&n) {
                    let d = self.distance(&node.vector, query);
                    if d < best_dist {
                        best_dist = d;
                        best = n;
                        improved = true;
                    }
                }
            }
            if !improved {
                break;
            }
        }

        (best, best_dist)
    }

    /// `ef`-bounded best-first search within a single layer.
    fn search_layer(&self, entry: NodeId, query: &Vector, ef: usize, layer: usize) -> Vec<(NodeId, f32)> {
        let Some(entry_node) = self.nodes.get(&entry) else {
            return Vec::new();
        };
        let entry_dist = self.distance(&entry_node.vector, query);
        drop(entry_node);

        let mut visited: HashSet<NodeId> = HashSet::from([entry]);
        let mut candidates: BinaryHeap<Candidate> = BinaryHeap::new();
        candidates.push(Candidate { id: entry, dist: entry_dist });

        let mut found: Vec<(NodeId, f32)> = vec![(entry, entry_dist)];

        while let Some(Candidate { id, dist }) = candidates.pop() {
            let worst_found = found
                .iter()
                .map(|(_, d)| *d)
                .fold(f32::MIN, f32::max);
            if found.len() >= ef && dist > worst_found {
                break;
            }

            let neighbors: Vec<NodeId> = {
                let guard = self.layers[layer].read().unwrap();
                guard.neighbors(id).to_vec()
            };

            for n in neighbors {
                if !visited.insert(n) {
                    continue;
                }
                if let Some(node) = self.nodes.get(&n) {
                    let d = self.distance(&node.vector, query);
                    candidates.push(Candidate { id: n, dist: d });
                    found.push((n, d));
                }
            }
        }

        found.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));
        found.truncate(ef.max(1));
        found
    }

    /// Diverse-neighbor selection: keep a candidate only if it is closer to
    /// `target` than it is to every neighbor already selected.
    fn select_neighbors(&self, target: &Vector, candidates: &[(NodeId, f32)], cap: usize) -> Vec<NodeId> {
        let mut sorted = candidates.to_vec();
        sorted.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));

        let mut selected: Vec<NodeId> = Vec::new();
        for (id, dist_to_target) in sorted {
            if selected.len() >= cap {
                break;
            }
            let Some(node) = self.nodes.get(&id) else { continue };

            let dominated = selected.iter().any(|&kept| {
                let Some(kept_node) = self.nodes.get(&kept) else { return false };
                self.distance(&node.vector, &kept_node.vector) < dist_to_target
            });

            if !dominated {
                selected.push(id);
            }
        }
        selected
    }

    fn add_edge(&self, layer: usize, a: NodeId, b: NodeId) {
        let mut guard = self.layers[layer].write().unwrap();
        let entry = guard.edges.entry(a).or_default();
        if !entry.contains(&b) {
            entry.push(b);
        }
    }

    /// After adding `id`'s edge at `layer`, re-prune its neighbor list down
    /// to the layer's degree cap using the diverse-neighbor heuristic.
    fn prune_if_needed(&self, layer: usize, id: NodeId) {
        let cap = self.degree_cap(layer);
        let neighbors: Vec<NodeId> = {
            let guard = self.layers[layer].read().unwrap();
            guard.neighbors(id).to_vec()
        };
        if neighbors.len() <= cap {
            return;
        }
        let Some(node) = self.nodes.get(&id) else { return };
        let vector = node.vector.clone();
        drop(node);

        let candidates: Vec<(NodeId, f32)> = neighbors
            .iter()
            .filter_map(|&n| self.nodes.get(&n).map(|node| (n, self.distance(&vector, &node.vector))))
            .collect();
        let pruned = self.select_neighbors(&vector, &candidates, cap);

        let mut guard = self.layers[layer].write().unwrap();
        guard.set_neighbors(id, pruned);
    }

    /// Insert or replace a vector under `id`.
    pub fn add(&self, id: NodeId, vector: Vector) -> AgramaResult<()> {
        if let Some(filter) = &self.model_filter {
            if vector.model() != filter {
                return Err(AgramaError::invalid(format!(
                    "model '{}' does not match index filter '{filter}'",
                    vector.model()
                )));
            }
        }

        self.remove(id);

        let layer = self.random_layer();
        debug!(node_id = %id, layer, "hnsw add");
        self.nodes.insert(id, Node { vector: vector.clone(), max_layer: layer });

        let mut entry_guard = self.entry_point.write().unwrap();
        let Some(entry) = *entry_guard else {
            *entry_guard = Some(id);
            self.max_layer.store(layer, AtomicOrdering::Relaxed);
            drop(entry_guard);
            for lc in 0..=layer.min(MAX_LAYERS - 1) {
                self.layers[lc].write().unwrap().edges.entry(id).or_default();
            }
            return Ok(());
        };
        drop(entry_guard);

        let current_max = self.max_layer.load(AtomicOrdering::Relaxed);
        let mut curr_ep = entry;

        for lc in (layer.min(MAX_LAYERS - 1) + 1..=current_max).rev() {
            let (new_ep, _) = self.search_layer_simple(curr_ep, &vector, lc);
            curr_ep = new_ep;
        }

        for lc in (0..=layer.min(current_max).min(MAX_LAYERS - 1)).rev() {
            let candidates = self.search_layer(curr_ep, &vector, self.config.ef_construction, lc);
            let cap = self.degree_cap(lc);
            let selected = self.select_neighbors(&vector, &candidates, cap);

            {
                let mut guard = self.layers[lc].write().unwrap();
                guard.set_neighbors(id, selected.clone());
            }
            for &neighbor in &selected {
                self.add_edge(lc, neighbor, id);
                self.prune_if_needed(lc, neighbor);
            }
            if let Some(&first) = selected.first() {
                curr_ep = first;
            }
        }

        if layer > current_max {
            self.max_layer.store(layer, AtomicOrdering::Relaxed);
            *self.entry_point.write().unwrap() = Some(id);
        }

        Ok(())
    }

    /// Remove a node, repairing the entry point if it was removed.
    pub fn remove(&self, id: NodeId) {
        if self.nodes.remove(&id).is_none() {
            return;
        }
        for layer in &self.layers {
            let mut guard = layer.write().unwrap();
            guard.edges.remove(&id);
            for neighbors in guard.edges.values_mut() {
                neighbors.retain(|&n| n != id);
            }
        }

        let mut entry_guard = self.entry_point.write().unwrap();
        if *entry_guard == Some(id) {
            // Re-elect the entry point: the live node with the highest layer.
            *entry_guard = self
                .nodes
                .iter()
                .max_by_key(|e| e.value().max_layer)
                .map(|e| *e.key());
            let new_entry: Option<NodeId> = *entry_guard;
            self.max_layer.store(
                new_entry.and_then(|ep| self.nodes.get(&ep).map(|n| n.max_layer)).unwrap_or(0),
                AtomicOrdering::Relaxed,
            );
        }
    }

    /// Full-resolution top-`k` search with explicit `ef`.
    pub fn search(&self, query: &Vector, k: usize, ef: usize) -> Vec<VectorSearchResult> {
        trace!(k, ef, "hnsw search");
        let ef = ef.max(k);
        let Some(entry) = *self.entry_point.read().unwrap() else {
            return Vec::new();
        };
        let max_layer = self.max_layer.load(AtomicOrdering::Relaxed);

        let mut curr_ep = entry;
        for lc in (1..=max_layer).rev() {
            let (new_ep, _) = self.search_layer_simple(curr_ep, query, lc.min(MAX_LAYERS - 1));
            curr_ep = new_ep;
        }

        let candidates = self.search_layer(curr_ep, query, ef, 0);
        self.to_results(candidates, k)
    }

    /// Matryoshka coarse-to-fine search: the graph is navigated with
    /// progressively longer vector prefixes, each stage narrowing the
    /// candidate shortlist before the final stage scores at full
    /// resolution. `prefix_lens` must be ascending; the last entry should
    /// normally equal the index's full dimensionality.
    pub fn search_matryoshka(
        &self,
        query: &Vector,
        k: usize,
        ef: usize,
        prefix_lens: &[usize],
    ) -> Vec<VectorSearchResult> {
        if prefix_lens.is_empty() {
            return self.search(query, k, ef);
        }

        let Some(entry) = *self.entry_point.read().unwrap() else {
            return Vec::new();
        };
        let max_layer = self.max_layer.load(AtomicOrdering::Relaxed);

        let mut curr_ep = entry;
        for lc in (1..=max_layer).rev() {
            let (new_ep, _) = self.search_layer_simple(curr_ep, query, lc.min(MAX_LAYERS - 1));
            curr_ep = new_ep;
        }

        // Coarse pass: gather a generous shortlist using a cheap prefix.
        let shortlist_ef = ef.max(k * 4);
        let mut shortlist = self.search_layer(curr_ep, query, shortlist_ef, 0);

        // Progressively rerank and narrow using longer prefixes.
        for (stage, &prefix) in prefix_lens.iter().enumerate() {
            let keep = if stage + 1 == prefix_lens.len() {
                k
            } else {
                (shortlist.len() / 2).max(k)
            };
            for entry in shortlist.iter_mut() {
                if let Some(node) = self.nodes.get(&entry.0) {
                    entry.1 = self.distance_prefix(query, &node.vector, prefix);
                }
            }
            shortlist.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));
            shortlist.truncate(keep.max(1));
        }

        self.to_results(shortlist, k)
    }

    fn to_results(&self, candidates: Vec<(NodeId, f32)>, k: usize) -> Vec<VectorSearchResult> {
        let mut results: Vec<VectorSearchResult> = candidates
            .into_iter()
            .take(k)
            .filter_map(|(id, dist)| {
                self.nodes.get(&id).map(|node| {
                    let score = match self.config.metric {
                        DistanceMetric::Cosine => 1.0 - dist,
                        DistanceMetric::L2 => -dist,
                    };
                    VectorSearchResult::new(id, score, node.vector.clone())
                })
            })
            .collect();

        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        results
    }

    pub fn clear(&self) {
        self.nodes.clear();
        for layer in &self.layers {
            layer.write().unwrap().edges.clear();
        }
        *self.entry_point.write().unwrap() = None;
        self.max_layer.store(0, AtomicOrdering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(data: Vec<f32>) -> Vector {
        Vector::new(data, "test-model")
    }

    #[test]
    fn config_defaults() {
        let config = HnswConfig::default();
        assert_eq!(config.m, 16);
        assert_eq!(config.ef_construction, 200);
        assert_eq!(config.ef_search, 50);
    }

    #[test]
    fn add_and_search_finds_nearest() {
        let index = HnswIndex::new(HnswConfig::default());
        index.add(1, v(vec![1.0, 0.0, 0.0])).unwrap();
        index.add(2, v(vec![0.0, 1.0, 0.0])).unwrap();
        index.add(3, v(vec![0.0, 0.0, 1.0])).unwrap();
        assert_eq!(index.len(), 3);

        let query = v(vec![0.9, 0.1, 0.0]);
        let results = index.search(&query, 3, 50);
        assert!(results.len() <= 3);
        assert_eq!(results[0].node_id, 1);
        for i in 1..results.len() {
            assert!(results[i - 1].score >= results[i].score);
        }
    }

    #[test]
    fn empty_index_search_is_empty() {
        let index = HnswIndex::new(HnswConfig::default());
        assert!(index.search(&v(vec![1.0, 0.0]), 10, 50).is_empty());
    }

    #[test]
    fn remove_reelects_entry_point() {
        let index = HnswIndex::new(HnswConfig::default());
        index.add(1, v(vec![1.0, 0.0])).unwrap();
        index.add(2, v(vec![0.0, 1.0])).unwrap();
        index.remove(1);
        assert_eq!(index.len(), 1);
        let results = index.search(&v(vec![0.0, 1.0]), 10, 50);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].node_id, 2);
    }

    #[test]
    fn clear_empties_index() {
        let index = HnswIndex::new(HnswConfig::default());
        index.add(1, v(vec![1.0, 0.0])).unwrap();
        index.add(2, v(vec![0.0, 1.0])).unwrap();
        index.clear();
        assert!(index.is_empty());
    }

    #[test]
    fn model_filter_rejects_mismatched_model() {
        let index = HnswIndex::with_model_filter(HnswConfig::default(), "model-a");
        index.add(1, Vector::new(vec![1.0, 0.0], "model-a")).unwrap();
        assert!(index.add(2, Vector::new(vec![0.0, 1.0], "model-b")).is_err());
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn layer0_degree_never_exceeds_2m() {
        let config = HnswConfig::with_m(4);
        let index = HnswIndex::new(config);
        for i in 0..80u128 {
            index.add(i, v(vec![i as f32, (i * 2) as f32])).unwrap();
        }
        let guard = index.layers[0].read().unwrap();
        for neighbors in guard.edges.values() {
            assert!(neighbors.len() <= 8);
        }
    }

    #[test]
    fn scales_to_many_vectors() {
        let config = HnswConfig::with_m(8);
        let index = HnswIndex::new(config);
        for i in 0..300u128 {
            let v = v(vec![(i % 10) as f32 / 10.0, ((i / 10) % 10) as f32 / 10.0]);
            index.add(i, v).unwrap();
        }
        assert_eq!(index.len(), 300);
        let results = index.search(&v(vec![0.5, 0.5]), 10, 100);
        assert!(!results.is_empty());
    }

    #[test]
    fn matryoshka_search_returns_k_results() {
        let index = HnswIndex::new(HnswConfig::default());
        for i in 0..20u128 {
            index.add(i, v(vec![i as f32, (i * 2) as f32, (i * 3) as f32, (i * 4) as f32])).unwrap();
        }
        let query = v(vec![10.0, 20.0, 30.0, 40.0]);
        let results = index.search_matryoshka(&query, 5, 50, &[2, 4]);
        assert!(results.len() <= 5);
        assert!(!results.is_empty());
    }
}
