//! Frontier Reduction Engine: bounded multi-source shortest paths.
//!
//! A temporal-aware variant of a bounded multi-source shortest-path search
//! (T-BMSSP). Instead of plain edge weight, each frontier entry is ordered
//! by `dist + 0.1 * temporal_weight + 0.1 * semantic_weight`, where
//! `temporal_weight` decays linearly to zero over one year of distance
//! between a candidate node's creation time and the query's reference time,
//! and `semantic_weight` is reserved for callers that want to fold in an
//! external similarity score (defaults to zero).
//!
//! Recursion level `ℓ` is chosen from the graph size: `1` below 100 nodes,
//! `2` up to 1,000, `3` up to 10,000, otherwise `max(1, ⌊(2/3)·ln N⌋)`
//! clamped to [`MAX_RECURSION_LEVEL`]. At `ℓ = 0`, or once the source set
//! has shrunk to one node, the base case runs a temporal Dijkstra bounded
//! by the current distance bound `B`. Above that, a small set of pivots —
//! sources whose out-degree normalized by graph size clears
//! `PIVOT_THRESHOLD` — each recurse at level `ℓ - 1` with bound `B / 2`;
//! results are unioned and deduplicated by node id, keeping the shortest
//! distance. When a single Dijkstra pass would grow its frontier past
//! [`FRONTIER_BUDGET`], the excess is truncated and counted rather than
//! failing the query — paths are best-effort, not a correctness-critical
//! index.
use super::{Direction, Edge, TemporalGraph};
use crate::types::NodeId;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::trace;

const ONE_YEAR_SECONDS: i64 = 365 * 24 * 60 * 60;
const FRONTIER_BUDGET: usize = 256;
const MAX_RECURSION_LEVEL: u32 = 6;
const PIVOT_THRESHOLD: f32 = 0.05;

/// A discovered path from one of the sources to `node`.
#[derive(Debug, Clone)]
pub struct PathResult {
    pub node: NodeId,
    pub distance: f32,
    pub hops: u32,
    pub path: Vec<NodeId>,
}

/// Result of [`FrontierReductionEngine::compute_paths`], matching the
/// documented `(reachable_nodes, distances, paths, explored_count,
/// elapsed_ms)` tuple shape.
#[derive(Debug, Clone)]
pub struct ComputePaths {
    pub reachable_nodes: Vec<NodeId>,
    pub distances: HashMap<NodeId, f32>,
    pub paths: HashMap<NodeId, Vec<NodeId>>,
    pub explored_count: usize,
    pub elapsed_ms: f64,
}

/// Subgraph induced by a dependency walk: the reachable nodes plus the
/// edges active now whose endpoints are both reachable.
#[derive(Debug, Clone)]
pub struct Subgraph {
    pub nodes: Vec<NodeId>,
    pub edges: Vec<Edge>,
}

/// Result of [`FrontierReductionEngine::impact_radius`]: forward and
/// reverse reachable sets, the subset of paths long enough to count as
/// "critical", and an estimated complexity of the blast radius.
#[derive(Debug, Clone)]
pub struct ImpactRadius {
    pub forward: Vec<NodeId>,
    pub reverse: Vec<NodeId>,
    pub critical_paths: Vec<PathResult>,
    pub estimated_complexity: f32,
}

#[derive(Clone)]
struct FrontierEntry {
    node: NodeId,
    dist: f32,
    priority: f32,
    hops: u32,
    path: Vec<NodeId>,
}

impl PartialEq for FrontierEntry {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority
    }
}
impl Eq for FrontierEntry {}
impl Ord for FrontierEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Reversed so BinaryHeap pops the lowest priority first.
        other.priority.partial_cmp(&self.priority).unwrap_or(std::cmp::Ordering::Equal)
    }
}
impl PartialOrd for FrontierEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

type NodeResults = HashMap<NodeId, (f32, u32, Vec<NodeId>)>;

/// Bounded multi-source shortest-path engine over a [`TemporalGraph`].
pub struct FrontierReductionEngine<'g> {
    graph: &'g TemporalGraph,
    frontier_truncations: AtomicU64,
}

impl<'g> FrontierReductionEngine<'g> {
    pub fn new(graph: &'g TemporalGraph) -> Self {
        Self { graph, frontier_truncations: AtomicU64::new(0) }
    }

    /// Number of times a frontier was truncated to its budget across the
    /// lifetime of this engine. Paths dropped by truncation are simply
    /// absent from results, never reported as errors.
    pub fn frontier_truncations(&self) -> u64 {
        self.frontier_truncations.load(Ordering::Relaxed)
    }

    fn temporal_weight(&self, node: NodeId, reference_time: i64) -> f32 {
        let Ok(n) = self.graph.get_node(node) else {
            return 0.0;
        };
        let delta = (n.created_at - reference_time).unsigned_abs().min(ONE_YEAR_SECONDS as u64);
        1.0 - (delta as f32 / ONE_YEAR_SECONDS as f32)
    }

    fn neighbors(&self, node: NodeId, direction: Direction, t: i64) -> Vec<(NodeId, f32)> {
        let mut out = Vec::new();
        if matches!(direction, Direction::Outgoing | Direction::Both) {
            out.extend(self.graph.outgoing_edges_at(node, t).into_iter().map(|e| (e.target, e.weight)));
        }
        if matches!(direction, Direction::Incoming | Direction::Both) {
            out.extend(self.graph.incoming_edges_at(node, t).into_iter().map(|e| (e.source, e.weight)));
        }
        out
    }

    fn recursion_level(graph_size: usize) -> u32 {
        let level = if graph_size < 100 {
            1
        } else if graph_size <= 1_000 {
            2
        } else if graph_size <= 10_000 {
            3
        } else {
            (((2.0 / 3.0) * (graph_size as f64).ln()).floor() as i64).max(1) as u32
        };
        level.min(MAX_RECURSION_LEVEL)
    }

    /// Sources whose out-degree, normalized by graph size, clears
    /// `PIVOT_THRESHOLD`; falls back to all sources if none qualify.
    fn select_pivots(&self, sources: &[NodeId], graph_size: usize) -> Vec<NodeId> {
        if graph_size == 0 {
            return sources.to_vec();
        }
        let qualifying: Vec<NodeId> = sources
            .iter()
            .copied()
            .filter(|&s| (self.graph.out_degree(s) as f32 / graph_size as f32) >= PIVOT_THRESHOLD)
            .collect();
        if qualifying.is_empty() {
            sources.to_vec()
        } else {
            qualifying
        }
    }

    /// Base case: temporal Dijkstra bounded by `bound`, truncating the
    /// frontier at [`FRONTIER_BUDGET`] when it overflows.
    fn dijkstra(
        &self,
        sources: &[NodeId],
        direction: Direction,
        max_hops: u32,
        reference_time: i64,
        bound: f32,
        explored: &mut usize,
    ) -> NodeResults {
        let mut best: HashMap<NodeId, f32> = HashMap::new();
        let mut heap: BinaryHeap<FrontierEntry> = BinaryHeap::new();
        let mut out: NodeResults = HashMap::new();

        for &s in sources {
            if 0.0 <= bound {
                best.insert(s, 0.0);
                heap.push(FrontierEntry { node: s, dist: 0.0, priority: 0.0, hops: 0, path: vec![s] });
            }
        }

        while let Some(current) = heap.pop() {
            if best.get(&current.node).map(|&d| d < current.dist).unwrap_or(false) {
                continue;
            }
            *explored += 1;
            out.insert(current.node, (current.dist, current.hops, current.path.clone()));

            if current.hops >= max_hops {
                continue;
            }
            if heap.len() > FRONTIER_BUDGET {
                self.frontier_truncations.fetch_add(1, Ordering::Relaxed);
                trace!(frontier_size = heap.len(), "fre frontier truncated");
                break;
            }

            for (neighbor, weight) in self.neighbors(current.node, direction, reference_time) {
                let tentative = current.dist + weight.max(0.0);
                if tentative > bound {
                    continue;
                }
                if best.get(&neighbor).map(|&d| tentative < d).unwrap_or(true) {
                    best.insert(neighbor, tentative);
                    let temporal = self.temporal_weight(neighbor, reference_time);
                    let priority = tentative + 0.1 * temporal + 0.1 * 0.0;
                    let mut path = current.path.clone();
                    path.push(neighbor);
                    heap.push(FrontierEntry {
                        node: neighbor,
                        dist: tentative,
                        priority,
                        hops: current.hops + 1,
                        path,
                    });
                }
            }
        }

        out
    }

    /// T-BMSSP driver: dispatches to the Dijkstra base case or recurses
    /// over pivots, per the recursion level computed from graph size.
    fn run(
        &self,
        sources: &[NodeId],
        direction: Direction,
        max_hops: u32,
        reference_time: i64,
        level: u32,
        bound: f32,
        explored: &mut usize,
    ) -> NodeResults {
        if level == 0 || sources.len() <= 1 {
            return self.dijkstra(sources, direction, max_hops, reference_time, bound, explored);
        }

        let graph_size = self.graph.node_count().max(1);
        let pivots = self.select_pivots(sources, graph_size);
        trace!(level, pivots = pivots.len(), bound, "fre recursive step");

        let mut merged: NodeResults = HashMap::new();
        for pivot in pivots {
            let sub = self.run(&[pivot], direction, max_hops, reference_time, level - 1, bound / 2.0, explored);
            for (node, entry) in sub {
                merged
                    .entry(node)
                    .and_modify(|existing| {
                        if entry.0 < existing.0 {
                            *existing = entry.clone();
                        }
                    })
                    .or_insert(entry);
            }
        }
        merged
    }

    /// Bounded multi-source shortest paths from `sources`, up to `max_hops`
    /// hops, considering only edges active within `time_range`.
    pub fn compute_paths(&self, sources: &[NodeId], direction: Direction, max_hops: u32, time_range: (i64, i64)) -> ComputePaths {
        let started = Instant::now();
        let (_, reference_time) = time_range;
        let graph_size = self.graph.node_count().max(1);
        let level = Self::recursion_level(graph_size);
        let mut explored = 0usize;

        let merged = self.run(sources, direction, max_hops, reference_time, level, f32::INFINITY, &mut explored);

        let mut reachable_nodes: Vec<NodeId> = merged.keys().copied().collect();
        reachable_nodes.sort_unstable();
        let distances: HashMap<NodeId, f32> = merged.iter().map(|(&id, &(dist, _, _))| (id, dist)).collect();
        let paths: HashMap<NodeId, Vec<NodeId>> = merged.into_iter().map(|(id, (_, _, path))| (id, path)).collect();
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

        trace!(sources = sources.len(), reachable = reachable_nodes.len(), explored, elapsed_ms, "fre compute_paths");

        ComputePaths { reachable_nodes, distances, paths, explored_count: explored, elapsed_ms }
    }

    /// Forward dependency closure from `root` up to `max_depth`, as the
    /// subgraph induced by the reachable nodes plus the edges active now
    /// between two reachable nodes.
    pub fn analyze_dependencies(&self, root: NodeId, direction: Direction, max_depth: u32) -> Subgraph {
        let now = crate::types::next_timestamp();
        let mut explored = 0usize;
        let level = Self::recursion_level(self.graph.node_count().max(1));
        let merged = self.run(&[root], direction, max_depth, now, level, f32::INFINITY, &mut explored);

        let reachable: HashSet<NodeId> = merged.keys().copied().collect();
        let mut nodes: Vec<NodeId> = reachable.iter().copied().collect();
        nodes.sort_unstable();

        let edges: Vec<Edge> = nodes
            .iter()
            .flat_map(|&n| self.graph.outgoing_edges_at(n, now))
            .filter(|e| reachable.contains(&e.target))
            .collect();

        Subgraph { nodes, edges }
    }

    /// Forward and reverse reachable sets within `max_radius` hops of any
    /// of `changed_nodes`, plus the subset of discovered paths at least
    /// `max_radius` hops long (the "critical paths"), plus an estimated
    /// complexity of `|forward| / |graph|`.
    pub fn impact_radius(&self, changed_nodes: &[NodeId], max_radius: u32) -> ImpactRadius {
        let now = crate::types::next_timestamp();
        let mut explored = 0usize;
        let level = Self::recursion_level(self.graph.node_count().max(1));

        let forward_results = self.run(changed_nodes, Direction::Outgoing, max_radius, now, level, f32::INFINITY, &mut explored);
        let reverse_results = self.run(changed_nodes, Direction::Incoming, max_radius, now, level, f32::INFINITY, &mut explored);

        let mut forward: Vec<NodeId> = forward_results.keys().copied().collect();
        forward.sort_unstable();
        let mut reverse: Vec<NodeId> = reverse_results.keys().copied().collect();
        reverse.sort_unstable();

        let mut critical_paths: Vec<PathResult> = forward_results
            .iter()
            .chain(reverse_results.iter())
            .filter(|(_, (_, hops, _))| *hops >= max_radius)
            .map(|(&node, (distance, hops, path))| PathResult { node, distance: *distance, hops: *hops, path: path.clone() })
            .collect();
        critical_paths.sort_by_key(|p| p.node);
        critical_paths.dedup_by_key(|p| p.node);

        let graph_size = self.graph.node_count().max(1);
        let estimated_complexity = forward.len() as f32 / graph_size as f32;

        ImpactRadius { forward, reverse, critical_paths, estimated_complexity }
    }

    /// Whether any of `targets` is reachable from `sources` within `max_distance` hops.
    pub fn reachable(&self, sources: &[NodeId], targets: &[NodeId], max_distance: u32) -> bool {
        let results = self.compute_paths(sources, Direction::Outgoing, max_distance, (i64::MIN, crate::types::next_timestamp()));
        targets.iter().any(|t| results.distances.contains_key(t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Edge, Node, ValidityInterval};
    use crate::types::NodeType;

    fn linear_graph() -> TemporalGraph {
        let graph = TemporalGraph::new();
        for id in 1..=4u128 {
            graph.upsert_node(Node::new(id, NodeType::File, 1, "tester"));
        }
        // Isolated node.
        graph.upsert_node(Node::new(99, NodeType::File, 1, "tester"));

        for (i, (src, dst)) in [(1u128, 2u128), (2, 3), (3, 4)].into_iter().enumerate() {
            graph
                .add_edge(Edge {
                    id: 1000 + i as u128,
                    source: src,
                    target: dst,
                    relation: crate::types::RelationType::DependsOn,
                    weight: 1.0,
                    validity: ValidityInterval::from(1),
                    author: "tester".into(),
                })
                .unwrap();
        }
        graph
    }

    #[test]
    fn reaches_downstream_nodes() {
        let graph = linear_graph();
        let engine = FrontierReductionEngine::new(&graph);
        let results = engine.compute_paths(&[1], Direction::Outgoing, 10, (0, 100));
        assert!(results.reachable_nodes.contains(&2));
        assert!(results.reachable_nodes.contains(&3));
        assert!(results.reachable_nodes.contains(&4));
        assert!(!results.reachable_nodes.contains(&99));
        assert_eq!(results.paths.get(&4), Some(&vec![1, 2, 3, 4]));
        assert!(results.explored_count >= 4);
    }

    #[test]
    fn respects_max_hops() {
        let graph = linear_graph();
        let engine = FrontierReductionEngine::new(&graph);
        let results = engine.compute_paths(&[1], Direction::Outgoing, 1, (0, 100));
        assert!(results.reachable_nodes.contains(&2));
        assert!(!results.reachable_nodes.contains(&3));
    }

    #[test]
    fn zero_distance_query_reaches_only_the_source() {
        let graph = linear_graph();
        let engine = FrontierReductionEngine::new(&graph);
        let results = engine.compute_paths(&[1], Direction::Outgoing, 0, (0, 100));
        assert_eq!(results.reachable_nodes, vec![1]);
    }

    #[test]
    fn reachable_true_for_connected_targets() {
        let graph = linear_graph();
        let engine = FrontierReductionEngine::new(&graph);
        assert!(engine.reachable(&[1], &[4], 10));
        assert!(!engine.reachable(&[1], &[99], 10));
    }

    #[test]
    fn analyze_dependencies_induces_subgraph_with_matching_edges() {
        let graph = linear_graph();
        let engine = FrontierReductionEngine::new(&graph);
        let subgraph = engine.analyze_dependencies(1, Direction::Outgoing, 10);
        assert_eq!(subgraph.nodes, vec![1, 2, 3, 4]);
        assert_eq!(subgraph.edges.len(), 3);
        assert!(subgraph.edges.iter().all(|e| subgraph.nodes.contains(&e.source) && subgraph.nodes.contains(&e.target)));
    }

    #[test]
    fn impact_radius_is_bidirectional_with_complexity_estimate() {
        let graph = linear_graph();
        let engine = FrontierReductionEngine::new(&graph);
        let impact = engine.impact_radius(&[3], 1);
        assert!(impact.forward.contains(&4));
        assert!(impact.reverse.contains(&2));
        assert!(impact.estimated_complexity > 0.0);
    }

    #[test]
    fn impact_radius_flags_long_paths_as_critical() {
        let graph = linear_graph();
        let engine = FrontierReductionEngine::new(&graph);
        let impact = engine.impact_radius(&[1], 2);
        assert!(impact.critical_paths.iter().any(|p| p.node == 3));
        assert!(impact.critical_paths.iter().all(|p| p.hops >= 2));
    }

    #[test]
    fn large_source_set_recurses_through_pivots_and_matches_base_case() {
        let graph = TemporalGraph::new();
        for id in 0..20u128 {
            graph.upsert_node(Node::new(id, NodeType::File, 1, "tester"));
        }
        for id in 0..19u128 {
            graph
                .add_edge(Edge {
                    id: 5000 + id,
                    source: id,
                    target: id + 1,
                    relation: crate::types::RelationType::Calls,
                    weight: 1.0,
                    validity: ValidityInterval::from(1),
                    author: "tester".into(),
                })
                .unwrap();
        }
        let sources: Vec<NodeId> = (0..10).collect();
        let engine = FrontierReductionEngine::new(&graph);
        let direct = engine.dijkstra(&sources, Direction::Outgoing, 20, 100, f32::INFINITY, &mut 0);
        let recursed = engine.compute_paths(&sources, Direction::Outgoing, 20, (0, 100));
        for (node, (dist, _, _)) in direct {
            assert_eq!(recursed.distances.get(&node).copied(), Some(dist));
        }
    }
}
