//! Typed temporal directed graph over code/agent entities.
//!
//! Nodes and edges are 128-bit ids (see [`NodeId`](crate::types::NodeId)).
//! An edge is active at time `t` iff `start <= t` and (`end` is absent or
//! `t <= end`) — an absent end means the edge is still valid. The graph is
//! a `DashMap` of adjacency lists in each direction, the same sharded-map
//! plus per-node-Vec shape used elsewhere in this crate for concurrent
//! structures that are mutated far less often than they are read.
pub mod fre;

use crate::error::{AgramaError, AgramaResult};
use crate::types::{NodeId, NodeType, RelationType};
use dashmap::DashMap;
use std::collections::HashMap;
use tracing::{debug, trace};

/// A validity interval: active while `start <= t` and, if `end` is set, `t <= end`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidityInterval {
    pub start: i64,
    pub end: Option<i64>,
}

impl ValidityInterval {
    pub fn from(start: i64) -> Self {
        Self { start, end: None }
    }

    pub fn contains(&self, t: i64) -> bool {
        self.start <= t && self.end.map(|end| t <= end).unwrap_or(true)
    }
}

/// A node in the temporal graph.
#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub node_type: NodeType,
    pub properties: HashMap<String, String>,
    pub created_at: i64,
    pub last_modified: i64,
    pub created_by: String,
    pub validity: ValidityInterval,
}

impl Node {
    pub fn new(id: NodeId, node_type: NodeType, created_at: i64, created_by: impl Into<String>) -> Self {
        Self {
            id,
            node_type,
            properties: HashMap::new(),
            created_at,
            last_modified: created_at,
            created_by: created_by.into(),
            validity: ValidityInterval::from(created_at),
        }
    }
}

/// A directed, typed, weighted, time-bounded edge between two nodes.
#[derive(Debug, Clone)]
pub struct Edge {
    pub id: NodeId,
    pub source: NodeId,
    pub target: NodeId,
    pub relation: RelationType,
    pub weight: f32,
    pub validity: ValidityInterval,
    pub author: String,
}

impl Edge {
    pub fn active_at(&self, t: i64) -> bool {
        self.validity.contains(t)
    }
}

/// Which direction to traverse from a set of source nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Outgoing,
    Incoming,
    Both,
}

/// Concurrent, typed, temporal directed graph.
#[derive(Debug, Default)]
pub struct TemporalGraph {
    nodes: DashMap<NodeId, Node>,
    outgoing: DashMap<NodeId, Vec<NodeId>>,
    incoming: DashMap<NodeId, Vec<NodeId>>,
    edges: DashMap<NodeId, Edge>,
}

impl TemporalGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert_node(&self, node: Node) {
        trace!(node_id = %node.id, node_type = ?node.node_type, "graph upsert_node");
        self.nodes.insert(node.id, node);
    }

    pub fn get_node(&self, id: NodeId) -> AgramaResult<Node> {
        self.nodes.get(&id).map(|n| n.clone()).ok_or_else(|| AgramaError::not_found("node", id.to_string()))
    }

    pub fn contains_node(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Add a directed edge. Both endpoints must already exist as nodes.
    pub fn add_edge(&self, edge: Edge) -> AgramaResult<()> {
        if !self.nodes.contains_key(&edge.source) {
            return Err(AgramaError::not_found("node", edge.source.to_string()));
        }
        if !self.nodes.contains_key(&edge.target) {
            return Err(AgramaError::not_found("node", edge.target.to_string()));
        }
        if edge.weight < 0.0 {
            return Err(AgramaError::invalid("edge weight must be non-negative"));
        }

        debug!(edge_id = %edge.id, source = %edge.source, target = %edge.target, relation = ?edge.relation, "graph add_edge");
        self.outgoing.entry(edge.source).or_default().push(edge.target);
        self.incoming.entry(edge.target).or_default().push(edge.source);
        self.edges.insert(edge.id, edge);
        Ok(())
    }

    /// Raw out-degree of `node`, ignoring temporal validity. Used by the
    /// Frontier Reduction Engine to estimate subtree size for pivot
    /// selection; not meant for traversal.
    pub fn out_degree(&self, node: NodeId) -> usize {
        self.outgoing.get(&node).map(|targets| targets.len()).unwrap_or(0)
    }

    pub fn get_edge(&self, id: NodeId) -> Option<Edge> {
        self.edges.get(&id).map(|e| e.clone())
    }

    /// Edges active at time `t` leaving `node`.
    pub fn outgoing_edges_at(&self, node: NodeId, t: i64) -> Vec<Edge> {
        let Some(targets) = self.outgoing.get(&node) else {
            return Vec::new();
        };
        targets
            .iter()
            .filter_map(|target| self.find_edge(node, *target))
            .filter(|e| e.active_at(t))
            .collect()
    }

    /// Edges active at time `t` entering `node`.
    pub fn incoming_edges_at(&self, node: NodeId, t: i64) -> Vec<Edge> {
        let Some(sources) = self.incoming.get(&node) else {
            return Vec::new();
        };
        sources
            .iter()
            .filter_map(|source| self.find_edge(*source, node))
            .filter(|e| e.active_at(t))
            .collect()
    }

    fn find_edge(&self, source: NodeId, target: NodeId) -> Option<Edge> {
        self.edges
            .iter()
            .find(|e| e.source == source && e.target == target)
            .map(|e| e.clone())
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// All node ids, for maintenance/introspection.
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes.iter().map(|e| *e.key()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: NodeId) -> Node {
        Node::new(id, NodeType::File, 1, "tester")
    }

    #[test]
    fn add_edge_requires_both_endpoints() {
        let graph = TemporalGraph::new();
        graph.upsert_node(node(1));
        let edge = Edge {
            id: 100,
            source: 1,
            target: 2,
            relation: RelationType::DependsOn,
            weight: 1.0,
            validity: ValidityInterval::from(1),
            author: "tester".into(),
        };
        assert!(graph.add_edge(edge).is_err());
    }

    #[test]
    fn edge_active_within_interval() {
        let graph = TemporalGraph::new();
        graph.upsert_node(node(1));
        graph.upsert_node(node(2));
        let edge = Edge {
            id: 100,
            source: 1,
            target: 2,
            relation: RelationType::Calls,
            weight: 1.0,
            validity: ValidityInterval { start: 10, end: Some(20) },
            author: "tester".into(),
        };
        graph.add_edge(edge).unwrap();

        assert!(graph.outgoing_edges_at(1, 15).len() == 1);
        assert!(graph.outgoing_edges_at(1, 5).is_empty());
        assert!(graph.outgoing_edges_at(1, 25).is_empty());
    }

    #[test]
    fn open_ended_edge_is_always_active_after_start() {
        let graph = TemporalGraph::new();
        graph.upsert_node(node(1));
        graph.upsert_node(node(2));
        graph
            .add_edge(Edge {
                id: 100,
                source: 1,
                target: 2,
                relation: RelationType::Contains,
                weight: 1.0,
                validity: ValidityInterval::from(10),
                author: "tester".into(),
            })
            .unwrap();

        assert!(graph.outgoing_edges_at(1, 9).is_empty());
        assert_eq!(graph.outgoing_edges_at(1, 10).len(), 1);
        assert_eq!(graph.outgoing_edges_at(1, 1_000_000).len(), 1);
    }

    #[test]
    fn negative_weight_is_rejected() {
        let graph = TemporalGraph::new();
        graph.upsert_node(node(1));
        graph.upsert_node(node(2));
        let edge = Edge {
            id: 100,
            source: 1,
            target: 2,
            relation: RelationType::Calls,
            weight: -1.0,
            validity: ValidityInterval::from(1),
            author: "tester".into(),
        };
        assert!(graph.add_edge(edge).is_err());
    }
}
