//! Primitive dispatcher: the five operations every caller goes through.
//!
//! `store`, `retrieve`, `search`, `link`, and `transform` are the entire
//! surface. Everything else in this crate exists to make these five fast
//! and correct. Dispatch happens synchronously on the calling thread — the
//! store and the indices are plain locked/sharded structures, not actors
//! behind a channel, so there is no scheduler latency between a write and
//! its visibility to the next read on the same thread.
//!
//! # Atomicity
//!
//! The temporal store is the source of truth; the BM25, HNSW, and graph
//! indices are derived and rebuildable. A `store` call appends to the
//! store first — that append cannot meaningfully fail — and only then
//! updates the derived indices. If an index update fails, the store
//! already holds the correct, durable value; the dispatcher returns the
//! index error to the caller so it can retry re-indexing, rather than
//! trying to undo the store append.
use crate::bm25::Bm25Index;
use crate::error::{AgramaError, AgramaResult};
use crate::events::EventBus;
use crate::graph::{Direction, Edge, Node, TemporalGraph, ValidityInterval};
use crate::orchestration::OrchestrationContext;
use crate::search::{HybridWeights, TripleHybridSearch, DEFAULT_MAX_GRAPH_HOPS};
use crate::store::TemporalStore;
use crate::types::{hash_to_u128, next_timestamp, Change, HybridResult, NodeId, NodeType, RelationType};
use crate::vector::{Vector, VectorStore};
use std::collections::HashMap;
use tracing::debug;

/// A registered transform function: current content and caller-supplied
/// `args` bytes in, transformed output bytes out.
pub type TransformFn = fn(&[u8], &[u8]) -> AgramaResult<Vec<u8>>;

/// Longest preview kept in a `transform` call's `output_summary`.
const OUTPUT_SUMMARY_PREVIEW_CHARS: usize = 120;

fn looks_like_code(content: &[u8]) -> bool {
    if content.len() < 50 {
        return false;
    }
    let text = String::from_utf8_lossy(content);
    ["function", "class", "import", "const"].iter().any(|kw| text.contains(kw))
}

fn placeholder_embedding(content: &[u8]) -> Vector {
    let hash = blake3::hash(content);
    let data: Vec<f32> = hash.as_bytes().iter().map(|&b| b as f32 / 255.0).collect();
    Vector::new(data, "content-hash-placeholder")
}

fn summarize_output(output: &[u8]) -> String {
    let text = String::from_utf8_lossy(output);
    if text.chars().count() > OUTPUT_SUMMARY_PREVIEW_CHARS {
        let truncated: String = text.chars().take(OUTPUT_SUMMARY_PREVIEW_CHARS).collect();
        format!("{truncated}… ({} bytes)", output.len())
    } else {
        format!("{text} ({} bytes)", output.len())
    }
}

/// Ties the store, the three indices, the event bus, and the participant
/// roster together behind the five primitives.
pub struct PrimitiveDispatcher {
    pub store: TemporalStore,
    pub bm25: Bm25Index,
    pub vectors: VectorStore,
    pub graph: TemporalGraph,
    pub events: EventBus,
    pub orchestration: OrchestrationContext,
    transforms: HashMap<&'static str, TransformFn>,
}

impl Default for PrimitiveDispatcher {
    fn default() -> Self {
        let mut transforms: HashMap<&'static str, TransformFn> = HashMap::new();
        transforms.insert("uppercase", |bytes, _args| {
            Ok(String::from_utf8_lossy(bytes).to_uppercase().into_bytes())
        });
        transforms.insert("lowercase", |bytes, _args| {
            Ok(String::from_utf8_lossy(bytes).to_lowercase().into_bytes())
        });
        transforms.insert("reverse_lines", |bytes, _args| {
            let text = String::from_utf8_lossy(bytes);
            Ok(text.lines().rev().collect::<Vec<_>>().join("\n").into_bytes())
        });

        Self {
            store: TemporalStore::new(),
            bm25: Bm25Index::default(),
            vectors: VectorStore::default(),
            graph: TemporalGraph::new(),
            events: EventBus::new(),
            orchestration: OrchestrationContext::new(),
            transforms,
        }
    }
}

impl PrimitiveDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a change, then update the derived indices if the content
    /// looks like code (>= 50 bytes and contains `function`, `class`,
    /// `import`, or `const`).
    pub fn store(&self, key: impl Into<String>, content: Vec<u8>, author: impl Into<String>) -> AgramaResult<Change> {
        let key = key.into();
        let author = author.into();
        debug!(%key, %author, bytes = content.len(), "dispatcher store");
        let change = self.store.save(key.clone(), content.clone(), author.clone())?;

        if looks_like_code(&content) {
            let node_id = hash_to_u128(&key);
            let doc_id = (node_id & 0xFFFF_FFFF_FFFF_FFFF) as u64;
            self.bm25.add_document(doc_id, key.clone(), &String::from_utf8_lossy(&content))?;

            if !self.graph.contains_node(node_id) {
                self.graph.upsert_node(Node::new(node_id, NodeType::File, change.timestamp, author.clone()));
            }
            self.vectors.embed(node_id, placeholder_embedding(&content))?;
        }

        self.events.publish(crate::events::EventRecord::change(&key, &author, content.len()));
        self.orchestration.record_contribution(&author);
        Ok(change)
    }

    pub fn retrieve(&self, key: &str) -> AgramaResult<Vec<u8>> {
        self.store.get_current(key)
    }

    pub fn retrieve_history(&self, key: &str, limit: usize) -> AgramaResult<Vec<Change>> {
        self.store.get_history(key, limit)
    }

    /// Create (or reuse) a typed edge between two store keys, auto-creating
    /// graph nodes for either endpoint that hasn't been indexed yet.
    pub fn link(
        &self,
        source_key: &str,
        target_key: &str,
        relation: RelationType,
        weight: f32,
        author: impl Into<String>,
    ) -> AgramaResult<()> {
        let author = author.into();
        let now = next_timestamp();
        let source = hash_to_u128(source_key);
        let target = hash_to_u128(target_key);
        debug!(%source_key, %target_key, ?relation, "dispatcher link");

        if !self.graph.contains_node(source) {
            self.graph.upsert_node(Node::new(source, NodeType::File, now, author.clone()));
        }
        if !self.graph.contains_node(target) {
            self.graph.upsert_node(Node::new(target, NodeType::File, now, author.clone()));
        }

        let edge_id = hash_to_u128(&format!("{source_key}->{target_key}:{now}"));
        self.graph.add_edge(Edge {
            id: edge_id,
            source,
            target,
            relation,
            weight,
            validity: ValidityInterval::from(now),
            author: author.clone(),
        })?;

        self.events.publish(crate::events::EventRecord::link(source, target, relation));
        self.orchestration.record_contribution(&author);
        Ok(())
    }

    /// Fused BM25 + HNSW + FRE search. `starting_nodes` seeds the FRE pass;
    /// pass an empty slice to skip graph-distance scoring entirely.
    /// `max_graph_hops` bounds the FRE pass (default
    /// [`DEFAULT_MAX_GRAPH_HOPS`] when `None`); `weights` overrides the
    /// default 0.4/0.4/0.2 fusion weights when `Some`.
    pub fn search(
        &self,
        query_text: &str,
        query_vector: Option<&Vector>,
        starting_nodes: &[NodeId],
        k: usize,
        max_graph_hops: Option<u32>,
        weights: Option<HybridWeights>,
    ) -> AgramaResult<Vec<HybridResult>> {
        let max_graph_hops = max_graph_hops.unwrap_or(DEFAULT_MAX_GRAPH_HOPS);
        debug!(query = query_text, k, max_graph_hops, "dispatcher search");
        let mut search = TripleHybridSearch::new(&self.bm25, &self.vectors, &self.graph);
        if let Some(weights) = weights {
            search = search.with_weights(weights)?;
        }
        Ok(search.search(query_text, query_vector, starting_nodes, k.max(64), k, max_graph_hops))
    }

    /// Apply a registered named transform to a key's current content and
    /// append the result as a new change, returning `(change_id,
    /// output_summary)`.
    pub fn transform(&self, key: &str, op: &str, args: &[u8], author: impl Into<String>) -> AgramaResult<(i64, String)> {
        let author = author.into();
        debug!(key, op, %author, "dispatcher transform");
        let content = self.store.get_current(key)?;
        let Some(f) = self.transforms.get(op) else {
            return Err(AgramaError::invalid(format!("unknown transform '{op}'")));
        };
        let output = f(&content, args)?;
        let output_summary = summarize_output(&output);
        let change = self.store.save(key.to_string(), output, author.clone())?;

        self.events.publish(crate::events::EventRecord::change(key, &author, change.content.len()));
        self.orchestration.record_contribution(&author);
        Ok((change.timestamp, output_summary))
    }

    /// Direct dependency neighbors of `key`, per the typed graph.
    pub fn dependencies(&self, key: &str, direction: Direction, max_hops: u32) -> Vec<NodeId> {
        use crate::graph::fre::FrontierReductionEngine;
        let node = hash_to_u128(key);
        let engine = FrontierReductionEngine::new(&self.graph);
        engine
            .analyze_dependencies(node, direction, max_hops)
            .nodes
            .into_iter()
            .filter(|&n| n != node)
            .collect()
    }
}
