//! # Agrama
//!
//! A temporal knowledge-graph core for collaborating AI agents.
//!
//! Agrama keeps an append-only, per-key change history (the temporal
//! store), a BM25 lexical index, an HNSW approximate-nearest-neighbor
//! vector index, and a typed temporal graph walked by a bounded
//! multi-source shortest-path engine (the Frontier Reduction Engine). A
//! triple-hybrid search fuses all three signals. Every one of these pieces
//! is reachable through five primitives: `store`, `retrieve`, `search`,
//! `link`, `transform`.
//!
//! ## Quick start
//!
//! ```
//! use agrama::PrimitiveDispatcher;
//!
//! let db = PrimitiveDispatcher::new();
//! db.store("calc.js", b"function calculateTotal(items){}".to_vec(), "agent-1").unwrap();
//! let current = db.retrieve("calc.js").unwrap();
//! assert_eq!(current, b"function calculateTotal(items){}");
//!
//! let results = db.search("calculateTotal", None, &[], 5, None, None).unwrap();
//! assert!(!results.is_empty());
//! ```
//!
//! ## Concurrency
//!
//! Every primitive runs synchronously on the calling thread. The store and
//! indices are `DashMap`-backed or guarded by `std::sync` locks; the only
//! async surface in the crate is the `tokio::sync::broadcast` channel
//! behind [`events::EventBus`], which accepts publishes from sync code and
//! only needs a runtime on the subscriber side.

pub mod bm25;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod graph;
pub mod orchestration;
pub mod search;
pub mod store;
pub mod types;
pub mod vector;

pub use dispatcher::PrimitiveDispatcher;
pub use error::{AgramaError, AgramaResult, ErrorKind};
pub use events::{EventBus, EventRecord, EventType};
pub use graph::{Direction, Edge, Node, TemporalGraph, ValidityInterval};
pub use orchestration::{ConnectionKind, OrchestrationContext, Participant, ParticipantType};
pub use search::{HybridWeights, TripleHybridSearch};
pub use store::TemporalStore;
pub use types::{Change, HybridResult, Key, NodeId, NodeType, RelationType};
pub use vector::{DistanceMetric, HnswConfig, Vector, VectorSearchOptions, VectorSearchResult, VectorStore};

/// Convenient glob import for common types.
pub mod prelude {
    pub use crate::dispatcher::PrimitiveDispatcher;
    pub use crate::error::{AgramaError, AgramaResult};
    pub use crate::graph::{Direction, Edge, Node, TemporalGraph};
    pub use crate::orchestration::{ConnectionKind, OrchestrationContext, ParticipantType};
    pub use crate::search::HybridWeights;
    pub use crate::types::{Change, HybridResult, NodeId, NodeType, RelationType};
    pub use crate::vector::{DistanceMetric, Vector, VectorSearchOptions};
}

/// Initialize the tracing subscriber from the `AGRAMA_LOG` environment
/// variable (defaults to `info`).
pub fn init_logging() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_env("AGRAMA_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

/// Initialize the tracing subscriber with an explicit level, ignoring
/// `AGRAMA_LOG`.
pub fn init_logging_with_level(level: &str) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::registry()
        .with(EnvFilter::new(level))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}
