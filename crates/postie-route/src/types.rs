//! Shared types for the postie route engine.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Edge weight. Always finite and non-negative once stored in a graph.
pub type Weight = f64;

/// Reject weights that would break shortest-path relaxation.
pub(crate) fn check_weight(weight: Weight) -> Result<Weight, GraphError> {
    if weight.is_finite() && weight >= 0.0 {
        Ok(weight)
    } else {
        Err(GraphError::InvalidWeight(weight))
    }
}

/// Selects which weight of a bundle of parallel edges counts as the
/// cost of travelling between two adjacent vertices.
///
/// Only affects path costs. Every parallel edge is still traversed by
/// the final route and charged at its own weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WeightPolicy {
    /// Cheapest of the parallel edges.
    #[default]
    Minimum,

    /// First edge inserted between the pair. Later parallel edges are
    /// ignored for path cost purposes.
    First,
}

impl WeightPolicy {
    /// Pick the travel cost from a non-empty weight sequence.
    ///
    /// Returns `None` for an empty sequence.
    #[must_use]
    pub fn select(self, weights: &[Weight]) -> Option<Weight> {
        match self {
            Self::First => weights.first().copied(),
            Self::Minimum => weights.iter().copied().reduce(Weight::min),
        }
    }
}

impl fmt::Display for WeightPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Minimum => f.write_str("minimum"),
            Self::First => f.write_str("first"),
        }
    }
}

/// Limits on the exhaustive matching search.
///
/// The search is exponential in the number of odd-degree vertices, so
/// both limits exist to turn a runaway search into
/// [`GraphError::SearchBudgetExceeded`] instead of a hang.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchBudget {
    /// Maximum number of pairing attempts. `None` means unbounded.
    pub max_nodes: Option<u64>,

    /// Wall-clock limit for the whole search. `None` means unbounded.
    #[serde(default, with = "crate::diagnostics::option_duration_serde")]
    pub time_limit: Option<Duration>,
}

impl SearchBudget {
    /// Default node limit. Covers every instance with up to 14 odd
    /// vertices without pruning.
    pub const DEFAULT_MAX_NODES: u64 = 5_000_000;

    /// No limits at all.
    #[must_use]
    pub const fn unbounded() -> Self {
        Self {
            max_nodes: None,
            time_limit: None,
        }
    }

    /// Limit only the number of search nodes.
    #[must_use]
    pub const fn nodes(max_nodes: u64) -> Self {
        Self {
            max_nodes: Some(max_nodes),
            time_limit: None,
        }
    }
}

impl Default for SearchBudget {
    fn default() -> Self {
        Self::nodes(Self::DEFAULT_MAX_NODES)
    }
}

/// Configuration for a Chinese Postman solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolverConfig {
    /// How parallel edges are priced during shortest-path search.
    pub weight_policy: WeightPolicy,

    /// Limits for the perfect-matching search.
    pub search_budget: SearchBudget,
}

impl SolverConfig {
    /// Default parallel-edge pricing.
    pub const DEFAULT_WEIGHT_POLICY: WeightPolicy = WeightPolicy::Minimum;

    /// Default matching node limit.
    pub const DEFAULT_MAX_NODES: u64 = SearchBudget::DEFAULT_MAX_NODES;
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            weight_policy: Self::DEFAULT_WEIGHT_POLICY,
            search_budget: SearchBudget::default(),
        }
    }
}

/// A closed walk that covers every edge of a graph at least once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route<V> {
    /// Visited vertices in order. First equals last.
    pub walk: Vec<V>,

    /// `weights[i]` is the weight of the edge walked from `walk[i]` to
    /// `walk[i + 1]`.
    pub weights: Vec<Weight>,

    /// Sum of every edge weight in the input graph.
    pub original_cost: Weight,

    /// Sum of the weights of the edges that had to be walked twice.
    pub duplicated_cost: Weight,

    /// `original_cost + duplicated_cost`.
    pub total_cost: Weight,

    /// Edges added to make the graph Eulerian, one entry per copy.
    pub duplicated_edges: Vec<(V, V, Weight)>,

    /// Odd-degree vertex pairs chosen by the matching step.
    pub matched_pairs: Vec<(V, V)>,
}

impl<V> Route<V> {
    /// Number of edges walked.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.weights.len()
    }

    /// Returns `true` if the walk has no vertices.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.walk.is_empty()
    }
}

/// Errors that can occur while building or routing a graph.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GraphError {
    /// Malformed constructor input.
    #[error("invalid graph construction: {0}")]
    InvalidGraphConstruction(String),

    /// Weight is negative, NaN or infinite.
    #[error("invalid edge weight {0}: weights must be finite and non-negative")]
    InvalidWeight(Weight),

    /// The operation referenced a vertex that is not in the graph.
    #[error("vertex {0} not found")]
    VertexNotFound(String),

    /// A target cannot be reached from a source.
    #[error("graph is disconnected: {to} is unreachable from {from}")]
    DisconnectedGraph {
        /// Source vertex (debug-formatted).
        from: String,
        /// Unreachable vertex (debug-formatted).
        to: String,
    },

    /// An Eulerian circuit or trail needs 0 or 2 odd-degree vertices.
    #[error("no Eulerian path: graph has {odd_vertices} odd-degree vertices")]
    NoEulerianPath {
        /// How many odd-degree vertices were found.
        odd_vertices: usize,
    },

    /// No pairing covers every vertex.
    #[error("no perfect matching exists")]
    NoPerfectMatching,

    /// The matching search ran out of nodes or time.
    #[error("matching search budget exceeded after {nodes_explored} nodes")]
    SearchBudgetExceeded {
        /// Pairing attempts made before giving up.
        nodes_explored: u64,
    },

    /// `update_edge` addressed a parallel edge that does not exist.
    #[error("parallel edge index {index} out of range (edge has {len} occurrences)")]
    EdgeIndexOutOfRange {
        /// Requested index.
        index: usize,
        /// Number of parallel edges between the pair.
        len: usize,
    },

    /// The operation is not supported.
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),
}

impl GraphError {
    pub(crate) fn vertex_not_found<V: fmt::Debug>(v: &V) -> Self {
        Self::VertexNotFound(format!("{v:?}"))
    }

    pub(crate) fn disconnected<V: fmt::Debug>(from: &V, to: &V) -> Self {
        Self::DisconnectedGraph {
            from: format!("{from:?}"),
            to: format!("{to:?}"),
        }
    }
}
