//! postie-route: Chinese Postman route construction (sans-IO).
//!
//! Finds a minimum-cost closed walk that traverses every edge of a
//! weighted undirected multigraph at least once:
//! odd-degree detection -> pairwise shortest paths -> minimum-weight
//! perfect matching -> edge duplication -> Eulerian circuit.
//!
//! ```rust
//! # use postie_route::{Graph, GraphError};
//! # fn run() -> Result<(), GraphError> {
//! let graph = Graph::from_edge_list([("A", "B", 1.0), ("B", "C", 1.0), ("C", "A", 1.0)])?;
//! let route = graph.chinese_postman()?;
//! assert_eq!(route.walk, vec!["A", "B", "C", "A"]);
//! assert_eq!(route.total_cost, 3.0);
//! # Ok(())
//! # }
//! ```
//!
//! This crate has **no I/O dependencies**. It operates on in-memory
//! graphs and returns structured, serde-serializable data. Loading graph
//! files and rendering routes belong to callers.

pub mod diagnostics;
pub mod euler;
pub mod graph;
pub mod matching;
pub mod postman;
pub mod shortest_path;
pub mod types;

use std::fmt;

pub use diagnostics::{Clock, SolveDiagnostics};
pub use euler::{EulerWalk, EulerianCircuitBuilder};
pub use graph::{Adjacency, EdgeSpec, Graph};
pub use matching::{DistanceTable, Matching, MatchingSolver};
pub use postman::ChinesePostmanSolver;
pub use shortest_path::{ShortestPathTree, ShortestPaths, dijkstra};
pub use types::{GraphError, Route, SearchBudget, SolverConfig, Weight, WeightPolicy};

/// Anything usable as a graph vertex: strings, integers, tuples, or any
/// other ordered, cloneable key.
///
/// `Debug` is required so errors can name the offending vertex.
pub trait Vertex: Ord + Clone + fmt::Debug {}

impl<T: Ord + Clone + fmt::Debug> Vertex for T {}

/// Run the full Chinese Postman solve with `config`.
///
/// Shorthand for `ChinesePostmanSolver::new(*config).solve(graph)`.
///
/// # Errors
///
/// See [`ChinesePostmanSolver::solve`].
pub fn solve<V: Vertex>(graph: &Graph<V>, config: &SolverConfig) -> Result<Route<V>, GraphError> {
    ChinesePostmanSolver::new(*config).solve(graph)
}
