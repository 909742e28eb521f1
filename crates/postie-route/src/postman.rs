//! Chinese Postman solve as a typestate pipeline.
//!
//! [`ChinesePostmanSolver::solve`] runs every stage in one call.
//! [`Postman`] lets the caller drive the solve one step at a time and
//! inspect each intermediate result:
//!
//! ```rust
//! # use postie_route::{Graph, GraphError, SolverConfig};
//! # use postie_route::postman::Postman;
//! # fn run() -> Result<(), GraphError> {
//! let graph = Graph::from_edge_list([("A", "B"), ("B", "C")])?;
//! let matched = Postman::new(&graph, SolverConfig::default())
//!     .detect_odd_vertices()?
//!     .compute_distances()?
//!     .match_odd_vertices()?;
//! assert_eq!(matched.matching().pairs, vec![("A", "C")]);
//!
//! let route = matched.augment()?.route()?.into_route();
//! assert_eq!(route.total_cost, 4.0);
//! # Ok(())
//! # }
//! ```
//!
//! Each stage method consumes `self` and returns the next state, so
//! stages cannot be skipped or reordered. The caller's graph is only
//! borrowed. Augmentation works on a private copy that the circuit
//! stage consumes.

use crate::Vertex;
use crate::diagnostics::{Clock, SolveDiagnostics, StageMetrics};
use crate::euler::EulerianCircuitBuilder;
use crate::graph::Graph;
use crate::matching::{DistanceTable, Matching, MatchingSolver};
use crate::shortest_path::{self, ShortestPaths};
use crate::types::{GraphError, Route, SolverConfig, Weight};

// ───────────────────────── Stage 0: Pending ──────────────────────────

/// Solve state before any work has been done.
#[must_use = "solve stages are consumed by advancing; call .detect_odd_vertices() to continue"]
pub struct Pending<'g, V> {
    graph: &'g Graph<V>,
    config: SolverConfig,
    start: Option<V>,
}

impl<'g, V: Vertex> Pending<'g, V> {
    /// The graph being routed.
    #[must_use]
    pub const fn graph(&self) -> &'g Graph<V> {
        self.graph
    }

    /// Pin the vertex the closed walk starts and ends at.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::VertexNotFound`] if `start` is not in the
    /// graph.
    pub fn starting_at(mut self, start: V) -> Result<Self, GraphError> {
        self.graph.require_vertex(&start)?;
        self.start = Some(start);
        Ok(self)
    }

    /// Find the odd-degree vertices and advance to [`OddVerticesFound`].
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::InvalidGraphConstruction`] for a graph
    /// without vertices and [`GraphError::UnsupportedOperation`] for a
    /// graph holding one-directional edges.
    pub fn detect_odd_vertices(self) -> Result<OddVerticesFound<'g, V>, GraphError> {
        if self.graph.is_empty() {
            return Err(GraphError::InvalidGraphConstruction(
                "cannot route a graph with no vertices".to_owned(),
            ));
        }
        if !self.graph.is_symmetric() {
            return Err(GraphError::UnsupportedOperation(
                "routing over one-directional edges".to_owned(),
            ));
        }
        let odd = self.graph.odd_degree_vertices();
        log::debug!(
            "{} of {} vertices have odd degree",
            odd.len(),
            self.graph.vertex_count()
        );
        Ok(OddVerticesFound {
            graph: self.graph,
            config: self.config,
            start: self.start,
            odd,
        })
    }
}

// ───────────────────────── Stage 1: OddVerticesFound ─────────────────

/// Solve state after collecting the odd-degree vertices.
#[must_use = "solve stages are consumed by advancing; call .compute_distances() to continue"]
pub struct OddVerticesFound<'g, V> {
    graph: &'g Graph<V>,
    config: SolverConfig,
    start: Option<V>,
    odd: Vec<V>,
}

impl<'g, V: Vertex> OddVerticesFound<'g, V> {
    /// Odd-degree vertices in ascending order.
    #[must_use]
    pub fn odd_vertices(&self) -> &[V] {
        &self.odd
    }

    /// Run Dijkstra from each odd vertex and tabulate the pairwise
    /// distances, advancing to [`DistancesComputed`].
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::DisconnectedGraph`] if some pair of odd
    /// vertices is mutually unreachable.
    pub fn compute_distances(self) -> Result<DistancesComputed<'g, V>, GraphError> {
        let n = self.odd.len();
        let policy = self.config.weight_policy;
        let mut table = DistanceTable::new(self.odd.clone());
        let mut paths = Vec::with_capacity(n.saturating_sub(1));

        // The last odd vertex is only ever a target.
        for (i, source) in self.odd.iter().enumerate().take(n.saturating_sub(1)) {
            let from_source = shortest_path::dijkstra(self.graph, source, policy)?;
            for (j, target) in self.odd.iter().enumerate().skip(i + 1) {
                match from_source.distance_to(target) {
                    Some(d) if d.is_finite() => table.set(i, j, d),
                    _ => return Err(GraphError::disconnected(source, target)),
                }
            }
            paths.push(from_source);
        }
        log::debug!("computed {} pairwise odd-vertex distances", n * n.saturating_sub(1) / 2);

        Ok(DistancesComputed {
            graph: self.graph,
            config: self.config,
            start: self.start,
            odd: self.odd,
            table,
            paths,
        })
    }
}

// ───────────────────────── Stage 2: DistancesComputed ────────────────

/// Solve state after the pairwise distance table is built.
#[must_use = "solve stages are consumed by advancing; call .match_odd_vertices() to continue"]
pub struct DistancesComputed<'g, V> {
    graph: &'g Graph<V>,
    config: SolverConfig,
    start: Option<V>,
    odd: Vec<V>,
    table: DistanceTable<V>,
    /// `paths[i]` is rooted at `odd[i]`.
    paths: Vec<ShortestPaths<V>>,
}

impl<'g, V: Vertex> DistancesComputed<'g, V> {
    /// Pairwise shortest-path distances between odd vertices.
    #[must_use]
    pub const fn table(&self) -> &DistanceTable<V> {
        &self.table
    }

    /// Find the minimum-weight perfect matching of the odd vertices and
    /// advance to [`Matched`].
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::NoPerfectMatching`] or
    /// [`GraphError::SearchBudgetExceeded`] from the matching search.
    pub fn match_odd_vertices(self) -> Result<Matched<'g, V>, GraphError> {
        let matching = MatchingSolver::new(self.config.search_budget).solve(&self.table)?;
        Ok(Matched {
            graph: self.graph,
            config: self.config,
            start: self.start,
            odd: self.odd,
            table: self.table,
            paths: self.paths,
            matching,
        })
    }
}

// ───────────────────────── Stage 3: Matched ──────────────────────────

/// Solve state after pairing up the odd vertices.
#[must_use = "solve stages are consumed by advancing; call .augment() to continue"]
pub struct Matched<'g, V> {
    graph: &'g Graph<V>,
    config: SolverConfig,
    start: Option<V>,
    odd: Vec<V>,
    table: DistanceTable<V>,
    paths: Vec<ShortestPaths<V>>,
    matching: Matching<V>,
}

impl<'g, V: Vertex> Matched<'g, V> {
    /// The chosen matching.
    #[must_use]
    pub const fn matching(&self) -> &Matching<V> {
        &self.matching
    }

    /// Duplicate every hop of each matched pair's shortest path into a
    /// working copy of the graph, advancing to [`Augmented`].
    ///
    /// Each duplicate is priced by the configured weight policy, the
    /// same cost its shortest path was measured with.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::DisconnectedGraph`] if a matched pair has no
    /// path, which the distance stage rules out.
    pub fn augment(self) -> Result<Augmented<'g, V>, GraphError> {
        let policy = self.config.weight_policy;
        let mut working = self.graph.clone();
        let mut duplicated_edges = Vec::new();

        for (a, b) in &self.matching.pairs {
            let from_a = self
                .odd
                .binary_search(a)
                .ok()
                .and_then(|i| self.paths.get(i))
                .ok_or_else(|| GraphError::vertex_not_found(a))?;
            let path = from_a.path_to(b)?;
            for hop in path.windows(2) {
                let [u, v] = hop else { continue };
                let w = self
                    .graph
                    .travel_cost(u, v, policy)
                    .ok_or_else(|| GraphError::disconnected(u, v))?;
                working.add_parallel_edge(u.clone(), v.clone(), w)?;
                duplicated_edges.push((u.clone(), v.clone(), w));
            }
        }
        log::debug!(
            "duplicated {} edges for {} matched pairs",
            duplicated_edges.len(),
            self.matching.pairs.len()
        );

        Ok(Augmented {
            graph: self.graph,
            start: self.start,
            table_len: self.table.len(),
            matching: self.matching,
            working,
            duplicated_edges,
        })
    }
}

// ───────────────────────── Stage 4: Augmented ────────────────────────

/// Solve state after duplicating edges. Every vertex of the working
/// copy has even degree.
#[must_use = "solve stages are consumed by advancing; call .route() to continue"]
pub struct Augmented<'g, V> {
    graph: &'g Graph<V>,
    start: Option<V>,
    table_len: usize,
    matching: Matching<V>,
    working: Graph<V>,
    duplicated_edges: Vec<(V, V, Weight)>,
}

impl<V: Vertex> Augmented<'_, V> {
    /// The augmented working copy.
    #[must_use]
    pub const fn working_graph(&self) -> &Graph<V> {
        &self.working
    }

    /// Edges added by augmentation, one entry per copy.
    #[must_use]
    pub fn duplicated_edges(&self) -> &[(V, V, Weight)] {
        &self.duplicated_edges
    }

    fn duplicated_cost(&self) -> Weight {
        self.duplicated_edges.iter().map(|&(_, _, w)| w).sum()
    }

    /// Walk the working copy with Hierholzer's algorithm, advancing to
    /// [`Routed`].
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::DisconnectedGraph`] if the edges span more
    /// than one component, or if the pinned start vertex is isolated
    /// while other vertices carry edges.
    pub fn route(self) -> Result<Routed<V>, GraphError> {
        let original_cost = self.graph.total_weight();
        let duplicated_cost = self.duplicated_cost();
        let walk = EulerianCircuitBuilder::new(self.working).build(self.start.as_ref())?;
        log::debug!(
            "closed walk of {} edges, cost {}",
            walk.edge_count(),
            original_cost + duplicated_cost
        );

        Ok(Routed {
            matched_vertices: self.table_len,
            route: Route {
                walk: walk.vertices,
                weights: walk.weights,
                original_cost,
                duplicated_cost,
                total_cost: original_cost + duplicated_cost,
                duplicated_edges: self.duplicated_edges,
                matched_pairs: self.matching.pairs,
            },
        })
    }
}

// ───────────────────────── Stage 5: Routed ───────────────────────────

/// Final solve state holding the route.
pub struct Routed<V> {
    matched_vertices: usize,
    route: Route<V>,
}

impl<V> Routed<V> {
    /// The computed route.
    #[must_use]
    pub const fn route(&self) -> &Route<V> {
        &self.route
    }

    /// Consume the pipeline and return the route.
    #[must_use]
    pub fn into_route(self) -> Route<V> {
        self.route
    }
}

// ──────────────────── PostmanStage trait ─────────────────────────────

/// Total number of stages, [`Pending`] included.
pub const STAGE_COUNT: usize = 6;

/// Common interface over every stage that has done work.
///
/// [`Pending`] is excluded: it has done nothing worth measuring.
pub trait PostmanStage {
    /// Short name of this stage (e.g. `"odd_vertices"`).
    const NAME: &'static str;

    /// Zero-based index of this stage (`1` for [`OddVerticesFound`]
    /// through `5` for [`Routed`]).
    const INDEX: usize;

    /// Metrics describing the work done to reach this stage.
    fn metrics(&self) -> StageMetrics;
}

impl<V: Vertex> PostmanStage for OddVerticesFound<'_, V> {
    const NAME: &'static str = "odd_vertices";
    const INDEX: usize = 1;

    fn metrics(&self) -> StageMetrics {
        StageMetrics::OddVertices {
            vertex_count: self.graph.vertex_count(),
            edge_count: self.graph.edge_count(),
            odd_vertex_count: self.odd.len(),
        }
    }
}

impl<V: Vertex> PostmanStage for DistancesComputed<'_, V> {
    const NAME: &'static str = "distances";
    const INDEX: usize = 2;

    fn metrics(&self) -> StageMetrics {
        let n = self.table.len();
        StageMetrics::Distances {
            dijkstra_runs: self.paths.len(),
            pair_count: n * n.saturating_sub(1) / 2,
            max_pair_distance: self.table.max_finite_weight(),
        }
    }
}

impl<V: Vertex> PostmanStage for Matched<'_, V> {
    const NAME: &'static str = "matching";
    const INDEX: usize = 3;

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Matching {
            pair_count: self.matching.pairs.len(),
            total_weight: self.matching.total_weight,
            nodes_explored: self.matching.nodes_explored,
        }
    }
}

impl<V: Vertex> PostmanStage for Augmented<'_, V> {
    const NAME: &'static str = "augment";
    const INDEX: usize = 4;

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Augmentation {
            duplicated_edge_count: self.duplicated_edges.len(),
            duplicated_cost: self.duplicated_cost(),
        }
    }
}

impl<V> PostmanStage for Routed<V> {
    const NAME: &'static str = "circuit";
    const INDEX: usize = 5;

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Circuit {
            walk_edges: self.route.edge_count(),
            matched_vertices: self.matched_vertices,
            original_cost: self.route.original_cost,
            total_cost: self.route.total_cost,
        }
    }
}

// ───────────────────────── Entry points ──────────────────────────────

/// Entry point for driving a solve stage by stage.
pub struct Postman;

impl Postman {
    /// Start a solve of `graph`. Nothing is computed until the first
    /// stage method is called.
    #[allow(clippy::new_ret_no_self)]
    pub const fn new<V>(graph: &Graph<V>, config: SolverConfig) -> Pending<'_, V> {
        Pending {
            graph,
            config,
            start: None,
        }
    }
}

/// Minimum-cost closed walk covering every edge of an undirected graph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChinesePostmanSolver {
    config: SolverConfig,
}

impl ChinesePostmanSolver {
    /// Create a solver with the given configuration.
    #[must_use]
    pub const fn new(config: SolverConfig) -> Self {
        Self { config }
    }

    /// The solver configuration.
    #[must_use]
    pub const fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Run every stage and return the route.
    ///
    /// The closed walk starts at the lowest vertex that carries an edge.
    ///
    /// # Errors
    ///
    /// - [`GraphError::InvalidGraphConstruction`] for a graph without
    ///   vertices.
    /// - [`GraphError::UnsupportedOperation`] for one-directional edges.
    /// - [`GraphError::DisconnectedGraph`] if the edges do not form one
    ///   connected component.
    /// - [`GraphError::NoPerfectMatching`] or
    ///   [`GraphError::SearchBudgetExceeded`] from the matching search.
    pub fn solve<V: Vertex>(&self, graph: &Graph<V>) -> Result<Route<V>, GraphError> {
        Self::run(Postman::new(graph, self.config))
    }

    /// [`solve`](Self::solve), with the closed walk starting and ending
    /// at `start`.
    ///
    /// # Errors
    ///
    /// As [`solve`](Self::solve), plus [`GraphError::VertexNotFound`] if
    /// `start` is not in the graph.
    pub fn solve_from<V: Vertex>(&self, graph: &Graph<V>, start: &V) -> Result<Route<V>, GraphError> {
        Self::run(Postman::new(graph, self.config).starting_at(start.clone())?)
    }

    /// [`solve`](Self::solve), also timing every stage with `clock`.
    ///
    /// # Errors
    ///
    /// As [`solve`](Self::solve).
    pub fn solve_with_diagnostics<V: Vertex, C: Clock>(
        &self,
        graph: &Graph<V>,
        clock: &C,
    ) -> Result<(Route<V>, SolveDiagnostics), GraphError> {
        crate::diagnostics::solve_with_diagnostics(Postman::new(graph, self.config), clock)
    }

    fn run<V: Vertex>(pending: Pending<'_, V>) -> Result<Route<V>, GraphError> {
        Ok(pending
            .detect_odd_vertices()?
            .compute_distances()?
            .match_odd_vertices()?
            .augment()?
            .route()?
            .into_route())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::{SearchBudget, WeightPolicy};

    fn path_abc() -> Graph<&'static str> {
        Graph::from_edge_list([("A", "B"), ("B", "C")]).unwrap()
    }

    fn assert_close(actual: Weight, expected: Weight) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    // ─────────── Typed API tests ─────────────────────────────────

    #[test]
    fn pending_exposes_graph() {
        let g = path_abc();
        let pending = Postman::new(&g, SolverConfig::default());
        assert_eq!(pending.graph().vertex_count(), 3);
    }

    #[test]
    fn starting_at_unknown_vertex_fails() {
        let g = path_abc();
        let result = Postman::new(&g, SolverConfig::default()).starting_at("Z");
        assert!(matches!(result, Err(GraphError::VertexNotFound(_))));
    }

    #[test]
    fn empty_graph_is_rejected() {
        let g = Graph::<u32>::new();
        let result = Postman::new(&g, SolverConfig::default()).detect_odd_vertices();
        assert!(matches!(
            result,
            Err(GraphError::InvalidGraphConstruction(_))
        ));
    }

    #[test]
    fn one_directional_edges_are_unsupported() {
        let mut g = Graph::new();
        g.add_edge(1, 2, 1.0, false).unwrap();
        let result = ChinesePostmanSolver::default().solve(&g);
        assert!(matches!(result, Err(GraphError::UnsupportedOperation(_))));
    }

    #[test]
    fn odd_vertices_found_lists_endpoints() {
        let g = path_abc();
        let stage = Postman::new(&g, SolverConfig::default())
            .detect_odd_vertices()
            .unwrap();
        assert_eq!(stage.odd_vertices(), &["A", "C"]);
        assert!(matches!(
            stage.metrics(),
            StageMetrics::OddVertices {
                vertex_count: 3,
                edge_count: 2,
                odd_vertex_count: 2
            }
        ));
    }

    #[test]
    fn distances_table_holds_shortest_distances() {
        let g = path_abc();
        let stage = Postman::new(&g, SolverConfig::default())
            .detect_odd_vertices()
            .unwrap()
            .compute_distances()
            .unwrap();
        assert_eq!(stage.table().weight(0, 1), Some(2.0));
        assert_eq!(OddVerticesFound::<&str>::INDEX + 1, DistancesComputed::<&str>::INDEX);
    }

    #[test]
    fn disconnected_odd_vertices_fail_at_distances() {
        let g = Graph::from_edge_list([(1, 2), (3, 4)]).unwrap();
        let result = Postman::new(&g, SolverConfig::default())
            .detect_odd_vertices()
            .unwrap()
            .compute_distances();
        assert!(matches!(result, Err(GraphError::DisconnectedGraph { .. })));
    }

    #[test]
    fn augment_makes_every_degree_even() {
        let g = Graph::from_edge_list([(1, 2), (2, 3), (3, 4), (4, 1), (1, 3)]).unwrap();
        let augmented = Postman::new(&g, SolverConfig::default())
            .detect_odd_vertices()
            .unwrap()
            .compute_distances()
            .unwrap()
            .match_odd_vertices()
            .unwrap()
            .augment()
            .unwrap();
        assert!(augmented.working_graph().odd_degree_vertices().is_empty());
        assert_eq!(augmented.duplicated_edges(), &[(1, 3, 1.0)]);
        // The caller's graph is untouched.
        assert_eq!(g.edge_count(), 5);
    }

    #[test]
    fn triangle_needs_no_duplication() {
        let g = Graph::from_edge_list([("A", "B"), ("B", "C"), ("C", "A")]).unwrap();
        let route = g.chinese_postman().unwrap();
        assert_eq!(route.walk.len(), 4);
        assert_eq!(route.walk.first(), route.walk.last());
        assert_close(route.total_cost, 3.0);
        assert!(route.duplicated_edges.is_empty());
        assert!(route.matched_pairs.is_empty());
    }

    #[test]
    fn path_is_walked_there_and_back() {
        let route = path_abc().chinese_postman().unwrap();
        assert_eq!(route.walk, vec!["A", "B", "C", "B", "A"]);
        assert_close(route.original_cost, 2.0);
        assert_close(route.duplicated_cost, 2.0);
        assert_close(route.total_cost, 4.0);
        assert_eq!(route.matched_pairs, vec![("A", "C")]);
    }

    #[test]
    fn solve_from_pins_the_start() {
        let route = ChinesePostmanSolver::default()
            .solve_from(&path_abc(), &"B")
            .unwrap();
        assert_eq!(route.walk.first(), Some(&"B"));
        assert_eq!(route.walk.last(), Some(&"B"));
        assert_close(route.total_cost, 4.0);
    }

    #[test]
    fn first_policy_prices_duplicates_by_first_weight() {
        // Parallel 1-2 edges [5, 1]; odd vertices are 1 and 2.
        let g = Graph::from_edge_list([(1, 2, 5.0), (1, 2, 1.0), (2, 3, 1.0), (1, 3, 1.0)]).unwrap();
        let first = ChinesePostmanSolver::new(SolverConfig {
            weight_policy: WeightPolicy::First,
            ..SolverConfig::default()
        })
        .solve(&g)
        .unwrap();
        assert_close(first.duplicated_cost, 2.0);
        assert_eq!(first.duplicated_edges, vec![(1, 3, 1.0), (3, 2, 1.0)]);
        assert_close(first.total_cost, 10.0);

        let min = ChinesePostmanSolver::default().solve(&g).unwrap();
        assert_close(min.duplicated_cost, 1.0);
        assert_eq!(min.duplicated_edges, vec![(1, 2, 1.0)]);
    }

    #[test]
    fn budget_exhaustion_aborts_solve() {
        // Star with 6 leaves: every leaf is odd, the centre is even.
        let g = Graph::from_edge_list((1..=6).map(|leaf| (0, leaf))).unwrap();
        let solver = ChinesePostmanSolver::new(SolverConfig {
            search_budget: SearchBudget::nodes(1),
            ..SolverConfig::default()
        });
        assert!(matches!(
            solver.solve(&g),
            Err(GraphError::SearchBudgetExceeded { .. })
        ));
    }

    #[test]
    fn stage_names_follow_pipeline_order() {
        assert_eq!(OddVerticesFound::<u8>::NAME, "odd_vertices");
        assert_eq!(DistancesComputed::<u8>::NAME, "distances");
        assert_eq!(Matched::<u8>::NAME, "matching");
        assert_eq!(Augmented::<u8>::NAME, "augment");
        assert_eq!(Routed::<u8>::NAME, "circuit");
        assert!(OddVerticesFound::<u8>::INDEX < Routed::<u8>::INDEX);
    }

    #[test]
    fn routed_metrics_report_walk() {
        let g = path_abc();
        let routed = Postman::new(&g, SolverConfig::default())
            .detect_odd_vertices()
            .unwrap()
            .compute_distances()
            .unwrap()
            .match_odd_vertices()
            .unwrap()
            .augment()
            .unwrap()
            .route()
            .unwrap();
        assert_eq!(routed.route().edge_count(), 4);
        assert!(matches!(
            routed.metrics(),
            StageMetrics::Circuit {
                walk_edges: 4,
                matched_vertices: 2,
                ..
            }
        ));
        assert_eq!(Routed::<u8>::INDEX + 1, STAGE_COUNT);
    }

    #[test]
    fn isolated_vertex_does_not_block_routing() {
        let g = Graph::from_vertex_and_edge_sets(["A", "B", "C", "Z"], [("A", "B"), ("B", "C"), ("C", "A")])
            .unwrap();
        let route = g.chinese_postman().unwrap();
        assert_eq!(route.edge_count(), 3);
        assert!(matches!(
            ChinesePostmanSolver::default().solve_from(&g, &"Z"),
            Err(GraphError::DisconnectedGraph { .. })
        ));
    }
}
