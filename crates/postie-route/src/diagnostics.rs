//! Solve diagnostics: timing, counts, and costs for each stage.
//!
//! [`solve_with_diagnostics`] runs the same stages as
//! [`ChinesePostmanSolver::solve`](crate::ChinesePostmanSolver::solve)
//! and records how long each one took and what it produced. Useful for
//! spotting where a large solve spends its time (usually the matching
//! search) and for comparing weight policies and budgets.
//!
//! The time source is injected through [`Clock`] so the library stays
//! free of any particular timer. Durations are serialized as fractional
//! seconds (`f64`) for JSON compatibility, since `std::time::Duration`
//! does not implement serde traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::Vertex;
use crate::postman::{Pending, PostmanStage};
use crate::types::{GraphError, Route, Weight};

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Serde support for `Option<Duration>` as optional fractional seconds.
pub(crate) mod option_duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(
        duration: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        duration.map(|d| d.as_secs_f64()).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Option::<f64>::deserialize(deserializer)?
            .map(|secs| {
                Duration::try_from_secs_f64(secs).map_err(|_| {
                    serde::de::Error::custom(
                        "time limit must be finite, non-negative seconds",
                    )
                })
            })
            .transpose()
    }
}

/// Time source for stage measurements.
///
/// Native callers can wrap `std::time::Instant`; browser callers can
/// wrap `performance.now()`. Tests can supply a fake clock.
pub trait Clock {
    /// Opaque point in time.
    type Instant;

    /// The current instant.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// Diagnostics collected from a single solve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolveDiagnostics {
    /// Stage 1: odd-degree vertex detection.
    pub odd_vertices: StageDiagnostics,
    /// Stage 2: pairwise shortest-path distances.
    pub distances: StageDiagnostics,
    /// Stage 3: minimum-weight perfect matching.
    pub matching: StageDiagnostics,
    /// Stage 4: edge duplication.
    pub augmentation: StageDiagnostics,
    /// Stage 5: Eulerian circuit.
    pub circuit: StageDiagnostics,
    /// Total wall-clock duration of the solve (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary across all stages.
    pub summary: SolveSummary,
}

/// Diagnostics for a single stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics.
    pub metrics: StageMetrics,
}

/// Stage-specific metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Odd-degree vertex detection.
    OddVertices {
        /// Vertices in the input graph.
        vertex_count: usize,
        /// Edges in the input graph, parallel edges counted separately.
        edge_count: usize,
        /// Vertices with odd degree.
        odd_vertex_count: usize,
    },
    /// Pairwise distance computation.
    Distances {
        /// Single-source Dijkstra runs performed.
        dijkstra_runs: usize,
        /// Unordered odd-vertex pairs tabulated.
        pair_count: usize,
        /// Largest pairwise distance.
        max_pair_distance: f64,
    },
    /// Matching search.
    Matching {
        /// Pairs in the chosen matching.
        pair_count: usize,
        /// Sum of the matched pair distances.
        total_weight: f64,
        /// Search nodes visited.
        nodes_explored: u64,
    },
    /// Edge duplication.
    Augmentation {
        /// Edges added to the working copy.
        duplicated_edge_count: usize,
        /// Sum of the added edge weights.
        duplicated_cost: f64,
    },
    /// Eulerian circuit.
    Circuit {
        /// Edges walked by the route.
        walk_edges: usize,
        /// Odd vertices that were matched.
        matched_vertices: usize,
        /// Sum of the input edge weights.
        original_cost: f64,
        /// Route cost.
        total_cost: f64,
    },
}

/// High-level summary for the entire solve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolveSummary {
    /// Vertices in the input graph.
    pub vertex_count: usize,
    /// Edges in the input graph.
    pub edge_count: usize,
    /// Odd-degree vertices in the input graph.
    pub odd_vertex_count: usize,
    /// Edges walked by the route.
    pub walk_edges: usize,
    /// Sum of the input edge weights.
    pub original_cost: f64,
    /// Route cost.
    pub total_cost: f64,
}

impl SolveSummary {
    /// Extra cost relative to the input: `total / original - 1`.
    #[must_use]
    pub fn overhead_ratio(&self) -> f64 {
        if self.original_cost > 0.0 {
            self.total_cost / self.original_cost - 1.0
        } else {
            0.0
        }
    }
}

impl SolveDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Solve Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Graph: {} vertices, {} edges ({} odd)",
            self.summary.vertex_count, self.summary.edge_count, self.summary.odd_vertex_count,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<24} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);
        let stages = [
            ("Odd Vertices", &self.odd_vertices),
            ("Distances", &self.distances),
            ("Matching", &self.matching),
            ("Augmentation", &self.augmentation),
            ("Circuit", &self.circuit),
        ];
        for (name, diag) in stages {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<24} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.push(String::new());
        lines.push(format!(
            "Walk edges: {}  |  Cost: {:.3} (original {:.3}, +{:.1}%)",
            self.summary.walk_edges,
            self.summary.total_cost,
            self.summary.original_cost,
            self.summary.overhead_ratio() * 100.0,
        ));

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::OddVertices {
            vertex_count,
            edge_count,
            odd_vertex_count,
        } => format!("{odd_vertex_count} odd of {vertex_count} vertices, {edge_count} edges"),
        StageMetrics::Distances {
            dijkstra_runs,
            pair_count,
            max_pair_distance,
        } => format!("{dijkstra_runs} runs, {pair_count} pairs (max={max_pair_distance:.3})"),
        StageMetrics::Matching {
            pair_count,
            total_weight,
            nodes_explored,
        } => format!("{pair_count} pairs, weight={total_weight:.3}, {nodes_explored} nodes"),
        StageMetrics::Augmentation {
            duplicated_edge_count,
            duplicated_cost,
        } => format!("+{duplicated_edge_count} edges, +{duplicated_cost:.3} cost"),
        StageMetrics::Circuit {
            walk_edges,
            matched_vertices,
            original_cost,
            total_cost,
        } => format!(
            "{walk_edges} edges walked, {matched_vertices} matched, {original_cost:.3}->{total_cost:.3}"
        ),
    }
}

fn measured<S: PostmanStage>(stage: &S, duration: Duration) -> StageDiagnostics {
    log::trace!("stage {} ({}) took {duration:?}", S::INDEX, S::NAME);
    StageDiagnostics {
        duration,
        metrics: stage.metrics(),
    }
}

/// Run every stage of `pending`, timing each with `clock`.
///
/// # Errors
///
/// Returns the first [`GraphError`] any stage produces.
pub fn solve_with_diagnostics<V: Vertex, C: Clock>(
    pending: Pending<'_, V>,
    clock: &C,
) -> Result<(Route<V>, SolveDiagnostics), GraphError> {
    let graph = pending.graph();
    let total_start = clock.now();

    let t = clock.now();
    let odd = pending.detect_odd_vertices()?;
    let odd_vertices = measured(&odd, clock.elapsed(&t));
    let odd_vertex_count = odd.odd_vertices().len();

    let t = clock.now();
    let distances_stage = odd.compute_distances()?;
    let distances = measured(&distances_stage, clock.elapsed(&t));

    let t = clock.now();
    let matched = distances_stage.match_odd_vertices()?;
    let matching = measured(&matched, clock.elapsed(&t));

    let t = clock.now();
    let augmented = matched.augment()?;
    let augmentation = measured(&augmented, clock.elapsed(&t));

    let t = clock.now();
    let routed = augmented.route()?;
    let circuit = measured(&routed, clock.elapsed(&t));

    let total_duration = clock.elapsed(&total_start);
    let route = routed.into_route();

    let summary = SolveSummary {
        vertex_count: graph.vertex_count(),
        edge_count: graph.edge_count(),
        odd_vertex_count,
        walk_edges: route.edge_count(),
        original_cost: route.original_cost,
        total_cost: route.total_cost,
    };

    Ok((
        route,
        SolveDiagnostics {
            odd_vertices,
            distances,
            matching,
            augmentation,
            circuit,
            total_duration,
            summary,
        },
    ))
}

/// Cost of a route as the sum of its walked edge weights.
///
/// Agrees with [`Route::total_cost`] up to float rounding.
#[must_use]
pub fn walked_cost<V>(route: &Route<V>) -> Weight {
    route.weights.iter().sum()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::graph::Graph;
    use crate::postman::Postman;
    use crate::types::SolverConfig;

    /// Clock that advances one millisecond per reading.
    struct TickClock {
        ticks: Cell<u64>,
    }

    impl TickClock {
        const fn new() -> Self {
            Self {
                ticks: Cell::new(0),
            }
        }
    }

    impl Clock for TickClock {
        type Instant = u64;

        fn now(&self) -> u64 {
            let t = self.ticks.get();
            self.ticks.set(t + 1);
            t
        }

        fn elapsed(&self, since: &u64) -> Duration {
            Duration::from_millis(self.now() - since)
        }
    }

    #[test]
    fn duration_ms_converts_correctly() {
        let d = Duration::from_millis(1234);
        let ms = duration_ms(d);
        assert!((ms - 1234.0).abs() < 0.01);
    }

    #[test]
    fn diagnostics_cover_every_stage() {
        let g = Graph::from_edge_list([("A", "B", 1.0), ("B", "C", 2.0)]).unwrap();
        let clock = TickClock::new();
        let (route, diag) =
            solve_with_diagnostics(Postman::new(&g, SolverConfig::default()), &clock).unwrap();

        assert!((route.total_cost - 6.0).abs() < 1e-9);
        assert!((walked_cost(&route) - route.total_cost).abs() < 1e-9);
        assert_eq!(diag.summary.vertex_count, 3);
        assert_eq!(diag.summary.edge_count, 2);
        assert_eq!(diag.summary.odd_vertex_count, 2);
        assert_eq!(diag.summary.walk_edges, 4);
        assert!((diag.summary.overhead_ratio() - 1.0).abs() < 1e-9);

        // Each stage reads the clock twice, one tick apart.
        assert_eq!(diag.odd_vertices.duration, Duration::from_millis(1));
        assert_eq!(diag.circuit.duration, Duration::from_millis(1));
        assert!(diag.total_duration >= Duration::from_millis(5));
        assert!(matches!(
            diag.matching.metrics,
            StageMetrics::Matching { pair_count: 1, .. }
        ));
    }

    #[test]
    fn solver_method_matches_free_function() {
        let g = Graph::from_edge_list([(1, 2), (2, 3), (3, 1)]).unwrap();
        let (route, diag) = crate::ChinesePostmanSolver::default()
            .solve_with_diagnostics(&g, &TickClock::new())
            .unwrap();
        assert_eq!(route.edge_count(), 3);
        assert!(matches!(
            diag.augmentation.metrics,
            StageMetrics::Augmentation {
                duplicated_edge_count: 0,
                ..
            }
        ));
    }

    #[test]
    fn errors_propagate_from_stages() {
        let g = Graph::from_edge_list([(1, 2), (3, 4)]).unwrap();
        let result = solve_with_diagnostics(Postman::new(&g, SolverConfig::default()), &TickClock::new());
        assert!(matches!(result, Err(GraphError::DisconnectedGraph { .. })));
    }

    #[test]
    fn diagnostics_serialize_durations_as_seconds() {
        let g = Graph::from_edge_list([(1, 2), (2, 3), (3, 1)]).unwrap();
        let (_, diag) =
            solve_with_diagnostics(Postman::new(&g, SolverConfig::default()), &TickClock::new())
                .unwrap();
        let json = serde_json::to_value(&diag).unwrap();
        assert_eq!(json["odd_vertices"]["duration"], serde_json::json!(0.001));
        let back: SolveDiagnostics = serde_json::from_value(json).unwrap();
        assert_eq!(back.odd_vertices.duration, Duration::from_millis(1));
    }

    #[test]
    fn report_produces_nonempty_string() {
        let g = Graph::from_edge_list([("A", "B"), ("B", "C")]).unwrap();
        let (_, diag) =
            solve_with_diagnostics(Postman::new(&g, SolverConfig::default()), &TickClock::new())
                .unwrap();
        let report = diag.report();
        assert!(report.contains("Solve Diagnostics Report"));
        assert!(report.contains("Matching"));
        assert!(report.contains("1 pairs"));
        assert!(report.contains("+2 edges"));
    }
}
