//! Property-based tests for the route engine.
//!
//! # Invariants tested
//!
//! - **Parity:** every vertex of the augmented graph has even degree.
//! - **Lower bound:** a route never costs less than the graph's total
//!   edge weight.
//! - **Path consistency:** a shortest-path distance equals the summed
//!   weights along the reported path, for integer weights and for wide
//!   fractional ones alike.
//! - **Determinism:** solving twice yields the same route.
//! - **Coverage:** the walk traverses every edge at least as often as it
//!   exists, and only ever steps along real edges.


use std::collections::BTreeMap;

use postie_route::postman::Postman;
use postie_route::{Graph, SolverConfig, WeightPolicy};
use proptest::prelude::*;

use proptest_support::{
    connected_graph_strategy, connected_graph_with_weights, edge_key, wide_weight_strategy,
};

fn walked_edge_counts(walk: &[u32]) -> BTreeMap<(u32, u32), usize> {
    let mut counts = BTreeMap::new();
    for step in walk.windows(2) {
        *counts.entry(edge_key(step[0], step[1])).or_default() += 1;
    }
    counts
}

fn edge_multiplicities(graph: &Graph<u32>) -> BTreeMap<(u32, u32), usize> {
    let mut counts = BTreeMap::new();
    for (u, v, _) in graph.edges() {
        *counts.entry(edge_key(u, v)).or_default() += 1;
    }
    counts
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: augmentation leaves no odd-degree vertex behind.
    #[test]
    fn augmented_graph_has_even_degrees(graph in connected_graph_strategy(10, 6)) {
        let augmented = Postman::new(&graph, SolverConfig::default())
            .detect_odd_vertices()
            .and_then(|s| s.compute_distances())
            .and_then(|s| s.match_odd_vertices())
            .and_then(|s| s.augment());
        prop_assert!(augmented.is_ok(), "augment failed: {:?}", augmented.err());
        if let Ok(augmented) = augmented {
            prop_assert!(augmented.working_graph().odd_degree_vertices().is_empty());
        }
    }

    /// Property: the route costs at least the sum of all edge weights and
    /// exactly that plus the duplicated cost.
    #[test]
    fn route_cost_bounds(graph in connected_graph_strategy(10, 6)) {
        let route = graph.chinese_postman();
        prop_assert!(route.is_ok(), "solve failed: {:?}", route.err());
        if let Ok(route) = route {
            let total_weight = graph.total_weight();
            prop_assert!(route.total_cost >= total_weight);
            prop_assert_eq!(route.original_cost, total_weight);
            prop_assert_eq!(route.total_cost, route.original_cost + route.duplicated_cost);
            let walked: f64 = route.weights.iter().sum();
            prop_assert_eq!(walked, route.total_cost);
        }
    }

    /// Property: `get_distance_between` equals the weight of the path from
    /// `get_path_between`, priced by the default policy.
    #[test]
    fn distance_matches_path_weight(graph in connected_graph_strategy(8, 6)) {
        let vertices: Vec<u32> = graph.vertices().copied().collect();
        for a in &vertices {
            for b in &vertices {
                let distance = graph.get_distance_between(a, b);
                let path = graph.get_path_between(a, b);
                prop_assert!(distance.is_ok() && path.is_ok());
                if let (Ok(distance), Ok(path)) = (distance, path) {
                    prop_assert_eq!(path.first(), Some(a));
                    prop_assert_eq!(path.last(), Some(b));
                    let summed: f64 = path
                        .windows(2)
                        .filter_map(|hop| graph.travel_cost(&hop[0], &hop[1], WeightPolicy::Minimum))
                        .sum();
                    prop_assert_eq!(summed, distance);
                }
            }
        }
    }

    /// Property: with wide fractional weights the reported path still sums
    /// to exactly the distance, and no edge offers a shorter way in.
    #[test]
    fn wide_weight_paths_are_shortest(
        graph in connected_graph_with_weights(8, 6, wide_weight_strategy().boxed())
    ) {
        let vertices: Vec<u32> = graph.vertices().copied().collect();
        for a in &vertices {
            let paths = graph.dijkstra(a);
            prop_assert!(paths.is_ok());
            let Ok(paths) = paths else { continue };
            for b in &vertices {
                let path = paths.path_to(b);
                prop_assert!(path.is_ok(), "no path {} -> {}", a, b);
                let Ok(path) = path else { continue };
                let summed: f64 = path
                    .windows(2)
                    .filter_map(|hop| graph.travel_cost(&hop[0], &hop[1], WeightPolicy::Minimum))
                    .sum();
                prop_assert_eq!(Some(summed), paths.distance_to(b));
            }
            for (u, v, w) in graph.edges() {
                let (Some(du), Some(dv)) = (paths.distance_to(&u), paths.distance_to(&v)) else {
                    continue;
                };
                prop_assert!(dv <= du + w, "edge {}-{} relaxes {} below {}", u, v, dv, du + w);
            }
        }
    }

    /// Property: solving the same graph twice gives the same route.
    #[test]
    fn solve_is_deterministic(graph in connected_graph_strategy(10, 6)) {
        let first = graph.chinese_postman();
        let second = graph.clone().chinese_postman();
        prop_assert_eq!(first, second);
    }

    /// Property: the walk is closed, steps only along real edges, and
    /// covers every edge occurrence.
    #[test]
    fn walk_covers_every_edge(graph in connected_graph_strategy(10, 6)) {
        let route = graph.chinese_postman();
        prop_assert!(route.is_ok(), "solve failed: {:?}", route.err());
        if let Ok(route) = route {
            prop_assert_eq!(route.walk.first(), route.walk.last());
            for (step, w) in route.walk.windows(2).zip(&route.weights) {
                let weights = graph.weights(&step[0], &step[1]);
                prop_assert!(weights.is_some_and(|ws| ws.contains(w)));
            }
            let walked = walked_edge_counts(&route.walk);
            for (key, times) in edge_multiplicities(&graph) {
                prop_assert!(walked.get(&key).copied().unwrap_or(0) >= times);
            }
        }
    }

    /// Property: the first-weight policy never beats the minimum policy.
    #[test]
    fn minimum_policy_is_never_worse(graph in connected_graph_strategy(8, 8)) {
        let min = postie_route::solve(&graph, &SolverConfig::default());
        let first = postie_route::solve(
            &graph,
            &SolverConfig { weight_policy: WeightPolicy::First, ..SolverConfig::default() },
        );
        prop_assert!(min.is_ok() && first.is_ok());
        if let (Ok(min), Ok(first)) = (min, first) {
            prop_assert!(min.total_cost <= first.total_cost);
        }
    }
}
