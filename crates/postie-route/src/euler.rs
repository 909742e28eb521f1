//! Eulerian circuits and trails with Hierholzer's algorithm.
//!
//! The builder owns a working copy of the graph and consumes edges as it
//! walks them. Sub-circuits are spliced with an explicit stack, so deep
//! graphs cannot overflow the call stack.

use std::collections::BTreeMap;

use petgraph::unionfind::UnionFind;
use serde::{Deserialize, Serialize};

use crate::Vertex;
use crate::graph::Graph;
use crate::types::{GraphError, Weight};

/// A walk that uses every edge of a graph exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EulerWalk<V> {
    /// Visited vertices in order.
    pub vertices: Vec<V>,
    /// `weights[i]` belongs to the edge from `vertices[i]` to
    /// `vertices[i + 1]`.
    pub weights: Vec<Weight>,
}

impl<V: PartialEq> EulerWalk<V> {
    /// Whether the walk ends where it started.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.vertices.first() == self.vertices.last()
    }

    /// Sum of the walked edge weights.
    #[must_use]
    pub fn cost(&self) -> Weight {
        self.weights.iter().sum()
    }

    /// Number of edges walked.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.weights.len()
    }
}

/// Hierholzer's algorithm over an owned working copy.
#[derive(Debug, Clone)]
pub struct EulerianCircuitBuilder<V> {
    graph: Graph<V>,
}

impl<V: Vertex> EulerianCircuitBuilder<V> {
    /// Take ownership of the working copy. Its edges are consumed by
    /// [`build`](Self::build).
    #[must_use]
    pub const fn new(working_copy: Graph<V>) -> Self {
        Self { graph: working_copy }
    }

    /// Walk every edge exactly once.
    ///
    /// With no odd-degree vertices the result is a closed circuit that
    /// starts at `start`, or at the lowest vertex carrying an edge. With
    /// exactly two the result is a trail between them that starts at
    /// `start` if it is one of the two, otherwise at the lower one. An
    /// edgeless graph yields the single-vertex walk `[start]`.
    ///
    /// # Errors
    ///
    /// - [`GraphError::InvalidGraphConstruction`] for a graph with no
    ///   vertices.
    /// - [`GraphError::VertexNotFound`] if `start` is not in the graph.
    /// - [`GraphError::UnsupportedOperation`] if the graph is not
    ///   symmetric, or if a trail is requested to start at an even-degree
    ///   vertex.
    /// - [`GraphError::NoEulerianPath`] if the odd-degree vertex count is
    ///   neither 0 nor 2.
    /// - [`GraphError::DisconnectedGraph`] if the edges do not form a
    ///   single connected component reachable from the start.
    pub fn build(mut self, start: Option<&V>) -> Result<EulerWalk<V>, GraphError> {
        if self.graph.is_empty() {
            return Err(GraphError::InvalidGraphConstruction(
                "graph has no vertices".to_owned(),
            ));
        }
        if let Some(s) = start {
            self.graph.require_vertex(s)?;
        }
        if !self.graph.is_symmetric() {
            return Err(GraphError::UnsupportedOperation(
                "Eulerian walks over one-directional edges".to_owned(),
            ));
        }

        let odd = self.graph.odd_degree_vertices();
        if !matches!(odd.len(), 0 | 2) {
            return Err(GraphError::NoEulerianPath {
                odd_vertices: odd.len(),
            });
        }
        let start = self.choose_start(&odd, start)?;
        check_edges_connected(&self.graph, &start)?;

        let expected_edges = self.graph.edge_count();
        log::debug!(
            "hierholzer from {start:?}: {expected_edges} edges, {} odd vertices",
            odd.len()
        );

        // Each stack entry carries the weight of the edge used to reach it.
        let mut stack: Vec<(V, Weight)> = vec![(start.clone(), 0.0)];
        let mut reversed: Vec<(V, Weight)> = Vec::with_capacity(expected_edges + 1);
        while let Some((current, _)) = stack.last() {
            let current = current.clone();
            if let Some(step) = self.graph.take_edge_from(&current) {
                stack.push(step);
            } else if let Some(done) = stack.pop() {
                reversed.push(done);
            }
        }

        if self.graph.edge_count() > 0 {
            let stranded = self
                .graph
                .edges()
                .first()
                .map(|(u, _, _)| u.clone())
                .unwrap_or_else(|| start.clone());
            return Err(GraphError::disconnected(&start, &stranded));
        }

        reversed.reverse();
        let weights = reversed.iter().skip(1).map(|&(_, w)| w).collect();
        let vertices = reversed.into_iter().map(|(v, _)| v).collect();
        Ok(EulerWalk { vertices, weights })
    }

    fn choose_start(&self, odd: &[V], requested: Option<&V>) -> Result<V, GraphError> {
        if let [low, _] = odd {
            return match requested {
                None => Ok(low.clone()),
                Some(s) if odd.contains(s) => Ok(s.clone()),
                Some(s) => Err(GraphError::UnsupportedOperation(format!(
                    "an Eulerian trail cannot start at even-degree vertex {s:?}"
                ))),
            };
        }
        if let Some(s) = requested {
            return Ok(s.clone());
        }
        let with_edges = self
            .graph
            .vertices()
            .find(|v| self.graph.degree(v).is_some_and(|d| d > 0));
        with_edges
            .or_else(|| self.graph.vertices().next())
            .cloned()
            .ok_or_else(|| GraphError::InvalidGraphConstruction("graph has no vertices".to_owned()))
    }
}

/// Every vertex that carries an edge must share a component with
/// `start`, unless the graph has no edges at all.
fn check_edges_connected<V: Vertex>(graph: &Graph<V>, start: &V) -> Result<(), GraphError> {
    let index: BTreeMap<&V, usize> = graph.vertices().enumerate().map(|(i, v)| (v, i)).collect();
    let mut components = UnionFind::<usize>::new(index.len());
    let mut has_edges = false;
    for (u, slots) in graph.adjacency() {
        for v in slots.keys() {
            if let (Some(&a), Some(&b)) = (index.get(u), index.get(v)) {
                components.union(a, b);
                has_edges = true;
            }
        }
    }
    if !has_edges {
        return Ok(());
    }

    let Some(&root_index) = index.get(start) else {
        return Err(GraphError::vertex_not_found(start));
    };
    let root = components.find_mut(root_index);
    for (v, &i) in &index {
        let carries_edges = graph.degree(v).is_some_and(|d| d > 0);
        if carries_edges && components.find_mut(i) != root {
            return Err(GraphError::disconnected(start, *v));
        }
    }
    Ok(())
}
