//! Single-source shortest paths over a [`Graph`].
//!
//! Distances come from petgraph's Dijkstra run on a directed projection
//! of the multigraph in which each bundle of parallel edges collapses to
//! one arc priced by the active [`WeightPolicy`]. Predecessors are then
//! rebuilt from the distance map so that ties always resolve to the
//! lowest-ordered vertex. Routes come out identical from run to run.

use std::collections::{BTreeMap, BTreeSet};

use petgraph::algo::dijkstra as petgraph_dijkstra;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::Vertex;
use crate::graph::Graph;
use crate::types::{GraphError, Weight, WeightPolicy};

/// Shortest-path tree: parent -> child -> distance of the child from the
/// source.
pub type ShortestPathTree<V> = BTreeMap<V, BTreeMap<V, Weight>>;

/// Result of a single-source shortest-path search.
#[derive(Debug, Clone, PartialEq)]
pub struct ShortestPaths<V> {
    source: V,
    policy: WeightPolicy,
    distances: BTreeMap<V, Weight>,
    predecessors: BTreeMap<V, V>,
}

impl<V: Vertex> ShortestPaths<V> {
    /// The vertex the search started from.
    #[must_use]
    pub const fn source(&self) -> &V {
        &self.source
    }

    /// Weight policy the distances were computed under.
    #[must_use]
    pub const fn policy(&self) -> WeightPolicy {
        self.policy
    }

    /// Distance from the source to every vertex. Unreachable vertices map
    /// to `f64::INFINITY`.
    #[must_use]
    pub const fn distances(&self) -> &BTreeMap<V, Weight> {
        &self.distances
    }

    /// Distance to `v`: `None` if `v` is not in the graph, infinity if
    /// it is unreachable.
    #[must_use]
    pub fn distance_to(&self, v: &V) -> Option<Weight> {
        self.distances.get(v).copied()
    }

    /// Whether `v` is reachable from the source.
    #[must_use]
    pub fn is_reachable(&self, v: &V) -> bool {
        self.distance_to(v).is_some_and(f64::is_finite)
    }

    /// Predecessor of `v` on its shortest path. `None` for the source and
    /// for unreachable vertices.
    #[must_use]
    pub fn predecessor(&self, v: &V) -> Option<&V> {
        self.predecessors.get(v)
    }

    /// Vertex sequence of the shortest path from the source to `target`,
    /// both endpoints included.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::VertexNotFound`] if `target` is not in the
    /// graph and [`GraphError::DisconnectedGraph`] if it is unreachable.
    pub fn path_to(&self, target: &V) -> Result<Vec<V>, GraphError> {
        if !self.distances.contains_key(target) {
            return Err(GraphError::vertex_not_found(target));
        }
        if !self.is_reachable(target) {
            return Err(GraphError::disconnected(&self.source, target));
        }

        let mut path = vec![target.clone()];
        let mut current = target;
        while current != &self.source {
            // Predecessor chains are acyclic, but never walk further than
            // the vertex count.
            if path.len() > self.distances.len() {
                return Err(GraphError::disconnected(&self.source, target));
            }
            let Some(prev) = self.predecessors.get(current) else {
                return Err(GraphError::disconnected(&self.source, target));
            };
            path.push(prev.clone());
            current = prev;
        }
        path.reverse();
        Ok(path)
    }

    /// Shortest-path tree derived from the predecessor map.
    #[must_use]
    pub fn spt(&self) -> ShortestPathTree<V> {
        let mut tree = ShortestPathTree::new();
        for (child, parent) in &self.predecessors {
            if let Some(&d) = self.distances.get(child) {
                tree.entry(parent.clone())
                    .or_default()
                    .insert(child.clone(), d);
            }
        }
        tree
    }
}

/// Run Dijkstra from `start` over `graph`.
///
/// Parallel edges are priced by `policy`. Among several equally short
/// predecessors of a vertex the lowest-ordered one wins.
///
/// # Errors
///
/// Returns [`GraphError::VertexNotFound`] if `start` is not in the graph.
pub fn dijkstra<V: Vertex>(
    graph: &Graph<V>,
    start: &V,
    policy: WeightPolicy,
) -> Result<ShortestPaths<V>, GraphError> {
    graph.require_vertex(start)?;

    let vertices: Vec<&V> = graph.vertices().collect();
    let index: BTreeMap<&V, NodeIndex> = vertices
        .iter()
        .enumerate()
        .map(|(i, &v)| (v, NodeIndex::new(i)))
        .collect();

    // Directed projection: one arc per (u, v) bundle.
    let mut projection = DiGraph::<(), Weight>::with_capacity(vertices.len(), 0);
    for _ in &vertices {
        projection.add_node(());
    }
    let mut incoming: BTreeMap<&V, Vec<(&V, Weight)>> = BTreeMap::new();
    for (u, slots) in graph.adjacency() {
        for (v, weights) in slots {
            let Some(cost) = policy.select(weights) else {
                continue;
            };
            if let (Some(&a), Some(&b)) = (index.get(u), index.get(v)) {
                projection.add_edge(a, b, cost);
            }
            // Outer loop is ascending, so each list is sorted by source.
            incoming.entry(v).or_default().push((u, cost));
        }
    }

    let start_index = index
        .get(start)
        .copied()
        .ok_or_else(|| GraphError::vertex_not_found(start))?;
    let costs = petgraph_dijkstra(&projection, start_index, None, |e| *e.weight());

    let distances: BTreeMap<V, Weight> = vertices
        .iter()
        .enumerate()
        .map(|(i, &v)| {
            let d = costs
                .get(&NodeIndex::new(i))
                .copied()
                .unwrap_or(f64::INFINITY);
            (v.clone(), d)
        })
        .collect();

    let predecessors = rebuild_predecessors(start, &distances, &incoming);
    log::trace!(
        "dijkstra from {start:?}: {} of {} vertices reachable",
        predecessors.len() + 1,
        vertices.len()
    );

    Ok(ShortestPaths {
        source: start.clone(),
        policy,
        distances,
        predecessors,
    })
}

/// Assign every reachable vertex the lowest-ordered predecessor `u` that
/// is already attached to the tree and satisfies
/// `dist[u] + w(u, v) == dist[v]`.
///
/// The comparison is exact: petgraph stores each distance as the sum
/// `dist[u] + w` along its relaxing arc, so the true predecessor always
/// reproduces it bit for bit.
///
/// Vertices are visited once by increasing distance. A vertex whose tight
/// sources are all still detached waits on each of them and is attached
/// as soon as the first one joins the tree. Attaching only to vertices
/// already in the tree keeps the predecessor graph acyclic across
/// zero-weight edges.
#[allow(clippy::float_cmp)]
fn rebuild_predecessors<V: Vertex>(
    start: &V,
    distances: &BTreeMap<V, Weight>,
    incoming: &BTreeMap<&V, Vec<(&V, Weight)>>,
) -> BTreeMap<V, V> {
    let dist = |v: &V| distances.get(v).copied().unwrap_or(f64::INFINITY);
    let mut order: Vec<&V> = distances
        .iter()
        .filter(|&(v, d)| v != start && d.is_finite())
        .map(|(v, _)| v)
        .collect();
    // Stable: equal distances stay in vertex order.
    order.sort_by(|a, b| dist(*a).total_cmp(&dist(*b)));
    let reachable = order.len();

    let mut predecessors = BTreeMap::new();
    let mut attached: BTreeSet<&V> = BTreeSet::from([start]);
    // Detached source -> vertices blocked on it.
    let mut waiting: BTreeMap<&V, Vec<&V>> = BTreeMap::new();

    for v in order {
        if attached.contains(v) {
            continue;
        }
        let target = dist(v);
        let tight: Vec<&V> = incoming
            .get(v)
            .into_iter()
            .flatten()
            .filter(|&&(u, w)| dist(u) + w == target)
            .map(|&(u, _)| u)
            .collect();
        let parent = tight.iter().copied().find(|u| attached.contains(*u));
        let Some(parent) = parent else {
            for u in tight {
                waiting.entry(u).or_default().push(v);
            }
            continue;
        };

        let mut joining = vec![(v, parent)];
        while let Some((child, parent)) = joining.pop() {
            if !attached.insert(child) {
                continue;
            }
            predecessors.insert(child.clone(), parent.clone());
            for blocked in waiting.remove(child).unwrap_or_default() {
                joining.push((blocked, child));
            }
        }
    }

    let stranded = reachable - predecessors.len();
    if stranded > 0 {
        log::warn!(
            "dijkstra from {start:?}: {stranded} reachable vertices have no consistent predecessor"
        );
    }
    predecessors
}
