//! Weighted undirected multigraph keyed by arbitrary ordered vertices.
//!
//! The graph is an adjacency map: vertex -> neighbour -> weights of the
//! parallel edges between the two. Undirected edges are stored twice,
//! once per direction, with identical weight sequences. Ordered maps
//! keep every traversal deterministic, which the solver relies on for
//! reproducible routes.
//!
//! Construction goes through explicit, validated constructors
//! ([`Graph::from_edge_list`], [`Graph::from_adjacency_list`],
//! [`Graph::from_weighted_adjacency`],
//! [`Graph::from_vertex_and_edge_sets`]) or incremental
//! [`Graph::add_edge`] calls.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::Vertex;
use crate::euler::{EulerWalk, EulerianCircuitBuilder};
use crate::postman::ChinesePostmanSolver;
use crate::shortest_path::{self, ShortestPaths, ShortestPathTree};
use crate::types::{GraphError, Route, SolverConfig, Weight, WeightPolicy, check_weight};

/// Raw adjacency map: vertex -> neighbour -> parallel edge weights.
pub type Adjacency<V> = BTreeMap<V, BTreeMap<V, Vec<Weight>>>;

/// One edge of an edge list.
///
/// Converts from `(u, v)` (weight 1) and `(u, v, weight)` tuples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EdgeSpec<V> {
    /// Edge with the implicit weight of 1.
    Unit(V, V),
    /// Edge with an explicit weight.
    Weighted(V, V, Weight),
}

impl<V> EdgeSpec<V> {
    const fn arity(&self) -> usize {
        match self {
            Self::Unit(..) => 2,
            Self::Weighted(..) => 3,
        }
    }

    fn into_parts(self) -> (V, V, Weight) {
        match self {
            Self::Unit(u, v) => (u, v, 1.0),
            Self::Weighted(u, v, w) => (u, v, w),
        }
    }
}

impl<V> From<(V, V)> for EdgeSpec<V> {
    fn from((u, v): (V, V)) -> Self {
        Self::Unit(u, v)
    }
}

impl<V> From<(V, V, Weight)> for EdgeSpec<V> {
    fn from((u, v, w): (V, V, Weight)) -> Self {
        Self::Weighted(u, v, w)
    }
}

/// Weighted multigraph.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    try_from = "Adjacency<V>",
    into = "Adjacency<V>",
    bound(
        serialize = "V: Serialize + Clone",
        deserialize = "V: Vertex + Deserialize<'de>"
    )
)]
pub struct Graph<V> {
    adjacency: Adjacency<V>,
}

impl<V> Graph<V> {
    /// Create an empty graph.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            adjacency: BTreeMap::new(),
        }
    }

    /// Number of vertices, isolated ones included.
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.adjacency.len()
    }

    /// Returns `true` if the graph has no vertices.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.adjacency.is_empty()
    }

    /// Read-only view of the adjacency map.
    #[must_use]
    pub const fn adjacency(&self) -> &Adjacency<V> {
        &self.adjacency
    }
}

impl<V> Default for Graph<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: fmt::Debug> fmt::Debug for Graph<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.adjacency.iter()).finish()
    }
}

impl<V> From<Graph<V>> for Adjacency<V> {
    fn from(graph: Graph<V>) -> Self {
        graph.adjacency
    }
}

impl<V: Vertex> TryFrom<Adjacency<V>> for Graph<V> {
    type Error = GraphError;

    fn try_from(adjacency: Adjacency<V>) -> Result<Self, Self::Error> {
        Self::validated(adjacency)
    }
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

impl<V: Vertex> Graph<V> {
    /// Build a graph from a list of edges. Vertices are inferred.
    ///
    /// Repeated edges become parallel edges. All edges must have the same
    /// arity: either every edge is [`EdgeSpec::Unit`] or every edge is
    /// [`EdgeSpec::Weighted`].
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::InvalidGraphConstruction`] for an empty list,
    /// mixed arities or a self-loop, and [`GraphError::InvalidWeight`] for
    /// a negative or non-finite weight.
    pub fn from_edge_list<I, E>(edges: I) -> Result<Self, GraphError>
    where
        I: IntoIterator<Item = E>,
        E: Into<EdgeSpec<V>>,
    {
        let edges: Vec<EdgeSpec<V>> = edges.into_iter().map(Into::into).collect();
        if edges.is_empty() {
            return Err(GraphError::InvalidGraphConstruction(
                "edge list is empty".to_owned(),
            ));
        }
        check_uniform_arity(&edges)?;

        let mut graph = Self::new();
        for edge in edges {
            let (u, v, w) = edge.into_parts();
            graph.add_parallel_edge(u, v, w)?;
        }
        Ok(graph)
    }

    /// Build a graph from an adjacency list of `(neighbour, weight)` pairs.
    ///
    /// Each undirected edge must be listed from both endpoints, so the
    /// pair lists of `u` and `v` must agree on the weights between them.
    /// A vertex with an empty list is kept as an isolated vertex.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::InvalidGraphConstruction`] for an empty map,
    /// a self-loop or an asymmetric listing, and
    /// [`GraphError::InvalidWeight`] for a bad weight.
    pub fn from_adjacency_list(list: BTreeMap<V, Vec<(V, Weight)>>) -> Result<Self, GraphError> {
        if list.is_empty() {
            return Err(GraphError::InvalidGraphConstruction(
                "adjacency list is empty".to_owned(),
            ));
        }
        let mut adjacency = Adjacency::new();
        for (u, pairs) in list {
            let slots: &mut BTreeMap<V, Vec<Weight>> = adjacency.entry(u).or_default();
            for (v, w) in pairs {
                slots.entry(v).or_default().push(w);
            }
        }
        Self::validated(adjacency)
    }

    /// Build a graph from an adjacency map of weight sequences.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::InvalidGraphConstruction`] for an empty map,
    /// an empty weight sequence, a self-loop or an asymmetric map, and
    /// [`GraphError::InvalidWeight`] for a bad weight.
    pub fn from_weighted_adjacency(adjacency: Adjacency<V>) -> Result<Self, GraphError> {
        if adjacency.is_empty() {
            return Err(GraphError::InvalidGraphConstruction(
                "adjacency map is empty".to_owned(),
            ));
        }
        Self::validated(adjacency)
    }

    /// Build a graph from an explicit vertex set and an edge set.
    ///
    /// Vertices without edges are kept as isolated vertices.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::InvalidGraphConstruction`] for an empty
    /// vertex set, mixed edge arities, a self-loop or an edge endpoint
    /// missing from the vertex set, and [`GraphError::InvalidWeight`] for
    /// a bad weight.
    pub fn from_vertex_and_edge_sets<I, J, E>(vertices: I, edges: J) -> Result<Self, GraphError>
    where
        I: IntoIterator<Item = V>,
        J: IntoIterator<Item = E>,
        E: Into<EdgeSpec<V>>,
    {
        let mut graph = Self::new();
        for v in vertices {
            graph.add_vertex(v);
        }
        if graph.is_empty() {
            return Err(GraphError::InvalidGraphConstruction(
                "vertex set is empty".to_owned(),
            ));
        }

        let edges: Vec<EdgeSpec<V>> = edges.into_iter().map(Into::into).collect();
        check_uniform_arity(&edges)?;
        for edge in edges {
            let (u, v, w) = edge.into_parts();
            for endpoint in [&u, &v] {
                if !graph.contains_vertex(endpoint) {
                    return Err(GraphError::InvalidGraphConstruction(format!(
                        "edge endpoint {endpoint:?} is not in the vertex set"
                    )));
                }
            }
            graph.add_parallel_edge(u, v, w)?;
        }
        Ok(graph)
    }

    /// Validate a raw adjacency map: weights, self-loops, empty weight
    /// sequences and symmetry.
    fn validated(adjacency: Adjacency<V>) -> Result<Self, GraphError> {
        for (u, slots) in &adjacency {
            for (v, weights) in slots {
                if u == v {
                    return Err(self_loop(u));
                }
                if weights.is_empty() {
                    return Err(GraphError::InvalidGraphConstruction(format!(
                        "empty weight sequence between {u:?} and {v:?}"
                    )));
                }
                for &w in weights {
                    check_weight(w)?;
                }
            }
        }

        let graph = Self { adjacency };
        if let Some((u, v)) = graph.first_asymmetric_pair() {
            return Err(GraphError::InvalidGraphConstruction(format!(
                "edges between {u:?} and {v:?} are not listed identically in both directions"
            )));
        }
        Ok(graph)
    }
}

/// Mixed 2-tuple and 3-tuple edges in one list are rejected.
fn check_uniform_arity<V>(edges: &[EdgeSpec<V>]) -> Result<(), GraphError> {
    let Some(first) = edges.first() else {
        return Ok(());
    };
    if let Some(odd_one) = edges.iter().find(|e| e.arity() != first.arity()) {
        return Err(GraphError::InvalidGraphConstruction(format!(
            "mixed edge arities: expected {}-tuples, found a {}-tuple",
            first.arity(),
            odd_one.arity(),
        )));
    }
    Ok(())
}

fn self_loop<V: fmt::Debug>(v: &V) -> GraphError {
    GraphError::InvalidGraphConstruction(format!("self-loop on {v:?} is not supported"))
}

/// Weight sequences compared as multisets.
fn same_weights(a: &[Weight], b: &[Weight]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut a = a.to_vec();
    let mut b = b.to_vec();
    a.sort_by(f64::total_cmp);
    b.sort_by(f64::total_cmp);
    a.iter().zip(&b).all(|(x, y)| x.to_bits() == y.to_bits())
}

// ---------------------------------------------------------------------------
// Mutation
// ---------------------------------------------------------------------------

impl<V: Vertex> Graph<V> {
    /// Insert an isolated vertex. Returns `false` if it already existed.
    pub fn add_vertex(&mut self, v: V) -> bool {
        if self.adjacency.contains_key(&v) {
            return false;
        }
        self.adjacency.insert(v, BTreeMap::new());
        true
    }

    /// Insert one edge between `u` and `v`, creating missing endpoints.
    ///
    /// With `bidirected` the mirror entry `(v, u)` receives the weight
    /// too. If `u` and `v` already list each other in both directions the
    /// call changes nothing, whatever the requested weight, and returns
    /// `Ok(false)`. Use [`add_parallel_edge`](Self::add_parallel_edge) to
    /// add another parallel edge unconditionally.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::InvalidWeight`] for a negative or non-finite
    /// weight and [`GraphError::InvalidGraphConstruction`] for a
    /// self-loop.
    pub fn add_edge(
        &mut self,
        u: V,
        v: V,
        weight: Weight,
        bidirected: bool,
    ) -> Result<bool, GraphError> {
        let weight = check_weight(weight)?;
        if u == v {
            return Err(self_loop(&u));
        }
        if self.weights(&u, &v).is_some() && self.weights(&v, &u).is_some() {
            log::debug!("add_edge({u:?}, {v:?}): edge already present, weight {weight} ignored");
            return Ok(false);
        }
        if bidirected {
            self.push_weight(v.clone(), u.clone(), weight);
        } else {
            self.adjacency.entry(v.clone()).or_default();
        }
        self.push_weight(u, v, weight);
        Ok(true)
    }

    /// [`add_edge`](Self::add_edge) with weight 1, in both directions.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::InvalidGraphConstruction`] for a self-loop.
    pub fn add_unit_edge(&mut self, u: V, v: V) -> Result<bool, GraphError> {
        self.add_edge(u, v, 1.0, true)
    }

    /// Append one more parallel edge between `u` and `v`, in both
    /// directions, creating missing endpoints.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::InvalidWeight`] for a negative or non-finite
    /// weight and [`GraphError::InvalidGraphConstruction`] for a
    /// self-loop.
    pub fn add_parallel_edge(&mut self, u: V, v: V, weight: Weight) -> Result<(), GraphError> {
        let weight = check_weight(weight)?;
        if u == v {
            return Err(self_loop(&u));
        }
        self.push_weight(v.clone(), u.clone(), weight);
        self.push_weight(u, v, weight);
        Ok(())
    }

    fn push_weight(&mut self, u: V, v: V, weight: Weight) {
        self.adjacency
            .entry(u)
            .or_default()
            .entry(v)
            .or_default()
            .push(weight);
    }

    /// Remove every parallel edge between `u` and `v`, in both
    /// directions. Returns how many edges were removed. Both vertices
    /// stay in the graph.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::UnsupportedOperation`] when `all` is
    /// `false`; removing a single parallel occurrence is not supported.
    /// Returns [`GraphError::VertexNotFound`] if either vertex is missing.
    pub fn remove_edge(&mut self, u: &V, v: &V, all: bool) -> Result<usize, GraphError> {
        if !all {
            return Err(GraphError::UnsupportedOperation(
                "removing a single parallel edge occurrence".to_owned(),
            ));
        }
        self.require_vertex(u)?;
        self.require_vertex(v)?;

        let forward = self
            .adjacency
            .get_mut(u)
            .and_then(|slots| slots.remove(v))
            .map_or(0, |w| w.len());
        let backward = self
            .adjacency
            .get_mut(v)
            .and_then(|slots| slots.remove(u))
            .map_or(0, |w| w.len());
        Ok(forward.max(backward))
    }

    /// Overwrite the weight of the parallel edge at `index` between `u`
    /// and `v`. If the `(v, u)` bundle exists it is updated too; a
    /// one-directional edge updates only `(u, v)`.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::VertexNotFound`] if either vertex is
    /// missing, [`GraphError::InvalidWeight`] for a bad weight, and
    /// [`GraphError::EdgeIndexOutOfRange`] if either existing direction
    /// has no parallel edge at `index`. Nothing is written on error.
    pub fn update_edge(
        &mut self,
        u: &V,
        v: &V,
        weight: Weight,
        index: usize,
    ) -> Result<(), GraphError> {
        let weight = check_weight(weight)?;
        self.require_vertex(u)?;
        self.require_vertex(v)?;

        let len = self.weights(u, v).map_or(0, <[Weight]>::len);
        if index >= len {
            log::warn!("update_edge({u:?}, {v:?}): index {index} out of range, {len} edges");
            return Err(GraphError::EdgeIndexOutOfRange { index, len });
        }
        if let Some(mirror) = self.weights(v, u).map(<[Weight]>::len)
            && index >= mirror
        {
            log::warn!(
                "update_edge({u:?}, {v:?}): index {index} out of range on the mirror, {mirror} edges"
            );
            return Err(GraphError::EdgeIndexOutOfRange { index, len: mirror });
        }
        for (a, b) in [(u, v), (v, u)] {
            if let Some(slot) = self
                .adjacency
                .get_mut(a)
                .and_then(|slots| slots.get_mut(b))
                .and_then(|weights| weights.get_mut(index))
            {
                *slot = weight;
            }
        }
        Ok(())
    }

    /// Consume one edge leaving `u`: the last parallel edge to its
    /// lowest-ordered neighbour. The mirror occurrence is consumed too
    /// and emptied slots are dropped.
    pub(crate) fn take_edge_from(&mut self, u: &V) -> Option<(V, Weight)> {
        let slots = self.adjacency.get_mut(u)?;
        let mut entry = slots.first_entry()?;
        let v = entry.key().clone();
        let weight = entry.get_mut().pop()?;
        if entry.get().is_empty() {
            entry.remove();
        }

        if let Some(mirror_slots) = self.adjacency.get_mut(&v)
            && let Some(mirror) = mirror_slots.get_mut(u)
        {
            let pos = mirror
                .iter()
                .rposition(|w| w.to_bits() == weight.to_bits())
                .unwrap_or(mirror.len().saturating_sub(1));
            if pos < mirror.len() {
                mirror.remove(pos);
            }
            if mirror.is_empty() {
                mirror_slots.remove(u);
            }
        }
        Some((v, weight))
    }
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

impl<V: Vertex> Graph<V> {
    /// Whether `v` is a vertex of the graph.
    #[must_use]
    pub fn contains_vertex(&self, v: &V) -> bool {
        self.adjacency.contains_key(v)
    }

    pub(crate) fn require_vertex(&self, v: &V) -> Result<(), GraphError> {
        if self.contains_vertex(v) {
            Ok(())
        } else {
            Err(GraphError::vertex_not_found(v))
        }
    }

    /// All vertices in ascending order.
    pub fn vertices(&self) -> impl Iterator<Item = &V> {
        self.adjacency.keys()
    }

    /// Neighbours of `v` in ascending order. Empty for an unknown vertex.
    pub fn neighbors(&self, v: &V) -> impl Iterator<Item = &V> {
        self.adjacency.get(v).into_iter().flat_map(BTreeMap::keys)
    }

    /// Weights of the parallel edges from `u` to `v`, if any.
    #[must_use]
    pub fn weights(&self, u: &V, v: &V) -> Option<&[Weight]> {
        self.adjacency
            .get(u)
            .and_then(|slots| slots.get(v))
            .map(Vec::as_slice)
    }

    /// Cost of one hop from `u` to `v` under `policy`.
    #[must_use]
    pub fn travel_cost(&self, u: &V, v: &V, policy: WeightPolicy) -> Option<Weight> {
        self.weights(u, v).and_then(|w| policy.select(w))
    }

    /// Total number of edge occurrences at `v`, or `None` for an unknown
    /// vertex.
    #[must_use]
    pub fn degree(&self, v: &V) -> Option<usize> {
        self.adjacency
            .get(v)
            .map(|slots| slots.values().map(Vec::len).sum())
    }

    /// Vertices of odd degree, ascending. Always an even count for an
    /// undirected graph.
    #[must_use]
    pub fn odd_degree_vertices(&self) -> Vec<V> {
        self.adjacency
            .iter()
            .filter(|(_, slots)| slots.values().map(Vec::len).sum::<usize>() % 2 != 0)
            .map(|(v, _)| v.clone())
            .collect()
    }

    /// Every edge once, with multiplicity, as `(u, v, weight)`.
    ///
    /// Undirected edges are reported with `u < v`. One-directional
    /// entries are reported as stored.
    #[must_use]
    pub fn edges(&self) -> Vec<(V, V, Weight)> {
        let mut out = Vec::new();
        for (u, slots) in &self.adjacency {
            for (v, weights) in slots {
                if u > v && self.weights(v, u).is_some() {
                    continue;
                }
                out.extend(weights.iter().map(|&w| (u.clone(), v.clone(), w)));
            }
        }
        out
    }

    /// Number of edges, counting parallel edges separately.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges().len()
    }

    /// Sum of all edge weights, counting parallel edges separately.
    #[must_use]
    pub fn total_weight(&self) -> Weight {
        self.edges().iter().map(|&(_, _, w)| w).sum()
    }

    /// Whether every `(u, v)` entry has an identical `(v, u)` mirror.
    #[must_use]
    pub fn is_symmetric(&self) -> bool {
        self.first_asymmetric_pair().is_none()
    }

    fn first_asymmetric_pair(&self) -> Option<(&V, &V)> {
        self.adjacency.iter().find_map(|(u, slots)| {
            slots.iter().find_map(|(v, weights)| {
                let mirrored = self
                    .weights(v, u)
                    .is_some_and(|mirror| same_weights(weights, mirror));
                (!mirrored).then_some((u, v))
            })
        })
    }
}

// ---------------------------------------------------------------------------
// Algorithms
// ---------------------------------------------------------------------------

impl<V: Vertex> Graph<V> {
    /// Shortest paths from `start`, pricing parallel edges by their
    /// minimum weight.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::VertexNotFound`] if `start` is missing.
    pub fn dijkstra(&self, start: &V) -> Result<ShortestPaths<V>, GraphError> {
        shortest_path::dijkstra(self, start, WeightPolicy::default())
    }

    /// Shortest-path distance from `u` to `v`.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::VertexNotFound`] if either vertex is missing
    /// and [`GraphError::DisconnectedGraph`] if `v` is unreachable.
    pub fn get_distance_between(&self, u: &V, v: &V) -> Result<Weight, GraphError> {
        self.require_vertex(v)?;
        let paths = self.dijkstra(u)?;
        match paths.distance_to(v) {
            Some(d) if d.is_finite() => Ok(d),
            _ => Err(GraphError::disconnected(u, v)),
        }
    }

    /// Vertex sequence of a shortest path from `u` to `v`, both included.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::VertexNotFound`] if either vertex is missing
    /// and [`GraphError::DisconnectedGraph`] if `v` is unreachable.
    pub fn get_path_between(&self, u: &V, v: &V) -> Result<Vec<V>, GraphError> {
        self.require_vertex(v)?;
        self.dijkstra(u)?.path_to(v)
    }

    /// Shortest-path tree rooted at `start`: parent -> child -> distance
    /// of the child from `start`. Leaves have no entry of their own.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::VertexNotFound`] if `start` is missing.
    pub fn get_spt(&self, start: &V) -> Result<ShortestPathTree<V>, GraphError> {
        Ok(self.dijkstra(start)?.spt())
    }

    /// Eulerian circuit (or trail, with exactly two odd-degree vertices)
    /// computed on a copy of the graph with Hierholzer's algorithm.
    ///
    /// # Errors
    ///
    /// See [`EulerianCircuitBuilder::build`].
    pub fn hierholzer(&self, start: Option<&V>) -> Result<EulerWalk<V>, GraphError> {
        EulerianCircuitBuilder::new(self.clone()).build(start)
    }

    /// Minimum-cost closed walk covering every edge, with the default
    /// [`SolverConfig`].
    ///
    /// # Errors
    ///
    /// See [`ChinesePostmanSolver::solve`].
    pub fn chinese_postman(&self) -> Result<Route<V>, GraphError> {
        ChinesePostmanSolver::new(SolverConfig::default()).solve(self)
    }
}
