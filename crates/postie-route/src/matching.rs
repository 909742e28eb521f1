//! Minimum-weight perfect matching by exhaustive backtracking.
//!
//! The input is a small complete graph over the odd-degree vertices of a
//! route problem, given as a [`DistanceTable`]. The search always pairs
//! the lowest-index unmatched vertex with each remaining candidate in
//! turn, so every perfect matching is enumerated exactly once
//! ((n-1)!! of them for n vertices). Branch-and-bound drops a partial
//! matching as soon as its cost reaches the best complete one.
//!
//! The search is exponential. A [`SearchBudget`] caps it by node count
//! and optionally by wall-clock time, reporting
//! [`GraphError::SearchBudgetExceeded`] instead of running away.

use web_time::Instant;

use crate::types::{GraphError, SearchBudget, Weight};

/// Inputs larger than this log a warning before searching.
pub const LARGE_MATCHING_WARN_THRESHOLD: usize = 16;

/// The deadline is polled once every this many nodes.
const DEADLINE_POLL_INTERVAL: u64 = 1024;

/// Symmetric pairwise weights over a vertex list.
///
/// `f64::INFINITY` marks a pair that cannot be matched.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceTable<V> {
    vertices: Vec<V>,
    weights: Vec<Vec<Weight>>,
}

impl<V> DistanceTable<V> {
    /// Table over `vertices` with every pair unmatched.
    #[must_use]
    pub fn new(vertices: Vec<V>) -> Self {
        let n = vertices.len();
        let weights = (0..n)
            .map(|i| {
                (0..n)
                    .map(|j| if i == j { 0.0 } else { f64::INFINITY })
                    .collect()
            })
            .collect();
        Self { vertices, weights }
    }

    /// Table filled from `weight(i, j)` for every `i < j`.
    #[must_use]
    pub fn from_fn(vertices: Vec<V>, mut weight: impl FnMut(usize, usize) -> Weight) -> Self {
        let mut table = Self::new(vertices);
        for i in 0..table.len() {
            for j in i + 1..table.len() {
                table.set(i, j, weight(i, j));
            }
        }
        table
    }

    /// Set the weight between indices `i` and `j` in both directions.
    /// Out-of-range indices are ignored.
    pub fn set(&mut self, i: usize, j: usize, weight: Weight) {
        if i >= self.len() || j >= self.len() || i == j {
            return;
        }
        self.weights[i][j] = weight;
        self.weights[j][i] = weight;
    }

    /// Weight between indices `i` and `j`.
    #[must_use]
    pub fn weight(&self, i: usize, j: usize) -> Option<Weight> {
        self.weights.get(i).and_then(|row| row.get(j)).copied()
    }

    /// The vertex list, in index order.
    #[must_use]
    pub fn vertices(&self) -> &[V] {
        &self.vertices
    }

    /// Number of vertices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    /// Returns `true` if the table has no vertices.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Largest finite entry, or `0.0` for a table without one.
    #[must_use]
    pub fn max_finite_weight(&self) -> Weight {
        self.weights
            .iter()
            .flatten()
            .copied()
            .filter(|w| w.is_finite())
            .fold(0.0, Weight::max)
    }
}

/// A perfect matching with its cost.
#[derive(Debug, Clone, PartialEq)]
pub struct Matching<V> {
    /// Matched pairs. The first vertex of each pair comes earlier in the
    /// table than the second; pairs are ordered by their first vertex.
    pub pairs: Vec<(V, V)>,
    /// Sum of the pair weights.
    pub total_weight: Weight,
    /// Search nodes visited before the optimum was confirmed.
    pub nodes_explored: u64,
}

/// Budgeted exhaustive matching search.
#[derive(Debug, Clone, Copy, Default)]
pub struct MatchingSolver {
    budget: SearchBudget,
}

impl MatchingSolver {
    /// Create a solver with the given budget.
    #[must_use]
    pub const fn new(budget: SearchBudget) -> Self {
        Self { budget }
    }

    /// Find the minimum-weight perfect matching of `table`.
    ///
    /// An empty table yields an empty matching.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::NoPerfectMatching`] if the vertex count is
    /// odd or infinite entries rule out every pairing, and
    /// [`GraphError::SearchBudgetExceeded`] if the budget runs out first.
    pub fn solve<V: Clone>(&self, table: &DistanceTable<V>) -> Result<Matching<V>, GraphError> {
        let n = table.len();
        if n % 2 != 0 {
            return Err(GraphError::NoPerfectMatching);
        }
        if n > LARGE_MATCHING_WARN_THRESHOLD {
            log::warn!(
                "matching {n} vertices exhaustively; search size grows as (n-1)!! \
                 and may hit the budget ({:?} nodes, time limit {:?})",
                self.budget.max_nodes,
                self.budget.time_limit,
            );
        }

        let mut search = Search {
            weights: &table.weights,
            mate: vec![None; n],
            best: None,
            nodes: 0,
            budget: self.budget,
            started: Instant::now(),
        };
        search.descend(0.0)?;

        let nodes_explored = search.nodes;
        let Some((total_weight, mate)) = search.best else {
            log::debug!("no perfect matching over {n} vertices ({nodes_explored} nodes)");
            return Err(GraphError::NoPerfectMatching);
        };
        let pairs = mate
            .iter()
            .enumerate()
            .filter_map(|(i, m)| m.filter(|&j| i < j).map(|j| (i, j)))
            .map(|(i, j)| (table.vertices[i].clone(), table.vertices[j].clone()))
            .collect();
        log::debug!(
            "matched {n} vertices at cost {total_weight} after {nodes_explored} nodes"
        );

        Ok(Matching {
            pairs,
            total_weight,
            nodes_explored,
        })
    }
}

struct Search<'a> {
    weights: &'a [Vec<Weight>],
    mate: Vec<Option<usize>>,
    best: Option<(Weight, Vec<Option<usize>>)>,
    nodes: u64,
    budget: SearchBudget,
    started: Instant,
}

impl Search<'_> {
    fn descend(&mut self, cost: Weight) -> Result<(), GraphError> {
        let Some(u) = self.mate.iter().position(Option::is_none) else {
            if self.best.as_ref().is_none_or(|(best, _)| cost < *best) {
                self.best = Some((cost, self.mate.clone()));
            }
            return Ok(());
        };

        // Everything below `u` is already matched.
        for v in u + 1..self.mate.len() {
            if self.mate[v].is_some() {
                continue;
            }
            let w = self.weights[u][v];
            if !w.is_finite() {
                continue;
            }
            self.tick()?;

            let next = cost + w;
            if self.best.as_ref().is_some_and(|(best, _)| next >= *best) {
                continue;
            }
            self.mate[u] = Some(v);
            self.mate[v] = Some(u);
            self.descend(next)?;
            self.mate[u] = None;
            self.mate[v] = None;
        }
        Ok(())
    }

    fn tick(&mut self) -> Result<(), GraphError> {
        self.nodes += 1;
        let out_of_nodes = self.budget.max_nodes.is_some_and(|max| self.nodes > max);
        let out_of_time = self.nodes % DEADLINE_POLL_INTERVAL == 0
            && self
                .budget
                .time_limit
                .is_some_and(|limit| self.started.elapsed() > limit);
        if out_of_nodes || out_of_time {
            log::warn!("matching search budget exhausted after {} nodes", self.nodes);
            return Err(GraphError::SearchBudgetExceeded {
                nodes_explored: self.nodes,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use super::*;

    /// Points on a line: the weight between `i` and `j` is `j - i`.
    #[allow(clippy::cast_precision_loss)]
    fn line_table(n: usize) -> DistanceTable<usize> {
        DistanceTable::from_fn((0..n).collect(), |i, j| (j - i) as f64)
    }

    #[test]
    fn empty_table_matches_trivially() {
        let m = MatchingSolver::default()
            .solve(&DistanceTable::<u8>::new(vec![]))
            .unwrap();
        assert!(m.pairs.is_empty());
        assert_eq!(m.total_weight, 0.0);
    }

    #[test]
    fn single_pair() {
        let mut table = DistanceTable::new(vec!["a", "b"]);
        table.set(0, 1, 2.5);
        let m = MatchingSolver::default().solve(&table).unwrap();
        assert_eq!(m.pairs, vec![("a", "b")]);
        assert_eq!(m.total_weight, 2.5);
    }

    #[test]
    fn picks_cheapest_of_three_matchings() {
        // {ab, cd} = 2, {ac, bd} = 20, {ad, bc} = 11.
        let mut table = DistanceTable::new(vec!['a', 'b', 'c', 'd']);
        table.set(0, 1, 1.0);
        table.set(2, 3, 1.0);
        table.set(0, 2, 10.0);
        table.set(1, 3, 10.0);
        table.set(0, 3, 5.0);
        table.set(1, 2, 6.0);
        let m = MatchingSolver::default().solve(&table).unwrap();
        assert_eq!(m.pairs, vec![('a', 'b'), ('c', 'd')]);
        assert_eq!(m.total_weight, 2.0);

        table.set(0, 1, 30.0);
        let m = MatchingSolver::default().solve(&table).unwrap();
        assert_eq!(m.pairs, vec![('a', 'd'), ('b', 'c')]);
        assert_eq!(m.total_weight, 11.0);
    }

    #[test]
    fn adjacent_pairs_win_on_a_line() {
        let m = MatchingSolver::default().solve(&line_table(6)).unwrap();
        assert_eq!(m.pairs, vec![(0, 1), (2, 3), (4, 5)]);
        assert_eq!(m.total_weight, 3.0);
    }

    #[test]
    fn odd_vertex_count_has_no_perfect_matching() {
        let err = MatchingSolver::default().solve(&line_table(3)).unwrap_err();
        assert_eq!(err, GraphError::NoPerfectMatching);
    }

    #[test]
    fn infinite_entries_block_pairings() {
        // Only 1-3 and 3-4 are finite; vertex 2 cannot be paired.
        let mut table = DistanceTable::new(vec![1, 2, 3, 4]);
        table.set(2, 3, 1.0);
        table.set(0, 2, 1.0);
        let err = MatchingSolver::default().solve(&table).unwrap_err();
        assert_eq!(err, GraphError::NoPerfectMatching);
    }

    #[test]
    fn node_budget_is_enforced() {
        let solver = MatchingSolver::new(SearchBudget::nodes(10));
        let err = solver.solve(&line_table(12)).unwrap_err();
        assert!(matches!(
            err,
            GraphError::SearchBudgetExceeded { nodes_explored: 11 }
        ));
    }

    #[test]
    fn zero_time_limit_is_enforced() {
        let solver = MatchingSolver::new(SearchBudget {
            max_nodes: None,
            time_limit: Some(Duration::ZERO),
        });
        // Equal weights defeat pruning, so the search passes the first
        // deadline poll.
        let table = DistanceTable::from_fn((0..14).collect::<Vec<u32>>(), |_, _| 1.0);
        let err = solver.solve(&table).unwrap_err();
        assert!(matches!(err, GraphError::SearchBudgetExceeded { .. }));
    }

    #[test]
    fn unbounded_budget_finishes_small_search() {
        let solver = MatchingSolver::new(SearchBudget::unbounded());
        let m = solver.solve(&line_table(10)).unwrap();
        assert_eq!(m.total_weight, 5.0);
        assert!(m.nodes_explored > 0);
    }

    #[test]
    fn max_finite_weight_ignores_infinity() {
        let mut table = DistanceTable::new(vec![0, 1, 2]);
        table.set(0, 1, 4.0);
        assert_eq!(table.max_finite_weight(), 4.0);
        assert_eq!(table.weight(1, 2), Some(f64::INFINITY));
        assert_eq!(table.weight(5, 0), None);
    }
}
