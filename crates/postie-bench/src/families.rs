//! Synthetic graph families used as bench inputs.
//!
//! Vertices are numbered from zero. With `weighted` off every edge has
//! unit weight; with it on, weights are a fixed function of the endpoint
//! ids, so repeated runs see identical graphs.

use clap::ValueEnum;
use postie_route::{Graph, GraphError, Weight};

/// Graph family selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Family {
    /// `size` x `size` lattice. Border vertices other than the corners
    /// are odd.
    Grid,
    /// Two rails of `size` vertices joined by a rung at every position.
    Ladder,
    /// One hub with `size` leaves. Every leaf is odd.
    Star,
    /// A rim cycle of `size` vertices, each joined to a hub. Every rim
    /// vertex has degree 3.
    Wheel,
    /// Complete graph on `size` vertices.
    Complete,
}

impl Family {
    /// Build the family member of the given size.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::InvalidGraphConstruction`] when the size
    /// leaves the family without edges (`complete` of size 1), forces
    /// a self-loop (a one-vertex wheel rim), or needs more vertex ids
    /// than `u32` holds.
    pub fn build(self, size: u32, weighted: bool) -> Result<Graph<u32>, GraphError> {
        if self.vertex_count(size).is_none() {
            return Err(GraphError::InvalidGraphConstruction(format!(
                "{self:?} of size {size} needs more than {} vertex ids",
                u32::MAX
            )));
        }
        let edges = match self {
            Self::Grid => grid(size),
            Self::Ladder => ladder(size),
            Self::Star => (1..=size).map(|leaf| (0, leaf)).collect(),
            Self::Wheel => wheel(size),
            Self::Complete => complete(size),
        };
        Graph::from_edge_list(
            edges
                .into_iter()
                .map(|(u, v)| (u, v, edge_weight(u, v, weighted))),
        )
    }

    /// Vertices in the family member of the given size, `None` if the
    /// ids would not fit in a `u32`. Every id used by the builders below
    /// is smaller than this count.
    fn vertex_count(self, size: u32) -> Option<u32> {
        match self {
            Self::Grid => size.checked_mul(size),
            Self::Ladder => size.checked_mul(2),
            Self::Star | Self::Wheel => size.checked_add(1),
            Self::Complete => Some(size),
        }
    }
}

/// Deterministic weight in `1..=9` for a weighted family, `1` otherwise.
fn edge_weight(u: u32, v: u32, weighted: bool) -> Weight {
    if !weighted {
        return 1.0;
    }
    let (lo, hi) = (u.min(v), u.max(v));
    let mixed = lo.wrapping_mul(7).wrapping_add(hi.wrapping_mul(13));
    f64::from(mixed % 9 + 1)
}

fn grid(size: u32) -> Vec<(u32, u32)> {
    let id = |r: u32, c: u32| r * size + c;
    let mut edges = Vec::new();
    for r in 0..size {
        for c in 0..size {
            if c + 1 < size {
                edges.push((id(r, c), id(r, c + 1)));
            }
            if r + 1 < size {
                edges.push((id(r, c), id(r + 1, c)));
            }
        }
    }
    edges
}

fn ladder(size: u32) -> Vec<(u32, u32)> {
    let mut edges = Vec::new();
    for i in 0..size {
        edges.push((i, size + i));
        if i + 1 < size {
            edges.push((i, i + 1));
            edges.push((size + i, size + i + 1));
        }
    }
    edges
}

fn wheel(size: u32) -> Vec<(u32, u32)> {
    let mut edges: Vec<(u32, u32)> = (1..=size).map(|rim| (0, rim)).collect();
    edges.extend((1..=size).map(|rim| (rim, rim % size + 1)));
    edges
}

fn complete(size: u32) -> Vec<(u32, u32)> {
    (0..size)
        .flat_map(|u| (u + 1..size).map(move |v| (u, v)))
        .collect()
}
