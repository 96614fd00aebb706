//! Compressed-sparse-row weighted graph storage.
//!
//! A [`CsrGraph`] is immutable once built: an offsets array of length `n + 1`
//! and a flat adjacency array holding `(neighbour, weight)` pairs sorted by
//! neighbour id. The graph is undirected and stored symmetrically, so every
//! edge appears once in each endpoint's adjacency with an identical weight.
//! Self-loops and duplicate neighbours are rejected at construction.

use rayon::prelude::*;

use crate::error::{Result, ShoalError};

/// One adjacency entry: the neighbour's id and the edge weight.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Neighbour {
    /// Neighbour vertex id.
    pub id: u32,
    /// Edge weight; finite and non-negative.
    pub weight: f32,
}

/// Symmetric weighted graph in compressed-sparse-row form.
///
/// # Examples
/// ```
/// use shoal_core::CsrGraph;
///
/// let graph = CsrGraph::from_undirected_edges(3, &[(0, 1, 1.0), (1, 2, 0.5)])
///     .expect("edges are valid");
/// assert_eq!(graph.vertex_count(), 3);
/// assert_eq!(graph.degree(1), 2);
/// assert_eq!(graph.weighted_degree(1), 1.5);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct CsrGraph {
    offsets: Vec<usize>,
    edges: Vec<Neighbour>,
}

impl CsrGraph {
    /// Builds a graph from undirected edges, mirroring each `(u, v, w)` into
    /// both adjacencies.
    ///
    /// Each undirected edge must be listed exactly once.
    ///
    /// # Errors
    /// Returns [`ShoalError::VertexOutOfRange`] for an endpoint `>=
    /// vertex_count`, [`ShoalError::SelfLoop`] when `u == v`,
    /// [`ShoalError::InvalidWeight`] for NaN, infinite, or negative weights,
    /// and [`ShoalError::DuplicateNeighbour`] when a pair is listed twice
    /// (in either orientation).
    pub fn from_undirected_edges(vertex_count: usize, edges: &[(u32, u32, f32)]) -> Result<Self> {
        let mut adjacency: Vec<Vec<Neighbour>> = vec![Vec::new(); vertex_count];
        for &(source, target, weight) in edges {
            for endpoint in [source, target] {
                if endpoint as usize >= vertex_count {
                    return Err(ShoalError::VertexOutOfRange {
                        vertex: endpoint,
                        vertex_count,
                    });
                }
            }
            if source == target {
                return Err(ShoalError::SelfLoop { vertex: source });
            }
            if !weight.is_finite() || weight < 0.0 {
                return Err(ShoalError::InvalidWeight {
                    source_vertex: source,
                    target,
                    weight,
                });
            }
            adjacency[source as usize].push(Neighbour { id: target, weight });
            adjacency[target as usize].push(Neighbour { id: source, weight });
        }

        for (vertex, list) in adjacency.iter_mut().enumerate() {
            list.sort_unstable_by_key(|edge| edge.id);
            if let Some(pair) = list.windows(2).find(|pair| pair[0].id == pair[1].id) {
                return Err(ShoalError::DuplicateNeighbour {
                    vertex: vertex as u32,
                    neighbour: pair[0].id,
                });
            }
        }

        let mut offsets = Vec::with_capacity(vertex_count + 1);
        offsets.push(0);
        let mut flat = Vec::with_capacity(edges.len() * 2);
        for list in adjacency {
            flat.extend(list);
            offsets.push(flat.len());
        }

        Ok(Self {
            offsets,
            edges: flat,
        })
    }

    /// Assembles a graph from already-built CSR buffers.
    ///
    /// The buffers must describe a symmetric graph with per-vertex adjacency
    /// sorted by neighbour id; this is checked in debug builds only.
    pub(crate) fn from_csr_parts(offsets: Vec<usize>, edges: Vec<Neighbour>) -> Self {
        let graph = Self { offsets, edges };
        debug_assert!(
            graph.validate_symmetry().is_ok(),
            "CSR buffers must describe a symmetric graph"
        );
        graph
    }

    /// Number of vertices.
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.offsets.len() - 1
    }

    /// Number of directed adjacency entries (twice the undirected edge count).
    #[must_use]
    pub fn directed_edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Number of edges incident to `vertex`.
    #[must_use]
    pub fn degree(&self, vertex: u32) -> usize {
        self.offsets[vertex as usize + 1] - self.offsets[vertex as usize]
    }

    /// The adjacency of `vertex`, sorted by neighbour id.
    #[must_use]
    pub fn neighbours(&self, vertex: u32) -> &[Neighbour] {
        &self.edges[self.offsets[vertex as usize]..self.offsets[vertex as usize + 1]]
    }

    /// Sum of edge weights incident to `vertex`.
    #[must_use]
    pub fn weighted_degree(&self, vertex: u32) -> f32 {
        self.neighbours(vertex).iter().map(|edge| edge.weight).sum()
    }

    /// Checks that every edge has a mirrored counterpart with the same weight.
    ///
    /// # Errors
    /// Returns [`ShoalError::AsymmetricEdge`] naming the first unmirrored
    /// edge found.
    pub fn validate_symmetry(&self) -> Result<()> {
        (0..self.vertex_count() as u32)
            .into_par_iter()
            .try_for_each(|vertex| {
                for edge in self.neighbours(vertex) {
                    let mirrored = self
                        .neighbours(edge.id)
                        .binary_search_by_key(&vertex, |back| back.id)
                        .map(|slot| self.neighbours(edge.id)[slot].weight == edge.weight)
                        .unwrap_or(false);
                    if !mirrored {
                        return Err(ShoalError::AsymmetricEdge {
                            source_vertex: vertex,
                            target: edge.id,
                            weight: edge.weight,
                        });
                    }
                }
                Ok(())
            })
    }
}
