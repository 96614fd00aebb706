//! Affinity clustering: iterative nearest-neighbour contraction.
//!
//! Each round selects every vertex's heaviest incident edge above a weight
//! threshold, collapses the selected sub-graph's connected components into
//! super-vertices, and recompresses the graph with aggregated edge weights.
//! Clusters that satisfy none of the configured active-cluster conditions are
//! emitted after each round and their vertices drop out of later rounds; the
//! survivors are emitted when the configured rounds run out.

mod compress;
mod linkage;
mod stats;

use rayon::prelude::*;
use tracing::debug;

pub use self::compress::{compress_graph, CompressedGraph};
pub use self::linkage::nearest_neighbour_linkage;
pub use self::stats::{cluster_quality, find_finished_clusters, ClusterQuality};

use crate::clustering::{
    dense_to_nested, flatten_labels, group_by_label, Clustering, NodeId, NONE_ID,
};
use crate::error::{Result, ShoalError};
use crate::graph::CsrGraph;
use crate::parallel::pack_index;

/// How inter-cluster edge weights combine during graph compression.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EdgeAggregation {
    /// Keep the heaviest contributing edge.
    Max,
    /// Sum all contributing edges.
    Sum,
    /// Sum node-weight-scaled contributions, divided by the product of the
    /// compressed endpoint weights.
    DefaultAverage,
    /// Sum node-weight-scaled contributions, divided by the smaller
    /// compressed endpoint weight.
    CutSparsity,
    /// Reserved; requesting it fails with an unimplemented error.
    Percentile,
}

/// One lower-bound test a cluster can pass to stay active.
///
/// At least one bound must be set; a cluster stays active when every set
/// bound of at least one condition holds.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ActiveClusterCondition {
    /// Minimum density for the cluster to stay active under this condition.
    pub min_density: Option<f32>,
    /// Minimum conductance for the cluster to stay active under this
    /// condition.
    pub min_conductance: Option<f32>,
}

/// Configuration for [`AffinityClusterer`].
///
/// # Examples
/// ```
/// use shoal_core::{AffinityConfig, EdgeAggregation};
///
/// let config = AffinityConfig::new()
///     .with_edge_aggregation(EdgeAggregation::Sum)
///     .with_weight_threshold(0.3)
///     .with_num_iterations(4);
/// assert_eq!(config.num_iterations(), 4);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct AffinityConfig {
    edge_aggregation: EdgeAggregation,
    weight_threshold: f32,
    num_iterations: usize,
    active_cluster_conditions: Vec<ActiveClusterCondition>,
}

impl Default for AffinityConfig {
    fn default() -> Self {
        Self {
            edge_aggregation: EdgeAggregation::DefaultAverage,
            weight_threshold: 0.0,
            num_iterations: 1,
            active_cluster_conditions: Vec::new(),
        }
    }
}

impl AffinityConfig {
    /// Creates a configuration populated with default parameters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the edge aggregation mode used during compression.
    #[must_use]
    pub fn with_edge_aggregation(mut self, aggregation: EdgeAggregation) -> Self {
        self.edge_aggregation = aggregation;
        self
    }

    /// Returns the configured edge aggregation mode.
    #[must_use]
    pub fn edge_aggregation(&self) -> EdgeAggregation {
        self.edge_aggregation
    }

    /// Sets the minimum edge weight for nearest-neighbour selection.
    #[must_use]
    pub fn with_weight_threshold(mut self, threshold: f32) -> Self {
        self.weight_threshold = threshold;
        self
    }

    /// Returns the configured weight threshold.
    #[must_use]
    pub fn weight_threshold(&self) -> f32 {
        self.weight_threshold
    }

    /// Sets how many contraction rounds to run.
    #[must_use]
    pub fn with_num_iterations(mut self, rounds: usize) -> Self {
        self.num_iterations = rounds;
        self
    }

    /// Returns the configured number of rounds.
    #[must_use]
    pub fn num_iterations(&self) -> usize {
        self.num_iterations
    }

    /// Replaces the active-cluster conditions.
    #[must_use]
    pub fn with_active_cluster_conditions(
        mut self,
        conditions: Vec<ActiveClusterCondition>,
    ) -> Self {
        self.active_cluster_conditions = conditions;
        self
    }

    /// Returns the configured active-cluster conditions.
    #[must_use]
    pub fn active_cluster_conditions(&self) -> &[ActiveClusterCondition] {
        &self.active_cluster_conditions
    }
}

/// Runs affinity clustering rounds over a graph.
///
/// # Examples
/// ```
/// use shoal_core::{AffinityClusterer, AffinityConfig, CsrGraph, EdgeAggregation};
///
/// let graph = CsrGraph::from_undirected_edges(4, &[(0, 1, 2.0), (2, 3, 2.0)])
///     .expect("edges are valid");
/// let clusterer = AffinityClusterer::new(
///     AffinityConfig::new().with_edge_aggregation(EdgeAggregation::Sum),
/// )
/// .expect("configuration is valid");
/// let clustering = clusterer.cluster(&graph).expect("clustering succeeds");
/// assert_eq!(clustering, vec![vec![0, 1], vec![2, 3]]);
/// ```
#[derive(Clone, Debug)]
pub struct AffinityClusterer {
    config: AffinityConfig,
}

impl AffinityClusterer {
    /// Validates `config` and constructs a clusterer.
    ///
    /// # Errors
    /// Returns [`ShoalError::EmptyClusterCondition`] when a condition sets
    /// neither bound.
    pub fn new(config: AffinityConfig) -> Result<Self> {
        for (index, condition) in config.active_cluster_conditions.iter().enumerate() {
            if condition.min_density.is_none() && condition.min_conductance.is_none() {
                return Err(ShoalError::EmptyClusterCondition { index });
            }
        }
        Ok(Self { config })
    }

    /// Returns the clusterer's configuration.
    #[must_use]
    pub fn config(&self) -> &AffinityConfig {
        &self.config
    }

    /// Runs the configured rounds and returns the emitted clustering.
    ///
    /// Finished clusters are emitted as rounds progress; everything still
    /// active after the final round is emitted in one closing sweep. Each
    /// round's finishing statistics are computed on that round's (possibly
    /// contracted) graph and labelling, with the round's node weights giving
    /// every super-vertex its original mass.
    ///
    /// # Errors
    /// Returns [`ShoalError::Unimplemented`] when compression runs with
    /// [`EdgeAggregation::Percentile`].
    pub fn cluster(&self, graph: &CsrGraph) -> Result<Clustering> {
        let n = graph.vertex_count();
        if n == 0 {
            return Ok(Vec::new());
        }

        let mut clustering: Clustering = Vec::new();
        let mut cluster_ids: Vec<NodeId> = (0..n as u32).collect();
        let mut contracted: Option<CompressedGraph> = None;

        for round in 0..self.config.num_iterations {
            let (current, node_weights): (&CsrGraph, &[u32]) = match &contracted {
                Some(compressed) => (&compressed.graph, &compressed.node_weights),
                None => (graph, &[]),
            };

            let mut round_labels =
                nearest_neighbour_linkage(current, self.config.weight_threshold);
            let identity_round = round_labels
                .par_iter()
                .enumerate()
                .all(|(vertex, &label)| label == vertex as u32);
            flatten_labels(&mut cluster_ids, &round_labels);

            if round + 1 == self.config.num_iterations {
                break;
            }

            let mut emitted_this_round = false;
            let conditions = &self.config.active_cluster_conditions;
            if !conditions.is_empty() {
                let quality =
                    stats::cluster_quality_with_weights(current, node_weights, &round_labels);
                let finished = stats::finished_flags(&quality, conditions);
                // Flattened labels point at this round's clusters, so the
                // finished flags emit original vertex ids directly.
                let members = pack_index(n, |vertex| {
                    cluster_ids[vertex] != NONE_ID && finished[cluster_ids[vertex] as usize]
                });
                let finished_clusters = group_by_label(members, &cluster_ids);
                emitted_this_round = !finished_clusters.is_empty();
                debug!(
                    round,
                    emitted = finished_clusters.len(),
                    "affinity round complete"
                );
                clustering.extend(finished_clusters);
                cluster_ids.par_iter_mut().for_each(|label| {
                    if *label != NONE_ID && finished[*label as usize] {
                        *label = NONE_ID;
                    }
                });
                round_labels.par_iter_mut().for_each(|label| {
                    if *label != NONE_ID && finished[*label as usize] {
                        *label = NONE_ID;
                    }
                });
            }

            if round_labels.par_iter().all(|&label| label == NONE_ID) {
                break;
            }
            if identity_round && !emitted_this_round {
                // No vertex merged and nothing finished: further rounds
                // would reproduce the same graph.
                debug!(round, "affinity converged");
                break;
            }

            let next = compress_graph(
                current,
                node_weights,
                &round_labels,
                self.config.edge_aggregation,
            )?;
            contracted = Some(next);
        }

        clustering.extend(dense_to_nested(&cluster_ids));
        Ok(clustering)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_conditions_without_bounds() {
        let config = AffinityConfig::new()
            .with_active_cluster_conditions(vec![ActiveClusterCondition::default()]);
        let err = AffinityClusterer::new(config).expect_err("condition has no bounds");
        assert_eq!(err, ShoalError::EmptyClusterCondition { index: 0 });
    }

    #[test]
    fn empty_graph_yields_empty_clustering() {
        let graph = CsrGraph::from_undirected_edges(0, &[]).expect("valid graph");
        let clusterer = AffinityClusterer::new(AffinityConfig::new()).expect("valid config");
        assert!(clusterer.cluster(&graph).expect("clustering succeeds").is_empty());
    }

    #[test]
    fn single_round_emits_linkage_clusters() {
        let graph =
            CsrGraph::from_undirected_edges(3, &[(0, 1, 1.0), (1, 2, 1.0), (0, 2, 0.5)])
                .expect("valid graph");
        let clusterer = AffinityClusterer::new(AffinityConfig::new()).expect("valid config");
        let clustering = clusterer.cluster(&graph).expect("clustering succeeds");
        assert_eq!(clustering, vec![vec![0, 1, 2]]);
    }

    #[test]
    fn converged_rounds_stop_before_the_iteration_limit() {
        // Isolated vertices never merge, so extra rounds are cut short.
        let graph = CsrGraph::from_undirected_edges(3, &[]).expect("valid graph");
        let clusterer = AffinityClusterer::new(
            AffinityConfig::new()
                .with_num_iterations(16)
                .with_edge_aggregation(EdgeAggregation::Sum),
        )
        .expect("valid config");
        let clustering = clusterer.cluster(&graph).expect("clustering succeeds");
        assert_eq!(clustering, vec![vec![0], vec![1], vec![2]]);
    }

    #[test]
    fn multi_round_contraction_merges_hierarchically() {
        // Two heavy pairs joined by a lighter bridge: round one forms the
        // pairs, round two merges them through the aggregated bridge edge.
        let graph = CsrGraph::from_undirected_edges(
            4,
            &[(0, 1, 4.0), (2, 3, 4.0), (1, 2, 1.0)],
        )
        .expect("valid graph");
        let clusterer = AffinityClusterer::new(
            AffinityConfig::new()
                .with_num_iterations(3)
                .with_edge_aggregation(EdgeAggregation::Sum),
        )
        .expect("valid config");
        let clustering = clusterer.cluster(&graph).expect("clustering succeeds");
        assert_eq!(clustering, vec![vec![0, 1, 2, 3]]);
    }

    #[test]
    fn finishing_tracks_the_contracted_graph_under_max_aggregation() {
        // Four heavy pairs form two quads in round two. Max aggregation
        // collapses each quad's parallel cut edges to a single 3.0 edge, so
        // on the contracted graph both quads score density 3.0 over six
        // pairs of mass and finish, leaving the 2.0 bridge between them
        // uncontracted. Scoring the input graph instead would see density
        // above the bound, keep both quads active, and merge everything.
        let graph = CsrGraph::from_undirected_edges(
            8,
            &[
                (0, 1, 8.0),
                (2, 3, 8.0),
                (4, 5, 8.0),
                (6, 7, 8.0),
                (1, 2, 3.0),
                (0, 3, 3.0),
                (5, 6, 3.0),
                (4, 7, 3.0),
                (3, 4, 2.0),
            ],
        )
        .expect("valid graph");
        let clusterer = AffinityClusterer::new(
            AffinityConfig::new()
                .with_num_iterations(4)
                .with_edge_aggregation(EdgeAggregation::Max)
                .with_active_cluster_conditions(vec![ActiveClusterCondition {
                    min_density: Some(1.0),
                    min_conductance: None,
                }]),
        )
        .expect("valid config");
        let clustering = clusterer.cluster(&graph).expect("clustering succeeds");
        assert_eq!(clustering, vec![vec![0, 1, 2, 3], vec![4, 5, 6, 7]]);
    }

    #[test]
    fn finished_clusters_leave_later_rounds() {
        // A loose pair finishes after round one while the tight pair stays.
        let graph = CsrGraph::from_undirected_edges(
            4,
            &[(0, 1, 4.0), (2, 3, 0.5)],
        )
        .expect("valid graph");
        let clusterer = AffinityClusterer::new(
            AffinityConfig::new()
                .with_num_iterations(3)
                .with_edge_aggregation(EdgeAggregation::Sum)
                .with_active_cluster_conditions(vec![ActiveClusterCondition {
                    min_density: Some(1.0),
                    min_conductance: None,
                }]),
        )
        .expect("valid config");
        let clustering = clusterer.cluster(&graph).expect("clustering succeeds");
        assert!(clustering.contains(&vec![2, 3]));
        assert!(clustering.contains(&vec![0, 1]));
        assert_eq!(clustering.len(), 2);
    }
}
