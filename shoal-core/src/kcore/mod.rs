//! K-core clustering: parallel peeling, flat threshold clustering, and
//! hierarchical connectivity trees.
//!
//! The peeler produces each vertex's coreness. Flat clustering keeps the
//! vertices at or above a coreness threshold and groups them into connected
//! components. Hierarchical clustering produces an array-encoded merge forest
//! across decreasing core values, built either inline during peeling (two
//! variants) or post hoc from the finished coreness array.

mod bucketing;
mod hierarchy;
mod peeler;

use rayon::prelude::*;
use tracing::debug;

use crate::clustering::{group_by_label, Clustering, NodeId};
use crate::graph::CsrGraph;
use crate::parallel::pack_index;
use crate::union_find::AsyncUnionFind;

use self::hierarchy::{posthoc_connectivity_tree, LevelUnionHook, LinkChainHook};
use self::peeler::{peel, NoHook};

/// How the merge hierarchy is constructed.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ConnectivityMethod {
    /// Reconstruct the hierarchy from the coreness array after peeling.
    #[default]
    None,
    /// Track one union-find per peeling level while peeling runs.
    Inline,
    /// Track a single union-find with per-vertex link chains while peeling
    /// runs.
    EfficientInline,
}

/// Configuration for [`KCoreClusterer`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KCoreConfig {
    threshold: u32,
    num_buckets: usize,
    connectivity_method: ConnectivityMethod,
}

impl Default for KCoreConfig {
    fn default() -> Self {
        Self {
            threshold: 2,
            num_buckets: 16,
            connectivity_method: ConnectivityMethod::None,
        }
    }
}

impl KCoreConfig {
    /// Creates a configuration populated with default parameters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the coreness threshold for flat clustering.
    #[must_use]
    pub fn with_threshold(mut self, threshold: u32) -> Self {
        self.threshold = threshold;
        self
    }

    /// Returns the configured coreness threshold.
    #[must_use]
    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Sets how many open buckets the peeler holds directly.
    #[must_use]
    pub fn with_num_buckets(mut self, num_buckets: usize) -> Self {
        self.num_buckets = num_buckets;
        self
    }

    /// Returns the configured open bucket count.
    #[must_use]
    pub fn num_buckets(&self) -> usize {
        self.num_buckets
    }

    /// Sets the hierarchy construction method.
    #[must_use]
    pub fn with_connectivity_method(mut self, method: ConnectivityMethod) -> Self {
        self.connectivity_method = method;
        self
    }

    /// Returns the configured hierarchy construction method.
    #[must_use]
    pub fn connectivity_method(&self) -> ConnectivityMethod {
        self.connectivity_method
    }
}

/// Runs k-core peeling over a graph.
///
/// # Examples
/// ```
/// use shoal_core::{KCoreClusterer, KCoreConfig};
/// use shoal_core::CsrGraph;
///
/// let clique = CsrGraph::from_undirected_edges(
///     4,
///     &[(0, 1, 1.0), (0, 2, 1.0), (0, 3, 1.0), (1, 2, 1.0), (1, 3, 1.0), (2, 3, 1.0)],
/// )
/// .expect("edges are valid");
/// let clusterer = KCoreClusterer::new(KCoreConfig::new().with_threshold(3));
/// assert_eq!(clusterer.core_numbers(&clique), vec![3, 3, 3, 3]);
/// assert_eq!(clusterer.cluster(&clique), vec![vec![0, 1, 2, 3]]);
/// ```
#[derive(Clone, Copy, Debug)]
pub struct KCoreClusterer {
    config: KCoreConfig,
}

impl KCoreClusterer {
    /// Constructs a clusterer from `config`.
    #[must_use]
    pub fn new(config: KCoreConfig) -> Self {
        Self { config }
    }

    /// Returns the clusterer's configuration.
    #[must_use]
    pub fn config(&self) -> &KCoreConfig {
        &self.config
    }

    /// Computes each vertex's coreness.
    #[must_use]
    pub fn core_numbers(&self, graph: &CsrGraph) -> Vec<u32> {
        peel(graph, &mut NoHook, self.config.num_buckets, false)
    }

    /// Groups the vertices of coreness at or above the threshold into
    /// connected components.
    ///
    /// Vertices below the threshold do not appear in the result at all.
    #[must_use]
    pub fn cluster(&self, graph: &CsrGraph) -> Clustering {
        let n = graph.vertex_count();
        let threshold = self.config.threshold;
        let cores = self.core_numbers(graph);

        let components = AsyncUnionFind::new(n);
        (0..n as u32).into_par_iter().for_each(|vertex| {
            if cores[vertex as usize] < threshold {
                return;
            }
            for edge in graph.neighbours(vertex) {
                if cores[edge.id as usize] >= threshold {
                    components.unite(vertex, edge.id);
                }
            }
        });
        let labels = components.finish();

        let members = pack_index(n, |vertex| cores[vertex] >= threshold);
        let clustering = group_by_label(members, &labels);
        debug!(
            threshold,
            clusters = clustering.len(),
            "k-core flat clustering complete"
        );
        clustering
    }

    /// Builds the merge hierarchy as an array-encoded forest.
    ///
    /// Entries below the vertex count are leaves, higher entries are internal
    /// merge nodes, and roots carry [`crate::NONE_ID`]. All three
    /// construction methods encode the same merges up to renaming of
    /// internal node ids.
    #[must_use]
    pub fn hierarchical_cluster(&self, graph: &CsrGraph) -> Vec<NodeId> {
        let n = graph.vertex_count();
        match self.config.connectivity_method {
            ConnectivityMethod::None => {
                let cores = peel(graph, &mut NoHook, self.config.num_buckets, false);
                posthoc_connectivity_tree(graph, &cores)
            }
            ConnectivityMethod::Inline => {
                let mut hook = LevelUnionHook::new(n);
                peel(graph, &mut hook, self.config.num_buckets, true);
                hook.into_tree()
            }
            ConnectivityMethod::EfficientInline => {
                let mut hook = LinkChainHook::new(n);
                peel(graph, &mut hook, self.config.num_buckets, true);
                hook.into_tree()
            }
        }
    }
}
