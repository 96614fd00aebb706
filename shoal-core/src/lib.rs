//! Shoal core library.
//!
//! An in-memory parallel graph-clustering engine over symmetric weighted
//! graphs. Two clustering families are provided:
//!
//! - **Affinity clustering**: iterative nearest-neighbour contraction with
//!   pluggable edge aggregation and per-cluster finishing conditions.
//! - **K-core clustering**: bucket-based parallel peeling producing coreness,
//!   flat threshold clustering, and hierarchical merge trees built inline or
//!   post hoc.
//!
//! Both pipelines share the parallel sequence primitives in [`parallel`] and
//! the lock-free [`AsyncUnionFind`].

mod affinity;
mod clustering;
mod error;
mod graph;
mod kcore;
pub mod parallel;
mod union_find;

pub use crate::{
    affinity::{
        cluster_quality, compress_graph, find_finished_clusters, nearest_neighbour_linkage,
        ActiveClusterCondition, AffinityClusterer, AffinityConfig, ClusterQuality,
        CompressedGraph, EdgeAggregation,
    },
    clustering::{
        dense_to_nested, flatten_labels, group_by_label, Clustering, NodeId, NONE_ID,
    },
    error::{Result, ShoalError, ShoalErrorCode},
    graph::{CsrGraph, Neighbour},
    kcore::{ConnectivityMethod, KCoreClusterer, KCoreConfig},
    union_find::AsyncUnionFind,
};
