//! End-to-end affinity clustering scenarios.

use shoal_core::{
    cluster_quality, compress_graph, find_finished_clusters, nearest_neighbour_linkage,
    ActiveClusterCondition, AffinityClusterer, AffinityConfig, CsrGraph, EdgeAggregation, NONE_ID,
};

#[test]
fn edgeless_graph_stays_singletons_and_finishes_nothing() {
    let graph = CsrGraph::from_undirected_edges(4, &[]).expect("valid graph");
    let mut labels = nearest_neighbour_linkage(&graph, 0.0);
    assert_eq!(labels, vec![0, 1, 2, 3]);
    let finished = find_finished_clusters(&graph, &[], &mut labels);
    assert!(finished.is_empty());
    assert_eq!(labels, vec![0, 1, 2, 3]);
}

#[test]
fn triangle_collapses_and_reports_density() {
    let graph = CsrGraph::from_undirected_edges(3, &[(0, 1, 1.0), (1, 2, 1.0), (0, 2, 0.5)])
        .expect("valid graph");
    let labels = nearest_neighbour_linkage(&graph, 0.0);
    assert_eq!(labels, vec![0, 0, 0]);
    let quality = cluster_quality(&graph, &labels);
    assert!((quality[0].density - 2.5 / 3.0).abs() < 1e-6);
}

#[test]
fn disjoint_pairs_compress_to_an_edgeless_graph() {
    let graph =
        CsrGraph::from_undirected_edges(4, &[(0, 1, 2.0), (2, 3, 2.0)]).expect("valid graph");
    let labels = nearest_neighbour_linkage(&graph, 0.0);
    assert_eq!(labels[0], labels[1]);
    assert_eq!(labels[2], labels[3]);
    assert_ne!(labels[0], labels[2]);

    let compressed =
        compress_graph(&graph, &[], &labels, EdgeAggregation::Sum).expect("compression succeeds");
    assert_eq!(compressed.graph.vertex_count(), 2);
    assert_eq!(compressed.graph.directed_edge_count(), 0);
    assert_eq!(compressed.node_weights, vec![2, 2]);
}

#[test]
fn linkage_above_threshold_always_merges_something() {
    // Labelling closure: one edge above the threshold forces a shared label.
    let graph = CsrGraph::from_undirected_edges(5, &[(1, 3, 0.8)]).expect("valid graph");
    let labels = nearest_neighbour_linkage(&graph, 0.5);
    assert_eq!(labels[1], labels[3]);
}

#[test]
fn compression_conserves_node_weight_mass() {
    let graph = CsrGraph::from_undirected_edges(
        6,
        &[(0, 1, 2.0), (1, 2, 1.0), (3, 4, 2.0), (4, 5, 1.0), (2, 3, 0.25)],
    )
    .expect("valid graph");
    let node_weights = vec![1, 2, 3, 4, 5, 6];
    let mut labels = nearest_neighbour_linkage(&graph, 0.0);
    labels[2] = NONE_ID;
    let compressed = compress_graph(&graph, &node_weights, &labels, EdgeAggregation::Sum)
        .expect("compression succeeds");
    let kept: u32 = labels
        .iter()
        .zip(&node_weights)
        .filter(|(&label, _)| label != NONE_ID)
        .map(|(_, &weight)| weight)
        .sum();
    let compressed_total: u32 = compressed.node_weights.iter().sum();
    assert_eq!(compressed_total, kept);
    compressed
        .graph
        .validate_symmetry()
        .expect("compression preserves symmetry");
}

#[test]
fn driver_emits_finished_clusters_and_survivors() {
    // Two dense pairs bridged weakly; density conditions finish the pairs in
    // different rounds from the bridge remnant.
    let graph = CsrGraph::from_undirected_edges(
        5,
        &[(0, 1, 4.0), (2, 3, 4.0), (1, 2, 0.5), (3, 4, 0.1)],
    )
    .expect("valid graph");
    let clusterer = AffinityClusterer::new(
        AffinityConfig::new()
            .with_edge_aggregation(EdgeAggregation::Sum)
            .with_num_iterations(4)
            .with_active_cluster_conditions(vec![ActiveClusterCondition {
                min_conductance: Some(0.05),
                min_density: None,
            }]),
    )
    .expect("valid config");
    let clustering = clusterer.cluster(&graph).expect("clustering succeeds");

    let mut seen = vec![false; 5];
    for cluster in &clustering {
        for &vertex in cluster {
            assert!(!seen[vertex as usize], "vertex {vertex} emitted twice");
            seen[vertex as usize] = true;
        }
    }
    assert!(seen.iter().all(|&flag| flag), "every vertex is emitted once");
}

#[test]
fn percentile_surfaces_unimplemented_through_the_driver() {
    let graph = CsrGraph::from_undirected_edges(4, &[(0, 1, 1.0), (2, 3, 1.0), (1, 2, 0.5)])
        .expect("valid graph");
    let clusterer = AffinityClusterer::new(
        AffinityConfig::new()
            .with_edge_aggregation(EdgeAggregation::Percentile)
            .with_num_iterations(2),
    )
    .expect("valid config");
    let err = clusterer.cluster(&graph).expect_err("percentile must fail");
    assert_eq!(err.code().as_str(), "SHOAL_UNIMPLEMENTED");
}
