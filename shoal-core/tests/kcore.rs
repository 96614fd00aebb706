//! End-to-end k-core clustering and hierarchy scenarios.

use rstest::rstest;
use shoal_core::{ConnectivityMethod, CsrGraph, KCoreClusterer, KCoreConfig, NodeId, NONE_ID};

fn unit_graph(edges: &[(u32, u32)], n: usize) -> CsrGraph {
    let weighted: Vec<(u32, u32, f32)> = edges.iter().map(|&(u, v)| (u, v, 1.0)).collect();
    CsrGraph::from_undirected_edges(n, &weighted).expect("valid graph")
}

fn clique_edges(members: &[u32]) -> Vec<(u32, u32)> {
    let mut edges = Vec::new();
    for (slot, &u) in members.iter().enumerate() {
        for &v in &members[slot + 1..] {
            edges.push((u, v));
        }
    }
    edges
}

/// First common ancestor distance between two leaves, if any.
fn merge_height(tree: &[NodeId], a: u32, b: u32) -> Option<usize> {
    let ancestors = |leaf: u32| -> Vec<NodeId> {
        let mut chain = vec![leaf];
        let mut node = leaf;
        while tree[node as usize] != NONE_ID {
            node = tree[node as usize];
            chain.push(node);
        }
        chain
    };
    let left = ancestors(a);
    let right = ancestors(b);
    let mut best: Option<usize> = None;
    for (i, x) in left.iter().enumerate() {
        for (j, y) in right.iter().enumerate() {
            if x == y {
                let height = i.max(j);
                best = Some(best.map_or(height, |current| current.min(height)));
            }
        }
    }
    best
}

fn hierarchy(graph: &CsrGraph, method: ConnectivityMethod) -> Vec<NodeId> {
    KCoreClusterer::new(KCoreConfig::new().with_connectivity_method(method))
        .hierarchical_cluster(graph)
}

#[test]
fn clique_coreness_meets_its_threshold() {
    let clique = unit_graph(&clique_edges(&[0, 1, 2, 3]), 4);
    let clusterer = KCoreClusterer::new(KCoreConfig::new().with_threshold(3));
    assert_eq!(clusterer.core_numbers(&clique), vec![3, 3, 3, 3]);
    assert_eq!(clusterer.cluster(&clique), vec![vec![0, 1, 2, 3]]);
}

#[test]
fn path_below_threshold_yields_empty_clustering() {
    let path = unit_graph(&[(0, 1), (1, 2), (2, 3)], 4);
    let clusterer = KCoreClusterer::new(KCoreConfig::new().with_threshold(2));
    assert_eq!(clusterer.core_numbers(&path), vec![1, 1, 1, 1]);
    assert!(clusterer.cluster(&path).is_empty());
}

#[rstest]
#[case::posthoc(ConnectivityMethod::None)]
#[case::inline_levels(ConnectivityMethod::Inline)]
#[case::inline_chains(ConnectivityMethod::EfficientInline)]
fn clique_with_pendant_merges_core_first(#[case] method: ConnectivityMethod) {
    let mut edges = clique_edges(&[0, 1, 2, 3]);
    edges.push((4, 0));
    let graph = unit_graph(&edges, 5);
    let clusterer = KCoreClusterer::new(KCoreConfig::new());
    assert_eq!(clusterer.core_numbers(&graph), vec![3, 3, 3, 3, 1]);

    let tree = hierarchy(&graph, method);
    assert!(tree.len() >= 5);

    let clique_height = merge_height(&tree, 0, 3).expect("clique merges");
    let pendant_height = merge_height(&tree, 0, 4).expect("pendant attaches");
    assert!(
        clique_height < pendant_height,
        "clique at {clique_height}, pendant at {pendant_height}"
    );
    for (a, b) in [(0, 1), (1, 2), (2, 3)] {
        assert_eq!(merge_height(&tree, a, b), Some(clique_height));
    }
}

#[rstest]
#[case::posthoc(ConnectivityMethod::None)]
#[case::inline_levels(ConnectivityMethod::Inline)]
#[case::inline_chains(ConnectivityMethod::EfficientInline)]
fn variants_agree_on_final_components(#[case] method: ConnectivityMethod) {
    // A dense clique, a sparser triangle bridged to it, and an isolated pair.
    let mut edges = clique_edges(&[0, 1, 2, 3]);
    edges.extend([(4, 5), (5, 6), (4, 6), (3, 4), (7, 8)]);
    let graph = unit_graph(&edges, 9);
    let tree = hierarchy(&graph, method);

    for (a, b, connected) in [
        (0, 3, true),
        (0, 6, true),
        (4, 6, true),
        (7, 8, true),
        (0, 7, false),
        (6, 8, false),
    ] {
        assert_eq!(
            merge_height(&tree, a, b).is_some(),
            connected,
            "{a} and {b} with {method:?}"
        );
    }
}

#[rstest]
#[case::posthoc(ConnectivityMethod::None)]
#[case::inline_levels(ConnectivityMethod::Inline)]
#[case::inline_chains(ConnectivityMethod::EfficientInline)]
fn variants_order_merges_by_core_value(#[case] method: ConnectivityMethod) {
    let mut edges = clique_edges(&[0, 1, 2, 3]);
    edges.extend([(4, 5), (5, 6), (4, 6), (3, 4)]);
    let graph = unit_graph(&edges, 7);
    let clusterer = KCoreClusterer::new(KCoreConfig::new());
    assert_eq!(clusterer.core_numbers(&graph), vec![3, 3, 3, 3, 2, 2, 2]);

    let tree = hierarchy(&graph, method);
    let clique = merge_height(&tree, 0, 1).expect("clique merges at core 3");
    let triangle = merge_height(&tree, 4, 5).expect("triangle merges at core 2");
    let across = merge_height(&tree, 0, 4).expect("bridge merges last");
    assert!(clique <= across, "{method:?}: clique {clique} vs bridge {across}");
    assert!(triangle <= across, "{method:?}: triangle {triangle} vs bridge {across}");
    // The cross-core merge can never precede the finest merge it contains.
    assert!(across > clique, "{method:?} keeps the clique strictly finer");
}

#[rstest]
#[case::posthoc(ConnectivityMethod::None)]
#[case::inline_levels(ConnectivityMethod::Inline)]
#[case::inline_chains(ConnectivityMethod::EfficientInline)]
fn tree_length_stays_within_level_bounds(#[case] method: ConnectivityMethod) {
    let mut edges = clique_edges(&[0, 1, 2, 3]);
    edges.push((4, 0));
    let graph = unit_graph(&edges, 5);
    let tree = hierarchy(&graph, method);

    let n = 5;
    let levels = 2; // distinct core values: 3 and 1
    assert!(tree.len() >= n);
    assert!(tree.len() <= (levels + 1) * n);
    // Every stored parent is a valid index or the root sentinel.
    for &parent in &tree {
        assert!(parent == NONE_ID || (parent as usize) < tree.len());
    }
    // At least one root carries the sentinel.
    assert!(tree.iter().any(|&parent| parent == NONE_ID));
}
