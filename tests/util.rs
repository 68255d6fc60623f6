#![allow(dead_code)]
use std::path::{Path, PathBuf};

use bytemuck::Pod;
use grid_cut::prelude::*;
use tempfile::TempDir;

/// Write a graph file into `dir` in the partitioner's on-disk format.
pub fn graph_file<E: Pod>(dir: &TempDir, name: &str, n: u64, edges: &[(u64, u64, E)]) -> PathBuf {
    let path = dir.path().join(name);
    grid_cut::graph::write_graph(&path, n, edges).unwrap();
    path
}

/// Run a full partition build on `hosts` threads over one in-process
/// cluster, including the reciprocal replica exchange. Results come back
/// in host order.
pub fn build_cluster<E: Pod + Send + Sync + 'static>(
    path: &Path,
    hosts: usize,
    config: CartesianConfig,
) -> Vec<CartesianPartition<E>> {
    let cluster = LocalCluster::new(hosts);
    let handles: Vec<_> = cluster
        .transports()
        .into_iter()
        .map(|net| {
            let path = path.to_path_buf();
            let config = config.clone();
            std::thread::spawn(move || {
                let mut part = CartesianPartition::<E>::build(&path, &net, config).unwrap();
                part.exchange_replicas(&net).unwrap();
                part
            })
        })
        .collect();
    handles.into_iter().map(|h| h.join().unwrap()).collect()
}

/// Every edge constructed on this host, in global ids.
pub fn local_edges<E: Pod + Send + Sync>(part: &CartesianPartition<E>) -> Vec<(u64, u64)> {
    let mut out = Vec::new();
    for lid in 0..part.num_nodes() {
        let src = part.local_to_global(lid);
        for &ldst in part.csr().neighbors(lid) {
            out.push((src, part.local_to_global(ldst)));
        }
    }
    out
}

/// Order-agnostic multiset equality over edge lists.
pub fn assert_edge_multiset(mut got: Vec<(u64, u64)>, mut want: Vec<(u64, u64)>) {
    got.sort_unstable();
    want.sort_unstable();
    assert_eq!(got, want, "edge multisets differ");
}
