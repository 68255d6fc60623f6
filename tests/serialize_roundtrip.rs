//! Persistence round-trip of the local index container.

mod util;

use grid_cut::prelude::*;
use tempfile::TempDir;
use util::*;

#[test]
fn local_index_roundtrips_through_bytes() {
    let dir = TempDir::new().unwrap();
    let edges: Vec<(u64, u64, ())> = (0..15).map(|s| (s, (s * 3 + 1) % 16, ())).collect();
    let path = graph_file(&dir, "roundtrip.gr", 16, &edges);

    let parts = build_cluster::<()>(&path, 4, CartesianConfig::default());

    for part in &parts {
        let mut bytes = Vec::new();
        part.serialize_local(&mut bytes).unwrap();

        let restored = CartesianPartition::<()>::deserialize_local(bytes.as_slice()).unwrap();
        let snapshot = part.snapshot();
        assert_eq!(restored, snapshot);

        assert_eq!(restored.num_nodes, part.num_nodes());
        assert_eq!(restored.rows as usize, part.grid().rows());
        assert_eq!(restored.cols as usize, part.grid().cols());
        assert_eq!(restored.local_to_global, part.index().local_to_global);
        for &(gid, lid) in &restored.global_to_local {
            assert_eq!(part.global_to_local(gid), Some(lid));
        }
        assert_eq!(
            restored.global_to_local.len(),
            part.index().global_to_local.len()
        );
    }
}

#[test]
fn serialized_bytes_are_deterministic() {
    let dir = TempDir::new().unwrap();
    let edges: Vec<(u64, u64, ())> = (0..9).map(|s| (s, (s + 1) % 10, ())).collect();
    let path = graph_file(&dir, "deterministic.gr", 10, &edges);

    let a = build_cluster::<()>(&path, 2, CartesianConfig::default());
    let b = build_cluster::<()>(&path, 2, CartesianConfig::default());

    for (pa, pb) in a.iter().zip(&b) {
        let mut ba = Vec::new();
        let mut bb = Vec::new();
        pa.serialize_local(&mut ba).unwrap();
        pb.serialize_local(&mut bb).unwrap();
        assert_eq!(ba, bb);
    }
}

#[test]
fn corrupt_container_is_rejected() {
    let err = CartesianPartition::<()>::deserialize_local(&[0xFFu8; 3][..]).unwrap_err();
    assert!(matches!(err, PartitionError::Io { .. }));
}
