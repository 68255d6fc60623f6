//! Local node layout: the `local ↔ global` mapping and edge prefix sum.
//!
//! Layout order defines local ids and hence the CSR order:
//!
//! 1. **Owned masters**: every gid in this host's own virtual ranges,
//!    ascending, decompose slice by slice. Masters are the contiguous
//!    window `[begin_master, begin_master + num_owned)`.
//! 2. **Outgoing mirrors**: sources owned by row peers whose edges this
//!    host's column will store. Under checkerboard partitioning a source
//!    with no stored out-edges but an incoming edge on this column is
//!    materialized anyway as a *dummy outgoing* node to preserve ordering
//!    locality; outside checkerboard mode that situation means the node
//!    division and the grid disagree and the build aborts (lenient mode
//!    downgrades it to a warning, matching the legacy behavior).
//! 3. **Incoming mirrors**: destinations owned by column peers with an
//!    incidence bit set, appended with a flat prefix (no out-edges are
//!    attributed to them here).
//!
//! Duplicate global ids and ownership violations are checked in release
//! builds; the whole build is abandoned on the first violation.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::error::PartitionError;
use crate::partition::block_map::BlockMap;
use crate::partition::exchange::RowMetadata;
use crate::partition::grid::Grid;

/// Immutable after construction; consumed by the edge loader and the
/// replica tables.
#[derive(Debug)]
pub struct LocalIndex {
    /// Dense local id → global id.
    pub local_to_global: Vec<u64>,
    /// Inverse of `local_to_global`.
    pub global_to_local: HashMap<u64, u32>,
    /// Edge prefix, length `num_nodes + 1`, leading zero, last entry is
    /// `num_edges`.
    pub prefix_edges: Vec<u64>,
    /// Total edges this host will construct.
    pub num_edges: u64,
    /// Masters occupy `[begin_master, begin_master + num_owned)`.
    pub begin_master: u32,
    pub num_owned: u32,
    /// Checkerboard-only slots materialized without out-edges.
    pub dummy_outgoing: u32,
    /// Node count at the end of layout phase 2: every local slot that has
    /// (or may have) out-edges. This is the edge loader's completion
    /// target.
    pub nodes_with_out_edges: u32,
}

impl LocalIndex {
    pub fn num_nodes(&self) -> u32 {
        self.local_to_global.len() as u32
    }

    /// Local id of `gid`, if materialized on this host.
    #[inline]
    pub fn local_of(&self, gid: u64) -> Option<u32> {
        self.global_to_local.get(&gid).copied()
    }

    /// Slot size of local node `lid`.
    #[inline]
    pub fn slot_len(&self, lid: u32) -> u64 {
        self.prefix_edges[lid as usize + 1] - self.prefix_edges[lid as usize]
    }

    fn push_node(
        &mut self,
        gid: u64,
        host: usize,
        phase: u32,
    ) -> Result<(), PartitionError> {
        let lid = self.local_to_global.len() as u32;
        if self.global_to_local.insert(gid, lid).is_some() {
            return Err(PartitionError::invariant(
                host,
                phase,
                format!("global id {gid} materialized twice in the local index"),
            ));
        }
        self.local_to_global.push(gid);
        self.prefix_edges.push(self.num_edges);
        Ok(())
    }

    /// Build the layout from the merged row metadata.
    pub fn build(
        grid: &Grid,
        block_map: &BlockMap,
        meta: &RowMetadata,
        host: usize,
        phase: u32,
        lenient: bool,
    ) -> Result<Self, PartitionError> {
        let cols = grid.cols();
        let my_col = grid.col_of(host);
        let num_hosts = grid.num_hosts();

        let mut idx = LocalIndex {
            local_to_global: Vec::new(),
            global_to_local: HashMap::new(),
            prefix_edges: vec![0],
            num_edges: 0,
            begin_master: 0,
            num_owned: 0,
            dummy_outgoing: 0,
            nodes_with_out_edges: 0,
        };

        // 1. Owned masters.
        for d in 0..grid.decompose_factor() {
            let (start, end) = block_map.range_of(host + d * num_hosts);
            for (k, src) in (start..end).enumerate() {
                idx.num_edges += meta.out_deg[d][my_col][k];
                idx.push_node(src, host, phase)?;
            }
        }
        idx.num_owned = idx.local_to_global.len() as u32;
        idx.begin_master = 0;

        // 2. Outgoing mirrors (and checkerboard dummies).
        for d in 0..grid.decompose_factor() {
            let leader = grid.row_of(host + d * num_hosts) * cols;
            for i in 0..cols {
                let v = leader + i;
                if grid.virtual_to_real(v) == host {
                    continue;
                }
                let (start, end) = block_map.range_of(v);
                for (k, src) in (start..end).enumerate() {
                    let deg = meta.out_deg[d][i][k];
                    let mut create = false;
                    if deg > 0 {
                        idx.num_edges += deg;
                        create = true;
                    } else {
                        let (peer, column_index) = block_map.column_slot(src);
                        if peer == my_col && meta.has_in.test(column_index) {
                            if grid.column_blocked() {
                                idx.dummy_outgoing += 1;
                            } else if lenient {
                                log::warn!(
                                    "host {host}: node division left gid {src} unowned on its own column"
                                );
                            } else {
                                return Err(PartitionError::invariant(
                                    host,
                                    phase,
                                    format!(
                                        "gid {src} has incoming edges on this column but is owned by host {}",
                                        grid.virtual_to_real(v)
                                    ),
                                ));
                            }
                            create = true;
                        }
                    }
                    if create {
                        idx.push_node(src, host, phase)?;
                    }
                }
            }
        }
        idx.nodes_with_out_edges = idx.local_to_global.len() as u32;

        // 3. Incoming mirrors. The transpose of phase 2: walk this host's
        // grid column (contiguous chunk when column-blocked, strided
        // otherwise), skipping ranges already covered by its own rows.
        let rows = grid.rows();
        for i in 0..rows {
            let v = if grid.column_blocked() {
                my_col * rows + i
            } else {
                i * cols + my_col
            };
            if grid.virtual_to_real(v) == host {
                continue;
            }
            if grid.column_blocked() {
                let in_own_row = (0..grid.decompose_factor()).any(|d| {
                    let leader = grid.row_of(host + d * num_hosts) * cols;
                    v >= leader && v < leader + cols
                });
                if in_own_row {
                    continue;
                }
            }
            let (start, end) = block_map.range_of(v);
            for dst in start..end {
                let (peer, column_index) = block_map.column_slot(dst);
                if peer == my_col && meta.has_in.test(column_index) {
                    idx.push_node(dst, host, phase)?;
                }
            }
        }

        debug_assert_eq!(idx.prefix_edges.len(), idx.local_to_global.len() + 1);
        debug_assert_eq!(*idx.prefix_edges.last().expect("non-empty"), idx.num_edges);
        Ok(idx)
    }
}

const SNAPSHOT_VERSION: u32 = 1;

/// Self-describing persistence container for a prebuilt local index.
/// Edge payloads and CSR arrays are serialized by the caller's graph
/// container, not here.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalIndexSnapshot {
    pub version: u32,
    pub num_nodes: u32,
    pub rows: u32,
    pub cols: u32,
    pub local_to_global: Vec<u64>,
    /// `(gid, lid)` pairs sorted by gid, for deterministic bytes.
    pub global_to_local: Vec<(u64, u32)>,
}

impl LocalIndexSnapshot {
    pub fn capture(index: &LocalIndex, grid: &Grid) -> Self {
        let mut pairs: Vec<(u64, u32)> = index
            .global_to_local
            .iter()
            .map(|(&g, &l)| (g, l))
            .collect();
        pairs.sort_unstable_by_key(|&(g, _)| g);
        Self {
            version: SNAPSHOT_VERSION,
            num_nodes: index.num_nodes(),
            rows: grid.rows() as u32,
            cols: grid.cols() as u32,
            local_to_global: index.local_to_global.clone(),
            global_to_local: pairs,
        }
    }

    pub fn write_into<W: std::io::Write>(
        &self,
        writer: W,
        host: usize,
        phase: u32,
    ) -> Result<(), PartitionError> {
        bincode::serialize_into(writer, self).map_err(|e| {
            PartitionError::io(
                host,
                phase,
                std::io::Error::new(std::io::ErrorKind::InvalidData, e),
            )
        })
    }

    pub fn read_from<R: std::io::Read>(
        reader: R,
        host: usize,
        phase: u32,
    ) -> Result<Self, PartitionError> {
        let snap: Self = bincode::deserialize_from(reader).map_err(|e| {
            PartitionError::io(
                host,
                phase,
                std::io::Error::new(std::io::ErrorKind::InvalidData, e),
            )
        })?;
        if snap.version != SNAPSHOT_VERSION {
            return Err(PartitionError::protocol(
                host,
                phase,
                format!("local index snapshot version {}", snap.version),
            ));
        }
        Ok(snap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_bytes_roundtrip() {
        let snap = LocalIndexSnapshot {
            version: SNAPSHOT_VERSION,
            num_nodes: 3,
            rows: 2,
            cols: 2,
            local_to_global: vec![4, 9, 2],
            global_to_local: vec![(2, 2), (4, 0), (9, 1)],
        };
        let mut buf = Vec::new();
        snap.write_into(&mut buf, 0, 0).unwrap();
        let back = LocalIndexSnapshot::read_from(buf.as_slice(), 0, 0).unwrap();
        assert_eq!(back, snap);
    }
}
