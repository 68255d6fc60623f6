//! Master/mirror replica tables and their reciprocal exchange.
//!
//! After the CSR is built, every non-owned local gid is recorded against
//! the real host that masters it. The reciprocal `master_nodes` lists
//! (which local masters each remote host mirrors) are filled by one more
//! tagged all-to-all; the downstream synchronization runtime walks both
//! tables every superstep.

use crate::comm::transport::{recv_blocking, Transport};
use crate::comm::wire::{WireReader, WireWriter};
use crate::error::PartitionError;
use crate::partition::block_map::BlockMap;
use crate::partition::grid::Grid;
use crate::partition::local_index::LocalIndex;

/// Per-remote-host replica lists, indexed by real host id.
#[derive(Clone, Debug, Default)]
pub struct ReplicaTables {
    /// `mirror_nodes[h]`: global ids this host mirrors whose master is `h`.
    pub mirror_nodes: Vec<Vec<u64>>,
    /// `master_nodes[h]`: global ids this host masters that `h` mirrors.
    /// Empty until [`exchange_replicas`] runs.
    pub master_nodes: Vec<Vec<u64>>,
}

impl ReplicaTables {
    /// Derive `mirror_nodes` from the local index: every materialized gid
    /// outside this host's own ranges, in ascending gid order. Only
    /// ranges on this host's grid rows or grid column can contain local
    /// ids, so only those are walked.
    pub fn fill(index: &LocalIndex, grid: &Grid, block_map: &BlockMap, host: usize) -> Self {
        let num_hosts = grid.num_hosts();
        let cols = grid.cols();
        let rows = grid.rows();

        let mut candidate = vec![false; grid.num_virtual()];
        for d in 0..grid.decompose_factor() {
            let leader = grid.row_of(host + d * num_hosts) * cols;
            for i in 0..cols {
                candidate[leader + i] = true;
            }
        }
        for i in 0..rows {
            let v = if grid.column_blocked() {
                grid.col_of(host) * rows + i
            } else {
                i * cols + grid.col_of(host)
            };
            candidate[v] = true;
        }
        for d in 0..grid.decompose_factor() {
            candidate[host + d * num_hosts] = false;
        }

        let mut mirror_nodes = vec![Vec::new(); num_hosts];
        for (v, &is_candidate) in candidate.iter().enumerate() {
            if !is_candidate {
                continue;
            }
            let (start, end) = block_map.range_of(v);
            let owner = grid.virtual_to_real(v);
            for gid in start..end {
                if index.local_of(gid).is_some() {
                    mirror_nodes[owner].push(gid);
                }
            }
        }

        Self {
            mirror_nodes,
            master_nodes: vec![Vec::new(); num_hosts],
        }
    }

    /// Total number of mirror entries across all peers.
    pub fn num_mirrors(&self) -> usize {
        self.mirror_nodes.iter().map(Vec::len).sum()
    }
}

/// Reciprocal all-to-all: send each peer the gids mirrored from it,
/// collect into `master_nodes` what every peer mirrors from us. Bumps the
/// phase counter once.
pub fn exchange_replicas<T: Transport + ?Sized>(
    net: &T,
    grid: &Grid,
    tables: &mut ReplicaTables,
    host: usize,
) -> Result<(), PartitionError> {
    let phase = net.phase();
    let num_hosts = grid.num_hosts();

    for peer in 0..num_hosts {
        if peer == host {
            continue;
        }
        let mut w = WireWriter::new();
        w.push_u64_slice(&tables.mirror_nodes[peer]);
        net.send(peer, phase, w.into_vec());
    }
    net.flush();

    let mut seen = vec![false; num_hosts];
    for _ in 0..num_hosts.saturating_sub(1) {
        let (sender, bytes) = recv_blocking(net, phase);
        if sender == host || sender >= num_hosts || seen[sender] {
            return Err(PartitionError::protocol(
                host,
                phase,
                format!("unexpected replica list from host {sender}"),
            ));
        }
        seen[sender] = true;
        let mut r = WireReader::new(&bytes);
        tables.master_nodes[sender] = r
            .read_u64_vec()
            .map_err(|e| PartitionError::protocol(host, phase, e.to_string()))?;
    }

    net.increment_phase();
    Ok(())
}
