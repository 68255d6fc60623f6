//! Row-wise all-to-all of the inspector's metadata.
//!
//! Every host sends each of its `C − 1` row peers the degree vectors for
//! that peer's column plus the incidence bitset over that peer's column
//! space, then receives the same from each of them. Receives are matched
//! by sender id, with `(sender mod C)` naming the column slot the data
//! merges into, and the per-peer incidence sets are OR-reduced into one
//! bitset
//! over this host's own column space. The phase counter is bumped exactly
//! once on completion so a later round's traffic cannot collide.

use crate::comm::transport::{recv_blocking, Transport};
use crate::comm::wire::{WireReader, WireWriter};
use crate::error::PartitionError;
use crate::partition::bitset::AtomicBitSet;
use crate::partition::block_map::BlockMap;
use crate::partition::grid::Grid;
use crate::partition::inspector::Inspection;

/// Merged row metadata, ready for local-index layout.
pub struct RowMetadata {
    /// `out_deg[d][i]`: degree vector of the sources owned by the row
    /// peer in column `i` (decompose slice `d`), counting only edges this
    /// host's column will store. Slot `col_of(host)` keeps local data.
    pub out_deg: Vec<Vec<Vec<u64>>>,
    /// Union over the whole row of incidence on this host's column space.
    pub has_in: AtomicBitSet,
}

pub fn exchange_metadata<T: Transport + ?Sized>(
    net: &T,
    grid: &Grid,
    block_map: &BlockMap,
    inspection: Inspection,
    host: usize,
) -> Result<RowMetadata, PartitionError> {
    let phase = net.phase();
    let cols = grid.cols();
    let my_col = grid.col_of(host);
    let row_base = grid.row_of(host) * cols;

    let Inspection {
        mut out_deg,
        has_in,
    } = inspection;

    for (i, peer_bits) in has_in.iter().enumerate() {
        let peer = row_base + i;
        if peer == host {
            continue;
        }
        let mut w = WireWriter::new();
        for per_col in &out_deg {
            w.push_u64_slice(&per_col[i]);
        }
        w.push_u64(peer_bits.len());
        w.push_u64_slice(&peer_bits.to_words());
        net.send(peer, phase, w.into_vec());
    }
    net.flush();

    let own_bits = block_map.column_block_size(my_col);
    let merged = AtomicBitSet::new(own_bits);
    merged.union_with(&has_in[my_col]);

    let mut seen = vec![false; cols];
    for _ in 0..cols.saturating_sub(1) {
        let (sender, bytes) = recv_blocking(net, phase);
        if sender == host || sender >= grid.num_hosts() || grid.row_of(sender) != grid.row_of(host)
        {
            return Err(PartitionError::protocol(
                host,
                phase,
                format!("metadata buffer from host {sender}, which is not a row peer"),
            ));
        }
        let slot = sender % cols;
        if seen[slot] {
            return Err(PartitionError::protocol(
                host,
                phase,
                format!("duplicate metadata buffer from host {sender}"),
            ));
        }
        seen[slot] = true;

        let mut r = WireReader::new(&bytes);
        for (d, per_col) in out_deg.iter_mut().enumerate() {
            let v = r
                .read_u64_vec()
                .map_err(|e| PartitionError::protocol(host, phase, e.to_string()))?;
            let (start, end) = block_map.range_of(sender + d * grid.num_hosts());
            if v.len() as u64 != end - start {
                return Err(PartitionError::protocol(
                    host,
                    phase,
                    format!(
                        "degree vector from host {sender} (slice {d}) has {} entries, range holds {}",
                        v.len(),
                        end - start
                    ),
                ));
            }
            per_col[slot] = v;
        }

        let nbits = r
            .read_u64()
            .map_err(|e| PartitionError::protocol(host, phase, e.to_string()))?;
        let words = r
            .read_u64_vec()
            .map_err(|e| PartitionError::protocol(host, phase, e.to_string()))?;
        if nbits != own_bits {
            return Err(PartitionError::protocol(
                host,
                phase,
                format!("incidence bitset from host {sender} covers {nbits} slots, expected {own_bits}"),
            ));
        }
        let bits = AtomicBitSet::from_words(nbits, words).ok_or_else(|| {
            PartitionError::protocol(
                host,
                phase,
                format!("incidence bitset from host {sender} has a bad word count"),
            )
        })?;
        merged.union_with(&bits);
    }

    net.increment_phase();

    Ok(RowMetadata {
        out_deg,
        has_in: merged,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::transport::LocalCluster;
    use crate::graph::buffered::BufferedEdgeReader;
    use crate::graph::file::{write_graph, OfflineGraph};
    use crate::partition::inspector::inspect;

    /// Two hosts in one row (1x2 grid via more_columns) exchange their
    /// halves and both end with the full incidence picture.
    #[test]
    fn row_pair_merges_metadata() {
        let mut path = std::env::temp_dir();
        path.push(format!("grid-cut-exchange-{}.gr", std::process::id()));
        // 0 -> 2, 1 -> 3, 1 -> 2 on four nodes split two per host.
        write_graph::<()>(&path, 4, &[(0, 2, ()), (1, 3, ()), (1, 2, ())]).unwrap();

        let grid = Grid::new(2, 1, true, false).unwrap(); // 1 x 2
        assert_eq!((grid.rows(), grid.cols()), (1, 2));
        let bm = BlockMap::from_ranges(&grid, 4, vec![(0, 2), (2, 4)]);

        let cluster = LocalCluster::new(2);
        let results: Vec<_> = cluster
            .transports()
            .into_iter()
            .enumerate()
            .map(|(h, net)| {
                let grid = grid.clone();
                let bm = bm.clone();
                let path = path.clone();
                std::thread::spawn(move || {
                    let mut g = OfflineGraph::open(&path).unwrap();
                    let (s, e) = bm.range_of(h);
                    let readers = vec![BufferedEdgeReader::<()>::load(&mut g, s, e).unwrap()];
                    let insp = inspect(&grid, &bm, &readers, h);
                    exchange_metadata(&net, &grid, &bm, insp, h).unwrap()
                })
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|t| t.join().unwrap())
            .collect();

        // Host 0's column space is [0, 1]: no incoming edges anywhere.
        assert_eq!(results[0].has_in.count_ones(), 0);
        // Host 1's column space is [2, 3]: both receive edges.
        assert!(results[1].has_in.test(0));
        assert!(results[1].has_in.test(1));

        // After the exchange, host 1 holds host 0's degree vector toward
        // column 1 in slot 0.
        assert_eq!(results[1].out_deg[0][0], vec![1, 2]);
        // And its own (empty: sources 2,3 have no out-edges) in slot 1.
        assert_eq!(results[1].out_deg[0][1], vec![0, 0]);

        std::fs::remove_file(&path).unwrap();
    }
}
