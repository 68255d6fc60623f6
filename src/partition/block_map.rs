//! Balanced contiguous node ranges per virtual host, plus the column
//! geometry derived from them.
//!
//! The division walks the on-disk node-offset prefix once per cut via
//! binary search, weighting node `g` as `1 + out_degree(g)` so hosts
//! receive proportional edge load and empty graphs still split. Virtual
//! host `v` gets a share proportional to `scale[v mod H]`. Ranges are
//! contiguous, cover `[0, N)`, and are stable given identical inputs.

use crate::error::PartitionError;
use crate::graph::file::OfflineGraph;
use crate::partition::grid::Grid;

/// Node-range table for all `R·C` virtual hosts.
#[derive(Clone, Debug)]
pub struct BlockMap {
    num_hosts: usize,
    num_nodes: u64,
    /// Half-open `[start, end)` per virtual host.
    ranges: Vec<(u64, u64)>,
    /// Range end per virtual host (monotone), for owner lookup.
    ends: Vec<u64>,
    /// Column peer of each virtual host's block.
    col_peer: Vec<usize>,
    /// Offset of each range within its column-peer concatenation.
    col_offset: Vec<u64>,
    /// Total node count per column peer.
    col_size: Vec<u64>,
}

impl BlockMap {
    /// Divide `[0, N)` among the grid's virtual hosts.
    pub fn balanced(
        graph: &mut OfflineGraph,
        grid: &Grid,
        scale: &[u32],
    ) -> Result<Self, PartitionError> {
        if scale.len() != grid.num_hosts() {
            return Err(PartitionError::Config(format!(
                "scale-factor vector has {} entries for {} hosts",
                scale.len(),
                grid.num_hosts()
            )));
        }
        let weight_total: u64 = scale.iter().map(|&s| s as u64).sum::<u64>()
            * grid.decompose_factor() as u64;
        if weight_total == 0 {
            return Err(PartitionError::Config("scale-factor sum is zero".into()));
        }

        let n = graph.size();
        let m = graph.size_edges();
        let units_total = n + m;

        // units(g) = g + (edges of the first g nodes); strictly monotone
        // in g, so each cut is a plain binary search over the offsets.
        let mut units_of = |g: u64| -> std::io::Result<u64> {
            Ok(g + graph.edge_begin_of(g.min(n))?)
        };

        let num_virtual = grid.num_virtual();
        let mut ranges = Vec::with_capacity(num_virtual);
        let mut start = 0u64;
        let mut cum_weight = 0u64;
        for v in 0..num_virtual {
            cum_weight += scale[v % grid.num_hosts()] as u64;
            let target = units_total as u128 * cum_weight as u128;
            // Smallest cut with units(cut)·W ≥ U·cum_weight.
            let mut lo = start;
            let mut hi = n;
            while lo < hi {
                let mid = lo + (hi - lo) / 2;
                let units = units_of(mid)
                    .map_err(|e| PartitionError::Config(format!("graph offsets: {e}")))?;
                if units as u128 * weight_total as u128 >= target {
                    hi = mid;
                } else {
                    lo = mid + 1;
                }
            }
            ranges.push((start, lo));
            start = lo;
        }
        debug_assert_eq!(start, n, "ranges must cover the node space");

        Ok(Self::from_ranges(grid, n, ranges))
    }

    /// Assemble the table from precomputed ranges (shared by tests).
    pub(crate) fn from_ranges(grid: &Grid, num_nodes: u64, ranges: Vec<(u64, u64)>) -> Self {
        debug_assert_eq!(ranges.len(), grid.num_virtual());
        let ends = ranges.iter().map(|&(_, e)| e).collect();

        let mut col_peer = Vec::with_capacity(ranges.len());
        let mut col_offset = Vec::with_capacity(ranges.len());
        let mut col_size = vec![0u64; grid.cols()];
        for (v, &(s, e)) in ranges.iter().enumerate() {
            let peer = grid.column_peer_of_block(v % grid.num_hosts());
            col_peer.push(peer);
            col_offset.push(col_size[peer]);
            col_size[peer] += e - s;
        }

        Self {
            num_hosts: grid.num_hosts(),
            num_nodes,
            ranges,
            ends,
            col_peer,
            col_offset,
            col_size,
        }
    }

    pub fn num_nodes(&self) -> u64 {
        self.num_nodes
    }

    /// Range of virtual host `v`.
    #[inline]
    pub fn range_of(&self, v: usize) -> (u64, u64) {
        self.ranges[v]
    }

    /// The unique virtual host whose range contains `gid`.
    #[inline]
    pub fn host_of(&self, gid: u64) -> usize {
        debug_assert!(gid < self.num_nodes);
        self.ends.partition_point(|&e| e <= gid)
    }

    /// Block id of `gid` (its owner folded onto the real hosts).
    #[inline]
    pub fn block_of(&self, gid: u64) -> usize {
        self.host_of(gid) % self.num_hosts
    }

    /// Column peer of `gid`'s block together with `gid`'s position in the
    /// concatenation, in range order, of all ranges on that column peer.
    #[inline]
    pub fn column_slot(&self, gid: u64) -> (usize, u64) {
        let v = self.host_of(gid);
        let (start, _) = self.ranges[v];
        (self.col_peer[v], self.col_offset[v] + (gid - start))
    }

    /// Column peer of virtual host `v`'s block.
    #[inline]
    pub fn column_peer_of_host(&self, v: usize) -> usize {
        self.col_peer[v]
    }

    /// Total nodes on column peer `peer`.
    #[inline]
    pub fn column_block_size(&self, peer: usize) -> u64 {
        self.col_size[peer]
    }
}
