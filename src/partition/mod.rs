//! The cartesian vertex-cut partitioner.
//!
//! Data flow: block map → inspector → metadata exchange → local index →
//! edge loader → replica tables. [`CartesianPartition::build`] runs the
//! whole pipeline on one host; every host of the grid runs it in
//! lock-step over the shared global graph file.

pub mod bitset;
pub mod block_map;
pub mod edge_loader;
pub mod exchange;
pub mod grid;
pub mod inspector;
pub mod local_index;
pub mod replicas;
pub mod sync_policy;

use std::path::Path;
use std::time::Instant;

use bytemuck::Pod;

use crate::comm::transport::Transport;
use crate::error::PartitionError;
use crate::graph::buffered::BufferedEdgeReader;
use crate::graph::csr::{CsrWriter, LocalCsr};
use crate::graph::file::OfflineGraph;

pub use block_map::BlockMap;
pub use grid::Grid;
pub use local_index::{LocalIndex, LocalIndexSnapshot};
pub use replicas::{exchange_replicas, ReplicaTables};
pub use sync_policy::{ReadLocation, StaleFlags, SyncDirection, SyncPolicy, WriteLocation};

/// Construction parameters for one partition build.
#[derive(Clone, Debug)]
pub struct CartesianConfig {
    /// Virtualize each host into this many decompose slices (`D ≥ 1`).
    pub decompose_factor: usize,
    /// Swap the grid orientation so columns outnumber rows.
    pub more_columns: bool,
    /// Checkerboard partitioning: contiguous column blocks instead of
    /// round-robin, with dummy outgoing nodes preserving source order.
    pub column_blocked: bool,
    /// Per-host node shares; `None` means equal shares.
    pub scale_factors: Option<Vec<u32>>,
    /// Downgrade the unowned-source layout violation from a fatal error
    /// to a warning (legacy behavior).
    pub lenient_ownership: bool,
}

impl Default for CartesianConfig {
    fn default() -> Self {
        Self {
            decompose_factor: 1,
            more_columns: false,
            column_blocked: false,
            scale_factors: None,
            lenient_ownership: false,
        }
    }
}

/// One host's share of the partitioned graph: the renumbered local CSR
/// plus the bookkeeping that keeps replicated node state consistent.
#[derive(Debug)]
pub struct CartesianPartition<E: Pod + Send + Sync> {
    host: usize,
    grid: Grid,
    block_map: BlockMap,
    index: LocalIndex,
    csr: LocalCsr<E>,
    replicas: ReplicaTables,
    transposed: bool,
    num_global_nodes: u64,
    num_global_edges: u64,
}

impl<E: Pod + Send + Sync> CartesianPartition<E> {
    /// Build this host's local subgraph. Every host of `net` must call
    /// this concurrently with identical `path` and `config`; the two
    /// passes over the edge file and the exchange rounds run in
    /// lock-step.
    pub fn build<T: Transport + ?Sized>(
        path: &Path,
        net: &T,
        config: CartesianConfig,
    ) -> Result<Self, PartitionError> {
        let host = net.host();
        let grid = Grid::new(
            net.num_hosts(),
            config.decompose_factor,
            config.more_columns,
            config.column_blocked,
        )?;

        let mut offline = OfflineGraph::open(path)?;
        let num_global_nodes = offline.size();
        let num_global_edges = offline.size_edges();

        let scale = config
            .scale_factors
            .unwrap_or_else(|| vec![1; grid.num_hosts()]);
        let block_map = BlockMap::balanced(&mut offline, &grid, &scale)?;

        if host == 0 {
            log::info!("cartesian grid: {} x {}", grid.rows(), grid.cols());
            if grid.decompose_factor() > 1 {
                log::info!("decompose factor: {}", grid.decompose_factor());
            }
        }

        // First pass: inspection.
        let inspection_timer = Instant::now();
        let readers = load_windows::<E>(&mut offline, &grid, &block_map, host, net.phase())?;
        let inspection = inspector::inspect(&grid, &block_map, &readers, host);
        log::info!(
            "host {host}: edge inspection took {:.3}s for {} bytes",
            inspection_timer.elapsed().as_secs_f64(),
            readers.iter().map(|r| r.bytes_read()).sum::<u64>(),
        );

        let meta = exchange::exchange_metadata(net, &grid, &block_map, inspection, host)?;
        let index = LocalIndex::build(
            &grid,
            &block_map,
            &meta,
            host,
            net.phase(),
            config.lenient_ownership,
        )?;

        // Second pass: construction.
        let loading_timer = Instant::now();
        let writer = CsrWriter::<E>::allocate(index.prefix_edges.clone());
        edge_loader::load_edges(&writer, &index, &grid, &block_map, &readers, net, host)?;
        log::info!(
            "host {host}: edge loading took {:.3}s ({} local nodes, {} local edges)",
            loading_timer.elapsed().as_secs_f64(),
            index.num_nodes(),
            index.num_edges,
        );
        drop(readers);
        let csr = writer.freeze();

        let replicas = ReplicaTables::fill(&index, &grid, &block_map, host);

        Ok(Self {
            host,
            grid,
            block_map,
            index,
            csr,
            replicas,
            transposed: false,
            num_global_nodes,
            num_global_edges,
        })
    }

    pub fn host(&self) -> usize {
        self.host
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn block_map(&self) -> &BlockMap {
        &self.block_map
    }

    /// Local node count (masters, mirrors, and dummies).
    pub fn num_nodes(&self) -> u32 {
        self.index.num_nodes()
    }

    /// Locally constructed edge count.
    pub fn num_edges(&self) -> u64 {
        self.index.num_edges
    }

    pub fn num_global_nodes(&self) -> u64 {
        self.num_global_nodes
    }

    pub fn num_global_edges(&self) -> u64 {
        self.num_global_edges
    }

    pub fn num_owned(&self) -> u32 {
        self.index.num_owned
    }

    pub fn begin_master(&self) -> u32 {
        self.index.begin_master
    }

    pub fn dummy_outgoing(&self) -> u32 {
        self.index.dummy_outgoing
    }

    /// Whether this host masters `gid`.
    pub fn is_owned(&self, gid: u64) -> bool {
        self.block_map.block_of(gid) == self.host
    }

    /// Whether `gid` is materialized locally (master or mirror).
    pub fn is_local(&self, gid: u64) -> bool {
        self.index.local_of(gid).is_some()
    }

    /// Local id of `gid`, if materialized.
    pub fn global_to_local(&self, gid: u64) -> Option<u32> {
        self.index.local_of(gid)
    }

    /// Global id of local node `lid`.
    pub fn local_to_global(&self, lid: u32) -> u64 {
        self.index.local_to_global[lid as usize]
    }

    pub fn index(&self) -> &LocalIndex {
        &self.index
    }

    pub fn csr(&self) -> &LocalCsr<E> {
        &self.csr
    }

    pub fn replicas(&self) -> &ReplicaTables {
        &self.replicas
    }

    pub fn mirror_nodes(&self) -> &[Vec<u64>] {
        &self.replicas.mirror_nodes
    }

    pub fn master_nodes(&self) -> &[Vec<u64>] {
        &self.replicas.master_nodes
    }

    /// Run the reciprocal replica exchange, filling `master_nodes`.
    pub fn exchange_replicas<T: Transport + ?Sized>(
        &mut self,
        net: &T,
    ) -> Result<(), PartitionError> {
        replicas::exchange_replicas(net, &self.grid, &mut self.replicas, self.host)
    }

    /// Local-id ranges holding mirrors (everything outside the master
    /// window).
    pub fn mirror_ranges(&self) -> Vec<(u32, u32)> {
        let mut ranges = Vec::new();
        if self.index.begin_master > 0 {
            ranges.push((0, self.index.begin_master));
        }
        let end_master = self.index.begin_master + self.index.num_owned;
        if end_master < self.num_nodes() {
            ranges.push((end_master, self.num_nodes()));
        }
        ranges
    }

    pub fn is_vertex_cut(&self) -> bool {
        self.grid.is_vertex_cut()
    }

    /// Record that the caller transposed the local CSR; flips the
    /// row/column roles in [`SyncPolicy`].
    pub fn mark_transposed(&mut self) {
        self.transposed = true;
    }

    pub fn transposed(&self) -> bool {
        self.transposed
    }

    /// Communication predicates over this partition.
    pub fn sync_policy(&self) -> SyncPolicy<'_> {
        SyncPolicy::new(&self.grid, &self.replicas, self.host, self.transposed)
    }

    /// Snapshot of the local index for persistence.
    pub fn snapshot(&self) -> LocalIndexSnapshot {
        LocalIndexSnapshot::capture(&self.index, &self.grid)
    }

    /// Persist the local index into a self-describing container. CSR
    /// arrays and edge payloads are serialized by the caller's graph
    /// container.
    pub fn serialize_local<W: std::io::Write>(&self, writer: W) -> Result<(), PartitionError> {
        self.snapshot().write_into(writer, self.host, 0)
    }

    /// Read back a persisted local index.
    pub fn deserialize_local<R: std::io::Read>(
        reader: R,
    ) -> Result<LocalIndexSnapshot, PartitionError> {
        LocalIndexSnapshot::read_from(reader, 0, 0)
    }
}

fn load_windows<E: Pod + Send + Sync>(
    offline: &mut OfflineGraph,
    grid: &Grid,
    block_map: &BlockMap,
    host: usize,
    phase: u32,
) -> Result<Vec<BufferedEdgeReader<E>>, PartitionError> {
    (0..grid.decompose_factor())
        .map(|d| {
            let (start, end) = block_map.range_of(host + d * grid.num_hosts());
            BufferedEdgeReader::load(offline, start, end)
                .map_err(|e| PartitionError::io(host, phase, e))
        })
        .collect()
}
