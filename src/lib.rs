//! # grid-cut
//!
//! grid-cut is the distributed graph partitioning core of a parallel
//! graph-processing framework: given one global directed graph on disk
//! and a fixed set of cooperating hosts, it produces on every host a
//! renumbered local CSR holding exactly the edges that host executes,
//! plus the master/mirror bookkeeping that keeps replicated node state
//! consistent across hosts.
//!
//! The partitioner is a cartesian (2-D grid) vertex cut: hosts are
//! factorized into an `R × C` grid, a source's row and a destination's
//! column decide the owning host of each edge, and construction takes two
//! synchronized passes over an out-of-core edge file: an inspection pass
//! exchanging per-column degree vectors and incidence bitsets row-wise,
//! then a loading pass streaming each edge to its owner.
//!
//! ## Usage
//!
//! ```no_run
//! use grid_cut::prelude::*;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), PartitionError> {
//! // One process per host; here a single-host build.
//! let net = NoTransport::new();
//! let part: CartesianPartition<()> =
//!     CartesianPartition::build(Path::new("graph.gr"), &net, CartesianConfig::default())?;
//! for lid in 0..part.num_nodes() {
//!     let _out = part.csr().neighbors(lid);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Multi-host builds run the same call on every host over a shared
//! [`Transport`](comm::Transport); the in-process
//! [`LocalCluster`](comm::LocalCluster) drives one host per thread and is
//! what the integration tests use.
//!
//! ## Edge payloads
//!
//! The partition is generic over a `bytemuck::Pod` edge payload; `()`
//! instantiates the payload-free variant and moves no payload bytes, on
//! disk or on the wire.

pub mod comm;
pub mod error;
pub mod graph;
pub mod partition;

pub use error::PartitionError;

/// The most-used types in one import.
pub mod prelude {
    pub use crate::comm::{LocalCluster, LocalTransport, NoTransport, Transport};
    pub use crate::error::PartitionError;
    pub use crate::graph::{BufferedEdgeReader, LocalCsr, OfflineGraph};
    pub use crate::partition::{
        BlockMap, CartesianConfig, CartesianPartition, Grid, LocalIndexSnapshot, ReadLocation,
        ReplicaTables, StaleFlags, SyncDirection, SyncPolicy, WriteLocation,
    };
}
