//! Buffered window over the global edge file.
//!
//! Each host loads the offset/destination/payload window covering its own
//! contiguous gid ranges once, then both partition passes iterate it from
//! memory. Edge indices are global (file-wide), matching the on-disk
//! prefix sums.

use bytemuck::Pod;

use crate::graph::file::{OfflineGraph, HEADER_BYTES};

/// In-memory window `[node_begin, node_end)` of the global graph.
pub struct BufferedEdgeReader<E: Pod> {
    node_begin: u64,
    node_end: u64,
    /// Global index of the first loaded edge.
    edge_begin: u64,
    /// Node-end offsets for the window (global edge indices).
    offsets: Vec<u64>,
    dsts: Vec<u64>,
    data: Vec<E>,
    bytes_read: u64,
}

impl<E: Pod> BufferedEdgeReader<E> {
    /// Load the window for `[node_begin, node_end)` from `graph`.
    pub fn load(
        graph: &mut OfflineGraph,
        node_begin: u64,
        node_end: u64,
    ) -> std::io::Result<Self> {
        debug_assert!(node_begin <= node_end && node_end <= graph.size());
        let num_nodes = (node_end - node_begin) as usize;
        let edge_begin = graph.edge_begin_of(node_begin)?;
        let edge_end = if num_nodes == 0 {
            edge_begin
        } else {
            graph.edge_end_of(node_end - 1)?
        };
        let num_edges = (edge_end - edge_begin) as usize;

        let mut bytes_read = 0u64;

        let mut offsets = vec![0u64; num_nodes];
        if num_nodes > 0 {
            let mut raw = vec![0u8; num_nodes * 8];
            graph.read_exact_at(HEADER_BYTES + node_begin * 8, &mut raw)?;
            bytes_read += raw.len() as u64;
            for (o, chunk) in offsets.iter_mut().zip(raw.chunks_exact(8)) {
                *o = u64::from_le_bytes(chunk.try_into().expect("8 bytes"));
            }
        }

        let dst_base = HEADER_BYTES + graph.size() * 8;
        let mut dsts = vec![0u64; num_edges];
        if num_edges > 0 {
            let mut raw = vec![0u8; num_edges * 8];
            graph.read_exact_at(dst_base + edge_begin * 8, &mut raw)?;
            bytes_read += raw.len() as u64;
            for (d, chunk) in dsts.iter_mut().zip(raw.chunks_exact(8)) {
                *d = u64::from_le_bytes(chunk.try_into().expect("8 bytes"));
            }
        }

        let payload_size = std::mem::size_of::<E>();
        let mut data = vec![E::zeroed(); if payload_size > 0 { num_edges } else { 0 }];
        if payload_size > 0 && num_edges > 0 {
            let payload_base = dst_base + graph.size_edges() * 8;
            let raw: &mut [u8] = bytemuck::cast_slice_mut(&mut data);
            graph.read_exact_at(payload_base + edge_begin * payload_size as u64, raw)?;
            bytes_read += raw.len() as u64;
        }

        Ok(Self {
            node_begin,
            node_end,
            edge_begin,
            offsets,
            dsts,
            data,
            bytes_read,
        })
    }

    /// First gid of the window.
    pub fn node_begin(&self) -> u64 {
        self.node_begin
    }

    /// One past the last gid of the window.
    pub fn node_end(&self) -> u64 {
        self.node_end
    }

    /// Global edge-index range of `gid`'s out-edges.
    #[inline]
    pub fn edge_range(&self, gid: u64) -> std::ops::Range<u64> {
        debug_assert!(gid >= self.node_begin && gid < self.node_end);
        let i = (gid - self.node_begin) as usize;
        let begin = if i == 0 {
            self.edge_begin
        } else {
            self.offsets[i - 1]
        };
        begin..self.offsets[i]
    }

    /// Destination of the edge at global index `idx`.
    #[inline]
    pub fn edge_destination(&self, idx: u64) -> u64 {
        self.dsts[(idx - self.edge_begin) as usize]
    }

    /// Payload of the edge at global index `idx`.
    #[inline]
    pub fn edge_data(&self, idx: u64) -> E {
        if std::mem::size_of::<E>() == 0 {
            E::zeroed()
        } else {
            self.data[(idx - self.edge_begin) as usize]
        }
    }

    /// Bytes pulled from disk while loading this window.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }
}
