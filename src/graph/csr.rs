//! Local CSR storage for the partitioned subgraph.
//!
//! The edge loader fills edge slots from several threads at once, but
//! every local node's slot is completed by exactly one writer: either
//! the thread routing this host's own shard or the thread draining the
//! receive buffer that carries the node. [`CsrWriter`] exposes that
//! contract as an `unsafe` write; [`LocalCsr`] is the frozen, immutable
//! result handed to the computation runtime.

use std::cell::UnsafeCell;

use bytemuck::Pod;

/// Build-time CSR: node offsets fixed up front, edge slots written
/// concurrently at disjoint positions.
pub struct CsrWriter<E: Pod> {
    offsets: Box<[u64]>,
    dsts: Box<[UnsafeCell<u32>]>,
    data: Box<[UnsafeCell<E>]>,
}

// Writes target disjoint indices (one writer per node slot); see module
// docs. The cells themselves are plain Pod values.
unsafe impl<E: Pod + Send + Sync> Sync for CsrWriter<E> {}

impl<E: Pod + Send + Sync> CsrWriter<E> {
    /// Allocate a CSR with the given node-offset prefix (length
    /// `num_nodes + 1`, leading zero, last entry = `num_edges`).
    pub fn allocate(offsets: Vec<u64>) -> Self {
        debug_assert!(!offsets.is_empty() && offsets[0] == 0);
        let num_edges = *offsets.last().expect("non-empty offsets") as usize;
        let dsts = (0..num_edges).map(|_| UnsafeCell::new(0u32)).collect();
        let data = (0..num_edges)
            .map(|_| UnsafeCell::new(E::zeroed()))
            .collect();
        Self {
            offsets: offsets.into_boxed_slice(),
            dsts,
            data,
        }
    }

    pub fn num_nodes(&self) -> u32 {
        (self.offsets.len() - 1) as u32
    }

    pub fn num_edges(&self) -> u64 {
        *self.offsets.last().expect("non-empty offsets")
    }

    /// Edge-slot range of local node `lid`.
    #[inline]
    pub fn slot(&self, lid: u32) -> std::ops::Range<u64> {
        self.offsets[lid as usize]..self.offsets[lid as usize + 1]
    }

    /// Construct the edge at position `cur`.
    ///
    /// # Safety
    /// `cur` must lie inside the slot of a node this thread is the sole
    /// writer for, and no other thread may read the slot until the writer
    /// is frozen.
    #[inline]
    pub unsafe fn construct_edge(&self, cur: u64, ldst: u32, payload: E) {
        debug_assert!(cur < self.num_edges());
        unsafe {
            *self.dsts[cur as usize].get() = ldst;
            *self.data[cur as usize].get() = payload;
        }
    }

    /// Freeze into the immutable CSR once every slot is complete.
    pub fn freeze(self) -> LocalCsr<E> {
        // UnsafeCell<T> is repr(transparent) over T and this writer owns
        // the allocation exclusively, so the box can be reinterpreted.
        let dsts = unsafe {
            Box::from_raw(Box::into_raw(self.dsts) as *mut [u32])
        };
        let data = unsafe {
            Box::from_raw(Box::into_raw(self.data) as *mut [E])
        };
        LocalCsr {
            offsets: self.offsets,
            dsts,
            data,
        }
    }
}

/// Immutable local CSR: `num_nodes` renumbered nodes, `num_edges` edges,
/// optional per-edge payload.
#[derive(Debug)]
pub struct LocalCsr<E: Pod> {
    offsets: Box<[u64]>,
    dsts: Box<[u32]>,
    data: Box<[E]>,
}

impl<E: Pod> LocalCsr<E> {
    pub fn num_nodes(&self) -> u32 {
        (self.offsets.len() - 1) as u32
    }

    pub fn num_edges(&self) -> u64 {
        *self.offsets.last().expect("non-empty offsets")
    }

    #[inline]
    pub fn edge_begin(&self, lid: u32) -> u64 {
        self.offsets[lid as usize]
    }

    #[inline]
    pub fn edge_end(&self, lid: u32) -> u64 {
        self.offsets[lid as usize + 1]
    }

    #[inline]
    pub fn degree(&self, lid: u32) -> usize {
        (self.edge_end(lid) - self.edge_begin(lid)) as usize
    }

    /// Local destination ids of `lid`'s out-edges.
    #[inline]
    pub fn neighbors(&self, lid: u32) -> &[u32] {
        &self.dsts[self.edge_begin(lid) as usize..self.edge_end(lid) as usize]
    }

    /// Payloads of `lid`'s out-edges (empty slice for unit payloads).
    #[inline]
    pub fn edge_data(&self, lid: u32) -> &[E] {
        if std::mem::size_of::<E>() == 0 {
            &[]
        } else {
            &self.data[self.edge_begin(lid) as usize..self.edge_end(lid) as usize]
        }
    }

    /// Node-offset prefix, length `num_nodes + 1`.
    pub fn offsets(&self) -> &[u64] {
        &self.offsets
    }

    /// Flat destination array, for byte-level comparisons.
    pub fn dsts(&self) -> &[u32] {
        &self.dsts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_and_freeze() {
        let w = CsrWriter::<u64>::allocate(vec![0, 2, 2, 3]);
        assert_eq!(w.num_nodes(), 3);
        assert_eq!(w.num_edges(), 3);
        assert_eq!(w.slot(0), 0..2);
        unsafe {
            w.construct_edge(0, 1, 100);
            w.construct_edge(1, 2, 101);
            w.construct_edge(2, 0, 102);
        }
        let csr = w.freeze();
        assert_eq!(csr.neighbors(0), &[1, 2]);
        assert_eq!(csr.edge_data(0), &[100, 101]);
        assert_eq!(csr.neighbors(1), &[] as &[u32]);
        assert_eq!(csr.neighbors(2), &[0]);
        assert_eq!(csr.degree(2), 1);
    }

    #[test]
    fn unit_payload_has_no_data() {
        let w = CsrWriter::<()>::allocate(vec![0, 1]);
        unsafe {
            w.construct_edge(0, 0, ());
        }
        let csr = w.freeze();
        assert_eq!(csr.edge_data(0), &[] as &[()]);
        assert_eq!(csr.neighbors(0), &[0]);
    }
}
