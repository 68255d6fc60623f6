//! Second pass: route every edge of the local shard to its owner and
//! construct the local CSR.
//!
//! Sources are walked in parallel chunks. An edge whose destination's
//! column peer is this host is constructed in place; anything else is
//! appended to the chunk's per-target outbound buffer. A node's edges for
//! one target are always serialized as a single contiguous run, so the
//! receiver fills the node's whole CSR slot from one message. Buffers
//! flush to the transport when they outgrow [`EDGE_SEND_BUF_BYTES`] and at
//! chunk exit.
//!
//! Receivers run concurrently with the routing pass: each chunk drains
//! whatever has already arrived, and a final loop blocks until every slot
//! counted during layout is complete. The completion counter starts at
//! `num_owned + dummy_outgoing` (the local pass finishes those) and each
//! drained node advances it by one until it reaches the layout's
//! `nodes_with_out_edges`.

use rayon::prelude::*;
use std::sync::atomic::{AtomicU32, Ordering};

use bytemuck::Pod;

use crate::comm::transport::{recv_blocking, Transport};
use crate::comm::wire::{WireReader, WireWriter};
use crate::error::PartitionError;
use crate::graph::buffered::BufferedEdgeReader;
use crate::graph::csr::CsrWriter;
use crate::partition::block_map::BlockMap;
use crate::partition::grid::Grid;
use crate::partition::local_index::LocalIndex;

/// Flush threshold for outbound edge buffers. Opaque to correctness.
pub(crate) const EDGE_SEND_BUF_BYTES: usize = 1 << 20;

/// Sources per parallel work chunk.
const SOURCE_CHUNK: u64 = 256;

pub fn load_edges<E, T>(
    csr: &CsrWriter<E>,
    index: &LocalIndex,
    grid: &Grid,
    block_map: &BlockMap,
    readers: &[BufferedEdgeReader<E>],
    net: &T,
    host: usize,
) -> Result<(), PartitionError>
where
    E: Pod + Send + Sync,
    T: Transport + ?Sized,
{
    let phase = net.phase();
    let cols = grid.cols();
    let row_base = grid.row_of(host) * cols;

    // The local pass finishes every owned and dummy slot; receivers
    // advance the counter once per drained foreign node.
    let completed = AtomicU32::new(index.num_owned + index.dummy_outgoing);

    for (d, reader) in readers.iter().enumerate() {
        let (start, end) = block_map.range_of(host + d * grid.num_hosts());
        let chunks: Vec<(u64, u64)> = (start..end)
            .step_by(SOURCE_CHUNK as usize)
            .map(|s| (s, (s + SOURCE_CHUNK).min(end)))
            .collect();

        chunks
            .par_iter()
            .try_for_each(|&(chunk_begin, chunk_end)| -> Result<(), PartitionError> {
                let mut out_bufs: Vec<WireWriter> = (0..cols).map(|_| WireWriter::new()).collect();
                let mut gdst: Vec<Vec<u64>> = vec![Vec::new(); cols];
                let mut gdata: Vec<Vec<E>> = vec![Vec::new(); cols];

                for src in chunk_begin..chunk_end {
                    let lsrc = index.local_of(src).ok_or_else(|| {
                        PartitionError::invariant(
                            host,
                            phase,
                            format!("owned source {src} missing from the local index"),
                        )
                    })?;
                    let slot = csr.slot(lsrc);
                    let mut cur = slot.start;
                    for v in gdst.iter_mut() {
                        v.clear();
                    }
                    for v in gdata.iter_mut() {
                        v.clear();
                    }

                    for idx in reader.edge_range(src) {
                        let dst = reader.edge_destination(idx);
                        let (peer, _) = block_map.column_slot(dst);
                        if row_base + peer == host {
                            let ldst = index.local_of(dst).ok_or_else(|| {
                                PartitionError::invariant(
                                    host,
                                    phase,
                                    format!("destination {dst} missing from the local index"),
                                )
                            })?;
                            // Sole writer of this node's slot.
                            unsafe {
                                csr.construct_edge(cur, ldst, reader.edge_data(idx));
                            }
                            cur += 1;
                        } else {
                            gdst[peer].push(dst);
                            gdata[peer].push(reader.edge_data(idx));
                        }
                    }

                    if cur != slot.end {
                        return Err(PartitionError::invariant(
                            host,
                            phase,
                            format!(
                                "source {src}: constructed {} local edges into a slot of {}",
                                cur - slot.start,
                                slot.end - slot.start
                            ),
                        ));
                    }

                    for peer in 0..cols {
                        if gdst[peer].is_empty() {
                            continue;
                        }
                        let buf = &mut out_bufs[peer];
                        buf.push_u64(src);
                        buf.push_u64_slice(&gdst[peer]);
                        buf.push_pod_slice(&gdata[peer]);
                        if buf.len() > EDGE_SEND_BUF_BYTES {
                            net.send(row_base + peer, phase, buf.take());
                        }
                    }
                }

                for (peer, buf) in out_bufs.iter_mut().enumerate() {
                    if !buf.is_empty() {
                        net.send(row_base + peer, phase, buf.take());
                    }
                }

                // Drain anything already delivered so a bounded transport
                // never stalls the senders. Each foreign node lives in
                // exactly one buffer, so concurrent drains write disjoint
                // slots.
                while let Some((sender, bytes)) = net.recv_tagged(phase) {
                    completed.fetch_add(
                        drain_buffer::<E>(csr, index, grid, sender, &bytes, host, phase)?,
                        Ordering::Relaxed,
                    );
                }
                Ok(())
            })?;
    }
    net.flush();

    // Block until every slot counted during layout is full.
    while completed.load(Ordering::Relaxed) < index.nodes_with_out_edges {
        let (sender, bytes) = recv_blocking(net, phase);
        completed.fetch_add(
            drain_buffer::<E>(csr, index, grid, sender, &bytes, host, phase)?,
            Ordering::Relaxed,
        );
    }

    net.increment_phase();
    Ok(())
}

/// Validate the sender and construct one received buffer.
fn drain_buffer<E: Pod + Send + Sync>(
    csr: &CsrWriter<E>,
    index: &LocalIndex,
    grid: &Grid,
    sender: usize,
    bytes: &[u8],
    host: usize,
    phase: u32,
) -> Result<u32, PartitionError> {
    if sender >= grid.num_hosts() || grid.row_of(sender) != grid.row_of(host) {
        return Err(PartitionError::protocol(
            host,
            phase,
            format!("edge buffer from host {sender}, which is not a row peer"),
        ));
    }
    construct_received::<E>(csr, index, bytes, host, phase)
}

/// Construct every node chunk in one received buffer; returns the number
/// of nodes completed.
fn construct_received<E: Pod + Send + Sync>(
    csr: &CsrWriter<E>,
    index: &LocalIndex,
    bytes: &[u8],
    host: usize,
    phase: u32,
) -> Result<u32, PartitionError> {
    let mut drained = 0u32;
    let mut r = WireReader::new(bytes);
    while !r.is_empty() {
        let src = r
            .read_u64()
            .map_err(|e| PartitionError::protocol(host, phase, e.to_string()))?;
        let dsts = r
            .read_u64_vec()
            .map_err(|e| PartitionError::protocol(host, phase, e.to_string()))?;
        let data: Vec<E> = r
            .read_pod_vec(dsts.len())
            .map_err(|e| PartitionError::protocol(host, phase, e.to_string()))?;

        let lsrc = index.local_of(src).ok_or_else(|| {
            PartitionError::invariant(
                host,
                phase,
                format!("received edges for source {src}, which is not local"),
            )
        })?;
        let slot = csr.slot(lsrc);
        if dsts.len() as u64 != slot.end - slot.start {
            return Err(PartitionError::invariant(
                host,
                phase,
                format!(
                    "source {src}: received {} edges for a slot of {}",
                    dsts.len(),
                    slot.end - slot.start
                ),
            ));
        }

        for (j, (&dst, &payload)) in dsts.iter().zip(data.iter()).enumerate() {
            let ldst = index.local_of(dst).ok_or_else(|| {
                PartitionError::invariant(
                    host,
                    phase,
                    format!("received destination {dst} missing from the local index"),
                )
            })?;
            // Sole writer of this node's slot.
            unsafe {
                csr.construct_edge(slot.start + j as u64, ldst, payload);
            }
        }
        drained += 1;
    }
    Ok(drained)
}
