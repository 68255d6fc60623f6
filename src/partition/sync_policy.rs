//! Communication-partner predicates for per-superstep synchronization.
//!
//! For a reduce, mirrors push to masters; for a broadcast, masters push
//! to mirrors. On a cartesian grid the partner set is structural: writes
//! at sources travel within the grid row, writes at destinations within
//! the grid column, and a transposed graph flips the two. Checkerboard
//! grids do not align with block boundaries, so they conservatively
//! answer may-communicate whenever any shared nodes exist.
//!
//! Required symmetry, relied on by the runtime: for all hosts X and Y,
//! `X.nothing_to_send(Y, …) ⇔ Y.nothing_to_recv(X, …)`.

use crate::partition::grid::Grid;
use crate::partition::replicas::ReplicaTables;

/// Direction of a synchronization round.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncDirection {
    /// Mirrors reduce into masters.
    Reduce,
    /// Masters broadcast to mirrors.
    Broadcast,
}

/// Where the superstep wrote node state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteLocation {
    Source,
    Destination,
    Any,
}

/// Where the next superstep reads node state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadLocation {
    Source,
    Destination,
    Any,
}

/// Validity tracking mutated as a side effect of broadcast queries: the
/// caller learns that its source- or destination-side copies go stale.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StaleFlags {
    pub src_invalid: bool,
    pub dst_invalid: bool,
}

/// Pure view over the grid and this host's replica tables.
pub struct SyncPolicy<'a> {
    grid: &'a Grid,
    replicas: &'a ReplicaTables,
    host: usize,
    transposed: bool,
}

impl<'a> SyncPolicy<'a> {
    pub fn new(
        grid: &'a Grid,
        replicas: &'a ReplicaTables,
        host: usize,
        transposed: bool,
    ) -> Self {
        Self {
            grid,
            replicas,
            host,
            transposed,
        }
    }

    /// True iff this host has nothing to send `peer` for the given round.
    pub fn nothing_to_send(
        &self,
        peer: usize,
        direction: SyncDirection,
        write: WriteLocation,
        read: ReadLocation,
        flags: Option<&mut StaleFlags>,
    ) -> bool {
        let shared = match direction {
            SyncDirection::Reduce => &self.replicas.mirror_nodes,
            SyncDirection::Broadcast => &self.replicas.master_nodes,
        };
        self.nothing_shared(shared, peer, direction, write, read, flags)
    }

    /// True iff this host will receive nothing from `peer`. The selector
    /// is the mirror image of [`nothing_to_send`].
    pub fn nothing_to_recv(
        &self,
        peer: usize,
        direction: SyncDirection,
        write: WriteLocation,
        read: ReadLocation,
        flags: Option<&mut StaleFlags>,
    ) -> bool {
        let shared = match direction {
            SyncDirection::Reduce => &self.replicas.master_nodes,
            SyncDirection::Broadcast => &self.replicas.mirror_nodes,
        };
        self.nothing_shared(shared, peer, direction, write, read, flags)
    }

    fn nothing_shared(
        &self,
        shared: &[Vec<u64>],
        peer: usize,
        direction: SyncDirection,
        write: WriteLocation,
        read: ReadLocation,
        flags: Option<&mut StaleFlags>,
    ) -> bool {
        if shared[peer].is_empty() {
            return true;
        }
        if self.grid.column_blocked() {
            // Checkerboard blocks do not match the processor grid.
            return false;
        }
        self.is_not_partner(peer, direction, write, read, flags)
    }

    fn is_not_partner(
        &self,
        peer: usize,
        direction: SyncDirection,
        write: WriteLocation,
        read: ReadLocation,
        flags: Option<&mut StaleFlags>,
    ) -> bool {
        let same_row = self.grid.row_of(self.host) == self.grid.row_of(peer);
        let same_col = self.grid.col_of(self.host) == self.grid.col_of(peer);
        // Transposed graphs swap the row/column roles.
        let (source_axis, destination_axis) = if self.transposed {
            (same_col, same_row)
        } else {
            (same_row, same_col)
        };

        match direction {
            SyncDirection::Reduce => match write {
                WriteLocation::Source => !source_axis,
                WriteLocation::Destination => !destination_axis,
                WriteLocation::Any => {
                    debug_assert!(same_row || same_col);
                    !same_row && !same_col
                }
            },
            SyncDirection::Broadcast => match read {
                ReadLocation::Source => {
                    if let Some(f) = flags {
                        if self.transposed {
                            f.src_invalid = true;
                        } else {
                            f.dst_invalid = true;
                        }
                    }
                    !source_axis
                }
                ReadLocation::Destination => {
                    if let Some(f) = flags {
                        if self.transposed {
                            f.dst_invalid = true;
                        } else {
                            f.src_invalid = true;
                        }
                    }
                    !destination_axis
                }
                ReadLocation::Any => {
                    debug_assert!(same_row || same_col);
                    !same_row && !same_col
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tables(num_hosts: usize, shared_with: &[usize]) -> ReplicaTables {
        let mut t = ReplicaTables {
            mirror_nodes: vec![Vec::new(); num_hosts],
            master_nodes: vec![Vec::new(); num_hosts],
        };
        for &h in shared_with {
            t.mirror_nodes[h].push(1);
            t.master_nodes[h].push(2);
        }
        t
    }

    #[test]
    fn empty_shared_lists_short_circuit() {
        let grid = Grid::new(4, 1, false, false).unwrap();
        let t = tables(4, &[]);
        let p = SyncPolicy::new(&grid, &t, 0, false);
        assert!(p.nothing_to_send(1, SyncDirection::Reduce, WriteLocation::Source, ReadLocation::Any, None));
        assert!(p.nothing_to_recv(2, SyncDirection::Broadcast, WriteLocation::Any, ReadLocation::Source, None));
    }

    #[test]
    fn grid_table_non_transposed() {
        // 2x2 grid: host 0 shares a row with 1 and a column with 2.
        let grid = Grid::new(4, 1, false, false).unwrap();
        let t = tables(4, &[1, 2, 3]);
        let p = SyncPolicy::new(&grid, &t, 0, false);

        use ReadLocation as R;
        use SyncDirection::*;
        use WriteLocation as W;

        // Reduce at sources: row partners only.
        assert!(!p.nothing_to_send(1, Reduce, W::Source, R::Any, None));
        assert!(p.nothing_to_send(2, Reduce, W::Source, R::Any, None));
        // Reduce at destinations: column partners only.
        assert!(p.nothing_to_send(1, Reduce, W::Destination, R::Any, None));
        assert!(!p.nothing_to_send(2, Reduce, W::Destination, R::Any, None));
        // Broadcast read at sources: row partners only.
        assert!(!p.nothing_to_send(1, Broadcast, W::Any, R::Source, None));
        assert!(p.nothing_to_send(2, Broadcast, W::Any, R::Source, None));
    }

    #[test]
    fn transposed_flips_axes() {
        let grid = Grid::new(4, 1, false, false).unwrap();
        let t = tables(4, &[1, 2]);
        let p = SyncPolicy::new(&grid, &t, 0, true);

        use ReadLocation as R;
        use SyncDirection::*;
        use WriteLocation as W;

        // Reduce at sources now follows columns.
        assert!(p.nothing_to_send(1, Reduce, W::Source, R::Any, None));
        assert!(!p.nothing_to_send(2, Reduce, W::Source, R::Any, None));
    }

    #[test]
    fn broadcast_marks_stale_copies() {
        let grid = Grid::new(4, 1, false, false).unwrap();
        let t = tables(4, &[1]);
        let p = SyncPolicy::new(&grid, &t, 0, false);

        let mut flags = StaleFlags::default();
        p.nothing_to_send(
            1,
            SyncDirection::Broadcast,
            WriteLocation::Any,
            ReadLocation::Source,
            Some(&mut flags),
        );
        assert!(flags.dst_invalid && !flags.src_invalid);

        let mut flags = StaleFlags::default();
        p.nothing_to_send(
            1,
            SyncDirection::Broadcast,
            WriteLocation::Any,
            ReadLocation::Destination,
            Some(&mut flags),
        );
        assert!(flags.src_invalid && !flags.dst_invalid);
    }

    #[test]
    fn checkerboard_is_conservative() {
        let grid = Grid::new(4, 1, false, true).unwrap();
        let t = tables(4, &[2]);
        let p = SyncPolicy::new(&grid, &t, 0, false);
        // Shared nodes exist, so the answer is always may-communicate.
        assert!(!p.nothing_to_send(
            2,
            SyncDirection::Reduce,
            WriteLocation::Source,
            ReadLocation::Any,
            None
        ));
    }
}
