//! Host grid geometry for the cartesian cut.
//!
//! `H` real hosts are factorized into an `R × C` grid with `R ≥ C`
//! (unless `more_columns` swaps the orientation), then the row count is
//! multiplied by the decompose factor `D` so the `H·D` virtual hosts tile
//! the same grid. A real host `h` sits at `(h / C, h % C)` and carries
//! the virtual hosts `{h, h + H, …, h + (D-1)·H}`.

use crate::error::PartitionError;

/// Immutable grid parameters shared by every partitioning phase.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Grid {
    num_hosts: usize,
    decompose: usize,
    rows: usize,
    cols: usize,
    more_columns: bool,
    column_blocked: bool,
}

impl Grid {
    pub fn new(
        num_hosts: usize,
        decompose_factor: usize,
        more_columns: bool,
        column_blocked: bool,
    ) -> Result<Self, PartitionError> {
        if num_hosts == 0 {
            return Err(PartitionError::Config("grid needs at least one host".into()));
        }
        if decompose_factor == 0 {
            return Err(PartitionError::Config(
                "decompose factor must be at least 1".into(),
            ));
        }

        let mut cols = (num_hosts as f64).sqrt() as usize;
        while num_hosts % cols != 0 {
            cols -= 1;
        }
        let mut rows = num_hosts / cols;
        debug_assert!(rows >= cols);
        if more_columns {
            std::mem::swap(&mut rows, &mut cols);
        }
        rows *= decompose_factor;

        Ok(Self {
            num_hosts,
            decompose: decompose_factor,
            rows,
            cols,
            more_columns,
            column_blocked,
        })
    }

    pub fn num_hosts(&self) -> usize {
        self.num_hosts
    }

    pub fn decompose_factor(&self) -> usize {
        self.decompose
    }

    /// Number of virtual hosts, `H·D = R·C`.
    pub fn num_virtual(&self) -> usize {
        self.num_hosts * self.decompose
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn column_blocked(&self) -> bool {
        self.column_blocked
    }

    /// Grid row of a (real or virtual) host.
    #[inline]
    pub fn row_of(&self, host: usize) -> usize {
        host / self.cols
    }

    /// Grid column of a (real or virtual) host.
    #[inline]
    pub fn col_of(&self, host: usize) -> usize {
        host % self.cols
    }

    /// Real host carrying a virtual host.
    #[inline]
    pub fn virtual_to_real(&self, virtual_host: usize) -> usize {
        virtual_host % self.num_hosts
    }

    /// Column peer owning edges whose destination lies in block `block`
    /// (`block < H`): contiguous chunks of rows when column-blocked,
    /// round-robin otherwise.
    #[inline]
    pub fn column_peer_of_block(&self, block: usize) -> usize {
        if self.column_blocked {
            block / self.rows
        } else {
            block % self.cols
        }
    }

    /// Whether this grid actually cuts vertices. Degenerate single-row or
    /// single-column grids behave as edge cuts; under `more_columns` the
    /// incoming/outgoing roles are reversed, so only the 1×1 grid is not
    /// a vertex cut.
    pub fn is_vertex_cut(&self) -> bool {
        if self.more_columns {
            !(self.rows == 1 && self.cols == 1)
        } else {
            !(self.rows == 1 || self.cols == 1)
        }
    }
}
