//! Sparse orientation definitions and traits

use serde::{Deserialize, Serialize};

/// Storage orientation of a compressed sparse matrix
///
/// Both orientations use the same three arrays (pointer, index, value); they
/// differ in which dimension the pointer array walks. The orientation is fixed
/// when a matrix is constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Orientation {
    /// Compressed Sparse Row (CSR)
    ///
    /// Row pointers + column indices + values.
    /// Best for: row partitioning, SpMV with a gather over `x`
    /// Storage: O(2 * nnz + nrows + 1)
    Csr,

    /// Compressed Sparse Column (CSC)
    ///
    /// Column pointers + row indices + values.
    /// Best for: SpMV with a scatter into `y`
    /// Storage: O(2 * nnz + ncols + 1)
    Csc,
}

impl Orientation {
    /// Returns true if the pointer array walks rows
    #[inline]
    pub fn is_row_major(&self) -> bool {
        matches!(self, Orientation::Csr)
    }

    /// Returns true if the pointer array walks columns
    #[inline]
    pub fn is_col_major(&self) -> bool {
        matches!(self, Orientation::Csc)
    }

    /// Length of the primary (pointer-indexed) dimension for a `rows x cols` matrix
    #[inline]
    pub fn primary_dim(&self, rows: usize, cols: usize) -> usize {
        match self {
            Orientation::Csr => rows,
            Orientation::Csc => cols,
        }
    }

    /// Length of the secondary (index array) dimension for a `rows x cols` matrix
    #[inline]
    pub fn secondary_dim(&self, rows: usize, cols: usize) -> usize {
        match self {
            Orientation::Csr => cols,
            Orientation::Csc => rows,
        }
    }

    /// Returns the format name as a string
    pub fn name(&self) -> &'static str {
        match self {
            Orientation::Csr => "CSR",
            Orientation::Csc => "CSC",
        }
    }
}

impl std::fmt::Display for Orientation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Trait for compressed sparse storage
///
/// This trait defines the common read-only interface of a sparse matrix,
/// independent of its element types.
pub trait SparseStorage {
    /// Returns the storage orientation
    fn orientation(&self) -> Orientation;

    /// Returns the shape as [nrows, ncols]
    fn shape(&self) -> [usize; 2];

    /// Returns the number of rows
    #[inline]
    fn nrows(&self) -> usize {
        self.shape()[0]
    }

    /// Returns the number of columns
    #[inline]
    fn ncols(&self) -> usize {
        self.shape()[1]
    }

    /// Returns the length of the pointer-indexed dimension
    #[inline]
    fn primary_dim(&self) -> usize {
        let [rows, cols] = self.shape();
        self.orientation().primary_dim(rows, cols)
    }

    /// Returns the number of non-zero elements
    fn nnz(&self) -> usize;

    /// Returns true if rows == cols
    #[inline]
    fn is_square(&self) -> bool {
        self.nrows() == self.ncols()
    }

    /// Returns the density ratio (fraction of non-zeros)
    #[inline]
    fn density(&self) -> f64 {
        let total = (self.nrows() * self.ncols()) as f64;
        if total == 0.0 {
            0.0
        } else {
            self.nnz() as f64 / total
        }
    }

    /// Returns the memory usage of the three arrays in bytes
    fn memory_usage(&self) -> usize;
}
