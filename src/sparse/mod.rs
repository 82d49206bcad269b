//! Sparse matrix support for seyrek
//!
//! This module provides the compressed sparse matrix type consumed by the
//! software and hardware executors, its row partitioner, and the matrix
//! store contract used to load matrices by name.
//!
//! # Sparse Orientations
//!
//! - **CSR** (Compressed Sparse Row): the pointer array walks rows. Row
//!   partitions are contiguous slices of the three arrays.
//!
//! - **CSC** (Compressed Sparse Column): the pointer array walks columns.
//!   Row partitions require classifying every nonzero by its row index.
//!
//! # Usage
//!
//! ```
//! use seyrek::sparse::{Orientation, SparseMatrix, SparseStorage};
//!
//! let a = SparseMatrix::<u32, i64>::identity(Orientation::Csr, 8)?;
//! let parts = a.partition(&a.partition_boundaries(2)?)?;
//! assert_eq!(parts[1].starting_row(), 4);
//! assert_eq!(parts[1].nnz(), 4);
//! # Ok::<(), seyrek::error::Error>(())
//! ```

mod format;
mod matrix;
mod metadata;
mod store;

pub use format::{Orientation, SparseStorage};
pub use matrix::SparseMatrix;
pub use metadata::SparseMatrixMetadata;
pub use store::{DirectoryStore, MatrixComponent, MatrixStore, MemoryStore};
