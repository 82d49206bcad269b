//! Compressed sparse matrices (CSR and CSC)

mod core;
mod partition;

pub use core::SparseMatrix;
