//! SpMV executors
//!
//! An executor computes `y = add(y, A ⊗ x)` for a matrix `A`, input vector `x`
//! and accumulator/output vector `y`. Operands are bound with `set_matrix`,
//! `set_input` and `set_output`, and borrowed for the executor's lifetime `'a`;
//! `exec` runs one SpMV step and leaves the result in the bound `y`.
//!
//! Implementations:
//!
//! - [`software::SoftwareExecutor`]: CPU reference, generic over a [`Semiring`](crate::semiring::Semiring)
//! - [`AcceleratorUnit`](crate::accel::AcceleratorUnit): one hardware PE
//! - [`ParallelOrchestrator`](crate::accel::ParallelOrchestrator): many PEs in lock-step

pub mod software;

use crate::dtype::{Element, SparseIndex};
use crate::error::Result;
use crate::sparse::SparseMatrix;

/// Latched cycle count of the most recent REGULAR phase
pub const STAT_CYCLES_REGULAR: &str = "cyclesRegular";

/// Stat keys reported by hardware executors
pub const HARDWARE_STAT_KEYS: &[&str] = &[STAT_CYCLES_REGULAR];

/// Common interface of all SpMV executors
pub trait SpmvExecutor<'a, I: SparseIndex, V: Element> {
    /// Bind the matrix `A`
    fn set_matrix(&mut self, matrix: &'a SparseMatrix<I, V>) -> Result<()>;

    /// Bind the input vector `x` (length at least `A.ncols()`)
    fn set_input(&mut self, x: &'a [V]) -> Result<()>;

    /// Bind the output vector `y` (length at least `A.nrows()`).
    ///
    /// Its current contents seed the accumulation.
    fn set_output(&mut self, y: &'a mut [V]) -> Result<()>;

    /// Execute one SpMV step
    fn exec(&mut self) -> Result<()>;

    /// Look up a named statistic
    fn stat(&self, key: &str) -> Option<u64>;

    /// Names of the statistics this executor reports
    fn stat_keys(&self) -> &'static [&'static str];
}
