//! Software SpMV over semirings
//!
//! The traversal follows the matrix's native storage order: CSR folds each
//! row's nonzeros into `y[row]` (a gather over `x`), CSC scatters each
//! column's nonzeros into `y[row]`. Both accumulate into the existing
//! contents of `y` rather than resetting it to the semiring's zero.

use super::SpmvExecutor;
use crate::dtype::{Element, SparseIndex};
use crate::error::{Error, Result};
use crate::semiring::Semiring;
use crate::sparse::{Orientation, SparseMatrix, SparseStorage};

fn check_operands<I: SparseIndex, V: Element>(
    matrix: &SparseMatrix<I, V>,
    x: &[V],
    y: &[V],
) -> Result<()> {
    if x.len() < matrix.ncols() {
        return Err(Error::ShapeMismatch {
            what: "input vector",
            expected: matrix.ncols(),
            got: x.len(),
        });
    }
    if y.len() < matrix.nrows() {
        return Err(Error::ShapeMismatch {
            what: "output vector",
            expected: matrix.nrows(),
            got: y.len(),
        });
    }
    Ok(())
}

/// Row-order SpMV: `y[row] = fold(add, y[row], mul(a, x[col]))`
pub fn spmv_csr<I, V, S>(semiring: &S, matrix: &SparseMatrix<I, V>, x: &[V], y: &mut [V]) -> Result<()>
where
    I: SparseIndex,
    V: Element,
    S: Semiring<V> + ?Sized,
{
    if matrix.orientation() != Orientation::Csr {
        return Err(Error::invalid_argument("matrix", "spmv_csr requires a CSR matrix"));
    }
    check_operands(matrix, x, y)?;

    let cols = matrix.indices();
    let values = matrix.values();
    for (row, out) in y.iter_mut().take(matrix.nrows()).enumerate() {
        let mut acc = *out;
        for ep in matrix.primary_range(row) {
            let col = cols[ep].index();
            let prod = semiring.mul(values[ep], x[col], row, col);
            acc = semiring.add(acc, prod, row, col);
        }
        *out = acc;
    }
    Ok(())
}

/// Column-order SpMV: for every nonzero, `y[row] = add(y[row], mul(a, x[col]))`
pub fn spmv_csc<I, V, S>(semiring: &S, matrix: &SparseMatrix<I, V>, x: &[V], y: &mut [V]) -> Result<()>
where
    I: SparseIndex,
    V: Element,
    S: Semiring<V> + ?Sized,
{
    if matrix.orientation() != Orientation::Csc {
        return Err(Error::invalid_argument("matrix", "spmv_csc requires a CSC matrix"));
    }
    check_operands(matrix, x, y)?;

    let rows = matrix.indices();
    let values = matrix.values();
    for (col, &xv) in x.iter().take(matrix.ncols()).enumerate() {
        for ep in matrix.primary_range(col) {
            let row = rows[ep].index();
            let prod = semiring.mul(values[ep], xv, row, col);
            y[row] = semiring.add(y[row], prod, row, col);
        }
    }
    Ok(())
}

/// Single-threaded CPU SpMV executor
///
/// Holds its semiring as a capability and dispatches to [`spmv_csr`] or
/// [`spmv_csc`] according to the bound matrix's orientation.
///
/// # Example
///
/// ```
/// use seyrek::executor::{software::SoftwareExecutor, SpmvExecutor};
/// use seyrek::semiring::AddMulSemiring;
/// use seyrek::sparse::{Orientation, SparseMatrix};
///
/// let a = SparseMatrix::<u32, i64>::identity(Orientation::Csr, 3)?;
/// let x = [10, 20, 30];
/// let mut y = [0; 3];
/// {
///     let mut exec = SoftwareExecutor::new(AddMulSemiring);
///     exec.set_matrix(&a)?;
///     exec.set_input(&x)?;
///     exec.set_output(&mut y)?;
///     exec.exec()?;
/// }
/// assert_eq!(y, [10, 20, 30]);
/// # Ok::<(), seyrek::error::Error>(())
/// ```
pub struct SoftwareExecutor<'a, I: SparseIndex, V: Element, S: Semiring<V>> {
    semiring: S,
    matrix: Option<&'a SparseMatrix<I, V>>,
    x: Option<&'a [V]>,
    y: Option<&'a mut [V]>,
}

impl<'a, I: SparseIndex, V: Element, S: Semiring<V>> SoftwareExecutor<'a, I, V, S> {
    /// Create an executor with nothing bound
    pub fn new(semiring: S) -> Self {
        Self {
            semiring,
            matrix: None,
            x: None,
            y: None,
        }
    }

    /// Returns the semiring in use
    pub fn semiring(&self) -> &S {
        &self.semiring
    }

    /// Release the bound output vector, if any
    pub fn take_output(&mut self) -> Option<&'a mut [V]> {
        self.y.take()
    }
}

impl<'a, I: SparseIndex, V: Element, S: Semiring<V>> SpmvExecutor<'a, I, V>
    for SoftwareExecutor<'a, I, V, S>
{
    fn set_matrix(&mut self, matrix: &'a SparseMatrix<I, V>) -> Result<()> {
        self.matrix = Some(matrix);
        Ok(())
    }

    fn set_input(&mut self, x: &'a [V]) -> Result<()> {
        self.x = Some(x);
        Ok(())
    }

    fn set_output(&mut self, y: &'a mut [V]) -> Result<()> {
        self.y = Some(y);
        Ok(())
    }

    fn exec(&mut self) -> Result<()> {
        let (Some(matrix), Some(x), Some(y)) = (self.matrix, self.x, self.y.as_deref_mut()) else {
            return Err(Error::precondition(
                "exec",
                "matrix, input and output must all be assigned",
            ));
        };
        match matrix.orientation() {
            Orientation::Csr => spmv_csr(&self.semiring, matrix, x, y),
            Orientation::Csc => spmv_csc(&self.semiring, matrix, x, y),
        }
    }

    fn stat(&self, _key: &str) -> Option<u64> {
        None
    }

    fn stat_keys(&self) -> &'static [&'static str] {
        &[]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semiring::{AddMulSemiring, MinPlusSemiring};

    #[test]
    fn test_spmv_csr_basic() {
        // Matrix:
        // [1, 0, 2]
        // [0, 0, 3]
        // [4, 5, 0]
        let a = SparseMatrix::<u32, f32>::from_parts(
            Orientation::Csr,
            [3, 3],
            vec![0, 2, 3, 5],
            vec![0, 2, 2, 0, 1],
            vec![1.0, 2.0, 3.0, 4.0, 5.0],
        )
        .unwrap();
        let x = [1.0f32, 2.0, 3.0];
        let mut y = [0.0f32; 3];

        // y[0] = 1*1 + 2*3 = 7
        // y[1] = 3*3 = 9
        // y[2] = 4*1 + 5*2 = 14
        spmv_csr(&AddMulSemiring, &a, &x, &mut y).unwrap();
        assert_eq!(y, [7.0, 9.0, 14.0]);
    }

    #[test]
    fn test_spmv_csc_matches_csr() {
        // Same matrix as above, column-major
        let a = SparseMatrix::<u32, f32>::from_parts(
            Orientation::Csc,
            [3, 3],
            vec![0, 2, 3, 5],
            vec![0, 2, 2, 0, 1],
            vec![1.0, 4.0, 5.0, 2.0, 3.0],
        )
        .unwrap();
        let x = [1.0f32, 2.0, 3.0];
        let mut y = [0.0f32; 3];
        spmv_csc(&AddMulSemiring, &a, &x, &mut y).unwrap();
        assert_eq!(y, [7.0, 9.0, 14.0]);
    }

    #[test]
    fn test_accumulates_into_seed() {
        let a = SparseMatrix::<u32, i64>::identity(Orientation::Csr, 3).unwrap();
        let mut y = [100i64, 200, 300];
        spmv_csr(&AddMulSemiring, &a, &[1, 2, 3], &mut y).unwrap();
        assert_eq!(y, [101, 202, 303]);
    }

    #[test]
    fn test_min_plus_relaxation() {
        // Edge weights: 0->1 = 4, 0->2 = 1, 2->1 = 2 (stored as A[dst][src])
        let a = SparseMatrix::<u32, u32>::from_parts(
            Orientation::Csr,
            [3, 3],
            vec![0, 0, 2, 3],
            vec![0, 2, 0],
            vec![4, 2, 1],
        )
        .unwrap();
        let dist = [0u32, u32::MAX, 1];
        let mut next = dist;
        spmv_csr(&MinPlusSemiring, &a, &dist, &mut next).unwrap();
        // 1 is reached through 2 for 1 + 2 = 3
        assert_eq!(next, [0, 3, 1]);
    }

    #[test]
    fn test_integer_overflow_wraps() {
        let a = SparseMatrix::<u32, i32>::identity(Orientation::Csr, 1).unwrap();
        let mut y = [i32::MAX];
        spmv_csr(&AddMulSemiring, &a, &[1], &mut y).unwrap();
        assert_eq!(y, [i32::MIN]);
    }

    #[test]
    fn test_orientation_guard() {
        let a = SparseMatrix::<u32, i64>::identity(Orientation::Csc, 2).unwrap();
        let mut y = [0i64; 2];
        assert!(spmv_csr(&AddMulSemiring, &a, &[1, 1], &mut y).is_err());
    }

    #[test]
    fn test_short_vectors_rejected() {
        let a = SparseMatrix::<u32, i64>::identity(Orientation::Csr, 3).unwrap();
        let mut y = [0i64; 3];
        let err = spmv_csr(&AddMulSemiring, &a, &[1, 1], &mut y).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { what: "input vector", .. }));
    }

    #[test]
    fn test_exec_requires_all_operands() {
        let a = SparseMatrix::<u32, i64>::identity(Orientation::Csr, 2).unwrap();
        let x = [1i64, 2];
        let mut exec = SoftwareExecutor::new(AddMulSemiring);
        exec.set_matrix(&a).unwrap();
        exec.set_input(&x).unwrap();
        let err = exec.exec().unwrap_err();
        assert!(matches!(err, Error::PreconditionViolation { .. }));
    }

    #[test]
    fn test_take_output() {
        let a = SparseMatrix::<u32, i64>::identity(Orientation::Csc, 2).unwrap();
        let x = [5i64, 6];
        let mut y = [0i64; 2];
        let mut exec = SoftwareExecutor::new(AddMulSemiring);
        exec.set_matrix(&a).unwrap();
        exec.set_input(&x).unwrap();
        exec.set_output(&mut y).unwrap();
        exec.exec().unwrap();
        let out = exec.take_output().unwrap();
        assert_eq!(out, &[5, 6]);
    }
}
