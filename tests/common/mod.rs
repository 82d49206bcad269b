//! Common test utilities
#![allow(dead_code)]

use seyrek::executor::software::SoftwareExecutor;
use seyrek::executor::SpmvExecutor;
use seyrek::semiring::AddMulSemiring;
use seyrek::sparse::{Orientation, SparseMatrix};

/// Build a matrix from `(row, col, value)` triplets in either orientation
///
/// Triplets may be given in any order; duplicates are kept as separate nonzeros.
pub fn from_triplets(
    orientation: Orientation,
    rows: usize,
    cols: usize,
    triplets: &[(usize, usize, i64)],
) -> SparseMatrix<u32, i64> {
    let primary = orientation.primary_dim(rows, cols);
    let mut sorted: Vec<(usize, usize, i64)> = triplets
        .iter()
        .map(|&(r, c, v)| match orientation {
            Orientation::Csr => (r, c, v),
            Orientation::Csc => (c, r, v),
        })
        .collect();
    sorted.sort_by_key(|&(p, s, _)| (p, s));

    let mut pointers = vec![0u32; primary + 1];
    for &(p, _, _) in &sorted {
        pointers[p + 1] += 1;
    }
    for i in 0..primary {
        pointers[i + 1] += pointers[i];
    }
    let indices = sorted.iter().map(|&(_, s, _)| s as u32).collect();
    let values = sorted.iter().map(|&(_, _, v)| v).collect();

    SparseMatrix::from_parts(orientation, [rows, cols], pointers, indices, values)
        .expect("triplets out of range")
}

/// Deterministic pseudo-random matrix with roughly `density` fill
pub fn pattern_matrix(
    orientation: Orientation,
    rows: usize,
    cols: usize,
    density: f64,
    seed: u64,
) -> SparseMatrix<u32, i64> {
    let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    let mut next = move || {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        state
    };

    let threshold = (density * 1000.0) as u64;
    let mut triplets = Vec::new();
    for r in 0..rows {
        for c in 0..cols {
            if next() % 1000 < threshold {
                let v = (next() % 19) as i64 - 9;
                triplets.push((r, c, v));
            }
        }
    }
    from_triplets(orientation, rows, cols, &triplets)
}

/// The 5x4 matrix used across partitioning tests
///
/// ```text
/// [1 0 2 0]
/// [0 0 0 0]
/// [0 3 0 4]
/// [5 0 0 0]
/// [0 6 7 8]
/// ```
pub fn sample_matrix(orientation: Orientation) -> SparseMatrix<u32, i64> {
    from_triplets(
        orientation,
        5,
        4,
        &[
            (0, 0, 1),
            (0, 2, 2),
            (2, 1, 3),
            (2, 3, 4),
            (3, 0, 5),
            (4, 1, 6),
            (4, 2, 7),
            (4, 3, 8),
        ],
    )
}

/// Input vector `[1, 2, ..., n]`
pub fn ramp(n: usize) -> Vec<i64> {
    (1..=n as i64).collect()
}

/// Reference `y + A x` computed with the software executor
pub fn reference_spmv(matrix: &SparseMatrix<u32, i64>, x: &[i64], seed: &[i64]) -> Vec<i64> {
    let mut y = seed.to_vec();
    {
        let mut exec = SoftwareExecutor::new(AddMulSemiring);
        exec.set_matrix(matrix).unwrap();
        exec.set_input(x).unwrap();
        exec.set_output(&mut y).unwrap();
        exec.exec().unwrap();
    }
    y
}

/// Dense `y + A x` straight from the triplet view, independent of any executor
pub fn dense_spmv(matrix: &SparseMatrix<u32, i64>, x: &[i64], seed: &[i64]) -> Vec<i64> {
    use seyrek::sparse::SparseStorage;

    let mut y = seed.to_vec();
    for p in 0..matrix.primary_dim() {
        for e in matrix.primary_range(p) {
            let s = matrix.indices()[e] as usize;
            let (r, c) = match matrix.orientation() {
                Orientation::Csr => (p, s),
                Orientation::Csc => (s, p),
            };
            y[r] += matrix.values()[e] * x[c];
        }
    }
    y
}
