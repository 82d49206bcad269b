//! Row partitioning of sparse matrices
//!
//! A matrix is cut into row-contiguous sub-matrices described by a boundary
//! vector `b` of length `num_partitions + 1`: partition `p` holds rows
//! `b[p] .. b[p + 1]`. Each sub-matrix is rebased so that its first row is
//! row 0, and records the offset in `starting_row`.
//!
//! For CSR the partition dimension is the storage's primary dimension, so
//! partitions are contiguous slices of the three arrays. For CSC every nonzero
//! has to be classified by its row index and redistributed, rebuilding each
//! partition's column pointers as the columns are walked.

use super::core::SparseMatrix;
use crate::dtype::{Element, SparseIndex};
use crate::error::{Error, Result};
use crate::sparse::format::{Orientation, SparseStorage};
use crate::sparse::metadata::SparseMatrixMetadata;

/// Check that `boundaries` is a valid cover of `0 .. dim`
fn validate_boundaries(boundaries: &[usize], dim: usize) -> Result<()> {
    if boundaries.len() < 2 {
        return Err(Error::invalid_argument(
            "boundaries",
            format!("need at least 2 entries, got {}", boundaries.len()),
        ));
    }
    if boundaries[0] != 0 {
        return Err(Error::invalid_argument(
            "boundaries",
            format!("first boundary must be 0, got {}", boundaries[0]),
        ));
    }
    let last = boundaries[boundaries.len() - 1];
    if last != dim {
        return Err(Error::invalid_argument(
            "boundaries",
            format!("last boundary must be {}, got {}", dim, last),
        ));
    }
    if boundaries.windows(2).any(|w| w[1] < w[0]) {
        return Err(Error::invalid_argument(
            "boundaries",
            "boundaries must be non-decreasing",
        ));
    }
    Ok(())
}

/// Index of the interval `[b[p], b[p + 1])` containing `row`.
///
/// `row` must be below the last boundary; empty intervals are skipped.
#[inline]
fn containing_interval(boundaries: &[usize], row: usize) -> usize {
    boundaries.partition_point(|&b| b <= row) - 1
}

impl<I: SparseIndex, V: Element> SparseMatrix<I, V> {
    /// Compute `num_partitions + 1` equidistant row boundaries
    ///
    /// Interior boundaries are spaced `ceil(rows / num_partitions)` apart and
    /// clamped to `rows`, so the last interval absorbs the remainder and
    /// trailing intervals are empty when `num_partitions > rows`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `num_partitions` is zero.
    pub fn partition_boundaries(&self, num_partitions: usize) -> Result<Vec<usize>> {
        if num_partitions == 0 {
            return Err(Error::invalid_argument(
                "num_partitions",
                "must be at least 1",
            ));
        }
        let rows = self.nrows();
        let step = rows.div_ceil(num_partitions);
        let mut boundaries: Vec<usize> = (0..num_partitions)
            .map(|i| (i * step).min(rows))
            .collect();
        boundaries.push(rows);
        Ok(boundaries)
    }

    /// Count the nonzeros falling into each row interval
    ///
    /// For CSR this is a difference of pointer entries per interval. For CSC
    /// every row index is classified into its interval.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `boundaries` does not cover `0 .. rows`.
    pub fn count_elements_per_partition(&self, boundaries: &[usize]) -> Result<Vec<usize>> {
        validate_boundaries(boundaries, self.nrows())?;
        let num_partitions = boundaries.len() - 1;

        let counts = match self.orientation {
            Orientation::Csr => boundaries
                .windows(2)
                .map(|w| self.pointers[w[1]].index() - self.pointers[w[0]].index())
                .collect(),
            Orientation::Csc => {
                let mut counts = vec![0usize; num_partitions];
                for &row in &self.indices {
                    counts[containing_interval(boundaries, row.index())] += 1;
                }
                counts
            }
        };
        Ok(counts)
    }

    /// Split the matrix into row partitions
    ///
    /// Partition `p` covers rows `boundaries[p] .. boundaries[p + 1]`, keeps all
    /// columns, and is named `"<name>-p<p>"`.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` if `boundaries` does not cover `0 .. rows`
    /// - `PartitionIntegrity` if a produced partition's pointer span does not
    ///   match its element count
    pub fn partition(&self, boundaries: &[usize]) -> Result<Vec<SparseMatrix<I, V>>> {
        let counts = self.count_elements_per_partition(boundaries)?;
        let parts = match self.orientation {
            Orientation::Csr => self.partition_csr(boundaries, &counts),
            Orientation::Csc => self.partition_csc(boundaries, &counts)?,
        };

        for (p, part) in parts.iter().enumerate() {
            let span = part.pointers[part.pointers.len() - 1].index() - part.pointers[0].index();
            if span != part.nnz() {
                tracing::error!(
                    partition = p,
                    nz = part.nnz(),
                    ptr_first = part.pointers[0].index(),
                    ptr_last = part.pointers[part.pointers.len() - 1].index(),
                    "partition nonzero count mismatch"
                );
                return Err(Error::PartitionIntegrity {
                    partition: p,
                    claimed: part.nnz(),
                    actual: span,
                });
            }
        }

        tracing::debug!(
            name = %self.name,
            partitions = parts.len(),
            ?counts,
            "partitioned matrix"
        );
        Ok(parts)
    }

    /// Split into `num_partitions` equidistant row partitions
    pub fn partition_evenly(&self, num_partitions: usize) -> Result<Vec<SparseMatrix<I, V>>> {
        self.partition(&self.partition_boundaries(num_partitions)?)
    }

    fn part_metadata(&self, lower: usize, upper: usize, nz: usize) -> SparseMatrixMetadata {
        SparseMatrixMetadata {
            rows: (upper - lower) as u32,
            cols: self.metadata.cols,
            nz: nz as u32,
            starting_row: lower as u32,
            starting_col: 0,
            index_bytes: self.metadata.index_bytes,
            value_bytes: self.metadata.value_bytes,
        }
    }

    fn partition_csr(&self, boundaries: &[usize], counts: &[usize]) -> Vec<SparseMatrix<I, V>> {
        boundaries
            .windows(2)
            .zip(counts)
            .enumerate()
            .map(|(p, (w, &nz))| {
                let (lower, upper) = (w[0], w[1]);
                let base = self.pointers[lower];
                let start = base.index();
                let end = self.pointers[upper].index();
                SparseMatrix {
                    orientation: Orientation::Csr,
                    metadata: self.part_metadata(lower, upper, nz),
                    name: format!("{}-p{}", self.name, p),
                    pointers: self.pointers[lower..=upper]
                        .iter()
                        .map(|&ptr| ptr - base)
                        .collect(),
                    indices: self.indices[start..end].to_vec(),
                    values: self.values[start..end].to_vec(),
                }
            })
            .collect()
    }

    fn partition_csc(
        &self,
        boundaries: &[usize],
        counts: &[usize],
    ) -> Result<Vec<SparseMatrix<I, V>>> {
        let cols = self.ncols();
        let num_partitions = counts.len();

        // Lower bounds fit I because every boundary is at most rows
        let lowers = boundaries[..num_partitions]
            .iter()
            .map(|&b| {
                I::from_index(b).ok_or_else(|| {
                    Error::invalid_argument("boundaries", format!("{} exceeds index width", b))
                })
            })
            .collect::<Result<Vec<I>>>()?;

        let mut pointers: Vec<Vec<I>> = (0..num_partitions)
            .map(|_| {
                let mut v = Vec::with_capacity(cols + 1);
                v.push(I::zero());
                v
            })
            .collect();
        let mut indices: Vec<Vec<I>> = counts.iter().map(|&n| Vec::with_capacity(n)).collect();
        let mut values: Vec<Vec<V>> = counts.iter().map(|&n| Vec::with_capacity(n)).collect();

        for col in 0..cols {
            for e in self.primary_range(col) {
                let row = self.indices[e];
                let p = containing_interval(boundaries, row.index());
                indices[p].push(row - lowers[p]);
                values[p].push(self.values[e]);
            }
            for p in 0..num_partitions {
                let end = I::from_index(indices[p].len()).ok_or_else(|| {
                    Error::MalformedMatrix("partition pointer exceeds index width".to_string())
                })?;
                pointers[p].push(end);
            }
        }

        let parts = pointers
            .into_iter()
            .zip(indices)
            .zip(values)
            .enumerate()
            .map(|(p, ((pointers, indices), values))| SparseMatrix {
                orientation: Orientation::Csc,
                metadata: self.part_metadata(boundaries[p], boundaries[p + 1], counts[p]),
                name: format!("{}-p{}", self.name, p),
                pointers,
                indices,
                values,
            })
            .collect();
        Ok(parts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(orientation: Orientation) -> SparseMatrix<u32, i64> {
        // 5x4 matrix
        // [1 0 2 0]
        // [0 3 0 0]
        // [4 0 0 5]
        // [0 0 6 0]
        // [7 8 0 9]
        match orientation {
            Orientation::Csr => SparseMatrix::from_parts(
                Orientation::Csr,
                [5, 4],
                vec![0, 2, 3, 5, 6, 9],
                vec![0, 2, 1, 0, 3, 2, 0, 1, 3],
                vec![1, 2, 3, 4, 5, 6, 7, 8, 9],
            )
            .unwrap(),
            Orientation::Csc => SparseMatrix::from_parts(
                Orientation::Csc,
                [5, 4],
                vec![0, 3, 5, 7, 9],
                vec![0, 2, 4, 1, 4, 0, 3, 2, 4],
                vec![1, 4, 7, 3, 8, 2, 6, 5, 9],
            )
            .unwrap(),
        }
    }

    #[test]
    fn test_boundaries_even_split() {
        let eye = SparseMatrix::<u32, i64>::identity(Orientation::Csr, 8).unwrap();
        assert_eq!(eye.partition_boundaries(2).unwrap(), vec![0, 4, 8]);
        assert_eq!(eye.partition_boundaries(3).unwrap(), vec![0, 3, 6, 8]);
        assert_eq!(eye.partition_boundaries(1).unwrap(), vec![0, 8]);
    }

    #[test]
    fn test_boundaries_more_partitions_than_rows() {
        let eye = SparseMatrix::<u32, i64>::identity(Orientation::Csr, 3).unwrap();
        assert_eq!(eye.partition_boundaries(5).unwrap(), vec![0, 1, 2, 3, 3, 3]);
    }

    #[test]
    fn test_boundaries_zero_partitions() {
        let eye = SparseMatrix::<u32, i64>::identity(Orientation::Csr, 3).unwrap();
        assert!(matches!(
            eye.partition_boundaries(0),
            Err(Error::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_containing_interval_skips_empty() {
        let b = [0, 1, 1, 3];
        assert_eq!(containing_interval(&b, 0), 0);
        assert_eq!(containing_interval(&b, 1), 2);
        assert_eq!(containing_interval(&b, 2), 2);
    }

    #[test]
    fn test_counts_agree_between_orientations() {
        let b = [0, 2, 3, 5];
        let csr = sample(Orientation::Csr).count_elements_per_partition(&b).unwrap();
        let csc = sample(Orientation::Csc).count_elements_per_partition(&b).unwrap();
        assert_eq!(csr, vec![3, 2, 4]);
        assert_eq!(csr, csc);
    }

    #[test]
    fn test_counts_reject_bad_boundaries() {
        let m = sample(Orientation::Csr);
        assert!(m.count_elements_per_partition(&[0, 2, 4]).is_err());
        assert!(m.count_elements_per_partition(&[1, 5]).is_err());
        assert!(m.count_elements_per_partition(&[0, 3, 2, 5]).is_err());
        assert!(m.count_elements_per_partition(&[5]).is_err());
    }

    #[test]
    fn test_partition_csr_slices() {
        let m = sample(Orientation::Csr);
        let parts = m.partition(&[0, 2, 5]).unwrap();
        assert_eq!(parts.len(), 2);

        assert_eq!(parts[0].shape(), [2, 4]);
        assert_eq!(parts[0].pointers(), &[0, 2, 3]);
        assert_eq!(parts[0].indices(), &[0, 2, 1]);
        assert_eq!(parts[0].starting_row(), 0);

        assert_eq!(parts[1].shape(), [3, 4]);
        assert_eq!(parts[1].pointers(), &[0, 2, 3, 6]);
        assert_eq!(parts[1].values(), &[4, 5, 6, 7, 8, 9]);
        assert_eq!(parts[1].starting_row(), 2);
        assert_eq!(parts[1].name(), "<unnamed>-p1");
    }

    #[test]
    fn test_partition_csc_rebases_rows() {
        let m = sample(Orientation::Csc);
        let parts = m.partition(&[0, 2, 5]).unwrap();

        // rows 0..2: (0,0)=1, (1,1)=3, (0,2)=2
        assert_eq!(parts[0].pointers(), &[0, 1, 2, 3, 3]);
        assert_eq!(parts[0].indices(), &[0, 1, 0]);
        assert_eq!(parts[0].values(), &[1, 3, 2]);

        // rows 2..5 rebased to 0..3
        assert_eq!(parts[1].pointers(), &[0, 2, 3, 4, 6]);
        assert_eq!(parts[1].indices(), &[0, 2, 2, 1, 0, 2]);
        assert_eq!(parts[1].values(), &[4, 7, 8, 6, 5, 9]);
        assert_eq!(parts[1].starting_row(), 2);
        assert_eq!(parts[1].nnz(), 6);
    }

    #[test]
    fn test_partition_with_empty_intervals() {
        let eye = SparseMatrix::<u32, i64>::identity(Orientation::Csc, 2).unwrap();
        let parts = eye.partition_evenly(4).unwrap();
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[2].nrows(), 0);
        assert_eq!(parts[2].nnz(), 0);
        assert_eq!(parts[3].pointers(), &[0, 0, 0]);
        let total: usize = parts.iter().map(|p| p.nnz()).sum();
        assert_eq!(total, 2);
    }
}
