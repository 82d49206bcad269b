//! Core sparse matrix implementation: struct, creation, getters

use std::fmt;

use crate::dtype::{self, Element, SparseIndex};
use crate::error::{Error, Result};
use crate::sparse::format::{Orientation, SparseStorage};
use crate::sparse::metadata::SparseMatrixMetadata;
use crate::sparse::store::{MatrixComponent, MatrixStore};

/// Compressed sparse matrix (CSR or CSC) with owned pointer, index and value arrays
///
/// # Invariants
///
/// - `pointers.len() == primary_dim + 1`, `pointers[0] == 0`,
///   `pointers[primary_dim] == nz`, and `pointers` is non-decreasing
/// - `indices.len() == values.len() == nz`
/// - every entry of `indices` is `< secondary_dim`
///
/// All constructors establish these; nothing mutates the arrays afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseMatrix<I: SparseIndex, V: Element> {
    pub(crate) orientation: Orientation,
    pub(crate) metadata: SparseMatrixMetadata,
    pub(crate) name: String,
    pub(crate) pointers: Vec<I>,
    pub(crate) indices: Vec<I>,
    pub(crate) values: Vec<V>,
}

fn dim_to_u32(what: &'static str, v: usize) -> Result<u32> {
    u32::try_from(v).map_err(|_| {
        Error::invalid_argument(what, format!("{} does not fit the 32-bit metadata field", v))
    })
}

fn to_index<I: SparseIndex>(v: usize) -> Result<I> {
    I::from_index(v).ok_or_else(|| {
        Error::invalid_argument(
            "dim",
            format!(
                "{} does not fit a {}-byte index",
                v,
                dtype::byte_width::<I>()
            ),
        )
    })
}

/// Check the three-array invariants for a `primary x secondary` matrix
fn validate_structure<I: SparseIndex>(
    pointers: &[I],
    indices: &[I],
    nvalues: usize,
    primary: usize,
    secondary: usize,
) -> Result<()> {
    if pointers.len() != primary + 1 {
        return Err(Error::MalformedMatrix(format!(
            "pointer array has {} entries, expected {}",
            pointers.len(),
            primary + 1
        )));
    }
    if indices.len() != nvalues {
        return Err(Error::MalformedMatrix(format!(
            "index array has {} entries but value array has {}",
            indices.len(),
            nvalues
        )));
    }
    if pointers[0].index() != 0 {
        return Err(Error::MalformedMatrix(format!(
            "pointer[0] is {}, expected 0",
            pointers[0].index()
        )));
    }
    if let Some(pos) = pointers.windows(2).position(|w| w[1] < w[0]) {
        return Err(Error::MalformedMatrix(format!(
            "pointer array decreases at position {}",
            pos + 1
        )));
    }
    let last = pointers[primary].index();
    if last != nvalues {
        return Err(Error::MalformedMatrix(format!(
            "pointer[last] is {}, expected nz = {}",
            last, nvalues
        )));
    }
    if let Some(pos) = indices.iter().position(|i| i.index() >= secondary) {
        return Err(Error::MalformedMatrix(format!(
            "index {} at position {} is out of range for secondary dimension {}",
            indices[pos].index(),
            pos,
            secondary
        )));
    }
    Ok(())
}

impl<I: SparseIndex, V: Element> SparseMatrix<I, V> {
    /// Create a matrix from its three arrays
    ///
    /// # Arguments
    ///
    /// * `orientation` - Which dimension the pointer array walks
    /// * `shape` - Matrix shape [nrows, ncols]
    /// * `pointers` - Pointer array (length: primary dimension + 1)
    /// * `indices` - Secondary-dimension index of each nonzero
    /// * `values` - Value of each nonzero
    ///
    /// # Errors
    ///
    /// Returns `MalformedMatrix` if any of the structural invariants is violated,
    /// and `InvalidArgument` if a dimension does not fit the metadata record.
    pub fn from_parts(
        orientation: Orientation,
        shape: [usize; 2],
        pointers: Vec<I>,
        indices: Vec<I>,
        values: Vec<V>,
    ) -> Result<Self> {
        let [rows, cols] = shape;
        validate_structure(
            &pointers,
            &indices,
            values.len(),
            orientation.primary_dim(rows, cols),
            orientation.secondary_dim(rows, cols),
        )?;
        let metadata = SparseMatrixMetadata::new::<I, V>(
            dim_to_u32("rows", rows)?,
            dim_to_u32("cols", cols)?,
            dim_to_u32("nz", values.len())?,
        );
        Ok(Self {
            orientation,
            metadata,
            name: "<unnamed>".to_string(),
            pointers,
            indices,
            values,
        })
    }

    /// Create a `dim x dim` identity matrix
    pub fn identity(orientation: Orientation, dim: usize) -> Result<Self> {
        let mut pointers = Vec::with_capacity(dim + 1);
        let mut indices = Vec::with_capacity(dim);
        for i in 0..dim {
            let idx = to_index::<I>(i)?;
            pointers.push(idx);
            indices.push(idx);
        }
        pointers.push(to_index::<I>(dim)?);
        let values = vec![V::one(); dim];

        let mut matrix = Self::from_parts(orientation, [dim, dim], pointers, indices, values)?;
        matrix.name = "eye".to_string();
        Ok(matrix)
    }

    /// Create a fully populated `dim x dim` matrix with a deterministic fill
    ///
    /// For flattened position `k`, the index is `k % dim` and the value is `k + 1`.
    pub fn dense(orientation: Orientation, dim: usize) -> Result<Self> {
        let nz = dim * dim;
        let pointers = (0..=dim)
            .map(|i| to_index::<I>(i * dim))
            .collect::<Result<Vec<_>>>()?;
        let indices = (0..nz)
            .map(|k| to_index::<I>(k % dim))
            .collect::<Result<Vec<_>>>()?;
        let values = (0..nz).map(|k| V::from_position(k + 1)).collect();

        let mut matrix = Self::from_parts(orientation, [dim, dim], pointers, indices, values)?;
        matrix.name = "dense".to_string();
        Ok(matrix)
    }

    /// Load a named matrix from a store
    ///
    /// # Errors
    ///
    /// - `FormatMismatch` if the stored element widths differ from `I`/`V`, or a
    ///   blob's length disagrees with the metadata
    /// - `Io` if any blob is unavailable
    /// - `MalformedMatrix` if the loaded arrays violate the structural invariants
    pub fn load<S: MatrixStore>(store: &S, name: &str, orientation: Orientation) -> Result<Self> {
        let metadata = SparseMatrixMetadata::decode(&store.retrieve(name, MatrixComponent::Meta)?)?;
        metadata.check_widths::<I, V>()?;

        let rows = metadata.rows as usize;
        let cols = metadata.cols as usize;
        let nz = metadata.nz as usize;
        let primary = orientation.primary_dim(rows, cols);

        let pointers: Vec<I> = load_array(store, name, MatrixComponent::IndPtr, primary + 1)?;
        let indices: Vec<I> = load_array(store, name, MatrixComponent::Inds, nz)?;
        let values: Vec<V> = load_array(store, name, MatrixComponent::NzData, nz)?;

        validate_structure(
            &pointers,
            &indices,
            values.len(),
            primary,
            orientation.secondary_dim(rows, cols),
        )?;

        let matrix = Self {
            orientation,
            metadata,
            name: name.to_string(),
            pointers,
            indices,
            values,
        };
        tracing::debug!(name, rows, cols, nz, %orientation, "loaded matrix");
        Ok(matrix)
    }

    /// Returns the matrix name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rename the matrix
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Returns the metadata record
    pub fn metadata(&self) -> &SparseMatrixMetadata {
        &self.metadata
    }

    /// Returns the pointer array
    pub fn pointers(&self) -> &[I] {
        &self.pointers
    }

    /// Returns the index array
    pub fn indices(&self) -> &[I] {
        &self.indices
    }

    /// Returns the value array
    pub fn values(&self) -> &[V] {
        &self.values
    }

    /// Row offset relative to the parent matrix this one was cut from
    pub fn starting_row(&self) -> usize {
        self.metadata.starting_row as usize
    }

    /// Column offset relative to the parent matrix this one was cut from
    pub fn starting_col(&self) -> usize {
        self.metadata.starting_col as usize
    }

    /// Range of positions in the index/value arrays belonging to primary slot `i`
    #[inline]
    pub fn primary_range(&self, i: usize) -> std::ops::Range<usize> {
        self.pointers[i].index()..self.pointers[i + 1].index()
    }

    /// Emit the matrix summary at info level
    pub fn log_summary(&self) {
        tracing::info!(
            name = %self.name,
            rows = self.nrows(),
            cols = self.ncols(),
            nz = self.nnz(),
            orientation = %self.orientation,
            "matrix summary"
        );
    }
}

fn load_array<T: bytemuck::Pod, S: MatrixStore>(
    store: &S,
    name: &str,
    component: MatrixComponent,
    expected_len: usize,
) -> Result<Vec<T>> {
    let component_name = component.as_str();
    let bytes = store.retrieve(name, component)?;
    let data: Vec<T> = dtype::decode_pod_slice(&bytes).ok_or_else(|| {
        Error::format_mismatch(
            component_name,
            format!(
                "{} bytes is not a whole number of {}-byte elements",
                bytes.len(),
                dtype::byte_width::<T>()
            ),
        )
    })?;
    if data.len() != expected_len {
        return Err(Error::format_mismatch(
            component_name,
            format!("expected {} elements, got {}", expected_len, data.len()),
        ));
    }
    Ok(data)
}

impl<I: SparseIndex, V: Element> SparseStorage for SparseMatrix<I, V> {
    fn orientation(&self) -> Orientation {
        self.orientation
    }

    fn shape(&self) -> [usize; 2] {
        [self.metadata.rows as usize, self.metadata.cols as usize]
    }

    fn nnz(&self) -> usize {
        self.metadata.nz as usize
    }

    fn memory_usage(&self) -> usize {
        std::mem::size_of_val(self.pointers.as_slice())
            + std::mem::size_of_val(self.indices.as_slice())
            + std::mem::size_of_val(self.values.as_slice())
    }
}

impl<I: SparseIndex, V: Element> fmt::Display for SparseMatrix<I, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Matrix summary")?;
        writeln!(f, "name = {}", self.name)?;
        writeln!(f, "format = {}", self.orientation)?;
        writeln!(f, "#rows = {}", self.nrows())?;
        writeln!(f, "#cols = {}", self.ncols())?;
        write!(f, "#nz = {}", self.nnz())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sparse::store::MemoryStore;

    #[test]
    fn test_identity_layout() {
        let eye = SparseMatrix::<u32, i64>::identity(Orientation::Csr, 4).unwrap();
        assert_eq!(eye.pointers(), &[0, 1, 2, 3, 4]);
        assert_eq!(eye.indices(), &[0, 1, 2, 3]);
        assert_eq!(eye.values(), &[1, 1, 1, 1]);
        assert_eq!(eye.nnz(), 4);
        assert_eq!(eye.name(), "eye");
        assert!(eye.is_square());
    }

    #[test]
    fn test_density_and_memory_usage() {
        let eye = SparseMatrix::<u32, i64>::identity(Orientation::Csr, 4).unwrap();
        assert_eq!(eye.density(), 0.25);
        // 5 pointers and 4 indices at 4 bytes, 4 values at 8 bytes
        assert_eq!(eye.memory_usage(), 5 * 4 + 4 * 4 + 4 * 8);
        let empty = SparseMatrix::<u32, i64>::identity(Orientation::Csr, 0).unwrap();
        assert_eq!(empty.density(), 0.0);
    }

    #[test]
    fn test_summary() {
        let d = SparseMatrix::<u32, f32>::dense(Orientation::Csc, 3).unwrap();
        d.log_summary();
        let text = d.to_string();
        assert!(text.contains("dense"), "{}", text);
    }

    #[test]
    fn test_dense_layout() {
        let d = SparseMatrix::<u32, i64>::dense(Orientation::Csr, 4).unwrap();
        assert_eq!(d.nnz(), 16);
        assert_eq!(d.pointers(), &[0, 4, 8, 12, 16]);
        let expected_inds: Vec<u32> = (0..4).flat_map(|_| 0..4u32).collect();
        assert_eq!(d.indices(), expected_inds.as_slice());
        let expected_vals: Vec<i64> = (1..=16).collect();
        assert_eq!(d.values(), expected_vals.as_slice());
    }

    #[test]
    fn test_identity_index_overflow() {
        let err = SparseMatrix::<u16, f32>::identity(Orientation::Csr, 70_000).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { arg: "dim", .. }));
    }

    #[test]
    fn test_from_parts_rejects_bad_structure() {
        // pointer array too short
        let err = SparseMatrix::<u32, f32>::from_parts(
            Orientation::Csr,
            [2, 2],
            vec![0, 1],
            vec![0],
            vec![1.0],
        )
        .unwrap_err();
        assert!(matches!(err, Error::MalformedMatrix(_)));

        // index out of secondary range
        let err = SparseMatrix::<u32, f32>::from_parts(
            Orientation::Csr,
            [2, 2],
            vec![0, 1, 1],
            vec![2],
            vec![1.0],
        )
        .unwrap_err();
        assert!(matches!(err, Error::MalformedMatrix(_)));

        // decreasing pointers
        let err = SparseMatrix::<u32, f32>::from_parts(
            Orientation::Csc,
            [2, 2],
            vec![0, 2, 1],
            vec![0, 1],
            vec![1.0, 2.0],
        )
        .unwrap_err();
        assert!(matches!(err, Error::MalformedMatrix(_)));
    }

    #[test]
    fn test_from_parts_rectangular_csc() {
        // 3x2, column-major: col 0 has rows {0, 2}, col 1 has row {1}
        let m = SparseMatrix::<u32, f64>::from_parts(
            Orientation::Csc,
            [3, 2],
            vec![0, 2, 3],
            vec![0, 2, 1],
            vec![1.0, 2.0, 3.0],
        )
        .unwrap();
        assert_eq!(m.shape(), [3, 2]);
        assert_eq!(m.primary_dim(), 2);
        assert_eq!(m.primary_range(0), 0..2);
        assert!(!m.is_square());
    }

    #[test]
    fn test_load_round_trip() {
        let d = SparseMatrix::<u32, i64>::dense(Orientation::Csr, 3).unwrap();
        let mut store = MemoryStore::new();
        store.insert_matrix("d3", &d);

        let loaded = SparseMatrix::<u32, i64>::load(&store, "d3", Orientation::Csr).unwrap();
        assert_eq!(loaded.name(), "d3");
        assert_eq!(loaded.pointers(), d.pointers());
        assert_eq!(loaded.indices(), d.indices());
        assert_eq!(loaded.values(), d.values());
    }

    #[test]
    fn test_load_width_mismatch() {
        let d = SparseMatrix::<u32, i64>::dense(Orientation::Csr, 2).unwrap();
        let mut store = MemoryStore::new();
        store.insert_matrix("d2", &d);

        let err = SparseMatrix::<u64, i64>::load(&store, "d2", Orientation::Csr).unwrap_err();
        assert!(matches!(err, Error::FormatMismatch { .. }));
        let err = SparseMatrix::<u32, i32>::load(&store, "d2", Orientation::Csr).unwrap_err();
        assert!(matches!(err, Error::FormatMismatch { .. }));
    }

    #[test]
    fn test_load_missing_blob() {
        let d = SparseMatrix::<u32, i64>::dense(Orientation::Csr, 2).unwrap();
        let mut store = MemoryStore::new();
        store.insert_matrix("d2", &d);
        store.remove("d2", MatrixComponent::NzData);

        let err = SparseMatrix::<u32, i64>::load(&store, "d2", Orientation::Csr).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }

    #[test]
    fn test_load_truncated_blob() {
        let d = SparseMatrix::<u32, i64>::dense(Orientation::Csr, 2).unwrap();
        let mut store = MemoryStore::new();
        store.insert_matrix("d2", &d);
        store.insert("d2", MatrixComponent::Inds, vec![0u8; 6]);

        let err = SparseMatrix::<u32, i64>::load(&store, "d2", Orientation::Csr).unwrap_err();
        assert!(matches!(err, Error::FormatMismatch { component: "inds", .. }));
    }

    #[test]
    fn test_summary_display() {
        let eye = SparseMatrix::<u32, f32>::identity(Orientation::Csc, 2).unwrap();
        let summary = eye.to_string();
        assert!(summary.contains("name = eye"));
        assert!(summary.contains("#nz = 2"));
    }
}
