//! Matrix stores: named collections of raw sparse matrix blobs
//!
//! A stored matrix is four blobs, one per [`MatrixComponent`]:
//!
//! ```text
//! meta    seven native-endian u32 (rows, cols, nz, startingRow, startingCol,
//!         index byte width, value byte width)
//! indptr  pointer array, primary dimension + 1 index elements
//! inds    index array, nz index elements
//! nzdata  value array, nz value elements
//! ```
//!
//! [`DirectoryStore`] lays these out on disk as
//! `<base>/<name>/<name>-<component>.bin`; [`MemoryStore`] keeps them in a map.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::matrix::SparseMatrix;
use crate::dtype::{self, Element, SparseIndex};
use crate::error::{Error, Result};

/// One blob of a stored matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatrixComponent {
    /// Metadata record
    Meta,
    /// Pointer array
    IndPtr,
    /// Index array
    Inds,
    /// Value array
    NzData,
}

impl MatrixComponent {
    /// All components, in the order they are written
    pub const ALL: [MatrixComponent; 4] = [
        MatrixComponent::Meta,
        MatrixComponent::IndPtr,
        MatrixComponent::Inds,
        MatrixComponent::NzData,
    ];

    /// Component name as used in blob file names
    pub fn as_str(&self) -> &'static str {
        match self {
            MatrixComponent::Meta => "meta",
            MatrixComponent::IndPtr => "indptr",
            MatrixComponent::Inds => "inds",
            MatrixComponent::NzData => "nzdata",
        }
    }
}

impl std::fmt::Display for MatrixComponent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source of raw matrix blobs
pub trait MatrixStore {
    /// Retrieve one component of the named matrix.
    ///
    /// Returns `Err(Io)` if the blob is unavailable.
    fn retrieve(&self, name: &str, component: MatrixComponent) -> Result<Vec<u8>>;
}

impl<S: MatrixStore + ?Sized> MatrixStore for &S {
    fn retrieve(&self, name: &str, component: MatrixComponent) -> Result<Vec<u8>> {
        (**self).retrieve(name, component)
    }
}

/// Encode the four blobs of a matrix
fn encode_components<I: SparseIndex, V: Element>(
    matrix: &SparseMatrix<I, V>,
) -> [(MatrixComponent, Vec<u8>); 4] {
    [
        (MatrixComponent::Meta, matrix.metadata().to_bytes()),
        (
            MatrixComponent::IndPtr,
            dtype::as_bytes(matrix.pointers()).to_vec(),
        ),
        (
            MatrixComponent::Inds,
            dtype::as_bytes(matrix.indices()).to_vec(),
        ),
        (
            MatrixComponent::NzData,
            dtype::as_bytes(matrix.values()).to_vec(),
        ),
    ]
}

// ============================================================================
// DirectoryStore
// ============================================================================

/// Matrix store backed by a directory tree
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    base: PathBuf,
}

impl DirectoryStore {
    /// Create a store rooted at `base`
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// Root directory of the store
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Path of one component blob
    pub fn component_path(&self, name: &str, component: MatrixComponent) -> PathBuf {
        self.base
            .join(name)
            .join(format!("{}-{}.bin", name, component.as_str()))
    }

    /// Write all four blobs of `matrix` under `name`, creating the directory
    pub fn save<I: SparseIndex, V: Element>(
        &self,
        name: &str,
        matrix: &SparseMatrix<I, V>,
    ) -> Result<()> {
        let dir = self.base.join(name);
        fs::create_dir_all(&dir).map_err(|source| Error::Io {
            what: dir.display().to_string(),
            source,
        })?;
        for (component, bytes) in encode_components(matrix) {
            let path = self.component_path(name, component);
            fs::write(&path, bytes).map_err(|source| Error::Io {
                what: path.display().to_string(),
                source,
            })?;
        }
        tracing::debug!(name, base = %self.base.display(), "saved matrix");
        Ok(())
    }
}

impl MatrixStore for DirectoryStore {
    fn retrieve(&self, name: &str, component: MatrixComponent) -> Result<Vec<u8>> {
        let path = self.component_path(name, component);
        fs::read(&path).map_err(|source| Error::Io {
            what: path.display().to_string(),
            source,
        })
    }
}

// ============================================================================
// MemoryStore
// ============================================================================

/// In-memory matrix store
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    blobs: HashMap<(String, MatrixComponent), Vec<u8>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a single raw blob, replacing any previous one
    pub fn insert(&mut self, name: &str, component: MatrixComponent, bytes: Vec<u8>) {
        self.blobs.insert((name.to_string(), component), bytes);
    }

    /// Remove a single blob, returning it if present
    pub fn remove(&mut self, name: &str, component: MatrixComponent) -> Option<Vec<u8>> {
        self.blobs.remove(&(name.to_string(), component))
    }

    /// Insert all four blobs of `matrix` under `name`
    pub fn insert_matrix<I: SparseIndex, V: Element>(
        &mut self,
        name: &str,
        matrix: &SparseMatrix<I, V>,
    ) {
        for (component, bytes) in encode_components(matrix) {
            self.insert(name, component, bytes);
        }
    }
}

impl MatrixStore for MemoryStore {
    fn retrieve(&self, name: &str, component: MatrixComponent) -> Result<Vec<u8>> {
        self.blobs
            .get(&(name.to_string(), component))
            .cloned()
            .ok_or_else(|| Error::Io {
                what: format!("{}-{}", name, component),
                source: io::Error::new(io::ErrorKind::NotFound, "no such blob"),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sparse::Orientation;

    #[test]
    fn test_component_path_layout() {
        let store = DirectoryStore::new("/data/matrices");
        assert_eq!(
            store.component_path("cant", MatrixComponent::IndPtr),
            PathBuf::from("/data/matrices/cant/cant-indptr.bin")
        );
    }

    #[test]
    fn test_memory_store_missing_blob() {
        let store = MemoryStore::new();
        let err = store.retrieve("nope", MatrixComponent::Meta).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }

    #[test]
    fn test_memory_store_insert_matrix() {
        let eye = SparseMatrix::<u32, f32>::identity(Orientation::Csr, 3).unwrap();
        let mut store = MemoryStore::new();
        store.insert_matrix("eye3", &eye);
        for component in MatrixComponent::ALL {
            assert!(store.retrieve("eye3", component).is_ok());
        }
        assert_eq!(
            store.retrieve("eye3", MatrixComponent::Inds).unwrap().len(),
            3 * 4
        );
    }
}
