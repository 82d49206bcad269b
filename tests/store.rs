//! Integration tests for loading matrices from stores

mod common;

use common::{pattern_matrix, sample_matrix};
use seyrek::error::Error;
use seyrek::sparse::{
    DirectoryStore, MatrixComponent, MatrixStore, MemoryStore, Orientation, SparseMatrix,
    SparseMatrixMetadata, SparseStorage,
};

#[test]
fn test_directory_store_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let store = DirectoryStore::new(dir.path());

    for orientation in [Orientation::Csr, Orientation::Csc] {
        let m = pattern_matrix(orientation, 12, 9, 0.3, 5);
        let name = format!("pattern-{}", orientation.name());
        store.save(&name, &m).unwrap();

        assert!(store.component_path(&name, MatrixComponent::NzData).is_file());
        let loaded = SparseMatrix::<u32, i64>::load(&store, &name, orientation).unwrap();
        assert_eq!(loaded.name(), name);
        assert_eq!(loaded.shape(), m.shape());
        assert_eq!(loaded.pointers(), m.pointers());
        assert_eq!(loaded.indices(), m.indices());
        assert_eq!(loaded.values(), m.values());
    }
}

#[test]
fn test_directory_layout() {
    let dir = tempfile::tempdir().unwrap();
    let store = DirectoryStore::new(dir.path());
    store
        .save("eye4", &SparseMatrix::<u32, f32>::identity(Orientation::Csr, 4).unwrap())
        .unwrap();

    for component in MatrixComponent::ALL {
        let path = dir
            .path()
            .join("eye4")
            .join(format!("eye4-{}.bin", component));
        assert!(path.is_file(), "missing {}", path.display());
    }

    let meta = std::fs::read(dir.path().join("eye4/eye4-meta.bin")).unwrap();
    let meta = SparseMatrixMetadata::decode(&meta).unwrap();
    assert_eq!((meta.rows, meta.cols, meta.nz), (4, 4, 4));
    assert_eq!((meta.index_bytes, meta.value_bytes), (4, 4));
}

#[test]
fn test_index_width_mismatch() {
    let dir = tempfile::tempdir().unwrap();
    let store = DirectoryStore::new(dir.path());
    let narrow = SparseMatrix::<u16, i64>::identity(Orientation::Csr, 3).unwrap();
    store.save("narrow", &narrow).unwrap();

    let err = SparseMatrix::<u32, i64>::load(&store, "narrow", Orientation::Csr).unwrap_err();
    assert!(matches!(err, Error::FormatMismatch { component: "meta", .. }));

    SparseMatrix::<u16, i64>::load(&store, "narrow", Orientation::Csr).unwrap();
}

#[test]
fn test_missing_matrix_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let store = DirectoryStore::new(dir.path());
    let err = SparseMatrix::<u32, i64>::load(&store, "absent", Orientation::Csr).unwrap_err();
    match err {
        Error::Io { source, .. } => assert_eq!(source.kind(), std::io::ErrorKind::NotFound),
        other => panic!("expected Io, got {:?}", other),
    }
}

#[test]
fn test_store_by_reference() {
    let mut store = MemoryStore::new();
    store.insert_matrix("s", &sample_matrix(Orientation::Csr));

    fn fetch_meta<S: MatrixStore>(store: S) -> Vec<u8> {
        store.retrieve("s", MatrixComponent::Meta).unwrap()
    }
    assert_eq!(fetch_meta(&store).len(), SparseMatrixMetadata::ENCODED_LEN);
}
