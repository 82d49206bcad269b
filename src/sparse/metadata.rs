//! Fixed-layout matrix metadata record

use bytemuck::{Pod, Zeroable};

use crate::dtype::{self, Element, SparseIndex};
use crate::error::{Error, Result};

/// Matrix metadata as stored in the `meta` blob
///
/// Seven native-endian `u32` fields in this exact order. `starting_row` and
/// `starting_col` record the offset subtracted from the parent's indices when
/// the matrix was cut out of a larger one; consumers add it back when writing
/// into an unpartitioned output vector.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct SparseMatrixMetadata {
    /// Number of rows
    pub rows: u32,
    /// Number of columns
    pub cols: u32,
    /// Number of stored nonzeros
    pub nz: u32,
    /// Row offset relative to the parent matrix
    pub starting_row: u32,
    /// Column offset relative to the parent matrix
    pub starting_col: u32,
    /// Width of one index element in bytes
    pub index_bytes: u32,
    /// Width of one value element in bytes
    pub value_bytes: u32,
}

impl SparseMatrixMetadata {
    /// Encoded size of the record in bytes
    pub const ENCODED_LEN: usize = std::mem::size_of::<Self>();

    /// Metadata for a fresh (unpartitioned) matrix with element widths of `I` and `V`
    pub fn new<I: SparseIndex, V: Element>(rows: u32, cols: u32, nz: u32) -> Self {
        Self {
            rows,
            cols,
            nz,
            starting_row: 0,
            starting_col: 0,
            index_bytes: dtype::byte_width::<I>(),
            value_bytes: dtype::byte_width::<V>(),
        }
    }

    /// Decode a `meta` blob
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != Self::ENCODED_LEN {
            return Err(Error::format_mismatch(
                "meta",
                format!(
                    "expected {} bytes, got {}",
                    Self::ENCODED_LEN,
                    bytes.len()
                ),
            ));
        }
        Ok(bytemuck::pod_read_unaligned(bytes))
    }

    /// Encode as a `meta` blob
    pub fn to_bytes(&self) -> Vec<u8> {
        bytemuck::bytes_of(self).to_vec()
    }

    /// Check that the recorded element widths match `I` and `V`
    pub fn check_widths<I: SparseIndex, V: Element>(&self) -> Result<()> {
        let index_bytes = dtype::byte_width::<I>();
        if self.index_bytes != index_bytes {
            return Err(Error::format_mismatch(
                "meta",
                format!(
                    "stored index width {} bytes, instantiated index type is {} bytes",
                    self.index_bytes, index_bytes
                ),
            ));
        }
        let value_bytes = dtype::byte_width::<V>();
        if self.value_bytes != value_bytes {
            return Err(Error::format_mismatch(
                "meta",
                format!(
                    "stored value width {} bytes, instantiated value type is {} bytes",
                    self.value_bytes, value_bytes
                ),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_order() {
        let md = SparseMatrixMetadata {
            rows: 1,
            cols: 2,
            nz: 3,
            starting_row: 4,
            starting_col: 5,
            index_bytes: 6,
            value_bytes: 7,
        };
        let words: Vec<u32> = dtype::decode_pod_slice(&md.to_bytes()).unwrap();
        assert_eq!(words, vec![1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(SparseMatrixMetadata::decode(&md.to_bytes()).unwrap(), md);
    }

    #[test]
    fn test_decode_wrong_length() {
        let err = SparseMatrixMetadata::decode(&[0u8; 24]).unwrap_err();
        assert!(matches!(err, Error::FormatMismatch { component: "meta", .. }));
    }

    #[test]
    fn test_check_widths() {
        let md = SparseMatrixMetadata::new::<u32, i64>(2, 2, 2);
        assert!(md.check_widths::<u32, i64>().is_ok());
        assert!(md.check_widths::<u64, i64>().is_err());
        assert!(md.check_widths::<u32, f32>().is_err());
    }
}
