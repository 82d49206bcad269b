//! Element type system for sparse matrices
//!
//! Sparse matrices are generic over two element types:
//!
//! - an index type `I: SparseIndex`, used for both the pointer array and the
//!   index array (the hardware reads both with the same width), and
//! - a value type `V: Element`, used for the nonzero values and for the
//!   dense input/output vectors.
//!
//! Both are bytemuck `Pod` so that store blobs and device buffers can be
//! reinterpreted without per-type serialization code.

mod element;

pub use element::{Element, SparseIndex};

use bytemuck::Pod;
use std::mem::size_of;

/// Decode a byte blob into a vector of `T`.
///
/// The blob does not need to be aligned for `T`. Returns `None` if the blob
/// length is not a multiple of `size_of::<T>()`.
pub fn decode_pod_slice<T: Pod>(bytes: &[u8]) -> Option<Vec<T>> {
    let width = size_of::<T>();
    if width == 0 || bytes.len() % width != 0 {
        return None;
    }
    Some(
        bytes
            .chunks_exact(width)
            .map(bytemuck::pod_read_unaligned)
            .collect(),
    )
}

/// View a slice of `T` as raw bytes (native byte order).
#[inline]
pub fn as_bytes<T: Pod>(data: &[T]) -> &[u8] {
    bytemuck::cast_slice(data)
}

/// Mutable byte view of a slice of `T`, for device-to-host copies.
#[inline]
pub fn as_bytes_mut<T: Pod>(data: &mut [T]) -> &mut [u8] {
    bytemuck::cast_slice_mut(data)
}

/// Byte width of `T`, as recorded in store metadata.
#[inline]
pub fn byte_width<T>() -> u32 {
    size_of::<T>() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_unaligned() {
        let values = [1u32, 2, 0xdead_beef];
        let mut bytes = vec![0u8];
        bytes.extend_from_slice(as_bytes(&values));
        // Offset by one byte so the payload is misaligned for u32
        let decoded: Vec<u32> = decode_pod_slice(&bytes[1..]).unwrap();
        assert_eq!(decoded, values);
    }

    #[test]
    fn test_decode_rejects_partial_element() {
        assert!(decode_pod_slice::<u64>(&[0u8; 12]).is_none());
        assert_eq!(decode_pod_slice::<u64>(&[]).unwrap(), Vec::<u64>::new());
    }

    #[test]
    fn test_byte_width() {
        assert_eq!(byte_width::<u32>(), 4);
        assert_eq!(byte_width::<i64>(), 8);
    }
}
