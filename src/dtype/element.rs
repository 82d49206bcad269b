//! Element and index traits for sparse matrix storage

use bytemuck::{Pod, Zeroable};
use num_traits::{Bounded, PrimInt, Unsigned};
use std::fmt::Debug;
use std::ops::{Add, Mul};

/// Trait for types that can be values of a sparse matrix or dense vector
///
/// # Bounds
/// - `Copy + Send + Sync + 'static` - Basic trait requirements
/// - `Pod + Zeroable` - Safe memory transmutation to and from device buffers (bytemuck)
/// - `Add + Mul` - Arithmetic semiring operators (Output = Self)
/// - `PartialOrd` - Comparison for the min-plus semiring
pub trait Element:
    Copy
    + Send
    + Sync
    + Debug
    + Pod
    + Zeroable
    + 'static
    + Add<Output = Self>
    + Mul<Output = Self>
    + PartialOrd
{
    /// Zero value
    fn zero() -> Self;

    /// One value
    fn one() -> Self;

    /// The largest representable value; `+inf` for floating point.
    ///
    /// Used as the additive identity of the min-plus semiring.
    fn infinity() -> Self;

    /// Addition that sticks at `infinity()` instead of overflowing.
    fn saturating_add(self, other: Self) -> Self;

    /// Addition that wraps on integer overflow; plain `+` for floating point.
    fn wrapping_add(self, other: Self) -> Self;

    /// Multiplication that wraps on integer overflow; plain `*` for floating point.
    fn wrapping_mul(self, other: Self) -> Self;

    /// Convert from a flattened position, used by deterministic fill patterns
    fn from_position(v: usize) -> Self;
}

macro_rules! impl_element_float {
    ($t:ty) => {
        impl Element for $t {
            #[inline]
            fn zero() -> Self {
                0.0
            }

            #[inline]
            fn one() -> Self {
                1.0
            }

            #[inline]
            fn infinity() -> Self {
                <$t>::INFINITY
            }

            #[inline]
            fn saturating_add(self, other: Self) -> Self {
                self + other
            }

            #[inline]
            fn wrapping_add(self, other: Self) -> Self {
                self + other
            }

            #[inline]
            fn wrapping_mul(self, other: Self) -> Self {
                self * other
            }

            #[inline]
            fn from_position(v: usize) -> Self {
                v as $t
            }
        }
    };
}

macro_rules! impl_element_int {
    ($t:ty) => {
        impl Element for $t {
            #[inline]
            fn zero() -> Self {
                0
            }

            #[inline]
            fn one() -> Self {
                1
            }

            #[inline]
            fn infinity() -> Self {
                <$t as Bounded>::max_value()
            }

            #[inline]
            fn saturating_add(self, other: Self) -> Self {
                <$t>::saturating_add(self, other)
            }

            #[inline]
            fn wrapping_add(self, other: Self) -> Self {
                <$t>::wrapping_add(self, other)
            }

            #[inline]
            fn wrapping_mul(self, other: Self) -> Self {
                <$t>::wrapping_mul(self, other)
            }

            #[inline]
            fn from_position(v: usize) -> Self {
                v as $t
            }
        }
    };
}

impl_element_float!(f32);
impl_element_float!(f64);
impl_element_int!(i32);
impl_element_int!(i64);
impl_element_int!(u32);
impl_element_int!(u64);

/// Trait for the index type of pointer and index arrays
///
/// Only unsigned primitive integers qualify; the hardware reads indices as raw
/// unsigned words of `size_of::<Self>()` bytes.
pub trait SparseIndex:
    PrimInt + Unsigned + Pod + Zeroable + Debug + Send + Sync + Default + 'static
{
    /// Convert to a host-side array position
    fn index(self) -> usize;

    /// Convert from a host-side array position.
    ///
    /// Returns `None` if the value does not fit in `Self`.
    fn from_index(v: usize) -> Option<Self>;
}

macro_rules! impl_sparse_index {
    ($t:ty) => {
        impl SparseIndex for $t {
            #[inline]
            fn index(self) -> usize {
                self as usize
            }

            #[inline]
            fn from_index(v: usize) -> Option<Self> {
                <$t>::try_from(v).ok()
            }
        }
    };
}

impl_sparse_index!(u16);
impl_sparse_index!(u32);
impl_sparse_index!(u64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infinity_is_absorbing() {
        assert_eq!(u32::infinity().saturating_add(7), u32::MAX);
        assert_eq!(i64::infinity().saturating_add(1), i64::MAX);
        assert!(f32::infinity().saturating_add(1.0).is_infinite());
    }

    #[test]
    fn test_wrapping_arithmetic() {
        assert_eq!(Element::wrapping_add(i32::MAX, 1), i32::MIN);
        assert_eq!(Element::wrapping_mul(u32::MAX, 2), u32::MAX - 1);
        assert_eq!(Element::wrapping_mul(1.5f64, 2.0), 3.0);
    }

    #[test]
    fn test_index_conversion() {
        assert_eq!(<u16 as SparseIndex>::from_index(70_000), None);
        assert_eq!(<u32 as SparseIndex>::from_index(70_000), Some(70_000u32));
        assert_eq!(SparseIndex::index(9u64), 9usize);
    }
}
