//! Semirings for SpMV
//!
//! A semiring supplies the `add` and `mul` operators used by one SpMV
//! traversal, so the same executor computes ordinary linear algebra,
//! shortest paths or reachability depending on which pair is installed.
//! Both operators also receive the (row, col) coordinate of the nonzero being
//! combined, for semirings that specialize on position.

use crate::dtype::Element;

/// Capability pair {add, mul} over values of type `V`
pub trait Semiring<V: Element>: Send + Sync {
    /// Combine two partial results
    fn add(&self, first: V, second: V, row: usize, col: usize) -> V;

    /// Combine a matrix value with an input vector value
    fn mul(&self, first: V, second: V, row: usize, col: usize) -> V;

    /// Additive identity; seed `y` with this to get the pure product
    fn zero(&self) -> V;

    /// Multiplicative identity
    fn one(&self) -> V;
}

impl<V: Element, S: Semiring<V> + ?Sized> Semiring<V> for &S {
    #[inline]
    fn add(&self, first: V, second: V, row: usize, col: usize) -> V {
        (**self).add(first, second, row, col)
    }

    #[inline]
    fn mul(&self, first: V, second: V, row: usize, col: usize) -> V {
        (**self).mul(first, second, row, col)
    }

    #[inline]
    fn zero(&self) -> V {
        (**self).zero()
    }

    #[inline]
    fn one(&self) -> V {
        (**self).one()
    }
}

/// Arithmetic semiring ⟨+, ×⟩
///
/// Integer overflow wraps in every build profile.
#[derive(Debug, Clone, Copy, Default)]
pub struct AddMulSemiring;

impl<V: Element> Semiring<V> for AddMulSemiring {
    #[inline]
    fn add(&self, first: V, second: V, _row: usize, _col: usize) -> V {
        first.wrapping_add(second)
    }

    #[inline]
    fn mul(&self, first: V, second: V, _row: usize, _col: usize) -> V {
        first.wrapping_mul(second)
    }

    fn zero(&self) -> V {
        V::zero()
    }

    fn one(&self) -> V {
        V::one()
    }
}

/// Tropical (shortest path) semiring ⟨min, +⟩
///
/// `zero()` is `+inf` (the largest value for integer types) and `mul`
/// saturates there, so unreachable entries stay unreachable.
#[derive(Debug, Clone, Copy, Default)]
pub struct MinPlusSemiring;

impl<V: Element> Semiring<V> for MinPlusSemiring {
    #[inline]
    fn add(&self, first: V, second: V, _row: usize, _col: usize) -> V {
        if first < second {
            first
        } else {
            second
        }
    }

    #[inline]
    fn mul(&self, first: V, second: V, _row: usize, _col: usize) -> V {
        first.saturating_add(second)
    }

    fn zero(&self) -> V {
        V::infinity()
    }

    fn one(&self) -> V {
        V::zero()
    }
}

/// Boolean (reachability) semiring ⟨or, and⟩ where any nonzero value is true
///
/// Results are normalized to `0`/`1`.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrAndSemiring;

impl OrAndSemiring {
    #[inline]
    fn truth<V: Element>(v: V) -> bool {
        v != V::zero()
    }

    #[inline]
    fn from_bool<V: Element>(b: bool) -> V {
        if b {
            V::one()
        } else {
            V::zero()
        }
    }
}

impl<V: Element> Semiring<V> for OrAndSemiring {
    #[inline]
    fn add(&self, first: V, second: V, _row: usize, _col: usize) -> V {
        Self::from_bool(Self::truth(first) || Self::truth(second))
    }

    #[inline]
    fn mul(&self, first: V, second: V, _row: usize, _col: usize) -> V {
        Self::from_bool(Self::truth(first) && Self::truth(second))
    }

    fn zero(&self) -> V {
        V::zero()
    }

    fn one(&self) -> V {
        V::one()
    }
}
