//! Miscellaneous utilities: numeric traits shared by the scalar and SIMD
//! solver kernels, and slice helpers.

use crate::math::Real;
use na::SimdRealField;

/// The trait for real numbers used by the solver.
///
/// This includes `f32` and its related SIMD types.
pub trait SimdRealCopy: SimdRealField<Element = Real> + Copy {}
impl<T: SimdRealField<Element = Real> + Copy> SimdRealCopy for T {}

/// A batch of reals processed together by the solver kernels.
///
/// Implemented by `f32` (one lane) and by the wide SIMD types. This is what
/// lets a single generic kernel act as both the scalar and the SIMD
/// implementation of an iteration pass.
pub trait WReal: SimdRealCopy {
    /// The number of scalar lanes processed per batch.
    const WIDTH: usize;

    /// Builds a batch by evaluating `f` for each lane index.
    fn from_fn(f: impl FnMut(usize) -> Real) -> Self;

    /// Loads `Self::WIDTH` consecutive lanes from the start of `vals`.
    fn from_slice(vals: &[Real]) -> Self;

    /// Reads the value of a single lane.
    fn extract_lane(&self, lane: usize) -> Real;

    /// Stores all lanes to the start of `out`.
    fn store_to(&self, out: &mut [Real]);
}

impl WReal for Real {
    const WIDTH: usize = 1;

    #[inline(always)]
    fn from_fn(mut f: impl FnMut(usize) -> Real) -> Self {
        f(0)
    }

    #[inline(always)]
    fn from_slice(vals: &[Real]) -> Self {
        vals[0]
    }

    #[inline(always)]
    fn extract_lane(&self, _: usize) -> Real {
        *self
    }

    #[inline(always)]
    fn store_to(&self, out: &mut [Real]) {
        out[0] = *self;
    }
}

#[cfg(feature = "simd-is-enabled")]
mod simd_impls {
    use super::WReal;
    use crate::math::{Real, SimdReal4, SimdReal8};
    use simba::simd::SimdValue;

    impl WReal for SimdReal4 {
        const WIDTH: usize = 4;

        #[inline(always)]
        fn from_fn(mut f: impl FnMut(usize) -> Real) -> Self {
            Self::from([f(0), f(1), f(2), f(3)])
        }

        #[inline(always)]
        fn from_slice(vals: &[Real]) -> Self {
            Self::from([vals[0], vals[1], vals[2], vals[3]])
        }

        #[inline(always)]
        fn extract_lane(&self, lane: usize) -> Real {
            self.extract(lane)
        }

        #[inline(always)]
        fn store_to(&self, out: &mut [Real]) {
            let vals: [Real; 4] = (*self).into();
            out[..4].copy_from_slice(&vals);
        }
    }

    impl WReal for SimdReal8 {
        const WIDTH: usize = 8;

        #[inline(always)]
        fn from_fn(f: impl FnMut(usize) -> Real) -> Self {
            Self::from(std::array::from_fn(f))
        }

        #[inline(always)]
        fn from_slice(vals: &[Real]) -> Self {
            Self::from(std::array::from_fn(|l| vals[l]))
        }

        #[inline(always)]
        fn extract_lane(&self, lane: usize) -> Real {
            self.extract(lane)
        }

        #[inline(always)]
        fn store_to(&self, out: &mut [Real]) {
            let vals: [Real; 8] = (*self).into();
            out[..8].copy_from_slice(&vals);
        }
    }
}

/// Gets mutable references to two distinct elements of a slice.
///
/// Panics if `i == j` or if either index is out of bounds.
#[inline]
pub fn index_mut2<T>(items: &mut [T], i: usize, j: usize) -> (&mut T, &mut T) {
    assert!(i != j, "Unable to index the same element twice.");

    if i < j {
        let (left, right) = items.split_at_mut(j);
        (&mut left[i], &mut right[0])
    } else {
        let (left, right) = items.split_at_mut(i);
        (&mut right[0], &mut left[j])
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn index_mut2_is_order_preserving() {
        let mut items = [10, 20, 30, 40];
        let (a, b) = index_mut2(&mut items, 3, 1);
        assert_eq!((*a, *b), (40, 20));
        *a = 0;
        *b = 1;
        assert_eq!(items, [10, 1, 30, 0]);
    }

    #[cfg(feature = "simd-is-enabled")]
    #[test]
    fn wide_lane_roundtrip() {
        use crate::math::SimdReal4;

        let batch = SimdReal4::from_slice(&[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(batch.extract_lane(2), 3.0);

        let mut out = [0.0; 4];
        batch.store_to(&mut out);
        assert_eq!(out, [1.0, 2.0, 3.0, 4.0]);
    }
}
