//! Structure-of-arrays blocks of contact joints consumed by the SIMD
//! kernels.

use crate::math::Real;

/// A block of `N` contact joints in structure-of-arrays form.
///
/// Every limiter scalar becomes an `[Real; N]` and every body index an
/// `[u32; N]`, so one field of the whole block can be read with a single
/// wide load. The field order is stable (`repr(C)`) and the block alignment
/// covers the widest supported lane count (`16 * 4` bytes).
///
/// Blocks are scratch data: they are rebuilt from the contact joints at the
/// beginning of every solve and only the accumulated impulses are written
/// back at the end.
#[repr(C, align(64))]
#[derive(Copy, Clone, Debug)]
pub struct ContactJointPacked<const N: usize> {
    pub(crate) body1_index: [u32; N],
    pub(crate) body2_index: [u32; N],

    pub(crate) normal_limiter_normal_projector1_x: [Real; N],
    pub(crate) normal_limiter_normal_projector1_y: [Real; N],
    pub(crate) normal_limiter_normal_projector2_x: [Real; N],
    pub(crate) normal_limiter_normal_projector2_y: [Real; N],
    pub(crate) normal_limiter_angular_projector1: [Real; N],
    pub(crate) normal_limiter_angular_projector2: [Real; N],

    pub(crate) normal_limiter_comp_mass1_linear_x: [Real; N],
    pub(crate) normal_limiter_comp_mass1_linear_y: [Real; N],
    pub(crate) normal_limiter_comp_mass2_linear_x: [Real; N],
    pub(crate) normal_limiter_comp_mass2_linear_y: [Real; N],
    pub(crate) normal_limiter_comp_mass1_angular: [Real; N],
    pub(crate) normal_limiter_comp_mass2_angular: [Real; N],
    pub(crate) normal_limiter_comp_inv_mass: [Real; N],
    pub(crate) normal_limiter_accumulated_impulse: [Real; N],

    pub(crate) normal_limiter_dst_velocity: [Real; N],
    pub(crate) normal_limiter_dst_displacing_velocity: [Real; N],
    pub(crate) normal_limiter_accumulated_displacing_impulse: [Real; N],

    pub(crate) friction_limiter_normal_projector1_x: [Real; N],
    pub(crate) friction_limiter_normal_projector1_y: [Real; N],
    pub(crate) friction_limiter_normal_projector2_x: [Real; N],
    pub(crate) friction_limiter_normal_projector2_y: [Real; N],
    pub(crate) friction_limiter_angular_projector1: [Real; N],
    pub(crate) friction_limiter_angular_projector2: [Real; N],

    pub(crate) friction_limiter_comp_mass1_linear_x: [Real; N],
    pub(crate) friction_limiter_comp_mass1_linear_y: [Real; N],
    pub(crate) friction_limiter_comp_mass2_linear_x: [Real; N],
    pub(crate) friction_limiter_comp_mass2_linear_y: [Real; N],
    pub(crate) friction_limiter_comp_mass1_angular: [Real; N],
    pub(crate) friction_limiter_comp_mass2_angular: [Real; N],
    pub(crate) friction_limiter_comp_inv_mass: [Real; N],
    pub(crate) friction_limiter_accumulated_impulse: [Real; N],
}

#[cfg(test)]
mod test {
    use super::*;
    use std::mem::{align_of, offset_of, size_of};

    #[test]
    fn blocks_are_wide_load_aligned() {
        assert!(align_of::<ContactJointPacked<4>>() >= 4 * 4);
        assert!(align_of::<ContactJointPacked<8>>() >= 8 * 4);
        assert!(align_of::<ContactJointPacked<16>>() >= 16 * 4);
    }

    #[test]
    fn field_layout_is_stable() {
        type Packed4 = ContactJointPacked<4>;

        assert_eq!(offset_of!(Packed4, body1_index), 0);
        assert_eq!(offset_of!(Packed4, body2_index), 16);
        assert_eq!(offset_of!(Packed4, normal_limiter_normal_projector1_x), 32);
        assert_eq!(
            offset_of!(Packed4, normal_limiter_accumulated_impulse),
            offset_of!(Packed4, normal_limiter_comp_inv_mass) + 16
        );
        assert_eq!(
            offset_of!(Packed4, friction_limiter_accumulated_impulse),
            offset_of!(Packed4, friction_limiter_comp_inv_mass) + 16
        );
        // 33 arrays of 4 scalars each, rounded up to the block alignment.
        assert_eq!(size_of::<Packed4>(), (33 * 16usize).next_multiple_of(64));
    }
}
