//! The 16-wide iteration kernels.
//!
//! There is no native 16-lanes float type, so a 16-joint block is solved as
//! two interleaved 8-wide sub-batches sharing a single skip check and a
//! single productivity report. The arithmetic uses fused multiply-adds; the
//! grouping pass guarantees that the 16 joints of a block touch 32 distinct
//! bodies, which is what makes solving both sub-batches from the same
//! pre-block body state legal.

use crate::dynamics::solver::{
    ContactJointPacked, SolveBody, FRICTION_COEFFICIENT, PRODUCTIVE_IMPULSE,
};
use crate::math::{Real, SimdReal8};
use crate::utils::WReal;
use simba::simd::{SimdComplexField, SimdPartialOrd, SimdSigned, SimdValue};

/// The body state of one 8-joint sub-batch, gathered from a solve-body
/// array.
struct BodyBatch {
    velocity_x: SimdReal8,
    velocity_y: SimdReal8,
    angular_velocity: SimdReal8,
}

impl BodyBatch {
    #[inline(always)]
    fn gather(solve_bodies: &[SolveBody], indices: &[u32]) -> Self {
        Self {
            velocity_x: SimdReal8::from_fn(|l| solve_bodies[indices[l] as usize].velocity.x),
            velocity_y: SimdReal8::from_fn(|l| solve_bodies[indices[l] as usize].velocity.y),
            angular_velocity: SimdReal8::from_fn(|l| {
                solve_bodies[indices[l] as usize].angular_velocity
            }),
        }
    }

    #[inline(always)]
    fn scatter(
        &self,
        solve_bodies: &mut [SolveBody],
        indices: &[u32],
        productive: &[bool; 8],
        iteration_index: i32,
    ) {
        for l in 0..8 {
            let body = &mut solve_bodies[indices[l] as usize];
            body.velocity.x = self.velocity_x.extract_lane(l);
            body.velocity.y = self.velocity_y.extract_lane(l);
            body.angular_velocity = self.angular_velocity.extract_lane(l);
            if productive[l] {
                body.last_iteration = iteration_index;
            }
        }
    }
}

/// Solves the normal and friction rows of one 8-joint sub-batch starting at
/// lane `ip` of the block, and returns the per-lane largest impulse applied.
#[inline(always)]
fn solve_impulse_half(
    jp: &mut ContactJointPacked<16>,
    ip: usize,
    body1: &mut BodyBatch,
    body2: &mut BodyBatch,
) -> SimdReal8 {
    let load = |vals: &[Real; 16]| SimdReal8::from_slice(&vals[ip..]);

    let normal_projector1_x = load(&jp.normal_limiter_normal_projector1_x);
    let normal_projector1_y = load(&jp.normal_limiter_normal_projector1_y);
    let normal_projector2_x = load(&jp.normal_limiter_normal_projector2_x);
    let normal_projector2_y = load(&jp.normal_limiter_normal_projector2_y);
    let normal_angular_projector1 = load(&jp.normal_limiter_angular_projector1);
    let normal_angular_projector2 = load(&jp.normal_limiter_angular_projector2);

    let normal_comp_mass1_linear_x = load(&jp.normal_limiter_comp_mass1_linear_x);
    let normal_comp_mass1_linear_y = load(&jp.normal_limiter_comp_mass1_linear_y);
    let normal_comp_mass2_linear_x = load(&jp.normal_limiter_comp_mass2_linear_x);
    let normal_comp_mass2_linear_y = load(&jp.normal_limiter_comp_mass2_linear_y);
    let normal_comp_mass1_angular = load(&jp.normal_limiter_comp_mass1_angular);
    let normal_comp_mass2_angular = load(&jp.normal_limiter_comp_mass2_angular);
    let normal_comp_inv_mass = load(&jp.normal_limiter_comp_inv_mass);
    let mut normal_accumulated_impulse = load(&jp.normal_limiter_accumulated_impulse);
    let normal_dst_velocity = load(&jp.normal_limiter_dst_velocity);

    let friction_projector1_x = load(&jp.friction_limiter_normal_projector1_x);
    let friction_projector1_y = load(&jp.friction_limiter_normal_projector1_y);
    let friction_projector2_x = load(&jp.friction_limiter_normal_projector2_x);
    let friction_projector2_y = load(&jp.friction_limiter_normal_projector2_y);
    let friction_angular_projector1 = load(&jp.friction_limiter_angular_projector1);
    let friction_angular_projector2 = load(&jp.friction_limiter_angular_projector2);

    let friction_comp_mass1_linear_x = load(&jp.friction_limiter_comp_mass1_linear_x);
    let friction_comp_mass1_linear_y = load(&jp.friction_limiter_comp_mass1_linear_y);
    let friction_comp_mass2_linear_x = load(&jp.friction_limiter_comp_mass2_linear_x);
    let friction_comp_mass2_linear_y = load(&jp.friction_limiter_comp_mass2_linear_y);
    let friction_comp_mass1_angular = load(&jp.friction_limiter_comp_mass1_angular);
    let friction_comp_mass2_angular = load(&jp.friction_limiter_comp_mass2_angular);
    let friction_comp_inv_mass = load(&jp.friction_limiter_comp_inv_mass);
    let mut friction_accumulated_impulse = load(&jp.friction_limiter_accumulated_impulse);

    // The two dot-product halves are accumulated separately, as the fused
    // chains would otherwise serialize.
    let mut normal_dv1 = normal_dst_velocity;
    normal_dv1 = (-normal_projector1_x).simd_mul_add(body1.velocity_x, normal_dv1);
    normal_dv1 = (-normal_projector1_y).simd_mul_add(body1.velocity_y, normal_dv1);
    normal_dv1 = (-normal_angular_projector1).simd_mul_add(body1.angular_velocity, normal_dv1);

    let mut normal_dv2 = SimdReal8::splat(0.0);
    normal_dv2 = (-normal_projector2_x).simd_mul_add(body2.velocity_x, normal_dv2);
    normal_dv2 = (-normal_projector2_y).simd_mul_add(body2.velocity_y, normal_dv2);
    normal_dv2 = (-normal_angular_projector2).simd_mul_add(body2.angular_velocity, normal_dv2);

    let normal_dv = normal_dv1 + normal_dv2;

    let mut normal_delta_impulse = normal_dv * normal_comp_inv_mass;
    normal_delta_impulse = normal_delta_impulse.simd_max(-normal_accumulated_impulse);

    body1.velocity_x = normal_comp_mass1_linear_x.simd_mul_add(normal_delta_impulse, body1.velocity_x);
    body1.velocity_y = normal_comp_mass1_linear_y.simd_mul_add(normal_delta_impulse, body1.velocity_y);
    body1.angular_velocity =
        normal_comp_mass1_angular.simd_mul_add(normal_delta_impulse, body1.angular_velocity);

    body2.velocity_x = normal_comp_mass2_linear_x.simd_mul_add(normal_delta_impulse, body2.velocity_x);
    body2.velocity_y = normal_comp_mass2_linear_y.simd_mul_add(normal_delta_impulse, body2.velocity_y);
    body2.angular_velocity =
        normal_comp_mass2_angular.simd_mul_add(normal_delta_impulse, body2.angular_velocity);

    normal_accumulated_impulse += normal_delta_impulse;

    let mut friction_dv1 = SimdReal8::splat(0.0);
    friction_dv1 = (-friction_projector1_x).simd_mul_add(body1.velocity_x, friction_dv1);
    friction_dv1 = (-friction_projector1_y).simd_mul_add(body1.velocity_y, friction_dv1);
    friction_dv1 = (-friction_angular_projector1).simd_mul_add(body1.angular_velocity, friction_dv1);

    let mut friction_dv2 = SimdReal8::splat(0.0);
    friction_dv2 = (-friction_projector2_x).simd_mul_add(body2.velocity_x, friction_dv2);
    friction_dv2 = (-friction_projector2_y).simd_mul_add(body2.velocity_y, friction_dv2);
    friction_dv2 = (-friction_angular_projector2).simd_mul_add(body2.angular_velocity, friction_dv2);

    let friction_dv = friction_dv1 + friction_dv2;

    let mut friction_delta_impulse = friction_dv * friction_comp_inv_mass;

    let reaction_force = normal_accumulated_impulse;
    let accumulated_impulse = friction_accumulated_impulse;

    let friction_force = accumulated_impulse + friction_delta_impulse;
    let reaction_force_scaled = reaction_force * SimdReal8::splat(FRICTION_COEFFICIENT);

    let friction_force_abs = friction_force.simd_abs();
    let reaction_force_scaled_signed = reaction_force_scaled * friction_force.simd_signum();
    let friction_delta_impulse_adjusted = reaction_force_scaled_signed - accumulated_impulse;

    friction_delta_impulse = friction_delta_impulse_adjusted.select(
        friction_force_abs.simd_gt(reaction_force_scaled),
        friction_delta_impulse,
    );

    friction_accumulated_impulse += friction_delta_impulse;

    body1.velocity_x =
        friction_comp_mass1_linear_x.simd_mul_add(friction_delta_impulse, body1.velocity_x);
    body1.velocity_y =
        friction_comp_mass1_linear_y.simd_mul_add(friction_delta_impulse, body1.velocity_y);
    body1.angular_velocity =
        friction_comp_mass1_angular.simd_mul_add(friction_delta_impulse, body1.angular_velocity);

    body2.velocity_x =
        friction_comp_mass2_linear_x.simd_mul_add(friction_delta_impulse, body2.velocity_x);
    body2.velocity_y =
        friction_comp_mass2_linear_y.simd_mul_add(friction_delta_impulse, body2.velocity_y);
    body2.angular_velocity =
        friction_comp_mass2_angular.simd_mul_add(friction_delta_impulse, body2.angular_velocity);

    normal_accumulated_impulse.store_to(&mut jp.normal_limiter_accumulated_impulse[ip..]);
    friction_accumulated_impulse.store_to(&mut jp.friction_limiter_accumulated_impulse[ip..]);

    normal_delta_impulse
        .simd_abs()
        .simd_max(friction_delta_impulse.simd_abs())
}

/// Solves the displacement row of one 8-joint sub-batch starting at lane
/// `ip` of the block, and returns the per-lane impulse applied.
#[inline(always)]
fn solve_displacement_half(
    jp: &mut ContactJointPacked<16>,
    ip: usize,
    body1: &mut BodyBatch,
    body2: &mut BodyBatch,
) -> SimdReal8 {
    let load = |vals: &[Real; 16]| SimdReal8::from_slice(&vals[ip..]);

    let normal_projector1_x = load(&jp.normal_limiter_normal_projector1_x);
    let normal_projector1_y = load(&jp.normal_limiter_normal_projector1_y);
    let normal_projector2_x = load(&jp.normal_limiter_normal_projector2_x);
    let normal_projector2_y = load(&jp.normal_limiter_normal_projector2_y);
    let normal_angular_projector1 = load(&jp.normal_limiter_angular_projector1);
    let normal_angular_projector2 = load(&jp.normal_limiter_angular_projector2);

    let normal_comp_mass1_linear_x = load(&jp.normal_limiter_comp_mass1_linear_x);
    let normal_comp_mass1_linear_y = load(&jp.normal_limiter_comp_mass1_linear_y);
    let normal_comp_mass2_linear_x = load(&jp.normal_limiter_comp_mass2_linear_x);
    let normal_comp_mass2_linear_y = load(&jp.normal_limiter_comp_mass2_linear_y);
    let normal_comp_mass1_angular = load(&jp.normal_limiter_comp_mass1_angular);
    let normal_comp_mass2_angular = load(&jp.normal_limiter_comp_mass2_angular);
    let normal_comp_inv_mass = load(&jp.normal_limiter_comp_inv_mass);
    let dst_displacing_velocity = load(&jp.normal_limiter_dst_displacing_velocity);
    let mut accumulated_displacing_impulse = load(&jp.normal_limiter_accumulated_displacing_impulse);

    let mut dv1 = dst_displacing_velocity;
    dv1 = (-normal_projector1_x).simd_mul_add(body1.velocity_x, dv1);
    dv1 = (-normal_projector1_y).simd_mul_add(body1.velocity_y, dv1);
    dv1 = (-normal_angular_projector1).simd_mul_add(body1.angular_velocity, dv1);

    let mut dv2 = SimdReal8::splat(0.0);
    dv2 = (-normal_projector2_x).simd_mul_add(body2.velocity_x, dv2);
    dv2 = (-normal_projector2_y).simd_mul_add(body2.velocity_y, dv2);
    dv2 = (-normal_angular_projector2).simd_mul_add(body2.angular_velocity, dv2);

    let dv = dv1 + dv2;

    let mut displacing_delta_impulse = dv * normal_comp_inv_mass;
    displacing_delta_impulse = displacing_delta_impulse.simd_max(-accumulated_displacing_impulse);

    body1.velocity_x =
        normal_comp_mass1_linear_x.simd_mul_add(displacing_delta_impulse, body1.velocity_x);
    body1.velocity_y =
        normal_comp_mass1_linear_y.simd_mul_add(displacing_delta_impulse, body1.velocity_y);
    body1.angular_velocity =
        normal_comp_mass1_angular.simd_mul_add(displacing_delta_impulse, body1.angular_velocity);

    body2.velocity_x =
        normal_comp_mass2_linear_x.simd_mul_add(displacing_delta_impulse, body2.velocity_x);
    body2.velocity_y =
        normal_comp_mass2_linear_y.simd_mul_add(displacing_delta_impulse, body2.velocity_y);
    body2.angular_velocity =
        normal_comp_mass2_angular.simd_mul_add(displacing_delta_impulse, body2.angular_velocity);

    accumulated_displacing_impulse += displacing_delta_impulse;
    accumulated_displacing_impulse
        .store_to(&mut jp.normal_limiter_accumulated_displacing_impulse[ip..]);

    displacing_delta_impulse.simd_abs()
}

#[inline(always)]
fn productive_lanes(cumulative_impulse: SimdReal8) -> [bool; 8] {
    std::array::from_fn(|l| cumulative_impulse.extract_lane(l) > PRODUCTIVE_IMPULSE)
}

fn solve_blocks(
    solve_bodies: &mut [SolveBody],
    joint_packed: &mut [ContactJointPacked<16>],
    joint_start: usize,
    joint_count: usize,
    iteration_index: i32,
    solve_half: fn(&mut ContactJointPacked<16>, usize, &mut BodyBatch, &mut BodyBatch) -> SimdReal8,
) -> bool {
    assert!(joint_start % 16 == 0 && joint_count % 16 == 0);
    debug_assert!(joint_packed.as_ptr() as usize % 64 == 0);

    let mut productive_any = false;

    for joint_index in (joint_start..joint_start + joint_count).step_by(16) {
        let jp = &mut joint_packed[joint_index / 16];

        let all_quiet = (0..16).all(|l| {
            let last_iteration1 = solve_bodies[jp.body1_index[l] as usize].last_iteration;
            let last_iteration2 = solve_bodies[jp.body2_index[l] as usize].last_iteration;
            last_iteration1.max(last_iteration2) <= iteration_index - 2
        });

        if all_quiet {
            continue;
        }

        // Both sub-batches gather pre-block state; their body sets are
        // disjoint by construction of the grouping pass.
        let mut body1_0 = BodyBatch::gather(solve_bodies, &jp.body1_index[0..8]);
        let mut body2_0 = BodyBatch::gather(solve_bodies, &jp.body2_index[0..8]);
        let mut body1_1 = BodyBatch::gather(solve_bodies, &jp.body1_index[8..16]);
        let mut body2_1 = BodyBatch::gather(solve_bodies, &jp.body2_index[8..16]);

        let cumulative_impulse_0 = solve_half(jp, 0, &mut body1_0, &mut body2_0);
        let cumulative_impulse_1 = solve_half(jp, 8, &mut body1_1, &mut body2_1);

        let productive_0 = productive_lanes(cumulative_impulse_0);
        let productive_1 = productive_lanes(cumulative_impulse_1);
        productive_any |= productive_0.iter().chain(&productive_1).any(|p| *p);

        body1_0.scatter(solve_bodies, &jp.body1_index[0..8], &productive_0, iteration_index);
        body2_0.scatter(solve_bodies, &jp.body2_index[0..8], &productive_0, iteration_index);
        body1_1.scatter(solve_bodies, &jp.body1_index[8..16], &productive_1, iteration_index);
        body2_1.scatter(solve_bodies, &jp.body2_index[8..16], &productive_1, iteration_index);
    }

    productive_any
}

/// One 16-wide impulse pass over the grouped prefix of the packed joints.
pub(crate) fn solve_joint_impulses_fma(
    solve_bodies: &mut [SolveBody],
    joint_packed: &mut [ContactJointPacked<16>],
    joint_start: usize,
    joint_count: usize,
    iteration_index: i32,
) -> bool {
    solve_blocks(
        solve_bodies,
        joint_packed,
        joint_start,
        joint_count,
        iteration_index,
        solve_impulse_half,
    )
}

/// One 16-wide displacement pass over the grouped prefix of the packed
/// joints.
pub(crate) fn solve_joint_displacement_fma(
    solve_bodies: &mut [SolveBody],
    joint_packed: &mut [ContactJointPacked<16>],
    joint_start: usize,
    joint_count: usize,
    iteration_index: i32,
) -> bool {
    solve_blocks(
        solve_bodies,
        joint_packed,
        joint_start,
        joint_count,
        iteration_index,
        solve_displacement_half,
    )
}
