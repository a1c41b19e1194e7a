//! The structure-of-arrays iteration kernels, generic over the lane count.
//!
//! One generic function covers the scalar (`f32`) and the 4- and 8-wide
//! implementations of each pass: the batch type decides how many joints are
//! solved per step of the loop. The grouping pass guarantees that all the
//! joints of a wide batch touch pairwise-disjoint bodies, so the gathered
//! body states can be updated and scattered back without any lane observing
//! a half-written neighbor.

use crate::dynamics::solver::{
    ContactJointPacked, SolveBody, FRICTION_COEFFICIENT, PRODUCTIVE_IMPULSE,
};
use crate::utils::WReal;
use simba::simd::{SimdPartialOrd, SimdSigned, SimdValue};

/// One impulse pass over `joint_count` joints starting at `joint_start`,
/// `B::WIDTH` joints at a time.
///
/// Returns `true` iff at least one joint applied an impulse larger than
/// [`PRODUCTIVE_IMPULSE`].
pub(crate) fn solve_joint_impulses<B: WReal, const N: usize>(
    solve_bodies: &mut [SolveBody],
    joint_packed: &mut [ContactJointPacked<N>],
    joint_start: usize,
    joint_count: usize,
    iteration_index: i32,
) -> bool {
    assert!(joint_start % B::WIDTH == 0 && joint_count % B::WIDTH == 0);
    debug_assert!(N.is_power_of_two() && B::WIDTH <= N);
    debug_assert!(joint_packed.as_ptr() as usize % (N * 4) == 0);

    let mut productive_any = false;

    for joint_index in (joint_start..joint_start + joint_count).step_by(B::WIDTH) {
        let jp = &mut joint_packed[joint_index / N];
        let ip = if B::WIDTH == N {
            0
        } else {
            joint_index & (N - 1)
        };

        // Skip the whole batch if every lane has been quiet for a full
        // iteration.
        let all_quiet = (0..B::WIDTH).all(|l| {
            let last_iteration1 = solve_bodies[jp.body1_index[ip + l] as usize].last_iteration;
            let last_iteration2 = solve_bodies[jp.body2_index[ip + l] as usize].last_iteration;
            last_iteration1.max(last_iteration2) <= iteration_index - 2
        });

        if all_quiet {
            continue;
        }

        let mut body1_velocity_x =
            B::from_fn(|l| solve_bodies[jp.body1_index[ip + l] as usize].velocity.x);
        let mut body1_velocity_y =
            B::from_fn(|l| solve_bodies[jp.body1_index[ip + l] as usize].velocity.y);
        let mut body1_angular_velocity =
            B::from_fn(|l| solve_bodies[jp.body1_index[ip + l] as usize].angular_velocity);

        let mut body2_velocity_x =
            B::from_fn(|l| solve_bodies[jp.body2_index[ip + l] as usize].velocity.x);
        let mut body2_velocity_y =
            B::from_fn(|l| solve_bodies[jp.body2_index[ip + l] as usize].velocity.y);
        let mut body2_angular_velocity =
            B::from_fn(|l| solve_bodies[jp.body2_index[ip + l] as usize].angular_velocity);

        let normal_projector1_x = B::from_slice(&jp.normal_limiter_normal_projector1_x[ip..]);
        let normal_projector1_y = B::from_slice(&jp.normal_limiter_normal_projector1_y[ip..]);
        let normal_projector2_x = B::from_slice(&jp.normal_limiter_normal_projector2_x[ip..]);
        let normal_projector2_y = B::from_slice(&jp.normal_limiter_normal_projector2_y[ip..]);
        let normal_angular_projector1 = B::from_slice(&jp.normal_limiter_angular_projector1[ip..]);
        let normal_angular_projector2 = B::from_slice(&jp.normal_limiter_angular_projector2[ip..]);

        let normal_comp_mass1_linear_x = B::from_slice(&jp.normal_limiter_comp_mass1_linear_x[ip..]);
        let normal_comp_mass1_linear_y = B::from_slice(&jp.normal_limiter_comp_mass1_linear_y[ip..]);
        let normal_comp_mass2_linear_x = B::from_slice(&jp.normal_limiter_comp_mass2_linear_x[ip..]);
        let normal_comp_mass2_linear_y = B::from_slice(&jp.normal_limiter_comp_mass2_linear_y[ip..]);
        let normal_comp_mass1_angular = B::from_slice(&jp.normal_limiter_comp_mass1_angular[ip..]);
        let normal_comp_mass2_angular = B::from_slice(&jp.normal_limiter_comp_mass2_angular[ip..]);
        let normal_comp_inv_mass = B::from_slice(&jp.normal_limiter_comp_inv_mass[ip..]);
        let mut normal_accumulated_impulse =
            B::from_slice(&jp.normal_limiter_accumulated_impulse[ip..]);
        let normal_dst_velocity = B::from_slice(&jp.normal_limiter_dst_velocity[ip..]);

        let friction_projector1_x = B::from_slice(&jp.friction_limiter_normal_projector1_x[ip..]);
        let friction_projector1_y = B::from_slice(&jp.friction_limiter_normal_projector1_y[ip..]);
        let friction_projector2_x = B::from_slice(&jp.friction_limiter_normal_projector2_x[ip..]);
        let friction_projector2_y = B::from_slice(&jp.friction_limiter_normal_projector2_y[ip..]);
        let friction_angular_projector1 =
            B::from_slice(&jp.friction_limiter_angular_projector1[ip..]);
        let friction_angular_projector2 =
            B::from_slice(&jp.friction_limiter_angular_projector2[ip..]);

        let friction_comp_mass1_linear_x =
            B::from_slice(&jp.friction_limiter_comp_mass1_linear_x[ip..]);
        let friction_comp_mass1_linear_y =
            B::from_slice(&jp.friction_limiter_comp_mass1_linear_y[ip..]);
        let friction_comp_mass2_linear_x =
            B::from_slice(&jp.friction_limiter_comp_mass2_linear_x[ip..]);
        let friction_comp_mass2_linear_y =
            B::from_slice(&jp.friction_limiter_comp_mass2_linear_y[ip..]);
        let friction_comp_mass1_angular =
            B::from_slice(&jp.friction_limiter_comp_mass1_angular[ip..]);
        let friction_comp_mass2_angular =
            B::from_slice(&jp.friction_limiter_comp_mass2_angular[ip..]);
        let friction_comp_inv_mass = B::from_slice(&jp.friction_limiter_comp_inv_mass[ip..]);
        let mut friction_accumulated_impulse =
            B::from_slice(&jp.friction_limiter_accumulated_impulse[ip..]);

        let mut normal_dv = normal_dst_velocity;

        normal_dv -= normal_projector1_x * body1_velocity_x;
        normal_dv -= normal_projector1_y * body1_velocity_y;
        normal_dv -= normal_angular_projector1 * body1_angular_velocity;

        normal_dv -= normal_projector2_x * body2_velocity_x;
        normal_dv -= normal_projector2_y * body2_velocity_y;
        normal_dv -= normal_angular_projector2 * body2_angular_velocity;

        let mut normal_delta_impulse = normal_dv * normal_comp_inv_mass;

        // One-sided complementarity: the total normal impulse stays
        // non-negative.
        normal_delta_impulse = normal_delta_impulse.simd_max(-normal_accumulated_impulse);

        body1_velocity_x += normal_comp_mass1_linear_x * normal_delta_impulse;
        body1_velocity_y += normal_comp_mass1_linear_y * normal_delta_impulse;
        body1_angular_velocity += normal_comp_mass1_angular * normal_delta_impulse;

        body2_velocity_x += normal_comp_mass2_linear_x * normal_delta_impulse;
        body2_velocity_y += normal_comp_mass2_linear_y * normal_delta_impulse;
        body2_angular_velocity += normal_comp_mass2_angular * normal_delta_impulse;

        normal_accumulated_impulse += normal_delta_impulse;

        // The friction row reads the velocities already updated by the
        // normal row.
        let mut friction_dv = B::splat(0.0);

        friction_dv -= friction_projector1_x * body1_velocity_x;
        friction_dv -= friction_projector1_y * body1_velocity_y;
        friction_dv -= friction_angular_projector1 * body1_angular_velocity;

        friction_dv -= friction_projector2_x * body2_velocity_x;
        friction_dv -= friction_projector2_y * body2_velocity_y;
        friction_dv -= friction_angular_projector2 * body2_angular_velocity;

        let mut friction_delta_impulse = friction_dv * friction_comp_inv_mass;

        let reaction_force = normal_accumulated_impulse;
        let accumulated_impulse = friction_accumulated_impulse;

        let friction_force = accumulated_impulse + friction_delta_impulse;
        let reaction_force_scaled = reaction_force * B::splat(FRICTION_COEFFICIENT);

        // Coulomb cap, branchless: clamp the total friction force to the
        // signed cap when its magnitude exceeds it.
        let friction_force_abs = friction_force.simd_abs();
        let reaction_force_scaled_signed = reaction_force_scaled * friction_force.simd_signum();
        let friction_delta_impulse_adjusted = reaction_force_scaled_signed - accumulated_impulse;

        friction_delta_impulse = friction_delta_impulse_adjusted.select(
            friction_force_abs.simd_gt(reaction_force_scaled),
            friction_delta_impulse,
        );

        friction_accumulated_impulse += friction_delta_impulse;

        body1_velocity_x += friction_comp_mass1_linear_x * friction_delta_impulse;
        body1_velocity_y += friction_comp_mass1_linear_y * friction_delta_impulse;
        body1_angular_velocity += friction_comp_mass1_angular * friction_delta_impulse;

        body2_velocity_x += friction_comp_mass2_linear_x * friction_delta_impulse;
        body2_velocity_y += friction_comp_mass2_linear_y * friction_delta_impulse;
        body2_angular_velocity += friction_comp_mass2_angular * friction_delta_impulse;

        normal_accumulated_impulse.store_to(&mut jp.normal_limiter_accumulated_impulse[ip..]);
        friction_accumulated_impulse.store_to(&mut jp.friction_limiter_accumulated_impulse[ip..]);

        let cumulative_impulse = normal_delta_impulse
            .simd_abs()
            .simd_max(friction_delta_impulse.simd_abs());

        for l in 0..B::WIDTH {
            let productive = cumulative_impulse.extract_lane(l) > PRODUCTIVE_IMPULSE;
            productive_any |= productive;

            let body1 = &mut solve_bodies[jp.body1_index[ip + l] as usize];
            body1.velocity.x = body1_velocity_x.extract_lane(l);
            body1.velocity.y = body1_velocity_y.extract_lane(l);
            body1.angular_velocity = body1_angular_velocity.extract_lane(l);
            if productive {
                body1.last_iteration = iteration_index;
            }

            let body2 = &mut solve_bodies[jp.body2_index[ip + l] as usize];
            body2.velocity.x = body2_velocity_x.extract_lane(l);
            body2.velocity.y = body2_velocity_y.extract_lane(l);
            body2.angular_velocity = body2_angular_velocity.extract_lane(l);
            if productive {
                body2.last_iteration = iteration_index;
            }
        }
    }

    productive_any
}

/// One displacement (positional-correction) pass. Same structure as the
/// impulse pass, restricted to the normal limiter acting on the displacing
/// velocity channel.
pub(crate) fn solve_joint_displacement<B: WReal, const N: usize>(
    solve_bodies: &mut [SolveBody],
    joint_packed: &mut [ContactJointPacked<N>],
    joint_start: usize,
    joint_count: usize,
    iteration_index: i32,
) -> bool {
    assert!(joint_start % B::WIDTH == 0 && joint_count % B::WIDTH == 0);
    debug_assert!(N.is_power_of_two() && B::WIDTH <= N);
    debug_assert!(joint_packed.as_ptr() as usize % (N * 4) == 0);

    let mut productive_any = false;

    for joint_index in (joint_start..joint_start + joint_count).step_by(B::WIDTH) {
        let jp = &mut joint_packed[joint_index / N];
        let ip = if B::WIDTH == N {
            0
        } else {
            joint_index & (N - 1)
        };

        let all_quiet = (0..B::WIDTH).all(|l| {
            let last_iteration1 = solve_bodies[jp.body1_index[ip + l] as usize].last_iteration;
            let last_iteration2 = solve_bodies[jp.body2_index[ip + l] as usize].last_iteration;
            last_iteration1.max(last_iteration2) <= iteration_index - 2
        });

        if all_quiet {
            continue;
        }

        let mut body1_velocity_x =
            B::from_fn(|l| solve_bodies[jp.body1_index[ip + l] as usize].velocity.x);
        let mut body1_velocity_y =
            B::from_fn(|l| solve_bodies[jp.body1_index[ip + l] as usize].velocity.y);
        let mut body1_angular_velocity =
            B::from_fn(|l| solve_bodies[jp.body1_index[ip + l] as usize].angular_velocity);

        let mut body2_velocity_x =
            B::from_fn(|l| solve_bodies[jp.body2_index[ip + l] as usize].velocity.x);
        let mut body2_velocity_y =
            B::from_fn(|l| solve_bodies[jp.body2_index[ip + l] as usize].velocity.y);
        let mut body2_angular_velocity =
            B::from_fn(|l| solve_bodies[jp.body2_index[ip + l] as usize].angular_velocity);

        let normal_projector1_x = B::from_slice(&jp.normal_limiter_normal_projector1_x[ip..]);
        let normal_projector1_y = B::from_slice(&jp.normal_limiter_normal_projector1_y[ip..]);
        let normal_projector2_x = B::from_slice(&jp.normal_limiter_normal_projector2_x[ip..]);
        let normal_projector2_y = B::from_slice(&jp.normal_limiter_normal_projector2_y[ip..]);
        let normal_angular_projector1 = B::from_slice(&jp.normal_limiter_angular_projector1[ip..]);
        let normal_angular_projector2 = B::from_slice(&jp.normal_limiter_angular_projector2[ip..]);

        let normal_comp_mass1_linear_x = B::from_slice(&jp.normal_limiter_comp_mass1_linear_x[ip..]);
        let normal_comp_mass1_linear_y = B::from_slice(&jp.normal_limiter_comp_mass1_linear_y[ip..]);
        let normal_comp_mass2_linear_x = B::from_slice(&jp.normal_limiter_comp_mass2_linear_x[ip..]);
        let normal_comp_mass2_linear_y = B::from_slice(&jp.normal_limiter_comp_mass2_linear_y[ip..]);
        let normal_comp_mass1_angular = B::from_slice(&jp.normal_limiter_comp_mass1_angular[ip..]);
        let normal_comp_mass2_angular = B::from_slice(&jp.normal_limiter_comp_mass2_angular[ip..]);
        let normal_comp_inv_mass = B::from_slice(&jp.normal_limiter_comp_inv_mass[ip..]);
        let dst_displacing_velocity =
            B::from_slice(&jp.normal_limiter_dst_displacing_velocity[ip..]);
        let mut accumulated_displacing_impulse =
            B::from_slice(&jp.normal_limiter_accumulated_displacing_impulse[ip..]);

        let mut dv = dst_displacing_velocity;

        dv -= normal_projector1_x * body1_velocity_x;
        dv -= normal_projector1_y * body1_velocity_y;
        dv -= normal_angular_projector1 * body1_angular_velocity;

        dv -= normal_projector2_x * body2_velocity_x;
        dv -= normal_projector2_y * body2_velocity_y;
        dv -= normal_angular_projector2 * body2_angular_velocity;

        let mut displacing_delta_impulse = dv * normal_comp_inv_mass;

        displacing_delta_impulse =
            displacing_delta_impulse.simd_max(-accumulated_displacing_impulse);

        body1_velocity_x += normal_comp_mass1_linear_x * displacing_delta_impulse;
        body1_velocity_y += normal_comp_mass1_linear_y * displacing_delta_impulse;
        body1_angular_velocity += normal_comp_mass1_angular * displacing_delta_impulse;

        body2_velocity_x += normal_comp_mass2_linear_x * displacing_delta_impulse;
        body2_velocity_y += normal_comp_mass2_linear_y * displacing_delta_impulse;
        body2_angular_velocity += normal_comp_mass2_angular * displacing_delta_impulse;

        accumulated_displacing_impulse += displacing_delta_impulse;

        accumulated_displacing_impulse
            .store_to(&mut jp.normal_limiter_accumulated_displacing_impulse[ip..]);

        let cumulative_impulse = displacing_delta_impulse.simd_abs();

        for l in 0..B::WIDTH {
            let productive = cumulative_impulse.extract_lane(l) > PRODUCTIVE_IMPULSE;
            productive_any |= productive;

            let body1 = &mut solve_bodies[jp.body1_index[ip + l] as usize];
            body1.velocity.x = body1_velocity_x.extract_lane(l);
            body1.velocity.y = body1_velocity_y.extract_lane(l);
            body1.angular_velocity = body1_angular_velocity.extract_lane(l);
            if productive {
                body1.last_iteration = iteration_index;
            }

            let body2 = &mut solve_bodies[jp.body2_index[ip + l] as usize];
            body2.velocity.x = body2_velocity_x.extract_lane(l);
            body2.velocity.y = body2_velocity_y.extract_lane(l);
            body2.angular_velocity = body2_angular_velocity.extract_lane(l);
            if productive {
                body2.last_iteration = iteration_index;
            }
        }
    }

    productive_any
}
