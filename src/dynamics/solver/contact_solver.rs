//! The solver driver: owns the contact joints and the per-step scratch
//! buffers, and exposes one entry point per numerical backend.

#[cfg(feature = "simd-is-enabled")]
use crate::dynamics::solver::fma_kernels::{
    solve_joint_displacement_fma, solve_joint_impulses_fma,
};
use crate::dynamics::solver::wide_kernels::{solve_joint_displacement, solve_joint_impulses};
use crate::dynamics::solver::{
    reset_buffer, ContactJoint, ContactJointPacked, InteractionGroups, SolveBody,
    FRICTION_COEFFICIENT, PRODUCTIVE_IMPULSE,
};
use crate::dynamics::{IntegrationParameters, RigidBody};
use crate::math::Real;
#[cfg(feature = "simd-is-enabled")]
use crate::math::{SimdReal4, SimdReal8};
use crate::utils::index_mut2;

/// The numerical backend running the solver iterations.
///
/// All backends produce numerically equivalent results (up to floating-point
/// reordering); they differ only in memory layout and lane count. The
/// scalar backends are always available; the wide backends are only
/// worthwhile on CPUs with the matching vector units.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Backend {
    /// Iterates the rigid-bodies directly in array-of-structs form.
    Aos,
    /// Structure-of-arrays layout solved one joint at a time.
    SoaScalar,
    /// Structure-of-arrays layout solved 4 joints at a time.
    #[cfg(feature = "simd-is-enabled")]
    Simd4,
    /// Structure-of-arrays layout solved 8 joints at a time.
    #[cfg(feature = "simd-is-enabled")]
    Simd8,
    /// Structure-of-arrays layout solved 16 joints at a time as two
    /// interleaved 8-wide sub-batches with fused multiply-adds.
    #[cfg(feature = "simd-is-enabled")]
    Simd16,
}

impl Backend {
    /// Picks the widest backend profitable on the current CPU.
    ///
    /// 128-bit vectors are assumed everywhere; the 8- and 16-wide backends
    /// are only selected when 256-bit vectors (and fused multiply-adds for
    /// the 16-wide one) are actually available.
    pub fn detect() -> Self {
        #[cfg(all(
            feature = "simd-is-enabled",
            any(target_arch = "x86", target_arch = "x86_64")
        ))]
        {
            let backend = if std::arch::is_x86_feature_detected!("avx2") {
                if std::arch::is_x86_feature_detected!("fma") {
                    Backend::Simd16
                } else {
                    Backend::Simd8
                }
            } else {
                Backend::Simd4
            };
            log::debug!("detected contact solver backend: {:?}", backend);
            return backend;
        }

        #[cfg(all(
            feature = "simd-is-enabled",
            not(any(target_arch = "x86", target_arch = "x86_64"))
        ))]
        {
            return Backend::Simd4;
        }

        #[allow(unreachable_code)]
        Backend::SoaScalar
    }
}

/// The projected Gauss-Seidel contact solver.
///
/// The solver owns the contact joints (inserted and removed by the caller's
/// manifold layer between steps) and all the scratch buffers needed by the
/// structure-of-arrays backends. Bodies stay owned by the caller: the
/// joints reference them by index.
#[derive(Clone, Default)]
pub struct ContactSolver {
    /// The active contact joints.
    pub contact_joints: Vec<ContactJoint>,

    solve_bodies_impulse: Vec<SolveBody>,
    solve_bodies_displacement: Vec<SolveBody>,
    interaction_groups: InteractionGroups,

    joint_packed4: Vec<ContactJointPacked<4>>,
    #[cfg(feature = "simd-is-enabled")]
    joint_packed8: Vec<ContactJointPacked<8>>,
    #[cfg(feature = "simd-is-enabled")]
    joint_packed16: Vec<ContactJointPacked<16>>,
}

impl ContactSolver {
    /// Creates a solver with no contact joints.
    pub fn new() -> Self {
        Self::default()
    }

    /// Recomputes the world-space geometry of every joint from the current
    /// body poses.
    #[cfg(not(feature = "parallel"))]
    #[profiling::function]
    pub fn refresh_joints(&mut self, bodies: &[RigidBody]) {
        for joint in &mut self.contact_joints {
            let body1 = &bodies[joint.body1_index as usize];
            let body2 = &bodies[joint.body2_index as usize];
            joint.refresh(body1, body2);
        }
    }

    /// Recomputes the world-space geometry of every joint from the current
    /// body poses, in parallel. Each joint only writes itself, so this is a
    /// plain parallel loop.
    #[cfg(feature = "parallel")]
    #[profiling::function]
    pub fn refresh_joints(&mut self, bodies: &[RigidBody]) {
        use rayon::prelude::*;

        self.contact_joints.par_iter_mut().for_each(|joint| {
            let body1 = &bodies[joint.body1_index as usize];
            let body2 = &bodies[joint.body2_index as usize];
            joint.refresh(body1, body2);
        });
    }

    /// Rebuilds the limiters of every joint from the refreshed geometry.
    #[profiling::function]
    pub fn pre_step_joints(&mut self, bodies: &[RigidBody], params: &IntegrationParameters) {
        for joint in &mut self.contact_joints {
            let body1 = &bodies[joint.body1_index as usize];
            let body2 = &bodies[joint.body2_index as usize];
            joint.pre_step(body1, body2, params);
        }
    }

    /// Runs up to `contact_iterations` impulse passes followed by up to
    /// `displacement_iterations` displacement passes with the given backend.
    ///
    /// Returns the average number of iterations that were productive per
    /// joint (`NaN` if there are no joints).
    pub fn solve(
        &mut self,
        backend: Backend,
        bodies: &mut [RigidBody],
        contact_iterations: usize,
        displacement_iterations: usize,
    ) -> Real {
        match backend {
            Backend::Aos => self.solve_aos(bodies, contact_iterations, displacement_iterations),
            Backend::SoaScalar => {
                self.solve_soa_scalar(bodies, contact_iterations, displacement_iterations)
            }
            #[cfg(feature = "simd-is-enabled")]
            Backend::Simd4 => {
                self.solve_soa_simd4(bodies, contact_iterations, displacement_iterations)
            }
            #[cfg(feature = "simd-is-enabled")]
            Backend::Simd8 => {
                self.solve_soa_simd8(bodies, contact_iterations, displacement_iterations)
            }
            #[cfg(feature = "simd-is-enabled")]
            Backend::Simd16 => {
                self.solve_soa_simd16(bodies, contact_iterations, displacement_iterations)
            }
        }
    }

    /// Solves the joints directly against the rigid-bodies, without any
    /// repacking. This is the reference implementation the other backends
    /// are measured against.
    #[profiling::function]
    pub fn solve_aos(
        &mut self,
        bodies: &mut [RigidBody],
        contact_iterations: usize,
        displacement_iterations: usize,
    ) -> Real {
        for body in bodies.iter_mut() {
            body.last_iteration = -1;
            body.last_displacement_iteration = -1;
        }

        for iteration_index in 0..contact_iterations as i32 {
            if !solve_joint_impulses_aos(&mut self.contact_joints, bodies, iteration_index) {
                break;
            }
        }

        for iteration_index in 0..displacement_iterations as i32 {
            if !solve_joint_displacement_aos(&mut self.contact_joints, bodies, iteration_index) {
                break;
            }
        }

        self.solve_finish_aos(bodies)
    }

    /// Solves the joints in structure-of-arrays form, one joint at a time.
    #[profiling::function]
    pub fn solve_soa_scalar(
        &mut self,
        bodies: &mut [RigidBody],
        contact_iterations: usize,
        displacement_iterations: usize,
    ) -> Real {
        solve_prepare_soa(
            bodies,
            &self.contact_joints,
            &mut self.interaction_groups,
            &mut self.joint_packed4,
            &mut self.solve_bodies_impulse,
            &mut self.solve_bodies_displacement,
            1,
        );

        let joint_count = self.contact_joints.len();

        for iteration_index in 0..contact_iterations as i32 {
            let productive = solve_joint_impulses::<Real, 4>(
                &mut self.solve_bodies_impulse,
                &mut self.joint_packed4,
                0,
                joint_count,
                iteration_index,
            );

            if !productive {
                break;
            }
        }

        for iteration_index in 0..displacement_iterations as i32 {
            let productive = solve_joint_displacement::<Real, 4>(
                &mut self.solve_bodies_displacement,
                &mut self.joint_packed4,
                0,
                joint_count,
                iteration_index,
            );

            if !productive {
                break;
            }
        }

        solve_finish_soa(
            bodies,
            &mut self.contact_joints,
            &self.interaction_groups,
            &self.joint_packed4,
            &self.solve_bodies_impulse,
            &self.solve_bodies_displacement,
        )
    }

    /// Solves the joints 4 at a time with 128-bit vectors, falling back to
    /// the scalar kernel for the ungrouped tail.
    #[cfg(feature = "simd-is-enabled")]
    #[profiling::function]
    pub fn solve_soa_simd4(
        &mut self,
        bodies: &mut [RigidBody],
        contact_iterations: usize,
        displacement_iterations: usize,
    ) -> Real {
        let group_offset = solve_prepare_soa(
            bodies,
            &self.contact_joints,
            &mut self.interaction_groups,
            &mut self.joint_packed4,
            &mut self.solve_bodies_impulse,
            &mut self.solve_bodies_displacement,
            4,
        );

        let joint_count = self.contact_joints.len();

        for iteration_index in 0..contact_iterations as i32 {
            let mut productive = false;

            productive |= solve_joint_impulses::<SimdReal4, 4>(
                &mut self.solve_bodies_impulse,
                &mut self.joint_packed4,
                0,
                group_offset,
                iteration_index,
            );
            productive |= solve_joint_impulses::<Real, 4>(
                &mut self.solve_bodies_impulse,
                &mut self.joint_packed4,
                group_offset,
                joint_count - group_offset,
                iteration_index,
            );

            if !productive {
                break;
            }
        }

        for iteration_index in 0..displacement_iterations as i32 {
            let mut productive = false;

            productive |= solve_joint_displacement::<SimdReal4, 4>(
                &mut self.solve_bodies_displacement,
                &mut self.joint_packed4,
                0,
                group_offset,
                iteration_index,
            );
            productive |= solve_joint_displacement::<Real, 4>(
                &mut self.solve_bodies_displacement,
                &mut self.joint_packed4,
                group_offset,
                joint_count - group_offset,
                iteration_index,
            );

            if !productive {
                break;
            }
        }

        solve_finish_soa(
            bodies,
            &mut self.contact_joints,
            &self.interaction_groups,
            &self.joint_packed4,
            &self.solve_bodies_impulse,
            &self.solve_bodies_displacement,
        )
    }

    /// Solves the joints 8 at a time with 256-bit vectors, falling back to
    /// the scalar kernel for the ungrouped tail.
    #[cfg(feature = "simd-is-enabled")]
    #[profiling::function]
    pub fn solve_soa_simd8(
        &mut self,
        bodies: &mut [RigidBody],
        contact_iterations: usize,
        displacement_iterations: usize,
    ) -> Real {
        let group_offset = solve_prepare_soa(
            bodies,
            &self.contact_joints,
            &mut self.interaction_groups,
            &mut self.joint_packed8,
            &mut self.solve_bodies_impulse,
            &mut self.solve_bodies_displacement,
            8,
        );

        let joint_count = self.contact_joints.len();

        for iteration_index in 0..contact_iterations as i32 {
            let mut productive = false;

            productive |= solve_joint_impulses::<SimdReal8, 8>(
                &mut self.solve_bodies_impulse,
                &mut self.joint_packed8,
                0,
                group_offset,
                iteration_index,
            );
            productive |= solve_joint_impulses::<Real, 8>(
                &mut self.solve_bodies_impulse,
                &mut self.joint_packed8,
                group_offset,
                joint_count - group_offset,
                iteration_index,
            );

            if !productive {
                break;
            }
        }

        for iteration_index in 0..displacement_iterations as i32 {
            let mut productive = false;

            productive |= solve_joint_displacement::<SimdReal8, 8>(
                &mut self.solve_bodies_displacement,
                &mut self.joint_packed8,
                0,
                group_offset,
                iteration_index,
            );
            productive |= solve_joint_displacement::<Real, 8>(
                &mut self.solve_bodies_displacement,
                &mut self.joint_packed8,
                group_offset,
                joint_count - group_offset,
                iteration_index,
            );

            if !productive {
                break;
            }
        }

        solve_finish_soa(
            bodies,
            &mut self.contact_joints,
            &self.interaction_groups,
            &self.joint_packed8,
            &self.solve_bodies_impulse,
            &self.solve_bodies_displacement,
        )
    }

    /// Solves the joints 16 at a time (two interleaved 8-wide sub-batches
    /// with fused multiply-adds), falling back to the scalar kernel for the
    /// ungrouped tail.
    #[cfg(feature = "simd-is-enabled")]
    #[profiling::function]
    pub fn solve_soa_simd16(
        &mut self,
        bodies: &mut [RigidBody],
        contact_iterations: usize,
        displacement_iterations: usize,
    ) -> Real {
        let group_offset = solve_prepare_soa(
            bodies,
            &self.contact_joints,
            &mut self.interaction_groups,
            &mut self.joint_packed16,
            &mut self.solve_bodies_impulse,
            &mut self.solve_bodies_displacement,
            16,
        );

        let joint_count = self.contact_joints.len();

        for iteration_index in 0..contact_iterations as i32 {
            let mut productive = false;

            productive |= solve_joint_impulses_fma(
                &mut self.solve_bodies_impulse,
                &mut self.joint_packed16,
                0,
                group_offset,
                iteration_index,
            );
            productive |= solve_joint_impulses::<Real, 16>(
                &mut self.solve_bodies_impulse,
                &mut self.joint_packed16,
                group_offset,
                joint_count - group_offset,
                iteration_index,
            );

            if !productive {
                break;
            }
        }

        for iteration_index in 0..displacement_iterations as i32 {
            let mut productive = false;

            productive |= solve_joint_displacement_fma(
                &mut self.solve_bodies_displacement,
                &mut self.joint_packed16,
                0,
                group_offset,
                iteration_index,
            );
            productive |= solve_joint_displacement::<Real, 16>(
                &mut self.solve_bodies_displacement,
                &mut self.joint_packed16,
                group_offset,
                joint_count - group_offset,
                iteration_index,
            );

            if !productive {
                break;
            }
        }

        solve_finish_soa(
            bodies,
            &mut self.contact_joints,
            &self.interaction_groups,
            &self.joint_packed16,
            &self.solve_bodies_impulse,
            &self.solve_bodies_displacement,
        )
    }

    fn solve_finish_aos(&self, bodies: &[RigidBody]) -> Real {
        let mut iteration_sum = 0;

        for joint in &self.contact_joints {
            let body1 = &bodies[joint.body1_index as usize];
            let body2 = &bodies[joint.body2_index as usize];

            // `+ 2`, not `+ 1`: a body that stayed quiet for exactly one
            // iteration still counts as productive through that iteration.
            iteration_sum += body1.last_iteration.max(body2.last_iteration) + 2;
            iteration_sum += body1
                .last_displacement_iteration
                .max(body2.last_displacement_iteration)
                + 2;
        }

        iteration_sum as Real / self.contact_joints.len() as Real
    }
}

fn solve_joint_impulses_aos(
    joints: &mut [ContactJoint],
    bodies: &mut [RigidBody],
    iteration_index: i32,
) -> bool {
    let mut productive_any = false;

    for joint in joints.iter_mut() {
        let (body1, body2) = index_mut2(
            bodies,
            joint.body1_index as usize,
            joint.body2_index as usize,
        );

        if body1.last_iteration < iteration_index - 1 && body2.last_iteration < iteration_index - 1
        {
            continue;
        }

        let normal = &mut joint.normal_limiter;

        let mut normal_dv = normal.dst_velocity;

        normal_dv -= normal.normal_projector1.x * body1.velocity.x;
        normal_dv -= normal.normal_projector1.y * body1.velocity.y;
        normal_dv -= normal.angular_projector1 * body1.angular_velocity;

        normal_dv -= normal.normal_projector2.x * body2.velocity.x;
        normal_dv -= normal.normal_projector2.y * body2.velocity.y;
        normal_dv -= normal.angular_projector2 * body2.angular_velocity;

        let mut normal_delta_impulse = normal_dv * normal.comp_inv_mass;

        if normal_delta_impulse + normal.accumulated_impulse < 0.0 {
            normal_delta_impulse = -normal.accumulated_impulse;
        }

        body1.velocity += normal.comp_mass1_linear * normal_delta_impulse;
        body1.angular_velocity += normal.comp_mass1_angular * normal_delta_impulse;

        body2.velocity += normal.comp_mass2_linear * normal_delta_impulse;
        body2.angular_velocity += normal.comp_mass2_angular * normal_delta_impulse;

        normal.accumulated_impulse += normal_delta_impulse;

        let reaction_force = normal.accumulated_impulse;
        let friction = &mut joint.friction_limiter;

        let mut friction_dv = 0.0;

        friction_dv -= friction.normal_projector1.x * body1.velocity.x;
        friction_dv -= friction.normal_projector1.y * body1.velocity.y;
        friction_dv -= friction.angular_projector1 * body1.angular_velocity;

        friction_dv -= friction.normal_projector2.x * body2.velocity.x;
        friction_dv -= friction.normal_projector2.y * body2.velocity.y;
        friction_dv -= friction.angular_projector2 * body2.angular_velocity;

        let mut friction_delta_impulse = friction_dv * friction.comp_inv_mass;

        let accumulated_impulse = friction.accumulated_impulse;
        let friction_force = accumulated_impulse + friction_delta_impulse;

        if friction_force.abs() > reaction_force * FRICTION_COEFFICIENT {
            let max_force = (reaction_force * FRICTION_COEFFICIENT).copysign(friction_force);
            friction_delta_impulse = max_force - accumulated_impulse;
        }

        friction.accumulated_impulse += friction_delta_impulse;

        body1.velocity += friction.comp_mass1_linear * friction_delta_impulse;
        body1.angular_velocity += friction.comp_mass1_angular * friction_delta_impulse;

        body2.velocity += friction.comp_mass2_linear * friction_delta_impulse;
        body2.angular_velocity += friction.comp_mass2_angular * friction_delta_impulse;

        let cumulative_impulse = normal_delta_impulse.abs().max(friction_delta_impulse.abs());

        if cumulative_impulse > PRODUCTIVE_IMPULSE {
            body1.last_iteration = iteration_index;
            body2.last_iteration = iteration_index;
            productive_any = true;
        }
    }

    productive_any
}

fn solve_joint_displacement_aos(
    joints: &mut [ContactJoint],
    bodies: &mut [RigidBody],
    iteration_index: i32,
) -> bool {
    let mut productive_any = false;

    for joint in joints.iter_mut() {
        let (body1, body2) = index_mut2(
            bodies,
            joint.body1_index as usize,
            joint.body2_index as usize,
        );

        if body1.last_displacement_iteration < iteration_index - 1
            && body2.last_displacement_iteration < iteration_index - 1
        {
            continue;
        }

        let normal = &mut joint.normal_limiter;

        let mut dv = normal.dst_displacing_velocity;

        dv -= normal.normal_projector1.x * body1.displacing_velocity.x;
        dv -= normal.normal_projector1.y * body1.displacing_velocity.y;
        dv -= normal.angular_projector1 * body1.displacing_angular_velocity;

        dv -= normal.normal_projector2.x * body2.displacing_velocity.x;
        dv -= normal.normal_projector2.y * body2.displacing_velocity.y;
        dv -= normal.angular_projector2 * body2.displacing_angular_velocity;

        let mut displacing_delta_impulse = dv * normal.comp_inv_mass;

        if displacing_delta_impulse + normal.accumulated_displacing_impulse < 0.0 {
            displacing_delta_impulse = -normal.accumulated_displacing_impulse;
        }

        body1.displacing_velocity += normal.comp_mass1_linear * displacing_delta_impulse;
        body1.displacing_angular_velocity += normal.comp_mass1_angular * displacing_delta_impulse;

        body2.displacing_velocity += normal.comp_mass2_linear * displacing_delta_impulse;
        body2.displacing_angular_velocity += normal.comp_mass2_angular * displacing_delta_impulse;

        normal.accumulated_displacing_impulse += displacing_delta_impulse;

        if displacing_delta_impulse.abs() > PRODUCTIVE_IMPULSE {
            body1.last_displacement_iteration = iteration_index;
            body2.last_displacement_iteration = iteration_index;
            productive_any = true;
        }
    }

    productive_any
}

#[profiling::function]
fn solve_prepare_soa<const N: usize>(
    bodies: &[RigidBody],
    joints: &[ContactJoint],
    groups: &mut InteractionGroups,
    joint_packed: &mut Vec<ContactJointPacked<N>>,
    solve_bodies_impulse: &mut Vec<SolveBody>,
    solve_bodies_displacement: &mut Vec<SolveBody>,
    group_size_target: usize,
) -> usize {
    solve_bodies_impulse.clear();
    solve_bodies_impulse.extend(bodies.iter().map(|body| SolveBody {
        velocity: body.velocity,
        angular_velocity: body.angular_velocity,
        last_iteration: -1,
    }));

    solve_bodies_displacement.clear();
    solve_bodies_displacement.extend(bodies.iter().map(|body| SolveBody {
        velocity: body.displacing_velocity,
        angular_velocity: body.displacing_angular_velocity,
        last_iteration: -1,
    }));

    let group_offset = groups.group_joints(bodies.len(), joints, group_size_target);

    // Zero-filled blocks keep the trailing lanes of the last block
    // solver-neutral: zero projectors and accumulators make their
    // contribution a no-op.
    unsafe { reset_buffer(joint_packed, joints.len().div_ceil(N)) };

    for (i, &joint_index) in groups.joint_index.iter().enumerate() {
        let joint = &joints[joint_index as usize];

        let jp = &mut joint_packed[i / N];
        let ip = i & (N - 1);

        jp.body1_index[ip] = joint.body1_index;
        jp.body2_index[ip] = joint.body2_index;

        jp.normal_limiter_normal_projector1_x[ip] = joint.normal_limiter.normal_projector1.x;
        jp.normal_limiter_normal_projector1_y[ip] = joint.normal_limiter.normal_projector1.y;
        jp.normal_limiter_normal_projector2_x[ip] = joint.normal_limiter.normal_projector2.x;
        jp.normal_limiter_normal_projector2_y[ip] = joint.normal_limiter.normal_projector2.y;
        jp.normal_limiter_angular_projector1[ip] = joint.normal_limiter.angular_projector1;
        jp.normal_limiter_angular_projector2[ip] = joint.normal_limiter.angular_projector2;

        jp.normal_limiter_comp_mass1_linear_x[ip] = joint.normal_limiter.comp_mass1_linear.x;
        jp.normal_limiter_comp_mass1_linear_y[ip] = joint.normal_limiter.comp_mass1_linear.y;
        jp.normal_limiter_comp_mass2_linear_x[ip] = joint.normal_limiter.comp_mass2_linear.x;
        jp.normal_limiter_comp_mass2_linear_y[ip] = joint.normal_limiter.comp_mass2_linear.y;
        jp.normal_limiter_comp_mass1_angular[ip] = joint.normal_limiter.comp_mass1_angular;
        jp.normal_limiter_comp_mass2_angular[ip] = joint.normal_limiter.comp_mass2_angular;
        jp.normal_limiter_comp_inv_mass[ip] = joint.normal_limiter.comp_inv_mass;
        jp.normal_limiter_accumulated_impulse[ip] = joint.normal_limiter.accumulated_impulse;

        jp.normal_limiter_dst_velocity[ip] = joint.normal_limiter.dst_velocity;
        jp.normal_limiter_dst_displacing_velocity[ip] =
            joint.normal_limiter.dst_displacing_velocity;
        jp.normal_limiter_accumulated_displacing_impulse[ip] =
            joint.normal_limiter.accumulated_displacing_impulse;

        jp.friction_limiter_normal_projector1_x[ip] = joint.friction_limiter.normal_projector1.x;
        jp.friction_limiter_normal_projector1_y[ip] = joint.friction_limiter.normal_projector1.y;
        jp.friction_limiter_normal_projector2_x[ip] = joint.friction_limiter.normal_projector2.x;
        jp.friction_limiter_normal_projector2_y[ip] = joint.friction_limiter.normal_projector2.y;
        jp.friction_limiter_angular_projector1[ip] = joint.friction_limiter.angular_projector1;
        jp.friction_limiter_angular_projector2[ip] = joint.friction_limiter.angular_projector2;

        jp.friction_limiter_comp_mass1_linear_x[ip] = joint.friction_limiter.comp_mass1_linear.x;
        jp.friction_limiter_comp_mass1_linear_y[ip] = joint.friction_limiter.comp_mass1_linear.y;
        jp.friction_limiter_comp_mass2_linear_x[ip] = joint.friction_limiter.comp_mass2_linear.x;
        jp.friction_limiter_comp_mass2_linear_y[ip] = joint.friction_limiter.comp_mass2_linear.y;
        jp.friction_limiter_comp_mass1_angular[ip] = joint.friction_limiter.comp_mass1_angular;
        jp.friction_limiter_comp_mass2_angular[ip] = joint.friction_limiter.comp_mass2_angular;
        jp.friction_limiter_comp_inv_mass[ip] = joint.friction_limiter.comp_inv_mass;
        jp.friction_limiter_accumulated_impulse[ip] = joint.friction_limiter.accumulated_impulse;
    }

    group_offset
}

#[profiling::function]
fn solve_finish_soa<const N: usize>(
    bodies: &mut [RigidBody],
    joints: &mut [ContactJoint],
    groups: &InteractionGroups,
    joint_packed: &[ContactJointPacked<N>],
    solve_bodies_impulse: &[SolveBody],
    solve_bodies_displacement: &[SolveBody],
) -> Real {
    for (body_index, body) in bodies.iter_mut().enumerate() {
        body.velocity = solve_bodies_impulse[body_index].velocity;
        body.angular_velocity = solve_bodies_impulse[body_index].angular_velocity;

        body.displacing_velocity = solve_bodies_displacement[body_index].velocity;
        body.displacing_angular_velocity = solve_bodies_displacement[body_index].angular_velocity;
    }

    // Only the accumulators survive the round-trip through the packed
    // blocks; everything else is recomputed at the next pre-step.
    for (i, &joint_index) in groups.joint_index.iter().enumerate() {
        let joint = &mut joints[joint_index as usize];

        let jp = &joint_packed[i / N];
        let ip = i & (N - 1);

        joint.normal_limiter.accumulated_impulse = jp.normal_limiter_accumulated_impulse[ip];
        joint.normal_limiter.accumulated_displacing_impulse =
            jp.normal_limiter_accumulated_displacing_impulse[ip];
        joint.friction_limiter.accumulated_impulse = jp.friction_limiter_accumulated_impulse[ip];
    }

    let mut iteration_sum = 0;

    for i in 0..joints.len() {
        let jp = &joint_packed[i / N];
        let ip = i & (N - 1);

        let body1_index = jp.body1_index[ip] as usize;
        let body2_index = jp.body2_index[ip] as usize;

        iteration_sum += solve_bodies_impulse[body1_index]
            .last_iteration
            .max(solve_bodies_impulse[body2_index].last_iteration)
            + 2;
        iteration_sum += solve_bodies_displacement[body1_index]
            .last_iteration
            .max(solve_bodies_displacement[body2_index].last_iteration)
            + 2;
    }

    iteration_sum as Real / joints.len() as Real
}
