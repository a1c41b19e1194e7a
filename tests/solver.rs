//! End-to-end tests of the contact solver, exercising every backend through
//! the public API only.

use approx::assert_relative_eq;
use riposte2d::math::{Isometry, Point, Real, Vector};
use riposte2d::{
    Backend, ContactJoint, ContactPoint, ContactSolver, IntegrationParameters, RigidBody,
    FRICTION_COEFFICIENT,
};

fn backends() -> Vec<Backend> {
    #[allow(unused_mut)]
    let mut backends = vec![Backend::Aos, Backend::SoaScalar];
    #[cfg(feature = "simd-is-enabled")]
    backends.extend([Backend::Simd4, Backend::Simd8, Backend::Simd16]);
    backends
}

fn touching_contact(x: Real, y: Real) -> ContactPoint {
    ContactPoint {
        point1: Point::new(x, y),
        point2: Point::new(x, y),
        normal: Vector::new(0.0, 1.0),
        restitution: 0.0,
    }
}

fn prepare(solver: &mut ContactSolver, bodies: &[RigidBody]) {
    solver.refresh_joints(bodies);
    solver.pre_step_joints(bodies, &IntegrationParameters::default());
}

/// Vertical stacks of unit boxes resting on one shared fixed ground, with
/// two contact points per interface and every box given the same downward
/// velocity kick.
fn box_stacks(towers: usize, height: usize, kick: Real) -> (Vec<RigidBody>, ContactSolver) {
    let mut bodies = vec![RigidBody::new_fixed(Isometry::identity())];
    let mut solver = ContactSolver::new();

    for tower in 0..towers {
        let tower_x = 3.0 * tower as Real;
        let first = bodies.len() as u32;

        for i in 0..height {
            let mut body = RigidBody::new_dynamic(
                Isometry::translation(tower_x, 0.5 + i as Real),
                1.0,
                1.0 / 6.0,
            );
            body.velocity.y = kick;
            bodies.push(body);
        }

        for interface in 0..height as u32 {
            let below = if interface == 0 { 0 } else { first + interface - 1 };
            let above = first + interface;

            for dx in [-0.45, 0.45] {
                let contact = touching_contact(tower_x + dx, interface as Real);
                solver
                    .contact_joints
                    .push(ContactJoint::new(&bodies, below, above, &contact));
            }
        }
    }

    prepare(&mut solver, &bodies);
    (bodies, solver)
}

fn box_stack(height: usize, kick: Real) -> (Vec<RigidBody>, ContactSolver) {
    box_stacks(1, height, kick)
}

#[test]
fn resting_contact_stops_the_falling_body() {
    for backend in backends() {
        let mut bodies = vec![
            RigidBody::new_fixed(Isometry::identity()),
            RigidBody::new_dynamic(Isometry::translation(0.0, 0.5), 1.0, 1.0),
        ];
        bodies[1].velocity = Vector::new(0.0, -1.0);

        let mut solver = ContactSolver::new();
        solver
            .contact_joints
            .push(ContactJoint::new(&bodies, 0, 1, &touching_contact(0.0, 0.0)));
        prepare(&mut solver, &bodies);

        // A small penetration bias: the body is allowed to keep sinking at
        // 0.01 units per second.
        solver.contact_joints[0].normal_limiter.dst_velocity = -0.01;

        solver.solve(backend, &mut bodies, 10, 10);

        assert!(
            bodies[1].velocity.y.abs() <= 0.02,
            "{backend:?}: velocity.y = {}",
            bodies[1].velocity.y
        );
        assert!(solver.contact_joints[0].normal_limiter.accumulated_impulse > 0.0);
    }
}

#[test]
fn empty_scene_returns_nan() {
    for backend in backends() {
        let mut solver = ContactSolver::new();
        let mut bodies = Vec::new();

        let average_iterations = solver.solve(backend, &mut bodies, 10, 10);
        assert!(average_iterations.is_nan());
    }
}

#[test]
fn infinite_mass_pair_is_unproductive() {
    for backend in backends() {
        let mut bodies = vec![
            RigidBody::new_fixed(Isometry::identity()),
            RigidBody::new_fixed(Isometry::translation(0.0, 1.0)),
        ];

        let mut solver = ContactSolver::new();
        solver
            .contact_joints
            .push(ContactJoint::new(&bodies, 0, 1, &touching_contact(0.0, 0.5)));
        prepare(&mut solver, &bodies);

        assert_eq!(solver.contact_joints[0].normal_limiter.comp_inv_mass, 0.0);

        // A single unproductive pass in each phase: the diagnostic counts
        // (max(-1, -1) + 2) per joint and per phase.
        let average_iterations = solver.solve(backend, &mut bodies, 10, 10);
        assert_eq!(average_iterations, 2.0);

        assert_eq!(bodies[0].velocity, Vector::new(0.0, 0.0));
        assert_eq!(bodies[1].velocity, Vector::new(0.0, 0.0));
    }
}

#[test]
fn friction_is_capped_by_the_normal_reaction() {
    for backend in backends() {
        let mut bodies = vec![
            RigidBody::new_fixed(Isometry::identity()),
            RigidBody::new_dynamic(Isometry::translation(0.0, 0.5), 1.0, 1.0),
        ];
        // Approaching at 10 (normal impulse converges to 10) while sliding
        // at 5 (friction would need 5 to stop it, but is capped at 3).
        bodies[1].velocity = Vector::new(-5.0, -10.0);

        let mut solver = ContactSolver::new();
        // Contact at the center of the dynamic body to keep its rotation
        // out of the picture.
        solver
            .contact_joints
            .push(ContactJoint::new(&bodies, 0, 1, &touching_contact(0.0, 0.5)));
        prepare(&mut solver, &bodies);

        solver.solve(backend, &mut bodies, 20, 0);

        let joint = &solver.contact_joints[0];
        assert_relative_eq!(
            joint.normal_limiter.accumulated_impulse,
            10.0,
            epsilon = 1.0e-3
        );
        assert_relative_eq!(
            joint.friction_limiter.accumulated_impulse.abs(),
            3.0,
            epsilon = 1.0e-3
        );
        // The box keeps sliding with whatever friction could not absorb.
        assert_relative_eq!(bodies[1].velocity.x, -2.0, epsilon = 1.0e-3);
    }
}

#[test]
fn accumulated_impulses_keep_their_sign_invariants() {
    for backend in backends() {
        for iterations in [1, 2, 5, 20] {
            let (mut bodies, mut solver) = box_stack(20, -1.0);

            solver.solve(backend, &mut bodies, iterations, iterations);

            for joint in &solver.contact_joints {
                let normal_impulse = joint.normal_limiter.accumulated_impulse;
                assert!(normal_impulse >= 0.0, "{backend:?}: negative normal impulse");
                assert!(
                    joint.normal_limiter.accumulated_displacing_impulse >= 0.0,
                    "{backend:?}: negative displacing impulse"
                );
                assert!(
                    joint.friction_limiter.accumulated_impulse.abs()
                        <= FRICTION_COEFFICIENT * normal_impulse + 1.0e-5,
                    "{backend:?}: friction impulse above the Coulomb cap"
                );
            }
        }
    }
}

#[test]
fn scalar_soa_matches_aos() {
    let (bodies, solver) = box_stack(30, -1.0);

    let mut bodies_aos = bodies.clone();
    let mut solver_aos = solver.clone();
    solver_aos.solve(Backend::Aos, &mut bodies_aos, 10, 10);

    let mut bodies_soa = bodies;
    let mut solver_soa = solver;
    solver_soa.solve(Backend::SoaScalar, &mut bodies_soa, 10, 10);

    // Same iteration order, same arithmetic: those two backends only differ
    // by the round-trip through the packed blocks.
    for (body_aos, body_soa) in bodies_aos.iter().zip(&bodies_soa) {
        assert_relative_eq!(body_aos.velocity, body_soa.velocity, epsilon = 1.0e-6);
        assert_relative_eq!(
            body_aos.angular_velocity,
            body_soa.angular_velocity,
            epsilon = 1.0e-6
        );
        assert_relative_eq!(
            body_aos.displacing_velocity,
            body_soa.displacing_velocity,
            epsilon = 1.0e-6
        );
    }

    for (joint_aos, joint_soa) in solver_aos.contact_joints.iter().zip(&solver_soa.contact_joints)
    {
        assert_relative_eq!(
            joint_aos.normal_limiter.accumulated_impulse,
            joint_soa.normal_limiter.accumulated_impulse,
            epsilon = 1.0e-6
        );
    }
}

#[test]
fn all_backends_agree_on_100_stacked_boxes() {
    // 20 stacks of 5 on a shared ground. Short chains relax well below the
    // productivity threshold within the budget for every iteration order,
    // so the comparison measures the backends' numerical agreement rather
    // than partially-converged ordering differences.
    let contact_iterations = 100;
    let displacement_iterations = 100;

    let (bodies, solver) = box_stacks(20, 5, -1.0);

    let mut reference_bodies = bodies.clone();
    let mut reference_solver = solver.clone();
    reference_solver.solve(
        Backend::SoaScalar,
        &mut reference_bodies,
        contact_iterations,
        displacement_iterations,
    );

    for backend in backends() {
        let mut backend_bodies = bodies.clone();
        let mut backend_solver = solver.clone();
        backend_solver.solve(
            backend,
            &mut backend_bodies,
            contact_iterations,
            displacement_iterations,
        );

        let max_difference = reference_bodies
            .iter()
            .zip(&backend_bodies)
            .map(|(reference, body)| {
                let linear = (reference.velocity - body.velocity).norm();
                let angular = (reference.angular_velocity - body.angular_velocity).abs();
                let displacing =
                    (reference.displacing_velocity - body.displacing_velocity).norm();
                linear.max(angular).max(displacing)
            })
            .fold(0.0, Real::max);

        assert!(
            max_difference <= 1.0e-3,
            "{backend:?} diverged from the scalar backend by {max_difference}"
        );
    }
}

#[test]
fn inflating_the_budget_after_early_exit_changes_nothing() {
    for backend in backends() {
        // A stack short enough to reach the non-productive exit well within
        // the smaller budget.
        let (bodies, solver) = box_stack(4, -1.0);

        let mut bodies_small = bodies.clone();
        let mut solver_small = solver.clone();
        let average_small = solver_small.solve(backend, &mut bodies_small, 80, 80);

        let mut bodies_large = bodies.clone();
        let mut solver_large = solver.clone();
        let average_large = solver_large.solve(backend, &mut bodies_large, 90, 90);

        // Both runs terminated through the non-productive early exit, so the
        // extra budget must be bit-for-bit invisible.
        assert_eq!(average_small, average_large);
        for (body_small, body_large) in bodies_small.iter().zip(&bodies_large) {
            assert_eq!(body_small.velocity, body_large.velocity);
            assert_eq!(body_small.angular_velocity, body_large.angular_velocity);
            assert_eq!(body_small.displacing_velocity, body_large.displacing_velocity);
        }
    }
}

#[test]
fn second_solve_of_a_static_scene_converges_faster() {
    for backend in backends() {
        // A resting stack of boxes each sunk 0.1 into its support: the
        // displacement phase has work to do on the first step, none on the
        // second.
        let mut bodies = vec![RigidBody::new_fixed(Isometry::identity())];
        let center = |i: u32| 0.45 + 0.9 * (i - 1) as Real;
        for i in 1..=10u32 {
            bodies.push(RigidBody::new_dynamic(
                Isometry::translation(0.0, center(i)),
                1.0,
                1.0 / 6.0,
            ));
        }

        let mut solver = ContactSolver::new();
        for interface in 0..10u32 {
            // Top surface of the body below, bottom surface of the body
            // above.
            let surface1 = if interface == 0 {
                0.0
            } else {
                center(interface) + 0.5
            };
            let surface2 = center(interface + 1) - 0.5;

            for x in [-0.45, 0.45] {
                let contact = ContactPoint {
                    point1: Point::new(x, surface1),
                    point2: Point::new(x, surface2),
                    normal: Vector::new(0.0, 1.0),
                    restitution: 0.0,
                };
                solver
                    .contact_joints
                    .push(ContactJoint::new(&bodies, interface, interface + 1, &contact));
            }
        }

        prepare(&mut solver, &bodies);
        let average_step1 = solver.solve(backend, &mut bodies, 200, 200);

        prepare(&mut solver, &bodies);
        let average_step2 = solver.solve(backend, &mut bodies, 200, 200);

        assert!(
            average_step2 <= average_step1 + 1.0e-6,
            "{backend:?}: step 2 used {average_step2} average iterations, step 1 {average_step1}"
        );
    }
}

#[test]
fn displacement_pass_pushes_penetrating_bodies_apart() {
    for backend in backends() {
        let mut bodies = vec![
            RigidBody::new_fixed(Isometry::identity()),
            // Sunk into the ground by 0.1.
            RigidBody::new_dynamic(Isometry::translation(0.0, 0.4), 1.0, 1.0),
        ];

        let mut solver = ContactSolver::new();
        let contact = ContactPoint {
            point1: Point::new(0.0, 0.0),
            point2: Point::new(0.0, -0.1),
            normal: Vector::new(0.0, 1.0),
            restitution: 0.0,
        };
        solver
            .contact_joints
            .push(ContactJoint::new(&bodies, 0, 1, &contact));
        prepare(&mut solver, &bodies);

        let params = IntegrationParameters::default();
        let expected_target = (0.1 - params.allowed_linear_error) * params.erp;
        assert_relative_eq!(
            solver.contact_joints[0].normal_limiter.dst_displacing_velocity,
            expected_target,
            epsilon = 1.0e-6
        );

        solver.solve(backend, &mut bodies, 0, 10);

        assert_relative_eq!(
            bodies[1].displacing_velocity.y,
            expected_target,
            epsilon = 1.0e-4
        );
        assert_eq!(bodies[0].displacing_velocity, Vector::new(0.0, 0.0));
        assert!(
            solver.contact_joints[0]
                .normal_limiter
                .accumulated_displacing_impulse
                > 0.0
        );
    }
}

#[test]
fn warm_started_accumulators_survive_the_soa_round_trip() {
    for backend in backends() {
        let (mut bodies, mut solver) = box_stack(5, -1.0);
        solver.solve(backend, &mut bodies, 20, 20);

        let impulses: Vec<Real> = solver
            .contact_joints
            .iter()
            .map(|joint| joint.normal_limiter.accumulated_impulse)
            .collect();
        assert!(impulses.iter().any(|impulse| *impulse > 0.0));

        // A second step with no new velocity to absorb must keep the
        // accumulators as-is instead of resetting them.
        prepare(&mut solver, &bodies);
        for (joint, impulse) in solver.contact_joints.iter().zip(&impulses) {
            assert_eq!(joint.normal_limiter.accumulated_impulse, *impulse);
        }
    }
}
