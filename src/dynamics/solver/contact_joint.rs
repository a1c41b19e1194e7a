//! Contact joints: the solver-owned constraint built from one narrow-phase
//! contact point.

use crate::dynamics::{IntegrationParameters, RigidBody};
use crate::math::{AngVector, Point, Real, Vector};
use num::Zero;

/// A world-space contact handed to the solver by the narrow-phase.
///
/// `point1` and `point2` are the witness points on each body and `normal` is
/// the unit contact normal pointing from the first body towards the second.
#[derive(Copy, Clone, Debug)]
pub struct ContactPoint {
    /// The contact point on the surface of the first body.
    pub point1: Point<Real>,
    /// The contact point on the surface of the second body.
    pub point2: Point<Real>,
    /// The unit contact normal, pointing from the first body towards the
    /// second.
    pub normal: Vector<Real>,
    /// The restitution coefficient of this contact.
    pub restitution: Real,
}

/// A single scalar constraint row.
///
/// A limiter carries the Jacobian of the constraint (the projectors), the
/// inverse-mass-weighted columns used to scatter an impulse back into body
/// state (the comp-masses), the effective mass along the constraint, the
/// target velocity and the accumulated impulse.
#[derive(Copy, Clone, Debug, Default)]
pub struct Limiter {
    /// The linear part of the Jacobian row applied to the first body.
    pub normal_projector1: Vector<Real>,
    /// The linear part of the Jacobian row applied to the second body.
    pub normal_projector2: Vector<Real>,
    /// The angular part of the Jacobian row applied to the first body.
    pub angular_projector1: AngVector<Real>,
    /// The angular part of the Jacobian row applied to the second body.
    pub angular_projector2: AngVector<Real>,
    /// Linear impulse-to-velocity-change column for the first body.
    pub comp_mass1_linear: Vector<Real>,
    /// Linear impulse-to-velocity-change column for the second body.
    pub comp_mass2_linear: Vector<Real>,
    /// Angular impulse-to-velocity-change column for the first body.
    pub comp_mass1_angular: AngVector<Real>,
    /// Angular impulse-to-velocity-change column for the second body.
    pub comp_mass2_angular: AngVector<Real>,
    /// The reciprocal of the effective mass along the constraint. Zero when
    /// both bodies have infinite mass.
    pub comp_inv_mass: Real,
    /// The target relative velocity along the constraint.
    pub dst_velocity: Real,
    /// The accumulated impulse, kept across steps for warm-starting. Always
    /// non-negative for the normal row.
    pub accumulated_impulse: Real,
    /// The target displacing velocity. Only used by the normal limiter.
    pub dst_displacing_velocity: Real,
    /// The accumulated displacing impulse. Only used by the normal limiter.
    pub accumulated_displacing_impulse: Real,
}

impl Limiter {
    /// Rebuilds the projectors, comp-masses and effective mass of this row
    /// for the constraint axis `axis` and the world-space anchors `r1`, `r2`.
    ///
    /// The row measures the relative velocity of the anchors along `axis`,
    /// positive when the bodies separate.
    fn rebuild(
        &mut self,
        axis: Vector<Real>,
        r1: Vector<Real>,
        r2: Vector<Real>,
        body1: &RigidBody,
        body2: &RigidBody,
    ) {
        self.normal_projector1 = -axis;
        self.normal_projector2 = axis;
        self.angular_projector1 = -r1.perp(&axis);
        self.angular_projector2 = r2.perp(&axis);

        self.comp_mass1_linear = self.normal_projector1 * body1.inv_mass;
        self.comp_mass2_linear = self.normal_projector2 * body2.inv_mass;
        self.comp_mass1_angular = self.angular_projector1 * body1.inv_inertia;
        self.comp_mass2_angular = self.angular_projector2 * body2.inv_inertia;

        let effective_inv_mass = self.normal_projector1.dot(&self.comp_mass1_linear)
            + self.normal_projector2.dot(&self.comp_mass2_linear)
            + self.angular_projector1 * self.comp_mass1_angular
            + self.angular_projector2 * self.comp_mass2_angular;

        // Two infinite-mass bodies yield a zero effective inverse mass: the
        // computed impulses stay finite (and zero) instead of dividing by 0.
        self.comp_inv_mass = if effective_inv_mass > 0.0 {
            1.0 / effective_inv_mass
        } else {
            0.0
        };
    }

    /// The current relative velocity measured by this row.
    fn relative_velocity(&self, body1: &RigidBody, body2: &RigidBody) -> Real {
        self.normal_projector1.dot(&body1.velocity)
            + self.angular_projector1 * body1.angular_velocity
            + self.normal_projector2.dot(&body2.velocity)
            + self.angular_projector2 * body2.angular_velocity
    }
}

/// One active contact constraint between two rigid-bodies.
///
/// A contact joint is created and destroyed by the manifold layer. Between
/// two solves it is refreshed (its geometry is recomputed from the current
/// body poses) and pre-stepped (its limiters are rebuilt). Only the three
/// accumulated impulses survive from one step to the next.
#[derive(Copy, Clone, Debug)]
pub struct ContactJoint {
    /// The index of the first body in the caller's body array.
    pub body1_index: u32,
    /// The index of the second body in the caller's body array.
    pub body2_index: u32,
    /// The non-penetration constraint row. Also carries the positional
    /// correction channel.
    pub normal_limiter: Limiter,
    /// The friction constraint row.
    pub friction_limiter: Limiter,

    local_anchor1: Vector<Real>,
    local_anchor2: Vector<Real>,
    local_normal1: Vector<Real>,
    restitution: Real,

    anchor1: Vector<Real>,
    anchor2: Vector<Real>,
    normal: Vector<Real>,
    penetration: Real,
}

impl ContactJoint {
    /// Creates a joint from a narrow-phase contact.
    ///
    /// The contact geometry is stored in body-local space so it can be
    /// refreshed against the poses of later steps.
    pub fn new(
        bodies: &[RigidBody],
        body1_index: u32,
        body2_index: u32,
        contact: &ContactPoint,
    ) -> Self {
        let body1 = &bodies[body1_index as usize];
        let body2 = &bodies[body2_index as usize];

        let delta1 = contact.point1.coords - body1.position.translation.vector;
        let delta2 = contact.point2.coords - body2.position.translation.vector;

        let mut result = Self {
            body1_index,
            body2_index,
            normal_limiter: Limiter::default(),
            friction_limiter: Limiter::default(),
            local_anchor1: body1.position.rotation.inverse_transform_vector(&delta1),
            local_anchor2: body2.position.rotation.inverse_transform_vector(&delta2),
            local_normal1: body1
                .position
                .rotation
                .inverse_transform_vector(&contact.normal),
            restitution: contact.restitution,
            anchor1: Vector::zero(),
            anchor2: Vector::zero(),
            normal: Vector::zero(),
            penetration: 0.0,
        };

        result.refresh(body1, body2);
        result
    }

    /// Recomputes the world-space contact geometry from the current body
    /// poses.
    ///
    /// This only reads the bodies and only writes the joint itself, so it is
    /// safe to run for all joints in parallel.
    pub fn refresh(&mut self, body1: &RigidBody, body2: &RigidBody) {
        self.anchor1 = body1.position.rotation * self.local_anchor1;
        self.anchor2 = body2.position.rotation * self.local_anchor2;
        self.normal = body1.position.rotation * self.local_normal1;

        let point1 = body1.position.translation.vector + self.anchor1;
        let point2 = body2.position.translation.vector + self.anchor2;
        self.penetration = -(point2 - point1).dot(&self.normal);
    }

    /// The penetration depth measured at the last refresh (positive when the
    /// bodies overlap).
    pub fn penetration(&self) -> Real {
        self.penetration
    }

    /// Rebuilds both limiters from the refreshed geometry and the body mass
    /// properties, and computes the target velocities.
    ///
    /// The accumulated normal and friction impulses are left untouched: the
    /// velocities they produced are still carried by the bodies, so keeping
    /// the accumulators is what warm-starts the next solve. The displacing
    /// impulse is reset because the integrator consumes the displacement
    /// channel at the end of every step.
    pub fn pre_step(
        &mut self,
        body1: &RigidBody,
        body2: &RigidBody,
        params: &IntegrationParameters,
    ) {
        self.normal_limiter
            .rebuild(self.normal, self.anchor1, self.anchor2, body1, body2);

        let tangent = Vector::new(-self.normal.y, self.normal.x);
        self.friction_limiter
            .rebuild(tangent, self.anchor1, self.anchor2, body1, body2);

        let approach_velocity = -self.normal_limiter.relative_velocity(body1, body2);
        self.normal_limiter.dst_velocity = if approach_velocity
            > params.restitution_velocity_threshold
        {
            self.restitution * approach_velocity
        } else {
            0.0
        };

        self.normal_limiter.dst_displacing_velocity =
            (self.penetration - params.allowed_linear_error).max(0.0) * params.erp;
        self.normal_limiter.accumulated_displacing_impulse = 0.0;

        self.friction_limiter.dst_velocity = 0.0;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::math::Isometry;
    use approx::assert_relative_eq;

    fn contact(x: Real, y: Real) -> ContactPoint {
        ContactPoint {
            point1: Point::new(x, y),
            point2: Point::new(x, y),
            normal: Vector::new(0.0, 1.0),
            restitution: 0.0,
        }
    }

    #[test]
    fn effective_mass_of_infinite_mass_pair_is_zero() {
        let bodies = [
            RigidBody::new_fixed(Isometry::identity()),
            RigidBody::new_fixed(Isometry::translation(0.0, 1.0)),
        ];

        let mut joint = ContactJoint::new(&bodies, 0, 1, &contact(0.0, 0.5));
        joint.pre_step(&bodies[0], &bodies[1], &IntegrationParameters::default());

        assert_eq!(joint.normal_limiter.comp_inv_mass, 0.0);
        assert_eq!(joint.friction_limiter.comp_inv_mass, 0.0);
    }

    #[test]
    fn refresh_tracks_the_poses() {
        let mut bodies = [
            RigidBody::new_fixed(Isometry::identity()),
            RigidBody::new_dynamic(Isometry::translation(0.0, 1.0), 1.0, 1.0),
        ];

        // Touching at creation time.
        let mut joint = ContactJoint::new(&bodies, 0, 1, &contact(0.0, 0.5));
        assert_relative_eq!(joint.penetration(), 0.0);

        // Sinking the second body by 0.1 must show up as penetration.
        bodies[1].position = Isometry::translation(0.0, 0.9);
        joint.refresh(&bodies[0], &bodies[1]);
        assert_relative_eq!(joint.penetration(), 0.1, epsilon = 1.0e-6);
    }

    #[test]
    fn pre_step_builds_opposed_jacobians() {
        let bodies = [
            RigidBody::new_fixed(Isometry::identity()),
            RigidBody::new_dynamic(Isometry::translation(0.0, 1.0), 2.0, 1.0),
        ];

        let mut joint = ContactJoint::new(&bodies, 0, 1, &contact(0.0, 0.5));
        joint.pre_step(&bodies[0], &bodies[1], &IntegrationParameters::default());

        let normal = &joint.normal_limiter;
        assert_relative_eq!(normal.normal_projector1, -normal.normal_projector2);
        // Only the second body is dynamic, so the effective mass is its own.
        assert_relative_eq!(normal.comp_inv_mass, 2.0, epsilon = 1.0e-6);
        assert_relative_eq!(normal.comp_mass1_linear, Vector::zeros());
        assert_relative_eq!(normal.comp_mass2_linear, Vector::new(0.0, 0.5));
    }
}
