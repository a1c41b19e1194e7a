//! The rigid-body seen by the contact solver.

use crate::math::{AngVector, Isometry, Real, Vector};
use num::Zero;

/// A rigid-body.
///
/// The solver reads the pose and mass properties, and writes the velocities
/// as well as the displacing (positional-correction) velocities. Pose
/// integration itself is the responsibility of the caller.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct RigidBody {
    /// The world-space pose of this body.
    pub position: Isometry<Real>,
    /// The linear velocity of this body.
    pub velocity: Vector<Real>,
    /// The angular velocity of this body.
    pub angular_velocity: AngVector<Real>,
    /// The linear pseudo-velocity used for positional correction.
    ///
    /// It is solved by the displacement passes of the contact solver and is
    /// expected to be consumed (applied to the pose, then zeroed) by the
    /// caller's integrator at the end of each step.
    pub displacing_velocity: Vector<Real>,
    /// The angular pseudo-velocity used for positional correction.
    pub displacing_angular_velocity: AngVector<Real>,
    /// The inverse of the mass of this body (zero for a fixed body).
    pub inv_mass: Real,
    /// The inverse of the angular inertia of this body (zero for a fixed
    /// body or a body with locked rotations).
    pub inv_inertia: Real,
    /// Index of the last iteration that applied a significant impulse to
    /// this body. Managed by the array-of-structs solver backend.
    pub last_iteration: i32,
    /// Index of the last displacement iteration that applied a significant
    /// impulse to this body. Managed by the array-of-structs solver backend.
    pub last_displacement_iteration: i32,
}

impl RigidBody {
    /// Creates a dynamic rigid-body from its pose and mass properties.
    ///
    /// `mass` and `inertia` must be positive.
    pub fn new_dynamic(position: Isometry<Real>, mass: Real, inertia: Real) -> Self {
        assert!(mass > 0.0 && inertia > 0.0);

        Self {
            position,
            inv_mass: 1.0 / mass,
            inv_inertia: 1.0 / inertia,
            ..Self::new_fixed(Isometry::identity())
        }
    }

    /// Creates a fixed rigid-body: infinite mass and inertia, unaffected by
    /// any impulse.
    pub fn new_fixed(position: Isometry<Real>) -> Self {
        Self {
            position,
            velocity: Vector::zero(),
            angular_velocity: 0.0,
            displacing_velocity: Vector::zero(),
            displacing_angular_velocity: 0.0,
            inv_mass: 0.0,
            inv_inertia: 0.0,
            last_iteration: -1,
            last_displacement_iteration: -1,
        }
    }

    /// Is this body unaffected by impulses?
    pub fn is_fixed(&self) -> bool {
        self.inv_mass == 0.0 && self.inv_inertia == 0.0
    }
}
