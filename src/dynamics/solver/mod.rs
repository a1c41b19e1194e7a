//! The projected Gauss-Seidel contact solver and its backends.

pub use self::contact_joint::{ContactJoint, ContactPoint, Limiter};
pub use self::contact_solver::{Backend, ContactSolver};
pub use self::interaction_groups::InteractionGroups;
pub use self::packed_joint::ContactJointPacked;
pub(crate) use self::solve_body::SolveBody;

mod contact_joint;
mod contact_solver;
#[cfg(feature = "simd-is-enabled")]
mod fma_kernels;
mod interaction_groups;
mod packed_joint;
mod solve_body;
mod wide_kernels;

use crate::math::Real;

/// The impulse magnitude below which an iteration is not considered
/// productive.
///
/// A joint whose two bodies received no impulse larger than this for a full
/// iteration is skipped, and a pass where no joint crosses this threshold
/// terminates the iteration loop early.
pub const PRODUCTIVE_IMPULSE: Real = 1.0e-4;

/// The Coulomb friction coefficient applied to every contact.
pub const FRICTION_COEFFICIENT: Real = 0.3;

// SAFETY: the caller must guarantee that the all-zeros bit pattern is a
// valid value of `T`.
pub(crate) unsafe fn reset_buffer<T>(buffer: &mut Vec<T>, len: usize) {
    buffer.clear();
    buffer.reserve(len);

    unsafe {
        buffer.as_mut_ptr().write_bytes(0, len);
        buffer.set_len(len);
    }
}
