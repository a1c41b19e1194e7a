//! Per-body mutable state mirrored out of the rigid-bodies for the
//! structure-of-arrays backends.

use crate::math::{AngVector, Real, Vector};
use num::Zero;

/// The solver-side view of one rigid-body: one velocity channel plus the
/// last-productive-iteration tag.
///
/// Two arrays of these are kept by the solver: one for the impulse pass and
/// one for the displacement pass. The struct is exactly 16 bytes and
/// 16-bytes aligned so a body fits a single 4-wide load.
#[repr(C, align(16))]
#[derive(Copy, Clone, Debug)]
pub(crate) struct SolveBody {
    pub velocity: Vector<Real>,
    pub angular_velocity: AngVector<Real>,
    pub last_iteration: i32,
}

const _: () = assert!(std::mem::size_of::<SolveBody>() == 16);
const _: () = assert!(std::mem::align_of::<SolveBody>() == 16);

impl Default for SolveBody {
    fn default() -> Self {
        Self {
            velocity: Vector::zero(),
            angular_velocity: 0.0,
            last_iteration: -1,
        }
    }
}
