//! Parameters controlling the bias velocities computed at pre-step time.

use crate::math::Real;

/// Parameters for the pre-step of the contact solver.
///
/// These only affect the target velocities written into the contact joints;
/// the iteration itself is controlled by the per-call iteration budgets.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct IntegrationParameters {
    /// The fraction of the penetration error fed back as a displacing
    /// target velocity at each step (default: `0.2`).
    ///
    /// Larger values resolve penetrations faster but are more likely to
    /// cause jitter on deep stacks.
    pub erp: Real,
    /// The penetration depth the solver tolerates without any positional
    /// correction (default: `0.01`).
    pub allowed_linear_error: Real,
    /// The approach speed below which no restitution is applied
    /// (default: `1.0`).
    ///
    /// This avoids jitter when objects are resting on each other.
    pub restitution_velocity_threshold: Real,
}

impl Default for IntegrationParameters {
    fn default() -> Self {
        Self {
            erp: 0.2,
            allowed_linear_error: 0.01,
            restitution_velocity_threshold: 1.0,
        }
    }
}
