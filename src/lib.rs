//! # riposte2d
//!
//! riposte2d is the constraint-solver core of a 2-dimensional rigid-body
//! physics engine. Given a set of rigid bodies and the contact joints
//! produced by a narrow-phase, it advances body velocities and positional
//! corrections with a projected Gauss-Seidel iteration.
//!
//! The same iteration is implemented by several interchangeable backends:
//! - an array-of-structs backend operating on the rigid-bodies directly;
//! - a structure-of-arrays scalar backend;
//! - structure-of-arrays SIMD backends at widths 4, 8 and 16, fed by a
//!   grouping pass that sorts joints into batches touching pairwise-disjoint
//!   bodies so that all lanes can be solved concurrently without write
//!   hazards.
//!
//! All backends produce numerically equivalent results; the scalar backends
//! are always available as a correctness fallback.

#![deny(bare_trait_objects)]
#![warn(missing_docs)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::needless_range_loop)] // In the SIMD gather/scatter code using indices adds clarity.

pub extern crate nalgebra as na;
#[cfg(feature = "serde-serialize")]
#[macro_use]
extern crate serde;
extern crate num_traits as num;

#[cfg(feature = "parallel")]
pub use rayon;

#[cfg(all(feature = "simd-is-enabled", not(feature = "simd-stable")))]
std::compile_error!(
    "The `simd-is-enabled` feature should not be enabled explicitly. Please enable the `simd-stable` feature instead."
);

pub mod dynamics;
pub mod math;
pub mod utils;

pub use crate::dynamics::solver::{
    Backend, ContactJoint, ContactPoint, ContactSolver, Limiter, FRICTION_COEFFICIENT,
    PRODUCTIVE_IMPULSE,
};
pub use crate::dynamics::{IntegrationParameters, RigidBody};
