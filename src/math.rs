//! Type aliases for the scalar and SIMD math types.

/// The scalar type used throughout the engine.
pub type Real = f32;

/// The 2-dimensional vector type.
pub type Vector<N> = na::Vector2<N>;

/// The 2-dimensional point type.
pub type Point<N> = na::Point2<N>;

/// The angular vector type: a plain scalar in 2D.
pub type AngVector<N> = N;

/// The rotation type (unit complex number in 2D).
pub type Rotation<N> = na::UnitComplex<N>;

/// The isometry type (a rotation followed by a translation).
pub type Isometry<N> = na::Isometry2<N>;

/// The 4-lanes SIMD float type.
#[cfg(feature = "simd-is-enabled")]
pub type SimdReal4 = simba::simd::WideF32x4;

/// The 8-lanes SIMD float type.
#[cfg(feature = "simd-is-enabled")]
pub type SimdReal8 = simba::simd::WideF32x8;
