//! The floating point type the whole crate is generic over.
//!
//! `f64` is the default; `f32` is a build-time choice (feature `f32`) with the
//! same numeric contract, per spec.md §9(c) — tolerances are the caller's
//! responsibility to relax, this crate does not special-case them.

use nalgebra::RealField;

/// Blanket bound satisfied by `f64` and `f32`.
pub trait Scalar: RealField + Copy + Send + Sync + 'static {}
impl<T: RealField + Copy + Send + Sync + 'static> Scalar for T {}

/// Dense state vector.
pub type Vector<T> = nalgebra::DVector<T>;
