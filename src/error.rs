//! Error taxonomy, per spec.md §7.
//!
//! One variant per failure kind. Unlike the teacher's `PSError` (a flat grab
//! bag covering sensitivity analysis, stepwise APIs and other ODE-only
//! surfaces this core doesn't have), every variant here is one of the seven
//! kinds spec.md §7 names, each carrying the state a caller needs to act on
//! it.

use thiserror::Error;

/// Failure kinds from spec.md §7. Generic over the scalar type so the
/// diagnostic context (`t`, residual norms) is reported at native precision.
#[derive(Error, Debug, Clone, Copy)]
pub enum Error<T: std::fmt::Display + std::fmt::Debug> {
    /// Sparse-matrix invariants violated (duplicate/out-of-range/length
    /// mismatch surviving `finalize()`).
    #[error("sparse matrix shape invariant violated: {reason}")]
    Shape { reason: &'static str },

    /// Iteration matrix `A = alpha_0 * M - h * J` singular at `(x, t)`.
    #[error("iteration matrix singular at t = {t}")]
    Singular { t: T },

    /// Linear-solver pivot/growth failure distinct from exact singularity.
    #[error("linear solver numeric breakdown at t = {t}")]
    NumericBreakdown { t: T },

    /// Newton iteration failed to converge after the retry policy of
    /// spec.md §4.5 (three order drops, five total rejections).
    #[error("Newton iteration did not converge at t = {t} after {rejections} rejections")]
    NonlinearFail { t: T, rejections: u32 },

    /// `h` was driven below `dt_min` by repeated rejections.
    #[error("step size underflow below dt_min at t = {t}")]
    StepUnderflow { t: T },

    /// Allocation failure in any subsystem.
    #[error("allocation failure")]
    Memory,

    /// RHS or Jacobian produced a non-finite value.
    #[error("non-finite value produced by user callback at t = {t}")]
    UserError { t: T },
}

pub type Result<T, S> = std::result::Result<T, Error<S>>;
