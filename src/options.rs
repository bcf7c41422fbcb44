//! Solver configuration, per spec.md §3/§6.

use crate::scalar::Scalar;
use serde::{Deserialize, Serialize};

/// Step controller variant. spec.md §9(b) leaves the choice among these
/// three named controllers to the implementer; see DESIGN.md for why
/// `AdaptiveH211b` is the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeSteppingController {
    /// PI step control (the H211b controller).
    AdaptiveH211b,
    /// Accept the predicted step whenever it keeps `h` within
    /// `[dt_min, dt_max]`, without the PI correction term — a cheaper,
    /// less reactive controller for problems with a smooth error profile.
    SimpleStability,
    /// No adaptation: `h = dt_init` for the whole run, order is still
    /// adapted as usual.
    Fixed,
}

/// Immutable-during-a-run solver options, per spec.md §3.
///
/// Does not carry a perturbation tolerance for the finite-difference Jacobian
/// estimator: `Bdf` is generic over a caller-supplied `J: Jacobian<T>`, built
/// and handed to `Bdf::new` before these options are consulted, so
/// `FiniteDifferenceJacobian::new`'s own `fd_tol`/`atol` constructor
/// arguments are the place that perturbation is configured.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "T: Serialize + for<'de2> Deserialize<'de2>")]
pub struct SolverOptions<T: Scalar> {
    pub t0: T,
    pub dt_init: T,
    pub dt_min: T,
    pub dt_max: T,
    pub atol: T,
    pub rtol: T,
    pub bdf_order: usize,
    pub time_stepping: TimeSteppingController,
    pub max_newton_iter: usize,
    pub newton_tol: T,
    pub fact_every_iter: bool,
    pub verbosity: u8,
}

impl<T: Scalar> Default for SolverOptions<T> {
    fn default() -> Self {
        let c = |v: f64| T::from_subset(&v);
        Self {
            t0: T::zero(),
            dt_init: c(1e-3),
            dt_min: c(1e-12),
            dt_max: c(1e6),
            atol: c(1e-6),
            rtol: c(1e-6),
            bdf_order: 5,
            time_stepping: TimeSteppingController::AdaptiveH211b,
            max_newton_iter: 4,
            newton_tol: c(1e-3),
            fact_every_iter: true,
            verbosity: 0,
        }
    }
}

/// History ring capacity, `K_max` of spec.md §3. Fixed — BDF orders above 6
/// are numerically unstable and no option in spec.md §3 exposes it.
pub const K_MAX: usize = 6;
