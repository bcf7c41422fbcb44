//! A variable-step, variable-order BDF integrator for semi-explicit DAE
//! systems `M(t) dx/dt = f(x, t)`, with a possibly singular mass matrix,
//! Newton iteration, and sparse LU factorization.
//!
//! See `SPEC_FULL.md` in the repository root for the full contract this
//! crate implements.

mod bdf;
mod callback;
mod error;
mod jacobian;
mod linear_solver;
mod matrix;
mod options;
mod scalar;
mod stencil;

pub mod testing;

pub use bdf::{Bdf, State, Statistics};
pub use callback::{IdentityMass, Jacobian, MassMatrix, NullObserver, Observer, Rhs, ZeroMass};
pub use error::{Error, Result};
pub use jacobian::{AnalyticJacobian, FiniteDifferenceJacobian};
pub use linear_solver::SparseLuAdapter;
pub use matrix::{Csr, SparseMatrix};
pub use options::{SolverOptions, TimeSteppingController, K_MAX};
pub use scalar::{Scalar, Vector};

/// The external interface of spec.md §6: construct, optionally register an
/// observer, then `integrate` in place. A thin facade over [`Bdf`] — kept
/// separate so the host-facing name doesn't tie callers to the integrator's
/// internal module path.
pub struct Solver<T: Scalar + faer_traits::ComplexField, R: Rhs<T>, J: Jacobian<T>, M: MassMatrix<T>> {
    inner: Bdf<T, R, J, M>,
}

impl<T: Scalar + faer_traits::ComplexField, R: Rhs<T>, J: Jacobian<T>, M: MassMatrix<T>>
    Solver<T, R, J, M>
{
    pub fn new(rhs: R, jac: J, mass: M, options: SolverOptions<T>) -> Self {
        Self {
            inner: Bdf::new(rhs, jac, mass, options),
        }
    }

    pub fn set_observer(&mut self, observer: impl Observer<T> + 'static) {
        self.inner.set_observer(observer);
    }

    pub fn integrate(&mut self, x: &mut Vector<T>, t1: T) -> Result<(), T> {
        self.inner.integrate(x, t1)
    }

    pub fn statistics(&self) -> Statistics {
        self.inner.statistics()
    }

    pub fn state(&self) -> State {
        self.inner.state()
    }
}
