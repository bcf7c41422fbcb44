//! User callback contracts, per spec.md §4.2.
//!
//! The teacher expresses its four callback shapes (RHS, Jacobian, Mass,
//! Observer) through inheritance from a `Callable`/`Op` base; spec.md §9
//! notes the underlying requirement is just dynamic dispatch on a fixed
//! single-method functor set. Expressed here as four plain traits with
//! blanket impls for closures of the matching signature, so a host can pass
//! `|x, t, f| { ... }` directly without implementing a trait by hand.

use crate::error::Error;
use crate::matrix::SparseMatrix;
use crate::scalar::{Scalar, Vector};

/// `(x, t) -> f`. Must not mutate `x`; `f` arrives pre-sized to `N`.
pub trait Rhs<T: Scalar> {
    fn call(&self, x: &Vector<T>, t: T, f: &mut Vector<T>);
}

impl<T: Scalar, F: Fn(&Vector<T>, T, &mut Vector<T>)> Rhs<T> for F {
    fn call(&self, x: &Vector<T>, t: T, f: &mut Vector<T>) {
        self(x, t, f)
    }
}

/// `(x, t) -> J = df/dx`, sparse. Implemented either by
/// [`crate::jacobian::AnalyticJacobian`] (user-supplied, trusted sparsity) or
/// [`crate::jacobian::FiniteDifferenceJacobian`] (numerical fallback).
pub trait Jacobian<T: Scalar> {
    fn call(&self, x: &Vector<T>, t: T) -> Result<SparseMatrix<T>, Error<T>>;
}

impl<T: Scalar, F: Fn(&Vector<T>, T) -> Result<SparseMatrix<T>, Error<T>>> Jacobian<T> for F {
    fn call(&self, x: &Vector<T>, t: T) -> Result<SparseMatrix<T>, Error<T>> {
        self(x, t)
    }
}

/// `(t) -> M`, writing into a caller-owned sparse matrix. Called at most once
/// per step (the BDF integrator memoizes the result when the mass matrix is
/// constant in time).
pub trait MassMatrix<T: Scalar> {
    fn call(&self, t: T, n: usize) -> SparseMatrix<T>;
}

/// The identity mass matrix — pure ODE, no algebraic constraints.
pub struct IdentityMass;

impl<T: Scalar> MassMatrix<T> for IdentityMass {
    fn call(&self, _t: T, n: usize) -> SparseMatrix<T> {
        SparseMatrix::identity(n)
    }
}

/// The zero mass matrix — a fully algebraic system. Legal but not a typical
/// input (spec.md §4.2).
pub struct ZeroMass;

impl<T: Scalar> MassMatrix<T> for ZeroMass {
    fn call(&self, _t: T, n: usize) -> SparseMatrix<T> {
        SparseMatrix::zero(n)
    }
}

impl<T: Scalar, F: Fn(T, usize) -> SparseMatrix<T>> MassMatrix<T> for F {
    fn call(&self, t: T, n: usize) -> SparseMatrix<T> {
        self(t, n)
    }
}

/// `(x, t) -> void`, called exactly once per accepted step, never on a
/// rejected trial. Observers may read but must not modify `x` — they receive
/// a shared reference.
pub trait Observer<T: Scalar> {
    fn call(&mut self, x: &Vector<T>, t: T);
}

impl<T: Scalar, F: FnMut(&Vector<T>, T)> Observer<T> for F {
    fn call(&mut self, x: &Vector<T>, t: T) {
        self(x, t)
    }
}

/// The no-op observer, used when the host registers none.
pub struct NullObserver;

impl<T: Scalar> Observer<T> for NullObserver {
    fn call(&mut self, _x: &Vector<T>, _t: T) {}
}
