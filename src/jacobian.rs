//! Jacobian provider, per spec.md §4.3.
//!
//! Composition over inheritance: [`FiniteDifferenceJacobian`] wraps any
//! [`Rhs`] impl and exposes the same [`Jacobian`] trait an analytical
//! Jacobian would, so the BDF integrator (`bdf.rs`) treats both as
//! interchangeable black boxes — spec.md §4.3's "the only observable
//! difference is cost".

use crate::callback::{Jacobian, Rhs};
use crate::error::Error;
use crate::matrix::SparseMatrix;
use crate::scalar::{Scalar, Vector};
use std::marker::PhantomData;

fn abs<T: Scalar>(x: T) -> T {
    if x < T::zero() {
        -x
    } else {
        x
    }
}

fn fmax<T: Scalar>(a: T, b: T) -> T {
    if a > b {
        a
    } else {
        b
    }
}

/// Numerical Jacobian estimator: column-wise forward difference on top of an
/// [`Rhs`] implementation.
///
/// Perturbs `x_j` by `max(|x_j| * eps, eps)` with `eps = fd_tol`, calls the
/// RHS `N + 1` times per evaluation (one base call, one per column), and
/// records entries whose magnitude exceeds `atol` as non-zeros. Column
/// perturbations are independent of one another and are evaluated in
/// parallel across a small, fixed number of OS threads via
/// `std::thread::scope` — the degree of parallelism spec.md §5 allows inside
/// this component, joined before `call` returns so no interleaving is
/// observable to the integrator.
pub struct FiniteDifferenceJacobian<T: Scalar, R: Rhs<T> + Sync> {
    rhs: R,
    fd_tol: T,
    atol: T,
    _marker: PhantomData<T>,
}

impl<T: Scalar, R: Rhs<T> + Sync> FiniteDifferenceJacobian<T, R> {
    pub fn new(rhs: R, fd_tol: T, atol: T) -> Self {
        Self {
            rhs,
            fd_tol,
            atol,
            _marker: PhantomData,
        }
    }
}

impl<T: Scalar, R: Rhs<T> + Sync> Jacobian<T> for FiniteDifferenceJacobian<T, R> {
    fn call(&self, x: &Vector<T>, t: T) -> Result<SparseMatrix<T>, Error<T>> {
        let n = x.len();
        let mut f0 = Vector::<T>::zeros(n);
        self.rhs.call(x, t, &mut f0);
        if !f0.iter().all(|v| v.is_finite()) {
            return Err(Error::UserError { t });
        }

        type Column<T> = Result<(usize, Vec<(usize, T)>), Error<T>>;
        let columns: Vec<Column<T>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..n)
                .map(|j| {
                    let f0 = &f0;
                    scope.spawn(move || {
                        let xj = x[j];
                        let h = fmax(abs(xj * self.fd_tol), self.fd_tol);
                        let mut xp = x.clone();
                        xp[j] = xj + h;
                        let mut fp = Vector::<T>::zeros(n);
                        self.rhs.call(&xp, t, &mut fp);
                        if !fp.iter().all(|v| v.is_finite()) {
                            return Err(Error::UserError { t });
                        }
                        let mut entries = Vec::new();
                        for i in 0..n {
                            let dfdx = (fp[i] - f0[i]) / h;
                            if !dfdx.is_finite() {
                                return Err(Error::UserError { t });
                            }
                            if abs(dfdx) > self.atol {
                                entries.push((i, dfdx));
                            }
                        }
                        Ok((j, entries))
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let mut jac = SparseMatrix::new(n);
        for column in columns {
            let (j, entries) = column?;
            for (i, value) in entries {
                jac.push(value, i, j);
            }
        }
        Ok(jac)
    }
}

/// Wraps a user-supplied analytical Jacobian closure/struct. A thin marker
/// over the bare [`Jacobian`] impl — kept as a named type so call sites read
/// the same way whether the Jacobian is analytical or estimated.
pub struct AnalyticJacobian<J>(pub J);

impl<T: Scalar, J: Jacobian<T>> Jacobian<T> for AnalyticJacobian<J> {
    fn call(&self, x: &Vector<T>, t: T) -> Result<SparseMatrix<T>, Error<T>> {
        self.0.call(x, t)
    }
}
