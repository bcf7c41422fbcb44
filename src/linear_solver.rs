//! Linear solver adapter, per spec.md §4.4.
//!
//! `faer`'s sparse LU is the one named third-party engine (the teacher
//! already depends on `faer` as its default backend); everything above this
//! module depends only on the three-phase contract
//! (`symbolic`/`numeric`/`solve`), not on `faer` itself.

use crate::error::Error;
use crate::matrix::Csr;
use crate::scalar::{Scalar, Vector};
use faer::linalg::solvers::SolveCore;
use faer::sparse::linalg::solvers::{Lu, SymbolicLu};
use faer::sparse::linalg::LuError;
use faer::sparse::{SparseColMat, Triplet};
use faer::{Conj, MatMut};
use faer_traits::ComplexField as FaerComplexField;

/// Owns the symbolic factorization, the current numeric factorization (if
/// any), and the sparsity-pattern fingerprint it was built from. Re-derives
/// the symbolic phase only when the fingerprint changes (spec.md §4.4).
pub struct SparseLuAdapter<T: Scalar + FaerComplexField> {
    n: usize,
    symbolic: Option<SymbolicLu<usize>>,
    numeric: Option<Lu<usize, T>>,
    fingerprint: Option<Vec<(usize, usize)>>,
}

impl<T: Scalar + FaerComplexField> SparseLuAdapter<T> {
    pub fn new(n: usize) -> Self {
        Self {
            n,
            symbolic: None,
            numeric: None,
            fingerprint: None,
        }
    }

    fn to_faer(a: &Csr<T>) -> SparseColMat<usize, T> {
        let mut triplets = Vec::with_capacity(a.nnz());
        for row in 0..a.nrows() {
            let start = a.row_offsets()[row];
            let end = a.row_offsets()[row + 1];
            for k in start..end {
                triplets.push(Triplet::new(row, a.col_indices()[k], a.values()[k]));
            }
        }
        // `try_new_from_triplets` cannot fail here: indices come straight
        // from an already-`validate()`d Csr, so bounds and lengths are sound.
        SparseColMat::try_new_from_triplets(a.nrows(), a.ncols(), &triplets)
            .expect("csr-derived triplets are always in bounds")
    }

    /// Symbolic phase: analyze sparsity, build the elimination order.
    /// Re-run whenever the Jacobian's non-zero pattern changes, detected by
    /// comparing `fingerprint` against the one stored from the last call.
    fn ensure_symbolic(&mut self, a: &Csr<T>, fingerprint: &[(usize, usize)]) -> Result<(), Error<T>> {
        let pattern_changed = self.fingerprint.as_deref() != Some(fingerprint);
        if self.symbolic.is_none() || pattern_changed {
            let faer_mat = Self::to_faer(a);
            let symbolic = SymbolicLu::try_new(faer_mat.symbolic())
                .map_err(|_| Error::Memory)?;
            self.symbolic = Some(symbolic);
            self.fingerprint = Some(fingerprint.to_vec());
            // a pattern change invalidates any previously held factorization.
            self.numeric = None;
        }
        Ok(())
    }

    /// Numeric phase: LU-factor the current values against the cached
    /// symbolic structure. Call once per step, or once per Newton iteration
    /// if `fact_every_iter` is set.
    pub fn factor(&mut self, a: &Csr<T>) -> Result<(), Error<T>> {
        let fingerprint = a.pattern_fingerprint();
        self.ensure_symbolic(a, &fingerprint)?;
        let faer_mat = Self::to_faer(a);
        let symbolic = self.symbolic.clone().expect("symbolic phase just ensured");
        let t = T::zero();
        let numeric = Lu::try_new_with_symbolic(symbolic, faer_mat.as_ref()).map_err(|e| match e {
            LuError::SymbolicSingular { .. } => Error::Singular { t },
            LuError::Generic(_) => Error::Memory,
        })?;
        self.numeric = Some(numeric);
        Ok(())
    }

    /// Solve phase: back/forward substitution against the last numeric
    /// factorization. Call once per Newton iteration.
    pub fn solve(&self, b: &Vector<T>) -> Result<Vector<T>, Error<T>> {
        let numeric = self
            .numeric
            .as_ref()
            .ok_or(Error::Shape {
                reason: "solve() called before factor()",
            })?;
        let mut data: Vec<T> = b.iter().copied().collect();
        let rhs = MatMut::from_column_major_slice_mut(&mut data, self.n, 1);
        numeric.solve_in_place_with_conj(Conj::No, rhs);
        if !data.iter().all(|v| v.is_finite()) {
            return Err(Error::NumericBreakdown { t: T::zero() });
        }
        Ok(Vector::from_vec(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::SparseMatrix;

    #[test]
    fn solves_small_diagonal_system() {
        let mut m: SparseMatrix<f64> = SparseMatrix::new(3);
        m.push(2.0, 0, 0);
        m.push(3.0, 1, 1);
        m.push(4.0, 2, 2);
        let csr = m.finalize().unwrap();

        let mut adapter: SparseLuAdapter<f64> = SparseLuAdapter::new(3);
        adapter.factor(&csr).unwrap();
        let b = Vector::from_vec(vec![2.0, 6.0, 12.0]);
        let x = adapter.solve(&b).unwrap();
        assert!((x[0] - 1.0).abs() < 1e-10);
        assert!((x[1] - 2.0).abs() < 1e-10);
        assert!((x[2] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn solve_without_factor_is_shape_error() {
        let adapter: SparseLuAdapter<f64> = SparseLuAdapter::new(2);
        let b = Vector::from_vec(vec![1.0, 1.0]);
        assert!(matches!(adapter.solve(&b), Err(Error::Shape { .. })));
    }

    #[test]
    fn refactors_when_pattern_changes() {
        let mut m1: SparseMatrix<f64> = SparseMatrix::new(2);
        m1.push(1.0, 0, 0);
        m1.push(1.0, 1, 1);
        let csr1 = m1.finalize().unwrap();

        let mut m2: SparseMatrix<f64> = SparseMatrix::new(2);
        m2.push(1.0, 0, 0);
        m2.push(1.0, 0, 1);
        m2.push(1.0, 1, 1);
        let csr2 = m2.finalize().unwrap();

        let mut adapter: SparseLuAdapter<f64> = SparseLuAdapter::new(2);
        adapter.factor(&csr1).unwrap();
        let fp1 = adapter.fingerprint.clone();
        adapter.factor(&csr2).unwrap();
        let fp2 = adapter.fingerprint.clone();
        assert_ne!(fp1, fp2);
        let b = Vector::from_vec(vec![2.0, 3.0]);
        let x = adapter.solve(&b).unwrap();
        assert!((x[1] - 3.0).abs() < 1e-10);
        assert!((x[0] - (2.0 - 3.0)).abs() < 1e-10);
    }
}
