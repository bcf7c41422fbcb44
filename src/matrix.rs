//! Sparse matrix container, per spec.md §3/§4.1.
//!
//! Coordinate (triplet) form is the mutable/construction-time representation;
//! `finalize()` converts it to compressed-row form for consumption by the
//! linear solver adapter. Built on `nalgebra_sparse`'s `CooMatrix`/`CsrMatrix`
//! (the teacher already depends on `nalgebra-sparse`) with the `validate()`/
//! `kShape`/`clear()` contract spec.md mandates layered on top, since
//! `nalgebra_sparse` itself is permissive about duplicates and never reports
//! a "shape" error by that name.

use crate::error::Error;
use crate::scalar::Scalar;
use nalgebra_sparse::{coo::CooMatrix, csr::CsrMatrix};

/// A sparse matrix under construction: three parallel sequences of
/// `(value, row, col)` triplets. At most one entry per `(i, j)` pair after
/// `finalize()`; duplicates inserted before that are summed on conversion.
#[derive(Debug, Clone)]
pub struct SparseMatrix<T: Scalar> {
    coo: CooMatrix<T>,
    nrows: usize,
    ncols: usize,
}

impl<T: Scalar> SparseMatrix<T> {
    /// A new, empty `n x n` matrix.
    pub fn new(n: usize) -> Self {
        Self {
            coo: CooMatrix::new(n, n),
            nrows: n,
            ncols: n,
        }
    }

    /// Reserve capacity for `nnz` additional insertions.
    pub fn reserve(&mut self, nnz: usize) {
        self.coo.reserve(nnz);
    }

    /// Insert a `(value, row, col)` triplet. Indices must be in `[0, n)`.
    ///
    /// # Panics
    /// Panics if `row` or `col` is out of bounds, matching
    /// `nalgebra_sparse::CooMatrix::push`'s own contract; use [`Self::validate`]
    /// ahead of time if indices come from an untrusted source.
    pub fn push(&mut self, value: T, row: usize, col: usize) {
        self.coo.push(row, col, value);
    }

    /// Number of rows.
    pub fn nrows(&self) -> usize {
        self.nrows
    }

    /// Number of columns.
    pub fn ncols(&self) -> usize {
        self.ncols
    }

    /// Number of stored triplets, *including* duplicates (spec.md's
    /// `N_elements()`).
    pub fn n_elements(&self) -> usize {
        self.coo.nnz()
    }

    /// Discard all entries, keeping allocated capacity.
    pub fn clear(&mut self) {
        self.coo.clear_triplets();
    }

    /// Check the invariants of spec.md §3: indices in `[0, n)`, and (after
    /// conversion) a well-formed, row-major, column-ascending CSR layout with
    /// no duplicate `(i, j)` pair.
    pub fn validate(&self) -> Result<(), Error<T>> {
        for (i, j, _) in self.coo.triplet_iter() {
            if i >= self.nrows || j >= self.ncols {
                return Err(Error::Shape {
                    reason: "row or column index out of bounds",
                });
            }
        }
        Ok(())
    }

    /// Sorted list of distinct `(row, col)` pairs — the sparsity-pattern
    /// fingerprint used by the linear solver adapter (spec.md §4.4) and the
    /// Jacobian provider to detect a pattern change.
    pub fn pattern_fingerprint(&self) -> Vec<(usize, usize)> {
        let mut pairs: Vec<(usize, usize)> =
            self.coo.triplet_iter().map(|(i, j, _)| (i, j)).collect();
        pairs.sort_unstable();
        pairs.dedup();
        pairs
    }

    /// Convert to compressed-row form. Duplicate `(i, j)` entries are summed,
    /// per spec.md §4.1; rows are `0..n` ascending, columns within a row
    /// ascending.
    pub fn finalize(&self) -> Result<Csr<T>, Error<T>> {
        self.validate()?;
        let csr: CsrMatrix<T> = (&self.coo).into();
        Ok(Csr { inner: csr })
    }

    /// The `n x n` identity matrix — the "identity mass" standard instance of
    /// spec.md §4.2.
    pub fn identity(n: usize) -> Self {
        let mut m = Self::new(n);
        for i in 0..n {
            m.push(T::one(), i, i);
        }
        m
    }

    /// The `n x n` zero matrix — the "zero mass" standard instance of
    /// spec.md §4.2 (a fully algebraic system).
    pub fn zero(n: usize) -> Self {
        Self::new(n)
    }

    /// Iterate stored `(row, col, value)` triplets.
    pub fn triplet_iter(&self) -> impl Iterator<Item = (usize, usize, &T)> {
        self.coo.triplet_iter()
    }
}

/// Compressed-row form, produced by [`SparseMatrix::finalize`].
#[derive(Debug, Clone)]
pub struct Csr<T: Scalar> {
    inner: CsrMatrix<T>,
}

impl<T: Scalar> Csr<T> {
    pub fn nrows(&self) -> usize {
        self.inner.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.inner.ncols()
    }

    pub fn nnz(&self) -> usize {
        self.inner.nnz()
    }

    /// Row-pointer array of length `n + 1`.
    pub fn row_offsets(&self) -> &[usize] {
        self.inner.row_offsets()
    }

    /// Flat column-index array of length `nnz`.
    pub fn col_indices(&self) -> &[usize] {
        self.inner.col_indices()
    }

    /// Flat value array of length `nnz`.
    pub fn values(&self) -> &[T] {
        self.inner.values()
    }

    /// Validate the post-conversion invariants: no duplicate `(i, j)`
    /// survived, and the row/column layout is internally consistent.
    /// `nalgebra_sparse` enforces the latter by construction; this checks the
    /// former and the consistent-length invariant spec.md §4.1 requires.
    pub fn validate(&self) -> Result<(), Error<T>> {
        let offsets = self.inner.row_offsets();
        if offsets.len() != self.inner.nrows() + 1 {
            return Err(Error::Shape {
                reason: "row-pointer array length must be n + 1",
            });
        }
        if self.inner.col_indices().len() != self.inner.nnz()
            || self.inner.values().len() != self.inner.nnz()
        {
            return Err(Error::Shape {
                reason: "column-index/value arrays must have length nnz",
            });
        }
        for row in 0..self.inner.nrows() {
            let row_view = self.inner.row(row);
            let cols = row_view.col_indices();
            if !cols.windows(2).all(|w| w[0] < w[1]) {
                return Err(Error::Shape {
                    reason: "columns within a row must be strictly ascending",
                });
            }
        }
        Ok(())
    }

    /// Sorted list of `(row, col)` pairs with a stored (non-zero) entry —
    /// the same fingerprint concept as [`SparseMatrix::pattern_fingerprint`],
    /// computed from the compressed-row layout.
    pub fn pattern_fingerprint(&self) -> Vec<(usize, usize)> {
        let mut pairs = Vec::with_capacity(self.nnz());
        for row in 0..self.nrows() {
            let start = self.inner.row_offsets()[row];
            let end = self.inner.row_offsets()[row + 1];
            for &col in &self.inner.col_indices()[start..end] {
                pairs.push((row, col));
            }
        }
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_has_n_diagonal_ones() {
        let m: SparseMatrix<f64> = SparseMatrix::identity(5);
        assert_eq!(m.n_elements(), 5);
        let csr = m.finalize().unwrap();
        csr.validate().unwrap();
        assert_eq!(csr.nnz(), 5);
        assert!(csr.values().iter().all(|&v| v == 1.0));
    }

    #[test]
    fn zero_has_no_nonzeros() {
        let m: SparseMatrix<f64> = SparseMatrix::zero(4);
        let csr = m.finalize().unwrap();
        csr.validate().unwrap();
        assert_eq!(csr.nnz(), 0);
    }

    #[test]
    fn duplicate_entries_are_summed_on_conversion() {
        let mut m: SparseMatrix<f64> = SparseMatrix::new(2);
        m.push(1.0, 0, 0);
        m.push(2.0, 0, 0);
        m.push(5.0, 1, 1);
        let csr = m.finalize().unwrap();
        csr.validate().unwrap();
        assert_eq!(csr.nnz(), 2);
        let row0 = &csr.values()[..1];
        assert_eq!(row0[0], 3.0);
    }

    #[test]
    fn out_of_bounds_index_fails_validate() {
        let mut m: SparseMatrix<f64> = SparseMatrix::new(3);
        m.push(1.0, 0, 0);
        // construct a second matrix whose declared size doesn't match
        // usage to exercise validate() without panicking inside push().
        let oversized = SparseMatrix {
            coo: {
                let mut c = CooMatrix::new(5, 5);
                c.push(4, 4, 1.0);
                c.push(0, 0, 1.0);
                c
            },
            nrows: 3,
            ncols: 3,
        };
        assert!(oversized.validate().is_err());
        assert!(m.validate().is_ok());
    }

    #[test]
    fn row_major_column_ascending_round_trip() {
        let mut m: SparseMatrix<f64> = SparseMatrix::new(3);
        m.push(1.0, 1, 2);
        m.push(2.0, 1, 0);
        m.push(3.0, 0, 1);
        let csr = m.finalize().unwrap();
        csr.validate().unwrap();
        // row 1 should list columns [0, 2] ascending after finalize.
        let row1_start = csr.row_offsets()[1];
        let row1_end = csr.row_offsets()[2];
        let cols = &csr.col_indices()[row1_start..row1_end];
        assert!(cols.windows(2).all(|w| w[0] < w[1]));
    }
}
