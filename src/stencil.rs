//! Finite-difference stencil arithmetic on arbitrarily (non-uniformly)
//! spaced time points — the numerical substrate for the BDF integrator's
//! predictor, corrector coefficients, and local-error estimate, all of
//! which spec.md §4.5 derives "from the divided-difference form of the BDF
//! polynomial on the actual timestamp stencil".
//!
//! Two primitives, both textbook (Fornberg 1988 for the weights; Newton's
//! triangular divided-difference table for the rest), chosen over carrying
//! the teacher's fixed-order Nordsieck/R-matrix rescaling forward: that
//! approach assumes a constant step size within an order and needs a
//! separate rescaling pass whenever `h` changes, where these two primitives
//! handle a fully non-uniform stencil directly and uniformly across orders.

use crate::scalar::{Scalar, Vector};

/// Finite-difference weights for derivatives of order `0..=max_order` of a
/// function sampled at `nodes`, evaluated at `x0` (Fornberg's algorithm).
///
/// Returns `weights[m][j]`: the coefficient of `f(nodes[j])` in the order-`m`
/// derivative approximation at `x0`. `nodes` need not be sorted or evenly
/// spaced, and `x0` need not coincide with any node.
pub fn fd_weights<T: Scalar>(nodes: &[T], x0: T, max_order: usize) -> Vec<Vec<T>> {
    let n = nodes.len();
    assert!(n >= 1, "fd_weights needs at least one node");
    let mut c = vec![vec![T::zero(); n]; max_order + 1];
    let mut c1 = T::one();
    c[0][0] = T::one();
    let mut c4 = nodes[0] - x0;
    for i in 1..n {
        let mn = max_order.min(i);
        let mut c2 = T::one();
        let c5 = c4;
        c4 = nodes[i] - x0;
        for j in 0..i {
            let c3 = nodes[i] - nodes[j];
            c2 *= c3;
            if j == i - 1 {
                for m in (1..=mn).rev() {
                    let mt = T::from_subset(&(m as f64));
                    c[m][i] = c1 * (mt * c[m - 1][j] - c5 * c[m][j]) / c2;
                }
                c[0][i] = -c1 * c5 * c[0][j] / c2;
            }
            for m in (1..=mn).rev() {
                let mt = T::from_subset(&(m as f64));
                c[m][j] = (c4 * c[m][j] - mt * c[m - 1][j]) / c3;
            }
            c[0][j] = c4 * c[0][j] / c3;
        }
        c1 = c2;
    }
    c
}

/// Newton's triangular divided-difference table, vector-valued: returns
/// `dd[k] = f[nodes[0], .., nodes[k]]`, the order-`k` divided difference
/// "diagonal" of the table, for `k = 0..nodes.len()`.
///
/// Used both to evaluate the extrapolating predictor polynomial (a partial
/// sum of `dd[k] * prod(t - nodes[..k])`) and, directly, as the local
/// truncation error estimate at each candidate order (spec.md §4.5): the
/// order-`(p+1)` divided difference approximates `x^(p+1)(t) / (p+1)!`, the
/// leading term of the BDF-`p` truncation error.
pub fn divided_differences<T: Scalar>(nodes: &[T], values: &[Vector<T>]) -> Vec<Vector<T>> {
    assert_eq!(nodes.len(), values.len());
    let m = nodes.len();
    let mut dd: Vec<Vector<T>> = values.to_vec();
    let mut result = Vec::with_capacity(m);
    result.push(dd[0].clone());
    for order in 1..m {
        for i in (order..m).rev() {
            let diff = &dd[i] - &dd[i - 1];
            dd[i] = diff / (nodes[i] - nodes[i - order]);
        }
        result.push(dd[order].clone());
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_point_first_derivative_is_forward_difference() {
        let nodes = [0.0_f64, 0.5];
        let w = fd_weights(&nodes, 0.0, 1);
        // d/dt at x0=0 using f(0), f(0.5): weight should be [-1/h, 1/h].
        assert!((w[1][0] - (-2.0)).abs() < 1e-12);
        assert!((w[1][1] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn three_point_central_difference_matches_textbook_weights() {
        let nodes = [-1.0_f64, 0.0, 1.0];
        let w = fd_weights(&nodes, 0.0, 2);
        // central first derivative: (-1/2, 0, 1/2)
        assert!((w[1][0] - (-0.5)).abs() < 1e-12);
        assert!((w[1][1] - 0.0).abs() < 1e-12);
        assert!((w[1][2] - 0.5).abs() < 1e-12);
        // central second derivative: (1, -2, 1)
        assert!((w[2][0] - 1.0).abs() < 1e-12);
        assert!((w[2][1] - (-2.0)).abs() < 1e-12);
        assert!((w[2][2] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn weights_reproduce_derivative_of_a_quadratic() {
        // f(t) = t^2, f'(t) = 2t. Nonuniform stencil.
        let nodes = [0.0_f64, 0.3, 1.0];
        let x0 = 0.3;
        let w = fd_weights(&nodes, x0, 1);
        let f: Vec<f64> = nodes.iter().map(|&t| t * t).collect();
        let approx: f64 = (0..3).map(|j| w[1][j] * f[j]).sum();
        assert!((approx - 0.6).abs() < 1e-10);
    }

    #[test]
    fn divided_difference_of_linear_data_is_exact_and_higher_orders_vanish() {
        let nodes = [0.0_f64, 1.0, 2.5, 4.0];
        let values: Vec<Vector<f64>> = nodes
            .iter()
            .map(|&t| Vector::from_vec(vec![2.0 * t + 1.0]))
            .collect();
        let dd = divided_differences(&nodes, &values);
        assert!((dd[0][0] - 1.0).abs() < 1e-12);
        assert!((dd[1][0] - 2.0).abs() < 1e-12);
        assert!(dd[2][0].abs() < 1e-10);
        assert!(dd[3][0].abs() < 1e-10);
    }

    #[test]
    fn divided_difference_of_quadratic_matches_leading_coefficient() {
        // f(t) = 3t^2 - t: second divided difference should be the leading
        // coefficient 3, regardless of stencil spacing.
        let nodes = [0.0_f64, 0.4, 1.1];
        let values: Vec<Vector<f64>> = nodes
            .iter()
            .map(|&t| Vector::from_vec(vec![3.0 * t * t - t]))
            .collect();
        let dd = divided_differences(&nodes, &values);
        assert!((dd[2][0] - 3.0).abs() < 1e-10);
    }
}
