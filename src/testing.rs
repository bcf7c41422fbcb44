//! The seed-suite problems of spec.md §8 (S1-S6), exposed as reusable
//! fixtures so a host can build its own regression tests on top of them
//! (grounded on the teacher's `_teacher_ref/ode_solver/test_models/*`
//! pattern of bundling a problem with its own reference solution) and
//! exercised here as the crate's own end-to-end tests.

#[cfg(test)]
use crate::bdf::Bdf;
#[cfg(test)]
use crate::callback::{IdentityMass, MassMatrix, ZeroMass};
use crate::error::Error;
#[cfg(test)]
use crate::jacobian::{AnalyticJacobian, FiniteDifferenceJacobian};
use crate::matrix::SparseMatrix;
#[cfg(test)]
use crate::options::SolverOptions;
use crate::scalar::Vector;

/// S1: `x' = y; 0 = x^2 + y^2 - 1`, `x(0) = 0, y(0) = 1`. A one-row-singular
/// mass matrix pins the algebraic constraint.
pub fn unit_circle_rhs(x: &Vector<f64>, _t: f64, f: &mut Vector<f64>) {
    f[0] = x[1];
    f[1] = x[0] * x[0] + x[1] * x[1] - 1.0;
}

pub fn unit_circle_mass(_t: f64, _n: usize) -> SparseMatrix<f64> {
    let mut m = SparseMatrix::new(2);
    m.push(1.0, 0, 0);
    m
}

pub fn unit_circle_x0() -> Vector<f64> {
    Vector::from_vec(vec![0.0, 1.0])
}

/// S2: Robertson stiff chemical kinetics, three species, mass-conserving.
/// Reference values at `t = 4` below are the classic Hairer/Wanner tabulation
/// of this problem (also reproduced by the SUNDIALS IDA `idaRoberts_dns`
/// example).
pub fn robertson_rhs(x: &Vector<f64>, _t: f64, f: &mut Vector<f64>) {
    f[0] = -0.04 * x[0] + 1.0e4 * x[1] * x[2];
    f[1] = 0.04 * x[0] - 1.0e4 * x[1] * x[2] - 3.0e7 * x[1] * x[1];
    f[2] = x[0] + x[1] + x[2] - 1.0;
}

pub fn robertson_jac(x: &Vector<f64>, _t: f64) -> Result<SparseMatrix<f64>, Error<f64>> {
    let mut j = SparseMatrix::new(3);
    j.push(-0.04, 0, 0);
    j.push(1.0e4 * x[2], 0, 1);
    j.push(1.0e4 * x[1], 0, 2);
    j.push(0.04, 1, 0);
    j.push(-1.0e4 * x[2] - 6.0e7 * x[1], 1, 1);
    j.push(-1.0e4 * x[1], 1, 2);
    j.push(1.0, 2, 0);
    j.push(1.0, 2, 1);
    j.push(1.0, 2, 2);
    Ok(j)
}

pub fn robertson_mass(_t: f64, _n: usize) -> SparseMatrix<f64> {
    let mut m = SparseMatrix::new(3);
    m.push(1.0, 0, 0);
    m.push(1.0, 1, 1);
    m
}

pub fn robertson_x0() -> Vector<f64> {
    Vector::from_vec(vec![1.0, 0.0, 0.0])
}

/// S3: 2-D diffusion on an `n x n` finite-volume grid with zero-flux
/// boundaries, flattened row-major into an `n*n`-length state.
#[derive(Clone, Copy)]
pub struct Diffusion2d {
    pub n: usize,
    pub d: f64,
}

impl Diffusion2d {
    pub fn rhs(&self, x: &Vector<f64>, f: &mut Vector<f64>) {
        let n = self.n;
        let idx = |i: usize, j: usize| i * n + j;
        for i in 0..n {
            for j in 0..n {
                let center = x[idx(i, j)];
                let mut lap = 0.0;
                let mut neighbors = 0;
                for (di, dj) in [(-1i32, 0i32), (1, 0), (0, -1), (0, 1)] {
                    let ni = i as i32 + di;
                    let nj = j as i32 + dj;
                    if ni >= 0 && ni < n as i32 && nj >= 0 && nj < n as i32 {
                        lap += x[idx(ni as usize, nj as usize)] - center;
                        neighbors += 1;
                    }
                }
                let _ = neighbors;
                f[idx(i, j)] = self.d * lap;
            }
        }
    }

    pub fn point_source_x0(&self) -> Vector<f64> {
        let n = self.n;
        let mut x0 = Vector::<f64>::zeros(n * n);
        x0[(n / 2) * n + n / 2] = 1.0;
        x0
    }
}

/// S4: Keplerian two-body orbit (pure ODE, identity mass). State is
/// `[x, y, vx, vy]` of the relative coordinate; `mu` is the standard
/// gravitational parameter.
pub fn two_body_rhs(mu: f64, x: &Vector<f64>, f: &mut Vector<f64>) {
    let r3 = (x[0] * x[0] + x[1] * x[1]).powf(1.5);
    f[0] = x[2];
    f[1] = x[3];
    f[2] = -mu * x[0] / r3;
    f[3] = -mu * x[1] / r3;
}

pub fn two_body_energy(mu: f64, x: &Vector<f64>) -> f64 {
    let r = (x[0] * x[0] + x[1] * x[1]).sqrt();
    let v2 = x[2] * x[2] + x[3] * x[3];
    0.5 * v2 - mu / r
}

/// Circular orbit initial condition at radius `r0` for the given `mu`.
pub fn two_body_circular_x0(mu: f64, r0: f64) -> Vector<f64> {
    let v0 = (mu / r0).sqrt();
    Vector::from_vec(vec![r0, 0.0, 0.0, v0])
}

/// S6: Jacobian exactly singular for the default first step (`t = dt_init`),
/// regular everywhere else. `ZeroMass` makes the iteration matrix `-h*J`
/// directly, so the singular entry produces a genuine zero pivot on the
/// first Newton factorization; halving `h` once moves off it. The algebraic
/// solution `x = 1` is constant and well away from any pole, so (unlike a
/// `1/(t - SINGULAR_AT)` trajectory) the singular Jacobian is a genuine
/// transient rather than an essential singularity of the solution itself.
pub const SINGULAR_AT: f64 = 1e-3;

pub fn singular_at_zero_rhs(x: &Vector<f64>, t: f64, f: &mut Vector<f64>) {
    f[0] = (t - SINGULAR_AT) * (x[0] - 1.0);
}

pub fn singular_at_zero_jac(x: &Vector<f64>, t: f64) -> Result<SparseMatrix<f64>, Error<f64>> {
    let mut j = SparseMatrix::new(1);
    j.push(t - SINGULAR_AT, 0, 0);
    let _ = x;
    Ok(j)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s1_unit_circle_preserves_algebraic_constraint() {
        let jac = FiniteDifferenceJacobian::new(unit_circle_rhs, 1e-7, 1e-12);
        let opts = SolverOptions {
            atol: 1e-9,
            rtol: 1e-9,
            ..SolverOptions::default()
        };
        let mut solver = Bdf::new(unit_circle_rhs, jac, unit_circle_mass, opts);
        let worst_violation = std::rc::Rc::new(std::cell::RefCell::new(0.0_f64));
        let worst_violation_captured = worst_violation.clone();
        solver.set_observer(move |x: &Vector<f64>, _t: f64| {
            let g = (x[0] * x[0] + x[1] * x[1] - 1.0).abs();
            let mut worst = worst_violation_captured.borrow_mut();
            if g > *worst {
                *worst = g;
            }
        });
        let mut x = unit_circle_x0();
        solver.integrate(&mut x, std::f64::consts::PI).unwrap();
        let worst = *worst_violation.borrow();
        assert!(worst <= 1e-6, "constraint violated at some observed step: {worst}");
        // x' = y, x^2 + y^2 = 1, x(0) = 0 traces x(t) = sin(t), y(t) = cos(t).
        assert!(x[0].abs() <= 1e-4, "x(pi) should be near 0, got {}", x[0]);
    }

    #[test]
    fn s2_robertson_mass_balance_holds() {
        let jac = AnalyticJacobian(robertson_jac);
        let opts = SolverOptions {
            atol: 1e-10,
            rtol: 1e-6,
            bdf_order: 5,
            dt_init: 1e-6,
            max_newton_iter: 8,
            ..SolverOptions::default()
        };
        let mut solver = Bdf::new(robertson_rhs, jac, robertson_mass, opts);
        let mut x = robertson_x0();
        solver.integrate(&mut x, 4.0).unwrap();
        let balance = x[0] + x[1] + x[2];
        assert!((balance - 1.0).abs() < 1e-8, "mass balance drifted: {balance}");
        assert!((x[0] - 9.0553e-01).abs() < 5e-3, "x0={} x1={} x2={}", x[0], x[1], x[2]);
        assert!((x[2] - 9.4452e-02).abs() < 5e-3, "x0={} x1={} x2={}", x[0], x[1], x[2]);
    }

    #[test]
    fn s3_diffusion_relaxes_point_source_toward_uniform() {
        let problem = Diffusion2d { n: 4, d: 0.5 };
        let n2 = problem.n * problem.n;
        let rhs = move |x: &Vector<f64>, _t: f64, f: &mut Vector<f64>| problem.rhs(x, f);
        let jac = FiniteDifferenceJacobian::new(rhs, 1e-6, 1e-10);
        let opts = SolverOptions::default();
        let mut solver = Bdf::new(rhs, jac, IdentityMass, opts);
        let mut x = Diffusion2d { n: 4, d: 0.5 }.point_source_x0();
        solver.integrate(&mut x, 10.0).unwrap();
        let mean = x.iter().sum::<f64>() / n2 as f64;
        let max_dev = x.iter().map(|v| (v - mean).abs()).fold(0.0, f64::max);
        assert!(max_dev < 0.1, "diffusion did not relax toward uniform: max_dev={max_dev}");
    }

    #[test]
    fn s4_two_body_energy_is_conserved() {
        let mu = 1.0;
        let rhs = move |x: &Vector<f64>, _t: f64, f: &mut Vector<f64>| two_body_rhs(mu, x, f);
        let jac = FiniteDifferenceJacobian::new(rhs, 1e-8, 1e-12);
        let opts = SolverOptions {
            atol: 1e-10,
            rtol: 1e-8,
            ..SolverOptions::default()
        };
        let mut solver = Bdf::new(rhs, jac, IdentityMass, opts);
        let mut x = two_body_circular_x0(mu, 1.0);
        let e0 = two_body_energy(mu, &x);
        let period = 2.0 * std::f64::consts::PI;
        solver.integrate(&mut x, 10.0 * period).unwrap();
        let e1 = two_body_energy(mu, &x);
        assert!(((e1 - e0) / e0).abs() < 1e-4, "energy drift too large: e0={e0} e1={e1}");
    }

    #[test]
    fn s5_identity_and_zero_mass_are_well_formed() {
        let identity: SparseMatrix<f64> = IdentityMass.call(0.0, 4);
        assert_eq!(identity.n_elements(), 4);
        identity.validate().unwrap();
        let zero: SparseMatrix<f64> = ZeroMass.call(0.0, 4);
        assert_eq!(zero.n_elements(), 0);
        zero.validate().unwrap();
    }

    #[test]
    fn s6_recovers_from_singular_jacobian_at_start() {
        let jac = AnalyticJacobian(singular_at_zero_jac);
        let opts = SolverOptions {
            dt_init: SINGULAR_AT,
            ..SolverOptions::default()
        };
        let mut solver = Bdf::new(singular_at_zero_rhs, jac, crate::callback::ZeroMass, opts);
        let mut x = Vector::from_vec(vec![1.0]);
        let result = solver.integrate(&mut x, 1.0);
        assert!(result.is_ok(), "should recover from transient singular jacobian: {result:?}");
        assert!((x[0] - 1.0).abs() < 1e-6, "trajectory should stay at x=1, got {}", x[0]);
    }
}
