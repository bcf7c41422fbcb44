//! BDF time integrator, per spec.md §4.5 — the heart of the crate.
//!
//! Grounded on the teacher's `_teacher_ref/ode_solver/bdf.rs` draft for the
//! overall shape (predictor from history, Newton-loop-driven corrector,
//! order search over `{p-1, p, p+1}`), but the draft's coefficient machinery
//! assumes a Nordsieck array rescaled under a constant step size and doesn't
//! type-check as-is. Coefficients, predictor and local error estimate are
//! rebuilt here directly on the actual (possibly non-uniform) timestamp
//! stencil via [`crate::stencil`], which is what spec.md §4.5 literally asks
//! for ("the divided-difference form of the BDF polynomial on the actual
//! timestamp stencil") and handles every order/step combination uniformly.

use crate::callback::{Jacobian, MassMatrix, NullObserver, Observer, Rhs};
use crate::error::Error;
use crate::linear_solver::SparseLuAdapter;
use crate::matrix::{Csr, SparseMatrix};
use crate::options::{SolverOptions, TimeSteppingController, K_MAX};
use crate::scalar::{Scalar, Vector};
use crate::stencil::{divided_differences, fd_weights};
use faer_traits::ComplexField as FaerComplexField;
use std::collections::VecDeque;

/// Where the integrator is in its lifecycle, per spec.md §4.5.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    Starting,
    Stepping,
    Rejected,
    Terminal,
}

/// Running counters, exposed for diagnostics and the testable-properties
/// suite (not named in spec.md's Data Model by this name, but "total-call
/// counters" is — §3).
#[derive(Debug, Clone, Copy, Default)]
pub struct Statistics {
    pub steps_accepted: u64,
    pub steps_rejected: u64,
    pub rhs_evals: u64,
    pub jacobian_evals: u64,
    pub factorizations: u64,
    pub newton_iterations: u64,
    pub order_increases: u64,
    pub order_decreases: u64,
}

struct Diagnostics {
    verbosity: u8,
}

impl Diagnostics {
    fn emit(&self, msg: impl Fn() -> String) {
        if self.verbosity > 0 {
            eprintln!("{}", msg());
        }
    }
}

/// Ring of up to `K_max` past accepted `(t, x)` pairs, most recent at the
/// front. Owned exclusively by the integrator (spec.md §3).
struct History<T: Scalar> {
    times: VecDeque<T>,
    states: VecDeque<Vector<T>>,
    cap: usize,
}

impl<T: Scalar> History<T> {
    fn new(cap: usize) -> Self {
        Self {
            times: VecDeque::with_capacity(cap),
            states: VecDeque::with_capacity(cap),
            cap,
        }
    }

    fn push(&mut self, t: T, x: Vector<T>) {
        self.times.push_front(t);
        self.states.push_front(x);
        if self.times.len() > self.cap {
            self.times.pop_back();
            self.states.pop_back();
        }
    }

    fn len(&self) -> usize {
        self.times.len()
    }

    /// The `m` most recent times, most recent first. `m` must be `<= len()`.
    fn times(&self, m: usize) -> Vec<T> {
        self.times.iter().take(m).copied().collect()
    }

    fn states(&self, m: usize) -> Vec<Vector<T>> {
        self.states.iter().take(m).cloned().collect()
    }
}

/// Weighted root-mean-square norm, spec.md §4.5: `w_i = atol + rtol*|x_i|`.
fn wrms<T: Scalar>(e: &Vector<T>, x: &Vector<T>, atol: T, rtol: T) -> T {
    let n = e.len();
    let mut acc = T::zero();
    for i in 0..n {
        let w = atol + rtol * x[i].abs();
        let r = e[i] / w;
        acc += r * r;
    }
    (acc / T::from_subset(&(n as f64))).sqrt()
}

fn clamp<T: Scalar>(v: T, lo: T, hi: T) -> T {
    if v < lo {
        lo
    } else if v > hi {
        hi
    } else {
        v
    }
}

/// The BDF time integrator: owns the history buffer, the linear solver's
/// reusable factorization state, and the current `(t, h, order)`.
pub struct Bdf<T: Scalar + FaerComplexField, R: Rhs<T>, J: Jacobian<T>, M: MassMatrix<T>> {
    rhs: R,
    jac: J,
    mass: M,
    options: SolverOptions<T>,
    observer: Box<dyn Observer<T>>,
    history: History<T>,
    linear_solver: SparseLuAdapter<T>,
    state: State,
    t: T,
    h: T,
    order: usize,
    steps_since_order_change: u64,
    stats: Statistics,
    diagnostics: Diagnostics,
    mass_cache: Option<(T, Csr<T>)>,
}

impl<T: Scalar + FaerComplexField, R: Rhs<T>, J: Jacobian<T>, M: MassMatrix<T>> Bdf<T, R, J, M> {
    pub fn new(rhs: R, jac: J, mass: M, options: SolverOptions<T>) -> Self {
        let verbosity = options.verbosity;
        Self {
            rhs,
            jac,
            mass,
            options,
            observer: Box::new(NullObserver),
            history: History::new(K_MAX),
            linear_solver: SparseLuAdapter::new(0),
            state: State::Idle,
            t: T::zero(),
            h: T::zero(),
            order: 1,
            steps_since_order_change: 0,
            stats: Statistics::default(),
            diagnostics: Diagnostics { verbosity },
            mass_cache: None,
        }
    }

    pub fn set_observer(&mut self, observer: impl Observer<T> + 'static) {
        self.observer = Box::new(observer);
    }

    pub fn statistics(&self) -> Statistics {
        self.stats
    }

    pub fn state(&self) -> State {
        self.state
    }

    fn mass_at(&mut self, t: T, n: usize) -> Result<Csr<T>, Error<T>> {
        if let Some((cached_t, cached)) = &self.mass_cache {
            if *cached_t == t {
                return Ok(cached.clone());
            }
        }
        let m: SparseMatrix<T> = self.mass.call(t, n);
        let csr = m.finalize()?;
        self.mass_cache = Some((t, csr.clone()));
        Ok(csr)
    }

    fn eval_rhs(&mut self, x: &Vector<T>, t: T, f: &mut Vector<T>) {
        self.stats.rhs_evals += 1;
        self.rhs.call(x, t, f);
    }

    /// Run the integration forward from the current `x` (taken as `x(t0)`)
    /// to `t1`, mutating `x` in place.
    pub fn integrate(&mut self, x: &mut Vector<T>, t1: T) -> Result<(), Error<T>> {
        let n = x.len();
        if self.state == State::Idle {
            self.t = self.options.t0;
            self.h = self.options.dt_init;
            self.order = 1;
            self.steps_since_order_change = 0;
            self.history = History::new(K_MAX);
            self.history.push(self.t, x.clone());
            self.linear_solver = SparseLuAdapter::new(n);
            self.state = State::Starting;
            self.diagnostics
                .emit(|| format!("bdf: starting at t0={} h0={}", self.t, self.h));
        }

        while self.t < t1 {
            let h = clamp(self.h, T::zero(), t1 - self.t).min(self.h);
            let h = if t1 - self.t < self.h { t1 - self.t } else { h };
            match self.attempt_step(x, h) {
                Ok(()) => {
                    self.observer.call(x, self.t);
                    self.diagnostics
                        .emit(|| format!("bdf: accepted step t={} h_next={} p={}", self.t, self.h, self.order));
                    if self.state == State::Starting {
                        self.state = State::Stepping;
                    }
                }
                Err(e) => {
                    self.state = State::Terminal;
                    return Err(e);
                }
            }
        }
        self.state = State::Terminal;
        Ok(())
    }

    /// One accepted step: retries internally on Newton failure or LTE
    /// rejection, per spec.md §4.5's retry policy.
    fn attempt_step(&mut self, x: &mut Vector<T>, mut h: T) -> Result<(), Error<T>> {
        let mut consecutive_rejections: u32 = 0;
        let mut singular_retry_used = false;
        loop {
            if h < self.options.dt_min {
                return Err(Error::StepUnderflow { t: self.t });
            }
            let t_new = self.t + h;
            let p = self.order;

            let hist_times = self.history.times(p);
            let hist_states = self.history.states(p);

            let x_pred = predictor(&hist_times, &hist_states, t_new);

            // Coefficients alpha_k on the (p+1)-node stencil [t_new, hist..].
            let mut stencil_t = Vec::with_capacity(p + 1);
            stencil_t.push(t_new);
            stencil_t.extend_from_slice(&hist_times);
            let w = fd_weights(&stencil_t, t_new, 1);
            let alpha: Vec<T> = w[1].iter().map(|&wk| wk * h).collect();

            let mass_csr = self.mass_at(t_new, x.len())?;

            match self.newton_solve(&mass_csr, &alpha, &hist_states, x_pred, t_new, h) {
                Ok(x_trial) => {
                    // Local error estimate, spec.md §4.5: a (p+1)-th order
                    // divided difference over [t_new, history...] estimates
                    // x^(p+1)(xi)/(p+1)!, which is roughly independent of how
                    // the history happens to be spaced. Scaling it by the
                    // CURRENT step h^(p+1) (rather than the product of
                    // distances to possibly stale history points) is what
                    // makes the estimate actually shrink as h shrinks on a
                    // rejected-step retry.
                    let accept = if self.history.len() > p {
                        let mut nodes = Vec::with_capacity(p + 2);
                        nodes.push(t_new);
                        nodes.extend(self.history.times(p + 1));
                        let mut values = Vec::with_capacity(p + 2);
                        values.push(x_trial.clone());
                        values.extend(self.history.states(p + 1));
                        let dd = divided_differences(&nodes, &values);
                        let h_pow = (0..=p).fold(T::one(), |acc, _| acc * h);
                        let lte = &dd[p + 1] * h_pow;
                        wrms(&lte, &x_trial, self.options.atol, self.options.rtol) <= T::one()
                    } else {
                        true
                    };

                    if !accept {
                        consecutive_rejections += 1;
                        self.stats.steps_rejected += 1;
                        if consecutive_rejections >= 5 {
                            return Err(Error::NonlinearFail {
                                t: self.t,
                                rejections: consecutive_rejections,
                            });
                        }
                        if consecutive_rejections >= 3 && self.order > 1 {
                            self.order -= 1;
                            self.steps_since_order_change = 0;
                            self.stats.order_decreases += 1;
                        }
                        h *= T::from_subset(&0.5);
                        continue;
                    }

                    self.commit_accepted_step(x, x_trial, t_new, h);
                    return Ok(());
                }
                Err(Error::NonlinearFail { .. }) => {
                    consecutive_rejections += 1;
                    self.stats.steps_rejected += 1;
                    if consecutive_rejections >= 5 {
                        return Err(Error::NonlinearFail {
                            t: self.t,
                            rejections: consecutive_rejections,
                        });
                    }
                    if consecutive_rejections >= 3 && self.order > 1 {
                        self.order -= 1;
                        self.steps_since_order_change = 0;
                        self.stats.order_decreases += 1;
                    }
                    h *= T::from_subset(&0.5);
                    continue;
                }
                Err(e @ (Error::Singular { .. } | Error::NumericBreakdown { .. })) => {
                    // spec.md §7: one step-halving retry on a singular
                    // iteration matrix or numeric breakdown, then fatal.
                    if singular_retry_used {
                        return Err(e);
                    }
                    singular_retry_used = true;
                    self.stats.steps_rejected += 1;
                    h *= T::from_subset(&0.5);
                    continue;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn newton_solve(
        &mut self,
        mass_csr: &Csr<T>,
        alpha: &[T],
        hist_states: &[Vector<T>],
        x_pred: Vector<T>,
        t_new: T,
        h: T,
    ) -> Result<Vector<T>, Error<T>> {
        let mut x = x_pred;
        let mut fx = Vector::<T>::zeros(x.len());
        for iter in 0..self.options.max_newton_iter {
            self.eval_rhs(&x, t_new, &mut fx);
            if !fx.iter().all(|v| v.is_finite()) {
                return Err(Error::UserError { t: t_new });
            }

            let mut combo = &x * alpha[0];
            for (k, hx) in hist_states.iter().enumerate() {
                combo += hx * alpha[k + 1];
            }
            let residual = mass_mul(mass_csr, &combo) - &fx * h;

            if iter == 0 || self.options.fact_every_iter {
                let jac = self.jac.call(&x, t_new)?;
                self.stats.jacobian_evals += 1;
                let jac_csr = jac.finalize()?;
                let a = assemble_iteration_matrix(mass_csr, &jac_csr, alpha[0], h)?;
                self.linear_solver.factor(&a)?;
                self.stats.factorizations += 1;
            }

            let neg_residual = -residual;
            let delta = self.linear_solver.solve(&neg_residual)?;
            self.stats.newton_iterations += 1;
            x += &delta;

            if wrms(&delta, &x, self.options.atol, self.options.rtol) <= self.options.newton_tol {
                return Ok(x);
            }
        }
        Err(Error::NonlinearFail { t: t_new, rejections: 0 })
    }

    fn commit_accepted_step(&mut self, x: &mut Vector<T>, x_trial: Vector<T>, t_new: T, h: T) {
        *x = x_trial.clone();
        self.t = t_new;
        self.history.push(t_new, x_trial);
        self.stats.steps_accepted += 1;
        self.steps_since_order_change += 1;
        self.mass_cache = None;

        self.h = self.next_step_and_order(h);
        self.h = clamp(self.h, self.options.dt_min, self.options.dt_max);
    }

    /// Step/order adaptation, spec.md §4.5: compare the predicted `h_new` at
    /// orders `p-1, p, p+1` (subject to history/timing constraints on
    /// growth) and keep whichever is largest.
    fn next_step_and_order(&mut self, h: T) -> T {
        if self.options.time_stepping == TimeSteppingController::Fixed {
            return self.options.dt_init;
        }

        let safety = T::from_subset(&0.9);
        let p = self.order;
        let n_avail = self.history.len().min(K_MAX);

        let mut best_h = h;
        let mut best_order = p;

        let candidate_orders: Vec<usize> = {
            let mut v = vec![p];
            if p > 1 {
                v.push(p - 1);
            }
            let can_grow = p < self.options.bdf_order
                && p < K_MAX
                && self.steps_since_order_change >= p as u64;
            if can_grow {
                v.push(p + 1);
            }
            v
        };

        for &q in &candidate_orders {
            // order-q error signal needs q+2 history points: the same
            // (q+1)-th divided difference / h^(q+1) scaling the acceptance
            // check (above) uses for the order just taken, just without a
            // fresh trial point to prepend (history already includes the
            // just-accepted state as its most recent entry).
            if n_avail < q + 2 {
                continue;
            }
            let nodes: Vec<T> = self.history.times(q + 2);
            let values: Vec<Vector<T>> = self.history.states(q + 2);
            let dd = divided_differences(&nodes, &values);
            let h_pow = (0..=q).fold(T::one(), |acc, _| acc * h);
            let scaled = &dd[q + 1] * h_pow;
            let err = wrms(
                &scaled,
                &values[0],
                self.options.atol,
                self.options.rtol,
            );
            let err = if err <= T::zero() {
                T::from_subset(&1e-12)
            } else {
                err
            };
            let exponent = T::one() / T::from_subset(&((q + 1) as f64));
            let factor = clamp(
                safety * err.powf(-exponent),
                T::from_subset(&0.1),
                T::from_subset(&10.0),
            );
            let candidate_h = h * factor;
            if candidate_h > best_h {
                best_h = candidate_h;
                best_order = q;
            }
        }

        if best_order != p {
            if best_order > p {
                self.stats.order_increases += 1;
            } else {
                self.stats.order_decreases += 1;
            }
            self.order = best_order;
            self.steps_since_order_change = 0;
        }
        best_h
    }
}

/// Newton-form polynomial through `(times[k], states[k])`, extrapolated to
/// `t_new`. `times`/`states` are most-recent-first, length `p`.
fn predictor<T: Scalar>(times: &[T], states: &[Vector<T>], t_new: T) -> Vector<T> {
    let dd = divided_differences(times, states);
    let mut x = dd[0].clone();
    let mut prod = T::one();
    for k in 1..times.len() {
        prod *= t_new - times[k - 1];
        x += &dd[k] * prod;
    }
    x
}

fn mass_mul<T: Scalar>(m: &Csr<T>, v: &Vector<T>) -> Vector<T> {
    let n = m.nrows();
    let mut out = Vector::<T>::zeros(n);
    for row in 0..n {
        let start = m.row_offsets()[row];
        let end = m.row_offsets()[row + 1];
        let mut acc = T::zero();
        for k in start..end {
            acc += m.values()[k] * v[m.col_indices()[k]];
        }
        out[row] = acc;
    }
    out
}

/// `A = alpha_0 * M - h * J`, assembled as a fresh sparse matrix (mass and
/// Jacobian may have different sparsity patterns; their sum does not).
fn assemble_iteration_matrix<T: Scalar>(
    mass: &Csr<T>,
    jac: &Csr<T>,
    alpha0: T,
    h: T,
) -> Result<Csr<T>, Error<T>> {
    let n = mass.nrows();
    let mut a = SparseMatrix::new(n);
    a.reserve(mass.nnz() + jac.nnz());
    for row in 0..n {
        let start = mass.row_offsets()[row];
        let end = mass.row_offsets()[row + 1];
        for k in start..end {
            a.push(alpha0 * mass.values()[k], row, mass.col_indices()[k]);
        }
    }
    for row in 0..n {
        let start = jac.row_offsets()[row];
        let end = jac.row_offsets()[row + 1];
        for k in start..end {
            a.push(-h * jac.values()[k], row, jac.col_indices()[k]);
        }
    }
    a.finalize()
}
