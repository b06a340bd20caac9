//! Improved iterative scaling.
//!
//! The conditional table `p(y|x)` and the normalizers `Z(x)` exist only for
//! the lifetime of a [`LambdaSolve`]; [`LambdaSolve::solve`] consumes the
//! solver and hands back the weights alone.

use std::time::Instant;

use super::{config::TaggerConfig, indexer::TrainingProblem};

/// Weights beyond this magnitude are reported as suspect.
const LAMBDA_SANITY: f64 = 100.0;
/// Rows of `p(.|x)` must sum to one within this.
const ROW_TOLERANCE: f64 = 1e-4;
const MAX_NEWTON_STEPS: usize = 100;
/// A Newton search that ran out of steps is trusted only if `|g|` is below this.
const NEWTON_RESIDUAL: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverParams {
    /// Maximum number of sweeps over the features.
    pub iterations: usize,
    /// A feature whose update is smaller than this has converged.
    pub epsilon: f64,
    pub lambda_bound: f64,
    /// Constraint tolerance for [`LambdaSolve::check_correctness`].
    pub tolerance: f64,
}

impl From<&TaggerConfig> for SolverParams {
    fn from(config: &TaggerConfig) -> Self {
        Self {
            iterations: config.iterations,
            epsilon: config.epsilon,
            lambda_bound: config.lambda_bound,
            tolerance: config.tolerance,
        }
    }
}

impl Default for SolverParams {
    fn default() -> Self {
        Self::from(&TaggerConfig::default())
    }
}

/// What happened during solving. Numerical anomalies are recorded per feature.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SolverReport {
    pub iterations: usize,
    /// No feature moved by `epsilon` or more in the last sweep.
    pub converged: bool,
    /// Features whose update came out NaN; the update was discarded.
    pub nan_features: Vec<usize>,
    /// Features whose weight hit `lambda_bound`.
    pub clamped_features: Vec<usize>,
    pub log_likelihood: f64,
}

impl SolverReport {
    pub fn is_suspect(&self) -> bool {
        !self.nan_features.is_empty() || !self.clamped_features.is_empty()
    }
}

/// Result of recomputing every expectation from scratch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CorrectnessCheck {
    pub max_violation: f64,
    /// Features whose empirical and model expectations differ by more than the tolerance.
    pub violated: Vec<usize>,
    /// History classes whose conditional distribution does not sum to one.
    pub unnormalized_rows: Vec<usize>,
    /// Features with `|lambda| > 100`.
    pub oversized: Vec<usize>,
}

impl CorrectnessCheck {
    pub fn passed(&self) -> bool {
        self.violated.is_empty() && self.unnormalized_rows.is_empty()
    }
}

pub struct LambdaSolve<'p> {
    problem: &'p TrainingProblem,
    params: SolverParams,
    fixed_fnum: Option<f64>,
    lambda: Vec<f64>,
    /// `prob_conds[x][y] = p(y|x)`.
    prob_conds: Vec<Vec<f64>>,
    zlambda: Vec<f64>,
}

impl<'p> LambdaSolve<'p> {
    /// Starts from all-zero weights, i.e. uniform `p(y|x)`.
    pub fn new(problem: &'p TrainingProblem, params: SolverParams) -> Self {
        let y_size = problem.y_size();
        let uniform = if y_size == 0 { 0.0 } else { 1.0 / y_size as f64 };
        Self {
            problem,
            params,
            fixed_fnum: problem.fixed_fnum().map(f64::from),
            lambda: vec![0.0; problem.num_features()],
            prob_conds: vec![vec![uniform; y_size]; problem.x_size()],
            zlambda: vec![y_size as f64; problem.x_size()],
        }
    }

    pub fn lambda(&self) -> &[f64] {
        &self.lambda
    }

    pub fn pcond(&self, y: usize, x: usize) -> f64 {
        self.prob_conds[x][y]
    }

    fn fnum(&self, x: usize, y: usize) -> f64 {
        f64::from(self.problem.fnum(x, y))
    }

    /// Model expectation of feature `f`.
    pub fn f_expected(&self, f: usize) -> f64 {
        let y = self.problem.feature(f).tag;
        self.problem
            .support(f)
            .iter()
            .map(|&x| self.problem.ptilde_x(x) * self.pcond(y, x))
            .sum()
    }

    fn g(&self, delta: f64, f: usize) -> f64 {
        let y = self.problem.feature(f).tag;
        let s: f64 = self
            .problem
            .support(f)
            .iter()
            .map(|&x| {
                self.problem.ptilde_x(x) * self.pcond(y, x) * (delta * self.fnum(x, y)).exp()
            })
            .sum();
        s - self.problem.feature(f).ftilde
    }

    fn gprime(&self, delta: f64, f: usize) -> f64 {
        let y = self.problem.feature(f).tag;
        self.problem
            .support(f)
            .iter()
            .map(|&x| {
                let n = self.fnum(x, y);
                self.problem.ptilde_x(x) * self.pcond(y, x) * (delta * n).exp() * n
            })
            .sum()
    }

    /// Root of `g` for feature `f`. NaN signals a numerical failure.
    fn newton(&self, f: usize) -> f64 {
        if let Some(n) = self.fixed_fnum {
            let expected = self.f_expected(f);
            return (self.problem.feature(f).ftilde.ln() - expected.ln()) / n;
        }
        let mut next = 0.0;
        for step in 1.. {
            let prev = next;
            let gprime = self.gprime(prev, f);
            let g = self.g(prev, f);
            if gprime == 0.0 {
                return 0.0;
            }
            next = prev - g / gprime;
            if next.is_nan() {
                return f64::NAN;
            }
            if (next - prev).abs() < self.params.epsilon {
                return next;
            }
            if step > MAX_NEWTON_STEPS {
                return if g.abs() > NEWTON_RESIDUAL { 0.0 } else { next };
            }
        }
        unreachable!()
    }

    /// Moves `lambda[f]` by `delta` and renormalizes the rows in its support.
    fn update_conds(&mut self, f: usize, delta: f64) {
        let y = self.problem.feature(f).tag;
        let factor = delta.exp();
        for &x in self.problem.support(f) {
            let z = self.zlambda[x];
            let row = &mut self.prob_conds[x];
            let z_new = z + row[y] * z * (factor - 1.0);
            for p in row.iter_mut() {
                *p = *p * z / z_new;
            }
            row[y] *= factor;
            self.zlambda[x] = z_new;
        }
    }

    /// One update of feature `f`; returns the applied change.
    fn iterate(&mut self, f: usize, report: &mut SolverReport) -> f64 {
        let mut delta = self.newton(f);
        if delta.is_nan() {
            log::warn!("NaN update for feature {f}, discarded");
            if !report.nan_features.contains(&f) {
                report.nan_features.push(f);
            }
            return 0.0;
        }
        let bound = self.params.lambda_bound;
        let target = self.lambda[f] + delta;
        if target.abs() > bound {
            delta = bound.copysign(target) - self.lambda[f];
            log::debug!("feature {f} clamped to {}", bound.copysign(target));
            if !report.clamped_features.contains(&f) {
                report.clamped_features.push(f);
            }
        }
        self.lambda[f] += delta;
        if delta != 0.0 {
            self.update_conds(f, delta);
        }
        delta
    }

    /// Sweeps over all features until none moves by `epsilon` or the sweep
    /// budget runs out.
    pub fn improved_iterative(&mut self) -> SolverReport {
        let begin = Instant::now();
        let mut report = SolverReport::default();
        if self.fixed_fnum.is_some() {
            log::info!("every (x, y) has the same number of active features, using closed-form updates");
        }
        for iteration in 1..=self.params.iterations {
            report.iterations = iteration;
            let mut moved = 0;
            for f in 0..self.lambda.len() {
                if self.iterate(f, &mut report).abs() >= self.params.epsilon {
                    moved += 1;
                }
            }
            log::debug!("iteration {iteration}: {moved} features not converged");
            if moved == 0 {
                report.converged = true;
                break;
            }
        }
        report.nan_features.sort_unstable();
        report.clamped_features.sort_unstable();
        report.log_likelihood = self.log_likelihood();
        log::info!(
            "solver: {} iterations, converged: {}, log-likelihood: {:.6}, time cost: {:?}",
            report.iterations,
            report.converged,
            report.log_likelihood,
            begin.elapsed()
        );
        if report.is_suspect() {
            log::warn!(
                "suspect run: {} NaN updates, {} clamped weights",
                report.nan_features.len(),
                report.clamped_features.len()
            );
        }
        report
    }

    /// Average log-probability of the training tags under the current weights.
    pub fn log_likelihood(&self) -> f64 {
        let mut s = 0.0;
        for x in 0..self.problem.x_size() {
            for y in 0..self.problem.y_size() {
                let p = self.problem.ptilde_xy(x, y);
                if p > 0.0 {
                    s += p * self.pcond(y, x).ln();
                }
            }
        }
        s
    }

    /// Recomputes every expectation and row sum and reports deviations.
    pub fn check_correctness(&self) -> CorrectnessCheck {
        let mut check = CorrectnessCheck::default();
        for (f, &lambda) in self.lambda.iter().enumerate() {
            if lambda.abs() > LAMBDA_SANITY {
                check.oversized.push(f);
            }
            let diff = (self.problem.feature(f).ftilde - self.f_expected(f)).abs();
            if diff > check.max_violation {
                check.max_violation = diff;
            }
            if !(diff <= self.params.tolerance) {
                check.violated.push(f);
            }
        }
        for (x, row) in self.prob_conds.iter().enumerate() {
            let s: f64 = row.iter().sum();
            if !((s - 1.0).abs() <= ROW_TOLERANCE) {
                check.unnormalized_rows.push(x);
            }
        }
        if !check.passed() {
            log::warn!(
                "correctness check failed: {} constraints violated (max {:.6}), {} rows unnormalized",
                check.violated.len(),
                check.max_violation,
                check.unnormalized_rows.len()
            );
        }
        if !check.oversized.is_empty() {
            log::warn!("{} weights exceed {LAMBDA_SANITY}", check.oversized.len());
        }
        check
    }

    /// Runs the solver and releases the training-only tables.
    pub fn solve(mut self) -> (Vec<f64>, SolverReport, CorrectnessCheck) {
        let report = self.improved_iterative();
        let check = self.check_correctness();
        (self.lambda, report, check)
    }
}
