//! Epsilon-insensitive support vector regression
//!
//! The dual problem is solved with SMO using second-order working-set
//! selection over `2n` variables: `alpha[t]` for `t < n` and `alpha*[t - n]`
//! otherwise. Training sets up to [`SVMConfig::max_kernel_samples`] rows get
//! the full kernel matrix; larger ones compute kernel rows on demand through a
//! bounded row cache.

use super::models::Model;
use crate::config::GammaSpec;
use crate::error::{EvChargeError, Result};
use ndarray::{Array1, Array2, ArrayView1, Axis, Zip};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Default row count up to which the kernel matrix is computed eagerly
pub const MAX_KERNEL_MATRIX_SAMPLES: usize = 10_000;

/// Curvature floor for non-positive-definite pairs
const TAU: f64 = 1e-12;

/// One point of the regressor's hyperparameter grid
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SvrParams {
    pub c: f64,
    pub epsilon: f64,
    pub gamma: GammaSpec,
}

impl fmt::Display for SvrParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "C={}, epsilon={}, gamma={}", self.c, self.epsilon, self.gamma)
    }
}

/// SVR configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SVMConfig {
    /// Regularization parameter (C)
    pub c: f64,
    /// Width of the insensitive tube
    pub epsilon: f64,
    /// RBF bandwidth: K(x, y) = exp(-γ * ||x - y||²)
    pub gamma: GammaSpec,
    /// Stopping tolerance on the maximal KKT violation
    pub tol: f64,
    pub max_iter: usize,
    /// Largest training set whose kernel matrix is materialised. Above it,
    /// rows are computed on demand and at most `max_kernel_samples² / n`
    /// of them are cached.
    pub max_kernel_samples: usize,
}

impl Default for SVMConfig {
    fn default() -> Self {
        Self {
            c: 1.0,
            epsilon: 0.1,
            gamma: GammaSpec::Scale,
            tol: 1e-3,
            max_iter: 1_000_000,
            max_kernel_samples: MAX_KERNEL_MATRIX_SAMPLES,
        }
    }
}

impl SVMConfig {
    /// Configuration for one grid point
    pub fn rbf(params: SvrParams) -> Self {
        Self {
            c: params.c,
            epsilon: params.epsilon,
            gamma: params.gamma,
            ..Default::default()
        }
    }

    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_max_kernel_samples(mut self, max_kernel_samples: usize) -> Self {
        self.max_kernel_samples = max_kernel_samples;
        self
    }
}

/// RBF kernel with its bandwidth resolved against a training matrix
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct RbfKernel {
    gamma: f64,
}

impl RbfKernel {
    fn eval(&self, a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
        let dist = a
            .iter()
            .zip(b.iter())
            .map(|(x, y)| (x - y) * (x - y))
            .sum::<f64>();
        (-self.gamma * dist).exp()
    }
}

/// `1 / (n_features * Var(X))` over all entries of `x`, or 1.0 when the
/// variance is zero
pub fn scale_gamma(x: &Array2<f64>) -> f64 {
    if x.is_empty() {
        return 1.0;
    }
    let n_features = x.ncols();
    let var = x.var(0.0);
    if n_features == 0 || !(var > 0.0) {
        1.0
    } else {
        1.0 / (n_features as f64 * var)
    }
}

/// Support Vector Regressor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SVMRegressor {
    config: SVMConfig,
    kernel: Option<RbfKernel>,
    support_vectors: Option<Array2<f64>>,
    /// Dual coefficients `alpha - alpha*` of the support vectors
    dual_coef: Option<Array1<f64>>,
    /// Decision function offset; `f(x) = sum(coef * K) - rho`
    rho: f64,
    n_iter: usize,
    is_fitted: bool,
}

impl SVMRegressor {
    pub fn new(config: SVMConfig) -> Self {
        Self {
            config,
            kernel: None,
            support_vectors: None,
            dual_coef: None,
            rho: 0.0,
            n_iter: 0,
            is_fitted: false,
        }
    }

    pub fn config(&self) -> &SVMConfig {
        &self.config
    }

    /// Bandwidth used by the last fit
    pub fn gamma(&self) -> Option<f64> {
        self.kernel.map(|k| k.gamma)
    }

    fn validate(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let n = x.nrows();
        if n != y.len() {
            return Err(EvChargeError::ShapeError {
                expected: format!("y length = {}", n),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n == 0 {
            return Err(EvChargeError::Training("cannot fit SVR on zero rows".to_string()));
        }
        if !(self.config.c > 0.0) {
            return Err(EvChargeError::InvalidParameter {
                name: "C".to_string(),
                value: self.config.c.to_string(),
                reason: "must be positive".to_string(),
            });
        }
        if !(self.config.epsilon >= 0.0) {
            return Err(EvChargeError::InvalidParameter {
                name: "epsilon".to_string(),
                value: self.config.epsilon.to_string(),
                reason: "must be non-negative".to_string(),
            });
        }
        if let GammaSpec::Value(g) = self.config.gamma {
            if !(g > 0.0) {
                return Err(EvChargeError::InvalidParameter {
                    name: "gamma".to_string(),
                    value: g.to_string(),
                    reason: "must be positive".to_string(),
                });
            }
        }
        if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
            return Err(EvChargeError::Training(
                "SVR input contains non-finite values".to_string(),
            ));
        }
        Ok(())
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.validate(x, y)?;

        let kernel = RbfKernel {
            gamma: match self.config.gamma {
                GammaSpec::Scale => scale_gamma(x),
                GammaSpec::Value(g) => g,
            },
        };

        let cache = KernelCache::new(kernel, x, self.config.max_kernel_samples);
        if !cache.is_complete() {
            debug!(
                n_samples = x.nrows(),
                cached_rows = cache.capacity,
                "Computing SVR kernel rows on demand"
            );
        }
        let solver = EpsilonSvrSolver::new(cache, y, self.config.c, self.config.epsilon);
        let solution = solver.solve(self.config.tol, self.config.max_iter);
        if !solution.converged {
            warn!(
                max_iter = self.config.max_iter,
                c = self.config.c,
                epsilon = self.config.epsilon,
                "SVR solver reached the iteration limit"
            );
        }

        let support: Vec<usize> = (0..x.nrows())
            .filter(|&i| solution.coef[i] != 0.0)
            .collect();
        let dual_coef: Array1<f64> = support.iter().map(|&i| solution.coef[i]).collect();

        debug!(
            n_iter = solution.n_iter,
            n_support = support.len(),
            rho = solution.rho,
            "Fitted SVR"
        );

        self.support_vectors = Some(x.select(Axis(0), &support));
        self.dual_coef = Some(dual_coef);
        self.rho = solution.rho;
        self.kernel = Some(kernel);
        self.n_iter = solution.n_iter;
        self.is_fitted = true;
        Ok(())
    }

    /// Predict target values
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let (kernel, sv, coef) = match (&self.kernel, &self.support_vectors, &self.dual_coef) {
            (Some(k), Some(sv), Some(c)) if self.is_fitted => (*k, sv, c),
            _ => return Err(EvChargeError::ModelNotFitted),
        };
        if x.ncols() != sv.ncols() {
            return Err(EvChargeError::ShapeError {
                expected: format!("{} features", sv.ncols()),
                actual: format!("{} features", x.ncols()),
            });
        }

        let predictions: Vec<f64> = x
            .axis_iter(Axis(0))
            .into_par_iter()
            .map(|row| {
                sv.axis_iter(Axis(0))
                    .zip(coef.iter())
                    .map(|(s, &c)| c * kernel.eval(row, s))
                    .sum::<f64>()
                    - self.rho
            })
            .collect();

        Ok(Array1::from_vec(predictions))
    }

    pub fn n_support_vectors(&self) -> usize {
        self.support_vectors.as_ref().map_or(0, |sv| sv.nrows())
    }

    pub fn n_iter(&self) -> usize {
        self.n_iter
    }
}

impl Model for SVMRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        SVMRegressor::fit(self, x, y)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        SVMRegressor::predict(self, x)
    }

    fn name(&self) -> &'static str {
        "SVR"
    }
}

/// Kernel matrix from the Gram matrix and squared row norms, filled in parallel
fn compute_kernel_matrix(kernel: RbfKernel, x: &Array2<f64>) -> Array2<f64> {
    let mut k = x.dot(&x.t());
    let norms: Array1<f64> = k.diag().to_owned();
    Zip::indexed(&mut k).par_for_each(|(i, j), v| {
        let dist = (norms[i] + norms[j] - 2.0 * *v).max(0.0);
        *v = (-kernel.gamma * dist).exp();
    });
    k
}

/// Kernel matrix rows for the solver.
///
/// Up to `max_kernel_samples` rows every row is computed up front. Above it,
/// rows are computed on demand and at most `capacity` stay cached, least
/// recently used evicted first.
struct KernelCache<'a> {
    x: &'a Array2<f64>,
    kernel: RbfKernel,
    norms: Array1<f64>,
    rows: Vec<Option<Arc<[f64]>>>,
    recent: VecDeque<usize>,
    capacity: usize,
}

impl<'a> KernelCache<'a> {
    fn new(kernel: RbfKernel, x: &'a Array2<f64>, max_kernel_samples: usize) -> Self {
        let n = x.nrows();
        let norms: Array1<f64> = x.rows().into_iter().map(|r| r.dot(&r)).collect();

        if n <= max_kernel_samples {
            let rows = compute_kernel_matrix(kernel, x)
                .outer_iter()
                .map(|r| Some(Arc::from(r.to_vec())))
                .collect();
            return Self {
                x,
                kernel,
                norms,
                rows,
                recent: VecDeque::new(),
                capacity: n,
            };
        }

        // Same element budget as a full matrix at the cap
        let capacity = (max_kernel_samples.saturating_mul(max_kernel_samples) / n).max(2);
        Self {
            x,
            kernel,
            norms,
            rows: vec![None; n],
            recent: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    fn is_complete(&self) -> bool {
        self.capacity >= self.rows.len()
    }

    fn row(&mut self, r: usize) -> Arc<[f64]> {
        if let Some(row) = &self.rows[r] {
            let row = Arc::clone(row);
            if !self.is_complete() {
                if let Some(pos) = self.recent.iter().position(|&k| k == r) {
                    self.recent.remove(pos);
                }
                self.recent.push_back(r);
            }
            return row;
        }

        let row: Arc<[f64]> = Arc::from(self.compute_row(r));
        if self.recent.len() >= self.capacity {
            if let Some(evicted) = self.recent.pop_front() {
                self.rows[evicted] = None;
            }
        }
        self.rows[r] = Some(Arc::clone(&row));
        self.recent.push_back(r);
        row
    }

    fn compute_row(&self, r: usize) -> Vec<f64> {
        let xr = self.x.row(r);
        let nr = self.norms[r];
        let gamma = self.kernel.gamma;
        let mut out = vec![0.0; self.rows.len()];
        out.par_iter_mut().enumerate().for_each(|(j, v)| {
            let dist = (nr + self.norms[j] - 2.0 * xr.dot(&self.x.row(j))).max(0.0);
            *v = (-gamma * dist).exp();
        });
        out
    }
}

struct SolverSolution {
    /// `alpha[i] - alpha*[i]` for every training row
    coef: Array1<f64>,
    rho: f64,
    n_iter: usize,
    converged: bool,
}

/// SMO over the doubled variable set of epsilon-SVR
struct EpsilonSvrSolver<'a> {
    cache: KernelCache<'a>,
    n: usize,
    c: f64,
    /// +1 for `alpha`, -1 for `alpha*`
    sign: Vec<f64>,
    alpha: Vec<f64>,
    grad: Vec<f64>,
}

impl<'a> EpsilonSvrSolver<'a> {
    fn new(cache: KernelCache<'a>, y: &Array1<f64>, c: f64, epsilon: f64) -> Self {
        let n = y.len();
        let mut sign = vec![1.0; 2 * n];
        let mut grad = vec![0.0; 2 * n];
        for i in 0..n {
            sign[i + n] = -1.0;
            grad[i] = epsilon - y[i];
            grad[i + n] = epsilon + y[i];
        }
        Self {
            cache,
            n,
            c,
            sign,
            alpha: vec![0.0; 2 * n],
            grad,
        }
    }

    #[inline]
    fn row(&self, t: usize) -> usize {
        if t < self.n {
            t
        } else {
            t - self.n
        }
    }

    fn is_upper_bound(&self, t: usize) -> bool {
        self.alpha[t] >= self.c
    }

    fn is_lower_bound(&self, t: usize) -> bool {
        self.alpha[t] <= 0.0
    }

    /// Second-order working set selection; `None` once the KKT violation is
    /// below `tol`
    fn select_working_set(&mut self, tol: f64) -> Option<(usize, usize)> {
        let m = 2 * self.n;

        let mut gmax = f64::NEG_INFINITY;
        let mut i_sel = None;
        for t in 0..m {
            if self.sign[t] > 0.0 {
                if !self.is_upper_bound(t) && -self.grad[t] >= gmax {
                    gmax = -self.grad[t];
                    i_sel = Some(t);
                }
            } else if !self.is_lower_bound(t) && self.grad[t] >= gmax {
                gmax = self.grad[t];
                i_sel = Some(t);
            }
        }

        let kernel_i = match i_sel {
            Some(i) => {
                let r = self.row(i);
                Some(self.cache.row(r))
            }
            None => None,
        };

        let mut gmax2 = f64::NEG_INFINITY;
        let mut j_sel = None;
        let mut obj_diff_min = f64::INFINITY;
        for t in 0..m {
            let (violation, grad_diff) = if self.sign[t] > 0.0 {
                if self.is_lower_bound(t) {
                    continue;
                }
                (self.grad[t], gmax + self.grad[t])
            } else {
                if self.is_upper_bound(t) {
                    continue;
                }
                (-self.grad[t], gmax - self.grad[t])
            };
            gmax2 = gmax2.max(violation);

            if let Some(k_i) = &kernel_i {
                if grad_diff > 0.0 {
                    // RBF diagonal is 1
                    let mut quad = 2.0 - 2.0 * k_i[self.row(t)];
                    if quad <= 0.0 {
                        quad = TAU;
                    }
                    let obj_diff = -(grad_diff * grad_diff) / quad;
                    if obj_diff <= obj_diff_min {
                        obj_diff_min = obj_diff;
                        j_sel = Some(t);
                    }
                }
            }
        }

        if gmax + gmax2 < tol {
            return None;
        }
        match (i_sel, j_sel) {
            (Some(i), Some(j)) => Some((i, j)),
            _ => None,
        }
    }

    fn update_pair(&mut self, i: usize, j: usize) {
        let c = self.c;
        let (ri, rj) = (self.row(i), self.row(j));
        let kernel_i = self.cache.row(ri);
        let kernel_j = self.cache.row(rj);
        let q_ij = self.sign[i] * self.sign[j] * kernel_i[rj];
        let old_ai = self.alpha[i];
        let old_aj = self.alpha[j];

        if self.sign[i] != self.sign[j] {
            let mut quad = 2.0 + 2.0 * q_ij;
            if quad <= 0.0 {
                quad = TAU;
            }
            let delta = (-self.grad[i] - self.grad[j]) / quad;
            let diff = old_ai - old_aj;
            let mut ai = old_ai + delta;
            let mut aj = old_aj + delta;

            if diff > 0.0 {
                if aj < 0.0 {
                    aj = 0.0;
                    ai = diff;
                }
            } else if ai < 0.0 {
                ai = 0.0;
                aj = -diff;
            }
            if diff > 0.0 {
                if ai > c {
                    ai = c;
                    aj = c - diff;
                }
            } else if aj > c {
                aj = c;
                ai = c + diff;
            }
            self.alpha[i] = ai;
            self.alpha[j] = aj;
        } else {
            let mut quad = 2.0 - 2.0 * q_ij;
            if quad <= 0.0 {
                quad = TAU;
            }
            let delta = (self.grad[i] - self.grad[j]) / quad;
            let sum = old_ai + old_aj;
            let mut ai = old_ai - delta;
            let mut aj = old_aj + delta;

            if sum > c {
                if ai > c {
                    ai = c;
                    aj = sum - c;
                }
            } else if aj < 0.0 {
                aj = 0.0;
                ai = sum;
            }
            if sum > c {
                if aj > c {
                    aj = c;
                    ai = sum - c;
                }
            } else if ai < 0.0 {
                ai = 0.0;
                aj = sum;
            }
            self.alpha[i] = ai;
            self.alpha[j] = aj;
        }

        let d_ai = self.alpha[i] - old_ai;
        let d_aj = self.alpha[j] - old_aj;
        if d_ai == 0.0 && d_aj == 0.0 {
            return;
        }
        let (si, sj) = (self.sign[i], self.sign[j]);
        for t in 0..2 * self.n {
            let rt = self.row(t);
            let st = self.sign[t];
            self.grad[t] += st * (si * kernel_i[rt] * d_ai + sj * kernel_j[rt] * d_aj);
        }
    }

    fn compute_rho(&self) -> f64 {
        let mut ub = f64::INFINITY;
        let mut lb = f64::NEG_INFINITY;
        let mut n_free = 0usize;
        let mut sum_free = 0.0;

        for t in 0..2 * self.n {
            let y_grad = self.sign[t] * self.grad[t];
            if self.is_upper_bound(t) {
                if self.sign[t] < 0.0 {
                    ub = ub.min(y_grad);
                } else {
                    lb = lb.max(y_grad);
                }
            } else if self.is_lower_bound(t) {
                if self.sign[t] > 0.0 {
                    ub = ub.min(y_grad);
                } else {
                    lb = lb.max(y_grad);
                }
            } else {
                n_free += 1;
                sum_free += y_grad;
            }
        }

        if n_free > 0 {
            sum_free / n_free as f64
        } else {
            (ub + lb) / 2.0
        }
    }

    fn solve(mut self, tol: f64, max_iter: usize) -> SolverSolution {
        let mut n_iter = 0;
        let mut converged = false;
        while n_iter < max_iter {
            match self.select_working_set(tol) {
                Some((i, j)) => {
                    self.update_pair(i, j);
                    n_iter += 1;
                }
                None => {
                    converged = true;
                    break;
                }
            }
        }

        let rho = self.compute_rho();
        let n = self.n;
        let coef = (0..n).map(|i| self.alpha[i] - self.alpha[i + n]).collect();
        SolverSolution {
            coef,
            rho,
            n_iter,
            converged,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn params(c: f64, epsilon: f64, gamma: GammaSpec) -> SvrParams {
        SvrParams { c, epsilon, gamma }
    }

    #[test]
    fn test_constant_target_predicts_constant() {
        let x = array![[0.0], [1.0], [2.0], [3.0]];
        let y = array![3.0, 3.0, 3.0, 3.0];
        let mut svr = SVMRegressor::new(SVMConfig::rbf(params(1.0, 0.5, GammaSpec::Value(1.0))));
        svr.fit(&x, &y).unwrap();

        assert_eq!(svr.n_support_vectors(), 0);
        let pred = svr.predict(&array![[1.5], [10.0]]).unwrap();
        assert_eq!(pred, array![3.0, 3.0]);
    }

    #[test]
    fn test_fits_smooth_curve_within_tube() {
        let x = Array2::from_shape_fn((30, 1), |(i, _)| i as f64 / 10.0);
        let y = x.column(0).mapv(f64::sin);
        let mut svr = SVMRegressor::new(SVMConfig::rbf(params(100.0, 0.1, GammaSpec::Value(1.0))));
        svr.fit(&x, &y).unwrap();

        let pred = svr.predict(&x).unwrap();
        let max_err = (&pred - &y).mapv(f64::abs).fold(0.0f64, |m, &v| m.max(v));
        assert!(max_err < 0.25, "max error {max_err}");
        assert!(svr.n_support_vectors() > 0);
    }

    #[test]
    fn test_scale_gamma() {
        let x = array![[0.0], [2.0]];
        assert!((scale_gamma(&x) - 1.0).abs() < 1e-12);
        assert_eq!(scale_gamma(&array![[5.0, 5.0], [5.0, 5.0]]), 1.0);

        let mut svr = SVMRegressor::new(SVMConfig::rbf(params(1.0, 0.1, GammaSpec::Scale)));
        svr.fit(&x, &array![0.0, 1.0]).unwrap();
        assert!((svr.gamma().unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_on_demand_kernel_rows_match_full_matrix() {
        let x = Array2::from_shape_fn((40, 1), |(i, _)| i as f64 / 8.0);
        let y = x.column(0).mapv(|v| 3.0 * v.sin() + 5.0);
        let config = SVMConfig::rbf(params(10.0, 0.1, GammaSpec::Value(0.5)));

        let mut full = SVMRegressor::new(config.clone());
        full.fit(&x, &y).unwrap();
        // 8 cached rows out of 40
        let mut bounded = SVMRegressor::new(config.with_max_kernel_samples(18));
        bounded.fit(&x, &y).unwrap();

        assert_eq!(full.n_support_vectors(), bounded.n_support_vectors());
        let a = full.predict(&x).unwrap();
        let b = bounded.predict(&x).unwrap();
        for (p, q) in a.iter().zip(b.iter()) {
            assert!((p - q).abs() < 1e-9, "{p} vs {q}");
        }
    }

    #[test]
    fn test_kernel_cache_evicts_least_recently_used() {
        let x = Array2::from_shape_fn((10, 2), |(i, j)| (i + j) as f64);
        let mut cache = KernelCache::new(RbfKernel { gamma: 0.1 }, &x, 4);
        assert_eq!(cache.capacity, 2);
        assert!(!cache.is_complete());

        let first = cache.row(0);
        assert_eq!(first.len(), 10);
        assert_eq!(first[0], 1.0);
        cache.row(1);
        cache.row(0);
        cache.row(2);
        assert!(cache.rows[0].is_some());
        assert!(cache.rows[1].is_none());
        assert!(cache.rows[2].is_some());

        let full = compute_kernel_matrix(RbfKernel { gamma: 0.1 }, &x);
        let row = cache.row(7);
        for j in 0..10 {
            assert!((row[j] - full[[7, j]]).abs() < 1e-12);
        }
    }

    #[test]
    fn test_rejects_bad_parameters() {
        let x = array![[0.0], [1.0]];
        let y = array![0.0, 1.0];
        let mut svr = SVMRegressor::new(SVMConfig::rbf(params(0.0, 0.1, GammaSpec::Scale)));
        assert!(matches!(
            svr.fit(&x, &y),
            Err(EvChargeError::InvalidParameter { .. })
        ));
    }
}
