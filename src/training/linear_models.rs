//! L1-regularised linear regression
//!
//! [`LassoRegression`] minimises `(1 / 2n) * ||y - Xw - b||^2 + alpha * ||w||_1`
//! by cyclic coordinate descent. [`LassoCv`] picks `alpha` from a log-spaced
//! grid by k-fold cross-validated MSE and refits on all training rows.

use super::cross_validation::KFold;
use super::models::Model;
use crate::config::LassoConfig;
use crate::error::{EvChargeError, Result};
use ndarray::{Array1, Array2, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Lasso Regression (L1 regularization via coordinate descent)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LassoRegression {
    pub coefficients: Option<Array1<f64>>,
    pub intercept: Option<f64>,
    pub fit_intercept: bool,
    /// L1 regularization strength
    pub alpha: f64,
    pub max_iter: usize,
    pub tol: f64,
    /// Coordinate sweeps used by the last fit
    pub n_iter: usize,
    pub is_fitted: bool,
    warm_start: Option<Array1<f64>>,
}

impl Default for LassoRegression {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl LassoRegression {
    pub fn new(alpha: f64) -> Self {
        Self {
            coefficients: None,
            intercept: None,
            fit_intercept: true,
            alpha,
            max_iter: 1000,
            tol: 1e-4,
            n_iter: 0,
            is_fitted: false,
            warm_start: None,
        }
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    /// Start coordinate descent from these coefficients instead of zero
    pub fn with_warm_start(mut self, coefficients: Array1<f64>) -> Self {
        self.warm_start = Some(coefficients);
        self
    }

    /// Soft-threshold operator for L1 proximal step
    fn soft_threshold(val: f64, threshold: f64) -> f64 {
        if val > threshold {
            val - threshold
        } else if val < -threshold {
            val + threshold
        } else {
            0.0
        }
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        let n_features = x.ncols();
        if n_samples != y.len() {
            return Err(EvChargeError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(EvChargeError::Training("cannot fit Lasso on zero rows".to_string()));
        }
        if !(self.alpha >= 0.0) {
            return Err(EvChargeError::InvalidParameter {
                name: "alpha".to_string(),
                value: self.alpha.to_string(),
                reason: "must be non-negative".to_string(),
            });
        }

        let (x_c, y_c, x_mean, y_mean) = if self.fit_intercept {
            let xm = x
                .mean_axis(Axis(0))
                .unwrap_or_else(|| Array1::zeros(n_features));
            let ym = y.mean().unwrap_or(0.0);
            (x - &xm.clone().insert_axis(Axis(0)), y - ym, xm, ym)
        } else {
            (x.clone(), y.clone(), Array1::zeros(n_features), 0.0)
        };

        // Pre-compute column norms
        let col_norms: Vec<f64> = (0..n_features)
            .map(|j| x_c.column(j).mapv(|v| v * v).sum())
            .collect();

        let mut w = match self.warm_start.take() {
            Some(w0) if w0.len() == n_features => w0,
            _ => Array1::zeros(n_features),
        };
        let lambda = self.alpha * n_samples as f64;

        let mut r = &y_c - &x_c.dot(&w);
        self.n_iter = 0;
        for _iter in 0..self.max_iter {
            self.n_iter += 1;
            let mut max_delta = 0.0f64;

            for j in 0..n_features {
                if col_norms[j] < 1e-15 {
                    w[j] = 0.0;
                    continue;
                }
                // rho = x_j^T r + ||x_j||^2 w_j
                let rho = x_c.column(j).dot(&r) + col_norms[j] * w[j];
                let old_wj = w[j];
                w[j] = Self::soft_threshold(rho, lambda) / col_norms[j];
                let delta = old_wj - w[j];
                if delta != 0.0 {
                    r.scaled_add(delta, &x_c.column(j));
                    max_delta = max_delta.max(delta.abs());
                }
            }

            let w_max = w.iter().fold(0.0f64, |m, v| m.max(v.abs()));
            if max_delta <= self.tol * w_max || max_delta == 0.0 {
                break;
            }
        }

        self.intercept = Some(y_mean - w.dot(&x_mean));
        self.coefficients = Some(w);
        self.is_fitted = true;
        Ok(self)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        match (&self.coefficients, self.is_fitted) {
            (Some(w), true) => {
                if x.ncols() != w.len() {
                    return Err(EvChargeError::ShapeError {
                        expected: format!("{} features", w.len()),
                        actual: format!("{} features", x.ncols()),
                    });
                }
                Ok(x.dot(w) + self.intercept.unwrap_or(0.0))
            }
            _ => Err(EvChargeError::ModelNotFitted),
        }
    }
}

impl Model for LassoRegression {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        LassoRegression::fit(self, x, y).map(|_| ())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        LassoRegression::predict(self, x)
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        self.coefficients.as_ref().map(|w| w.mapv(f64::abs))
    }

    fn name(&self) -> &'static str {
        "Lasso"
    }
}

/// Lasso with the regularisation strength chosen by k-fold cross-validation.
///
/// Folds are contiguous and unshuffled. Within a fold, strengths are visited
/// from largest to smallest and each fit warm-starts from the previous one.
/// Ties in mean validation MSE go to the larger strength.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LassoCv {
    config: LassoConfig,
    /// Candidate strengths in descending order
    pub alphas: Vec<f64>,
    /// Mean validation MSE for each entry of `alphas`
    pub mse_path: Vec<f64>,
    /// Selected strength
    pub alpha: Option<f64>,
    model: Option<LassoRegression>,
}

impl LassoCv {
    pub fn new(config: LassoConfig) -> Self {
        let mut alphas = config.alphas();
        alphas.sort_by(|a, b| b.total_cmp(a));
        Self {
            config,
            alphas,
            mse_path: Vec::new(),
            alpha: None,
            model: None,
        }
    }

    pub fn model(&self) -> Option<&LassoRegression> {
        self.model.as_ref()
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        if x.nrows() != y.len() {
            return Err(EvChargeError::ShapeError {
                expected: format!("y length = {}", x.nrows()),
                actual: format!("y length = {}", y.len()),
            });
        }
        if self.alphas.is_empty() {
            return Err(EvChargeError::Config("no Lasso strengths to search".to_string()));
        }

        let folds = KFold::new(self.config.cv_folds).split(x.nrows())?;

        let fold_paths: Vec<Vec<f64>> = folds
            .par_iter()
            .map(|fold| -> Result<Vec<f64>> {
                let x_train = x.select(Axis(0), &fold.train_indices);
                let y_train = y.select(Axis(0), &fold.train_indices);
                let x_val = x.select(Axis(0), &fold.test_indices);
                let y_val = y.select(Axis(0), &fold.test_indices);

                let mut path = Vec::with_capacity(self.alphas.len());
                let mut coef: Option<Array1<f64>> = None;
                for &alpha in &self.alphas {
                    let mut model = self.base_model(alpha);
                    if let Some(w) = coef.take() {
                        model = model.with_warm_start(w);
                    }
                    model.fit(&x_train, &y_train)?;
                    let pred = model.predict(&x_val)?;
                    path.push((&pred - &y_val).mapv(|e| e * e).mean().unwrap_or(f64::INFINITY));
                    coef = model.coefficients.clone();
                }
                debug!(fold = fold.fold_idx, "Lasso fold path complete");
                Ok(path)
            })
            .collect::<Result<Vec<_>>>()?;

        let n_folds = fold_paths.len() as f64;
        self.mse_path = (0..self.alphas.len())
            .map(|k| fold_paths.iter().map(|p| p[k]).sum::<f64>() / n_folds)
            .collect();

        let mut best = 0;
        for (k, &mse) in self.mse_path.iter().enumerate() {
            if mse < self.mse_path[best] {
                best = k;
            }
        }
        let alpha = self.alphas[best];

        let mut model = self.base_model(alpha);
        model.fit(x, y)?;
        info!(alpha, cv_mse = self.mse_path[best], "Selected Lasso strength");

        self.alpha = Some(alpha);
        self.model = Some(model);
        Ok(self)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.model
            .as_ref()
            .ok_or(EvChargeError::ModelNotFitted)?
            .predict(x)
    }

    fn base_model(&self, alpha: f64) -> LassoRegression {
        LassoRegression::new(alpha)
            .with_max_iter(self.config.max_iter)
            .with_tol(self.config.tol)
    }
}

impl Model for LassoCv {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        LassoCv::fit(self, x, y).map(|_| ())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        LassoCv::predict(self, x)
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        self.model.as_ref().and_then(Model::feature_importances)
    }

    fn name(&self) -> &'static str {
        "LassoCV"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn linear_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((40, 2), |(i, j)| {
            if j == 0 {
                i as f64 / 10.0
            } else {
                ((i * 7) % 5) as f64
            }
        });
        let y = x.column(0).mapv(|v| 3.0 * v + 1.0);
        (x, y)
    }

    #[test]
    fn test_lasso_small_alpha_recovers_line() {
        let (x, y) = linear_data();
        let mut model = LassoRegression::new(1e-6).with_max_iter(10_000).with_tol(1e-10);
        model.fit(&x, &y).unwrap();

        let w = model.coefficients.clone().unwrap();
        assert!((w[0] - 3.0).abs() < 1e-3);
        assert!(w[1].abs() < 1e-3);
        assert!((model.intercept.unwrap() - 1.0).abs() < 1e-2);
    }

    #[test]
    fn test_lasso_large_alpha_zeroes_coefficients() {
        let (x, y) = linear_data();
        let mut model = LassoRegression::new(1e3);
        model.fit(&x, &y).unwrap();

        assert!(model.coefficients.as_ref().unwrap().iter().all(|&w| w == 0.0));
        let pred = model.predict(&array![[0.0, 0.0]]).unwrap();
        assert!((pred[0] - y.mean().unwrap()).abs() < 1e-12);
    }

    #[test]
    fn test_lasso_not_fitted() {
        let model = LassoRegression::new(0.1);
        assert!(matches!(
            model.predict(&array![[1.0]]),
            Err(EvChargeError::ModelNotFitted)
        ));
    }

    #[test]
    fn test_lasso_cv_prefers_weak_penalty_on_clean_line() {
        let (x, y) = linear_data();
        let mut cv = LassoCv::new(LassoConfig::default());
        cv.fit(&x, &y).unwrap();

        assert_eq!(cv.alphas.len(), 20);
        assert_eq!(cv.mse_path.len(), 20);
        assert!(cv.alphas[0] > cv.alphas[19]);
        let alpha = cv.alpha.unwrap();
        assert!(alpha < 1.0, "selected alpha {alpha}");
    }
}
