//! Exhaustive cross-validated grid search for the kernel regressor
//!
//! Every (candidate, fold) pair is an independent task run on the rayon
//! pool. A candidate is scored by its mean validation MSE; a candidate with
//! any failed or non-finite fold is excluded from selection rather than
//! aborting the search.

use super::cross_validation::KFold;
use super::svm::{SVMConfig, SVMRegressor, SvrParams};
use crate::config::SvrSearchConfig;
use crate::error::{EvChargeError, Result};
use ndarray::{Array1, Array2, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Cross-validation outcome of one grid point
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateScore {
    /// Position in grid order
    pub trial_id: usize,
    pub params: SvrParams,
    /// Validation MSE per fold, `None` where the fold failed
    pub fold_mse: Vec<Option<f64>>,
    /// Mean over folds; `None` when the candidate is excluded
    pub mean_mse: Option<f64>,
    /// First failure message, if any
    pub error: Option<String>,
}

impl CandidateScore {
    pub fn is_valid(&self) -> bool {
        self.mean_mse.is_some()
    }
}

/// Outcome of a completed search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridSearchResult {
    pub trials: Vec<CandidateScore>,
    pub best_trial_idx: usize,
    pub total_duration_secs: f64,
}

impl GridSearchResult {
    pub fn best_trial(&self) -> &CandidateScore {
        &self.trials[self.best_trial_idx]
    }

    pub fn best_params(&self) -> SvrParams {
        self.best_trial().params
    }

    /// Mean validation MSE of the selected candidate
    pub fn best_score(&self) -> f64 {
        self.best_trial().mean_mse.unwrap_or(f64::NAN)
    }

    pub fn n_excluded(&self) -> usize {
        self.trials.iter().filter(|t| !t.is_valid()).count()
    }
}

/// Grid search over C, epsilon and gamma
#[derive(Debug, Clone)]
pub struct SvrGridSearch {
    config: SvrSearchConfig,
}

impl SvrGridSearch {
    pub fn new(config: SvrSearchConfig) -> Self {
        Self { config }
    }

    /// All grid points: C outermost, then epsilon, then gamma
    pub fn candidates(&self) -> Vec<SvrParams> {
        let mut out = Vec::new();
        for &c in &self.config.c_values {
            for &epsilon in &self.config.epsilon_values {
                for &gamma in &self.config.gamma_values {
                    out.push(SvrParams { c, epsilon, gamma });
                }
            }
        }
        out
    }

    fn model_config(&self, params: SvrParams) -> SVMConfig {
        SVMConfig::rbf(params)
            .with_tol(self.config.tol)
            .with_max_iter(self.config.max_iter)
            .with_max_kernel_samples(self.config.max_kernel_samples)
    }

    /// Score every candidate by k-fold CV on `(x, y)`
    pub fn search(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<GridSearchResult> {
        if x.nrows() != y.len() {
            return Err(EvChargeError::ShapeError {
                expected: format!("y length = {}", x.nrows()),
                actual: format!("y length = {}", y.len()),
            });
        }
        let candidates = self.candidates();
        if candidates.is_empty() {
            return Err(EvChargeError::Config("SVR grid is empty".to_string()));
        }

        let start = Instant::now();
        let folds = KFold::new(self.config.cv_folds).split(x.nrows())?;
        let n_folds = folds.len();

        let fold_data: Vec<_> = folds
            .iter()
            .map(|fold| {
                (
                    x.select(Axis(0), &fold.train_indices),
                    y.select(Axis(0), &fold.train_indices),
                    x.select(Axis(0), &fold.test_indices),
                    y.select(Axis(0), &fold.test_indices),
                )
            })
            .collect();

        info!(
            n_candidates = candidates.len(),
            n_folds,
            "Starting SVR grid search"
        );

        let tasks: Vec<(usize, usize)> = (0..candidates.len())
            .flat_map(|c| (0..n_folds).map(move |f| (c, f)))
            .collect();

        let outcomes: Vec<Result<f64>> = tasks
            .par_iter()
            .map(|&(c, f)| -> Result<f64> {
                let (x_tr, y_tr, x_val, y_val) = &fold_data[f];
                let mut model = SVMRegressor::new(self.model_config(candidates[c]));
                model.fit(x_tr, y_tr)?;
                let pred = model.predict(x_val)?;
                let mse = (&pred - y_val).mapv(|e| e * e).mean().unwrap_or(f64::NAN);
                if mse.is_finite() {
                    Ok(mse)
                } else {
                    Err(EvChargeError::Training(format!("non-finite fold MSE {}", mse)))
                }
            })
            .collect();

        let mut trials = Vec::with_capacity(candidates.len());
        for (trial_id, params) in candidates.iter().enumerate() {
            let results = &outcomes[trial_id * n_folds..(trial_id + 1) * n_folds];
            let fold_mse: Vec<Option<f64>> = results.iter().map(|r| r.as_ref().ok().copied()).collect();
            let error = results
                .iter()
                .find_map(|r| r.as_ref().err().map(ToString::to_string));

            let mean_mse = if error.is_none() {
                Some(fold_mse.iter().flatten().sum::<f64>() / n_folds as f64)
            } else {
                warn!(%params, error = error.as_deref().unwrap_or_default(), "Excluding SVR candidate");
                None
            };
            debug!(%params, mean_mse, "Scored SVR candidate");

            trials.push(CandidateScore {
                trial_id,
                params: *params,
                fold_mse,
                mean_mse,
                error,
            });
        }

        // Strict comparison keeps the earliest candidate on ties
        let mut best: Option<(usize, f64)> = None;
        for trial in &trials {
            if let Some(score) = trial.mean_mse {
                if best.map_or(true, |(_, b)| score < b) {
                    best = Some((trial.trial_id, score));
                }
            }
        }
        let (best_trial_idx, best_score) = best.ok_or_else(|| {
            EvChargeError::Training("every SVR candidate failed cross-validation".to_string())
        })?;

        let result = GridSearchResult {
            trials,
            best_trial_idx,
            total_duration_secs: start.elapsed().as_secs_f64(),
        };
        info!(
            params = %result.best_params(),
            cv_mse = best_score,
            excluded = result.n_excluded(),
            duration_secs = result.total_duration_secs,
            "SVR grid search complete"
        );
        Ok(result)
    }

    /// Search, then refit the winning candidate on all of `(x, y)`
    pub fn fit(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<(SVMRegressor, GridSearchResult)> {
        let result = self.search(x, y)?;
        let mut model = SVMRegressor::new(self.model_config(result.best_params()));
        model.fit(x, y)?;
        Ok((model, result))
    }
}
