//! Regression metrics in energy units

use crate::data::{EnergyPrediction, EnergyTarget};
use crate::error::{EvChargeError, Result};
use serde::{Deserialize, Serialize};

/// MAE, MSE and R² of an energy prediction
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    /// Mean Absolute Error, kWh
    pub mae: f64,
    /// Mean Squared Error, kWh²
    pub mse: f64,
    /// Root Mean Squared Error, kWh
    pub rmse: f64,
    /// Coefficient of determination
    pub r2: f64,
    pub n_samples: usize,
}

impl RegressionMetrics {
    /// Score `y_pred` against `y_true`.
    ///
    /// R² is 1.0 for a perfect fit of a constant target and 0.0 for an
    /// imperfect one.
    pub fn compute(y_true: &EnergyTarget, y_pred: &EnergyPrediction) -> Result<Self> {
        if y_true.len() != y_pred.len() {
            return Err(EvChargeError::ShapeError {
                expected: format!("prediction length = {}", y_true.len()),
                actual: format!("prediction length = {}", y_pred.len()),
            });
        }
        if y_true.is_empty() {
            return Err(EvChargeError::Validation(
                "cannot score an empty prediction".to_string(),
            ));
        }

        let n = y_true.len() as f64;
        let errors = y_true.values() - y_pred.values();

        let mse = errors.mapv(|e| e * e).sum() / n;
        let mae = errors.mapv(f64::abs).sum() / n;

        let y_mean = y_true.values().sum() / n;
        let ss_tot: f64 = y_true.values().mapv(|y| (y - y_mean).powi(2)).sum();
        let ss_res: f64 = errors.mapv(|e| e * e).sum();
        let r2 = if ss_tot > 0.0 {
            1.0 - ss_res / ss_tot
        } else if ss_res == 0.0 {
            1.0
        } else {
            0.0
        };

        Ok(Self {
            mae,
            mse,
            rmse: mse.sqrt(),
            r2,
            n_samples: y_true.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_regression_metrics() {
        let y_true = EnergyTarget::new(array![3.0, -0.5, 2.0, 7.0]);
        let y_pred = EnergyPrediction::new(array![2.5, 0.0, 2.0, 8.0]);
        let m = RegressionMetrics::compute(&y_true, &y_pred).unwrap();

        assert!((m.mae - 0.5).abs() < 1e-12);
        assert!((m.mse - 0.375).abs() < 1e-12);
        assert!((m.r2 - 0.948_608_137_044_967_9).abs() < 1e-9);
    }

    #[test]
    fn test_constant_target_r2() {
        let y_true = EnergyTarget::new(array![2.0, 2.0]);
        let exact = RegressionMetrics::compute(&y_true, &EnergyPrediction::constant(2.0, 2)).unwrap();
        let off = RegressionMetrics::compute(&y_true, &EnergyPrediction::constant(3.0, 2)).unwrap();
        assert_eq!(exact.r2, 1.0);
        assert_eq!(off.r2, 0.0);
    }

    #[test]
    fn test_length_mismatch() {
        let y_true = EnergyTarget::new(array![1.0, 2.0]);
        let y_pred = EnergyPrediction::new(array![1.0]);
        assert!(RegressionMetrics::compute(&y_true, &y_pred).is_err());
    }
}
