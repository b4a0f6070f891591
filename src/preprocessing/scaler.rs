//! Standard scaling for numeric feature columns

use crate::error::{EvChargeError, Result};
use serde::{Deserialize, Serialize};

/// Parameters for one fitted column
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScalerParams {
    pub center: f64, // mean
    pub scale: f64,  // population std, 1.0 when constant
}

impl ScalerParams {
    pub fn apply(&self, value: f64) -> f64 {
        (value - self.center) / self.scale
    }
}

/// Z-score scaler: `(x - mean) / std`, one parameter pair per column
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StandardScaler {
    columns: Vec<String>,
    params: Vec<ScalerParams>,
    is_fitted: bool,
}

impl StandardScaler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fit mean and standard deviation of every column
    pub fn fit(&mut self, columns: &[(&str, &[f64])]) -> Result<&mut Self> {
        self.columns.clear();
        self.params.clear();

        for (name, values) in columns {
            if values.is_empty() {
                return Err(EvChargeError::Preprocessing(format!(
                    "cannot fit scaler on empty column '{}'",
                    name
                )));
            }
            self.columns.push(name.to_string());
            self.params.push(Self::compute_params(values));
        }

        self.is_fitted = true;
        Ok(self)
    }

    /// Scale one column with its fitted parameters
    pub fn transform_column(&self, name: &str, values: &[f64]) -> Result<Vec<f64>> {
        let params = self.params_for(name)?;
        Ok(values.iter().map(|&v| params.apply(v)).collect())
    }

    pub fn params_for(&self, name: &str) -> Result<ScalerParams> {
        if !self.is_fitted {
            return Err(EvChargeError::ModelNotFitted);
        }
        self.columns
            .iter()
            .position(|c| c == name)
            .map(|i| self.params[i])
            .ok_or_else(|| {
                EvChargeError::Preprocessing(format!("column '{}' was not fitted", name))
            })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    fn compute_params(values: &[f64]) -> ScalerParams {
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let std = var.sqrt();
        ScalerParams {
            center: mean,
            scale: if std == 0.0 || !std.is_finite() { 1.0 } else { std },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_scaler() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        let mut scaler = StandardScaler::new();
        scaler.fit(&[("a", &values)]).unwrap();

        let scaled = scaler.transform_column("a", &values).unwrap();
        let mean: f64 = scaled.iter().sum::<f64>() / 5.0;
        assert!(mean.abs() < 1e-10);

        let params = scaler.params_for("a").unwrap();
        assert!((params.scale - 2.0_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_constant_column_scale_is_one() {
        let values = [3.0, 3.0, 3.0];
        let mut scaler = StandardScaler::new();
        scaler.fit(&[("c", &values)]).unwrap();
        assert_eq!(scaler.transform_column("c", &[3.0, 4.0]).unwrap(), vec![0.0, 1.0]);
    }

    #[test]
    fn test_unfitted_scaler() {
        let scaler = StandardScaler::new();
        assert!(matches!(
            scaler.transform_column("a", &[1.0]),
            Err(EvChargeError::ModelNotFitted)
        ));
    }
}
