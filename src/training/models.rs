//! Regressor trait and the three fitted model families

use super::linear_models::LassoCv;
use super::random_forest::RandomForest;
use super::svm::SVMRegressor;
use crate::error::Result;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Trait for regressors trained on the encoded feature matrix
pub trait Model: Send + Sync {
    /// Fit the model to training data
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    /// Make predictions
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// Get feature importances (if available)
    fn feature_importances(&self) -> Option<Array1<f64>> {
        None
    }

    fn name(&self) -> &'static str;
}

/// The model families trained by the pipeline, in reporting order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Lasso,
    RandomForest,
    Svr,
}

impl ModelKind {
    pub const ALL: [ModelKind; 3] = [ModelKind::Lasso, ModelKind::RandomForest, ModelKind::Svr];

    /// Short suffix used in prediction column names
    pub fn suffix(&self) -> &'static str {
        match self {
            ModelKind::Lasso => "lasso",
            ModelKind::RandomForest => "rf",
            ModelKind::Svr => "svr",
        }
    }

    /// Name of the appended prediction column, e.g. `kWh_pred_rf`
    pub fn prediction_column(&self) -> String {
        format!("kWh_pred_{}", self.suffix())
    }

    /// Label used in reports; every model predicts average power
    pub fn display_name(&self) -> &'static str {
        match self {
            ModelKind::Lasso => "Lasso(avg_kW)",
            ModelKind::RandomForest => "RandomForest(avg_kW)",
            ModelKind::Svr => "SVR(avg_kW)",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// A fitted regressor of one of the pipeline's families
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TrainedModel {
    Lasso(LassoCv),
    RandomForest(RandomForest),
    Svr(SVMRegressor),
}

impl TrainedModel {
    pub fn kind(&self) -> ModelKind {
        match self {
            TrainedModel::Lasso(_) => ModelKind::Lasso,
            TrainedModel::RandomForest(_) => ModelKind::RandomForest,
            TrainedModel::Svr(_) => ModelKind::Svr,
        }
    }

    fn as_model(&self) -> &dyn Model {
        match self {
            TrainedModel::Lasso(m) => m,
            TrainedModel::RandomForest(m) => m,
            TrainedModel::Svr(m) => m,
        }
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.as_model().predict(x)
    }

    pub fn feature_importances(&self) -> Option<Array1<f64>> {
        self.as_model().feature_importances()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prediction_columns() {
        let columns: Vec<String> = ModelKind::ALL.iter().map(|k| k.prediction_column()).collect();
        assert_eq!(columns, vec!["kWh_pred_lasso", "kWh_pred_rf", "kWh_pred_svr"]);
    }

    #[test]
    fn test_display_names() {
        assert_eq!(ModelKind::RandomForest.to_string(), "RandomForest(avg_kW)");
        assert_eq!(ModelKind::Svr.display_name(), "SVR(avg_kW)");
    }
}
