//! Pipeline configuration
//!
//! Every knob of a training run lives here: input column names, the feature
//! column roles, the split discipline and the hyperparameters of the three
//! trainers. All fields have defaults, so an empty JSON object is a valid
//! configuration file.

use crate::error::{EvChargeError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Names of the columns in the raw session table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSchema {
    pub start_time: String,
    pub end_time: String,
    pub energy_kwh: String,
    pub session_day: String,
    pub session_type: String,
    pub station_id: String,
    /// Identifier columns. Rejected as features by
    /// [`PipelineConfig::validate`], passed through to output.
    pub identifier_columns: Vec<String>,
}

impl Default for SessionSchema {
    fn default() -> Self {
        Self {
            start_time: "start_time".to_string(),
            end_time: "end_time".to_string(),
            energy_kwh: "energy_kWh".to_string(),
            session_day: "session_day".to_string(),
            session_type: "session_type".to_string(),
            station_id: "station_id".to_string(),
            identifier_columns: vec![
                "session_id".to_string(),
                "user_id".to_string(),
                "vehicle_id".to_string(),
            ],
        }
    }
}

impl SessionSchema {
    /// Columns that must be present in the input file
    pub fn required_columns(&self) -> Vec<&str> {
        vec![
            self.start_time.as_str(),
            self.end_time.as_str(),
            self.energy_kwh.as_str(),
            self.session_day.as_str(),
            self.session_type.as_str(),
            self.station_id.as_str(),
        ]
    }
}

/// Train/test split settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    /// Fraction of rows held out for testing
    pub test_fraction: f64,
    pub seed: u64,
    pub shuffle: bool,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            test_fraction: 0.2,
            seed: 42,
            shuffle: true,
        }
    }
}

/// Settings for the L1 linear model and its internal strength search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LassoConfig {
    /// Number of log-spaced candidate strengths
    pub n_alphas: usize,
    pub alpha_min: f64,
    pub alpha_max: f64,
    pub cv_folds: usize,
    pub max_iter: usize,
    pub tol: f64,
}

impl Default for LassoConfig {
    fn default() -> Self {
        Self {
            n_alphas: 20,
            alpha_min: 1e-3,
            alpha_max: 10.0,
            cv_folds: 5,
            max_iter: 1000,
            tol: 1e-4,
        }
    }
}

impl LassoConfig {
    /// Candidate strengths, log-spaced from `alpha_min` to `alpha_max` inclusive
    pub fn alphas(&self) -> Vec<f64> {
        logspace(self.alpha_min.log10(), self.alpha_max.log10(), self.n_alphas)
    }
}

/// Settings for the tree ensemble
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestConfig {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    pub min_samples_split: usize,
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_estimators: 400,
            max_depth: 8,
            min_samples_leaf: 20,
            min_samples_split: 2,
            seed: 42,
        }
    }
}

/// RBF bandwidth candidate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GammaSpec {
    /// `1 / (n_features * Var(X))` of the training matrix
    Scale,
    Value(f64),
}

impl std::fmt::Display for GammaSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GammaSpec::Scale => write!(f, "scale"),
            GammaSpec::Value(v) => write!(f, "{}", v),
        }
    }
}

/// Settings for the kernel regressor grid search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SvrSearchConfig {
    pub c_values: Vec<f64>,
    pub epsilon_values: Vec<f64>,
    pub gamma_values: Vec<GammaSpec>,
    pub cv_folds: usize,
    /// Solver stopping tolerance on the KKT violation
    pub tol: f64,
    pub max_iter: usize,
    /// Largest training set for which the kernel matrix is materialised;
    /// larger sets compute kernel rows on demand
    pub max_kernel_samples: usize,
}

impl Default for SvrSearchConfig {
    fn default() -> Self {
        Self {
            c_values: vec![1.0, 10.0, 100.0],
            epsilon_values: vec![0.5, 1.0, 2.0],
            gamma_values: vec![GammaSpec::Scale, GammaSpec::Value(0.1), GammaSpec::Value(0.01)],
            cv_folds: 5,
            tol: 1e-3,
            max_iter: 1_000_000,
            max_kernel_samples: 10_000,
        }
    }
}

/// Column roles for the feature matrix.
///
/// Only columns listed here ever reach the preprocessing transform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnRoles {
    pub important_numeric: Vec<String>,
    pub important_categorical: Vec<String>,
    pub other_numeric: Vec<String>,
    pub other_categorical: Vec<String>,
}

impl Default for ColumnRoles {
    fn default() -> Self {
        Self::for_schema(&SessionSchema::default())
    }
}

impl ColumnRoles {
    /// Default roles over the derived time columns and the schema's
    /// categorical columns, whatever they are named
    pub fn for_schema(schema: &SessionSchema) -> Self {
        Self {
            important_numeric: vec!["duration_hours".to_string(), "start_hour".to_string()],
            important_categorical: vec![schema.session_day.clone(), schema.session_type.clone()],
            other_numeric: Vec::new(),
            other_categorical: vec![schema.station_id.clone()],
        }
    }
}

/// Full configuration of a training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub schema: SessionSchema,
    pub columns: ColumnRoles,
    pub split: SplitConfig,
    pub lasso: LassoConfig,
    pub forest: ForestConfig,
    pub svr: SvrSearchConfig,
    /// Sessions at or below this duration are dropped at load time
    pub min_duration_hours: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            schema: SessionSchema::default(),
            columns: ColumnRoles::default(),
            split: SplitConfig::default(),
            lasso: LassoConfig::default(),
            forest: ForestConfig::default(),
            svr: SvrSearchConfig::default(),
            min_duration_hours: 1e-3,
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a JSON configuration file. Missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    /// Parse and validate a JSON configuration. Without a `columns` object the
    /// feature roles follow the (possibly renamed) schema columns.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        let has_columns = value.get("columns").is_some();
        let mut config: PipelineConfig = serde_json::from_value(value)?;
        if !has_columns {
            config.columns = ColumnRoles::for_schema(&config.schema);
        }
        config.validate()?;
        Ok(config)
    }

    /// Replace the schema and re-derive the default feature roles from it
    pub fn with_schema(mut self, schema: SessionSchema) -> Self {
        self.columns = ColumnRoles::for_schema(&schema);
        self.schema = schema;
        self
    }

    pub fn with_test_fraction(mut self, fraction: f64) -> Self {
        self.split.test_fraction = fraction;
        self
    }

    /// Set one seed for the split and the forest
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.split.seed = seed;
        self.forest.seed = seed;
        self
    }

    pub fn with_forest(mut self, forest: ForestConfig) -> Self {
        self.forest = forest;
        self
    }

    pub fn with_svr(mut self, svr: SvrSearchConfig) -> Self {
        self.svr = svr;
        self
    }

    pub fn with_lasso(mut self, lasso: LassoConfig) -> Self {
        self.lasso = lasso;
        self
    }

    /// Check ranges before any data is touched
    pub fn validate(&self) -> Result<()> {
        let f = self.split.test_fraction;
        if !(f > 0.0 && f < 1.0) {
            return Err(invalid("split.test_fraction", f, "must be in (0, 1)"));
        }
        if self.lasso.n_alphas == 0 {
            return Err(invalid("lasso.n_alphas", 0, "must be positive"));
        }
        if !(self.lasso.alpha_min > 0.0 && self.lasso.alpha_max >= self.lasso.alpha_min) {
            return Err(invalid(
                "lasso.alpha_min",
                self.lasso.alpha_min,
                "need 0 < alpha_min <= alpha_max",
            ));
        }
        if self.lasso.cv_folds < 2 {
            return Err(invalid("lasso.cv_folds", self.lasso.cv_folds, "must be at least 2"));
        }
        if self.forest.n_estimators == 0 {
            return Err(invalid("forest.n_estimators", 0, "must be positive"));
        }
        if self.forest.min_samples_leaf == 0 {
            return Err(invalid("forest.min_samples_leaf", 0, "must be positive"));
        }
        if self.svr.cv_folds < 2 {
            return Err(invalid("svr.cv_folds", self.svr.cv_folds, "must be at least 2"));
        }
        if self.svr.c_values.is_empty()
            || self.svr.epsilon_values.is_empty()
            || self.svr.gamma_values.is_empty()
        {
            return Err(EvChargeError::Config(
                "svr grid must have at least one value per hyperparameter".to_string(),
            ));
        }
        if self.svr.c_values.iter().any(|&c| c <= 0.0) {
            return Err(EvChargeError::Config("svr.c_values must be positive".to_string()));
        }
        if self.svr.epsilon_values.iter().any(|&e| e < 0.0) {
            return Err(EvChargeError::Config(
                "svr.epsilon_values must be non-negative".to_string(),
            ));
        }
        if self
            .svr
            .gamma_values
            .iter()
            .any(|g| matches!(g, GammaSpec::Value(v) if *v <= 0.0))
        {
            return Err(EvChargeError::Config("svr gamma values must be positive".to_string()));
        }
        if self.min_duration_hours < 0.0 {
            return Err(invalid("min_duration_hours", self.min_duration_hours, "must be >= 0"));
        }
        let n_features = self.columns.important_numeric.len()
            + self.columns.important_categorical.len()
            + self.columns.other_numeric.len()
            + self.columns.other_categorical.len();
        if n_features == 0 {
            return Err(EvChargeError::Config("no feature columns configured".to_string()));
        }
        self.validate_roles()
    }

    /// Feature roles must not name identifiers, nor schema columns under a
    /// name the schema has replaced
    fn validate_roles(&self) -> Result<()> {
        let features = self.columns.all_columns();
        if let Some(id) = features
            .iter()
            .find(|c| self.schema.identifier_columns.iter().any(|id| id.as_str() == **c))
        {
            return Err(EvChargeError::Config(format!(
                "identifier column '{}' cannot be a feature",
                id
            )));
        }

        let defaults = SessionSchema::default();
        let renamed = [
            (&defaults.session_day, &self.schema.session_day),
            (&defaults.session_type, &self.schema.session_type),
            (&defaults.station_id, &self.schema.station_id),
        ];
        for (default_name, name) in renamed {
            if default_name != name && features.contains(&default_name.as_str()) {
                return Err(EvChargeError::Config(format!(
                    "feature column '{}' is named '{}' in the schema",
                    default_name, name
                )));
            }
        }
        Ok(())
    }
}

fn invalid(name: &str, value: impl ToString, reason: &str) -> EvChargeError {
    EvChargeError::InvalidParameter {
        name: name.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// `n` points evenly spaced in log10 space between `10^start` and `10^stop`
pub fn logspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![10f64.powf(start)],
        _ => {
            let step = (stop - start) / (n - 1) as f64;
            (0..n).map(|i| 10f64.powf(start + step * i as f64)).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = PipelineConfig::new();
        assert!(config.validate().is_ok());
        assert_eq!(config.split.test_fraction, 0.2);
        assert_eq!(config.split.seed, 42);
        assert_eq!(config.forest.n_estimators, 400);
        assert_eq!(config.min_duration_hours, 1e-3);
    }

    #[test]
    fn test_lasso_alpha_grid() {
        let alphas = LassoConfig::default().alphas();
        assert_eq!(alphas.len(), 20);
        assert!((alphas[0] - 1e-3).abs() < 1e-12);
        assert!((alphas[19] - 10.0).abs() < 1e-9);
        assert!(alphas.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn test_svr_grid_has_27_candidates() {
        let svr = SvrSearchConfig::default();
        let n = svr.c_values.len() * svr.epsilon_values.len() * svr.gamma_values.len();
        assert_eq!(n, 27);
    }

    #[test]
    fn test_invalid_test_fraction() {
        let config = PipelineConfig::new().with_test_fraction(1.5);
        assert!(matches!(
            config.validate(),
            Err(EvChargeError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_identifier_column_cannot_be_feature() {
        let mut config = PipelineConfig::new();
        config.columns.other_categorical.push("user_id".to_string());
        match config.validate() {
            Err(EvChargeError::Config(msg)) => assert!(msg.contains("user_id")),
            other => panic!("expected config error, got {:?}", other),
        }

        config.schema.identifier_columns.clear();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_roles_follow_renamed_schema() {
        let schema = SessionSchema {
            session_day: "day_kind".to_string(),
            station_id: "charger".to_string(),
            ..SessionSchema::default()
        };
        let config = PipelineConfig::new().with_schema(schema);
        assert!(config.validate().is_ok());
        assert_eq!(config.columns.important_categorical, vec!["day_kind", "session_type"]);
        assert_eq!(config.columns.other_categorical, vec!["charger"]);

        let json = r#"{ "schema": { "session_day": "day_kind" } }"#;
        let config = PipelineConfig::from_json_str(json).unwrap();
        assert_eq!(config.columns.important_categorical[0], "day_kind");
    }

    #[test]
    fn test_stale_role_after_schema_rename() {
        let mut config = PipelineConfig::new();
        config.schema.station_id = "charger".to_string();
        match config.validate() {
            Err(EvChargeError::Config(msg)) => assert!(msg.contains("station_id")),
            other => panic!("expected config error, got {:?}", other),
        }

        let json = r#"{ "schema": { "station_id": "charger" }, "columns": { "other_categorical": ["station_id"] } }"#;
        assert!(matches!(
            PipelineConfig::from_json_str(json),
            Err(EvChargeError::Config(_))
        ));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{ "split": { "seed": 7 }, "svr": { "gamma_values": ["scale", { "value": 0.5 }] } }"#;
        let config: PipelineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.split.seed, 7);
        assert_eq!(config.split.test_fraction, 0.2);
        assert_eq!(config.svr.gamma_values, vec![GammaSpec::Scale, GammaSpec::Value(0.5)]);
        assert_eq!(config.forest.max_depth, 8);
    }
}
