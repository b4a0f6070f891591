//! Fit-once column transform
//!
//! [`FeatureTransform::fit`] learns scaling statistics and category
//! vocabularies from training rows only. The resulting [`FittedTransform`] is
//! immutable and is applied unchanged to test rows and to the full dataset.

use super::columns::{FeatureKind, FeatureSet};
use super::encoder::OneHotEncoder;
use super::scaler::StandardScaler;
use crate::config::ColumnRoles;
use crate::error::{EvChargeError, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Unfitted transform definition
#[derive(Debug, Clone)]
pub struct FeatureTransform {
    roles: ColumnRoles,
}

impl FeatureTransform {
    pub fn new(roles: ColumnRoles) -> Self {
        Self { roles }
    }

    /// Learn scaler and encoder state from `train`
    pub fn fit(&self, train: &FeatureSet) -> Result<FittedTransform> {
        if train.n_rows() == 0 {
            return Err(EvChargeError::Preprocessing(
                "cannot fit transform on zero rows".to_string(),
            ));
        }
        if train.roles() != &self.roles {
            return Err(EvChargeError::Preprocessing(
                "feature set columns differ from the transform definition".to_string(),
            ));
        }

        let groups = self.roles.groups();
        let mut numeric = Vec::new();
        let mut categorical = Vec::new();
        for group in &groups {
            for column in &group.columns {
                match group.kind {
                    FeatureKind::Numeric => numeric.push((column.as_str(), numeric_of(train, column)?)),
                    FeatureKind::Categorical => {
                        categorical.push((column.as_str(), categorical_of(train, column)?))
                    }
                }
            }
        }

        let mut scaler = StandardScaler::new();
        scaler.fit(&numeric)?;
        let mut encoder = OneHotEncoder::new();
        encoder.fit(&categorical)?;

        let mut feature_names = Vec::new();
        for group in &groups {
            for column in &group.columns {
                match group.kind {
                    FeatureKind::Numeric => feature_names.push(column.clone()),
                    FeatureKind::Categorical => feature_names.extend(encoder.feature_names(column)?),
                }
            }
        }

        debug!(
            rows = train.n_rows(),
            n_features = feature_names.len(),
            "Fitted feature transform"
        );

        Ok(FittedTransform {
            roles: self.roles.clone(),
            scaler,
            encoder,
            feature_names,
        })
    }
}

/// Scaler and encoder state learned from training rows
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FittedTransform {
    roles: ColumnRoles,
    scaler: StandardScaler,
    encoder: OneHotEncoder,
    feature_names: Vec<String>,
}

impl FittedTransform {
    /// Encode every row of `features` into a dense matrix.
    ///
    /// Column blocks follow group order: important numeric, important
    /// categorical, other numeric, other categorical.
    pub fn transform(&self, features: &FeatureSet) -> Result<Array2<f64>> {
        if features.roles() != &self.roles {
            return Err(EvChargeError::Preprocessing(
                "feature set columns differ from the fitted transform".to_string(),
            ));
        }

        let n_rows = features.n_rows();
        let n_cols = self.feature_names.len();
        let mut out = Array2::zeros((n_rows, n_cols));

        let mut offset = 0;
        for group in self.roles.groups() {
            for column in &group.columns {
                match group.kind {
                    FeatureKind::Numeric => {
                        let scaled = self.scaler.transform_column(column, numeric_of(features, column)?)?;
                        for (row, value) in scaled.into_iter().enumerate() {
                            out[[row, offset]] = value;
                        }
                        offset += 1;
                    }
                    FeatureKind::Categorical => {
                        for (row, value) in categorical_of(features, column)?.iter().enumerate() {
                            if let Some(pos) = self.encoder.position(column, value.as_deref())? {
                                out[[row, offset + pos]] = 1.0;
                            }
                        }
                        offset += self.encoder.width(column)?;
                    }
                }
            }
        }

        Ok(out)
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn n_features_out(&self) -> usize {
        self.feature_names.len()
    }

    pub fn scaler(&self) -> &StandardScaler {
        &self.scaler
    }

    pub fn encoder(&self) -> &OneHotEncoder {
        &self.encoder
    }
}

fn numeric_of<'a>(features: &'a FeatureSet, column: &str) -> Result<&'a [f64]> {
    features
        .numeric_column(column)
        .ok_or_else(|| EvChargeError::Schema {
            missing: vec![column.to_string()],
        })
}

fn categorical_of<'a>(features: &'a FeatureSet, column: &str) -> Result<&'a [Option<String>]> {
    features
        .categorical_column(column)
        .ok_or_else(|| EvChargeError::Schema {
            missing: vec![column.to_string()],
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roles() -> ColumnRoles {
        ColumnRoles {
            important_numeric: vec!["duration_hours".to_string()],
            important_categorical: vec!["session_day".to_string()],
            other_numeric: vec![],
            other_categorical: vec!["station_id".to_string()],
        }
    }

    fn features(durations: &[f64], days: &[&str], stations: &[&str]) -> FeatureSet {
        let strings = |v: &[&str]| v.iter().map(|s| Some(s.to_string())).collect::<Vec<_>>();
        FeatureSet::from_columns(
            &roles(),
            vec![("duration_hours".to_string(), durations.to_vec())],
            vec![
                ("session_day".to_string(), strings(days)),
                ("station_id".to_string(), strings(stations)),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_block_order_and_names() {
        let train = features(&[1.0, 3.0], &["Weekend", "Weekday"], &["ST-2", "ST-1"]);
        let fitted = FeatureTransform::new(roles()).fit(&train).unwrap();

        assert_eq!(
            fitted.feature_names(),
            &[
                "duration_hours",
                "session_day=Weekday",
                "session_day=Weekend",
                "station_id=ST-1",
                "station_id=ST-2"
            ]
        );

        let x = fitted.transform(&train).unwrap();
        assert_eq!(x.shape(), &[2, 5]);
        assert_eq!(x.row(0).to_vec(), vec![-1.0, 0.0, 1.0, 0.0, 1.0]);
        assert_eq!(x.row(1).to_vec(), vec![1.0, 1.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_transform_uses_train_statistics_only() {
        let train = features(&[1.0, 3.0], &["Weekday", "Weekday"], &["ST-1", "ST-1"]);
        let fitted = FeatureTransform::new(roles()).fit(&train).unwrap();

        let test = features(&[5.0], &["Weekend"], &["ST-9"]);
        let x = fitted.transform(&test).unwrap();
        assert_eq!(x.row(0).to_vec(), vec![3.0, 0.0, 0.0]);
    }
}
