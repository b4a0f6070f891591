//! Allow-listed feature columns
//!
//! A [`FeatureSet`] is built by reading exactly the columns named in
//! [`ColumnRoles`]. Identifier columns are never read, so they cannot leak
//! into the transform.

use crate::config::ColumnRoles;
use crate::data::frame;
use crate::error::{EvChargeError, Result};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};

/// How a group of columns is encoded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeatureKind {
    Numeric,
    Categorical,
}

/// A named group of columns sharing one encoding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureGroup {
    pub name: String,
    pub kind: FeatureKind,
    pub columns: Vec<String>,
}

impl ColumnRoles {
    /// Non-empty groups in output order
    pub fn groups(&self) -> Vec<FeatureGroup> {
        [
            ("important_numeric", FeatureKind::Numeric, &self.important_numeric),
            ("important_categorical", FeatureKind::Categorical, &self.important_categorical),
            ("other_numeric", FeatureKind::Numeric, &self.other_numeric),
            ("other_categorical", FeatureKind::Categorical, &self.other_categorical),
        ]
        .into_iter()
        .filter(|(_, _, columns)| !columns.is_empty())
        .map(|(name, kind, columns)| FeatureGroup {
            name: name.to_string(),
            kind,
            columns: columns.clone(),
        })
        .collect()
    }

    /// Every allow-listed column name
    pub fn all_columns(&self) -> Vec<&str> {
        self.important_numeric
            .iter()
            .chain(&self.important_categorical)
            .chain(&self.other_numeric)
            .chain(&self.other_categorical)
            .map(String::as_str)
            .collect()
    }
}

/// Raw (unencoded) values for the allow-listed columns
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSet {
    roles: ColumnRoles,
    numeric: Vec<(String, Vec<f64>)>,
    categorical: Vec<(String, Vec<Option<String>>)>,
    n_rows: usize,
}

impl FeatureSet {
    /// Read the allow-listed columns from a cleaned frame
    pub fn from_frame(df: &DataFrame, roles: &ColumnRoles) -> Result<Self> {
        frame::require_columns(df, &roles.all_columns())?;

        let mut numeric = Vec::new();
        let mut categorical = Vec::new();
        for group in roles.groups() {
            for column in &group.columns {
                match group.kind {
                    FeatureKind::Numeric => {
                        let values = frame::float_column(df, column)?
                            .into_iter()
                            .enumerate()
                            .map(|(row, v)| match v {
                                Some(x) if x.is_finite() => Ok(x),
                                _ => Err(EvChargeError::Preprocessing(format!(
                                    "numeric feature '{}' row {} is missing or not finite",
                                    column, row
                                ))),
                            })
                            .collect::<Result<Vec<f64>>>()?;
                        numeric.push((column.clone(), values));
                    }
                    FeatureKind::Categorical => {
                        categorical.push((column.clone(), frame::string_column(df, column)?));
                    }
                }
            }
        }

        Ok(Self {
            roles: roles.clone(),
            numeric,
            categorical,
            n_rows: df.height(),
        })
    }

    /// Build from column vectors directly; every column must be listed in `roles`
    pub fn from_columns(
        roles: &ColumnRoles,
        numeric: Vec<(String, Vec<f64>)>,
        categorical: Vec<(String, Vec<Option<String>>)>,
    ) -> Result<Self> {
        let n_rows = numeric
            .first()
            .map(|(_, v)| v.len())
            .or_else(|| categorical.first().map(|(_, v)| v.len()))
            .unwrap_or(0);

        let allowed = roles.all_columns();
        for name in numeric.iter().map(|(n, _)| n).chain(categorical.iter().map(|(n, _)| n)) {
            if !allowed.contains(&name.as_str()) {
                return Err(EvChargeError::Preprocessing(format!(
                    "column '{}' is not an allow-listed feature",
                    name
                )));
            }
        }
        let lengths_ok = numeric.iter().all(|(_, v)| v.len() == n_rows)
            && categorical.iter().all(|(_, v)| v.len() == n_rows);
        if !lengths_ok {
            return Err(EvChargeError::ShapeError {
                expected: format!("{} rows in every column", n_rows),
                actual: "columns of differing length".to_string(),
            });
        }

        let set = Self {
            roles: roles.clone(),
            numeric,
            categorical,
            n_rows,
        };
        for column in allowed {
            let present = set.numeric_column(column).is_some() || set.categorical_column(column).is_some();
            if !present {
                return Err(EvChargeError::Schema {
                    missing: vec![column.to_string()],
                });
            }
        }
        Ok(set)
    }

    pub fn roles(&self) -> &ColumnRoles {
        &self.roles
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn numeric_column(&self, name: &str) -> Option<&[f64]> {
        self.numeric
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_slice())
    }

    pub fn categorical_column(&self, name: &str) -> Option<&[Option<String>]> {
        self.categorical
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_slice())
    }

    /// Rows at `indices`, in that order
    pub fn select(&self, indices: &[usize]) -> Self {
        Self {
            roles: self.roles.clone(),
            numeric: self
                .numeric
                .iter()
                .map(|(name, values)| (name.clone(), indices.iter().map(|&i| values[i]).collect()))
                .collect(),
            categorical: self
                .categorical
                .iter()
                .map(|(name, values)| {
                    (name.clone(), indices.iter().map(|&i| values[i].clone()).collect())
                })
                .collect(),
            n_rows: indices.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    #[test]
    fn test_groups_skip_empty() {
        let groups = ColumnRoles::default().groups();
        let names: Vec<&str> = groups.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["important_numeric", "important_categorical", "other_categorical"]);
    }

    #[test]
    fn test_identifiers_never_read() {
        let df = df!(
            "duration_hours" => &[1.0, 2.0],
            "start_hour" => &[8.0, 9.5],
            "session_day" => &["Weekday", "Weekend"],
            "session_type" => &["Public", "Home"],
            "station_id" => &["ST-1", "ST-2"],
            "user_id" => &["u1", "u2"]
        )
        .unwrap();
        let features = FeatureSet::from_frame(&df, &ColumnRoles::default()).unwrap();
        assert_eq!(features.n_rows(), 2);
        assert!(features.categorical_column("user_id").is_none());
        assert!(features.numeric_column("user_id").is_none());
        assert_eq!(features.numeric_column("start_hour"), Some(&[8.0, 9.5][..]));
    }

    #[test]
    fn test_select_keeps_order() {
        let df = df!(
            "duration_hours" => &[1.0, 2.0, 3.0],
            "start_hour" => &[8.0, 9.0, 10.0],
            "session_day" => &["a", "b", "c"],
            "session_type" => &["x", "y", "z"],
            "station_id" => &["s1", "s2", "s3"]
        )
        .unwrap();
        let features = FeatureSet::from_frame(&df, &ColumnRoles::default()).unwrap();
        let picked = features.select(&[2, 0]);
        assert_eq!(picked.numeric_column("duration_hours"), Some(&[3.0, 1.0][..]));
        assert_eq!(
            picked.categorical_column("station_id").unwrap(),
            &[Some("s3".to_string()), Some("s1".to_string())]
        );
    }
}
