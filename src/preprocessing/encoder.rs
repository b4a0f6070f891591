//! One-hot encoding for categorical feature columns

use crate::error::{EvChargeError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One-hot encoder with a sorted, fit-time vocabulary per column.
///
/// Categories absent at fit time, and missing values, encode as an all-zero
/// vector instead of failing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OneHotEncoder {
    // column name -> sorted categories
    vocabularies: Vec<(String, Vec<String>)>,
    is_fitted: bool,
}

impl OneHotEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fit(&mut self, columns: &[(&str, &[Option<String>])]) -> Result<&mut Self> {
        self.vocabularies = columns
            .iter()
            .map(|(name, values)| {
                let categories: BTreeSet<&str> = values.iter().flatten().map(String::as_str).collect();
                (
                    name.to_string(),
                    categories.into_iter().map(str::to_string).collect(),
                )
            })
            .collect();
        self.is_fitted = true;
        Ok(self)
    }

    pub fn categories(&self, name: &str) -> Result<&[String]> {
        if !self.is_fitted {
            return Err(EvChargeError::ModelNotFitted);
        }
        self.vocabularies
            .iter()
            .find(|(c, _)| c == name)
            .map(|(_, v)| v.as_slice())
            .ok_or_else(|| EvChargeError::Preprocessing(format!("column '{}' was not fitted", name)))
    }

    /// Output width for one column
    pub fn width(&self, name: &str) -> Result<usize> {
        Ok(self.categories(name)?.len())
    }

    /// Output feature names, `column=category`
    pub fn feature_names(&self, name: &str) -> Result<Vec<String>> {
        Ok(self
            .categories(name)?
            .iter()
            .map(|cat| format!("{}={}", name, cat))
            .collect())
    }

    /// Index of the hot position for a value, or `None` when unseen
    pub fn position(&self, name: &str, value: Option<&str>) -> Result<Option<usize>> {
        let categories = self.categories(name)?;
        Ok(value.and_then(|v| {
            categories
                .binary_search_by(|c| c.as_str().cmp(v))
                .ok()
        }))
    }

    /// Encode one column into row-major indicator rows
    pub fn transform_column(&self, name: &str, values: &[Option<String>]) -> Result<Vec<Vec<f64>>> {
        let width = self.width(name)?;
        values
            .iter()
            .map(|value| {
                let mut row = vec![0.0; width];
                if let Some(pos) = self.position(name, value.as_deref())? {
                    row[pos] = 1.0;
                }
                Ok(row)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<Option<String>> {
        values.iter().map(|s| Some(s.to_string())).collect()
    }

    #[test]
    fn test_onehot_sorted_vocabulary() {
        let values = strings(&["Weekend", "Weekday", "Weekend"]);
        let mut encoder = OneHotEncoder::new();
        encoder.fit(&[("session_day", &values)]).unwrap();

        assert_eq!(
            encoder.feature_names("session_day").unwrap(),
            vec!["session_day=Weekday", "session_day=Weekend"]
        );
        let rows = encoder.transform_column("session_day", &values).unwrap();
        assert_eq!(rows, vec![vec![0.0, 1.0], vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn test_unseen_category_is_all_zero() {
        let mut encoder = OneHotEncoder::new();
        encoder.fit(&[("station_id", &strings(&["ST-1", "ST-2"]))]).unwrap();

        let rows = encoder
            .transform_column("station_id", &[Some("ST-99".to_string()), None])
            .unwrap();
        assert_eq!(rows, vec![vec![0.0, 0.0], vec![0.0, 0.0]]);
    }
}
