//! Typed column access on polars frames

use crate::error::{EvChargeError, Result};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;

/// Read a CSV file with a header row. Open failures surface as IO errors.
pub(crate) fn read_csv(path: &Path) -> Result<DataFrame> {
    let file = File::open(path)?;

    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(1000))
        .into_reader_with_file_handle(file)
        .finish()?;

    Ok(df)
}

/// Write a frame as CSV with a header row
pub(crate) fn write_csv(df: &mut DataFrame, path: &Path) -> Result<()> {
    let mut file = File::create(path)?;

    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(df)?;

    Ok(())
}

pub(crate) fn has_column(df: &DataFrame, name: &str) -> bool {
    df.column(name).is_ok()
}

/// Fail with a schema error naming every absent column
pub(crate) fn require_columns(df: &DataFrame, names: &[&str]) -> Result<()> {
    let missing: Vec<String> = names
        .iter()
        .filter(|name| !has_column(df, name))
        .map(|name| name.to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(EvChargeError::Schema { missing })
    }
}

/// Column values cast to f64. Values that cannot be cast become `None`.
pub(crate) fn float_column(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let column = df.column(name).map_err(|_| EvChargeError::Schema {
        missing: vec![name.to_string()],
    })?;
    let casted = column.cast(&DataType::Float64)?;
    let values = casted.as_materialized_series().f64()?.into_iter().collect();
    Ok(values)
}

/// Column values rendered as strings, nulls preserved
pub(crate) fn string_column(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let column = df.column(name).map_err(|_| EvChargeError::Schema {
        missing: vec![name.to_string()],
    })?;
    let casted = column.cast(&DataType::String)?;
    let values = casted
        .as_materialized_series()
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect();
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_columns_lists_all_missing() {
        let df = df!("a" => &[1.0, 2.0]).unwrap();
        let err = require_columns(&df, &["a", "b", "c"]).unwrap_err();
        match err {
            EvChargeError::Schema { missing } => assert_eq!(missing, vec!["b", "c"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_string_column_from_integers() {
        let df = df!("station" => &[12i64, 7]).unwrap();
        let values = string_column(&df, "station").unwrap();
        assert_eq!(values, vec![Some("12".to_string()), Some("7".to_string())]);
    }

    #[test]
    fn test_float_column_from_integers() {
        let df = df!("energy" => &[6i64, 3]).unwrap();
        let values = float_column(&df, "energy").unwrap();
        assert_eq!(values, vec![Some(6.0), Some(3.0)]);
    }
}
