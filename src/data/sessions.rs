//! Session loader and cleaner
//!
//! Reads the raw session table, parses both timestamps, derives
//! `duration_hours` and `start_hour`, and drops sessions that cannot yield a
//! finite average power. Dropped rows are never repaired.

use super::dataset::{Durations, EnergyTarget};
use super::frame;
use super::timestamp::{duration_hours, fractional_hour, parse_timestamp, Timestamp};
use crate::config::SessionSchema;
use crate::error::{EvChargeError, Result};
use ndarray::Array1;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

/// Name of the derived duration column
pub const DURATION_COLUMN: &str = "duration_hours";
/// Name of the derived start-hour column
pub const START_HOUR_COLUMN: &str = "start_hour";

/// Row counts from a cleaning pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleaningStats {
    pub rows_read: usize,
    /// Rows with `end <= start`
    pub dropped_non_positive: usize,
    /// Rows with a positive duration at or below the minimum
    pub dropped_too_short: usize,
    pub rows_kept: usize,
}

/// The cleaned session table.
///
/// `frame` keeps every input column plus the two derived ones, in original
/// post-cleaning order; `durations` and `energy` are row-aligned with it.
#[derive(Debug, Clone)]
pub struct CleanedSessions {
    frame: DataFrame,
    durations: Durations,
    energy: EnergyTarget,
    stats: CleaningStats,
}

impl CleanedSessions {
    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn durations(&self) -> &Durations {
        &self.durations
    }

    pub fn energy(&self) -> &EnergyTarget {
        &self.energy
    }

    pub fn stats(&self) -> CleaningStats {
        self.stats
    }

    pub fn len(&self) -> usize {
        self.frame.height()
    }

    pub fn is_empty(&self) -> bool {
        self.frame.height() == 0
    }
}

/// Loads and cleans charging-session tables
#[derive(Debug, Clone)]
pub struct SessionLoader {
    schema: SessionSchema,
    min_duration_hours: f64,
}

impl Default for SessionLoader {
    fn default() -> Self {
        Self::new(SessionSchema::default())
    }
}

impl SessionLoader {
    pub fn new(schema: SessionSchema) -> Self {
        Self {
            schema,
            min_duration_hours: 1e-3,
        }
    }

    pub fn with_min_duration_hours(mut self, hours: f64) -> Self {
        self.min_duration_hours = hours;
        self
    }

    /// Read and clean a CSV file. The file itself is never modified.
    pub fn load_csv(&self, path: impl AsRef<Path>) -> Result<CleanedSessions> {
        let path = path.as_ref();
        let df = frame::read_csv(path)?;
        info!(path = %path.display(), rows = df.height(), cols = df.width(), "Read session table");
        self.clean(df)
    }

    /// Validate the schema, parse and filter an in-memory session table
    pub fn clean(&self, df: DataFrame) -> Result<CleanedSessions> {
        frame::require_columns(&df, &self.schema.required_columns())?;

        let starts = self.timestamps(&df, &self.schema.start_time)?;
        let ends = self.timestamps(&df, &self.schema.end_time)?;
        let energy = self.energy_values(&df)?;

        let rows_read = df.height();
        let mut keep = Vec::with_capacity(rows_read);
        let mut durations = Vec::with_capacity(rows_read);
        let mut start_hours = Vec::with_capacity(rows_read);
        let mut kept_energy = Vec::with_capacity(rows_read);
        let mut stats = CleaningStats {
            rows_read,
            ..Default::default()
        };

        for i in 0..rows_read {
            if ends[i].instant <= starts[i].instant {
                stats.dropped_non_positive += 1;
                keep.push(false);
                continue;
            }
            let hours = duration_hours(starts[i].instant, ends[i].instant);
            if hours <= self.min_duration_hours {
                stats.dropped_too_short += 1;
                keep.push(false);
                continue;
            }
            keep.push(true);
            durations.push(hours);
            start_hours.push(fractional_hour(starts[i].wall));
            kept_energy.push(energy[i]);
        }
        stats.rows_kept = durations.len();

        let dropped = stats.dropped_non_positive + stats.dropped_too_short;
        if dropped > 0 {
            warn!(
                dropped,
                non_positive = stats.dropped_non_positive,
                too_short = stats.dropped_too_short,
                min_duration_hours = self.min_duration_hours,
                "Dropped invalid sessions"
            );
        }
        info!(rows = stats.rows_kept, "Cleaned session table");

        let mask = BooleanChunked::new("keep".into(), &keep);
        let mut cleaned = df.filter(&mask)?;
        cleaned.with_column(Series::new(DURATION_COLUMN.into(), durations.clone()))?;
        cleaned.with_column(Series::new(START_HOUR_COLUMN.into(), start_hours))?;

        Ok(CleanedSessions {
            frame: cleaned,
            durations: Durations::new(Array1::from_vec(durations)),
            energy: EnergyTarget::new(Array1::from_vec(kept_energy)),
            stats,
        })
    }

    fn timestamps(&self, df: &DataFrame, column: &str) -> Result<Vec<Timestamp>> {
        frame::string_column(df, column)?
            .into_iter()
            .enumerate()
            .map(|(row, raw)| {
                raw.as_deref().and_then(parse_timestamp).ok_or_else(|| {
                    EvChargeError::DataFormat(format!(
                        "column '{}' row {}: cannot parse {:?} as a date-time",
                        column,
                        row,
                        raw.unwrap_or_default()
                    ))
                })
            })
            .collect()
    }

    fn energy_values(&self, df: &DataFrame) -> Result<Vec<f64>> {
        let column = &self.schema.energy_kwh;
        frame::float_column(df, column)?
            .into_iter()
            .enumerate()
            .map(|(row, value)| match value {
                Some(v) if v.is_finite() => Ok(v),
                _ => Err(EvChargeError::DataFormat(format!(
                    "column '{}' row {}: energy is missing or not numeric",
                    column, row
                ))),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_sessions() -> DataFrame {
        df!(
            "session_id" => &["a", "b", "c", "d"],
            "start_time" => &["2024-01-01T08:00", "2024-01-01T10:00", "2024-01-01T12:00", "2024-01-01T13:00"],
            "end_time" => &["2024-01-01T09:30", "2024-01-01T10:00", "2024-01-01T11:00", "2024-01-01T13:00:02"],
            "energy_kWh" => &[6.0, 1.0, 2.0, 0.01],
            "session_day" => &["Weekday", "Weekday", "Weekend", "Weekday"],
            "session_type" => &["Workplace", "Public", "Public", "Home"],
            "station_id" => &["ST-12", "ST-1", "ST-2", "ST-3"]
        )
        .unwrap()
    }

    #[test]
    fn test_clean_drops_invalid_durations() {
        let cleaned = SessionLoader::default().clean(raw_sessions()).unwrap();
        let stats = cleaned.stats();

        assert_eq!(stats.rows_read, 4);
        assert_eq!(stats.dropped_non_positive, 2);
        assert_eq!(stats.dropped_too_short, 1);
        assert_eq!(cleaned.len(), 1);

        let ids = frame::string_column(cleaned.frame(), "session_id").unwrap();
        assert_eq!(ids, vec![Some("a".to_string())]);
        assert_eq!(cleaned.durations().values()[0], 1.5);
        assert_eq!(cleaned.energy().values()[0], 6.0);

        let start_hour = frame::float_column(cleaned.frame(), START_HOUR_COLUMN).unwrap();
        assert_eq!(start_hour, vec![Some(8.0)]);
    }

    #[test]
    fn test_missing_columns_is_schema_error() {
        let df = raw_sessions().drop("station_id").unwrap().drop("energy_kWh").unwrap();
        let err = SessionLoader::default().clean(df).unwrap_err();
        match err {
            EvChargeError::Schema { missing } => {
                assert_eq!(missing, vec!["energy_kWh".to_string(), "station_id".to_string()])
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unparseable_timestamp_is_data_format_error() {
        let mut df = raw_sessions();
        df.with_column(Series::new(
            "end_time".into(),
            &["2024-01-01T09:30", "yesterday", "2024-01-01T11:00", "2024-01-01T14:00"],
        ))
        .unwrap();
        let err = SessionLoader::default().clean(df).unwrap_err();
        assert!(matches!(err, EvChargeError::DataFormat(_)));
    }

    #[test]
    fn test_duration_uses_utc_instants() {
        let df = df!(
            "start_time" => &["2024-03-10T01:30:00-08:00", "2024-06-01T10:00:00+02:00"],
            "end_time" => &["2024-03-10T03:30:00-07:00", "2024-06-01T09:30:00+00:00"],
            "energy_kWh" => &[7.0, 11.0],
            "session_day" => &["Weekend", "Weekend"],
            "session_type" => &["Home", "Public"],
            "station_id" => &["ST-1", "ST-2"]
        )
        .unwrap();
        let cleaned = SessionLoader::default().clean(df).unwrap();

        assert_eq!(cleaned.len(), 2);
        assert_eq!(cleaned.durations().values()[0], 1.0);
        assert_eq!(cleaned.durations().values()[1], 1.5);
        let start_hour = frame::float_column(cleaned.frame(), START_HOUR_COLUMN).unwrap();
        assert_eq!(start_hour, vec![Some(1.5), Some(10.0)]);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = SessionLoader::default()
            .load_csv("/definitely/not/here/sessions.csv")
            .unwrap_err();
        assert!(matches!(err, EvChargeError::Io(_)));
    }
}
