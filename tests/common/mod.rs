//! Shared synthetic session fixtures

#![allow(dead_code)]

use chrono::{Duration, NaiveDate};
use evcharge::config::{ForestConfig, GammaSpec, PipelineConfig, SvrSearchConfig};
use polars::prelude::*;

const TYPES: [&str; 3] = ["Workplace", "Public", "Home"];
const BASE_KW: [f64; 3] = [6.6, 11.0, 3.3];

/// Deterministic sessions: power depends on the session type and the start hour
pub fn synthetic_sessions(n: usize) -> DataFrame {
    let mut ids = Vec::with_capacity(n);
    let mut starts = Vec::with_capacity(n);
    let mut ends = Vec::with_capacity(n);
    let mut energy = Vec::with_capacity(n);
    let mut days = Vec::with_capacity(n);
    let mut types = Vec::with_capacity(n);
    let mut stations = Vec::with_capacity(n);

    for i in 0..n {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1 + (i % 28) as u32).unwrap();
        let hour = 6 + ((i * 7) % 14) as u32;
        let minute = ((i * 13) % 60) as u32;
        let start = date.and_hms_opt(hour, minute, 0).unwrap();
        let minutes = 30 + ((i * 37) % 300) as i64;
        let end = start + Duration::minutes(minutes);

        let kind = i % TYPES.len();
        let power = BASE_KW[kind] + 0.1 * hour as f64 + 0.05 * ((i * 17) % 11) as f64;

        ids.push(format!("S-{:04}", i));
        starts.push(start.format("%Y-%m-%dT%H:%M").to_string());
        ends.push(end.format("%Y-%m-%dT%H:%M").to_string());
        energy.push(power * minutes as f64 / 60.0);
        days.push(if (i % 7) < 5 { "Weekday" } else { "Weekend" }.to_string());
        types.push(TYPES[kind].to_string());
        stations.push(format!("ST-{}", i % 6));
    }

    df!(
        "session_id" => ids,
        "start_time" => starts,
        "end_time" => ends,
        "energy_kWh" => energy,
        "session_day" => days,
        "session_type" => types,
        "station_id" => stations
    )
    .unwrap()
}

/// Append one session row to a frame built by [`synthetic_sessions`]
pub fn with_session(
    df: DataFrame,
    id: &str,
    start: &str,
    end: &str,
    energy: f64,
    day: &str,
    kind: &str,
    station: &str,
) -> DataFrame {
    let row = df!(
        "session_id" => &[id],
        "start_time" => &[start],
        "end_time" => &[end],
        "energy_kWh" => &[energy],
        "session_day" => &[day],
        "session_type" => &[kind],
        "station_id" => &[station]
    )
    .unwrap();
    df.vstack(&row).unwrap()
}

/// Default roles and split with a much smaller forest and SVR grid
pub fn small_config() -> PipelineConfig {
    let mut config = PipelineConfig::new();
    config.forest = ForestConfig {
        n_estimators: 12,
        max_depth: 4,
        min_samples_leaf: 3,
        ..ForestConfig::default()
    };
    config.svr = SvrSearchConfig {
        c_values: vec![1.0, 10.0],
        epsilon_values: vec![0.5],
        gamma_values: vec![GammaSpec::Scale],
        cv_folds: 3,
        ..SvrSearchConfig::default()
    };
    config
}
