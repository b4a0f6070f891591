//! Integration test: session and station loading from CSV files

mod common;

use common::synthetic_sessions;
use evcharge::config::{ColumnRoles, PipelineConfig};
use evcharge::data::{SessionDataset, SessionLoader};
use evcharge::error::EvChargeError;
use evcharge::stations::{StationFilter, StationInventory};
use polars::prelude::*;
use std::io::Write;
use tempfile::{tempdir, NamedTempFile};

fn write_frame(df: &mut DataFrame) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    CsvWriter::new(file.as_file_mut())
        .include_header(true)
        .finish(df)
        .unwrap();
    file
}

#[test]
fn test_load_sessions_from_csv() {
    let mut df = synthetic_sessions(40);
    let file = write_frame(&mut df);

    let sessions = SessionLoader::default().load_csv(file.path()).unwrap();
    assert_eq!(sessions.len(), 40);
    assert_eq!(sessions.stats().rows_kept, 40);
    assert!(sessions.durations().values().iter().all(|&d| d > 0.0));

    let dataset = SessionDataset::from_sessions(&sessions, &ColumnRoles::default()).unwrap();
    assert_eq!(dataset.len(), 40);
    for i in 0..dataset.len() {
        let expected = dataset.energy().values()[i] / dataset.durations().values()[i];
        assert!((dataset.power().values()[i] - expected).abs() < 1e-12);
    }
}

#[test]
fn test_extra_columns_never_become_features() {
    let mut df = synthetic_sessions(20);
    df.with_column(Series::new("driver_notes".into(), vec![1.0f64; 20]))
        .unwrap();
    let file = write_frame(&mut df);

    let sessions = SessionLoader::default().load_csv(file.path()).unwrap();
    let dataset = SessionDataset::from_sessions(&sessions, &ColumnRoles::default()).unwrap();
    assert!(dataset.features().numeric_column("driver_notes").is_none());
    assert!(dataset.features().numeric_column("energy_kWh").is_none());
    // the untouched column still travels with the cleaned table
    assert!(sessions.frame().column("driver_notes").is_ok());
}

#[test]
fn test_missing_required_column_is_schema_error() {
    let mut df = synthetic_sessions(10).drop("session_type").unwrap();
    let file = write_frame(&mut df);

    match SessionLoader::default().load_csv(file.path()) {
        Err(EvChargeError::Schema { missing }) => assert_eq!(missing, vec!["session_type".to_string()]),
        other => panic!("expected schema error, got {:?}", other.map(|s| s.len())),
    }
}

#[test]
fn test_config_file_overrides() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.json");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, r#"{{"split": {{"test_fraction": 0.25, "seed": 7}}, "forest": {{"n_estimators": 50}}}}"#).unwrap();

    let config = PipelineConfig::from_json_file(&path).unwrap();
    assert_eq!(config.split.test_fraction, 0.25);
    assert_eq!(config.split.seed, 7);
    assert!(config.split.shuffle);
    assert_eq!(config.forest.n_estimators, 50);
    assert_eq!(config.forest.max_depth, 8);
    assert_eq!(config.lasso.n_alphas, 20);
}

#[test]
fn test_load_stations_from_csv() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "station_name,ev_network,latitude,longitude,ev_dc_fast_num,ev_level2_evse_num").unwrap();
    writeln!(file, "Depot A,Tesla,37.77,-122.41,8,0").unwrap();
    writeln!(file, "Library,ChargePoint,37.80,-122.27,,4").unwrap();
    writeln!(file, "Mall,ChargePoint,37.33,-121.89,2,10").unwrap();
    writeln!(file, "Ghost,Tesla,,,4,4").unwrap();
    file.flush().unwrap();

    let inventory = StationInventory::load_csv(file.path()).unwrap();
    assert_eq!(inventory.len(), 3);
    assert_eq!(inventory.dropped_without_coordinates(), 1);

    let library = inventory
        .stations()
        .iter()
        .find(|s| s.name.as_deref() == Some("Library"))
        .unwrap();
    assert_eq!(library.dc_fast_ports, 0);
    assert_eq!(library.capacity_proxy, 1.0);

    let summary = inventory.summary();
    assert_eq!(summary.n_stations, 3);
    assert_eq!(summary.n_networks, 2);
    assert_eq!(summary.n_dc_fast, 2);

    let top = inventory.top_by_capacity(1);
    assert_eq!(top[0].name.as_deref(), Some("Depot A"));

    let fast = inventory.filter(&StationFilter {
        network: Some("ChargePoint".to_string()),
        min_dc_fast: 1,
        min_level2: 0,
    });
    assert_eq!(fast.len(), 1);
    assert_eq!(fast.stations()[0].name.as_deref(), Some("Mall"));
}
