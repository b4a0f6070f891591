//! Charging-station inventory
//!
//! Loads a station table tolerantly: absent columns are synthesised as
//! missing, port counts are coerced to integers (unparseable → 0) and rows
//! without coordinates are dropped. Independent of the training pipeline.

use crate::data::frame;
use crate::error::Result;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::{info, warn};

pub const LATITUDE: &str = "latitude";
pub const LONGITUDE: &str = "longitude";
pub const STATION_NAME: &str = "station_name";
pub const NETWORK: &str = "ev_network";
pub const DC_FAST_PORTS: &str = "ev_dc_fast_num";
pub const LEVEL2_PORTS: &str = "ev_level2_evse_num";
pub const CAPACITY_PROXY: &str = "capacity_proxy";
pub const CITY: &str = "city";
pub const STREET_ADDRESS: &str = "street_address";

/// Weight of one DC fast port in the capacity score
pub const DC_FAST_WEIGHT: f64 = 1.0;
/// Weight of one Level 2 port in the capacity score
pub const LEVEL2_WEIGHT: f64 = 0.25;

/// One charging location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    pub name: Option<String>,
    pub network: Option<String>,
    pub city: Option<String>,
    pub street_address: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub dc_fast_ports: i64,
    pub level2_ports: i64,
    pub capacity_proxy: f64,
}

impl Station {
    pub fn total_ports(&self) -> i64 {
        self.dc_fast_ports + self.level2_ports
    }

    pub fn has_dc_fast(&self) -> bool {
        self.dc_fast_ports > 0
    }
}

/// `dc_fast * 1.0 + level2 * 0.25`
pub fn capacity_score(dc_fast_ports: i64, level2_ports: i64) -> f64 {
    dc_fast_ports as f64 * DC_FAST_WEIGHT + level2_ports as f64 * LEVEL2_WEIGHT
}

/// Station selection criteria; `None` network means all networks
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StationFilter {
    pub network: Option<String>,
    pub min_dc_fast: i64,
    pub min_level2: i64,
}

impl StationFilter {
    pub fn matches(&self, station: &Station) -> bool {
        station.dc_fast_ports >= self.min_dc_fast
            && station.level2_ports >= self.min_level2
            && self
                .network
                .as_ref()
                .map_or(true, |n| station.network.as_ref() == Some(n))
    }
}

/// Headline figures for a set of stations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationSummary {
    pub n_stations: usize,
    pub n_networks: usize,
    pub n_dc_fast: usize,
    pub mean_capacity: Option<f64>,
    /// Mean latitude and longitude
    pub center: Option<(f64, f64)>,
    /// Stations with only DC fast, only Level 2, and both kinds of port
    pub dc_only: usize,
    pub level2_only: usize,
    pub both: usize,
}

/// A cleaned station table
#[derive(Debug, Clone, Default)]
pub struct StationInventory {
    stations: Vec<Station>,
    dropped_without_coordinates: usize,
}

impl StationInventory {
    pub fn load_csv(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let df = frame::read_csv(path)?;
        info!(path = %path.display(), rows = df.height(), "Read station table");
        Self::from_frame(&df)
    }

    pub fn from_frame(df: &DataFrame) -> Result<Self> {
        let n = df.height();
        let missing: Vec<&str> = [LATITUDE, LONGITUDE, STATION_NAME, NETWORK, DC_FAST_PORTS, LEVEL2_PORTS]
            .into_iter()
            .filter(|c| !frame::has_column(df, c))
            .collect();
        if !missing.is_empty() {
            warn!(columns = ?missing, "Station table lacks columns; treating them as empty");
        }

        let lat = optional_floats(df, LATITUDE, n)?;
        let lon = optional_floats(df, LONGITUDE, n)?;
        let dc = port_counts(df, DC_FAST_PORTS, n)?;
        let l2 = port_counts(df, LEVEL2_PORTS, n)?;
        let capacity = optional_floats(df, CAPACITY_PROXY, n)?;
        let names = optional_strings(df, STATION_NAME, n)?;
        let networks = optional_strings(df, NETWORK, n)?;
        let cities = optional_strings(df, CITY, n)?;
        let streets = optional_strings(df, STREET_ADDRESS, n)?;

        let mut stations = Vec::with_capacity(n);
        let mut dropped = 0;
        for i in 0..n {
            let (Some(latitude), Some(longitude)) = (lat[i], lon[i]) else {
                dropped += 1;
                continue;
            };
            stations.push(Station {
                name: names[i].clone(),
                network: networks[i].clone(),
                city: cities[i].clone(),
                street_address: streets[i].clone(),
                latitude,
                longitude,
                dc_fast_ports: dc[i],
                level2_ports: l2[i],
                capacity_proxy: capacity[i].unwrap_or_else(|| capacity_score(dc[i], l2[i])),
            });
        }
        if dropped > 0 {
            warn!(dropped, "Dropped stations without coordinates");
        }

        Ok(Self {
            stations,
            dropped_without_coordinates: dropped,
        })
    }

    pub fn stations(&self) -> &[Station] {
        &self.stations
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    pub fn dropped_without_coordinates(&self) -> usize {
        self.dropped_without_coordinates
    }

    /// Sorted distinct network names
    pub fn networks(&self) -> Vec<String> {
        self.stations
            .iter()
            .filter_map(|s| s.network.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn filter(&self, filter: &StationFilter) -> Self {
        Self {
            stations: self
                .stations
                .iter()
                .filter(|s| filter.matches(s))
                .cloned()
                .collect(),
            dropped_without_coordinates: 0,
        }
    }

    pub fn summary(&self) -> StationSummary {
        let n = self.stations.len();
        let mean = |f: fn(&Station) -> f64| {
            (n > 0).then(|| self.stations.iter().map(f).sum::<f64>() / n as f64)
        };
        let count = |f: fn(&Station) -> bool| self.stations.iter().filter(|s| f(s)).count();

        StationSummary {
            n_stations: n,
            n_networks: self.networks().len(),
            n_dc_fast: count(|s| s.has_dc_fast()),
            mean_capacity: mean(|s| s.capacity_proxy),
            center: mean(|s| s.latitude).zip(mean(|s| s.longitude)),
            dc_only: count(|s| s.dc_fast_ports > 0 && s.level2_ports == 0),
            level2_only: count(|s| s.dc_fast_ports == 0 && s.level2_ports > 0),
            both: count(|s| s.dc_fast_ports > 0 && s.level2_ports > 0),
        }
    }

    /// Station counts per network, largest first, ties by name
    pub fn network_counts(&self) -> Vec<(String, usize)> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for network in self.stations.iter().filter_map(|s| s.network.as_deref()) {
            *counts.entry(network).or_insert(0) += 1;
        }
        let mut out: Vec<(String, usize)> = counts.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
        out.sort_by(|a, b| b.1.cmp(&a.1));
        out
    }

    /// The `n` stations with the highest capacity score; input order breaks ties
    pub fn top_by_capacity(&self, n: usize) -> Vec<&Station> {
        let mut ranked: Vec<&Station> = self.stations.iter().collect();
        ranked.sort_by(|a, b| b.capacity_proxy.total_cmp(&a.capacity_proxy));
        ranked.truncate(n);
        ranked
    }

    /// Tabular form, including the derived columns
    pub fn to_frame(&self) -> Result<DataFrame> {
        let strings = |f: fn(&Station) -> Option<String>| -> Vec<Option<String>> {
            self.stations.iter().map(f).collect()
        };
        let df = df!(
            STATION_NAME => strings(|s| s.name.clone()),
            NETWORK => strings(|s| s.network.clone()),
            CITY => strings(|s| s.city.clone()),
            STREET_ADDRESS => strings(|s| s.street_address.clone()),
            LATITUDE => self.stations.iter().map(|s| s.latitude).collect::<Vec<_>>(),
            LONGITUDE => self.stations.iter().map(|s| s.longitude).collect::<Vec<_>>(),
            DC_FAST_PORTS => self.stations.iter().map(|s| s.dc_fast_ports).collect::<Vec<_>>(),
            LEVEL2_PORTS => self.stations.iter().map(|s| s.level2_ports).collect::<Vec<_>>(),
            CAPACITY_PROXY => self.stations.iter().map(|s| s.capacity_proxy).collect::<Vec<_>>(),
            "total_ports" => self.stations.iter().map(Station::total_ports).collect::<Vec<_>>(),
            "has_dc_fast" => self.stations.iter().map(Station::has_dc_fast).collect::<Vec<_>>()
        )?;
        Ok(df)
    }

    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut df = self.to_frame()?;
        frame::write_csv(&mut df, path.as_ref())
    }
}

fn optional_floats(df: &DataFrame, name: &str, n: usize) -> Result<Vec<Option<f64>>> {
    if !frame::has_column(df, name) {
        return Ok(vec![None; n]);
    }
    Ok(frame::float_column(df, name)?
        .into_iter()
        .map(|v| v.filter(|x| x.is_finite()))
        .collect())
}

fn optional_strings(df: &DataFrame, name: &str, n: usize) -> Result<Vec<Option<String>>> {
    if !frame::has_column(df, name) {
        return Ok(vec![None; n]);
    }
    frame::string_column(df, name)
}

/// Integer port counts; missing or unparseable entries count as zero
fn port_counts(df: &DataFrame, name: &str, n: usize) -> Result<Vec<i64>> {
    Ok(optional_floats(df, name, n)?
        .into_iter()
        .map(|v| v.map_or(0, |x| x.trunc() as i64))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_stations() -> DataFrame {
        df!(
            "station_name" => &["A", "B", "C", "D"],
            "ev_network" => &[Some("Tesla"), Some("ChargePoint"), Some("Tesla"), None],
            "latitude" => &[Some(40.0), Some(41.0), None, Some(43.0)],
            "longitude" => &[Some(-74.0), Some(-75.0), Some(-76.0), Some(-78.0)],
            "ev_dc_fast_num" => &["8", "", "2", "x"],
            "ev_level2_evse_num" => &["0", "4", "1", "2"]
        )
        .unwrap()
    }

    #[test]
    fn test_load_coerces_and_drops() {
        let inventory = StationInventory::from_frame(&raw_stations()).unwrap();
        assert_eq!(inventory.len(), 3);
        assert_eq!(inventory.dropped_without_coordinates(), 1);

        let ports: Vec<(i64, i64)> = inventory
            .stations()
            .iter()
            .map(|s| (s.dc_fast_ports, s.level2_ports))
            .collect();
        assert_eq!(ports, vec![(8, 0), (0, 4), (0, 2)]);

        let capacity: Vec<f64> = inventory.stations().iter().map(|s| s.capacity_proxy).collect();
        assert_eq!(capacity, vec![8.0, 1.0, 0.5]);
        assert!(inventory.stations()[0].has_dc_fast());
        assert_eq!(inventory.stations()[1].total_ports(), 4);
    }

    #[test]
    fn test_missing_columns_are_synthesised() {
        let df = df!(
            "latitude" => &[40.0],
            "longitude" => &[-74.0]
        )
        .unwrap();
        let inventory = StationInventory::from_frame(&df).unwrap();
        let station = &inventory.stations()[0];
        assert_eq!(station.name, None);
        assert_eq!(station.total_ports(), 0);
        assert_eq!(station.capacity_proxy, 0.0);
    }

    #[test]
    fn test_filter_summary_and_top() {
        let inventory = StationInventory::from_frame(&raw_stations()).unwrap();

        let tesla = inventory.filter(&StationFilter {
            network: Some("Tesla".to_string()),
            ..Default::default()
        });
        assert_eq!(tesla.len(), 1);

        let l2 = inventory.filter(&StationFilter {
            min_level2: 2,
            ..Default::default()
        });
        assert_eq!(l2.len(), 2);

        let summary = inventory.summary();
        assert_eq!(summary.n_stations, 3);
        assert_eq!(summary.n_networks, 2);
        assert_eq!(summary.n_dc_fast, 1);
        assert_eq!(summary.dc_only, 1);
        assert_eq!(summary.level2_only, 2);
        assert!((summary.mean_capacity.unwrap() - 9.5 / 3.0).abs() < 1e-12);
        let (lat, _) = summary.center.unwrap();
        assert!((lat - 124.0 / 3.0).abs() < 1e-12);

        let top = inventory.top_by_capacity(2);
        assert_eq!(top[0].name.as_deref(), Some("A"));
        assert_eq!(top[1].name.as_deref(), Some("B"));
    }
}
