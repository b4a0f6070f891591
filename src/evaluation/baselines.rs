//! Trivial reference predictors
//!
//! Both baselines are fitted from training rows only and then applied to
//! the rows being scored.

use crate::data::{Durations, EnergyPrediction, Partition};
use crate::error::{EvChargeError, Result};
use serde::{Deserialize, Serialize};

/// Training-set statistics behind the two baselines
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Baselines {
    /// Mean delivered energy over training sessions, kWh
    pub mean_energy: f64,
    /// Mean average power over training sessions, kW
    pub mean_power: f64,
}

impl Baselines {
    pub fn fit(train: &Partition) -> Result<Self> {
        let (Some(mean_energy), Some(mean_power)) = (train.energy().mean(), train.power().mean()) else {
            return Err(EvChargeError::Validation(
                "cannot fit baselines on an empty training partition".to_string(),
            ));
        };
        Ok(Self {
            mean_energy,
            mean_power,
        })
    }

    /// Every row predicted as the training mean energy
    pub fn mean_energy_prediction(&self, n: usize) -> EnergyPrediction {
        EnergyPrediction::constant(self.mean_energy, n)
    }

    /// Each row predicted as training mean power times its own duration
    pub fn constant_power_prediction(&self, durations: &Durations) -> EnergyPrediction {
        EnergyPrediction::new(durations.values() * self.mean_power)
    }
}
