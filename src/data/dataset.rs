//! Typed targets and the index-aligned training dataset
//!
//! Energy (kWh) and average power (kW) are distinct types so that a power
//! prediction can only be scored after an explicit conversion through the
//! session durations.

use super::sessions::CleanedSessions;
use crate::config::ColumnRoles;
use crate::error::{EvChargeError, Result};
use crate::preprocessing::FeatureSet;
use crate::training::split::IndexSplit;
use ndarray::Array1;

fn check_len(what: &str, expected: usize, actual: usize) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(EvChargeError::ShapeError {
            expected: format!("{} length = {}", what, expected),
            actual: format!("{} length = {}", what, actual),
        })
    }
}

macro_rules! typed_vector {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq)]
        pub struct $name(Array1<f64>);

        impl $name {
            pub fn new(values: Array1<f64>) -> Self {
                Self(values)
            }

            pub fn values(&self) -> &Array1<f64> {
                &self.0
            }

            pub fn len(&self) -> usize {
                self.0.len()
            }

            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }

            pub fn mean(&self) -> Option<f64> {
                self.0.mean()
            }

            /// Rows at `indices`, in that order
            pub fn select(&self, indices: &[usize]) -> Self {
                Self(indices.iter().map(|&i| self.0[i]).collect())
            }
        }
    };
}

typed_vector!(
    /// Session durations in hours
    Durations
);
typed_vector!(
    /// True delivered energy per session, kWh
    EnergyTarget
);
typed_vector!(
    /// True average power per session, kW
    PowerTarget
);
typed_vector!(
    /// Model output in power space, kW
    PowerPrediction
);
typed_vector!(
    /// Predicted delivered energy per session, kWh
    EnergyPrediction
);

impl PowerTarget {
    /// Average power `energy / duration` for each session
    pub fn from_energy(energy: &EnergyTarget, durations: &Durations) -> Result<Self> {
        check_len("durations", energy.len(), durations.len())?;
        Ok(Self(energy.values() / durations.values()))
    }
}

impl PowerPrediction {
    /// Energy prediction `power * duration`, elementwise, with no other transform
    pub fn to_energy(&self, durations: &Durations) -> Result<EnergyPrediction> {
        check_len("durations", self.len(), durations.len())?;
        Ok(EnergyPrediction(self.values() * durations.values()))
    }
}

impl EnergyPrediction {
    /// The same value for every row
    pub fn constant(value: f64, n: usize) -> Self {
        Self(Array1::from_elem(n, value))
    }
}

/// Feature rows and both targets for one side of a split.
///
/// Position `k` in every field refers to the same session, `indices[k]` in the
/// full dataset.
#[derive(Debug, Clone)]
pub struct Partition {
    indices: Vec<usize>,
    features: FeatureSet,
    durations: Durations,
    energy: EnergyTarget,
    power: PowerTarget,
}

impl Partition {
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn features(&self) -> &FeatureSet {
        &self.features
    }

    pub fn durations(&self) -> &Durations {
        &self.durations
    }

    pub fn energy(&self) -> &EnergyTarget {
        &self.energy
    }

    pub fn power(&self) -> &PowerTarget {
        &self.power
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Allow-listed features, durations, energy and power for every cleaned session
#[derive(Debug, Clone)]
pub struct SessionDataset {
    features: FeatureSet,
    durations: Durations,
    energy: EnergyTarget,
    power: PowerTarget,
}

impl SessionDataset {
    /// Build from cleaned sessions, reading only the columns named in `roles`
    pub fn from_sessions(sessions: &CleanedSessions, roles: &ColumnRoles) -> Result<Self> {
        let features = FeatureSet::from_frame(sessions.frame(), roles)?;
        Self::new(features, sessions.durations().clone(), sessions.energy().clone())
    }

    pub fn new(features: FeatureSet, durations: Durations, energy: EnergyTarget) -> Result<Self> {
        check_len("features", durations.len(), features.n_rows())?;
        let power = PowerTarget::from_energy(&energy, &durations)?;
        Ok(Self {
            features,
            durations,
            energy,
            power,
        })
    }

    pub fn len(&self) -> usize {
        self.durations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.durations.is_empty()
    }

    pub fn features(&self) -> &FeatureSet {
        &self.features
    }

    pub fn durations(&self) -> &Durations {
        &self.durations
    }

    pub fn energy(&self) -> &EnergyTarget {
        &self.energy
    }

    pub fn power(&self) -> &PowerTarget {
        &self.power
    }

    /// Rows at `indices` across features and both targets at once
    pub fn take(&self, indices: &[usize]) -> Result<Partition> {
        if let Some(&bad) = indices.iter().find(|&&i| i >= self.len()) {
            return Err(EvChargeError::Validation(format!(
                "row index {} out of range for {} rows",
                bad,
                self.len()
            )));
        }
        Ok(Partition {
            indices: indices.to_vec(),
            features: self.features.select(indices),
            durations: self.durations.select(indices),
            energy: self.energy.select(indices),
            power: self.power.select(indices),
        })
    }

    /// Apply one index split to features and both targets
    pub fn partition(&self, split: &IndexSplit) -> Result<(Partition, Partition)> {
        check_len("split", self.len(), split.n_samples())?;
        Ok((self.take(&split.train)?, self.take(&split.test)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_power_from_energy() {
        let energy = EnergyTarget::new(array![6.0, 10.0]);
        let durations = Durations::new(array![1.5, 4.0]);
        let power = PowerTarget::from_energy(&energy, &durations).unwrap();
        assert_eq!(power.values(), &array![4.0, 2.5]);
    }

    #[test]
    fn test_power_prediction_to_energy_is_exact_product() {
        let power = PowerPrediction::new(array![3.7, 0.1, 11.05]);
        let durations = Durations::new(array![1.5, 7.25, 0.333]);
        let energy = power.to_energy(&durations).unwrap();
        for i in 0..3 {
            assert_eq!(energy.values()[i], power.values()[i] * durations.values()[i]);
        }
    }

    #[test]
    fn test_to_energy_length_mismatch() {
        let power = PowerPrediction::new(array![1.0, 2.0]);
        let durations = Durations::new(array![1.0]);
        assert!(matches!(
            power.to_energy(&durations),
            Err(EvChargeError::ShapeError { .. })
        ));
    }
}
