//! Full-dataset prediction and the augmented output table
//!
//! Uses the pipelines exactly as trained; nothing is refitted here.

use crate::data::{frame, CleanedSessions, EnergyPrediction, SessionDataset};
use crate::error::{EvChargeError, Result};
use crate::training::{ModelKind, TrainedModels};
use polars::prelude::*;
use std::path::Path;
use tracing::info;

/// Energy predictions of every model for every cleaned session
#[derive(Debug, Clone)]
pub struct FullPredictions {
    columns: Vec<(ModelKind, EnergyPrediction)>,
}

impl FullPredictions {
    /// Predict power over the whole dataset and convert through durations
    pub fn compute(models: &TrainedModels, dataset: &SessionDataset) -> Result<Self> {
        let columns = models
            .pipelines()
            .iter()
            .map(|p| {
                let energy = p.predict_energy(dataset.features(), dataset.durations())?;
                Ok((p.kind(), energy))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { columns })
    }

    pub fn get(&self, kind: ModelKind) -> Option<&EnergyPrediction> {
        self.columns.iter().find(|(k, _)| *k == kind).map(|(_, e)| e)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(ModelKind, EnergyPrediction)> {
        self.columns.iter()
    }

    /// Copy of the cleaned table with one `kWh_pred_<model>` column per model
    pub fn append_to(&self, sessions: &CleanedSessions) -> Result<DataFrame> {
        let mut df = sessions.frame().clone();
        for (kind, energy) in &self.columns {
            if energy.len() != df.height() {
                return Err(EvChargeError::ShapeError {
                    expected: format!("{} rows", df.height()),
                    actual: format!("{} predictions", energy.len()),
                });
            }
            let name = kind.prediction_column();
            df.with_column(Series::new(name.as_str().into(), energy.values().to_vec()))?;
        }
        Ok(df)
    }
}

/// Write the augmented table to a new CSV file
pub fn write_predictions(df: &mut DataFrame, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    frame::write_csv(df, path)?;
    info!(
        path = %path.display(),
        rows = df.height(),
        cols = df.width(),
        "Wrote predictions"
    );
    Ok(())
}
