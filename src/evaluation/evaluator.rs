//! Held-out evaluation in energy space

use super::baselines::Baselines;
use super::metrics::RegressionMetrics;
use crate::data::Partition;
use crate::error::Result;
use crate::training::{ModelKind, TrainedModels, TrainedPipeline};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Metrics of one model on the test partition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelEvaluation {
    pub model: ModelKind,
    pub name: String,
    pub metrics: RegressionMetrics,
}

/// Metrics of both baselines on the test partition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineEvaluation {
    pub baselines: Baselines,
    pub mean_energy: RegressionMetrics,
    pub constant_power: RegressionMetrics,
}

/// All held-out metrics of a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub models: Vec<ModelEvaluation>,
    pub baselines: BaselineEvaluation,
}

impl EvaluationReport {
    pub fn get(&self, kind: ModelKind) -> Option<&ModelEvaluation> {
        self.models.iter().find(|m| m.model == kind)
    }

    /// Model with the lowest test MSE
    pub fn best_model(&self) -> Option<&ModelEvaluation> {
        self.models
            .iter()
            .min_by(|a, b| a.metrics.mse.total_cmp(&b.metrics.mse))
    }
}

/// Scores fitted pipelines against true energy on held-out rows
pub struct Evaluator<'a> {
    test: &'a Partition,
}

impl<'a> Evaluator<'a> {
    pub fn new(test: &'a Partition) -> Self {
        Self { test }
    }

    /// Predict power, convert through each row's duration, score against
    /// true energy
    pub fn evaluate(&self, pipeline: &TrainedPipeline) -> Result<ModelEvaluation> {
        let energy = pipeline.predict_energy(self.test.features(), self.test.durations())?;
        let metrics = RegressionMetrics::compute(self.test.energy(), &energy)?;
        info!(
            model = %pipeline.kind(),
            mae = metrics.mae,
            mse = metrics.mse,
            r2 = metrics.r2,
            "Held-out energy metrics"
        );
        Ok(ModelEvaluation {
            model: pipeline.kind(),
            name: pipeline.kind().display_name().to_string(),
            metrics,
        })
    }

    pub fn evaluate_baselines(&self, baselines: Baselines) -> Result<BaselineEvaluation> {
        let truth = self.test.energy();
        let mean_energy =
            RegressionMetrics::compute(truth, &baselines.mean_energy_prediction(self.test.len()))?;
        let constant_power = RegressionMetrics::compute(
            truth,
            &baselines.constant_power_prediction(self.test.durations()),
        )?;
        info!(
            mean_energy_mse = mean_energy.mse,
            constant_power_mse = constant_power.mse,
            "Baseline energy metrics"
        );
        Ok(BaselineEvaluation {
            baselines,
            mean_energy,
            constant_power,
        })
    }

    /// Score every trained model and both baselines fitted on `train`
    pub fn evaluate_all(&self, models: &TrainedModels, train: &Partition) -> Result<EvaluationReport> {
        let models = models
            .pipelines()
            .iter()
            .map(|p| self.evaluate(p))
            .collect::<Result<Vec<_>>>()?;
        let baselines = self.evaluate_baselines(Baselines::fit(train)?)?;
        Ok(EvaluationReport { models, baselines })
    }
}
