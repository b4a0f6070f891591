//! Trained pipelines: one shared fitted transform plus a fitted regressor
//!
//! The transform is fitted once on the training partition and shared through
//! an `Arc` by all three models. Models are trained on average power; energy
//! is recovered only through [`PowerPrediction::to_energy`].

use super::grid_search::{GridSearchResult, SvrGridSearch};
use super::linear_models::LassoCv;
use super::models::{ModelKind, TrainedModel};
use super::random_forest::RandomForest;
use crate::config::PipelineConfig;
use crate::data::{Durations, EnergyPrediction, Partition, PowerPrediction};
use crate::error::{EvChargeError, Result};
use crate::preprocessing::{FeatureSet, FeatureTransform, FittedTransform};
use ndarray::{Array1, Array2};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Immutable fitted transform and model for one family
#[derive(Debug, Clone)]
pub struct TrainedPipeline {
    kind: ModelKind,
    transform: Arc<FittedTransform>,
    model: TrainedModel,
    training_time_secs: f64,
}

impl TrainedPipeline {
    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    pub fn transform(&self) -> &Arc<FittedTransform> {
        &self.transform
    }

    pub fn model(&self) -> &TrainedModel {
        &self.model
    }

    pub fn training_time_secs(&self) -> f64 {
        self.training_time_secs
    }

    /// Average power for every row of `features`
    pub fn predict_power(&self, features: &FeatureSet) -> Result<PowerPrediction> {
        let x = self.transform.transform(features)?;
        Ok(PowerPrediction::new(self.model.predict(&x)?))
    }

    /// Energy as predicted power times duration
    pub fn predict_energy(&self, features: &FeatureSet, durations: &Durations) -> Result<EnergyPrediction> {
        self.predict_power(features)?.to_energy(durations)
    }
}

/// The three pipelines of one training run
#[derive(Debug, Clone)]
pub struct TrainedModels {
    transform: Arc<FittedTransform>,
    pipelines: Vec<TrainedPipeline>,
    svr_search: GridSearchResult,
}

impl TrainedModels {
    pub fn transform(&self) -> &Arc<FittedTransform> {
        &self.transform
    }

    /// Pipelines in reporting order: Lasso, random forest, SVR
    pub fn pipelines(&self) -> &[TrainedPipeline] {
        &self.pipelines
    }

    pub fn get(&self, kind: ModelKind) -> Option<&TrainedPipeline> {
        self.pipelines.iter().find(|p| p.kind == kind)
    }

    pub fn svr_search(&self) -> &GridSearchResult {
        &self.svr_search
    }

    pub fn lasso(&self) -> Option<&LassoCv> {
        match self.get(ModelKind::Lasso).map(TrainedPipeline::model) {
            Some(TrainedModel::Lasso(m)) => Some(m),
            _ => None,
        }
    }

    /// Selected strength and number of non-zero coefficients
    pub fn lasso_summary(&self) -> Option<(f64, usize)> {
        let lasso = self.lasso()?;
        let alpha = lasso.alpha?;
        let nonzero = lasso
            .model()
            .and_then(|m| m.coefficients.as_ref())
            .map_or(0, |w| w.iter().filter(|&&v| v != 0.0).count());
        Some((alpha, nonzero))
    }

    /// Forest importances paired with encoded feature names, largest first
    pub fn forest_importances(&self) -> Vec<(String, f64)> {
        let Some(importances) = self
            .get(ModelKind::RandomForest)
            .and_then(|p| p.model.feature_importances())
        else {
            return Vec::new();
        };
        let mut pairs: Vec<(String, f64)> = self
            .transform
            .feature_names()
            .iter()
            .cloned()
            .zip(importances.iter().copied())
            .collect();
        pairs.sort_by(|a, b| b.1.total_cmp(&a.1));
        pairs
    }
}

/// Fit the column transform on training features only
pub fn fit_transform(train: &Partition, config: &PipelineConfig) -> Result<Arc<FittedTransform>> {
    let transform = FeatureTransform::new(config.columns.clone()).fit(train.features())?;
    info!(
        rows = train.len(),
        n_features = transform.n_features_out(),
        "Fitted preprocessing on training rows"
    );
    Ok(Arc::new(transform))
}

pub fn train_lasso(x: &Array2<f64>, y: &Array1<f64>, config: &PipelineConfig) -> Result<LassoCv> {
    let mut model = LassoCv::new(config.lasso.clone());
    model.fit(x, y)?;
    Ok(model)
}

pub fn train_forest(x: &Array2<f64>, y: &Array1<f64>, config: &PipelineConfig) -> Result<RandomForest> {
    let mut model = RandomForest::from_config(&config.forest);
    model.fit(x, y)?;
    Ok(model)
}

pub fn train_svr(
    x: &Array2<f64>,
    y: &Array1<f64>,
    config: &PipelineConfig,
) -> Result<(super::svm::SVMRegressor, GridSearchResult)> {
    SvrGridSearch::new(config.svr.clone()).fit(x, y)
}

/// Fit the transform once, then train all three models on average power
pub fn train_all(train: &Partition, config: &PipelineConfig) -> Result<TrainedModels> {
    if train.is_empty() {
        return Err(EvChargeError::Training("training partition is empty".to_string()));
    }
    let transform = fit_transform(train, config)?;
    let x = transform.transform(train.features())?;
    let y = train.power().values();

    let mut pipelines = Vec::with_capacity(ModelKind::ALL.len());
    let mut timed = |kind: ModelKind, model: TrainedModel, start: Instant| {
        let secs = start.elapsed().as_secs_f64();
        info!(model = %kind, duration_secs = secs, "Trained model");
        pipelines.push(TrainedPipeline {
            kind,
            transform: Arc::clone(&transform),
            model,
            training_time_secs: secs,
        });
    };

    let start = Instant::now();
    let lasso = train_lasso(&x, y, config)?;
    timed(ModelKind::Lasso, TrainedModel::Lasso(lasso), start);

    let start = Instant::now();
    let forest = train_forest(&x, y, config)?;
    timed(ModelKind::RandomForest, TrainedModel::RandomForest(forest), start);

    let start = Instant::now();
    let (svr, svr_search) = train_svr(&x, y, config)?;
    timed(ModelKind::Svr, TrainedModel::Svr(svr), start);

    Ok(TrainedModels {
        transform,
        pipelines,
        svr_search,
    })
}
