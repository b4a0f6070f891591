//! Staged training run
//!
//! Each stage is a plain function returning an immutable artifact, so the
//! stages can be tested on their own:
//! load → build dataset → split → train → evaluate → predict → write.

use crate::config::PipelineConfig;
use crate::data::{CleanedSessions, CleaningStats, Partition, SessionDataset, SessionLoader};
use crate::error::Result;
use crate::evaluation::{EvaluationReport, Evaluator};
use crate::output::{write_predictions, FullPredictions};
use crate::training::{
    train_all, train_test_split, CandidateScore, IndexSplit, SvrParams, TrainedModels,
};
use chrono::{DateTime, Utc};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Instant;
use tracing::info;

/// Train and test partitions produced by one index split
#[derive(Debug, Clone)]
pub struct SplitData {
    pub split: IndexSplit,
    pub train: Partition,
    pub test: Partition,
}

/// Read and clean the session table
pub fn load_sessions(path: impl AsRef<Path>, config: &PipelineConfig) -> Result<CleanedSessions> {
    loader(config).load_csv(path)
}

/// Clean an in-memory session table
pub fn clean_sessions(df: DataFrame, config: &PipelineConfig) -> Result<CleanedSessions> {
    loader(config).clean(df)
}

fn loader(config: &PipelineConfig) -> SessionLoader {
    SessionLoader::new(config.schema.clone()).with_min_duration_hours(config.min_duration_hours)
}

/// Extract allow-listed features and both targets
pub fn build_dataset(sessions: &CleanedSessions, config: &PipelineConfig) -> Result<SessionDataset> {
    SessionDataset::from_sessions(sessions, &config.columns)
}

/// One index split applied to features, durations, energy and power
pub fn split_dataset(dataset: &SessionDataset, config: &PipelineConfig) -> Result<SplitData> {
    let split = train_test_split(dataset.len(), &config.split)?;
    let (train, test) = dataset.partition(&split)?;
    info!(train = train.len(), test = test.len(), seed = config.split.seed, "Split sessions");
    Ok(SplitData { split, train, test })
}

/// Fit the shared transform and all three models on the training partition
pub fn train(split: &SplitData, config: &PipelineConfig) -> Result<TrainedModels> {
    train_all(&split.train, config)
}

/// Held-out energy metrics for every model and both baselines
pub fn evaluate(models: &TrainedModels, split: &SplitData) -> Result<EvaluationReport> {
    Evaluator::new(&split.test).evaluate_all(models, &split.train)
}

/// Predictions over every cleaned session, appended to the cleaned table
pub fn predict(
    models: &TrainedModels,
    sessions: &CleanedSessions,
    dataset: &SessionDataset,
) -> Result<DataFrame> {
    FullPredictions::compute(models, dataset)?.append_to(sessions)
}

/// Serializable summary of a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub created_at: DateTime<Utc>,
    pub config: PipelineConfig,
    pub cleaning: CleaningStats,
    pub n_train: usize,
    pub n_test: usize,
    pub feature_names: Vec<String>,
    pub lasso_alpha: Option<f64>,
    pub lasso_nonzero_coefficients: Option<usize>,
    pub svr_best_params: SvrParams,
    pub svr_best_cv_mse: f64,
    pub svr_grid: Vec<CandidateScore>,
    pub forest_importances: Vec<(String, f64)>,
    pub evaluation: EvaluationReport,
    pub duration_secs: f64,
}

impl RunReport {
    pub fn new(
        config: &PipelineConfig,
        cleaning: CleaningStats,
        split: &SplitData,
        models: &TrainedModels,
        evaluation: EvaluationReport,
        duration_secs: f64,
    ) -> Self {
        let search = models.svr_search();
        let lasso = models.lasso_summary();
        Self {
            created_at: Utc::now(),
            config: config.clone(),
            cleaning,
            n_train: split.train.len(),
            n_test: split.test.len(),
            feature_names: models.transform().feature_names().to_vec(),
            lasso_alpha: lasso.map(|(a, _)| a),
            lasso_nonzero_coefficients: lasso.map(|(_, n)| n),
            svr_best_params: search.best_params(),
            svr_best_cv_mse: search.best_score(),
            svr_grid: search.trials.clone(),
            forest_importances: models.forest_importances(),
            evaluation,
            duration_secs,
        }
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), json)?;
        Ok(())
    }
}

/// Every artifact of a completed run
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub sessions: CleanedSessions,
    pub dataset: SessionDataset,
    pub split: SplitData,
    pub models: TrainedModels,
    pub evaluation: EvaluationReport,
    pub predictions: DataFrame,
    pub report: RunReport,
}

/// Run every stage on already-cleaned sessions
pub fn run_sessions(sessions: CleanedSessions, config: &PipelineConfig) -> Result<RunOutcome> {
    let start = Instant::now();
    config.validate()?;

    let dataset = build_dataset(&sessions, config)?;
    let split = split_dataset(&dataset, config)?;
    let models = train(&split, config)?;
    let evaluation = evaluate(&models, &split)?;
    let predictions = predict(&models, &sessions, &dataset)?;

    let report = RunReport::new(
        config,
        sessions.stats(),
        &split,
        &models,
        evaluation.clone(),
        start.elapsed().as_secs_f64(),
    );

    Ok(RunOutcome {
        sessions,
        dataset,
        split,
        models,
        evaluation,
        predictions,
        report,
    })
}

/// Load `data_path`, run every stage and write the augmented table to
/// `output_path`
pub fn run(
    data_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    config: &PipelineConfig,
) -> Result<RunOutcome> {
    config.validate()?;
    let sessions = load_sessions(data_path, config)?;
    let mut outcome = run_sessions(sessions, config)?;
    write_predictions(&mut outcome.predictions, output_path)?;
    Ok(outcome)
}
