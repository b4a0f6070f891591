//! Held-out evaluation
//!
//! Every metric is computed in energy units (kWh): power predictions are
//! converted through session durations before scoring.

mod baselines;
mod evaluator;
mod metrics;

pub use baselines::Baselines;
pub use evaluator::{BaselineEvaluation, EvaluationReport, Evaluator, ModelEvaluation};
pub use metrics::RegressionMetrics;
