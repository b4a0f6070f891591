//! Model training module
//!
//! Provides the three power regressors and their supporting machinery:
//! - Index-aligned train/test split
//! - K-fold cross-validation
//! - Lasso with cross-validated strength (coordinate descent)
//! - Regression trees and random forests
//! - Epsilon-SVR with an RBF kernel and a parallel grid search
//! - Trained pipelines sharing one fitted transform

pub mod cross_validation;
pub mod decision_tree;
pub mod grid_search;
pub mod linear_models;
mod models;
pub mod pipeline;
pub mod random_forest;
pub mod split;
pub mod svm;

pub use cross_validation::{CVSplit, KFold};
pub use decision_tree::{DecisionTree, TreeNode};
pub use grid_search::{CandidateScore, GridSearchResult, SvrGridSearch};
pub use linear_models::{LassoCv, LassoRegression};
pub use models::{Model, ModelKind, TrainedModel};
pub use pipeline::{train_all, TrainedModels, TrainedPipeline};
pub use random_forest::{MaxFeatures, RandomForest};
pub use split::{train_test_split, IndexSplit};
pub use svm::{SVMConfig, SVMRegressor, SvrParams};
