//! Ensembles of independently trained networks
//!
//! Members share nothing but the architecture. Predictions of all members are
//! averaged with equal weight and the smell score is thresholded at 0.5.

pub mod curves;
pub mod predictor;
pub mod trainer;

pub use curves::{CurveBand, LearningCurves};
pub use predictor::{
    aggregate, ensemble_prediction, ensemble_prediction_with_constants, positive_indices,
    predict_members, DECISION_THRESHOLD,
};
pub use trainer::{train_ensemble, train_ensemble_with, MemberRun, TrainConfig, TrainingHistory};
