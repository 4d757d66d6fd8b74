//! Data preparation for the ensembles
//!
//! - Feature assembly from the metric store (per-system z-score normalization)
//! - System-level constants normalized against a reference population
//! - Class rebalancing, shuffling and splitting

pub mod assemble;
pub mod constants;
pub mod rebalance;
pub mod scaler;

pub use assemble::{
    build_dataset, features, instances, labels, predict_from_detect, scalar_labels, system_data,
};
pub use constants::{system_constants, REFERENCE_SYSTEMS};
pub use rebalance::{rebalance, rebalance_by_removing, rebalance_system, shuffle, split};
pub use scaler::StandardScaler;

use std::path::PathBuf;
use thiserror::Error;

/// Number of system-level constants appended to every instance
pub const CONSTANTS_SIZE: usize = 2;

/// Errors raised while loading or preparing data
#[derive(Error, Debug)]
pub enum DataError {
    #[error("Unknown system: {0}")]
    UnknownSystem(String),

    #[error("Metric family {family} has no entry for '{entity}' in {system}")]
    MissingMetrics {
        system: String,
        entity: String,
        family: usize,
    },

    #[error("Entity '{entity}' has {actual} features, expected {expected}")]
    FeatureWidth {
        entity: String,
        expected: usize,
        actual: usize,
    },

    #[error("Instances and labels must have the same number of elements ({instances} != {labels})")]
    LengthMismatch { instances: usize, labels: usize },

    #[error("Labels must be one-hot with 2 columns, got {0}")]
    NotOneHot(usize),

    #[error("Cannot rebalance: class {0} has no instances")]
    EmptyClass(usize),

    #[error("Cannot split {len} instances into {parts} parts")]
    InvalidSplit { len: usize, parts: usize },

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid metric snapshot {path}: {source}")]
    Snapshot {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type DataResult<T> = Result<T, DataError>;

/// Fail fast when instances and labels are not parallel
pub(crate) fn check_parallel(instances: usize, labels: usize) -> DataResult<()> {
    if instances != labels {
        return Err(DataError::LengthMismatch { instances, labels });
    }
    Ok(())
}
