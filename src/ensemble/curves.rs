//! Learning curves of an ensemble run

use super::trainer::TrainingHistory;
use crate::nn::{ModelError, ModelResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Per-step mean and 10th/90th percentile over members
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CurveBand {
    pub mean: Vec<f64>,
    pub p10: Vec<f64>,
    pub p90: Vec<f64>,
}

impl CurveBand {
    /// Aggregate member curves of equal length
    pub fn from_runs(runs: &[&[f64]]) -> Self {
        let steps = runs.iter().map(|r| r.len()).min().unwrap_or(0);
        let mut band = CurveBand::default();
        for step in 0..steps {
            let mut values: Vec<f64> = runs.iter().map(|r| r[step]).collect();
            values.sort_by(f64::total_cmp);
            band.mean.push(values.iter().sum::<f64>() / values.len() as f64);
            band.p10.push(percentile(&values, 10.0));
            band.p90.push(percentile(&values, 90.0));
        }
        band
    }
}

/// Loss curves and learning rates, ready to be plotted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningCurves {
    pub learning_rates: Vec<f64>,
    pub train: CurveBand,
    /// Absent when the run had no test systems
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test: Option<CurveBand>,
}

impl LearningCurves {
    pub fn from_history(history: &TrainingHistory) -> Self {
        let train: Vec<&[f64]> = history.members.iter().map(|m| m.losses_train.as_slice()).collect();
        let test: Vec<&[f64]> = history.members.iter().map(|m| m.losses_test.as_slice()).collect();
        let tested = test.iter().any(|run| run.iter().any(|l| !l.is_nan()));
        Self {
            learning_rates: history.learning_rates.clone(),
            train: CurveBand::from_runs(&train),
            test: tested.then(|| CurveBand::from_runs(&test)),
        }
    }

    /// Write as pretty JSON, creating parent directories
    pub fn save(&self, path: &Path) -> ModelResult<()> {
        let io_err = |source: std::io::Error| ModelError::CurvesIo {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|e| io_err(e.into()))?;
        std::fs::write(path, json).map_err(io_err)?;
        tracing::info!("Learning curves written to {}", path.display());
        Ok(())
    }
}

/// Linear-interpolated percentile of sorted values
fn percentile(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let rank = p / 100.0 * (n - 1) as f64;
            let lo = rank.floor() as usize;
            let hi = rank.ceil() as usize;
            sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
        }
    }
}
