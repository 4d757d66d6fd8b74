//! Core data models for smad

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Code smell kinds the ensembles are trained for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Antipattern {
    /// Overly large class that centralizes the system's intelligence
    GodClass,
    /// Method more interested in another class's data than its own
    #[default]
    FeatureEnvy,
}

impl Antipattern {
    /// Number of metric features per entity, system constants excluded
    pub fn feature_count(&self) -> usize {
        match self {
            Antipattern::GodClass => 6,
            Antipattern::FeatureEnvy => 7,
        }
    }

    /// Network input width: features followed by the two system constants
    pub fn input_size(&self) -> usize {
        self.feature_count() + crate::dataset::CONSTANTS_SIZE
    }

    /// Directory-friendly name, also used in checkpoint paths
    pub fn as_str(&self) -> &'static str {
        match self {
            Antipattern::GodClass => "god_class",
            Antipattern::FeatureEnvy => "feature_envy",
        }
    }
}

impl fmt::Display for Antipattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Antipattern {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "god_class" | "godclass" | "gc" => Ok(Antipattern::GodClass),
            "feature_envy" | "featureenvy" | "fe" => Ok(Antipattern::FeatureEnvy),
            other => Err(format!(
                "unknown antipattern '{}' (expected god_class or feature_envy)",
                other
            )),
        }
    }
}

/// One-hot row for a smelly entity
pub const POSITIVE: [f64; 2] = [1.0, 0.0];
/// One-hot row for a clean entity
pub const NEGATIVE: [f64; 2] = [0.0, 1.0];

/// Everything the trainer and the evaluator need about one system
#[derive(Debug, Clone)]
pub struct SystemData {
    /// System name as known by the metric store
    pub name: String,
    /// Normalized metric features, one row per entity (constants excluded)
    pub features: DMatrix<f64>,
    /// Normalized (class count, commit count)
    pub constants: [f64; 2],
    /// One-hot labels, `[1, 0]` = smell
    pub labels: DMatrix<f64>,
}

impl SystemData {
    /// Network inputs: features with the system constants broadcast to every row
    pub fn inputs(&self) -> DMatrix<f64> {
        with_constants(&self.features, &self.constants)
    }

    /// Number of entities
    pub fn len(&self) -> usize {
        self.features.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.features.nrows() == 0
    }

    /// Number of entities labeled as smells
    pub fn positives(&self) -> usize {
        self.labels.column(0).iter().filter(|&&v| v > 0.5).count()
    }
}

/// Append `constants` as extra columns on every row of `instances`
pub fn with_constants(instances: &DMatrix<f64>, constants: &[f64]) -> DMatrix<f64> {
    let rows = instances.nrows();
    let cols = instances.ncols();
    DMatrix::from_fn(rows, cols + constants.len(), |i, j| {
        if j < cols {
            instances[(i, j)]
        } else {
            constants[j - cols]
        }
    })
}
