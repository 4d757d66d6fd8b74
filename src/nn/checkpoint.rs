//! Checkpoints: one trained ensemble member's parameters on disk
//!
//! Layout used by the experiments:
//!
//! ```text
//! <root>/neural_networks/<approach>/trained_models/<antipattern>/<test_system>/model_<n>
//! ```
//!
//! Directories are created on demand. Each file is a JSON [`Checkpoint`].

use super::{Architecture, ModelError, ModelResult};
use crate::models::Antipattern;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Current on-disk format
pub const CHECKPOINT_VERSION: u32 = 1;

/// Parameters of one linear layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerParams {
    /// `[inputs][outputs]`
    pub weights: Vec<Vec<f64>>,
    /// `[outputs]`
    pub bias: Vec<f64>,
}

/// Fully specified parameter snapshot of one network
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub version: u32,
    pub architecture: Architecture,
    pub layers: Vec<LayerParams>,
    pub created_at: DateTime<Utc>,
}

impl Checkpoint {
    pub fn new(architecture: Architecture, layers: Vec<LayerParams>) -> Self {
        Self {
            version: CHECKPOINT_VERSION,
            architecture,
            layers,
            created_at: Utc::now(),
        }
    }

    /// Load a checkpoint from JSON
    pub fn load(path: &Path) -> ModelResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ModelError::CheckpointIo {
            path: path.to_path_buf(),
            source,
        })?;
        let checkpoint: Checkpoint =
            serde_json::from_str(&content).map_err(|source| ModelError::CheckpointFormat {
                path: path.to_path_buf(),
                source,
            })?;
        if checkpoint.version != CHECKPOINT_VERSION {
            return Err(ModelError::UnsupportedVersion(checkpoint.version));
        }
        tracing::debug!("Restored checkpoint {}", path.display());
        Ok(checkpoint)
    }

    /// Save checkpoint to JSON, creating parent directories
    pub fn save(&self, path: &Path) -> ModelResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ModelError::CheckpointIo {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let content =
            serde_json::to_string_pretty(self).map_err(|source| ModelError::CheckpointFormat {
                path: path.to_path_buf(),
                source,
            })?;
        std::fs::write(path, content).map_err(|source| ModelError::CheckpointIo {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!("Saved checkpoint {}", path.display());
        Ok(())
    }
}

/// Where the members of one ensemble are stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckpointLayout {
    /// `root/neural_networks/<approach>/trained_models/<antipattern>/<test_system>/model_<n>`
    Experiment {
        root: PathBuf,
        approach: String,
        antipattern: Antipattern,
        test_system: String,
    },
    /// `dir/model_<n>`
    Flat { dir: PathBuf },
}

impl CheckpointLayout {
    pub fn experiment(
        root: impl Into<PathBuf>,
        approach: impl Into<String>,
        antipattern: Antipattern,
        test_system: impl Into<String>,
    ) -> Self {
        CheckpointLayout::Experiment {
            root: root.into(),
            approach: approach.into(),
            antipattern,
            test_system: test_system.into(),
        }
    }

    pub fn flat(dir: impl Into<PathBuf>) -> Self {
        CheckpointLayout::Flat { dir: dir.into() }
    }

    /// Directory holding the members
    pub fn directory(&self) -> PathBuf {
        match self {
            CheckpointLayout::Experiment {
                root,
                approach,
                antipattern,
                test_system,
            } => root
                .join("neural_networks")
                .join(approach)
                .join("trained_models")
                .join(antipattern.as_str())
                .join(test_system),
            CheckpointLayout::Flat { dir } => dir.clone(),
        }
    }

    /// Path of member `n`; does not touch the filesystem
    pub fn path(&self, n: usize) -> PathBuf {
        self.directory().join(format!("model_{}", n))
    }

    /// Path of member `n`, creating its directory
    pub fn prepare(&self, n: usize) -> ModelResult<PathBuf> {
        let directory = self.directory();
        std::fs::create_dir_all(&directory).map_err(|source| ModelError::CheckpointIo {
            path: directory.clone(),
            source,
        })?;
        Ok(directory.join(format!("model_{}", n)))
    }

    /// Paths of members `0..count`
    pub fn paths(&self, count: usize) -> Vec<PathBuf> {
        (0..count).map(|n| self.path(n)).collect()
    }
}
