//! Inference context reused across ensemble members

use super::checkpoint::Checkpoint;
use super::network::Network;
use super::{Architecture, ModelError, ModelResult};
use nalgebra::DMatrix;
use std::path::Path;

/// One instance of an architecture whose parameters are swapped per member.
///
/// Every [`restore`](Self::restore) overwrites all parameters, so running
/// members one after another in the same session gives the same outputs as
/// separate networks.
#[derive(Debug)]
pub struct InferenceSession {
    network: Network,
    restored: Option<std::path::PathBuf>,
}

impl InferenceSession {
    pub fn new(architecture: Architecture) -> Self {
        Self {
            network: Network::zeros(architecture),
            restored: None,
        }
    }

    pub fn architecture(&self) -> &Architecture {
        self.network.architecture()
    }

    /// Checkpoint currently loaded, if any
    pub fn current(&self) -> Option<&Path> {
        self.restored.as_deref()
    }

    /// Load a member's parameters from disk
    pub fn restore(&mut self, path: &Path) -> ModelResult<()> {
        let checkpoint = Checkpoint::load(path)?;
        if &checkpoint.architecture != self.network.architecture() {
            return Err(ModelError::ArchitectureMismatch {
                path: path.to_path_buf(),
                expected: self.network.architecture().to_string(),
                found: checkpoint.architecture.to_string(),
            });
        }
        self.network.load_params(&checkpoint)?;
        self.restored = Some(path.to_path_buf());
        Ok(())
    }

    /// Forward pass with the current parameters
    pub fn run(&self, inputs: &DMatrix<f64>) -> ModelResult<DMatrix<f64>> {
        self.network.predict(inputs)
    }
}
