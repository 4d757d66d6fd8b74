//! Feed-forward networks for smell detection
//!
//! Architecture: Input → [Linear → activation → dropout] x hidden → Linear(2) → Softmax
//!
//! Trained with full-batch gradient descent on softmax cross-entropy plus an
//! L2 penalty on the weights. Parameters are persisted as JSON checkpoints.

pub mod checkpoint;
pub mod network;
pub mod schedule;
pub mod session;

pub use checkpoint::{Checkpoint, CheckpointLayout, LayerParams, CHECKPOINT_VERSION};
pub use network::{Network, Scorer};
pub use schedule::LearningRateSchedule;
pub use session::InferenceSession;

use crate::dataset::DataError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by networks, checkpoints and ensembles
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Expected {expected} input features, got {actual}")]
    InputWidth { expected: usize, actual: usize },

    #[error("Labels must be {expected_rows}x2, got {rows}x{cols}")]
    LabelShape {
        expected_rows: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Checkpoint {path} was trained for {found}, session expects {expected}")]
    ArchitectureMismatch {
        path: PathBuf,
        expected: String,
        found: String,
    },

    #[error("Checkpoint layer {layer} has shape {found:?}, expected {expected:?}")]
    LayerShape {
        layer: usize,
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error("Checkpoint has {found} layers, expected {expected}")]
    LayerCount { expected: usize, found: usize },

    #[error("Unsupported checkpoint version {0}")]
    UnsupportedVersion(u32),

    #[error("Cannot average an empty ensemble")]
    EmptyEnsemble,

    #[error("Member prediction has shape {found:?}, expected {expected:?}")]
    PredictionShape {
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error("Invalid training configuration: {0}")]
    InvalidConfig(String),

    #[error("Checkpoint I/O failed for {path}: {source}")]
    CheckpointIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid checkpoint {path}: {source}")]
    CheckpointFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Cannot write learning curves to {path}: {source}")]
    CurvesIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Data(#[from] DataError),
}

pub type ModelResult<T> = Result<T, ModelError>;

/// Hidden-layer nonlinearity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    #[default]
    Relu,
    Tanh,
    Sigmoid,
}

impl Activation {
    pub fn apply(&self, x: f64) -> f64 {
        match self {
            Activation::Relu => x.max(0.0),
            Activation::Tanh => x.tanh(),
            Activation::Sigmoid => 1.0 / (1.0 + (-x).exp()),
        }
    }

    /// Derivative expressed in terms of the activation's output
    pub fn derivative_from_output(&self, y: f64) -> f64 {
        match self {
            Activation::Relu => {
                if y > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            Activation::Tanh => 1.0 - y * y,
            Activation::Sigmoid => y * (1.0 - y),
        }
    }
}

/// Shape of a network; shared by every member of an ensemble
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Architecture {
    /// Input width (features + system constants)
    pub input_size: usize,
    /// Hidden layer sizes
    pub layers: Vec<usize>,
    /// Output width (2: smell / no smell)
    pub output_size: usize,
    #[serde(default)]
    pub activation: Activation,
}

impl Architecture {
    pub fn new(input_size: usize, layers: Vec<usize>, activation: Activation) -> Self {
        Self {
            input_size,
            layers,
            output_size: 2,
            activation,
        }
    }

    /// (inputs, outputs) of every linear layer
    pub fn layer_shapes(&self) -> Vec<(usize, usize)> {
        let mut dims = Vec::with_capacity(self.layers.len() + 2);
        dims.push(self.input_size);
        dims.extend(&self.layers);
        dims.push(self.output_size);
        dims.windows(2).map(|w| (w[0], w[1])).collect()
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.input_size)?;
        for size in &self.layers {
            write!(f, "-{}", size)?;
        }
        write!(f, "-{} ({:?})", self.output_size, self.activation)
    }
}
