//! Experiment configuration
//!
//! Loaded from, in order of priority:
//! 1. Environment variables (`SMAD_ROOT_DIR`, `SMAD_METRICS_DIR`)
//! 2. The file given with `--config`
//! 3. `./smad.toml`
//! 4. `~/.config/smad/config.toml`
//!
//! With no file the defaults apply. A discovered file that fails to parse is
//! reported and ignored; a `--config` file that is missing or invalid is an
//! error.

use crate::ensemble::TrainConfig;
use crate::models::Antipattern;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const CONFIG_FILE_NAME: &str = "smad.toml";
pub const ENV_ROOT_DIR: &str = "SMAD_ROOT_DIR";
pub const ENV_METRICS_DIR: &str = "SMAD_METRICS_DIR";

/// Complete experiment configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub experiment: ExperimentSection,
    pub training: TrainConfig,
}

/// `[experiment]`: what to train on and where the data lives
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentSection {
    pub antipattern: Antipattern,
    /// Approach name, part of the checkpoint path
    pub approach: String,
    /// Root of `neural_networks/`; defaults to the user data directory
    pub root_dir: Option<PathBuf>,
    /// Directory of `<system>.json` metric snapshots; defaults to `<root_dir>/metrics`
    pub metrics_dir: Option<PathBuf>,
    pub training_systems: Vec<String>,
    pub test_systems: Vec<String>,
    /// Rebalance every training system with this skew tolerance
    pub rebalance_constant: Option<f64>,
}

impl Default for ExperimentSection {
    fn default() -> Self {
        Self {
            antipattern: Antipattern::FeatureEnvy,
            approach: "smad".to_string(),
            root_dir: None,
            metrics_dir: None,
            training_systems: [
                "xerces-2_7_0",
                "lucene",
                "apache-ant",
                "argouml",
                "android-frameworks-opt-telephony",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            test_systems: ["apache-tomcat", "jedit", "android-platform-support"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            rebalance_constant: None,
        }
    }
}

impl ExperimentSection {
    pub fn root_dir(&self) -> PathBuf {
        self.root_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .map(|d| d.join("smad"))
                .unwrap_or_else(|| PathBuf::from("."))
        })
    }

    pub fn metrics_dir(&self) -> PathBuf {
        self.metrics_dir
            .clone()
            .unwrap_or_else(|| self.root_dir().join("metrics"))
    }
}

impl ExperimentConfig {
    /// Load config from all sources
    ///
    /// An explicit `--config` path must exist and parse. A discovered file
    /// that fails to parse is reported and the defaults are used.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        Self::load_in(Path::new("."), explicit)
    }

    /// [`load`](Self::load), discovering `smad.toml` in `dir`
    pub fn load_in(dir: &Path, explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => {
                let config = Self::from_file(path)
                    .with_context(|| format!("Invalid config file {}", path.display()))?;
                debug!("Loaded experiment config from {}", path.display());
                config
            }
            None => Self::discovered(dir),
        };

        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    fn discovered(dir: &Path) -> Self {
        match find_config_file(dir) {
            Some(path) => match Self::from_file(&path) {
                Ok(config) => {
                    debug!("Loaded experiment config from {}", path.display());
                    config
                }
                Err(e) => {
                    warn!("Failed to load {}: {:#}", path.display(), e);
                    Self::default()
                }
            },
            None => {
                debug!("No experiment config found, using defaults");
                Self::default()
            }
        }
    }

    /// Parse a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: ExperimentConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(config)
    }

    /// Environment variables override the file
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(root) = var(ENV_ROOT_DIR).filter(|v| !v.is_empty()) {
            self.experiment.root_dir = Some(PathBuf::from(root));
        }
        if let Some(metrics) = var(ENV_METRICS_DIR).filter(|v| !v.is_empty()) {
            self.experiment.metrics_dir = Some(PathBuf::from(metrics));
        }
    }

    /// User config path (~/.config/smad/config.toml)
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("smad").join("config.toml"))
    }
}

/// `smad.toml` in `dir`, else the user config file, if either exists
pub fn find_config_file(dir: &Path) -> Option<PathBuf> {
    let local = dir.join(CONFIG_FILE_NAME);
    if local.exists() {
        return Some(local);
    }
    ExperimentConfig::user_config_path().filter(|p| p.exists())
}

/// Write an example config at `path` unless one exists; returns whether it was written
pub fn init_config(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let example = r#"# smad experiment configuration

[experiment]
# "god_class" or "feature_envy"
antipattern = "feature_envy"
approach = "smad"

# Checkpoints go to <root_dir>/neural_networks/<approach>/trained_models/...
# root_dir = "/data/smad"            # or SMAD_ROOT_DIR
# metrics_dir = "/data/smad/metrics" # or SMAD_METRICS_DIR, one <system>.json per system

training_systems = ["xerces-2_7_0", "lucene", "apache-ant", "argouml", "android-frameworks-opt-telephony"]
test_systems = ["apache-tomcat", "jedit", "android-platform-support"]

# Oversample/undersample training systems, tolerating this much skew
# rebalance_constant = 5.0

[training]
starter_learning_rate = 0.190
learning_rate_decay = 0.7
decay_steps = 100
dropout_keep_prob = 1.0
beta = 0.197
num_steps = 400
num_networks = 5
layers = [86, 44]
activation = "relu"      # "relu", "tanh" or "sigmoid"
# seed = 42              # random when unset
parallel = false
"#;
    std::fs::write(path, example).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(true)
}
