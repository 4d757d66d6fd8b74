//! Configuration module for smad
//!
//! This module handles:
//! - Experiment configuration (smad.toml)
//! - Training hyperparameters
//! - Environment overrides for data locations

mod experiment_config;

pub use experiment_config::{
    find_config_file, init_config, ExperimentConfig, ExperimentSection, CONFIG_FILE_NAME,
    ENV_METRICS_DIR, ENV_ROOT_DIR,
};
