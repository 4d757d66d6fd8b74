//! smad - Smell detection with ensembles of neural networks
//!
//! Detects God Class and Feature Envy from per-entity software metrics and
//! system-level constants. Each detector is an ensemble of independently
//! trained multi-layer perceptrons whose softmax outputs are averaged.
//!
//! Pipeline:
//! 1. [`store`] provides metrics and ground truth per system
//! 2. [`dataset`] assembles normalized instances, labels and system constants
//! 3. [`ensemble`] trains the members ([`nn`]) and averages their predictions
//! 4. [`eval`] and [`detect`] turn averaged predictions into metrics or smells

pub mod config;
pub mod dataset;
pub mod detect;
pub mod ensemble;
pub mod eval;
pub mod models;
pub mod nn;
pub mod store;
