//! Constants command - show the normalized system constants

use anyhow::{Context, Result};
use console::style;
use smad::config::ExperimentConfig;
use smad::dataset::{system_constants, REFERENCE_SYSTEMS};
use smad::store::JsonStore;

/// Run the constants command
pub fn run(config: &ExperimentConfig, system: &str) -> Result<()> {
    let store = JsonStore::new(config.experiment.metrics_dir());
    let [size, history] = system_constants(&store, system)
        .with_context(|| format!("Failed to compute constants for {}", system))?;

    let source = if REFERENCE_SYSTEMS.iter().any(|(name, _, _)| *name == system) {
        "reference table"
    } else {
        "metric store"
    };
    println!("\n{} {}", style(system).cyan().bold(), style(format!("({})", source)).dim());
    println!("  size    : {:.6}", size);
    println!("  history : {:.6}", history);
    Ok(())
}
