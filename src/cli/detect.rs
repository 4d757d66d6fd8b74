//! Detect command - list smells of a system with a trained ensemble

use super::{architecture, evaluate::trained_checkpoints};
use anyhow::{Context, Result};
use console::style;
use smad::config::ExperimentConfig;
use smad::detect::detect_smells;
use smad::store::JsonStore;

/// Run the detect command
pub fn run(config: &ExperimentConfig, system: &str, holdout: Option<&str>, format: &str) -> Result<()> {
    let antipattern = config.experiment.antipattern;
    let store = JsonStore::new(config.experiment.metrics_dir());
    let checkpoints = trained_checkpoints(config, holdout)?;

    let smells = detect_smells(&store, &architecture(config), &checkpoints, antipattern, system)
        .with_context(|| format!("Detection failed for {}", system))?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&smells)?);
        return Ok(());
    }

    println!(
        "\n{} {} {} in {}\n",
        style("✓").green(),
        style(smells.len()).cyan(),
        antipattern,
        style(system).bold()
    );
    for smell in &smells {
        println!("  {}", smell);
    }
    Ok(())
}
