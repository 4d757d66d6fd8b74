//! Evaluate command - score a trained ensemble against the oracle

use super::{architecture, layout, load_systems, partition, print_report};
use anyhow::{Context, Result};
use smad::config::ExperimentConfig;
use smad::ensemble::ensemble_prediction;
use smad::eval::{Evaluation, EvaluationSummary};
use smad::models::SystemData;
use smad::nn::Architecture;
use smad::store::JsonStore;
use std::path::PathBuf;

/// Run the evaluate command
pub fn run(config: &ExperimentConfig, holdout: Option<&str>, format: &str) -> Result<()> {
    let antipattern = config.experiment.antipattern;
    let store = JsonStore::new(config.experiment.metrics_dir());
    let (_, test_names) = partition(config, holdout);
    if test_names.is_empty() {
        anyhow::bail!("No test systems configured");
    }

    let checkpoints = trained_checkpoints(config, holdout)?;
    let test = load_systems(&store, antipattern, &test_names)?;
    let evaluations = evaluate_systems(&architecture(config), &checkpoints, &test)?;

    match format {
        "json" => {
            let report = serde_json::json!({
                "antipattern": antipattern,
                "systems": evaluations,
                "mean": EvaluationSummary::mean(&evaluations),
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        _ => print_report(&evaluations),
    }
    Ok(())
}

/// Checkpoint paths of the configured ensemble; fails when it was never trained
pub(crate) fn trained_checkpoints(
    config: &ExperimentConfig,
    holdout: Option<&str>,
) -> Result<Vec<PathBuf>> {
    let layout = layout(config, holdout);
    let paths = layout.paths(config.training.num_networks);
    if let Some(missing) = paths.iter().find(|p| !p.exists()) {
        anyhow::bail!(
            "No trained network at {} (run `smad train` first)",
            missing.display()
        );
    }
    Ok(paths)
}

/// Ensemble metrics of every system
pub(crate) fn evaluate_systems(
    architecture: &Architecture,
    checkpoints: &[PathBuf],
    systems: &[SystemData],
) -> Result<Vec<Evaluation>> {
    systems
        .iter()
        .map(|system| {
            let output = ensemble_prediction(architecture, checkpoints, &system.inputs())
                .with_context(|| format!("Prediction failed for {}", system.name))?;
            Evaluation::compute(system.name.clone(), &output, &system.labels)
                .with_context(|| format!("Evaluation failed for {}", system.name))
        })
        .collect()
}
