//! Train command - train an ensemble on the configured systems

use super::{architecture, bar_style, evaluate, layout, load_systems, partition, print_report};
use anyhow::{Context, Result};
use console::style;
use indicatif::ProgressBar;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use smad::config::ExperimentConfig;
use smad::dataset::{rebalance_system, DataError};
use smad::ensemble::{train_ensemble_with, LearningCurves, MemberRun};
use smad::store::JsonStore;

/// File written next to the checkpoints
const CURVES_FILE: &str = "learning_curves.json";

/// Run the train command
pub fn run(config: &ExperimentConfig, holdout: Option<&str>, no_eval: bool) -> Result<()> {
    let antipattern = config.experiment.antipattern;
    let store = JsonStore::new(config.experiment.metrics_dir());
    let (train_names, test_names) = partition(config, holdout);
    if train_names.is_empty() {
        anyhow::bail!("No training systems configured");
    }

    println!(
        "\n{} Training a {} ensemble on {} systems: {}\n",
        style("▶").bold(),
        style(antipattern).cyan(),
        train_names.len(),
        train_names.join(", ")
    );

    let mut train = load_systems(&store, antipattern, &train_names)?;
    let test = load_systems(&store, antipattern, &test_names)?;

    if let Some(constant) = config.experiment.rebalance_constant {
        let seed = config.training.seed.unwrap_or_else(|| rand::rng().random());
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        train = train
            .iter()
            .map(|system| {
                let balanced = rebalance_system(constant, system, &mut rng)?;
                println!(
                    "  rebalanced {}: {} -> {} instances ({} smells)",
                    system.name,
                    system.len(),
                    balanced.len(),
                    balanced.positives()
                );
                Ok(balanced)
            })
            .collect::<Result<_, DataError>>()
            .context("Failed to rebalance training data")?;
    }

    let layout = layout(config, holdout);
    let bar = ProgressBar::new(config.training.num_networks as u64);
    bar.set_style(bar_style());
    bar.set_message("Training networks...");

    let on_member = |_run: &MemberRun| bar.inc(1);
    let history = train_ensemble_with(&train, &test, &config.training, &layout, &on_member)
        .context("Training failed")?;
    bar.finish_with_message(format!("{} networks trained", history.members.len()));

    println!(
        "{} Checkpoints saved to {}",
        style("✓").green(),
        style(layout.directory().display()).cyan()
    );
    println!(
        "  final loss: train {:.4}, test {:.4}",
        history.final_train_loss(),
        history.final_test_loss()
    );

    let curves_path = layout.directory().join(CURVES_FILE);
    LearningCurves::from_history(&history)
        .save(&curves_path)
        .context("Failed to save learning curves")?;

    if !no_eval && !test.is_empty() {
        let evaluations =
            evaluate::evaluate_systems(&architecture(config), &history.checkpoints(), &test)?;
        print_report(&evaluations);
    }

    Ok(())
}
