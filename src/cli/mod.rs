//! CLI command definitions and handlers

mod constants;
mod detect;
mod evaluate;
mod init;
mod train;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use console::style;
use indicatif::ProgressStyle;
use smad::config::ExperimentConfig;
use smad::dataset::system_data;
use smad::eval::{Evaluation, EvaluationSummary};
use smad::models::{Antipattern, SystemData};
use smad::nn::{Architecture, CheckpointLayout};
use smad::store::MetricStore;
use std::path::PathBuf;

/// Checkpoint directory used when no system is held out
pub(crate) const FINAL_MODELS: &str = "final";

/// smad - Smell detection with ensembles of neural networks
///
/// Trains small multi-layer perceptrons on software metrics and history to
/// detect God Class and Feature Envy.
#[derive(Parser, Debug)]
#[command(name = "smad")]
#[command(
    version,
    about = "Detect God Class and Feature Envy with ensembles of neural networks",
    after_help = "\
Examples:
  smad init                            Write an example smad.toml
  smad train                           Train on the configured systems
  smad train --holdout jedit           Leave jedit out and test on it
  smad evaluate                        Report P/R/F/A of the trained ensemble
  smad detect lucene                   List Feature Envy candidates in lucene
  smad constants argouml               Show normalized system constants"
)]
pub struct Cli {
    /// Path to the experiment config (default: ./smad.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the configured antipattern (god_class, feature_envy)
    #[arg(long, global = true)]
    pub antipattern: Option<Antipattern>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "warn", value_parser = ["error", "warn", "info", "debug", "trace"])]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a smad.toml config file with example settings
    Init,

    /// Train an ensemble and evaluate it on the test systems
    Train {
        /// Leave this system out of training and test on it alone
        #[arg(long)]
        holdout: Option<String>,

        /// Skip the evaluation report after training
        #[arg(long)]
        no_eval: bool,
    },

    /// Evaluate a trained ensemble on the test systems
    Evaluate {
        /// Evaluate the ensemble trained without this system
        #[arg(long)]
        holdout: Option<String>,

        /// Output format: text, json
        #[arg(long, short = 'f', default_value = "text", value_parser = ["text", "json"])]
        format: String,
    },

    /// List the entities of a system detected as smells
    Detect {
        /// System name, as known by the metric store
        system: String,

        /// Use the ensemble trained without this system
        #[arg(long)]
        holdout: Option<String>,

        /// Output format: text, json
        #[arg(long, short = 'f', default_value = "text", value_parser = ["text", "json"])]
        format: String,
    },

    /// Show the normalized size and history constants of a system
    Constants {
        /// System name
        system: String,
    },
}

/// Run the CLI with parsed arguments
pub fn run(cli: Cli) -> Result<()> {
    let config = || -> Result<ExperimentConfig> {
        let mut config = ExperimentConfig::load(cli.config.as_deref())?;
        if let Some(antipattern) = cli.antipattern {
            config.experiment.antipattern = antipattern;
        }
        Ok(config)
    };

    match cli.command {
        // init creates the file that --config names
        Commands::Init => init::run(cli.config.as_deref()),
        Commands::Train { holdout, no_eval } => train::run(&config()?, holdout.as_deref(), no_eval),
        Commands::Evaluate { holdout, format } => {
            evaluate::run(&config()?, holdout.as_deref(), &format)
        }
        Commands::Detect {
            system,
            holdout,
            format,
        } => detect::run(&config()?, &system, holdout.as_deref(), &format),
        Commands::Constants { system } => constants::run(&config()?, &system),
    }
}

/// Checkpoint layout of the ensemble trained with `holdout` left out
pub(crate) fn layout(config: &ExperimentConfig, holdout: Option<&str>) -> CheckpointLayout {
    CheckpointLayout::experiment(
        config.experiment.root_dir(),
        config.experiment.approach.clone(),
        config.experiment.antipattern,
        holdout.unwrap_or(FINAL_MODELS),
    )
}

/// Architecture shared by every member of the configured ensemble
pub(crate) fn architecture(config: &ExperimentConfig) -> Architecture {
    Architecture::new(
        config.experiment.antipattern.input_size(),
        config.training.layers.clone(),
        config.training.activation,
    )
}

/// (training, test) system names, with `holdout` moved to the test side
pub(crate) fn partition(config: &ExperimentConfig, holdout: Option<&str>) -> (Vec<String>, Vec<String>) {
    let experiment = &config.experiment;
    match holdout {
        Some(holdout) => {
            let train = experiment
                .training_systems
                .iter()
                .chain(&experiment.test_systems)
                .filter(|s| s.as_str() != holdout)
                .cloned()
                .collect();
            (train, vec![holdout.to_string()])
        }
        None => (experiment.training_systems.clone(), experiment.test_systems.clone()),
    }
}

/// Assemble every system, with the system name in the error chain
pub(crate) fn load_systems(
    store: &dyn MetricStore,
    antipattern: Antipattern,
    systems: &[String],
) -> Result<Vec<SystemData>> {
    systems
        .iter()
        .map(|name| {
            system_data(store, antipattern, name)
                .with_context(|| format!("Failed to assemble {} data for {}", antipattern, name))
        })
        .collect()
}

pub(crate) fn bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▓▒░  ")
}

fn format_metric(value: f64) -> String {
    if value.is_nan() {
        "n/a".to_string()
    } else {
        format!("{:.3}", value)
    }
}

/// Per-system metrics followed by their mean
pub(crate) fn print_report(evaluations: &[Evaluation]) {
    println!("\n{}", style("Evaluation").bold().underlined());
    for eval in evaluations {
        println!(
            "\n{} {}",
            style(&eval.system).cyan().bold(),
            style(format!(
                "({} instances, {} smells, {} detected)",
                eval.instances, eval.positive, eval.detected
            ))
            .dim()
        );
        println!("  P : {}", format_metric(eval.precision));
        println!("  R : {}", format_metric(eval.recall));
        println!("  F : {}", format_metric(eval.f_measure));
        println!("  A : {}", format_metric(eval.accuracy));
    }

    let summary = EvaluationSummary::mean(evaluations);
    println!("\n{}", style("MEAN").bold());
    println!("  Precision : {}", format_metric(summary.precision));
    println!("  Recall    : {}", format_metric(summary.recall));
    println!("  F-Measure : {}", format_metric(summary.f_measure));
    println!("  Accuracy  : {}", format_metric(summary.accuracy));
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(training: &[&str], test: &[&str]) -> ExperimentConfig {
        let mut config = ExperimentConfig::default();
        config.experiment.training_systems = training.iter().map(|s| s.to_string()).collect();
        config.experiment.test_systems = test.iter().map(|s| s.to_string()).collect();
        config
    }

    #[test]
    fn test_partition_without_holdout_keeps_configured_split() {
        let (train, test) = partition(&config(&["a", "b"], &["c"]), None);
        assert_eq!(train, vec!["a", "b"]);
        assert_eq!(test, vec!["c"]);
    }

    #[test]
    fn test_holdout_is_tested_and_never_trained_on() {
        let (train, test) = partition(&config(&["a", "b"], &["c"]), Some("a"));
        assert_eq!(train, vec!["b", "c"]);
        assert_eq!(test, vec!["a"]);
    }

    #[test]
    fn test_holdout_selects_checkpoint_directory() {
        let mut config = config(&["a"], &["b"]);
        config.experiment.root_dir = Some(PathBuf::from("/data"));
        config.experiment.antipattern = Antipattern::GodClass;
        assert!(layout(&config, None).directory().ends_with("god_class/final"));
        assert!(layout(&config, Some("b")).directory().ends_with("god_class/b"));
    }
}
