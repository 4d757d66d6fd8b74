//! Training of the ensemble members
//!
//! Each member is initialized from its own seed and trained to completion on
//! its own: per step, one full-batch update per training system (in order,
//! no shuffling), then a loss-only pass over the test systems. The trained
//! member is written to its checkpoint before the next one starts (or in
//! parallel, when enabled).

use crate::models::SystemData;
use crate::nn::{
    Activation, Architecture, CheckpointLayout, LearningRateSchedule, ModelError, ModelResult,
    Network,
};
use nalgebra::DMatrix;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Steps between two progress log lines
const LOG_EVERY: usize = 50;

/// Training configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    /// Learning rate at step 0
    pub starter_learning_rate: f64,
    /// Multiplicative decay applied every `decay_steps`
    pub learning_rate_decay: f64,
    pub decay_steps: usize,
    /// Probability of keeping a hidden unit during training (1.0 = no dropout)
    pub dropout_keep_prob: f64,
    /// L2 penalty weight
    pub beta: f64,
    /// Number of training steps (epochs)
    pub num_steps: usize,
    /// Number of ensemble members
    pub num_networks: usize,
    /// Hidden layer sizes
    pub layers: Vec<usize>,
    pub activation: Activation,
    /// Base seed; members use `seed + index`. Random when unset.
    pub seed: Option<u64>,
    /// Train members on the rayon thread pool
    pub parallel: bool,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            starter_learning_rate: 0.190,
            learning_rate_decay: 0.7,
            decay_steps: 100,
            dropout_keep_prob: 1.0,
            beta: 0.197,
            num_steps: 400,
            num_networks: 5,
            layers: vec![86, 44],
            activation: Activation::default(),
            seed: None,
            parallel: false,
        }
    }
}

impl TrainConfig {
    pub fn validate(&self) -> ModelResult<()> {
        if self.num_networks == 0 {
            return Err(ModelError::InvalidConfig("num_networks must be at least 1".into()));
        }
        if self.num_steps == 0 {
            return Err(ModelError::InvalidConfig("num_steps must be at least 1".into()));
        }
        if !(self.dropout_keep_prob > 0.0 && self.dropout_keep_prob <= 1.0) {
            return Err(ModelError::InvalidConfig(format!(
                "dropout_keep_prob must be in (0, 1], got {}",
                self.dropout_keep_prob
            )));
        }
        if self.starter_learning_rate <= 0.0 || self.learning_rate_decay <= 0.0 {
            return Err(ModelError::InvalidConfig(
                "learning rate and decay must be positive".into(),
            ));
        }
        if self.beta < 0.0 {
            return Err(ModelError::InvalidConfig("beta must not be negative".into()));
        }
        if self.layers.iter().any(|&size| size == 0) {
            return Err(ModelError::InvalidConfig("hidden layers cannot be empty".into()));
        }
        Ok(())
    }

    pub fn schedule(&self) -> LearningRateSchedule {
        LearningRateSchedule::new(
            self.starter_learning_rate,
            self.learning_rate_decay,
            self.decay_steps,
        )
    }
}

/// Outcome of training one member
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberRun {
    pub index: usize,
    pub seed: u64,
    /// Mean training loss per step
    pub losses_train: Vec<f64>,
    /// Mean test loss per step (NaN without test systems)
    pub losses_test: Vec<f64>,
    pub checkpoint: PathBuf,
}

/// Training result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingHistory {
    pub architecture: Architecture,
    /// Learning rate in effect at every step
    pub learning_rates: Vec<f64>,
    /// Members ordered by index
    pub members: Vec<MemberRun>,
}

impl TrainingHistory {
    /// Checkpoint paths ordered by member index
    pub fn checkpoints(&self) -> Vec<PathBuf> {
        self.members.iter().map(|m| m.checkpoint.clone()).collect()
    }

    /// Final training loss averaged over members
    pub fn final_train_loss(&self) -> f64 {
        mean(self.members.iter().filter_map(|m| m.losses_train.last().copied()))
    }

    /// Final test loss averaged over members
    pub fn final_test_loss(&self) -> f64 {
        mean(self.members.iter().filter_map(|m| m.losses_test.last().copied()))
    }
}

/// Train `config.num_networks` members and persist each under `layout`
pub fn train_ensemble(
    train: &[SystemData],
    test: &[SystemData],
    config: &TrainConfig,
    layout: &CheckpointLayout,
) -> ModelResult<TrainingHistory> {
    train_ensemble_with(train, test, config, layout, &|_| {})
}

/// [`train_ensemble`] with a callback invoked as each member finishes
pub fn train_ensemble_with(
    train: &[SystemData],
    test: &[SystemData],
    config: &TrainConfig,
    layout: &CheckpointLayout,
    on_member: &(dyn Fn(&MemberRun) + Sync),
) -> ModelResult<TrainingHistory> {
    config.validate()?;
    let first = train
        .first()
        .ok_or_else(|| ModelError::InvalidConfig("no training systems".into()))?;

    let architecture = Architecture::new(
        first.features.ncols() + first.constants.len(),
        config.layers.clone(),
        config.activation,
    );
    let train_batches = batches(train);
    let test_batches = batches(test);
    let learning_rates = config.schedule().rates(config.num_steps);
    let base_seed = config.seed.unwrap_or_else(|| rand::rng().random());

    tracing::info!(
        "Training {} networks ({}) on {} systems, testing on {}",
        config.num_networks,
        architecture,
        train.len(),
        test.len()
    );

    let run = |index: usize| -> ModelResult<MemberRun> {
        let member = MemberSetup {
            index,
            seed: base_seed.wrapping_add(index as u64),
            architecture: &architecture,
            config,
            learning_rates: &learning_rates,
        };
        let result = member.train(&train_batches, &test_batches, layout)?;
        on_member(&result);
        Ok(result)
    };

    let mut members: Vec<MemberRun> = if config.parallel {
        (0..config.num_networks)
            .into_par_iter()
            .map(run)
            .collect::<ModelResult<_>>()?
    } else {
        (0..config.num_networks).map(run).collect::<ModelResult<_>>()?
    };
    members.sort_by_key(|m| m.index);

    Ok(TrainingHistory {
        architecture,
        learning_rates,
        members,
    })
}

/// (inputs, labels) of every system
fn batches(systems: &[SystemData]) -> Vec<(DMatrix<f64>, DMatrix<f64>)> {
    systems
        .iter()
        .map(|s| (s.inputs(), s.labels.clone()))
        .collect()
}

struct MemberSetup<'a> {
    index: usize,
    seed: u64,
    architecture: &'a Architecture,
    config: &'a TrainConfig,
    learning_rates: &'a [f64],
}

impl MemberSetup<'_> {
    fn train(
        &self,
        train: &[(DMatrix<f64>, DMatrix<f64>)],
        test: &[(DMatrix<f64>, DMatrix<f64>)],
        layout: &CheckpointLayout,
    ) -> ModelResult<MemberRun> {
        let config = self.config;
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut network = Network::new(self.architecture.clone(), &mut rng);

        tracing::info!("Training the neural network {}", self.index);

        let mut losses_train = Vec::with_capacity(config.num_steps);
        let mut losses_test = Vec::with_capacity(config.num_steps);

        for (step, &learning_rate) in self.learning_rates.iter().enumerate() {
            let mut step_train = Vec::with_capacity(train.len());
            for (inputs, labels) in train {
                network.train_step(
                    inputs,
                    labels,
                    learning_rate,
                    config.beta,
                    config.dropout_keep_prob,
                    &mut rng,
                )?;
                step_train.push(network.loss(inputs, labels, config.beta)?);
            }

            let mut step_test = Vec::with_capacity(test.len());
            for (inputs, labels) in test {
                step_test.push(network.loss(inputs, labels, config.beta)?);
            }

            let train_loss = mean(step_train.iter().copied());
            let test_loss = mean(step_test.iter().copied());
            losses_train.push(train_loss);
            losses_test.push(test_loss);

            if step % LOG_EVERY == 0 || step + 1 == config.num_steps {
                tracing::info!(
                    "Network {} step {}/{}: lr={:.4}, train_loss={:.4}, test_loss={:.4}",
                    self.index,
                    step + 1,
                    config.num_steps,
                    learning_rate,
                    train_loss,
                    test_loss
                );
            }
        }

        let checkpoint = layout.prepare(self.index)?;
        network.to_checkpoint().save(&checkpoint)?;
        tracing::info!("Network {} saved to {}", self.index, checkpoint.display());

        Ok(MemberRun {
            index: self.index,
            seed: self.seed,
            losses_train,
            losses_test,
            checkpoint,
        })
    }
}

/// Arithmetic mean; NaN for an empty sequence
fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}
