//! Smell detection on a system with a trained ensemble

use crate::dataset::assemble::loaded_features;
use crate::dataset::system_constants;
use crate::ensemble::{ensemble_prediction_with_constants, positive_indices};
use crate::models::Antipattern;
use crate::nn::{Architecture, ModelResult};
use crate::store::{InMemoryStore, MetricStore};
use std::path::Path;

/// Names of the entities of `system` the ensemble reports as `antipattern`.
///
/// Entities are returned in store order.
pub fn detect_smells<P: AsRef<Path>>(
    store: &dyn MetricStore,
    architecture: &Architecture,
    checkpoints: &[P],
    antipattern: Antipattern,
    system: &str,
) -> ModelResult<Vec<String>> {
    let loaded = InMemoryStore::preload(store, &[system])?;
    let entities = loaded.entities(antipattern, system)?;
    let features = loaded_features(&loaded, antipattern, system)?;
    let constants = system_constants(&loaded, system)?;

    let output =
        ensemble_prediction_with_constants(architecture, checkpoints, &features, Some(&constants))?;
    let smells: Vec<String> = positive_indices(&output)
        .into_iter()
        .map(|i| entities[i].clone())
        .collect();

    tracing::info!(
        "{} {} detected among {} entities of {}",
        smells.len(),
        antipattern,
        entities.len(),
        system
    );
    Ok(smells)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nn::{Activation, CheckpointLayout, LayerParams, Network};
    use crate::store::SystemSnapshot;

    fn store() -> InMemoryStore {
        let mut snap = SystemSnapshot {
            classes: vec!["Big".into(), "Small".into(), "Tiny".into()],
            history: vec!["c1".into(), "c2".into()],
            ..Default::default()
        };
        for (class, size) in [("Big", 50.0), ("Small", 5.0), ("Tiny", 1.0)] {
            snap.metrics.gc_decor.insert(class.into(), vec![size, size / 2.0]);
            snap.metrics.gc_hist.insert(class.into(), vec![size, 1.0, 2.0]);
            snap.metrics.gc_jdeodorant.insert(class.into(), vec![size]);
        }
        InMemoryStore::new().with_system("toy", snap)
    }

    /// Linear member whose smell logit is the first feature
    fn first_feature_member(architecture: &Architecture) -> Network {
        let mut weights = vec![vec![0.0, 0.0]; architecture.input_size];
        weights[0] = vec![5.0, -5.0];
        let checkpoint = crate::nn::Checkpoint::new(
            architecture.clone(),
            vec![LayerParams {
                weights,
                bias: vec![0.0, 0.0],
            }],
        );
        Network::from_checkpoint(&checkpoint).unwrap()
    }

    #[test]
    fn test_detects_entities_above_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let layout = CheckpointLayout::flat(dir.path());
        let architecture =
            Architecture::new(Antipattern::GodClass.input_size(), vec![], Activation::Relu);
        for n in 0..2 {
            first_feature_member(&architecture)
                .to_checkpoint()
                .save(&layout.path(n))
                .unwrap();
        }

        let smells = detect_smells(
            &store(),
            &architecture,
            &layout.paths(2),
            Antipattern::GodClass,
            "toy",
        )
        .unwrap();
        assert_eq!(smells, vec!["Big".to_string()]);
    }

    #[test]
    fn test_unknown_system() {
        let architecture =
            Architecture::new(Antipattern::GodClass.input_size(), vec![], Activation::Relu);
        let result = detect_smells(
            &store(),
            &architecture,
            &[Path::new("model_0")],
            Antipattern::GodClass,
            "missing",
        );
        assert!(result.is_err());
    }
}
