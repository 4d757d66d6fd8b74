//! Feature assembly
//!
//! One row per entity: the antipattern's metric families concatenated in a
//! fixed order, z-score normalized over the system, followed by the two
//! normalized system constants. The scaler is fit on every call and never
//! stored.
//!
//! Each public function reads every system it touches once through
//! [`MetricStore::snapshot`] and assembles from that copy.

use super::constants::system_constants;
use super::scaler::StandardScaler;
use super::{check_parallel, DataError, DataResult};
use crate::models::{with_constants, Antipattern, SystemData, NEGATIVE, POSITIVE};
use crate::store::{InMemoryStore, MetricStore};
use nalgebra::DMatrix;
use std::collections::HashSet;

/// Normalized metric features of a system, constants excluded
pub fn features(
    store: &dyn MetricStore,
    antipattern: Antipattern,
    system: &str,
) -> DataResult<DMatrix<f64>> {
    let loaded = InMemoryStore::preload(store, &[system])?;
    loaded_features(&loaded, antipattern, system)
}

pub(crate) fn loaded_features(
    store: &InMemoryStore,
    antipattern: Antipattern,
    system: &str,
) -> DataResult<DMatrix<f64>> {
    let entities = store.entities(antipattern, system)?;
    let families = store.metric_families(antipattern, system)?;
    let width = antipattern.feature_count();

    let mut values = Vec::with_capacity(entities.len() * width);
    for entity in &entities {
        let start = values.len();
        for (family, metrics) in families.iter().enumerate() {
            let row = metrics.get(entity).ok_or_else(|| DataError::MissingMetrics {
                system: system.to_string(),
                entity: entity.clone(),
                family,
            })?;
            values.extend_from_slice(row);
        }
        let actual = values.len() - start;
        if actual != width {
            return Err(DataError::FeatureWidth {
                entity: entity.clone(),
                expected: width,
                actual,
            });
        }
    }

    let raw = DMatrix::from_row_slice(entities.len(), width, &values);
    Ok(StandardScaler::fit_transform(&raw))
}

/// Network inputs of a system: normalized features plus the system constants
pub fn instances(
    store: &dyn MetricStore,
    antipattern: Antipattern,
    system: &str,
) -> DataResult<DMatrix<f64>> {
    let loaded = InMemoryStore::preload(store, &[system])?;
    loaded_instances(&loaded, antipattern, system)
}

fn loaded_instances(
    store: &InMemoryStore,
    antipattern: Antipattern,
    system: &str,
) -> DataResult<DMatrix<f64>> {
    let features = loaded_features(store, antipattern, system)?;
    let constants = system_constants(store, system)?;
    Ok(with_constants(&features, &constants))
}

/// One-hot labels: `[1, 0]` for ground-truth occurrences, `[0, 1]` otherwise
pub fn labels(
    store: &dyn MetricStore,
    antipattern: Antipattern,
    system: &str,
) -> DataResult<DMatrix<f64>> {
    let loaded = InMemoryStore::preload(store, &[system])?;
    loaded_labels(&loaded, antipattern, system)
}

fn loaded_labels(
    store: &InMemoryStore,
    antipattern: Antipattern,
    system: &str,
) -> DataResult<DMatrix<f64>> {
    let entities = store.entities(antipattern, system)?;
    let truth = store.antipatterns(antipattern, system)?;
    Ok(DMatrix::from_fn(entities.len(), 2, |i, j| {
        if truth.contains(&entities[i]) {
            POSITIVE[j]
        } else {
            NEGATIVE[j]
        }
    }))
}

/// Single-column labels: 1 for ground-truth occurrences, 0 otherwise
pub fn scalar_labels(
    store: &dyn MetricStore,
    antipattern: Antipattern,
    system: &str,
) -> DataResult<DMatrix<f64>> {
    let loaded = InMemoryStore::preload(store, &[system])?;
    let entities = loaded.entities(antipattern, system)?;
    let truth = loaded.antipatterns(antipattern, system)?;
    Ok(indicator(&entities, &truth))
}

/// Features, constants and labels of one system
pub fn system_data(
    store: &dyn MetricStore,
    antipattern: Antipattern,
    system: &str,
) -> DataResult<SystemData> {
    let loaded = InMemoryStore::preload(store, &[system])?;
    let features = loaded_features(&loaded, antipattern, system)?;
    let constants = system_constants(&loaded, system)?;
    let labels = loaded_labels(&loaded, antipattern, system)?;
    check_parallel(features.nrows(), labels.nrows())?;

    Ok(SystemData {
        name: system.to_string(),
        features,
        constants,
        labels,
    })
}

/// Instances and one-hot labels of several systems, stacked row-wise
pub fn build_dataset<S: AsRef<str>>(
    store: &dyn MetricStore,
    antipattern: Antipattern,
    systems: &[S],
) -> DataResult<(DMatrix<f64>, DMatrix<f64>)> {
    let loaded = InMemoryStore::preload(store, systems)?;
    let mut xs = Vec::with_capacity(systems.len());
    let mut ys = Vec::with_capacity(systems.len());
    for system in systems {
        let x = loaded_instances(&loaded, antipattern, system.as_ref())?;
        let y = loaded_labels(&loaded, antipattern, system.as_ref())?;
        check_parallel(x.nrows(), y.nrows())?;
        xs.push(x);
        ys.push(y);
    }

    Ok((
        stack_rows(&xs, antipattern.input_size()),
        stack_rows(&ys, 2),
    ))
}

/// Predictions of another detection approach, as a single column.
///
/// `smells` holds the entity names the approach reported.
pub fn predict_from_detect(
    store: &dyn MetricStore,
    antipattern: Antipattern,
    system: &str,
    smells: &HashSet<String>,
) -> DataResult<DMatrix<f64>> {
    let entities = store.entities(antipattern, system)?;
    Ok(indicator(&entities, smells))
}

fn indicator(entities: &[String], members: &HashSet<String>) -> DMatrix<f64> {
    DMatrix::from_fn(entities.len(), 1, |i, _| {
        if members.contains(&entities[i]) {
            1.0
        } else {
            0.0
        }
    })
}

/// Concatenate matrices with `ncols` columns along the rows
pub(crate) fn stack_rows(parts: &[DMatrix<f64>], ncols: usize) -> DMatrix<f64> {
    let nrows = parts.iter().map(|m| m.nrows()).sum();
    let mut out = DMatrix::zeros(nrows, ncols);
    let mut offset = 0;
    for part in parts {
        out.rows_mut(offset, part.nrows()).copy_from(part);
        offset += part.nrows();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MetricMap, SystemSnapshot};
    use std::cell::Cell;

    fn god_class_system() -> SystemSnapshot {
        let classes = ["A", "B", "C", "D"];
        let mut snap = SystemSnapshot {
            classes: classes.iter().map(|c| c.to_string()).collect(),
            history: vec!["h".into(); 10],
            ..Default::default()
        };
        for (i, class) in classes.iter().enumerate() {
            let v = i as f64;
            snap.metrics.gc_decor.insert(class.to_string(), vec![v, 2.0 * v]);
            snap.metrics.gc_hist.insert(class.to_string(), vec![v * v, 1.0, 3.0 - v]);
            snap.metrics.gc_jdeodorant.insert(class.to_string(), vec![10.0 - v]);
        }
        for smell in ["A", "D"] {
            snap.antipatterns.get_mut(Antipattern::GodClass).insert(smell.into());
        }
        snap
    }

    fn store() -> InMemoryStore {
        InMemoryStore::new()
            .with_system("toy", god_class_system())
            .with_system("lucene", god_class_system())
    }

    #[test]
    fn test_instances_shape_and_constants() {
        let store = store();
        let x = instances(&store, Antipattern::GodClass, "lucene").unwrap();
        assert_eq!(x.nrows(), 4);
        assert_eq!(x.ncols(), 8);

        let constants = system_constants(&store, "lucene").unwrap();
        for i in 0..4 {
            assert_eq!(x[(i, 6)], constants[0]);
            assert_eq!(x[(i, 7)], constants[1]);
        }
    }

    #[test]
    fn test_features_are_standardized() {
        let store = store();
        let x = features(&store, Antipattern::GodClass, "toy").unwrap();
        // constant column (gc_hist[1]) maps to 0
        assert!(x.column(3).iter().all(|&v| v == 0.0));
        for j in [0, 1, 2, 4, 5] {
            assert!(x.column(j).sum().abs() < 1e-9);
        }
    }

    #[test]
    fn test_labels_one_hot_and_scalar() {
        let store = store();
        let y = labels(&store, Antipattern::GodClass, "toy").unwrap();
        assert_eq!(y.row(0).iter().copied().collect::<Vec<_>>(), POSITIVE.to_vec());
        assert_eq!(y.row(1).iter().copied().collect::<Vec<_>>(), NEGATIVE.to_vec());
        let s = scalar_labels(&store, Antipattern::GodClass, "toy").unwrap();
        assert_eq!(s.iter().copied().collect::<Vec<_>>(), vec![1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_missing_metrics_reported() {
        let mut snap = god_class_system();
        snap.metrics.gc_jdeodorant.remove("C");
        let store = InMemoryStore::new().with_system("broken", snap);
        let err = features(&store, Antipattern::GodClass, "broken").unwrap_err();
        assert!(matches!(err, DataError::MissingMetrics { family: 2, ref entity, .. } if entity == "C"));
    }

    #[test]
    fn test_wrong_width_reported() {
        let store = store();
        // The toy system only has God Class metrics
        let mut snap = god_class_system();
        snap.candidate_feature_envy = vec!["A".into()];
        snap.metrics.fe_hist.insert("A".into(), vec![1.0]);
        snap.metrics.fe_in_code.insert("A".into(), vec![1.0]);
        snap.metrics.fe_jdeodorant.insert("A".into(), vec![1.0]);
        let fe_store = InMemoryStore::new().with_system("fe", snap);
        assert!(matches!(
            features(&fe_store, Antipattern::FeatureEnvy, "fe"),
            Err(DataError::FeatureWidth { expected: 7, actual: 3, .. })
        ));
        assert!(features(&store, Antipattern::GodClass, "toy").is_ok());
    }

    #[test]
    fn test_build_dataset_stacks_systems() {
        let store = store();
        let (x, y) = build_dataset(&store, Antipattern::GodClass, &["toy", "lucene"]).unwrap();
        assert_eq!(x.shape(), (8, 8));
        assert_eq!(y.shape(), (8, 2));
        assert_eq!(y.column(0).sum(), 4.0);
    }

    #[test]
    fn test_predict_from_detect() {
        let store = store();
        let reported: HashSet<String> = ["B".to_string(), "D".to_string()].into_iter().collect();
        let p = predict_from_detect(&store, Antipattern::GodClass, "toy", &reported).unwrap();
        assert_eq!(p.iter().copied().collect::<Vec<_>>(), vec![0.0, 1.0, 0.0, 1.0]);
    }

    /// Counts whole-system reads and single-accessor reads
    #[derive(Default)]
    struct CountingStore {
        inner: InMemoryStore,
        snapshots: Cell<usize>,
        accessors: Cell<usize>,
    }

    impl CountingStore {
        fn read(&self) -> &InMemoryStore {
            self.accessors.set(self.accessors.get() + 1);
            &self.inner
        }
    }

    impl MetricStore for CountingStore {
        fn snapshot(&self, system: &str) -> DataResult<SystemSnapshot> {
            self.snapshots.set(self.snapshots.get() + 1);
            self.inner.snapshot(system)
        }
        fn classes(&self, system: &str) -> DataResult<Vec<String>> {
            self.read().classes(system)
        }
        fn candidate_feature_envy(&self, system: &str) -> DataResult<Vec<String>> {
            self.read().candidate_feature_envy(system)
        }
        fn all_classes(&self, system: &str) -> DataResult<Vec<String>> {
            self.read().all_classes(system)
        }
        fn gc_decor_metrics(&self, system: &str) -> DataResult<MetricMap> {
            self.read().gc_decor_metrics(system)
        }
        fn gc_hist_metrics(&self, system: &str) -> DataResult<MetricMap> {
            self.read().gc_hist_metrics(system)
        }
        fn gc_jdeodorant_metrics(&self, system: &str) -> DataResult<MetricMap> {
            self.read().gc_jdeodorant_metrics(system)
        }
        fn fe_hist_metrics(&self, system: &str) -> DataResult<MetricMap> {
            self.read().fe_hist_metrics(system)
        }
        fn fe_in_code_metrics(&self, system: &str) -> DataResult<MetricMap> {
            self.read().fe_in_code_metrics(system)
        }
        fn fe_jdeodorant_metrics(&self, system: &str) -> DataResult<MetricMap> {
            self.read().fe_jdeodorant_metrics(system)
        }
        fn antipatterns(&self, antipattern: Antipattern, system: &str) -> DataResult<HashSet<String>> {
            self.read().antipatterns(antipattern, system)
        }
        fn history(&self, system: &str) -> DataResult<Vec<String>> {
            self.read().history(system)
        }
    }

    #[test]
    fn test_each_system_is_read_once_per_call() {
        let counting = CountingStore {
            inner: store(),
            ..Default::default()
        };
        let data = system_data(&counting, Antipattern::GodClass, "toy").unwrap();
        assert_eq!(data.len(), 4);
        assert_eq!(counting.snapshots.get(), 1);

        build_dataset(&counting, Antipattern::GodClass, &["toy", "lucene", "toy"]).unwrap();
        assert_eq!(counting.snapshots.get(), 3);
        assert_eq!(counting.accessors.get(), 0);

        // same result as assembling straight from the store
        let direct = system_data(&store(), Antipattern::GodClass, "toy").unwrap();
        assert_eq!(data.inputs(), direct.inputs());
    }

    #[test]
    fn test_system_data_inputs() {
        let store = store();
        let data = system_data(&store, Antipattern::GodClass, "toy").unwrap();
        assert_eq!(data.len(), 4);
        assert_eq!(data.positives(), 2);
        assert_eq!(data.inputs().ncols(), 8);
    }
}
