//! Directory of per-system JSON snapshots
//!
//! Layout: `<dir>/<system>.json`, each file a serialized [`SystemSnapshot`].
//! Files are read on every access; nothing is cached between calls.
//! [`MetricStore::snapshot`] reads a file once for all of its accessors.

use super::{MetricMap, MetricStore, SystemSnapshot};
use crate::dataset::{DataError, DataResult};
use crate::models::Antipattern;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Metric store reading snapshots from a directory
#[derive(Debug, Clone)]
pub struct JsonStore {
    dir: PathBuf,
}

impl JsonStore {
    /// Create a store rooted at `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of a system's snapshot file
    pub fn snapshot_path(&self, system: &str) -> PathBuf {
        self.dir.join(format!("{}.json", system))
    }

    /// Read and parse a system's snapshot
    pub fn load(&self, system: &str) -> DataResult<SystemSnapshot> {
        let path = self.snapshot_path(system);
        if !path.exists() {
            return Err(DataError::UnknownSystem(system.to_string()));
        }

        let content = std::fs::read_to_string(&path).map_err(|source| DataError::Io {
            path: path.clone(),
            source,
        })?;
        let snapshot = serde_json::from_str(&content)
            .map_err(|source| DataError::Snapshot { path: path.clone(), source })?;

        tracing::debug!("Loaded metric snapshot {}", path.display());
        Ok(snapshot)
    }

    /// Write a system's snapshot, creating the directory if needed
    pub fn save(&self, system: &str, snapshot: &SystemSnapshot) -> DataResult<PathBuf> {
        std::fs::create_dir_all(&self.dir).map_err(|source| DataError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let path = self.snapshot_path(system);
        let content = serde_json::to_string_pretty(snapshot)
            .map_err(|source| DataError::Snapshot { path: path.clone(), source })?;
        std::fs::write(&path, content).map_err(|source| DataError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }
}

impl MetricStore for JsonStore {
    fn snapshot(&self, system: &str) -> DataResult<SystemSnapshot> {
        self.load(system)
    }

    fn classes(&self, system: &str) -> DataResult<Vec<String>> {
        Ok(self.load(system)?.classes)
    }

    fn candidate_feature_envy(&self, system: &str) -> DataResult<Vec<String>> {
        Ok(self.load(system)?.candidate_feature_envy)
    }

    fn all_classes(&self, system: &str) -> DataResult<Vec<String>> {
        Ok(self.load(system)?.all_classes())
    }

    fn gc_decor_metrics(&self, system: &str) -> DataResult<MetricMap> {
        Ok(self.load(system)?.metrics.gc_decor)
    }

    fn gc_hist_metrics(&self, system: &str) -> DataResult<MetricMap> {
        Ok(self.load(system)?.metrics.gc_hist)
    }

    fn gc_jdeodorant_metrics(&self, system: &str) -> DataResult<MetricMap> {
        Ok(self.load(system)?.metrics.gc_jdeodorant)
    }

    fn fe_hist_metrics(&self, system: &str) -> DataResult<MetricMap> {
        Ok(self.load(system)?.metrics.fe_hist)
    }

    fn fe_in_code_metrics(&self, system: &str) -> DataResult<MetricMap> {
        Ok(self.load(system)?.metrics.fe_in_code)
    }

    fn fe_jdeodorant_metrics(&self, system: &str) -> DataResult<MetricMap> {
        Ok(self.load(system)?.metrics.fe_jdeodorant)
    }

    fn antipatterns(&self, antipattern: Antipattern, system: &str) -> DataResult<HashSet<String>> {
        let mut snapshot = self.load(system)?;
        Ok(std::mem::take(snapshot.antipatterns.get_mut(antipattern)))
    }

    fn history(&self, system: &str) -> DataResult<Vec<String>> {
        Ok(self.load(system)?.history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_then_read_accessors() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path());

        let mut snapshot = SystemSnapshot {
            classes: vec!["Foo".into(), "Bar".into()],
            history: vec!["abc".into()],
            ..Default::default()
        };
        snapshot.metrics.gc_hist.insert("Foo".into(), vec![0.5, 1.5]);
        snapshot
            .antipatterns
            .get_mut(Antipattern::GodClass)
            .insert("Foo".into());

        let path = store.save("demo", &snapshot).unwrap();
        assert!(path.ends_with("demo.json"));

        assert_eq!(store.classes("demo").unwrap(), vec!["Foo", "Bar"]);
        assert_eq!(store.gc_hist_metrics("demo").unwrap()["Foo"], vec![0.5, 1.5]);
        assert!(store.antipatterns(Antipattern::GodClass, "demo").unwrap().contains("Foo"));
        assert_eq!(store.history("demo").unwrap().len(), 1);

        let whole = store.snapshot("demo").unwrap();
        assert_eq!(whole.classes, snapshot.classes);
        assert_eq!(whole.metrics.gc_hist, snapshot.metrics.gc_hist);
    }

    #[test]
    fn test_missing_file_is_unknown_system() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path());
        assert!(matches!(store.classes("ghost"), Err(DataError::UnknownSystem(_))));
    }

    #[test]
    fn test_partial_snapshot_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("tiny.json"), r#"{"classes": ["X"]}"#).unwrap();
        let store = JsonStore::new(dir.path());
        assert_eq!(store.all_classes("tiny").unwrap(), vec!["X"]);
        assert!(store.fe_hist_metrics("tiny").unwrap().is_empty());
    }

    #[test]
    fn test_invalid_json_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bad.json"), "{ not json").unwrap();
        let store = JsonStore::new(dir.path());
        let err = store.classes("bad").unwrap_err();
        assert!(err.to_string().contains("bad.json"));
    }
}
