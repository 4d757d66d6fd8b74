//! Metric store contract
//!
//! The metrics themselves (DECOR, history, in-code and JDeodorant metrics,
//! ground-truth occurrences, commit history) are produced by external
//! extraction tooling. This module defines what the pipeline needs from that
//! tooling and provides two stores:
//!
//! - [`InMemoryStore`] for tests and programmatic use
//! - [`JsonStore`] reading one `<system>.json` snapshot per system

mod json_store;

pub use json_store::JsonStore;

use crate::dataset::{DataError, DataResult};
use crate::models::Antipattern;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Entity identifier -> metric vector
pub type MetricMap = HashMap<String, Vec<f64>>;

/// Accessors consumed by the feature assembler and the system constants.
pub trait MetricStore {
    /// Classes of the system (God Class entities)
    fn classes(&self, system: &str) -> DataResult<Vec<String>>;

    /// Candidate (method, envied class) pairs (Feature Envy entities)
    fn candidate_feature_envy(&self, system: &str) -> DataResult<Vec<String>>;

    /// Every class of the system, used to measure its size
    fn all_classes(&self, system: &str) -> DataResult<Vec<String>>;

    fn gc_decor_metrics(&self, system: &str) -> DataResult<MetricMap>;
    fn gc_hist_metrics(&self, system: &str) -> DataResult<MetricMap>;
    fn gc_jdeodorant_metrics(&self, system: &str) -> DataResult<MetricMap>;
    fn fe_hist_metrics(&self, system: &str) -> DataResult<MetricMap>;
    fn fe_in_code_metrics(&self, system: &str) -> DataResult<MetricMap>;
    fn fe_jdeodorant_metrics(&self, system: &str) -> DataResult<MetricMap>;

    /// Ground-truth occurrences of `antipattern` in the system
    fn antipatterns(&self, antipattern: Antipattern, system: &str) -> DataResult<HashSet<String>>;

    /// Commit identifiers of the system's history
    fn history(&self, system: &str) -> DataResult<Vec<String>>;

    /// Entities an antipattern is detected on
    fn entities(&self, antipattern: Antipattern, system: &str) -> DataResult<Vec<String>> {
        match antipattern {
            Antipattern::GodClass => self.classes(system),
            Antipattern::FeatureEnvy => self.candidate_feature_envy(system),
        }
    }

    /// Everything known about a system, read in one go.
    ///
    /// Assembly reads each system through this once per call. Stores that
    /// can fetch a whole system at once override it.
    fn snapshot(&self, system: &str) -> DataResult<SystemSnapshot> {
        let mut antipatterns = Occurrences::default();
        for antipattern in [Antipattern::GodClass, Antipattern::FeatureEnvy] {
            *antipatterns.get_mut(antipattern) = self.antipatterns(antipattern, system)?;
        }
        Ok(SystemSnapshot {
            classes: self.classes(system)?,
            candidate_feature_envy: self.candidate_feature_envy(system)?,
            all_classes: self.all_classes(system)?,
            metrics: MetricFamilies {
                gc_decor: self.gc_decor_metrics(system)?,
                gc_hist: self.gc_hist_metrics(system)?,
                gc_jdeodorant: self.gc_jdeodorant_metrics(system)?,
                fe_hist: self.fe_hist_metrics(system)?,
                fe_in_code: self.fe_in_code_metrics(system)?,
                fe_jdeodorant: self.fe_jdeodorant_metrics(system)?,
            },
            antipatterns,
            history: self.history(system)?,
        })
    }

    /// The three metric families of an antipattern, in feature order
    fn metric_families(&self, antipattern: Antipattern, system: &str) -> DataResult<Vec<MetricMap>> {
        Ok(match antipattern {
            Antipattern::GodClass => vec![
                self.gc_decor_metrics(system)?,
                self.gc_hist_metrics(system)?,
                self.gc_jdeodorant_metrics(system)?,
            ],
            Antipattern::FeatureEnvy => vec![
                self.fe_hist_metrics(system)?,
                self.fe_in_code_metrics(system)?,
                self.fe_jdeodorant_metrics(system)?,
            ],
        })
    }
}

/// Metric families of one system
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricFamilies {
    #[serde(default)]
    pub gc_decor: MetricMap,
    #[serde(default)]
    pub gc_hist: MetricMap,
    #[serde(default)]
    pub gc_jdeodorant: MetricMap,
    #[serde(default)]
    pub fe_hist: MetricMap,
    #[serde(default)]
    pub fe_in_code: MetricMap,
    #[serde(default)]
    pub fe_jdeodorant: MetricMap,
}

/// Ground-truth occurrences per antipattern
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Occurrences {
    #[serde(default)]
    pub god_class: HashSet<String>,
    #[serde(default)]
    pub feature_envy: HashSet<String>,
}

impl Occurrences {
    pub fn get(&self, antipattern: Antipattern) -> &HashSet<String> {
        match antipattern {
            Antipattern::GodClass => &self.god_class,
            Antipattern::FeatureEnvy => &self.feature_envy,
        }
    }

    pub fn get_mut(&mut self, antipattern: Antipattern) -> &mut HashSet<String> {
        match antipattern {
            Antipattern::GodClass => &mut self.god_class,
            Antipattern::FeatureEnvy => &mut self.feature_envy,
        }
    }
}

/// Everything the store knows about one system
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemSnapshot {
    #[serde(default)]
    pub classes: Vec<String>,
    #[serde(default)]
    pub candidate_feature_envy: Vec<String>,
    /// Falls back to `classes` when empty
    #[serde(default)]
    pub all_classes: Vec<String>,
    #[serde(default)]
    pub metrics: MetricFamilies,
    #[serde(default)]
    pub antipatterns: Occurrences,
    #[serde(default)]
    pub history: Vec<String>,
}

impl SystemSnapshot {
    fn all_classes(&self) -> Vec<String> {
        if self.all_classes.is_empty() {
            self.classes.clone()
        } else {
            self.all_classes.clone()
        }
    }
}

/// Store backed by snapshots held in memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    systems: HashMap<String, SystemSnapshot>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a system
    pub fn insert(&mut self, system: impl Into<String>, snapshot: SystemSnapshot) {
        self.systems.insert(system.into(), snapshot);
    }

    /// Builder-style [`insert`](Self::insert)
    pub fn with_system(mut self, system: impl Into<String>, snapshot: SystemSnapshot) -> Self {
        self.insert(system, snapshot);
        self
    }

    /// Snapshot each of `systems` from `store`, reading every system once
    pub fn preload<S: AsRef<str>>(store: &dyn MetricStore, systems: &[S]) -> DataResult<Self> {
        let mut loaded = Self::new();
        for system in systems {
            let system = system.as_ref();
            if !loaded.systems.contains_key(system) {
                loaded.insert(system, store.snapshot(system)?);
            }
        }
        Ok(loaded)
    }

    pub fn systems(&self) -> impl Iterator<Item = &str> {
        self.systems.keys().map(String::as_str)
    }

    fn get(&self, system: &str) -> DataResult<&SystemSnapshot> {
        self.systems
            .get(system)
            .ok_or_else(|| DataError::UnknownSystem(system.to_string()))
    }
}

impl MetricStore for InMemoryStore {
    fn snapshot(&self, system: &str) -> DataResult<SystemSnapshot> {
        self.get(system).cloned()
    }

    fn classes(&self, system: &str) -> DataResult<Vec<String>> {
        Ok(self.get(system)?.classes.clone())
    }

    fn candidate_feature_envy(&self, system: &str) -> DataResult<Vec<String>> {
        Ok(self.get(system)?.candidate_feature_envy.clone())
    }

    fn all_classes(&self, system: &str) -> DataResult<Vec<String>> {
        Ok(self.get(system)?.all_classes())
    }

    fn gc_decor_metrics(&self, system: &str) -> DataResult<MetricMap> {
        Ok(self.get(system)?.metrics.gc_decor.clone())
    }

    fn gc_hist_metrics(&self, system: &str) -> DataResult<MetricMap> {
        Ok(self.get(system)?.metrics.gc_hist.clone())
    }

    fn gc_jdeodorant_metrics(&self, system: &str) -> DataResult<MetricMap> {
        Ok(self.get(system)?.metrics.gc_jdeodorant.clone())
    }

    fn fe_hist_metrics(&self, system: &str) -> DataResult<MetricMap> {
        Ok(self.get(system)?.metrics.fe_hist.clone())
    }

    fn fe_in_code_metrics(&self, system: &str) -> DataResult<MetricMap> {
        Ok(self.get(system)?.metrics.fe_in_code.clone())
    }

    fn fe_jdeodorant_metrics(&self, system: &str) -> DataResult<MetricMap> {
        Ok(self.get(system)?.metrics.fe_jdeodorant.clone())
    }

    fn antipatterns(&self, antipattern: Antipattern, system: &str) -> DataResult<HashSet<String>> {
        Ok(self.get(system)?.antipatterns.get(antipattern).clone())
    }

    fn history(&self, system: &str) -> DataResult<Vec<String>> {
        Ok(self.get(system)?.history.clone())
    }
}
