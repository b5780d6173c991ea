//! In-memory experiment repository using `DashMap`.
//!
//! Data is lost on process restart. Useful for tests, demos and as the
//! reference implementation of the conditional-save contract.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::warn;

use super::{ExperimentFilter, ExperimentRepository};
use crate::experiment::Experiment;
use crate::{Error, Result};

/// In-memory experiment store backed by a lock-free concurrent hashmap.
///
/// `save` holds the shard lock for the key while comparing versions, so the
/// compare-and-set is atomic with respect to other writers.
pub struct MemoryExperimentStore {
    store: DashMap<String, Experiment>,
}

impl MemoryExperimentStore {
    /// Create a new in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            store: DashMap::new(),
        }
    }

    /// Create with pre-allocated capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            store: DashMap::with_capacity(capacity),
        }
    }

    /// Get the number of stored experiments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Check if the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Remove all experiments.
    pub fn clear(&self) {
        self.store.clear();
    }
}

impl Default for MemoryExperimentStore {
    fn default() -> Self {
        Self::new()
    }
}

fn conflict(experiment: &Experiment, found: u64) -> Error {
    warn!(
        experiment_id = %experiment.id(),
        expected = experiment.version(),
        found,
        "rejected stale experiment save"
    );
    Error::ConcurrencyConflict {
        experiment_id: experiment.id().to_string(),
        expected: experiment.version(),
        found,
    }
}

impl ExperimentRepository for MemoryExperimentStore {
    fn load(&self, experiment_id: &str) -> Result<Experiment> {
        self.store
            .get(experiment_id)
            .map(|e| e.value().clone())
            .ok_or_else(|| Error::experiment_not_found(experiment_id))
    }

    fn save(&self, experiment: &Experiment) -> Result<u64> {
        match self.store.entry(experiment.id().to_string()) {
            Entry::Occupied(mut slot) => {
                let found = slot.get().version();
                if found != experiment.version() {
                    return Err(conflict(experiment, found));
                }
                let mut stored = experiment.clone();
                stored.version = found + 1;
                slot.insert(stored);
                Ok(found + 1)
            }
            Entry::Vacant(slot) => {
                if experiment.version() != 0 {
                    return Err(conflict(experiment, 0));
                }
                let mut stored = experiment.clone();
                stored.version = 1;
                slot.insert(stored);
                Ok(1)
            }
        }
    }

    fn query(&self, filter: &ExperimentFilter) -> Result<Vec<Experiment>> {
        Ok(self
            .store
            .iter()
            .filter(|e| filter.matches(e.value()))
            .map(|e| e.value().clone())
            .collect())
    }
}
