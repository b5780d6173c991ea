//! Experiment service: the operations exposed to the surrounding system
//!
//! Each mutating call is a load → engine function → conditional save cycle
//! against the repository. Calls for the same experiment are serialized by
//! a per-experiment mutex so two in-process requests can never both see
//! "user not assigned" and double-assign; writers in other processes are
//! caught by the repository's version check and surface as
//! [`Error::ConcurrencyConflict`]. Nothing is retried internally.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use dashmap::DashMap;
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::engine::{assignment, events, lifecycle, report, significance};
use crate::experiment::{EventKind, Experiment, ExperimentStatus, Results};
use crate::store::{ExperimentFilter, ExperimentRepository};
use crate::{Error, Result};

/// Entry point for callers (HTTP handlers, schedulers).
///
/// # Example
///
/// ```rust
/// use trueno_ab::experiment::{EventKind, Experiment, Variant};
/// use trueno_ab::service::ExperimentService;
/// use trueno_ab::store::MemoryExperimentStore;
///
/// # fn example() -> trueno_ab::Result<()> {
/// let service = ExperimentService::new(MemoryExperimentStore::new());
/// service.create(
///     Experiment::builder("exp-1", "Hero headline")
///         .variant(Variant::control("a", "Original"))
///         .variant(Variant::new("b", "Question form"))
///         .build()?,
/// )?;
/// service.start("exp-1")?;
///
/// let variant = service.assign("exp-1", "visitor-42")?;
/// assert_eq!(service.assign("exp-1", "visitor-42")?, variant);
///
/// service.record_event("exp-1", &variant, "visitor-42", EventKind::Impression, None)?;
/// service.record_event("exp-1", &variant, "visitor-42", EventKind::Conversion, Some(19.0))?;
/// # Ok(())
/// # }
/// # example().unwrap();
/// ```
pub struct ExperimentService<R: ExperimentRepository> {
    repository: R,
    config: EngineConfig,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl<R: ExperimentRepository> ExperimentService<R> {
    /// Create a service with the default engine configuration.
    #[must_use]
    pub fn new(repository: R) -> Self {
        Self::with_config(repository, EngineConfig::default())
    }

    /// Create a service with a custom engine configuration.
    #[must_use]
    pub fn with_config(repository: R, config: EngineConfig) -> Self {
        Self {
            repository,
            config,
            locks: DashMap::new(),
        }
    }

    /// The underlying repository.
    #[must_use]
    pub const fn repository(&self) -> &R {
        &self.repository
    }

    /// The engine configuration.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn lock_for(&self, experiment_id: &str) -> Arc<Mutex<()>> {
        Arc::clone(self.locks.entry(experiment_id.to_string()).or_default().value())
    }

    /// Drop the lock entry once no caller holds or waits on it.
    fn release(&self, experiment_id: &str, lock: Arc<Mutex<()>>) {
        drop(lock);
        self.locks
            .remove_if(experiment_id, |_, lock| Arc::strong_count(lock) == 1);
    }

    /// Load, apply `f`, save under the experiment's lock. Nothing is saved
    /// if `f` fails.
    fn mutate<T>(
        &self,
        experiment_id: &str,
        f: impl FnOnce(&mut Experiment) -> Result<T>,
    ) -> Result<T> {
        let lock = self.lock_for(experiment_id);
        let result = {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            self.load_apply_save(experiment_id, f)
        };
        self.release(experiment_id, lock);
        result
    }

    fn load_apply_save<T>(
        &self,
        experiment_id: &str,
        f: impl FnOnce(&mut Experiment) -> Result<T>,
    ) -> Result<T> {
        let mut experiment = self.repository.load(experiment_id)?;
        let out = f(&mut experiment)?;
        let version = self.repository.save(&experiment)?;
        debug!(experiment_id, version, "experiment saved");
        Ok(out)
    }

    /// Store a new experiment definition.
    ///
    /// # Errors
    ///
    /// [`Error::Validation`] for a malformed definition,
    /// [`Error::InvalidState`] if it is not a fresh draft, and
    /// [`Error::ConcurrencyConflict`] if the ID is already taken.
    pub fn create(&self, mut experiment: Experiment) -> Result<Experiment> {
        experiment.validate()?;
        if experiment.status() != ExperimentStatus::Draft || experiment.version() != 0 {
            return Err(Error::InvalidState(format!(
                "experiment {} must be a new draft to be created",
                experiment.id()
            )));
        }
        experiment.version = self.repository.save(&experiment)?;
        info!(experiment_id = %experiment.id(), "experiment created");
        Ok(experiment)
    }

    /// Load an experiment.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] if it does not exist.
    pub fn get(&self, experiment_id: &str) -> Result<Experiment> {
        self.repository.load(experiment_id)
    }

    /// Start a draft or paused experiment.
    ///
    /// # Errors
    ///
    /// See [`lifecycle::start`].
    pub fn start(&self, experiment_id: &str) -> Result<()> {
        self.mutate(experiment_id, |e| lifecycle::start(e, Utc::now()))
    }

    /// Pause a running experiment.
    ///
    /// # Errors
    ///
    /// See [`lifecycle::pause`].
    pub fn pause(&self, experiment_id: &str) -> Result<()> {
        self.mutate(experiment_id, |e| lifecycle::pause(e, Utc::now()))
    }

    /// Resume a paused experiment.
    ///
    /// # Errors
    ///
    /// See [`lifecycle::resume`].
    pub fn resume(&self, experiment_id: &str) -> Result<()> {
        self.mutate(experiment_id, |e| lifecycle::resume(e, Utc::now()))
    }

    /// Archive an experiment.
    ///
    /// # Errors
    ///
    /// See [`lifecycle::archive`].
    pub fn archive(&self, experiment_id: &str) -> Result<()> {
        self.mutate(experiment_id, lifecycle::archive)
    }

    /// Bucket `user_id` into a variant and return its ID.
    ///
    /// A user who is already assigned gets the same variant back whatever
    /// the experiment's status; new assignments require a running experiment.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`], [`Error::Validation`], [`Error::InvalidState`]
    /// for a new user on a non-running experiment, or
    /// [`Error::ConcurrencyConflict`].
    pub fn assign(&self, experiment_id: &str, user_id: &str) -> Result<String> {
        let current = self.repository.load(experiment_id)?;
        if let Some(variant) = current.find_assignment(user_id) {
            return Ok(variant.id().to_string());
        }

        self.mutate(experiment_id, |e| {
            if e.find_assignment(user_id).is_none() && e.status() != ExperimentStatus::Running {
                return Err(Error::InvalidState(format!(
                    "experiment {} is {:?}; new users can only be assigned while running",
                    e.id(),
                    e.status()
                )));
            }
            assignment::assign(e, user_id, Utc::now()).map(|a| a.variant_id)
        })
    }

    /// Record an interaction of an assigned user.
    ///
    /// Accepted while the experiment is running or paused. A repeat
    /// conversion for the same user is accepted and ignored.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] for an unknown experiment, variant or user,
    /// [`Error::Validation`] for bad revenue, [`Error::InvalidState`] for
    /// draft, completed or archived experiments, or
    /// [`Error::ConcurrencyConflict`].
    pub fn record_event(
        &self,
        experiment_id: &str,
        variant_id: &str,
        user_id: &str,
        kind: EventKind,
        revenue: Option<f64>,
    ) -> Result<()> {
        let max_events = self.config.max_events_per_user;
        self.mutate(experiment_id, |e| {
            if !matches!(e.status(), ExperimentStatus::Running | ExperimentStatus::Paused) {
                return Err(Error::InvalidState(format!(
                    "cannot record events on experiment {} in status {:?}",
                    e.id(),
                    e.status()
                )));
            }
            events::record_event(e, variant_id, user_id, kind, revenue, Utc::now(), max_events)
        })
    }

    /// Results of an experiment.
    ///
    /// For a completed experiment these are the frozen results. Otherwise a
    /// provisional view is computed from the current counters: summary and
    /// significance, never a winner.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] if the experiment does not exist.
    pub fn get_results(&self, experiment_id: &str) -> Result<Results> {
        let experiment = self.repository.load(experiment_id)?;
        if experiment.status() == ExperimentStatus::Completed
            || experiment.results().summary().is_some()
        {
            return Ok(experiment.results().clone());
        }
        Ok(Results {
            significance: significance::analyze_experiment(&experiment, &self.config),
            summary: Some(report::summary(&experiment, Utc::now())),
            ..Results::default()
        })
    }

    /// Running experiments that have not reached their end date.
    ///
    /// # Errors
    ///
    /// Propagates repository failures.
    pub fn list_active(&self) -> Result<Vec<Experiment>> {
        let now = Utc::now();
        Ok(self
            .repository
            .query(&ExperimentFilter::with_status(ExperimentStatus::Running))?
            .into_iter()
            .filter(|e| lifecycle::is_active(e, now))
            .collect())
    }

    /// Running experiments a scheduler should complete now.
    ///
    /// # Errors
    ///
    /// Propagates repository failures.
    pub fn list_ready_for_completion(&self) -> Result<Vec<Experiment>> {
        let now = Utc::now();
        Ok(self
            .repository
            .query(&ExperimentFilter::with_status(ExperimentStatus::Running))?
            .into_iter()
            .filter(|e| lifecycle::is_ready_for_completion(e, now))
            .collect())
    }

    /// Complete a running experiment and return its frozen results.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidState`] if the experiment is not running (including a
    /// second completion), [`Error::NotFound`], or
    /// [`Error::ConcurrencyConflict`].
    pub fn complete(&self, experiment_id: &str) -> Result<Results> {
        let config = &self.config;
        self.mutate(experiment_id, |e| lifecycle::complete(e, Utc::now(), config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::experiment::Variant;
    use crate::store::MemoryExperimentStore;

    fn service() -> ExperimentService<MemoryExperimentStore> {
        let service = ExperimentService::new(MemoryExperimentStore::new());
        service
            .create(
                Experiment::builder("exp-1", "Apply button")
                    .variant(Variant::control("a", "Apply now"))
                    .variant(Variant::new("b", "Check eligibility"))
                    .build()
                    .unwrap(),
            )
            .unwrap();
        service
    }

    #[test]
    fn test_create_sets_version() {
        let service = ExperimentService::new(MemoryExperimentStore::new());
        let created = service
            .create(
                Experiment::builder("exp-1", "X")
                    .variant(Variant::control("a", "A"))
                    .build()
                    .unwrap(),
            )
            .unwrap();
        assert_eq!(created.version(), 1);
    }

    #[test]
    fn test_assign_requires_running() {
        let service = service();
        assert!(matches!(service.assign("exp-1", "u1"), Err(Error::InvalidState(_))));

        service.start("exp-1").unwrap();
        let variant = service.assign("exp-1", "u1").unwrap();

        // sticky after pausing
        service.pause("exp-1").unwrap();
        assert_eq!(service.assign("exp-1", "u1").unwrap(), variant);
        assert!(matches!(service.assign("exp-1", "u2"), Err(Error::InvalidState(_))));
    }

    #[test]
    fn test_failed_mutation_is_not_saved() {
        let service = service();
        let before = service.get("exp-1").unwrap().version();
        assert!(service.resume("exp-1").is_err());
        assert_eq!(service.get("exp-1").unwrap().version(), before);
    }

    #[test]
    fn test_record_event_rejects_draft() {
        let service = service();
        let result = service.record_event("exp-1", "a", "u1", EventKind::Impression, None);
        assert!(matches!(result, Err(Error::InvalidState(_))));
    }

    #[test]
    fn test_unknown_experiment() {
        let service = service();
        assert!(matches!(service.assign("nope", "u1"), Err(Error::NotFound { .. })));
        assert!(matches!(service.complete("nope"), Err(Error::NotFound { .. })));
    }

    #[test]
    fn test_lock_map_does_not_grow_for_unknown_ids() {
        let service = service();
        for i in 0..1000 {
            let missing = format!("missing-{i}");
            assert!(matches!(service.complete(&missing), Err(Error::NotFound { .. })));
            let ghost = format!("ghost-{i}");
            let result = service.record_event(&ghost, "a", "u1", EventKind::Impression, None);
            assert!(matches!(result, Err(Error::NotFound { .. })));
        }
        assert_eq!(service.locks.len(), 0);
    }

    #[test]
    fn test_lock_released_after_mutation() {
        let service = service();
        service.start("exp-1").unwrap();
        let variant = service.assign("exp-1", "u1").unwrap();
        service
            .record_event("exp-1", &variant, "u1", EventKind::Impression, None)
            .unwrap();
        assert!(service.pause("exp-1").is_ok());
        assert!(service.pause("exp-1").is_err());
        assert_eq!(service.locks.len(), 0);
    }

    #[test]
    fn test_provisional_results_have_no_winner() {
        let service = service();
        service.start("exp-1").unwrap();
        let results = service.get_results("exp-1").unwrap();
        assert!(results.winner().is_none());
        assert!(results.significance().is_none());
        assert_eq!(results.summary().unwrap().total_impressions, 0);
    }

    #[test]
    fn test_concurrent_assignment_is_a_partition() {
        use std::sync::Arc;

        let service = Arc::new(service());
        service.start("exp-1").unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let service = Arc::clone(&service);
                std::thread::spawn(move || {
                    (0..25)
                        .map(|i| service.assign("exp-1", &format!("user-{i}")).unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        let per_thread: Vec<Vec<String>> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        // every thread saw the same variant for each user
        for assignments in &per_thread[1..] {
            assert_eq!(assignments, &per_thread[0]);
        }
        let experiment = service.get("exp-1").unwrap();
        let records: usize = experiment.variants().iter().map(|v| v.assigned_users().len()).sum();
        assert_eq!(records, 25);
        assert_eq!(service.locks.len(), 0);
    }
}
