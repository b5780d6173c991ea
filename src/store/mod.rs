//! Experiment persistence interface
//!
//! The engine never talks to a datastore directly; it goes through
//! [`ExperimentRepository`]. Saves are conditional on
//! [`Experiment::version`]: an update based on a stale copy is rejected
//! with [`crate::Error::ConcurrencyConflict`] instead of silently
//! overwriting a concurrent writer.
//!
//! # Example
//!
//! ```rust
//! use trueno_ab::experiment::{Experiment, Variant};
//! use trueno_ab::store::{ExperimentRepository, MemoryExperimentStore};
//!
//! # fn example() -> trueno_ab::Result<()> {
//! let store = MemoryExperimentStore::new();
//! let experiment = Experiment::builder("exp-1", "CTA copy")
//!     .variant(Variant::control("a", "Sign up"))
//!     .variant(Variant::new("b", "Get started"))
//!     .build()?;
//!
//! assert_eq!(store.save(&experiment)?, 1);
//! let loaded = store.load("exp-1")?;
//! assert_eq!(loaded.version(), 1);
//!
//! // saving the stale copy again is a lost update
//! assert!(store.save(&experiment).is_err());
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

mod memory;

pub use memory::MemoryExperimentStore;

use crate::experiment::{Experiment, ExperimentStatus, ExperimentType};
use crate::Result;

/// Query over stored experiments. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExperimentFilter {
    /// Match this status only
    pub status: Option<ExperimentStatus>,
    /// Match this type only
    pub experiment_type: Option<ExperimentType>,
    /// Match this target page only
    pub target_page: Option<String>,
}

impl ExperimentFilter {
    /// Filter that matches every experiment.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Filter on status.
    #[must_use]
    pub fn with_status(status: ExperimentStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Additionally filter on experiment type.
    #[must_use]
    pub fn experiment_type(mut self, experiment_type: ExperimentType) -> Self {
        self.experiment_type = Some(experiment_type);
        self
    }

    /// Additionally filter on target page.
    #[must_use]
    pub fn target_page(mut self, page: impl Into<String>) -> Self {
        self.target_page = Some(page.into());
        self
    }

    /// Whether `experiment` satisfies the filter.
    #[must_use]
    pub fn matches(&self, experiment: &Experiment) -> bool {
        self.status.map_or(true, |s| experiment.status() == s)
            && self
                .experiment_type
                .map_or(true, |t| experiment.experiment_type() == t)
            && self
                .target_page
                .as_deref()
                .map_or(true, |p| experiment.config().target_page == p)
    }
}

/// Persistence collaborator for experiment documents.
pub trait ExperimentRepository: Send + Sync {
    /// Load an experiment by ID.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::NotFound`] if no such experiment exists.
    fn load(&self, experiment_id: &str) -> Result<Experiment>;

    /// Store an experiment if the stored version still equals
    /// `experiment.version()` (version 0 means "not stored yet").
    ///
    /// Returns the new version.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ConcurrencyConflict`] on a version mismatch.
    fn save(&self, experiment: &Experiment) -> Result<u64>;

    /// All experiments matching `filter`, in no particular order.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store fails.
    fn query(&self, filter: &ExperimentFilter) -> Result<Vec<Experiment>>;
}
