//! Error types for Trueno-AB
//!
//! Toyota Way: Clear error messages with actionable guidance (Respect for People)

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Trueno-AB error types
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed experiment definition (no control, bad split, no variants)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Referenced experiment, variant or assigned user does not exist
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Kind of entity that was looked up ("experiment", "variant", "user")
        kind: &'static str,
        /// Identifier that was not found
        id: String,
    },

    /// Operation not allowed in the experiment's current status
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Lost update detected by the repository's conditional save
    #[error("Concurrency conflict on experiment {experiment_id}: expected version {expected}, found {found}\nRe-read the experiment and retry the operation")]
    ConcurrencyConflict {
        /// Experiment whose save was rejected
        experiment_id: String,
        /// Version the writer based its update on
        expected: u64,
        /// Version currently held by the repository
        found: u64,
    },

    /// JSON (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for a missing experiment.
    pub(crate) fn experiment_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "experiment",
            id: id.into(),
        }
    }

    /// Shorthand for a missing variant.
    pub(crate) fn variant_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "variant",
            id: id.into(),
        }
    }

    /// Shorthand for a user that was never assigned to the variant.
    pub(crate) fn user_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "assigned user",
            id: id.into(),
        }
    }
}
