//! Experiment Schema
//!
//! Data structures for A/B experiments. Every type serializes with serde so
//! a repository can store an experiment as a single document.
//!
//! ## Schema Overview
//!
//! ```text
//! Experiment (1) ──< Variant (N) ──< AssignedUser (N) ──< UserEvent (N)
//!      │                 │
//!      │                 └── Metrics (raw counters + derived rates)
//!      └── Results ── Significance, Summary, DailySnapshot (N)
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use trueno_ab::experiment::{Experiment, ExperimentStatus, ExperimentType, Variant};
//!
//! let experiment = Experiment::builder("exp-001", "Pricing page headline")
//!     .experiment_type(ExperimentType::Headline)
//!     .variant(Variant::control("original", "Original headline"))
//!     .variant(Variant::new("benefit", "Benefit-led headline"))
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(experiment.status(), ExperimentStatus::Draft);
//! assert_eq!(experiment.traffic_shares().unwrap(), vec![50.0, 50.0]);
//! ```

mod experiment_record;
mod metrics_record;
mod results_record;
mod variant_record;

pub use experiment_record::{
    ConfidenceLevel, Experiment, ExperimentBuilder, ExperimentConfig, ExperimentStatus,
    ExperimentType, Schedule,
};
pub use metrics_record::Metrics;
pub use results_record::{
    ConfidenceInterval, DailySnapshot, Results, Significance, Summary, VariantSnapshot,
};
pub use variant_record::{AssignedUser, EventKind, UserEvent, Variant, VariantBuilder};
