//! # Trueno-AB: Experiment (A/B Test) Engine
//!
//! **Version**: 0.1.0
//!
//! Trueno-AB buckets visitors into experiment variants, accounts for their
//! impressions and conversions, and decides with a two-proportion z-test
//! whether a treatment beats the control.
//!
//! ## Design Principles (Toyota Way Aligned)
//!
//! - **Poka-Yoke safety**: derived metrics cannot drift from their counters;
//!   conversions count once per user; saves are version-checked
//! - **Jidoka**: malformed experiments stop at validation, not at analysis
//! - **Genchi Genbutsu**: "insufficient data" is reported as such, never as
//!   "no effect"
//!
//! ## Layout
//!
//! - [`experiment`]: serde data model (experiments, variants, metrics, results)
//! - [`engine`]: pure functions over that model (assignment, events,
//!   metrics, significance, lifecycle, reports)
//! - [`store`]: repository interface and an in-memory implementation
//! - [`service`]: the operations exposed to callers
//!
//! ## Example Usage
//!
//! ```rust
//! use trueno_ab::experiment::{Experiment, ExperimentType, Variant};
//! use trueno_ab::service::ExperimentService;
//! use trueno_ab::store::MemoryExperimentStore;
//!
//! let service = ExperimentService::new(MemoryExperimentStore::new());
//! service.create(
//!     Experiment::builder("exp-001", "Checkout CTA")
//!         .experiment_type(ExperimentType::Cta)
//!         .variant(Variant::control("buy", "Buy now"))
//!         .variant(Variant::new("start", "Start learning"))
//!         .build()?,
//! )?;
//! service.start("exp-001")?;
//!
//! let variant = service.assign("exp-001", "session-1")?;
//! println!("session-1 sees {variant}");
//! # Ok::<(), trueno_ab::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod config;
pub mod engine;
pub mod error;
pub mod experiment;
pub mod service;
pub mod store;

pub use config::EngineConfig;
pub use error::{Error, Result};
pub use service::ExperimentService;
