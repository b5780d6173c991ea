//! Experiment engine
//!
//! Stateless functions over [`Experiment`](crate::experiment::Experiment)
//! values. Nothing here touches a repository; callers load an experiment,
//! run one of these functions on it and save the result (see
//! [`crate::service::ExperimentService`]).
//!
//! | Module | Responsibility |
//! |---|---|
//! | [`assignment`] | bucket a user into exactly one variant |
//! | [`events`] | impressions, conversions (once per user), clicks, bounces |
//! | [`metrics`] | derive rates from raw counters |
//! | [`significance`] | two-proportion z-test, control vs treatment |
//! | [`lifecycle`] | state machine, completion readiness, completion |
//! | [`report`] | summary and daily snapshots |

pub mod assignment;
pub mod events;
pub mod lifecycle;
pub mod metrics;
pub mod report;
pub mod significance;
