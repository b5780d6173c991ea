//! Lifecycle controller: experiment state machine and completion
//!
//! ```text
//! draft ──start──> running ──pause──> paused
//!                     ^                  │
//!                     └──────resume──────┘
//! running ──complete──> completed ──archive──> archived
//! draft | running | paused ──archive──> archived
//! ```

use chrono::{DateTime, Utc};
use tracing::info;

use super::{report, significance};
use crate::config::EngineConfig;
use crate::experiment::{Experiment, ExperimentStatus, Results};
use crate::{Error, Result};

fn invalid(experiment: &Experiment, action: &str) -> Error {
    Error::InvalidState(format!(
        "cannot {action} experiment {} in status {:?}",
        experiment.id, experiment.status
    ))
}

/// Start (or restart) an experiment. Requires `Draft` or `Paused`.
///
/// `started_at` is only recorded the first time; a restart from `Paused`
/// records `resumed_at`.
///
/// # Errors
///
/// Returns [`Error::InvalidState`] from any other status and
/// [`Error::Validation`] if the definition is malformed.
pub fn start(experiment: &mut Experiment, now: DateTime<Utc>) -> Result<()> {
    if !matches!(experiment.status, ExperimentStatus::Draft | ExperimentStatus::Paused) {
        return Err(invalid(experiment, "start"));
    }
    experiment.validate()?;
    if experiment.status == ExperimentStatus::Paused {
        experiment.schedule.resumed_at = Some(now);
    }
    experiment.status = ExperimentStatus::Running;
    experiment.schedule.started_at.get_or_insert(now);
    info!(experiment_id = %experiment.id, "experiment started");
    Ok(())
}

/// Pause a running experiment.
///
/// # Errors
///
/// Returns [`Error::InvalidState`] unless the experiment is `Running`.
pub fn pause(experiment: &mut Experiment, now: DateTime<Utc>) -> Result<()> {
    if experiment.status != ExperimentStatus::Running {
        return Err(invalid(experiment, "pause"));
    }
    experiment.status = ExperimentStatus::Paused;
    experiment.schedule.paused_at = Some(now);
    info!(experiment_id = %experiment.id, "experiment paused");
    Ok(())
}

/// Resume a paused experiment.
///
/// `paused_at` keeps the most recent pause; `resumed_at` is set to `now`.
///
/// # Errors
///
/// Returns [`Error::InvalidState`] unless the experiment is `Paused`.
pub fn resume(experiment: &mut Experiment, now: DateTime<Utc>) -> Result<()> {
    if experiment.status != ExperimentStatus::Paused {
        return Err(invalid(experiment, "resume"));
    }
    experiment.status = ExperimentStatus::Running;
    experiment.schedule.resumed_at = Some(now);
    info!(experiment_id = %experiment.id, "experiment resumed");
    Ok(())
}

/// Retire an experiment. Allowed from every status except `Archived`.
///
/// # Errors
///
/// Returns [`Error::InvalidState`] if the experiment is already archived.
pub fn archive(experiment: &mut Experiment) -> Result<()> {
    if experiment.status == ExperimentStatus::Archived {
        return Err(invalid(experiment, "archive"));
    }
    experiment.status = ExperimentStatus::Archived;
    info!(experiment_id = %experiment.id, "experiment archived");
    Ok(())
}

/// Running and not yet past its end date.
#[must_use]
pub fn is_active(experiment: &Experiment, now: DateTime<Utc>) -> bool {
    experiment.status == ExperimentStatus::Running
        && experiment.end_date().map_or(true, |end| now < end)
}

/// Whether a scheduler should complete the experiment now.
///
/// True for a running experiment whose end date has passed, or that has run
/// for `min_duration_days` and collected `min_sample_size` impressions per
/// variant in total.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn is_ready_for_completion(experiment: &Experiment, now: DateTime<Utc>) -> bool {
    if experiment.status != ExperimentStatus::Running {
        return false;
    }
    if experiment.end_date().is_some_and(|end| now >= end) {
        return true;
    }
    let config = &experiment.config;
    let required = config
        .min_sample_size
        .saturating_mul(experiment.variants.len() as u64);
    experiment.elapsed_days(now) >= i64::from(config.min_duration_days)
        && experiment.total_impressions() >= required
}

/// Complete a running experiment and freeze its results.
///
/// Runs the significance test; when it is significant the variant with the
/// higher conversion rate is declared winner. The summary is always filled.
///
/// # Errors
///
/// Returns [`Error::InvalidState`] unless the experiment is `Running`; a
/// completed experiment's results are left untouched.
pub fn complete(
    experiment: &mut Experiment,
    now: DateTime<Utc>,
    config: &EngineConfig,
) -> Result<Results> {
    if experiment.status != ExperimentStatus::Running {
        return Err(invalid(experiment, "complete"));
    }

    let significance = significance::analyze_experiment(experiment, config);
    let winner = significance
        .as_ref()
        .filter(|s| s.is_significant)
        .and_then(|_| {
            let control = experiment.control()?;
            let treatment = experiment.treatment()?;
            let best = if treatment.metrics().conversion_rate() > control.metrics().conversion_rate() {
                treatment
            } else {
                control
            };
            Some(best.id().to_string())
        });

    experiment.schedule.completed_at = Some(now);
    let results = Results {
        winner_declared_at: winner.as_ref().map(|_| now),
        winner,
        significance,
        summary: Some(report::summary(experiment, now)),
        daily_snapshots: if config.collect_daily_snapshots {
            report::daily_snapshots(experiment)
        } else {
            Vec::new()
        },
    };

    experiment.results = results.clone();
    experiment.status = ExperimentStatus::Completed;
    info!(
        experiment_id = %experiment.id,
        winner = results.winner().unwrap_or("none"),
        "experiment completed"
    );
    Ok(results)
}
