//! Assignment engine: buckets users into variants

use chrono::{DateTime, Utc};
use rand::Rng;
use tracing::debug;

use crate::experiment::{AssignedUser, Experiment};
use crate::{Error, Result};

/// Outcome of an assignment request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    /// Variant the user is bucketed into
    pub variant_id: String,
    /// `false` when the user was already assigned and nothing changed
    pub is_new: bool,
}

/// Index of the first variant whose cumulative share reaches `roll`.
///
/// Returns `None` if rounding leaves the cumulative total short of `roll`.
#[must_use]
pub fn pick_variant(shares: &[f64], roll: f64) -> Option<usize> {
    let mut cumulative = 0.0;
    for (index, share) in shares.iter().enumerate() {
        cumulative += share;
        if cumulative >= roll {
            return Some(index);
        }
    }
    None
}

/// Assign `user_id` using the thread-local RNG.
///
/// # Errors
///
/// Returns [`Error::Validation`] if the experiment definition is malformed.
pub fn assign(experiment: &mut Experiment, user_id: &str, now: DateTime<Utc>) -> Result<Assignment> {
    assign_with(experiment, user_id, now, &mut rand::thread_rng())
}

/// Assign `user_id` to a variant, drawing from `rng`.
///
/// Idempotent: a user already bucketed anywhere in the experiment keeps
/// their variant and no record is appended. Otherwise a roll in `[0, 100)`
/// is walked against the cumulative traffic shares; a roll past the
/// cumulative total falls back to the control.
///
/// # Errors
///
/// Returns [`Error::Validation`] if the experiment definition is malformed.
pub fn assign_with<R: Rng + ?Sized>(
    experiment: &mut Experiment,
    user_id: &str,
    now: DateTime<Utc>,
    rng: &mut R,
) -> Result<Assignment> {
    if let Some(variant) = experiment.find_assignment(user_id) {
        return Ok(Assignment {
            variant_id: variant.id().to_string(),
            is_new: false,
        });
    }

    let shares = experiment.traffic_shares()?;
    let roll: f64 = rng.gen_range(0.0..100.0);

    let index = match pick_variant(&shares, roll) {
        Some(index) => index,
        None => experiment
            .variants
            .iter()
            .position(|v| v.is_control)
            .ok_or_else(|| Error::Validation("experiment has no control variant".to_string()))?,
    };

    let variant = &mut experiment.variants[index];
    variant.assigned_users.push(AssignedUser::new(user_id, now));
    debug!(
        experiment_id = %experiment.id,
        variant_id = %variant.id,
        user_id,
        roll,
        "assigned user"
    );

    Ok(Assignment {
        variant_id: variant.id.clone(),
        is_new: true,
    })
}
