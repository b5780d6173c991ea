//! Event recorder: impressions, conversions, clicks and bounces

use chrono::{DateTime, Utc};
use tracing::debug;

use super::metrics;
use crate::experiment::{AssignedUser, EventKind, Experiment, UserEvent, Variant};
use crate::{Error, Result};

/// Whether a conversion moved the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionOutcome {
    /// First conversion for this user; counters updated.
    Counted,
    /// User had already converted; nothing changed.
    AlreadyConverted,
}

/// Resolve the variant and the user assigned to it.
fn locate<'a>(
    experiment: &'a mut Experiment,
    variant_id: &str,
    user_id: &str,
) -> Result<(&'a mut Variant, usize)> {
    let variant = experiment
        .variant_mut(variant_id)
        .ok_or_else(|| Error::variant_not_found(variant_id))?;
    let index = variant
        .assigned_users
        .iter()
        .position(|u| u.user_id() == user_id)
        .ok_or_else(|| Error::user_not_found(user_id))?;
    Ok((variant, index))
}

fn log_event(user: &mut AssignedUser, kind: EventKind, now: DateTime<Utc>, revenue: f64, cap: usize) {
    user.push_event(UserEvent::new(kind, now, revenue), cap);
}

/// Record that `user_id` saw `variant_id`.
///
/// # Errors
///
/// Returns [`Error::NotFound`] if the variant does not exist or the user was
/// never assigned to it. Counters are untouched in that case.
pub fn record_impression(
    experiment: &mut Experiment,
    variant_id: &str,
    user_id: &str,
    now: DateTime<Utc>,
    max_events: usize,
) -> Result<()> {
    let (variant, index) = locate(experiment, variant_id, user_id)?;
    variant.metrics.record_impression();
    log_event(&mut variant.assigned_users[index], EventKind::Impression, now, 0.0, max_events);
    Ok(())
}

/// Record a conversion, counted at most once per user.
///
/// A repeat conversion for a user who already converted changes nothing:
/// no counter, no revenue, no log entry.
///
/// # Errors
///
/// Returns [`Error::Validation`] for negative or non-finite revenue and
/// [`Error::NotFound`] for an unknown variant or unassigned user.
pub fn record_conversion(
    experiment: &mut Experiment,
    variant_id: &str,
    user_id: &str,
    revenue: f64,
    now: DateTime<Utc>,
    max_events: usize,
) -> Result<ConversionOutcome> {
    if !revenue.is_finite() || revenue < 0.0 {
        return Err(Error::Validation(format!(
            "conversion revenue must be a non-negative number, got {revenue}"
        )));
    }

    let (variant, index) = locate(experiment, variant_id, user_id)?;
    let user = &mut variant.assigned_users[index];
    if user.converted() {
        debug!(variant_id, user_id, "duplicate conversion ignored");
        return Ok(ConversionOutcome::AlreadyConverted);
    }

    user.mark_converted(revenue);
    log_event(user, EventKind::Conversion, now, revenue, max_events);
    variant.metrics.record_conversion(revenue);

    metrics::recalculate(experiment);
    debug!(experiment_id = %experiment.id, variant_id, user_id, revenue, "conversion recorded");
    Ok(ConversionOutcome::Counted)
}

/// Record a click-through.
///
/// # Errors
///
/// Returns [`Error::NotFound`] for an unknown variant or unassigned user.
pub fn record_click(
    experiment: &mut Experiment,
    variant_id: &str,
    user_id: &str,
    now: DateTime<Utc>,
    max_events: usize,
) -> Result<()> {
    let (variant, index) = locate(experiment, variant_id, user_id)?;
    variant.metrics.record_click();
    log_event(&mut variant.assigned_users[index], EventKind::Click, now, 0.0, max_events);
    Ok(())
}

/// Record a bounce.
///
/// # Errors
///
/// Returns [`Error::NotFound`] for an unknown variant or unassigned user.
pub fn record_bounce(
    experiment: &mut Experiment,
    variant_id: &str,
    user_id: &str,
    now: DateTime<Utc>,
    max_events: usize,
) -> Result<()> {
    let (variant, index) = locate(experiment, variant_id, user_id)?;
    variant.metrics.record_bounce();
    log_event(&mut variant.assigned_users[index], EventKind::Bounce, now, 0.0, max_events);
    Ok(())
}

/// Dispatch on `kind`. Only conversions carry revenue.
///
/// # Errors
///
/// Returns [`Error::Validation`] if `revenue` is given for anything other
/// than a conversion; otherwise see the individual `record_*` functions.
pub fn record_event(
    experiment: &mut Experiment,
    variant_id: &str,
    user_id: &str,
    kind: EventKind,
    revenue: Option<f64>,
    now: DateTime<Utc>,
    max_events: usize,
) -> Result<()> {
    if kind != EventKind::Conversion && revenue.is_some() {
        return Err(Error::Validation(format!(
            "revenue is only accepted on conversions, got it on a {kind:?} event"
        )));
    }
    match kind {
        EventKind::Impression => record_impression(experiment, variant_id, user_id, now, max_events),
        EventKind::Conversion => record_conversion(
            experiment,
            variant_id,
            user_id,
            revenue.unwrap_or(0.0),
            now,
            max_events,
        )
        .map(|_| ()),
        EventKind::Click => record_click(experiment, variant_id, user_id, now, max_events),
        EventKind::Bounce => record_bounce(experiment, variant_id, user_id, now, max_events),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::assignment::assign;
    use crate::experiment::Variant;

    const CAP: usize = 100;

    /// Experiment with `user` assigned; returns the variant they landed in.
    fn setup(user: &str) -> (Experiment, String) {
        let mut exp = Experiment::builder("exp-1", "Form length")
            .variant(Variant::control("long", "Long form"))
            .variant(Variant::new("short", "Short form"))
            .build()
            .unwrap();
        let variant = assign(&mut exp, user, Utc::now()).unwrap().variant_id;
        (exp, variant)
    }

    #[test]
    fn test_impression_counts_and_logs() {
        let (mut exp, v) = setup("u1");
        record_impression(&mut exp, &v, "u1", Utc::now(), CAP).unwrap();
        record_impression(&mut exp, &v, "u1", Utc::now(), CAP).unwrap();

        let variant = exp.variant(&v).unwrap();
        assert_eq!(variant.metrics().impressions(), 2);
        assert_eq!(variant.assigned_user("u1").unwrap().events().len(), 2);
    }

    #[test]
    fn test_impression_for_unassigned_user_fails_cleanly() {
        let (mut exp, v) = setup("u1");
        let result = record_impression(&mut exp, &v, "stranger", Utc::now(), CAP);
        assert!(matches!(result, Err(Error::NotFound { kind: "assigned user", .. })));
        assert_eq!(exp.variant(&v).unwrap().metrics().impressions(), 0);
    }

    #[test]
    fn test_event_for_unknown_variant() {
        let (mut exp, _) = setup("u1");
        let result = record_impression(&mut exp, "nope", "u1", Utc::now(), CAP);
        assert!(matches!(result, Err(Error::NotFound { kind: "variant", .. })));
    }

    #[test]
    fn test_event_for_other_variant_is_not_found() {
        let (mut exp, v) = setup("u1");
        let other = if v == "long" { "short" } else { "long" };
        let result = record_conversion(&mut exp, other, "u1", 0.0, Utc::now(), CAP);
        assert!(matches!(result, Err(Error::NotFound { .. })));
    }

    #[test]
    fn test_conversion_counted_once() {
        let (mut exp, v) = setup("u1");
        record_impression(&mut exp, &v, "u1", Utc::now(), CAP).unwrap();

        let first = record_conversion(&mut exp, &v, "u1", 49.0, Utc::now(), CAP).unwrap();
        let second = record_conversion(&mut exp, &v, "u1", 49.0, Utc::now(), CAP).unwrap();

        assert_eq!(first, ConversionOutcome::Counted);
        assert_eq!(second, ConversionOutcome::AlreadyConverted);

        let variant = exp.variant(&v).unwrap();
        assert_eq!(variant.metrics().conversions(), 1);
        assert!((variant.metrics().revenue() - 49.0).abs() < f64::EPSILON);
        assert!((variant.metrics().conversion_rate() - 100.0).abs() < 1e-9);

        let user = variant.assigned_user("u1").unwrap();
        assert!(user.converted());
        assert!((user.revenue() - 49.0).abs() < f64::EPSILON);
        let conversions = user
            .events()
            .iter()
            .filter(|e| e.kind() == EventKind::Conversion)
            .count();
        assert_eq!(conversions, 1);
    }

    #[test]
    fn test_conversion_rejects_bad_revenue() {
        let (mut exp, v) = setup("u1");
        for revenue in [-1.0, f64::NAN, f64::INFINITY] {
            let result = record_conversion(&mut exp, &v, "u1", revenue, Utc::now(), CAP);
            assert!(matches!(result, Err(Error::Validation(_))));
        }
        assert!(!exp.variant(&v).unwrap().assigned_user("u1").unwrap().converted());
    }

    #[test]
    fn test_click_and_bounce() {
        let (mut exp, v) = setup("u1");
        record_event(&mut exp, &v, "u1", EventKind::Impression, None, Utc::now(), CAP).unwrap();
        record_event(&mut exp, &v, "u1", EventKind::Click, None, Utc::now(), CAP).unwrap();
        record_event(&mut exp, &v, "u1", EventKind::Bounce, None, Utc::now(), CAP).unwrap();

        let metrics = exp.variant(&v).unwrap().metrics();
        assert_eq!(metrics.clicks(), 1);
        assert_eq!(metrics.bounces(), 1);
        assert!((metrics.bounce_rate() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_revenue_rejected_on_non_conversion() {
        let (mut exp, v) = setup("u1");
        for kind in [EventKind::Impression, EventKind::Click, EventKind::Bounce] {
            let result = record_event(&mut exp, &v, "u1", kind, Some(10.0), Utc::now(), CAP);
            assert!(matches!(result, Err(Error::Validation(_))));
        }

        let variant = exp.variant(&v).unwrap();
        assert_eq!(variant.metrics().impressions(), 0);
        assert_eq!(variant.metrics().clicks(), 0);
        assert_eq!(variant.metrics().bounces(), 0);
        assert!(variant.assigned_user("u1").unwrap().events().is_empty());
    }

    #[test]
    fn test_event_log_is_capped() {
        let (mut exp, v) = setup("u1");
        for _ in 0..10 {
            record_impression(&mut exp, &v, "u1", Utc::now(), 4).unwrap();
        }
        let variant = exp.variant(&v).unwrap();
        assert_eq!(variant.metrics().impressions(), 10);
        assert_eq!(variant.assigned_user("u1").unwrap().events().len(), 4);
    }
}
