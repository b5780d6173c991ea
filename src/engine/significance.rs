//! Significance analyzer: two-proportion z-test between control and treatment
//!
//! ## Algorithm
//!
//! With conversion fractions `p1` (control) and `p2` (treatment) over `n1`
//! and `n2` impressions:
//!
//! ```text
//! p_pooled = (p1*n1 + p2*n2) / (n1 + n2)
//! se       = sqrt(p_pooled * (1 - p_pooled) * (1/n1 + 1/n2))
//! z        = (p2 - p1) / se
//! p_value  = 2 * (1 - Φ(|z|))
//! ```
//!
//! `Φ` is evaluated through the Abramowitz & Stegun 7.1.26 approximation of
//! `erf` (maximum absolute error 1.5e-7 on erf, 7.5e-8 on Φ).

use std::f64::consts::SQRT_2;

use tracing::{debug, warn};

use crate::config::{EngineConfig, IntervalPolicy};
use crate::experiment::{
    ConfidenceInterval, ConfidenceLevel, Experiment, Metrics, Significance,
};

// Abramowitz & Stegun 7.1.26
const A1: f64 = 0.254_829_592;
const A2: f64 = -0.284_496_736;
const A3: f64 = 1.421_413_741;
const A4: f64 = -1.453_152_027;
const A5: f64 = 1.061_405_429;
const P: f64 = 0.327_591_1;

/// Critical value used by [`IntervalPolicy::Fixed95`].
pub const FIXED_Z_CRITICAL: f64 = 1.96;

/// Error function, Abramowitz & Stegun 7.1.26.
#[must_use]
pub fn erf(x: f64) -> f64 {
    let sign = if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        return 0.0;
    };
    let x = x.abs();
    let t = 1.0 / (1.0 + P * x);
    let y = 1.0 - (((((A5 * t + A4) * t) + A3) * t + A2) * t + A1) * t * (-x * x).exp();
    sign * y
}

/// Standard normal CDF.
#[must_use]
pub fn normal_cdf(x: f64) -> f64 {
    0.5 * (1.0 + erf(x / SQRT_2))
}

/// Compare `treatment` against `control`.
///
/// Returns `None` when either group has fewer than `min_samples` impressions;
/// that is "not yet decidable", not an error.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn analyze(
    control: &Metrics,
    treatment: &Metrics,
    level: ConfidenceLevel,
    min_samples: u64,
    policy: IntervalPolicy,
) -> Option<Significance> {
    if control.impressions() < min_samples || treatment.impressions() < min_samples {
        return None;
    }

    let n1 = control.impressions() as f64;
    let n2 = treatment.impressions() as f64;
    let p1 = control.conversions() as f64 / n1;
    let p2 = treatment.conversions() as f64 / n2;

    let pooled = (p1 * n1 + p2 * n2) / (n1 + n2);
    let se = (pooled * (1.0 - pooled) * (1.0 / n1 + 1.0 / n2)).sqrt();
    let diff = p2 - p1;

    // Both groups at 0% or both at 100%: no variance, no evidence.
    let (z_score, p_value) = if se > 0.0 {
        let z = diff / se;
        (z, 2.0 * (1.0 - normal_cdf(z.abs())))
    } else {
        (0.0, 1.0)
    };

    let z_critical = match policy {
        IntervalPolicy::MatchConfidenceLevel => level.z_critical(),
        IntervalPolicy::Fixed95 => FIXED_Z_CRITICAL,
    };
    let margin = z_critical * se;

    let improvement_percentage = (p1 > 0.0).then(|| diff / p1 * 100.0);

    Some(Significance {
        z_score,
        p_value,
        confidence_interval: ConfidenceInterval {
            lower: (diff - margin) * 100.0,
            upper: (diff + margin) * 100.0,
        },
        improvement_percentage,
        is_significant: p_value < level.alpha(),
        confidence_level: level,
    })
}

/// Run [`analyze`] on an experiment's control and single treatment.
///
/// Experiments with anything other than exactly two variants are tracked
/// but not analyzed, and yield `None`.
#[must_use]
pub fn analyze_experiment(experiment: &Experiment, config: &EngineConfig) -> Option<Significance> {
    let (Some(control), Some(treatment)) = (experiment.control(), experiment.treatment()) else {
        warn!(
            experiment_id = %experiment.id(),
            variants = experiment.variants().len(),
            "significance analysis needs exactly one control and one treatment"
        );
        return None;
    };

    let result = analyze(
        control.metrics(),
        treatment.metrics(),
        experiment.config().confidence_level,
        config.min_samples_per_group,
        config.interval_policy,
    );
    match &result {
        Some(s) => debug!(
            experiment_id = %experiment.id(),
            z = s.z_score,
            p = s.p_value,
            significant = s.is_significant,
            "significance computed"
        ),
        None => debug!(experiment_id = %experiment.id(), "insufficient data for significance"),
    }
    result
}
