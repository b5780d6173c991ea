//! Metrics calculator: rates derived from raw variant counters

use serde::{Deserialize, Serialize};

use crate::experiment::Experiment;

/// Rates derived from a variant's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DerivedMetrics {
    /// `conversions / impressions * 100`
    pub conversion_rate: f64,
    /// `bounces / impressions * 100`
    pub bounce_rate: f64,
    /// `revenue / impressions`
    pub average_revenue: f64,
}

/// Derive rates from raw counters. Zero impressions yields all zeros.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn calculate(impressions: u64, conversions: u64, bounces: u64, revenue: f64) -> DerivedMetrics {
    if impressions == 0 {
        return DerivedMetrics::default();
    }
    let n = impressions as f64;
    DerivedMetrics {
        conversion_rate: conversions as f64 / n * 100.0,
        bounce_rate: bounces as f64 / n * 100.0,
        average_revenue: revenue / n,
    }
}

/// Refresh the derived metrics of every variant in the experiment.
pub fn recalculate(experiment: &mut Experiment) {
    for variant in &mut experiment.variants {
        variant.metrics.refresh();
    }
}
