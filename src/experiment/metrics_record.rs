//! Metrics - per-variant counters and the rates derived from them

use serde::{Deserialize, Serialize};

use crate::engine::metrics::{calculate, DerivedMetrics};

/// Raw counters as stored; derived rates are rebuilt on deserialization.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
struct MetricCounters {
    #[serde(default)]
    impressions: u64,
    #[serde(default)]
    conversions: u64,
    #[serde(default)]
    revenue: f64,
    #[serde(default)]
    bounces: u64,
    #[serde(default)]
    clicks: u64,
}

/// Metrics tracked for one variant.
///
/// Counters only move through the `record_*` methods, each of which
/// refreshes `conversion_rate`, `bounce_rate` and `average_revenue`, so the
/// derived fields can never drift from the counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "MetricCounters")]
pub struct Metrics {
    impressions: u64,
    conversions: u64,
    revenue: f64,
    bounces: u64,
    clicks: u64,
    conversion_rate: f64,
    bounce_rate: f64,
    average_revenue: f64,
}

impl From<MetricCounters> for Metrics {
    fn from(c: MetricCounters) -> Self {
        Self::from_counts(c.impressions, c.conversions, c.revenue, c.bounces, c.clicks)
    }
}

impl Metrics {
    /// Create zeroed metrics.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build metrics from existing counters (imports, fixtures).
    #[must_use]
    pub fn from_counts(
        impressions: u64,
        conversions: u64,
        revenue: f64,
        bounces: u64,
        clicks: u64,
    ) -> Self {
        let mut metrics = Self {
            impressions,
            conversions,
            revenue,
            bounces,
            clicks,
            ..Self::default()
        };
        metrics.refresh();
        metrics
    }

    /// Number of impressions.
    #[must_use]
    pub const fn impressions(&self) -> u64 {
        self.impressions
    }

    /// Number of converted users.
    #[must_use]
    pub const fn conversions(&self) -> u64 {
        self.conversions
    }

    /// Cumulative revenue.
    #[must_use]
    pub const fn revenue(&self) -> f64 {
        self.revenue
    }

    /// Number of bounces.
    #[must_use]
    pub const fn bounces(&self) -> u64 {
        self.bounces
    }

    /// Number of clicks.
    #[must_use]
    pub const fn clicks(&self) -> u64 {
        self.clicks
    }

    /// Conversions per impression, in percent.
    #[must_use]
    pub const fn conversion_rate(&self) -> f64 {
        self.conversion_rate
    }

    /// Bounces per impression, in percent.
    #[must_use]
    pub const fn bounce_rate(&self) -> f64 {
        self.bounce_rate
    }

    /// Revenue per impression.
    #[must_use]
    pub const fn average_revenue(&self) -> f64 {
        self.average_revenue
    }

    /// Derived view of the current counters.
    #[must_use]
    pub const fn derived(&self) -> DerivedMetrics {
        DerivedMetrics {
            conversion_rate: self.conversion_rate,
            bounce_rate: self.bounce_rate,
            average_revenue: self.average_revenue,
        }
    }

    pub(crate) fn record_impression(&mut self) {
        self.impressions += 1;
        self.refresh();
    }

    pub(crate) fn record_conversion(&mut self, revenue: f64) {
        self.conversions += 1;
        self.revenue += revenue;
        self.refresh();
    }

    pub(crate) fn record_bounce(&mut self) {
        self.bounces += 1;
        self.refresh();
    }

    pub(crate) fn record_click(&mut self) {
        self.clicks += 1;
    }

    /// Recompute the derived fields from the counters.
    pub(crate) fn refresh(&mut self) {
        let derived = calculate(self.impressions, self.conversions, self.bounces, self.revenue);
        self.conversion_rate = derived.conversion_rate;
        self.bounce_rate = derived.bounce_rate;
        self.average_revenue = derived.average_revenue;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_from_counts() {
        let metrics = Metrics::from_counts(200, 20, 500.0, 50, 80);
        assert!((metrics.conversion_rate() - 10.0).abs() < 1e-9);
        assert!((metrics.bounce_rate() - 25.0).abs() < 1e-9);
        assert!((metrics.average_revenue() - 2.5).abs() < 1e-9);
        assert_eq!(metrics.clicks(), 80);
    }

    #[test]
    fn test_record_keeps_rates_in_sync() {
        let mut metrics = Metrics::new();
        metrics.record_impression();
        metrics.record_impression();
        metrics.record_conversion(10.0);
        assert!((metrics.conversion_rate() - 50.0).abs() < 1e-9);
        assert!((metrics.average_revenue() - 5.0).abs() < 1e-9);

        metrics.record_impression();
        metrics.record_impression();
        assert!((metrics.conversion_rate() - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_deserialize_recomputes_stale_rates() {
        let json = r#"{"impressions":10,"conversions":5,"revenue":0.0,"bounces":0,"clicks":0,
                       "conversion_rate":99.0,"bounce_rate":0.0,"average_revenue":0.0}"#;
        let metrics: Metrics = serde_json::from_str(json).unwrap();
        assert!((metrics.conversion_rate() - 50.0).abs() < 1e-9);
    }
}
