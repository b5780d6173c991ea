//! Results Record - outcome of a completed experiment

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::ConfidenceLevel;

/// Confidence interval on the absolute difference in conversion rate,
/// in percentage points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    /// Lower bound
    pub lower: f64,
    /// Upper bound
    pub upper: f64,
}

impl ConfidenceInterval {
    /// Whether the interval contains `value`.
    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        self.lower <= value && value <= self.upper
    }
}

/// Output of a two-proportion z-test between control and treatment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Significance {
    /// Standardized difference `(p2 - p1) / se`
    pub z_score: f64,
    /// Two-tailed p-value
    pub p_value: f64,
    /// Interval on `p2 - p1`, in percentage points
    pub confidence_interval: ConfidenceInterval,
    /// Relative lift of treatment over control in percent.
    /// `None` when the control rate is zero.
    pub improvement_percentage: Option<f64>,
    /// `p_value < 1 - confidence_level`
    pub is_significant: bool,
    /// Confidence level the verdict was made at
    pub confidence_level: ConfidenceLevel,
}

/// Aggregate statistics across all variants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// Impressions summed over variants
    pub total_impressions: u64,
    /// Conversions summed over variants
    pub total_conversions: u64,
    /// Revenue summed over variants
    pub total_revenue: f64,
    /// Mean of the per-variant conversion rates, in percent
    pub average_conversion_rate: f64,
    /// Whole days between start and completion
    pub duration_days: i64,
}

/// Per-variant figures for one day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantSnapshot {
    /// Variant the figures belong to
    pub variant_id: String,
    /// Impressions on that day
    pub impressions: u64,
    /// Conversions on that day
    pub conversions: u64,
    /// Revenue on that day
    pub revenue: f64,
    /// Conversion rate on that day, in percent
    pub conversion_rate: f64,
}

/// Figures for every variant on one UTC day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySnapshot {
    /// UTC calendar day
    pub date: NaiveDate,
    /// One entry per variant, in experiment order
    pub variants: Vec<VariantSnapshot>,
}

/// Results of an experiment. Populated once, at completion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Results {
    pub(crate) winner: Option<String>,
    pub(crate) winner_declared_at: Option<DateTime<Utc>>,
    pub(crate) significance: Option<Significance>,
    pub(crate) summary: Option<Summary>,
    pub(crate) daily_snapshots: Vec<DailySnapshot>,
}

impl Results {
    /// Winning variant ID, if one was declared.
    #[must_use]
    pub fn winner(&self) -> Option<&str> {
        self.winner.as_deref()
    }

    /// When the winner was declared.
    #[must_use]
    pub const fn winner_declared_at(&self) -> Option<DateTime<Utc>> {
        self.winner_declared_at
    }

    /// Significance test output; `None` means the data did not allow a test.
    #[must_use]
    pub const fn significance(&self) -> Option<&Significance> {
        self.significance.as_ref()
    }

    /// Summary statistics; `None` until the experiment completes.
    #[must_use]
    pub const fn summary(&self) -> Option<&Summary> {
        self.summary.as_ref()
    }

    /// Per-day snapshots, oldest first.
    #[must_use]
    pub fn daily_snapshots(&self) -> &[DailySnapshot] {
        &self.daily_snapshots
    }
}
