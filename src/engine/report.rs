//! Report generator: summary statistics and per-day snapshots

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};

use super::metrics::calculate;
use crate::experiment::{DailySnapshot, EventKind, Experiment, Summary, VariantSnapshot};

/// Aggregate figures across all variants.
///
/// Duration runs from the first start to completion, or to `now` for an
/// experiment that has not completed.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn summary(experiment: &Experiment, now: DateTime<Utc>) -> Summary {
    let variants = experiment.variants();
    let end = experiment.schedule().completed_at().unwrap_or(now);

    let average_conversion_rate = if variants.is_empty() {
        0.0
    } else {
        variants
            .iter()
            .map(|v| v.metrics().conversion_rate())
            .sum::<f64>()
            / variants.len() as f64
    };

    Summary {
        total_impressions: experiment.total_impressions(),
        total_conversions: variants.iter().map(|v| v.metrics().conversions()).sum(),
        total_revenue: variants.iter().map(|v| v.metrics().revenue()).sum(),
        average_conversion_rate,
        duration_days: experiment.elapsed_days(end),
    }
}

#[derive(Default, Clone, Copy)]
struct DayCounts {
    impressions: u64,
    conversions: u64,
    revenue: f64,
}

/// Per-day, per-variant figures rebuilt from the users' event logs.
///
/// Days are UTC calendar days, oldest first; every variant appears in every
/// snapshot, zero-filled on days it saw no events. Logs are capped by the
/// engine's retention setting, so very old activity of heavy users may be
/// missing from these figures while still counted in the variant metrics.
#[must_use]
pub fn daily_snapshots(experiment: &Experiment) -> Vec<DailySnapshot> {
    let variants = experiment.variants();
    let mut days: BTreeMap<NaiveDate, Vec<DayCounts>> = BTreeMap::new();

    for (index, variant) in variants.iter().enumerate() {
        for event in variant.assigned_users().iter().flat_map(|u| u.events()) {
            let counts = &mut days
                .entry(event.occurred_at().date_naive())
                .or_insert_with(|| vec![DayCounts::default(); variants.len()])[index];
            match event.kind() {
                EventKind::Impression => counts.impressions += 1,
                EventKind::Conversion => {
                    counts.conversions += 1;
                    counts.revenue += event.revenue();
                }
                EventKind::Click | EventKind::Bounce => {}
            }
        }
    }

    days.into_iter()
        .map(|(date, counts)| DailySnapshot {
            date,
            variants: variants
                .iter()
                .zip(counts)
                .map(|(variant, c)| VariantSnapshot {
                    variant_id: variant.id().to_string(),
                    impressions: c.impressions,
                    conversions: c.conversions,
                    revenue: c.revenue,
                    conversion_rate: calculate(c.impressions, c.conversions, 0, c.revenue)
                        .conversion_rate,
                })
                .collect(),
        })
        .collect()
}
