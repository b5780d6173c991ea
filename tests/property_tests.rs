//! Property-based tests for trueno-ab
//!
//! Following ruchy/trueno/aprender pattern:
//! - Test mathematical invariants
//! - Test data integrity properties
//! - Run with ProptestConfig::with_cases(100)
//! - Must complete in <30 seconds for pre-commit hook

use chrono::Utc;
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use trueno_ab::config::IntervalPolicy;
use trueno_ab::engine::assignment::{assign_with, pick_variant};
use trueno_ab::engine::events::{record_conversion, record_impression};
use trueno_ab::engine::metrics::calculate;
use trueno_ab::engine::significance::{analyze, normal_cdf};
use trueno_ab::experiment::{ConfidenceLevel, Experiment, ExperimentConfig, Metrics, Variant};

// ============================================================================
// Property Test Generators (Strategies)
// ============================================================================

/// Experiment with one control and `treatments` treatment variants.
fn arb_experiment() -> impl Strategy<Value = Experiment> {
    (1usize..6, 0.0f64..=100.0).prop_map(|(treatments, split)| {
        let mut builder = Experiment::builder("exp-prop", "Property")
            .config(ExperimentConfig {
                traffic_split_percent: split,
                ..ExperimentConfig::default()
            })
            .variant(Variant::control("control", "Control"));
        for i in 0..treatments {
            builder = builder.variant(Variant::new(format!("t{i}"), format!("Treatment {i}")));
        }
        builder.build().unwrap()
    })
}

/// (impressions, conversions) with conversions <= impressions
fn arb_group() -> impl Strategy<Value = (u64, u64)> {
    (0u64..5_000).prop_flat_map(|n| (Just(n), 0..=n))
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // ========================================================================
    // Allocation Properties
    // ========================================================================

    /// Property: traffic shares always sum to 100
    #[test]
    fn prop_shares_sum_to_100(experiment in arb_experiment()) {
        let total: f64 = experiment.traffic_shares().unwrap().iter().sum();
        prop_assert!((total - 100.0).abs() < 1e-6, "shares sum to {}", total);
    }

    /// Property: every roll in [0, 100) lands on some variant
    #[test]
    fn prop_every_roll_lands(experiment in arb_experiment(), roll in 0.0f64..100.0) {
        let shares = experiment.traffic_shares().unwrap();
        let index = pick_variant(&shares, roll);
        // only float tail rounding may fall through, and only near 100
        prop_assert!(index.is_some() || roll > 99.999);
    }

    /// Property: assignment is a partition and idempotent
    #[test]
    fn prop_assignment_partition(
        mut experiment in arb_experiment(),
        seed in any::<u64>(),
        users in proptest::collection::vec(0u32..50, 1..200)
    ) {
        let mut rng = StdRng::seed_from_u64(seed);
        let now = Utc::now();
        let mut first_seen = std::collections::HashMap::new();

        for user in &users {
            let id = format!("user-{user}");
            let a = assign_with(&mut experiment, &id, now, &mut rng).unwrap();
            let expected = first_seen.entry(id).or_insert_with(|| a.variant_id.clone());
            prop_assert_eq!(&a.variant_id, &*expected);
        }

        let records: usize = experiment.variants().iter().map(|v| v.assigned_users().len()).sum();
        prop_assert_eq!(records, first_seen.len());
    }

    // ========================================================================
    // Event Accounting Properties
    // ========================================================================

    /// Property: a user converts at most once, however often it is reported
    #[test]
    fn prop_conversion_counted_once(repeats in 1usize..10, revenue in 0.0f64..500.0) {
        let mut experiment = Experiment::builder("exp-prop", "Once")
            .variant(Variant::control("a", "A"))
            .build()
            .unwrap();
        let now = Utc::now();
        let mut rng = StdRng::seed_from_u64(0);
        assign_with(&mut experiment, "u", now, &mut rng).unwrap();
        record_impression(&mut experiment, "a", "u", now, 100).unwrap();

        for _ in 0..repeats {
            record_conversion(&mut experiment, "a", "u", revenue, now, 100).unwrap();
        }

        let metrics = experiment.variant("a").unwrap().metrics();
        prop_assert_eq!(metrics.conversions(), 1);
        prop_assert!((metrics.revenue() - revenue).abs() < 1e-9);
    }

    // ========================================================================
    // Metrics Properties
    // ========================================================================

    /// Property: derived rates are pure and bounded
    #[test]
    fn prop_rates_bounded((impressions, conversions) in arb_group(), revenue in 0.0f64..1e6) {
        let a = calculate(impressions, conversions, 0, revenue);
        let b = calculate(impressions, conversions, 0, revenue);
        prop_assert_eq!(a, b);
        prop_assert!((0.0..=100.0).contains(&a.conversion_rate));
        if impressions == 0 {
            prop_assert!(a.conversion_rate.abs() < f64::EPSILON);
        }
    }

    // ========================================================================
    // Statistics Properties
    // ========================================================================

    /// Property: normal CDF is monotone and within [0, 1]
    #[test]
    fn prop_normal_cdf_monotone(x in -8.0f64..8.0, dx in 0.0f64..2.0) {
        let lo = normal_cdf(x);
        let hi = normal_cdf(x + dx);
        prop_assert!((0.0..=1.0).contains(&lo));
        prop_assert!(hi >= lo);
    }

    /// Property: p-value in [0, 1]; interval contains the observed difference
    #[test]
    fn prop_significance_well_formed(control in arb_group(), treatment in arb_group()) {
        let c = Metrics::from_counts(control.0, control.1, 0.0, 0, 0);
        let t = Metrics::from_counts(treatment.0, treatment.1, 0.0, 0, 0);

        match analyze(&c, &t, ConfidenceLevel::NinetyFive, 30, IntervalPolicy::MatchConfidenceLevel) {
            None => prop_assert!(control.0 < 30 || treatment.0 < 30),
            Some(s) => {
                prop_assert!((0.0..=1.0 + 1e-12).contains(&s.p_value));
                let diff = t.conversion_rate() - c.conversion_rate();
                prop_assert!(s.confidence_interval.lower <= diff + 1e-9);
                prop_assert!(s.confidence_interval.upper >= diff - 1e-9);
                prop_assert_eq!(s.is_significant, s.p_value < ConfidenceLevel::NinetyFive.alpha());
            }
        }
    }

    /// Property: swapping control and treatment negates z
    #[test]
    fn prop_z_antisymmetric(control in arb_group(), treatment in arb_group()) {
        let c = Metrics::from_counts(control.0, control.1, 0.0, 0, 0);
        let t = Metrics::from_counts(treatment.0, treatment.1, 0.0, 0, 0);
        let level = ConfidenceLevel::NinetyFive;
        let policy = IntervalPolicy::MatchConfidenceLevel;

        if let (Some(ab), Some(ba)) = (analyze(&c, &t, level, 30, policy), analyze(&t, &c, level, 30, policy)) {
            prop_assert!((ab.z_score + ba.z_score).abs() < 1e-9);
            prop_assert!((ab.p_value - ba.p_value).abs() < 1e-9);
        }
    }
}
