//! Experiment Lifecycle Example
//!
//! Walks one A/B test from draft to a declared winner using the in-memory
//! repository. Simulated visitors convert at 10% on the control and 14% on
//! the treatment.
//!
//! Run with: RUST_LOG=trueno_ab=debug cargo run --example experiment_lifecycle

use anyhow::Context;
use rand::Rng;
use tracing_subscriber::EnvFilter;
use trueno_ab::experiment::{
    ConfidenceLevel, EventKind, Experiment, ExperimentConfig, ExperimentType, Variant,
};
use trueno_ab::service::ExperimentService;
use trueno_ab::store::MemoryExperimentStore;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("=== Trueno-AB Experiment Lifecycle ===\n");

    let service = ExperimentService::new(MemoryExperimentStore::new());

    // -------------------------------------------------------------------------
    // 1. Define the experiment
    // -------------------------------------------------------------------------
    println!("1. Creating experiment...");

    let experiment = Experiment::builder("exp-apply-cta", "Apply button copy")
        .experiment_type(ExperimentType::Cta)
        .config(ExperimentConfig {
            target_page: "/apply".to_string(),
            traffic_split_percent: 50.0,
            min_sample_size: 1_000,
            confidence_level: ConfidenceLevel::NinetyFive,
            min_duration_days: 0,
            max_duration_days: 30,
        })
        .variant(
            Variant::builder("apply-now", "Apply now")
                .control()
                .content(serde_json::json!({"label": "Apply now", "color": "#1a73e8"}))
                .build(),
        )
        .variant(
            Variant::builder("check-eligibility", "Check my eligibility")
                .content(serde_json::json!({"label": "Check my eligibility", "color": "#1a73e8"}))
                .build(),
        )
        .build()
        .context("experiment definition")?;

    let created = service.create(experiment)?;
    println!("   Experiment ID: {}", created.id());
    println!("   Shares: {:?}", created.traffic_shares()?);

    // -------------------------------------------------------------------------
    // 2. Start and simulate traffic
    // -------------------------------------------------------------------------
    println!("\n2. Simulating 5,000 visitors...");
    service.start(created.id())?;

    let mut rng = rand::thread_rng();
    for i in 0..5_000 {
        let user = format!("visitor-{i}");
        let variant = service.assign(created.id(), &user)?;
        service.record_event(created.id(), &variant, &user, EventKind::Impression, None)?;

        let rate = if variant == "apply-now" { 0.10 } else { 0.14 };
        if rng.gen_bool(rate) {
            let revenue = rng.gen_range(50.0..250.0);
            service.record_event(
                created.id(),
                &variant,
                &user,
                EventKind::Conversion,
                Some(revenue),
            )?;
        }
    }

    for variant in service.get(created.id())?.variants() {
        let m = variant.metrics();
        println!(
            "   {:<20} impressions={:>5} conversions={:>4} rate={:>5.2}% avg_revenue={:.2}",
            variant.id(),
            m.impressions(),
            m.conversions(),
            m.conversion_rate(),
            m.average_revenue()
        );
    }

    // -------------------------------------------------------------------------
    // 3. Scheduler pass: complete what is ready
    // -------------------------------------------------------------------------
    println!("\n3. Completing ready experiments...");

    for experiment in service.list_ready_for_completion()? {
        let results = service.complete(experiment.id())?;
        match results.significance() {
            Some(s) => println!(
                "   z={:.3} p={:.4} significant={} CI=[{:.2}, {:.2}] pp",
                s.z_score,
                s.p_value,
                s.is_significant,
                s.confidence_interval.lower,
                s.confidence_interval.upper
            ),
            None => println!("   insufficient data for a significance test"),
        }
        println!("   Winner: {}", results.winner().unwrap_or("none declared"));
        if let Some(summary) = results.summary() {
            println!(
                "   Summary: {} impressions, {} conversions, revenue {:.2}",
                summary.total_impressions, summary.total_conversions, summary.total_revenue
            );
        }
    }

    println!("\n=== Done ===");
    Ok(())
}
