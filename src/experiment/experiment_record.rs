//! Experiment Record - root entity of the A/B testing schema

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::{Results, Variant};
use crate::config::DEFAULT_SPLIT_TOLERANCE;
use crate::{Error, Result};

/// What part of the product an experiment varies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperimentType {
    /// Page headline copy
    Headline,
    /// Call-to-action button or link
    Cta,
    /// Price points or plan tables
    Pricing,
    /// Page layout
    Layout,
    /// Lead capture form
    Form,
    /// Body content
    Content,
    /// Anything else
    #[default]
    Other,
}

/// Lifecycle status of an experiment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperimentStatus {
    /// Defined but not yet collecting traffic.
    #[default]
    Draft,
    /// Assigning users and recording events.
    Running,
    /// Temporarily not assigning new users.
    Paused,
    /// Results computed; terminal.
    Completed,
    /// Retired; terminal.
    Archived,
}

impl ExperimentStatus {
    /// Completed and archived experiments never change status again
    /// (except completed -> archived).
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Archived)
    }
}

/// Confidence level used for the significance verdict.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ConfidenceLevel {
    /// 90%
    Ninety,
    /// 95%
    #[default]
    NinetyFive,
    /// 99%
    NinetyNine,
}

impl ConfidenceLevel {
    /// Level as a percentage (90, 95 or 99).
    #[must_use]
    pub const fn percent(self) -> u8 {
        match self {
            Self::Ninety => 90,
            Self::NinetyFive => 95,
            Self::NinetyNine => 99,
        }
    }

    /// Significance threshold `alpha = 1 - level`.
    #[must_use]
    pub fn alpha(self) -> f64 {
        1.0 - f64::from(self.percent()) / 100.0
    }

    /// Two-tailed critical value of the standard normal distribution.
    #[must_use]
    pub const fn z_critical(self) -> f64 {
        match self {
            Self::Ninety => 1.645,
            Self::NinetyFive => 1.96,
            Self::NinetyNine => 2.576,
        }
    }
}

impl TryFrom<u8> for ConfidenceLevel {
    type Error = Error;

    fn try_from(percent: u8) -> Result<Self> {
        match percent {
            90 => Ok(Self::Ninety),
            95 => Ok(Self::NinetyFive),
            99 => Ok(Self::NinetyNine),
            other => Err(Error::Validation(format!(
                "confidence level must be 90, 95 or 99, got {other}"
            ))),
        }
    }
}

impl From<ConfidenceLevel> for u8 {
    fn from(level: ConfidenceLevel) -> Self {
        level.percent()
    }
}

/// Per-experiment configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    /// Page the experiment runs on
    pub target_page: String,
    /// Share of traffic, in percent, sent to the non-control variants
    pub traffic_split_percent: f64,
    /// Impressions required per variant before completion
    pub min_sample_size: u64,
    /// Confidence level for the significance verdict
    pub confidence_level: ConfidenceLevel,
    /// Days the experiment must run before it may complete
    pub min_duration_days: u32,
    /// Days after which the experiment is due for completion
    pub max_duration_days: u32,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            target_page: "/".to_string(),
            traffic_split_percent: 50.0,
            min_sample_size: 100,
            confidence_level: ConfidenceLevel::NinetyFive,
            min_duration_days: 7,
            max_duration_days: 30,
        }
    }
}

/// Lifecycle timestamps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub(crate) started_at: Option<DateTime<Utc>>,
    pub(crate) paused_at: Option<DateTime<Utc>>,
    pub(crate) resumed_at: Option<DateTime<Utc>>,
    pub(crate) completed_at: Option<DateTime<Utc>>,
    pub(crate) end_date: Option<DateTime<Utc>>,
}

impl Schedule {
    /// First time the experiment started running.
    #[must_use]
    pub const fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Most recent pause.
    #[must_use]
    pub const fn paused_at(&self) -> Option<DateTime<Utc>> {
        self.paused_at
    }

    /// Most recent resume, by `resume` or a restart from `Paused`.
    #[must_use]
    pub const fn resumed_at(&self) -> Option<DateTime<Utc>> {
        self.resumed_at
    }

    /// Completion timestamp.
    #[must_use]
    pub const fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// Explicitly configured end date, if any.
    #[must_use]
    pub const fn end_date(&self) -> Option<DateTime<Utc>> {
        self.end_date
    }
}

/// Experiment Record represents one A/B test.
///
/// Built through [`ExperimentBuilder`], which validates the definition.
/// The engine functions in [`crate::engine`] mutate it; persisting it is the
/// job of an [`crate::store::ExperimentRepository`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experiment {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) description: Option<String>,
    pub(crate) experiment_type: ExperimentType,
    pub(crate) status: ExperimentStatus,
    pub(crate) config: ExperimentConfig,
    pub(crate) variants: Vec<Variant>,
    pub(crate) results: Results,
    pub(crate) schedule: Schedule,
    pub(crate) version: u64,
    pub(crate) created_at: DateTime<Utc>,
}

impl Experiment {
    /// Create a builder with the required fields.
    #[must_use]
    pub fn builder(id: impl Into<String>, name: impl Into<String>) -> ExperimentBuilder {
        ExperimentBuilder::new(id, name)
    }

    /// Get the experiment ID.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Get the display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the description, if any.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Get the experiment type.
    #[must_use]
    pub const fn experiment_type(&self) -> ExperimentType {
        self.experiment_type
    }

    /// Get the lifecycle status.
    #[must_use]
    pub const fn status(&self) -> ExperimentStatus {
        self.status
    }

    /// Get the configuration block.
    #[must_use]
    pub const fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    /// Variants in allocation order.
    #[must_use]
    pub fn variants(&self) -> &[Variant] {
        &self.variants
    }

    /// Get the results block.
    #[must_use]
    pub const fn results(&self) -> &Results {
        &self.results
    }

    /// Get the schedule block.
    #[must_use]
    pub const fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    /// Repository version this copy was loaded at.
    #[must_use]
    pub const fn version(&self) -> u64 {
        self.version
    }

    /// Get the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Look up a variant by ID.
    #[must_use]
    pub fn variant(&self, variant_id: &str) -> Option<&Variant> {
        self.variants.iter().find(|v| v.id == variant_id)
    }

    pub(crate) fn variant_mut(&mut self, variant_id: &str) -> Option<&mut Variant> {
        self.variants.iter_mut().find(|v| v.id == variant_id)
    }

    /// The control variant.
    #[must_use]
    pub fn control(&self) -> Option<&Variant> {
        self.variants.iter().find(|v| v.is_control)
    }

    /// The single treatment variant of a two-variant experiment.
    ///
    /// Returns `None` when the experiment has any other number of variants.
    #[must_use]
    pub fn treatment(&self) -> Option<&Variant> {
        if self.variants.len() != 2 {
            return None;
        }
        self.variants.iter().find(|v| !v.is_control)
    }

    /// Variant the user is assigned to, if any.
    #[must_use]
    pub fn find_assignment(&self, user_id: &str) -> Option<&Variant> {
        self.variants
            .iter()
            .find(|v| v.assigned_user(user_id).is_some())
    }

    /// Impressions summed over all variants.
    #[must_use]
    pub fn total_impressions(&self) -> u64 {
        self.variants.iter().map(|v| v.metrics.impressions()).sum()
    }

    /// Date after which the experiment is due for completion.
    ///
    /// The configured end date wins; otherwise `started_at + max_duration_days`.
    #[must_use]
    pub fn end_date(&self) -> Option<DateTime<Utc>> {
        self.schedule.end_date.or_else(|| {
            self.schedule
                .started_at
                .map(|start| start + Duration::days(i64::from(self.config.max_duration_days)))
        })
    }

    /// Whole days since the experiment first started (0 if never started).
    #[must_use]
    pub fn elapsed_days(&self, now: DateTime<Utc>) -> i64 {
        self.schedule
            .started_at
            .map_or(0, |start| (now - start).num_days().max(0))
    }

    /// Traffic share of each variant in percent, in variant order.
    ///
    /// When every variant carries an explicit weight those are used as-is.
    /// Otherwise the control receives `100 - traffic_split_percent` and the
    /// remaining variants split `traffic_split_percent` evenly.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the definition is malformed.
    #[allow(clippy::cast_precision_loss)]
    pub fn traffic_shares(&self) -> Result<Vec<f64>> {
        self.check_variants()?;

        let weighted = self
            .variants
            .iter()
            .filter(|v| v.traffic_weight.is_some())
            .count();

        let shares: Vec<f64> = if weighted == self.variants.len() {
            self.variants
                .iter()
                .filter_map(|v| v.traffic_weight)
                .collect()
        } else if weighted == 0 {
            let split = self.config.traffic_split_percent;
            if !split.is_finite() || !(0.0..=100.0).contains(&split) {
                return Err(Error::Validation(format!(
                    "traffic split must be within 0..=100, got {split}"
                )));
            }
            let treatments = self.variants.len() - 1;
            if treatments == 0 {
                vec![100.0]
            } else {
                let each = split / treatments as f64;
                self.variants
                    .iter()
                    .map(|v| if v.is_control { 100.0 - split } else { each })
                    .collect()
            }
        } else {
            return Err(Error::Validation(format!(
                "traffic weight set on {weighted} of {} variants; set it on all or none",
                self.variants.len()
            )));
        };

        if let Some(bad) = shares.iter().find(|s| !s.is_finite() || **s < 0.0) {
            return Err(Error::Validation(format!(
                "traffic weight must be a non-negative number, got {bad}"
            )));
        }
        let total: f64 = shares.iter().sum();
        if (total - 100.0).abs() > DEFAULT_SPLIT_TOLERANCE {
            return Err(Error::Validation(format!(
                "traffic shares must sum to 100, got {total}"
            )));
        }
        Ok(shares)
    }

    /// Check the experiment definition.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for zero variants, a control count other
    /// than one, duplicate variant IDs, a bad traffic split, or
    /// `min_duration_days > max_duration_days`.
    pub fn validate(&self) -> Result<()> {
        self.traffic_shares()?;
        if self.config.min_duration_days > self.config.max_duration_days {
            return Err(Error::Validation(format!(
                "min_duration_days ({}) exceeds max_duration_days ({})",
                self.config.min_duration_days, self.config.max_duration_days
            )));
        }
        Ok(())
    }

    fn check_variants(&self) -> Result<()> {
        if self.variants.is_empty() {
            return Err(Error::Validation(format!(
                "experiment {} has no variants",
                self.id
            )));
        }
        let controls = self.variants.iter().filter(|v| v.is_control).count();
        if controls != 1 {
            return Err(Error::Validation(format!(
                "experiment {} must have exactly one control variant, found {controls}",
                self.id
            )));
        }
        let mut seen = HashSet::with_capacity(self.variants.len());
        if let Some(dup) = self.variants.iter().find(|v| !seen.insert(v.id.as_str())) {
            return Err(Error::Validation(format!(
                "duplicate variant id {} in experiment {}",
                dup.id, self.id
            )));
        }
        Ok(())
    }
}

/// Builder for `Experiment`.
#[derive(Debug)]
pub struct ExperimentBuilder {
    id: String,
    name: String,
    description: Option<String>,
    experiment_type: ExperimentType,
    config: ExperimentConfig,
    variants: Vec<Variant>,
    end_date: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl ExperimentBuilder {
    /// Create a new builder with required fields.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            experiment_type: ExperimentType::default(),
            config: ExperimentConfig::default(),
            variants: Vec::new(),
            end_date: None,
            created_at: Utc::now(),
        }
    }

    /// Set the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the experiment type.
    #[must_use]
    pub const fn experiment_type(mut self, experiment_type: ExperimentType) -> Self {
        self.experiment_type = experiment_type;
        self
    }

    /// Set the configuration block.
    #[must_use]
    pub fn config(mut self, config: ExperimentConfig) -> Self {
        self.config = config;
        self
    }

    /// Append a variant.
    #[must_use]
    pub fn variant(mut self, variant: Variant) -> Self {
        self.variants.push(variant);
        self
    }

    /// Set an explicit end date.
    #[must_use]
    pub const fn end_date(mut self, end_date: DateTime<Utc>) -> Self {
        self.end_date = Some(end_date);
        self
    }

    /// Set a custom creation timestamp (useful for deserialization/testing).
    #[must_use]
    pub const fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Build and validate the `Experiment`, in `Draft` status.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the definition is malformed.
    pub fn build(self) -> Result<Experiment> {
        let experiment = Experiment {
            id: self.id,
            name: self.name,
            description: self.description,
            experiment_type: self.experiment_type,
            status: ExperimentStatus::Draft,
            config: self.config,
            variants: self.variants,
            results: Results::default(),
            schedule: Schedule {
                end_date: self.end_date,
                ..Schedule::default()
            },
            version: 0,
            created_at: self.created_at,
        };
        experiment.validate()?;
        Ok(experiment)
    }
}
