//! Variant Record - one candidate version and the users bucketed into it

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Metrics;

/// Kind of user interaction recorded against a variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// User was shown the variant.
    Impression,
    /// User completed the experiment's goal.
    Conversion,
    /// User clicked through.
    Click,
    /// User left without interacting.
    Bounce,
}

/// One entry in an assigned user's event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserEvent {
    kind: EventKind,
    occurred_at: DateTime<Utc>,
    revenue: f64,
}

impl UserEvent {
    pub(crate) const fn new(kind: EventKind, occurred_at: DateTime<Utc>, revenue: f64) -> Self {
        Self {
            kind,
            occurred_at,
            revenue,
        }
    }

    /// Get the event kind.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        self.kind
    }

    /// Get the event timestamp.
    #[must_use]
    pub const fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    /// Revenue attached to the event (zero except for conversions).
    #[must_use]
    pub const fn revenue(&self) -> f64 {
        self.revenue
    }
}

/// A user bucketed into a variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignedUser {
    user_id: String,
    assigned_at: DateTime<Utc>,
    converted: bool,
    revenue: f64,
    events: Vec<UserEvent>,
}

impl AssignedUser {
    pub(crate) fn new(user_id: impl Into<String>, assigned_at: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.into(),
            assigned_at,
            converted: false,
            revenue: 0.0,
            events: Vec::new(),
        }
    }

    /// Get the external user/session identifier.
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Get the assignment timestamp.
    #[must_use]
    pub const fn assigned_at(&self) -> DateTime<Utc> {
        self.assigned_at
    }

    /// Whether this user has converted.
    #[must_use]
    pub const fn converted(&self) -> bool {
        self.converted
    }

    /// Revenue attributed to this user's conversion.
    #[must_use]
    pub const fn revenue(&self) -> f64 {
        self.revenue
    }

    /// The user's event log, oldest first.
    #[must_use]
    pub fn events(&self) -> &[UserEvent] {
        &self.events
    }

    pub(crate) fn mark_converted(&mut self, revenue: f64) {
        self.converted = true;
        self.revenue = revenue;
    }

    /// Append an event, dropping the oldest entries beyond `max_events`.
    pub(crate) fn push_event(&mut self, event: UserEvent, max_events: usize) {
        self.events.push(event);
        if self.events.len() > max_events {
            let excess = self.events.len() - max_events;
            self.events.drain(..excess);
        }
    }
}

/// Variant Record represents one candidate version in an experiment.
///
/// The `content` payload is whatever the caller needs to render the variant
/// (headline text, button colour, price table). The engine never inspects it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) is_control: bool,
    pub(crate) content: serde_json::Value,
    pub(crate) traffic_weight: Option<f64>,
    pub(crate) metrics: Metrics,
    pub(crate) assigned_users: Vec<AssignedUser>,
}

impl Variant {
    /// Create a treatment variant.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::builder(id, name).build()
    }

    /// Create the control variant.
    #[must_use]
    pub fn control(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::builder(id, name).control().build()
    }

    /// Create a builder for constructing a variant with optional fields.
    #[must_use]
    pub fn builder(id: impl Into<String>, name: impl Into<String>) -> VariantBuilder {
        VariantBuilder::new(id, name)
    }

    /// Get the variant ID.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Get the variant name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this is the control variant.
    #[must_use]
    pub const fn is_control(&self) -> bool {
        self.is_control
    }

    /// Opaque creative/config payload.
    #[must_use]
    pub const fn content(&self) -> &serde_json::Value {
        &self.content
    }

    /// Explicit traffic share in percent, if configured.
    #[must_use]
    pub const fn traffic_weight(&self) -> Option<f64> {
        self.traffic_weight
    }

    /// Get the variant's metrics.
    #[must_use]
    pub const fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Users bucketed into this variant.
    #[must_use]
    pub fn assigned_users(&self) -> &[AssignedUser] {
        &self.assigned_users
    }

    /// Look up an assigned user by ID.
    #[must_use]
    pub fn assigned_user(&self, user_id: &str) -> Option<&AssignedUser> {
        self.assigned_users.iter().find(|u| u.user_id == user_id)
    }
}

/// Builder for `Variant`.
#[derive(Debug)]
pub struct VariantBuilder {
    id: String,
    name: String,
    is_control: bool,
    content: serde_json::Value,
    traffic_weight: Option<f64>,
    metrics: Metrics,
}

impl VariantBuilder {
    /// Create a new builder with required fields.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            is_control: false,
            content: serde_json::Value::Null,
            traffic_weight: None,
            metrics: Metrics::default(),
        }
    }

    /// Mark the variant as the control.
    #[must_use]
    pub const fn control(mut self) -> Self {
        self.is_control = true;
        self
    }

    /// Set the opaque content payload.
    #[must_use]
    pub fn content(mut self, content: serde_json::Value) -> Self {
        self.content = content;
        self
    }

    /// Set an explicit traffic share in percent.
    ///
    /// Either every variant of an experiment carries a weight or none does.
    #[must_use]
    pub const fn traffic_weight(mut self, percent: f64) -> Self {
        self.traffic_weight = Some(percent);
        self
    }

    /// Seed the variant with existing counters (imports, fixtures).
    #[must_use]
    pub const fn metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = metrics;
        self
    }

    /// Build the `Variant`.
    #[must_use]
    pub fn build(self) -> Variant {
        Variant {
            id: self.id,
            name: self.name,
            is_control: self.is_control,
            content: self.content,
            traffic_weight: self.traffic_weight,
            metrics: self.metrics,
            assigned_users: Vec::new(),
        }
    }
}
