// SPDX-FileCopyrightText: 2026 Siteflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by the storage, source, sync, and workflow crates.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{Display, EnumString};

use crate::error::SiteflowError;

/// Ordered JSON object used for event properties and metadata.
pub type Properties = Map<String, Value>;

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the type of adapter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Storage,
    Source,
}

// --- Credentials ---

/// A registered site and the secret used to read from its source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub site_id: String,
    pub access_key: String,
    pub base_url: String,
    pub registered_at: DateTime<Utc>,
}

/// Input for registering (or re-registering) a site.
///
/// When `registered_at` is `None` the store stamps the current time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCredential {
    pub site_id: String,
    pub access_key: String,
    pub base_url: String,
    pub registered_at: Option<DateTime<Utc>>,
}

/// Site profile returned by the source when a credential is verified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteProfile {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

// --- Events ---

/// A persisted, append-only event row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: i64,
    pub site_id: String,
    pub timestamp: DateTime<Utc>,
    pub user_id: String,
    pub event_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub utm_source: Option<String>,
    pub properties: Properties,
    pub dedupe_key: String,
    pub ingested_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Properties>,
}

/// An event that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewEvent {
    pub site_id: String,
    pub timestamp: DateTime<Utc>,
    pub user_id: String,
    pub event_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub utm_source: Option<String>,
    pub properties: Properties,
    pub dedupe_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Properties>,
}

/// Filters for event listing. `None` fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    pub site_id: Option<String>,
    pub user_id: Option<String>,
}

// --- Sync ---

/// Remote collections that can be synchronized.
///
/// Variant order is the execution order within one run: subjects first,
/// then entities that depend on them.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Users,
    Orders,
}

impl EntityKind {
    /// All kinds, in execution order.
    pub const ALL: [EntityKind; 2] = [EntityKind::Users, EntityKind::Orders];
}

/// Optional `[start, end]` filter applied to remote collections.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
}

impl TimeWindow {
    /// Parse a window from optional RFC3339 or `YYYY-MM-DD` strings.
    ///
    /// Blank strings are treated as absent. A start after the end is rejected.
    pub fn parse(start: Option<&str>, end: Option<&str>) -> Result<Self, SiteflowError> {
        let window = Self {
            start: parse_optional(start, "start")?,
            end: parse_optional(end, "end")?,
        };
        window.validate()?;
        Ok(window)
    }

    /// Rejects windows whose start is after their end.
    pub fn validate(&self) -> Result<(), SiteflowError> {
        if let (Some(start), Some(end)) = (self.start, self.end)
            && start > end
        {
            return Err(SiteflowError::Validation(format!(
                "window start {start} is after end {end}"
            )));
        }
        Ok(())
    }
}

fn parse_optional(value: Option<&str>, field: &str) -> Result<Option<DateTime<Utc>>, SiteflowError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => parse_time(raw)
            .map(Some)
            .map_err(|_| SiteflowError::Validation(format!("invalid {field} time `{raw}`"))),
    }
}

/// Parse an RFC3339 timestamp or a bare `YYYY-MM-DD` date (midnight UTC).
pub fn parse_time(raw: &str) -> Result<DateTime<Utc>, SiteflowError> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| SiteflowError::Validation(format!("unrecognized time format `{raw}`")))
}

/// Aggregate effects of syncing one entity kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub inserted: u64,
    pub skipped: u64,
    pub pages_processed: u64,
    pub total_remote: u64,
}

impl RunSummary {
    /// Count one persisted (`true`) or deduplicated (`false`) entity.
    pub fn record(&mut self, inserted: bool) {
        if inserted {
            self.inserted += 1;
        } else {
            self.skipped += 1;
        }
    }

    /// Keep the largest remote total reported by any page.
    pub fn observe_total(&mut self, total: u64) {
        self.total_remote = self.total_remote.max(total);
    }
}

/// A request for one page of a remote collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
    pub window: TimeWindow,
}

/// One page of a remote collection plus its pagination flags.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub page: u32,
    pub page_size: u32,
    pub total: u64,
    pub has_more: bool,
    pub next_page: Option<u32>,
    pub items: Vec<RemoteEntity>,
}

/// A user record served by the source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteUser {
    pub id: String,
    #[serde(default)]
    pub site_id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub signup_at: DateTime<Utc>,
}

/// An order record served by the source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteOrder {
    pub id: String,
    #[serde(default)]
    pub site_id: String,
    pub user_id: String,
    #[serde(default)]
    pub order_number: String,
    #[serde(default)]
    pub total_amount: i64,
    #[serde(default)]
    pub currency: String,
    pub placed_at: DateTime<Utc>,
}

/// Any entity a page can carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteEntity {
    User(RemoteUser),
    Order(RemoteOrder),
}

impl RemoteEntity {
    /// The kind of collection this entity belongs to.
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::User(_) => EntityKind::Users,
            Self::Order(_) => EntityKind::Orders,
        }
    }

    /// Identity of the entity within its collection.
    pub fn entity_id(&self) -> &str {
        match self {
            Self::User(u) => &u.id,
            Self::Order(o) => &o.id,
        }
    }

    /// The subject (user) the entity is attributed to.
    pub fn subject_id(&self) -> &str {
        match self {
            Self::User(u) => &u.id,
            Self::Order(o) => &o.user_id,
        }
    }
}

// --- Runs ---

fn default_page() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

/// A request to run one orchestrated sync for a site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRequest {
    pub site_id: String,
    #[serde(flatten)]
    pub window: TimeWindow,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_true")]
    pub include_users: bool,
    #[serde(default = "default_true")]
    pub include_orders: bool,
    #[serde(default)]
    pub reason: String,
}

impl RunRequest {
    /// A request covering every entity kind from page 1 with no window.
    pub fn full(site_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            site_id: site_id.into(),
            window: TimeWindow::default(),
            page: 1,
            include_users: true,
            include_orders: true,
            reason: reason.into(),
        }
    }

    /// Whether the given kind is part of this run.
    pub fn includes(&self, kind: EntityKind) -> bool {
        match kind {
            EntityKind::Users => self.include_users,
            EntityKind::Orders => self.include_orders,
        }
    }

    /// Included kinds, in execution order.
    pub fn kinds(&self) -> Vec<EntityKind> {
        EntityKind::ALL
            .into_iter()
            .filter(|k| self.includes(*k))
            .collect()
    }
}

/// Outcome of a completed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResult {
    pub run_id: String,
    pub site_id: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub users_summary: Option<RunSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orders_summary: Option<RunSummary>,
}

impl RunResult {
    /// Store the summary for a kind.
    pub fn set_summary(&mut self, kind: EntityKind, summary: RunSummary) {
        match kind {
            EntityKind::Users => self.users_summary = Some(summary),
            EntityKind::Orders => self.orders_summary = Some(summary),
        }
    }

    /// The summary recorded for a kind, if that kind ran.
    pub fn summary(&self, kind: EntityKind) -> Option<&RunSummary> {
        match kind {
            EntityKind::Users => self.users_summary.as_ref(),
            EntityKind::Orders => self.orders_summary.as_ref(),
        }
    }
}

/// Lifecycle status of a journaled run.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Succeeded,
    Failed,
}

/// Outcome of one entity kind within a journaled run.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Completed,
    Failed,
}

/// Journal entry for one entity kind of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    pub kind: EntityKind,
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<RunSummary>,
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Journal entry for a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: String,
    pub site_id: String,
    pub request: RunRequest,
    pub status: RunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub steps: Vec<StepRecord>,
}
