// SPDX-FileCopyrightText: 2026 Siteflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Manual and seeded events.
//!
//! Seeded events exist to exercise attribution: each one carries a random
//! `utm_source` that later synced signups and orders for the same user inherit.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use siteflow_core::types::{NewEvent, Properties};
use siteflow_core::{EventStore, SiteflowError};

/// Event names drawn for seeded events.
pub const SEED_EVENT_NAMES: [&str; 4] = ["page_view", "product_view", "basket_add", "checkout_view"];
/// Attribution tags drawn for seeded events.
pub const SEED_UTM_SOURCES: [&str; 5] = ["google", "facebook", "newsletter", "kakao", "direct"];

/// Overrides for a seeded event. Unset fields are drawn at random.
#[derive(Debug, Clone, Default)]
pub struct SeedRequest {
    pub site_id: String,
    pub user_id: Option<String>,
    pub event_name: Option<String>,
    pub utm_source: Option<String>,
}

/// A caller-supplied event.
#[derive(Debug, Clone, Default)]
pub struct ManualEvent {
    pub site_id: String,
    pub user_id: String,
    pub event_name: String,
    pub utm_source: Option<String>,
    pub properties: Properties,
    pub dedupe_key: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub metadata: Option<Properties>,
}

/// Result of writing one event: the event as submitted and whether it was new.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestOutcome {
    pub inserted: bool,
    pub event: NewEvent,
}

/// Writes manual and randomly seeded events.
pub struct EventSeeder {
    events: Arc<dyn EventStore>,
    rng: Mutex<StdRng>,
}

impl EventSeeder {
    pub fn new(events: Arc<dyn EventStore>, rng: StdRng) -> Self {
        Self {
            events,
            rng: Mutex::new(rng),
        }
    }

    /// Seeder backed by an OS-seeded generator.
    pub fn from_entropy(events: Arc<dyn EventStore>) -> Self {
        Self::new(events, StdRng::from_entropy())
    }

    /// Insert one attribution-tagged event for a site.
    pub async fn seed_attribution(&self, request: SeedRequest) -> Result<IngestOutcome, SiteflowError> {
        let site_id = request.site_id.trim();
        if site_id.is_empty() {
            return Err(SiteflowError::Validation("site_id required".into()));
        }

        let event = {
            let mut rng = self.rng.lock().await;
            let user_id = non_blank(request.user_id)
                .unwrap_or_else(|| format!("user-{}", rng.gen_range(1..=10_000u32)));
            let event_name = non_blank(request.event_name)
                .unwrap_or_else(|| pick(&mut *rng, &SEED_EVENT_NAMES).to_string());
            let utm_source = non_blank(request.utm_source)
                .unwrap_or_else(|| pick(&mut *rng, &SEED_UTM_SOURCES).to_string());

            let mut properties = Properties::new();
            properties.insert("session_id".into(), json!(random_uuid(&mut *rng).to_string()));
            properties.insert("page".into(), json!("/landing"));
            properties.insert("referrer".into(), json!("https://example.io"));

            NewEvent {
                site_id: site_id.to_string(),
                timestamp: Utc::now(),
                user_id,
                event_name,
                utm_source: Some(utm_source),
                properties,
                dedupe_key: format!("seed:{}", random_uuid(&mut *rng)),
                metadata: None,
            }
        };

        let inserted = self.events.insert_event(&event).await?;
        if !inserted {
            return Err(SiteflowError::Internal(format!(
                "seeded event {} collided with an existing dedupe key",
                event.dedupe_key
            )));
        }
        info!(
            site_id,
            user_id = %event.user_id,
            event_name = %event.event_name,
            utm_source = event.utm_source.as_deref().unwrap_or_default(),
            "attribution event seeded"
        );
        Ok(IngestOutcome { inserted, event })
    }

    /// Store a caller-supplied event.
    ///
    /// Site, user and event name are required. Without a dedupe key the event
    /// gets a fresh `manual:{uuid}` key; without a timestamp it is stamped now.
    pub async fn add_event(&self, manual: ManualEvent) -> Result<IngestOutcome, SiteflowError> {
        let site_id = manual.site_id.trim();
        let user_id = manual.user_id.trim();
        let event_name = manual.event_name.trim();
        if site_id.is_empty() || user_id.is_empty() || event_name.is_empty() {
            return Err(SiteflowError::Validation(
                "site_id, user_id, and event_name are required".into(),
            ));
        }

        let dedupe_key = match non_blank(manual.dedupe_key) {
            Some(key) => key,
            None => format!("manual:{}", random_uuid(&mut *self.rng.lock().await)),
        };
        let event = NewEvent {
            site_id: site_id.to_string(),
            timestamp: manual.timestamp.unwrap_or_else(Utc::now),
            user_id: user_id.to_string(),
            event_name: event_name.to_string(),
            utm_source: non_blank(manual.utm_source),
            properties: manual.properties,
            dedupe_key,
            metadata: manual.metadata.filter(|m| !m.is_empty()),
        };

        let inserted = self.events.insert_event(&event).await?;
        info!(
            site_id,
            user_id,
            event_name,
            dedupe_key = %event.dedupe_key,
            inserted,
            "manual event processed"
        );
        Ok(IngestOutcome { inserted, event })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn pick<'a, R: Rng>(rng: &mut R, options: &[&'a str]) -> &'a str {
    options[rng.gen_range(0..options.len())]
}

fn random_uuid<R: Rng>(rng: &mut R) -> Uuid {
    uuid::Builder::from_random_bytes(rng.r#gen()).into_uuid()
}
