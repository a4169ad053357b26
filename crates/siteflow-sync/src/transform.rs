// SPDX-FileCopyrightText: 2026 Siteflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Remote entity to event mapping and dedupe key derivation.

use chrono::SecondsFormat;
use serde_json::json;
use siteflow_core::types::{EntityKind, NewEvent, Properties, RemoteEntity};

/// Event name recorded for a synced user.
pub const SIGNUP_EVENT: &str = "signup";
/// Event name recorded for a synced order.
pub const ORDER_EVENT: &str = "order_created";

/// Deterministic dedupe key for a remote entity.
///
/// Each kind has its own prefix so ids shared across collections never collide.
pub fn dedupe_key(kind: EntityKind, site_id: &str, entity_id: &str) -> String {
    let prefix = match kind {
        EntityKind::Users => "signup",
        EntityKind::Orders => "order",
    };
    format!("{prefix}:{site_id}:{entity_id}")
}

/// Build the event for a remote entity, carrying the subject's attribution.
pub fn entity_to_event(
    site_id: &str,
    entity: &RemoteEntity,
    attribution: Option<String>,
) -> NewEvent {
    let (event_name, timestamp, properties) = match entity {
        RemoteEntity::User(user) => {
            let mut props = Properties::new();
            props.insert("email".into(), json!(user.email));
            props.insert("first_name".into(), json!(user.first_name));
            props.insert("last_name".into(), json!(user.last_name));
            props.insert(
                "signup_at".into(),
                json!(user.signup_at.to_rfc3339_opts(SecondsFormat::Secs, true)),
            );
            (SIGNUP_EVENT, user.signup_at, props)
        }
        RemoteEntity::Order(order) => {
            let mut props = Properties::new();
            props.insert("order_id".into(), json!(order.id));
            props.insert("order_number".into(), json!(order.order_number));
            props.insert("total_amount".into(), json!(order.total_amount));
            props.insert("currency".into(), json!(order.currency));
            props.insert("user_id".into(), json!(order.user_id));
            props.insert(
                "placed_at".into(),
                json!(order.placed_at.to_rfc3339_opts(SecondsFormat::Secs, true)),
            );
            (ORDER_EVENT, order.placed_at, props)
        }
    };

    let kind = entity.kind();
    let mut metadata = Properties::new();
    metadata.insert("source".into(), json!("sync"));
    metadata.insert("kind".into(), json!(kind.to_string()));

    NewEvent {
        site_id: site_id.to_string(),
        timestamp,
        user_id: entity.subject_id().to_string(),
        event_name: event_name.to_string(),
        utm_source: attribution,
        properties,
        dedupe_key: dedupe_key(kind, site_id, entity.entity_id()),
        metadata: Some(metadata),
    }
}
