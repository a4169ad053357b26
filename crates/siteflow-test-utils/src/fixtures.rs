// SPDX-FileCopyrightText: 2026 Siteflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deterministic remote entities and credentials.
//!
//! Timestamps are `minute` minutes after 2026-01-01T00:00:00Z.

use chrono::{DateTime, Duration, Utc};

use siteflow_core::types::{Credential, RemoteOrder, RemoteUser};

/// Access key accepted for fixture credentials.
pub const ACCESS_KEY: &str = "secret";

const BASE_EPOCH_SECS: i64 = 1_767_225_600;

pub fn at_minute(minute: i64) -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH + Duration::seconds(BASE_EPOCH_SECS + minute * 60)
}

pub fn user(id: &str, minute: i64) -> RemoteUser {
    RemoteUser {
        id: id.to_string(),
        site_id: "site-1".to_string(),
        email: format!("{id}@example.io"),
        first_name: "Test".to_string(),
        last_name: id.to_uppercase(),
        signup_at: at_minute(minute),
    }
}

/// Users `u1..=un`, one minute apart.
pub fn users(n: usize) -> Vec<RemoteUser> {
    (1..=n).map(|i| user(&format!("u{i}"), i as i64)).collect()
}

pub fn order(id: &str, user_id: &str, minute: i64) -> RemoteOrder {
    RemoteOrder {
        id: id.to_string(),
        site_id: "site-1".to_string(),
        user_id: user_id.to_string(),
        order_number: format!("ORD-{}", id.to_uppercase()),
        total_amount: 4200,
        currency: "KRW".to_string(),
        placed_at: at_minute(minute),
    }
}

/// Orders `o1..=on`, spread round-robin over the given users.
pub fn orders(n: usize, user_ids: &[&str]) -> Vec<RemoteOrder> {
    (1..=n)
        .map(|i| {
            let owner = user_ids[(i - 1) % user_ids.len()];
            order(&format!("o{i}"), owner, 100 + i as i64)
        })
        .collect()
}

pub fn credential(site_id: &str, base_url: &str) -> Credential {
    Credential {
        site_id: site_id.to_string(),
        access_key: ACCESS_KEY.to_string(),
        base_url: base_url.to_string(),
        registered_at: at_minute(0),
    }
}
