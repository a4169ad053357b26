// SPDX-FileCopyrightText: 2026 Siteflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire types for the source's paginated responses.

use serde::Deserialize;
use siteflow_core::types::{Page, RemoteEntity};

/// Envelope shared by every paged collection.
///
/// The item array is named after the collection (`users`, `orders`).
#[derive(Debug, Clone, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct PagedResponse<T> {
    pub page: u32,
    pub page_size: u32,
    pub total: u64,
    pub has_more: bool,
    #[serde(default)]
    pub next_page: Option<u32>,
    #[serde(default, alias = "users", alias = "orders")]
    pub items: Vec<T>,
}

impl<T> PagedResponse<T> {
    /// Convert into a [`Page`], wrapping each item.
    pub fn into_page(self, wrap: impl Fn(T) -> RemoteEntity) -> Page {
        Page {
            page: self.page,
            page_size: self.page_size,
            total: self.total,
            has_more: self.has_more,
            next_page: self.next_page,
            items: self.items.into_iter().map(wrap).collect(),
        }
    }
}

/// Error body the source returns alongside non-2xx statuses.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use siteflow_core::types::{RemoteOrder, RemoteUser};

    #[test]
    fn users_envelope_decodes() {
        let body = r#"{
            "page": 2, "page_size": 10, "total": 12, "has_more": false, "next_page": null,
            "users": [{"id": "u11", "site_id": "s1", "email": "a@b.c", "first_name": "A",
                       "last_name": "B", "signup_at": "2026-01-05T09:00:00Z"}]
        }"#;
        let parsed: PagedResponse<RemoteUser> = serde_json::from_str(body).unwrap();
        let page = parsed.into_page(RemoteEntity::User);
        assert_eq!(page.page, 2);
        assert!(!page.has_more);
        assert_eq!(page.next_page, None);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].entity_id(), "u11");
    }

    #[test]
    fn orders_envelope_decodes_without_next_page() {
        let body = r#"{
            "page": 1, "page_size": 10, "total": 1, "has_more": true,
            "orders": [{"id": "o1", "site_id": "s1", "user_id": "u1", "order_number": "N-1",
                        "total_amount": 4200, "currency": "KRW", "placed_at": "2026-01-05T09:00:00Z"}]
        }"#;
        let parsed: PagedResponse<RemoteOrder> = serde_json::from_str(body).unwrap();
        let page = parsed.into_page(RemoteEntity::Order);
        assert!(page.has_more);
        assert_eq!(page.next_page, None);
        assert_eq!(page.items[0].subject_id(), "u1");
    }
}
