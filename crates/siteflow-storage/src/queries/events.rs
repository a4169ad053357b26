// SPDX-FileCopyrightText: 2026 Siteflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only event log with dedupe-key idempotence and attribution lookup.

use chrono::Utc;
use rusqlite::params;
use siteflow_core::SiteflowError;
use siteflow_core::types::{Event, EventFilter, NewEvent, Properties};

use crate::database::{Database, format_ts, parse_ts};

/// Limit applied when the caller does not give one.
pub const DEFAULT_LIST_LIMIT: u32 = 50;
/// Largest page `list_events` will return.
pub const MAX_LIST_LIMIT: u32 = 100;

/// Normalize a caller-supplied listing limit.
pub fn clamp_limit(limit: Option<u32>) -> u32 {
    match limit {
        None | Some(0) => DEFAULT_LIST_LIMIT,
        Some(n) => n.min(MAX_LIST_LIMIT),
    }
}

struct EventRow {
    id: i64,
    site_id: String,
    timestamp: String,
    user_id: String,
    event_name: String,
    utm_source: Option<String>,
    properties: String,
    dedupe_key: String,
    ingested_at: String,
    metadata: Option<String>,
}

impl EventRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            site_id: row.get(1)?,
            timestamp: row.get(2)?,
            user_id: row.get(3)?,
            event_name: row.get(4)?,
            utm_source: row.get(5)?,
            properties: row.get(6)?,
            dedupe_key: row.get(7)?,
            ingested_at: row.get(8)?,
            metadata: row.get(9)?,
        })
    }

    fn into_event(self) -> Result<Event, SiteflowError> {
        let properties: Properties =
            serde_json::from_str(&self.properties).map_err(SiteflowError::storage)?;
        let metadata = self
            .metadata
            .as_deref()
            .map(serde_json::from_str::<Properties>)
            .transpose()
            .map_err(SiteflowError::storage)?;
        Ok(Event {
            id: self.id,
            timestamp: parse_ts(&self.timestamp)?,
            ingested_at: parse_ts(&self.ingested_at)?,
            site_id: self.site_id,
            user_id: self.user_id,
            event_name: self.event_name,
            utm_source: self.utm_source,
            properties,
            dedupe_key: self.dedupe_key,
            metadata,
        })
    }
}

/// Insert an event unless its dedupe key already exists.
///
/// Returns `true` when this call created the row. A blank source tag is
/// stored as NULL and an empty metadata map is not stored.
pub async fn insert_event(db: &Database, event: &NewEvent) -> Result<bool, SiteflowError> {
    let properties = serde_json::to_string(&event.properties).map_err(SiteflowError::storage)?;
    let metadata = match &event.metadata {
        Some(m) if !m.is_empty() => {
            Some(serde_json::to_string(m).map_err(SiteflowError::storage)?)
        }
        _ => None,
    };
    let utm_source = event
        .utm_source
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    let site_id = event.site_id.clone();
    let timestamp = format_ts(&event.timestamp);
    let user_id = event.user_id.clone();
    let event_name = event.event_name.clone();
    let dedupe_key = event.dedupe_key.clone();
    let ingested_at = format_ts(&Utc::now());

    let affected = db
        .connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO events
                     (site_id, timestamp, user_id, event_name, utm_source,
                      properties, dedupe_key, ingested_at, metadata)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT(dedupe_key) DO NOTHING",
                params![
                    site_id,
                    timestamp,
                    user_id,
                    event_name,
                    utm_source,
                    properties,
                    dedupe_key,
                    ingested_at,
                    metadata,
                ],
            )
        })
        .await
        .map_err(crate::database::map_tr_err)?;
    Ok(affected > 0)
}

/// Most recent non-empty source tag for a subject, across all event kinds.
///
/// Ties on timestamp are broken by the higher sequence id.
pub async fn latest_attribution(
    db: &Database,
    user_id: &str,
) -> Result<Option<String>, SiteflowError> {
    let user_id = user_id.to_string();
    db.connection()
        .call(move |conn| {
            let result = conn.query_row(
                "SELECT utm_source FROM events
                 WHERE user_id = ?1 AND utm_source IS NOT NULL AND utm_source != ''
                 ORDER BY timestamp DESC, id DESC
                 LIMIT 1",
                params![user_id],
                |row| row.get::<_, String>(0),
            );
            match result {
                Ok(tag) => Ok(Some(tag)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// List events newest first, optionally filtered by site and subject.
pub async fn list_events(
    db: &Database,
    filter: &EventFilter,
    limit: Option<u32>,
) -> Result<Vec<Event>, SiteflowError> {
    let site_id = filter.site_id.clone().filter(|s| !s.is_empty());
    let user_id = filter.user_id.clone().filter(|s| !s.is_empty());
    let limit = clamp_limit(limit);
    let rows = db
        .connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, site_id, timestamp, user_id, event_name, utm_source,
                        properties, dedupe_key, ingested_at, metadata
                 FROM events
                 WHERE (?1 IS NULL OR site_id = ?1) AND (?2 IS NULL OR user_id = ?2)
                 ORDER BY timestamp DESC, id DESC
                 LIMIT ?3",
            )?;
            let rows = stmt.query_map(params![site_id, user_id, limit], EventRow::from_row)?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(crate::database::map_tr_err)?;
    rows.into_iter().map(EventRow::into_event).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone};
    use serde_json::json;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 1, 10, minute, 0).unwrap()
    }

    fn make_event(key: &str, user: &str, utm: Option<&str>, ts: DateTime<Utc>) -> NewEvent {
        let mut properties = Properties::new();
        properties.insert("page".into(), json!("/landing"));
        properties.insert("count".into(), json!(3));
        NewEvent {
            site_id: "site-a".into(),
            timestamp: ts,
            user_id: user.into(),
            event_name: "page_view".into(),
            utm_source: utm.map(str::to_string),
            properties,
            dedupe_key: key.into(),
            metadata: None,
        }
    }

    #[tokio::test]
    async fn duplicate_dedupe_key_is_ignored() {
        let (db, _dir) = setup_db().await;
        let event = make_event("seed:1", "u1", Some("google"), at(0));

        assert!(insert_event(&db, &event).await.unwrap());
        assert!(!insert_event(&db, &event).await.unwrap());

        let rows = list_events(&db, &EventFilter::default(), None).await.unwrap();
        assert_eq!(rows.len(), 1);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn concurrent_inserts_create_exactly_one_row() {
        let (db, dir) = setup_db().await;
        // A second connection to the same file races through SQLite's own locking.
        let other = Database::open(dir.path().join("test.db").to_str().unwrap())
            .await
            .unwrap();
        let event = make_event("order:site-a:o1", "u1", None, at(0));

        let attempts = (0..16).map(|i| {
            let handle = if i % 2 == 0 { db.clone() } else { other.clone() };
            let event = event.clone();
            async move { insert_event(&handle, &event).await }
        });
        let results = futures::future::join_all(attempts).await;

        let created = results
            .into_iter()
            .map(|r| r.expect("no caller should observe an error"))
            .filter(|inserted| *inserted)
            .count();
        assert_eq!(created, 1);
        other.close().await.unwrap();
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn properties_and_metadata_round_trip_in_order() {
        let (db, _dir) = setup_db().await;
        let mut event = make_event("k1", "u1", Some("  "), at(0));
        let mut metadata = Properties::new();
        metadata.insert("source".into(), json!("sync"));
        metadata.insert("nested".into(), json!({"a": [1, true, null]}));
        event.metadata = Some(metadata.clone());
        insert_event(&db, &event).await.unwrap();

        let mut empty_meta = make_event("k2", "u1", None, at(1));
        empty_meta.metadata = Some(Properties::new());
        insert_event(&db, &empty_meta).await.unwrap();

        let rows = list_events(&db, &EventFilter::default(), None).await.unwrap();
        assert_eq!(rows[0].dedupe_key, "k2");
        assert_eq!(rows[0].metadata, None);

        let stored = &rows[1];
        assert_eq!(stored.utm_source, None, "blank tag is stored as NULL");
        assert_eq!(stored.metadata.as_ref(), Some(&metadata));
        let keys: Vec<&String> = stored.properties.keys().collect();
        assert_eq!(keys, vec!["page", "count"]);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn latest_attribution_uses_timestamp_then_id() {
        let (db, _dir) = setup_db().await;
        assert_eq!(latest_attribution(&db, "u1").await.unwrap(), None);

        insert_event(&db, &make_event("a", "u1", Some("google"), at(5))).await.unwrap();
        insert_event(&db, &make_event("b", "u1", Some("kakao"), at(1))).await.unwrap();
        insert_event(&db, &make_event("c", "u1", None, at(9))).await.unwrap();
        insert_event(&db, &make_event("d", "u2", Some("newsletter"), at(30))).await.unwrap();
        assert_eq!(
            latest_attribution(&db, "u1").await.unwrap().as_deref(),
            Some("google")
        );

        // Same timestamp: the later insert wins.
        insert_event(&db, &make_event("e", "u1", Some("facebook"), at(5))).await.unwrap();
        assert_eq!(
            latest_attribution(&db, "u1").await.unwrap().as_deref(),
            Some("facebook")
        );
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn list_filters_and_orders_newest_first() {
        let (db, _dir) = setup_db().await;
        insert_event(&db, &make_event("a", "u1", None, at(1))).await.unwrap();
        insert_event(&db, &make_event("b", "u2", None, at(2))).await.unwrap();
        let mut other_site = make_event("c", "u1", None, at(3));
        other_site.site_id = "site-b".into();
        insert_event(&db, &other_site).await.unwrap();

        let filter = EventFilter {
            site_id: Some("site-a".into()),
            user_id: None,
        };
        let keys: Vec<String> = list_events(&db, &filter, None)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.dedupe_key)
            .collect();
        assert_eq!(keys, vec!["b", "a"]);

        let filter = EventFilter {
            site_id: None,
            user_id: Some("u1".into()),
        };
        let keys: Vec<String> = list_events(&db, &filter, Some(1))
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.dedupe_key)
            .collect();
        assert_eq!(keys, vec!["c"]);
        db.close().await.unwrap();
    }

    #[test]
    fn limit_is_clamped() {
        assert_eq!(clamp_limit(None), DEFAULT_LIST_LIMIT);
        assert_eq!(clamp_limit(Some(0)), DEFAULT_LIST_LIMIT);
        assert_eq!(clamp_limit(Some(7)), 7);
        assert_eq!(clamp_limit(Some(5_000)), MAX_LIST_LIMIT);
    }
}
