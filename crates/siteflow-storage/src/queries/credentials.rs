// SPDX-FileCopyrightText: 2026 Siteflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Credential registry operations.

use chrono::Utc;
use rusqlite::params;
use siteflow_core::SiteflowError;
use siteflow_core::types::{Credential, NewCredential};

use crate::database::{Database, format_ts, parse_ts};

struct CredentialRow {
    site_id: String,
    access_key: String,
    base_url: String,
    registered_at: String,
}

impl CredentialRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            site_id: row.get(0)?,
            access_key: row.get(1)?,
            base_url: row.get(2)?,
            registered_at: row.get(3)?,
        })
    }

    fn into_credential(self) -> Result<Credential, SiteflowError> {
        Ok(Credential {
            registered_at: parse_ts(&self.registered_at)?,
            site_id: self.site_id,
            access_key: self.access_key,
            base_url: self.base_url,
        })
    }
}

/// Insert or update a credential, returning the stored row.
///
/// On conflict only the access key and base URL change.
pub async fn register_credential(
    db: &Database,
    credential: &NewCredential,
) -> Result<Credential, SiteflowError> {
    let credential = credential.clone();
    let registered_at = format_ts(&credential.registered_at.unwrap_or_else(Utc::now));
    let row = db
        .connection()
        .call(move |conn| {
            conn.query_row(
                "INSERT INTO registered_sites (site_id, access_key, base_url, registered_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(site_id) DO UPDATE SET
                     access_key = excluded.access_key,
                     base_url = excluded.base_url
                 RETURNING site_id, access_key, base_url, registered_at",
                params![
                    credential.site_id,
                    credential.access_key,
                    credential.base_url,
                    registered_at,
                ],
                CredentialRow::from_row,
            )
        })
        .await
        .map_err(crate::database::map_tr_err)?;
    row.into_credential()
}

/// Delete a credential. Unknown sites yield `NotFound`.
pub async fn unregister_credential(db: &Database, site_id: &str) -> Result<(), SiteflowError> {
    let id = site_id.to_string();
    let affected = db
        .connection()
        .call(move |conn| conn.execute("DELETE FROM registered_sites WHERE site_id = ?1", params![id]))
        .await
        .map_err(crate::database::map_tr_err)?;
    if affected == 0 {
        return Err(SiteflowError::NotFound(format!("site {site_id} is not registered")));
    }
    Ok(())
}

/// Get a credential by site id.
pub async fn get_credential(
    db: &Database,
    site_id: &str,
) -> Result<Option<Credential>, SiteflowError> {
    let id = site_id.to_string();
    let row = db
        .connection()
        .call(move |conn| {
            let result = conn.query_row(
                "SELECT site_id, access_key, base_url, registered_at
                 FROM registered_sites WHERE site_id = ?1",
                params![id],
                CredentialRow::from_row,
            );
            match result {
                Ok(row) => Ok(Some(row)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)?;
    row.map(CredentialRow::into_credential).transpose()
}

/// List credentials, newest registration first.
pub async fn list_credentials(db: &Database) -> Result<Vec<Credential>, SiteflowError> {
    let rows = db
        .connection()
        .call(|conn| {
            let mut stmt = conn.prepare(
                "SELECT site_id, access_key, base_url, registered_at
                 FROM registered_sites ORDER BY registered_at DESC, site_id ASC",
            )?;
            let rows = stmt.query_map([], CredentialRow::from_row)?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(crate::database::map_tr_err)?;
    rows.into_iter().map(CredentialRow::into_credential).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    fn make_credential(site: &str, key: &str, day: u32) -> NewCredential {
        NewCredential {
            site_id: site.to_string(),
            access_key: key.to_string(),
            base_url: "http://localhost:8080".to_string(),
            registered_at: Some(Utc.with_ymd_and_hms(2026, 1, day, 0, 0, 0).unwrap()),
        }
    }

    #[tokio::test]
    async fn register_and_get_roundtrips() {
        let (db, _dir) = setup_db().await;
        let stored = register_credential(&db, &make_credential("site-a", "key-1", 1))
            .await
            .unwrap();
        assert_eq!(stored.site_id, "site-a");

        let fetched = get_credential(&db, "site-a").await.unwrap().unwrap();
        assert_eq!(fetched, stored);
        assert!(get_credential(&db, "site-z").await.unwrap().is_none());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn reregister_replaces_secret_and_keeps_timestamp() {
        let (db, _dir) = setup_db().await;
        let first = register_credential(&db, &make_credential("site-a", "key-1", 1))
            .await
            .unwrap();

        let mut update = make_credential("site-a", "key-2", 9);
        update.base_url = "http://builder:9000".into();
        let second = register_credential(&db, &update).await.unwrap();

        assert_eq!(second.access_key, "key-2");
        assert_eq!(second.base_url, "http://builder:9000");
        assert_eq!(second.registered_at, first.registered_at);
        assert_eq!(list_credentials(&db).await.unwrap().len(), 1);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn missing_timestamp_is_stamped() {
        let (db, _dir) = setup_db().await;
        let before = Utc::now();
        let mut cred = make_credential("site-a", "key-1", 1);
        cred.registered_at = None;
        let stored = register_credential(&db, &cred).await.unwrap();
        assert!(stored.registered_at >= before - chrono::Duration::seconds(1));
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn unregister_unknown_site_is_not_found() {
        let (db, _dir) = setup_db().await;
        register_credential(&db, &make_credential("site-a", "key-1", 1))
            .await
            .unwrap();

        unregister_credential(&db, "site-a").await.unwrap();
        let err = unregister_credential(&db, "site-a").await.unwrap_err();
        assert!(matches!(err, SiteflowError::NotFound(_)));
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn list_orders_newest_first() {
        let (db, _dir) = setup_db().await;
        register_credential(&db, &make_credential("old", "k", 1)).await.unwrap();
        register_credential(&db, &make_credential("new", "k", 3)).await.unwrap();
        register_credential(&db, &make_credential("mid", "k", 2)).await.unwrap();

        let ids: Vec<String> = list_credentials(&db)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.site_id)
            .collect();
        assert_eq!(ids, vec!["new", "mid", "old"]);
        db.close().await.unwrap();
    }
}
