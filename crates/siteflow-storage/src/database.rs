// SPDX-FileCopyrightText: 2026 Siteflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All statements run on tokio-rusqlite's background thread. Each statement
//! commits on its own; no transaction spans a sync run.

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use siteflow_core::SiteflowError;
use tracing::debug;

/// Handle to the SQLite database.
#[derive(Clone)]
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Open (creating if needed) a database in WAL mode and run migrations.
    pub async fn open(path: &str) -> Result<Self, SiteflowError> {
        Self::open_with_options(path, true).await
    }

    /// Open a database, choosing the journal mode.
    pub async fn open_with_options(path: &str, wal_mode: bool) -> Result<Self, SiteflowError> {
        if let Some(parent) = Path::new(path).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(SiteflowError::storage)?;
        }

        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(SiteflowError::storage)?;

        conn.call(move |conn| -> Result<(), rusqlite::Error> {
            if wal_mode {
                conn.pragma_update(None, "journal_mode", "WAL")?;
            }
            conn.pragma_update(None, "synchronous", "NORMAL")?;
            conn.pragma_update(None, "foreign_keys", "ON")?;
            conn.busy_timeout(std::time::Duration::from_secs(5))?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;

        conn.call(|conn| -> Result<(), SiteflowError> { crate::migrations::run_migrations(conn) })
            .await
            .map_err(flatten_err)?;

        debug!(path, wal_mode, "database opened");
        Ok(Self { conn })
    }

    /// The underlying async connection.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Checkpoint the WAL and close the connection.
    pub async fn close(self) -> Result<(), SiteflowError> {
        checkpoint(&self.conn).await?;
        self.conn.close().await.map_err(map_tr_err)
    }
}

/// Truncate the WAL into the main database file.
pub(crate) async fn checkpoint(conn: &tokio_rusqlite::Connection) -> Result<(), SiteflowError> {
    conn.call(|conn| -> Result<(), rusqlite::Error> {
        conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
        Ok(())
    })
    .await
    .map_err(map_tr_err)
}

/// Convert a tokio-rusqlite error into a storage error.
pub fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> SiteflowError {
    SiteflowError::Storage {
        source: Box::new(e),
    }
}

/// Unwrap a domain error raised inside a connection closure.
pub(crate) fn flatten_err(e: tokio_rusqlite::Error<SiteflowError>) -> SiteflowError {
    match e {
        tokio_rusqlite::Error::Error(inner) => inner,
        other => SiteflowError::Storage {
            source: other.to_string().into(),
        },
    }
}

/// Fixed-width UTC timestamp so text ordering matches time ordering.
pub(crate) fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_ts(raw: &str) -> Result<DateTime<Utc>, SiteflowError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(SiteflowError::storage)
}
