// SPDX-FileCopyrightText: 2026 Siteflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the storage traits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::OnceCell;
use tracing::debug;

use siteflow_config::model::StorageConfig;
use siteflow_core::types::{
    Credential, Event, EventFilter, NewCredential, NewEvent, RunRecord, RunStatus, StepRecord,
};
use siteflow_core::{
    AdapterType, CredentialStore, EventStore, HealthStatus, PluginAdapter, RunJournal,
    SiteflowError, StorageAdapter,
};

use crate::database::Database;
use crate::queries;

/// SQLite-backed credential registry, event store, and run journal.
///
/// The database is opened on the first call to [`StorageAdapter::initialize`].
pub struct SqliteStorage {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStorage {
    /// Create a new SqliteStorage with the given configuration.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// Returns the underlying Database, or an error if not initialized.
    fn db(&self) -> Result<&Database, SiteflowError> {
        self.db.get().ok_or_else(|| SiteflowError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }
}

#[async_trait]
impl PluginAdapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, SiteflowError> {
        let Ok(db) = self.db() else {
            return Ok(HealthStatus::Unhealthy("not initialized".into()));
        };
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(crate::database::map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), SiteflowError> {
        if self.db.get().is_some() {
            self.close().await?;
        }
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for SqliteStorage {
    async fn initialize(&self) -> Result<(), SiteflowError> {
        let path = self.config.database_path.clone();
        let db = Database::open_with_options(&path, self.config.wal_mode).await?;
        self.db.set(db).map_err(|_| SiteflowError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), SiteflowError> {
        let db = self.db()?;
        if self.config.wal_mode {
            crate::database::checkpoint(db.connection()).await?;
            debug!("WAL checkpoint complete");
        }
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for SqliteStorage {
    async fn register_credential(
        &self,
        credential: &NewCredential,
    ) -> Result<Credential, SiteflowError> {
        queries::credentials::register_credential(self.db()?, credential).await
    }

    async fn unregister_credential(&self, site_id: &str) -> Result<(), SiteflowError> {
        queries::credentials::unregister_credential(self.db()?, site_id).await
    }

    async fn get_credential(&self, site_id: &str) -> Result<Option<Credential>, SiteflowError> {
        queries::credentials::get_credential(self.db()?, site_id).await
    }

    async fn list_credentials(&self) -> Result<Vec<Credential>, SiteflowError> {
        queries::credentials::list_credentials(self.db()?).await
    }
}

#[async_trait]
impl EventStore for SqliteStorage {
    async fn insert_event(&self, event: &NewEvent) -> Result<bool, SiteflowError> {
        queries::events::insert_event(self.db()?, event).await
    }

    async fn latest_attribution(&self, user_id: &str) -> Result<Option<String>, SiteflowError> {
        queries::events::latest_attribution(self.db()?, user_id).await
    }

    async fn list_events(
        &self,
        filter: &EventFilter,
        limit: Option<u32>,
    ) -> Result<Vec<Event>, SiteflowError> {
        queries::events::list_events(self.db()?, filter, limit).await
    }
}

#[async_trait]
impl RunJournal for SqliteStorage {
    async fn start_run(&self, run: &RunRecord) -> Result<(), SiteflowError> {
        queries::runs::start_run(self.db()?, run).await
    }

    async fn record_step(&self, run_id: &str, step: &StepRecord) -> Result<(), SiteflowError> {
        queries::runs::record_step(self.db()?, run_id, step).await
    }

    async fn completed_steps(&self, run_id: &str) -> Result<Vec<StepRecord>, SiteflowError> {
        queries::runs::completed_steps(self.db()?, run_id).await
    }

    async fn finish_run(
        &self,
        run_id: &str,
        status: RunStatus,
        error: Option<&str>,
        completed_at: DateTime<Utc>,
    ) -> Result<(), SiteflowError> {
        queries::runs::finish_run(self.db()?, run_id, status, error, completed_at).await
    }

    async fn get_run(&self, run_id: &str) -> Result<Option<RunRecord>, SiteflowError> {
        queries::runs::get_run(self.db()?, run_id).await
    }

    async fn list_runs(
        &self,
        site_id: Option<&str>,
        limit: Option<u32>,
    ) -> Result<Vec<RunRecord>, SiteflowError> {
        queries::runs::list_runs(self.db()?, site_id, limit).await
    }

    async fn incomplete_runs(&self) -> Result<Vec<RunRecord>, SiteflowError> {
        queries::runs::incomplete_runs(self.db()?).await
    }
}
