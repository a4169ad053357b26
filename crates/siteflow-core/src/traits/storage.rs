// SPDX-FileCopyrightText: 2026 Siteflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistence traits: credential registry, event store, and run journal.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::SiteflowError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{
    Credential, Event, EventFilter, NewCredential, NewEvent, RunRecord, RunStatus, StepRecord,
};

/// Lifecycle of a storage backend.
#[async_trait]
pub trait StorageAdapter: PluginAdapter {
    /// Initializes the storage backend (migrations, connection, etc.).
    async fn initialize(&self) -> Result<(), SiteflowError>;

    /// Closes the storage backend, flushing pending writes.
    async fn close(&self) -> Result<(), SiteflowError>;
}

/// Per-site access credentials keyed by site id.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Upsert a credential. Re-registration replaces the access key and base
    /// URL and keeps the original registration time.
    async fn register_credential(
        &self,
        credential: &NewCredential,
    ) -> Result<Credential, SiteflowError>;

    /// Remove a credential. Fails with `NotFound` if the site is unknown.
    async fn unregister_credential(&self, site_id: &str) -> Result<(), SiteflowError>;

    async fn get_credential(&self, site_id: &str) -> Result<Option<Credential>, SiteflowError>;

    /// All credentials, newest registration first.
    async fn list_credentials(&self) -> Result<Vec<Credential>, SiteflowError>;
}

/// Append-only, deduplicated event log.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Insert an event. Returns `false` (not an error) when an event with the
    /// same dedupe key already exists.
    async fn insert_event(&self, event: &NewEvent) -> Result<bool, SiteflowError>;

    /// The most recent non-empty source tag recorded for a subject.
    async fn latest_attribution(&self, user_id: &str) -> Result<Option<String>, SiteflowError>;

    /// Newest events first, with the limit clamped to a safe maximum.
    async fn list_events(
        &self,
        filter: &EventFilter,
        limit: Option<u32>,
    ) -> Result<Vec<Event>, SiteflowError>;
}

/// Saga record tracking which entity kinds of a run have completed.
#[async_trait]
pub trait RunJournal: Send + Sync {
    /// Persist a new run in the `running` state.
    async fn start_run(&self, run: &RunRecord) -> Result<(), SiteflowError>;

    /// Upsert the outcome of one entity kind.
    async fn record_step(&self, run_id: &str, step: &StepRecord) -> Result<(), SiteflowError>;

    /// Steps recorded as completed for a run.
    async fn completed_steps(&self, run_id: &str) -> Result<Vec<StepRecord>, SiteflowError>;

    /// Mark a run terminal.
    async fn finish_run(
        &self,
        run_id: &str,
        status: RunStatus,
        error: Option<&str>,
        completed_at: DateTime<Utc>,
    ) -> Result<(), SiteflowError>;

    /// A run with all its steps.
    async fn get_run(&self, run_id: &str) -> Result<Option<RunRecord>, SiteflowError>;

    /// Most recent runs first, optionally for one site.
    async fn list_runs(
        &self,
        site_id: Option<&str>,
        limit: Option<u32>,
    ) -> Result<Vec<RunRecord>, SiteflowError>;

    /// Runs still marked `running` (interrupted by a crash or shutdown).
    async fn incomplete_runs(&self) -> Result<Vec<RunRecord>, SiteflowError>;
}
