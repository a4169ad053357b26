// SPDX-FileCopyrightText: 2026 Siteflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage wrapper that injects persistence failures.
//!
//! `FaultyStore` delegates every call to an inner store and fails selected
//! calls with a [`SiteflowError::Storage`] error. Faults are armed through
//! `&self` so a test can inject them after the store is wired into services.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use siteflow_core::types::{
    Credential, Event, EventFilter, NewCredential, NewEvent, RunRecord, RunStatus, StepRecord,
};
use siteflow_core::{CredentialStore, EventStore, RunJournal, SiteflowError};

#[derive(Default)]
struct Faults {
    inserts_seen: usize,
    insert_fail_from: Option<usize>,
    insert_failures: usize,
    attribution_failures: usize,
    credential_failures: usize,
    finish_failures: usize,
    credential_lookups: usize,
}

/// Delegating store with injectable persistence failures.
pub struct FaultyStore<S> {
    inner: Arc<S>,
    faults: Mutex<Faults>,
}

impl<S> FaultyStore<S> {
    pub fn new(inner: Arc<S>) -> Self {
        Self {
            inner,
            faults: Mutex::new(Faults::default()),
        }
    }

    fn faults(&self) -> MutexGuard<'_, Faults> {
        self.faults.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fail `times` consecutive inserts, starting with the `nth` (1-based).
    pub fn fail_insert_at(&self, nth: usize, times: usize) {
        let mut faults = self.faults();
        faults.insert_fail_from = Some(nth);
        faults.insert_failures = times;
    }

    /// Fail the next `times` attribution lookups.
    pub fn fail_attribution_lookups(&self, times: usize) {
        self.faults().attribution_failures = times;
    }

    /// Fail the next `times` credential lookups.
    pub fn fail_credential_lookups(&self, times: usize) {
        self.faults().credential_failures = times;
    }

    /// Fail the next `times` attempts to mark a run terminal.
    pub fn fail_finish_run(&self, times: usize) {
        self.faults().finish_failures = times;
    }

    /// Credential lookups issued, failed ones included.
    pub fn credential_lookups(&self) -> usize {
        self.faults().credential_lookups
    }
}

fn injected(operation: &str) -> SiteflowError {
    tracing::debug!(operation, "injected storage failure");
    SiteflowError::storage(std::io::Error::other(format!(
        "injected failure in {operation}"
    )))
}

fn take(counter: &mut usize) -> bool {
    if *counter == 0 {
        return false;
    }
    *counter -= 1;
    true
}

#[async_trait]
impl<S: CredentialStore + 'static> CredentialStore for FaultyStore<S> {
    async fn register_credential(
        &self,
        credential: &NewCredential,
    ) -> Result<Credential, SiteflowError> {
        self.inner.register_credential(credential).await
    }

    async fn unregister_credential(&self, site_id: &str) -> Result<(), SiteflowError> {
        self.inner.unregister_credential(site_id).await
    }

    async fn get_credential(&self, site_id: &str) -> Result<Option<Credential>, SiteflowError> {
        let fail = {
            let mut faults = self.faults();
            faults.credential_lookups += 1;
            take(&mut faults.credential_failures)
        };
        if fail {
            return Err(injected("get_credential"));
        }
        self.inner.get_credential(site_id).await
    }

    async fn list_credentials(&self) -> Result<Vec<Credential>, SiteflowError> {
        self.inner.list_credentials().await
    }
}

#[async_trait]
impl<S: EventStore + 'static> EventStore for FaultyStore<S> {
    async fn insert_event(&self, event: &NewEvent) -> Result<bool, SiteflowError> {
        let fail = {
            let mut faults = self.faults();
            faults.inserts_seen += 1;
            let armed = faults
                .insert_fail_from
                .is_some_and(|nth| faults.inserts_seen >= nth);
            armed && take(&mut faults.insert_failures)
        };
        if fail {
            return Err(injected("insert_event"));
        }
        self.inner.insert_event(event).await
    }

    async fn latest_attribution(&self, user_id: &str) -> Result<Option<String>, SiteflowError> {
        if take(&mut self.faults().attribution_failures) {
            return Err(injected("latest_attribution"));
        }
        self.inner.latest_attribution(user_id).await
    }

    async fn list_events(
        &self,
        filter: &EventFilter,
        limit: Option<u32>,
    ) -> Result<Vec<Event>, SiteflowError> {
        self.inner.list_events(filter, limit).await
    }
}

#[async_trait]
impl<S: RunJournal + 'static> RunJournal for FaultyStore<S> {
    async fn start_run(&self, run: &RunRecord) -> Result<(), SiteflowError> {
        self.inner.start_run(run).await
    }

    async fn record_step(&self, run_id: &str, step: &StepRecord) -> Result<(), SiteflowError> {
        self.inner.record_step(run_id, step).await
    }

    async fn completed_steps(&self, run_id: &str) -> Result<Vec<StepRecord>, SiteflowError> {
        self.inner.completed_steps(run_id).await
    }

    async fn finish_run(
        &self,
        run_id: &str,
        status: RunStatus,
        error: Option<&str>,
        completed_at: DateTime<Utc>,
    ) -> Result<(), SiteflowError> {
        if take(&mut self.faults().finish_failures) {
            return Err(injected("finish_run"));
        }
        self.inner
            .finish_run(run_id, status, error, completed_at)
            .await
    }

    async fn get_run(&self, run_id: &str) -> Result<Option<RunRecord>, SiteflowError> {
        self.inner.get_run(run_id).await
    }

    async fn list_runs(
        &self,
        site_id: Option<&str>,
        limit: Option<u32>,
    ) -> Result<Vec<RunRecord>, SiteflowError> {
        self.inner.list_runs(site_id, limit).await
    }

    async fn incomplete_runs(&self) -> Result<Vec<RunRecord>, SiteflowError> {
        self.inner.incomplete_runs().await
    }
}
