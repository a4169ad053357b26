// SPDX-FileCopyrightText: 2026 Siteflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process durable orchestrator.
//!
//! A run syncs each requested entity kind in fixed order (users before
//! orders), each as a retried activity. Progress is journaled per kind, so a
//! run interrupted by a crash or shutdown is resumed at the next start and
//! skips the kinds that already completed.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use siteflow_core::types::{
    Credential, EntityKind, RunRecord, RunRequest, RunResult, RunStatus, RunSummary, StepRecord,
    StepStatus,
};
use siteflow_core::{CredentialStore, RunJournal, SiteflowError, SyncOrchestrator};
use siteflow_sync::{SyncEngine, SyncJob};

use crate::activity::execute_activity;
use crate::policy::RetryPolicy;

struct Inner {
    credentials: Arc<dyn CredentialStore>,
    journal: Arc<dyn RunJournal>,
    engine: SyncEngine,
    policy: RetryPolicy,
    run_timeout: Duration,
    tracker: TaskTracker,
    cancel: CancellationToken,
}

/// Runs sync workflows in this process, journaling progress to a [`RunJournal`].
#[derive(Clone)]
pub struct LocalOrchestrator {
    inner: Arc<Inner>,
}

impl LocalOrchestrator {
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        journal: Arc<dyn RunJournal>,
        engine: SyncEngine,
        policy: RetryPolicy,
        run_timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                credentials,
                journal,
                engine,
                policy,
                run_timeout,
                tracker: TaskTracker::new(),
                cancel: CancellationToken::new(),
            }),
        }
    }

    /// Token that stops all runs at their next cancellation point.
    pub fn cancel_token(&self) -> CancellationToken {
        self.inner.cancel.clone()
    }

    /// Continue every run the journal still lists as running.
    ///
    /// Each run is resumed fire-and-forget. Returns the number of runs resumed.
    pub async fn resume_incomplete(&self) -> Result<usize, SiteflowError> {
        let pending = self.inner.journal.incomplete_runs().await?;
        let count = pending.len();
        for record in pending {
            info!(run_id = %record.run_id, site_id = %record.site_id, "resuming incomplete run");
            let inner = Arc::clone(&self.inner);
            let span = info_span!("run", run_id = %record.run_id, site_id = %record.site_id);
            self.inner.tracker.spawn(
                async move {
                    if let Err(e) = inner.resume(record).await {
                        error!(error = %e, "resumed run failed");
                    }
                }
                .instrument(span),
            );
        }
        Ok(count)
    }

    /// Stop accepting runs and wait for in-flight ones.
    ///
    /// Runs get `grace` to finish on their own; after that they are cancelled
    /// and left as `running` in the journal so the next start resumes them.
    pub async fn shutdown(&self, grace: Duration) {
        let tracker = &self.inner.tracker;
        tracker.close();
        if tracker.is_empty() {
            return;
        }
        info!(in_flight = tracker.len(), "waiting for in-flight runs");
        if tokio::time::timeout(grace, tracker.wait()).await.is_err() {
            warn!(
                in_flight = tracker.len(),
                "grace period elapsed, cancelling in-flight runs"
            );
            self.inner.cancel.cancel();
            tracker.wait().await;
        }
        info!("orchestrator drained");
    }
}

impl Inner {
    /// Validate a request and resolve its credential before anything is journaled.
    async fn prepare(&self, mut request: RunRequest) -> Result<(RunRequest, Credential), SiteflowError> {
        request.site_id = request.site_id.trim().to_string();
        if request.site_id.is_empty() {
            return Err(SiteflowError::Validation("site_id required".into()));
        }
        request.window.validate()?;
        request.page = request.page.max(1);

        let credential = self.lookup_credential(&request.site_id).await?;
        Ok((request, credential))
    }

    /// Resolve a site's credential as a retried activity.
    ///
    /// An unregistered site is `NotFound` and fails on the first attempt.
    async fn lookup_credential(&self, site_id: &str) -> Result<Credential, SiteflowError> {
        let credentials = &self.credentials;
        execute_activity(&self.policy, "lookup_site", &self.cancel, |_| async move {
            credentials
                .get_credential(site_id)
                .await?
                .ok_or_else(|| SiteflowError::NotFound(format!("site {site_id} is not registered")))
        })
        .await
        .map(|(credential, _)| credential)
        .map_err(|e| e.source)
    }

    async fn start(&self, request: &RunRequest) -> Result<RunRecord, SiteflowError> {
        let record = RunRecord {
            run_id: Uuid::new_v4().to_string(),
            site_id: request.site_id.clone(),
            request: request.clone(),
            status: RunStatus::Running,
            error: None,
            started_at: Utc::now(),
            completed_at: None,
            steps: Vec::new(),
        };
        self.journal.start_run(&record).await?;
        info!(
            run_id = %record.run_id,
            site_id = %record.site_id,
            reason = %request.reason,
            kinds = ?request.kinds(),
            "run started"
        );
        Ok(record)
    }

    async fn resume(&self, record: RunRecord) -> Result<RunResult, SiteflowError> {
        let credential = match self.lookup_credential(&record.site_id).await {
            Ok(credential) => credential,
            Err(err @ SiteflowError::NotFound(_)) => {
                self.fail(&record.run_id, &err).await;
                return Err(err);
            }
            Err(e) => return Err(e),
        };
        self.drive(&record, &credential).await
    }

    /// Execute a journaled run under the run timeout and record its outcome.
    async fn drive(&self, record: &RunRecord, credential: &Credential) -> Result<RunResult, SiteflowError> {
        let outcome = match tokio::time::timeout(self.run_timeout, self.execute(record, credential)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(SiteflowError::Timeout {
                duration: self.run_timeout,
            }),
        };

        match outcome {
            Ok(result) => {
                // Every step is journaled as completed, so a run left running
                // here finishes without refetching when it is resumed.
                if let Err(e) = self
                    .journal
                    .finish_run(&record.run_id, RunStatus::Succeeded, None, result.completed_at)
                    .await
                {
                    error!(run_id = %record.run_id, error = %e, "failed to journal run success");
                }
                info!(
                    run_id = %record.run_id,
                    site_id = %record.site_id,
                    users = ?result.users_summary,
                    orders = ?result.orders_summary,
                    "run succeeded"
                );
                Ok(result)
            }
            Err(SiteflowError::Cancelled) if self.cancel.is_cancelled() => {
                warn!(run_id = %record.run_id, "run interrupted by shutdown, left for resume");
                Err(SiteflowError::Cancelled)
            }
            Err(err) => {
                self.fail(&record.run_id, &err).await;
                Err(err)
            }
        }
    }

    async fn fail(&self, run_id: &str, err: &SiteflowError) {
        error!(run_id, error = %err, kind = %err.kind(), "run failed");
        if let Err(e) = self
            .journal
            .finish_run(run_id, RunStatus::Failed, Some(&err.to_string()), Utc::now())
            .await
        {
            error!(run_id, error = %e, "failed to journal run failure");
        }
    }

    async fn execute(&self, record: &RunRecord, credential: &Credential) -> Result<RunResult, SiteflowError> {
        let request = &record.request;
        let completed: HashMap<EntityKind, RunSummary> = self
            .journal
            .completed_steps(&record.run_id)
            .await?
            .into_iter()
            .filter(|s| s.status == StepStatus::Completed)
            .map(|s| (s.kind, s.summary.unwrap_or_default()))
            .collect();

        let mut result = RunResult {
            run_id: record.run_id.clone(),
            site_id: record.site_id.clone(),
            started_at: record.started_at,
            completed_at: record.started_at,
            users_summary: None,
            orders_summary: None,
        };

        for kind in request.kinds() {
            if let Some(summary) = completed.get(&kind) {
                debug!(run_id = %record.run_id, %kind, "step already completed, skipping");
                result.set_summary(kind, *summary);
                continue;
            }

            let job = SyncJob {
                credential: credential.clone(),
                kind,
                window: request.window,
                start_page: request.page,
            };
            let summary = self.run_step(&record.run_id, &job).await?;
            result.set_summary(kind, summary);
        }

        result.completed_at = Utc::now();
        Ok(result)
    }

    /// Run one entity kind as a retried activity and journal the outcome.
    async fn run_step(&self, run_id: &str, job: &SyncJob) -> Result<RunSummary, SiteflowError> {
        let engine = &self.engine;
        let cancel = &self.cancel;
        let activity = job.kind.to_string();

        let outcome = execute_activity(&self.policy, &activity, cancel, |attempt| async move {
            debug!(run_id, kind = %job.kind, attempt, "sync attempt");
            engine.sync(job, cancel).await.map_err(|e| {
                debug!(
                    run_id,
                    kind = %job.kind,
                    attempt,
                    inserted = e.summary.inserted,
                    skipped = e.summary.skipped,
                    "attempt committed partial progress"
                );
                e.source
            })
        })
        .await;

        match outcome {
            Ok((summary, attempts)) => {
                self.journal
                    .record_step(run_id, &step(job.kind, StepStatus::Completed, Some(summary), attempts, None))
                    .await?;
                Ok(summary)
            }
            Err(failure) => {
                if !matches!(failure.source, SiteflowError::Cancelled) {
                    let message = failure.source.to_string();
                    self.journal
                        .record_step(
                            run_id,
                            &step(job.kind, StepStatus::Failed, None, failure.attempts, Some(message)),
                        )
                        .await?;
                }
                Err(failure.source)
            }
        }
    }
}

fn step(
    kind: EntityKind,
    status: StepStatus,
    summary: Option<RunSummary>,
    attempts: u32,
    error: Option<String>,
) -> StepRecord {
    StepRecord {
        kind,
        status,
        summary,
        attempts,
        error,
        updated_at: Utc::now(),
    }
}

#[async_trait]
impl SyncOrchestrator for LocalOrchestrator {
    async fn run_sync(&self, request: RunRequest) -> Result<RunResult, SiteflowError> {
        if self.inner.tracker.is_closed() {
            return Err(SiteflowError::Cancelled);
        }
        let (request, credential) = self.inner.prepare(request).await?;
        let record = self.inner.start(&request).await?;
        let span = info_span!("run", run_id = %record.run_id, site_id = %record.site_id);
        self.inner.drive(&record, &credential).instrument(span).await
    }

    async fn run_sync_async(&self, request: RunRequest) -> Result<String, SiteflowError> {
        if self.inner.tracker.is_closed() {
            return Err(SiteflowError::Cancelled);
        }
        let (request, credential) = self.inner.prepare(request).await?;
        let record = self.inner.start(&request).await?;
        let run_id = record.run_id.clone();

        let inner = Arc::clone(&self.inner);
        let span = info_span!("run", run_id = %record.run_id, site_id = %record.site_id);
        self.inner.tracker.spawn(
            async move {
                // Failures are journaled; the caller observes them via the run record.
                let _ = inner.drive(&record, &credential).await;
            }
            .instrument(span),
        );
        Ok(run_id)
    }
}
