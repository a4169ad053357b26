// SPDX-FileCopyrightText: 2026 Siteflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! AutoSync: dispatch a fire-and-forget run for every registered site, once
//! at startup and then on a fixed interval.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use siteflow_core::types::RunRequest;
use siteflow_core::{CredentialStore, SiteflowError, SyncOrchestrator};

/// Reason attached to the dispatch cycle run at startup.
pub const INITIAL_REASON: &str = "autosync-initial";
/// Reason attached to every interval-driven cycle.
pub const INTERVAL_REASON: &str = "autosync-interval";

/// Outcome of one dispatch cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub dispatched: usize,
    pub failed: usize,
    /// True when cancellation cut the cycle short.
    pub interrupted: bool,
}

/// Periodic dispatcher over the credential registry.
pub struct AutoSync {
    credentials: Arc<dyn CredentialStore>,
    orchestrator: Arc<dyn SyncOrchestrator>,
    interval: Duration,
}

impl AutoSync {
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        orchestrator: Arc<dyn SyncOrchestrator>,
        interval: Duration,
    ) -> Self {
        Self {
            credentials,
            orchestrator,
            interval,
        }
    }

    /// Run until `cancel` fires: one cycle immediately, then one per interval.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(interval_secs = self.interval.as_secs(), "autosync started");
        self.log_cycle(INITIAL_REASON, self.dispatch_cycle(INITIAL_REASON, &cancel).await);

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // Skip the first immediate tick; the initial cycle already ran.
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let report = self.dispatch_cycle(INTERVAL_REASON, &cancel).await;
                    self.log_cycle(INTERVAL_REASON, report);
                }
                _ = cancel.cancelled() => {
                    info!("autosync shutting down");
                    break;
                }
            }
        }
    }

    /// Dispatch one run per registered site.
    ///
    /// A failed dispatch is logged and the cycle moves on to the next site.
    /// Cancellation is checked before each site.
    pub async fn dispatch_cycle(&self, reason: &str, cancel: &CancellationToken) -> CycleReport {
        let mut report = CycleReport::default();
        if cancel.is_cancelled() {
            report.interrupted = true;
            return report;
        }

        let sites = match self.credentials.list_credentials().await {
            Ok(sites) => sites,
            Err(e) => {
                warn!(reason, error = %e, "autosync could not list sites");
                return report;
            }
        };
        if sites.is_empty() {
            debug!(reason, "no registered sites");
            return report;
        }

        for site in sites {
            if cancel.is_cancelled() {
                report.interrupted = true;
                break;
            }
            match self.dispatch(&site.site_id, reason).await {
                Ok(run_id) => {
                    report.dispatched += 1;
                    debug!(site_id = %site.site_id, %run_id, reason, "autosync dispatched");
                }
                Err(e) => {
                    report.failed += 1;
                    warn!(site_id = %site.site_id, reason, error = %e, "autosync dispatch failed");
                }
            }
        }
        report
    }

    async fn dispatch(&self, site_id: &str, reason: &str) -> Result<String, SiteflowError> {
        self.orchestrator
            .run_sync_async(RunRequest::full(site_id, reason))
            .await
    }

    fn log_cycle(&self, reason: &str, report: CycleReport) {
        info!(
            reason,
            dispatched = report.dispatched,
            failed = report.failed,
            interrupted = report.interrupted,
            "autosync cycle finished"
        );
    }
}
