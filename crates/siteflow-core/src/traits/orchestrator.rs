// SPDX-FileCopyrightText: 2026 Siteflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Orchestration boundary used by the scheduler and the CLI.

use async_trait::async_trait;

use crate::error::SiteflowError;
use crate::types::{RunRequest, RunResult};

/// Runs site syncs as retryable, journaled units of work.
#[async_trait]
pub trait SyncOrchestrator: Send + Sync {
    /// Run to completion and return the result or the terminal error.
    async fn run_sync(&self, request: RunRequest) -> Result<RunResult, SiteflowError>;

    /// Dispatch a run in the background and return its run id immediately.
    async fn run_sync_async(&self, request: RunRequest) -> Result<String, SiteflowError>;
}
