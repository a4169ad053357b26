// SPDX-FileCopyrightText: 2026 Siteflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `siteflow serve` command implementation.
//!
//! Opens storage, resumes runs a previous process left unfinished, starts
//! AutoSync, and waits for SIGINT/SIGTERM. On shutdown the scheduler stops,
//! in-flight runs are drained, and the WAL is checkpointed.

use std::sync::Arc;
use std::time::Duration;

use siteflow_config::SiteflowConfig;
use siteflow_config::model::{LogFormat, WorkerConfig};
use siteflow_core::{SiteflowError, SyncOrchestrator};
use siteflow_scheduler::AutoSync;
use tracing::{info, warn};

use crate::app::App;
use crate::shutdown;

/// Time in-flight runs get to finish after a shutdown signal.
const DRAIN_GRACE: Duration = Duration::from_secs(30);

/// Runs the `siteflow serve` command.
pub async fn run_serve(config: SiteflowConfig) -> Result<(), SiteflowError> {
    info!("starting siteflow serve");
    let app = App::open(config).await?;

    // Runs journaled as running belong to a process that stopped mid-run.
    let resumed = app.orchestrator.resume_incomplete().await?;
    if resumed > 0 {
        info!(count = resumed, "resumed interrupted runs");
    }

    let cancel = shutdown::install_signal_handler();

    let scheduler = if app.config.sync.autosync_enabled {
        let autosync = AutoSync::new(
            app.storage.clone(),
            Arc::new(app.orchestrator.clone()) as Arc<dyn SyncOrchestrator>,
            Duration::from_secs(app.config.sync.autosync_interval_secs),
        );
        let token = cancel.clone();
        Some(tokio::spawn(async move { autosync.run(token).await }))
    } else {
        info!("autosync disabled by configuration");
        None
    };

    cancel.cancelled().await;

    if let Some(handle) = scheduler
        && let Err(e) = handle.await
    {
        warn!(error = %e, "autosync task ended abnormally");
    }
    app.close(DRAIN_GRACE).await?;

    info!("siteflow serve shutdown complete");
    Ok(())
}

/// Initializes the tracing subscriber from the worker config.
///
/// `RUST_LOG` wins over `worker.log_level`. Output goes to stderr so command
/// output on stdout stays machine-readable.
pub fn init_tracing(worker: &WorkerConfig) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("siteflow={},warn", worker.log_level)));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_names(false);

    match worker.log_format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}
