// SPDX-FileCopyrightText: 2026 Siteflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Signal handling for `siteflow serve`.
//!
//! SIGTERM and SIGINT (Ctrl+C) cancel a [`CancellationToken`] that the
//! scheduler and the orchestrator's drain both watch.

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Installs signal handlers for SIGTERM and SIGINT.
///
/// Returns a token that is cancelled when either signal arrives.
pub fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let token_clone = token.clone();

    tokio::spawn(async move {
        wait_for_signal().await;
        token_clone.cancel();
        debug!("shutdown signal handler completed");
    });

    token
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let ctrl_c = tokio::signal::ctrl_c();
    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(e) => {
            warn!(error = %e, "could not install SIGTERM handler, listening for Ctrl+C only");
            let _ = ctrl_c.await;
            info!("received SIGINT (Ctrl+C), initiating shutdown");
            return;
        }
    };

    tokio::select! {
        _ = ctrl_c => {
            info!("received SIGINT (Ctrl+C), initiating shutdown");
        }
        _ = sigterm.recv() => {
            info!("received SIGTERM, initiating shutdown");
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("received Ctrl+C, initiating shutdown");
}
