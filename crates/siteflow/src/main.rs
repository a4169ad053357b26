// SPDX-FileCopyrightText: 2026 Siteflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Siteflow - a worker that syncs registered sites' users and orders into an
//! attributed, deduplicated event store.

mod app;
mod cli;
mod commands;
mod serve;
mod shutdown;

use std::process::ExitCode;

use clap::Parser;
use tracing::error;

use crate::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => siteflow_config::load_and_validate_path(path),
        None => siteflow_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            siteflow_config::render_errors(&errors);
            return ExitCode::FAILURE;
        }
    };

    serve::init_tracing(&config.worker);

    let result = match cli.command {
        Commands::Serve => serve::run_serve(config).await,
        command => commands::run(config, command).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, kind = %e.kind(), "command failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
