// SPDX-FileCopyrightText: 2026 Siteflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Command-line surface.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Siteflow - sync registered sites' users and orders into an attributed event store.
#[derive(Parser, Debug)]
#[command(name = "siteflow", version, about, long_about = None)]
pub struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the worker: resume interrupted runs and AutoSync every registered site.
    Serve,
    /// Manage registered sites.
    Sites {
        #[command(subcommand)]
        command: SitesCommand,
    },
    /// Sync one site now.
    Sync(SyncArgs),
    /// Inspect and write events.
    Events {
        #[command(subcommand)]
        command: EventsCommand,
    },
    /// Inspect orchestrated runs.
    Runs {
        #[command(subcommand)]
        command: RunsCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum SitesCommand {
    /// Verify an access key with the source and store it.
    Register {
        site_id: String,
        #[arg(long)]
        access_key: String,
        #[arg(long)]
        base_url: String,
    },
    /// Remove a registered site.
    Unregister { site_id: String },
    /// List registered sites.
    List,
}

#[derive(Args, Debug)]
pub struct SyncArgs {
    pub site_id: String,
    /// Window start (RFC3339 or YYYY-MM-DD).
    #[arg(long)]
    pub start: Option<String>,
    /// Window end (RFC3339 or YYYY-MM-DD).
    #[arg(long)]
    pub end: Option<String>,
    /// First page to fetch.
    #[arg(long, default_value_t = 1)]
    pub page: u32,
    #[arg(long)]
    pub no_users: bool,
    #[arg(long)]
    pub no_orders: bool,
    #[arg(long, default_value = "manual")]
    pub reason: String,
    /// Print the run id as soon as the run is journaled.
    #[arg(long = "async")]
    pub fire_and_forget: bool,
}

#[derive(Subcommand, Debug)]
pub enum EventsCommand {
    /// List events, newest first.
    List {
        #[arg(long)]
        site: Option<String>,
        #[arg(long)]
        user: Option<String>,
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Insert a random attribution-tagged event.
    Seed {
        site_id: String,
        #[arg(long)]
        user: Option<String>,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        utm: Option<String>,
    },
    /// Insert a caller-supplied event.
    Add {
        site_id: String,
        #[arg(long)]
        user: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        utm: Option<String>,
        #[arg(long)]
        dedupe_key: Option<String>,
        /// Event time (RFC3339 or YYYY-MM-DD); defaults to now.
        #[arg(long)]
        timestamp: Option<String>,
        /// Properties as a JSON object.
        #[arg(long)]
        props: Option<String>,
    },
    /// Show the most recent attribution tag for a user.
    Attribution { user_id: String },
}

#[derive(Subcommand, Debug)]
pub enum RunsCommand {
    /// List runs, newest first.
    List {
        #[arg(long)]
        site: Option<String>,
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Show one run with its per-kind steps.
    Show { run_id: String },
}
