// SPDX-FileCopyrightText: 2026 Siteflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One-shot commands. Each prints a single JSON document on stdout.

use std::io::Write;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Value, json};

use siteflow_config::SiteflowConfig;
use siteflow_core::types::{Credential, EventFilter, Properties, RunRequest, TimeWindow, parse_time};
use siteflow_core::{EventStore, RunJournal, SiteflowError, SyncOrchestrator};
use siteflow_sync::{ManualEvent, SeedRequest};

use crate::app::App;
use crate::cli::{Commands, EventsCommand, RunsCommand, SitesCommand, SyncArgs};

/// How long a one-shot process waits for its own runs before exiting.
const ONE_SHOT_GRACE: Duration = Duration::from_secs(3600);

/// A registered site without its access key.
#[derive(Debug, Serialize)]
struct SiteView<'a> {
    site_id: &'a str,
    base_url: &'a str,
    registered_at: DateTime<Utc>,
}

impl<'a> From<&'a Credential> for SiteView<'a> {
    fn from(c: &'a Credential) -> Self {
        Self {
            site_id: &c.site_id,
            base_url: &c.base_url,
            registered_at: c.registered_at,
        }
    }
}

/// Run a non-serve command against freshly opened storage.
pub async fn run(config: SiteflowConfig, command: Commands) -> Result<(), SiteflowError> {
    let app = App::open(config).await?;
    let outcome = dispatch(&app, command).await;
    let closed = app.close(ONE_SHOT_GRACE).await;
    outcome?;
    closed
}

async fn dispatch(app: &App, command: Commands) -> Result<(), SiteflowError> {
    let output = match command {
        Commands::Serve => {
            return Err(SiteflowError::Internal("serve is not a one-shot command".into()));
        }
        Commands::Sites { command } => sites(app, command).await?,
        Commands::Sync(args) => sync(app, args).await?,
        Commands::Events { command } => events(app, command).await?,
        Commands::Runs { command } => runs(app, command).await?,
    };
    print_json(&output)
}

async fn sites(app: &App, command: SitesCommand) -> Result<Value, SiteflowError> {
    match command {
        SitesCommand::Register {
            site_id,
            access_key,
            base_url,
        } => {
            let credential = app.registry.register(&site_id, &access_key, &base_url).await?;
            to_json(&SiteView::from(&credential))
        }
        SitesCommand::Unregister { site_id } => {
            app.registry.unregister(&site_id).await?;
            Ok(json!({ "site_id": site_id.trim(), "unregistered": true }))
        }
        SitesCommand::List => {
            let sites = app.registry.list().await?;
            let views: Vec<SiteView<'_>> = sites.iter().map(SiteView::from).collect();
            to_json(&views)
        }
    }
}

pub(crate) fn run_request(args: &SyncArgs) -> Result<RunRequest, SiteflowError> {
    Ok(RunRequest {
        site_id: args.site_id.clone(),
        window: TimeWindow::parse(args.start.as_deref(), args.end.as_deref())?,
        page: args.page,
        include_users: !args.no_users,
        include_orders: !args.no_orders,
        reason: args.reason.clone(),
    })
}

async fn sync(app: &App, args: SyncArgs) -> Result<Value, SiteflowError> {
    let request = run_request(&args)?;
    if args.fire_and_forget {
        let run_id = app.orchestrator.run_sync_async(request).await?;
        // The id goes out before this process drains the run on exit.
        print_json(&json!({ "run_id": run_id, "status": "dispatched" }))?;
        return Ok(Value::Null);
    }
    let result = app.orchestrator.run_sync(request).await?;
    to_json(&result)
}

async fn events(app: &App, command: EventsCommand) -> Result<Value, SiteflowError> {
    match command {
        EventsCommand::List { site, user, limit } => {
            let filter = EventFilter {
                site_id: site,
                user_id: user,
            };
            to_json(&app.storage.list_events(&filter, limit).await?)
        }
        EventsCommand::Seed {
            site_id,
            user,
            name,
            utm,
        } => {
            let outcome = app
                .seeder
                .seed_attribution(SeedRequest {
                    site_id,
                    user_id: user,
                    event_name: name,
                    utm_source: utm,
                })
                .await?;
            to_json(&outcome)
        }
        EventsCommand::Add {
            site_id,
            user,
            name,
            utm,
            dedupe_key,
            timestamp,
            props,
        } => {
            let manual = ManualEvent {
                site_id,
                user_id: user,
                event_name: name,
                utm_source: utm,
                properties: parse_props(props.as_deref())?,
                dedupe_key,
                timestamp: timestamp.as_deref().map(parse_time).transpose()?,
                metadata: None,
            };
            to_json(&app.seeder.add_event(manual).await?)
        }
        EventsCommand::Attribution { user_id } => {
            let utm_source = app.storage.latest_attribution(&user_id).await?;
            Ok(json!({ "user_id": user_id, "utm_source": utm_source }))
        }
    }
}

async fn runs(app: &App, command: RunsCommand) -> Result<Value, SiteflowError> {
    match command {
        RunsCommand::List { site, limit } => {
            to_json(&app.storage.list_runs(site.as_deref(), limit).await?)
        }
        RunsCommand::Show { run_id } => match app.storage.get_run(&run_id).await? {
            Some(record) => to_json(&record),
            None => Err(SiteflowError::NotFound(format!("run {run_id}"))),
        },
    }
}

pub(crate) fn parse_props(raw: Option<&str>) -> Result<Properties, SiteflowError> {
    let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
        return Ok(Properties::new());
    };
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(SiteflowError::Validation("--props must be a JSON object".into())),
        Err(e) => Err(SiteflowError::Validation(format!("--props is not valid JSON: {e}"))),
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<Value, SiteflowError> {
    serde_json::to_value(value).map_err(|e| SiteflowError::Internal(format!("serialize output: {e}")))
}

fn print_json(value: &Value) -> Result<(), SiteflowError> {
    if value.is_null() {
        return Ok(());
    }
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|e| SiteflowError::Internal(format!("serialize output: {e}")))?;
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{rendered}")
        .and_then(|()| stdout.flush())
        .map_err(|e| SiteflowError::Internal(format!("write output: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use siteflow_core::ErrorKind;

    fn args(start: Option<&str>, end: Option<&str>) -> SyncArgs {
        SyncArgs {
            site_id: "site-1".into(),
            start: start.map(String::from),
            end: end.map(String::from),
            page: 2,
            no_users: true,
            no_orders: false,
            reason: "manual".into(),
            fire_and_forget: false,
        }
    }

    #[test]
    fn sync_args_become_run_request() {
        let request = run_request(&args(Some("2026-01-01"), None)).unwrap();
        assert_eq!(request.page, 2);
        assert!(!request.include_users);
        assert!(request.include_orders);
        assert!(request.window.start.is_some());
    }

    #[test]
    fn inverted_window_is_rejected() {
        let err = run_request(&args(Some("2026-02-01"), Some("2026-01-01"))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn props_must_be_an_object() {
        assert!(parse_props(None).unwrap().is_empty());
        assert_eq!(parse_props(Some(r#"{"page":"/cart"}"#)).unwrap()["page"], "/cart");
        assert_eq!(
            parse_props(Some("[1,2]")).unwrap_err().kind(),
            ErrorKind::Validation
        );
        assert_eq!(parse_props(Some("{")).unwrap_err().kind(), ErrorKind::Validation);
    }
}
