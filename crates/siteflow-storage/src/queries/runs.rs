// SPDX-FileCopyrightText: 2026 Siteflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Run journal: which entity kinds of each orchestrated run have finished.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::params;
use siteflow_core::SiteflowError;
use siteflow_core::types::{
    EntityKind, RunRecord, RunRequest, RunStatus, RunSummary, StepRecord, StepStatus,
};

use crate::database::{Database, format_ts, parse_ts};
use crate::queries::events::clamp_limit;

struct RunRow {
    run_id: String,
    site_id: String,
    request: String,
    status: String,
    error: Option<String>,
    started_at: String,
    completed_at: Option<String>,
}

const RUN_COLUMNS: &str = "run_id, site_id, request, status, error, started_at, completed_at";

impl RunRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            run_id: row.get(0)?,
            site_id: row.get(1)?,
            request: row.get(2)?,
            status: row.get(3)?,
            error: row.get(4)?,
            started_at: row.get(5)?,
            completed_at: row.get(6)?,
        })
    }

    fn into_record(self, steps: Vec<StepRecord>) -> Result<RunRecord, SiteflowError> {
        let request: RunRequest =
            serde_json::from_str(&self.request).map_err(SiteflowError::storage)?;
        Ok(RunRecord {
            request,
            status: RunStatus::from_str(&self.status).map_err(SiteflowError::storage)?,
            started_at: parse_ts(&self.started_at)?,
            completed_at: self.completed_at.as_deref().map(parse_ts).transpose()?,
            run_id: self.run_id,
            site_id: self.site_id,
            error: self.error,
            steps,
        })
    }
}

struct StepRow {
    kind: String,
    status: String,
    summary: Option<String>,
    attempts: u32,
    error: Option<String>,
    updated_at: String,
}

impl StepRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            kind: row.get(0)?,
            status: row.get(1)?,
            summary: row.get(2)?,
            attempts: row.get(3)?,
            error: row.get(4)?,
            updated_at: row.get(5)?,
        })
    }

    fn into_step(self) -> Result<StepRecord, SiteflowError> {
        Ok(StepRecord {
            kind: EntityKind::from_str(&self.kind).map_err(SiteflowError::storage)?,
            status: StepStatus::from_str(&self.status).map_err(SiteflowError::storage)?,
            summary: self
                .summary
                .as_deref()
                .map(serde_json::from_str::<RunSummary>)
                .transpose()
                .map_err(SiteflowError::storage)?,
            attempts: self.attempts,
            error: self.error,
            updated_at: parse_ts(&self.updated_at)?,
        })
    }
}

fn load_steps(conn: &rusqlite::Connection, run_id: &str) -> rusqlite::Result<Vec<StepRow>> {
    let mut stmt = conn.prepare(
        "SELECT kind, status, summary, attempts, error, updated_at
         FROM run_steps WHERE run_id = ?1 ORDER BY kind",
    )?;
    let rows = stmt.query_map(params![run_id], StepRow::from_row)?;
    rows.collect()
}

fn assemble(rows: Vec<(RunRow, Vec<StepRow>)>) -> Result<Vec<RunRecord>, SiteflowError> {
    rows.into_iter()
        .map(|(run, steps)| {
            let mut steps = steps
                .into_iter()
                .map(StepRow::into_step)
                .collect::<Result<Vec<_>, _>>()?;
            steps.sort_by_key(|s| s.kind);
            run.into_record(steps)
        })
        .collect()
}

/// Persist a new run row.
pub async fn start_run(db: &Database, run: &RunRecord) -> Result<(), SiteflowError> {
    let request = serde_json::to_string(&run.request).map_err(SiteflowError::storage)?;
    let run_id = run.run_id.clone();
    let site_id = run.site_id.clone();
    let status = run.status.to_string();
    let started_at = format_ts(&run.started_at);
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO sync_runs (run_id, site_id, request, status, started_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![run_id, site_id, request, status, started_at],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Insert or replace the outcome of one kind within a run.
pub async fn record_step(
    db: &Database,
    run_id: &str,
    step: &StepRecord,
) -> Result<(), SiteflowError> {
    let summary = step
        .summary
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(SiteflowError::storage)?;
    let run_id = run_id.to_string();
    let kind = step.kind.to_string();
    let status = step.status.to_string();
    let attempts = step.attempts;
    let error = step.error.clone();
    let updated_at = format_ts(&step.updated_at);
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO run_steps (run_id, kind, status, summary, attempts, error, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(run_id, kind) DO UPDATE SET
                     status = excluded.status,
                     summary = excluded.summary,
                     attempts = run_steps.attempts + excluded.attempts,
                     error = excluded.error,
                     updated_at = excluded.updated_at",
                params![run_id, kind, status, summary, attempts, error, updated_at],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Steps of a run that finished successfully.
pub async fn completed_steps(db: &Database, run_id: &str) -> Result<Vec<StepRecord>, SiteflowError> {
    let run_id = run_id.to_string();
    let rows = db
        .connection()
        .call(move |conn| load_steps(conn, &run_id))
        .await
        .map_err(crate::database::map_tr_err)?;
    let mut steps = rows
        .into_iter()
        .map(StepRow::into_step)
        .collect::<Result<Vec<_>, _>>()?;
    steps.retain(|s| s.status == StepStatus::Completed);
    steps.sort_by_key(|s| s.kind);
    Ok(steps)
}

/// Move a run to a terminal status.
pub async fn finish_run(
    db: &Database,
    run_id: &str,
    status: RunStatus,
    error: Option<&str>,
    completed_at: DateTime<Utc>,
) -> Result<(), SiteflowError> {
    let id = run_id.to_string();
    let status = status.to_string();
    let error = error.map(str::to_string);
    let completed_at = format_ts(&completed_at);
    let affected = db
        .connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE sync_runs SET status = ?2, error = ?3, completed_at = ?4
                 WHERE run_id = ?1",
                params![id, status, error, completed_at],
            )
        })
        .await
        .map_err(crate::database::map_tr_err)?;
    if affected == 0 {
        return Err(SiteflowError::NotFound(format!("run {run_id}")));
    }
    Ok(())
}

/// A run and its steps.
pub async fn get_run(db: &Database, run_id: &str) -> Result<Option<RunRecord>, SiteflowError> {
    let run_id = run_id.to_string();
    let row = db
        .connection()
        .call(move |conn| {
            let result = conn.query_row(
                &format!("SELECT {RUN_COLUMNS} FROM sync_runs WHERE run_id = ?1"),
                params![run_id],
                RunRow::from_row,
            );
            match result {
                Ok(run) => {
                    let steps = load_steps(conn, &run.run_id)?;
                    Ok(Some((run, steps)))
                }
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)?;
    Ok(assemble(row.into_iter().collect())?.pop())
}

/// Most recent runs first, optionally restricted to one site.
pub async fn list_runs(
    db: &Database,
    site_id: Option<&str>,
    limit: Option<u32>,
) -> Result<Vec<RunRecord>, SiteflowError> {
    let site_id = site_id.map(str::to_string);
    let limit = clamp_limit(limit);
    let rows = db
        .connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {RUN_COLUMNS} FROM sync_runs
                 WHERE (?1 IS NULL OR site_id = ?1)
                 ORDER BY started_at DESC, run_id ASC
                 LIMIT ?2"
            ))?;
            let runs = stmt
                .query_map(params![site_id, limit], RunRow::from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            runs.into_iter()
                .map(|run| {
                    let steps = load_steps(conn, &run.run_id)?;
                    Ok((run, steps))
                })
                .collect::<rusqlite::Result<Vec<_>>>()
        })
        .await
        .map_err(crate::database::map_tr_err)?;
    assemble(rows)
}

/// Runs still marked `running`, oldest first.
pub async fn incomplete_runs(db: &Database) -> Result<Vec<RunRecord>, SiteflowError> {
    let rows = db
        .connection()
        .call(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {RUN_COLUMNS} FROM sync_runs
                 WHERE status = 'running'
                 ORDER BY started_at ASC"
            ))?;
            let runs = stmt
                .query_map([], RunRow::from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            runs.into_iter()
                .map(|run| {
                    let steps = load_steps(conn, &run.run_id)?;
                    Ok((run, steps))
                })
                .collect::<rusqlite::Result<Vec<_>>>()
        })
        .await
        .map_err(crate::database::map_tr_err)?;
    assemble(rows)
}
