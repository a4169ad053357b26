// SPDX-FileCopyrightText: 2026 Siteflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The pagination loop: fetch a page, attribute and persist each entity,
//! advance the cursor, repeat until the source reports no more pages.
//!
//! The loop is strictly sequential. An entity's attribution lookup only sees
//! events committed by earlier entities, never ones still in flight.

use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use siteflow_core::types::{Credential, EntityKind, PageRequest, RemoteEntity, RunSummary, TimeWindow};
use siteflow_core::{EventStore, PageSource, SiteflowError};

use crate::transform::entity_to_event;

/// A failed sync, with everything committed before the failure.
#[derive(Debug, Error)]
#[error("{source}")]
pub struct SyncError {
    /// Counts for the pages processed before the failure.
    pub summary: RunSummary,
    #[source]
    pub source: SiteflowError,
}

impl SyncError {
    fn new(summary: RunSummary, source: SiteflowError) -> Self {
        Self { summary, source }
    }
}

impl From<SyncError> for SiteflowError {
    fn from(err: SyncError) -> Self {
        err.source
    }
}

/// One sync invocation: which site, which collection, where to start.
#[derive(Debug, Clone)]
pub struct SyncJob {
    pub credential: Credential,
    pub kind: EntityKind,
    pub window: TimeWindow,
    pub start_page: u32,
}

/// Drives pagination for one entity kind and persists an event per entity.
pub struct SyncEngine {
    source: Arc<dyn PageSource>,
    events: Arc<dyn EventStore>,
    page_size: u32,
}

impl SyncEngine {
    pub fn new(source: Arc<dyn PageSource>, events: Arc<dyn EventStore>, page_size: u32) -> Self {
        Self {
            source,
            events,
            page_size,
        }
    }

    /// Run the pagination loop to completion.
    ///
    /// Cancellation is checked before every page fetch; an in-flight fetch or
    /// insert is never interrupted. On any failure the partial summary is
    /// returned alongside the error, and already inserted events stay.
    pub async fn sync(
        &self,
        job: &SyncJob,
        cancel: &CancellationToken,
    ) -> Result<RunSummary, SyncError> {
        let site_id = job.credential.site_id.as_str();
        let mut summary = RunSummary::default();
        let mut page = job.start_page.max(1);

        loop {
            if cancel.is_cancelled() {
                warn!(site_id, kind = %job.kind, page, "sync cancelled");
                return Err(SyncError::new(summary, SiteflowError::Cancelled));
            }

            let request = PageRequest {
                page,
                page_size: self.page_size,
                window: job.window,
            };
            let fetched = self
                .source
                .fetch_page(&job.credential, job.kind, &request)
                .await
                .map_err(|e| SyncError::new(summary, e))?;

            for entity in &fetched.items {
                let inserted = self
                    .ingest(site_id, entity)
                    .await
                    .map_err(|e| SyncError::new(summary, e))?;
                summary.record(inserted);
            }

            summary.pages_processed += 1;
            summary.observe_total(fetched.total);
            debug!(
                site_id,
                kind = %job.kind,
                page,
                items = fetched.items.len(),
                inserted = summary.inserted,
                skipped = summary.skipped,
                "page processed"
            );

            if !fetched.has_more {
                break;
            }
            page = match fetched.next_page {
                Some(next) if next <= page => {
                    return Err(SyncError::new(
                        summary,
                        SiteflowError::remote(format!(
                            "source cursor did not advance: page {page} named next page {next}"
                        )),
                    ));
                }
                Some(next) => next,
                None => page + 1,
            };
        }

        info!(
            site_id,
            kind = %job.kind,
            inserted = summary.inserted,
            skipped = summary.skipped,
            pages = summary.pages_processed,
            total_remote = summary.total_remote,
            "sync finished"
        );
        Ok(summary)
    }

    /// Attribute one entity from committed history and insert its event.
    async fn ingest(&self, site_id: &str, entity: &RemoteEntity) -> Result<bool, SiteflowError> {
        let attribution = self.events.latest_attribution(entity.subject_id()).await?;
        let event = entity_to_event(site_id, entity, attribution);
        self.events.insert_event(&event).await
    }
}
