// SPDX-FileCopyrightText: 2026 Siteflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Process wiring: storage, source client, and the services built on them.

use std::sync::Arc;
use std::time::Duration;

use siteflow_config::SiteflowConfig;
use siteflow_core::{SiteflowError, StorageAdapter};
use siteflow_source::BuilderClient;
use siteflow_storage::SqliteStorage;
use siteflow_sync::{EventSeeder, SiteRegistry, SyncEngine};
use siteflow_workflow::{LocalOrchestrator, RetryPolicy};
use tracing::info;

/// Every service a command needs, sharing one storage handle.
pub struct App {
    pub config: SiteflowConfig,
    pub storage: Arc<SqliteStorage>,
    pub registry: SiteRegistry,
    pub seeder: EventSeeder,
    pub orchestrator: LocalOrchestrator,
}

impl App {
    /// Open storage (running migrations) and build the services.
    pub async fn open(config: SiteflowConfig) -> Result<Self, SiteflowError> {
        let storage = SqliteStorage::new(config.storage.clone());
        storage.initialize().await?;
        let storage = Arc::new(storage);

        let client = Arc::new(BuilderClient::new(&config.source)?);
        let engine = SyncEngine::new(client.clone(), storage.clone(), config.source.page_size);
        let orchestrator = LocalOrchestrator::new(
            storage.clone(),
            storage.clone(),
            engine,
            RetryPolicy::from_config(&config.workflow),
            Duration::from_secs(config.workflow.run_timeout_secs),
        );

        info!(
            database = %config.storage.database_path,
            page_size = config.source.page_size,
            "siteflow initialized"
        );

        Ok(Self {
            registry: SiteRegistry::new(storage.clone(), client),
            seeder: EventSeeder::from_entropy(storage.clone()),
            orchestrator,
            storage,
            config,
        })
    }

    /// Drain runs started by this process, then checkpoint storage.
    pub async fn close(&self, grace: Duration) -> Result<(), SiteflowError> {
        self.orchestrator.shutdown(grace).await;
        self.storage.close().await
    }
}
