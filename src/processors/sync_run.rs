use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use crate::fetch::{Downloader, StagingArea};
use crate::processors::importer::SiteImporter;
use crate::processors::report::SyncSummary;
use crate::processors::transformer::Transformer;
use crate::processors::worker_pool::WorkerPool;
use crate::store::{DatapointStore, SiteCatalog};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// One complete pass over every site in the catalog.
///
/// Only a failure to list the sites is returned as an error; everything that
/// goes wrong for an individual site ends up in the summary instead.
pub struct SyncRun {
    catalog: Arc<dyn SiteCatalog>,
    store: Arc<dyn DatapointStore>,
    config: SyncConfig,
    show_progress: bool,
}

impl SyncRun {
    pub fn new(catalog: Arc<dyn SiteCatalog>, store: Arc<dyn DatapointStore>, config: SyncConfig) -> Self {
        Self {
            catalog,
            store,
            config,
            show_progress: false,
        }
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub async fn execute(&self, cancel: CancellationToken) -> Result<SyncSummary> {
        let sites = self.catalog.list_sites().await.map_err(|e| match e {
            unavailable @ SyncError::CatalogUnavailable(_) => unavailable,
            other => SyncError::CatalogUnavailable(other.to_string()),
        })?;

        let staging = StagingArea::new(self.config.staging_dir.clone());
        staging.prepare()?;
        info!(path = %staging.root().display(), sites = sites.len(), "Staging area ready");

        let downloader = Downloader::new(staging, self.config.fetch_timeout())?;
        let importer = SiteImporter::new(Arc::clone(&self.catalog), Arc::clone(&self.store))
            .with_transformer(Transformer::with_utc_offset_hours(self.config.source_utc_offset_hours)?)
            .with_policy(self.config.watermark_policy);

        WorkerPool::new(downloader, importer, self.config.workers)
            .with_strategy(self.config.claim_strategy)
            .with_progress(self.show_progress)
            .run(sites, cancel)
            .await
    }
}
