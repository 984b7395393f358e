use crate::error::Result;
use crate::models::{ParsedFile, Site};
use crate::processors::report::ImportReport;
use crate::processors::site_resolver::SiteResolver;
use crate::processors::transformer::Transformer;
use crate::processors::watermark::{WatermarkGate, WatermarkPolicy};
use crate::processors::worker_pool::WorkerContext;
use crate::readers::TabularParser;
use crate::store::{DatapointStore, SiteCatalog};
use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Imports one staged file into the site it belongs to.
///
/// Rows are processed one at a time in file order and every insert is
/// awaited before the next row, so the watermark is only written once all
/// of the file's rows have been handled.
pub struct SiteImporter {
    catalog: Arc<dyn SiteCatalog>,
    store: Arc<dyn DatapointStore>,
    resolver: SiteResolver,
    parser: TabularParser,
    transformer: Transformer,
    policy: WatermarkPolicy,
}

impl SiteImporter {
    pub fn new(catalog: Arc<dyn SiteCatalog>, store: Arc<dyn DatapointStore>) -> Self {
        Self {
            resolver: SiteResolver::new(Arc::clone(&catalog)),
            catalog,
            store,
            parser: TabularParser::new(),
            transformer: Transformer::new(),
            policy: WatermarkPolicy::default(),
        }
    }

    pub fn with_transformer(mut self, transformer: Transformer) -> Self {
        self.transformer = transformer;
        self
    }

    pub fn with_policy(mut self, policy: WatermarkPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> WatermarkPolicy {
        self.policy
    }

    pub async fn import_file(&self, path: &Path, ctx: &WorkerContext) -> Result<ImportReport> {
        let raw = tokio::fs::read(path).await?;
        let parsed = self.parser.parse(&raw)?;

        let site = self
            .resolver
            .resolve(&parsed.header, parsed.rows.first(), path)
            .await?;

        debug!(
            worker = %ctx,
            site_id = site.site_id,
            rows = parsed.rows.len(),
            preamble = parsed.junk_row_removed,
            "Parsed staged file"
        );

        self.import_rows(&site, &parsed, ctx).await
    }

    /// Insert the rows of `parsed` that are newer than the site's latest
    /// stored datapoint, then record the site's watermark.
    pub async fn import_rows(&self, site: &Site, parsed: &ParsedFile, ctx: &WorkerContext) -> Result<ImportReport> {
        let gate = WatermarkGate::new(self.store.most_recent_timestamp(site.site_id).await?);
        let mut report = ImportReport::new(site.site_id);
        report.rows_total = parsed.rows.len();

        match gate {
            WatermarkGate::FreshImport => {
                info!(worker = %ctx, site_id = site.site_id, "No stored datapoints, importing every row")
            }
            WatermarkGate::Since(latest) => {
                debug!(worker = %ctx, site_id = site.site_id, latest = %latest, "Importing rows after latest datapoint")
            }
        }

        for (index, row) in parsed.rows.iter().enumerate() {
            if ctx.is_cancelled() {
                report.cancelled = true;
                break;
            }

            let row_number = index + 1;
            let timestamp = match self.transformer.row_timestamp(&parsed.header, row, row_number) {
                Ok(timestamp) => timestamp,
                Err(e) => {
                    warn!(worker = %ctx, site_id = site.site_id, row = row_number, error = %e, "Skipping row");
                    report.transform_failures += 1;
                    continue;
                }
            };

            if !gate.should_insert(timestamp) {
                report.skipped_existing += 1;
                continue;
            }

            let datapoint = self.transformer.transform(site.site_id, timestamp, &parsed.header, row);
            match self.store.insert_datapoint(&datapoint).await {
                Ok(()) => report.record_insert(timestamp),
                Err(e) => {
                    warn!(
                        worker = %ctx,
                        site_id = site.site_id,
                        row = row_number,
                        timestamp = %timestamp,
                        error = %e,
                        "Insert failed"
                    );
                    report.insert_failures += 1;
                }
            }
        }

        if report.cancelled {
            warn!(
                worker = %ctx,
                site_id = site.site_id,
                inserted = report.inserted,
                "Import interrupted, watermark left unchanged"
            );
            return Ok(report);
        }

        match self.policy.resolve(Utc::now(), report.max_inserted) {
            Some(watermark) => match self.catalog.record_last_updated(site.site_id, watermark).await {
                Ok(()) => report.watermark = Some(watermark),
                Err(e) => warn!(worker = %ctx, site_id = site.site_id, error = %e, "Watermark update failed"),
            },
            None => debug!(worker = %ctx, site_id = site.site_id, "Nothing inserted, watermark unchanged"),
        }

        info!(
            worker = %ctx,
            site_id = site.site_id,
            inserted = report.inserted,
            skipped = report.skipped_existing,
            failed = report.failures(),
            "Import complete"
        );

        Ok(report)
    }
}
