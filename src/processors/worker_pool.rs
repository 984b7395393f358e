use crate::error::Result;
use crate::fetch::Downloader;
use crate::models::Site;
use crate::processors::claim::{partition, ClaimCoordinator, ClaimState, ClaimStrategy};
use crate::processors::importer::SiteImporter;
use crate::processors::report::{ImportReport, SiteOutcome, SyncSummary};
use crate::utils::progress::ProgressReporter;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, warn, Instrument};

/// Identity and cancellation handle of one worker, passed to every step it runs.
#[derive(Debug, Clone)]
pub struct WorkerContext {
    pub id: usize,
    pub name: String,
    pub cancel: CancellationToken,
}

impl WorkerContext {
    pub fn new(id: usize, cancel: CancellationToken) -> Self {
        Self {
            id,
            name: format!("worker-{}", id),
            cancel,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl fmt::Display for WorkerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Runs a fixed number of workers over one run's site list.
pub struct WorkerPool {
    downloader: Downloader,
    importer: Arc<SiteImporter>,
    workers: usize,
    strategy: ClaimStrategy,
    show_progress: bool,
}

struct RunState {
    sites: Vec<Site>,
    claims: ClaimCoordinator,
    downloader: Downloader,
    importer: Arc<SiteImporter>,
    progress: ProgressReporter,
}

impl WorkerPool {
    pub fn new(downloader: Downloader, importer: SiteImporter, workers: usize) -> Self {
        Self {
            downloader,
            importer: Arc::new(importer),
            workers: workers.max(1),
            strategy: ClaimStrategy::default(),
            show_progress: false,
        }
    }

    pub fn with_strategy(mut self, strategy: ClaimStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Site positions each worker visits, in order.
    fn assignments(&self, site_count: usize) -> Vec<Vec<usize>> {
        match self.strategy {
            ClaimStrategy::Shared => vec![(0..site_count).collect(); self.workers],
            ClaimStrategy::Sharded => partition(site_count, self.workers),
        }
    }

    pub async fn run(&self, sites: Vec<Site>, cancel: CancellationToken) -> Result<SyncSummary> {
        let start = Instant::now();
        let site_count = sites.len();

        info!(
            sites = site_count,
            workers = self.workers,
            strategy = %self.strategy,
            "Starting sync"
        );

        let progress = if self.show_progress {
            ProgressReporter::new(site_count as u64, "Syncing sites", false)
        } else {
            ProgressReporter::silent()
        };

        let state = Arc::new(RunState {
            claims: ClaimCoordinator::new(site_count),
            sites,
            downloader: self.downloader.clone(),
            importer: Arc::clone(&self.importer),
            progress,
        });

        let mut join_set = JoinSet::new();
        for (id, order) in self.assignments(site_count).into_iter().enumerate() {
            let ctx = WorkerContext::new(id, cancel.child_token());
            let span = info_span!("worker", worker = %ctx);
            let state = Arc::clone(&state);
            join_set.spawn(async move { state.run_worker(ctx, order).await }.instrument(span));
        }

        let mut summary = SyncSummary::default();
        while let Some(result) = join_set.join_next().await {
            match result {
                Ok(outcomes) => summary.outcomes.extend(outcomes),
                Err(e) => error!(error = %e, "Worker task ended abnormally"),
            }
        }

        summary.unclaimed = state.claims.count_in(ClaimState::Unclaimed);
        summary.elapsed = start.elapsed();

        state.progress.finish_with_message(&format!(
            "{} sites synced, {} failed",
            summary.sites_downloaded(),
            summary.sites_failed()
        ));

        info!(
            downloaded = summary.sites_downloaded(),
            failed = summary.sites_failed(),
            inserted = summary.total_inserted(),
            "Sync finished"
        );

        Ok(summary)
    }
}

impl RunState {
    async fn run_worker(&self, ctx: WorkerContext, order: Vec<usize>) -> Vec<SiteOutcome> {
        let mut outcomes = Vec::new();

        for index in order {
            if ctx.is_cancelled() {
                warn!(worker = %ctx, "Cancelled, no further sites claimed");
                break;
            }
            if !self.claims.try_claim(index) {
                continue;
            }

            let site = &self.sites[index];
            self.progress.set_message(&format!("{} ({})", site.display_name(), ctx));
            let span = info_span!("site", site_id = site.site_id, site_name = %site.site_name);
            let outcome = self.process_site(index, site, &ctx).instrument(span).await;

            self.progress.increment(1);
            outcomes.push(outcome);
        }

        outcomes
    }

    async fn process_site(&self, index: usize, site: &Site, ctx: &WorkerContext) -> SiteOutcome {
        let mut outcome = SiteOutcome {
            site_id: site.site_id,
            site_name: site.site_name.clone(),
            worker: ctx.name.clone(),
            state: ClaimState::Claimed,
            report: None,
            error: None,
        };

        match self.sync_site(site, ctx).await {
            Ok(report) => {
                self.claims.mark_downloaded(index);
                outcome.state = ClaimState::Downloaded;
                outcome.report = Some(report);
            }
            Err(e) => {
                warn!(
                    worker = %ctx,
                    site_id = site.site_id,
                    url = %site.download_url,
                    error = %e,
                    "Site skipped for this run"
                );
                self.claims.mark_failed(index);
                outcome.state = ClaimState::Failed;
                outcome.error = Some(e.to_string());
            }
        }

        outcome
    }

    async fn sync_site(&self, site: &Site, ctx: &WorkerContext) -> Result<ImportReport> {
        let staged = self.downloader.fetch(site, &ctx.cancel).await?;
        self.importer.import_file(&staged, ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_context_display() {
        let ctx = WorkerContext::new(2, CancellationToken::new());
        assert_eq!(ctx.to_string(), "worker-2");
        assert!(!ctx.is_cancelled());

        ctx.cancel.cancel();
        assert!(ctx.is_cancelled());
    }
}
