pub mod claim;
pub mod importer;
pub mod report;
pub mod site_resolver;
pub mod sync_run;
pub mod transformer;
pub mod watermark;
pub mod worker_pool;

pub use claim::{partition, ClaimCoordinator, ClaimState, ClaimStrategy};
pub use importer::SiteImporter;
pub use report::{ImportReport, SiteOutcome, SyncSummary};
pub use site_resolver::SiteResolver;
pub use sync_run::SyncRun;
pub use transformer::Transformer;
pub use watermark::{WatermarkGate, WatermarkPolicy};
pub use worker_pool::{WorkerContext, WorkerPool};
