//! Storage boundary of the pipeline.
//!
//! The pipeline only needs to enumerate and look up sites, record a site's
//! watermark, read the latest stored datapoint of a site and insert new
//! datapoints. Everything else about persistence lives behind these traits.

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::{validate_schema_identifier, PgStore};

use crate::error::Result;
use crate::models::{Datapoint, NewSite, Site};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[async_trait]
pub trait SiteCatalog: Send + Sync {
    async fn list_sites(&self) -> Result<Vec<Site>>;

    async fn find_site_by_name(&self, name: &str) -> Result<Option<Site>>;

    async fn record_last_updated(&self, site_id: i32, timestamp: DateTime<Utc>) -> Result<()>;

    async fn register_site(&self, site: &NewSite) -> Result<Site>;
}

#[async_trait]
pub trait DatapointStore: Send + Sync {
    async fn most_recent_datapoint(&self, site_id: i32) -> Result<Option<Datapoint>>;

    async fn most_recent_timestamp(&self, site_id: i32) -> Result<Option<DateTime<Utc>>> {
        Ok(self
            .most_recent_datapoint(site_id)
            .await?
            .map(|datapoint| datapoint.timestamp))
    }

    async fn insert_datapoint(&self, datapoint: &Datapoint) -> Result<()>;
}
