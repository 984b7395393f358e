use crate::error::{Result, SyncError};
use crate::models::{Datapoint, NewSite, Site};
use crate::store::{DatapointStore, SiteCatalog};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard};

/// In-process catalog and datapoint store.
///
/// Used by the test-suite and by callers without a database. Enforces the same
/// one-datapoint-per-(site, timestamp) rule as the database table.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    sites: BTreeMap<i32, Site>,
    datapoints: BTreeMap<(i32, DateTime<Utc>), Datapoint>,
    insert_attempts: usize,
    failing_inserts: HashSet<(i32, DateTime<Utc>)>,
    catalog_unavailable: bool,
    watermark_updates_fail: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sites(sites: Vec<Site>) -> Self {
        let store = Self::new();
        {
            let mut inner = store.lock();
            for site in sites {
                inner.sites.insert(site.site_id, site);
            }
        }
        store
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panicked test thread must not hide the data from the others
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn site(&self, site_id: i32) -> Option<Site> {
        self.lock().sites.get(&site_id).cloned()
    }

    /// Stored datapoints of one site in timestamp order
    pub fn datapoints(&self, site_id: i32) -> Vec<Datapoint> {
        self.lock()
            .datapoints
            .range((site_id, DateTime::<Utc>::MIN_UTC)..=(site_id, DateTime::<Utc>::MAX_UTC))
            .map(|(_, datapoint)| datapoint.clone())
            .collect()
    }

    pub fn datapoint_count(&self) -> usize {
        self.lock().datapoints.len()
    }

    pub fn insert_attempts(&self) -> usize {
        self.lock().insert_attempts
    }

    pub fn fail_insert_at(&self, site_id: i32, timestamp: DateTime<Utc>) {
        self.lock().failing_inserts.insert((site_id, timestamp));
    }

    pub fn set_catalog_unavailable(&self, unavailable: bool) {
        self.lock().catalog_unavailable = unavailable;
    }

    pub fn set_watermark_updates_fail(&self, fail: bool) {
        self.lock().watermark_updates_fail = fail;
    }
}

#[async_trait]
impl SiteCatalog for MemoryStore {
    async fn list_sites(&self) -> Result<Vec<Site>> {
        let inner = self.lock();
        if inner.catalog_unavailable {
            return Err(SyncError::CatalogUnavailable("memory catalog offline".to_string()));
        }
        Ok(inner.sites.values().cloned().collect())
    }

    async fn find_site_by_name(&self, name: &str) -> Result<Option<Site>> {
        Ok(self
            .lock()
            .sites
            .values()
            .find(|site| site.site_name == name)
            .cloned())
    }

    async fn record_last_updated(&self, site_id: i32, timestamp: DateTime<Utc>) -> Result<()> {
        let mut inner = self.lock();
        if inner.watermark_updates_fail {
            return Err(SyncError::WatermarkUpdate {
                site_id,
                message: "memory catalog rejected update".to_string(),
            });
        }

        match inner.sites.get_mut(&site_id) {
            Some(site) => {
                site.watermark = Some(timestamp);
                Ok(())
            }
            None => Err(SyncError::WatermarkUpdate {
                site_id,
                message: "no such site".to_string(),
            }),
        }
    }

    async fn register_site(&self, site: &NewSite) -> Result<Site> {
        let mut inner = self.lock();
        let site_id = inner.sites.keys().next_back().copied().unwrap_or(0) + 1;
        let created = Site {
            site_id,
            site_name: site.site_name.clone(),
            download_url: site.download_url.clone(),
            station_name: site.station_name.clone(),
            watermark: Some(Utc::now()),
        };
        inner.sites.insert(site_id, created.clone());
        Ok(created)
    }
}

#[async_trait]
impl DatapointStore for MemoryStore {
    async fn most_recent_datapoint(&self, site_id: i32) -> Result<Option<Datapoint>> {
        Ok(self
            .lock()
            .datapoints
            .range((site_id, DateTime::<Utc>::MIN_UTC)..=(site_id, DateTime::<Utc>::MAX_UTC))
            .next_back()
            .map(|(_, datapoint)| datapoint.clone()))
    }

    async fn insert_datapoint(&self, datapoint: &Datapoint) -> Result<()> {
        let mut inner = self.lock();
        inner.insert_attempts += 1;

        let key = (datapoint.site_id, datapoint.timestamp);
        if inner.failing_inserts.contains(&key) {
            return Err(SyncError::Insert {
                site_id: datapoint.site_id,
                timestamp: datapoint.timestamp,
                message: "injected failure".to_string(),
            });
        }
        if inner.datapoints.contains_key(&key) {
            return Err(SyncError::Insert {
                site_id: datapoint.site_id,
                timestamp: datapoint.timestamp,
                message: "duplicate (site_id, timestamp)".to_string(),
            });
        }

        inner.datapoints.insert(key, datapoint.clone());
        Ok(())
    }
}
