use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::utils::filename::file_name_from_url;

/// One monitored station as recorded in the site catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Site {
    pub site_id: i32,

    #[validate(length(min = 1))]
    pub site_name: String,

    #[validate(url)]
    pub download_url: String,

    pub station_name: Option<String>,

    /// Last-updated time recorded after the most recent import pass.
    pub watermark: Option<DateTime<Utc>>,
}

impl Site {
    pub fn new(site_id: i32, site_name: &str, download_url: &str) -> Self {
        Self {
            site_id,
            site_name: site_name.to_string(),
            download_url: download_url.to_string(),
            station_name: None,
            watermark: None,
        }
    }

    /// Name used in log lines: the station name when one is configured.
    pub fn display_name(&self) -> &str {
        self.station_name.as_deref().unwrap_or(&self.site_name)
    }

    /// File name the download is staged under.
    pub fn staged_file_name(&self) -> Option<&str> {
        file_name_from_url(&self.download_url)
    }
}

/// A site that has not yet been assigned an id by the catalog.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewSite {
    #[validate(length(min = 1))]
    pub site_name: String,

    #[validate(url)]
    pub download_url: String,

    pub station_name: Option<String>,
}
