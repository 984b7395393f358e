use chrono::{DateTime, Utc};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SyncError>;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Failed to fetch {url}: {message}")]
    Fetch { url: String, message: String },

    #[error("Malformed header: expected 3 header rows, found {found}")]
    MalformedHeader { found: usize },

    #[error("No site configured with name '{name}'")]
    UnknownSite { name: String },

    #[error("Row {row} could not be transformed: {message}")]
    RowTransform { row: usize, message: String },

    #[error("Insert failed for site {site_id} at {timestamp}: {message}")]
    Insert {
        site_id: i32,
        timestamp: DateTime<Utc>,
        message: String,
    },

    #[error("Watermark update failed for site {site_id}: {message}")]
    WatermarkUpdate { site_id: i32, message: String },

    #[error("Site catalog unavailable: {0}")]
    CatalogUnavailable(String),

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Date parsing error: {0}")]
    DateParse(#[from] chrono::ParseError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration source error: {0}")]
    ConfigSource(#[from] config::ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Processing cancelled")]
    Cancelled,
}

impl SyncError {
    /// Only a failure to enumerate sites terminates a run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SyncError::CatalogUnavailable(_))
    }

    pub fn fetch(url: &str, message: impl Into<String>) -> Self {
        SyncError::Fetch {
            url: url.to_string(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_catalog_failures_are_fatal() {
        assert!(SyncError::CatalogUnavailable("down".to_string()).is_fatal());
        assert!(!SyncError::UnknownSite {
            name: "x".to_string()
        }
        .is_fatal());
        assert!(!SyncError::fetch("http://host/a.dat", "timeout").is_fatal());
        assert!(!SyncError::MalformedHeader { found: 2 }.is_fatal());
    }

    #[test]
    fn test_error_messages_carry_context() {
        let err = SyncError::fetch("http://host/a.dat", "status 404");
        assert_eq!(err.to_string(), "Failed to fetch http://host/a.dat: status 404");

        let err = SyncError::UnknownSite {
            name: "Laramie".to_string(),
        };
        assert!(err.to_string().contains("Laramie"));
    }
}
