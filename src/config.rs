use crate::error::{Result, SyncError};
use crate::processors::claim::ClaimStrategy;
use crate::processors::watermark::WatermarkPolicy;
use crate::store::validate_schema_identifier;
use crate::utils::constants::{
    DEFAULT_CONFIG_FILE, DEFAULT_FETCH_TIMEOUT_SECS, DEFAULT_MAX_CONNECTIONS, DEFAULT_SCHEMA,
    DEFAULT_STAGING_DIR, DEFAULT_WORKERS, ENV_PREFIX, SOURCE_UTC_OFFSET_HOURS,
};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;
use validator::Validate;

/// Runtime settings of a sync run.
///
/// Sources, later ones winning: built-in defaults, the TOML file,
/// `STATION_SYNC_*` variables, `DATABASE_URL`, then command-line flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SyncConfig {
    pub database_url: String,

    #[validate(length(min = 1))]
    pub schema: String,

    pub staging_dir: PathBuf,

    #[validate(range(min = 1))]
    pub workers: usize,

    pub claim_strategy: ClaimStrategy,

    pub watermark_policy: WatermarkPolicy,

    #[validate(range(min = 1))]
    pub fetch_timeout_secs: u64,

    #[validate(range(min = 1))]
    pub max_connections: u32,

    #[validate(range(min = -12, max = 14))]
    pub source_utc_offset_hours: i32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            schema: DEFAULT_SCHEMA.to_string(),
            staging_dir: PathBuf::from(DEFAULT_STAGING_DIR),
            workers: DEFAULT_WORKERS,
            claim_strategy: ClaimStrategy::default(),
            watermark_policy: WatermarkPolicy::default(),
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            source_utc_offset_hours: SOURCE_UTC_OFFSET_HOURS,
        }
    }
}

impl SyncConfig {
    /// Layer defaults, the config file and the environment.
    ///
    /// An explicit `path` must exist; the default file is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let settings = Config::builder()
            .add_source(Config::try_from(&SyncConfig::default())?)
            .add_source(file)
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .set_override_option("database_url", std::env::var("DATABASE_URL").ok())?
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.check()?;

        debug!(
            workers = config.workers,
            strategy = %config.claim_strategy,
            policy = %config.watermark_policy,
            "Configuration loaded"
        );

        Ok(config)
    }

    /// Field validation plus the checks the derive cannot express
    pub fn check(&self) -> Result<()> {
        self.validate()?;
        validate_schema_identifier(&self.schema)
    }

    /// Commands that talk to the database need a connection string.
    pub fn require_database_url(&self) -> Result<&str> {
        if self.database_url.trim().is_empty() {
            return Err(SyncError::Config(
                "database URL not set; use DATABASE_URL or database_url in the config file".to_string(),
            ));
        }
        Ok(&self.database_url)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.workers, 3);
        assert_eq!(config.schema, "public");
        assert_eq!(config.staging_dir, PathBuf::from("tmp"));
        assert_eq!(config.claim_strategy, ClaimStrategy::Shared);
        assert_eq!(config.watermark_policy, WatermarkPolicy::RunTime);
        assert!(config.check().is_ok());
        assert!(config.require_database_url().is_err());
    }

    #[test]
    fn test_file_values_override_defaults() -> Result<()> {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile()?;
        writeln!(file, "workers = 5")?;
        writeln!(file, "schema = \"weather\"")?;
        writeln!(file, "claim_strategy = \"sharded\"")?;
        writeln!(file, "watermark_policy = \"max_inserted_timestamp\"")?;

        let config = SyncConfig::load(Some(file.path()))?;
        assert_eq!(config.workers, 5);
        assert_eq!(config.schema, "weather");
        assert_eq!(config.claim_strategy, ClaimStrategy::Sharded);
        assert_eq!(config.watermark_policy, WatermarkPolicy::MaxInsertedTimestamp);
        assert_eq!(config.fetch_timeout_secs, 60);

        Ok(())
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = SyncConfig::default();
        config.workers = 0;
        assert!(matches!(config.check(), Err(SyncError::Validation(_))));

        let mut config = SyncConfig::default();
        config.workers = 256;
        assert!(config.check().is_ok());

        let mut config = SyncConfig::default();
        config.schema = "public;drop".to_string();
        assert!(matches!(config.check(), Err(SyncError::Config(_))));

        let missing = SyncConfig::load(Some(Path::new("/nonexistent/station-sync.toml")));
        assert!(missing.is_err());
    }
}
