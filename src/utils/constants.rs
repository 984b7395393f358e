/// Column identifiers with structural meaning
pub const TIMESTAMP_COLUMN: &str = "TIMESTAMP";
pub const SITE_COLUMN: &str = "site";

/// Identifiers never persisted as readings (time, sequence, site tag)
pub const DROP_COLUMNS: [&str; 7] = ["TIMESTAMP", "RECORD", "site", "year", "month", "day", "hour"];

/// Loggers report local standard time at UTC-6 year-round
pub const SOURCE_UTC_OFFSET_HOURS: i32 = -6;

/// Accepted layouts of the TIMESTAMP cell
pub const TIMESTAMP_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
];

/// Number of header rows after the optional preamble
pub const HEADER_ROW_COUNT: usize = 3;

/// Processing defaults
pub const DEFAULT_WORKERS: usize = 3;
pub const DEFAULT_STAGING_DIR: &str = "tmp";
pub const DEFAULT_SCHEMA: &str = "public";
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_MAX_CONNECTIONS: u32 = 20;
pub const DEFAULT_CONFIG_FILE: &str = "station-sync.toml";
pub const ENV_PREFIX: &str = "STATION_SYNC";

pub const USER_AGENT: &str = concat!("station-sync/", env!("CARGO_PKG_VERSION"));
