use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use crate::models::{Datapoint, NewSite, Reading, Site};
use crate::store::{DatapointStore, SiteCatalog};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use sqlx::types::Json;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

const SITE_COLUMNS: &str = "site_id, site_name, site_hourly_data_url, station_name, last_updated";

/// Site catalog and datapoint store backed by PostgreSQL.
///
/// The schema is fixed per connection through `search_path`, so every
/// statement below is static and takes its values as bind parameters.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

#[derive(Debug, sqlx::FromRow)]
struct SiteRow {
    site_id: i32,
    site_name: String,
    site_hourly_data_url: String,
    station_name: Option<String>,
    last_updated: Option<DateTime<Utc>>,
}

impl From<SiteRow> for Site {
    fn from(row: SiteRow) -> Self {
        Site {
            site_id: row.site_id,
            site_name: row.site_name,
            download_url: row.site_hourly_data_url,
            station_name: row.station_name,
            watermark: row.last_updated,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct DatapointRow {
    site_id: i32,
    timestamp: DateTime<Utc>,
    data: Json<Reading>,
}

impl From<DatapointRow> for Datapoint {
    fn from(row: DatapointRow) -> Self {
        Datapoint::new(row.site_id, row.timestamp, row.data.0)
    }
}

impl PgStore {
    pub async fn connect(config: &SyncConfig) -> Result<Self> {
        validate_schema_identifier(&config.schema)?;

        let options = PgConnectOptions::from_str(&config.database_url)?
            .options([("search_path", config.schema.as_str())]);

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(options)
            .await?;

        info!(
            schema = %config.schema,
            max_connections = config.max_connections,
            "Database connection pool created"
        );

        Ok(Self { pool })
    }

    /// Create the schema and both tables when they do not exist yet.
    pub async fn ensure_schema(&self, schema: &str) -> Result<()> {
        validate_schema_identifier(schema)?;

        // Identifiers cannot be bound; the name was checked above
        sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {}", schema))
            .execute(&self.pool)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS site (
                site_id SERIAL PRIMARY KEY,
                site_name TEXT NOT NULL UNIQUE,
                site_hourly_data_url TEXT NOT NULL,
                last_updated TIMESTAMPTZ,
                station_name TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS data (
                site_id INTEGER NOT NULL REFERENCES site (site_id),
                "timestamp" TIMESTAMPTZ NOT NULL,
                data JSONB NOT NULL,
                PRIMARY KEY (site_id, "timestamp")
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        info!(schema, "Database schema ready");
        Ok(())
    }
}

#[async_trait]
impl SiteCatalog for PgStore {
    async fn list_sites(&self) -> Result<Vec<Site>> {
        let rows: Vec<SiteRow> = sqlx::query_as(&format!("SELECT {} FROM site ORDER BY site_id", SITE_COLUMNS))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| SyncError::CatalogUnavailable(e.to_string()))?;

        debug!(count = rows.len(), "Loaded site catalog");
        Ok(rows.into_iter().map(Site::from).collect())
    }

    async fn find_site_by_name(&self, name: &str) -> Result<Option<Site>> {
        let row: Option<SiteRow> =
            sqlx::query_as(&format!("SELECT {} FROM site WHERE site_name = $1", SITE_COLUMNS))
                .bind(name)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(Site::from))
    }

    async fn record_last_updated(&self, site_id: i32, timestamp: DateTime<Utc>) -> Result<()> {
        let result = sqlx::query("UPDATE site SET last_updated = $2 WHERE site_id = $1")
            .bind(site_id)
            .bind(timestamp)
            .execute(&self.pool)
            .await
            .map_err(|e| SyncError::WatermarkUpdate {
                site_id,
                message: e.to_string(),
            })?;

        if result.rows_affected() == 0 {
            return Err(SyncError::WatermarkUpdate {
                site_id,
                message: "no such site".to_string(),
            });
        }

        Ok(())
    }

    async fn register_site(&self, site: &NewSite) -> Result<Site> {
        let row: SiteRow = sqlx::query_as(&format!(
            "INSERT INTO site (site_name, site_hourly_data_url, station_name, last_updated) \
             VALUES ($1, $2, $3, now()) RETURNING {}",
            SITE_COLUMNS
        ))
        .bind(&site.site_name)
        .bind(&site.download_url)
        .bind(&site.station_name)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }
}

#[async_trait]
impl DatapointStore for PgStore {
    async fn most_recent_datapoint(&self, site_id: i32) -> Result<Option<Datapoint>> {
        let row: Option<DatapointRow> = sqlx::query_as(
            r#"SELECT site_id, "timestamp", data FROM data WHERE site_id = $1 ORDER BY "timestamp" DESC LIMIT 1"#,
        )
        .bind(site_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Datapoint::from))
    }

    async fn most_recent_timestamp(&self, site_id: i32) -> Result<Option<DateTime<Utc>>> {
        let latest: Option<DateTime<Utc>> =
            sqlx::query_scalar(r#"SELECT max("timestamp") FROM data WHERE site_id = $1"#)
                .bind(site_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(latest)
    }

    async fn insert_datapoint(&self, datapoint: &Datapoint) -> Result<()> {
        sqlx::query(r#"INSERT INTO data (site_id, "timestamp", data) VALUES ($1, $2, $3)"#)
            .bind(datapoint.site_id)
            .bind(datapoint.timestamp)
            .bind(Json(&datapoint.readings))
            .execute(&self.pool)
            .await
            .map_err(|e| SyncError::Insert {
                site_id: datapoint.site_id,
                timestamp: datapoint.timestamp,
                message: e.to_string(),
            })?;

        Ok(())
    }
}

/// Schema names are spliced into `search_path` and DDL, so only plain
/// identifiers are accepted.
pub fn validate_schema_identifier(schema: &str) -> Result<()> {
    let mut chars = schema.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };

    if valid {
        Ok(())
    } else {
        Err(SyncError::Config(format!("invalid schema name '{}'", schema)))
    }
}
