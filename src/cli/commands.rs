use crate::cli::args::{Cli, Commands};
use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use crate::models::NewSite;
use crate::processors::{SyncRun, Transformer};
use crate::readers::TabularParser;
use crate::store::{PgStore, SiteCatalog};
use crate::utils::logging::init_logging;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use validator::Validate;

pub async fn run(cli: Cli) -> Result<()> {
    dotenvy::dotenv().ok();
    init_logging(cli.verbose, cli.log_file.as_deref())?;

    let mut config = SyncConfig::load(cli.config.as_deref())?;
    // Progress bar and debug log lines on one terminal do not mix
    let show_progress = !cli.verbose && cli.log_file.is_none();

    match cli.command {
        Commands::Sync {
            workers,
            strategy,
            watermark_policy,
            staging_dir,
        } => {
            if let Some(workers) = workers {
                config.workers = workers;
            }
            if let Some(strategy) = strategy {
                config.claim_strategy = strategy;
            }
            if let Some(policy) = watermark_policy {
                config.watermark_policy = policy;
            }
            if let Some(staging_dir) = staging_dir {
                config.staging_dir = staging_dir;
            }
            config.check()?;

            sync(config, show_progress).await
        }

        Commands::Sites => {
            let store = connect(&config).await?;
            let sites = store.list_sites().await?;

            println!("{} sites in schema '{}':", sites.len(), config.schema);
            for site in sites {
                let last_updated = site
                    .watermark
                    .map(|ts| ts.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                    .unwrap_or_else(|| "never".to_string());
                println!(
                    "  [{}] {:<24} last updated {}  {}",
                    site.site_id,
                    site.display_name(),
                    last_updated,
                    site.download_url
                );
            }
            Ok(())
        }

        Commands::AddSite {
            name,
            url,
            station_name,
        } => {
            let new_site = NewSite {
                site_name: name,
                download_url: url,
                station_name,
            };
            new_site.validate()?;

            let store = connect(&config).await?;
            if store.find_site_by_name(&new_site.site_name).await?.is_some() {
                return Err(SyncError::Config(format!(
                    "site '{}' already exists",
                    new_site.site_name
                )));
            }

            let site = store.register_site(&new_site).await?;
            info!(site_id = site.site_id, site_name = %site.site_name, "Site registered");
            println!("Registered site {} as id {}", site.site_name, site.site_id);
            Ok(())
        }

        Commands::Inspect { file, sample } => inspect(&file, sample, &config),

        Commands::InitDb => {
            let store = connect(&config).await?;
            store.ensure_schema(&config.schema).await?;
            println!("Tables ready in schema '{}'", config.schema);
            Ok(())
        }
    }
}

async fn connect(config: &SyncConfig) -> Result<PgStore> {
    config.require_database_url()?;
    PgStore::connect(config).await
}

async fn sync(config: SyncConfig, show_progress: bool) -> Result<()> {
    // Without a database the sites cannot even be listed
    let store = match connect(&config).await {
        Ok(store) => Arc::new(store),
        Err(e) => return Err(SyncError::CatalogUnavailable(e.to_string())),
    };

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing current rows");
            on_interrupt.cancel();
        }
    });

    let summary = SyncRun::new(store.clone(), store, config)
        .with_progress(show_progress)
        .execute(cancel)
        .await?;

    println!("\n{}", summary.generate_summary());
    Ok(())
}

fn inspect(file: &Path, sample: usize, config: &SyncConfig) -> Result<()> {
    let parsed = TabularParser::new().parse_file(file)?;
    let transformer = Transformer::with_utc_offset_hours(config.source_utc_offset_hours)?;

    println!("File: {}", file.display());
    if parsed.junk_row_removed {
        println!("Preamble row discarded");
    }
    println!("Columns: {}", parsed.header.len());
    for (index, identifier) in parsed.header.identifiers.iter().enumerate() {
        println!(
            "  {:<24} {:<12} {}",
            identifier,
            parsed.header.unit(index),
            parsed.header.measurement_type(index)
        );
    }
    println!("Data rows: {}", parsed.rows.len());

    if sample > 0 && !parsed.rows.is_empty() {
        println!("\nSample readings (showing up to {}):", sample);
        for (index, row) in parsed.rows.iter().take(sample).enumerate() {
            match transformer.transform_row(0, &parsed.header, row, index + 1) {
                Ok(datapoint) => println!(
                    "  {}  {}",
                    datapoint.timestamp.to_rfc3339(),
                    datapoint.readings.to_json()?
                ),
                Err(e) => println!("  row {}: {}", index + 1, e),
            }
        }
    }

    Ok(())
}
