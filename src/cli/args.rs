use crate::processors::{ClaimStrategy, WatermarkPolicy};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "station-sync")]
#[command(about = "Hourly weather-station telemetry sync into PostgreSQL")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Log file path")]
    pub log_file: Option<PathBuf>,

    #[arg(short, long, global = true, help = "Configuration file [default: station-sync.toml]")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Download every site's hourly file and import the new rows
    Sync {
        #[arg(short, long, help = "Number of concurrent workers")]
        workers: Option<usize>,

        #[arg(long, value_enum, help = "How sites are handed out to workers")]
        strategy: Option<ClaimStrategy>,

        #[arg(long, value_enum, help = "What is recorded as a site's last-updated time")]
        watermark_policy: Option<WatermarkPolicy>,

        #[arg(long, help = "Scratch directory for downloads, cleared on every run")]
        staging_dir: Option<PathBuf>,
    },

    /// List catalog sites and their last-updated time
    Sites,

    /// Register a new site in the catalog
    AddSite {
        #[arg(short, long)]
        name: String,

        #[arg(short, long, help = "URL of the site's hourly data file")]
        url: String,

        #[arg(long)]
        station_name: Option<String>,
    },

    /// Parse a local file and show what would be imported
    Inspect {
        file: PathBuf,

        #[arg(short, long, default_value = "5")]
        sample: usize,
    },

    /// Create the site and data tables
    InitDb,
}
