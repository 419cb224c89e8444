//! aircheck-ds - Syndication analysis service
//!
//! Hashes each broadcast day's ingested plays at three attribute levels,
//! groups equal hashes across stations into syndication runs, and
//! designates a master play per run by station authority. Runs strictly
//! after the ingest service has finished the date.

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use aircheck_common::config;
use aircheck_common::db::init::init_database;
use aircheck_ds::db::{plays, stations};
use aircheck_ds::services::{sequence_hasher, SyndicationMatcher};

/// Command-line arguments for aircheck-ds
#[derive(Parser, Debug)]
#[command(name = "aircheck-ds")]
#[command(about = "Syndication analysis service for the aircheck catalog")]
#[command(version)]
struct Cli {
    /// Path to the TOML config file
    #[arg(long, env = "AIRCHECK_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Data folder holding the database
    #[arg(long, env = "AIRCHECK_DATA", global = true)]
    data_folder: Option<PathBuf>,

    /// Database file path (overrides the data-folder default)
    #[arg(long, env = "AIRCHECK_DB", global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Hash, group, and assign masters for a broadcast date
    Syndicate {
        /// Broadcast date (YYYY-MM-DD)
        #[arg(long)]
        date: NaiveDate,

        /// Proceed without stations whose ingest has not settled
        #[arg(long)]
        force: bool,
    },

    /// Recompute and print sequence hashes without grouping
    Hashes {
        /// Broadcast date (YYYY-MM-DD)
        #[arg(long)]
        date: NaiveDate,

        /// Narrow to one station, by registry name
        #[arg(long)]
        station: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "aircheck_ds=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let config = config::load_config(cli.config.as_deref()).context("Failed to load config")?;
    let data_folder = config::resolve_data_folder(cli.data_folder.as_deref(), &config);
    let db_path = cli
        .database
        .clone()
        .unwrap_or_else(|| data_folder.join(config.database_file()));

    info!("Starting aircheck-ds (Syndication Analysis)");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!("Database: {}", db_path.display());

    let pool = init_database(&db_path)
        .await
        .context("Failed to open database")?;

    match cli.command {
        Command::Syndicate { date, force } => {
            let matcher = SyndicationMatcher::new(pool.clone());
            let outcome = matcher.resolve_date(date, force).await?;
            println!(
                "{}: {} runs, {} masters assigned",
                date, outcome.runs_found, outcome.masters_assigned
            );
        }

        Command::Hashes { date, station } => {
            let station_id = match station.as_deref() {
                Some(name) => Some(
                    stations::station_id_by_name(&pool, name)
                        .await?
                        .with_context(|| format!("Unknown station {:?}", name))?,
                ),
                None => None,
            };
            let names: HashMap<i64, String> = stations::name_table(&pool).await?;

            let attrs = plays::load_play_attrs(&pool, &date.to_string()).await?;
            for play in attrs {
                if station_id.map_or(false, |id| id != play.station_id) {
                    continue;
                }
                let station = names
                    .get(&play.station_id)
                    .map(String::as_str)
                    .unwrap_or("?");
                let digests: Vec<String> = sequence_hasher::hash_play(&play)
                    .iter()
                    .map(|h| format!("L{} {:>20}", h.hash_level, h.digest))
                    .collect();
                println!(
                    "play {:<7} {:<12} {}",
                    play.play_id,
                    station,
                    digests.join("  ")
                );
            }
        }
    }

    Ok(())
}
