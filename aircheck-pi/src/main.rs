//! aircheck-pi - Playlist Ingest service
//!
//! Fetches daily playlist documents from station web feeds, maps each
//! station's JSON shape into canonical program/play rows, and resolves
//! free-text credit fields against the shared identity catalog. Items the
//! pipeline cannot place land in the quarantine queue for manual review.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{Days, NaiveDate};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use aircheck_common::config::{self, AircheckConfig, StationConfig};
use aircheck_common::db::init::init_database;
use aircheck_common::db::models::{FieldKind, Station};
use aircheck_pi::db::{quarantine, stations};
use aircheck_pi::models::IngestOutcome;
use aircheck_pi::services::{
    EntityResolver, FuzzyMatcher, IngestOrchestrator, Lexicon, PlaylistFetcher, StationRuntime,
};

/// Command-line arguments for aircheck-pi
#[derive(Parser, Debug)]
#[command(name = "aircheck-pi")]
#[command(about = "Playlist ingest service for the aircheck catalog")]
#[command(version)]
struct Cli {
    /// Path to the TOML config file
    #[arg(long, env = "AIRCHECK_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Data folder holding the database and fetched playlists
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
    /// Retrieve playlist documents for a broadcast date
    Fetch {
        /// Station to fetch, by registry name
        #[arg(long)]
        station: Option<String>,

        /// Fetch every enabled station
        #[arg(long)]
        all: bool,

        /// Broadcast date (YYYY-MM-DD)
        #[arg(long)]
        date: NaiveDate,

        /// Number of consecutive days starting at --date
        #[arg(long, default_value = "1")]
        days: u32,
    },

    /// Ingest fetched documents into the catalog
    Ingest {
        /// Station to ingest, by registry name
        #[arg(long)]
        station: Option<String>,

        /// Ingest every enabled station
        #[arg(long)]
        all: bool,

        /// Broadcast date (YYYY-MM-DD)
        #[arg(long)]
        date: NaiveDate,

        /// Number of consecutive days starting at --date
        #[arg(long, default_value = "1")]
        days: u32,
    },

    /// List the station registry
    Stations {
        /// Upsert registry rows from the config file first
        #[arg(long)]
        sync: bool,
    },

    /// List quarantine entries awaiting review
    Review {
        /// Narrow to one station, by registry name
        #[arg(long)]
        station: Option<String>,

        /// Narrow to one broadcast date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Narrow to one field kind (composer, work, conductor, ...)
        #[arg(long)]
        field: Option<String>,

        /// Only entries still open
        #[arg(long)]
        open: bool,

        /// Mark one entry resolved instead of listing
        #[arg(long)]
        resolve: Option<i64>,

        /// Maximum entries to list
        #[arg(long, default_value = "50")]
        limit: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "aircheck_pi=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let config = config::load_config(cli.config.as_deref()).context("Failed to load config")?;
    let data_folder = config::resolve_data_folder(cli.data_folder.as_deref(), &config);
    std::fs::create_dir_all(&data_folder)
        .with_context(|| format!("Failed to create data folder {}", data_folder.display()))?;
    let db_path = cli
        .database
        .clone()
        .unwrap_or_else(|| data_folder.join(config.database_file()));

    info!("Starting aircheck-pi (Playlist Ingest)");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!("Database: {}", db_path.display());

    let pool = init_database(&db_path)
        .await
        .context("Failed to open database")?;

    match cli.command {
        Command::Fetch {
            station,
            all,
            date,
            days,
        } => {
            let pairs = select_stations(&pool, &config, station.as_deref(), all).await?;
            let fetcher = PlaylistFetcher::new(pool.clone(), data_folder.clone(), &config.fetch)?;
            for date in date_range(date, days)? {
                let summary = fetcher.fetch_all(&pairs, date).await?;
                println!(
                    "{}: {} fetched, {} missing, {} failed, {} skipped",
                    date, summary.fetched, summary.missing, summary.failed, summary.skipped
                );
            }
        }

        Command::Ingest {
            station,
            all,
            date,
            days,
        } => {
            let pairs = select_stations(&pool, &config, station.as_deref(), all).await?;
            let resolver = Arc::new(EntityResolver::new(
                pool.clone(),
                Lexicon::with_extras(&config.lexicon),
                FuzzyMatcher::new(config.matcher.clone()),
            ));
            let orchestrator = Arc::new(IngestOrchestrator::new(pool.clone(), resolver));
            let fetcher = Arc::new(PlaylistFetcher::new(
                pool.clone(),
                data_folder.clone(),
                &config.fetch,
            )?);

            for date in date_range(date, days)? {
                let runtimes = pairs
                    .iter()
                    .map(|(station, cfg)| StationRuntime::new(station.clone(), cfg))
                    .collect();
                let outcomes = Arc::clone(&orchestrator)
                    .ingest_all(runtimes, Arc::clone(&fetcher), date)
                    .await?;
                let mut total = IngestOutcome::default();
                for (name, outcome) in &outcomes {
                    println!(
                        "{} {}: {} plays, {} quarantined",
                        name, date, outcome.plays_created, outcome.quarantine_count
                    );
                    total.absorb(*outcome);
                }
                println!(
                    "{}: {} stations, {} programs, {} plays, {} quarantined",
                    date,
                    outcomes.len(),
                    total.programs_created,
                    total.plays_created,
                    total.quarantine_count
                );
            }
        }

        Command::Stations { sync } => {
            if sync {
                let synced = stations::sync_stations(&pool, &config.stations).await?;
                println!("{} stations synced from config", synced.len());
            }
            let rows = stations::load_all_stations(&pool).await?;
            for station in rows {
                println!(
                    "{:<12} enabled={:<5} authority={:<3} utc_offset_minutes={}",
                    station.name, station.enabled, station.authority, station.utc_offset_minutes
                );
            }
        }

        Command::Review {
            station,
            date,
            field,
            open,
            resolve,
            limit,
        } => {
            if let Some(id) = resolve {
                quarantine::mark_resolved(&pool, id)
                    .await
                    .with_context(|| format!("Failed to resolve quarantine entry {}", id))?;
                println!("#{} resolved", id);
                return Ok(());
            }
            let station_id = match station.as_deref() {
                Some(name) => Some(
                    stations::load_station_by_name(&pool, name)
                        .await?
                        .with_context(|| format!("Unknown station {:?}", name))?
                        .id,
                ),
                None => None,
            };
            let field = match field.as_deref() {
                Some(text) => Some(
                    FieldKind::parse(text)
                        .with_context(|| format!("Unknown field kind {:?}", text))?,
                ),
                None => None,
            };
            let date = date.map(|d| d.to_string());

            let names: HashMap<i64, String> = stations::load_all_stations(&pool)
                .await?
                .into_iter()
                .map(|s| (s.id, s.name))
                .collect();
            let entries =
                quarantine::review_entries(&pool, station_id, date.as_deref(), field, open, limit)
                    .await?;
            for entry in entries {
                let station = names
                    .get(&entry.station_id)
                    .map(String::as_str)
                    .unwrap_or("?");
                println!(
                    "#{:<6} {:<10} {:<12} {:<10} {:<13} {:<8} {}",
                    entry.id,
                    entry.play_date,
                    station,
                    entry.field_kind.as_str(),
                    entry.reason.as_str(),
                    entry.status.as_str(),
                    entry.raw_text
                );
            }
        }
    }

    Ok(())
}

/// Sync the registry from config and pick the stations a run covers.
async fn select_stations(
    pool: &sqlx::SqlitePool,
    config: &AircheckConfig,
    station: Option<&str>,
    all: bool,
) -> Result<Vec<(Station, StationConfig)>> {
    if station.is_none() && !all {
        bail!("pass --station <name> or --all");
    }

    let synced = stations::sync_stations(pool, &config.stations)
        .await
        .context("Failed to sync station registry")?;

    let mut pairs = Vec::new();
    for row in synced {
        let Some(cfg) = config.station(&row.name) else {
            continue;
        };
        match station {
            Some(name) if name != row.name => continue,
            _ => pairs.push((row, cfg.clone())),
        }
    }

    if let Some(name) = station {
        if pairs.is_empty() {
            bail!("Station {:?} is not in the config", name);
        }
    }
    Ok(pairs)
}

/// Expand `--date` plus `--days` into the concrete dates of a run.
fn date_range(start: NaiveDate, days: u32) -> Result<Vec<NaiveDate>> {
    let mut dates = Vec::new();
    for offset in 0..days.max(1) {
        let date = start
            .checked_add_days(Days::new(offset.into()))
            .context("Date out of range")?;
        dates.push(date);
    }
    Ok(dates)
}
