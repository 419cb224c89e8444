//! Playlist Document Fetching
//!
//! Pulls each station's daily playlist document over HTTP and files it
//! under the data folder, one tree per station. Outbound requests share a
//! rate limiter so a multi-station fetch stays polite regardless of how
//! many stations resolve to the same host.
//!
//! A 404 is an answer, not a failure: the station published nothing for
//! that date, and the bookkeeping row records `missing` so syndication
//! resolution can still consider the date complete.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{Datelike, NaiveDate};
use sqlx::SqlitePool;

use aircheck_common::config::{FetchConfig, StationConfig};
use aircheck_common::db::models::{PlaylistStatus, Station};
use aircheck_common::{time, Error, Result};

use crate::db::playlists;

const FETCH_USER_AGENT: &str = concat!("aircheck/", env!("CARGO_PKG_VERSION"));

/// What one station-day fetch produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Document saved; ready for ingest.
    Fetched { path: PathBuf },
    /// Station had no document for the date (HTTP 404).
    MissingRemote,
}

/// Tally across a multi-station fetch run.
#[derive(Debug, Clone, Copy, Default)]
pub struct FetchSummary {
    pub fetched: u32,
    pub missing: u32,
    pub failed: u32,
    pub skipped: u32,
}

pub struct PlaylistFetcher {
    pool: SqlitePool,
    client: reqwest::Client,
    rate_limiter: governor::RateLimiter<
        governor::state::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
    data_folder: PathBuf,
}

impl PlaylistFetcher {
    pub fn new(pool: SqlitePool, data_folder: PathBuf, fetch: &FetchConfig) -> Result<Self> {
        // Safe: the interval is clamped to at least one second
        let quota =
            governor::Quota::with_period(Duration::from_secs(fetch.interval_secs.max(1))).unwrap();
        let rate_limiter = governor::RateLimiter::direct(quota);

        let client = reqwest::Client::builder()
            .user_agent(FETCH_USER_AGENT)
            .timeout(Duration::from_secs(fetch.timeout_secs))
            .build()
            .map_err(|e| Error::Fetch(format!("HTTP client construction failed: {}", e)))?;

        Ok(Self {
            pool,
            client,
            rate_limiter,
            data_folder,
        })
    }

    /// Where a station-day document lives on disk, fetched or not.
    pub fn document_path(&self, station_name: &str, date: NaiveDate) -> PathBuf {
        self.data_folder
            .join("playlists")
            .join(station_name)
            .join(format!("{}.json", time::broadcast_date_str(date)))
    }

    /// Fetch one station's document for one date and record the attempt.
    pub async fn fetch_station_day(
        &self,
        station: &Station,
        url_template: &str,
        date: NaiveDate,
    ) -> Result<FetchOutcome> {
        let url = expand_url_template(url_template, date);
        let date_str = time::broadcast_date_str(date);

        self.rate_limiter.until_ready().await;
        tracing::debug!(station = %station.name, %url, "fetching playlist document");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Fetch(format!("{}: {}", url, e)))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            tracing::info!(station = %station.name, date = %date_str, "no document published");
            playlists::record_fetch(
                &self.pool,
                station.id,
                &date_str,
                None,
                PlaylistStatus::Missing,
            )
            .await?;
            return Ok(FetchOutcome::MissingRemote);
        }
        if !response.status().is_success() {
            return Err(Error::Fetch(format!(
                "{} returned {}",
                url,
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::Fetch(format!("{}: {}", url, e)))?;

        let path = self.document_path(&station.name, date);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &body).await?;

        playlists::record_fetch(
            &self.pool,
            station.id,
            &date_str,
            Some(&path.to_string_lossy()),
            PlaylistStatus::New,
        )
        .await?;

        tracing::info!(
            station = %station.name,
            date = %date_str,
            bytes = body.len(),
            "playlist document saved"
        );
        Ok(FetchOutcome::Fetched { path })
    }

    /// Fetch every enabled station for a date. One station failing does
    /// not stop the rest; failures are tallied and logged.
    pub async fn fetch_all(
        &self,
        stations: &[(Station, StationConfig)],
        date: NaiveDate,
    ) -> Result<FetchSummary> {
        let mut summary = FetchSummary::default();
        for (station, cfg) in stations {
            if !station.enabled {
                summary.skipped += 1;
                continue;
            }
            let Some(template) = cfg.url_template.as_deref() else {
                tracing::debug!(station = %station.name, "no url template, fetch skipped");
                summary.skipped += 1;
                continue;
            };
            match self.fetch_station_day(station, template, date).await {
                Ok(FetchOutcome::Fetched { .. }) => summary.fetched += 1,
                Ok(FetchOutcome::MissingRemote) => summary.missing += 1,
                Err(e) => {
                    tracing::warn!(station = %station.name, error = %e, "fetch failed");
                    summary.failed += 1;
                }
            }
        }
        Ok(summary)
    }

    /// Read a previously fetched document back for ingest.
    pub async fn read_document(&self, path: &Path) -> Result<serde_json::Value> {
        let contents = tokio::fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&contents)?)
    }
}

/// Expand the strftime-style date tokens a station URL template may carry.
/// Only `%Y`, `%m`, and `%d` are recognized; anything else passes through
/// untouched, including percent-encoded characters.
fn expand_url_template(template: &str, date: NaiveDate) -> String {
    template
        .replace("%Y", &format!("{:04}", date.year()))
        .replace("%m", &format!("{:02}", date.month()))
        .replace("%d", &format!("{:02}", date.day()))
}
