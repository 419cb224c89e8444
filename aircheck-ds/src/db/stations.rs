//! Station registry reads for syndication analysis
//!
//! The ingest service owns registry writes; this side only needs authority
//! ranks, name lookups, and per-date ingest readiness.

use std::collections::HashMap;

use sqlx::{Row, SqlitePool};

use aircheck_common::db::models::PlaylistStatus;
use aircheck_common::Result;

/// Authority rank per station id, for master selection.
pub async fn authority_table(pool: &SqlitePool) -> Result<HashMap<i64, i64>> {
    let rows = sqlx::query("SELECT id, authority FROM stations")
        .fetch_all(pool)
        .await?;
    Ok(rows
        .into_iter()
        .map(|row| (row.get("id"), row.get("authority")))
        .collect())
}

/// Station name per id, for listings.
pub async fn name_table(pool: &SqlitePool) -> Result<HashMap<i64, String>> {
    let rows = sqlx::query("SELECT id, name FROM stations")
        .fetch_all(pool)
        .await?;
    Ok(rows
        .into_iter()
        .map(|row| (row.get("id"), row.get("name")))
        .collect())
}

pub async fn station_id_by_name(pool: &SqlitePool, name: &str) -> Result<Option<i64>> {
    let row = sqlx::query("SELECT id FROM stations WHERE name = ?")
        .bind(name)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|r| r.get("id")))
}

/// One enabled station's playlist standing for a date. `status` is `None`
/// when no playlist row exists, meaning the date was never fetched.
#[derive(Debug, Clone)]
pub struct StationReadiness {
    pub station_id: i64,
    pub station_name: String,
    pub status: Option<PlaylistStatus>,
}

impl StationReadiness {
    /// Ingestion has finished for this station, one way or another.
    pub fn is_settled(&self) -> bool {
        self.status.map(|s| s.is_terminal()).unwrap_or(false)
    }
}

/// Playlist-file standing of every enabled station for a date.
pub async fn ingest_readiness(pool: &SqlitePool, play_date: &str) -> Result<Vec<StationReadiness>> {
    let rows = sqlx::query(
        r#"
        SELECT s.id, s.name, pf.status
        FROM stations s
        LEFT JOIN playlist_files pf ON pf.station_id = s.id AND pf.play_date = ?
        WHERE s.enabled = 1
        ORDER BY s.name
        "#,
    )
    .bind(play_date)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| StationReadiness {
            station_id: row.get("id"),
            station_name: row.get("name"),
            status: row
                .get::<Option<String>, _>("status")
                .as_deref()
                .and_then(PlaylistStatus::parse),
        })
        .collect())
}
