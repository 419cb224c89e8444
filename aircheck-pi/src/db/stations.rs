//! Station registry persistence
//!
//! Stations are declared in config and synced into the database at
//! startup. The name is the natural key; the row id is what every other
//! table references.

use sqlx::{Row, SqlitePool};

use aircheck_common::config::StationConfig;
use aircheck_common::db::models::Station;
use aircheck_common::{Error, Result};

/// Insert or refresh one station from its config entry, returning the row.
pub async fn upsert_station(pool: &SqlitePool, cfg: &StationConfig) -> Result<Station> {
    sqlx::query(
        r#"
        INSERT INTO stations (name, utc_offset_minutes, authority, enabled)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(name) DO UPDATE SET
            utc_offset_minutes = excluded.utc_offset_minutes,
            authority = excluded.authority,
            enabled = excluded.enabled,
            updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(&cfg.name)
    .bind(cfg.utc_offset_minutes)
    .bind(cfg.authority)
    .bind(cfg.enabled)
    .execute(pool)
    .await?;

    load_station_by_name(pool, &cfg.name)
        .await?
        .ok_or_else(|| Error::Internal(format!("station {} missing after upsert", cfg.name)))
}

/// Sync the whole config station table. Stations removed from config are
/// kept but disabled, so their history stays navigable.
pub async fn sync_stations(pool: &SqlitePool, stations: &[StationConfig]) -> Result<Vec<Station>> {
    let mut rows = Vec::with_capacity(stations.len());
    for cfg in stations {
        rows.push(upsert_station(pool, cfg).await?);
    }

    let names: Vec<&str> = stations.iter().map(|s| s.name.as_str()).collect();
    let known = load_all_stations(pool).await?;
    for station in known {
        if !names.contains(&station.name.as_str()) && station.enabled {
            tracing::info!(station = %station.name, "station no longer in config, disabling");
            sqlx::query(
                "UPDATE stations SET enabled = 0, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
            )
            .bind(station.id)
            .execute(pool)
            .await?;
        }
    }
    Ok(rows)
}

pub async fn load_station_by_name(pool: &SqlitePool, name: &str) -> Result<Option<Station>> {
    let row = sqlx::query(
        "SELECT id, name, utc_offset_minutes, authority, enabled FROM stations WHERE name = ?",
    )
    .bind(name)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(station_from_row))
}

pub async fn load_all_stations(pool: &SqlitePool) -> Result<Vec<Station>> {
    let rows = sqlx::query(
        "SELECT id, name, utc_offset_minutes, authority, enabled FROM stations ORDER BY id",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(station_from_row).collect())
}

fn station_from_row(row: sqlx::sqlite::SqliteRow) -> Station {
    Station {
        id: row.get("id"),
        name: row.get("name"),
        utc_offset_minutes: row.get("utc_offset_minutes"),
        authority: row.get("authority"),
        enabled: row.get("enabled"),
    }
}
