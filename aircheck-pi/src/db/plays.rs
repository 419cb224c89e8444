//! Play persistence
//!
//! A play is unique per (station, broadcast date, position in the day's
//! sequence), so re-ingesting a corrected playlist file updates rows in
//! place instead of duplicating the day. Performer and ensemble link sets
//! are replaced wholesale on every upsert.

use sqlx::{Row, SqlitePool};

use aircheck_common::db::models::Play;
use aircheck_common::{Error, Result};

pub async fn upsert_play(pool: &SqlitePool, play: &Play) -> Result<i64> {
    sqlx::query(
        r#"
        INSERT INTO plays (station_id, program_id, play_date, play_index,
                           start_local, end_local, start_utc, end_utc,
                           composer_id, work_id, conductor_id, recording_id,
                           quarantined, raw_info)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(station_id, play_date, play_index) DO UPDATE SET
            program_id = excluded.program_id,
            start_local = excluded.start_local,
            end_local = excluded.end_local,
            start_utc = excluded.start_utc,
            end_utc = excluded.end_utc,
            composer_id = excluded.composer_id,
            work_id = excluded.work_id,
            conductor_id = excluded.conductor_id,
            recording_id = excluded.recording_id,
            quarantined = excluded.quarantined,
            raw_info = excluded.raw_info,
            updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(play.station_id)
    .bind(play.program_id)
    .bind(&play.play_date)
    .bind(play.play_index)
    .bind(&play.start_local)
    .bind(&play.end_local)
    .bind(&play.start_utc)
    .bind(&play.end_utc)
    .bind(play.composer_id)
    .bind(play.work_id)
    .bind(play.conductor_id)
    .bind(play.recording_id)
    .bind(play.quarantined)
    .bind(play.raw_info.to_string())
    .execute(pool)
    .await?;

    let row = sqlx::query(
        "SELECT id FROM plays WHERE station_id = ? AND play_date = ? AND play_index = ?",
    )
    .bind(play.station_id)
    .bind(&play.play_date)
    .bind(play.play_index)
    .fetch_optional(pool)
    .await?;
    row.map(|r| r.get("id")).ok_or_else(|| {
        Error::Internal(format!(
            "play {}/{} missing after upsert",
            play.play_date, play.play_index
        ))
    })
}

/// Replace the performer set of a play, preserving listing order via seq.
pub async fn set_play_performers(
    pool: &SqlitePool,
    play_id: i64,
    performer_ids: &[i64],
) -> Result<()> {
    sqlx::query("DELETE FROM play_performers WHERE play_id = ?")
        .bind(play_id)
        .execute(pool)
        .await?;
    for (seq, performer_id) in performer_ids.iter().enumerate() {
        sqlx::query(
            "INSERT OR IGNORE INTO play_performers (play_id, performer_id, seq) VALUES (?, ?, ?)",
        )
        .bind(play_id)
        .bind(performer_id)
        .bind(seq as i64)
        .execute(pool)
        .await?;
    }
    Ok(())
}

pub async fn set_play_ensembles(
    pool: &SqlitePool,
    play_id: i64,
    ensemble_ids: &[i64],
) -> Result<()> {
    sqlx::query("DELETE FROM play_ensembles WHERE play_id = ?")
        .bind(play_id)
        .execute(pool)
        .await?;
    for (seq, ensemble_id) in ensemble_ids.iter().enumerate() {
        sqlx::query(
            "INSERT OR IGNORE INTO play_ensembles (play_id, ensemble_id, seq) VALUES (?, ?, ?)",
        )
        .bind(play_id)
        .bind(ensemble_id)
        .bind(seq as i64)
        .execute(pool)
        .await?;
    }
    Ok(())
}

pub async fn load_plays_for_station_date(
    pool: &SqlitePool,
    station_id: i64,
    date: &str,
) -> Result<Vec<Play>> {
    let rows = sqlx::query(
        r#"
        SELECT id, station_id, program_id, play_date, play_index,
               start_local, end_local, start_utc, end_utc,
               composer_id, work_id, conductor_id, recording_id,
               master_play_id, quarantined, raw_info
        FROM plays
        WHERE station_id = ? AND play_date = ?
        ORDER BY play_index
        "#,
    )
    .bind(station_id)
    .bind(date)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(play_from_row).collect()
}

pub async fn load_play(pool: &SqlitePool, id: i64) -> Result<Option<Play>> {
    let row = sqlx::query(
        r#"
        SELECT id, station_id, program_id, play_date, play_index,
               start_local, end_local, start_utc, end_utc,
               composer_id, work_id, conductor_id, recording_id,
               master_play_id, quarantined, raw_info
        FROM plays WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    match row {
        Some(row) => Ok(Some(play_from_row(row)?)),
        None => Ok(None),
    }
}

/// Performer row ids for a play, in listing order.
pub async fn performer_ids_for_play(pool: &SqlitePool, play_id: i64) -> Result<Vec<i64>> {
    let rows = sqlx::query(
        "SELECT performer_id FROM play_performers WHERE play_id = ? ORDER BY seq",
    )
    .bind(play_id)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(|r| r.get("performer_id")).collect())
}

pub async fn ensemble_ids_for_play(pool: &SqlitePool, play_id: i64) -> Result<Vec<i64>> {
    let rows =
        sqlx::query("SELECT ensemble_id FROM play_ensembles WHERE play_id = ? ORDER BY seq")
            .bind(play_id)
            .fetch_all(pool)
            .await?;
    Ok(rows.into_iter().map(|r| r.get("ensemble_id")).collect())
}

fn play_from_row(row: sqlx::sqlite::SqliteRow) -> Result<Play> {
    let raw: String = row.get("raw_info");
    Ok(Play {
        id: row.get("id"),
        station_id: row.get("station_id"),
        program_id: row.get("program_id"),
        play_date: row.get("play_date"),
        play_index: row.get("play_index"),
        start_local: row.get("start_local"),
        end_local: row.get("end_local"),
        start_utc: row.get("start_utc"),
        end_utc: row.get("end_utc"),
        composer_id: row.get("composer_id"),
        work_id: row.get("work_id"),
        conductor_id: row.get("conductor_id"),
        recording_id: row.get("recording_id"),
        master_play_id: row.get("master_play_id"),
        quarantined: row.get("quarantined"),
        raw_info: serde_json::from_str(&raw)?,
    })
}
