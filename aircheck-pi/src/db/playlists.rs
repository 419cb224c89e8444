//! Playlist file bookkeeping
//!
//! One row per (station, broadcast date) tracks the fetched document and
//! its ingest outcome. The status lifecycle drives the syndication
//! completeness check: a date is ready once no enabled station still has a
//! row in 'new'.

use sqlx::{Row, SqlitePool};

use aircheck_common::db::models::{PlaylistFile, PlaylistStatus};
use aircheck_common::{Error, Result};

/// Record that a fetch was attempted. `file_path` is `None` when the
/// station had no document for the date.
pub async fn record_fetch(
    pool: &SqlitePool,
    station_id: i64,
    play_date: &str,
    file_path: Option<&str>,
    status: PlaylistStatus,
) -> Result<i64> {
    sqlx::query(
        r#"
        INSERT INTO playlist_files (station_id, play_date, file_path, status, fetched_at)
        VALUES (?, ?, ?, ?, CURRENT_TIMESTAMP)
        ON CONFLICT(station_id, play_date) DO UPDATE SET
            file_path = excluded.file_path,
            status = excluded.status,
            fetched_at = CURRENT_TIMESTAMP,
            updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(station_id)
    .bind(play_date)
    .bind(file_path)
    .bind(status.as_str())
    .execute(pool)
    .await?;

    find_id(pool, station_id, play_date).await
}

/// Record the ingest outcome for a fetched document.
pub async fn record_ingest(
    pool: &SqlitePool,
    station_id: i64,
    play_date: &str,
    status: PlaylistStatus,
    plays_created: u32,
    quarantine_count: u32,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO playlist_files (station_id, play_date, status, plays_created,
                                    quarantine_count, parsed_at)
        VALUES (?, ?, ?, ?, ?, CURRENT_TIMESTAMP)
        ON CONFLICT(station_id, play_date) DO UPDATE SET
            status = excluded.status,
            plays_created = excluded.plays_created,
            quarantine_count = excluded.quarantine_count,
            parsed_at = CURRENT_TIMESTAMP,
            updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(station_id)
    .bind(play_date)
    .bind(status.as_str())
    .bind(plays_created)
    .bind(quarantine_count)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn load_entry(
    pool: &SqlitePool,
    station_id: i64,
    play_date: &str,
) -> Result<Option<PlaylistFile>> {
    let row = sqlx::query(
        r#"
        SELECT id, station_id, play_date, file_path, status,
               plays_created, quarantine_count, fetched_at, parsed_at
        FROM playlist_files
        WHERE station_id = ? AND play_date = ?
        "#,
    )
    .bind(station_id)
    .bind(play_date)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => Ok(Some(entry_from_row(row)?)),
        None => Ok(None),
    }
}

/// Retire a disabled station's pending rows so they stop reading as
/// awaiting ingest. Rows already settled keep their status.
pub async fn retire_pending(pool: &SqlitePool, station_id: i64) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE playlist_files SET status = 'disabled', updated_at = CURRENT_TIMESTAMP
         WHERE station_id = ? AND status = 'new'",
    )
    .bind(station_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

/// Status per station id for one date. Stations with no row yet simply do
/// not appear.
pub async fn statuses_for_date(
    pool: &SqlitePool,
    play_date: &str,
) -> Result<Vec<(i64, PlaylistStatus)>> {
    let rows = sqlx::query("SELECT station_id, status FROM playlist_files WHERE play_date = ?")
        .bind(play_date)
        .fetch_all(pool)
        .await?;
    rows.into_iter()
        .map(|row| {
            let status: String = row.get("status");
            let status = PlaylistStatus::parse(&status)
                .ok_or_else(|| Error::Internal(format!("bad playlist status {:?}", status)))?;
            Ok((row.get("station_id"), status))
        })
        .collect()
}

async fn find_id(pool: &SqlitePool, station_id: i64, play_date: &str) -> Result<i64> {
    let row =
        sqlx::query("SELECT id FROM playlist_files WHERE station_id = ? AND play_date = ?")
            .bind(station_id)
            .bind(play_date)
            .fetch_optional(pool)
            .await?;
    row.map(|r| r.get("id")).ok_or_else(|| {
        Error::Internal(format!(
            "playlist_files row {}/{} missing after upsert",
            station_id, play_date
        ))
    })
}

fn entry_from_row(row: sqlx::sqlite::SqliteRow) -> Result<PlaylistFile> {
    let status: String = row.get("status");
    Ok(PlaylistFile {
        id: row.get("id"),
        station_id: row.get("station_id"),
        play_date: row.get("play_date"),
        file_path: row.get("file_path"),
        status: PlaylistStatus::parse(&status)
            .ok_or_else(|| Error::Internal(format!("bad playlist status {:?}", status)))?,
        plays_created: row.get("plays_created"),
        quarantine_count: row.get("quarantine_count"),
        fetched_at: row.get("fetched_at"),
        parsed_at: row.get("parsed_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::stations::upsert_station;
    use aircheck_common::config::StationConfig;
    use aircheck_common::db::schema::init_schema;

    async fn setup() -> (SqlitePool, i64) {
        let pool = SqlitePool::connect(":memory:").await.unwrap();
        init_schema(&pool).await.unwrap();
        let station = upsert_station(
            &pool,
            &StationConfig {
                name: "WTST".to_string(),
                enabled: true,
                url_template: None,
                utc_offset_minutes: 0,
                authority: 10,
                grammar: Default::default(),
                field_map: Default::default(),
            },
        )
        .await
        .unwrap();
        (pool, station.id)
    }

    #[tokio::test]
    async fn test_fetch_then_ingest_lifecycle() {
        let (pool, station_id) = setup().await;

        record_fetch(
            &pool,
            station_id,
            "2019-03-15",
            Some("WTST/2019/playlist-20190315.json"),
            PlaylistStatus::New,
        )
        .await
        .unwrap();
        let entry = load_entry(&pool, station_id, "2019-03-15").await.unwrap().unwrap();
        assert_eq!(entry.status, PlaylistStatus::New);
        assert!(!entry.status.is_terminal());

        record_ingest(&pool, station_id, "2019-03-15", PlaylistStatus::Valid, 12, 1)
            .await
            .unwrap();
        let entry = load_entry(&pool, station_id, "2019-03-15").await.unwrap().unwrap();
        assert_eq!(entry.status, PlaylistStatus::Valid);
        assert_eq!(entry.plays_created, 12);
        assert_eq!(entry.quarantine_count, 1);
        assert!(entry.parsed_at.is_some());
    }

    #[tokio::test]
    async fn test_missing_document_is_terminal() {
        let (pool, station_id) = setup().await;
        record_fetch(&pool, station_id, "2019-03-15", None, PlaylistStatus::Missing)
            .await
            .unwrap();
        let statuses = statuses_for_date(&pool, "2019-03-15").await.unwrap();
        assert_eq!(statuses, vec![(station_id, PlaylistStatus::Missing)]);
        assert!(statuses[0].1.is_terminal());
    }

    #[tokio::test]
    async fn test_retire_pending_touches_only_new_rows() {
        let (pool, station_id) = setup().await;
        record_fetch(&pool, station_id, "2019-03-14", Some("a.json"), PlaylistStatus::New)
            .await
            .unwrap();
        record_fetch(&pool, station_id, "2019-03-15", Some("b.json"), PlaylistStatus::New)
            .await
            .unwrap();
        record_ingest(&pool, station_id, "2019-03-15", PlaylistStatus::Valid, 3, 0)
            .await
            .unwrap();

        let retired = retire_pending(&pool, station_id).await.unwrap();
        assert_eq!(retired, 1);

        let old = load_entry(&pool, station_id, "2019-03-14").await.unwrap().unwrap();
        assert_eq!(old.status, PlaylistStatus::Disabled);
        let settled = load_entry(&pool, station_id, "2019-03-15").await.unwrap().unwrap();
        assert_eq!(settled.status, PlaylistStatus::Valid);
    }
}
