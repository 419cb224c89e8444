//! Sequence hash persistence
//!
//! Hashes for a date are replaced wholesale on every resolution pass, so
//! the stored rows always reflect the attributes the pass actually
//! grouped on.

use sqlx::{Row, SqlitePool};

use aircheck_common::db::models::PlayHash;
use aircheck_common::Result;

use crate::models::SequenceHash;

/// Drop and rewrite the date's hash rows.
pub async fn replace_for_date(
    pool: &SqlitePool,
    play_date: &str,
    rows: &[SequenceHash],
) -> Result<()> {
    sqlx::query("DELETE FROM play_hashes WHERE play_date = ?")
        .bind(play_date)
        .execute(pool)
        .await?;

    for row in rows {
        sqlx::query(
            r#"
            INSERT INTO play_hashes (play_id, hash_level, digest, station_id, play_date)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(row.play_id)
        .bind(row.hash_level)
        .bind(row.digest)
        .bind(row.station_id)
        .bind(play_date)
        .execute(pool)
        .await?;
    }
    Ok(())
}

/// Stored hash rows for a date, optionally narrowed to one station.
pub async fn load_for_date(
    pool: &SqlitePool,
    play_date: &str,
    station_id: Option<i64>,
) -> Result<Vec<PlayHash>> {
    let rows = sqlx::query(
        r#"
        SELECT id, play_id, hash_level, digest, station_id, play_date
        FROM play_hashes
        WHERE play_date = ? AND (? IS NULL OR station_id = ?)
        ORDER BY play_id, hash_level
        "#,
    )
    .bind(play_date)
    .bind(station_id)
    .bind(station_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| PlayHash {
            id: row.get("id"),
            play_id: row.get("play_id"),
            hash_level: row.get("hash_level"),
            digest: row.get("digest"),
            station_id: row.get("station_id"),
            play_date: row.get("play_date"),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use aircheck_common::db::schema::init_schema;

    const DATE: &str = "2019-03-15";

    async fn setup_with_plays(count: i64) -> (SqlitePool, i64, Vec<i64>) {
        let pool = SqlitePool::connect(":memory:").await.unwrap();
        init_schema(&pool).await.unwrap();
        let station = sqlx::query("INSERT INTO stations (name) VALUES ('WTST')")
            .execute(&pool)
            .await
            .unwrap()
            .last_insert_rowid();
        let program = sqlx::query(
            r#"
            INSERT INTO programs (station_id, program_date, name, start_local, start_utc)
            VALUES (?, ?, 'Day', '2019-03-15 06:00:00', '2019-03-15T11:00:00Z')
            "#,
        )
        .bind(station)
        .bind(DATE)
        .execute(&pool)
        .await
        .unwrap()
        .last_insert_rowid();

        let mut plays = Vec::new();
        for index in 0..count {
            let id = sqlx::query(
                r#"
                INSERT INTO plays (station_id, program_id, play_date, play_index,
                                   start_local, start_utc, composer_id)
                VALUES (?, ?, ?, ?, '2019-03-15 06:05:00', '2019-03-15T11:05:00Z', 1)
                "#,
            )
            .bind(station)
            .bind(program)
            .bind(DATE)
            .bind(index)
            .execute(&pool)
            .await
            .unwrap()
            .last_insert_rowid();
            plays.push(id);
        }
        (pool, station, plays)
    }

    fn hash(play_id: i64, station_id: i64, hash_level: i64, digest: i64) -> SequenceHash {
        SequenceHash {
            play_id,
            station_id,
            hash_level,
            digest,
        }
    }

    #[tokio::test]
    async fn test_replace_is_wholesale() {
        let (pool, station, plays) = setup_with_plays(2).await;

        let first = vec![
            hash(plays[0], station, 1, 111),
            hash(plays[1], station, 1, 222),
        ];
        replace_for_date(&pool, DATE, &first).await.unwrap();

        let second = vec![hash(plays[0], station, 1, 333)];
        replace_for_date(&pool, DATE, &second).await.unwrap();

        let stored = load_for_date(&pool, DATE, None).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].digest, 333);
        assert_eq!(stored[0].play_date, DATE);
    }

    #[tokio::test]
    async fn test_load_narrows_by_station() {
        let (pool, station, plays) = setup_with_plays(1).await;
        let other = sqlx::query("INSERT INTO stations (name) VALUES ('WALT')")
            .execute(&pool)
            .await
            .unwrap()
            .last_insert_rowid();

        replace_for_date(&pool, DATE, &[hash(plays[0], station, 1, 111)])
            .await
            .unwrap();

        let mine = load_for_date(&pool, DATE, Some(station)).await.unwrap();
        assert_eq!(mine.len(), 1);
        let theirs = load_for_date(&pool, DATE, Some(other)).await.unwrap();
        assert!(theirs.is_empty());
    }
}
