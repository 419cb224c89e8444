//! Play attribute reads and master-link writes
//!
//! This service never creates plays; it reads the ingested rows back as
//! attribute tuples and owns the `master_play_id` column.

use std::collections::HashMap;

use sqlx::{Row, SqlitePool};

use aircheck_common::db::models::UNKNOWN_COMPOSER_KEY;
use aircheck_common::{Error, Result};

use crate::models::PlayAttrs;

/// Row id of the unknown-composer sentinel identity.
pub async fn sentinel_composer_id(pool: &SqlitePool) -> Result<i64> {
    let row = sqlx::query("SELECT id FROM persons WHERE name = ?")
        .bind(UNKNOWN_COMPOSER_KEY)
        .fetch_optional(pool)
        .await?;
    row.map(|r| r.get("id"))
        .ok_or_else(|| Error::Internal("unknown-composer sentinel missing from catalog".into()))
}

/// Attribute tuples for every play of a date.
///
/// The unknown-composer sentinel maps to `composer_id = None`; performer
/// credits collapse to a sorted, deduplicated person-id set (the same
/// person credited under two roles counts once).
pub async fn load_play_attrs(pool: &SqlitePool, play_date: &str) -> Result<Vec<PlayAttrs>> {
    let unknown = sentinel_composer_id(pool).await?;

    let rows = sqlx::query(
        r#"
        SELECT id, station_id, composer_id, work_id, conductor_id
        FROM plays
        WHERE play_date = ?
        ORDER BY id
        "#,
    )
    .bind(play_date)
    .fetch_all(pool)
    .await?;

    let credit_rows = sqlx::query(
        r#"
        SELECT pp.play_id, pf.person_id
        FROM play_performers pp
        JOIN performers pf ON pf.id = pp.performer_id
        JOIN plays p ON p.id = pp.play_id
        WHERE p.play_date = ?
        "#,
    )
    .bind(play_date)
    .fetch_all(pool)
    .await?;

    let mut credits: HashMap<i64, Vec<i64>> = HashMap::new();
    for row in credit_rows {
        credits
            .entry(row.get("play_id"))
            .or_default()
            .push(row.get("person_id"));
    }

    Ok(rows
        .into_iter()
        .map(|row| {
            let play_id: i64 = row.get("id");
            let composer: i64 = row.get("composer_id");
            let mut performer_ids = credits.remove(&play_id).unwrap_or_default();
            performer_ids.sort_unstable();
            performer_ids.dedup();
            PlayAttrs {
                play_id,
                station_id: row.get("station_id"),
                composer_id: (composer != unknown).then_some(composer),
                work_id: row.get("work_id"),
                conductor_id: row.get("conductor_id"),
                performer_ids,
            }
        })
        .collect())
}

/// Drop every master link for the date ahead of a fresh pass.
pub async fn clear_master_links(pool: &SqlitePool, play_date: &str) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE plays SET master_play_id = NULL, updated_at = CURRENT_TIMESTAMP
        WHERE play_date = ? AND master_play_id IS NOT NULL
        "#,
    )
    .bind(play_date)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

pub async fn set_master_link(pool: &SqlitePool, play_id: i64, master_play_id: i64) -> Result<()> {
    sqlx::query("UPDATE plays SET master_play_id = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?")
        .bind(master_play_id)
        .bind(play_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// (play id, master play id) pairs for the date, subordinates only.
pub async fn master_links(pool: &SqlitePool, play_date: &str) -> Result<Vec<(i64, i64)>> {
    let rows = sqlx::query(
        r#"
        SELECT id, master_play_id FROM plays
        WHERE play_date = ? AND master_play_id IS NOT NULL
        ORDER BY id
        "#,
    )
    .bind(play_date)
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .map(|r| (r.get("id"), r.get("master_play_id")))
        .collect())
}

/// Count links whose master is itself linked. Any hit is an invariant
/// break in the assignment pass.
pub async fn chained_link_count(pool: &SqlitePool, play_date: &str) -> Result<i64> {
    let count = sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM plays sub
        JOIN plays master ON master.id = sub.master_play_id
        WHERE sub.play_date = ? AND master.master_play_id IS NOT NULL
        "#,
    )
    .bind(play_date)
    .fetch_one(pool)
    .await?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use aircheck_common::db::schema::init_schema;

    const DATE: &str = "2019-03-15";

    async fn setup() -> (SqlitePool, i64, i64) {
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
        (pool, station, program)
    }

    async fn seed_person(pool: &SqlitePool, name: &str) -> i64 {
        sqlx::query("INSERT INTO persons (name, full_name) VALUES (?, ?)")
            .bind(name)
            .bind(name)
            .execute(pool)
            .await
            .unwrap()
            .last_insert_rowid()
    }

    async fn seed_play(
        pool: &SqlitePool,
        station: i64,
        program: i64,
        index: i64,
        composer: i64,
        work: Option<i64>,
        conductor: Option<i64>,
    ) -> i64 {
        sqlx::query(
            r#"
            INSERT INTO plays (station_id, program_id, play_date, play_index,
                               start_local, start_utc, composer_id, work_id, conductor_id)
            VALUES (?, ?, ?, ?, '2019-03-15 06:05:00', '2019-03-15T11:05:00Z', ?, ?, ?)
            "#,
        )
        .bind(station)
        .bind(program)
        .bind(DATE)
        .bind(index)
        .bind(composer)
        .bind(work)
        .bind(conductor)
        .execute(pool)
        .await
        .unwrap()
        .last_insert_rowid()
    }

    async fn credit(pool: &SqlitePool, play: i64, person: i64, role: &str, seq: i64) {
        sqlx::query("INSERT OR IGNORE INTO performers (person_id, role) VALUES (?, ?)")
            .bind(person)
            .bind(role)
            .execute(pool)
            .await
            .unwrap();
        let performer: i64 =
            sqlx::query_scalar("SELECT id FROM performers WHERE person_id = ? AND role = ?")
                .bind(person)
                .bind(role)
                .fetch_one(pool)
                .await
                .unwrap();
        sqlx::query("INSERT INTO play_performers (play_id, performer_id, seq) VALUES (?, ?, ?)")
            .bind(play)
            .bind(performer)
            .bind(seq)
            .execute(pool)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_load_play_attrs_maps_sentinel_and_credits() {
        let (pool, station, program) = setup().await;
        let sentinel = sentinel_composer_id(&pool).await.unwrap();
        let dvorak = seed_person(&pool, "Dvorak, Antonin").await;
        let bell = seed_person(&pool, "Bell, Joshua").await;

        let work: i64 = sqlx::query(
            "INSERT INTO works (composer_id, name) VALUES (?, 'Symphony No. 9')",
        )
        .bind(dvorak)
        .execute(&pool)
        .await
        .unwrap()
        .last_insert_rowid();

        let full = seed_play(&pool, station, program, 0, dvorak, Some(work), None).await;
        // the same person under two roles counts once in the credit set
        credit(&pool, full, bell, "violin", 0).await;
        credit(&pool, full, bell, "leader", 1).await;
        let unknown = seed_play(&pool, station, program, 1, sentinel, None, None).await;

        let attrs = load_play_attrs(&pool, DATE).await.unwrap();
        assert_eq!(attrs.len(), 2);

        let first = attrs.iter().find(|a| a.play_id == full).unwrap();
        assert_eq!(first.composer_id, Some(dvorak));
        assert_eq!(first.work_id, Some(work));
        assert_eq!(first.performer_ids, vec![bell]);

        let second = attrs.iter().find(|a| a.play_id == unknown).unwrap();
        assert_eq!(second.composer_id, None);
        assert_eq!(second.work_id, None);
        assert!(second.performer_ids.is_empty());
    }

    #[tokio::test]
    async fn test_master_links_cleared_and_rewritten() {
        let (pool, station, program) = setup().await;
        let sentinel = sentinel_composer_id(&pool).await.unwrap();
        let a = seed_play(&pool, station, program, 0, sentinel, None, None).await;
        let b = seed_play(&pool, station, program, 1, sentinel, None, None).await;

        set_master_link(&pool, b, a).await.unwrap();
        assert_eq!(master_links(&pool, DATE).await.unwrap(), vec![(b, a)]);

        let cleared = clear_master_links(&pool, DATE).await.unwrap();
        assert_eq!(cleared, 1);
        assert!(master_links(&pool, DATE).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_chained_link_count_flags_indirection() {
        let (pool, station, program) = setup().await;
        let sentinel = sentinel_composer_id(&pool).await.unwrap();
        let a = seed_play(&pool, station, program, 0, sentinel, None, None).await;
        let b = seed_play(&pool, station, program, 1, sentinel, None, None).await;
        let c = seed_play(&pool, station, program, 2, sentinel, None, None).await;

        set_master_link(&pool, b, a).await.unwrap();
        set_master_link(&pool, c, a).await.unwrap();
        assert_eq!(chained_link_count(&pool, DATE).await.unwrap(), 0);

        set_master_link(&pool, c, b).await.unwrap();
        assert_eq!(chained_link_count(&pool, DATE).await.unwrap(), 1);
    }
}
