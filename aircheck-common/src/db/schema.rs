//! Catalog schema creation
//!
//! Every function is idempotent (`CREATE TABLE IF NOT EXISTS`) and safe to
//! run on every startup. [`init_schema`] runs them in dependency order.

use crate::db::models::{UNKNOWN_COMPOSER_KEY, UNKNOWN_COMPOSER_NAME};
use crate::Result;
use sqlx::SqlitePool;

/// Create all catalog tables in dependency order
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    create_stations_table(pool).await?;
    create_persons_table(pool).await?;
    create_ensembles_table(pool).await?;
    create_performers_table(pool).await?;
    create_works_table(pool).await?;
    create_recordings_table(pool).await?;
    create_programs_table(pool).await?;
    create_plays_table(pool).await?;
    create_play_performers_table(pool).await?;
    create_play_ensembles_table(pool).await?;
    create_play_hashes_table(pool).await?;
    create_playlist_files_table(pool).await?;
    create_quarantine_table(pool).await?;
    Ok(())
}

pub async fn create_stations_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS stations (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            utc_offset_minutes INTEGER NOT NULL DEFAULT 0,
            authority INTEGER NOT NULL DEFAULT 10,
            enabled INTEGER NOT NULL DEFAULT 1,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            CHECK (authority >= 0 AND authority <= 100)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_persons_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS persons (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            prefix TEXT,
            first_name TEXT,
            middle_name TEXT,
            last_name TEXT,
            suffix TEXT,
            full_name TEXT NOT NULL,
            variants TEXT NOT NULL DEFAULT '[]',
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    // The sentinel composer identity exists from the start so unparseable
    // composer fields always have a reference target
    sqlx::query(
        r#"
        INSERT OR IGNORE INTO persons (name, full_name)
        VALUES (?, ?)
        "#,
    )
    .bind(UNKNOWN_COMPOSER_KEY)
    .bind(UNKNOWN_COMPOSER_NAME)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_ensembles_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS ensembles (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            variants TEXT NOT NULL DEFAULT '[]',
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_performers_table(pool: &SqlitePool) -> Result<()> {
    // role '' means the listing credited the person without an instrument;
    // NOT NULL keeps the (person_id, role) uniqueness meaningful in SQLite
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS performers (
            id INTEGER PRIMARY KEY,
            person_id INTEGER NOT NULL REFERENCES persons(id),
            role TEXT NOT NULL DEFAULT '',
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (person_id, role)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_performers_person ON performers(person_id)")
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn create_works_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS works (
            id INTEGER PRIMARY KEY,
            composer_id INTEGER NOT NULL REFERENCES persons(id),
            name TEXT NOT NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (composer_id, name)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_recordings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS recordings (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL DEFAULT '',
            label TEXT NOT NULL DEFAULT '',
            catalog_no TEXT NOT NULL DEFAULT '',
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (name, label, catalog_no)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_programs_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS programs (
            id INTEGER PRIMARY KEY,
            station_id INTEGER NOT NULL REFERENCES stations(id),
            program_date TEXT NOT NULL,
            name TEXT NOT NULL,
            host_name TEXT,
            start_local TEXT NOT NULL,
            end_local TEXT,
            start_utc TEXT NOT NULL,
            end_utc TEXT,
            raw_info TEXT NOT NULL DEFAULT '{}',
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (station_id, program_date, start_local, name)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_programs_station_date ON programs(station_id, program_date)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_plays_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS plays (
            id INTEGER PRIMARY KEY,
            station_id INTEGER NOT NULL REFERENCES stations(id),
            program_id INTEGER NOT NULL REFERENCES programs(id),
            play_date TEXT NOT NULL,
            play_index INTEGER NOT NULL,
            start_local TEXT NOT NULL,
            end_local TEXT,
            start_utc TEXT NOT NULL,
            end_utc TEXT,
            composer_id INTEGER NOT NULL REFERENCES persons(id),
            work_id INTEGER REFERENCES works(id),
            conductor_id INTEGER REFERENCES persons(id),
            recording_id INTEGER REFERENCES recordings(id),
            master_play_id INTEGER REFERENCES plays(id),
            quarantined INTEGER NOT NULL DEFAULT 0,
            raw_info TEXT NOT NULL DEFAULT '{}',
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (station_id, play_date, play_index)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_plays_date ON plays(play_date)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_plays_program ON plays(program_id)")
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn create_play_performers_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS play_performers (
            play_id INTEGER NOT NULL REFERENCES plays(id),
            performer_id INTEGER NOT NULL REFERENCES performers(id),
            seq INTEGER NOT NULL,
            PRIMARY KEY (play_id, performer_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_play_performers_play ON play_performers(play_id, seq)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_play_ensembles_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS play_ensembles (
            play_id INTEGER NOT NULL REFERENCES plays(id),
            ensemble_id INTEGER NOT NULL REFERENCES ensembles(id),
            seq INTEGER NOT NULL,
            PRIMARY KEY (play_id, ensemble_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_play_ensembles_play ON play_ensembles(play_id, seq)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_play_hashes_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS play_hashes (
            id INTEGER PRIMARY KEY,
            play_id INTEGER NOT NULL REFERENCES plays(id),
            hash_level INTEGER NOT NULL,
            digest INTEGER NOT NULL,
            station_id INTEGER NOT NULL REFERENCES stations(id),
            play_date TEXT NOT NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (hash_level, play_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_play_hashes_digest ON play_hashes(digest)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_play_hashes_date ON play_hashes(play_date, hash_level)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_playlist_files_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS playlist_files (
            id INTEGER PRIMARY KEY,
            station_id INTEGER NOT NULL REFERENCES stations(id),
            play_date TEXT NOT NULL,
            file_path TEXT,
            status TEXT NOT NULL DEFAULT 'new'
                CHECK (status IN ('new', 'missing', 'valid', 'invalid', 'disabled')),
            plays_created INTEGER NOT NULL DEFAULT 0,
            quarantine_count INTEGER NOT NULL DEFAULT 0,
            fetched_at TIMESTAMP,
            parsed_at TIMESTAMP,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (station_id, play_date)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_playlist_files_date ON playlist_files(play_date, status)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_quarantine_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS quarantine (
            id INTEGER PRIMARY KEY,
            station_id INTEGER NOT NULL REFERENCES stations(id),
            play_date TEXT NOT NULL,
            play_id INTEGER REFERENCES plays(id),
            field_kind TEXT NOT NULL
                CHECK (field_kind IN ('composer', 'work', 'conductor', 'ensembles', 'performers', 'recording')),
            raw_text TEXT NOT NULL,
            reason TEXT NOT NULL
                CHECK (reason IN ('parse_failure', 'ambiguous_classification', 'identity_review')),
            detail TEXT,
            status TEXT NOT NULL DEFAULT 'open' CHECK (status IN ('open', 'resolved')),
            run_id TEXT,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_quarantine_station_date ON quarantine(station_id, play_date)",
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_quarantine_status ON quarantine(status)")
        .execute(pool)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_init_schema_is_idempotent() {
        let pool = SqlitePool::connect(":memory:").await.unwrap();
        init_schema(&pool).await.unwrap();
        init_schema(&pool).await.unwrap();

        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'plays'",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_sentinel_composer_seeded_once() {
        let pool = SqlitePool::connect(":memory:").await.unwrap();
        init_schema(&pool).await.unwrap();
        init_schema(&pool).await.unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM persons WHERE name = ?")
            .bind(UNKNOWN_COMPOSER_KEY)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_station_authority_range_enforced() {
        let pool = SqlitePool::connect(":memory:").await.unwrap();
        init_schema(&pool).await.unwrap();

        let result = sqlx::query("INSERT INTO stations (name, authority) VALUES ('W150', 150)")
            .execute(&pool)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_duplicate_play_index_rejected() {
        let pool = SqlitePool::connect(":memory:").await.unwrap();
        init_schema(&pool).await.unwrap();

        sqlx::query("INSERT INTO stations (name) VALUES ('WTST')")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query(
            r#"
            INSERT INTO programs (station_id, program_date, name, start_local, start_utc)
            VALUES (1, '2019-03-15', 'Morning', '2019-03-15 06:00:00', '2019-03-15T11:00:00Z')
            "#,
        )
        .execute(&pool)
        .await
        .unwrap();

        let insert_play = r#"
            INSERT INTO plays (station_id, program_id, play_date, play_index,
                               start_local, start_utc, composer_id)
            VALUES (1, 1, '2019-03-15', 0, '2019-03-15 06:01:00', '2019-03-15T11:01:00Z', 1)
        "#;
        sqlx::query(insert_play).execute(&pool).await.unwrap();
        let dup = sqlx::query(insert_play).execute(&pool).await;
        assert!(dup.is_err());
    }
}
