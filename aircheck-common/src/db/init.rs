//! Database initialization
//!
//! Opens (creating if needed) the catalog database, applies connection
//! pragmas, and runs the idempotent schema creation. Both service binaries
//! call this on startup; tests use an in-memory pool with
//! [`crate::db::schema::init_schema`] directly.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Initialize database connection pool and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // Enable foreign keys
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&pool)
        .await?;

    // WAL allows concurrent readers while one station's ingest writes
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;

    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;

    crate::db::schema::init_schema(&pool).await?;

    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_init_database_creates_file_and_schema() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("catalog").join("aircheck.db");

        let pool = init_database(&db_path).await.unwrap();
        assert!(db_path.exists());

        let tables: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('stations', 'plays', 'play_hashes')",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(tables, 3);
    }

    #[tokio::test]
    async fn test_init_database_reopens_existing() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("aircheck.db");

        let pool = init_database(&db_path).await.unwrap();
        sqlx::query("INSERT INTO stations (name) VALUES ('WKEEP')")
            .execute(&pool)
            .await
            .unwrap();
        pool.close().await;

        let pool = init_database(&db_path).await.unwrap();
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM stations WHERE name = 'WKEEP'")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }
}
