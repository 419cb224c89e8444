//! Recording persistence
//!
//! Recording data is carried verbatim; no identity resolution applies.
//! Empty strings stand for absent label/catalog so the natural key stays
//! a real uniqueness constraint in SQLite.

use sqlx::{Row, SqlitePool};

use aircheck_common::{Error, Result};

pub async fn upsert_recording(
    pool: &SqlitePool,
    name: &str,
    label: &str,
    catalog_no: &str,
) -> Result<i64> {
    sqlx::query(
        r#"
        INSERT INTO recordings (name, label, catalog_no)
        VALUES (?, ?, ?)
        ON CONFLICT(name, label, catalog_no) DO NOTHING
        "#,
    )
    .bind(name)
    .bind(label)
    .bind(catalog_no)
    .execute(pool)
    .await?;

    let row = sqlx::query("SELECT id FROM recordings WHERE name = ? AND label = ? AND catalog_no = ?")
        .bind(name)
        .bind(label)
        .bind(catalog_no)
        .fetch_optional(pool)
        .await?;
    row.map(|r| r.get("id"))
        .ok_or_else(|| Error::Internal(format!("recording {:?} missing after upsert", name)))
}
