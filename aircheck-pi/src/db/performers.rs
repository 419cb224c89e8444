//! Performer persistence
//!
//! A performer is a (person, role) pair; the same person on violin and on
//! viola is two performer rows. Role '' records a credit with no
//! instrument given.

use sqlx::{Row, SqlitePool};

use aircheck_common::{Error, Result};

pub async fn upsert_performer(pool: &SqlitePool, person_id: i64, role: &str) -> Result<i64> {
    sqlx::query(
        r#"
        INSERT INTO performers (person_id, role)
        VALUES (?, ?)
        ON CONFLICT(person_id, role) DO NOTHING
        "#,
    )
    .bind(person_id)
    .bind(role)
    .execute(pool)
    .await?;

    let row = sqlx::query("SELECT id FROM performers WHERE person_id = ? AND role = ?")
        .bind(person_id)
        .bind(role)
        .fetch_optional(pool)
        .await?;
    row.map(|r| r.get("id")).ok_or_else(|| {
        Error::Internal(format!(
            "performer ({}, {:?}) missing after upsert",
            person_id, role
        ))
    })
}
