//! Work persistence
//!
//! A work is the pair (composer identity, title). Titles are matched
//! exactly after whitespace cleanup; fuzzy merging applies to people and
//! ensembles, not titles.

use sqlx::{Row, SqlitePool};

use aircheck_common::db::models::Work;
use aircheck_common::{Error, Result};

pub async fn upsert_work(pool: &SqlitePool, composer_id: i64, name: &str) -> Result<i64> {
    sqlx::query(
        r#"
        INSERT INTO works (composer_id, name)
        VALUES (?, ?)
        ON CONFLICT(composer_id, name) DO UPDATE SET updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(composer_id)
    .bind(name)
    .execute(pool)
    .await?;

    let row = sqlx::query("SELECT id FROM works WHERE composer_id = ? AND name = ?")
        .bind(composer_id)
        .bind(name)
        .fetch_optional(pool)
        .await?;
    row.map(|r| r.get("id"))
        .ok_or_else(|| Error::Internal(format!("work {} missing after upsert", name)))
}

pub async fn load_work(pool: &SqlitePool, id: i64) -> Result<Option<Work>> {
    let row = sqlx::query("SELECT id, composer_id, name FROM works WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|row| Work {
        id: row.get("id"),
        composer_id: row.get("composer_id"),
        name: row.get("name"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::persons;
    use aircheck_common::db::schema::init_schema;
    use crate::models::NameKey;

    #[tokio::test]
    async fn test_same_title_different_composer_distinct() {
        let pool = SqlitePool::connect(":memory:").await.unwrap();
        init_schema(&pool).await.unwrap();

        let bach = persons::insert_person(&pool, &NameKey::mononym("Bach"), "Bach")
            .await
            .unwrap();
        let handel = persons::insert_person(&pool, &NameKey::mononym("Handel"), "Handel")
            .await
            .unwrap();

        let a = upsert_work(&pool, bach, "Suite No. 1").await.unwrap();
        let b = upsert_work(&pool, handel, "Suite No. 1").await.unwrap();
        let again = upsert_work(&pool, bach, "Suite No. 1").await.unwrap();
        assert_ne!(a, b);
        assert_eq!(a, again);
    }
}
