//! Person identity persistence
//!
//! The canonical name is unique; composer, conductor, and performer
//! resolution all land in this one table. Inserts use an upsert on the
//! name so two resolver streams discovering the same person concurrently
//! converge on one row. Every raw spelling that resolved to a person is
//! kept in its `variants` list.

use sqlx::{Row, SqlitePool};

use aircheck_common::db::models::{Person, UNKNOWN_COMPOSER_KEY};
use aircheck_common::{Error, Result};

use crate::models::NameKey;

/// All (id, canonical name) pairs, ordered by id so tie-breaks are stable.
pub async fn identity_candidates(pool: &SqlitePool) -> Result<Vec<(i64, String)>> {
    let rows = sqlx::query("SELECT id, name FROM persons ORDER BY id")
        .fetch_all(pool)
        .await?;
    Ok(rows
        .into_iter()
        .map(|row| (row.get("id"), row.get("name")))
        .collect())
}

/// Exact canonical-key lookup, case-insensitive.
pub async fn find_person_id(pool: &SqlitePool, name: &str) -> Result<Option<i64>> {
    let row = sqlx::query("SELECT id FROM persons WHERE name = ? COLLATE NOCASE")
        .bind(name)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|r| r.get("id")))
}

/// Create a person from a normalized key, or return the existing row id if
/// another stream created it first. `variant` is the raw spelling that
/// introduced the identity.
pub async fn insert_person(pool: &SqlitePool, key: &NameKey, variant: &str) -> Result<i64> {
    let name = key.canonical();
    let variants = serde_json::to_string(&vec![variant])?;
    sqlx::query(
        r#"
        INSERT INTO persons (name, prefix, first_name, middle_name, last_name, suffix,
                             full_name, variants)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(name) DO UPDATE SET updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(&name)
    .bind(&key.prefix)
    .bind(&key.first_name)
    .bind(&key.middle_name)
    .bind(&key.last_name)
    .bind(&key.suffix)
    .bind(key.full_name())
    .bind(&variants)
    .execute(pool)
    .await?;

    find_person_id(pool, &name)
        .await?
        .ok_or_else(|| Error::Internal(format!("person {} missing after insert", name)))
}

/// Record a raw spelling under an existing identity. Idempotent.
pub async fn add_person_variant(pool: &SqlitePool, id: i64, variant: &str) -> Result<()> {
    let row = sqlx::query("SELECT variants FROM persons WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("person {}", id)))?;

    let json: String = row.get("variants");
    let mut variants: Vec<String> = serde_json::from_str(&json)?;
    if variants.iter().any(|v| v == variant) {
        return Ok(());
    }
    variants.push(variant.to_string());
    sqlx::query("UPDATE persons SET variants = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?")
        .bind(serde_json::to_string(&variants)?)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn load_person(pool: &SqlitePool, id: i64) -> Result<Option<Person>> {
    let row = sqlx::query(
        r#"
        SELECT id, name, prefix, first_name, middle_name, last_name, suffix,
               full_name, variants
        FROM persons WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => Ok(Some(person_from_row(row)?)),
        None => Ok(None),
    }
}

/// Row id of the seeded unknown-composer sentinel.
pub async fn unknown_composer_id(pool: &SqlitePool) -> Result<i64> {
    find_person_id(pool, UNKNOWN_COMPOSER_KEY)
        .await?
        .ok_or_else(|| Error::Internal("unknown-composer sentinel not seeded".to_string()))
}

fn person_from_row(row: sqlx::sqlite::SqliteRow) -> Result<Person> {
    let variants_json: String = row.get("variants");
    Ok(Person {
        id: row.get("id"),
        name: row.get("name"),
        prefix: row.get("prefix"),
        first_name: row.get("first_name"),
        middle_name: row.get("middle_name"),
        last_name: row.get("last_name"),
        suffix: row.get("suffix"),
        full_name: row.get("full_name"),
        variants: serde_json::from_str(&variants_json)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use aircheck_common::db::schema::init_schema;

    fn key(last: &str, first: &str) -> NameKey {
        NameKey {
            prefix: None,
            first_name: Some(first.to_string()),
            middle_name: None,
            last_name: last.to_string(),
            suffix: None,
        }
    }

    #[tokio::test]
    async fn test_insert_person_converges_on_one_row() {
        let pool = SqlitePool::connect(":memory:").await.unwrap();
        init_schema(&pool).await.unwrap();

        let a = insert_person(&pool, &key("Previn", "Andre"), "Previn, Andre")
            .await
            .unwrap();
        let b = insert_person(&pool, &key("Previn", "Andre"), "Andre Previn")
            .await
            .unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_exact_lookup_is_case_insensitive() {
        let pool = SqlitePool::connect(":memory:").await.unwrap();
        init_schema(&pool).await.unwrap();

        let id = insert_person(&pool, &key("Bell", "Joshua"), "Joshua Bell")
            .await
            .unwrap();
        let found = find_person_id(&pool, "bell, joshua").await.unwrap();
        assert_eq!(found, Some(id));
    }

    #[tokio::test]
    async fn test_variants_grow_without_duplicates() {
        let pool = SqlitePool::connect(":memory:").await.unwrap();
        init_schema(&pool).await.unwrap();

        let id = insert_person(&pool, &key("Bell", "Joshua"), "Joshua Bell")
            .await
            .unwrap();
        add_person_variant(&pool, id, "Bell, Joshua").await.unwrap();
        add_person_variant(&pool, id, "Bell, Joshua").await.unwrap();

        let person = load_person(&pool, id).await.unwrap().unwrap();
        assert_eq!(person.variants, vec!["Joshua Bell", "Bell, Joshua"]);
    }

    #[tokio::test]
    async fn test_sentinel_is_seeded() {
        let pool = SqlitePool::connect(":memory:").await.unwrap();
        init_schema(&pool).await.unwrap();

        let id = unknown_composer_id(&pool).await.unwrap();
        let person = load_person(&pool, id).await.unwrap().unwrap();
        assert_eq!(person.name, UNKNOWN_COMPOSER_KEY);
    }
}
