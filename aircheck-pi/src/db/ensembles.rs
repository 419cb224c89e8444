//! Ensemble identity persistence
//!
//! Mirrors the person store: unique canonical name, upsert convergence,
//! variant accumulation.

use sqlx::{Row, SqlitePool};

use aircheck_common::db::models::Ensemble;
use aircheck_common::{Error, Result};

pub async fn identity_candidates(pool: &SqlitePool) -> Result<Vec<(i64, String)>> {
    let rows = sqlx::query("SELECT id, name FROM ensembles ORDER BY id")
        .fetch_all(pool)
        .await?;
    Ok(rows
        .into_iter()
        .map(|row| (row.get("id"), row.get("name")))
        .collect())
}

pub async fn find_ensemble_id(pool: &SqlitePool, name: &str) -> Result<Option<i64>> {
    let row = sqlx::query("SELECT id FROM ensembles WHERE name = ? COLLATE NOCASE")
        .bind(name)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|r| r.get("id")))
}

pub async fn insert_ensemble(pool: &SqlitePool, name: &str, variant: &str) -> Result<i64> {
    let variants = serde_json::to_string(&vec![variant])?;
    sqlx::query(
        r#"
        INSERT INTO ensembles (name, variants)
        VALUES (?, ?)
        ON CONFLICT(name) DO UPDATE SET updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(name)
    .bind(&variants)
    .execute(pool)
    .await?;

    find_ensemble_id(pool, name)
        .await?
        .ok_or_else(|| Error::Internal(format!("ensemble {} missing after insert", name)))
}

pub async fn add_ensemble_variant(pool: &SqlitePool, id: i64, variant: &str) -> Result<()> {
    let row = sqlx::query("SELECT variants FROM ensembles WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("ensemble {}", id)))?;

    let json: String = row.get("variants");
    let mut variants: Vec<String> = serde_json::from_str(&json)?;
    if variants.iter().any(|v| v == variant) {
        return Ok(());
    }
    variants.push(variant.to_string());
    sqlx::query("UPDATE ensembles SET variants = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?")
        .bind(serde_json::to_string(&variants)?)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn load_ensemble(pool: &SqlitePool, id: i64) -> Result<Option<Ensemble>> {
    let row = sqlx::query("SELECT id, name, variants FROM ensembles WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => {
            let variants_json: String = row.get("variants");
            Ok(Some(Ensemble {
                id: row.get("id"),
                name: row.get("name"),
                variants: serde_json::from_str(&variants_json)?,
            }))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aircheck_common::db::schema::init_schema;

    #[tokio::test]
    async fn test_insert_and_variant_roundtrip() {
        let pool = SqlitePool::connect(":memory:").await.unwrap();
        init_schema(&pool).await.unwrap();

        let id = insert_ensemble(&pool, "Chicago Symphony Orchestra", "Chicago SO")
            .await
            .unwrap();
        add_ensemble_variant(&pool, id, "Chicago Symphony").await.unwrap();

        let ensemble = load_ensemble(&pool, id).await.unwrap().unwrap();
        assert_eq!(ensemble.name, "Chicago Symphony Orchestra");
        assert_eq!(ensemble.variants, vec!["Chicago SO", "Chicago Symphony"]);

        let same = insert_ensemble(&pool, "Chicago Symphony Orchestra", "CSO")
            .await
            .unwrap();
        assert_eq!(same, id);
    }
}
