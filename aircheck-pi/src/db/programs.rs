//! Program persistence

use sqlx::{Row, SqlitePool};

use aircheck_common::db::models::Program;
use aircheck_common::{Error, Result};

/// Store a program block, updating host/end data on re-ingest of the same
/// (station, date, start, name).
pub async fn upsert_program(pool: &SqlitePool, program: &Program) -> Result<i64> {
    sqlx::query(
        r#"
        INSERT INTO programs (station_id, program_date, name, host_name,
                              start_local, end_local, start_utc, end_utc, raw_info)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(station_id, program_date, start_local, name) DO UPDATE SET
            host_name = excluded.host_name,
            end_local = excluded.end_local,
            end_utc = excluded.end_utc,
            raw_info = excluded.raw_info,
            updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(program.station_id)
    .bind(&program.program_date)
    .bind(&program.name)
    .bind(&program.host_name)
    .bind(&program.start_local)
    .bind(&program.end_local)
    .bind(&program.start_utc)
    .bind(&program.end_utc)
    .bind(program.raw_info.to_string())
    .execute(pool)
    .await?;

    let row = sqlx::query(
        r#"
        SELECT id FROM programs
        WHERE station_id = ? AND program_date = ? AND start_local = ? AND name = ?
        "#,
    )
    .bind(program.station_id)
    .bind(&program.program_date)
    .bind(&program.start_local)
    .bind(&program.name)
    .fetch_optional(pool)
    .await?;
    row.map(|r| r.get("id"))
        .ok_or_else(|| Error::Internal(format!("program {} missing after upsert", program.name)))
}

pub async fn load_programs_for_date(
    pool: &SqlitePool,
    station_id: i64,
    date: &str,
) -> Result<Vec<Program>> {
    let rows = sqlx::query(
        r#"
        SELECT id, station_id, program_date, name, host_name,
               start_local, end_local, start_utc, end_utc, raw_info
        FROM programs
        WHERE station_id = ? AND program_date = ?
        ORDER BY start_local
        "#,
    )
    .bind(station_id)
    .bind(date)
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|row| {
            let raw: String = row.get("raw_info");
            Ok(Program {
                id: row.get("id"),
                station_id: row.get("station_id"),
                program_date: row.get("program_date"),
                name: row.get("name"),
                host_name: row.get("host_name"),
                start_local: row.get("start_local"),
                end_local: row.get("end_local"),
                start_utc: row.get("start_utc"),
                end_utc: row.get("end_utc"),
                raw_info: serde_json::from_str(&raw)?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::stations::upsert_station;
    use aircheck_common::config::StationConfig;
    use aircheck_common::db::schema::init_schema;

    fn program(station_id: i64, name: &str) -> Program {
        Program {
            id: 0,
            station_id,
            program_date: "2019-03-15".to_string(),
            name: name.to_string(),
            host_name: None,
            start_local: "2019-03-15 06:00:00".to_string(),
            end_local: None,
            start_utc: "2019-03-15T11:00:00Z".to_string(),
            end_utc: None,
            raw_info: serde_json::json!({}),
        }
    }

    #[tokio::test]
    async fn test_reingest_updates_in_place() {
        let pool = SqlitePool::connect(":memory:").await.unwrap();
        init_schema(&pool).await.unwrap();
        let station = upsert_station(
            &pool,
            &StationConfig {
                name: "WTST".to_string(),
                enabled: true,
                url_template: None,
                utc_offset_minutes: -300,
                authority: 10,
                grammar: Default::default(),
                field_map: Default::default(),
            },
        )
        .await
        .unwrap();

        let first = upsert_program(&pool, &program(station.id, "Morning")).await.unwrap();
        let mut updated = program(station.id, "Morning");
        updated.host_name = Some("Alice Hostman".to_string());
        let second = upsert_program(&pool, &updated).await.unwrap();
        assert_eq!(first, second);

        let loaded = load_programs_for_date(&pool, station.id, "2019-03-15")
            .await
            .unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].host_name.as_deref(), Some("Alice Hostman"));
    }
}
