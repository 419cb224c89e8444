//! Quarantine queue persistence
//!
//! Diagnostics produced during resolution are persisted here for manual
//! review. Entries stay open until a reviewer resolves them or a re-ingest
//! of the same play no longer reproduces the problem.

use sqlx::{Row, SqlitePool};

use aircheck_common::db::models::{
    FieldKind, QuarantineEntry, QuarantineReason, QuarantineStatus,
};
use aircheck_common::{Error, Result};

use crate::models::Diagnostic;

pub async fn insert_diagnostic(
    pool: &SqlitePool,
    station_id: i64,
    play_date: &str,
    play_id: Option<i64>,
    diagnostic: &Diagnostic,
    run_id: Option<&str>,
) -> Result<i64> {
    let detail = match &diagnostic.detail {
        Some(value) => Some(serde_json::to_string(value)?),
        None => None,
    };
    let result = sqlx::query(
        r#"
        INSERT INTO quarantine (station_id, play_date, play_id, field_kind,
                                raw_text, reason, detail, run_id)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(station_id)
    .bind(play_date)
    .bind(play_id)
    .bind(diagnostic.field.as_str())
    .bind(&diagnostic.raw_text)
    .bind(diagnostic.reason.as_str())
    .bind(detail)
    .bind(run_id)
    .execute(pool)
    .await?;
    Ok(result.last_insert_rowid())
}

/// Close open entries for a play whose field no longer produces a
/// diagnostic. Called on re-ingest so a corrected feed clears its own
/// quarantine backlog.
pub async fn resolve_superseded(
    pool: &SqlitePool,
    play_id: i64,
    still_open: &[FieldKind],
) -> Result<u64> {
    let open = sqlx::query("SELECT id, field_kind FROM quarantine WHERE play_id = ? AND status = 'open'")
        .bind(play_id)
        .fetch_all(pool)
        .await?;

    let mut resolved = 0u64;
    for row in open {
        let kind: String = row.get("field_kind");
        let Some(kind) = FieldKind::parse(&kind) else {
            continue;
        };
        if still_open.contains(&kind) {
            continue;
        }
        let id: i64 = row.get("id");
        sqlx::query(
            "UPDATE quarantine SET status = 'resolved', updated_at = CURRENT_TIMESTAMP WHERE id = ?",
        )
        .bind(id)
        .execute(pool)
        .await?;
        resolved += 1;
    }
    Ok(resolved)
}

pub async fn mark_resolved(pool: &SqlitePool, id: i64) -> Result<()> {
    let result = sqlx::query(
        "UPDATE quarantine SET status = 'resolved', updated_at = CURRENT_TIMESTAMP WHERE id = ?",
    )
    .bind(id)
    .execute(pool)
    .await?;
    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("quarantine entry {}", id)));
    }
    Ok(())
}

/// Review listing with optional narrowing filters. NULL binds disable a
/// filter, so one query serves every flag combination the CLI offers.
pub async fn review_entries(
    pool: &SqlitePool,
    station_id: Option<i64>,
    play_date: Option<&str>,
    field: Option<FieldKind>,
    open_only: bool,
    limit: i64,
) -> Result<Vec<QuarantineEntry>> {
    let field = field.map(|f| f.as_str());
    let rows = sqlx::query(
        r#"
        SELECT id, station_id, play_date, play_id, field_kind, raw_text,
               reason, detail, status, run_id, created_at
        FROM quarantine
        WHERE (? IS NULL OR station_id = ?)
          AND (? IS NULL OR play_date = ?)
          AND (? IS NULL OR field_kind = ?)
          AND (? = 0 OR status = 'open')
        ORDER BY id DESC
        LIMIT ?
        "#,
    )
    .bind(station_id)
    .bind(station_id)
    .bind(play_date)
    .bind(play_date)
    .bind(field)
    .bind(field)
    .bind(open_only)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(entry_from_row).collect()
}

pub async fn open_count_for_date(pool: &SqlitePool, station_id: i64, play_date: &str) -> Result<u32> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM quarantine WHERE station_id = ? AND play_date = ? AND status = 'open'",
    )
    .bind(station_id)
    .bind(play_date)
    .fetch_one(pool)
    .await?;
    Ok(count as u32)
}

fn entry_from_row(row: sqlx::sqlite::SqliteRow) -> Result<QuarantineEntry> {
    let field_kind: String = row.get("field_kind");
    let reason: String = row.get("reason");
    let status: String = row.get("status");
    Ok(QuarantineEntry {
        id: row.get("id"),
        station_id: row.get("station_id"),
        play_date: row.get("play_date"),
        play_id: row.get("play_id"),
        field_kind: FieldKind::parse(&field_kind)
            .ok_or_else(|| Error::Internal(format!("bad field kind {:?}", field_kind)))?,
        raw_text: row.get("raw_text"),
        reason: QuarantineReason::parse(&reason)
            .ok_or_else(|| Error::Internal(format!("bad quarantine reason {:?}", reason)))?,
        detail: row.get("detail"),
        status: QuarantineStatus::parse(&status)
            .ok_or_else(|| Error::Internal(format!("bad quarantine status {:?}", status)))?,
        run_id: row.get("run_id"),
        created_at: row.get("created_at"),
    })
}
