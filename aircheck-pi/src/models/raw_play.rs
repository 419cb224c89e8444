//! Raw playlist material, decoded from a station document but not yet
//! resolved against the catalog.
//!
//! The source mapper produces these; the play builder consumes them. Field
//! text is carried verbatim so the original spelling survives into
//! quarantine entries and `raw_info` columns.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use aircheck_common::db::models::FieldKind;

/// One program block as the station published it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawProgram {
    pub name: String,
    pub host: Option<String>,
    pub start_local: Option<NaiveDateTime>,
    pub end_local: Option<NaiveDateTime>,
    /// Source document fragment this block was decoded from.
    pub raw: serde_json::Value,
}

/// One play as the station published it: entity text per field, plus
/// whatever timing the document carried.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RawPlay {
    pub start_local: Option<NaiveDateTime>,
    pub end_local: Option<NaiveDateTime>,
    /// Entity strings keyed by target field. Absent key = station did not
    /// publish that field for this play.
    pub fields: BTreeMap<FieldKind, String>,
    /// Recording label, carried verbatim.
    pub label: Option<String>,
    /// Recording catalog number, carried verbatim.
    pub catalog_no: Option<String>,
    pub raw: serde_json::Value,
}

impl RawPlay {
    pub fn field(&self, kind: FieldKind) -> Option<&str> {
        self.fields.get(&kind).map(|s| s.as_str()).filter(|s| !s.trim().is_empty())
    }
}

/// A program together with its plays, in broadcast order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawProgramBlock {
    pub program: RawProgram,
    pub plays: Vec<RawPlay>,
}

/// What one station-day ingest produced.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct IngestOutcome {
    pub programs_created: u32,
    pub plays_created: u32,
    pub quarantine_count: u32,
}

impl IngestOutcome {
    pub fn absorb(&mut self, other: IngestOutcome) {
        self.programs_created += other.programs_created;
        self.plays_created += other.plays_created;
        self.quarantine_count += other.quarantine_count;
    }
}
