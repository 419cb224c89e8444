//! Play Construction
//!
//! Turns one raw play into a catalog row: every credit field goes through
//! the resolver, the resulting references are routed into the play's
//! attribute slots, and the row is upserted on its natural key so
//! re-ingest updates in place.
//!
//! Routing rules:
//! - Composer takes the first resolved person; anything else in the field
//!   falls back to the sentinel identity.
//! - Persons found in the conductor or ensembles fields fill the conductor
//!   slot first; once it is taken they become performer credits.
//! - Ensembles found in any credit field join the play's ensemble set.
//! - Recording identification is matched verbatim, never fuzzily.

use chrono::{NaiveDate, NaiveDateTime};
use sqlx::SqlitePool;
use std::sync::Arc;

use aircheck_common::db::models::{FieldKind, Play, Station};
use aircheck_common::{time, Result};

use crate::db::{performers, plays, recordings, works};
use crate::models::{Diagnostic, PerformerCredit, RawPlay};
use crate::services::entity_parser::EntityParser;
use crate::services::entity_resolver::EntityResolver;

/// A persisted play plus the diagnostics its fields produced. The caller
/// owns writing diagnostics to the quarantine table, since only it knows
/// the ingest run id.
#[derive(Debug)]
pub struct BuiltPlay {
    pub play_id: i64,
    pub quarantined: bool,
    pub diagnostics: Vec<Diagnostic>,
}

impl BuiltPlay {
    /// Fields that still have an open problem after this build, used to
    /// close superseded quarantine entries from earlier ingests.
    pub fn open_fields(&self) -> Vec<FieldKind> {
        self.diagnostics.iter().map(|d| d.field).collect()
    }
}

pub struct PlayBuilder {
    pool: SqlitePool,
    resolver: Arc<EntityResolver>,
}

impl PlayBuilder {
    pub fn new(pool: SqlitePool, resolver: Arc<EntityResolver>) -> Self {
        Self { pool, resolver }
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn build_play(
        &self,
        station: &Station,
        parser: &EntityParser,
        program_id: i64,
        play_date: NaiveDate,
        play_index: i64,
        fallback_start: NaiveDateTime,
        raw: &RawPlay,
    ) -> Result<BuiltPlay> {
        let mut diagnostics: Vec<Diagnostic> = Vec::new();
        let mut conductor_id: Option<i64> = None;
        let mut credits: Vec<PerformerCredit> = Vec::new();
        let mut ensemble_ids: Vec<i64> = Vec::new();

        // Composer: first resolved person wins, sentinel otherwise.
        let composer_id = match raw.field(FieldKind::Composer) {
            Some(text) => {
                let mut res = self
                    .resolver
                    .resolve_field(FieldKind::Composer, text, parser)
                    .await?;
                match res.first_person_id() {
                    Some(id) => {
                        // Trailing arranger credits and similar leftovers
                        // are noise once a composer resolved; review-band
                        // matches still need their queue entry.
                        res.diagnostics.retain(|d| {
                            if d.marks_play() {
                                tracing::debug!(
                                    raw = %d.raw_text,
                                    "dropping leftover composer item"
                                );
                                false
                            } else {
                                true
                            }
                        });
                        diagnostics.append(&mut res.diagnostics);
                        id
                    }
                    None => {
                        diagnostics.append(&mut res.diagnostics);
                        if !diagnostics.iter().any(|d| d.marks_play()) {
                            diagnostics.push(Diagnostic::parse_failure(
                                FieldKind::Composer,
                                text,
                                None,
                            ));
                        }
                        self.resolver.unknown_composer_id().await?
                    }
                }
            }
            None => self.resolver.unknown_composer_id().await?,
        };

        // Work titles bind exactly under their composer; no fuzzy pass.
        let work_id = match raw.field(FieldKind::Work).map(clean_title) {
            Some(title) if !title.is_empty() => {
                Some(works::upsert_work(&self.pool, composer_id, &title).await?)
            }
            _ => None,
        };

        if let Some(text) = raw.field(FieldKind::Conductor) {
            let mut res = self
                .resolver
                .resolve_field(FieldKind::Conductor, text, parser)
                .await?;
            diagnostics.append(&mut res.diagnostics);
            route_persons(res.persons, &mut conductor_id, &mut credits);
            collect_ensembles(&res.ensembles, &mut ensemble_ids);
        }

        if let Some(text) = raw.field(FieldKind::Ensembles) {
            let mut res = self
                .resolver
                .resolve_field(FieldKind::Ensembles, text, parser)
                .await?;
            diagnostics.append(&mut res.diagnostics);
            collect_ensembles(&res.ensembles, &mut ensemble_ids);
            route_persons(res.persons, &mut conductor_id, &mut credits);
        }

        if let Some(text) = raw.field(FieldKind::Performers) {
            let mut res = self
                .resolver
                .resolve_field(FieldKind::Performers, text, parser)
                .await?;
            diagnostics.append(&mut res.diagnostics);
            collect_ensembles(&res.ensembles, &mut ensemble_ids);
            // Performer credits never promote to conductor.
            credits.extend(res.persons);
        }

        let recording_id = self.upsert_recording_ref(raw).await?;

        let mut performer_ids: Vec<i64> = Vec::new();
        for credit in &credits {
            let Some(person_id) = credit.person.person_id() else {
                continue;
            };
            let role = credit.role.as_deref().unwrap_or("");
            let performer_id = performers::upsert_performer(&self.pool, person_id, role).await?;
            if !performer_ids.contains(&performer_id) {
                performer_ids.push(performer_id);
            }
        }

        let start_local = raw.start_local.unwrap_or(fallback_start);
        let end_local = raw.end_local;
        let quarantined = diagnostics.iter().any(|d| d.marks_play());

        let play = Play {
            id: 0,
            station_id: station.id,
            program_id,
            play_date: time::broadcast_date_str(play_date),
            play_index,
            start_local: local_str(start_local),
            end_local: end_local.map(local_str),
            start_utc: time::utc_from_local(start_local, station.utc_offset_minutes).to_rfc3339(),
            end_utc: end_local
                .map(|dt| time::utc_from_local(dt, station.utc_offset_minutes).to_rfc3339()),
            composer_id,
            work_id,
            conductor_id,
            recording_id,
            master_play_id: None,
            quarantined,
            raw_info: raw.raw.clone(),
        };

        let play_id = plays::upsert_play(&self.pool, &play).await?;
        plays::set_play_performers(&self.pool, play_id, &performer_ids).await?;
        plays::set_play_ensembles(&self.pool, play_id, &ensemble_ids).await?;

        Ok(BuiltPlay {
            play_id,
            quarantined,
            diagnostics,
        })
    }

    /// Recording identification: stored fields are the listed strings, with
    /// empty string standing in for absent. A row exists only when the
    /// listing identified something.
    async fn upsert_recording_ref(&self, raw: &RawPlay) -> Result<Option<i64>> {
        let name = raw
            .field(FieldKind::Recording)
            .map(clean_title)
            .unwrap_or_default();
        let label = raw.label.as_deref().map(str::trim).unwrap_or_default();
        let catalog_no = raw.catalog_no.as_deref().map(str::trim).unwrap_or_default();
        if name.is_empty() && label.is_empty() && catalog_no.is_empty() {
            return Ok(None);
        }
        let id = recordings::upsert_recording(&self.pool, &name, label, catalog_no).await?;
        Ok(Some(id))
    }
}

/// First person fills an empty conductor slot; the rest are credits.
fn route_persons(
    persons: Vec<PerformerCredit>,
    conductor_id: &mut Option<i64>,
    credits: &mut Vec<PerformerCredit>,
) {
    for credit in persons {
        let Some(person_id) = credit.person.person_id() else {
            continue;
        };
        if conductor_id.is_none() {
            *conductor_id = Some(person_id);
        } else {
            credits.push(credit);
        }
    }
}

fn collect_ensembles(refs: &[crate::models::ResolvedRef], ensemble_ids: &mut Vec<i64>) {
    for r in refs {
        if let Some(id) = r.ensemble_id() {
            if !ensemble_ids.contains(&id) {
                ensemble_ids.push(id);
            }
        }
    }
}

/// Title cleanup: whitespace collapsed, one pair of enclosing quotes
/// removed. Titles are matched exactly, so this is deliberately shallow.
fn clean_title(text: &str) -> String {
    let collapsed: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let trimmed = collapsed.trim();
    for (open, close) in [('"', '"'), ('\'', '\''), ('\u{201C}', '\u{201D}')] {
        if trimmed.len() >= 2 && trimmed.starts_with(open) && trimmed.ends_with(close) {
            return trimmed[open.len_utf8()..trimmed.len() - close.len_utf8()]
                .trim()
                .to_string();
        }
    }
    trimmed.to_string()
}

fn local_str(dt: NaiveDateTime) -> String {
    dt.format("%Y-%m-%d %H:%M:%S").to_string()
}
