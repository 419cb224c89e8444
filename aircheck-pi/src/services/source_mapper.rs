//! Source Document Mapping
//!
//! Stations publish playlist documents in structurally incompatible JSON
//! shapes. Rather than a decoder per station, one mapper walks any
//! document using the JSON pointers in the station's field map: pointers
//! locate the program array, the play array within a program, and the
//! text of each semantic field within a play.
//!
//! An empty pointer means the station's format simply does not carry that
//! field; the corresponding entry stays absent rather than empty.

use chrono::{Days, NaiveDate, NaiveDateTime};
use serde_json::Value;

use aircheck_common::config::FieldMapConfig;
use aircheck_common::db::models::FieldKind;
use aircheck_common::{time, Error, Result};

use crate::models::{RawPlay, RawProgram, RawProgramBlock};

/// Program name used when a station's format has no program structure.
const SYNTHETIC_PROGRAM: &str = "Broadcast Day";

pub struct SourceMapper {
    map: FieldMapConfig,
}

impl SourceMapper {
    pub fn new(map: FieldMapConfig) -> Self {
        Self { map }
    }

    /// Decode one station-day document into program blocks. A document
    /// whose program or play pointers do not resolve to arrays is
    /// malformed; content-level oddities inside plays are left for the
    /// resolver to diagnose.
    pub fn map_document(&self, doc: &Value, date: NaiveDate) -> Result<Vec<RawProgramBlock>> {
        if self.map.plays.is_empty() {
            return Err(Error::Config(
                "station field map has no plays pointer".to_string(),
            ));
        }

        if self.map.programs.is_empty() {
            // Flat format: every play hangs off the document root.
            let plays = self.map_plays(doc, date)?;
            return Ok(vec![RawProgramBlock {
                program: RawProgram {
                    name: SYNTHETIC_PROGRAM.to_string(),
                    host: None,
                    start_local: Some(date.and_hms_opt(0, 0, 0).unwrap_or_default()),
                    end_local: None,
                    raw: Value::Null,
                },
                plays,
            }]);
        }

        let programs = doc
            .pointer(&self.map.programs)
            .and_then(Value::as_array)
            .ok_or_else(|| {
                Error::InvalidInput(format!(
                    "program pointer {} did not locate an array",
                    self.map.programs
                ))
            })?;

        let mut blocks = Vec::with_capacity(programs.len());
        for obj in programs {
            let plays = self.map_plays(obj, date)?;
            blocks.push(RawProgramBlock {
                program: self.map_program(obj, date),
                plays,
            });
        }
        Ok(blocks)
    }

    fn map_program(&self, obj: &Value, date: NaiveDate) -> RawProgram {
        let name = pointer_text(obj, &self.map.program_name)
            .unwrap_or_else(|| SYNTHETIC_PROGRAM.to_string());
        let start_local = pointer_text(obj, &self.map.program_start)
            .and_then(|s| parse_local_instant(&s, date));
        let end_local = pointer_text(obj, &self.map.program_end)
            .and_then(|s| parse_local_instant(&s, date))
            .map(|end| roll_forward(start_local, end));

        RawProgram {
            name,
            host: pointer_text(obj, &self.map.program_host),
            start_local,
            end_local,
            raw: program_fragment(obj, &self.map.plays),
        }
    }

    fn map_plays(&self, parent: &Value, date: NaiveDate) -> Result<Vec<RawPlay>> {
        let array = parent
            .pointer(&self.map.plays)
            .and_then(Value::as_array)
            .ok_or_else(|| {
                Error::InvalidInput(format!(
                    "play pointer {} did not locate an array",
                    self.map.plays
                ))
            })?;

        let mut plays = Vec::with_capacity(array.len());
        for obj in array {
            plays.push(self.map_play(obj, date));
        }
        Ok(plays)
    }

    fn map_play(&self, obj: &Value, date: NaiveDate) -> RawPlay {
        let mut play = RawPlay {
            start_local: pointer_text(obj, &self.map.play_start)
                .and_then(|s| parse_local_instant(&s, date)),
            end_local: pointer_text(obj, &self.map.play_end)
                .and_then(|s| parse_local_instant(&s, date)),
            label: pointer_text(obj, &self.map.label),
            catalog_no: pointer_text(obj, &self.map.catalog_no),
            raw: obj.clone(),
            ..RawPlay::default()
        };
        play.end_local = play.end_local.map(|end| roll_forward(play.start_local, end));

        for (kind, pointer) in [
            (FieldKind::Composer, &self.map.composer),
            (FieldKind::Work, &self.map.work),
            (FieldKind::Conductor, &self.map.conductor),
            (FieldKind::Ensembles, &self.map.ensembles),
            (FieldKind::Performers, &self.map.performers),
            (FieldKind::Recording, &self.map.recording),
        ] {
            if let Some(text) = pointer_text(obj, pointer) {
                play.fields.insert(kind, text);
            }
        }
        play
    }
}

/// Text at a pointer. Empty pointers and missing values both yield
/// `None`; numbers are accepted since some feeds publish catalog numbers
/// unquoted.
fn pointer_text(obj: &Value, pointer: &str) -> Option<String> {
    if pointer.is_empty() {
        return None;
    }
    match obj.pointer(pointer)? {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Listed wall-clock times carry no date; a full local timestamp is also
/// accepted since a few feeds publish one.
fn parse_local_instant(s: &str, date: NaiveDate) -> Option<NaiveDateTime> {
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s.trim(), fmt) {
            return Some(dt);
        }
    }
    time::parse_clock_time(s).map(|t| date.and_time(t))
}

/// An end time listed earlier than its start crossed midnight.
fn roll_forward(start: Option<NaiveDateTime>, end: NaiveDateTime) -> NaiveDateTime {
    match start {
        Some(start) if end < start => end.checked_add_days(Days::new(1)).unwrap_or(end),
        _ => end,
    }
}

/// The program fragment stored in `raw_info`. When the play array is a
/// direct child key it is stripped so the fragment stays small; deeper
/// nestings keep the object as-is.
fn program_fragment(obj: &Value, plays_pointer: &str) -> Value {
    if let Some(key) = plays_pointer.strip_prefix('/') {
        if !key.contains('/') {
            if let Value::Object(map) = obj {
                let mut map = map.clone();
                map.remove(key);
                return Value::Object(map);
            }
        }
    }
    obj.clone()
}
