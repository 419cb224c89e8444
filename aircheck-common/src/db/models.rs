//! Database models
//!
//! Row types for the catalog tables. Identifier columns are SQLite rowids:
//! creation order is significant (fuzzy-match ties break on the lowest
//! identity id, master assignment ties on the lowest play id), so identity
//! and play rows are never auto-deleted and ids are never recycled.
//! Timestamps and dates are stored as formatted TEXT (`YYYY-MM-DD` dates,
//! `YYYY-MM-DD HH:MM:SS` local instants, RFC 3339 UTC instants).

use serde::{Deserialize, Serialize};

/// Canonical key of the sentinel identity assigned when a composer field
/// cannot be resolved. The angle brackets keep it disjoint from any
/// normalized real name.
pub const UNKNOWN_COMPOSER_KEY: &str = "<unknown composer>";

/// Display form of the sentinel composer identity
pub const UNKNOWN_COMPOSER_NAME: &str = "Unknown Composer";

/// Station registry row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Station {
    pub id: i64,
    pub name: String,
    /// Minutes east of UTC (negative west)
    pub utc_offset_minutes: i32,
    /// Authority rank 0-100; higher is closer to the broadcast origin
    pub authority: i64,
    pub enabled: bool,
}

/// Resolved person identity
///
/// `name` is the canonical key, `"Last, First [Middle][, Suffix]"`;
/// `full_name` is the assembled display form, `"First [Middle] Last
/// [Suffix]"`. The key is immutable once created; `variants` grows as new
/// surface forms match this identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Person {
    pub id: i64,
    pub name: String,
    pub prefix: Option<String>,
    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub last_name: Option<String>,
    pub suffix: Option<String>,
    pub full_name: String,
    /// Observed raw surface forms that resolved to this identity
    pub variants: Vec<String>,
}

/// Resolved ensemble identity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ensemble {
    pub id: i64,
    pub name: String,
    pub variants: Vec<String>,
}

/// A (person, role) pairing as credited on plays; `role` is empty when the
/// listing gave none
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Performer {
    pub id: i64,
    pub person_id: i64,
    pub role: String,
}

/// Canonical (composer, title) pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Work {
    pub id: i64,
    pub composer_id: i64,
    pub name: String,
}

/// Album identification captured from a play listing; fields are empty when
/// not listed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recording {
    pub id: i64,
    pub name: String,
    pub label: String,
    pub catalog_no: String,
}

/// One scheduled broadcast slot for a station/date
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Program {
    pub id: i64,
    pub station_id: i64,
    pub program_date: String,
    pub name: String,
    pub host_name: Option<String>,
    pub start_local: String,
    pub end_local: Option<String>,
    pub start_utc: String,
    pub end_utc: Option<String>,
    pub raw_info: serde_json::Value,
}

/// One piece broadcast within a program
///
/// `play_index` is the piece's ordinal within the station's broadcast day
/// and, with (station, date), forms the natural key used by re-ingest
/// upserts. `composer_id` always resolves (the sentinel identity stands in
/// when the listing was unparseable); the other references stay `None` when
/// unresolved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Play {
    pub id: i64,
    pub station_id: i64,
    pub program_id: i64,
    pub play_date: String,
    pub play_index: i64,
    pub start_local: String,
    pub end_local: Option<String>,
    pub start_utc: String,
    pub end_utc: Option<String>,
    pub composer_id: i64,
    pub work_id: Option<i64>,
    pub conductor_id: Option<i64>,
    pub recording_id: Option<i64>,
    /// Master play of this play's syndication run, when subordinate
    pub master_play_id: Option<i64>,
    pub quarantined: bool,
    pub raw_info: serde_json::Value,
}

/// One sequence hash for a play at one attribute level
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayHash {
    pub id: i64,
    pub play_id: i64,
    pub hash_level: i64,
    pub digest: i64,
    /// Denormalized from the play for date-scoped grouping queries
    pub station_id: i64,
    pub play_date: String,
}

/// Per (station, date) playlist document bookkeeping
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistFile {
    pub id: i64,
    pub station_id: i64,
    pub play_date: String,
    pub file_path: Option<String>,
    pub status: PlaylistStatus,
    pub plays_created: i64,
    pub quarantine_count: i64,
    pub fetched_at: Option<String>,
    pub parsed_at: Option<String>,
}

/// Playlist document lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaylistStatus {
    /// Fetched but not yet ingested
    New,
    /// No document on disk at ingest time
    Missing,
    /// Ingested with at least one play extracted
    Valid,
    /// Document unreadable or yielded zero plays
    Invalid,
    /// Station disabled in configuration
    Disabled,
}

impl PlaylistStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaylistStatus::New => "new",
            PlaylistStatus::Missing => "missing",
            PlaylistStatus::Valid => "valid",
            PlaylistStatus::Invalid => "invalid",
            PlaylistStatus::Disabled => "disabled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "new" => Some(PlaylistStatus::New),
            "missing" => Some(PlaylistStatus::Missing),
            "valid" => Some(PlaylistStatus::Valid),
            "invalid" => Some(PlaylistStatus::Invalid),
            "disabled" => Some(PlaylistStatus::Disabled),
            _ => None,
        }
    }

    /// A terminal status means ingestion for the (station, date) has been
    /// decided one way or another; syndication resolution requires every
    /// enabled station's row to be terminal
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PlaylistStatus::New)
    }
}

/// Semantic field of a play listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Composer,
    Work,
    Conductor,
    Ensembles,
    Performers,
    Recording,
}

impl FieldKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::Composer => "composer",
            FieldKind::Work => "work",
            FieldKind::Conductor => "conductor",
            FieldKind::Ensembles => "ensembles",
            FieldKind::Performers => "performers",
            FieldKind::Recording => "recording",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "composer" => Some(FieldKind::Composer),
            "work" => Some(FieldKind::Work),
            "conductor" => Some(FieldKind::Conductor),
            "ensembles" => Some(FieldKind::Ensembles),
            "performers" => Some(FieldKind::Performers),
            "recording" => Some(FieldKind::Recording),
            _ => None,
        }
    }

    /// Whether the field may legitimately name several people, allowing the
    /// normalizer to split on secondary separators
    pub fn allows_multiple(&self) -> bool {
        matches!(self, FieldKind::Performers | FieldKind::Ensembles)
    }
}

/// Persistent quarantine diagnostic
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuarantineEntry {
    pub id: i64,
    pub station_id: i64,
    pub play_date: String,
    pub play_id: Option<i64>,
    pub field_kind: FieldKind,
    pub raw_text: String,
    pub reason: QuarantineReason,
    /// JSON context (candidate key, match score, band) for review
    pub detail: Option<String>,
    pub status: QuarantineStatus,
    pub run_id: Option<String>,
    pub created_at: String,
}

/// Why a field landed in quarantine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuarantineReason {
    /// Structurally unrecognizable input
    ParseFailure,
    /// Classification rules disagreed with no tiebreak
    AmbiguousClassification,
    /// Match recorded in the medium band, flagged for confirmation
    IdentityReview,
}

impl QuarantineReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuarantineReason::ParseFailure => "parse_failure",
            QuarantineReason::AmbiguousClassification => "ambiguous_classification",
            QuarantineReason::IdentityReview => "identity_review",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "parse_failure" => Some(QuarantineReason::ParseFailure),
            "ambiguous_classification" => Some(QuarantineReason::AmbiguousClassification),
            "identity_review" => Some(QuarantineReason::IdentityReview),
            _ => None,
        }
    }
}

/// Review state of a quarantine entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuarantineStatus {
    Open,
    Resolved,
}

impl QuarantineStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuarantineStatus::Open => "open",
            QuarantineStatus::Resolved => "resolved",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "open" => Some(QuarantineStatus::Open),
            "resolved" => Some(QuarantineStatus::Resolved),
            _ => None,
        }
    }
}
