//! Canonical play attributes and their digests

use serde::{Deserialize, Serialize};

/// The identity-resolved attribute tuple of one play.
///
/// Attributes are catalog row ids, not strings: hashing runs downstream of
/// identity resolution, so two stations whose listings spelled a name
/// differently carry the same ids here once resolution converged. A play
/// holding the unknown-composer sentinel loads with `composer_id = None`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayAttrs {
    pub play_id: i64,
    pub station_id: i64,
    pub composer_id: Option<i64>,
    pub work_id: Option<i64>,
    pub conductor_id: Option<i64>,
    /// Performer person ids; order and duplicates are not significant
    pub performer_ids: Vec<i64>,
}

/// One computed digest, ready to persist or print
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceHash {
    pub play_id: i64,
    pub station_id: i64,
    pub hash_level: i64,
    pub digest: i64,
}
