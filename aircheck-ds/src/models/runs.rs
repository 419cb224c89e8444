//! Syndication run structures
//!
//! Runs are transient within one resolution pass; only the resulting
//! master links persist.

/// One play's membership in a candidate group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunMember {
    pub play_id: i64,
    pub station_id: i64,
}

/// A group of plays sharing a digest at one level across stations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyndicationRun {
    pub hash_level: i64,
    pub digest: i64,
    /// Ordered by ascending play id
    pub members: Vec<RunMember>,
}

/// Master selection for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterAssignment {
    pub master_play_id: i64,
    pub subordinate_play_ids: Vec<i64>,
}

/// Counts returned by a syndication resolution pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyndicationOutcome {
    pub runs_found: u32,
    /// Plays that received a master link
    pub masters_assigned: u32,
}
