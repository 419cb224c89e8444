//! Master selection within a syndication run
//!
//! The master is the member from the highest-authority station, ties
//! broken toward the earliest-created play. Selection depends only on run
//! membership and the static authority table, so repeating a pass over
//! the same plays always picks the same master.

use std::cmp::Reverse;
use std::collections::HashMap;

use crate::models::{MasterAssignment, SyndicationRun};

pub struct MasterAssigner {
    authority: HashMap<i64, i64>,
}

impl MasterAssigner {
    pub fn new(authority: HashMap<i64, i64>) -> Self {
        Self { authority }
    }

    /// Pick the master and the members that link to it.
    ///
    /// `None` only for an empty membership, which grouping never produces.
    pub fn assign(&self, run: &SyndicationRun) -> Option<MasterAssignment> {
        let mut ranked = run.members.clone();
        ranked.sort_by_key(|m| (Reverse(self.rank(m.station_id)), m.play_id));

        let master = ranked.first()?;
        Some(MasterAssignment {
            master_play_id: master.play_id,
            subordinate_play_ids: ranked[1..].iter().map(|m| m.play_id).collect(),
        })
    }

    /// A station missing from the table ranks below every configured one.
    fn rank(&self, station_id: i64) -> i64 {
        self.authority.get(&station_id).copied().unwrap_or(-1)
    }
}
